use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }
}

/// Conversation history for one user of the dashboard.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub model: String,
    pub created_at: DateTime<Utc>,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(model: impl Into<String>) -> Self {
        ChatSession {
            id: Uuid::new_v4(),
            model: model.into(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    /// Records a user turn. The system prompt is placed ahead of the very
    /// first turn only.
    pub fn push_user(&mut self, content: impl Into<String>, system_prompt: &str) {
        if self.messages.is_empty() {
            self.messages.push(ChatMessage::new(ChatRole::System, system_prompt));
        }
        self.messages.push(ChatMessage::new(ChatRole::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(ChatRole::Assistant, content));
    }

    /// Full history as sent to the model.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// History without system messages, for display.
    pub fn visible_messages(&self) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_inserted_once() {
        let mut session = ChatSession::new("llama3");
        session.push_user("Which category sells most?", "context");
        session.push_assistant("Food and beverages.");
        session.push_user("And the least?", "context");

        let roles: Vec<ChatRole> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(session.visible_messages().len(), 3);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::new(ChatRole::Assistant, "hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
