use super::session::ChatMessage;
use futures::Stream;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

/// Configuration for the text-generation service
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Base URL of the Ollama server (default: http://localhost:11434)
    pub base_url: String,
    /// Model used when a session does not pick one (default: llama3.2)
    pub default_model: String,
    /// Request timeout in seconds (default: 120)
    pub timeout_seconds: u64,
    /// Prefix for monetary values in the system prompt (default: R$)
    pub currency_symbol: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        AssistantConfig {
            base_url: "http://localhost:11434".to_string(),
            default_model: "llama3.2".to_string(),
            timeout_seconds: 120,
            currency_symbol: "R$".to_string(),
        }
    }
}

/// Error type for assistant calls
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantError {
    /// HTTP client creation failed
    ClientCreation(String),
    /// Network error or the service is unreachable
    Http(String),
    /// The service answered with an error status
    Service { status: u16, message: String },
    /// The model reported an error mid-stream
    Model(String),
    /// A response could not be decoded
    Decode(String),
}

impl fmt::Display for AssistantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssistantError::ClientCreation(msg) => write!(f, "Failed to create HTTP client: {}", msg),
            AssistantError::Http(msg) => write!(f, "Assistant service unreachable: {}", msg),
            AssistantError::Service { status, message } => {
                write!(f, "Assistant service returned {}: {}", status, message)
            }
            AssistantError::Model(msg) => write!(f, "Model error: {}", msg),
            AssistantError::Decode(msg) => write!(f, "Failed to decode assistant response: {}", msg),
        }
    }
}

impl std::error::Error for AssistantError {}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        AssistantError::Http(err.to_string())
    }
}

/// Reply text, chunk by chunk.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, AssistantError>> + Send>>;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Splits a streamed body into newline-delimited JSON chunks and extracts
/// the message text of each.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    /// Feeds raw bytes and returns the text of every complete line.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, AssistantError> {
        self.buffer.extend_from_slice(bytes);
        let mut texts = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(text) = decode_line(&line)? {
                texts.push(text);
            }
        }
        Ok(texts)
    }

    /// Decodes whatever is left once the body has ended.
    pub fn finish(&mut self) -> Result<Option<String>, AssistantError> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }
}

fn decode_line(line: &[u8]) -> Result<Option<String>, AssistantError> {
    let line = std::str::from_utf8(line)
        .map_err(|e| AssistantError::Decode(e.to_string()))?
        .trim();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: ChatChunk =
        serde_json::from_str(line).map_err(|e| AssistantError::Decode(e.to_string()))?;
    if let Some(error) = chunk.error {
        return Err(AssistantError::Model(error));
    }

    Ok(chunk
        .message
        .map(|m| m.content)
        .filter(|content| !content.is_empty()))
}

/// Client for an Ollama-compatible chat service
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    config: AssistantConfig,
}

impl OllamaClient {
    /// Creates a client with the given configuration.
    ///
    /// # Errors
    /// Returns `AssistantError::ClientCreation` if the HTTP client cannot be built.
    pub fn new(config: AssistantConfig) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AssistantError::ClientCreation(e.to_string()))?;

        Ok(OllamaClient { client, config })
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Lists the models installed on the service.
    pub async fn list_models(&self) -> Result<Vec<String>, AssistantError> {
        let response = self.client.get(self.endpoint("/api/tags")).send().await?;
        let response = check_status(response).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Decode(e.to_string()))?;

        Ok(tags
            .models
            .into_iter()
            .map(|tag| tag.model.unwrap_or(tag.name))
            .collect())
    }

    /// Sends the conversation and streams the reply as it is generated.
    ///
    /// # Errors
    /// Fails up front if the service is unreachable or rejects the request;
    /// later failures surface as `Err` items of the stream.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatStream, AssistantError> {
        let request = ChatRequest {
            model,
            messages,
            stream: true,
        };
        let response = self
            .client
            .post(self.endpoint("/api/chat"))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        tracing::debug!(model, "streaming reply");

        Ok(Box::pin(reply_chunks(response)))
    }
}

fn reply_chunks(mut response: Response) -> impl Stream<Item = Result<String, AssistantError>> {
    async_stream::try_stream! {
        let mut decoder = NdjsonDecoder::default();
        while let Some(bytes) = response.chunk().await? {
            for text in decoder.push(&bytes)? {
                yield text;
            }
        }
        if let Some(text) = decoder.finish()? {
            yield text;
        }
    }
}

async fn check_status(response: Response) -> Result<Response, AssistantError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);
    Err(AssistantError::Service {
        status: status.as_u16(),
        message,
    })
}
