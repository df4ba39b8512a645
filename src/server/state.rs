//! Shared application state for the API server

use crate::assistant::{ChatSession, OllamaClient};
use crate::sqlite_store::SqliteSalesStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Upper bound on concurrently held chat sessions
pub const MAX_CHAT_SESSIONS: usize = 256;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Sales store
    /// Wrapped in Mutex because SQLite connections are not thread-safe
    pub store: Arc<Mutex<SqliteSalesStore>>,
    /// Assistant conversations, one per dashboard user
    pub chat_sessions: Arc<RwLock<HashMap<Uuid, ChatSession>>>,
    /// Client for the text-generation service
    pub assistant: OllamaClient,
    /// Price window used when a request does not give one
    pub window_months: u32,
}

impl AppState {
    /// Creates a new application state
    pub fn new(store: SqliteSalesStore, assistant: OllamaClient, window_months: u32) -> Self {
        AppState {
            store: Arc::new(Mutex::new(store)),
            chat_sessions: Arc::new(RwLock::new(HashMap::new())),
            assistant,
            window_months,
        }
    }
}
