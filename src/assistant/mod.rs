//! Conversational assistant over the sales data.
//!
//! The assistant itself is an external text-generation service speaking the
//! Ollama chat protocol. This module prepares its context (a summary of the
//! data set turned into a system prompt), keeps per-session history and
//! streams replies back.

pub mod context;
pub mod ollama;
pub mod session;

pub use context::{build_system_prompt, format_currency, DatasetSummary};
pub use ollama::{AssistantConfig, AssistantError, ChatStream, NdjsonDecoder, OllamaClient};
pub use session::{ChatMessage, ChatRole, ChatSession};
