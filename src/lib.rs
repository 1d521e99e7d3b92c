//! chatwire — streaming chat-completion client for OpenAI-compatible endpoints.
//!
//! This crate handles one concern: a conversational exchange against a hosted
//! chat completion API.
//! - Request building from held history + tool descriptors
//! - SSE stream parsing and chunk-by-chunk accumulation
//! - Incremental tool-call assembly across indexed deltas
//! - Conversation history maintenance (append-only, in-memory)
//!
//! The client speaks the OpenAI Chat Completions API, so the endpoint is
//! interchangeable via config — pointing at Ollama or vLLM instead of a
//! hosted provider is a base-URL change, not a code change.

pub mod client;
pub mod config;
pub mod errors;
pub mod history;
pub mod streaming;
pub mod types;

// Re-exports for convenience
pub use client::ChatClient;
pub use config::ClientConfig;
pub use errors::ChatError;
pub use history::Conversation;
pub use types::{ChatMessage, ChatResult, Role, ToolCall, ToolDescriptor};
