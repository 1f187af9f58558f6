//! # Mediaforge LLM
//!
//! Bridge to an OpenAI-compatible chat-completions API. Prompt/template
//! tasks use [`LlmClient::complete`]; caption-style prompts that reference an
//! image use [`LlmClient::caption`].

mod api;
mod client;

pub use client::LlmClient;
