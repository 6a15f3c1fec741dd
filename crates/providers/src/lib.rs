//! LLM provider implementations for nanocode.
//!
//! Providers implement the `nanocode_core::Provider` trait. The only
//! transport shipped is the OpenAI-compatible chat-completions client.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
