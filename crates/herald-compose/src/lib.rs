//! Message composition for Herald.
//!
//! [`ChatCompletionGenerator`] asks an OpenAI-compatible chat completions
//! endpoint for a first-contact message tailored to each candidate.

mod client;
mod error;

pub use client::{ChatCompletionGenerator, ComposeConfig, DEFAULT_SYSTEM_PROMPT, user_prompt};
pub use error::ComposeError;
