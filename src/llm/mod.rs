//! OpenAI-compatible chat completions client.

mod client;
mod types;

pub use client::OpenAiClient;
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, Choice, ChoiceMessage, ResponseFormat, Usage,
};
