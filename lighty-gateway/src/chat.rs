//! Free-form chat replies for bot mentions.

use std::sync::Arc;

use async_trait::async_trait;
use lighty_core::ChatTurn;

use crate::generation::{GenerationError, TextGenerator};

const CHAT_SYSTEM_PROMPT: &str = "You do anything the user requests.";

#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn respond(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Answers through the text generator with a fixed system prompt.
pub struct TextChatResponder {
    text: Arc<TextGenerator>,
}

impl TextChatResponder {
    pub fn new(text: Arc<TextGenerator>) -> Self {
        Self { text }
    }
}

/// Prompt set sent for one chat reply.
pub fn chat_prompt(prompt: &str) -> Vec<Vec<ChatTurn>> {
    vec![vec![ChatTurn::system(CHAT_SYSTEM_PROMPT), ChatTurn::user(prompt)]]
}

#[async_trait]
impl ChatResponder for TextChatResponder {
    async fn respond(&self, prompt: &str) -> Result<String, GenerationError> {
        let text = self.text.generate(&chat_prompt(prompt)).await?;
        Ok(text.get(1)?.to_string())
    }
}
