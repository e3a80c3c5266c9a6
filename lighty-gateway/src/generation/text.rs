use std::collections::BTreeMap;
use std::sync::Arc;

use lighty_core::ChatTurn;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationError, ProcessRunner};

/// Job written to the text generator's stdin
#[derive(Debug, Serialize)]
struct TextJob<'a> {
    prompt_sets: &'a [Vec<ChatTurn>],
}

/// Generator output keyed `prompt1`, `prompt2`, ... in prompt-set order
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct GeneratedText(BTreeMap<String, String>);

impl GeneratedText {
    /// Reply to the `n`th prompt set (1-based).
    pub fn get(&self, n: usize) -> Result<&str, GenerationError> {
        let key = format!("prompt{}", n);
        self.0
            .get(&key)
            .map(String::as_str)
            .ok_or(GenerationError::MissingOutput(key))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Runs the external text-generation command.
pub struct TextGenerator {
    command: Vec<String>,
    runner: Arc<dyn ProcessRunner>,
}

impl TextGenerator {
    pub fn new(command: Vec<String>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { command, runner }
    }

    /// Generate one reply per prompt set in a single process invocation.
    pub async fn generate(
        &self,
        prompt_sets: &[Vec<ChatTurn>],
    ) -> Result<GeneratedText, GenerationError> {
        let payload = serde_json::to_vec(&TextJob { prompt_sets })?;
        debug!(sets = prompt_sets.len(), "Running text generator");

        let stdout = self.runner.run(&self.command, payload).await?;
        let text: GeneratedText = serde_json::from_slice(&stdout)?;
        Ok(text)
    }
}
