use std::sync::Arc;

use image::RgbaImage;
use image::imageops::FilterType;
use serde::Serialize;
use tracing::{info, warn};

use super::{GenerationError, ProcessRunner, RetryDecision, RetryPolicy};

/// Size of the artwork window on every card template.
pub const ART_WIDTH: u32 = 568;
pub const ART_HEIGHT: u32 = 465;

/// Job written to the image generator's stdin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageJob<'a> {
    pub prompt: &'a str,
    pub negative_prompt: &'a str,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lora: Option<&'a str>,
}

/// Runs the external image-generation command and decodes its PNG output.
pub struct ImageGenerator {
    command: Vec<String>,
    runner: Arc<dyn ProcessRunner>,
    negative_prompt: String,
    lora: Option<String>,
    retry: RetryPolicy,
}

impl ImageGenerator {
    pub fn new(command: Vec<String>, runner: Arc<dyn ProcessRunner>, retry: RetryPolicy) -> Self {
        Self {
            command,
            runner,
            negative_prompt: String::new(),
            lora: None,
            retry,
        }
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    pub fn with_lora(mut self, lora: Option<String>) -> Self {
        self.lora = lora;
        self
    }

    /// Generate card art for `prompt`, resized to the art window.
    ///
    /// Failed attempts are retried according to the configured policy; once
    /// it is exhausted the last failure is returned inside
    /// [`GenerationError::RetriesExhausted`].
    pub async fn generate(&self, prompt: &str) -> Result<RgbaImage, GenerationError> {
        let payload = serde_json::to_vec(&ImageJob {
            prompt,
            negative_prompt: &self.negative_prompt,
            width: ART_WIDTH,
            height: ART_HEIGHT,
            lora: self.lora.as_deref(),
        })?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.attempt(payload.clone()).await {
                Ok(art) => {
                    if attempt > 1 {
                        info!(attempt, "Image generation succeeded after retry");
                    }
                    return Ok(art);
                }
                Err(err) => err,
            };

            match self.retry.decide(attempt) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        error = %err,
                        "Image generation failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    return Err(GenerationError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
            }
        }
    }

    async fn attempt(&self, payload: Vec<u8>) -> Result<RgbaImage, GenerationError> {
        let stdout = self.runner.run(&self.command, payload).await?;
        let decoded = image::load_from_memory(&stdout)?;
        if decoded.width() == ART_WIDTH && decoded.height() == ART_HEIGHT {
            return Ok(decoded.into_rgba8());
        }
        Ok(decoded
            .resize_exact(ART_WIDTH, ART_HEIGHT, FilterType::Lanczos3)
            .into_rgba8())
    }
}
