//! Invokers for the external text and image generation processes.
//!
//! Each call spawns the configured command, writes a JSON job to its stdin
//! and reads the result from its stdout. Nothing is exchanged through shared
//! files, so two calls can never observe each other's output.

mod image;
mod retry;
mod runner;
mod text;

use std::time::Duration;

pub use image::{ART_HEIGHT, ART_WIDTH, ImageGenerator, ImageJob};
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::{ProcessRunner, TokioProcessRunner};
pub use text::{GeneratedText, TextGenerator};

/// Errors raised while running a generation process
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation command is empty")]
    EmptyCommand,

    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error while talking to generator: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generator exited with code {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("Generator did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Invalid generator JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generator output is missing `{0}`")]
    MissingOutput(String),

    #[error("Generator returned an unreadable image: {0}")]
    Image(#[from] ::image::ImageError),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<GenerationError>,
    },
}
