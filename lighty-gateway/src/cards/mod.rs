//! Trading-card forge: rolls a card, asks the generators for its words and
//! artwork, and composites everything onto the card template.

mod assets;
mod forge;
mod layout;
mod mana;
mod render;

use std::path::PathBuf;

use async_trait::async_trait;
use image::RgbaImage;
use lighty_core::{CardType, Requester};

use crate::generation::GenerationError;

pub use assets::{CardAssets, FontBook};
pub use forge::{CardSheet, TemplateForge, art_prompt, card_text_prompts, clean_title};
pub use layout::{FontFace, Placed, TextFlow, TextStyle, Token, tokenize};
pub use mana::{CreatureStats, LandMana, ManaCost, ManaRow, foil_texture, symbol_icon};
pub use render::{CardCanvas, Ink, TextSpan, text_layer_svg};

/// Maximum length of a printed card title, in characters.
pub const TITLE_MAX_CHARS: usize = 25;

/// A finished card, owned by the job that asked for it.
#[derive(Debug, Clone)]
pub struct ForgedCard {
    pub image: RgbaImage,
    pub card_type: CardType,
    pub title: String,
}

/// Builds one card for a prompt.
#[async_trait]
pub trait CardForge: Send + Sync {
    async fn forge(&self, prompt: &str, requester: &Requester) -> Result<ForgedCard, ForgeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Cannot open asset {path}: {source}")]
    Asset {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid asset list {path}: {source}")]
    AssetList {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Asset list {0} is empty")]
    EmptyList(String),

    #[error("Text rendering failed: {0}")]
    Render(String),

    #[error("Compositing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
