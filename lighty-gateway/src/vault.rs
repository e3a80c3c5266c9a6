//! Persistent WebP copies of every card, grouped per user.
//!
//! ```text
//! users/<name>/<card_type>.<prompt[..20]>.<n>.webp
//! users/<name>/<YYYYmmddHHMMSS>/card{1,2,3}.webp
//! ```

use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use tracing::debug;

use crate::cards::ForgedCard;

const PROMPT_STEM_CHARS: usize = 20;
const MAX_SUFFIX: u32 = 99_999_999;

static UNSAFE_PATH_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("path regex"));

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Cannot create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Vault task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait CardVault: Send + Sync {
    /// Keep a card under its owner's prompt-derived name.
    async fn store_card(
        &self,
        owner: &str,
        prompt: &str,
        card: &ForgedCard,
    ) -> Result<PathBuf, VaultError>;

    /// Keep a card as `card<index>` of the pack opened at `stamp`.
    async fn store_pack_card(
        &self,
        owner: &str,
        stamp: &str,
        index: usize,
        card: &ForgedCard,
    ) -> Result<PathBuf, VaultError>;
}

/// Drop characters that are not allowed in file names, then cut to
/// `max_chars`.
pub fn sanitize_file_stem(raw: &str, max_chars: usize) -> String {
    UNSAFE_PATH_CHARS
        .replace_all(raw, "")
        .chars()
        .take(max_chars)
        .collect()
}

/// Vault rooted at a directory on the local filesystem.
pub struct FsCardVault {
    root: PathBuf,
    rng: Mutex<StdRng>,
}

impl FsCardVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner: &str) -> PathBuf {
        let owner = sanitize_file_stem(owner, usize::MAX);
        let owner = if owner.is_empty() || owner == "." || owner == ".." {
            "_".to_string()
        } else {
            owner
        };
        self.root.join(owner)
    }

    async fn write(&self, path: PathBuf, card: &ForgedCard) -> Result<PathBuf, VaultError> {
        let image = card.image.clone();
        let path = tokio::task::spawn_blocking(move || write_webp(path, image)).await??;
        debug!(path = %path.display(), "Card stored");
        Ok(path)
    }
}

fn write_webp(path: PathBuf, image: image::RgbaImage) -> Result<PathBuf, VaultError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| VaultError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    DynamicImage::ImageRgba8(image)
        .save_with_format(&path, ImageFormat::WebP)
        .map_err(|source| VaultError::Write {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[async_trait]
impl CardVault for FsCardVault {
    async fn store_card(
        &self,
        owner: &str,
        prompt: &str,
        card: &ForgedCard,
    ) -> Result<PathBuf, VaultError> {
        let suffix = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(1..=MAX_SUFFIX);
        let file_name = format!(
            "{}.{}.{}.webp",
            card.card_type,
            sanitize_file_stem(prompt, PROMPT_STEM_CHARS),
            suffix
        );
        self.write(self.owner_dir(owner).join(file_name), card).await
    }

    async fn store_pack_card(
        &self,
        owner: &str,
        stamp: &str,
        index: usize,
        card: &ForgedCard,
    ) -> Result<PathBuf, VaultError> {
        let path = self
            .owner_dir(owner)
            .join(sanitize_file_stem(stamp, usize::MAX))
            .join(format!("card{}.webp", index));
        self.write(path, card).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use lighty_core::{CardColor, CardKind, CardType};

    fn card() -> ForgedCard {
        ForgedCard {
            image: RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255])),
            card_type: CardType::new(CardKind::Instant, CardColor::Red).unwrap(),
            title: "Goat Bolt".to_string(),
        }
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("a/b:c*d?", 20), "abcd");
        assert_eq!(
            sanitize_file_stem("a goat wearing a very tall hat", 20),
            "a goat wearing a ver"
        );
        assert_eq!(sanitize_file_stem("tab\there", 20), "tabhere");
        assert_eq!(sanitize_file_stem("<<<<<abcdefghijklmnopqrstuvwxyz", 3), "abc");
    }

    #[tokio::test]
    async fn test_store_card_path() {
        let dir = tempfile::tempdir().unwrap();
        let vault = FsCardVault::new(dir.path()).with_rng(StdRng::seed_from_u64(3));

        let path = vault.store_card("goatfan", "goat: king", &card()).await.unwrap();

        assert!(path.starts_with(dir.path().join("goatfan")));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("red_instant.goat king."), "{name}");
        assert!(name.ends_with(".webp"));
        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), 8);
    }

    #[tokio::test]
    async fn test_store_pack_card_path() {
        let dir = tempfile::tempdir().unwrap();
        let vault = FsCardVault::new(dir.path());

        let path = vault
            .store_pack_card("goatfan", "20240101120000", 2, &card())
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("goatfan/20240101120000/card2.webp"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_owner_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let vault = FsCardVault::new(dir.path());

        let path = vault.store_pack_card("..", "1", 1, &card()).await.unwrap();
        assert!(path.starts_with(dir.path()));

        let path = vault.store_card("../../x", "p", &card()).await.unwrap();
        assert!(path.starts_with(dir.path().join("....x")));
    }
}
