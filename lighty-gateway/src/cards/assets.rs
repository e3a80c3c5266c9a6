//! Templates, icons, foils, fonts and word lists under the assets directory.
//!
//! ```text
//! assets/
//!   templates/<card_type>.png
//!   icons/*.png
//!   foils/foil{1..5}.png, signature.png
//!   fonts/planewalker.otf, garamond*.ttf
//!   json/artist.json, type_creature.json, <kind>.json
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use lighty_core::{CardKind, CardType};
use rand::Rng;
use resvg::usvg;
use serde::Deserialize;
use tracing::{info, warn};

use super::ForgeError;
use super::layout::FontFace;

const FALLBACK_FAMILY: &str = "serif";

#[derive(Debug, Deserialize)]
struct ArtistEntry {
    prompt: String,
}

/// Font database used to rasterize card text.
pub struct FontBook {
    options: usvg::Options<'static>,
    families: HashMap<FontFace, String>,
}

impl FontBook {
    /// Load the card fonts from `dir`, falling back to a system serif face
    /// for any file that is missing or unreadable.
    pub fn load(dir: &Path) -> Self {
        let mut options = usvg::Options::default();
        let mut families = HashMap::new();
        {
            let db = options.fontdb_mut();
            db.load_system_fonts();

            for face in FontFace::ALL {
                let path = dir.join(face.file_name());
                let data = match fs::read(&path) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("Font {} unavailable ({}), using {}", path.display(), e, FALLBACK_FAMILY);
                        continue;
                    }
                };
                let ids = db.load_font_source(usvg::fontdb::Source::Binary(Arc::new(data)));
                let family = ids
                    .first()
                    .and_then(|id| db.face(*id))
                    .and_then(|info| info.families.first())
                    .map(|(name, _)| name.clone());
                match family {
                    Some(name) => {
                        families.insert(face, name);
                    }
                    None => warn!("Font {} has no family name", path.display()),
                }
            }
        }

        Self { options, families }
    }

    /// Fonts for tests and asset-less environments: system faces only.
    pub fn system() -> Self {
        let mut options = usvg::Options::default();
        options.fontdb_mut().load_system_fonts();
        Self {
            options,
            families: HashMap::new(),
        }
    }

    pub fn family(&self, face: FontFace) -> &str {
        self.families
            .get(&face)
            .map(String::as_str)
            .unwrap_or(FALLBACK_FAMILY)
    }

    /// `font-family` value for SVG text in `face`.
    pub fn css_family(&self, face: FontFace) -> String {
        match self.families.get(&face) {
            Some(name) => format!("'{}', {}", name.replace('\'', ""), FALLBACK_FAMILY),
            None => FALLBACK_FAMILY.to_string(),
        }
    }

    pub(crate) fn options(&self) -> &usvg::Options<'static> {
        &self.options
    }
}

/// Everything the forge reads from disk.
///
/// Word lists and fonts are read once at startup; images are opened on
/// demand since each card only touches a handful of them.
pub struct CardAssets {
    root: PathBuf,
    artists: Vec<String>,
    creature_types: Vec<String>,
    abilities: HashMap<CardKind, Vec<String>>,
    fonts: FontBook,
}

impl CardAssets {
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, ForgeError> {
        let root = root.into();
        let json = root.join("json");

        let artists: Vec<ArtistEntry> = read_list(&json.join("artist.json"))?;
        let artists = artists.into_iter().map(|entry| entry.prompt).collect();
        let creature_types = read_list(&json.join("type_creature.json"))?;

        let mut abilities = HashMap::new();
        for kind in CardKind::ALL {
            if let Some(list) = kind.ability_list() {
                let entries: Vec<String> = read_list(&json.join(format!("{}.json", list)))?;
                abilities.insert(kind, entries);
            }
        }

        let fonts = FontBook::load(&root.join("fonts"));
        info!(root = %root.display(), "Card assets loaded");

        Ok(Self {
            root,
            artists,
            creature_types,
            abilities,
            fonts,
        })
    }

    /// Assemble assets from parts already in memory.
    pub fn from_parts(
        root: impl Into<PathBuf>,
        artists: Vec<String>,
        creature_types: Vec<String>,
        abilities: HashMap<CardKind, Vec<String>>,
        fonts: FontBook,
    ) -> Self {
        Self {
            root: root.into(),
            artists,
            creature_types,
            abilities,
            fonts,
        }
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn random_artist<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String, ForgeError> {
        pick(&self.artists, "artist.json", rng)
    }

    pub fn random_creature_type<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String, ForgeError> {
        pick(&self.creature_types, "type_creature.json", rng)
    }

    /// Random rules text for `kind`; lands print none.
    pub fn random_ability<R: Rng + ?Sized>(
        &self,
        kind: CardKind,
        rng: &mut R,
    ) -> Result<Option<String>, ForgeError> {
        let Some(list) = kind.ability_list() else {
            return Ok(None);
        };
        let entries = self.abilities.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
        pick(entries, list, rng).map(Some)
    }

    pub fn template(&self, card_type: CardType) -> Result<RgbaImage, ForgeError> {
        self.open(&format!("templates/{}.png", card_type.template_name()))
    }

    pub fn icon(&self, name: &str) -> Result<RgbaImage, ForgeError> {
        self.open(&format!("icons/{}", name))
    }

    pub fn foil(&self, name: &str) -> Result<RgbaImage, ForgeError> {
        self.open(&format!("foils/{}", name))
    }

    fn open(&self, relative: &str) -> Result<RgbaImage, ForgeError> {
        let path = self.root.join(relative);
        image::open(&path)
            .map(|img| img.into_rgba8())
            .map_err(|source| ForgeError::Asset { path, source })
    }
}

fn read_list<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, ForgeError> {
    let content = fs::read_to_string(path).map_err(|source| ForgeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ForgeError::AssetList {
        path: path.to_path_buf(),
        source,
    })
}

fn pick<R: Rng + ?Sized>(entries: &[String], list: &str, rng: &mut R) -> Result<String, ForgeError> {
    if entries.is_empty() {
        return Err(ForgeError::EmptyList(list.to_string()));
    }
    Ok(entries[rng.gen_range(0..entries.len())].clone())
}
