use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use image::RgbaImage;
use lighty_core::{CardColor, CardKind, CardType, ChatTurn, Requester, choose_card_type};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::assets::CardAssets;
use super::layout::{FontFace, Placed, TextFlow, TextStyle};
use super::mana::{CreatureStats, LandMana, ManaCost, ManaRow, foil_texture, symbol_icon};
use super::render::{CardCanvas, Ink};
use super::{CardForge, ForgeError, ForgedCard, TITLE_MAX_CHARS};
use crate::generation::{ImageGenerator, TextGenerator};

const TITLE: TextStyle = TextStyle::new(FontFace::Title, 36.0);
const STATS: TextStyle = TextStyle::new(FontFace::Title, 44.0);
const TYPE_LINE: TextStyle = TextStyle::new(FontFace::Body, 36.0);
const ARTIST: TextStyle = TextStyle::new(FontFace::Body, 32.0);
const COPYRIGHT: TextStyle = TextStyle::new(FontFace::Body, 20.0);
const LAND_TEXT: TextStyle = TextStyle::new(FontFace::Body, 36.0);
const RULES: TextStyle = TextStyle::new(FontFace::Bullet, 36.0);
const FLAVOR: TextStyle = TextStyle::new(FontFace::Italic, 36.0);

const ART_ORIGIN: (i64, i64) = (88, 102);
const TITLE_ORIGIN: (i32, i32) = (56, 50);
const TYPE_ORIGIN: (i32, i32) = (86, 580);
const ARTIST_ORIGIN: (i32, i32) = (70, 940);
const COPYRIGHT_ORIGIN: (i32, i32) = (70, 973);
const STATS_ORIGIN: (i32, i32) = (620, 934);
const MANA_ROW_RIGHT: i64 = 676;
const MANA_ROW_TOP: i64 = 49;
const SET_ICON_ORIGIN: (i64, i64) = (619, 579);
const FOIL_ICON_ORIGIN: (i64, i64) = (600, 585);
const SIGNATURE_ORIGIN: (i64, i64) = (100, 590);
const LAND_ICON_ORIGIN: (i64, i64) = (392, 665);
const LAND_LINES: [(&str, i32, i32); 2] = [("Tap to add", 235, 668), ("to your mana pool.", 235, 713)];

const TEXT_BOX_LEFT: i32 = 94;
const TEXT_BOX_RIGHT: i32 = 659;
const RULES_TOP: i32 = 640;
const LAND_FLAVOR_TOP: i32 = 800;
/// Flavor text is dropped when the rules text already reaches below this line.
const FLAVOR_CUTOFF: i32 = 805;
const LINE_HEIGHT: i32 = 32;

const FOIL_ODDS: u32 = 50;
const SIGNATURE_ODDS: u32 = 100;

/// Everything about a card that is decided by chance, rolled before any
/// generator runs.
#[derive(Debug, Clone, PartialEq)]
pub struct CardSheet {
    pub card_type: CardType,
    pub cost: ManaCost,
    pub artist: String,
    pub creature_type: Option<String>,
    pub rules_text: Option<String>,
    pub mana_row: Option<ManaRow>,
    pub stats: Option<CreatureStats>,
    pub land: Option<LandMana>,
    pub foil: bool,
    pub signed: bool,
}

impl CardSheet {
    pub fn roll<R: Rng + ?Sized>(assets: &CardAssets, rng: &mut R) -> Result<Self, ForgeError> {
        let card_type = choose_card_type(rng);
        let cost = ManaCost::roll(rng);
        let is_land = card_type.kind == CardKind::Land;
        let is_creature = card_type.kind == CardKind::Creature;

        let creature_type = if is_creature {
            Some(assets.random_creature_type(rng)?)
        } else {
            None
        };

        Ok(Self {
            card_type,
            cost,
            artist: assets.random_artist(rng)?,
            creature_type,
            rules_text: assets.random_ability(card_type.kind, rng)?,
            mana_row: (!is_land).then(|| ManaRow::roll(card_type.color, cost, rng)),
            stats: is_creature.then(|| CreatureStats::roll(card_type.color, cost, rng)),
            land: is_land.then(|| LandMana::roll(card_type.color, rng)),
            foil: rng.gen_range(1..=FOIL_ODDS) == 1,
            signed: rng.gen_range(1..=SIGNATURE_ODDS) == 1,
        })
    }

    /// Text printed on the type line.
    pub fn type_line(&self) -> String {
        match self.card_type.kind {
            CardKind::Instant => "Instant".to_string(),
            CardKind::Sorcery => "Sorcery".to_string(),
            CardKind::Artifact => "Artifact".to_string(),
            CardKind::Enchant => "Enchantment".to_string(),
            CardKind::Creature => self.creature_type.clone().unwrap_or_default(),
            CardKind::Land => match &self.land {
                Some(land) if land.legendary => "Legendary Land".to_string(),
                _ => "Land".to_string(),
            },
        }
    }
}

/// Title and flavor prompt sets for one text-generation call.
pub fn card_text_prompts(kind: CardKind, prompt: &str) -> Vec<Vec<ChatTurn>> {
    let genre = kind.text_genre();
    vec![
        vec![
            ChatTurn::system(format!(
                "You create a new random Magic The Gathering {genre} card title based on the prompt. \
                 You respond with ONLY the title and it cannot be longer than {TITLE_MAX_CHARS} characters"
            )),
            ChatTurn::user(prompt),
        ],
        vec![
            ChatTurn::system(format!(
                "You create a new random Magic The Gathering {genre} card flavor text based on the prompt. \
                 You respond with ONLY the flavor text."
            )),
            ChatTurn::user(prompt),
        ],
    ]
}

/// Flatten a generated title to one line and cut it to the printable length.
pub fn clean_title(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .take(TITLE_MAX_CHARS)
        .collect()
}

/// Image-generation prompt for a card's artwork.
pub fn art_prompt(card_type: CardType, prompt: &str, artist: &str, title: &str) -> String {
    match card_type.kind {
        CardKind::Land => {
            let setting = match card_type.color {
                CardColor::Artifact => "in front of structure",
                CardColor::Black => "in a swamp",
                CardColor::Blue => "on a shore",
                CardColor::White => "in a large field. plains",
                CardColor::Green => "in a forest",
                CardColor::Red | CardColor::Gold => "in the mountains",
            };
            format!("{prompt} bald man {setting}. {artist}. beard")
        }
        CardKind::Creature => format!("{prompt} bald man. {artist}. {title}. beard."),
        CardKind::Artifact => {
            format!("bald man holding {prompt} artifact. {artist}. {title}. beard")
        }
        CardKind::Instant | CardKind::Sorcery | CardKind::Enchant => {
            format!("bald man casting {prompt}. {artist}. {title}. beard")
        }
    }
}

/// Words that end up on the card besides the rolled ones.
struct CardWords {
    title: String,
    flavor: String,
    owner: String,
    copyright: String,
}

/// The production forge: word lists and templates from disk, text and art
/// from the external generators.
pub struct TemplateForge {
    assets: Arc<CardAssets>,
    text: Arc<TextGenerator>,
    art: Arc<ImageGenerator>,
    copyright: String,
    rng: Mutex<StdRng>,
}

impl TemplateForge {
    pub fn new(
        assets: Arc<CardAssets>,
        text: Arc<TextGenerator>,
        art: Arc<ImageGenerator>,
        copyright: impl Into<String>,
    ) -> Self {
        Self {
            assets,
            text,
            art,
            copyright: copyright.into(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    fn roll_sheet(&self) -> Result<CardSheet, ForgeError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        CardSheet::roll(&self.assets, &mut *rng)
    }
}

#[async_trait]
impl CardForge for TemplateForge {
    async fn forge(&self, prompt: &str, requester: &Requester) -> Result<ForgedCard, ForgeError> {
        let sheet = self.roll_sheet()?;
        let card_type = sheet.card_type;
        debug!(card_type = %card_type, "Card rolled");

        let template = self.assets.template(card_type)?;

        let text = self
            .text
            .generate(&card_text_prompts(card_type.kind, prompt))
            .await?;
        let title = clean_title(text.get(1)?);
        let flavor = text.get(2)?.to_string();

        let art = self
            .art
            .generate(&art_prompt(card_type, prompt, &sheet.artist, &title))
            .await?;

        let assets = Arc::clone(&self.assets);
        let words = CardWords {
            title: title.clone(),
            flavor,
            owner: requester.name.clone(),
            copyright: self.copyright.clone(),
        };
        let image =
            tokio::task::spawn_blocking(move || compose(&assets, &sheet, template, &art, &words))
                .await??;

        info!(user = %requester, card_type = %card_type, title = %title, "Card forged");
        Ok(ForgedCard {
            image,
            card_type,
            title,
        })
    }
}

fn compose(
    assets: &CardAssets,
    sheet: &CardSheet,
    template: RgbaImage,
    art: &RgbaImage,
    words: &CardWords,
) -> Result<RgbaImage, ForgeError> {
    let mut canvas = CardCanvas::new(template);
    canvas.replace(art, ART_ORIGIN.0, ART_ORIGIN.1);

    if sheet.foil {
        canvas.soft_light(&assets.foil(foil_texture(sheet.card_type.color))?);
        canvas.overlay(&assets.icon("foilicon.png")?, FOIL_ICON_ORIGIN.0, FOIL_ICON_ORIGIN.1);
    } else {
        canvas.overlay(&assets.icon("set_icon.png")?, SET_ICON_ORIGIN.0, SET_ICON_ORIGIN.1);
    }

    canvas.shadowed_text(&*words.title, TITLE_ORIGIN.0, TITLE_ORIGIN.1, TITLE);
    canvas.shadowed_text(
        format!("Illus. {}", sheet.artist),
        ARTIST_ORIGIN.0,
        ARTIST_ORIGIN.1,
        ARTIST,
    );
    canvas.shadowed_text(
        format!("© 1994 {} - {}.", words.owner, words.copyright),
        COPYRIGHT_ORIGIN.0,
        COPYRIGHT_ORIGIN.1,
        COPYRIGHT,
    );

    if let Some(stats) = sheet.stats {
        canvas.shadowed_text(stats.label(), STATS_ORIGIN.0, STATS_ORIGIN.1, STATS);
    }

    if let Some(row) = &sheet.mana_row {
        let row = mana_row_image(assets, row)?;
        canvas.overlay(&row, MANA_ROW_RIGHT - row.width() as i64, MANA_ROW_TOP);
    }

    if let Some(land) = &sheet.land {
        for (line, x, y) in LAND_LINES {
            canvas.text(line, x, y, LAND_TEXT, Ink::Black);
        }
        canvas.overlay(&assets.icon(&land.icon)?, LAND_ICON_ORIGIN.0, LAND_ICON_ORIGIN.1);

        let mut flow = TextFlow::new(TEXT_BOX_LEFT, LAND_FLAVOR_TOP, TEXT_BOX_RIGHT, LINE_HEIGHT);
        flow.paragraph(&words.flavor, FLAVOR, |_, _| false);
        place(&mut canvas, flow, &HashMap::new());
    }

    canvas.shadowed_text(sheet.type_line(), TYPE_ORIGIN.0, TYPE_ORIGIN.1, TYPE_LINE);

    if let Some(rules) = &sheet.rules_text {
        let mut icons: HashMap<String, RgbaImage> = HashMap::new();
        let mut failure = None;
        let mut flow = TextFlow::new(TEXT_BOX_LEFT, RULES_TOP, TEXT_BOX_RIGHT, LINE_HEIGHT);
        flow.paragraph(rules, RULES, |flow, symbol| {
            let Some(name) = symbol_icon(symbol) else {
                return false;
            };
            if !icons.contains_key(&name) {
                match assets.icon(&name) {
                    Ok(icon) => {
                        icons.insert(name.clone(), icon);
                    }
                    Err(e) => {
                        failure.get_or_insert(e);
                        return true;
                    }
                }
            }
            if let Some(icon) = icons.get(&name) {
                let (width, height) = icon.dimensions();
                flow.icon(name, width, height);
            }
            true
        });
        if let Some(err) = failure {
            return Err(err);
        }

        flow.line_break();
        if flow.y() <= FLAVOR_CUTOFF {
            flow.paragraph(&words.flavor, FLAVOR, |_, _| false);
        }
        place(&mut canvas, flow, &icons);
    }

    canvas.draw_text(assets.fonts())?;

    if sheet.signed {
        canvas.overlay(
            &assets.foil("signature.png")?,
            SIGNATURE_ORIGIN.0,
            SIGNATURE_ORIGIN.1,
        );
    }

    Ok(canvas.into_image())
}

/// Move a finished flow onto the canvas: words as black text, icons pasted.
fn place(canvas: &mut CardCanvas, flow: TextFlow, icons: &HashMap<String, RgbaImage>) {
    for item in flow.into_items() {
        match item {
            Placed::Text { text, x, y, style } => canvas.text(text, x, y, style, Ink::Black),
            Placed::Icon { icon, x, y } => {
                if let Some(image) = icons.get(&icon) {
                    canvas.overlay(image, x as i64, y as i64);
                }
            }
        }
    }
}

fn mana_row_image(assets: &CardAssets, row: &ManaRow) -> Result<RgbaImage, ForgeError> {
    let unit = assets.icon(&row.unit_icon)?;
    let (unit_width, unit_height) = unit.dimensions();
    let mut combined = RgbaImage::new(unit_width * row.slots.len() as u32, unit_height);
    for (index, slot) in row.slots.iter().enumerate() {
        if let Some(name) = slot {
            let icon = if *name == row.unit_icon {
                unit.clone()
            } else {
                assets.icon(name)?
            };
            image::imageops::overlay(&mut combined, &icon, index as i64 * unit_width as i64, 0);
        }
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::FontBook;
    use lighty_core::ChatRole;

    fn word_list_assets() -> CardAssets {
        let mut abilities = HashMap::new();
        for kind in CardKind::ALL {
            if kind.ability_list().is_some() {
                abilities.insert(kind, vec!["{T}: Draw a card.".to_string()]);
            }
        }
        CardAssets::from_parts(
            "assets",
            vec!["by Goya".to_string()],
            vec!["Goat Knight".to_string()],
            abilities,
            FontBook::system(),
        )
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Goat\nKing"), "Goat King");
        assert_eq!(
            clean_title("The Extremely Long Title Of Goats"),
            "The Extremely Long Title "
        );
        assert_eq!(clean_title("Ünïcödé\r\nGoat").chars().count(), 13);
    }

    #[test]
    fn test_text_prompts_use_genre() {
        let sets = card_text_prompts(CardKind::Sorcery, "a goat");
        assert_eq!(sets.len(), 2);
        assert!(sets[0][0].content.contains("Gathering spell card title"));
        assert!(sets[0][0].content.contains("25 characters"));
        assert!(sets[1][0].content.contains("spell card flavor text"));
        assert_eq!(sets[1][1].role, ChatRole::User);
        assert_eq!(sets[1][1].content, "a goat");
    }

    #[test]
    fn test_art_prompts() {
        let blue_land = CardType::new(CardKind::Land, CardColor::Blue).unwrap();
        assert_eq!(
            art_prompt(blue_land, "goat", "by Goya", "Isle"),
            "goat bald man on a shore. by Goya. beard"
        );
        let creature = CardType::new(CardKind::Creature, CardColor::Gold).unwrap();
        assert_eq!(
            art_prompt(creature, "goat", "by Goya", "Goat Lord"),
            "goat bald man. by Goya. Goat Lord. beard."
        );
        let artifact = CardType::new(CardKind::Artifact, CardColor::Artifact).unwrap();
        assert_eq!(
            art_prompt(artifact, "horn", "by Goya", "Horn"),
            "bald man holding horn artifact. by Goya. Horn. beard"
        );
        let instant = CardType::new(CardKind::Instant, CardColor::Red).unwrap();
        assert_eq!(
            art_prompt(instant, "fire", "by Goya", "Burn"),
            "bald man casting fire. by Goya. Burn. beard"
        );
    }

    #[test]
    fn test_sheet_matches_card_kind() {
        let assets = word_list_assets();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..300 {
            let sheet = CardSheet::roll(&assets, &mut rng).unwrap();
            let kind = sheet.card_type.kind;
            assert_eq!(sheet.land.is_some(), kind == CardKind::Land);
            assert_eq!(sheet.mana_row.is_some(), kind != CardKind::Land);
            assert_eq!(sheet.rules_text.is_some(), kind != CardKind::Land);
            assert_eq!(sheet.stats.is_some(), kind == CardKind::Creature);
            assert_eq!(sheet.creature_type.is_some(), kind == CardKind::Creature);
            if kind == CardKind::Creature {
                assert_eq!(sheet.type_line(), "Goat Knight");
            }
            if kind == CardKind::Enchant {
                assert_eq!(sheet.type_line(), "Enchantment");
            }
        }
    }

    #[test]
    fn test_land_type_line() {
        let assets = word_list_assets();
        let mut rng = StdRng::seed_from_u64(1);
        let mut sheet = loop {
            let sheet = CardSheet::roll(&assets, &mut rng).unwrap();
            if sheet.card_type.kind == CardKind::Land {
                break sheet;
            }
        };
        sheet.land = Some(LandMana {
            icon: "2greenmana.png".to_string(),
            legendary: true,
        });
        assert_eq!(sheet.type_line(), "Legendary Land");
        sheet.land = Some(LandMana {
            icon: "greenmana.png".to_string(),
            legendary: false,
        });
        assert_eq!(sheet.type_line(), "Land");
    }
}
