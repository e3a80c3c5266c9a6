//! Card taxonomy: the kinds of cards the forge can produce and their colours.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Instant,
    Sorcery,
    Land,
    Creature,
    Artifact,
    Enchant,
}

impl CardKind {
    pub const ALL: [CardKind; 6] = [
        CardKind::Instant,
        CardKind::Sorcery,
        CardKind::Land,
        CardKind::Creature,
        CardKind::Artifact,
        CardKind::Enchant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardKind::Instant => "instant",
            CardKind::Sorcery => "sorcery",
            CardKind::Land => "land",
            CardKind::Creature => "creature",
            CardKind::Artifact => "artifact",
            CardKind::Enchant => "enchant",
        }
    }

    /// Colours a card of this kind may be printed in.
    pub fn colors(&self) -> &'static [CardColor] {
        use CardColor::*;
        match self {
            CardKind::Instant | CardKind::Sorcery | CardKind::Enchant => {
                &[Black, Blue, Green, Red, White]
            }
            CardKind::Land => &[Artifact, Black, Blue, Green, Red, White],
            CardKind::Creature => &[Artifact, Black, Blue, Gold, Green, Red, White],
            CardKind::Artifact => &[Artifact],
        }
    }

    /// Word used when asking the text generator for a title or flavor text.
    pub fn text_genre(&self) -> &'static str {
        match self {
            CardKind::Sorcery => "spell",
            other => other.as_str(),
        }
    }

    /// Name of the rules-text list under `assets/json/` (lands have none).
    pub fn ability_list(&self) -> Option<&'static str> {
        match self {
            CardKind::Land => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardColor {
    Artifact,
    Black,
    Blue,
    Gold,
    Green,
    Red,
    White,
}

impl CardColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardColor::Artifact => "artifact",
            CardColor::Black => "black",
            CardColor::Blue => "blue",
            CardColor::Gold => "gold",
            CardColor::Green => "green",
            CardColor::Red => "red",
            CardColor::White => "white",
        }
    }

    /// True for the five single-colour mana colours.
    pub fn is_basic(&self) -> bool {
        matches!(
            self,
            CardColor::Black | CardColor::Blue | CardColor::Green | CardColor::Red | CardColor::White
        )
    }
}

impl fmt::Display for CardColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete card type such as `blue_instant` or `artifact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardType {
    pub kind: CardKind,
    pub color: CardColor,
}

impl CardType {
    /// Build a card type, rejecting colours the kind is never printed in.
    pub fn new(kind: CardKind, color: CardColor) -> Option<Self> {
        kind.colors()
            .contains(&color)
            .then_some(Self { kind, color })
    }

    /// Asset name of the template (`assets/templates/<name>.png`).
    pub fn template_name(&self) -> String {
        match self.kind {
            CardKind::Artifact => "artifact".to_string(),
            kind => format!("{}_{}", self.color, kind),
        }
    }

    /// Every card type, in catalogue order.
    pub fn catalogue() -> impl Iterator<Item = CardType> {
        CardKind::ALL
            .into_iter()
            .flat_map(|kind| kind.colors().iter().map(move |&color| CardType { kind, color }))
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template_name())
    }
}

/// Draw a card kind uniformly, then a colour uniformly among that kind's colours.
pub fn choose_card_type<R: Rng + ?Sized>(rng: &mut R) -> CardType {
    let kind = CardKind::ALL[rng.gen_range(0..CardKind::ALL.len())];
    let colors = kind.colors();
    let color = colors[rng.gen_range(0..colors.len())];
    CardType { kind, color }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_catalogue_matches_template_names() {
        let names: Vec<String> = CardType::catalogue().map(|t| t.template_name()).collect();
        assert_eq!(names.len(), 29);
        assert!(names.contains(&"artifact".to_string()));
        assert!(names.contains(&"gold_creature".to_string()));
        assert!(names.contains(&"artifact_land".to_string()));
        assert!(names.contains(&"white_enchant".to_string()));
        assert!(!names.contains(&"gold_land".to_string()));
    }

    #[test]
    fn test_new_rejects_unprintable_combinations() {
        assert!(CardType::new(CardKind::Instant, CardColor::Gold).is_none());
        assert!(CardType::new(CardKind::Artifact, CardColor::Red).is_none());
        assert!(CardType::new(CardKind::Creature, CardColor::Gold).is_some());
    }

    #[test]
    fn test_choose_card_type_is_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let card_type = choose_card_type(&mut rng);
            assert!(card_type.kind.colors().contains(&card_type.color));
            assert_eq!(
                CardType::new(card_type.kind, card_type.color),
                Some(card_type)
            );
        }
    }

    #[test]
    fn test_choose_card_type_is_deterministic_for_seed() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        let left: Vec<CardType> = (0..50).map(|_| choose_card_type(&mut a)).collect();
        let right: Vec<CardType> = (0..50).map(|_| choose_card_type(&mut b)).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_choose_card_type_reaches_every_kind() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(choose_card_type(&mut rng).kind);
        }
        assert_eq!(seen.len(), CardKind::ALL.len());
    }

    #[test]
    fn test_text_genre() {
        assert_eq!(CardKind::Sorcery.text_genre(), "spell");
        assert_eq!(CardKind::Enchant.text_genre(), "enchant");
        assert_eq!(CardKind::Land.ability_list(), None);
    }
}
