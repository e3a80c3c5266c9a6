//! Mana cost, creature stats and the icons that print them.

use lighty_core::CardColor;
use rand::Rng;

/// Icons drawn at random for each pip of a gold card.
const GOLD_PIPS: [&str; 5] = [
    "redmana.png",
    "blackmana.png",
    "whitemana.png",
    "greenmana.png",
    "bluemana.png",
];

/// Rolled mana cost: `primary` coloured pips plus `secondary` generic mana.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManaCost {
    pub primary: u32,
    pub secondary: u32,
}

impl ManaCost {
    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            primary: rng.gen_range(1..=4),
            secondary: rng.gen_range(0..=4),
        }
    }

    pub fn total(&self) -> u32 {
        self.primary + self.secondary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatureStats {
    pub attack: u32,
    pub defense: u32,
}

impl CreatureStats {
    /// Roll power and toughness from the card's cost.
    ///
    /// Gold creatures scale with twice the primary cost. Every other colour
    /// gets toughness of at least half the total cost (minimum 1) and
    /// attack strictly below the total.
    pub fn roll<R: Rng + ?Sized>(color: CardColor, cost: ManaCost, rng: &mut R) -> Self {
        if color == CardColor::Gold {
            let cap = cost.primary * 2;
            return Self {
                defense: rng.gen_range(1..cap),
                attack: rng.gen_range(0..cap),
            };
        }

        let total = cost.total();
        let min_defense = (total / 2).max(1);
        let defense = if min_defense >= total {
            total
        } else {
            rng.gen_range(min_defense..total)
        };
        Self {
            defense,
            attack: rng.gen_range(0..total),
        }
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.attack, self.defense)
    }
}

/// Icons of the mana cost row, left to right, relative to `assets/icons/`.
///
/// Every slot has the width of `unit_icon`; `None` slots stay transparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManaRow {
    pub unit_icon: String,
    pub slots: Vec<Option<String>>,
}

impl ManaRow {
    pub fn roll<R: Rng + ?Sized>(color: CardColor, cost: ManaCost, rng: &mut R) -> Self {
        let generic = format!("{}mana.png", cost.secondary);

        if color == CardColor::Artifact {
            let total = format!("{}mana.png", cost.total());
            return Self {
                unit_icon: total.clone(),
                slots: vec![Some(total)],
            };
        }

        let show_generic = rng.gen_range(0..=2) == 1 && cost.secondary >= 1;
        let mut slots = Vec::with_capacity(cost.primary as usize + 1);
        slots.push(show_generic.then(|| generic.clone()));

        let unit_icon = if color == CardColor::Gold {
            for _ in 0..cost.primary {
                let pip = GOLD_PIPS[rng.gen_range(0..GOLD_PIPS.len())];
                slots.push(Some(pip.to_string()));
            }
            generic
        } else {
            let pip = format!("{}mana.png", color);
            slots.extend((0..cost.primary).map(|_| Some(pip.clone())));
            pip
        };

        Self { unit_icon, slots }
    }
}

/// Mana icon printed in a land's "Tap to add" box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandMana {
    pub icon: String,
    pub legendary: bool,
}

impl LandMana {
    /// One land in ten is legendary and taps for more than one mana.
    pub fn roll<R: Rng + ?Sized>(color: CardColor, rng: &mut R) -> Self {
        let legendary = rng.gen_range(1..=10) == 1;
        let icon = match (color, legendary) {
            (CardColor::Artifact, true) => format!("{}mana.png", rng.gen_range(2..=4)),
            (CardColor::Artifact, false) => "1mana.png".to_string(),
            (color, true) => format!("{}{}mana.png", rng.gen_range(1..=4), color),
            (color, false) => format!("{}mana.png", color),
        };
        Self { icon, legendary }
    }
}

/// Small icon for an inline `{X}` rules-text symbol.
pub fn symbol_icon(symbol: char) -> Option<String> {
    let icon = match symbol.to_ascii_uppercase() {
        'W' => "white_mana_small.png".to_string(),
        'U' => "blue_mana_small.png".to_string(),
        'B' => "black_mana_small.png".to_string(),
        'R' => "red_mana_small.png".to_string(),
        'G' => "green_mana_small.png".to_string(),
        'T' => "tap.png".to_string(),
        'X' => "x_mana_small.png".to_string(),
        digit @ '0'..='9' => format!("{}_mana_small.png", digit),
        _ => return None,
    };
    Some(icon)
}

/// Foil texture laid over a card of `color`.
pub fn foil_texture(color: CardColor) -> &'static str {
    match color {
        CardColor::Artifact | CardColor::Black | CardColor::Green => "foil1.png",
        CardColor::Blue => "foil2.png",
        CardColor::Gold => "foil3.png",
        CardColor::Red => "foil4.png",
        CardColor::White => "foil5.png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const ALL_COLORS: [CardColor; 7] = [
        CardColor::Artifact,
        CardColor::Black,
        CardColor::Blue,
        CardColor::Gold,
        CardColor::Green,
        CardColor::Red,
        CardColor::White,
    ];

    #[test]
    fn test_cost_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1_000 {
            let cost = ManaCost::roll(&mut rng);
            assert!((1..=4).contains(&cost.primary));
            assert!(cost.secondary <= 4);
        }
    }

    #[test]
    fn test_stats_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..2_000 {
            let cost = ManaCost::roll(&mut rng);
            for color in ALL_COLORS {
                let stats = CreatureStats::roll(color, cost, &mut rng);
                if color == CardColor::Gold {
                    assert!(stats.defense >= 1 && stats.defense < cost.primary * 2);
                    assert!(stats.attack < cost.primary * 2);
                } else {
                    let total = cost.total();
                    assert!(stats.defense >= (total / 2).max(1));
                    assert!(stats.defense <= total);
                    assert!(stats.attack < total);
                }
            }
        }
    }

    #[test]
    fn test_single_mana_creature_has_fixed_toughness() {
        let mut rng = StdRng::seed_from_u64(5);
        let cost = ManaCost {
            primary: 1,
            secondary: 0,
        };
        let stats = CreatureStats::roll(CardColor::Red, cost, &mut rng);
        assert_eq!(stats, CreatureStats { attack: 0, defense: 1 });
        assert_eq!(stats.label(), "0/1");
    }

    #[test]
    fn test_artifact_row_is_single_total_icon() {
        let mut rng = StdRng::seed_from_u64(1);
        let cost = ManaCost {
            primary: 2,
            secondary: 3,
        };
        let row = ManaRow::roll(CardColor::Artifact, cost, &mut rng);
        assert_eq!(row.slots, vec![Some("5mana.png".to_string())]);
    }

    #[test]
    fn test_basic_row_layout() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let cost = ManaCost::roll(&mut rng);
            let row = ManaRow::roll(CardColor::Blue, cost, &mut rng);
            assert_eq!(row.unit_icon, "bluemana.png");
            assert_eq!(row.slots.len(), cost.primary as usize + 1);
            assert!(row.slots[1..].iter().all(|s| s.as_deref() == Some("bluemana.png")));
            if let Some(generic) = &row.slots[0] {
                assert_eq!(generic, &format!("{}mana.png", cost.secondary));
                assert!(cost.secondary >= 1);
            }
        }
    }

    #[test]
    fn test_gold_row_uses_colour_pips() {
        let mut rng = StdRng::seed_from_u64(21);
        let cost = ManaCost {
            primary: 4,
            secondary: 0,
        };
        let row = ManaRow::roll(CardColor::Gold, cost, &mut rng);
        assert_eq!(row.slots[0], None);
        for slot in &row.slots[1..] {
            assert!(GOLD_PIPS.contains(&slot.as_deref().unwrap()));
        }
    }

    #[test]
    fn test_land_icons() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut saw_legendary = false;
        for _ in 0..500 {
            let land = LandMana::roll(CardColor::Green, &mut rng);
            if land.legendary {
                saw_legendary = true;
                assert!(land.icon.ends_with("greenmana.png"));
                assert_ne!(land.icon, "greenmana.png");
            } else {
                assert_eq!(land.icon, "greenmana.png");
            }
        }
        assert!(saw_legendary);
    }

    #[test]
    fn test_symbol_icons() {
        assert_eq!(symbol_icon('T').as_deref(), Some("tap.png"));
        assert_eq!(symbol_icon('u').as_deref(), Some("blue_mana_small.png"));
        assert_eq!(symbol_icon('7').as_deref(), Some("7_mana_small.png"));
        assert_eq!(symbol_icon('C'), None);
    }
}
