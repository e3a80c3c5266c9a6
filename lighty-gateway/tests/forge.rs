use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use lighty_core::{CardType, Requester};
use rand::SeedableRng;
use rand::rngs::StdRng;

use lighty_gateway::cards::{CardAssets, CardForge, ForgeError, TemplateForge};
use lighty_gateway::generation::{
    GenerationError, ImageGenerator, ProcessRunner, RetryPolicy, TextGenerator,
};

const CARD_WIDTH: u32 = 744;
const CARD_HEIGHT: u32 = 1039;

const COLORS: [&str; 7] = ["artifact", "black", "blue", "gold", "green", "red", "white"];

fn save(path: &Path, width: u32, height: u32, color: [u8; 4]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(width, height, Rgba(color))
        .save(path)
        .unwrap();
}

fn write_json(path: &Path, value: serde_json::Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
}

/// Lay out a complete, if plain, asset directory.
fn build_assets(root: &Path) {
    for card_type in CardType::catalogue() {
        save(
            &root.join(format!("templates/{}.png", card_type.template_name())),
            CARD_WIDTH,
            CARD_HEIGHT,
            [230, 220, 200, 255],
        );
    }

    let icons = root.join("icons");
    for n in 0..=8 {
        save(&icons.join(format!("{n}mana.png")), 32, 32, [150, 150, 150, 255]);
        save(&icons.join(format!("{n}_mana_small.png")), 24, 24, [150, 150, 150, 255]);
    }
    for color in COLORS {
        save(&icons.join(format!("{color}mana.png")), 32, 32, [20, 20, 200, 255]);
        save(&icons.join(format!("{color}_mana_small.png")), 24, 24, [20, 20, 200, 255]);
        for n in 1..=4 {
            save(&icons.join(format!("{n}{color}mana.png")), 64, 32, [20, 200, 20, 255]);
        }
    }
    for name in ["tap.png", "x_mana_small.png"] {
        save(&icons.join(name), 24, 24, [0, 0, 0, 255]);
    }
    for name in ["set_icon.png", "foilicon.png"] {
        save(&icons.join(name), 40, 40, [255, 215, 0, 255]);
    }

    let foils = root.join("foils");
    for n in 1..=5 {
        save(&foils.join(format!("foil{n}.png")), CARD_WIDTH, CARD_HEIGHT, [180, 120, 255, 255]);
    }
    save(&foils.join("signature.png"), 200, 80, [0, 0, 0, 200]);

    let json = root.join("json");
    write_json(
        &json.join("artist.json"),
        serde_json::json!([
            {"prompt": "by Rembrandt"},
            {"prompt": "by Moebius"},
        ]),
    );
    write_json(
        &json.join("type_creature.json"),
        serde_json::json!(["Creature - Goat", "Creature - Goat Wizard"]),
    );
    for list in ["instant", "sorcery", "creature", "artifact", "enchant"] {
        write_json(
            &json.join(format!("{list}.json")),
            serde_json::json!([
                "{T}: Add {G}. Draw a card.",
                "{2}{R}, {X}: Deal X damage to any target.",
                "Pay {C}: nothing happens.",
            ]),
        );
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    RgbaImage::from_pixel(width, height, Rgba([90, 40, 10, 255]))
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// Plays both generators: text commands get canned JSON, image commands get
/// a PNG after `image_failures` failed runs.
struct FakeGenerators {
    image_failures: Mutex<u32>,
    image_calls: Mutex<u32>,
    text_calls: Mutex<Vec<serde_json::Value>>,
}

impl FakeGenerators {
    fn new(image_failures: u32) -> Self {
        Self {
            image_failures: Mutex::new(image_failures),
            image_calls: Mutex::new(0),
            text_calls: Mutex::new(Vec::new()),
        }
    }

    fn image_calls(&self) -> u32 {
        *self.image_calls.lock().unwrap()
    }
}

#[async_trait]
impl ProcessRunner for FakeGenerators {
    async fn run(&self, command: &[String], stdin: Vec<u8>) -> Result<Vec<u8>, GenerationError> {
        match command.first().map(String::as_str) {
            Some("text-gen") => {
                self.text_calls
                    .lock()
                    .unwrap()
                    .push(serde_json::from_slice(&stdin).unwrap());
                Ok(serde_json::to_vec(&serde_json::json!({
                    "prompt1": "The Goat King\nof old",
                    "prompt2": "It ate the throne, then the crown.",
                }))
                .unwrap())
            }
            Some("image-gen") => {
                *self.image_calls.lock().unwrap() += 1;
                let mut failures = self.image_failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(GenerationError::Exit {
                        code: Some(1),
                        stderr: "CUDA out of memory".to_string(),
                    });
                }
                Ok(png(64, 48))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}

fn forge_with(
    root: &Path,
    runner: Arc<FakeGenerators>,
    retry: RetryPolicy,
    seed: u64,
) -> TemplateForge {
    let assets = Arc::new(CardAssets::load(root).unwrap());
    let text = Arc::new(TextGenerator::new(vec!["text-gen".to_string()], runner.clone()));
    let art = Arc::new(ImageGenerator::new(
        vec!["image-gen".to_string()],
        runner,
        retry,
    ));
    TemplateForge::new(assets, text, art, "Lighty").with_rng(StdRng::seed_from_u64(seed))
}

#[tokio::test]
async fn test_forges_cards_of_every_shape() {
    let dir = tempfile::tempdir().unwrap();
    build_assets(dir.path());
    let runner = Arc::new(FakeGenerators::new(0));
    let forge = forge_with(
        dir.path(),
        runner.clone(),
        RetryPolicy::new(1, Duration::from_millis(1), 1.0),
        7,
    );
    let requester = Requester::discord(1, "alice");

    let mut seen = Vec::new();
    for _ in 0..12 {
        let card = forge.forge("a goat", &requester).await.unwrap();
        assert_eq!(card.image.dimensions(), (CARD_WIDTH, CARD_HEIGHT));
        assert_eq!(card.title, "The Goat King of old");
        seen.push(card.card_type);
    }
    assert_eq!(runner.image_calls(), 12);

    // One text run per card, carrying the title and flavor prompt sets
    let text_calls = runner.text_calls.lock().unwrap();
    assert_eq!(text_calls.len(), 12);
    assert_eq!(text_calls[0]["prompt_sets"].as_array().unwrap().len(), 2);
    assert!(text_calls[0].to_string().contains("a goat"));

    // Seeded rolls cover more than one card type
    seen.sort_by_key(|t| t.template_name());
    seen.dedup();
    assert!(seen.len() > 1, "{seen:?}");
}

#[tokio::test]
async fn test_art_is_retried_until_it_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    build_assets(dir.path());
    let runner = Arc::new(FakeGenerators::new(3));
    let forge = forge_with(
        dir.path(),
        runner.clone(),
        RetryPolicy::new(5, Duration::from_millis(1), 2.0),
        11,
    );

    let card = forge
        .forge("a goat", &Requester::twitch_relay("viewer42"))
        .await
        .unwrap();

    assert_eq!(card.image.dimensions(), (CARD_WIDTH, CARD_HEIGHT));
    assert_eq!(runner.image_calls(), 4);
}

#[tokio::test]
async fn test_art_failure_surfaces_after_last_attempt() {
    let dir = tempfile::tempdir().unwrap();
    build_assets(dir.path());
    let runner = Arc::new(FakeGenerators::new(10));
    let forge = forge_with(
        dir.path(),
        runner.clone(),
        RetryPolicy::new(2, Duration::from_millis(1), 2.0),
        3,
    );

    let err = forge
        .forge("a goat", &Requester::discord(1, "alice"))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            ForgeError::Generation(GenerationError::RetriesExhausted { attempts: 2, .. })
        ),
        "{err}"
    );
    assert_eq!(runner.image_calls(), 2);
}

#[tokio::test]
async fn test_missing_template_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    build_assets(dir.path());
    std::fs::remove_dir_all(dir.path().join("templates")).unwrap();
    let runner = Arc::new(FakeGenerators::new(0));
    let forge = forge_with(dir.path(), runner.clone(), RetryPolicy::default(), 5);

    let err = forge
        .forge("a goat", &Requester::discord(1, "alice"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::Asset { .. }), "{err}");
    assert!(err.to_string().contains("templates"), "{err}");
    assert_eq!(runner.image_calls(), 0);
}
