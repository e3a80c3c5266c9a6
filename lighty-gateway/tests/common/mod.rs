//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use lighty_core::{CardColor, CardKind, CardType, ChannelRef, Requester};
use tokio::sync::Semaphore;

use lighty_gateway::cards::{CardForge, ForgeError, ForgedCard};
use lighty_gateway::chat::ChatResponder;
use lighty_gateway::generation::GenerationError;
use lighty_gateway::outbox::{Attachment, Outbox, OutboxError, PostedMessage};
use lighty_gateway::vault::{CardVault, VaultError};
use lighty_gateway::{Dispatcher, Pipeline};

pub const PACK_VIEWER: &str = "http://cards.example.net/cardflip.html";

/// Forge that returns a tiny card, or fails for prompts containing "fail".
///
/// With a gate, every call waits for a permit first.
pub struct FakeForge {
    pub prompts: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeForge {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            gate: Some(gate),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CardForge for FakeForge {
    async fn forge(&self, prompt: &str, _requester: &Requester) -> Result<ForgedCard, ForgeError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("fail") {
            return Err(ForgeError::Generation(GenerationError::Exit {
                code: Some(1),
                stderr: "CUDA out of memory".to_string(),
            }));
        }
        Ok(ForgedCard {
            image: RgbaImage::from_pixel(4, 4, Rgba([200, 10, 10, 255])),
            card_type: CardType::new(CardKind::Instant, CardColor::Red).unwrap(),
            title: format!("Title of {prompt}"),
        })
    }
}

/// Chat responder that answers with a fixed reply.
pub struct FakeChat {
    pub reply: String,
}

#[async_trait]
impl ChatResponder for FakeChat {
    async fn respond(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.contains("fail") {
            return Err(GenerationError::Timeout(Duration::from_secs(1)));
        }
        Ok(self.reply.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Files {
        channel: ChannelRef,
        content: String,
        files: Vec<Attachment>,
    },
    Text {
        channel: ChannelRef,
        content: String,
    },
    Relay(String),
}

/// Outbox that records everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingOutbox {
    pub deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingOutbox {
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    fn post(&self, channel: ChannelRef, delivery: Delivery) -> PostedMessage {
        let mut deliveries = self.deliveries.lock().unwrap();
        deliveries.push(delivery);
        PostedMessage {
            link: format!(
                "https://discord.com/channels/1/{}/{}",
                channel.get(),
                deliveries.len()
            ),
        }
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn send_files(
        &self,
        channel: ChannelRef,
        content: &str,
        files: Vec<Attachment>,
    ) -> Result<PostedMessage, OutboxError> {
        Ok(self.post(
            channel,
            Delivery::Files {
                channel,
                content: content.to_string(),
                files,
            },
        ))
    }

    async fn send_text(
        &self,
        channel: ChannelRef,
        content: &str,
    ) -> Result<PostedMessage, OutboxError> {
        Ok(self.post(
            channel,
            Delivery::Text {
                channel,
                content: content.to_string(),
            },
        ))
    }

    async fn relay_notice(&self, text: &str) -> Result<(), OutboxError> {
        self.deliveries
            .lock()
            .unwrap()
            .push(Delivery::Relay(text.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stored {
    Card { owner: String, prompt: String },
    PackCard { owner: String, stamp: String, index: usize },
}

/// Vault that only remembers what it was given.
#[derive(Default)]
pub struct MemoryVault {
    pub stored: Mutex<Vec<Stored>>,
}

impl MemoryVault {
    pub fn stored(&self) -> Vec<Stored> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl CardVault for MemoryVault {
    async fn store_card(
        &self,
        owner: &str,
        prompt: &str,
        _card: &ForgedCard,
    ) -> Result<PathBuf, VaultError> {
        self.stored.lock().unwrap().push(Stored::Card {
            owner: owner.to_string(),
            prompt: prompt.to_string(),
        });
        Ok(PathBuf::from(format!("users/{owner}/card.webp")))
    }

    async fn store_pack_card(
        &self,
        owner: &str,
        stamp: &str,
        index: usize,
        _card: &ForgedCard,
    ) -> Result<PathBuf, VaultError> {
        self.stored.lock().unwrap().push(Stored::PackCard {
            owner: owner.to_string(),
            stamp: stamp.to_string(),
            index,
        });
        Ok(PathBuf::from(format!("users/{owner}/{stamp}/card{index}.webp")))
    }
}

/// Collaborators of one test pipeline, kept so tests can inspect them.
pub struct Harness {
    pub forge: Arc<FakeForge>,
    pub outbox: Arc<RecordingOutbox>,
    pub vault: Arc<MemoryVault>,
}

impl Harness {
    pub fn new(forge: FakeForge) -> Self {
        Self {
            forge: Arc::new(forge),
            outbox: Arc::new(RecordingOutbox::default()),
            vault: Arc::new(MemoryVault::default()),
        }
    }

    pub fn pipeline(&self, chat_reply: &str) -> Pipeline {
        Pipeline {
            forge: self.forge.clone(),
            chat: Arc::new(FakeChat {
                reply: chat_reply.to_string(),
            }),
            outbox: self.outbox.clone(),
            vault: self.vault.clone(),
            pack_viewer_url: PACK_VIEWER.to_string(),
        }
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Start the worker and wait for the queue to drain.
pub async fn drain(dispatcher: &Arc<Dispatcher>, pipeline: Pipeline) {
    tokio::spawn(dispatcher.clone().run_forever(pipeline));
    let dispatcher = dispatcher.clone();
    wait_until(move || dispatcher.queued_len() == 0).await;
}
