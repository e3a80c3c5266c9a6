//! The generation queue.
//!
//! Adapters admit work through [`Dispatcher::enqueue`]; a single worker
//! ([`Dispatcher::run_forever`]) drains it in arrival order and hands each
//! item to the [`Pipeline`]. Only one item is processed at a time across the
//! whole bot, since every generation occupies the same GPU.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::{ImageFormat, RgbaImage};
use lighty_core::{CardRequest, ChatRequest, PackSize, QueueItem, RequesterId};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cards::{CardForge, ForgeError};
use crate::chat::ChatResponder;
use crate::generation::GenerationError;
use crate::outbox::{Attachment, Outbox, OutboxError};
use crate::vault::{CardVault, VaultError, sanitize_file_stem};

/// Discord's maximum message length, in characters.
pub const MESSAGE_LIMIT: usize = 2000;

const ATTACHMENT_STEM_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("Requester already has the maximum number of queued generations")]
    QueueLimitReached,

    #[error("The generation queue is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Card forge failed: {0}")]
    Forge(#[from] ForgeError),

    #[error("Chat reply failed: {0}")]
    Chat(#[from] GenerationError),

    #[error("Delivery failed: {0}")]
    Outbox(#[from] OutboxError),

    #[error("Storing card failed: {0}")]
    Vault(#[from] VaultError),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Invalid pack viewer URL: {0}")]
    PackLink(#[from] url::ParseError),
}

/// Split `text` into chunks of at most `limit` characters.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Link to the pack viewer page for one stored pack.
pub fn pack_viewer_link(viewer: &str, owner: &str, stamp: &str) -> Result<url::Url, url::ParseError> {
    url::Url::parse_with_params(viewer, [("username", owner), ("datetimestring", stamp)])
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

fn attachment_name(prompt: &str, index: Option<usize>) -> String {
    let stem = sanitize_file_stem(prompt, ATTACHMENT_STEM_CHARS);
    match index {
        Some(index) => format!("lighty_mtg_{}_{}.png", stem, index),
        None => format!("lighty_mtg_{}.png", stem),
    }
}

/// Everything the worker needs to turn a queue item into delivered output.
pub struct Pipeline {
    pub forge: Arc<dyn CardForge>,
    pub chat: Arc<dyn ChatResponder>,
    pub outbox: Arc<dyn Outbox>,
    pub vault: Arc<dyn CardVault>,
    pub pack_viewer_url: String,
}

impl Pipeline {
    pub async fn process(&self, item: &QueueItem) -> Result<(), DispatchError> {
        match item {
            QueueItem::Card(request) => match request.pack {
                PackSize::Single => self.single_card(request).await,
                PackSize::Triple => self.card_pack(request).await,
            },
            QueueItem::Chat(request) => self.chat_reply(request).await,
        }
    }

    async fn single_card(&self, request: &CardRequest) -> Result<(), DispatchError> {
        let name = &request.requester.name;
        let card = self.forge.forge(&request.prompt, &request.requester).await?;

        let png = encode_png(&card.image)?;
        let posted = self
            .outbox
            .send_files(
                request.channel,
                &format!("Card for `{}`: Prompt: `{}`", name, request.prompt),
                vec![Attachment::spoiler(attachment_name(&request.prompt, None), png)],
            )
            .await?;

        self.vault.store_card(name, &request.prompt, &card).await?;

        if request.requester.is_relay() {
            self.outbox
                .relay_notice(&format!("@{}: Your card is ready at: {}", name, posted.link))
                .await?;
        }

        info!(user = %name, prompt = %request.prompt, link = %posted.link, "Card posted");
        Ok(())
    }

    async fn card_pack(&self, request: &CardRequest) -> Result<(), DispatchError> {
        let name = &request.requester.name;
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();

        let mut files = Vec::with_capacity(request.pack.card_count());
        for index in 1..=request.pack.card_count() {
            let card = self.forge.forge(&request.prompt, &request.requester).await?;
            self.vault.store_card(name, &request.prompt, &card).await?;
            self.vault.store_pack_card(name, &stamp, index, &card).await?;
            files.push(Attachment::spoiler(
                attachment_name(&request.prompt, Some(index)),
                encode_png(&card.image)?,
            ));
        }

        let viewer = pack_viewer_link(&self.pack_viewer_url, name, &stamp)?;
        let notice = self
            .outbox
            .send_text(
                request.channel,
                &format!("# {} Open your pack here: [OPEN PACK]({})", name, viewer),
            )
            .await?;

        self.outbox
            .send_files(
                request.channel,
                &format!("Card Pack for `{}`: Prompt: `{}`", name, request.prompt),
                files,
            )
            .await?;

        if request.requester.is_relay() {
            self.outbox
                .relay_notice(&format!("@{}: Your pack is ready at: {}", name, notice.link))
                .await?;
        }

        info!(user = %name, prompt = %request.prompt, link = %notice.link, "Pack created");
        Ok(())
    }

    async fn chat_reply(&self, request: &ChatRequest) -> Result<(), DispatchError> {
        let reply = self.chat.respond(&request.prompt).await?;
        for chunk in split_message(&reply, MESSAGE_LIMIT) {
            self.outbox.send_text(request.channel, &chunk).await?;
        }
        info!(user = %request.requester, prompt = %request.prompt, "Chat responded");
        Ok(())
    }
}

/// FIFO generation queue with a per-requester in-flight cap.
pub struct Dispatcher {
    sender: Mutex<Option<mpsc::UnboundedSender<QueueItem>>>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<QueueItem>>,
    in_flight: Mutex<HashMap<RequesterId, u32>>,
    queued: AtomicUsize,
    processing: AtomicBool,
    user_queue_depth: u32,
}

impl Dispatcher {
    pub fn new(user_queue_depth: u32) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            in_flight: Mutex::new(HashMap::new()),
            queued: AtomicUsize::new(0),
            processing: AtomicBool::new(false),
            user_queue_depth,
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<RequesterId, u32>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn user_queue_depth(&self) -> u32 {
        self.user_queue_depth
    }

    pub fn is_room_in_queue(&self, id: &RequesterId) -> bool {
        self.table().get(id).copied().unwrap_or(0) < self.user_queue_depth
    }

    /// Admit `item` if its requester is under the cap.
    ///
    /// Returns the queue length after insertion. A rejected item leaves the
    /// queue and the in-flight table untouched.
    pub fn enqueue(&self, item: QueueItem) -> Result<usize, AdmissionError> {
        let id = item.requester().id;
        let mut table = self.table();
        let count = table.get(&id).copied().unwrap_or(0);
        if count >= self.user_queue_depth {
            return Err(AdmissionError::QueueLimitReached);
        }

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or(AdmissionError::Closed)?;
        let kind = item.kind();
        sender.send(item).map_err(|_| AdmissionError::Closed)?;

        table.insert(id, count + 1);
        let len = self.queued.fetch_add(1, Ordering::SeqCst) + 1;
        info!(requester = %id, kind = %kind, queue_len = len, "Queued");
        Ok(len)
    }

    pub fn in_flight(&self, id: &RequesterId) -> u32 {
        self.table().get(id).copied().unwrap_or(0)
    }

    /// Items admitted and not yet finished, including the one in progress.
    pub fn queued_len(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Stop accepting work. The worker finishes what is queued, then returns.
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Drain the queue until it is closed and empty.
    pub async fn run_forever(self: Arc<Self>, pipeline: Pipeline) {
        let mut receiver = self.receiver.lock().await;
        info!("Generation worker started");

        while let Some(item) = receiver.recv().await {
            self.processing.store(true, Ordering::SeqCst);
            let kind = item.kind();

            if let Err(e) = pipeline.process(&item).await {
                error!(
                    user = %item.requester(),
                    prompt = %item.prompt(),
                    kind = %kind,
                    "Generation failed: {}",
                    e
                );
            }

            self.finish(&item.requester().id);
        }

        info!("Generation worker stopped");
    }

    fn finish(&self, id: &RequesterId) {
        {
            let mut table = self.table();
            match table.get_mut(id) {
                Some(count) if *count > 1 => *count -= 1,
                Some(_) => {
                    table.remove(id);
                }
                None => warn!(requester = %id, "Finished item had no in-flight entry"),
            }
        }
        let _ = self
            .queued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
        self.processing.store(false, Ordering::SeqCst);
    }
}
