//! Channel-points redemption listener over Twitch PubSub.
//!
//! Each matching redemption becomes a three-card pack request from the relay
//! identity, delivered to the configured Discord card channel.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use lighty_core::config::Settings;
use lighty_core::{ChannelRef, PackSize, QueueItem, Requester};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::{TwitchAuth, TwitchChat, TwitchError};
use crate::dispatcher::{AdmissionError, Dispatcher};

pub const PUBSUB_URL: &str = "wss://pubsub-edge.twitch.tv";

/// Twitch drops connections that stay silent for more than five minutes.
const PING_INTERVAL: Duration = Duration::from_secs(4 * 60);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const BAD_AUTH: &str = "ERR_BADAUTH";

#[derive(Debug, Serialize)]
struct ListenRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    nonce: String,
    data: ListenData<'a>,
}

#[derive(Debug, Serialize)]
struct ListenData<'a> {
    topics: Vec<String>,
    auth_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
enum Frame {
    Pong,
    Reconnect,
    Response {
        #[serde(default)]
        error: String,
        #[serde(default)]
        nonce: Option<String>,
    },
    Message {
        data: FrameData,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct FrameData {
    topic: String,
    /// JSON document encoded as a string
    message: String,
}

#[derive(Debug, Deserialize)]
struct PointsMessage {
    #[serde(rename = "type")]
    kind: String,
    data: PointsData,
}

#[derive(Debug, Deserialize)]
struct PointsData {
    redemption: RawRedemption,
}

#[derive(Debug, Deserialize)]
struct RawRedemption {
    user: RedemptionUser,
    reward: RedemptionReward,
    #[serde(default)]
    user_input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RedemptionUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RedemptionReward {
    title: String,
}

/// A channel-points reward redeemed by a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub login: String,
    pub reward_title: String,
    pub user_input: String,
}

/// Extract a redemption from a channel-points topic message.
///
/// Other message types on the topic yield `Ok(None)`.
pub fn parse_redemption(message: &str) -> Result<Option<Redemption>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(message)?;
    if value.get("type").and_then(|t| t.as_str()) != Some("reward-redeemed") {
        return Ok(None);
    }
    let parsed: PointsMessage = serde_json::from_value(value)?;
    debug!(kind = %parsed.kind, "Channel points message");
    let redemption = parsed.data.redemption;
    Ok(Some(Redemption {
        login: redemption.user.login,
        reward_title: redemption.reward.title,
        user_input: redemption.user_input.unwrap_or_default(),
    }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionOutcome {
    /// Some other reward
    Ignored,
    Queued,
    /// Turned away; the text is announced in chat
    Rejected(String),
}

/// Decide what happens to one redemption and enqueue it if admitted.
pub fn admit_redemption(
    dispatcher: &Dispatcher,
    settings: &Settings,
    redemption: &Redemption,
) -> RedemptionOutcome {
    if redemption.reward_title != settings.twitch.reward_name {
        return RedemptionOutcome::Ignored;
    }

    let requester = Requester::twitch_relay(redemption.login.clone());
    if !settings.is_enabled_not_banned(&requester.ban_key()) {
        return RedemptionOutcome::Rejected(format!(
            "@{}: Card redemptions are disabled or you are banned",
            redemption.login
        ));
    }

    let item = QueueItem::card(
        redemption.user_input.clone(),
        requester,
        ChannelRef(settings.discord.card_channel_id),
        PackSize::Triple,
    );
    match dispatcher.enqueue(item) {
        Ok(_) => RedemptionOutcome::Queued,
        Err(AdmissionError::QueueLimitReached) => RedemptionOutcome::Rejected(format!(
            "@{}: Queue limit reached, please wait until the current pack is finished",
            redemption.login
        )),
        Err(AdmissionError::Closed) => RedemptionOutcome::Rejected(format!(
            "@{}: The card bot is shutting down, please try again later",
            redemption.login
        )),
    }
}

fn listen_frame(topic: &str, auth_token: &str) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ListenRequest {
        kind: "LISTEN",
        nonce: uuid::Uuid::new_v4().to_string(),
        data: ListenData {
            topics: vec![topic.to_string()],
            auth_token,
        },
    })
}

/// Long-running PubSub subscriber.
pub struct RedemptionListener {
    url: String,
    dispatcher: Arc<Dispatcher>,
    settings: Arc<Settings>,
    auth: Arc<TwitchAuth>,
    chat: Option<TwitchChat>,
}

impl RedemptionListener {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        settings: Arc<Settings>,
        auth: Arc<TwitchAuth>,
        chat: Option<TwitchChat>,
    ) -> Self {
        Self {
            url: PUBSUB_URL.to_string(),
            dispatcher,
            settings,
            auth,
            chat,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn topic(&self) -> String {
        format!("channel-points-channel-v1.{}", self.settings.twitch.channel_id)
    }

    /// Listen until the process exits, reconnecting after every failure.
    pub async fn run(self) {
        loop {
            match self.session().await {
                Ok(()) => info!("PubSub asked to reconnect"),
                Err(e) => error!("PubSub error: {}", e),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn session(&self) -> Result<(), TwitchError> {
        let topic = self.topic();
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let listen = listen_frame(&topic, &self.auth.access_token().await)?;
        write.send(Message::Text(listen.into())).await?;
        info!(topic = %topic, "PubSub connected");

        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await;

        loop {
            tokio::select! {
                _ = ping.tick() => {
                    write.send(Message::Text(r#"{"type":"PING"}"#.into())).await?;
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let frame = match serde_json::from_str::<Frame>(text.as_str()) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("Unreadable PubSub frame: {}", e);
                                continue;
                            }
                        };
                        match frame {
                            Frame::Pong | Frame::Other => {}
                            Frame::Reconnect => return Ok(()),
                            Frame::Response { error, nonce } => {
                                if error == BAD_AUTH {
                                    info!(topic = %topic, "Auth failed");
                                    let tokens = self.auth.refresh().await?;
                                    let listen = listen_frame(&topic, &tokens.access_token)?;
                                    write.send(Message::Text(listen.into())).await?;
                                } else if !error.is_empty() {
                                    error!(nonce = ?nonce, "LISTEN rejected: {}", error);
                                } else {
                                    debug!(nonce = ?nonce, "LISTEN acknowledged");
                                }
                            }
                            Frame::Message { data } => self.on_message(&data),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    fn on_message(&self, data: &FrameData) {
        let redemption = match parse_redemption(&data.message) {
            Ok(Some(redemption)) => redemption,
            Ok(None) => return,
            Err(e) => {
                warn!(topic = %data.topic, "Unreadable redemption: {}", e);
                return;
            }
        };

        match admit_redemption(&self.dispatcher, &self.settings, &redemption) {
            RedemptionOutcome::Ignored => {}
            RedemptionOutcome::Queued => {
                info!(user = %redemption.login, prompt = %redemption.user_input, "Twitch card reward redeemed");
            }
            RedemptionOutcome::Rejected(reply) => {
                info!(user = %redemption.login, "Twitch redemption rejected");
                if let Some(chat) = &self.chat
                    && let Err(e) = chat.say(&reply)
                {
                    warn!("Failed to announce rejection: {}", e);
                }
            }
        }
    }
}
