//! Units of queued work and the identities that request them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity used for admission control.
///
/// Discord users are keyed by their snowflake. Every Twitch redeemer shares
/// the single `Relay` identity, so they also share one in-flight budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequesterId {
    Discord(u64),
    Relay,
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequesterId::Discord(id) => write!(f, "discord:{}", id),
            RequesterId::Relay => write!(f, "relay"),
        }
    }
}

/// Who asked for a piece of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: RequesterId,
    pub name: String,
}

impl Requester {
    pub fn discord(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: RequesterId::Discord(id),
            name: name.into(),
        }
    }

    /// Synthesized identity for requests that arrive from Twitch.
    pub fn twitch_relay(login: impl Into<String>) -> Self {
        Self {
            id: RequesterId::Relay,
            name: login.into(),
        }
    }

    pub fn is_relay(&self) -> bool {
        self.id == RequesterId::Relay
    }

    /// Identity string compared against the ban list.
    pub fn ban_key(&self) -> String {
        match self.id {
            RequesterId::Discord(id) => id.to_string(),
            RequesterId::Relay => self.name.clone(),
        }
    }
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Discord channel that receives the results of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef(pub u64);

impl ChannelRef {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackSize {
    Single,
    Triple,
}

impl PackSize {
    pub fn card_count(self) -> usize {
        match self {
            PackSize::Single => 1,
            PackSize::Triple => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRequest {
    pub prompt: String,
    pub requester: Requester,
    pub channel: ChannelRef,
    pub pack: PackSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub prompt: String,
    pub requester: Requester,
    pub channel: ChannelRef,
}

/// Kind of work, used for logging and routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    SingleCard,
    CardPack,
    Chat,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::SingleCard => "single_card",
            JobKind::CardPack => "card_pack",
            JobKind::Chat => "chat",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of requested work waiting in the generation queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Card(CardRequest),
    Chat(ChatRequest),
}

impl QueueItem {
    pub fn card(
        prompt: impl Into<String>,
        requester: Requester,
        channel: ChannelRef,
        pack: PackSize,
    ) -> Self {
        QueueItem::Card(CardRequest {
            prompt: prompt.into(),
            requester,
            channel,
            pack,
        })
    }

    pub fn chat(prompt: impl Into<String>, requester: Requester, channel: ChannelRef) -> Self {
        QueueItem::Chat(ChatRequest {
            prompt: prompt.into(),
            requester,
            channel,
        })
    }

    pub fn requester(&self) -> &Requester {
        match self {
            QueueItem::Card(card) => &card.requester,
            QueueItem::Chat(chat) => &chat.requester,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            QueueItem::Card(card) => &card.prompt,
            QueueItem::Chat(chat) => &chat.prompt,
        }
    }

    pub fn channel(&self) -> ChannelRef {
        match self {
            QueueItem::Card(card) => card.channel,
            QueueItem::Chat(chat) => chat.channel,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            QueueItem::Card(CardRequest {
                pack: PackSize::Single,
                ..
            }) => JobKind::SingleCard,
            QueueItem::Card(CardRequest {
                pack: PackSize::Triple,
                ..
            }) => JobKind::CardPack,
            QueueItem::Chat(_) => JobKind::Chat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_requester() {
        let requester = Requester::twitch_relay("viewer42");
        assert!(requester.is_relay());
        assert_eq!(requester.id, RequesterId::Relay);
        assert_eq!(requester.ban_key(), "viewer42");
        assert_eq!(requester.to_string(), "viewer42");
    }

    #[test]
    fn test_discord_requester_ban_key_is_snowflake() {
        let requester = Requester::discord(1234, "alice");
        assert!(!requester.is_relay());
        assert_eq!(requester.ban_key(), "1234");
    }

    #[test]
    fn test_queue_item_kind() {
        let alice = Requester::discord(1, "alice");
        let single = QueueItem::card("a goat", alice.clone(), ChannelRef(9), PackSize::Single);
        let pack = QueueItem::card("a goat", alice.clone(), ChannelRef(9), PackSize::Triple);
        let chat = QueueItem::chat("hello", alice, ChannelRef(9));

        assert_eq!(single.kind(), JobKind::SingleCard);
        assert_eq!(pack.kind(), JobKind::CardPack);
        assert_eq!(chat.kind(), JobKind::Chat);
        assert_eq!(chat.prompt(), "hello");
        assert_eq!(chat.channel().get(), 9);
    }

    #[test]
    fn test_pack_card_count() {
        assert_eq!(PackSize::Single.card_count(), 1);
        assert_eq!(PackSize::Triple.card_count(), 3);
    }
}
