pub mod card_type;
pub mod config;
pub mod job;
pub mod message;

pub use card_type::{CardColor, CardKind, CardType, choose_card_type};
pub use config::{Config, ConfigError, load_dotenv};
pub use job::{
    CardRequest, ChannelRef, ChatRequest, JobKind, PackSize, QueueItem, Requester, RequesterId,
};
pub use message::{ChatRole, ChatTurn};
