//! Lighty gateway: platform adapters, the generation queue and the card forge.

pub mod cards;
pub mod chat;
pub mod discord;
pub mod dispatcher;
pub mod generation;
pub mod logging;
pub mod outbox;
pub mod twitch;
pub mod vault;

pub use dispatcher::{AdmissionError, DispatchError, Dispatcher, Pipeline};
