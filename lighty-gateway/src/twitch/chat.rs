//! Minimal Twitch chat sender over IRC-on-WebSocket.
//!
//! Only what the bot needs: log in, join one channel, answer PINGs and send
//! PRIVMSGs. Incoming chat is ignored.

use std::collections::VecDeque;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::TwitchError;

pub const CHAT_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub url: String,
    pub nick: String,
    /// OAuth token, with or without the `oauth:` prefix
    pub token: String,
    pub channel: String,
}

impl ChatConfig {
    fn login_lines(&self) -> Vec<String> {
        let token = self.token.strip_prefix("oauth:").unwrap_or(&self.token);
        vec![
            format!("PASS oauth:{}", token),
            format!("NICK {}", self.nick.to_lowercase()),
            format!("JOIN #{}", self.channel.to_lowercase()),
        ]
    }
}

enum ChatCommand {
    Say(String),
    Shutdown(oneshot::Sender<()>),
}

/// `PRIVMSG` line for `text`, flattened to a single line.
pub fn privmsg(channel: &str, text: &str) -> String {
    let text: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    format!("PRIVMSG #{} :{}", channel.to_lowercase(), text)
}

/// Answer for a server `PING` line.
pub fn ping_reply(line: &str) -> Option<String> {
    line.strip_prefix("PING")
        .map(|rest| format!("PONG{}", rest.trim_end()))
}

/// Handle to the background chat connection.
#[derive(Clone)]
pub struct TwitchChat {
    tx: mpsc::UnboundedSender<ChatCommand>,
}

impl TwitchChat {
    pub fn spawn(config: ChatConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_chat(config, rx));
        Self { tx }
    }

    /// Queue a message for the channel.
    pub fn say(&self, text: &str) -> Result<(), TwitchError> {
        self.tx
            .send(ChatCommand::Say(text.to_string()))
            .map_err(|_| TwitchError::ChatClosed)
    }

    /// Flush queued messages and disconnect.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(ChatCommand::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

enum SessionEnd {
    Shutdown(Option<oneshot::Sender<()>>),
    Disconnected,
}

async fn run_chat(config: ChatConfig, mut rx: mpsc::UnboundedReceiver<ChatCommand>) {
    let mut pending: VecDeque<String> = VecDeque::new();

    loop {
        let end = match session(&config, &mut rx, &mut pending).await {
            Ok(SessionEnd::Disconnected) => {
                warn!("Twitch chat disconnected, reconnecting");
                reconnect_delay(&mut rx, &mut pending).await
            }
            Ok(end) => end,
            Err(e) => {
                error!("Twitch chat error: {}", e);
                reconnect_delay(&mut rx, &mut pending).await
            }
        };
        if let SessionEnd::Shutdown(done) = end {
            if let Some(done) = done {
                let _ = done.send(());
            }
            info!("Twitch chat closed");
            return;
        }
    }
}

/// Hold `command` while offline. Returns the end of the task on shutdown.
fn hold(command: Option<ChatCommand>, pending: &mut VecDeque<String>) -> Option<SessionEnd> {
    match command {
        Some(ChatCommand::Say(text)) => {
            pending.push_back(text);
            None
        }
        Some(ChatCommand::Shutdown(done)) => Some(SessionEnd::Shutdown(Some(done))),
        None => Some(SessionEnd::Shutdown(None)),
    }
}

/// Sleep before the next connection attempt, still answering shutdown.
async fn reconnect_delay(
    rx: &mut mpsc::UnboundedReceiver<ChatCommand>,
    pending: &mut VecDeque<String>,
) -> SessionEnd {
    let delay = tokio::time::sleep(RECONNECT_DELAY);
    tokio::pin!(delay);
    loop {
        tokio::select! {
            _ = &mut delay => return SessionEnd::Disconnected,
            command = rx.recv() => {
                if let Some(end) = hold(command, pending) {
                    return end;
                }
            }
        }
    }
}

async fn session(
    config: &ChatConfig,
    rx: &mut mpsc::UnboundedReceiver<ChatCommand>,
    pending: &mut VecDeque<String>,
) -> Result<SessionEnd, TwitchError> {
    let connect = connect_async(config.url.as_str());
    tokio::pin!(connect);
    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => break result?.0,
            command = rx.recv() => {
                if let Some(end) = hold(command, pending) {
                    return Ok(end);
                }
            }
        }
    };
    let (mut write, mut read) = ws_stream.split();

    for line in config.login_lines() {
        write.send(Message::Text(line.into())).await?;
    }
    info!(channel = %config.channel, "Twitch chat connected");

    // Messages that failed to go out before the last reconnect
    while let Some(text) = pending.front() {
        write
            .send(Message::Text(privmsg(&config.channel, text).into()))
            .await?;
        pending.pop_front();
    }

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(ChatCommand::Say(text)) => {
                    let line = privmsg(&config.channel, &text);
                    if let Err(e) = write.send(Message::Text(line.into())).await {
                        pending.push_back(text);
                        return Err(e.into());
                    }
                    debug!("Twitch chat: {}", text);
                }
                Some(ChatCommand::Shutdown(done)) => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown(Some(done)));
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown(None));
                }
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    for line in text.as_str().lines() {
                        if let Some(pong) = ping_reply(line) {
                            write.send(Message::Text(pong.into())).await?;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Disconnected),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(_)) => {}
            },
        }
    }
}
