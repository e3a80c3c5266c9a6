use std::path::PathBuf;

use lighty_core::config::TwitchTokens;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::TwitchError;

pub const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

/// Channel OAuth tokens with refresh-token renewal.
///
/// Renewed pairs are written to the token store so the next start picks
/// them up instead of the (by then revoked) pair from the environment.
pub struct TwitchAuth {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    tokens: RwLock<TwitchTokens>,
    store: PathBuf,
}

impl TwitchAuth {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tokens: TwitchTokens,
        store: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tokens: RwLock::new(tokens),
            store: store.into(),
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub async fn access_token(&self) -> String {
        self.tokens.read().await.access_token.clone()
    }

    /// Trade the refresh token for a new pair and persist it.
    pub async fn refresh(&self) -> Result<TwitchTokens, TwitchError> {
        let refresh_token = self.tokens.read().await.refresh_token.clone();

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Failed to refresh access token");
            return Err(TwitchError::RefreshRejected {
                status: status.as_u16(),
                body,
            });
        }

        let renewed: RefreshResponse = response.json().await?;
        let tokens = TwitchTokens {
            access_token: renewed.access_token,
            refresh_token: renewed.refresh_token,
        };

        let store = self.store.clone();
        let to_save = tokens.clone();
        tokio::task::spawn_blocking(move || to_save.save(&store)).await??;

        *self.tokens.write().await = tokens.clone();
        info!("Access token refreshed");
        Ok(tokens)
    }
}
