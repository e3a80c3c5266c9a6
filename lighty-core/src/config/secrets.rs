//! Secrets configuration loaded from environment variables only.
//!
//! Tokens never live in the TOML settings file. Twitch tokens refreshed at
//! runtime are kept in a separate token store (see `TwitchTokens`), which
//! takes precedence over the environment on the next start.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Secrets loaded exclusively from environment variables.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Discord bot token (env: DISCORD_BOT_TOKEN)
    pub discord_bot_token: Option<String>,

    /// Twitch application client id (env: TWITCH_CLIENT_ID)
    pub twitch_client_id: Option<String>,

    /// Twitch application client secret (env: TWITCH_CLIENT_SECRET)
    pub twitch_client_secret: Option<String>,

    /// Channel OAuth tokens used for PubSub
    pub twitch_tokens: Option<TwitchTokens>,

    /// Chat OAuth token for the bot account (env: TWITCH_CHAT_TOKEN)
    pub twitch_chat_token: Option<String>,
}

/// Channel access/refresh token pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitchTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl TwitchTokens {
    /// Read a previously persisted token pair.
    pub fn load(path: &Path) -> Result<Option<Self>, SecretsError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let tokens = toml::from_str(&content)?;
        Ok(Some(tokens))
    }

    /// Persist the token pair, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<(), SecretsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Errors that can occur when loading secrets
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    #[error("Token store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token store parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Token store serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Secrets {
    /// Load secrets from environment variables (and `.env` when present).
    pub fn from_env() -> Result<Self, SecretsError> {
        let _ = dotenvy::dotenv();

        Self::from_env_inner()
    }

    pub(crate) fn from_env_inner() -> Result<Self, SecretsError> {
        let twitch_tokens = match (
            non_empty_var("TWITCH_ACCESS_TOKEN"),
            non_empty_var("TWITCH_REFRESH_TOKEN"),
        ) {
            (Some(access_token), Some(refresh_token)) => Some(TwitchTokens {
                access_token,
                refresh_token,
            }),
            _ => None,
        };

        let secrets = Self {
            discord_bot_token: non_empty_var("DISCORD_BOT_TOKEN"),
            twitch_client_id: non_empty_var("TWITCH_CLIENT_ID"),
            twitch_client_secret: non_empty_var("TWITCH_CLIENT_SECRET"),
            twitch_tokens,
            twitch_chat_token: non_empty_var("TWITCH_CHAT_TOKEN"),
        };

        if secrets.discord_bot_token.is_none() {
            return Err(SecretsError::MissingSecret("DISCORD_BOT_TOKEN".to_string()));
        }

        Ok(secrets)
    }

    /// Prefer a persisted token pair over the one from the environment.
    pub fn with_token_store(mut self, path: &Path) -> Result<Self, SecretsError> {
        if let Some(stored) = TwitchTokens::load(path)? {
            self.twitch_tokens = Some(stored);
        }
        Ok(self)
    }

    /// Names of missing secrets needed by the Twitch adapter.
    pub fn missing_twitch_secrets(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.twitch_client_id.is_none() {
            missing.push("TWITCH_CLIENT_ID");
        }
        if self.twitch_client_secret.is_none() {
            missing.push("TWITCH_CLIENT_SECRET");
        }
        if self.twitch_tokens.is_none() {
            missing.push("TWITCH_ACCESS_TOKEN/TWITCH_REFRESH_TOKEN");
        }
        if self.twitch_chat_token.is_none() {
            missing.push("TWITCH_CHAT_TOKEN");
        }
        missing
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-mutating tests across the config module share this lock
    pub(crate) static ENV_MUTEX: Mutex<()> = Mutex::new(());

    pub(crate) fn clear_env() {
        unsafe {
            env::remove_var("DISCORD_BOT_TOKEN");
            env::remove_var("TWITCH_CLIENT_ID");
            env::remove_var("TWITCH_CLIENT_SECRET");
            env::remove_var("TWITCH_ACCESS_TOKEN");
            env::remove_var("TWITCH_REFRESH_TOKEN");
            env::remove_var("TWITCH_CHAT_TOKEN");
        }
    }

    #[test]
    fn test_discord_token_required() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let result = Secrets::from_env_inner();
        assert!(matches!(result, Err(SecretsError::MissingSecret(name)) if name == "DISCORD_BOT_TOKEN"));
    }

    #[test]
    fn test_twitch_tokens_need_both_halves() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("DISCORD_BOT_TOKEN", "discord-token");
            env::set_var("TWITCH_ACCESS_TOKEN", "access");
        }

        let secrets = Secrets::from_env_inner().unwrap();
        assert_eq!(secrets.discord_bot_token.as_deref(), Some("discord-token"));
        assert!(secrets.twitch_tokens.is_none());

        unsafe { env::set_var("TWITCH_REFRESH_TOKEN", "refresh") }
        let secrets = Secrets::from_env_inner().unwrap();
        assert_eq!(
            secrets.twitch_tokens,
            Some(TwitchTokens {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
            })
        );
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("DISCORD_BOT_TOKEN", "discord-token");
            env::set_var("TWITCH_CLIENT_ID", "   ");
        }

        let secrets = Secrets::from_env_inner().unwrap();
        assert!(secrets.twitch_client_id.is_none());
        assert!(secrets.missing_twitch_secrets().contains(&"TWITCH_CLIENT_ID"));
    }

    #[test]
    fn test_token_store_overrides_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twitch-tokens.toml");
        let stored = TwitchTokens {
            access_token: "new-access".to_string(),
            refresh_token: "new-refresh".to_string(),
        };
        stored.save(&path).unwrap();

        let secrets = Secrets {
            discord_bot_token: Some("token".to_string()),
            twitch_tokens: Some(TwitchTokens {
                access_token: "old".to_string(),
                refresh_token: "old".to_string(),
            }),
            ..Default::default()
        }
        .with_token_store(&path)
        .unwrap();

        assert_eq!(secrets.twitch_tokens, Some(stored));
    }

    #[test]
    fn test_missing_token_store_keeps_env_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = Secrets::default()
            .with_token_store(&dir.path().join("absent.toml"))
            .unwrap();
        assert!(secrets.twitch_tokens.is_none());
    }
}
