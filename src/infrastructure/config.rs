use crate::core::membership::Channel;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use teloxide::types::ChatId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub channel: Channel,
    pub channel_invite_link: Option<String>,
    pub admin_chat_id: ChatId,
    pub submissions_file: Option<PathBuf>,
    pub session_timeout: Duration,
    pub request_timeout: Duration,
    pub notify_on_timeout: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let bot_token = require("BOT_TOKEN")?;
        let channel = Channel::parse(&require("CHANNEL_ID")?).ok_or_else(|| ConfigError::Invalid {
            name: "CHANNEL_ID",
            reason: "expected @username or a numeric chat id".to_string(),
        })?;
        let admin_chat_id = require("ADMIN_CHAT_ID")?
            .parse::<i64>()
            .map(ChatId)
            .map_err(|e| ConfigError::Invalid {
                name: "ADMIN_CHAT_ID",
                reason: e.to_string(),
            })?;

        let persist = parse_bool("PERSIST_SUBMISSIONS", get("PERSIST_SUBMISSIONS"), true)?;
        let submissions_file = persist.then(|| {
            get("SUBMISSIONS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("loot_submissions.json"))
        });

        Ok(Config {
            bot_token,
            channel,
            channel_invite_link: get("CHANNEL_INVITE_LINK"),
            admin_chat_id,
            submissions_file,
            session_timeout: parse_secs("SESSION_TIMEOUT_SECS", get("SESSION_TIMEOUT_SECS"), 900)?,
            request_timeout: parse_secs("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"), 10)?,
            notify_on_timeout: parse_bool("NOTIFY_ON_TIMEOUT", get("NOTIFY_ON_TIMEOUT"), false)?,
        })
    }

    pub fn join_url(&self) -> Option<String> {
        self.channel_invite_link.clone().or_else(|| self.channel.join_url())
    }
}

fn parse_secs(name: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let secs = match raw {
        Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })?,
        None => default,
    };
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got {:?}", other),
        }),
    }
}
