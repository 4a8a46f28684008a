use std::env;

use uuid::Uuid;

use crate::error::ConfigError;

/// Runtime configuration for the monitor binary, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the election service API.
    pub api_base: String,
    /// WebSocket URL of the vote feed.
    pub feed_url: String,
    /// Event to watch immediately; when unset the first running event is
    /// picked.
    pub watch_event: Option<Uuid>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base =
            env::var("EVOTE_API_BASE").map_err(|_| ConfigError::MissingVar("EVOTE_API_BASE"))?;
        let feed_url =
            env::var("EVOTE_FEED_URL").map_err(|_| ConfigError::MissingVar("EVOTE_FEED_URL"))?;
        let watch_event = match env::var("EVOTE_EVENT_ID") {
            Ok(raw) => Some(
                raw.parse()
                    .map_err(|_| ConfigError::InvalidVar("EVOTE_EVENT_ID"))?,
            ),
            Err(_) => None,
        };
        Ok(Self {
            api_base,
            feed_url,
            watch_event,
        })
    }
}
