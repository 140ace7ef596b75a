//! Server configuration from the environment

use crate::chat::{ChatSettings, MAX_VIEWS, VIEW_IDLE_TIMEOUT};
use crate::history::RECENT_LIMIT;
use crate::reveal::REVEAL_DELAY;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// HS256 secret; authenticated routes answer 401 while unset
    pub jwt_secret: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub chat: ChatSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = lookup("ASTRA_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.astra-chat/astra.db"))
            },
            PathBuf::from,
        );

        let port = parse_var(&lookup, "ASTRA_PORT")?.unwrap_or(DEFAULT_PORT);
        let model_timeout_secs: u64 =
            parse_var(&lookup, "ASTRA_MODEL_TIMEOUT_SECS")?.unwrap_or(DEFAULT_MODEL_TIMEOUT_SECS);
        let reveal_delay = parse_var::<u64>(&lookup, "ASTRA_REVEAL_DELAY_MS")?
            .map_or(REVEAL_DELAY, Duration::from_millis);
        let recent_limit = parse_var(&lookup, "ASTRA_RECENT_LIMIT")?.unwrap_or(RECENT_LIMIT);
        let idle_timeout = parse_var::<u64>(&lookup, "ASTRA_VIEW_IDLE_SECS")?
            .map_or(VIEW_IDLE_TIMEOUT, Duration::from_secs);
        let max_views = parse_var(&lookup, "ASTRA_MAX_VIEWS")?.unwrap_or(MAX_VIEWS);

        Ok(Self {
            db_path,
            port,
            jwt_secret: lookup("ASTRA_JWT_SECRET").filter(|s| !s.is_empty()),
            static_dir: lookup("ASTRA_STATIC_DIR").map(PathBuf::from),
            chat: ChatSettings {
                model_timeout: Duration::from_secs(model_timeout_secs),
                reveal_delay,
                recent_limit,
                idle_timeout,
                max_views,
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
