use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::Path};

use crate::core::error::RouterError;
use crate::core::matcher::ExchangeType;

/// Per-queue options, fixed at declare time.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
    /// `direct` (anchored regex) or `topic` (segment wildcards).
    #[serde(rename = "type")]
    pub exchange: ExchangeType,
    pub case_insensitive: bool,
    /// Store messages nothing matched instead of dropping them.
    pub durable: bool,
    /// Redelivery attempts before a stored message is discarded.
    pub max_retries: Option<u32>,
}

impl QueueConfig {
    pub fn direct() -> Self {
        Self::default()
    }

    pub fn topic() -> Self {
        Self {
            exchange: ExchangeType::Topic,
            ..Self::default()
        }
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    pub fn durable(mut self, yes: bool) -> Self {
        self.durable = yes;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn validate(&self) -> Result<(), RouterError> {
        if self.max_retries == Some(0) {
            return Err(RouterError::invalid_config(
                "max_retries must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

/// A queue listed in the configuration file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct QueueDeclaration {
    pub name: String,
    #[serde(flatten)]
    pub config: QueueConfig,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RouterConfig {
    /// Default bound on each reply-chain step; unset means wait forever.
    pub reply_timeout_ms: Option<u64>,
}

impl RouterConfig {
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub router: RouterConfig,
    pub queues: Vec<QueueDeclaration>,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Config, anyhow::Error> {
        let config: Config = toml::from_str(raw)?;
        for decl in &config.queues {
            decl.config.validate()?;
        }
        Ok(config)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, anyhow::Error> {
    let raw: String = fs::read_to_string(path)?;
    Config::from_toml_str(&raw)
}
