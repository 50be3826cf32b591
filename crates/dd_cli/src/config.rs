use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use dd_core::{Error, Result};
use serde::Deserialize;

fn default_concurrency() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    30
}

/// Bot credentials and where to keep message state.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Chat the bot posts to
    pub chat_id: i64,
    /// Token acquired via BotFather
    pub bot_token: String,
    pub save_dir: PathBuf,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("cannot read config {}: {}", path.display(), e)))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        if config.bot_token.trim().is_empty() {
            return Err(Error::Config("bot_token must not be empty".to_string()));
        }
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Durations like `1h30m`, `45s` or `2d`. A bare number is seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut number = String::new();
        let mut seen_any = false;

        for c in s.chars().filter(|c| !c.is_whitespace()) {
            if c.is_ascii_digit() {
                number.push(c);
                continue;
            }
            let value: u64 = number
                .parse()
                .map_err(|_| format!("Expected a number before {:?}", c))?;
            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                _ => return Err(format!("Invalid duration unit: {}", c)),
            };
            total_seconds = value
                .checked_mul(unit)
                .and_then(|seconds| total_seconds.checked_add(seconds))
                .ok_or_else(|| format!("Duration too long: {}", s))?;
            number.clear();
            seen_any = true;
        }

        if !number.is_empty() {
            let seconds = number.parse::<u64>().map_err(|e| e.to_string())?;
            total_seconds = total_seconds
                .checked_add(seconds)
                .ok_or_else(|| format!("Duration too long: {}", s))?;
            seen_any = true;
        }
        if !seen_any {
            return Err("Duration must include a number".to_string());
        }
        if total_seconds == 0 {
            return Err("Duration must be positive".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}
