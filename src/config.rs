//! Application configuration.
//!
//! Built from defaults, then an optional JSON file, then environment
//! variables (a `.env` file is honoured). Chat credentials only ever come
//! from here and are handed to the notifier at construction.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{Symbol, TieBreak};
use crate::probe::{DEFAULT_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS};
use crate::sources::{SourceSettings, Transport};
use crate::store::Partition;

/// Kept apart from `data/futures_history.csv`, which older deployments wrote
/// with a different header.
const DEFAULT_HISTORY_PATH: &str = "data/small_foreign_history.csv";

/// Upstream and notification base URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Exchange web site (report pages and CSV downloads)
    pub exchange_base: String,

    /// Exchange open-data JSON API
    pub feed_base: String,

    /// Telegram Bot API
    pub telegram_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            exchange_base: "https://www.taifex.com.tw".to_string(),
            feed_base: "https://openapi.taifex.com.tw".to_string(),
            telegram_base: "https://api.telegram.org".to_string(),
        }
    }
}

/// Telegram bot credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

/// Everything a run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Products to derive, in report order
    pub symbols: Vec<Symbol>,

    /// Calendar days searched backward from the start date (1 to 31)
    pub lookback_days: u32,

    /// Transports for the institutional dataset, in priority order
    pub institutional_sources: Vec<Transport>,

    /// Transports for the large-trader dataset, in priority order
    pub large_trader_sources: Vec<Transport>,

    /// Signal when small-foreign is exactly zero
    pub tie_break: TieBreak,

    /// History file, or the stem for per-symbol files
    pub history_path: PathBuf,

    pub partition: Partition,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Issue a "view" request before each CSV download
    pub prime_download_session: bool,

    pub endpoints: Endpoints,

    /// Absent means reports are only logged
    pub telegram: Option<TelegramConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbols: vec![
                Symbol::new("台指期", "臺股期貨").with_code("TX"),
                Symbol::new("那指期", "美國那斯達克100期貨").with_code("UNF"),
            ],
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            institutional_sources: vec![Transport::Download, Transport::Rendered],
            large_trader_sources: vec![Transport::Download, Transport::Rendered],
            tie_break: TieBreak::default(),
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            partition: Partition::default(),
            request_timeout_secs: 20,
            prime_download_session: true,
            endpoints: Endpoints::default(),
            telegram: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional JSON file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override fields from environment variables, read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("LOOKBACK_DAYS") {
            self.lookback_days = v
                .trim()
                .parse()
                .with_context(|| format!("LOOKBACK_DAYS must be an integer, got '{v}'"))?;
        }
        if let Some(v) = var("HISTORY_PATH") {
            self.history_path = PathBuf::from(v.trim());
        }
        if let Some(v) = var("TIE_BREAK") {
            self.tie_break = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("REQUEST_TIMEOUT_SECS must be an integer, got '{v}'"))?;
        }

        match (var("TG_TOKEN"), var("TG_CHAT_ID")) {
            (Some(token), Some(chat_id)) => {
                self.telegram = Some(TelegramConfig {
                    token: token.trim().to_string(),
                    chat_id: chat_id.trim().to_string(),
                });
            }
            (Some(_), None) | (None, Some(_)) => {
                bail!("TG_TOKEN and TG_CHAT_ID must be set together");
            }
            (None, None) => {}
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            bail!("At least one symbol must be configured");
        }
        if let Some(s) = self.symbols.iter().find(|s| s.display_name.trim().is_empty()) {
            bail!("Symbol '{}' has an empty display name", s.label);
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            bail!(
                "lookback_days must be between 1 and {}, got {}",
                MAX_LOOKBACK_DAYS,
                self.lookback_days
            );
        }
        if self.institutional_sources.is_empty() || self.large_trader_sources.is_empty() {
            bail!("Each dataset needs at least one transport");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            exchange_base: self.endpoints.exchange_base.clone(),
            feed_base: self.endpoints.feed_base.clone(),
            timeout: self.request_timeout(),
            prime_download_session: self.prime_download_session,
        }
    }

    /// Copy safe to print: the bot token is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(tg) = copy.telegram.as_mut() {
            tg.token = mask(&tg.token);
        }
        copy
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}****")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.lookback_days, 10);
        assert_eq!(config.symbols.len(), 2);
        assert_eq!(config.symbols[0].download_id.as_deref(), Some("TX"));
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert!(config.telegram.is_none());
    }

    #[test]
    fn test_default_history_path_avoids_legacy_file() {
        let config = AppConfig::default();
        assert_eq!(
            config.history_path,
            PathBuf::from("data/small_foreign_history.csv")
        );
        assert_ne!(config.history_path, PathBuf::from("data/futures_history.csv"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("LOOKBACK_DAYS", "5"),
                ("HISTORY_PATH", "/tmp/h.csv"),
                ("TIE_BREAK", "bullish"),
                ("TG_TOKEN", "123456:secret"),
                ("TG_CHAT_ID", "42"),
            ]))
            .unwrap();

        assert_eq!(config.lookback_days, 5);
        assert_eq!(config.history_path, PathBuf::from("/tmp/h.csv"));
        assert_eq!(config.tie_break, TieBreak::Bullish);
        assert_eq!(config.telegram.as_ref().unwrap().chat_id, "42");
        assert_eq!(config.redacted().telegram.unwrap().token, "1234****");
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("TG_TOKEN", " "), ("TG_CHAT_ID", ""), ("LOOKBACK_DAYS", "")]))
            .unwrap();
        assert!(config.telegram.is_none());
        assert_eq!(config.lookback_days, 10);
    }

    #[test]
    fn test_half_configured_telegram_is_rejected() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("TG_TOKEN", "abc")])).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.lookback_days = 32;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.lookback_days = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.symbols.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.large_trader_sources.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "symbols": [{"label": "台指期", "display_name": "臺股期貨", "download_id": "TX"}],
                "institutional_sources": ["feed", "rendered"],
                "partition": "per-symbol",
                "tie_break": "bullish"
            }"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.symbols.len(), 1);
        assert_eq!(config.symbols[0].store_name, None);
        assert_eq!(
            config.institutional_sources,
            vec![Transport::Feed, Transport::Rendered]
        );
        assert_eq!(config.large_trader_sources, AppConfig::default().large_trader_sources);
        assert_eq!(config.partition, Partition::PerSymbol);
        assert_eq!(config.tie_break, TieBreak::Bullish);
        assert_eq!(config.lookback_days, 10);
    }
}
