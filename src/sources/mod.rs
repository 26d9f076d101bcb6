//! Transport strategies for the two exchange datasets.
//!
//! The exchange has served the same numbers as rendered HTML tables, as Big5
//! CSV downloads and as a JSON feed, and has switched between them without
//! notice. Each strategy implements [`SourceAdapter`]; which one is used for a
//! dataset is a configuration decision made once at construction.

mod chain;
mod download;
mod feed;
mod rendered;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::models::{Dataset, SymbolScope, Table};

pub use chain::SourceChain;
pub use download::DownloadSource;
pub use feed::FeedSource;
pub use rendered::RenderedTableSource;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Which upstream representation a strategy consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// HTML page with embedded tables, queried by form POST
    Rendered,
    /// Big5 CSV download
    Download,
    /// JSON feed of the latest day's records
    Feed,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Rendered => "rendered",
            Transport::Download => "download",
            Transport::Feed => "feed",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rendered" | "html" => Ok(Transport::Rendered),
            "download" | "csv" => Ok(Transport::Download),
            "feed" | "json" => Ok(Transport::Feed),
            other => Err(format!("unknown transport '{other}'")),
        }
    }
}

/// A validated payload for one dataset on one day.
#[derive(Debug, Clone)]
pub struct Payload {
    pub dataset: Dataset,
    pub transport: Transport,
    pub table: Table,
}

/// Fetches one dataset for one candidate day.
///
/// Implementations never panic on network or format trouble: every failure
/// comes back as a [`TransportError`], which callers treat as "not available
/// for this day".
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch and validate `dataset` as published for `date`.
    async fn fetch(
        &self,
        dataset: Dataset,
        date: NaiveDate,
        scope: &SymbolScope,
    ) -> Result<Payload, TransportError>;
}

/// Base URLs and request settings shared by the strategies.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub exchange_base: String,
    pub feed_base: String,
    pub timeout: Duration,
    pub prime_download_session: bool,
}

/// Build the configured strategy chain for one dataset.
pub fn build_chain(
    transports: &[Transport],
    settings: &SourceSettings,
) -> anyhow::Result<SourceChain> {
    let mut sources: Vec<Box<dyn SourceAdapter>> = Vec::with_capacity(transports.len());
    for transport in transports {
        sources.push(build_source(*transport, settings)?);
    }
    Ok(SourceChain::new(sources))
}

fn build_source(
    transport: Transport,
    settings: &SourceSettings,
) -> anyhow::Result<Box<dyn SourceAdapter>> {
    Ok(match transport {
        Transport::Rendered => Box::new(RenderedTableSource::new(
            settings.exchange_base.clone(),
            settings.timeout,
        )?),
        Transport::Download => Box::new(DownloadSource::new(
            settings.exchange_base.clone(),
            settings.timeout,
            settings.prime_download_session,
        )),
        Transport::Feed => Box::new(FeedSource::new(
            settings.feed_base.clone(),
            settings.timeout,
        )?),
    })
}

/// Text that must appear in a genuine payload of each dataset.
pub fn markers(dataset: Dataset) -> &'static [&'static str] {
    match dataset {
        Dataset::Institutional => &["身份別", "未平倉"],
        Dataset::LargeTrader => &["前五大", "交易人"],
    }
}

/// Returns the first marker missing from `haystack`, if any.
fn missing_marker(dataset: Dataset, haystack: impl Fn(&str) -> bool) -> Option<&'static str> {
    markers(dataset).iter().copied().find(|m| !haystack(m))
}

fn http_client(timeout: Duration, cookies: bool) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .cookie_store(cookies)
        .build()
}

fn slash_date(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}
