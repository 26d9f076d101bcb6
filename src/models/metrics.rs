//! Derived small-foreign metric and its directional signal.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Next-session direction implied by the small-foreign residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Bullish,
    Bearish,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Bullish => "BULLISH",
            Signal::Bearish => "BEARISH",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Signal::Bullish => "🟢",
            Signal::Bearish => "🔴",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a small-foreign value of exactly zero is classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    Bullish,
    #[default]
    Bearish,
}

impl TieBreak {
    pub fn signal(&self) -> Signal {
        match self {
            TieBreak::Bullish => Signal::Bullish,
            TieBreak::Bearish => Signal::Bearish,
        }
    }
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bullish" => Ok(TieBreak::Bullish),
            "bearish" => Ok(TieBreak::Bearish),
            other => Err(format!("tie-break must be 'bullish' or 'bearish', got '{other}'")),
        }
    }
}

/// Metric computed once per (symbol, session). Also the persisted history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedMetric {
    /// Trading session the figures belong to
    pub date: NaiveDate,

    /// Symbol label
    pub symbol: String,

    /// Foreign institutional net open interest
    pub foreign_net: i64,

    /// Trust net open interest
    pub trust_net: i64,

    /// Top-5 specific institutional long minus short
    pub top5_spec_net: i64,

    /// top5_spec_net - trust_net
    pub big_foreign: i64,

    /// foreign_net - big_foreign
    pub small_foreign: i64,

    pub signal: Signal,
}

impl DerivedMetric {
    /// History key.
    pub fn key(&self) -> (NaiveDate, &str) {
        (self.date, self.symbol.as_str())
    }
}
