//! Data models for symbols, parsed tables, positions, and derived metrics.

mod metrics;
mod position;
mod symbol;
mod table;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use metrics::{DerivedMetric, Signal, TieBreak};
pub use position::{EntityKind, InstitutionalPosition, LargeTraderPosition, RawFigures};
pub use symbol::{Symbol, SymbolScope};
pub use table::{ColumnSpec, Table};

/// The two independently published exchange datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Open interest by institutional investor group
    Institutional,
    /// Open interest of the largest traders
    LargeTrader,
}

impl Dataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Institutional => "institutional",
            Dataset::LargeTrader => "large-trader",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
