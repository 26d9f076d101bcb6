//! Symbol descriptor: how one futures product is named by each upstream source.

use serde::{Deserialize, Serialize};

/// A futures product tracked by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Short label used in reports and in the history file
    pub label: String,

    /// Substring matched against the exchange's product-name cell
    pub display_name: String,

    /// Commodity id (e.g. "TX"). Narrows download and page queries and is
    /// matched against the feed's contract-code column.
    #[serde(default)]
    pub download_id: Option<String>,

    /// Partition name when history is stored one file per symbol
    #[serde(default)]
    pub store_name: Option<String>,
}

impl Symbol {
    pub fn new(label: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            display_name: display_name.into(),
            download_id: None,
            store_name: None,
        }
    }

    /// Attach the commodity id shared by the download endpoints and the feed.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.download_id = Some(code.into());
        self
    }

    /// Upstream names append variant suffixes and codes, so this is
    /// containment rather than equality.
    pub fn matches(&self, cell: &str) -> bool {
        !self.display_name.is_empty() && cell.contains(self.display_name.as_str())
    }

    /// Name of this symbol's file when history is partitioned per symbol.
    pub fn partition_name(&self) -> &str {
        self.store_name
            .as_deref()
            .or(self.download_id.as_deref())
            .unwrap_or(&self.label)
    }
}

/// Which products a single fetch should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolScope {
    /// Every product the exchange publishes for the day
    All,
    /// Only the product with this commodity id
    Only(String),
}

impl SymbolScope {
    /// Commodity id form field; empty selects all products.
    pub fn commodity_id(&self) -> &str {
        match self {
            SymbolScope::All => "",
            SymbolScope::Only(id) => id,
        }
    }
}
