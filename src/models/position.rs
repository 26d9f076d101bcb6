//! Position figures extracted from the two exchange datasets.

use serde::{Deserialize, Serialize};

/// Which institutional investor group a row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ForeignInstitutional,
    Trust,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ForeignInstitutional => "foreign-institutional",
            EntityKind::Trust => "trust",
        }
    }
}

/// Net open interest held by one institutional group in one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionalPosition {
    /// Symbol label
    pub symbol: String,

    /// Investor group
    pub kind: EntityKind,

    /// Long minus short open interest, in contracts
    pub net_open_interest: i64,
}

/// Top-5 specific-institutional open interest across all contract months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeTraderPosition {
    /// Symbol label
    pub symbol: String,

    /// Long open interest of the five largest specific institutions
    pub top5_long: i64,

    /// Short open interest of the five largest specific institutions
    pub top5_short: i64,
}

/// The four integers the derivation needs, in extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFigures {
    pub foreign_net: i64,
    pub trust_net: i64,
    pub top5_long: i64,
    pub top5_short: i64,
}

impl RawFigures {
    pub fn new(foreign_net: i64, trust_net: i64, top5_long: i64, top5_short: i64) -> Self {
        Self {
            foreign_net,
            trust_net,
            top5_long,
            top5_short,
        }
    }

    /// Flatten the located positions into the derivation inputs.
    pub fn from_positions(
        foreign: &InstitutionalPosition,
        trust: &InstitutionalPosition,
        large: &LargeTraderPosition,
    ) -> Self {
        Self::new(
            foreign.net_open_interest,
            trust.net_open_interest,
            large.top5_long,
            large.top5_short,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_positions_keeps_order() {
        let foreign = InstitutionalPosition {
            symbol: "TX".to_string(),
            kind: EntityKind::ForeignInstitutional,
            net_open_interest: 12000,
        };
        let trust = InstitutionalPosition {
            symbol: "TX".to_string(),
            kind: EntityKind::Trust,
            net_open_interest: -3000,
        };
        let large = LargeTraderPosition {
            symbol: "TX".to_string(),
            top5_long: 20000,
            top5_short: 5000,
        };

        let figures = RawFigures::from_positions(&foreign, &trust, &large);
        assert_eq!(figures, RawFigures::new(12000, -3000, 20000, 5000));
    }
}
