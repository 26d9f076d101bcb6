//! Derivation of the small-foreign metric from the four raw figures.

use chrono::NaiveDate;

use crate::error::DerivationError;
use crate::models::{DerivedMetric, RawFigures, Signal, TieBreak};

/// Pure integer arithmetic turning raw figures into a [`DerivedMetric`].
///
/// ```text
/// top5_spec_net = top5_long - top5_short
/// big_foreign   = top5_spec_net - trust_net
/// small_foreign = foreign_net - big_foreign
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricDeriver {
    tie_break: TieBreak,
}

impl MetricDeriver {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// Compute the metric for one symbol and session.
    pub fn derive(
        &self,
        symbol: &str,
        date: NaiveDate,
        figures: RawFigures,
    ) -> Result<DerivedMetric, DerivationError> {
        let top5_spec_net = figures
            .top5_long
            .checked_sub(figures.top5_short)
            .ok_or(DerivationError("top5_spec_net"))?;
        let big_foreign = top5_spec_net
            .checked_sub(figures.trust_net)
            .ok_or(DerivationError("big_foreign"))?;
        let small_foreign = figures
            .foreign_net
            .checked_sub(big_foreign)
            .ok_or(DerivationError("small_foreign"))?;

        Ok(DerivedMetric {
            date,
            symbol: symbol.to_string(),
            foreign_net: figures.foreign_net,
            trust_net: figures.trust_net,
            top5_spec_net,
            big_foreign,
            small_foreign,
            signal: self.classify(small_foreign),
        })
    }

    /// Positive is bullish, negative bearish, zero goes to the tie-break.
    pub fn classify(&self, small_foreign: i64) -> Signal {
        match small_foreign {
            v if v > 0 => Signal::Bullish,
            v if v < 0 => Signal::Bearish,
            _ => self.tie_break.signal(),
        }
    }
}
