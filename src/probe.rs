//! Backward search for the most recent day both datasets were published.
//!
//! The exchange publishes nothing on weekends and holidays, and publishes
//! late on some evenings, so "today" is only a starting point. The probe
//! walks back one calendar day at a time, never revisiting a rejected day.

use chrono::{Days, FixedOffset, NaiveDate, Utc};
use tracing::{debug, info};

use crate::error::AcquisitionFailure;
use crate::models::{Dataset, SymbolScope};
use crate::sources::{Payload, SourceAdapter};

/// Exchange local time is UTC+8 all year.
const EXCHANGE_UTC_OFFSET_SECS: i32 = 8 * 3600;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 10;
pub const MAX_LOOKBACK_DAYS: u32 = 31;

/// A day for which both datasets were fetched and validated.
#[derive(Debug, Clone)]
pub struct TradingSession {
    pub date: NaiveDate,
    pub institutional: Payload,
    pub large_trader: Payload,
}

/// Candidate-day iterator over a bounded lookback window.
#[derive(Debug, Clone, Copy)]
pub struct DateProbe {
    lookback: u32,
}

impl Default for DateProbe {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl DateProbe {
    pub fn new(lookback: u32) -> Self {
        Self {
            lookback: lookback.max(1),
        }
    }

    pub fn lookback(&self) -> u32 {
        self.lookback
    }

    /// Find the latest day `<= start` with both datasets available.
    ///
    /// Candidates are `start - offset` for `offset` in `0..lookback`. The
    /// large-trader dataset is only requested once the institutional one has
    /// resolved for the same day.
    pub async fn find(
        &self,
        start: NaiveDate,
        institutional: &dyn SourceAdapter,
        large_trader: &dyn SourceAdapter,
        scope: &SymbolScope,
    ) -> Result<TradingSession, AcquisitionFailure> {
        let mut attempts = 0;
        let mut earliest = start;

        for offset in 0..self.lookback {
            let Some(candidate) = start.checked_sub_days(Days::new(u64::from(offset))) else {
                break;
            };
            attempts += 1;
            earliest = candidate;
            debug!(date = %candidate, offset, "Probing candidate day");

            let institutional_payload = match institutional
                .fetch(Dataset::Institutional, candidate, scope)
                .await
            {
                Ok(payload) => payload,
                Err(e) => {
                    info!(
                        date = %candidate,
                        dataset = %Dataset::Institutional,
                        source = institutional.name(),
                        reason = %e,
                        "Candidate day rejected"
                    );
                    continue;
                }
            };

            let large_trader_payload = match large_trader
                .fetch(Dataset::LargeTrader, candidate, scope)
                .await
            {
                Ok(payload) => payload,
                Err(e) => {
                    info!(
                        date = %candidate,
                        dataset = %Dataset::LargeTrader,
                        source = large_trader.name(),
                        reason = %e,
                        "Candidate day rejected"
                    );
                    continue;
                }
            };

            info!(
                date = %candidate,
                offset,
                institutional = %institutional_payload.transport,
                large_trader = %large_trader_payload.transport,
                "Trading session found"
            );
            return Ok(TradingSession {
                date: candidate,
                institutional: institutional_payload,
                large_trader: large_trader_payload,
            });
        }

        Err(AcquisitionFailure {
            start,
            earliest,
            attempts,
        })
    }
}

/// Current calendar date at the exchange.
pub fn exchange_today() -> NaiveDate {
    match FixedOffset::east_opt(EXCHANGE_UTC_OFFSET_SECS) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}
