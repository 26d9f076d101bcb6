//! One acquisition-and-derivation cycle.
//!
//! Probe for the latest session, locate each symbol's figures, derive the
//! metric, upsert it into history and hand the rendered report to a
//! notifier. A symbol that cannot be located is skipped with an advisory;
//! only a failed acquisition aborts the cycle, and then history is untouched.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::LookupMiss;
use crate::locate::TableLocator;
use crate::metrics::MetricDeriver;
use crate::models::{DerivedMetric, Symbol, SymbolScope};
use crate::notify::Notifier;
use crate::probe::{DateProbe, TradingSession};
use crate::report::{RunOutcome, RunReport, SessionSource, SymbolSkip};
use crate::sources::{build_chain, SourceAdapter};
use crate::store::HistoryStore;

/// The wired components of a run.
pub struct Pipeline {
    symbols: Vec<Symbol>,
    probe: DateProbe,
    institutional: Box<dyn SourceAdapter>,
    large_trader: Box<dyn SourceAdapter>,
    deriver: MetricDeriver,
    /// `None` in dry-run mode
    store: Option<HistoryStore>,
}

impl Pipeline {
    pub fn new(
        symbols: Vec<Symbol>,
        probe: DateProbe,
        institutional: Box<dyn SourceAdapter>,
        large_trader: Box<dyn SourceAdapter>,
        deriver: MetricDeriver,
        store: Option<HistoryStore>,
    ) -> Self {
        Self {
            symbols,
            probe,
            institutional,
            large_trader,
            deriver,
            store,
        }
    }

    /// Build the configured transports and store. `dry_run` leaves history
    /// untouched.
    pub fn from_config(config: &AppConfig, dry_run: bool) -> Result<Self> {
        let settings = config.source_settings();
        let institutional = build_chain(&config.institutional_sources, &settings)
            .context("Failed to build institutional sources")?;
        let large_trader = build_chain(&config.large_trader_sources, &settings)
            .context("Failed to build large-trader sources")?;

        let store = if dry_run {
            None
        } else {
            Some(HistoryStore::new(config.history_path.clone(), config.partition))
        };

        Ok(Self::new(
            config.symbols.clone(),
            DateProbe::new(config.lookback_days),
            Box::new(institutional),
            Box::new(large_trader),
            MetricDeriver::new(config.tie_break),
            store,
        ))
    }

    /// A lone symbol with a commodity id narrows the upstream query;
    /// otherwise every product is requested and filtered locally.
    fn scope(&self) -> SymbolScope {
        match self.symbols.as_slice() {
            [only] => only
                .download_id
                .clone()
                .map(SymbolScope::Only)
                .unwrap_or(SymbolScope::All),
            _ => SymbolScope::All,
        }
    }

    /// Run one cycle starting the backward search at `start`.
    pub async fn run_once(&self, start: NaiveDate) -> RunReport {
        info!(
            start = %start,
            lookback = self.probe.lookback(),
            institutional = self.institutional.name(),
            large_trader = self.large_trader.name(),
            "Starting run"
        );

        let session = match self
            .probe
            .find(
                start,
                self.institutional.as_ref(),
                self.large_trader.as_ref(),
                &self.scope(),
            )
            .await
        {
            Ok(session) => session,
            Err(failure) => {
                error!(error = %failure, "Acquisition failed");
                return RunReport {
                    start,
                    outcome: RunOutcome::AcquisitionFailed(failure),
                };
            }
        };

        let mut metrics = Vec::with_capacity(self.symbols.len());
        let mut misses = Vec::new();
        let mut unsaved = Vec::new();

        for symbol in &self.symbols {
            let metric = match self.derive(&session, symbol) {
                Ok(metric) => metric,
                Err(miss) => {
                    warn!(symbol = %symbol.label, date = %session.date, reason = %miss, "Symbol skipped");
                    misses.push(SymbolSkip {
                        symbol: symbol.label.clone(),
                        reason: miss.to_string(),
                    });
                    continue;
                }
            };

            info!(
                symbol = %metric.symbol,
                date = %metric.date,
                small_foreign = metric.small_foreign,
                signal = %metric.signal,
                "Metric derived"
            );

            if let Some(store) = &self.store {
                match store.upsert(symbol, &metric) {
                    Ok(path) => info!(symbol = %symbol.label, path = %path.display(), "History saved"),
                    Err(e) => {
                        error!(symbol = %symbol.label, error = %e, "Failed to save history");
                        unsaved.push(SymbolSkip {
                            symbol: symbol.label.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            metrics.push(metric);
        }

        RunReport {
            start,
            outcome: RunOutcome::Completed {
                session: session.date,
                source: SessionSource {
                    institutional: session.institutional.transport,
                    large_trader: session.large_trader.transport,
                },
                metrics,
                misses,
                unsaved,
            },
        }
    }

    /// Run one cycle and deliver its report. Delivery failures are logged
    /// and otherwise ignored.
    pub async fn run_and_notify(&self, start: NaiveDate, notifier: &dyn Notifier) -> RunReport {
        let report = self.run_once(start).await;
        let text = report.render();

        match notifier.send(&text).await {
            Ok(()) => info!(notifier = notifier.name(), "Report delivered"),
            Err(e) => warn!(notifier = notifier.name(), error = %e, "Report delivery failed"),
        }

        report
    }

    fn derive(&self, session: &TradingSession, symbol: &Symbol) -> Result<DerivedMetric, LookupMiss> {
        let figures =
            TableLocator::locate(&session.institutional, &session.large_trader, symbol)?;
        Ok(self.deriver.derive(&symbol.label, session.date, figures)?)
    }
}
