//! Outcome of one run and its rendering as a chat message.

use chrono::NaiveDate;

use crate::error::AcquisitionFailure;
use crate::models::DerivedMetric;
use crate::sources::Transport;

/// A symbol that produced no history row this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSkip {
    /// Symbol label
    pub symbol: String,

    /// Human-readable cause
    pub reason: String,
}

/// Which transports delivered the session's two datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSource {
    pub institutional: Transport,
    pub large_trader: Transport,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        session: NaiveDate,
        source: SessionSource,
        /// Derived metrics, in configured symbol order
        metrics: Vec<DerivedMetric>,
        /// Symbols whose figures could not be located or derived
        misses: Vec<SymbolSkip>,
        /// Metrics derived but not persisted
        unsaved: Vec<SymbolSkip>,
    },
    AcquisitionFailed(AcquisitionFailure),
}

/// Everything one run produced.
#[derive(Debug)]
pub struct RunReport {
    /// Day the backward search started from
    pub start: NaiveDate,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn metrics(&self) -> &[DerivedMetric] {
        match &self.outcome {
            RunOutcome::Completed { metrics, .. } => metrics,
            RunOutcome::AcquisitionFailed(_) => &[],
        }
    }

    /// Markdown message: one block per derived symbol, then an advisory line
    /// per skipped symbol. A failed acquisition renders a single advisory.
    pub fn render(&self) -> String {
        match &self.outcome {
            RunOutcome::AcquisitionFailed(failure) => format!(
                "⚠️ *每日小外資籌碼報告* ({})\n\n\
                 No trading session with both datasets in the last {} days \
                 ({} to {}). History unchanged.",
                self.start.format("%Y/%m/%d"),
                failure.attempts,
                failure.earliest.format("%Y/%m/%d"),
                failure.start.format("%Y/%m/%d"),
            ),
            RunOutcome::Completed {
                session,
                metrics,
                misses,
                unsaved,
                ..
            } => {
                let mut msg = format!("📊 *每日小外資籌碼報告* ({})\n\n", session.format("%Y/%m/%d"));
                if *session != self.start {
                    msg.push_str(&format!(
                        "_Latest published session; {} had no data._\n\n",
                        self.start.format("%Y/%m/%d")
                    ));
                }

                for m in metrics {
                    msg.push_str(&format!("【{}】\n", escape_markdown(&m.symbol)));
                    msg.push_str(&format!("▫️ 外資留倉: {}\n", m.foreign_net));
                    msg.push_str(&format!("▫️ 大外資: {}\n", m.big_foreign));
                    msg.push_str(&format!("▫️ *小外資: {}*\n", m.small_foreign));
                    msg.push_str(&format!("💡 隔日預測: {} {}\n\n", m.signal.emoji(), m.signal));
                }

                for skip in misses {
                    msg.push_str(&format!(
                        "⚠️ {}: skipped ({})\n",
                        escape_markdown(&skip.symbol),
                        escape_markdown(&skip.reason)
                    ));
                }
                for skip in unsaved {
                    msg.push_str(&format!(
                        "⚠️ {}: not saved ({})\n",
                        escape_markdown(&skip.symbol),
                        escape_markdown(&skip.reason)
                    ));
                }

                msg.trim_end().to_string()
            }
        }
    }
}

/// Backslash-escape the characters that open an entity in Telegram's legacy
/// Markdown. Skip reasons quote upstream cell text, and one stray `_` makes
/// the whole message fail to parse.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Signal;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn completed(start: NaiveDate, misses: Vec<SymbolSkip>) -> RunReport {
        RunReport {
            start,
            outcome: RunOutcome::Completed {
                session: day(5),
                source: SessionSource {
                    institutional: Transport::Download,
                    large_trader: Transport::Rendered,
                },
                metrics: vec![DerivedMetric {
                    date: day(5),
                    symbol: "台指期".to_string(),
                    foreign_net: 12000,
                    trust_net: -3000,
                    top5_spec_net: 15000,
                    big_foreign: 18000,
                    small_foreign: -6000,
                    signal: Signal::Bearish,
                }],
                misses,
                unsaved: vec![],
            },
        }
    }

    #[test]
    fn test_render_success_block() {
        let text = completed(day(5), vec![]).render();
        assert!(text.starts_with("📊 *每日小外資籌碼報告* (2024/01/05)"));
        assert!(text.contains("【台指期】"));
        assert!(text.contains("▫️ 外資留倉: 12000"));
        assert!(text.contains("▫️ 大外資: 18000"));
        assert!(text.contains("*小外資: -6000*"));
        assert!(text.contains("🔴 BEARISH"));
        assert!(!text.contains("⚠️"));
        assert!(!text.contains("had no data"));
    }

    #[test]
    fn test_render_partial_advisory() {
        let report = completed(
            day(8),
            vec![SymbolSkip {
                symbol: "那指期".to_string(),
                reason: "no large-trader rows".to_string(),
            }],
        );
        let text = report.render();
        assert!(text.contains("2024/01/08 had no data"));
        assert!(text.contains("⚠️ 那指期: skipped (no large-trader rows)"));
        assert_eq!(report.metrics().len(), 1);
        assert!(matches!(report.outcome, RunOutcome::Completed { .. }));
    }

    #[test]
    fn test_render_escapes_upstream_text_in_advisories() {
        let report = completed(
            day(5),
            vec![SymbolSkip {
                symbol: "mini_tx".to_string(),
                reason: "net open interest: not a number: \"n_a*\" [`x`]".to_string(),
            }],
        );
        let text = report.render();
        assert!(text.contains(
            r#"⚠️ mini\_tx: skipped (net open interest: not a number: "n\_a\*" \[\`x\`])"#
        ));
        // Formatting of the report itself is untouched.
        assert!(text.contains("*小外資: -6000*"));
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("臺股期貨"), "臺股期貨");
        assert_eq!(escape_markdown("a_b*c"), r"a\_b\*c");
    }

    #[test]
    fn test_render_acquisition_failure() {
        let report = RunReport {
            start: day(14),
            outcome: RunOutcome::AcquisitionFailed(AcquisitionFailure {
                start: day(14),
                earliest: day(5),
                attempts: 10,
            }),
        };
        let text = report.render();
        assert!(text.contains("last 10 days"));
        assert!(text.contains("2024/01/05 to 2024/01/14"));
        assert!(text.contains("History unchanged"));
        assert!(report.metrics().is_empty());
        assert!(matches!(report.outcome, RunOutcome::AcquisitionFailed(_)));
    }
}
