//! Row resolution inside the institutional and large-trader tables.

use tracing::debug;

use crate::error::LookupMiss;
use crate::models::{
    Dataset, EntityKind, InstitutionalPosition, LargeTraderPosition, RawFigures, Symbol, Table,
};
use crate::sources::Payload;

use super::layout::{self, InstitutionalLayout, LargeTraderLayout};

/// Extracts one symbol's figures from a session's two payloads.
pub struct TableLocator;

impl TableLocator {
    /// Resolve `(foreign_net, trust_net, top5_long, top5_short)` for `symbol`.
    pub fn locate(
        institutional: &Payload,
        large_trader: &Payload,
        symbol: &Symbol,
    ) -> Result<RawFigures, LookupMiss> {
        let (foreign, trust) = Self::institutional_positions(
            &institutional.table,
            layout::institutional(institutional.transport),
            symbol,
        )?;
        let large = Self::large_trader_position(
            &large_trader.table,
            layout::large_trader(large_trader.transport),
            symbol,
        )?;

        debug!(
            symbol = %symbol.label,
            foreign = foreign.net_open_interest,
            trust = trust.net_open_interest,
            top5_long = large.top5_long,
            top5_short = large.top5_short,
            "Located figures"
        );

        Ok(RawFigures::from_positions(&foreign, &trust, &large))
    }

    /// Find the foreign institutional and trust rows for a symbol.
    ///
    /// Rows are told apart by their identity label, never by position: the
    /// order of investor groups inside a product block is not stable.
    pub fn institutional_positions(
        table: &Table,
        layout: &InstitutionalLayout,
        symbol: &Symbol,
    ) -> Result<(InstitutionalPosition, InstitutionalPosition), LookupMiss> {
        let mut matched = false;
        let mut foreign = None;
        let mut trust = None;

        for row in table.rows() {
            let Ok(name) = row.get(&layout.name) else {
                continue;
            };
            if !symbol.matches(name) {
                continue;
            }
            matched = true;

            let identity = row.get(&layout.identity)?;
            let kind = if identity.contains(layout.foreign_label) {
                EntityKind::ForeignInstitutional
            } else if identity.contains(layout.trust_label) {
                EntityKind::Trust
            } else {
                continue;
            };

            let slot = match kind {
                EntityKind::ForeignInstitutional => &mut foreign,
                EntityKind::Trust => &mut trust,
            };
            if slot.is_some() {
                continue;
            }

            let column = &layout.net_open_interest;
            *slot = Some(InstitutionalPosition {
                symbol: symbol.label.clone(),
                kind,
                net_open_interest: parse_count(row.get(column)?, column.name)?,
            });
        }

        if !matched {
            return Err(LookupMiss::SymbolNotFound {
                symbol: symbol.display_name.clone(),
                dataset: Dataset::Institutional,
            });
        }

        let foreign = foreign.ok_or_else(|| LookupMiss::RowMissing {
            symbol: symbol.display_name.clone(),
            row: EntityKind::ForeignInstitutional.as_str(),
        })?;
        let trust = trust.ok_or_else(|| LookupMiss::RowMissing {
            symbol: symbol.display_name.clone(),
            row: EntityKind::Trust.as_str(),
        })?;

        Ok((foreign, trust))
    }

    /// Find the all-months, specific-institutional top-5 row for a symbol.
    pub fn large_trader_position(
        table: &Table,
        layout: &LargeTraderLayout,
        symbol: &Symbol,
    ) -> Result<LargeTraderPosition, LookupMiss> {
        let mut matched = false;

        for row in table.rows() {
            let Ok(name) = row.get(&layout.name) else {
                continue;
            };
            if !symbol.matches(name) {
                continue;
            }
            matched = true;

            let month = normalize_code(row.get(&layout.month)?);
            let category = normalize_code(row.get(&layout.category)?);
            if month != layout.all_months || category != layout.specific_category {
                continue;
            }

            return Ok(LargeTraderPosition {
                symbol: symbol.label.clone(),
                top5_long: parse_count(row.get(&layout.top5_long)?, layout.top5_long.name)?,
                top5_short: parse_count(row.get(&layout.top5_short)?, layout.top5_short.name)?,
            });
        }

        if matched {
            Err(LookupMiss::RowMissing {
                symbol: symbol.display_name.clone(),
                row: "all-months specific-institutional",
            })
        } else {
            Err(LookupMiss::SymbolNotFound {
                symbol: symbol.display_name.clone(),
                dataset: Dataset::LargeTrader,
            })
        }
    }
}

/// Parse a contract count that may carry thousands separators or a
/// fractional part ("12,345", "-2000.0"). Truncates toward zero.
pub fn parse_count(value: &str, column: &'static str) -> Result<i64, LookupMiss> {
    let cleaned: String = value
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let not_numeric = || LookupMiss::NotNumeric {
        column,
        value: value.to_string(),
    };

    let parsed: f64 = cleaned.parse().map_err(|_| not_numeric())?;
    // i64::MAX is not representable as f64; 2^63 is the first value out of range.
    if !parsed.is_finite() || parsed.abs() >= 9_223_372_036_854_775_808.0 {
        return Err(not_numeric());
    }
    Ok(parsed.trunc() as i64)
}

/// Normalize a sentinel cell: numeric text loses its trailing `.0`
/// ("999999.0" becomes "999999"); anything else loses all whitespace, since
/// a rendered `所有<br>契約` arrives as "所有 契約".
pub fn normalize_code(value: &str) -> String {
    let trimmed = value.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        _ => trimmed.chars().filter(|c| !c.is_whitespace()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Transport;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn institutional_row(name: &str, identity: &str, net: &str) -> Vec<String> {
        let mut row = strings(&["2024/01/05", name, identity]);
        row.extend((0..10).map(|i| i.to_string()));
        row.push(net.to_string());
        row.push("0".to_string());
        row
    }

    fn institutional_table() -> Table {
        Table::new(
            vec![],
            vec![
                institutional_row("TaiwanIndexFutures(TX)", "自營商", "-1500"),
                institutional_row("TaiwanIndexFutures(TX)", "投信", "-2,000"),
                institutional_row("TaiwanIndexFutures(TX)", "外資及陸資", "10000.0"),
                institutional_row("USNasdaq100Futures", "外資及陸資", "77"),
                institutional_row("USNasdaq100Futures", "投信", "3"),
            ],
        )
    }

    fn large_trader_table() -> Table {
        let headers = strings(&[
            "日期",
            "商品(契約)",
            "商品名稱",
            "到期月份(週別)",
            "交易人類別",
            "前五大交易人買方",
            "前五大交易人賣方",
        ]);
        Table::new(
            headers,
            vec![
                strings(&["2024/01/05", "TX", "TaiwanIndexFutures", "202401", "1", "9", "9"]),
                strings(&["2024/01/05", "TX", "TaiwanIndexFutures", "999999.0", "0.0", "8", "8"]),
                strings(&["2024/01/05", "TX", "TaiwanIndexFutures", "999999.0", "1.0", "15000", "7000"]),
                strings(&["2024/01/05", "UNF", "USNasdaq100Futures", "999999", "1", "40", "20"]),
            ],
        )
    }

    fn symbol(name: &str) -> Symbol {
        Symbol::new("TX", name)
    }

    #[test]
    fn test_institutional_rows_by_identity_label() {
        let table = institutional_table();
        let (foreign, trust) = TableLocator::institutional_positions(
            &table,
            layout::institutional(Transport::Download),
            &symbol("TaiwanIndexFutures"),
        )
        .unwrap();

        assert_eq!(foreign.kind, EntityKind::ForeignInstitutional);
        assert_eq!(foreign.net_open_interest, 10000);
        assert_eq!(trust.kind, EntityKind::Trust);
        assert_eq!(trust.net_open_interest, -2000);
    }

    #[test]
    fn test_containment_does_not_cross_products() {
        let table = institutional_table();
        let (foreign, _) = TableLocator::institutional_positions(
            &table,
            layout::institutional(Transport::Download),
            &symbol("USNasdaq100Futures"),
        )
        .unwrap();
        assert_eq!(foreign.net_open_interest, 77);
    }

    #[test]
    fn test_missing_trust_row() {
        let table = Table::new(
            vec![],
            vec![institutional_row("TaiwanIndexFutures", "外資及陸資", "1")],
        );
        let err = TableLocator::institutional_positions(
            &table,
            layout::institutional(Transport::Download),
            &symbol("TaiwanIndexFutures"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LookupMiss::RowMissing {
                symbol: "TaiwanIndexFutures".to_string(),
                row: "trust",
            }
        );
    }

    #[test]
    fn test_unknown_symbol() {
        let err = TableLocator::institutional_positions(
            &institutional_table(),
            layout::institutional(Transport::Download),
            &symbol("JapanNikkeiFutures"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LookupMiss::SymbolNotFound {
                dataset: Dataset::Institutional,
                ..
            }
        ));
    }

    #[test]
    fn test_large_trader_requires_both_sentinels() {
        let position = TableLocator::large_trader_position(
            &large_trader_table(),
            layout::large_trader(Transport::Download),
            &symbol("TaiwanIndexFutures"),
        )
        .unwrap();
        assert_eq!(position.top5_long, 15000);
        assert_eq!(position.top5_short, 7000);
    }

    #[test]
    fn test_large_trader_without_specific_row() {
        let table = Table::new(
            vec![],
            vec![strings(&["d", "TX", "TaiwanIndexFutures", "999999", "0", "1", "1"])],
        );
        let err = TableLocator::large_trader_position(
            &table,
            layout::large_trader(Transport::Download),
            &symbol("TaiwanIndexFutures"),
        )
        .unwrap_err();
        assert!(matches!(err, LookupMiss::RowMissing { .. }));
    }

    #[test]
    fn test_non_numeric_cell_is_a_miss() {
        let table = Table::new(
            vec![],
            vec![
                institutional_row("TaiwanIndexFutures", "外資", "n/a"),
                institutional_row("TaiwanIndexFutures", "投信", "1"),
            ],
        );
        let err = TableLocator::institutional_positions(
            &table,
            layout::institutional(Transport::Download),
            &symbol("TaiwanIndexFutures"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LookupMiss::NotNumeric {
                column: "net open interest",
                value: "n/a".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_count_variants() {
        assert_eq!(parse_count("12,345", "c"), Ok(12345));
        assert_eq!(parse_count("-2000.0", "c"), Ok(-2000));
        assert_eq!(parse_count(" 7.9 ", "c"), Ok(7));
        assert_eq!(parse_count("-7.9", "c"), Ok(-7));
        assert!(parse_count("", "c").is_err());
        assert!(parse_count("NaN", "c").is_err());
        assert!(parse_count("1e30", "c").is_err());
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("999999.0"), "999999");
        assert_eq!(normalize_code(" 1.0 "), "1");
        assert_eq!(normalize_code("1"), "1");
        assert_eq!(normalize_code("所有契約"), "所有契約");
        assert_eq!(normalize_code("所有 契約"), "所有契約");
        assert_eq!(normalize_code(" 特定\n法人 "), "特定法人");
        assert_eq!(normalize_code("202401W2"), "202401W2");
    }
}
