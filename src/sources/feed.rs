//! Structured-feed strategy: the exchange's JSON open-data API.
//!
//! The feed only ever carries the most recent published day, so a request
//! for any other date comes back as [`TransportError::StaleFeed`] and the date
//! probe moves on.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TransportError;
use crate::locate::layout;
use crate::models::{ColumnSpec, Dataset, SymbolScope, Table};

use super::{http_client, Payload, SourceAdapter, Transport};

const DATE_COLUMN: ColumnSpec = ColumnSpec::new("date", &["Date", "日期"], 0);
const CODE_COLUMN: ColumnSpec =
    ColumnSpec::new("contract code", &["ContractCode", "商品代號", "契約"], 1);

/// Reads the exchange's JSON open-data endpoints.
pub struct FeedSource {
    client: Client,
    base_url: String,
}

impl FeedSource {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = http_client(timeout, false).context("Failed to create HTTP client")?;
        Ok(Self { client, base_url })
    }

    fn url(&self, dataset: Dataset) -> String {
        let path = match dataset {
            Dataset::Institutional => {
                "/v1/MarketDataOfMajorInstitutionalTradersDetailsOfFuturesContractsBytheDate"
            }
            Dataset::LargeTrader => "/v1/OpenInterestOfLargeTradersFutures",
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl SourceAdapter for FeedSource {
    fn name(&self) -> &str {
        "feed"
    }

    async fn fetch(
        &self,
        dataset: Dataset,
        date: NaiveDate,
        scope: &SymbolScope,
    ) -> Result<Payload, TransportError> {
        let url = self.url(dataset);
        debug!(url = %url, date = %date, "Fetching feed");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let table = read_feed(&body, dataset, date, scope)?;

        Ok(Payload {
            dataset,
            transport: Transport::Feed,
            table,
        })
    }
}

/// Parse a JSON array of flat records. Column order follows the keys of the
/// first record.
pub fn parse_feed(body: &str) -> Result<Table, TransportError> {
    let trimmed = body.trim_start();
    if trimmed.is_empty() {
        return Err(TransportError::Empty);
    }
    if trimmed.starts_with('<') {
        return Err(TransportError::Markup { expected: "JSON" });
    }

    let records: Vec<Map<String, Value>> =
        serde_json::from_str(trimmed).map_err(|e| TransportError::Decode(e.to_string()))?;

    let Some(first) = records.first() else {
        return Err(TransportError::Empty);
    };
    let headers: Vec<String> = first.keys().cloned().collect();

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|key| record.get(key).map(value_text).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(Table::new(headers, rows))
}

/// Parse, check the record keys belong to `dataset`, then keep the rows for
/// `date` and, when the scope names one product, that product's rows.
fn read_feed(
    body: &str,
    dataset: Dataset,
    date: NaiveDate,
    scope: &SymbolScope,
) -> Result<Table, TransportError> {
    let mut table = parse_feed(body)?;
    check_keys(&table, dataset)?;

    retain_date(&mut table, date);
    if table.is_empty() {
        return Err(TransportError::StaleFeed(date));
    }
    retain_scope(&mut table, scope);
    Ok(table)
}

/// Every feed answers with a JSON array, so a dataset is recognised by the
/// record keys its figures are read from.
fn check_keys(table: &Table, dataset: Dataset) -> Result<(), TransportError> {
    let required = match dataset {
        Dataset::Institutional => {
            let l = layout::institutional(Transport::Feed);
            vec![l.identity, l.net_open_interest]
        }
        Dataset::LargeTrader => {
            let l = layout::large_trader(Transport::Feed);
            vec![l.category, l.top5_long]
        }
    };
    match required.iter().find(|c| table.header_position(c).is_none()) {
        Some(column) => Err(TransportError::MissingMarker(column.name)),
        None => Ok(()),
    }
}

/// Keep only rows whose contract code equals the scoped commodity id.
/// Tables without a code column are left alone.
fn retain_scope(table: &mut Table, scope: &SymbolScope) {
    let SymbolScope::Only(code) = scope else {
        return;
    };
    if table.header_position(&CODE_COLUMN).is_none() {
        return;
    }
    table.retain(|row| {
        row.get(&CODE_COLUMN)
            .map(|c| c.eq_ignore_ascii_case(code))
            .unwrap_or(false)
    });
}

/// Keep only records published for `date`. Dates may be written
/// `20240105`, `2024/01/05` or `2024-01-05`.
fn retain_date(table: &mut Table, date: NaiveDate) {
    let wanted = date.format("%Y%m%d").to_string();
    table.retain(|row| {
        row.get(&DATE_COLUMN)
            .map(|d| d.chars().filter(char::is_ascii_digit).collect::<String>() == wanted)
            .unwrap_or(false)
    });
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupMiss;
    use crate::locate::TableLocator;
    use crate::models::Symbol;

    const FEED: &str = r#"[
        {"Date":"20240105","ContractCode":"TX","ContractName":"臺股期貨","Item":"外資及陸資","OpenInterest(Net)":10000},
        {"Date":"20240105","ContractCode":"TX","ContractName":"臺股期貨","Item":"投信","OpenInterest(Net)":-2000.0},
        {"Date":"20240104","ContractCode":"TX","ContractName":"臺股期貨","Item":"投信","OpenInterest(Net)":null}
    ]"#;

    #[test]
    fn test_parse_feed_keeps_key_order() {
        let table = parse_feed(FEED).unwrap();
        assert_eq!(table.headers()[0], "Date");
        assert_eq!(table.headers()[4], "OpenInterest(Net)");
        assert_eq!(table.len(), 3);

        let second = table.rows().nth(1).unwrap();
        assert_eq!(second.cells()[4], "-2000.0");
        assert_eq!(table.rows().nth(2).unwrap().cells()[4], "");
    }

    #[test]
    fn test_retain_date_filters_other_days() {
        let mut table = parse_feed(FEED).unwrap();
        retain_date(&mut table, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(table.len(), 2);

        retain_date(&mut table, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert!(table.is_empty());
    }

    #[test]
    fn test_html_body_is_rejected() {
        let err = parse_feed("<html><body>502 Bad Gateway</body></html>").unwrap_err();
        assert!(matches!(err, TransportError::Markup { expected: "JSON" }));
    }

    #[test]
    fn test_non_array_body_is_rejected() {
        assert!(matches!(
            parse_feed(r#"{"message":"error"}"#),
            Err(TransportError::Decode(_))
        ));
        assert!(matches!(parse_feed("[]"), Err(TransportError::Empty)));
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    const INSTITUTIONAL_FEED: &str = r#"[
        {"Date":"20240105","ContractCode":"TX","ContractName":"臺股期貨","Item":"自營商","OpenInterest(Net)":"-1500"},
        {"Date":"20240105","ContractCode":"TX","ContractName":"臺股期貨","Item":"投信","OpenInterest(Net)":"-2000"},
        {"Date":"20240105","ContractCode":"TX","ContractName":"臺股期貨","Item":"外資及陸資","OpenInterest(Net)":"12000"},
        {"Date":"20240105","ContractCode":"UNF","ContractName":"美國那斯達克100期貨","Item":"投信","OpenInterest(Net)":"3"},
        {"Date":"20240105","ContractCode":"UNF","ContractName":"美國那斯達克100期貨","Item":"外資及陸資","OpenInterest(Net)":"-77"}
    ]"#;

    // Month and category arrive as numbers; the short side uses a key no
    // alias knows, so it is read by position.
    const LARGE_TRADER_FEED: &str = r#"[
        {"Date":"2024/01/05","ContractCode":"TX","ContractName":"臺股期貨","ContractMonth(Week)":"202401","TypeOfTraders":"1","TopFiveBuy":"9","Top5SellOI":"9"},
        {"Date":"2024/01/05","ContractCode":"TX","ContractName":"臺股期貨","ContractMonth(Week)":999999,"TypeOfTraders":0,"TopFiveBuy":"30,000","Top5SellOI":"28,000"},
        {"Date":"2024/01/05","ContractCode":"TX","ContractName":"臺股期貨","ContractMonth(Week)":999999,"TypeOfTraders":1,"TopFiveBuy":"15,000","Top5SellOI":"7,000"},
        {"Date":"2024/01/05","ContractCode":"UNF","ContractName":"美國那斯達克100期貨","ContractMonth(Week)":999999,"TypeOfTraders":1,"TopFiveBuy":"40","Top5SellOI":"20"}
    ]"#;

    #[test]
    fn test_unrelated_array_is_rejected_for_both_datasets() {
        let body = r#"[{"Date":"20240105","Weather":"sunny","Temp":"25"}]"#;
        for dataset in [Dataset::Institutional, Dataset::LargeTrader] {
            let err = read_feed(body, dataset, day(5), &SymbolScope::All).unwrap_err();
            assert!(matches!(err, TransportError::MissingMarker(_)), "{dataset:?}: {err:?}");
        }
    }

    #[test]
    fn test_datasets_are_not_interchangeable() {
        let err = read_feed(INSTITUTIONAL_FEED, Dataset::LargeTrader, day(5), &SymbolScope::All)
            .unwrap_err();
        assert!(matches!(err, TransportError::MissingMarker("trader category")));

        let err = read_feed(LARGE_TRADER_FEED, Dataset::Institutional, day(5), &SymbolScope::All)
            .unwrap_err();
        assert!(matches!(err, TransportError::MissingMarker("identity")));
    }

    #[test]
    fn test_stale_feed_after_key_check() {
        let err = read_feed(INSTITUTIONAL_FEED, Dataset::Institutional, day(8), &SymbolScope::All)
            .unwrap_err();
        assert!(matches!(err, TransportError::StaleFeed(d) if d == day(8)));
    }

    #[test]
    fn test_scope_keeps_matching_contract_code() {
        let scope = SymbolScope::Only("unf".to_string());
        let table = read_feed(INSTITUTIONAL_FEED, Dataset::Institutional, day(5), &scope).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.rows().all(|r| r.cells()[1] == "UNF"));

        let all = read_feed(INSTITUTIONAL_FEED, Dataset::Institutional, day(5), &SymbolScope::All)
            .unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_locate_institutional_figures_from_feed() {
        let table =
            read_feed(INSTITUTIONAL_FEED, Dataset::Institutional, day(5), &SymbolScope::All).unwrap();
        let layout = layout::institutional(Transport::Feed);

        let (foreign, trust) = TableLocator::institutional_positions(
            &table,
            layout,
            &Symbol::new("台指期", "臺股期貨"),
        )
        .unwrap();
        assert_eq!(foreign.net_open_interest, 12000);
        assert_eq!(trust.net_open_interest, -2000);

        let (foreign, trust) = TableLocator::institutional_positions(
            &table,
            layout,
            &Symbol::new("那指期", "美國那斯達克100期貨"),
        )
        .unwrap();
        assert_eq!(foreign.net_open_interest, -77);
        assert_eq!(trust.net_open_interest, 3);
    }

    #[test]
    fn test_locate_large_trader_figures_from_feed() {
        let table =
            read_feed(LARGE_TRADER_FEED, Dataset::LargeTrader, day(5), &SymbolScope::All).unwrap();
        let layout = layout::large_trader(Transport::Feed);

        let position = TableLocator::large_trader_position(
            &table,
            layout,
            &Symbol::new("台指期", "臺股期貨"),
        )
        .unwrap();
        assert_eq!(position.top5_long, 15000);
        assert_eq!(position.top5_short, 7000);

        let err = TableLocator::large_trader_position(
            &table,
            layout,
            &Symbol::new("日經期", "日經225期貨"),
        )
        .unwrap_err();
        assert!(matches!(err, LookupMiss::SymbolNotFound { .. }));
    }
}
