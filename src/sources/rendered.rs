//! Rendered-table strategy: form POST, then scrape the embedded HTML tables.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::TransportError;
use crate::models::{Dataset, SymbolScope, Table};

use super::{http_client, missing_marker, slash_date, Payload, SourceAdapter, Transport};

/// Page texts the exchange serves instead of a table on non-trading days.
const NO_DATA_TEXTS: &[&str] = &["查無資料", "無交易資料", "No data"];

/// Queries the exchange's HTML report pages.
pub struct RenderedTableSource {
    client: Client,
    base_url: String,
}

impl RenderedTableSource {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = http_client(timeout, false).context("Failed to create HTTP client")?;
        Ok(Self { client, base_url })
    }

    fn url(&self, dataset: Dataset) -> String {
        let path = match dataset {
            Dataset::Institutional => "/cht/3/futContractsDate",
            Dataset::LargeTrader => "/cht/3/largeTradersFutQry",
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn form(dataset: Dataset, date: NaiveDate, scope: &SymbolScope) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("queryType", "1".to_string()),
            ("doQuery", "1".to_string()),
            ("queryDate", slash_date(date)),
        ];
        match dataset {
            Dataset::Institutional => form.push(("commodityId", scope.commodity_id().to_string())),
            Dataset::LargeTrader => form.push(("contractId", scope.commodity_id().to_string())),
        }
        form
    }
}

#[async_trait]
impl SourceAdapter for RenderedTableSource {
    fn name(&self) -> &str {
        "rendered"
    }

    async fn fetch(
        &self,
        dataset: Dataset,
        date: NaiveDate,
        scope: &SymbolScope,
    ) -> Result<Payload, TransportError> {
        let url = self.url(dataset);
        debug!(url = %url, date = %date, "Querying report page");

        let response = self
            .client
            .post(&url)
            .form(&Self::form(dataset, date, scope))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let html = response.text().await?;
        let table = pick_table(&html, dataset)?;

        Ok(Payload {
            dataset,
            transport: Transport::Rendered,
            table,
        })
    }
}

/// Choose the innermost table carrying every marker of `dataset`.
pub fn pick_table(html: &str, dataset: Dataset) -> Result<Table, TransportError> {
    if html.trim().is_empty() {
        return Err(TransportError::Empty);
    }

    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;

    for table in leaf_tables(&document, &table_sel) {
        // Markers may sit in a header row that does not survive as the
        // column header, so match against the whole table text.
        let text = cell_text(table);
        if missing_marker(dataset, |m| text.contains(m)).is_some() {
            continue;
        }
        let parsed = parse_table(table, &row_sel);
        if !parsed.is_empty() {
            return Ok(parsed);
        }
    }

    if NO_DATA_TEXTS.iter().any(|t| html.contains(t)) {
        return Err(TransportError::Placeholder);
    }
    let missing = missing_marker(dataset, |m| html.contains(m))
        .or_else(|| super::markers(dataset).first().copied())
        .unwrap_or_default();
    Err(TransportError::MissingMarker(missing))
}

/// Tables that do not themselves contain a nested table.
fn leaf_tables<'a>(
    document: &'a Html,
    table_sel: &'a Selector,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    document
        .select(table_sel)
        .filter(move |table| !table.select(table_sel).any(|t| t.id() != table.id()))
}

fn selector(css: &str) -> Result<Selector, TransportError> {
    Selector::parse(css).map_err(|e| TransportError::Decode(format!("selector {css:?}: {e}")))
}

struct Cell {
    text: String,
    rowspan: usize,
    colspan: usize,
    header: bool,
}

/// `rowspan`/`colspan` are expanded so a grouped product-name cell appears in
/// every row it spans, which keeps column ordinals stable across rows.
fn parse_table(table: ElementRef<'_>, row_sel: &Selector) -> Table {
    // Column -> (text, rows still to fill) for cells spanning downward.
    let mut pending: Vec<Option<(String, usize)>> = Vec::new();
    let mut header_rows: Vec<Vec<String>> = Vec::new();
    let mut data_rows: Vec<Vec<String>> = Vec::new();

    for tr in table.select(row_sel) {
        let cells: Vec<Cell> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| matches!(el.value().name(), "th" | "td"))
            .map(|el| Cell {
                text: cell_text(el),
                rowspan: span(el, "rowspan"),
                colspan: span(el, "colspan"),
                header: el.value().name() == "th",
            })
            .collect();

        let mut out = Vec::with_capacity(cells.len());
        for cell in &cells {
            fill_pending(&mut pending, &mut out);
            for _ in 0..cell.colspan {
                let col = out.len();
                if pending.len() <= col {
                    pending.resize(col + 1, None);
                }
                if cell.rowspan > 1 {
                    pending[col] = Some((cell.text.clone(), cell.rowspan - 1));
                }
                out.push(cell.text.clone());
            }
        }
        fill_pending(&mut pending, &mut out);

        if out.is_empty() {
            continue;
        }
        let all_header = !cells.is_empty() && cells.iter().all(|c| c.header);
        if all_header && data_rows.is_empty() {
            header_rows.push(out);
        } else {
            data_rows.push(out);
        }
    }

    let headers = header_rows.pop().unwrap_or_default();
    Table::new(headers, data_rows)
}

/// Emit spanned cells occupying the next columns of the current row.
fn fill_pending(pending: &mut [Option<(String, usize)>], out: &mut Vec<String>) {
    while let Some(slot) = pending.get_mut(out.len()) {
        let Some((text, remaining)) = slot.take() else {
            break;
        };
        out.push(text.clone());
        if remaining > 1 {
            *slot = Some((text, remaining - 1));
        }
    }
}

fn cell_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn span(el: ElementRef<'_>, attr: &str) -> usize {
    el.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}
