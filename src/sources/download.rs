//! Delimited-download strategy: Big5 CSV files from the exchange's `…Down`
//! endpoints.
//!
//! Some endpoints only answer a download for a client that has just viewed
//! the matching report page, so the strategy can prime a cookie-carrying
//! client with a "view" request first. The client lives for one attempt.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use encoding_rs::BIG5;
use tracing::debug;

use crate::error::TransportError;
use crate::models::{Dataset, SymbolScope, Table};

use super::{http_client, missing_marker, slash_date, Payload, SourceAdapter, Transport};

/// Anything shorter is a truncated body or an empty "no data" file.
pub const MIN_DOWNLOAD_BYTES: usize = 128;

/// Downloads the CSV rendition of a report.
pub struct DownloadSource {
    base_url: String,
    timeout: Duration,
    prime_session: bool,
}

impl DownloadSource {
    pub fn new(base_url: String, timeout: Duration, prime_session: bool) -> Self {
        Self {
            base_url,
            timeout,
            prime_session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn view_path(dataset: Dataset) -> &'static str {
        match dataset {
            Dataset::Institutional => "/cht/3/futContractsDate",
            Dataset::LargeTrader => "/cht/3/largeTradersFutQry",
        }
    }

    fn download_path(dataset: Dataset) -> &'static str {
        match dataset {
            Dataset::Institutional => "/cht/3/futContractsDateDown",
            Dataset::LargeTrader => "/cht/3/largeTradersFutDown",
        }
    }

    fn download_form(date: NaiveDate, scope: &SymbolScope) -> Vec<(&'static str, String)> {
        vec![
            ("queryStartDate", slash_date(date)),
            ("queryEndDate", slash_date(date)),
            ("commodityId", scope.commodity_id().to_string()),
        ]
    }
}

#[async_trait]
impl SourceAdapter for DownloadSource {
    fn name(&self) -> &str {
        "download"
    }

    async fn fetch(
        &self,
        dataset: Dataset,
        date: NaiveDate,
        scope: &SymbolScope,
    ) -> Result<Payload, TransportError> {
        let client = http_client(self.timeout, self.prime_session)?;

        if self.prime_session {
            let view_url = self.url(Self::view_path(dataset));
            debug!(url = %view_url, "Priming download session");
            let view = client
                .post(&view_url)
                .form(&[("queryType", "1".to_string()), ("queryDate", slash_date(date))])
                .send()
                .await?;
            if !view.status().is_success() {
                return Err(TransportError::Status(view.status().as_u16()));
            }
        }

        let url = self.url(Self::download_path(dataset));
        debug!(url = %url, date = %date, "Downloading report");

        let response = client
            .post(&url)
            .form(&Self::download_form(date, scope))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let bytes = response.bytes().await?;
        let text = decode_download(&bytes)?;
        let table = parse_delimited(&text)?;

        if let Some(marker) = missing_marker(dataset, |m| table.headers().iter().any(|h| h.contains(m)))
        {
            return Err(TransportError::MissingMarker(marker));
        }
        if table.is_empty() {
            return Err(TransportError::Empty);
        }

        Ok(Payload {
            dataset,
            transport: Transport::Download,
            table,
        })
    }
}

/// Decode a Big5 body, rejecting truncated files and HTML error pages.
pub fn decode_download(bytes: &[u8]) -> Result<String, TransportError> {
    if bytes.len() < MIN_DOWNLOAD_BYTES {
        return Err(TransportError::Truncated { len: bytes.len() });
    }

    let (text, _, had_errors) = BIG5.decode(bytes);
    if had_errors {
        return Err(TransportError::Decode("invalid Big5 sequence".to_string()));
    }

    let head: String = text.trim_start().chars().take(256).collect::<String>().to_lowercase();
    if head.starts_with('<') || head.contains("<html") || head.contains("<!doctype") {
        return Err(TransportError::Markup { expected: "CSV" });
    }

    Ok(text.into_owned())
}

/// Parse decoded CSV text. Rows may be ragged (trailing commas are common).
pub fn parse_delimited(text: &str) -> Result<Table, TransportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| TransportError::Decode(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| TransportError::Decode(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table::new(headers, rows))
}
