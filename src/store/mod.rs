//! Persisted history of derived metrics, one CSV row per (date, symbol).
//!
//! The file is rewritten whole on every upsert: load, drop rows with the same
//! key, append, sort by `(date, symbol)`, then write a sibling temp file and
//! rename it over the target. The history is a few rows per trading day, so a
//! full rewrite stays cheap.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{DerivedMetric, Symbol};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// How history rows are split across files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Partition {
    /// One file for every symbol
    #[default]
    Shared,
    /// `{stem}_{symbol}.csv` next to the configured path
    PerSymbol,
}

/// Keyed upsert into the history file(s).
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    partition: Partition,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, partition: Partition) -> Self {
        Self {
            path: path.into(),
            partition,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File holding `symbol`'s rows.
    pub fn path_for(&self, symbol: &Symbol) -> PathBuf {
        match self.partition {
            Partition::Shared => self.path.clone(),
            Partition::PerSymbol => {
                let stem = self
                    .path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("history");
                let ext = self
                    .path
                    .extension()
                    .and_then(|s| s.to_str())
                    .unwrap_or("csv");
                let file = format!("{}_{}.{}", stem, symbol.partition_name(), ext);
                match self.path.parent() {
                    Some(dir) => dir.join(file),
                    None => PathBuf::from(file),
                }
            }
        }
    }

    /// Replace any row keyed `(metric.date, metric.symbol)` with `metric`.
    /// Returns the file written.
    pub fn upsert(&self, symbol: &Symbol, metric: &DerivedMetric) -> Result<PathBuf, StoreError> {
        let path = self.path_for(symbol);
        let mut rows = Self::load(&path)?;
        let before = rows.len();

        rows.retain(|row| row.key() != metric.key());
        let replaced = before - rows.len();
        rows.push(metric.clone());
        rows.sort_by(|a, b| a.key().cmp(&b.key()));

        write_atomic(&path, &rows)?;
        debug!(
            path = %path.display(),
            date = %metric.date,
            symbol = %metric.symbol,
            replaced,
            rows = rows.len(),
            "History updated"
        );
        Ok(path)
    }

    /// Read every row of one history file. A missing or empty file is an
    /// empty history.
    pub fn load(path: &Path) -> Result<Vec<DerivedMetric>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let body = bytes.strip_prefix(BOM).unwrap_or(&bytes[..]);
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_reader(body);
        let mut rows = Vec::new();
        for record in reader.deserialize::<DerivedMetric>() {
            rows.push(record?);
        }
        Ok(rows)
    }

    /// Total rows across the files this store would touch for `symbols`.
    pub fn row_count(&self, symbols: &[Symbol]) -> Result<usize, StoreError> {
        let mut paths: Vec<PathBuf> = symbols.iter().map(|s| self.path_for(s)).collect();
        paths.sort();
        paths.dedup();

        let mut total = 0;
        for path in paths {
            total += Self::load(&path)?.len();
        }
        Ok(total)
    }
}

fn write_atomic(path: &Path, rows: &[DerivedMetric]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let mut wtr = csv::Writer::from_writer(BOM.to_vec());
    for row in rows {
        wtr.serialize(row)?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| StoreError::Flush(e.to_string()))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
