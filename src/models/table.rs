//! Parsed tabular payloads and header-or-position column addressing.
//!
//! Upstream tables drift without notice: headers get renamed, split across
//! several header rows, or disappear. A [`ColumnSpec`] therefore carries both
//! the header aliases we know about and the ordinal the column has held
//! historically. Name lookup wins; the ordinal is the fallback; if neither
//! lands on a cell the lookup fails instead of defaulting.

use std::collections::HashMap;

use crate::error::LookupMiss;

/// How to find one logical column in a parsed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Logical name, used in error messages
    pub name: &'static str,

    /// Header texts accepted for this column
    pub aliases: &'static [&'static str],

    /// Position used when no alias matches a header
    pub ordinal: usize,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, aliases: &'static [&'static str], ordinal: usize) -> Self {
        Self {
            name,
            aliases,
            ordinal,
        }
    }
}

/// A parsed table: header names with their positions, plus raw cell text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, trimming every cell. The first occurrence of a
    /// duplicated header name wins.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| clean(&h)).collect();
        let mut index = HashMap::with_capacity(headers.len());
        for (i, h) in headers.iter().enumerate() {
            if !h.is_empty() {
                index.entry(h.clone()).or_insert(i);
            }
        }

        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|c| clean(&c)).collect::<Vec<_>>())
            .filter(|r| r.iter().any(|c| !c.is_empty()))
            .collect();

        Self {
            headers,
            index,
            rows,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate data rows.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row { table: self, cells })
    }

    /// Position a spec resolves to by header name, if any alias matches.
    pub fn header_position(&self, spec: &ColumnSpec) -> Option<usize> {
        spec.aliases
            .iter()
            .find_map(|alias| self.index.get(*alias).copied())
    }

    /// Whether `marker` occurs in any header or cell.
    pub fn contains_text(&self, marker: &str) -> bool {
        self.headers.iter().any(|h| h.contains(marker))
            || self.rows.iter().flatten().any(|c| c.contains(marker))
    }

    /// Keep only rows for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Row<'_>) -> bool) {
        let rows = std::mem::take(&mut self.rows);
        let view: &Table = self;
        let kept: Vec<Vec<String>> = rows
            .into_iter()
            .filter(|cells| keep(&Row { table: view, cells }))
            .collect();
        self.rows = kept;
    }
}

/// One data row, addressable by [`ColumnSpec`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    cells: &'a [String],
}

impl<'a> Row<'a> {
    pub fn cells(&self) -> &'a [String] {
        self.cells
    }

    /// Resolve a column by header name first, then by ordinal.
    pub fn get(&self, spec: &ColumnSpec) -> Result<&'a str, LookupMiss> {
        if let Some(pos) = self.table.header_position(spec) {
            if let Some(cell) = self.cells.get(pos) {
                return Ok(cell.as_str());
            }
        }
        self.cells
            .get(spec.ordinal)
            .map(String::as_str)
            .ok_or(LookupMiss::Column(spec.name))
    }
}

fn clean(cell: &str) -> String {
    cell.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .to_string()
}
