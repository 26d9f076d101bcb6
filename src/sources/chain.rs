//! Ordered fallback across transport strategies.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use crate::error::TransportError;
use crate::models::{Dataset, SymbolScope};

use super::{Payload, SourceAdapter};

/// Tries each strategy in turn and returns the first valid payload.
///
/// A day counts as unavailable only when every strategy fails; the error of
/// the last one is reported.
pub struct SourceChain {
    sources: Vec<Box<dyn SourceAdapter>>,
    name: String,
}

impl SourceChain {
    pub fn new(sources: Vec<Box<dyn SourceAdapter>>) -> Self {
        let name = sources
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(">");
        Self { sources, name }
    }
}

#[async_trait]
impl SourceAdapter for SourceChain {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        dataset: Dataset,
        date: NaiveDate,
        scope: &SymbolScope,
    ) -> Result<Payload, TransportError> {
        let mut last_error = TransportError::Request("no transport configured".to_string());

        for source in &self.sources {
            match source.fetch(dataset, date, scope).await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    debug!(
                        source = source.name(),
                        dataset = %dataset,
                        date = %date,
                        error = %e,
                        "Transport attempt failed"
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
