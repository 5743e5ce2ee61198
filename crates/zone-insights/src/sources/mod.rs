//! Upstream zone data feeds.
//!
//! Each feed implements [`ZoneSource`]; a [`SourceRegistry`] composes them
//! by name and gathers their rows for the prediction pipeline.

mod csv_export;

pub use csv_export::CsvZoneSource;

use std::path::PathBuf;

use tracing::{info, warn};

use crate::prediction::RawZoneRecord;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("source {name} produced invalid rows: {message}")]
    Validation { name: String, message: String },
    #[error("a source named {0} is already registered")]
    Duplicate(String),
}

/// A feed of raw zone rows.
pub trait ZoneSource: Send + Sync {
    fn name(&self) -> &str;
    fn fetch(&self) -> Result<Vec<RawZoneRecord>, SourceError>;
    /// Feed-level checks on fetched rows. Row-level defects are not errors
    /// here: the normalizer degrades the offending row instead.
    fn validate(&self, _rows: &[RawZoneRecord]) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Sources keyed by name, kept in registration order.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Box<dyn ZoneSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Box<dyn ZoneSource>) -> Result<(), SourceError> {
        if self.get(source.name()).is_some() {
            return Err(SourceError::Duplicate(source.name().to_string()));
        }
        self.sources.push(source);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn ZoneSource> {
        self.sources
            .iter()
            .find(|source| source.name() == name)
            .map(|source| &**source)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Rows from every source in registration order. Sources that fail to
    /// fetch or validate are skipped.
    pub fn collect(&self) -> Vec<RawZoneRecord> {
        let mut rows = Vec::new();
        for source in &self.sources {
            match fetch_validated(&**source) {
                Ok(fetched) => {
                    info!(source = source.name(), rows = fetched.len(), "zone source loaded");
                    rows.extend(fetched);
                }
                Err(error) => {
                    warn!(source = source.name(), %error, "skipping zone source");
                }
            }
        }
        rows
    }
}

fn fetch_validated(source: &dyn ZoneSource) -> Result<Vec<RawZoneRecord>, SourceError> {
    let rows = source.fetch()?;
    source.validate(&rows)?;
    Ok(rows)
}
