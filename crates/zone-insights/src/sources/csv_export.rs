use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::{SourceError, ZoneSource};
use crate::prediction::RawZoneRecord;

enum CsvInput {
    File(PathBuf),
    Text(String),
}

/// Zone rows from a CSV export with a header row. Headers are matched
/// case-insensitively and blank cells count as absent, so a row with a
/// blank postcode still reaches the pipeline and comes back degraded.
pub struct CsvZoneSource {
    name: String,
    input: CsvInput,
}

impl CsvZoneSource {
    pub fn from_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            input: CsvInput::File(path.into()),
        }
    }

    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: CsvInput::Text(text.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.input {
            CsvInput::File(path) => Some(path),
            CsvInput::Text(_) => None,
        }
    }
}

impl ZoneSource for CsvZoneSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<RawZoneRecord>, SourceError> {
        match &self.input {
            CsvInput::File(path) => {
                let file = File::open(path).map_err(|error| SourceError::Io {
                    path: path.clone(),
                    error,
                })?;
                parse_rows(file)
            }
            CsvInput::Text(text) => parse_rows(text.as_bytes()),
        }
    }
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<RawZoneRecord>, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();
    csv_reader.set_headers(csv::StringRecord::from(headers));

    let mut rows = Vec::new();
    for record in csv_reader.deserialize::<BTreeMap<String, String>>() {
        let cells = record?;
        let mut row = RawZoneRecord::new();
        for (key, value) in cells {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            row.insert(key, value);
        }
        rows.push(row);
    }

    Ok(rows)
}

fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .to_ascii_lowercase()
}
