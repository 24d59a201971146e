use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::classify::util::delimiter_for;

pub const TEXT_COLUMN: &str = "text";
pub const LABEL_COLUMN: &str = "label";

/// One row of an input file.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRecord {
    pub text: String,
    pub label: Option<String>,
}

/// Load text records from a CSV or TSV file with a header row.
///
/// The `text` column is mandatory. With `require_labels`, every row must also
/// carry a non-empty `label`.
pub fn load_text_records<P: AsRef<Path>>(path: P, require_labels: bool) -> Result<Vec<TextRecord>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let headers = rdr.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));

    let text_idx = column(TEXT_COLUMN)
        .with_context(|| format!("Missing '{}' column in {:?}", TEXT_COLUMN, path))?;
    let label_idx = column(LABEL_COLUMN);
    if require_labels && label_idx.is_none() {
        anyhow::bail!("Missing '{}' column in {:?}", LABEL_COLUMN, path);
    }

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse row {} of {:?}", row + 1, path))?;

        let text = record.get(text_idx).unwrap_or("").to_string();
        let label = label_idx
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string);

        if require_labels && label.is_none() {
            anyhow::bail!("Row {} of {:?} has no label", row + 1, path);
        }
        records.push(TextRecord { text, label });
    }

    log::debug!("Read {} records from {:?}", records.len(), path);
    Ok(records)
}

/// Split labeled records into parallel text and label vectors.
pub fn split_labeled(records: Vec<TextRecord>) -> (Vec<String>, Vec<String>) {
    records
        .into_iter()
        .map(|r| (r.text, r.label.unwrap_or_default()))
        .unzip()
}
