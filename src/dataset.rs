use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::error::{RelayError, Result};
use crate::runner::RowOutcome;

pub const PROMPT_COLUMN: &str = "prompt_text";

/// One row of the source dataset. Identity is the positional row index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRecord {
    pub prompt_text: String,
}

/// Reads the full input set in file order. A dataset without the
/// `prompt_text` column is a startup error, surfaced before any row is
/// attempted against the completion endpoint.
pub fn read_prompts(path: &Path) -> Result<Vec<PromptRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?;
    let Some(column) = headers.iter().position(|name| name == PROMPT_COLUMN) else {
        return Err(RelayError::MissingColumn {
            path: path.display().to_string(),
            column: PROMPT_COLUMN,
        });
    };

    let mut out = Vec::<PromptRecord>::new();
    for record in reader.records() {
        let record = record?;
        out.push(PromptRecord {
            prompt_text: record.get(column).unwrap_or_default().to_string(),
        });
    }
    Ok(out)
}

/// Flattened persistence shape shared by both outcome variants. Absent
/// fields serialize as empty cells so success and failure rows fit one
/// header.
#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    input: &'a str,
    encoded_base64: Option<&'a str>,
    output: Option<&'a str>,
    model: Option<&'a str>,
}

impl<'a> From<&'a RowOutcome> for OutputRow<'a> {
    fn from(outcome: &'a RowOutcome) -> Self {
        match outcome {
            RowOutcome::Success {
                input,
                encoded_base64,
                output,
                model,
            } => Self {
                input,
                encoded_base64: Some(encoded_base64),
                output: Some(output),
                model: model.as_deref(),
            },
            RowOutcome::Failure { input } => Self {
                input,
                encoded_base64: None,
                output: None,
                model: None,
            },
        }
    }
}

const FILE_TIMESTAMP: &[FormatItem<'_>] =
    format_description!("[year][month][day]_[hour][minute][second]");

pub fn output_file_name(timestamp: OffsetDateTime) -> String {
    let stamp = timestamp
        .format(FILE_TIMESTAMP)
        .unwrap_or_else(|_| "unknown".to_string());
    format!("responses_{stamp}.csv")
}

/// Writes every outcome, in run order, to a timestamped CSV under `dir`.
/// Returns the path of the file written.
pub fn write_results(dir: &Path, outcomes: &[RowOutcome]) -> Result<PathBuf> {
    let path = dir.join(output_file_name(OffsetDateTime::now_utc()));
    let mut writer = csv::Writer::from_path(&path)?;
    for outcome in outcomes {
        writer.serialize(OutputRow::from(outcome))?;
    }
    writer.flush()?;
    Ok(path)
}
