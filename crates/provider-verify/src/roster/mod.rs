//! Roster CSV import: turns a provider roster export into input records
//! ready for submission.

use std::io::Read;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::pipeline::domain::InputRecord;

/// Error raised while importing a roster CSV.
#[derive(Debug, thiserror::Error)]
pub enum RosterImportError {
    #[error("failed to read roster csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("roster row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "NPI")]
    npi: String,
    #[serde(rename = "Specialty", default, deserialize_with = "empty_string_as_none")]
    specialty: Option<String>,
    #[serde(
        rename = "Last Updated",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    last_updated: Option<String>,
    #[serde(rename = "Document", default, deserialize_with = "empty_string_as_none")]
    document: Option<String>,
}

/// Parse roster rows into input records. Row numbers in errors are
/// one-based and include the header line, matching what a spreadsheet
/// shows.
pub fn parse_roster<R: Read>(reader: R) -> Result<Vec<InputRecord>, RosterImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, row) in csv_reader.deserialize::<RosterRow>().enumerate() {
        let row_number = index + 2;
        let row = row?;

        if row.name.is_empty() {
            return Err(RosterImportError::InvalidRow {
                row: row_number,
                reason: "provider name is empty".to_string(),
            });
        }
        if row.npi.is_empty() {
            return Err(RosterImportError::InvalidRow {
                row: row_number,
                reason: "NPI is empty".to_string(),
            });
        }
        let last_updated = row
            .last_updated
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    RosterImportError::InvalidRow {
                        row: row_number,
                        reason: format!("'{raw}' is not a YYYY-MM-DD date"),
                    }
                })
            })
            .transpose()?;

        records.push(InputRecord {
            npi: row.npi,
            name: row.name,
            specialty: row.specialty,
            last_updated,
            document_ref: row.document,
        });
    }

    Ok(records)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
