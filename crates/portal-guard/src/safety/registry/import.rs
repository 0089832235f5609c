//! Bulk blacklist seeding from CSV exports (`type,value,reason,expires_at`).

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use super::client::{RegistryClient, RegistryError};
use super::transport::RegistryTransport;
use crate::safety::domain::{BlacklistType, NewBlacklistEntry};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read blacklist export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid blacklist CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unknown entry type '{value}'")]
    UnknownType { row: usize, value: String },
    #[error("row {row}: value must not be empty")]
    EmptyValue { row: usize },
    #[error("row {row}: expires_at '{value}' is not an RFC 3339 timestamp or YYYY-MM-DD date")]
    InvalidExpiry { row: usize, value: String },
}

#[derive(Debug, Deserialize)]
struct EntryRow {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    reason: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    expires_at: Option<String>,
}

/// Parse every row up front so a malformed file creates nothing.
pub fn parse_entries<R: Read>(reader: R) -> Result<Vec<NewBlacklistEntry>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();

    for (index, record) in csv_reader.deserialize::<EntryRow>().enumerate() {
        let row = index + 2;
        let EntryRow {
            kind,
            value,
            reason,
            expires_at,
        } = record?;

        let Some(kind) = BlacklistType::parse(&kind) else {
            return Err(ImportError::UnknownType { row, value: kind });
        };
        if value.is_empty() {
            return Err(ImportError::EmptyValue { row });
        }
        let expires_at = match expires_at {
            Some(raw) => match parse_expiry(&raw) {
                Some(parsed) => Some(parsed),
                None => return Err(ImportError::InvalidExpiry { row, value: raw }),
            },
            None => None,
        };

        entries.push(NewBlacklistEntry {
            kind,
            value,
            reason: reason.unwrap_or_default(),
            expires_at,
        });
    }

    Ok(entries)
}

pub fn parse_entries_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<NewBlacklistEntry>, ImportError> {
    let file = std::fs::File::open(path)?;
    parse_entries(file)
}

/// Outcome of pushing parsed entries to the registry.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub created: usize,
    pub failed: Vec<(NewBlacklistEntry, RegistryError)>,
}

/// Create each entry in order under the operator's `bearer` credential; a
/// failing row does not stop the rest.
pub async fn import_entries<T>(
    client: &RegistryClient<T>,
    entries: Vec<NewBlacklistEntry>,
    bearer: Option<&str>,
) -> ImportSummary
where
    T: RegistryTransport + 'static,
{
    let mut summary = ImportSummary::default();
    for entry in entries {
        match client.create_entry(&entry, bearer).await {
            Ok(_) => summary.created += 1,
            Err(err) => {
                warn!(
                    kind = %entry.kind,
                    value = %entry.value,
                    error = %err,
                    "entry import failed"
                );
                summary.failed.push((entry, err));
            }
        }
    }
    summary
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
