//! CSV export of saved records.
//!
//! Appends records to a CSV file with headers, for use outside the journal
//! (spreadsheets, sharing with a physician). Export only; no analysis.

use crate::{Result, SavedRecord};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: Option<u64>,
    timestamp: String,
    systolic: i32,
    diastolic: i32,
    pulse: i32,
}

impl From<&SavedRecord> for CsvRow {
    fn from(record: &SavedRecord) -> Self {
        CsvRow {
            id: record.id,
            timestamp: record.timestamp.to_rfc3339(),
            systolic: record.systolic,
            diastolic: record.diastolic,
            pulse: record.pulse,
        }
    }
}

/// Append records to a CSV file, writing headers only when the file is new
///
/// Returns the number of records written. The CSV is fsynced before
/// returning.
pub fn records_to_csv(records: &[SavedRecord], csv_path: &Path) -> Result<usize> {
    if records.is_empty() {
        tracing::info!("No records to export");
        return Ok(0);
    }

    // Ensure parent directory exists
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(&file);

    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;
    drop(writer);

    file.sync_all()?;

    tracing::info!("Exported {} records to {:?}", records.len(), csv_path);
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Measurement;
    use chrono::Utc;

    fn record(id: u64, systolic: i32) -> SavedRecord {
        SavedRecord {
            id: Some(id),
            timestamp: Utc::now(),
            systolic,
            diastolic: 80,
            pulse: 70,
        }
    }

    #[test]
    fn test_export_writes_headers_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("records.csv");

        assert_eq!(records_to_csv(&[record(1, 120)], &csv_path).unwrap(), 1);
        assert_eq!(records_to_csv(&[record(2, 130)], &csv_path).unwrap(), 1);

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        let header_count = contents
            .lines()
            .filter(|l| l.starts_with("id,timestamp"))
            .count();
        assert_eq!(header_count, 1);
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.contains("130,80,70"));
    }

    #[test]
    fn test_export_empty_is_noop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("records.csv");

        assert_eq!(records_to_csv(&[], &csv_path).unwrap(), 0);
        assert!(!csv_path.exists());
    }

    #[test]
    fn test_exported_row_matches_average() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("records.csv");

        let m = Measurement {
            systolic: 121.0,
            diastolic: 81.0,
            pulse: 71.0,
        };
        let mut averaged = SavedRecord::average_of(&[m, m, m], Utc::now());
        averaged.id = Some(1);

        records_to_csv(&[averaged], &csv_path).unwrap();
        let contents = std::fs::read_to_string(&csv_path).unwrap();
        assert!(contents.contains("121,81,71"));
    }
}
