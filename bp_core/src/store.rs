//! Append-only record store for saved blood-pressure averages.
//!
//! Records are appended to a JSONL (JSON Lines) file with file locking.
//! The store assigns an auto-incrementing integer id at write time; no
//! update or delete exists. Read-back is chronological by timestamp.

use crate::{Result, SavedRecord};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Record sink trait for persisting completed session averages
///
/// A write either assigns an id and lands durably, or fails whole; a partial
/// record is never stored.
pub trait RecordStore {
    fn add_record(&mut self, record: &SavedRecord) -> Result<u64>;
}

/// JSONL-based record store with file locking
///
/// The file is created lazily on the first write and reused thereafter.
pub struct JsonlRecordStore {
    path: PathBuf,
}

impl JsonlRecordStore {
    /// Create a store over the given path; no file access happens yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl RecordStore for JsonlRecordStore {
    fn add_record(&mut self, record: &SavedRecord) -> Result<u64> {
        self.ensure_parent_dir()?;

        // Open for both scanning and appending so the id assignment and the
        // write happen under one exclusive lock
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| crate::Error::Storage(format!("cannot open record store: {}", e)))?;

        file.lock_exclusive()?;

        let result = append_locked(&mut file, record);

        file.unlock()?;
        result
    }
}

fn append_locked(file: &mut File, record: &SavedRecord) -> Result<u64> {
    // The next id is one past the highest already stored
    file.seek(SeekFrom::Start(0))?;
    let mut max_id = 0u64;
    for line_result in BufReader::new(&*file).lines() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(existing) = serde_json::from_str::<SavedRecord>(&line) {
            max_id = max_id.max(existing.id.unwrap_or(0));
        }
    }
    let assigned = max_id + 1;

    let stored = SavedRecord {
        id: Some(assigned),
        ..record.clone()
    };

    let mut writer = std::io::BufWriter::new(&*file);
    let line = serde_json::to_string(&stored)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    drop(writer);
    file.sync_all()?;

    tracing::debug!("Appended record {} to store", assigned);
    Ok(assigned)
}

/// Read all saved records, sorted chronologically by timestamp
///
/// Unparseable lines are skipped with a warning rather than failing the
/// whole read.
pub fn read_records(path: &Path) -> Result<Vec<SavedRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = match line_result {
            Ok(line) => line,
            Err(e) => {
                file.unlock()?;
                return Err(e.into());
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<SavedRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse record at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;

    records.sort_by_key(|r| r.timestamp);
    tracing::debug!("Read {} records from store", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Measurement;
    use chrono::{Duration, Utc};

    fn create_test_record(days_ago: i64) -> SavedRecord {
        let m = Measurement {
            systolic: 120.0,
            diastolic: 80.0,
            pulse: 70.0,
        };
        SavedRecord::average_of(&[m, m, m], Utc::now() - Duration::days(days_ago))
    }

    #[test]
    fn test_ids_auto_increment_from_one() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        let mut store = JsonlRecordStore::new(&path);

        assert_eq!(store.add_record(&create_test_record(2)).unwrap(), 1);
        assert_eq!(store.add_record(&create_test_record(1)).unwrap(), 2);
        assert_eq!(store.add_record(&create_test_record(0)).unwrap(), 3);

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, Some(1));
    }

    #[test]
    fn test_read_is_chronological() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        let mut store = JsonlRecordStore::new(&path);

        // Append out of timestamp order
        store.add_record(&create_test_record(1)).unwrap();
        store.add_record(&create_test_record(5)).unwrap();
        store.add_record(&create_test_record(3)).unwrap();

        let records = read_records(&path).unwrap();
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(records[0].id, Some(2));
    }

    #[test]
    fn test_read_missing_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let records = read_records(&temp_dir.path().join("nonexistent.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        let mut store = JsonlRecordStore::new(&path);

        store.add_record(&create_test_record(1)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not a record").unwrap();

        store.add_record(&create_test_record(0)).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, Some(2));
    }
}
