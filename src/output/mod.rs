//! Output module for crawl records and reports
//!
//! This module handles:
//! - The output record layout written to the dataset
//! - Exporting the dataset as JSON lines
//! - Recording crawl statistics

mod record;
pub mod stats;

pub use record::{ItemDetails, OutputRecord, RequestDebugInfo};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use crate::storage::Storage;
use crate::SweepError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes every dataset record to a file, one JSON object per line
///
/// # Arguments
///
/// * `storage` - The storage backend holding the dataset
/// * `path` - Destination file; overwritten if it exists
///
/// # Returns
///
/// * `Ok(usize)` - Number of records written
/// * `Err(SweepError)` - Failed to read the dataset or write the file
pub fn export_json_lines(storage: &dyn Storage, path: &Path) -> Result<usize, SweepError> {
    let records = storage.load_records()?;

    let mut writer = BufWriter::new(File::create(path)?);
    for record in &records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    tracing::info!("Exported {} records to {}", records.len(), path.display());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{OutputSink, SqliteStorage};
    use tempfile::TempDir;

    fn record(url: &str) -> OutputRecord {
        OutputRecord::new(
            url,
            ItemDetails {
                name: "Coat".to_string(),
                ..ItemDetails::default()
            },
            RequestDebugInfo {
                request_id: 1,
                url: url.to_string(),
                loaded_url: url.to_string(),
                method: "GET".to_string(),
                retry_count: 0,
                error_messages: vec![],
                status_code: 200,
            },
        )
    }

    #[test]
    fn test_export_json_lines() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash").unwrap();
        for url in ["https://example.com/a-1.aspx", "https://example.com/b-2.aspx"] {
            storage.push_record(run_id, url, &record(url)).unwrap();
        }

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        let written = export_json_lines(&storage, &path).unwrap();
        assert_eq!(written, 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["url"], "https://example.com/a-1.aspx");
        assert_eq!(lines[1]["name"], "Coat");
    }
}
