//! Inspect command implementation.

use super::{CliError, LogOptions};
use segwal_core::LogReader;
use serde::Serialize;

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory.
    pub path: String,
    /// Segment base name.
    pub name: String,
    /// Page size.
    pub page_size: usize,
    /// Whether pages are decrypted.
    pub encrypted: bool,
    /// LSN of the first record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin: Option<String>,
    /// LSN of the last readable record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Readable records.
    pub record_count: usize,
    /// Sum of segment file lengths.
    pub total_size: u64,
    /// Per-segment details.
    pub segments: Vec<SegmentInfo>,
}

/// Details of one segment file.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// Segment id.
    pub id: u64,
    /// File length in bytes.
    pub file_size: u64,
    /// Whole pages in the file.
    pub pages: u64,
    /// Pages that verified.
    pub valid_pages: u64,
    /// First page that failed verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_invalid_page: Option<u64>,
    /// Bytes up to the end of the last record before any bad page.
    pub used_bytes: u64,
}

/// Runs the inspect command.
pub fn run(options: &LogOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let reader = options.open()?;
    let result = inspect(options, &reader)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects the inspection result for an opened log.
pub fn inspect(options: &LogOptions, reader: &LogReader) -> Result<InspectResult, CliError> {
    let mut segments = Vec::with_capacity(reader.segments().len());
    for &id in reader.segments() {
        let scan = reader.scan(id)?;
        segments.push(SegmentInfo {
            id,
            file_size: reader.segment_len(id)?,
            pages: scan.pages,
            valid_pages: scan.valid_pages,
            first_invalid_page: scan.first_invalid,
            used_bytes: scan.used_bytes,
        });
    }

    let records = reader.records(usize::MAX)?;
    Ok(InspectResult {
        path: options.path.display().to_string(),
        name: options.name.clone(),
        page_size: options.page_size,
        encrypted: options.key.is_some(),
        begin: reader.begin().map(|lsn| lsn.to_string()),
        end: records.last().map(|logged| logged.lsn.to_string()),
        record_count: records.len(),
        total_size: segments.iter().map(|s| s.file_size).sum(),
        segments,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Log: {} ({})", result.path, result.name);
    println!("  Page size:   {} bytes", result.page_size);
    println!("  Encrypted:   {}", result.encrypted);
    println!("  Total size:  {} bytes", result.total_size);
    println!("  Records:     {}", result.record_count);
    println!("  Begin:       {}", result.begin.as_deref().unwrap_or("-"));
    println!("  End:         {}", result.end.as_deref().unwrap_or("-"));
    println!();
    println!("Segments ({}):", result.segments.len());
    for segment in &result.segments {
        let status = match segment.first_invalid_page {
            Some(page) => format!("first invalid page {page}"),
            None => "ok".to_string(),
        };
        println!(
            "  #{:<6} {:>10} bytes  {:>6} pages  {:>6} valid  used {:>10}  {}",
            segment.id,
            segment.file_size,
            segment.pages,
            segment.valid_pages,
            segment.used_bytes,
            status
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segwal_core::{RecordRegistry, RecordType, WalConfig, WalRecord, WriteAheadLog};
    use tempfile::tempdir;

    #[test]
    fn inspects_closed_log() {
        let dir = tempdir().unwrap();
        let config = WalConfig::new("wal", dir.path())
            .page_size(128)
            .record_types(
                RecordRegistry::new()
                    .with_type(RecordType::new(1024), "test")
                    .unwrap(),
            );
        {
            let wal = WriteAheadLog::open(config).unwrap();
            for i in 0..10u8 {
                wal.log(&WalRecord::data(RecordType::new(1024), vec![i; 50]))
                    .unwrap();
            }
            wal.close().unwrap();
        }

        let options = LogOptions {
            path: dir.path().to_path_buf(),
            name: "wal".to_string(),
            page_size: 128,
            key: None,
            iv: None,
        };
        let reader = options.open().unwrap();
        let result = inspect(&options, &reader).unwrap();

        assert_eq!(result.record_count, 10);
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.begin.as_deref(), Some("lsn:1:22"));
        assert!(result.segments[0].first_invalid_page.is_none());
        assert_eq!(result.total_size, result.segments[0].pages * 128);
    }
}
