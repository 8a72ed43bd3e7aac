//! Dump command implementation.

use super::{CliError, LogOptions};
use segwal_core::{LogReader, Lsn, WalRecord};
use serde::Serialize;

/// Record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Segment of the record.
    pub segment: u64,
    /// Position of the record within its segment.
    pub position: u64,
    /// Record type id (0 for empty records).
    pub record_type: u16,
    /// Payload size in bytes.
    pub payload_size: usize,
    /// First payload bytes, hex encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Bytes of payload shown in a preview.
const PREVIEW_BYTES: usize = 16;

/// Runs the dump command.
pub fn run(
    options: &LogOptions,
    segment: Option<u64>,
    position: u64,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = options.open()?;
    let records = dump(&reader, segment, position, limit.unwrap_or(usize::MAX))?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Reads records starting at `(segment, position)`.
pub fn dump(
    reader: &LogReader,
    segment: Option<u64>,
    position: u64,
    limit: usize,
) -> Result<Vec<RecordInfo>, CliError> {
    let start = match segment.or_else(|| reader.begin().map(|lsn| lsn.segment())) {
        Some(segment) => Lsn::new(segment, position),
        None => return Ok(Vec::new()),
    };

    let records = reader.read(start, limit)?;
    Ok(records
        .into_iter()
        .map(|logged| {
            let (record_type, preview) = match &logged.record {
                WalRecord::Empty => (0, None),
                WalRecord::Data {
                    record_type,
                    payload,
                } => (record_type.as_u16(), Some(hex_preview(payload))),
            };
            RecordInfo {
                segment: logged.lsn.segment(),
                position: logged.lsn.position(),
                record_type,
                payload_size: logged.record.payload().len(),
                preview,
            }
        })
        .collect())
}

fn hex_preview(payload: &[u8]) -> String {
    let mut out: String = payload
        .iter()
        .take(PREVIEW_BYTES)
        .map(|b| format!("{b:02x}"))
        .collect();
    if payload.len() > PREVIEW_BYTES {
        out.push_str("..");
    }
    out
}

fn print_text_output(records: &[RecordInfo]) {
    println!("Records ({}):", records.len());
    for record in records {
        let kind = if record.record_type == 0 {
            "EMPTY".to_string()
        } else {
            format!("type {}", record.record_type)
        };
        print!(
            "  lsn:{}:{:<10} {:<10} {:>8} bytes",
            record.segment, record.position, kind, record.payload_size
        );
        if let Some(preview) = &record.preview {
            print!("  {preview}");
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segwal_core::{RecordRegistry, RecordType, WalConfig, WriteAheadLog};
    use tempfile::tempdir;

    #[test]
    fn dumps_from_lsn() {
        let dir = tempdir().unwrap();
        let config = WalConfig::new("wal", dir.path()).page_size(256).record_types(
            RecordRegistry::new()
                .with_type(RecordType::new(1024), "test")
                .unwrap(),
        );
        let lsns: Vec<Lsn> = {
            let wal = WriteAheadLog::open(config).unwrap();
            let lsns = (0..5u8)
                .map(|i| {
                    wal.log(&WalRecord::data(RecordType::new(1024), vec![i; 20]))
                        .unwrap()
                })
                .collect();
            wal.close().unwrap();
            lsns
        };

        let options = LogOptions {
            path: dir.path().to_path_buf(),
            name: "wal".to_string(),
            page_size: 256,
            key: None,
            iv: None,
        };
        let reader = options.open().unwrap();

        let all = dump(&reader, None, 22, usize::MAX).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].record_type, 1024);
        assert_eq!(all[0].payload_size, 20);
        assert_eq!(all[1].preview.as_deref(), Some("01010101010101010101010101010101.."));

        let tail = dump(&reader, Some(1), lsns[3].position(), 10).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].position, lsns[3].position());

        assert!(dump(&reader, Some(9), 22, 10).unwrap().is_empty());
    }

    #[test]
    fn hex_preview_truncates() {
        assert_eq!(hex_preview(&[0xAB, 0x01]), "ab01");
        assert_eq!(hex_preview(&[0u8; 17]).len(), 34);
    }
}
