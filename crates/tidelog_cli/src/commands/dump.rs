//! Dump command implementation.

use super::open_log;
use serde::Serialize;
use std::path::Path;
use tidelog_core::{LogDevice, LogReader, LogRecord, LogResult};

/// Log record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset of the frame in the log.
    pub offset: u64,
    /// Record type.
    pub record_type: &'static str,
    /// Transaction id.
    pub txn_id: u64,
    /// Database id (tuple records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_id: Option<u32>,
    /// Table id (tuple records).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<u32>,
    /// Location written (insert, update).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_location: Option<String>,
    /// Location deactivated (delete, update).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_location: Option<String>,
    /// Tuple payload size in bytes (insert, update).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<usize>,
}

impl RecordInfo {
    fn new(offset: u64, record: &LogRecord) -> Self {
        let mut info = Self {
            offset,
            record_type: record.record_type().name(),
            txn_id: record.txn_id().as_u64(),
            db_id: None,
            table_id: None,
            new_location: None,
            old_location: None,
            payload_size: None,
        };
        if let Some((db_id, table_id)) = record.table() {
            info.db_id = Some(db_id.as_u32());
            info.table_id = Some(table_id.as_u32());
        }
        match record {
            LogRecord::Insert {
                new_location,
                payload,
                ..
            } => {
                info.new_location = Some(new_location.to_string());
                info.payload_size = Some(payload.len());
            }
            LogRecord::Delete { old_location, .. } => {
                info.old_location = Some(old_location.to_string());
            }
            LogRecord::Update {
                new_location,
                old_location,
                payload,
                ..
            } => {
                info.new_location = Some(new_location.to_string());
                info.old_location = Some(old_location.to_string());
                info.payload_size = Some(payload.len());
            }
            LogRecord::TransactionBegin { .. }
            | LogRecord::TransactionCommit { .. }
            | LogRecord::TransactionAbort { .. } => {}
        }
        info
    }
}

/// Runs the dump command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let device = open_log(path)?;
    let records = read_records(&device, limit)?;

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

/// Reads up to `limit` records from the start of the log. A torn tail ends
/// the listing; corruption is an error.
pub fn read_records<D: LogDevice + ?Sized>(
    device: &D,
    limit: Option<usize>,
) -> LogResult<Vec<RecordInfo>> {
    LogReader::new(device)
        .take(limit.unwrap_or(usize::MAX))
        .map(|item| item.map(|(offset, record)| RecordInfo::new(offset, &record)))
        .collect()
}

fn print_text_output(records: &[RecordInfo]) {
    println!("Log Records ({} total)", records.len());
    println!("================");
    println!();

    for record in records {
        print!("[{:08}] {:10} txn={}", record.offset, record.record_type, record.txn_id);

        if let (Some(db), Some(table)) = (record.db_id, record.table_id) {
            print!(" db={db} table={table}");
        }
        if let Some(loc) = &record.new_location {
            print!(" new={loc}");
        }
        if let Some(loc) = &record.old_location {
            print!(" old={loc}");
        }
        if let Some(size) = record.payload_size {
            print!(" payload={size}B");
        }
        println!();
    }
}
