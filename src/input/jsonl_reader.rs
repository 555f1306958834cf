//! Batch reader for decoded packet records.
//!
//! Reads JSONL files produced by the external dissection process, one
//! `PacketRecord` per line. Malformed lines are counted and skipped, never
//! fatal: data-shape issues yield best-effort results.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use crate::models::PacketRecord;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct PacketFileReader {
    reader: BufReader<File>,
    lines_read: u64,
    parse_errors: u64,
}

impl PacketFileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReaderError> {
        let file = File::open(path)?;
        Ok(PacketFileReader {
            reader: BufReader::new(file),
            lines_read: 0,
            parse_errors: 0,
        })
    }

    /// Read up to `max_records` packet records. An empty result means EOF.
    pub fn read_batch(&mut self, max_records: usize) -> Result<Vec<PacketRecord>, ReaderError> {
        let mut records = Vec::new();
        let mut line = String::new();

        while records.len() < max_records {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }
            self.lines_read += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<PacketRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    self.parse_errors += 1;
                    log::debug!("Skipping malformed record at line {}: {}", self.lines_read, e);
                }
            }
        }

        Ok(records)
    }

    /// Lines that failed to parse so far.
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }
}
