//! The meeting log links the two phases: the spatial engine appends one record per tick that
//! produced new contacts, and the infection replay consumes the records in timestamp order.
//! On disk it is stored as JSON Lines, one record per line.
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::EpiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub a: usize,
    pub b: usize,
    pub place: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    /// Seconds since the start of the simulation.
    pub timestamp: f64,
    pub meetings: Vec<Meeting>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingLog {
    records: Vec<MeetingRecord>,
}

impl MeetingLog {
    #[must_use]
    pub fn new() -> MeetingLog {
        MeetingLog::default()
    }

    pub fn push(&mut self, record: MeetingRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn records(&self) -> &[MeetingRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<MeetingRecord> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of meeting events over all records.
    #[must_use]
    pub fn meeting_count(&self) -> usize {
        self.records.iter().map(|record| record.meetings.len()).sum()
    }

    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.records
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }

    /// Writes one JSON object per line.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::IoError` or `EpiError::JsonError` from the writer.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), EpiError> {
        let mut writer = BufWriter::new(writer);
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads JSON Lines records. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::IoError` or `EpiError::JsonError` for unreadable input, and
    /// `EpiError::ConfigurationError` if a timestamp is not finite and non-negative or the
    /// records are out of order.
    pub fn read_from<R: BufRead>(reader: R) -> Result<MeetingLog, EpiError> {
        let mut log = MeetingLog::new();
        let mut last_timestamp = 0.0;
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: MeetingRecord = serde_json::from_str(&line)?;
            if !(record.timestamp.is_finite() && record.timestamp >= 0.0) {
                return Err(EpiError::ConfigurationError(format!(
                    "meeting log line {}: invalid timestamp {}",
                    line_number + 1,
                    record.timestamp
                )));
            }
            if record.timestamp < last_timestamp {
                return Err(EpiError::ConfigurationError(format!(
                    "meeting log line {}: timestamp {} is earlier than {}",
                    line_number + 1,
                    record.timestamp,
                    last_timestamp
                )));
            }
            last_timestamp = record.timestamp;
            log.push(record);
        }
        Ok(log)
    }

    /// # Errors
    ///
    /// See [`MeetingLog::write_to`]; also fails if the file cannot be created.
    pub fn write_json_lines(&self, path: &Path) -> Result<(), EpiError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(
            "writing {} meeting records to {}",
            self.records.len(),
            path.display()
        );
        self.write_to(File::create(path)?)
    }

    /// # Errors
    ///
    /// See [`MeetingLog::read_from`]; also fails if the file cannot be opened.
    pub fn read_json_lines(path: &Path) -> Result<MeetingLog, EpiError> {
        let log = MeetingLog::read_from(BufReader::new(File::open(path)?))?;
        debug!("read {} meeting records from {}", log.len(), path.display());
        Ok(log)
    }
}
