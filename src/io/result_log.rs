//! Result log output
//!
//! Formats completed requests as space-delimited lines and appends them to the
//! output file:
//!
//! ```text
//! <id> BAL <balance> TIME <start_sec>.<start_usec> <end_sec>.<end_usec>
//! <id> OK TIME <start_sec>.<start_usec> <end_sec>.<end_usec>
//! <id> ISF <account> TIME <start_sec>.<start_usec> <end_sec>.<end_usec>
//! ```
//!
//! The log owns its own mutex, independent of account and queue locks.

use crate::core::traits::ResultSink;
use crate::types::{BankError, Outcome, ResultRecord};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Format a timestamp as `<seconds>.<microseconds>` since the Unix epoch
///
/// Microseconds are zero-padded to six digits.
pub fn format_timestamp(time: SystemTime) -> String {
    let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:06}", since_epoch.as_secs(), since_epoch.subsec_micros())
}

/// Split a record into its output fields
pub fn record_fields(record: &ResultRecord) -> Vec<String> {
    let mut fields = vec![record.request_id.to_string()];
    match record.outcome {
        Outcome::Balance(balance) => {
            fields.push("BAL".to_string());
            fields.push(balance.to_string());
        }
        Outcome::Ok => fields.push("OK".to_string()),
        Outcome::InsufficientFunds(account) => {
            fields.push("ISF".to_string());
            fields.push(account.to_string());
        }
    }
    fields.push("TIME".to_string());
    fields.push(format_timestamp(record.submitted_at));
    fields.push(format_timestamp(record.completed_at));
    fields
}

/// Append-only result log shared by all workers
#[derive(Debug)]
pub struct ResultLog<W: Write> {
    writer: Mutex<csv::Writer<W>>,
}

impl ResultLog<File> {
    /// Create (or truncate) the output file
    ///
    /// # Errors
    ///
    /// Returns `BankError::OutputFile` if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, BankError> {
        let file = File::create(path)
            .map_err(|e| BankError::output_file(&path.display().to_string(), &e))?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> ResultLog<W> {
    /// Wrap an arbitrary writer
    pub fn from_writer(writer: W) -> Self {
        let writer = WriterBuilder::new()
            .delimiter(b' ')
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .flexible(true)
            .has_headers(false)
            .from_writer(writer);

        ResultLog {
            writer: Mutex::new(writer),
        }
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W, BankError> {
        self.writer
            .into_inner()
            .into_inner()
            .map_err(|e| BankError::IoError {
                message: e.error().to_string(),
            })
    }
}

impl<W: Write + Send> ResultSink for ResultLog<W> {
    fn record(&self, record: &ResultRecord) -> Result<(), BankError> {
        self.writer.lock().write_record(record_fields(record))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), BankError> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

/// In-memory sink that keeps every record
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Records in the order workers completed them
    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().clone()
    }

    /// Records sorted by request id
    pub fn records_by_id(&self) -> Vec<ResultRecord> {
        let mut records = self.records();
        records.sort_by_key(|record| record.request_id);
        records
    }
}

impl ResultSink for MemorySink {
    fn record(&self, record: &ResultRecord) -> Result<(), BankError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn flush(&self) -> Result<(), BankError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    fn at(secs: u64, micros: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs) + Duration::from_micros(micros)
    }

    fn record(request_id: u64, outcome: Outcome) -> ResultRecord {
        ResultRecord {
            request_id,
            outcome,
            submitted_at: at(1_700_000_000, 42),
            completed_at: at(1_700_000_001, 123_456),
        }
    }

    #[rstest]
    #[case::padded(at(12, 5), "12.000005")]
    #[case::full_micros(at(1_700_000_000, 999_999), "1700000000.999999")]
    #[case::epoch(UNIX_EPOCH, "0.000000")]
    fn test_format_timestamp(#[case] time: SystemTime, #[case] expected: &str) {
        assert_eq!(format_timestamp(time), expected);
    }

    #[rstest]
    #[case::balance(
        record(3, Outcome::Balance(50)),
        "3 BAL 50 TIME 1700000000.000042 1700000001.123456\n"
    )]
    #[case::ok(
        record(1, Outcome::Ok),
        "1 OK TIME 1700000000.000042 1700000001.123456\n"
    )]
    #[case::insufficient_funds(
        record(2, Outcome::InsufficientFunds(1)),
        "2 ISF 1 TIME 1700000000.000042 1700000001.123456\n"
    )]
    fn test_result_log_line_format(#[case] record: ResultRecord, #[case] expected: &str) {
        let log = ResultLog::from_writer(Vec::new());
        log.record(&record).unwrap();

        let output = String::from_utf8(log.into_inner().unwrap()).unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_result_log_appends_lines_of_different_lengths() {
        let log = ResultLog::from_writer(Vec::new());
        log.record(&record(1, Outcome::Ok)).unwrap();
        log.record(&record(2, Outcome::Balance(7))).unwrap();
        log.flush().unwrap();

        let output = String::from_utf8(log.into_inner().unwrap()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1 OK TIME "));
        assert!(lines[1].starts_with("2 BAL 7 TIME "));
    }

    #[test]
    fn test_create_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");

        let result = ResultLog::create(&path);
        assert!(matches!(result, Err(BankError::OutputFile { .. })));
    }

    #[test]
    fn test_memory_sink_sorts_by_id() {
        let sink = MemorySink::new();
        sink.record(&record(2, Outcome::Ok)).unwrap();
        sink.record(&record(1, Outcome::Ok)).unwrap();

        assert_eq!(sink.len(), 2);
        let ids: Vec<_> = sink.records_by_id().iter().map(|r| r.request_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(sink.records()[0].request_id, 2);
    }
}
