//! Core traits for recording request results
//!
//! Workers hand every completed request to a `ResultSink`. The production
//! sink appends formatted lines to the output file; tests collect records in
//! memory and inspect them directly.

use crate::types::{BankError, ResultRecord};

/// Destination for completed request records
///
/// Implementations are shared by every worker, so `record` must provide its
/// own exclusion. It is never called while an account lock is held.
pub trait ResultSink: Send + Sync {
    /// Append one completed request
    fn record(&self, record: &ResultRecord) -> Result<(), BankError>;

    /// Push buffered records to the underlying destination
    fn flush(&self) -> Result<(), BankError>;
}
