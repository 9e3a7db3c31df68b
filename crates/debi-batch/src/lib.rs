//! # debi-batch
//!
//! CSV-driven batch jobs over the debi API.
//!
//! - [`retry`]: POST a retry for every `payment_id` and write a
//!   `<stem>_results.csv` next to the input.
//! - [`change_method`]: swap the payment method of each payment, switch it to
//!   binary mode and retry it, recording progress back into the same CSV so a
//!   second run skips rows that were already handled.
//!
//! Jobs run rows sequentially. An API failure on one row is recorded and the
//! job moves on; only IO/CSV failures abort the run.

pub mod change_method;
pub mod error;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

pub use error::{BatchError, Result};

/// Position of a named column in a header row
pub(crate) fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| BatchError::MissingColumn(name.to_string()))
}

/// Sleep between rows when throttling is configured
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
