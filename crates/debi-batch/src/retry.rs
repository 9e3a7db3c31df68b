//! Retry Payments
//!
//! Replays a retry request for every payment listed in a CSV.

use std::path::{Path, PathBuf};
use std::time::Duration;

use debi_client::DebiApi;
use serde::Serialize;
use serde_json::json;

use crate::error::{BatchError, Result};
use crate::{column_index, pause};

/// Default input file
pub const DEFAULT_CSV: &str = "retry_payments.csv";

/// Default endpoint; `{payment_id}` is substituted per row
pub const DEFAULT_ENDPOINT: &str = "/v1/payments/{payment_id}/retry";

const PLACEHOLDER: &str = "{payment_id}";

/// Retry job settings
#[derive(Clone, Debug)]
pub struct RetryJob {
    pub csv_path: PathBuf,
    pub endpoint_template: String,
    pub delay: Duration,
}

impl RetryJob {
    pub fn new(csv_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            endpoint_template: DEFAULT_ENDPOINT.into(),
            delay: Duration::ZERO,
        }
    }

    /// `<stem>_results.csv` beside the input
    pub fn results_path(&self) -> PathBuf {
        results_path(&self.csv_path)
    }

    fn endpoint(&self, payment_id: &str) -> String {
        self.endpoint_template.replace(PLACEHOLDER, payment_id)
    }
}

fn results_path(csv_path: &Path) -> PathBuf {
    let stem = csv_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    csv_path.with_file_name(format!("{stem}_results.csv"))
}

/// One row of the results file
#[derive(Debug, Serialize)]
struct RetryResult<'a> {
    payment_id: &'a str,
    status: &'static str,
    error: String,
}

/// Outcome of a retry run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub succeeded: usize,
    pub failed: usize,

    /// Rows without a `payment_id`
    pub skipped: usize,

    pub results_path: PathBuf,
}

/// Run the retry job.
///
/// Every row with a non-blank `payment_id` gets one POST with an empty JSON
/// object. The results file is flushed after each row.
pub async fn run(api: &dyn DebiApi, job: &RetryJob) -> Result<RetryReport> {
    if !job.csv_path.exists() {
        return Err(BatchError::CsvNotFound(job.csv_path.clone()));
    }
    if !job.endpoint_template.contains(PLACEHOLDER) {
        tracing::warn!(
            template = %job.endpoint_template,
            "Endpoint template has no {{payment_id}} placeholder; every row hits the same URL"
        );
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&job.csv_path)?;
    let id_column = column_index(reader.headers()?, "payment_id")?;

    let mut report = RetryReport {
        results_path: job.results_path(),
        ..Default::default()
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&report.results_path)?;
    writer.write_record(["payment_id", "status", "error"])?;

    tracing::info!(csv = %job.csv_path.display(), "Retrying payments");

    for record in reader.records() {
        let record = record?;
        let payment_id = record.get(id_column).unwrap_or_default().trim();
        if payment_id.is_empty() {
            report.skipped += 1;
            continue;
        }

        let result = match api.post(&job.endpoint(payment_id), &json!({})).await {
            Ok(_) => {
                tracing::info!(payment_id, "[ok]");
                report.succeeded += 1;
                RetryResult {
                    payment_id,
                    status: "ok",
                    error: String::new(),
                }
            }
            Err(e) => {
                tracing::warn!(payment_id, error = %e, "[error]");
                report.failed += 1;
                RetryResult {
                    payment_id,
                    status: "error",
                    error: e.to_string(),
                }
            }
        };

        writer.serialize(&result)?;
        writer.flush()?;

        pause(job.delay).await;
    }

    writer.flush()?;
    tracing::info!(
        results = %report.results_path.display(),
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "Results written"
    );

    Ok(report)
}
