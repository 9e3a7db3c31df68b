//! Change Payment Method
//!
//! For each `payment_id,payment_method_id` row: swap the payment method,
//! switch the payment to binary mode, retry it and report its new status.
//!
//! Progress is kept in a `change_payment_method` column of the same CSV.
//! Rows that already carry a value there are left alone, so an interrupted
//! run can simply be started again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use debi_client::DebiApi;
use serde_json::json;
use tempfile::NamedTempFile;

use crate::error::{BatchError, Result};
use crate::{column_index, pause};

/// Default input file
pub const DEFAULT_CSV: &str = "change_payment_method.csv";

/// Progress column appended to the CSV
pub const STATUS_COLUMN: &str = "change_payment_method";

const MISSING_DATA: &str = "missing_data";

/// Change-method job settings
#[derive(Clone, Debug)]
pub struct ChangeMethodJob {
    pub csv_path: PathBuf,
    pub delay: Duration,
}

impl ChangeMethodJob {
    pub fn new(csv_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            delay: Duration::ZERO,
        }
    }
}

/// What happened to one row
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    /// Status column was already filled in
    AlreadyProcessed,

    /// Blank `payment_id` or `payment_method_id`
    MissingData,

    /// Payment method update rejected
    ChangeFailed(String),

    /// Method changed, binary mode update rejected
    BinaryModeFailed(String),

    /// Method changed, retry rejected
    RetryFailed {
        error: String,
        payment_status: String,
    },

    /// Method changed and payment retried
    Retried { payment_status: String },
}

impl RowOutcome {
    /// Value for the status column; `None` leaves the cell untouched
    pub fn status_cell(&self) -> Option<String> {
        match self {
            Self::AlreadyProcessed => None,
            Self::MissingData => Some(MISSING_DATA.into()),
            Self::ChangeFailed(error) => Some(error.clone()),
            Self::BinaryModeFailed(_) | Self::RetryFailed { .. } | Self::Retried { .. } => {
                Some("ok".into())
            }
        }
    }
}

/// Outcome counters for a run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub rows: usize,
    pub already_processed: usize,
    pub missing_data: usize,
    pub change_failed: usize,
    pub binary_mode_failed: usize,
    pub retry_failed: usize,
    pub retried: usize,
}

impl ChangeReport {
    fn record(&mut self, outcome: &RowOutcome) {
        self.rows += 1;
        match outcome {
            RowOutcome::AlreadyProcessed => self.already_processed += 1,
            RowOutcome::MissingData => self.missing_data += 1,
            RowOutcome::ChangeFailed(_) => self.change_failed += 1,
            RowOutcome::BinaryModeFailed(_) => self.binary_mode_failed += 1,
            RowOutcome::RetryFailed { .. } => self.retry_failed += 1,
            RowOutcome::Retried { .. } => self.retried += 1,
        }
    }
}

/// Run the job, rewriting the CSV in place.
///
/// The file is saved after every row whose status changes: the whole table is
/// written next to the input and renamed over it, so an interrupted run keeps
/// the progress made so far and never leaves a truncated file. Rows are cut
/// or padded to the header width.
pub async fn run(api: &dyn DebiApi, job: &ChangeMethodJob) -> Result<ChangeReport> {
    if !job.csv_path.exists() {
        return Err(BatchError::CsvNotFound(job.csv_path.clone()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&job.csv_path)?;
    let mut headers = reader.headers()?.clone();
    let input_width = headers.len();
    let id_column = column_index(&headers, "payment_id")?;
    let method_column = column_index(&headers, "payment_method_id")?;
    let status_column = if let Ok(index) = column_index(&headers, STATUS_COLUMN) {
        index
    } else {
        headers.push_field(STATUS_COLUMN);
        headers.len() - 1
    };

    let mut table = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() > input_width {
            tracing::warn!(
                line = record.position().map(csv::Position::line),
                fields = record.len(),
                columns = input_width,
                "Dropping fields beyond the header"
            );
        }
        let mut fields: Vec<String> = record.iter().take(input_width).map(str::to_string).collect();
        fields.resize(headers.len(), String::new());
        table.push(fields);
    }
    drop(reader);

    let total = table.len();
    tracing::info!(csv = %job.csv_path.display(), rows = total, "Changing payment methods");

    let permissions = std::fs::metadata(&job.csv_path)?.permissions();
    let save = |table: &[Vec<String>]| {
        save_table(&job.csv_path, &permissions, &headers, table)
    };

    let mut report = ChangeReport::default();
    let mut unsaved = true;
    for index in 0..total {
        let payment_id = table[index][id_column].trim().to_string();
        let payment_method_id = table[index][method_column].trim().to_string();
        let existing = table[index][status_column].trim();

        let outcome = if existing.is_empty() {
            process_row(api, &payment_id, &payment_method_id).await
        } else {
            RowOutcome::AlreadyProcessed
        };
        log_outcome(index + 1, total, &payment_id, &payment_method_id, &outcome);
        report.record(&outcome);

        if let Some(cell) = outcome.status_cell() {
            table[index][status_column] = cell;
            save(&table)?;
            unsaved = false;
        }

        if matches!(outcome, RowOutcome::RetryFailed { .. } | RowOutcome::Retried { .. }) {
            pause(job.delay).await;
        }
    }

    if unsaved {
        save(&table)?;
    }

    tracing::info!(
        csv = %job.csv_path.display(),
        retried = report.retried,
        retry_failed = report.retry_failed,
        change_failed = report.change_failed,
        binary_mode_failed = report.binary_mode_failed,
        missing_data = report.missing_data,
        already_processed = report.already_processed,
        "Results written"
    );

    Ok(report)
}

/// Write the table beside `path` and rename it over `path`.
fn save_table(
    path: &Path,
    permissions: &std::fs::Permissions,
    headers: &csv::StringRecord,
    table: &[Vec<String>],
) -> Result<()> {
    let mut output = NamedTempFile::new_in(parent_dir(path))?;
    {
        let mut writer = csv::Writer::from_writer(output.as_file_mut());
        writer.write_record(headers)?;
        for fields in table {
            writer.write_record(fields)?;
        }
        writer.flush()?;
    }
    output.as_file().sync_all()?;
    std::fs::set_permissions(output.path(), permissions.clone())?;
    output.persist(path).map_err(|e| BatchError::Io(e.error))?;
    Ok(())
}

/// Run the API steps for one unprocessed row
async fn process_row(api: &dyn DebiApi, payment_id: &str, payment_method_id: &str) -> RowOutcome {
    if payment_id.is_empty() || payment_method_id.is_empty() {
        return RowOutcome::MissingData;
    }

    if let Err(e) = api
        .update_payment(payment_id, &json!({ "payment_method_id": payment_method_id }))
        .await
    {
        return RowOutcome::ChangeFailed(e.to_string());
    }

    if let Err(e) = api
        .update_payment(payment_id, &json!({ "binary_mode": 1 }))
        .await
    {
        return RowOutcome::BinaryModeFailed(e.to_string());
    }

    match api.retry_payment(payment_id).await {
        Ok(_) => {
            let payment_status = api
                .payment_status(payment_id)
                .await
                .unwrap_or_else(|e| format!("error:{e}"));
            RowOutcome::Retried { payment_status }
        }
        Err(e) => {
            // The status is informational here, a failed lookup is not reported.
            let payment_status = api
                .payment_status(payment_id)
                .await
                .unwrap_or_else(|_| "unknown".into());
            RowOutcome::RetryFailed {
                error: e.to_string(),
                payment_status,
            }
        }
    }
}

fn log_outcome(
    row: usize,
    total: usize,
    payment_id: &str,
    payment_method_id: &str,
    outcome: &RowOutcome,
) {
    match outcome {
        RowOutcome::AlreadyProcessed => {
            tracing::info!(row, total, payment_id, payment_method_id, "skip: already processed");
        }
        RowOutcome::MissingData => {
            tracing::info!(row, total, payment_id, payment_method_id, "skip: missing data");
        }
        RowOutcome::ChangeFailed(error) => {
            tracing::warn!(row, total, payment_id, %error, "change_method failed");
        }
        RowOutcome::BinaryModeFailed(error) => {
            tracing::warn!(row, total, payment_id, %error, "binary_mode failed");
        }
        RowOutcome::RetryFailed {
            error,
            payment_status,
        } => {
            tracing::warn!(
                row,
                total,
                payment_id,
                payment_method_id,
                change = "ok",
                binary_mode = "ok",
                retry = %format!("error:{error}"),
                %payment_status,
                "retry failed"
            );
        }
        RowOutcome::Retried { payment_status } => {
            tracing::info!(
                row,
                total,
                payment_id,
                payment_method_id,
                change = "ok",
                binary_mode = "ok",
                retry = "ok",
                %payment_status,
                "payment retried"
            );
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedApi;

    fn write_csv(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join(DEFAULT_CSV);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("x.csv")), Path::new("."));
        assert_eq!(parent_dir(Path::new("/tmp/x.csv")), Path::new("/tmp"));
    }

    #[test]
    fn test_status_cell() {
        assert_eq!(RowOutcome::AlreadyProcessed.status_cell(), None);
        assert_eq!(
            RowOutcome::MissingData.status_cell().as_deref(),
            Some("missing_data")
        );
        assert_eq!(
            RowOutcome::ChangeFailed("boom".into()).status_cell().as_deref(),
            Some("boom")
        );
        assert_eq!(
            RowOutcome::BinaryModeFailed("x".into()).status_cell().as_deref(),
            Some("ok")
        );
    }

    #[tokio::test]
    async fn test_successful_row_call_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_csv(dir.path(), "payment_id,payment_method_id\nPA1,PM1\n");
        let api = ScriptedApi::new().respond(
            "GET",
            "/v1/payments/PA1",
            json!({"data": {"status": "approved"}}),
        );

        let report = run(&api, &ChangeMethodJob::new(&csv_path)).await.unwrap();

        assert_eq!(report.retried, 1);
        let calls = api.calls();
        assert_eq!(
            api.call_lines(),
            vec![
                "PUT /v1/payments/PA1",
                "PUT /v1/payments/PA1",
                "POST /v1/payments/PA1/actions/retry",
                "GET /v1/payments/PA1",
            ]
        );
        assert_eq!(calls[0].2, json!({"payment_method_id": "PM1"}));
        assert_eq!(calls[1].2, json!({"binary_mode": 1}));
        assert_eq!(calls[2].2, json!({}));

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(
            contents,
            "payment_id,payment_method_id,change_payment_method\nPA1,PM1,ok\n"
        );
    }

    #[tokio::test]
    async fn test_mixed_rows_are_recorded_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_csv(
            dir.path(),
            "payment_id,payment_method_id,note,change_payment_method\n\
             PA0,PM0,done before,ok\n\
             PA1,,no method,\n\
             PA2,PM2,bad method,\n\
             PA3,PM3,also happy,\n\
             PA4,PM4,retry fails,\n\
             PA5,PM5,happy,\n",
        );
        let api = ScriptedApi::new()
            .fail("PUT", "/v1/payments/PA2", "invalid payment method")
            .fail("POST", "/v1/payments/PA4/actions/retry", "not retryable")
            .respond("GET", "/v1/payments/PA4", json!({"data": {"status": "rejected"}}));

        let report = run(&api, &ChangeMethodJob::new(&csv_path)).await.unwrap();

        assert_eq!(
            report,
            ChangeReport {
                rows: 6,
                already_processed: 1,
                missing_data: 1,
                change_failed: 1,
                binary_mode_failed: 0,
                retry_failed: 1,
                retried: 2,
            }
        );

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(
            contents,
            "payment_id,payment_method_id,note,change_payment_method\n\
             PA0,PM0,done before,ok\n\
             PA1,,no method,missing_data\n\
             PA2,PM2,bad method,invalid payment method (HTTP 422)\n\
             PA3,PM3,also happy,ok\n\
             PA4,PM4,retry fails,ok\n\
             PA5,PM5,happy,ok\n"
        );

        let lines = api.call_lines();
        assert!(!lines.iter().any(|l| l.contains("PA0") || l.contains("PA1")));
        assert_eq!(
            lines.iter().filter(|l| l.contains("PA2")).count(),
            1,
            "a failed method change stops the row"
        );
    }

    #[tokio::test]
    async fn test_binary_mode_failure_skips_retry() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_csv(dir.path(), "payment_id,payment_method_id\nPA1,PM1\n");

        // Both PUTs share a path; fail only the second by scripting via a wrapper.
        struct FailSecondPut {
            inner: ScriptedApi,
            puts: std::sync::atomic::AtomicUsize,
        }

        #[async_trait::async_trait]
        impl DebiApi for FailSecondPut {
            async fn get(&self, path: &str) -> debi_client::Result<serde_json::Value> {
                self.inner.get(path).await
            }
            async fn post(
                &self,
                path: &str,
                body: &serde_json::Value,
            ) -> debi_client::Result<serde_json::Value> {
                self.inner.post(path, body).await
            }
            async fn put(
                &self,
                path: &str,
                body: &serde_json::Value,
            ) -> debi_client::Result<serde_json::Value> {
                let n = self.puts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n == 1 {
                    return Err(debi_client::DebiError::RequestFailed {
                        status: 409,
                        message: "binary mode locked".into(),
                    });
                }
                self.inner.put(path, body).await
            }
        }

        let api = FailSecondPut {
            inner: ScriptedApi::new(),
            puts: std::sync::atomic::AtomicUsize::new(0),
        };

        let report = run(&api, &ChangeMethodJob::new(&csv_path)).await.unwrap();

        assert_eq!(report.binary_mode_failed, 1);
        assert_eq!(api.inner.call_lines(), vec!["PUT /v1/payments/PA1"]);
        let contents = std::fs::read_to_string(&csv_path).unwrap();
        assert!(contents.ends_with("PA1,PM1,ok\n"));
    }

    #[tokio::test]
    async fn test_short_rows_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_csv(dir.path(), "payment_id,payment_method_id,extra\nPA1\n");
        let api = ScriptedApi::new();

        let report = run(&api, &ChangeMethodJob::new(&csv_path)).await.unwrap();

        assert_eq!(report.missing_data, 1);
        let contents = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(
            contents,
            "payment_id,payment_method_id,extra,change_payment_method\nPA1,,,missing_data\n"
        );
    }

    #[tokio::test]
    async fn test_extra_fields_do_not_count_as_progress() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_csv(dir.path(), "payment_id,payment_method_id\nPA1,PM1,stray\n");
        let api = ScriptedApi::new();

        let report = run(&api, &ChangeMethodJob::new(&csv_path)).await.unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(report.already_processed, 0);
        assert_eq!(
            std::fs::read_to_string(&csv_path).unwrap(),
            "payment_id,payment_method_id,change_payment_method\nPA1,PM1,ok\n"
        );
    }

    #[tokio::test]
    async fn test_interrupted_run_keeps_finished_rows() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_csv(dir.path(), "payment_id,payment_method_id\nPA1,PM1\nPA2,PM2\n");
        let api = ScriptedApi::new().stall("PUT", "/v1/payments/PA2");
        let job = ChangeMethodJob::new(&csv_path);

        let interrupted = tokio::time::timeout(Duration::from_millis(200), run(&api, &job)).await;
        assert!(interrupted.is_err());

        assert_eq!(
            std::fs::read_to_string(&csv_path).unwrap(),
            "payment_id,payment_method_id,change_payment_method\nPA1,PM1,ok\nPA2,PM2,\n"
        );

        // A second run picks up where the first stopped.
        let api = ScriptedApi::new();
        let report = run(&api, &job).await.unwrap();
        assert_eq!(report.already_processed, 1);
        assert_eq!(report.retried, 1);
        assert!(api.call_lines().iter().all(|l| l.contains("PA2")));
    }

    #[tokio::test]
    async fn test_pause_only_after_retry_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_csv(
            dir.path(),
            "payment_id,payment_method_id\nPA1,PM1\nPA2,PM2\nPA3,\n",
        );
        let api = ScriptedApi::new()
            .fail("PUT", "/v1/payments/PA1", "invalid payment method")
            .fail("PUT", "/v1/payments/PA2", "invalid payment method");
        let job = ChangeMethodJob {
            delay: Duration::from_secs(5),
            ..ChangeMethodJob::new(&csv_path)
        };

        let report = tokio::time::timeout(Duration::from_secs(2), run(&api, &job))
            .await
            .expect("no pause after rows that never reached the retry")
            .unwrap();

        assert_eq!(report.change_failed, 2);
        assert_eq!(report.missing_data, 1);
    }

    #[tokio::test]
    async fn test_missing_method_column() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_csv(dir.path(), "payment_id\nPA1\n");
        let api = ScriptedApi::new();

        let err = run(&api, &ChangeMethodJob::new(&csv_path)).await.unwrap_err();

        assert!(matches!(err, BatchError::MissingColumn(ref c) if c == "payment_method_id"));
        assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), "payment_id\nPA1\n");
    }
}
