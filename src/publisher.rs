//! Write side of the sync: bulk upsert of instance records.

use crate::error::Result;
use crate::http::{RequestSpec, Transport};
use crate::session::Session;
use crate::source::Record;

const BATCH_PATH: &str = "/instance-storage/batch/synchronous";

/// Outcome of one bulk upsert call.
///
/// A non-success status is reported here, not raised as an error: partial
/// batch failures must not abort the sweep. The error body is kept raw so
/// the service's own diagnostics reach the logs untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Number of records submitted in this batch.
    pub submitted: usize,
    /// HTTP status of the upsert call.
    pub status: u16,
    /// Raw error payload, if the service returned a non-empty body.
    pub error_body: Option<String>,
}

impl BatchResult {
    /// True when the service accepted the batch (2xx, no error payload).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.error_body.is_none()
    }
}

/// Submits pages of records as synchronous upsert batches.
pub struct BatchPublisher<'a, T: Transport> {
    transport: &'a T,
    base_url: &'a str,
    session: &'a Session,
}

impl<'a, T: Transport> BatchPublisher<'a, T> {
    pub fn new(transport: &'a T, base_url: &'a str, session: &'a Session) -> Self {
        Self {
            transport,
            base_url,
            session,
        }
    }

    /// Submit `records` as one upsert batch via
    /// `POST {base}/instance-storage/batch/synchronous?upsert=true`.
    ///
    /// The records are wrapped unmodified in `{"instances": [...]}`; the
    /// remote service matches them by id, creating missing records and
    /// overwriting existing ones. No client-side merge or deduplication.
    ///
    /// # Errors
    /// Only [`crate::SyncError::Transport`] if the call cannot complete.
    /// A reachable server always yields a [`BatchResult`], success or not.
    pub async fn publish_batch(&self, records: &[Record]) -> Result<BatchResult> {
        let submitted = records.len();
        let body = serde_json::to_string(&serde_json::json!({ "instances": records }))?;

        let spec = RequestSpec::post(self.base_url, BATCH_PATH, body)
            .query("upsert", "true")
            .headers(self.session.headers());

        let response = self.transport.execute(&spec).await?;

        tracing::info!(
            submitted = submitted,
            status = response.status,
            "Update instances operation completed"
        );

        let error_body = if response.body.is_empty() {
            None
        } else {
            tracing::error!(
                submitted = submitted,
                status = response.status,
                errors = %response.body,
                "Update instances operation reported errors"
            );
            Some(response.body)
        };

        Ok(BatchResult {
            submitted,
            status: response.status,
            error_body,
        })
    }
}
