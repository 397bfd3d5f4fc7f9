//! Orchestration of a full sync run.
//!
//! One run is: authenticate, count the filtered collection, then walk it in
//! fixed-size windows, republishing each window as a bulk upsert. Auth and
//! count failures abort the run; per-page failures are recorded and the
//! sweep moves on to the next offset. The report distinguishes a clean run
//! (`Done`) from one that skipped or failed pages (`DoneWithGaps`).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::Transport;
use crate::publisher::{BatchPublisher, BatchResult};
use crate::session::{authenticate, Credentials};
use crate::source::InstanceSource;

/// CQL filter matching instances updated at or after the 2024-05-13 cutoff.
///
/// Kept for wire compatibility with earlier sync runs; [`SyncConfig`]
/// defaults to it but callers may inject any filter.
pub const UPDATED_DATE_FILTER: &str = r#"metadata.updatedDate>="2024-05-13T00:00:00.000""#;

/// Configuration for one sync run.
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base Okapi URL, e.g. `https://folio.example.org`.
    pub base_url: String,

    /// Tenant identifier sent on every call.
    pub tenant: String,

    /// Login username.
    pub username: String,

    /// Login password.
    pub password: String,

    /// Window size for page fetches and upsert batches.
    pub page_size: u64,

    /// CQL filter selecting the records to sync. The same string is used
    /// for the count query and every page query.
    pub filter: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            tenant: String::new(),
            username: String::new(),
            password: String::new(),
            page_size: 100,
            filter: UPDATED_DATE_FILTER.to_string(),
        }
    }
}

/// How a page failed mid-sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The page fetch errored; nothing was submitted for this window.
    FetchFailed,
    /// The upsert call errored at the transport level, or completed with a
    /// non-success result.
    PublishFailed,
}

/// One failed window, with enough context for manual replay.
#[derive(Debug, Clone, Serialize)]
pub struct PageFailure {
    /// Offset of the failed window.
    pub offset: u64,
    pub kind: FailureKind,
    /// Records submitted before the failure (0 for fetch failures).
    pub submitted: usize,
    /// HTTP status of the failed upsert, when one completed.
    pub status: Option<u16>,
    /// Error message or raw service error payload.
    pub detail: String,
}

/// Terminal status of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every window was fetched and accepted by the service.
    Done,
    /// The sweep completed, but at least one window failed and its records
    /// were skipped. The failures list says which.
    DoneWithGaps,
}

/// Summary of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Total matching records, as measured once at the start of the run.
    pub total: u64,
    /// Window size used for the sweep.
    pub page_size: u64,
    /// Number of fetch attempts made.
    pub pages_attempted: u64,
    /// Number of windows accepted by the service.
    pub pages_published: u64,
    pub status: RunStatus,
    pub failures: Vec<PageFailure>,
}

/// Run-scoped observability port.
///
/// Injected into [`Syncer`] so outcomes reach whatever sink the caller
/// wants, instead of being welded to process-global logger state. The
/// default [`TracingObserver`] emits `tracing` events.
pub trait SyncObserver: Send + Sync {
    /// A window was accepted by the service.
    fn page_published(&self, offset: u64, result: &BatchResult) {
        let _ = (offset, result);
    }

    /// A window failed and its records were skipped.
    fn page_failed(&self, failure: &PageFailure) {
        let _ = failure;
    }

    /// The sweep finished.
    fn run_finished(&self, report: &SyncReport) {
        let _ = report;
    }
}

/// Default observer: structured log events per outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn page_published(&self, offset: u64, result: &BatchResult) {
        tracing::info!(
            offset = offset,
            submitted = result.submitted,
            status = result.status,
            "Page published"
        );
    }

    fn page_failed(&self, failure: &PageFailure) {
        tracing::error!(
            offset = failure.offset,
            kind = ?failure.kind,
            submitted = failure.submitted,
            status = failure.status,
            detail = %failure.detail,
            "Page failed, continuing sweep"
        );
    }

    fn run_finished(&self, report: &SyncReport) {
        tracing::info!(
            total = report.total,
            pages_attempted = report.pages_attempted,
            pages_published = report.pages_published,
            failed = report.failures.len(),
            status = ?report.status,
            "Sync run finished"
        );
    }
}

/// Drives a full sync run over an injected transport and observer.
pub struct Syncer<T: Transport, O: SyncObserver = TracingObserver> {
    transport: T,
    config: SyncConfig,
    observer: O,
}

impl<T: Transport> Syncer<T> {
    /// Create a syncer with the default tracing observer.
    pub fn new(transport: T, config: SyncConfig) -> Self {
        Self {
            transport,
            config,
            observer: TracingObserver,
        }
    }
}

impl<T: Transport, O: SyncObserver> Syncer<T, O> {
    /// Create a syncer with a caller-supplied observer.
    pub fn with_observer(transport: T, config: SyncConfig, observer: O) -> Self {
        Self {
            transport,
            config,
            observer,
        }
    }

    /// Run the sweep to completion.
    ///
    /// # Errors
    /// Authentication and count failures abort the run and are returned to
    /// the caller; nothing has been published when they occur. Once paging
    /// starts, failures no longer abort: they are recorded in the report
    /// and the sweep advances to the next offset.
    pub async fn run(&self) -> Result<SyncReport> {
        let cfg = &self.config;
        if cfg.page_size == 0 {
            return Err(anyhow::anyhow!("page_size must be non-zero").into());
        }

        let credentials = Credentials {
            username: cfg.username.clone(),
            password: cfg.password.clone(),
        };
        let session =
            authenticate(&self.transport, &cfg.base_url, &cfg.tenant, &credentials).await?;

        let source = InstanceSource::new(&self.transport, &cfg.base_url, &session, &cfg.filter);
        let publisher = BatchPublisher::new(&self.transport, &cfg.base_url, &session);

        let total = source.count().await?;
        tracing::info!(total = total, page_size = cfg.page_size, "Starting sweep");

        let mut pages_attempted = 0u64;
        let mut pages_published = 0u64;
        let mut failures: Vec<PageFailure> = Vec::new();

        let mut offset = 0u64;
        while offset < total {
            pages_attempted += 1;

            // The final window only asks for what the count says is left.
            let limit = cfg.page_size.min(total - offset);
            let page = match source.fetch_page(offset, limit).await {
                Ok(page) => page,
                Err(e) => {
                    let failure = PageFailure {
                        offset,
                        kind: FailureKind::FetchFailed,
                        submitted: 0,
                        status: None,
                        detail: e.to_string(),
                    };
                    self.observer.page_failed(&failure);
                    failures.push(failure);
                    offset += cfg.page_size;
                    continue;
                }
            };

            if page.records.is_empty() {
                // The collection shrank since the count; nothing to publish.
                offset += cfg.page_size;
                continue;
            }

            match publisher.publish_batch(&page.records).await {
                Ok(result) if result.is_success() => {
                    self.observer.page_published(offset, &result);
                    pages_published += 1;
                }
                Ok(result) => {
                    let failure = PageFailure {
                        offset,
                        kind: FailureKind::PublishFailed,
                        submitted: result.submitted,
                        status: Some(result.status),
                        detail: result.error_body.unwrap_or_default(),
                    };
                    self.observer.page_failed(&failure);
                    failures.push(failure);
                }
                Err(e) => {
                    let failure = PageFailure {
                        offset,
                        kind: FailureKind::PublishFailed,
                        submitted: page.records.len(),
                        status: None,
                        detail: e.to_string(),
                    };
                    self.observer.page_failed(&failure);
                    failures.push(failure);
                }
            }

            offset += cfg.page_size;
        }

        let status = if failures.is_empty() {
            RunStatus::Done
        } else {
            RunStatus::DoneWithGaps
        };

        let report = SyncReport {
            total,
            page_size: cfg.page_size,
            pages_attempted,
            pages_published,
            status,
            failures,
        };
        self.observer.run_finished(&report);
        Ok(report)
    }
}
