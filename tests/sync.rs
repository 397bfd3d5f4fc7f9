//! End-to-end sweep behavior against the mock transport.

use std::sync::Arc;

use parking_lot::Mutex;

use okapi_instance_sync::http::{HttpResponse, Method, MockTransport, RequestSpec};
use okapi_instance_sync::sync::{FailureKind, PageFailure, RunStatus, SyncObserver};
use okapi_instance_sync::{BatchResult, SyncConfig, SyncReport, Syncer};

const LOGIN_KEY: &str = "POST /authn/login";
const FETCH_KEY: &str = "GET /instance-storage/instances";
const PUBLISH_KEY: &str = "POST /instance-storage/batch/synchronous";

fn config(page_size: u64) -> SyncConfig {
    SyncConfig {
        base_url: "https://folio.example.org".to_string(),
        tenant: "diku".to_string(),
        username: "diku_admin".to_string(),
        password: "secret".to_string(),
        page_size,
        filter: "metadata.updatedDate>=\"2024-05-13T00:00:00.000\"".to_string(),
    }
}

fn ok(status: u16, body: &str) -> okapi_instance_sync::Result<HttpResponse> {
    Ok(HttpResponse {
        status,
        body: body.to_string(),
    })
}

fn login_response(mock: &MockTransport) {
    mock.add_response(LOGIN_KEY, ok(201, r#"{"okapiToken":"tok-xyz"}"#));
}

fn count_response(mock: &MockTransport, total: u64) {
    mock.add_response(
        FETCH_KEY,
        ok(200, &format!(r#"{{"instances":[],"totalRecords":{total}}}"#)),
    );
}

/// A page of `n` records with ids starting at `first_id`.
fn page_body(first_id: u64, n: u64) -> String {
    let records: Vec<String> = (first_id..first_id + n)
        .map(|i| format!(r#"{{"id":"{i}","title":"instance {i}"}}"#))
        .collect();
    format!(
        r#"{{"instances":[{}],"totalRecords":{}}}"#,
        records.join(","),
        n
    )
}

fn calls_matching(mock: &MockTransport, method: Method, path: &str) -> Vec<RequestSpec> {
    mock.get_calls()
        .into_iter()
        .filter(|c| c.method == method && c.path == path)
        .collect()
}

#[test_log::test(tokio::test)]
async fn sweep_issues_ceil_t_over_p_fetches_at_page_offsets() {
    let mock = MockTransport::new();
    login_response(&mock);
    // T=5, P=2: pages at offsets 0, 2, 4 and the last page is short.
    count_response(&mock, 5);
    mock.add_response(FETCH_KEY, Ok(HttpResponse { status: 200, body: page_body(0, 2) }));
    mock.add_response(FETCH_KEY, Ok(HttpResponse { status: 200, body: page_body(2, 2) }));
    mock.add_response(FETCH_KEY, Ok(HttpResponse { status: 200, body: page_body(4, 1) }));
    for _ in 0..3 {
        mock.add_response(PUBLISH_KEY, ok(201, ""));
    }

    let report = Syncer::new(mock.clone(), config(2)).run().await.unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.pages_attempted, 3);
    assert_eq!(report.pages_published, 3);
    assert_eq!(report.status, RunStatus::Done);
    assert!(report.failures.is_empty());

    // First storage call is the count (limit=0); then one fetch per window,
    // each requesting the full page size and advancing by it.
    let storage_calls = calls_matching(&mock, Method::Get, "/instance-storage/instances");
    assert_eq!(storage_calls.len(), 4);
    assert!(storage_calls[0]
        .query
        .contains(&("limit".to_string(), "0".to_string())));
    for (call, (expected_offset, expected_limit)) in storage_calls[1..]
        .iter()
        .zip([("0", "2"), ("2", "2"), ("4", "1")])
    {
        assert!(call
            .query
            .contains(&("offset".to_string(), expected_offset.to_string())));
        assert!(call
            .query
            .contains(&("limit".to_string(), expected_limit.to_string())));
        // Identical filter string on count and every page.
        assert_eq!(call.query[0], storage_calls[0].query[0]);
    }

    // The short final page still produces a batch of 1.
    let publishes = calls_matching(&mock, Method::Post, "/instance-storage/batch/synchronous");
    assert_eq!(publishes.len(), 3);
    let last: serde_json::Value =
        serde_json::from_str(publishes[2].body.as_deref().unwrap()).unwrap();
    assert_eq!(last["instances"].as_array().unwrap().len(), 1);
}

#[test_log::test(tokio::test)]
async fn empty_collection_reaches_done_without_fetch_or_publish() {
    let mock = MockTransport::new();
    login_response(&mock);
    count_response(&mock, 0);

    let report = Syncer::new(mock.clone(), config(100)).run().await.unwrap();

    assert_eq!(report.total, 0);
    assert_eq!(report.pages_attempted, 0);
    assert_eq!(report.status, RunStatus::Done);
    // Exactly login + count, nothing else.
    assert_eq!(mock.call_count(), 2);
    assert!(calls_matching(&mock, Method::Post, "/instance-storage/batch/synchronous").is_empty());
}

#[test_log::test(tokio::test)]
async fn auth_failure_aborts_before_any_storage_call() {
    let mock = MockTransport::new();
    mock.add_response(
        LOGIN_KEY,
        Err(okapi_instance_sync::SyncError::Other(anyhow::anyhow!(
            "connection refused"
        ))),
    );

    let result = Syncer::new(mock.clone(), config(100)).run().await;

    assert!(result.is_err());
    assert_eq!(mock.call_count(), 1);
    assert!(calls_matching(&mock, Method::Get, "/instance-storage/instances").is_empty());
}

#[test_log::test(tokio::test)]
async fn fetched_page_is_republished_in_order_unmodified() {
    let mock = MockTransport::new();
    login_response(&mock);
    count_response(&mock, 2);
    mock.add_response(
        FETCH_KEY,
        ok(
            200,
            r#"{"instances":[{"id":"1","title":"a","nested":{"k":[1,2]}},{"id":"2","title":"b"}],"totalRecords":2}"#,
        ),
    );
    mock.add_response(PUBLISH_KEY, ok(201, ""));

    Syncer::new(mock.clone(), config(100)).run().await.unwrap();

    let publishes = calls_matching(&mock, Method::Post, "/instance-storage/batch/synchronous");
    assert_eq!(publishes.len(), 1);
    let body: serde_json::Value =
        serde_json::from_str(publishes[0].body.as_deref().unwrap()).unwrap();
    let instances = body["instances"].as_array().unwrap();
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0]["id"], "1");
    assert_eq!(instances[0]["nested"]["k"][1], 2);
    assert_eq!(instances[1]["id"], "2");
    // Okapi headers from the session on the publish call too.
    assert!(publishes[0]
        .headers
        .contains(&("x-okapi-token".to_string(), "tok-xyz".to_string())));
}

#[test_log::test(tokio::test)]
async fn failed_publish_is_recorded_and_sweep_continues() {
    let mock = MockTransport::new();
    login_response(&mock);
    count_response(&mock, 4);
    mock.add_response(FETCH_KEY, Ok(HttpResponse { status: 200, body: page_body(0, 2) }));
    mock.add_response(FETCH_KEY, Ok(HttpResponse { status: 200, body: page_body(2, 2) }));
    // First window rejected, second accepted.
    mock.add_response(PUBLISH_KEY, ok(422, r#"{"errors":[{"message":"bad id"}]}"#));
    mock.add_response(PUBLISH_KEY, ok(201, ""));

    let report = Syncer::new(mock.clone(), config(2)).run().await.unwrap();

    assert_eq!(report.pages_attempted, 2);
    assert_eq!(report.pages_published, 1);
    assert_eq!(report.status, RunStatus::DoneWithGaps);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.offset, 0);
    assert_eq!(failure.kind, FailureKind::PublishFailed);
    assert_eq!(failure.submitted, 2);
    assert_eq!(failure.status, Some(422));
    assert!(failure.detail.contains("bad id"));
}

#[test_log::test(tokio::test)]
async fn failed_fetch_skips_window_and_sweep_continues() {
    let mock = MockTransport::new();
    login_response(&mock);
    count_response(&mock, 4);
    mock.add_response(
        FETCH_KEY,
        Err(okapi_instance_sync::SyncError::Other(anyhow::anyhow!(
            "connection reset"
        ))),
    );
    mock.add_response(FETCH_KEY, Ok(HttpResponse { status: 200, body: page_body(2, 2) }));
    mock.add_response(PUBLISH_KEY, ok(201, ""));

    let report = Syncer::new(mock.clone(), config(2)).run().await.unwrap();

    assert_eq!(report.pages_attempted, 2);
    assert_eq!(report.pages_published, 1);
    assert_eq!(report.status, RunStatus::DoneWithGaps);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, FailureKind::FetchFailed);
    assert_eq!(report.failures[0].offset, 0);
    assert_eq!(report.failures[0].submitted, 0);

    // The failed window produced no publish; the next one did.
    let publishes = calls_matching(&mock, Method::Post, "/instance-storage/batch/synchronous");
    assert_eq!(publishes.len(), 1);
    let body: serde_json::Value =
        serde_json::from_str(publishes[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["instances"][0]["id"], "2");
}

/// Observer that records every callback, for asserting the port is driven.
#[derive(Clone, Default)]
struct RecordingObserver {
    published: Arc<Mutex<Vec<(u64, BatchResult)>>>,
    failed: Arc<Mutex<Vec<PageFailure>>>,
    reports: Arc<Mutex<Vec<SyncReport>>>,
}

impl SyncObserver for RecordingObserver {
    fn page_published(&self, offset: u64, result: &BatchResult) {
        self.published.lock().push((offset, result.clone()));
    }

    fn page_failed(&self, failure: &PageFailure) {
        self.failed.lock().push(failure.clone());
    }

    fn run_finished(&self, report: &SyncReport) {
        self.reports.lock().push(report.clone());
    }
}

#[test_log::test(tokio::test)]
async fn observer_sees_every_outcome() {
    let mock = MockTransport::new();
    login_response(&mock);
    count_response(&mock, 4);
    mock.add_response(FETCH_KEY, Ok(HttpResponse { status: 200, body: page_body(0, 2) }));
    mock.add_response(FETCH_KEY, Ok(HttpResponse { status: 200, body: page_body(2, 2) }));
    mock.add_response(PUBLISH_KEY, ok(201, ""));
    mock.add_response(PUBLISH_KEY, ok(500, "boom"));

    let observer = RecordingObserver::default();
    let syncer = Syncer::with_observer(mock, config(2), observer.clone());
    let report = syncer.run().await.unwrap();

    let published = observer.published.lock();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, 0);
    assert_eq!(published[0].1.submitted, 2);

    let failed = observer.failed.lock();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].offset, 2);

    let reports = observer.reports.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, report.status);
    assert_eq!(report.status, RunStatus::DoneWithGaps);
}
