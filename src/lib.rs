//! Bulk re-sync of recently updated FOLIO instance records.
//!
//! This crate authenticates against an Okapi gateway, counts the instances
//! matching a CQL filter, then walks the filtered collection in fixed-size
//! windows, republishing each window through the synchronous batch upsert
//! endpoint. Partial batch failures are reported per window and never abort
//! the sweep; the final report says whether the run was clean or has gaps.

pub mod error;
pub mod http;
pub mod publisher;
pub mod session;
pub mod source;
pub mod sync;

// Re-export commonly used types
pub use error::{Result, SyncError};
pub use http::{HttpResponse, MockTransport, ReqwestTransport, Transport};
pub use publisher::{BatchPublisher, BatchResult};
pub use session::{authenticate, Credentials, Session};
pub use source::{InstanceSource, Page, Record};
pub use sync::{
    FailureKind, PageFailure, RunStatus, SyncConfig, SyncObserver, SyncReport, Syncer,
    TracingObserver, UPDATED_DATE_FILTER,
};
