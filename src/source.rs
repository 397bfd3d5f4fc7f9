//! Read side of the sync: counting and paging through instance records.
//!
//! Both operations hit `GET {base}/instance-storage/instances` with the same
//! CQL filter, so the count and every page describe the same (best-effort)
//! view of the collection.

use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::http::{RequestSpec, Transport};
use crate::session::Session;

const INSTANCES_PATH: &str = "/instance-storage/instances";

/// An instance record. Opaque to this client: fetched and republished
/// unmodified, identified remotely by its `id` field.
pub type Record = Value;

/// One window over the filtered result set.
#[derive(Debug, Clone)]
pub struct Page {
    /// Offset this page was fetched at.
    pub offset: u64,
    /// Records returned by the service, in server order. May be shorter
    /// than the requested limit at the end of the collection.
    pub records: Vec<Record>,
}

/// Query side of the sync: count and page fetches against instance storage.
pub struct InstanceSource<'a, T: Transport> {
    transport: &'a T,
    base_url: &'a str,
    session: &'a Session,
    /// CQL filter sent verbatim with the count and every page fetch.
    filter: &'a str,
}

impl<'a, T: Transport> InstanceSource<'a, T> {
    pub fn new(transport: &'a T, base_url: &'a str, session: &'a Session, filter: &'a str) -> Self {
        Self {
            transport,
            base_url,
            session,
            filter,
        }
    }

    /// Total number of records matching the filter.
    ///
    /// Issues the query with `limit=0` and reads `totalRecords`. Returns 0
    /// for an empty collection.
    ///
    /// # Errors
    /// [`SyncError::Transport`] on network failure; [`SyncError::Protocol`]
    /// if `totalRecords` is absent or not a non-negative integer.
    pub async fn count(&self) -> Result<u64> {
        let spec = RequestSpec::get(self.base_url, INSTANCES_PATH)
            .query("query", self.filter)
            .query("limit", "0")
            .headers(self.session.headers());

        let response = self.transport.execute(&spec).await?;
        let parsed: Value = serde_json::from_str(&response.body)
            .map_err(|e| SyncError::protocol(format!("count response is not valid JSON: {e}")))?;

        parsed
            .get("totalRecords")
            .and_then(|t| t.as_u64())
            .ok_or_else(|| SyncError::protocol("count response missing field `totalRecords`"))
    }

    /// Fetch one page of matching records at `offset`.
    ///
    /// Returns between 0 and `limit` records; fewer at the end of the
    /// collection, or when the collection shrank since [`Self::count`].
    /// No retries; the caller decides failure policy.
    pub async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Page> {
        let spec = RequestSpec::get(self.base_url, INSTANCES_PATH)
            .query("query", self.filter)
            .query("offset", offset.to_string())
            .query("limit", limit.to_string())
            .headers(self.session.headers());

        let response = self.transport.execute(&spec).await?;
        let mut parsed: Value = serde_json::from_str(&response.body)
            .map_err(|e| SyncError::protocol(format!("page response is not valid JSON: {e}")))?;

        let records = match parsed.get_mut("instances").map(Value::take) {
            Some(Value::Array(records)) => records,
            _ => {
                return Err(SyncError::protocol(
                    "page response missing field `instances`",
                ))
            }
        };

        tracing::debug!(
            offset = offset,
            limit = limit,
            returned = records.len(),
            "Fetched instance page"
        );

        Ok(Page { offset, records })
    }
}
