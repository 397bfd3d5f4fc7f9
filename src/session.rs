//! Authentication against the Okapi gateway.
//!
//! One login per run: credentials go in, an Okapi header set comes out.
//! There is no refresh or retry; if the token expires mid-run the affected
//! calls surface their failures through the normal error path.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::http::{RequestSpec, Transport};

/// Login credentials. Provided by the caller, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// An authenticated Okapi session: the header set sent on every call after
/// login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Tenant this session is scoped to.
    pub tenant: String,
    /// Token extracted from the login response.
    pub token: String,
}

impl Session {
    /// Render the Okapi header set for an authenticated request.
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("x-okapi-tenant".to_string(), self.tenant.clone()),
            ("x-okapi-token".to_string(), self.token.clone()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]
    }
}

/// Exchange credentials for a [`Session`] via `POST {base}/authn/login`.
///
/// # Errors
/// [`SyncError::Transport`] if the call cannot complete;
/// [`SyncError::Protocol`] if the response body is not JSON or lacks the
/// `okapiToken` field.
pub async fn authenticate<T: Transport>(
    transport: &T,
    base_url: &str,
    tenant: &str,
    credentials: &Credentials,
) -> Result<Session> {
    let body = serde_json::to_string(&serde_json::json!({
        "username": credentials.username,
        "password": credentials.password,
    }))?;

    let spec = RequestSpec::post(base_url, "/authn/login", body).headers(vec![
        ("x-okapi-tenant".to_string(), tenant.to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
    ]);

    let response = transport.execute(&spec).await?;

    let parsed: serde_json::Value = serde_json::from_str(&response.body)
        .map_err(|e| SyncError::protocol(format!("login response is not valid JSON: {e}")))?;

    let token = parsed
        .get("okapiToken")
        .and_then(|t| t.as_str())
        .ok_or_else(|| SyncError::protocol("login response missing field `okapiToken`"))?;

    tracing::info!(tenant = %tenant, "Authenticated against Okapi");

    Ok(Session {
        tenant: tenant.to_string(),
        token: token.to_string(),
    })
}
