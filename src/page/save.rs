//! HTTP save endpoint
//!
//! Covers the common case where the merged record is POSTed to an
//! admin-panel endpoint. Anything else (a queue, a local command bus, a test
//! double) can be handed to `save_changes` directly as an async closure.

use super::SavePayload;
use crate::error::{Result, StateError};
use serde_json::Value;
use tracing::debug;

/// Header carrying the caller-supplied CSRF token.
const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// POSTs save payloads to an admin-panel endpoint as JSON.
///
/// # Example
///
/// ```no_run
/// use dashstate::{HttpSaveEndpoint, MultiComponentPageState};
/// use serde_json::{json, Map};
///
/// # async fn example() -> dashstate::Result<()> {
/// let endpoint = HttpSaveEndpoint::new("https://admin.example.com/api/pages/save")
///     .with_csrf_token("token-from-session");
///
/// let mut page = MultiComponentPageState::new();
/// page.initialize_page("Settings", vec!["General".into()], Map::new())?;
/// page.update_field("site_name", json!("Acme"), None);
///
/// let result = page
///     .save_changes(|payload| async move { endpoint.save(&payload).await }, None)
///     .await?;
/// assert!(result.success);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpSaveEndpoint {
    client: reqwest::Client,
    url: String,
    csrf_token: Option<String>,
}

impl HttpSaveEndpoint {
    /// Endpoint at `url` with a default client and no CSRF token.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            csrf_token: None,
        }
    }

    /// Endpoint reusing an existing client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            csrf_token: None,
        }
    }

    /// Attach the CSRF token the caller's session supplies; it is sent as
    /// the `X-CSRF-TOKEN` header on every save.
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Submit `payload`, returning the endpoint's JSON response body.
    ///
    /// Non-2xx responses become [`StateError::SaveFailed`] carrying the
    /// status and response text.
    pub async fn save(&self, payload: &SavePayload) -> Result<Value> {
        debug!("posting {} fields to {}", payload.fields.len(), self.url);

        let mut request = self.client.post(&self.url).json(payload);
        if let Some(token) = &self.csrf_token {
            request = request.header(CSRF_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StateError::SaveFailed(format!(
                "endpoint returned {status}: {body}"
            )));
        }

        Ok(response.json().await?)
    }
}
