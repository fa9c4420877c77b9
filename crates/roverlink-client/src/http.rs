//! HTTP client for the control-plane endpoints

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::error::{ClientError, Result};
use crate::traits::ControlPlane;
use crate::types::{Endpoint, EventId};

/// Per-request timeout for all control-plane and resolution calls
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Basic-auth credentials for the control plane
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    /// Username
    pub user: String,
    /// Password
    pub password: String,
}

pub(crate) fn apply_auth(
    request: RequestBuilder,
    credentials: Option<&BasicCredentials>,
) -> RequestBuilder {
    match credentials {
        Some(creds) => request.basic_auth(&creds.user, Some(&creds.password)),
        None => request,
    }
}

/// Pull a field out of a JSON body, falling back to the raw text.
///
/// The control plane answers either as JSON (`{"event_id": ...}`) or as a
/// bare string, depending on its version.
fn extract_field(body: &str, keys: &[&str]) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in keys {
            if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
                return s.trim().to_string();
            }
        }
        if let Some(s) = value.as_str() {
            return s.trim().to_string();
        }
        return value.to_string();
    }
    body.trim().to_string()
}

/// Typed HTTP access to the resolved control-plane base URL
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    http: Client,
    robot_name: String,
    credentials: Option<BasicCredentials>,
    token_retry_delay: Duration,
}

impl ControlPlaneClient {
    /// Create a client for the given device identity
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        robot_name: impl Into<String>,
        credentials: Option<BasicCredentials>,
        token_retry_delay: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            robot_name: robot_name.into(),
            credentials,
            token_retry_delay,
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        apply_auth(self.http.get(url), self.credentials.as_ref())
            .query(&[("robot_name", self.robot_name.as_str())])
    }

    async fn fetch_token_once(&self, url: &str) -> Result<String> {
        let response = self.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        let body = response.text().await?;
        let token = extract_field(&body, &["token", "skupper_token"]);
        if token.is_empty() {
            return Err(ClientError::EmptyResponse("token"));
        }
        Ok(token)
    }
}

#[async_trait::async_trait]
impl ControlPlane for ControlPlaneClient {
    #[instrument(skip(self), fields(robot_name = %self.robot_name))]
    async fn query_event_id(&self, endpoint: &Endpoint) -> Result<EventId> {
        let url = endpoint.control_url("eventId");
        debug!(%url, "querying event id");

        let response = self.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        let event_id = EventId::new(extract_field(&body, &["event_id", "eventId"]));
        // A 200 with nothing in it is a malfunctioning control plane, not a
        // new deployment; callers must not provision against it.
        if event_id.is_empty() {
            return Err(ClientError::EmptyResponse("event id"));
        }
        info!(%event_id, "received event id");
        Ok(event_id)
    }

    /// Blocks until a token is obtained; provisioning cannot proceed without
    /// one, so there is no retry cap. The token value itself is never logged.
    #[instrument(skip(self), fields(robot_name = %self.robot_name))]
    async fn query_token(&self, endpoint: &Endpoint) -> Result<String> {
        let url = endpoint.control_url("getToken");
        info!(%url, "querying provisioning token");
        self.report_status(endpoint, "querying token").await;

        loop {
            match self.fetch_token_once(&url).await {
                Ok(token) => {
                    info!("provisioning token retrieved");
                    self.report_status(endpoint, "token retrieved").await;
                    return Ok(token);
                }
                Err(e) => {
                    warn!(error = %e, delay = ?self.token_retry_delay, "token query failed, retrying");
                }
            }
            sleep(self.token_retry_delay).await;
        }
    }

    async fn report_status(&self, endpoint: &Endpoint, status: &str) {
        let url = endpoint.control_url("initStatus");
        let form = [
            ("robot_name", self.robot_name.as_str()),
            ("status", status),
        ];

        let request = apply_auth(self.http.post(&url), self.credentials.as_ref());
        match request.form(&form).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(status, "init status reported");
            }
            Ok(response) => {
                warn!(status, http_status = %response.status(), "init status report rejected");
            }
            Err(e) => {
                warn!(status, error = %e, "could not report init status");
            }
        }
    }
}
