//! Control-plane endpoint resolution
//!
//! The control plane can migrate between boots, so the base address is
//! re-resolved on every run. Three mutually exclusive strategies: use a
//! configured URL directly, look the address up in a source repository, or
//! chase a redirect URL hop by hop.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Client, StatusCode, header, redirect};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::error::{ClientError, Result};
use crate::http::{BasicCredentials, HTTP_TIMEOUT, apply_auth};
use crate::traits::Resolver;
use crate::types::Endpoint;

/// Hard cap on redirect hops per chase attempt
const MAX_REDIRECT_HOPS: usize = 10;

/// Fallback lookup entry used when no device-specific entry exists
const CATCH_ALL: &str = "catch-all";

/// How the control-plane base address is discovered
#[derive(Debug, Clone)]
pub enum ResolveStrategy {
    /// The configured URL is the endpoint; no network call
    Direct {
        /// Configured base URL
        url: String,
    },
    /// Fetch the endpoint from a raw-content file in a source repository
    RepoLookup {
        /// Repository URL, e.g. `https://github.com/org/fleet-endpoints.git`
        repo: String,
        /// Branch holding the endpoint files
        branch: String,
        /// Access token for private repositories
        token: Option<String>,
    },
    /// Follow a redirect URL to wherever it currently points
    RedirectChase {
        /// Starting URL of the chase
        url: String,
    },
}

/// Derive the raw-content base URL for a repository reference
fn github_raw_base(repo: &str, branch: &str) -> Result<String> {
    let parsed = Url::parse(repo.trim())?;
    if parsed.host_str() != Some("github.com") {
        return Err(ClientError::Config(format!(
            "not a github.com repository URL: {repo}"
        )));
    }
    let path = parsed.path().trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if path.is_empty() || !path.contains('/') {
        return Err(ClientError::Config(format!(
            "repository URL has no owner/name path: {repo}"
        )));
    }
    Ok(format!("https://raw.githubusercontent.com/{path}/{branch}"))
}

/// Resolves the control-plane base address once per run
pub struct EndpointResolver {
    strategy: ResolveStrategy,
    robot_name: String,
    credentials: Option<BasicCredentials>,
    retries: u32,
    retry_delay: Duration,
    http: Client,
}

impl EndpointResolver {
    /// Create a resolver for the given strategy
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        strategy: ResolveStrategy,
        robot_name: impl Into<String>,
        credentials: Option<BasicCredentials>,
        retries: u32,
        retry_delay: Duration,
    ) -> Result<Self> {
        let builder = Client::builder().timeout(HTTP_TIMEOUT);
        // The chase inspects every hop itself; reqwest must not follow.
        let builder = match &strategy {
            ResolveStrategy::RedirectChase { .. } => builder.redirect(redirect::Policy::none()),
            _ => builder,
        };
        Ok(Self {
            strategy,
            robot_name: robot_name.into(),
            credentials,
            retries,
            retry_delay,
            http: builder.build()?,
        })
    }

    fn attempts(&self) -> u32 {
        self.retries.max(1)
    }

    /// Try the device-specific entry, then the catch-all entry
    async fn fetch_lookup_entry(&self, raw_base: &str) -> Option<Endpoint> {
        let token = match &self.strategy {
            ResolveStrategy::RepoLookup { token, .. } => token.as_deref(),
            _ => None,
        };

        for name in [self.robot_name.as_str(), CATCH_ALL] {
            let url = format!("{raw_base}/{name}");
            debug!(%url, "fetching endpoint entry");

            let request = self.http.get(&url);
            let request = match token {
                Some(t) => request.header(header::AUTHORIZATION, format!("token {t}")),
                None => request,
            };

            match request.send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    if let Ok(body) = response.text().await
                        && !body.trim().is_empty()
                    {
                        let endpoint = Endpoint::from_raw(&body);
                        info!(entry = name, %endpoint, "resolved endpoint from lookup");
                        return Some(endpoint);
                    }
                }
                Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                    debug!(%url, "no lookup entry");
                }
                Ok(response) => {
                    warn!(%url, status = %response.status(), "lookup returned unexpected status");
                }
                Err(e) => {
                    warn!(%url, error = %e, "lookup fetch failed");
                }
            }
        }
        None
    }

    async fn resolve_from_lookup(&self, repo: &str, branch: &str) -> Result<Endpoint> {
        let raw_base = github_raw_base(repo, branch)?;

        for attempt in 1..=self.attempts() {
            if attempt > 1 {
                info!(delay = ?self.retry_delay, "retrying endpoint lookup");
                sleep(self.retry_delay).await;
            }
            if let Some(endpoint) = self.fetch_lookup_entry(&raw_base).await {
                return Ok(endpoint);
            }
        }

        error!("could not resolve endpoint from lookup (tried device entry and catch-all)");
        Err(ClientError::LookupFailed)
    }

    /// One full chase from the starting URL to a non-redirect response
    async fn chase(&self, start: &str) -> Result<Endpoint> {
        let mut url = Url::parse(start)?;
        let mut seen = HashSet::new();

        for _ in 0..MAX_REDIRECT_HOPS {
            if !seen.insert(url.to_string()) {
                return Err(ClientError::RedirectLoop(url.to_string()));
            }

            debug!(%url, "following redirect URL");
            let response = apply_auth(self.http.get(url.clone()), self.credentials.as_ref())
                .send()
                .await?;

            let status = response.status();
            if status.is_client_error() || status.is_server_error() {
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            if status.is_redirection()
                && let Some(location) = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
            {
                // Relative locations resolve against the URL just requested,
                // not against the original one.
                url = response.url().join(location)?;
                continue;
            }

            let endpoint = Endpoint::from_raw(response.url().as_str());
            info!(%endpoint, "resolved endpoint from redirect");
            return Ok(endpoint);
        }

        Err(ClientError::TooManyRedirects {
            limit: MAX_REDIRECT_HOPS,
        })
    }

    async fn resolve_from_redirects(&self, start: &str) -> Result<Endpoint> {
        let mut last_error = None;

        for attempt in 1..=self.attempts() {
            if attempt > 1 {
                info!(delay = ?self.retry_delay, "retrying redirect chase");
                sleep(self.retry_delay).await;
            }
            match self.chase(start).await {
                Ok(endpoint) => return Ok(endpoint),
                // A loop or an exhausted hop budget will not fix itself.
                Err(e @ (ClientError::RedirectLoop(_) | ClientError::TooManyRedirects { .. })) => {
                    error!(error = %e, "redirect chase aborted");
                    return Err(e);
                }
                Err(e) => {
                    warn!(attempt, retries = self.attempts(), error = %e, "redirect chase attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ClientError::TooManyRedirects {
            limit: MAX_REDIRECT_HOPS,
        }))
    }
}

#[async_trait::async_trait]
impl Resolver for EndpointResolver {
    #[instrument(skip(self), fields(robot_name = %self.robot_name))]
    async fn resolve(&self) -> Result<Endpoint> {
        match &self.strategy {
            ResolveStrategy::Direct { url } => {
                let endpoint = Endpoint::from_raw(url);
                info!(%endpoint, "using configured endpoint directly");
                Ok(endpoint)
            }
            ResolveStrategy::RepoLookup { repo, branch, .. } => {
                self.resolve_from_lookup(repo, branch).await
            }
            ResolveStrategy::RedirectChase { url } => self.resolve_from_redirects(url).await,
        }
    }
}
