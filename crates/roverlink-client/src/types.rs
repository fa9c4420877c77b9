//! Identifiers shared between the resolver, the client, and their callers

use std::fmt;

/// Opaque identifier of the control-plane deployment the device is bound to.
///
/// Produced by the control plane, cached locally, compared on every run.
/// No internal structure is assumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventId(String);

impl EventId {
    /// Wrap a raw identifier, trimming surrounding whitespace
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    /// The identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for an identifier with no visible content
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved control-plane base URL.
///
/// Valid only for the lifetime of one orchestration run; the control plane
/// can migrate between boots, so this is never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(String);

impl Endpoint {
    /// Normalize a raw URL: drop the query string and any trailing slash
    pub fn from_raw(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        let base = raw.split('?').next().unwrap_or(raw);
        Self(base.trim_end_matches('/').to_string())
    }

    /// The base URL as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL of a control endpoint under this base (`{base}/control/{path}`)
    #[must_use]
    pub fn control_url(&self, path: &str) -> String {
        format!("{}/control/{path}", self.0)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
