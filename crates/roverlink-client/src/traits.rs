//! Trait seams for endpoint resolution and control-plane access
//!
//! The orchestrator depends on these instead of the concrete HTTP types so
//! tests can substitute deterministic doubles.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{Endpoint, EventId};

/// Determines the control-plane base address for this run
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve the endpoint; any `Err` means "skip this cycle"
    async fn resolve(&self) -> Result<Endpoint, ClientError>;
}

/// Typed access to the control-plane endpoints
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Query the current event id (single attempt)
    async fn query_event_id(&self, endpoint: &Endpoint) -> Result<EventId, ClientError>;

    /// Query the provisioning token, retrying until one is obtained
    async fn query_token(&self, endpoint: &Endpoint) -> Result<String, ClientError>;

    /// Best-effort status report; failures are logged and discarded
    async fn report_status(&self, endpoint: &Endpoint, status: &str);
}
