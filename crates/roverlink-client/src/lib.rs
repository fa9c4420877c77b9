//! roverlink-client: Control-plane discovery and HTTP access
//!
//! Resolves the control-plane base URL (directly, via a repository lookup, or
//! by chasing redirects) and talks to the control-plane endpoints for event
//! ids, provisioning tokens, and status reports.

pub mod error;
pub mod http;
pub mod resolver;
pub mod traits;
pub mod types;

pub use error::ClientError;
pub use http::{BasicCredentials, ControlPlaneClient};
pub use resolver::{EndpointResolver, ResolveStrategy};
pub use traits::{ControlPlane, Resolver};
pub use types::{Endpoint, EventId};
