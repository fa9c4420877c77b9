//! roverlink-core: Provisioning decision engine
//!
//! Decides once per boot whether the device must establish or refresh its
//! overlay tunnel to the control plane, and sequences the reconfiguration:
//! cached-state comparison, blocking token fetch, bounded-retry invocation of
//! the external configuration tool, and post-condition verification.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod probe;
pub mod provision;
pub mod state;

pub use config::{ProbeConfig, ProvisionerConfig};
pub use error::CoreError;
pub use orchestrator::{Orchestrator, RunOutcome};
pub use probe::{StatusCommandProbe, TunnelProbe};
pub use provision::{PlaybookProvisioner, Provisioner};
pub use state::StateStore;
