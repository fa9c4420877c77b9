//! Tunnel connectivity probe

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use roverlink_exec::{CommandRunner, CommandSpec};

use crate::config::ProbeConfig;

/// Marker that the tunnel has an established connection
const CONNECTED_MARKER: &str = "connected to";

/// Marker that the connection reaches another site, not just the local one
const PEER_MARKER: &str = "other site";

/// Answers "is the tunnel up right now?"
#[async_trait]
pub trait TunnelProbe: Send + Sync {
    /// True only on positive evidence of an established tunnel
    async fn is_up(&self) -> bool;
}

/// Probe that runs the tunnel status command and inspects its output.
///
/// "Up" requires exit 0 AND both connectivity markers in the output.
/// Right after a reboot the tunnel process may still be initializing, so
/// anything ambiguous (missing binary, timeout, single marker) counts as
/// down.
pub struct StatusCommandProbe {
    runner: Arc<dyn CommandRunner>,
    config: ProbeConfig,
}

impl StatusCommandProbe {
    /// Create a probe around the given runner
    pub fn new(runner: Arc<dyn CommandRunner>, config: ProbeConfig) -> Self {
        Self { runner, config }
    }
}

#[async_trait]
impl TunnelProbe for StatusCommandProbe {
    #[instrument(skip(self))]
    async fn is_up(&self) -> bool {
        let Some((program, args)) = self.config.command.split_first() else {
            warn!("no tunnel status command configured");
            return false;
        };
        let spec = CommandSpec::new(program.as_str()).args(args.iter().cloned());

        debug!(command = %spec.display(), "checking tunnel status");
        let result = match self.runner.run_with_timeout(&spec, self.config.timeout).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "could not run tunnel status command");
                return false;
            }
        };

        if !result.success() {
            warn!(status = result.status, "tunnel appears to be down or not configured");
            debug!(stderr = %result.stderr, "tunnel status stderr");
            return false;
        }

        let stdout = result.stdout.to_lowercase();
        let connected = stdout.contains(CONNECTED_MARKER) && stdout.contains(PEER_MARKER);
        if connected {
            info!("tunnel is up and connected to another site");
        } else {
            info!("tunnel is enabled but not connected to any other site");
            debug!(stdout = %result.stdout, "tunnel status output");
        }
        connected
    }
}
