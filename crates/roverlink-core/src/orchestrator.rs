//! Per-boot orchestration of the provisioning decision
//!
//! Sequences resolution, event-id comparison, token fetch, provisioning, and
//! post-condition verification exactly once per invocation. The cached event
//! id is mutated only when a full provisioning attempt succeeded for the
//! currently queried id.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use roverlink_client::{ControlPlane, Endpoint, EventId, Resolver};

use crate::probe::TunnelProbe;
use crate::provision::Provisioner;
use crate::state::StateStore;

/// How a single orchestration pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The device is configured for the current event (including "already
    /// configured, nothing to do")
    Completed,
    /// The cycle was skipped or provisioning failed; cached state was left
    /// untouched so the next boot re-evaluates from scratch
    Skipped,
}

/// Decision state machine, run exactly once per process invocation
pub struct Orchestrator {
    resolver: Arc<dyn Resolver>,
    control: Arc<dyn ControlPlane>,
    probe: Arc<dyn TunnelProbe>,
    provisioner: Arc<dyn Provisioner>,
    state: StateStore,
    token_file: PathBuf,
    settle_delay: Duration,
}

impl Orchestrator {
    /// Wire up an orchestrator from its collaborators
    pub fn new(
        resolver: Arc<dyn Resolver>,
        control: Arc<dyn ControlPlane>,
        probe: Arc<dyn TunnelProbe>,
        provisioner: Arc<dyn Provisioner>,
        state: StateStore,
        token_file: impl Into<PathBuf>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            resolver,
            control,
            probe,
            provisioner,
            state,
            token_file: token_file.into(),
            settle_delay,
        }
    }

    /// Run one orchestration pass
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> RunOutcome {
        let cached = self.state.load();

        let endpoint = match self.resolver.resolve().await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(error = %e, "could not resolve control-plane endpoint, skipping this cycle");
                if cached.is_none() {
                    warn!("no cached event id - manual intervention may be needed");
                }
                return RunOutcome::Skipped;
            }
        };

        // An empty id means the control plane is not answering properly;
        // same treatment as a failed query.
        let current = match self.control.query_event_id(&endpoint).await {
            Ok(event_id) if !event_id.is_empty() => event_id,
            Ok(_) => {
                warn!("control plane returned an empty event id, skipping this cycle");
                if cached.is_none() {
                    warn!("no cached event id - manual intervention may be needed");
                }
                return RunOutcome::Skipped;
            }
            Err(e) => {
                warn!(error = %e, "could not query event id, skipping this cycle");
                if cached.is_none() {
                    warn!("no cached event id - manual intervention may be needed");
                }
                return RunOutcome::Skipped;
            }
        };

        match &cached {
            Some(cached_id) if *cached_id == current => {
                self.control.report_status(&endpoint, "EID known").await;
                info!(event_id = %current, "event id unchanged, no action");
                RunOutcome::Completed
            }
            Some(cached_id) => {
                info!(
                    old = %cached_id,
                    new = %current,
                    "new event id detected - reconfiguring tunnel"
                );
                self.reconfigure(&endpoint, &current).await
            }
            None => {
                self.control.report_status(&endpoint, "EID unknown").await;
                info!(event_id = %current, "no cached event id - configuring tunnel");
                self.reconfigure(&endpoint, &current).await
            }
        }
    }

    /// Token fetch, provisioning, cache commit, and tunnel verification
    async fn reconfigure(&self, endpoint: &Endpoint, current: &EventId) -> RunOutcome {
        let token = match self.control.query_token(endpoint).await {
            Ok(token) if !token.trim().is_empty() => token,
            Ok(_) => {
                error!("received an empty provisioning token, skipping this cycle");
                return RunOutcome::Skipped;
            }
            Err(e) => {
                error!(error = %e, "could not retrieve provisioning token");
                return RunOutcome::Skipped;
            }
        };

        self.control
            .report_status(endpoint, "starting configure")
            .await;

        if let Err(e) = self.provisioner.provision(endpoint, &token).await {
            self.control
                .report_status(endpoint, "configure failed")
                .await;
            error!(error = %e, "failed to configure tunnel");
            return RunOutcome::Skipped;
        }

        self.control.report_status(endpoint, "configured").await;

        if let Err(e) = self.state.save(current) {
            // The tunnel is configured but the next boot will see a stale
            // cache and safely re-evaluate.
            warn!(error = %e, "tunnel configured but event id could not be cached");
            return RunOutcome::Skipped;
        }

        info!(event_id = %current, "tunnel configured and event id cached");
        self.remove_token_file_after_tunnel_up().await;
        RunOutcome::Completed
    }

    /// Remove the secret file only after positive tunnel evidence; on probe
    /// failure it stays in place so the tool can be re-run by hand.
    async fn remove_token_file_after_tunnel_up(&self) {
        if !self.token_file.exists() {
            return;
        }

        // Give the tunnel time to establish after the tool finished.
        sleep(self.settle_delay).await;

        if self.probe.is_up().await {
            match std::fs::remove_file(&self.token_file) {
                Ok(()) => {
                    info!(path = %self.token_file.display(), "tunnel established; removed token file");
                }
                Err(e) => {
                    warn!(path = %self.token_file.display(), error = %e, "could not remove token file");
                }
            }
        } else {
            info!("token file left in place (tunnel not yet up)");
        }
    }
}
