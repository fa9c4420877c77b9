//! Command-line and environment configuration
//!
//! Every knob is a flag with an environment fallback; the systemd unit sets
//! the environment, operators use the flags. Values are read once here and
//! passed into the components.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use eyre::bail;

use roverlink_client::{BasicCredentials, ResolveStrategy};
use roverlink_core::{ProbeConfig, ProvisionerConfig};

/// Boot-time overlay tunnel provisioning agent
#[derive(Parser, Debug)]
#[command(name = "roverlink", about = "Boot-time overlay tunnel provisioning agent", long_about = None)]
pub struct Cli {
    /// Redirect URL pointing at the current control-plane cluster
    #[arg(long, env = "ROVERLINK_REDIRECT_URL")]
    pub redirect_url: Option<String>,

    /// Treat the redirect URL as the cluster base URL (no redirect chase)
    #[arg(long, env = "ROVERLINK_DIRECT")]
    pub direct: bool,

    /// Repository holding per-device endpoint files
    #[arg(long, env = "ROVERLINK_LOOKUP_REPO")]
    pub lookup_repo: Option<String>,

    /// Branch of the lookup repository
    #[arg(long, env = "ROVERLINK_LOOKUP_BRANCH", default_value = "main")]
    pub lookup_branch: String,

    /// Access token for a private lookup repository
    #[arg(long, env = "ROVERLINK_LOOKUP_TOKEN", hide_env_values = true)]
    pub lookup_token: Option<String>,

    /// Basic-auth user for control-plane requests
    #[arg(long, env = "ROVERLINK_HUB_USER")]
    pub hub_user: Option<String>,

    /// Basic-auth password for control-plane requests
    #[arg(long, env = "ROVERLINK_HUB_PASSWORD", hide_env_values = true)]
    pub hub_password: Option<String>,

    /// Device identity sent with every request; defaults to the OS hostname
    #[arg(long, env = "ROVERLINK_ROBOT_NAME")]
    pub robot_name: Option<String>,

    /// Cached event-id file
    #[arg(
        long,
        env = "ROVERLINK_STATE_FILE",
        default_value = "/var/run/roverlink/eventid"
    )]
    pub state_file: PathBuf,

    /// Secret token hand-off file for the provisioning tool
    #[arg(
        long,
        env = "ROVERLINK_TOKEN_FILE",
        default_value = "/var/run/roverlink/token"
    )]
    pub token_file: PathBuf,

    /// Program that runs the declarative configuration
    #[arg(
        long,
        env = "ROVERLINK_PROVISION_PROGRAM",
        default_value = "ansible-playbook"
    )]
    pub provision_program: String,

    /// Playbook handed to the provisioning program
    #[arg(
        long,
        env = "ROVERLINK_PLAYBOOK",
        default_value = "/opt/roverlink/ansible/configure-robot.yml"
    )]
    pub playbook: PathBuf,

    /// Inventory path (defaults to `inventory` next to the playbook)
    #[arg(long, env = "ROVERLINK_INVENTORY")]
    pub inventory: Option<PathBuf>,

    /// Audit log receiving full provisioning output; empty to disable
    // Parsed as a string: clap's PathBuf parser rejects empty values.
    #[arg(
        long,
        env = "ROVERLINK_AUDIT_LOG",
        default_value = "/var/log/roverlink-provision.log"
    )]
    pub audit_log: String,

    /// Endpoint resolution attempts
    #[arg(long, env = "ROVERLINK_RESOLVE_RETRIES", default_value_t = 3)]
    pub resolve_retries: u32,

    /// Seconds between resolution attempts
    #[arg(long, env = "ROVERLINK_RESOLVE_RETRY_DELAY", default_value_t = 10)]
    pub resolve_retry_delay: u64,

    /// Seconds between token poll attempts
    #[arg(long, env = "ROVERLINK_TOKEN_RETRY_DELAY", default_value_t = 5)]
    pub token_retry_delay: u64,

    /// Provisioning tool attempts per run
    #[arg(long, env = "ROVERLINK_PROVISION_ATTEMPTS", default_value_t = 2)]
    pub provision_attempts: u32,

    /// Seconds between provisioning attempts
    #[arg(long, env = "ROVERLINK_PROVISION_RETRY_DELAY", default_value_t = 30)]
    pub provision_retry_delay: u64,

    /// Timeout in seconds per provisioning attempt
    #[arg(long, env = "ROVERLINK_PROVISION_TIMEOUT", default_value_t = 600)]
    pub provision_timeout: u64,

    /// Pass extra verbosity flags to the provisioning tool
    #[arg(long, env = "ROVERLINK_PROVISION_VERBOSE")]
    pub provision_verbose: bool,

    /// Seconds to let the tunnel establish before verifying it
    #[arg(long, env = "ROVERLINK_SETTLE_DELAY", default_value_t = 15)]
    pub settle_delay: u64,

    /// Seconds to wait at startup before doing anything (boot settling)
    #[arg(long, env = "ROVERLINK_STARTUP_DELAY", default_value_t = 0)]
    pub startup_delay: u64,

    /// Tunnel status command
    #[arg(
        long,
        env = "ROVERLINK_PROBE_COMMAND",
        default_value = "skupper status -n skupper"
    )]
    pub probe_command: String,
}

impl Cli {
    /// Pick the resolution strategy from the configured sources
    ///
    /// # Errors
    /// Returns an error when neither a redirect URL nor a lookup repository
    /// is configured, or when `--direct` is set without a URL.
    pub fn strategy(&self) -> eyre::Result<ResolveStrategy> {
        if self.direct {
            let Some(url) = self.redirect_url.clone() else {
                bail!("--direct requires --redirect-url");
            };
            return Ok(ResolveStrategy::Direct { url });
        }
        if let Some(repo) = &self.lookup_repo {
            return Ok(ResolveStrategy::RepoLookup {
                repo: repo.clone(),
                branch: self.lookup_branch.clone(),
                token: self.lookup_token.clone(),
            });
        }
        if let Some(url) = self.redirect_url.clone() {
            return Ok(ResolveStrategy::RedirectChase { url });
        }
        bail!("either --redirect-url or --lookup-repo is required");
    }

    /// Device identity: explicit override or the OS hostname
    ///
    /// # Errors
    /// Returns an error if the hostname cannot be determined.
    pub fn robot_identity(&self) -> eyre::Result<String> {
        if let Some(name) = &self.robot_name {
            return Ok(name.clone());
        }
        let name = hostname::get()
            .map_err(|e| eyre::eyre!("could not determine hostname: {e}"))?;
        Ok(name.to_string_lossy().into_owned())
    }

    /// Basic-auth credentials, if both halves are configured
    #[must_use]
    pub fn credentials(&self) -> Option<BasicCredentials> {
        match (&self.hub_user, &self.hub_password) {
            (Some(user), Some(password)) if !user.is_empty() => Some(BasicCredentials {
                user: user.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// Probe settings
    #[must_use]
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            command: self
                .probe_command
                .split_whitespace()
                .map(ToString::to_string)
                .collect(),
            ..ProbeConfig::default()
        }
    }

    /// Provisioner settings
    #[must_use]
    pub fn provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            program: self.provision_program.clone(),
            playbook: self.playbook.clone(),
            inventory: self.inventory.clone(),
            token_file: self.token_file.clone(),
            audit_log: (!self.audit_log.is_empty()).then(|| PathBuf::from(&self.audit_log)),
            attempts: self.provision_attempts,
            retry_delay: Duration::from_secs(self.provision_retry_delay),
            timeout: Duration::from_secs(self.provision_timeout),
            verbose: self.provision_verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_requires_a_source() {
        let cli = Cli::parse_from(["roverlink"]);
        assert!(cli.strategy().is_err());
    }

    #[test]
    fn test_direct_needs_url() {
        let cli = Cli::parse_from(["roverlink", "--direct"]);
        assert!(cli.strategy().is_err());
    }

    #[test]
    fn test_direct_wins_over_lookup() {
        let cli = Cli::parse_from([
            "roverlink",
            "--direct",
            "--redirect-url",
            "https://hub.example.com",
            "--lookup-repo",
            "https://github.com/org/fleet",
        ]);
        assert!(matches!(
            cli.strategy().unwrap(),
            ResolveStrategy::Direct { .. }
        ));
    }

    #[test]
    fn test_lookup_wins_over_chase() {
        let cli = Cli::parse_from([
            "roverlink",
            "--redirect-url",
            "https://redirect.example.com",
            "--lookup-repo",
            "https://github.com/org/fleet",
        ]);
        assert!(matches!(
            cli.strategy().unwrap(),
            ResolveStrategy::RepoLookup { .. }
        ));
    }

    #[test]
    fn test_chase_is_the_fallback() {
        let cli = Cli::parse_from([
            "roverlink",
            "--redirect-url",
            "https://redirect.example.com",
        ]);
        assert!(matches!(
            cli.strategy().unwrap(),
            ResolveStrategy::RedirectChase { .. }
        ));
    }

    #[test]
    fn test_probe_command_split() {
        let cli = Cli::parse_from(["roverlink", "--probe-command", "wg show tunnel0"]);
        assert_eq!(cli.probe_config().command, vec!["wg", "show", "tunnel0"]);
    }

    #[test]
    fn test_empty_audit_log_disables_auditing() {
        let cli = Cli::parse_from(["roverlink", "--audit-log", ""]);
        assert!(cli.provisioner_config().audit_log.is_none());

        let cli = Cli::parse_from(["roverlink", "--audit-log", "/var/log/prov.log"]);
        assert_eq!(
            cli.provisioner_config().audit_log,
            Some(PathBuf::from("/var/log/prov.log"))
        );
    }

    #[test]
    fn test_credentials_need_both_halves() {
        let cli = Cli::parse_from(["roverlink", "--hub-user", "hub"]);
        assert!(cli.credentials().is_none());

        let cli = Cli::parse_from(["roverlink", "--hub-user", "hub", "--hub-password", "pw"]);
        assert!(cli.credentials().is_some());
    }
}
