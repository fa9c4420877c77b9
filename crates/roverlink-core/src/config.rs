//! Configuration values for the provisioner and the tunnel probe
//!
//! Constructed once by the binary from flags/environment and passed into the
//! components; nothing in this crate reads the environment ad hoc.

use std::path::PathBuf;
use std::time::Duration;

/// Settings for invoking the external configuration tool
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Program that runs the declarative configuration
    pub program: String,
    /// Path to the playbook/manifest handed to the program
    pub playbook: PathBuf,
    /// Inventory path; defaults to `inventory` next to the playbook
    pub inventory: Option<PathBuf>,
    /// Where the provisioning token is persisted for the tool
    pub token_file: PathBuf,
    /// Audit log receiving full tool output; `None` disables auditing
    pub audit_log: Option<PathBuf>,
    /// Total invocation attempts (at least 1)
    pub attempts: u32,
    /// Delay between attempts
    pub retry_delay: Duration,
    /// Timeout per attempt
    pub timeout: Duration,
    /// Pass extra verbosity flags to the tool
    pub verbose: bool,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            program: "ansible-playbook".to_string(),
            playbook: PathBuf::from("/opt/roverlink/ansible/configure-robot.yml"),
            inventory: None,
            token_file: PathBuf::from("/var/run/roverlink/token"),
            audit_log: Some(PathBuf::from("/var/log/roverlink-provision.log")),
            attempts: 2,
            retry_delay: Duration::from_secs(30),
            timeout: Duration::from_secs(600),
            verbose: false,
        }
    }
}

impl ProvisionerConfig {
    /// Inventory path, derived from the playbook directory when unset
    #[must_use]
    pub fn inventory_path(&self) -> PathBuf {
        self.inventory.clone().unwrap_or_else(|| {
            self.playbook
                .parent()
                .map(|dir| dir.join("inventory"))
                .unwrap_or_else(|| PathBuf::from("inventory"))
        })
    }
}

/// Settings for the tunnel status probe
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Status command, first word is the program
    pub command: Vec<String>,
    /// Timeout for the status command
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            command: ["skupper", "status", "-n", "skupper"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            timeout: Duration::from_secs(10),
        }
    }
}
