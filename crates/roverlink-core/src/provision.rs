//! Invocation of the external configuration tool

use std::fs;
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use roverlink_client::Endpoint;
use roverlink_exec::{CommandResult, CommandRunner, CommandSpec, ExecError};

use crate::config::ProvisionerConfig;
use crate::error::CoreError;

/// Environment variable pointing the tool at the persisted token file
pub const TOKEN_FILE_ENV: &str = "ROVERLINK_TOKEN_FILE";

/// Environment variable carrying the resolved control-plane base URL
pub const HUB_URL_ENV: &str = "ROVERLINK_HUB_URL";

/// Byte budget for failure-output tails in the service log
const OUTPUT_TAIL_BYTES: usize = 4096;

/// Runs the external tool that actually configures the tunnel
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Persist the token and run the tool, retrying bounded times
    async fn provision(&self, endpoint: &Endpoint, token: &str) -> Result<(), CoreError>;
}

/// Provisioner that drives a declarative playbook runner.
///
/// The secret token file is the sole interface to the tool: it is written
/// with owner-only permissions before the first attempt and the tool finds
/// it through an environment variable.
pub struct PlaybookProvisioner {
    runner: Arc<dyn CommandRunner>,
    config: ProvisionerConfig,
}

/// Last `max` bytes of a string, split at a character boundary
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

impl PlaybookProvisioner {
    /// Create a provisioner around the given runner
    pub fn new(runner: Arc<dyn CommandRunner>, config: ProvisionerConfig) -> Self {
        Self { runner, config }
    }

    fn write_token_file(&self, token: &str) -> Result<(), CoreError> {
        let path = &self.config.token_file;
        let wrap = |source| CoreError::TokenWrite {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(wrap)?;
        }
        fs::write(path, token).map_err(wrap)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(wrap)?;
        }
        info!(path = %path.display(), "wrote provisioning token file");
        Ok(())
    }

    fn build_spec(&self, endpoint: &Endpoint) -> CommandSpec {
        let playbook_name = self
            .config
            .playbook
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.config.playbook.display().to_string());

        let mut spec = CommandSpec::new(&self.config.program)
            .arg("-i")
            .arg(self.config.inventory_path().display().to_string())
            .arg(playbook_name)
            .env(TOKEN_FILE_ENV, self.config.token_file.display().to_string())
            .env(HUB_URL_ENV, endpoint.as_str());
        if self.config.verbose {
            spec = spec.arg("-vv");
        }
        if let Some(dir) = self.config.playbook.parent() {
            spec = spec.current_dir(dir);
        }
        spec
    }

    /// Append the full tool output to the audit log, independent of outcome
    fn append_audit(&self, spec: &CommandSpec, result: &CommandResult) {
        let Some(path) = &self.config.audit_log else {
            return;
        };

        let record = {
            let mut record = String::new();
            let rule = "=".repeat(60);
            record.push_str(&format!(
                "\n{rule}\n[{}] exit={} cmd={}\n{rule}\n",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                result.status,
                spec.display(),
            ));
            if !result.stdout.is_empty() {
                record.push_str("--- stdout ---\n");
                record.push_str(&result.stdout);
                if !result.stdout.ends_with('\n') {
                    record.push('\n');
                }
            }
            if !result.stderr.is_empty() {
                record.push_str("--- stderr ---\n");
                record.push_str(&result.stderr);
                if !result.stderr.ends_with('\n') {
                    record.push('\n');
                }
            }
            record
        };

        let appended = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(record.as_bytes()));
        if let Err(e) = appended {
            warn!(path = %path.display(), error = %e, "could not write audit record");
        }
    }

    async fn run_tool_once(&self, spec: &CommandSpec) -> Result<CommandResult, ExecError> {
        info!(command = %spec.display(), "running provisioning tool");
        let result = self
            .runner
            .run_with_timeout(spec, self.config.timeout)
            .await?;
        self.append_audit(spec, &result);
        Ok(result)
    }
}

#[async_trait]
impl Provisioner for PlaybookProvisioner {
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    async fn provision(&self, endpoint: &Endpoint, token: &str) -> Result<(), CoreError> {
        self.write_token_file(token)?;
        let spec = self.build_spec(endpoint);
        let attempts = self.config.attempts.max(1);

        for attempt in 1..=attempts {
            if attempt > 1 {
                info!(attempt, attempts, delay = ?self.config.retry_delay, "retrying provisioning tool");
                sleep(self.config.retry_delay).await;
            }

            // A missing binary or a timeout will not resolve within this
            // run; only non-zero exits are worth retrying.
            let result = self.run_tool_once(&spec).await?;

            if result.success() {
                info!(attempt, "provisioning tool completed successfully");
                return Ok(());
            }

            error!(
                attempt,
                status = result.status,
                stdout_tail = %tail(&result.stdout, OUTPUT_TAIL_BYTES),
                stderr_tail = %tail(&result.stderr, OUTPUT_TAIL_BYTES),
                "provisioning tool failed"
            );
        }

        Err(CoreError::ProvisioningFailed { attempts })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    struct ScriptedRunner {
        results: Mutex<VecDeque<Result<CommandResult, ExecError>>>,
        specs: Mutex<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        fn new(results: Vec<Result<CommandResult, ExecError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                specs: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.specs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, ExecError> {
            self.specs.lock().unwrap().push(spec.clone());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .expect("more invocations than scripted results")
        }

        async fn run_with_timeout(
            &self,
            spec: &CommandSpec,
            _timeout: Duration,
        ) -> Result<CommandResult, ExecError> {
            self.run(spec).await
        }
    }

    fn exit(status: i32) -> Result<CommandResult, ExecError> {
        Ok(CommandResult {
            status,
            stdout: format!("tool output (exit {status})"),
            stderr: String::new(),
            duration: Duration::from_millis(10),
        })
    }

    fn config(dir: &std::path::Path, attempts: u32) -> ProvisionerConfig {
        ProvisionerConfig {
            playbook: dir.join("configure-robot.yml"),
            token_file: dir.join("token"),
            audit_log: Some(dir.join("audit.log")),
            attempts,
            retry_delay: Duration::ZERO,
            ..ProvisionerConfig::default()
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::from_raw("https://hub.example.com")
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
        // 2-byte characters; a naive byte slice would split one in half.
        assert_eq!(tail("ééé", 3), "é");
    }

    #[tokio::test]
    async fn test_success_writes_restricted_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(vec![exit(0)]));
        let provisioner = PlaybookProvisioner::new(runner.clone(), config(dir.path(), 2));

        provisioner.provision(&endpoint(), "tok-secret").await.unwrap();

        let token_path = dir.path().join("token");
        assert_eq!(fs::read_to_string(&token_path).unwrap(), "tok-secret");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&token_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_spec_carries_env_and_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(vec![exit(0)]));
        let provisioner = PlaybookProvisioner::new(runner.clone(), config(dir.path(), 1));

        provisioner.provision(&endpoint(), "tok").await.unwrap();

        let specs = runner.specs.lock().unwrap();
        let spec = &specs[0];
        assert_eq!(spec.program, "ansible-playbook");
        assert_eq!(spec.args[0], "-i");
        assert!(spec.args[1].ends_with("inventory"));
        assert_eq!(spec.args[2], "configure-robot.yml");
        assert!(spec.env.iter().any(|(k, _)| k == TOKEN_FILE_ENV));
        assert!(
            spec.env
                .iter()
                .any(|(k, v)| k == HUB_URL_ENV && v == "https://hub.example.com")
        );
        assert_eq!(spec.cwd.as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_retries_bounded_then_fails() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(vec![exit(2), exit(2)]));
        let provisioner = PlaybookProvisioner::new(runner.clone(), config(dir.path(), 2));

        let result = provisioner.provision(&endpoint(), "tok").await;
        assert!(matches!(
            result,
            Err(CoreError::ProvisioningFailed { attempts: 2 })
        ));
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test]
    async fn test_success_short_circuits_remaining_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(vec![exit(2), exit(0), exit(0)]));
        let provisioner = PlaybookProvisioner::new(runner.clone(), config(dir.path(), 3));

        provisioner.provision(&endpoint(), "tok").await.unwrap();
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_tool_aborts_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(vec![Err(ExecError::NotFound(
            "ansible-playbook".to_string(),
        ))]));
        let provisioner = PlaybookProvisioner::new(runner.clone(), config(dir.path(), 3));

        let result = provisioner.provision(&endpoint(), "tok").await;
        assert!(matches!(
            result,
            Err(CoreError::Exec(ExecError::NotFound(_)))
        ));
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_audit_log_records_every_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(vec![exit(2), exit(0)]));
        let provisioner = PlaybookProvisioner::new(runner, config(dir.path(), 2));

        provisioner.provision(&endpoint(), "tok").await.unwrap();

        let audit = fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert!(audit.contains("exit=2"));
        assert!(audit.contains("exit=0"));
        assert!(audit.contains("--- stdout ---"));
    }

    #[tokio::test]
    async fn test_verbose_appends_flag() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(vec![exit(0)]));
        let provisioner = PlaybookProvisioner::new(
            runner.clone(),
            ProvisionerConfig {
                verbose: true,
                ..config(dir.path(), 1)
            },
        );

        provisioner.provision(&endpoint(), "tok").await.unwrap();

        let specs = runner.specs.lock().unwrap();
        assert!(specs[0].args.contains(&"-vv".to_string()));
    }
}
