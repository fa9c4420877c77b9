//! Command description and result types

use std::path::PathBuf;
use std::time::Duration;

/// Description of a command to run: program, arguments, environment, cwd
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program to execute (looked up on PATH if not absolute)
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Extra environment variables (inherits the parent environment)
    pub env: Vec<(String, String)>,
    /// Working directory, defaults to the current directory
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a spec for the given program with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    /// Append a single argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append multiple arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Render the command line for logs and audit records
    #[must_use]
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Result of a completed command
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if the command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_program_and_args() {
        let spec = CommandSpec::new("skupper").args(["status", "-n", "skupper"]);
        assert_eq!(spec.display(), "skupper status -n skupper");
    }

    #[test]
    fn test_builder_accumulates() {
        let spec = CommandSpec::new("ansible-playbook")
            .arg("-i")
            .arg("inventory")
            .env("TOKEN_FILE", "/tmp/token")
            .current_dir("/opt/ansible");

        assert_eq!(spec.args, vec!["-i", "inventory"]);
        assert_eq!(spec.env.len(), 1);
        assert_eq!(spec.cwd.as_deref(), Some(std::path::Path::new("/opt/ansible")));
    }
}
