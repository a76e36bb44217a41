//! External command execution with dry-run support

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::debug;

use crate::release::error::CommandError;

/// Trait for running the external tools a release drives
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Runner: Send + Sync {
    /// Runs with inherited stdio. Skipped in dry-run mode when `mutating`.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        mutating: bool,
    ) -> Result<(), CommandError>;

    /// Runs and returns all of stdout followed by all of stderr; the two
    /// streams are not interleaved. Returns `""` when skipped.
    async fn capture(
        &self,
        program: &str,
        args: &[String],
        mutating: bool,
    ) -> Result<String, CommandError>;
}

/// Runner that spawns real processes with tokio
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    pub dry_run: bool,
    pub working_dir: Option<PathBuf>,
    /// Extra environment for every child
    pub env: Vec<(String, String)>,
}

impl CommandRunner {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Prints the command line; returns `false` if execution is skipped
    fn announce(&self, program: &str, args: &[String], mutating: bool) -> bool {
        let line = display_command(program, args);
        if mutating && self.dry_run {
            println!("SKIPPING: {}", line);
            return false;
        }

        println!("{}", line);
        true
    }

    fn command(&self, program: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> CommandError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CommandError::NotFound {
            program: program.to_string(),
        }
    } else {
        CommandError::Spawn {
            program: program.to_string(),
            source: e,
        }
    }
}

#[async_trait::async_trait]
impl Runner for CommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        mutating: bool,
    ) -> Result<(), CommandError> {
        if !self.announce(program, args, mutating) {
            return Ok(());
        }

        let start = Instant::now();
        let status = self
            .command(program, args)
            .status()
            .await
            .map_err(|e| spawn_error(program, e))?;

        debug!(
            exit_code = status.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Command completed"
        );

        if !status.success() {
            return Err(CommandError::Failed {
                command: display_command(program, args),
                status: status.code(),
                output: String::new(),
            });
        }
        Ok(())
    }

    async fn capture(
        &self,
        program: &str,
        args: &[String],
        mutating: bool,
    ) -> Result<String, CommandError> {
        if !self.announce(program, args, mutating) {
            return Ok(String::new());
        }

        let start = Instant::now();
        let output = self
            .command(program, args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| spawn_error(program, e))?;

        debug!(
            exit_code = output.status.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Command completed"
        );

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            eprint!("{}", combined);
            return Err(CommandError::Failed {
                command: display_command(program, args),
                status: output.status.code(),
                output: combined,
            });
        }
        Ok(combined)
    }
}

/// Shell-quoted command line for display
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|word| {
            shlex::try_quote(word)
                .map(|quoted| quoted.into_owned())
                .unwrap_or_else(|_| format!("{:?}", word))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds an argv from string literals
pub fn args(words: &[&str]) -> Vec<String> {
    words.iter().map(|word| word.to_string()).collect()
}
