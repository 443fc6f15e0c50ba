//! Strategy execution
//!
//! Commands run strictly in order. A failing non-critical command is
//! recorded and execution continues; a failing critical command aborts the
//! rest. The run succeeds when no critical command failed.

use crate::strategy::selector::{RebuildCommand, RebuildStrategy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

const STDERR_TAIL_CHARS: usize = 400;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command has no program")]
    EmptyCommand,

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Exited with status {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &RebuildCommand) -> Result<(), CommandError>;
}

/// Runs commands as child processes, enforcing each command's timeout
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandRunner;

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn run(&self, command: &RebuildCommand) -> Result<(), CommandError> {
        let (program, args) = command
            .arguments
            .split_first()
            .ok_or(CommandError::EmptyCommand)?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = match command.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| CommandError::Timeout(limit))?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let tail_start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_TAIL_CHARS)
            .map(|(i, _)| i)
            .unwrap_or(0);
        Err(CommandError::NonZeroExit {
            code: output.status.code().unwrap_or(-1),
            stderr: stderr[tail_start..].to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    pub description: String,
    pub command_line: String,
    pub is_critical: bool,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildResult {
    pub strategy_name: String,
    pub success: bool,
    /// Descriptions of commands that ran successfully
    pub completed: Vec<String>,
    pub failures: Vec<CommandFailure>,
    /// Descriptions of commands never started after an abort
    pub skipped: Vec<String>,
    pub aborted: bool,
}

pub struct StrategyExecutor<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> StrategyExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub async fn execute(&self, strategy: &RebuildStrategy) -> RebuildResult {
        info!(
            strategy = %strategy.name,
            commands = strategy.commands.len(),
            "Executing rebuild strategy"
        );

        let mut result = RebuildResult {
            strategy_name: strategy.name.clone(),
            success: true,
            completed: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            aborted: false,
        };

        for (index, command) in strategy.commands.iter().enumerate() {
            debug!(step = index + 1, command = %command.command_line(), "Running command");

            match self.runner.run(command).await {
                Ok(()) => result.completed.push(command.description.clone()),
                Err(e) => {
                    result.failures.push(CommandFailure {
                        description: command.description.clone(),
                        command_line: command.command_line(),
                        is_critical: command.is_critical,
                        error: e.to_string(),
                    });

                    if command.is_critical {
                        error!(command = %command.description, error = %e, "Critical command failed");
                        result.success = false;
                        result.aborted = true;
                        result.skipped = strategy.commands[index + 1..]
                            .iter()
                            .map(|c| c.description.clone())
                            .collect();
                        break;
                    }
                    warn!(command = %command.description, error = %e, "Command failed, continuing");
                }
            }
        }

        info!(
            strategy = %strategy.name,
            success = result.success,
            failures = result.failures.len(),
            "Rebuild strategy finished"
        );
        result
    }
}
