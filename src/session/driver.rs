//! Build subprocess drivers
//!
//! A driver supplies three things: a line stream, an exit code, and a way to
//! terminate the build. [`ProcessDriver`] runs a real command;
//! [`ReplayDriver`] replays fixed output.

use crate::session::line_buffer::LineBuffer;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

const LINE_CHANNEL_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 8192;

/// Exit code reported for a build the session terminated. The child is
/// killed outright and has no exit code of its own; 143 is the conventional
/// "terminated on request" status.
pub const TERMINATED_EXIT_CODE: i32 = 143;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for build: {0}")]
    Wait(#[from] std::io::Error),

    #[error("Driver task failed: {0}")]
    Task(String),

    #[error("Failed to terminate build: {0}")]
    Terminate(String),
}

#[async_trait]
pub trait BuildDriver: Send {
    /// Human-readable description of what is being run
    fn describe(&self) -> String;

    /// Complete output lines; `None` once taken
    fn take_lines(&mut self) -> Option<mpsc::Receiver<String>>;

    /// Waits for the build to exit and returns its exit code
    async fn wait(&mut self) -> Result<i32, DriverError>;

    /// Requests termination. Safe to call more than once.
    async fn terminate(&mut self) -> Result<(), DriverError>;
}

/// Runs a build command, merging stdout and stderr into one line stream
pub struct ProcessDriver {
    command_line: String,
    child: Child,
    lines: Option<mpsc::Receiver<String>>,
    pumps: Vec<JoinHandle<()>>,
    terminated: bool,
}

impl ProcessDriver {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, DriverError> {
        let command_line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DriverError::Spawn {
                command: command_line.clone(),
                source,
            })?;
        debug!(command = %command_line, pid = child.id(), "Build process started");

        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump_lines(stdout, tx.clone(), "stdout")));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_lines(stderr, tx, "stderr")));
        }

        Ok(Self {
            command_line,
            child,
            lines: Some(rx),
            pumps,
            terminated: false,
        })
    }
}

async fn pump_lines<R>(mut reader: R, tx: mpsc::Sender<String>, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                for line in buffer.push(&chunk[..n]) {
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(stream, error = %e, "Failed reading build output");
                break;
            }
        }
    }
    if let Some(line) = buffer.finish() {
        let _ = tx.send(line).await;
    }
    trace!(stream, "Output stream closed");
}

#[async_trait]
impl BuildDriver for ProcessDriver {
    fn describe(&self) -> String {
        self.command_line.clone()
    }

    fn take_lines(&mut self) -> Option<mpsc::Receiver<String>> {
        self.lines.take()
    }

    async fn wait(&mut self) -> Result<i32, DriverError> {
        let status = self.child.wait().await?;
        for pump in self.pumps.drain(..) {
            pump.await.map_err(|e| DriverError::Task(e.to_string()))?;
        }
        Ok(match status.code() {
            Some(code) => code,
            None if self.terminated => TERMINATED_EXIT_CODE,
            None => -1,
        })
    }

    async fn terminate(&mut self) -> Result<(), DriverError> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        match self.child.try_wait() {
            Ok(Some(_)) => Ok(()),
            _ => self
                .child
                .start_kill()
                .map_err(|e| DriverError::Terminate(e.to_string())),
        }
    }
}

/// Replays a fixed list of lines, for tests and offline runs
pub struct ReplayDriver {
    lines: Vec<String>,
    delay: Option<Duration>,
    exit_code: i32,
    hang_after_output: bool,
    feeder: Option<JoinHandle<bool>>,
    stop_tx: watch::Sender<bool>,
    taken: bool,
}

impl ReplayDriver {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (stop_tx, _) = watch::channel(false);
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            delay: None,
            exit_code: 0,
            hang_after_output: false,
            feeder: None,
            stop_tx,
            taken: false,
        }
    }

    /// Pause before each line
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Keeps the stream open after the last line until terminated
    pub fn hang_after_output(mut self) -> Self {
        self.hang_after_output = true;
        self
    }
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl BuildDriver for ReplayDriver {
    fn describe(&self) -> String {
        format!("replay ({} lines)", self.lines.len())
    }

    fn take_lines(&mut self) -> Option<mpsc::Receiver<String>> {
        if self.taken {
            return None;
        }
        self.taken = true;

        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let lines = std::mem::take(&mut self.lines);
        let delay = self.delay;
        let hang = self.hang_after_output;
        let mut stop = self.stop_tx.subscribe();

        self.feeder = Some(tokio::spawn(async move {
            for line in lines {
                if let Some(delay) = delay {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stopped(&mut stop) => return true,
                    }
                }
                if *stop.borrow() {
                    return true;
                }
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            if hang {
                stopped(&mut stop).await;
                return true;
            }
            *stop.borrow()
        }));
        Some(rx)
    }

    async fn wait(&mut self) -> Result<i32, DriverError> {
        let terminated = match self.feeder.take() {
            Some(feeder) => feeder.await.map_err(|e| DriverError::Task(e.to_string()))?,
            None => *self.stop_tx.borrow(),
        };
        Ok(if terminated {
            TERMINATED_EXIT_CODE
        } else {
            self.exit_code
        })
    }

    async fn terminate(&mut self) -> Result<(), DriverError> {
        self.stop_tx.send_replace(true);
        Ok(())
    }
}
