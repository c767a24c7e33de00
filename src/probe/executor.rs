//! Execution of the external `ping` program

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

/// Result type alias for probe executions
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Reasons a probe produced no usable output
#[derive(Debug)]
pub enum ProbeError {
    /// Target is empty or would be taken for a command line option
    InvalidTarget(String),

    /// The probe program could not be started
    Spawn(std::io::Error),

    /// The program exited abnormally without printing anything useful
    Exited { code: Option<i32>, stderr: String },

    /// The output reports that not a single packet came back
    NoReply,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::InvalidTarget(target) => write!(f, "invalid target '{}'", target),
            ProbeError::Spawn(err) => write!(f, "failed to run probe: {}", err),
            ProbeError::Exited { code, stderr } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                if stderr.is_empty() {
                    write!(f, "probe exited with {}", code)
                } else {
                    write!(f, "probe exited with {}: {}", code, stderr)
                }
            }
            ProbeError::NoReply => write!(f, "no replies received"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Spawn(err)
    }
}

/// Something that can send `count` echo requests to a target and hand back
/// the textual report.
///
/// Implementations must be `Send + Sync`, one instance is shared by all
/// probe tasks of a cycle.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &str, count: u32) -> ProbeResult<String>;
}

/// Runs the system `ping` binary, one process per probe.
///
/// No timeout is added on top of the one `ping` applies per echo request.
#[derive(Debug, Clone)]
pub struct PingCommand {
    program: String,
}

impl PingCommand {
    pub fn new() -> Self {
        Self::with_program("ping")
    }

    /// Use a different executable that understands `-c <count> <target>`
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for PingCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for PingCommand {
    async fn probe(&self, target: &str, count: u32) -> ProbeResult<String> {
        if target.is_empty() || target.starts_with('-') {
            return Err(ProbeError::InvalidTarget(target.to_string()));
        }

        trace!("running {} -c {count} {target}", self.program);

        let output = Command::new(&self.program)
            .arg("-c")
            .arg(count.to_string())
            .arg(target)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        // ping exits non-zero when replies are missing, that output is still valid
        if !output.status.success() && stdout.trim().is_empty() {
            return Err(ProbeError::Exited {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(stdout)
    }
}
