// Process execution capability used by the enumerator and reconciler
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured result of one finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when the process was killed by a signal
    pub status: Option<i32>,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            status: Some(0),
        }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            status: Some(status),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// Whatever the tool printed, stderr first since that is where xtables reports errors
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        let stdout = self.stdout.trim();
        let text = match (stderr.is_empty(), stdout.is_empty()) {
            (false, _) => stderr.to_string(),
            (true, false) => stdout.to_string(),
            (true, true) => String::new(),
        };

        match self.status {
            Some(code) if text.is_empty() => format!("exit status {}", code),
            Some(code) => format!("exit status {}: {}", code, text),
            None if text.is_empty() => "terminated by signal".to_string(),
            None => format!("terminated by signal: {}", text),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("{command} printed non-UTF-8 {stream}")]
    NonUtf8 {
        command: String,
        stream: &'static str,
    },
}

/// Runs a command line to completion.
///
/// The core never spawns processes itself; everything goes through this
/// trait so tests can substitute a scripted implementation.
pub trait Executor {
    fn execute(&self, argv: &[String]) -> impl Future<Output = Result<CommandOutput, ExecError>>;
}

/// Renders an argv for logs and error messages
pub fn render_command(argv: &[String]) -> String {
    argv.join(" ")
}

/// Executes commands with `tokio::process`, killing them after a timeout
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    timeout: Duration,
}

impl SystemExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl Executor for SystemExecutor {
    async fn execute(&self, argv: &[String]) -> Result<CommandOutput, ExecError> {
        use tokio::process::Command;

        let (program, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;
        let command = render_command(argv);
        tracing::debug!("Executing: {}", command);

        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ExecError::Timeout {
                command: command.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| ExecError::Spawn {
                command: command.clone(),
                source,
            })?;

        // Chain names are passed back to the tool verbatim and must not be altered
        let decode = |bytes: Vec<u8>, stream: &'static str| {
            String::from_utf8(bytes).map_err(|_| ExecError::NonUtf8 {
                command: command.clone(),
                stream,
            })
        };

        Ok(CommandOutput {
            stdout: decode(output.stdout, "stdout")?,
            stderr: decode(output.stderr, "stderr")?,
            status: output.status.code(),
        })
    }
}
