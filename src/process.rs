// Process management for translator execution: output capture, stdin feeding
// and optional timeouts

use crate::error::{ProcessError, Result, TransError};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// Process execution configuration
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub command: String,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    /// Bytes written to the child's standard input, which is then closed
    pub stdin: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl ProcessConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            stdin: None,
            timeout: None,
        }
    }

    pub fn with_args(mut self, args: Vec<impl Into<OsString>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn with_stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Process execution result
#[derive(Debug)]
pub struct ProcessResult {
    pub exit_status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.code()
    }

    /// Exit code with signal terminations mapped to `128 + signal` on Unix, `-1` elsewhere
    pub fn exit_code_or_signal(&self) -> i32 {
        if let Some(code) = self.exit_status.code() {
            return code;
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = self.exit_status.signal() {
                return 128 + signal;
            }
        }
        -1
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Runs external commands one at a time, inheriting the parent's environment
pub struct ProcessManager;

impl ProcessManager {
    pub fn new() -> Self {
        Self
    }

    // Synchronous execution
    pub fn execute(&self, config: ProcessConfig) -> Result<ProcessResult> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(TransError::Io)?
            .block_on(self.execute_async(config))
    }

    // Asynchronous execution
    pub async fn execute_async(&self, config: ProcessConfig) -> Result<ProcessResult> {
        use std::process::Stdio;
        use tokio::io::AsyncWriteExt;
        use tokio::process::Command;
        use tokio::time::timeout;

        let start_time = std::time::Instant::now();

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        if config.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
        cmd.kill_on_drop(true);

        tracing::debug!(command = %config.command, args = ?config.args, "Spawning process");

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransError::from(ProcessError::CommandNotFound {
                    command: config.command.clone(),
                    suggestion: Some(format!("Install {} or add it to PATH", config.command)),
                })
            } else {
                TransError::from(ProcessError::SpawnFailed {
                    command: config.command.clone(),
                    error: e.to_string(),
                })
            }
        })?;

        // Feed stdin from its own task so a chatty child cannot deadlock on full pipes
        let writer = match (config.stdin, child.stdin.take()) {
            (Some(input), Some(mut stdin)) => Some(tokio::spawn(async move {
                let result = stdin.write_all(&input).await;
                drop(stdin);
                match result {
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
            })),
            _ => None,
        };

        let command = config.command.clone();
        let wait = async move {
            child.wait_with_output().await.map_err(|e| {
                TransError::from(ProcessError::OutputCaptureFailed {
                    message: format!("Failed to wait for process: {e}"),
                    command: command.clone(),
                })
            })
        };

        let output = match config.timeout {
            Some(limit) => match timeout(limit, wait).await {
                Ok(output) => output?,
                // The child is killed when the wait future is dropped
                Err(_) => {
                    return Err(ProcessError::Timeout {
                        command: config.command,
                        duration: limit,
                    }
                    .into())
                }
            },
            None => wait.await?,
        };

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(command = %config.command, error = %e, "Failed to write process input");
                }
                Err(join_error) => {
                    tracing::warn!(command = %config.command, error = %join_error, "Input writer task failed");
                }
            }
        }

        Ok(ProcessResult {
            exit_status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
            duration: start_time.elapsed(),
        })
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    #[test]
    fn test_process_execution_basic() {
        let manager = ProcessManager::new();
        let config = ProcessConfig::new("echo").with_args(vec!["hello", "world"]);

        let result = manager.execute(config).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout().trim(), "hello world");
    }

    #[test]
    fn test_process_stdin_is_fed() {
        let manager = ProcessManager::new();
        let config = ProcessConfig::new("sh").with_stdin("echo from-stdin\nexit 3\n");

        let result = manager.execute(config).unwrap();
        assert_eq!(result.stdout().trim(), "from-stdin");
        assert_eq!(result.exit_code(), Some(3));
    }

    #[test]
    fn test_process_command_not_found() {
        let manager = ProcessManager::new();
        let config = ProcessConfig::new("this_command_does_not_exist_12345");

        match manager.execute(config) {
            Err(TransError::Process(err)) => {
                assert!(matches!(*err, ProcessError::CommandNotFound { .. }));
            }
            other => panic!("expected CommandNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_process_timeout() {
        let manager = ProcessManager::new();
        let config = ProcessConfig::new("sleep")
            .with_args(vec!["5"])
            .with_timeout(Duration::from_millis(100));

        let result = manager.execute(config);
        assert!(matches!(result, Err(TransError::Process(ref e)) if matches!(**e, ProcessError::Timeout { .. })));
    }

    #[test]
    fn test_large_output_with_stdin() {
        let manager = ProcessManager::new();
        let script = "i=0\nwhile [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done\n";
        let config = ProcessConfig::new("sh").with_stdin(script);

        let result = manager.execute(config).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout().lines().count(), 20000);
    }
}
