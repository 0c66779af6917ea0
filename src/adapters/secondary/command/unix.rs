/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Unix command execution adapter

use crate::domain::CommandError;
use crate::ports::{CommandExecutor, CommandOutput, SystemCommand};
use async_trait::async_trait;
use log::debug;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Unix-based command executor with a per-invocation timeout
///
/// Every command is tried once. Standard error is discarded and standard
/// input is closed.
pub struct UnixCommandExecutor {
    /// Default timeout for commands
    default_timeout: Duration,
}

impl UnixCommandExecutor {
    /// Create a new Unix command executor
    ///
    /// # Arguments
    /// * `default_timeout` - Timeout for commands that do not set their own
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// Create a Unix command executor with default settings
    pub fn with_defaults() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl CommandExecutor for UnixCommandExecutor {
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        let command_timeout = command.timeout.unwrap_or(self.default_timeout);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!("Executing: {command}");

        // Dropping the pending output future on timeout kills the child
        match timeout(command_timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code();
                let success = output.status.success();
                if !success {
                    debug!("Command '{command}' failed with exit code: {exit_code:?}");
                }
                Ok(CommandOutput {
                    stdout: output.stdout,
                    exit_code,
                    success,
                })
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CommandError::NotFound(command.program.clone()))
            }
            Ok(Err(e)) => Err(CommandError::Spawn {
                command: command.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(CommandError::Timeout {
                command: command.to_string(),
                after: command_timeout,
            }),
        }
    }

    async fn is_command_available(&self, command_name: &str) -> bool {
        // Tool names only; paths are not looked up
        if command_name.is_empty() || command_name.contains('/') {
            return false;
        }
        which::which(command_name).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::run_text;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unix_command_executor_basic() {
        let executor = UnixCommandExecutor::with_defaults();

        let cmd = SystemCommand::new("echo").args(&["hello", "world"]);

        let result = executor.execute(&cmd).await.unwrap();
        assert!(result.success);
        assert_eq!(String::from_utf8_lossy(&result.stdout).trim(), "hello world");
    }

    #[tokio::test]
    async fn test_command_availability_check() {
        let executor = UnixCommandExecutor::with_defaults();

        // Test with a command that should not exist
        assert!(!executor.is_command_available("definitely_not_a_real_command_12345").await);
        assert!(!executor.is_command_available("").await);
        assert!(!executor.is_command_available("/bin/sh").await);

        // Any Unix host running the tests has a shell on PATH
        assert!(executor.is_command_available("sh").await);
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let executor = UnixCommandExecutor::with_defaults();

        let cmd = SystemCommand::new("sleep")
            .args(&["10"])
            .timeout(Duration::from_millis(100));

        let result = executor.execute(&cmd).await;
        assert!(matches!(result, Err(CommandError::Timeout { .. })));
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_command() {
        let executor = UnixCommandExecutor::with_defaults();

        let cmd = SystemCommand::new("definitely_not_a_real_command_12345");
        let result = executor.execute(&cmd).await;
        assert_eq!(
            result.unwrap_err(),
            CommandError::NotFound("definitely_not_a_real_command_12345".to_string())
        );
    }

    #[tokio::test]
    async fn test_run_text_non_zero_exit() {
        let executor = UnixCommandExecutor::with_defaults();

        let result = run_text(&executor, &SystemCommand::new("false")).await;
        assert!(matches!(
            result,
            Err(CommandError::NonZeroExit { exit_code: Some(1), .. })
        ));
    }
}
