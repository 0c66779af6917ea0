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

use crate::domain::CommandError;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Represents a system command to be executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemCommand {
    /// Command program name
    pub program: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Execution timeout, overriding the executor default
    pub timeout: Option<Duration>,
}

impl SystemCommand {
    /// Create a new system command
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Add arguments to the command
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set execution timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The full command line, used as the key for canned test output
    pub fn command_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SystemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Command execution result. Standard error is never captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Raw standard output
    pub stdout: Vec<u8>,
    /// Exit status code, `None` when killed by a signal
    pub exit_code: Option<i32>,
    /// Whether command was successful
    pub success: bool,
}

impl CommandOutput {
    /// Successful output, mainly for fakes
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: Some(0),
            success: true,
        }
    }
}

/// Secondary port - Command execution abstraction
///
/// This interface abstracts system command execution, allowing for different
/// implementations (direct execution, mocked for testing, etc.)
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute a system command
    ///
    /// # Arguments
    /// * `command` - The command to execute
    ///
    /// # Returns
    /// * `Ok(CommandOutput)` - Command output and status
    /// * `Err(CommandError)` - The process could not be run to completion
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError>;

    /// Check if a command is available on the search path, without running it
    ///
    /// # Arguments
    /// * `command_name` - Name of the command to check
    async fn is_command_available(&self, command_name: &str) -> bool;
}

/// Run a command and return its standard output as text
///
/// # Returns
/// * `Ok(String)` - Decoded standard output of a successful run
/// * `Err(CommandError)` - Execution failed, exited non-zero, or the output
///   was not valid UTF-8
pub async fn run_text(
    executor: &dyn CommandExecutor,
    command: &SystemCommand,
) -> Result<String, CommandError> {
    let output = executor.execute(command).await?;
    if !output.success {
        return Err(CommandError::NonZeroExit {
            command: command.to_string(),
            exit_code: output.exit_code,
        });
    }
    String::from_utf8(output.stdout).map_err(|_| CommandError::Decode {
        command: command.to_string(),
    })
}
