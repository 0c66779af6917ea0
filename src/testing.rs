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

//! In-memory fakes for the secondary ports
//!
//! Used by unit tests and integration tests to drive collection from
//! captured tool output instead of a live host.

use crate::domain::{CommandError, SystemError};
use crate::ports::{
    CommandExecutor, CommandOutput, HostIdentityProvider, SystemCommand, SystemFiles,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

/// Command executor answering from canned output keyed by command line
///
/// A tool is available once it was registered through any `with_*` method.
/// Available tools without canned output exit with status 1.
#[derive(Debug, Default)]
pub struct MockCommandExecutor {
    responses: HashMap<String, Result<CommandOutput, CommandError>>,
    available: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned standard output for the exact command line
    pub fn with_output(mut self, command_line: &str, stdout: &str) -> Self {
        self.mark_available(command_line);
        self.responses.insert(
            command_line.to_string(),
            Ok(CommandOutput::success(stdout.as_bytes().to_vec())),
        );
        self
    }

    /// Canned failure for the exact command line
    pub fn with_error(mut self, command_line: &str, error: CommandError) -> Self {
        self.mark_available(command_line);
        self.responses.insert(command_line.to_string(), Err(error));
        self
    }

    /// Make a tool available without any canned output
    pub fn with_tool(mut self, tool: &str) -> Self {
        self.available.insert(tool.to_string());
        self
    }

    /// Command lines executed so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn mark_available(&mut self, command_line: &str) {
        if let Some(program) = command_line.split_whitespace().next() {
            self.available.insert(program.to_string());
        }
    }
}

#[async_trait]
impl CommandExecutor for MockCommandExecutor {
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        let command_line = command.command_line();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command_line.clone());
        }

        if !self.available.contains(&command.program) {
            return Err(CommandError::NotFound(command.program.clone()));
        }
        match self.responses.get(&command_line) {
            Some(response) => response.clone(),
            None => Ok(CommandOutput {
                stdout: Vec::new(),
                exit_code: Some(1),
                success: false,
            }),
        }
    }

    async fn is_command_available(&self, command_name: &str) -> bool {
        self.available.contains(command_name)
    }
}

/// Pseudo-filesystem backed by a map of absolute paths to contents
#[derive(Debug, Clone, Default)]
pub struct InMemorySystemFiles {
    files: BTreeMap<String, String>,
}

impl InMemorySystemFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }
}

#[async_trait]
impl SystemFiles for InMemorySystemFiles {
    async fn read_to_string(&self, path: &str) -> Result<String, SystemError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| SystemError::NotFound(path.to_string()))
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>, SystemError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let names: BTreeSet<String> = self
            .files
            .keys()
            .filter_map(|file| file.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            Err(SystemError::NotFound(path.to_string()))
        } else {
            Ok(names.into_iter().collect())
        }
    }
}

/// Host identity with fixed answers
#[derive(Debug, Clone, Default)]
pub struct FixedHostIdentity {
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub kernel: Option<String>,
    pub arch: Option<String>,
}

impl FixedHostIdentity {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: Some(hostname.to_string()),
            os: Some("Ubuntu 22.04.4 LTS".to_string()),
            kernel: Some("5.15.0-105-generic".to_string()),
            arch: Some("x86_64".to_string()),
        }
    }
}

impl HostIdentityProvider for FixedHostIdentity {
    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }

    fn os_description(&self) -> Option<String> {
        self.os.clone()
    }

    fn kernel_version(&self) -> Option<String> {
        self.kernel.clone()
    }

    fn architecture(&self) -> Option<String> {
        self.arch.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::run_text;

    #[tokio::test]
    async fn test_mock_executor() {
        let executor = MockCommandExecutor::new()
            .with_output("lsusb", "Bus 001 Device 001: ID 1d6b:0002\n")
            .with_tool("lspci");

        assert!(executor.is_command_available("lsusb").await);
        assert!(!executor.is_command_available("nvme").await);

        let text = run_text(&executor, &SystemCommand::new("lsusb")).await.unwrap();
        assert!(text.starts_with("Bus 001"));

        let err = run_text(&executor, &SystemCommand::new("lspci")).await.unwrap_err();
        assert!(matches!(err, CommandError::NonZeroExit { exit_code: Some(1), .. }));

        let err = run_text(&executor, &SystemCommand::new("nvme")).await.unwrap_err();
        assert_eq!(err, CommandError::NotFound("nvme".to_string()));

        assert_eq!(executor.calls(), vec!["lsusb", "lspci", "nvme"]);
    }

    #[tokio::test]
    async fn test_in_memory_files() {
        let files = InMemorySystemFiles::new()
            .with_file("/sys/devices/system/node/node1/cpulist", "8-15")
            .with_file("/sys/devices/system/node/node0/cpulist", "0-7")
            .with_file("/sys/devices/system/node/online", "0-1");

        let names = files.list_dir("/sys/devices/system/node").await.unwrap();
        assert_eq!(names, vec!["node0", "node1", "online"]);
        assert_eq!(
            files.read_to_string("/sys/devices/system/node/node0/cpulist").await.unwrap(),
            "0-7"
        );
        assert!(files.list_dir("/nope").await.is_err());
    }
}
