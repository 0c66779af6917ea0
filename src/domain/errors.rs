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

use std::time::Duration;
use thiserror::Error;

/// Failure to obtain text from an external diagnostic tool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Tool is not on the search path
    #[error("Command not found: {0}")]
    NotFound(String),
    /// Process could not be started or waited on
    #[error("Failed to execute command '{command}': {message}")]
    Spawn { command: String, message: String },
    /// Process ran but reported failure
    #[error("Command '{command}' failed with exit code {exit_code:?}")]
    NonZeroExit {
        command: String,
        exit_code: Option<i32>,
    },
    /// Process did not finish in time and was killed
    #[error("Command '{command}' timed out after {after:?}")]
    Timeout { command: String, after: Duration },
    /// Standard output was not valid UTF-8
    #[error("Command '{command}' produced output that is not valid UTF-8")]
    Decode { command: String },
}

/// A tool's structured output could not be understood as a whole
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse {source_tool} output: {message}")]
pub struct ParseError {
    pub source_tool: String,
    pub message: String,
}

impl ParseError {
    pub fn new(source_tool: &str, message: impl Into<String>) -> Self {
        Self {
            source_tool: source_tool.to_string(),
            message: message.into(),
        }
    }
}

/// Pseudo-filesystem access errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SystemError {
    #[error("Path not found: {0}")]
    NotFound(String),
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}

/// Anything a collection stage can run into. Stages never propagate these;
/// they are folded to "no data" and kept as diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    System(#[from] SystemError),
    /// An enrichment record referenced a bus address with no PCI node
    #[error("No PCI device matches bus address {0}")]
    UnmatchedBusAddress(String),
}

/// Violations of the graph's structural invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),
    #[error("Graph has no root node")]
    MissingRoot,
    #[error("Edge {edge} references unknown node {missing}")]
    DanglingEdge { edge: String, missing: String },
    #[error("Node {0} has more than one parent")]
    MultipleParents(String),
    #[error("Root node is contained by {0}")]
    RootHasParent(String),
    #[error("Node {0} is not reachable from the root")]
    Unreachable(String),
}

/// Errors writing or reading serialized graphs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("I/O operation failed: {0}")]
    Io(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Configuration loading errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {message}")]
    Read { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err = CommandError::NonZeroExit {
            command: "lspci -vmm".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(
            err.to_string(),
            "Command 'lspci -vmm' failed with exit code Some(1)"
        );

        let err = CommandError::Timeout {
            command: "nvidia-smi".to_string(),
            after: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_collection_error_is_transparent() {
        let err: CollectionError = ParseError::new("lsblk", "expected value").into();
        assert_eq!(err.to_string(), "Failed to parse lsblk output: expected value");
    }
}
