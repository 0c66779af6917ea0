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

//! Dependency injection container for topology services

use crate::adapters::{FileGraphRepository, SysfsReader, SysinfoHostIdentity, UnixCommandExecutor};
use crate::domain::{ConfigError, TopologyCollectionService, DIAGNOSTIC_TOOLS};
use crate::ports::{
    CommandExecutor, GraphRepository, HostIdentityProvider, SystemFiles, TopologyService,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the dependency injection container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerConfig {
    /// Command execution timeout
    pub command_timeout: Duration,
    /// Directory `/sys` and `/proc` paths are resolved under
    pub sysfs_root: PathBuf,
    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(5),
            sysfs_root: PathBuf::from("/"),
            verbose: false,
        }
    }
}

/// On-disk form of [`ContainerConfig`]; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    command_timeout_secs: Option<u64>,
    sysfs_root: Option<PathBuf>,
    verbose: Option<bool>,
}

impl ContainerConfig {
    pub fn builder() -> ContainerConfigBuilder {
        ContainerConfigBuilder::default()
    }

    /// Parse a TOML configuration, filling missing keys with defaults
    ///
    /// ```toml
    /// command_timeout_secs = 10
    /// sysfs_root = "/mnt/capture"
    /// verbose = true
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut builder = Self::builder();
        if let Some(secs) = file.command_timeout_secs {
            if secs == 0 {
                return Err(ConfigError::Invalid(
                    "command_timeout_secs must be greater than zero".to_string(),
                ));
            }
            builder = builder.command_timeout(Duration::from_secs(secs));
        }
        if let Some(root) = file.sysfs_root {
            builder = builder.sysfs_root(root);
        }
        if let Some(verbose) = file.verbose {
            builder = builder.verbose(verbose);
        }
        Ok(builder.build())
    }

    /// Read and parse a TOML configuration file
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Builder for [`ContainerConfig`]
#[derive(Debug, Clone, Default)]
pub struct ContainerConfigBuilder {
    config: ContainerConfig,
}

impl ContainerConfigBuilder {
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    pub fn sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.sysfs_root = root.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn build(self) -> ContainerConfig {
        self.config
    }
}

/// Dependency injection container
pub struct ServiceContainer {
    config: ContainerConfig,
}

impl ServiceContainer {
    /// Create a new service container with configuration
    pub fn new(config: ContainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Create the command executor
    pub fn create_command_executor(&self) -> Arc<dyn CommandExecutor> {
        Arc::new(UnixCommandExecutor::new(self.config.command_timeout))
    }

    /// Create the pseudo-filesystem reader
    pub fn create_system_files(&self) -> Arc<dyn SystemFiles> {
        Arc::new(SysfsReader::new(self.config.sysfs_root.clone()))
    }

    pub fn create_host_identity(&self) -> Arc<dyn HostIdentityProvider> {
        Arc::new(SysinfoHostIdentity::new())
    }

    /// Create the graph file repository
    pub fn create_graph_repository(&self) -> Arc<dyn GraphRepository> {
        Arc::new(FileGraphRepository::new())
    }

    /// Create the complete topology collection service
    pub fn create_topology_service(&self) -> Arc<dyn TopologyService> {
        Arc::new(TopologyCollectionService::new(
            self.create_command_executor(),
            self.create_system_files(),
            self.create_host_identity(),
        ))
    }

    /// Whether live collection is supported on this platform
    pub fn is_supported_platform(&self) -> bool {
        cfg!(target_os = "linux")
    }

    /// Get platform name for logging
    pub fn get_platform_name(&self) -> &'static str {
        if cfg!(target_os = "macos") {
            "macOS"
        } else if cfg!(target_os = "linux") {
            "Linux"
        } else {
            "Unknown"
        }
    }

    /// Diagnostic tools missing from `PATH`
    pub async fn missing_tools(&self) -> Vec<String> {
        let executor = self.create_command_executor();
        let mut missing = Vec::new();
        for tool in DIAGNOSTIC_TOOLS {
            if !executor.is_command_available(tool).await {
                missing.push(tool.to_string());
            }
        }
        missing
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}
