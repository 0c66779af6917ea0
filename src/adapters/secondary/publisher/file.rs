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

//! File-based repository for saving graphs to local files

use crate::domain::{Graph, PublishError};
use crate::ports::GraphRepository;
use async_trait::async_trait;
use log::debug;
use std::path::Path;
use tokio::fs;

/// File system repository for storing topology graphs
pub struct FileGraphRepository;

impl FileGraphRepository {
    /// Create a new file graph repository
    pub fn new() -> Self {
        Self
    }

    async fn write(path: &Path, contents: String) -> Result<(), PublishError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PublishError::Io(format!("Failed to create directory: {e}")))?;
        }

        fs::write(path, contents)
            .await
            .map_err(|e| PublishError::Io(format!("Failed to write {}: {e}", path.display())))?;
        debug!("Wrote graph to {}", path.display());
        Ok(())
    }

    async fn read(path: &Path) -> Result<String, PublishError> {
        fs::read_to_string(path)
            .await
            .map_err(|e| PublishError::Io(format!("Failed to read {}: {e}", path.display())))
    }
}

impl Default for FileGraphRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphRepository for FileGraphRepository {
    async fn save_json(&self, graph: &Graph, path: &Path) -> Result<(), PublishError> {
        let json_string = serde_json::to_string_pretty(graph)
            .map_err(|e| PublishError::Serialization(format!("JSON serialization failed: {e}")))?;
        Self::write(path, json_string).await
    }

    async fn save_toml(&self, graph: &Graph, path: &Path) -> Result<(), PublishError> {
        let toml_string = toml::to_string_pretty(graph)
            .map_err(|e| PublishError::Serialization(format!("TOML serialization failed: {e}")))?;
        Self::write(path, toml_string).await
    }

    async fn load_json(&self, path: &Path) -> Result<Graph, PublishError> {
        let json_string = Self::read(path).await?;
        serde_json::from_str(&json_string)
            .map_err(|e| PublishError::Serialization(format!("JSON deserialization failed: {e}")))
    }

    async fn load_toml(&self, path: &Path) -> Result<Graph, PublishError> {
        let toml_string = Self::read(path).await?;
        toml::from_str(&toml_string)
            .map_err(|e| PublishError::Serialization(format!("TOML deserialization failed: {e}")))
    }

    async fn file_exists(&self, path: &Path) -> Result<bool, PublishError> {
        fs::try_exists(path)
            .await
            .map_err(|e| PublishError::Io(format!("Failed to check {}: {e}", path.display())))
    }
}
