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

use crate::domain::{Graph, PublishError};
use async_trait::async_trait;
use std::path::Path;

/// Secondary port - File repository abstraction
///
/// This interface abstracts file-based storage of topology graphs
#[async_trait]
pub trait GraphRepository: Send + Sync {
    /// Save a graph to a file in JSON format
    ///
    /// # Arguments
    /// * `graph` - The graph to save
    /// * `path` - File path to save to
    ///
    /// # Returns
    /// * `Ok(())` - Graph successfully saved
    /// * `Err(PublishError)` - Error occurred during save
    async fn save_json(&self, graph: &Graph, path: &Path) -> Result<(), PublishError>;

    /// Save a graph to a file in TOML format
    async fn save_toml(&self, graph: &Graph, path: &Path) -> Result<(), PublishError>;

    /// Load a graph from a JSON file
    ///
    /// # Returns
    /// * `Ok(Graph)` - Loaded graph, not yet validated
    /// * `Err(PublishError)` - Error occurred during load
    async fn load_json(&self, path: &Path) -> Result<Graph, PublishError>;

    /// Load a graph from a TOML file
    async fn load_toml(&self, path: &Path) -> Result<Graph, PublishError>;

    /// Check if file exists
    async fn file_exists(&self, path: &Path) -> Result<bool, PublishError>;
}
