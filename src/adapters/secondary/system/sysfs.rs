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

//! Pseudo-filesystem reader rooted at a configurable directory

use crate::domain::SystemError;
use crate::ports::SystemFiles;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Reads `/sys` and `/proc` files below `root`
///
/// A root other than `/` points the reader at a captured tree, e.g. a test
/// fixture or a chroot.
#[derive(Debug, Clone)]
pub struct SysfsReader {
    root: PathBuf,
}

impl SysfsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `path` re-rooted below the configured root
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Default for SysfsReader {
    fn default() -> Self {
        Self::new("/")
    }
}

fn io_error(path: &Path, error: std::io::Error) -> SystemError {
    if error.kind() == ErrorKind::NotFound {
        SystemError::NotFound(path.display().to_string())
    } else {
        SystemError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl SystemFiles for SysfsReader {
    async fn read_to_string(&self, path: &str) -> Result<String, SystemError> {
        let full = self.resolve(path);
        fs::read_to_string(&full).await.map_err(|e| io_error(&full, e))
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>, SystemError> {
        let full = self.resolve(path);
        let mut entries = fs::read_dir(&full).await.map_err(|e| io_error(&full, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&full, e))? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
