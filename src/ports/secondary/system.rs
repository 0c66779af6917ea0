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

use crate::domain::SystemError;
use async_trait::async_trait;

/// Secondary port - Read access to the kernel pseudo-filesystems
///
/// Paths are absolute as seen on a live host (`/sys/...`, `/proc/...`);
/// implementations may re-root them.
#[async_trait]
pub trait SystemFiles: Send + Sync {
    /// Read a whole file as text
    ///
    /// # Returns
    /// * `Ok(String)` - File contents
    /// * `Err(SystemError)` - Missing or unreadable file
    async fn read_to_string(&self, path: &str) -> Result<String, SystemError>;

    /// List the entry names of a directory, sorted
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` - Entry names (not paths)
    /// * `Err(SystemError)` - Missing or unreadable directory
    async fn list_dir(&self, path: &str) -> Result<Vec<String>, SystemError>;
}

/// Secondary port - Identity of the host being scanned
///
/// Every value is best effort; `None` means unknown.
pub trait HostIdentityProvider: Send + Sync {
    fn hostname(&self) -> Option<String>;
    fn os_description(&self) -> Option<String>;
    fn kernel_version(&self) -> Option<String>;
    fn architecture(&self) -> Option<String>;
}
