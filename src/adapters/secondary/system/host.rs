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

//! Host identity from the `sysinfo` crate

use crate::ports::HostIdentityProvider;
use sysinfo::System;

/// Hostname, OS release and kernel of the running host
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoHostIdentity;

impl SysinfoHostIdentity {
    pub fn new() -> Self {
        Self
    }
}

impl HostIdentityProvider for SysinfoHostIdentity {
    fn hostname(&self) -> Option<String> {
        System::host_name()
    }

    fn os_description(&self) -> Option<String> {
        System::long_os_version().or_else(System::os_version)
    }

    fn kernel_version(&self) -> Option<String> {
        System::kernel_version()
    }

    fn architecture(&self) -> Option<String> {
        System::cpu_arch().filter(|arch| !arch.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_is_reported_by_the_host() {
        let host = SysinfoHostIdentity::new();
        // uname machine names differ from Rust target names on some hosts
        // (arm64 vs aarch64), so only non-emptiness is checked
        if cfg!(target_os = "linux") {
            let arch = host.architecture().unwrap();
            assert!(!arch.trim().is_empty());
        }
        let _ = host.hostname();
        let _ = host.os_description();
    }
}
