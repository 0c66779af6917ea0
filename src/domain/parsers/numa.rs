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

//! NUMA topology parsing functions for `/sys/devices/system/node`

/// Numeric id of a `node<N>` directory, `None` for other entries
/// (`online`, `possible`, `power`, ...)
pub fn parse_numa_node_dir(name: &str) -> Option<u32> {
    let suffix = name.strip_prefix("node")?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Content of a node's `cpulist` file, e.g. `0-15,32-47`
pub fn parse_cpulist(content: &str) -> Option<String> {
    let cpus = content.trim();
    if cpus.is_empty() {
        None
    } else {
        Some(cpus.to_string())
    }
}
