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

//! Memory information parsing functions

use super::common::{format_gb, kb_to_gb, meaningful, parse_size_to_bytes, parse_stanzas, Stanza};
use crate::domain::{MemoryModule, Properties};

/// dmidecode block title of an SMBIOS type 17 record
const MEMORY_DEVICE_TITLE: &str = "Memory Device";

/// Speed fields in order of preference: what the module runs at beats what
/// it is rated for
const DIMM_SPEED_KEYS: &[&str] = &[
    "Configured Memory Speed",
    "Configured Clock Speed",
    "Speed",
    "Maximum Speed",
];

/// Plain dmidecode fields copied onto the DIMM node
const DIMM_PROPERTIES: &[(&str, &str)] = &[
    ("Type", "type"),
    ("Manufacturer", "manufacturer"),
    ("Part Number", "part_number"),
    ("Serial Number", "serial"),
    ("Form Factor", "form_factor"),
    ("Rank", "rank"),
];

/// Parse installed memory modules from `dmidecode -t memory`
///
/// Blocks that are not memory devices, and slots reporting no module, are
/// skipped.
pub fn parse_dmidecode_memory(dmidecode_output: &str) -> Vec<MemoryModule> {
    parse_stanzas(dmidecode_output)
        .iter()
        .filter(|stanza| stanza.has_title(MEMORY_DEVICE_TITLE))
        .filter_map(parse_memory_device)
        .collect()
}

fn parse_memory_device(stanza: &Stanza) -> Option<MemoryModule> {
    let size_gb = stanza.get("Size").and_then(dimm_size_gb)?;

    let mut properties = Properties::new();
    for (field, property) in DIMM_PROPERTIES {
        if let Some(value) = stanza.get(field).and_then(meaningful) {
            properties.insert(property.to_string(), value);
        }
    }
    if let Some(speed) = select_dimm_speed(stanza) {
        properties.insert("speed".to_string(), speed);
    }

    Some(MemoryModule {
        locator: stanza.get("Locator").and_then(meaningful),
        bank_locator: stanza.get("Bank Locator").and_then(meaningful),
        size_gb,
        properties,
    })
}

/// Module size in GB, or `None` for empty slots and unreadable sizes
fn dimm_size_gb(size: &str) -> Option<f64> {
    let lowered = size.to_lowercase();
    if lowered.contains("no module") || lowered.contains("not installed") {
        return None;
    }
    let bytes = parse_size_to_bytes(size).ok()?;
    if bytes == 0 {
        return None;
    }
    Some(bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

/// Normalize a dmidecode DIMM size ("16384 MB", "16 GB") to GB with one
/// decimal ("16.0")
pub fn normalize_dimm_size(size: &str) -> Option<String> {
    dimm_size_gb(size).map(format_gb)
}

/// First usable speed reading, skipping unknown/unconfigured placeholders
pub fn select_dimm_speed(stanza: &Stanza) -> Option<String> {
    stanza.first_meaningful(DIMM_SPEED_KEYS).map(str::to_string)
}

/// `MemTotal` in GB from `/proc/meminfo` or a per-node `meminfo` file
///
/// Accepts both `MemTotal:  65843852 kB` and `Node 0 MemTotal:  32802048 kB`.
pub fn parse_meminfo_total_gb(meminfo: &str) -> Option<String> {
    meminfo.lines().find_map(|line| {
        let (_, rest) = line.split_once("MemTotal:")?;
        let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb_to_gb(kb))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DMIDECODE_MEMORY: &str = r#"# dmidecode 3.3
Getting SMBIOS data from sysfs.
SMBIOS 3.2.0 present.

Handle 0x0038, DMI type 16, 23 bytes
Physical Memory Array
	Location: System Board Or Motherboard
	Maximum Capacity: 2 TB
	Number Of Devices: 2

Handle 0x0040, DMI type 17, 84 bytes
Memory Device
	Array Handle: 0x0038
	Total Width: 72 bits
	Size: 16384 MB
	Form Factor: DIMM
	Locator: DIMM_A1
	Bank Locator: P0 CHANNEL A
	Type: DDR4
	Speed: 3200 MT/s
	Manufacturer: Samsung
	Serial Number: 12345678
	Part Number: M393A2K43DB3-CWE
	Rank: 2
	Configured Memory Speed: 2933 MT/s

Handle 0x0041, DMI type 17, 84 bytes
Memory Device
	Array Handle: 0x0038
	Size: No Module Installed
	Form Factor: Unknown
	Locator: DIMM_A2
	Bank Locator: P0 CHANNEL A
	Type: Unknown
	Speed: Unknown

Handle 0x0042, DMI type 17, 84 bytes
Memory Device
	Size: 32 GB
	Locator: DIMM_B1
	Type: DDR4
	Speed: 3200 MT/s
	Manufacturer: Not Specified
	Configured Memory Speed: Unknown
	Configured Clock Speed: Unconfigured

Handle 0x0050, DMI type 20, 35 bytes
Memory Device Mapped Address
	Starting Address: 0x00000000000
	Range Size: 16 GB
"#;

    #[test]
    fn test_parse_dmidecode_memory() {
        let modules = parse_dmidecode_memory(DMIDECODE_MEMORY);
        assert_eq!(modules.len(), 2);

        let first = &modules[0];
        assert_eq!(first.locator.as_deref(), Some("DIMM_A1"));
        assert_eq!(first.bank_locator.as_deref(), Some("P0 CHANNEL A"));
        assert_eq!(first.size_gb, 16.0);
        assert_eq!(first.properties["type"], "DDR4");
        assert_eq!(first.properties["speed"], "2933 MT/s");
        assert_eq!(first.properties["manufacturer"], "Samsung");
        assert_eq!(first.properties["part_number"], "M393A2K43DB3-CWE");
        assert_eq!(first.properties["rank"], "2");

        let second = &modules[1];
        assert_eq!(second.locator.as_deref(), Some("DIMM_B1"));
        assert_eq!(second.size_gb, 32.0);
        // configured readings are placeholders, rated speed is used
        assert_eq!(second.properties["speed"], "3200 MT/s");
        assert!(!second.properties.contains_key("manufacturer"));
    }

    #[test]
    fn test_normalize_dimm_size() {
        assert_eq!(normalize_dimm_size("16384 MB"), Some("16.0".to_string()));
        assert_eq!(normalize_dimm_size("16 GB"), Some("16.0".to_string()));
        assert_eq!(normalize_dimm_size("No Module Installed"), None);
        assert_eq!(normalize_dimm_size("Unknown"), None);
        assert_eq!(normalize_dimm_size("0 MB"), None);
    }

    #[test]
    fn test_select_dimm_speed_order() {
        let stanza = Stanza {
            titles: vec![MEMORY_DEVICE_TITLE.to_string()],
            fields: vec![
                ("Speed".to_string(), "3200 MT/s".to_string()),
                ("Configured Clock Speed".to_string(), "2666 MHz".to_string()),
            ],
        };
        assert_eq!(select_dimm_speed(&stanza), Some("2666 MHz".to_string()));

        let stanza = Stanza {
            titles: vec![],
            fields: vec![
                ("Speed".to_string(), "N/A".to_string()),
                ("Maximum Speed".to_string(), "4800 MT/s".to_string()),
            ],
        };
        assert_eq!(select_dimm_speed(&stanza), Some("4800 MT/s".to_string()));
    }

    #[test]
    fn test_parse_meminfo_total() {
        let meminfo = "MemTotal:       65843852 kB\nMemFree:        1234 kB\n";
        assert_eq!(parse_meminfo_total_gb(meminfo), Some("62.8".to_string()));

        let node_meminfo = "Node 0 MemTotal:       32802048 kB\nNode 0 MemFree: 100 kB\n";
        assert_eq!(parse_meminfo_total_gb(node_meminfo), Some("31.3".to_string()));

        assert_eq!(parse_meminfo_total_gb("MemTotal: lots"), None);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_dmidecode_memory("").is_empty());
        assert_eq!(parse_meminfo_total_gb(""), None);
    }
}
