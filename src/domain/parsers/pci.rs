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

//! PCI device parsing functions

use super::common::{meaningful, parse_stanzas, Stanza};
use crate::domain::{NodeKind, PciDevice, PciLink, Properties};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref BRACKET_CODE_RE: Regex = Regex::new(r"^(.*?)\s*\[([0-9a-fA-F]{4})\]$").unwrap();
    static ref SLOT_LINE_RE: Regex =
        Regex::new(r"^((?:[0-9a-fA-F]{4,8}:)?[0-9a-fA-F]{2}:[0-9a-fA-F]{2}\.[0-7])\s").unwrap();
    static ref LINK_SPEED_RE: Regex = Regex::new(r"Speed\s+([0-9]+(?:\.[0-9]+)?)GT/s").unwrap();
    static ref LINK_WIDTH_RE: Regex = Regex::new(r"Width\s+(x[0-9]+)").unwrap();
}

/// Class text fragments that mark a display or compute accelerator
const GPU_CLASS_KEYWORDS: &[&str] = &[
    "vga",
    "3d controller",
    "display controller",
    "processing accelerators",
    "accelerator",
    "co-processor",
];

/// `pci-device`, or `gpu-device` when the class names a display or
/// accelerator function
pub fn classify_pci_class(class: &str) -> NodeKind {
    let class = class.to_lowercase();
    if GPU_CLASS_KEYWORDS.iter().any(|keyword| class.contains(keyword)) {
        NodeKind::GpuDevice
    } else {
        NodeKind::PciDevice
    }
}

/// Split `"Intel Corporation [8086]"` into the name and its 4-hex-digit code
pub fn split_bracket_code(value: &str) -> (String, Option<String>) {
    match BRACKET_CODE_RE.captures(value.trim()) {
        Some(captures) => (
            captures[1].trim().to_string(),
            Some(captures[2].to_lowercase()),
        ),
        None => (value.trim().to_string(), None),
    }
}

/// Parse `lspci -vmm -nn -k` output into PCI device records
///
/// Only stanzas carrying a `Slot` are emitted.
pub fn parse_lspci_vmm(output: &str) -> Vec<PciDevice> {
    parse_stanzas(output)
        .iter()
        .filter_map(parse_pci_stanza)
        .collect()
}

fn parse_pci_stanza(stanza: &Stanza) -> Option<PciDevice> {
    let slot = stanza.get("Slot")?.to_string();
    let mut properties = Properties::new();
    properties.insert("address".to_string(), slot.clone());

    let (class, class_id) = named_code(stanza, "Class", &[]);
    let (vendor, vendor_id) = named_code(stanza, "Vendor", &["VendorId", "Vendor ID"]);
    let (device, device_id) = named_code(stanza, "Device", &["DeviceId", "Device ID"]);
    let (subsystem_vendor, _) = named_code(stanza, "SVendor", &[]);
    let (subsystem_device, _) = named_code(stanza, "SDevice", &[]);

    for (key, value) in [
        ("class", &class),
        ("class_id", &class_id),
        ("vendor", &vendor),
        ("vendor_id", &vendor_id),
        ("device", &device),
        ("device_id", &device_id),
        ("subsystem_vendor", &subsystem_vendor),
        ("subsystem_device", &subsystem_device),
    ] {
        if let Some(value) = value {
            properties.insert(key.to_string(), value.clone());
        }
    }

    for (field, key) in [
        ("Rev", "revision"),
        ("ProgIf", "prog_if"),
        ("Driver", "driver"),
        ("Module", "module"),
        ("NUMANode", "numa_node"),
    ] {
        if let Some(value) = stanza.get(field).and_then(meaningful) {
            properties.insert(key.to_string(), value);
        }
    }

    let label = match (&vendor, &device) {
        (Some(vendor), Some(device)) => format!("{vendor} {device}"),
        (Some(name), None) | (None, Some(name)) => name.clone(),
        (None, None) => slot.clone(),
    };

    Some(PciDevice {
        kind: classify_pci_class(class.as_deref().unwrap_or_default()),
        slot,
        label,
        properties,
    })
}

/// Name of a `Key: Name [code]` field plus its code. A code given under
/// one of `code_keys` wins over the bracketed one.
fn named_code(stanza: &Stanza, key: &str, code_keys: &[&str]) -> (Option<String>, Option<String>) {
    let (name, bracket_code) = match stanza.get(key) {
        Some(value) => {
            let (name, code) = split_bracket_code(value);
            (meaningful(&name), code)
        }
        None => (None, None),
    };
    let code = stanza
        .first_of(code_keys)
        .map(|code| code.to_lowercase())
        .or(bracket_code);
    (name, code)
}

/// Parse PCIe link status from `lspci -vv` output, keyed by slot
///
/// Address-prefixed lines set the slot that following `LnkCap:`/`LnkSta:`
/// lines belong to.
pub fn parse_lspci_links(output: &str) -> BTreeMap<String, PciLink> {
    let mut links: BTreeMap<String, PciLink> = BTreeMap::new();
    let mut current_slot: Option<String> = None;

    for line in output.lines() {
        if let Some(captures) = SLOT_LINE_RE.captures(line) {
            current_slot = Some(captures[1].to_string());
            continue;
        }

        let Some(slot) = &current_slot else {
            continue;
        };
        let trimmed = line.trim_start();
        let speed = LINK_SPEED_RE.captures(trimmed).map(|c| c[1].to_string());
        let width = LINK_WIDTH_RE.captures(trimmed).map(|c| c[1].to_string());

        if trimmed.starts_with("LnkSta:") {
            let link = links.entry(slot.clone()).or_default();
            link.speed = speed.or(link.speed.take());
            link.width = width.or(link.width.take());
        } else if trimmed.starts_with("LnkCap:") {
            let link = links.entry(slot.clone()).or_default();
            link.max_speed = speed.or(link.max_speed.take());
            link.max_width = width.or(link.max_width.take());
        }
    }

    links.retain(|_, link| !link.is_empty());
    links
}
