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

//! Storage information parsing functions
//!
//! NVMe namespaces come from `nvme list`; everything else comes from
//! `lsblk`. Names starting with `nvme` are excluded from the lsblk set so a
//! drive never shows up twice.

use super::common::{bytes_to_gb, meaningful, parse_boolean};
use crate::domain::{NodeKind, ParseError, Properties, StorageDevice};
use serde_json::Value;
use std::collections::BTreeSet;

const NVME_NAME_KEYS: &[&str] = &["DevicePath", "Device", "Name"];
const NVME_MODEL_KEYS: &[&str] = &["ModelNumber", "Model"];
const NVME_SERIAL_KEYS: &[&str] = &["SerialNumber", "Serial"];
const NVME_FIRMWARE_KEYS: &[&str] = &["Firmware", "FirmwareRevision", "Revision"];
const NVME_SIZE_KEYS: &[&str] = &["PhysicalSize", "Size", "UsedBytes"];

/// First key present as a meaningful string or number
fn json_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) => meaningful(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First key present as a byte count, numeric or string
fn json_bytes(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn json_array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parse `nvme list -o json` output
///
/// Accepts the flat `{"Devices": [...]}` layout, a bare array, and the
/// nested `Subsystems -> Controllers -> Namespaces` layout of nvme-cli 2.x.
///
/// # Returns
/// * `Ok(devices)` - One record per namespace, in listing order
/// * `Err(ParseError)` - The output is not JSON or has no device list
pub fn parse_nvme_list_json(output: &str) -> Result<Vec<StorageDevice>, ParseError> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }

    let json: Value = serde_json::from_str(output)
        .map_err(|e| ParseError::new("nvme", format!("invalid JSON: {e}")))?;
    let entries = match &json {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => json
            .get("Devices")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| ParseError::new("nvme", "missing Devices array"))?,
        _ => return Err(ParseError::new("nvme", "unexpected JSON shape")),
    };

    let mut devices = Vec::new();
    let mut seen = BTreeSet::new();
    let mut push = |device: StorageDevice| {
        if seen.insert(device.name.clone()) {
            devices.push(device);
        }
    };

    for entry in entries {
        let subsystems = json_array(entry, "Subsystems");
        if subsystems.is_empty() {
            if let Some(device) = flat_nvme_record(entry) {
                push(device);
            }
            continue;
        }

        for subsystem in subsystems {
            let controllers = json_array(subsystem, "Controllers");
            for controller in controllers {
                for namespace in json_array(controller, "Namespaces") {
                    if let Some(device) = nested_nvme_record(namespace, controller) {
                        push(device);
                    }
                }
            }
            // Multipath setups list namespaces on the subsystem itself
            if let Some(controller) = controllers.first() {
                for namespace in json_array(subsystem, "Namespaces") {
                    if let Some(device) = nested_nvme_record(namespace, controller) {
                        push(device);
                    }
                }
            }
        }
    }

    Ok(devices)
}

fn flat_nvme_record(entry: &Value) -> Option<StorageDevice> {
    let path = json_text(entry, NVME_NAME_KEYS)?;
    Some(nvme_record(&path, entry, entry))
}

fn nested_nvme_record(namespace: &Value, controller: &Value) -> Option<StorageDevice> {
    let name = json_text(namespace, &["NameSpace", "Name"])?;
    Some(nvme_record(&name, namespace, controller))
}

fn nvme_record(path_or_name: &str, namespace: &Value, controller: &Value) -> StorageDevice {
    let name = basename(path_or_name).to_string();
    let path = if path_or_name.starts_with('/') {
        path_or_name.to_string()
    } else {
        format!("/dev/{name}")
    };

    let mut properties = Properties::new();
    properties.insert("path".to_string(), path);
    if let Some(serial) = json_text(controller, NVME_SERIAL_KEYS) {
        properties.insert("serial".to_string(), serial);
    }
    if let Some(firmware) = json_text(controller, NVME_FIRMWARE_KEYS) {
        properties.insert("firmware".to_string(), firmware);
    }
    if let Some(bytes) = json_bytes(namespace, NVME_SIZE_KEYS) {
        properties.insert("size_gb".to_string(), bytes_to_gb(bytes));
    }

    StorageDevice {
        name,
        kind: NodeKind::NvmeDevice,
        model: json_text(controller, NVME_MODEL_KEYS),
        properties,
    }
}

/// Parse lsblk JSON output
///
/// # Arguments
///
/// * `output` - JSON output from `lsblk -J -b -d -o NAME,TYPE,SIZE,MODEL,SERIAL,ROTA,TRAN,VENDOR`
///
/// Only `disk` entries are kept, and never NVMe namespaces.
pub fn parse_lsblk_json(output: &str) -> Result<Vec<StorageDevice>, ParseError> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }

    let json: Value = serde_json::from_str(output)
        .map_err(|e| ParseError::new("lsblk", format!("invalid JSON: {e}")))?;
    let blockdevices = json
        .get("blockdevices")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::new("lsblk", "missing blockdevices array"))?;

    let mut devices = Vec::new();

    for device in blockdevices {
        let Some(name) = json_text(device, &["name"]) else {
            continue;
        };
        if json_text(device, &["type"]).as_deref() != Some("disk") || name.starts_with("nvme") {
            continue;
        }

        let mut properties = Properties::new();
        properties.insert("path".to_string(), format!("/dev/{name}"));
        if let Some(bytes) = json_bytes(device, &["size"]) {
            properties.insert("size_gb".to_string(), bytes_to_gb(bytes));
        }
        for (key, property) in [("serial", "serial"), ("vendor", "vendor"), ("tran", "transport")] {
            if let Some(value) = json_text(device, &[key]) {
                properties.insert(property.to_string(), value);
            }
        }
        if let Some(rotational) = parse_rotational(device.get("rota")) {
            properties.insert("rotational".to_string(), rotational.to_string());
        }

        devices.push(StorageDevice {
            model: json_text(device, &["model"]),
            name,
            kind: NodeKind::DiskDevice,
            properties,
        });
    }

    Ok(devices)
}

/// lsblk prints `rota` as a bool, a number, or a string depending on version
fn parse_rotational(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        Value::String(s) => parse_boolean(s).ok(),
        _ => None,
    }
}
