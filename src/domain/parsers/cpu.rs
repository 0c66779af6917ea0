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

//! CPU information parsing functions

use super::common::{extract_dmidecode_value, meaningful};
use crate::domain::{CpuInfo, ParseError, Properties};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

lazy_static! {
    static ref CPU_SPEED_RE: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*(MHz|GHz)").unwrap();
}

/// Node properties and the lscpu field names they are read from, tried in
/// order. util-linux 2.37+ nests caches under `Caches (sum of all)` as
/// `L1d`, `L1i`, `L2`, `L3`; older releases print `L1d cache` and so on.
const LSCPU_PROPERTIES: &[(&str, &[&str])] = &[
    ("architecture", &["Architecture"]),
    ("cpus", &["CPU(s)"]),
    ("sockets", &["Socket(s)"]),
    ("cores_per_socket", &["Core(s) per socket"]),
    ("threads_per_core", &["Thread(s) per core"]),
    ("vendor", &["Vendor ID"]),
    ("family", &["CPU family"]),
    ("model", &["Model"]),
    ("stepping", &["Stepping"]),
    ("min_mhz", &["CPU min MHz"]),
    ("max_mhz", &["CPU max MHz"]),
    ("l1d_cache", &["L1d cache", "L1d"]),
    ("l1i_cache", &["L1i cache", "L1i"]),
    ("l2_cache", &["L2 cache", "L2"]),
    ("l3_cache", &["L3 cache", "L3"]),
    ("address_sizes", &["Address sizes"]),
    ("virtualization", &["Virtualization"]),
    ("hypervisor", &["Hypervisor vendor"]),
];

/// First meaningful value among `keys`
fn first_field(fields: &BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| fields.get(*key).and_then(|value| meaningful(value)))
}

/// Flatten `lscpu -J` output into a single field -> value map
///
/// Newer lscpu releases nest fields under `children`; the walk is recursive
/// and the first occurrence of a field wins. Field names lose their trailing
/// colon. Group headers without data are skipped.
///
/// # Returns
/// * `Ok(map)` - Flattened fields (empty for empty input)
/// * `Err(ParseError)` - Input is not an lscpu JSON report
pub fn flatten_lscpu_json(output: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let mut fields = BTreeMap::new();
    if output.trim().is_empty() {
        return Ok(fields);
    }

    let json: Value = serde_json::from_str(output)
        .map_err(|e| ParseError::new("lscpu", format!("invalid JSON: {e}")))?;
    let entries = json
        .get("lscpu")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::new("lscpu", "missing lscpu array"))?;

    collect_lscpu_fields(entries, &mut fields);
    Ok(fields)
}

fn collect_lscpu_fields(entries: &[Value], fields: &mut BTreeMap<String, String>) {
    for entry in entries {
        let name = entry
            .get("field")
            .and_then(Value::as_str)
            .map(|f| f.trim().trim_end_matches(':').trim().to_string());
        let data = entry.get("data").and_then(|d| match d {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        if let (Some(name), Some(data)) = (name, data) {
            if !name.is_empty() {
                fields.entry(name).or_insert(data);
            }
        }

        if let Some(children) = entry.get("children").and_then(Value::as_array) {
            collect_lscpu_fields(children, fields);
        }
    }
}

/// Parse CPU information from `lscpu -J` output
///
/// # Returns
/// * `Ok(Some(CpuInfo))` - Parsed CPU information
/// * `Ok(None)` - No CPU fields found (empty input)
/// * `Err(ParseError)` - Input is not an lscpu JSON report
pub fn parse_lscpu_json(output: &str) -> Result<Option<CpuInfo>, ParseError> {
    let fields = flatten_lscpu_json(output)?;
    if fields.is_empty() {
        return Ok(None);
    }

    let mut properties = Properties::new();
    for (property, keys) in LSCPU_PROPERTIES {
        if let Some(value) = first_field(&fields, keys) {
            properties.insert(property.to_string(), value);
        }
    }

    Ok(Some(CpuInfo {
        model: fields.get("Model name").and_then(|v| meaningful(v)),
        properties,
    }))
}

/// Nameplate base frequency in MHz from `dmidecode -t processor`
///
/// `Max Speed` is preferred over `Current Speed`: the current reading can
/// reflect turbo or power-saving state rather than the rated frequency.
pub fn parse_dmidecode_base_mhz(dmidecode_output: &str) -> Option<String> {
    ["Max Speed", "Current Speed"].iter().find_map(|key| {
        extract_dmidecode_value(dmidecode_output, key)
            .ok()
            .and_then(|speed| speed_to_mhz(&speed))
    })
}

/// Convert "3500 MHz" / "3.5 GHz" to a MHz string
fn speed_to_mhz(speed: &str) -> Option<String> {
    let captures = CPU_SPEED_RE.captures(speed)?;
    let value: f64 = captures[1].parse().ok()?;
    let mhz = if &captures[2] == "GHz" {
        value * 1000.0
    } else {
        value
    };
    if mhz <= 0.0 {
        return None;
    }
    Some((mhz.round() as u64).to_string())
}
