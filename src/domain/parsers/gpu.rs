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

//! GPU vendor tool parsing functions
//!
//! Both parsers produce [`GpuEnrichment`] patches keyed by PCI bus address;
//! they never create nodes on their own.

use super::common::{is_placeholder, meaningful, normalize_bus_address};
use crate::domain::{GpuEnrichment, ParseError, Properties};
use serde_json::Value;
use std::collections::BTreeMap;

/// nvidia-smi query fields, in column order, with the property each lands in.
/// Bus id and name are consumed separately.
const NVIDIA_SMI_FIELDS: &[(&str, Option<&str>)] = &[
    ("pci.bus_id", None),
    ("name", None),
    ("uuid", Some("uuid")),
    ("driver_version", Some("driver")),
    ("memory.total", Some("vram_mb")),
    ("temperature.gpu", Some("temperature_c")),
    ("power.draw", Some("power_draw_w")),
    ("power.limit", Some("power_limit_w")),
    ("utilization.gpu", Some("utilization_pct")),
    ("pcie.link.gen.current", Some("pcie_link_gen")),
    ("pcie.link.width.current", Some("pcie_link_width")),
];

/// `--query-gpu=` argument matching the columns [`parse_nvidia_smi_csv`] reads
pub fn nvidia_smi_query_arg() -> String {
    let fields: Vec<&str> = NVIDIA_SMI_FIELDS.iter().map(|(field, _)| *field).collect();
    format!("--query-gpu={}", fields.join(","))
}

/// Parse nvidia-smi CSV output
///
/// Expected format from command:
/// `nvidia-smi --query-gpu=<see nvidia_smi_query_arg> --format=csv,noheader,nounits`
///
/// Rows whose first column is not a bus address (driver error banners) are
/// skipped; `[N/A]` and `[Not Supported]` cells are dropped.
pub fn parse_nvidia_smi_csv(output: &str) -> Vec<GpuEnrichment> {
    let mut patches = Vec::new();

    for line in output.lines() {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        let Some(bus_id) = cells.first().filter(|c| normalize_bus_address(c).is_some()) else {
            continue;
        };

        let mut properties = Properties::new();
        for ((_, property), cell) in NVIDIA_SMI_FIELDS.iter().zip(&cells) {
            if let (Some(property), Some(value)) = (property, meaningful(cell)) {
                properties.insert(property.to_string(), value);
            }
        }
        properties.insert("enriched_by".to_string(), "nvidia-smi".to_string());

        patches.push(GpuEnrichment {
            bus_id: bus_id.to_string(),
            name: cells.get(1).and_then(|name| meaningful(name)),
            properties,
        });
    }

    patches
}

// rocm-smi key names drift between releases, so fields are located by
// case-insensitive substring search over the sorted, flattened keys. Needles
// are tried in order; within a needle the first sorted key wins.
const ROCM_BUS: &[&str] = &["pci bus", "bus"];
const ROCM_NAME: &[&str] = &["card series", "marketing name", "product name", "card model"];
const ROCM_VRAM: &[&str] = &["vram total memory", "vram total"];
const ROCM_TEMPERATURE: &[&str] = &[
    "temperature (sensor edge)",
    "temperature (sensor junction)",
    "temperature",
];
const ROCM_POWER_DRAW: &[&str] = &[
    "average graphics package power",
    "current socket graphics package power",
];
const ROCM_POWER_LIMIT: &[&str] = &["max graphics package power", "power cap"];
const ROCM_UTILIZATION: &[&str] = &["gpu use", "gpu utilization"];
const ROCM_LINK_WIDTH: &[&str] = &["link width"];
const ROCM_LINK_SPEED: &[&str] = &["link speed"];
const ROCM_UUID: &[&str] = &["unique id", "uuid"];
const ROCM_DRIVER: &[&str] = &["driver version"];

/// Parse `rocm-smi ... --json` output
///
/// The JSON object may be preceded or followed by tool warnings. Each
/// `card*` entry is flattened to dotted keys and searched heuristically.
///
/// # Returns
/// * `Ok(patches)` - One patch per card with a bus address
/// * `Err(ParseError)` - No JSON object could be read
pub fn parse_rocm_smi_json(output: &str) -> Result<Vec<GpuEnrichment>, ParseError> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }

    let (start, end) = match (output.find('{'), output.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => return Err(ParseError::new("rocm-smi", "no JSON object in output")),
    };
    let json: Value = serde_json::from_str(&output[start..=end])
        .map_err(|e| ParseError::new("rocm-smi", format!("invalid JSON: {e}")))?;
    let cards = json
        .as_object()
        .ok_or_else(|| ParseError::new("rocm-smi", "top level is not an object"))?;

    let mut document = BTreeMap::new();
    flatten_json("", &json, &mut document);
    let driver = find_field(&document, ROCM_DRIVER).map(str::to_string);

    let mut patches = Vec::new();
    for (key, card) in cards {
        if !key.to_lowercase().starts_with("card") {
            continue;
        }

        let mut fields = BTreeMap::new();
        flatten_json("", card, &mut fields);
        let Some(bus_id) = find_field(&fields, ROCM_BUS) else {
            continue;
        };

        let mut properties = Properties::new();
        for (needles, property) in [
            (ROCM_TEMPERATURE, "temperature_c"),
            (ROCM_POWER_DRAW, "power_draw_w"),
            (ROCM_POWER_LIMIT, "power_limit_w"),
            (ROCM_UTILIZATION, "utilization_pct"),
            (ROCM_LINK_WIDTH, "pcie_link_width"),
            (ROCM_LINK_SPEED, "pcie_link_speed"),
            (ROCM_UUID, "uuid"),
        ] {
            if let Some(value) = find_field(&fields, needles) {
                properties.insert(property.to_string(), value.to_string());
            }
        }
        if let Some(vram_mb) = find_vram_mb(&fields) {
            properties.insert("vram_mb".to_string(), vram_mb);
        }
        if let Some(driver) = &driver {
            properties.insert("driver".to_string(), driver.clone());
        }
        properties.insert("enriched_by".to_string(), "rocm-smi".to_string());

        patches.push(GpuEnrichment {
            bus_id: bus_id.to_string(),
            name: find_field(&fields, ROCM_NAME).map(str::to_string),
            properties,
        });
    }

    Ok(patches)
}

/// Flatten nested JSON into `a.b.c` keys with string values
pub fn flatten_json(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_json(&join(key), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_json(&join(&index.to_string()), child, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.trim().to_string());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Null => {}
    }
}

/// First non-placeholder value whose key contains one of `needles`
pub fn find_field<'a>(fields: &'a BTreeMap<String, String>, needles: &[&str]) -> Option<&'a str> {
    needles.iter().find_map(|needle| {
        fields
            .iter()
            .find(|(key, value)| key.to_lowercase().contains(needle) && !is_placeholder(value))
            .map(|(_, value)| value.as_str())
    })
}

/// VRAM total in MiB; keys tagged `(B)` hold bytes
fn find_vram_mb(fields: &BTreeMap<String, String>) -> Option<String> {
    ROCM_VRAM.iter().find_map(|needle| {
        fields
            .iter()
            .filter(|(key, value)| key.to_lowercase().contains(needle) && !is_placeholder(value))
            .find_map(|(key, value)| {
                let amount: u64 = value.trim().parse().ok()?;
                if key.to_lowercase().contains("(b)") {
                    Some((amount / (1024 * 1024)).to_string())
                } else {
                    Some(amount.to_string())
                }
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nvidia_smi_query_arg() {
        let arg = nvidia_smi_query_arg();
        assert!(arg.starts_with("--query-gpu=pci.bus_id,name,uuid,"));
        assert!(arg.ends_with("pcie.link.width.current"));
    }

    #[test]
    fn test_parse_nvidia_smi_csv() {
        let output = "00000000:65:00.0, NVIDIA A100 80GB PCIe, GPU-1a2b, 535.129.03, 81920, 34, 43.12, 300.00, 0, 4, 16
00000000:CA:00.0, NVIDIA A100 80GB PCIe, GPU-3c4d, 535.129.03, 81920, [N/A], [Not Supported], 300.00, 5, 4, 16
";
        let patches = parse_nvidia_smi_csv(output);
        assert_eq!(patches.len(), 2);

        let first = &patches[0];
        assert_eq!(first.bus_id, "00000000:65:00.0");
        assert_eq!(first.name.as_deref(), Some("NVIDIA A100 80GB PCIe"));
        assert_eq!(first.properties["driver"], "535.129.03");
        assert_eq!(first.properties["vram_mb"], "81920");
        assert_eq!(first.properties["temperature_c"], "34");
        assert_eq!(first.properties["power_draw_w"], "43.12");
        assert_eq!(first.properties["pcie_link_width"], "16");
        assert_eq!(first.properties["enriched_by"], "nvidia-smi");

        let second = &patches[1];
        assert!(!second.properties.contains_key("temperature_c"));
        assert!(!second.properties.contains_key("power_draw_w"));
        assert_eq!(second.properties["utilization_pct"], "5");
    }

    #[test]
    fn test_nvidia_smi_error_banner_skipped() {
        let output = "NVIDIA-SMI has failed because it couldn't communicate with the NVIDIA driver. Make sure that the latest NVIDIA driver is installed and running.\n";
        assert!(parse_nvidia_smi_csv(output).is_empty());
        assert!(parse_nvidia_smi_csv("").is_empty());
    }

    const ROCM_SMI: &str = r#"WARNING: AMD GPU device(s) is/are in a low-power state. Check power control/runtime_status

{"card0": {"Temperature (Sensor edge) (C)": "38.0", "Temperature (Sensor junction) (C)": "41.0", "Average Graphics Package Power (W)": "91.0", "Max Graphics Package Power (W)": "500.0", "GPU use (%)": "3", "VRAM Total Memory (B)": "68702699520", "Card series": "AMD INSTINCT MI250X", "Card model": "0x740c", "PCI Bus": "0000:C1:00.0", "Unique ID": "0x9d2b2fc9e1ad1a9e"}, "card1": {"Card series": "N/A", "Card model": "0x740c"}, "system": {"Driver version": "6.3.6"}}
"#;

    #[test]
    fn test_parse_rocm_smi_json() {
        let patches = parse_rocm_smi_json(ROCM_SMI).unwrap();
        // card1 has no bus address and cannot be matched
        assert_eq!(patches.len(), 1);

        let card = &patches[0];
        assert_eq!(card.bus_id, "0000:C1:00.0");
        assert_eq!(card.name.as_deref(), Some("AMD INSTINCT MI250X"));
        assert_eq!(card.properties["temperature_c"], "38.0");
        assert_eq!(card.properties["power_draw_w"], "91.0");
        assert_eq!(card.properties["power_limit_w"], "500.0");
        assert_eq!(card.properties["utilization_pct"], "3");
        assert_eq!(card.properties["vram_mb"], "65520");
        assert_eq!(card.properties["uuid"], "0x9d2b2fc9e1ad1a9e");
        assert_eq!(card.properties["driver"], "6.3.6");
        assert_eq!(card.properties["enriched_by"], "rocm-smi");
    }

    #[test]
    fn test_parse_rocm_smi_garbage() {
        assert!(parse_rocm_smi_json("").unwrap().is_empty());
        assert!(parse_rocm_smi_json("ERROR: no devices").is_err());
        assert!(parse_rocm_smi_json("{ not json }").is_err());
    }

    #[test]
    fn test_find_field_is_ordered() {
        let fields = BTreeMap::from([
            ("b.Temperature".to_string(), "50".to_string()),
            ("a.Temperature (Sensor edge)".to_string(), "N/A".to_string()),
            ("c.temperature (sensor junction)".to_string(), "60".to_string()),
        ]);
        assert_eq!(find_field(&fields, ROCM_TEMPERATURE), Some("60"));
    }

    #[test]
    fn test_flatten_json() {
        let json: Value = serde_json::from_str(r#"{"a": {"b": 1, "c": [true, null]}}"#).unwrap();
        let mut out = BTreeMap::new();
        flatten_json("", &json, &mut out);
        assert_eq!(out["a.b"], "1");
        assert_eq!(out["a.c.0"], "true");
        assert!(!out.contains_key("a.c.1"));
    }
}
