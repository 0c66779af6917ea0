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

//! Common parsing utilities and helper functions

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref STORAGE_SIZE_RE: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*(B|K|M|G|T)B?").unwrap();
    pub static ref DMIDECODE_VALUE_RE: Regex = Regex::new(r"^\s*([^:]+):\s*(.+)$").unwrap();
    pub static ref PCI_ADDRESS_RE: Regex =
        Regex::new(r"^(?:([0-9a-fA-F]{4,8}):)?([0-9a-fA-F]{2}:[0-9a-fA-F]{2}\.[0-7])$").unwrap();
}

/// Values tools print when they have nothing real to report
const PLACEHOLDER_VALUES: &[&str] = &[
    "unknown",
    "not specified",
    "not provided",
    "unconfigured",
    "n/a",
    "[n/a]",
    "[not supported]",
    "none",
    "-",
];

/// One blank-line delimited block of `Key: value` lines
///
/// Keys keep their first occurrence and their order. Lines without a
/// separator (dmidecode handle and section titles) are kept as titles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stanza {
    pub titles: Vec<String>,
    pub fields: Vec<(String, String)>,
}

impl Stanza {
    /// Value of `key`, if present and non-empty
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// First present value among `keys`, tried in order
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// First present, non-placeholder value among `keys`, tried in order
    pub fn first_meaningful(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .find(|value| !is_placeholder(value))
    }

    pub fn has_title(&self, title: &str) -> bool {
        self.titles.iter().any(|t| t == title)
    }

    fn is_empty(&self) -> bool {
        self.titles.is_empty() && self.fields.is_empty()
    }
}

/// Split `Key: value` text into stanzas on blank lines
pub fn parse_stanzas(output: &str) -> Vec<Stanza> {
    let mut stanzas = Vec::new();
    let mut current = Stanza::default();

    for line in output.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                stanzas.push(std::mem::take(&mut current));
            }
            continue;
        }

        match parse_key_value(line, ':') {
            Ok((key, value)) if !key.is_empty() => {
                if !current.fields.iter().any(|(k, _)| *k == key) {
                    current.fields.push((key, clean_value(&value)));
                }
            }
            _ => current.titles.push(clean_value(line)),
        }
    }

    if !current.is_empty() {
        stanzas.push(current);
    }

    stanzas
}

/// Parse a size string (e.g., "16GB", "16384 MB") to bytes
///
/// # Arguments
/// * `size_str` - Size string to parse
///
/// # Returns
/// * `Ok(u64)` - Size in bytes
/// * `Err(String)` - Parse error description
pub fn parse_size_to_bytes(size_str: &str) -> Result<u64, String> {
    if size_str.trim().is_empty() || is_placeholder(size_str) {
        return Ok(0);
    }

    let size_str = size_str.replace(' ', "").to_uppercase();

    if let Some(captures) = STORAGE_SIZE_RE.captures(&size_str) {
        let number: f64 = captures[1]
            .parse()
            .map_err(|_| format!("Invalid number in size: {}", &captures[1]))?;
        let unit = &captures[2];

        let multiplier = match unit {
            "B" => 1,
            "K" => 1024,
            "M" => 1024 * 1024,
            "G" => 1024 * 1024 * 1024,
            "T" => 1024_u64.pow(4),
            _ => return Err(format!("Unknown unit: {unit}")),
        };

        Ok((number * multiplier as f64) as u64)
    } else {
        Err(format!("Unable to parse size: {size_str}"))
    }
}

/// Extract a value from dmidecode-style output
///
/// # Arguments
/// * `output` - Raw dmidecode output
/// * `key` - Key to search for (e.g., "Max Speed")
///
/// # Returns
/// * `Ok(String)` - Extracted value
/// * `Err(String)` - Key not found
pub fn extract_dmidecode_value(output: &str, key: &str) -> Result<String, String> {
    for line in output.lines() {
        if let Some(captures) = DMIDECODE_VALUE_RE.captures(line) {
            let line_key = captures[1].trim();
            let value = captures[2].trim();

            if line_key.eq_ignore_ascii_case(key) {
                return Ok(value.to_string());
            }
        }
    }
    Err(format!("Key '{key}' not found in dmidecode output"))
}

/// Parse a key-value pair from system output
///
/// # Arguments
/// * `line` - Line to parse (e.g., "Slot:\t00:1f.3")
/// * `separator` - Separator character (usually ':')
///
/// # Returns
/// * `Ok((String, String))` - Key-value pair
/// * `Err(String)` - Parse error
pub fn parse_key_value(line: &str, separator: char) -> Result<(String, String), String> {
    if let Some(pos) = line.find(separator) {
        let key = line[..pos].trim().to_string();
        let value = line[pos + 1..].trim().to_string();
        Ok((key, value))
    } else {
        Err(format!("No separator '{separator}' found in line: {line}"))
    }
}

/// Clean and normalize a string value
pub fn clean_value(value: &str) -> String {
    value.trim().replace('\t', " ").replace("  ", " ")
}

/// Whether a tool printed a stand-in instead of a real value
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value.is_empty() || PLACEHOLDER_VALUES.contains(&value.as_str())
}

/// Keep a value only if it carries information
pub fn meaningful(value: &str) -> Option<String> {
    if is_placeholder(value) {
        None
    } else {
        Some(clean_value(value))
    }
}

/// Parse boolean-like strings to actual booleans
///
/// # Arguments
/// * `value` - String value (e.g., "yes", "true", "1", "enabled")
///
/// # Returns
/// * `Ok(bool)` - Parsed boolean value
/// * `Err(String)` - Parse error
pub fn parse_boolean(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" | "on" | "enabled" | "active" => Ok(true),
        "no" | "false" | "0" | "off" | "disabled" | "inactive" => Ok(false),
        _ => Err(format!("Cannot parse '{value}' as boolean")),
    }
}

/// Format a gigabyte count with one decimal, e.g. `16.0`
pub fn format_gb(gb: f64) -> String {
    format!("{gb:.1}")
}

/// Bytes to a one-decimal GB string (1 GB = 1024^3 bytes)
pub fn bytes_to_gb(bytes: u64) -> String {
    format_gb(bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

/// Kilobytes to a one-decimal GB string (1 GB = 1024^2 kB)
pub fn kb_to_gb(kb: u64) -> String {
    format_gb(kb as f64 / (1024.0 * 1024.0))
}

/// Normalize a PCI bus address to its `bb:dd.f` tail and its full
/// `dddd:bb:dd.f` form
///
/// Domains wider than four digits (nvidia-smi prints eight) are cut to their
/// last four; a missing domain means `0000`.
pub fn normalize_bus_address(address: &str) -> Option<(String, String)> {
    let address = address.trim().to_lowercase();
    let captures = PCI_ADDRESS_RE.captures(&address)?;
    let tail = captures[2].to_string();
    let domain = captures
        .get(1)
        .map(|d| d.as_str()[d.as_str().len() - 4..].to_string())
        .unwrap_or_else(|| "0000".to_string());
    let full = format!("{domain}:{tail}");
    Some((tail, full))
}
