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

//! USB device listing parser

use crate::domain::UsbDevice;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LSUSB_LINE_RE: Regex = Regex::new(
        r"^Bus\s+(\d{3})\s+Device\s+(\d{3}):\s+ID\s+([0-9a-fA-F]{4}):([0-9a-fA-F]{4})\s*(.*)$"
    )
    .unwrap();
}

/// Parse plain `lsusb` output
///
/// Expected format:
/// `Bus 001 Device 002: ID 8087:0024 Intel Corp. Integrated Rate Matching Hub`
///
/// Lines that do not match are ignored.
pub fn parse_lsusb(output: &str) -> Vec<UsbDevice> {
    output
        .lines()
        .filter_map(|line| LSUSB_LINE_RE.captures(line.trim()))
        .map(|caps| UsbDevice {
            bus: caps[1].to_string(),
            device: caps[2].to_string(),
            vendor_id: caps[3].to_lowercase(),
            product_id: caps[4].to_lowercase(),
            description: caps[5].trim().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lsusb() {
        let output = "Bus 002 Device 001: ID 1d6b:0003 Linux Foundation 3.0 root hub
Bus 001 Device 003: ID 046D:C52B Logitech, Inc. Unifying Receiver
Bus 001 Device 004: ID 0bda:8153
garbage line
";
        let devices = parse_lsusb(output);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].bus, "002");
        assert_eq!(devices[0].device, "001");
        assert_eq!(devices[0].description, "Linux Foundation 3.0 root hub");
        assert_eq!(devices[1].vendor_id, "046d");
        assert_eq!(devices[1].product_id, "c52b");
        assert_eq!(devices[2].description, "");
    }

    #[test]
    fn test_parse_lsusb_empty() {
        assert!(parse_lsusb("").is_empty());
    }
}
