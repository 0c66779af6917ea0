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

//! Network information parsing functions

use super::common::{meaningful, parse_boolean, parse_key_value};
use crate::domain::{NetworkInterface, Properties};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IP_BRIEF_RE: Regex =
        Regex::new(r"^(\S+)\s+(\S+)\s+([0-9a-fA-F]{2}(?::[0-9a-fA-F]{2})+)(?:\s|$)").unwrap();
    static ref ETHTOOL_SPEED_RE: Regex =
        Regex::new(r"^(\d+(?:\.\d+)?)\s*([MG])b/s$").unwrap();
}

/// Parse `ip -brief link` output
///
/// Expected format:
/// `eth0@if12   UP   02:42:ac:11:00:02 <BROADCAST,MULTICAST,UP,LOWER_UP>`
///
/// The link-layer address may be any length (Ethernet has 6 octets,
/// InfiniBand 20). Interfaces without one (tunnels, wireguard) are skipped.
/// `@peer` suffixes are removed.
pub fn parse_ip_brief_link(output: &str) -> Vec<NetworkInterface> {
    output
        .lines()
        .filter_map(|line| IP_BRIEF_RE.captures(line.trim()))
        .map(|caps| {
            let name = caps[1].split('@').next().unwrap_or(&caps[1]).to_string();
            NetworkInterface {
                name,
                state: caps[2].to_string(),
                mac: caps[3].to_lowercase(),
                properties: Properties::new(),
            }
        })
        .filter(|iface| !iface.name.is_empty())
        .collect()
}

/// Parse `ethtool -i <iface>` output into driver properties
pub fn parse_ethtool_driver_info(output: &str) -> Properties {
    let mut properties = Properties::new();

    for line in output.lines() {
        let Ok((key, value)) = parse_key_value(line, ':') else {
            continue;
        };
        let property = match key.as_str() {
            "driver" => "driver",
            "version" => "driver_version",
            "firmware-version" => "firmware_version",
            "bus-info" => "bus_info",
            _ => continue,
        };
        if let Some(value) = meaningful(&value) {
            properties.insert(property.to_string(), value);
        }
    }

    properties
}

/// Parse `ethtool <iface>` output into link properties
///
/// `speed_mbps` is normalized to Mb/s; `Unknown!` speeds are dropped.
pub fn parse_ethtool_link(output: &str) -> Properties {
    let mut properties = Properties::new();

    for line in output.lines() {
        let Ok((key, value)) = parse_key_value(line, ':') else {
            continue;
        };
        match key.as_str() {
            "Speed" => {
                if let Some(mbps) = parse_speed_mbps(&value) {
                    properties.insert("speed_mbps".to_string(), mbps.to_string());
                }
            }
            "Duplex" => {
                if let Some(duplex) = meaningful(&value).filter(|d| !d.contains('!')) {
                    properties.insert("duplex".to_string(), duplex.to_lowercase());
                }
            }
            "Link detected" => {
                if let Ok(detected) = parse_boolean(&value) {
                    properties.insert("link_detected".to_string(), detected.to_string());
                }
            }
            _ => {}
        }
    }

    properties
}

/// `10000Mb/s` and `10Gb/s` both give 10000
pub fn parse_speed_mbps(value: &str) -> Option<u64> {
    let caps = ETHTOOL_SPEED_RE.captures(value.trim())?;
    let amount: f64 = caps[1].parse().ok()?;
    let mbps = match &caps[2] {
        "G" => amount * 1000.0,
        _ => amount,
    };
    Some(mbps.round() as u64)
}
