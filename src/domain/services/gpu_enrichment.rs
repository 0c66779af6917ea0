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

//! Merging GPU vendor tool data into PCI records
//!
//! Enrichment runs on [`PciDevice`] records before any node is created, so
//! the graph only ever sees the final, merged device.

use crate::domain::parsers::normalize_bus_address;
use crate::domain::{GpuEnrichment, NodeKind, PciDevice};
use log::debug;

/// Index of the device at `bus_id`
///
/// An exact `bb:dd.f` tail match against the slot wins; otherwise the full
/// `dddd:bb:dd.f` forms are compared.
pub fn find_device_by_bus(devices: &[PciDevice], bus_id: &str) -> Option<usize> {
    let (tail, full) = normalize_bus_address(bus_id)?;

    devices
        .iter()
        .position(|device| device.slot.to_lowercase() == tail)
        .or_else(|| {
            devices.iter().position(|device| {
                normalize_bus_address(&device.slot).is_some_and(|(_, slot_full)| slot_full == full)
            })
        })
}

/// Merge one patch into a device: promote to `gpu-device`, take the product
/// name as label, and add properties without dropping existing ones
pub fn apply_gpu_enrichment(device: &mut PciDevice, patch: &GpuEnrichment) {
    if device.kind.can_become(&NodeKind::GpuDevice) {
        device.kind = NodeKind::GpuDevice;
    }
    if let Some(name) = &patch.name {
        device.label = name.clone();
    }
    device
        .properties
        .extend(patch.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
}

/// Apply every patch to its matching device
///
/// # Returns
/// Bus ids of patches that matched no device; they never create devices.
pub fn apply_gpu_enrichments(devices: &mut [PciDevice], patches: &[GpuEnrichment]) -> Vec<String> {
    let mut unmatched = Vec::new();

    for patch in patches {
        match find_device_by_bus(devices, &patch.bus_id) {
            Some(index) => {
                debug!("Enriching {} from {}", devices[index].slot, patch.bus_id);
                apply_gpu_enrichment(&mut devices[index], patch);
            }
            None => unmatched.push(patch.bus_id.clone()),
        }
    }

    unmatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Properties;

    fn device(slot: &str, kind: NodeKind) -> PciDevice {
        PciDevice {
            slot: slot.to_string(),
            kind,
            label: "NVIDIA Corporation GA100".to_string(),
            properties: Properties::from([("driver".to_string(), "nouveau".to_string())]),
        }
    }

    fn patch(bus_id: &str) -> GpuEnrichment {
        GpuEnrichment {
            bus_id: bus_id.to_string(),
            name: Some("NVIDIA A100 80GB PCIe".to_string()),
            properties: Properties::from([
                ("driver".to_string(), "535.129.03".to_string()),
                ("vram_mb".to_string(), "81920".to_string()),
            ]),
        }
    }

    #[test]
    fn test_tail_match_mutates_existing_device() {
        let mut devices = vec![
            device("00:00.0", NodeKind::PciDevice),
            device("65:00.0", NodeKind::PciDevice),
        ];
        let unmatched = apply_gpu_enrichments(&mut devices, &[patch("00000000:65:00.0")]);

        assert!(unmatched.is_empty());
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].kind, NodeKind::PciDevice);
        assert_eq!(devices[1].kind, NodeKind::GpuDevice);
        assert_eq!(devices[1].label, "NVIDIA A100 80GB PCIe");
        assert_eq!(devices[1].properties["driver"], "535.129.03");
        assert_eq!(devices[1].properties["vram_mb"], "81920");
    }

    #[test]
    fn test_full_match_with_domain() {
        let devices = vec![
            device("0001:65:00.0", NodeKind::PciDevice),
            device("0002:65:00.0", NodeKind::PciDevice),
        ];
        assert_eq!(find_device_by_bus(&devices, "00000002:65:00.0"), Some(1));
        assert_eq!(find_device_by_bus(&devices, "0003:65:00.0"), None);
    }

    #[test]
    fn test_tail_match_preferred() {
        let devices = vec![
            device("0000:65:00.0", NodeKind::PciDevice),
            device("65:00.0", NodeKind::PciDevice),
        ];
        assert_eq!(find_device_by_bus(&devices, "0000:65:00.0"), Some(1));
    }

    #[test]
    fn test_unmatched_and_garbage_bus_ids() {
        let mut devices = vec![device("65:00.0", NodeKind::PciDevice)];
        let unmatched =
            apply_gpu_enrichments(&mut devices, &[patch("0000:ca:00.0"), patch("bogus")]);
        assert_eq!(unmatched, vec!["0000:ca:00.0", "bogus"]);
        assert_eq!(devices[0].kind, NodeKind::PciDevice);
    }

    #[test]
    fn test_four_digit_domain_bus_id_upgrades_in_place() {
        let mut devices = vec![
            device("00:1f.3", NodeKind::PciDevice),
            device("65:00.0", NodeKind::PciDevice),
        ];
        let unmatched = apply_gpu_enrichments(&mut devices, &[patch("0000:65:00.0")]);

        assert!(unmatched.is_empty());
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].slot, "65:00.0");
        assert_eq!(devices[1].kind, NodeKind::GpuDevice);
        let gpus = devices.iter().filter(|d| d.kind == NodeKind::GpuDevice).count();
        assert_eq!(gpus, 1);
    }

    #[test]
    fn test_kind_is_never_contradicted() {
        let mut other = device("65:00.0", NodeKind::Other("fpga".to_string()));
        apply_gpu_enrichment(&mut other, &patch("65:00.0"));
        assert_eq!(other.kind, NodeKind::Other("fpga".to_string()));
    }
}
