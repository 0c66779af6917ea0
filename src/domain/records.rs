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

//! Per-tool candidate records and their conversion into graph nodes
//!
//! Parsers produce these records; the assembler turns them into nodes once
//! every enrichment patch keyed by the same natural key has been applied.

use crate::domain::parsers::format_gb;
use crate::domain::{Node, NodeKind, Properties};

/// CPU description from lscpu, optionally completed by dmidecode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuInfo {
    /// Marketing model name
    pub model: Option<String>,
    /// Normalized lscpu fields (see `parse_lscpu_json`)
    pub properties: Properties,
}

impl CpuInfo {
    pub fn node_id(index: usize) -> String {
        format!("cpu:{index}")
    }

    pub fn to_node(&self, index: usize) -> Node {
        let label = self.model.clone().unwrap_or_else(|| "CPU".to_string());
        Node::new(Self::node_id(index), NodeKind::Cpu, label)
            .with_properties(self.properties.clone())
    }
}

/// One NUMA node from `/sys/devices/system/node`
#[derive(Debug, Clone, PartialEq)]
pub struct NumaNodeInfo {
    pub id: u32,
    /// CPU list as printed by the kernel, e.g. `0-15,32-47`
    pub cpus: Option<String>,
    /// Node-local memory in GB with one decimal
    pub memory_gb: Option<String>,
}

impl NumaNodeInfo {
    pub fn to_node(&self) -> Node {
        let mut node = Node::new(
            format!("numa:{}", self.id),
            NodeKind::NumaNode,
            format!("NUMA Node {}", self.id),
        );
        if let Some(cpus) = &self.cpus {
            node.properties.insert("cpus".to_string(), cpus.clone());
        }
        if let Some(memory_gb) = &self.memory_gb {
            node.properties.insert("memory_gb".to_string(), memory_gb.clone());
        }
        node
    }
}

/// An installed memory module from `dmidecode -t memory`
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryModule {
    pub locator: Option<String>,
    pub bank_locator: Option<String>,
    /// Module size in GB
    pub size_gb: f64,
    /// Type, speed, manufacturer, part number, ...
    pub properties: Properties,
}

impl MemoryModule {
    /// Locator, falling back to the bank locator, then the module's position
    pub fn natural_key(&self, index: usize) -> String {
        self.locator
            .clone()
            .or_else(|| self.bank_locator.clone())
            .unwrap_or_else(|| index.to_string())
    }

    pub fn to_node(&self, index: usize) -> Node {
        let key = self.natural_key(index);
        let size = format_gb(self.size_gb);
        let label = match self.properties.get("type") {
            Some(type_) => format!("{key} ({size} GB {type_})"),
            None => format!("{key} ({size} GB)"),
        };

        let mut node = Node::new(format!("dimm:{key}"), NodeKind::Dimm, label)
            .with_properties(self.properties.clone())
            .with_property("size_gb", size);
        if let Some(locator) = &self.locator {
            node.properties.insert("locator".to_string(), locator.clone());
        }
        if let Some(bank) = &self.bank_locator {
            node.properties.insert("bank_locator".to_string(), bank.clone());
        }
        node
    }
}

/// Where the system memory total came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTotalSource {
    /// Sum of installed DIMM sizes
    Dimm,
    /// `MemTotal` from `/proc/meminfo`
    Meminfo,
}

impl MemoryTotalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTotalSource::Dimm => "dimm",
            MemoryTotalSource::Meminfo => "meminfo",
        }
    }
}

/// System memory summary node
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySummary {
    pub total_gb: Option<String>,
    pub source: Option<MemoryTotalSource>,
    pub dimm_count: usize,
}

impl MemorySummary {
    pub const NODE_ID: &'static str = "memory";

    /// Total from DIMMs when any were found, otherwise the meminfo total
    pub fn from_sources(modules: &[MemoryModule], meminfo_total_gb: Option<String>) -> Self {
        if modules.is_empty() {
            let source = meminfo_total_gb.as_ref().map(|_| MemoryTotalSource::Meminfo);
            return Self {
                total_gb: meminfo_total_gb,
                source,
                dimm_count: 0,
            };
        }

        let total: f64 = modules.iter().map(|module| module.size_gb).sum();
        Self {
            total_gb: Some(format_gb(total)),
            source: Some(MemoryTotalSource::Dimm),
            dimm_count: modules.len(),
        }
    }

    /// Summary fields stay present as empty strings when unknown
    pub fn to_node(&self) -> Node {
        Node::new(Self::NODE_ID, NodeKind::Memory, "System Memory")
            .with_property("total_gb", self.total_gb.clone().unwrap_or_default())
            .with_property(
                "total_source",
                self.source.map(|s| s.as_str()).unwrap_or_default(),
            )
            .with_property("dimm_count", self.dimm_count.to_string())
    }
}

/// A PCI function from `lspci -vmm -nn -k`
#[derive(Debug, Clone, PartialEq)]
pub struct PciDevice {
    /// Bus address exactly as lspci printed it, e.g. `65:00.0`
    pub slot: String,
    /// `pci-device`, or `gpu-device` for display/accelerator classes
    pub kind: NodeKind,
    pub label: String,
    pub properties: Properties,
}

impl PciDevice {
    pub fn node_id(&self) -> String {
        format!("pci:{}", self.slot)
    }

    pub fn to_node(&self) -> Node {
        Node::new(self.node_id(), self.kind.clone(), self.label.clone())
            .with_properties(self.properties.clone())
    }
}

/// PCIe link state of one slot from `lspci -vv`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PciLink {
    /// Negotiated speed in GT/s, e.g. `16`
    pub speed: Option<String>,
    /// Negotiated width, e.g. `x16`
    pub width: Option<String>,
    /// Capability speed in GT/s
    pub max_speed: Option<String>,
    /// Capability width
    pub max_width: Option<String>,
}

impl PciLink {
    pub fn is_empty(&self) -> bool {
        self.speed.is_none()
            && self.width.is_none()
            && self.max_speed.is_none()
            && self.max_width.is_none()
    }

    /// Add the link fields that are known without touching other properties
    pub fn apply_to(&self, properties: &mut Properties) {
        for (key, value) in [
            ("link_speed", &self.speed),
            ("link_width", &self.width),
            ("max_link_speed", &self.max_speed),
            ("max_link_width", &self.max_width),
        ] {
            if let Some(value) = value {
                properties.insert(key.to_string(), value.clone());
            }
        }
    }
}

/// Data from a GPU vendor tool, to be merged into the PCI node at `bus_id`
#[derive(Debug, Clone, PartialEq)]
pub struct GpuEnrichment {
    /// Bus address as the vendor tool printed it
    pub bus_id: String,
    /// Product name, replaces the node label when present
    pub name: Option<String>,
    pub properties: Properties,
}

/// A USB device from `lsusb`
#[derive(Debug, Clone, PartialEq)]
pub struct UsbDevice {
    pub bus: String,
    pub device: String,
    pub vendor_id: String,
    pub product_id: String,
    pub description: String,
}

impl UsbDevice {
    pub fn to_node(&self) -> Node {
        let label = if self.description.is_empty() {
            format!("USB {}:{}", self.vendor_id, self.product_id)
        } else {
            self.description.clone()
        };
        Node::new(
            format!("usb:{}-{}", self.bus, self.device),
            NodeKind::UsbDevice,
            label,
        )
        .with_property("bus", self.bus.clone())
        .with_property("device", self.device.clone())
        .with_property("vendor_id", self.vendor_id.clone())
        .with_property("product_id", self.product_id.clone())
    }
}

/// A block device from `nvme list` or `lsblk`
#[derive(Debug, Clone, PartialEq)]
pub struct StorageDevice {
    /// Kernel name, e.g. `nvme0n1` or `sda`
    pub name: String,
    /// `nvme-device` or `disk-device`
    pub kind: NodeKind,
    pub model: Option<String>,
    pub properties: Properties,
}

impl StorageDevice {
    pub fn node_id(&self) -> String {
        let prefix = match self.kind {
            NodeKind::NvmeDevice => "nvme",
            _ => "disk",
        };
        format!("{prefix}:{}", self.name)
    }

    pub fn to_node(&self) -> Node {
        let label = self.model.clone().unwrap_or_else(|| self.name.clone());
        let mut node = Node::new(self.node_id(), self.kind.clone(), label)
            .with_properties(self.properties.clone());
        if let Some(model) = &self.model {
            node.properties.insert("model".to_string(), model.clone());
        }
        node
    }
}

/// A network interface from `ip -brief link`, plus ethtool data
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInterface {
    /// Interface name with any `@peer` suffix removed
    pub name: String,
    pub state: String,
    pub mac: String,
    /// Driver, bus address and link settings added by ethtool
    pub properties: Properties,
}

impl NetworkInterface {
    pub fn to_node(&self) -> Node {
        Node::new(format!("net:{}", self.name), NodeKind::NetInterface, self.name.clone())
            .with_properties(self.properties.clone())
            .with_property("state", self.state.clone())
            .with_property("mac", self.mac.clone())
    }
}
