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

//! Fixed demonstration graph
//!
//! Built without running any command, for hosts that are not Linux and as a
//! golden fixture for consumers of the graph format.

use super::GraphBuilder;
use crate::domain::{Graph, Node, NodeKind, ROOT_ID};

/// Build the demo graph. The result is identical on every call.
pub fn generate_demo_graph() -> Graph {
    let mut graph = GraphBuilder::new(
        Node::new(ROOT_ID, NodeKind::System, "Demo System")
            .with_property("os", "Linux")
            .with_property("arch", "x86_64"),
    );

    let cpu = graph.add_child(
        ROOT_ID,
        Node::new("cpu:0", NodeKind::Cpu, "Intel(R) Xeon(R) CPU")
            .with_property("sockets", "1")
            .with_property("cores_per_socket", "8")
            .with_property("threads_per_core", "2"),
        "contains",
    );
    graph.add_child(
        &cpu,
        Node::new("numa:0", NodeKind::NumaNode, "NUMA Node 0")
            .with_property("cpus", "0-15")
            .with_property("memory_gb", "31.3"),
        "numa",
    );

    let memory = graph.add_child(
        ROOT_ID,
        Node::new("memory", NodeKind::Memory, "System Memory")
            .with_property("total_gb", "32.0")
            .with_property("total_source", "dimm")
            .with_property("dimm_count", "2"),
        "contains",
    );
    for locator in ["DIMM_A1", "DIMM_B1"] {
        graph.add_child(
            &memory,
            Node::new(
                format!("dimm:{locator}"),
                NodeKind::Dimm,
                format!("{locator} (16.0 GB DDR4)"),
            )
                .with_property("size_gb", "16.0")
                .with_property("type", "DDR4")
                .with_property("speed", "3200 MT/s")
                .with_property("locator", locator),
            "dimm",
        );
    }

    let pci = graph.add_child(ROOT_ID, Node::new("bus:pci", NodeKind::Bus, "PCI Bus"), "contains");
    graph.add_child(
        &pci,
        Node::new(
            "pci:00:00.0",
            NodeKind::PciDevice,
            "Intel Corporation 440FX - 82441FX PMC [Natoma]",
        )
        .with_property("class", "Host bridge")
        .with_property("address", "00:00.0"),
        "device",
    );
    graph.add_child(
        &pci,
        Node::new(
            "pci:00:01.0",
            NodeKind::PciDevice,
            "Intel Corporation 82371SB PIIX3 ISA [Natoma/Triton II]",
        )
        .with_property("class", "ISA bridge")
        .with_property("address", "00:01.0"),
        "device",
    );
    graph.add_child(
        &pci,
        Node::new("pci:65:00.0", NodeKind::GpuDevice, "NVIDIA A100 80GB PCIe")
            .with_property("class", "3D controller")
            .with_property("address", "65:00.0")
            .with_property("vendor_id", "10de")
            .with_property("device_id", "20b5")
            .with_property("vram_mb", "81920")
            .with_property("link_speed", "16")
            .with_property("link_width", "x16")
            .with_property("enriched_by", "nvidia-smi"),
        "device",
    );

    let usb = graph.add_child(ROOT_ID, Node::new("bus:usb", NodeKind::Bus, "USB Bus"), "contains");
    graph.add_child(
        &usb,
        Node::new("usb:001-002", NodeKind::UsbDevice, "Intel Corp. Integrated Hub")
            .with_property("bus", "001")
            .with_property("device", "002")
            .with_property("vendor_id", "8087")
            .with_property("product_id", "0024"),
        "device",
    );

    let storage = graph.add_child(
        ROOT_ID,
        Node::new("bus:storage", NodeKind::Bus, "Storage"),
        "contains",
    );
    graph.add_child(
        &storage,
        Node::new("nvme:nvme0n1", NodeKind::NvmeDevice, "Samsung SSD 980 PRO 1TB")
            .with_property("path", "/dev/nvme0n1")
            .with_property("model", "Samsung SSD 980 PRO 1TB")
            .with_property("size_gb", "931.5"),
        "device",
    );
    graph.add_child(
        &storage,
        Node::new("disk:sda", NodeKind::DiskDevice, "ST4000NM0035")
            .with_property("path", "/dev/sda")
            .with_property("model", "ST4000NM0035")
            .with_property("size_gb", "3726.0")
            .with_property("rotational", "true"),
        "device",
    );

    let net = graph.add_child(ROOT_ID, Node::new("bus:net", NodeKind::Bus, "Network"), "contains");
    graph.add_child(
        &net,
        Node::new("net:eth0", NodeKind::NetInterface, "eth0")
            .with_property("state", "UP")
            .with_property("mac", "52:54:00:12:34:56")
            .with_property("driver", "virtio_net")
            .with_property("speed_mbps", "10000"),
        "iface",
    );

    graph.finish()
}
