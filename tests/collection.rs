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

use assert_fs::prelude::*;
use std::sync::Arc;
use toposcope::testing::{FixedHostIdentity, MockCommandExecutor};
use toposcope::{NodeKind, SysfsReader, TopologyCollectionService, TopologyService, ROOT_ID};

const LSPCI_VMM: &str = "Slot:\t00:00.0
Class:\tHost bridge [0600]
Vendor:\tAdvanced Micro Devices, Inc. [AMD] [1022]
Device:\tStarship/Matisse Root Complex [1480]

Slot:\tc1:00.0
Class:\tDisplay controller [0380]
Vendor:\tAdvanced Micro Devices, Inc. [AMD/ATI] [1002]
Device:\tAldebaran/MI200 [Instinct MI250X] [740c]
Driver:\tamdgpu
";

const ROCM_SMI: &str = r#"{"card0": {"Card series": "AMD INSTINCT MI250X", "PCI Bus": "0000:C1:00.0", "VRAM Total Memory (B)": "68702699520", "GPU use (%)": "3"}, "system": {"Driver version": "6.3.6"}}"#;

fn rocm_command() -> &'static str {
    "rocm-smi --showproductname --showbus --showmeminfo vram --showtemp --showpower --showmaxpower --showuse --showdriverversion --json"
}

fn capture() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("proc/meminfo")
        .write_str("MemTotal:       263842132 kB\nMemFree:        1000 kB\n")
        .unwrap();
    temp.child("sys/devices/system/node/node0/cpulist").write_str("0-31,64-95\n").unwrap();
    temp.child("sys/devices/system/node/node0/meminfo")
        .write_str("Node 0 MemTotal:       131921066 kB\n")
        .unwrap();
    temp.child("sys/devices/system/node/node1/cpulist").write_str("32-63,96-127\n").unwrap();
    temp.child("sys/devices/system/node/node1/meminfo")
        .write_str("Node 1 MemTotal:       131921066 kB\n")
        .unwrap();
    temp.child("sys/devices/system/node/possible").write_str("0-1\n").unwrap();
    temp.child("sys/class/dmi/id/sys_vendor").write_str("Dell Inc.\n").unwrap();
    temp
}

fn service(temp: &assert_fs::TempDir, executor: MockCommandExecutor) -> TopologyCollectionService {
    TopologyCollectionService::new(
        Arc::new(executor),
        Arc::new(SysfsReader::new(temp.path())),
        Arc::new(FixedHostIdentity::new("mi250-01")),
    )
}

#[tokio::test]
async fn sysfs_capture_feeds_numa_and_memory() {
    let temp = capture();
    let outcome = service(&temp, MockCommandExecutor::new()).collect_with_diagnostics().await;
    let graph = &outcome.graph;

    assert!(graph.validate().is_ok());
    assert!(outcome.diagnostics.is_empty());

    let root = graph.node(ROOT_ID).unwrap();
    assert_eq!(root.label, "mi250-01");
    assert_eq!(root.property("vendor"), Some("Dell Inc."));
    assert_eq!(root.property("product"), None);

    let memory = graph.node("memory").unwrap();
    assert_eq!(memory.property("total_gb"), Some("251.6"));
    assert_eq!(memory.property("total_source"), Some("meminfo"));

    let numa: Vec<&str> = graph
        .nodes_of_kind(&NodeKind::NumaNode)
        .map(|node| node.id.as_str())
        .collect();
    assert_eq!(numa, vec!["numa:0", "numa:1"]);
    assert_eq!(graph.parent_of("numa:1"), Some(ROOT_ID));
    assert_eq!(graph.node("numa:1").unwrap().property("cpus"), Some("32-63,96-127"));
}

#[tokio::test]
async fn rocm_smi_upgrades_display_controller_in_place() {
    let temp = capture();
    let executor = MockCommandExecutor::new()
        .with_output("lspci -vmm -nn -k", LSPCI_VMM)
        .with_output("lspci -vv", "")
        .with_output(rocm_command(), ROCM_SMI);
    let outcome = service(&temp, executor).collect_with_diagnostics().await;
    let graph = &outcome.graph;

    assert!(graph.validate().is_ok());
    assert!(outcome.diagnostics.is_empty());

    let gpus: Vec<_> = graph.nodes_of_kind(&NodeKind::GpuDevice).collect();
    assert_eq!(gpus.len(), 1);
    assert_eq!(gpus[0].id, "pci:c1:00.0");
    assert_eq!(gpus[0].label, "AMD INSTINCT MI250X");
    assert_eq!(gpus[0].property("vram_mb"), Some("65520"));
    assert_eq!(gpus[0].property("driver"), Some("6.3.6"));
    assert_eq!(gpus[0].property("enriched_by"), Some("rocm-smi"));
    assert_eq!(graph.parent_of("pci:c1:00.0"), Some("bus:pci"));
    assert_eq!(graph.children("bus:pci").len(), 2);
}

#[tokio::test]
async fn missing_capture_is_reported_not_fatal() {
    let temp = assert_fs::TempDir::new().unwrap();
    let outcome = service(&temp, MockCommandExecutor::new()).collect_with_diagnostics().await;

    assert!(outcome.graph.validate().is_ok());
    let ids: Vec<&str> = outcome.graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["root", "memory"]);

    let stages: Vec<&str> = outcome.diagnostics.iter().map(|d| d.stage.as_str()).collect();
    assert_eq!(stages, vec!["numa", "memory"]);
}
