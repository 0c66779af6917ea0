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

use super::{apply_gpu_enrichments, GraphBuilder};
use crate::domain::parsers::{
    meaningful, nvidia_smi_query_arg, parse_cpulist, parse_dmidecode_base_mhz,
    parse_dmidecode_memory, parse_ethtool_driver_info, parse_ethtool_link, parse_ip_brief_link,
    parse_lscpu_json, parse_lsblk_json, parse_lspci_links, parse_lspci_vmm, parse_lsusb,
    parse_meminfo_total_gb, parse_numa_node_dir, parse_nvidia_smi_csv, parse_nvme_list_json,
    parse_rocm_smi_json,
};
use crate::domain::{
    CollectionError, CollectionOutcome, Diagnostic, GpuEnrichment, Graph, MemorySummary, Node,
    NodeKind, NumaNodeInfo, PciDevice, StorageDevice, ROOT_ID,
};
use crate::ports::{
    run_text, CommandExecutor, HostIdentityProvider, SystemCommand, SystemFiles, TopologyService,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

/// Every external tool a collection may run, in stage order
pub const DIAGNOSTIC_TOOLS: &[&str] = &[
    "lscpu",
    "dmidecode",
    "lspci",
    "nvidia-smi",
    "rocm-smi",
    "lsusb",
    "nvme",
    "lsblk",
    "ip",
    "ethtool",
];

const NUMA_SYSFS_DIR: &str = "/sys/devices/system/node";
const MEMINFO_PATH: &str = "/proc/meminfo";
const DMI_ID_DIR: &str = "/sys/class/dmi/id";

/// Domain service that assembles the hardware graph of a Linux host
///
/// Stages run one after another in a fixed order: root, CPU (+ NUMA), memory
/// (+ DIMMs), PCI (+ GPU enrichment), USB, storage, network. Each stage is
/// gated on its own tools only, so a missing tool never suppresses another
/// stage. Every error is absorbed at the stage boundary and kept as a
/// [`Diagnostic`].
pub struct TopologyCollectionService {
    /// Runs the diagnostic tools
    executor: Arc<dyn CommandExecutor>,
    /// Reads `/sys` and `/proc`
    files: Arc<dyn SystemFiles>,
    /// Hostname and OS details for the root node
    host: Arc<dyn HostIdentityProvider>,
}

impl TopologyCollectionService {
    /// Create a new topology collection service
    ///
    /// # Arguments
    /// * `executor` - Command executor for the diagnostic tools
    /// * `files` - Pseudo-filesystem reader
    /// * `host` - Host identity provider
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        files: Arc<dyn SystemFiles>,
        host: Arc<dyn HostIdentityProvider>,
    ) -> Self {
        Self {
            executor,
            files,
            host,
        }
    }

    async fn available(&self, tool: &str) -> bool {
        let available = self.executor.is_command_available(tool).await;
        if !available {
            debug!("{tool} not found on PATH, skipping");
        }
        available
    }

    /// Standard output of `command`, or `None` with a diagnostic recorded
    async fn run_tool(
        &self,
        stage: &str,
        command: SystemCommand,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<String> {
        match run_text(self.executor.as_ref(), &command).await {
            Ok(output) => Some(output),
            Err(e) => {
                record(diagnostics, stage, &command.program, e);
                None
            }
        }
    }

    async fn read_file(
        &self,
        stage: &str,
        path: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<String> {
        match self.files.read_to_string(path).await {
            Ok(content) => Some(content),
            Err(e) => {
                record(diagnostics, stage, path, e);
                None
            }
        }
    }

    async fn root_node(&self) -> Node {
        let hostname = self
            .host
            .hostname()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "Linux".to_string());
        let mut root = Node::new(ROOT_ID, NodeKind::System, hostname);

        for (key, value) in [
            ("os", self.host.os_description()),
            ("kernel", self.host.kernel_version()),
            ("arch", self.host.architecture()),
        ] {
            if let Some(value) = value.as_deref().and_then(meaningful) {
                root.properties.insert(key.to_string(), value);
            }
        }

        // DMI identity is often root-only or absent in VMs; its absence is not
        // worth a diagnostic
        for (key, file) in [("vendor", "sys_vendor"), ("product", "product_name")] {
            match self.files.read_to_string(&format!("{DMI_ID_DIR}/{file}")).await {
                Ok(value) => {
                    if let Some(value) = meaningful(&value) {
                        root.properties.insert(key.to_string(), value);
                    }
                }
                Err(e) => debug!("No DMI {file}: {e}"),
            }
        }

        root
    }

    /// CPU node from lscpu, completed with the dmidecode base frequency
    async fn add_cpu(
        &self,
        graph: &mut GraphBuilder,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<String> {
        debug!("Collecting CPU");
        if !self.available("lscpu").await {
            return None;
        }

        let output = self
            .run_tool("cpu", SystemCommand::new("lscpu").args(&["-J"]), diagnostics)
            .await?;
        let mut cpu = match parse_lscpu_json(&output) {
            Ok(cpu) => cpu?,
            Err(e) => {
                record(diagnostics, "cpu", "lscpu", e);
                return None;
            }
        };

        if self.available("dmidecode").await {
            let command = SystemCommand::new("dmidecode").args(&["-t", "processor"]);
            if let Some(output) = self.run_tool("cpu", command, diagnostics).await {
                if let Some(mhz) = parse_dmidecode_base_mhz(&output) {
                    cpu.properties.insert("base_mhz".to_string(), mhz);
                }
            }
        }

        Some(graph.add_child(ROOT_ID, cpu.to_node(0), "contains"))
    }

    /// NUMA nodes from sysfs, sorted by node number
    async fn add_numa(
        &self,
        graph: &mut GraphBuilder,
        parent: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        debug!("Collecting NUMA topology");
        let entries = match self.files.list_dir(NUMA_SYSFS_DIR).await {
            Ok(entries) => entries,
            Err(e) => {
                record(diagnostics, "numa", NUMA_SYSFS_DIR, e);
                return;
            }
        };

        let mut ids: Vec<u32> = entries
            .iter()
            .filter_map(|name| parse_numa_node_dir(name))
            .collect();
        ids.sort_unstable();

        for id in ids {
            let dir = format!("{NUMA_SYSFS_DIR}/node{id}");
            let cpus = self
                .read_file("numa", &format!("{dir}/cpulist"), diagnostics)
                .await
                .and_then(|content| parse_cpulist(&content));
            let memory_gb = self
                .read_file("numa", &format!("{dir}/meminfo"), diagnostics)
                .await
                .and_then(|content| parse_meminfo_total_gb(&content));

            let numa = NumaNodeInfo { id, cpus, memory_gb };
            graph.add_child(parent, numa.to_node(), "numa");
        }
    }

    /// Memory summary and DIMMs; the summary node is always present
    async fn add_memory(&self, graph: &mut GraphBuilder, diagnostics: &mut Vec<Diagnostic>) {
        debug!("Collecting memory");
        let modules = if self.available("dmidecode").await {
            let command = SystemCommand::new("dmidecode").args(&["-t", "memory"]);
            self.run_tool("memory", command, diagnostics)
                .await
                .map(|output| parse_dmidecode_memory(&output))
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let meminfo_total = if modules.is_empty() {
            self.read_file("memory", MEMINFO_PATH, diagnostics)
                .await
                .and_then(|content| parse_meminfo_total_gb(&content))
        } else {
            None
        };

        let summary = MemorySummary::from_sources(&modules, meminfo_total);
        let memory = graph.add_child(ROOT_ID, summary.to_node(), "contains");
        for (index, module) in modules.iter().enumerate() {
            graph.add_child(&memory, module.to_node(index), "dimm");
        }
    }

    /// PCI bus with link state and GPU vendor data merged in before any
    /// device node is created
    async fn add_pci(&self, graph: &mut GraphBuilder, diagnostics: &mut Vec<Diagnostic>) {
        debug!("Collecting PCI devices");
        if !self.available("lspci").await {
            return;
        }
        let bus = graph.add_child(
            ROOT_ID,
            Node::new("bus:pci", NodeKind::Bus, "PCI Bus"),
            "contains",
        );

        let command = SystemCommand::new("lspci").args(&["-vmm", "-nn", "-k"]);
        let mut devices = self
            .run_tool("pci", command, diagnostics)
            .await
            .map(|output| parse_lspci_vmm(&output))
            .unwrap_or_default();

        let command = SystemCommand::new("lspci").args(&["-vv"]);
        if let Some(output) = self.run_tool("pci", command, diagnostics).await {
            let links = parse_lspci_links(&output);
            for device in &mut devices {
                if let Some(link) = links.get(&device.slot) {
                    link.apply_to(&mut device.properties);
                }
            }
        }

        self.enrich_gpus(&mut devices, diagnostics).await;

        for device in &devices {
            graph.add_child(&bus, device.to_node(), "device");
        }
    }

    async fn enrich_gpus(&self, devices: &mut [PciDevice], diagnostics: &mut Vec<Diagnostic>) {
        if self.available("nvidia-smi").await {
            let query = nvidia_smi_query_arg();
            let command = SystemCommand::new("nvidia-smi")
                .args(&[query.as_str(), "--format=csv,noheader,nounits"]);
            if let Some(output) = self.run_tool("gpu", command, diagnostics).await {
                let patches = parse_nvidia_smi_csv(&output);
                apply_patches("nvidia-smi", devices, &patches, diagnostics);
            }
        }

        if self.available("rocm-smi").await {
            let command = SystemCommand::new("rocm-smi").args(&[
                "--showproductname",
                "--showbus",
                "--showmeminfo",
                "vram",
                "--showtemp",
                "--showpower",
                "--showmaxpower",
                "--showuse",
                "--showdriverversion",
                "--json",
            ]);
            if let Some(output) = self.run_tool("gpu", command, diagnostics).await {
                match parse_rocm_smi_json(&output) {
                    Ok(patches) => apply_patches("rocm-smi", devices, &patches, diagnostics),
                    Err(e) => record(diagnostics, "gpu", "rocm-smi", e),
                }
            }
        }
    }

    async fn add_usb(&self, graph: &mut GraphBuilder, diagnostics: &mut Vec<Diagnostic>) {
        debug!("Collecting USB devices");
        if !self.available("lsusb").await {
            return;
        }
        let bus = graph.add_child(
            ROOT_ID,
            Node::new("bus:usb", NodeKind::Bus, "USB Bus"),
            "contains",
        );

        if let Some(output) = self.run_tool("usb", SystemCommand::new("lsusb"), diagnostics).await {
            for device in parse_lsusb(&output) {
                graph.add_child(&bus, device.to_node(), "device");
            }
        }
    }

    /// NVMe namespaces first, then the remaining block devices
    async fn add_storage(&self, graph: &mut GraphBuilder, diagnostics: &mut Vec<Diagnostic>) {
        debug!("Collecting storage");
        let nvme = self.available("nvme").await;
        let lsblk = self.available("lsblk").await;
        if !nvme && !lsblk {
            return;
        }
        let bus = graph.add_child(
            ROOT_ID,
            Node::new("bus:storage", NodeKind::Bus, "Storage"),
            "contains",
        );

        let mut devices: Vec<StorageDevice> = Vec::new();
        if nvme {
            let command = SystemCommand::new("nvme").args(&["list", "-o", "json"]);
            if let Some(output) = self.run_tool("storage", command, diagnostics).await {
                match parse_nvme_list_json(&output) {
                    Ok(found) => devices.extend(found),
                    Err(e) => record(diagnostics, "storage", "nvme", e),
                }
            }
        }
        if lsblk {
            let command = SystemCommand::new("lsblk").args(&[
                "-J",
                "-b",
                "-d",
                "-o",
                "NAME,TYPE,SIZE,MODEL,SERIAL,ROTA,TRAN,VENDOR",
            ]);
            if let Some(output) = self.run_tool("storage", command, diagnostics).await {
                match parse_lsblk_json(&output) {
                    Ok(found) => devices.extend(found),
                    Err(e) => record(diagnostics, "storage", "lsblk", e),
                }
            }
        }

        for device in &devices {
            graph.add_child(&bus, device.to_node(), "device");
        }
    }

    /// Interfaces from `ip`, each completed with ethtool driver and link data
    async fn add_network(&self, graph: &mut GraphBuilder, diagnostics: &mut Vec<Diagnostic>) {
        debug!("Collecting network interfaces");
        if !self.available("ip").await {
            return;
        }
        let bus = graph.add_child(
            ROOT_ID,
            Node::new("bus:net", NodeKind::Bus, "Network"),
            "contains",
        );

        let command = SystemCommand::new("ip").args(&["-brief", "link"]);
        let Some(output) = self.run_tool("network", command, diagnostics).await else {
            return;
        };
        let mut interfaces = parse_ip_brief_link(&output);

        if self.available("ethtool").await {
            // ethtool has nothing to say about loopback
            for iface in interfaces.iter_mut().filter(|iface| iface.name != "lo") {
                let command = SystemCommand::new("ethtool").args(&["-i", iface.name.as_str()]);
                if let Some(output) = self.run_tool("network", command, diagnostics).await {
                    iface.properties.extend(parse_ethtool_driver_info(&output));
                }
                let command = SystemCommand::new("ethtool").args(&[iface.name.as_str()]);
                if let Some(output) = self.run_tool("network", command, diagnostics).await {
                    iface.properties.extend(parse_ethtool_link(&output));
                }
            }
        }

        for iface in &interfaces {
            graph.add_child(&bus, iface.to_node(), "iface");
        }
    }
}

#[async_trait]
impl TopologyService for TopologyCollectionService {
    async fn collect_graph(&self) -> Graph {
        self.collect_with_diagnostics().await.graph
    }

    async fn collect_with_diagnostics(&self) -> CollectionOutcome {
        let mut diagnostics = Vec::new();
        let mut graph = GraphBuilder::new(self.root_node().await);

        let cpu = self.add_cpu(&mut graph, &mut diagnostics).await;
        self.add_numa(&mut graph, cpu.as_deref().unwrap_or(ROOT_ID), &mut diagnostics)
            .await;
        self.add_memory(&mut graph, &mut diagnostics).await;
        self.add_pci(&mut graph, &mut diagnostics).await;
        self.add_usb(&mut graph, &mut diagnostics).await;
        self.add_storage(&mut graph, &mut diagnostics).await;
        self.add_network(&mut graph, &mut diagnostics).await;

        let graph = graph.finish();
        info!(
            "Collected {} nodes and {} edges ({} diagnostics)",
            graph.nodes.len(),
            graph.edges.len(),
            diagnostics.len()
        );
        CollectionOutcome { graph, diagnostics }
    }
}

fn record(
    diagnostics: &mut Vec<Diagnostic>,
    stage: &str,
    tool: &str,
    error: impl Into<CollectionError>,
) {
    let error = error.into();
    warn!("{stage}: {error}");
    diagnostics.push(Diagnostic::new(stage, tool, &error));
}

fn apply_patches(
    tool: &str,
    devices: &mut [PciDevice],
    patches: &[GpuEnrichment],
    diagnostics: &mut Vec<Diagnostic>,
) {
    for bus_id in apply_gpu_enrichments(devices, patches) {
        record(diagnostics, "gpu", tool, CollectionError::UnmatchedBusAddress(bus_id));
    }
}
