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

//! Normalized hardware graph: nodes, edges and the invariants that tie them together

use crate::domain::GraphError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

/// Id of the node every `contains` edge ultimately hangs from
pub const ROOT_ID: &str = "root";

/// Tool-sourced attributes of a node. Values are always strings so that
/// differing units and formats across tool versions never fail to load.
pub type Properties = BTreeMap<String, String>;

/// Kind of a node. Serialized as an open string set: unknown kinds read from
/// a file survive a round trip through [`NodeKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    System,
    Cpu,
    Bus,
    PciDevice,
    GpuDevice,
    UsbDevice,
    NvmeDevice,
    DiskDevice,
    Dimm,
    Memory,
    NumaNode,
    NetInterface,
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::System => "system",
            NodeKind::Cpu => "cpu",
            NodeKind::Bus => "bus",
            NodeKind::PciDevice => "pci-device",
            NodeKind::GpuDevice => "gpu-device",
            NodeKind::UsbDevice => "usb-device",
            NodeKind::NvmeDevice => "nvme-device",
            NodeKind::DiskDevice => "disk-device",
            NodeKind::Dimm => "dimm",
            NodeKind::Memory => "memory",
            NodeKind::NumaNode => "numa-node",
            NodeKind::NetInterface => "net-interface",
            NodeKind::Other(kind) => kind,
        }
    }

    /// Whether enrichment may move a node of this kind to `target`.
    ///
    /// The only promotion is `pci-device` -> `gpu-device`; a kind is never
    /// demoted or changed sideways.
    pub fn can_become(&self, target: &NodeKind) -> bool {
        self == target || matches!((self, target), (NodeKind::PciDevice, NodeKind::GpuDevice))
    }
}

impl From<String> for NodeKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "system" => NodeKind::System,
            "cpu" => NodeKind::Cpu,
            "bus" => NodeKind::Bus,
            "pci-device" => NodeKind::PciDevice,
            "gpu-device" => NodeKind::GpuDevice,
            "usb-device" => NodeKind::UsbDevice,
            "nvme-device" => NodeKind::NvmeDevice,
            "disk-device" => NodeKind::DiskDevice,
            "dimm" => NodeKind::Dimm,
            "memory" => NodeKind::Memory,
            "numa-node" => NodeKind::NumaNode,
            "net-interface" => NodeKind::NetInterface,
            _ => NodeKind::Other(kind),
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship carried by an edge. Only `contains` is produced today.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeKind {
    Contains,
    Other(String),
}

impl EdgeKind {
    pub fn as_str(&self) -> &str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Other(kind) => kind,
        }
    }
}

impl From<String> for EdgeKind {
    fn from(kind: String) -> Self {
        if kind == "contains" {
            EdgeKind::Contains
        } else {
            EdgeKind::Other(kind)
        }
    }
}

impl From<EdgeKind> for String {
    fn from(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Contains => "contains".to_string(),
            EdgeKind::Other(kind) => kind,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vertex in the hardware graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Namespaced natural key, e.g. `pci:65:00.0` or `dimm:DIMM_A1`
    pub id: String,
    /// Component kind
    pub kind: NodeKind,
    /// Human readable label
    pub label: String,
    /// Tool-sourced attributes
    #[serde(default)]
    pub properties: Properties,
}

impl Node {
    /// Create a node without properties
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            properties: Properties::new(),
        }
    }

    /// Builder-style property setter
    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Builder-style replacement of the whole property map
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A directed relationship between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Derived from the endpoints, see [`edge_id`]
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    /// Free text shown by viewers ("device", "dimm", "numa", "iface", ...)
    pub label: String,
}

impl Edge {
    /// Create a `contains` edge from `source` to `target`
    pub fn contains(source: &str, target: &str, label: &str) -> Self {
        Self {
            id: edge_id(source, target),
            source: source.to_string(),
            target: target.to_string(),
            kind: EdgeKind::Contains,
            label: label.to_string(),
        }
    }
}

/// Deterministic edge id for a source/target pair
pub fn edge_id(source: &str, target: &str) -> String {
    format!("e:{source}->{target}")
}

/// The whole hardware topology of one host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Nodes in assembly order
    pub nodes: Vec<Node>,
    /// Edges in assembly order
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// All nodes of the given kind, in assembly order
    pub fn nodes_of_kind<'a>(&'a self, kind: &'a NodeKind) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |node| &node.kind == kind)
    }

    /// Direct `contains` children of `id`, in assembly order
    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.edges
            .iter()
            .filter(|edge| edge.kind == EdgeKind::Contains && edge.source == id)
            .filter_map(|edge| self.node(&edge.target))
            .collect()
    }

    /// Structural parent of `id` via its `contains` edge
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|edge| edge.kind == EdgeKind::Contains && edge.target == id)
            .map(|edge| edge.source.as_str())
    }

    /// Check every structural invariant of the graph
    ///
    /// * node ids are unique
    /// * every edge references nodes of this graph
    /// * the `contains` edges form a tree rooted at [`ROOT_ID`]
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNodeId(node.id.clone()));
            }
        }

        if !ids.contains(ROOT_ID) {
            return Err(GraphError::MissingRoot);
        }

        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(GraphError::DanglingEdge {
                        edge: edge.id.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }

            if edge.kind != EdgeKind::Contains {
                continue;
            }
            if edge.target == ROOT_ID {
                return Err(GraphError::RootHasParent(edge.source.clone()));
            }
            if parents.insert(&edge.target, &edge.source).is_some() {
                return Err(GraphError::MultipleParents(edge.target.clone()));
            }
            children.entry(&edge.source).or_default().push(&edge.target);
        }

        // With one parent per node and none for the root, anything caught in a
        // cycle is unreachable from the root.
        let mut reached = HashSet::from([ROOT_ID]);
        let mut queue = VecDeque::from([ROOT_ID]);
        while let Some(id) = queue.pop_front() {
            for &child in children.get(id).into_iter().flatten() {
                if reached.insert(child) {
                    queue.push_back(child);
                }
            }
        }

        match self.nodes.iter().find(|node| !reached.contains(node.id.as_str())) {
            Some(orphan) => Err(GraphError::Unreachable(orphan.id.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_graph() -> Graph {
        Graph {
            nodes: vec![
                Node::new(ROOT_ID, NodeKind::System, "host"),
                Node::new("bus:pci", NodeKind::Bus, "PCI Bus"),
                Node::new("pci:00:00.0", NodeKind::PciDevice, "Host bridge"),
            ],
            edges: vec![
                Edge::contains(ROOT_ID, "bus:pci", "contains"),
                Edge::contains("bus:pci", "pci:00:00.0", "device"),
            ],
        }
    }

    #[test]
    fn test_valid_tree() {
        assert_eq!(small_graph().validate(), Ok(()));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut graph = small_graph();
        graph.nodes.push(Node::new("bus:pci", NodeKind::Bus, "again"));
        assert_eq!(
            graph.validate(),
            Err(GraphError::DuplicateNodeId("bus:pci".to_string()))
        );
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let mut graph = small_graph();
        graph.edges.push(Edge::contains("bus:pci", "pci:ff:00.0", "device"));
        assert!(matches!(
            graph.validate(),
            Err(GraphError::DanglingEdge { missing, .. }) if missing == "pci:ff:00.0"
        ));
    }

    #[test]
    fn test_second_parent_rejected() {
        let mut graph = small_graph();
        graph.edges.push(Edge::contains(ROOT_ID, "pci:00:00.0", "contains"));
        assert_eq!(
            graph.validate(),
            Err(GraphError::MultipleParents("pci:00:00.0".to_string()))
        );
    }

    #[test]
    fn test_orphan_and_cycle_rejected() {
        let mut graph = small_graph();
        graph.nodes.push(Node::new("a", NodeKind::Bus, "a"));
        graph.nodes.push(Node::new("b", NodeKind::Bus, "b"));
        graph.edges.push(Edge::contains("a", "b", "contains"));
        graph.edges.push(Edge::contains("b", "a", "contains"));
        assert!(matches!(graph.validate(), Err(GraphError::Unreachable(_))));
    }

    #[test]
    fn test_missing_root() {
        let graph = Graph {
            nodes: vec![Node::new("cpu:0", NodeKind::Cpu, "CPU")],
            edges: vec![],
        };
        assert_eq!(graph.validate(), Err(GraphError::MissingRoot));
    }

    #[test]
    fn test_kind_promotion_rules() {
        assert!(NodeKind::PciDevice.can_become(&NodeKind::GpuDevice));
        assert!(NodeKind::GpuDevice.can_become(&NodeKind::GpuDevice));
        assert!(!NodeKind::GpuDevice.can_become(&NodeKind::PciDevice));
        assert!(!NodeKind::UsbDevice.can_become(&NodeKind::GpuDevice));
    }

    #[test]
    fn test_serialized_field_order() {
        let node = Node::new("cpu:0", NodeKind::Cpu, "Xeon").with_property("sockets", "2");
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(
            json,
            r#"{"id":"cpu:0","kind":"cpu","label":"Xeon","properties":{"sockets":"2"}}"#
        );

        let edge = Edge::contains(ROOT_ID, "cpu:0", "contains");
        let json = serde_json::to_string(&edge).unwrap();
        assert_eq!(
            json,
            r#"{"id":"e:root->cpu:0","source":"root","target":"cpu:0","kind":"contains","label":"contains"}"#
        );
    }

    #[test]
    fn test_unknown_kind_round_trips() {
        let node: Node =
            serde_json::from_str(r#"{"id":"x","kind":"fpga-device","label":"x"}"#).unwrap();
        assert_eq!(node.kind, NodeKind::Other("fpga-device".to_string()));
        assert!(node.properties.is_empty());
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains(r#""kind":"fpga-device""#));
    }

    #[test]
    fn test_children_and_parent() {
        let graph = small_graph();
        let children = graph.children("bus:pci");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "pci:00:00.0");
        assert_eq!(graph.parent_of("pci:00:00.0"), Some("bus:pci"));
        assert_eq!(graph.parent_of(ROOT_ID), None);
    }
}
