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

//! Incremental graph construction with one parent edge per node

use crate::domain::{Edge, Graph, Node, ROOT_ID};
use log::warn;
use std::collections::HashSet;

/// Owns a graph under construction and keeps it a tree
///
/// Every node added after the root gets exactly one `contains` edge from its
/// parent. Ids that collide with an existing node get a `#2`, `#3`, ...
/// suffix in insertion order, so reruns on the same host produce the same ids.
#[derive(Debug)]
pub struct GraphBuilder {
    graph: Graph,
    ids: HashSet<String>,
}

impl GraphBuilder {
    /// Start a graph from its root node; the root id is always [`ROOT_ID`]
    pub fn new(mut root: Node) -> Self {
        root.id = ROOT_ID.to_string();
        Self {
            ids: HashSet::from([root.id.clone()]),
            graph: Graph {
                nodes: vec![root],
                edges: Vec::new(),
            },
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Add `node` under `parent` and return the id it was stored under
    ///
    /// An unknown parent falls back to the root so the tree stays connected.
    pub fn add_child(&mut self, parent: &str, mut node: Node, label: &str) -> String {
        let parent = if self.contains(parent) {
            parent.to_string()
        } else {
            warn!("Parent {parent} of {} does not exist, attaching to root", node.id);
            ROOT_ID.to_string()
        };

        node.id = self.unique_id(&node.id);
        self.ids.insert(node.id.clone());
        self.graph.edges.push(Edge::contains(&parent, &node.id, label));
        let id = node.id.clone();
        self.graph.nodes.push(node);
        id
    }

    pub fn node_count(&self) -> usize {
        self.graph.nodes.len()
    }

    pub fn finish(self) -> Graph {
        self.graph
    }

    fn unique_id(&self, id: &str) -> String {
        if !self.contains(id) {
            return id.to_string();
        }
        (2..)
            .map(|n| format!("{id}#{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| id.to_string())
    }
}
