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
use predicates::prelude::*;
use toposcope::{
    generate_demo_graph, Edge, FileGraphRepository, GraphError, GraphRepository, Node, NodeKind,
};

#[tokio::test]
async fn demo_graph_json_keeps_field_order() {
    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("out/graph.json");
    let repository = FileGraphRepository::new();

    repository.save_json(&generate_demo_graph(), out.path()).await.unwrap();

    out.assert(predicate::path::exists());
    out.assert(
        predicate::str::is_match(
            r#"\{\s*"id": "root",\s*"kind": "system",\s*"label": "Demo System",\s*"properties": \{"#,
        )
        .unwrap(),
    );
    out.assert(
        predicate::str::is_match(
            r#"\{\s*"id": "e:root->cpu:0",\s*"source": "root",\s*"target": "cpu:0",\s*"kind": "contains",\s*"label": "contains"\s*\}"#,
        )
        .unwrap(),
    );
    out.assert(predicate::str::contains("\"kind\": \"gpu-device\""));
    temp.close().unwrap();
}

#[tokio::test]
async fn demo_graph_round_trips_through_both_formats() {
    let temp = assert_fs::TempDir::new().unwrap();
    let repository = FileGraphRepository::new();
    let graph = generate_demo_graph();

    let json = temp.child("graph.json");
    repository.save_json(&graph, json.path()).await.unwrap();
    assert_eq!(repository.load_json(json.path()).await.unwrap(), graph);

    let toml = temp.child("graph.toml");
    repository.save_toml(&graph, toml.path()).await.unwrap();
    toml.assert(predicate::str::contains("[[nodes]]"));
    assert_eq!(repository.load_toml(toml.path()).await.unwrap(), graph);
}

#[tokio::test]
async fn loaded_graph_with_broken_tree_fails_validation() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("broken.json");
    file.write_str(
        r#"{
  "nodes": [
    {"id": "root", "kind": "system", "label": "host", "properties": {}},
    {"id": "fpga:0", "kind": "fpga", "label": "Alveo U250"}
  ],
  "edges": [
    {"id": "e:root->missing", "source": "root", "target": "missing", "kind": "contains", "label": "device"}
  ]
}"#,
    )
    .unwrap();

    let graph = FileGraphRepository::new().load_json(file.path()).await.unwrap();
    // Unknown kinds and missing property maps still load
    assert_eq!(graph.nodes[1].kind, NodeKind::Other("fpga".to_string()));
    assert!(graph.nodes[1].properties.is_empty());
    assert_eq!(
        graph.validate(),
        Err(GraphError::DanglingEdge {
            edge: "e:root->missing".to_string(),
            missing: "missing".to_string(),
        })
    );
}

#[test]
fn demo_graph_is_independent_of_environment() {
    let first = generate_demo_graph();
    std::env::set_var("PATH", "");
    let second = generate_demo_graph();
    assert_eq!(first, second);
    assert!(first.validate().is_ok());
}

#[test]
fn hand_built_orphan_is_unreachable() {
    let mut graph = generate_demo_graph();
    graph.nodes.push(Node::new("usb:009-001", NodeKind::UsbDevice, "stray"));
    assert_eq!(
        graph.validate(),
        Err(GraphError::Unreachable("usb:009-001".to_string()))
    );

    graph.edges.push(Edge::contains("bus:usb", "usb:009-001", "device"));
    assert!(graph.validate().is_ok());
}
