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

//! TopoScope Library
//!
//! This library inventories the hardware topology of a Linux host by running
//! the standard diagnostic tools (lscpu, lspci, lsusb, dmidecode, nvme, lsblk,
//! ip, ethtool, nvidia-smi, rocm-smi), parsing their output, and normalizing
//! everything into one tree of typed nodes and `contains` edges. It uses a
//! Ports and Adapters (Hexagonal) architecture for maintainability and
//! testability.
//!
//! # Architecture
//!
//! - **Domain**: Graph model, tool parsers and the collection service
//! - **Ports**: Interfaces for external interactions
//! - **Adapters**: Process execution, `/sys` access, host identity, files
//!
//! # Usage
//!
//! ```rust,no_run
//! use toposcope::{ContainerConfig, ServiceContainer, TopologyService};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let container = ServiceContainer::new(ContainerConfig::default());
//!     let outcome = container.create_topology_service().collect_with_diagnostics().await;
//!
//!     for diagnostic in &outcome.diagnostics {
//!         eprintln!("{}: {}", diagnostic.stage, diagnostic.message);
//!     }
//!     outcome.graph.validate()?;
//!     println!("{}", serde_json::to_string_pretty(&outcome.graph)?);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod container;
pub mod domain;
pub mod ports;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapters::{FileGraphRepository, SysfsReader, SysinfoHostIdentity, UnixCommandExecutor};
pub use container::{ContainerConfig, ContainerConfigBuilder, ServiceContainer};
pub use domain::{
    generate_demo_graph, CollectionError, CollectionOutcome, CommandError, ConfigError, Diagnostic,
    Edge, EdgeKind, Graph, GraphBuilder, GraphError, Node, NodeKind, ParseError, Properties,
    PublishError, SystemError, TopologyCollectionService, ROOT_ID,
};
pub use ports::{
    CommandExecutor, GraphRepository, HostIdentityProvider, SystemCommand, SystemFiles,
    TopologyService,
};
