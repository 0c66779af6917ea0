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

use crate::domain::{CollectionOutcome, Graph};
use async_trait::async_trait;

/// Primary port - Main interface offered by the topology domain
///
/// This is what external systems (CLI, library consumers) use to obtain the
/// hardware graph of the current host.
#[async_trait]
pub trait TopologyService: Send + Sync {
    /// Collect the hardware graph of the current host
    ///
    /// Never fails: unavailable or misbehaving tools only make the graph
    /// smaller.
    async fn collect_graph(&self) -> Graph;

    /// Collect the graph together with every error that was absorbed
    async fn collect_with_diagnostics(&self) -> CollectionOutcome;
}
