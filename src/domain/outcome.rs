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

//! Collection results with the errors that were folded away

use super::{CollectionError, Graph};
use serde::{Deserialize, Serialize};

/// One error a collection stage absorbed instead of failing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stage that recorded it, e.g. `pci`
    pub stage: String,
    /// Tool or pseudo-file involved
    pub tool: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: &str, tool: &str, error: &CollectionError) -> Self {
        Self {
            stage: stage.to_string(),
            tool: tool.to_string(),
            message: error.to_string(),
        }
    }
}

/// A collected graph plus everything that went wrong while building it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub graph: Graph,
    pub diagnostics: Vec<Diagnostic>,
}
