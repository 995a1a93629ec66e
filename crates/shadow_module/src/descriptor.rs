//! Module descriptors
//!
//! A descriptor is the declarative half of a module: which class to build,
//! which assembly builds it, and which modules have to be active first.

use serde::{Deserialize, Serialize};
use shadow_core::{CoreError, PathId};

/// Metadata about a module, known before any instance exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Logical id of the module, e.g. `module:/renderer/vulkan`
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Class the owning assembly constructs for this module
    pub class_name: String,
    /// Assembly this module is from, e.g. `assembly:/core`
    #[serde(default)]
    pub assembly: String,
    /// Modules that must be active before this one
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ModuleDescriptor {
    /// Create a descriptor without dependencies. The assembly is filled in
    /// when the descriptor is registered on behalf of one.
    pub fn new(id: impl Into<String>, name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            class_name: class_name.into(),
            assembly: String::new(),
            dependencies: Vec::new(),
        }
    }

    /// Add a dependency
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Set the owning assembly
    pub fn in_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = assembly.into();
        self
    }

    /// Check whether `id` is one of the direct dependencies
    pub fn requires(&self, id: &str) -> bool {
        self.dependencies.iter().any(|d| d == id)
    }

    /// Normalize every id in the descriptor and drop repeated dependencies,
    /// keeping the first occurrence.
    pub fn normalized(self) -> Result<Self, CoreError> {
        let id = PathId::parse(&self.id)?.to_string();
        let assembly = if self.assembly.is_empty() {
            String::new()
        } else {
            PathId::parse(&self.assembly)?.to_string()
        };

        let mut dependencies: Vec<String> = Vec::with_capacity(self.dependencies.len());
        for dependency in &self.dependencies {
            let dependency = PathId::parse(dependency)?.to_string();
            if !dependencies.contains(&dependency) {
                dependencies.push(dependency);
            }
        }

        Ok(Self {
            id,
            name: self.name,
            class_name: self.class_name,
            assembly,
            dependencies,
        })
    }
}
