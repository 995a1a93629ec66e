//! Dependency resolution
//!
//! Depth-first walk from the requested module with three-color marking.
//! Descriptors are emitted post-order, so every module comes after all of
//! its transitive dependencies and the requested module comes last.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::ModuleDescriptor;
use crate::error::ResolutionError;
use crate::registry::ModuleRegistry;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

struct Walk<'a> {
    registry: &'a ModuleRegistry,
    marks: HashMap<String, Mark>,
    stack: Vec<String>,
    order: Vec<Arc<ModuleDescriptor>>,
}

impl Walk<'_> {
    fn visit(&mut self, descriptor: Arc<ModuleDescriptor>) -> Result<(), ResolutionError> {
        match self.marks.get(&descriptor.id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = self.stack.iter().position(|id| *id == descriptor.id).unwrap_or(0);
                let mut path: Vec<String> = self.stack[start..].to_vec();
                path.push(descriptor.id.clone());
                return Err(ResolutionError::CyclicDependency { path });
            }
            None => {}
        }

        self.marks.insert(descriptor.id.clone(), Mark::InProgress);
        self.stack.push(descriptor.id.clone());

        for dependency in &descriptor.dependencies {
            let next = self.registry.find(dependency).ok_or_else(|| ResolutionError::MissingDependency {
                missing: dependency.clone(),
                required_by: descriptor.id.clone(),
            })?;
            self.visit(next)?;
        }

        self.stack.pop();
        self.marks.insert(descriptor.id.clone(), Mark::Done);
        self.order.push(descriptor);
        Ok(())
    }
}

/// Compute the activation order for `root`
///
/// The result is deterministic for a given registry: dependencies are walked
/// in the order their descriptor lists them.
pub fn resolve(registry: &ModuleRegistry, root: &str) -> Result<Vec<Arc<ModuleDescriptor>>, ResolutionError> {
    let descriptor = registry
        .find(root)
        .ok_or_else(|| ResolutionError::UnknownModule(root.to_string()))?;

    let mut walk = Walk {
        registry,
        marks: HashMap::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };
    walk.visit(descriptor)?;

    log::debug!(
        "Resolved '{}': [{}]",
        root,
        walk.order.iter().map(|d| d.id.as_str()).collect::<Vec<_>>().join(", ")
    );
    Ok(walk.order)
}
