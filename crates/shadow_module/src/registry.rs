//! Module descriptor registry
//!
//! Append-only catalog of every module the engine knows how to build.
//! Descriptors arrive in batches, one per assembly, and keep their
//! registration order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use shadow_core::PathId;

use crate::descriptor::ModuleDescriptor;
use crate::error::RegistryError;

/// Registry of module descriptors
#[derive(Default)]
pub struct ModuleRegistry {
    descriptors: Vec<Arc<ModuleDescriptor>>,
    index: HashMap<String, usize>,
    by_assembly: HashMap<String, Vec<String>>,
    scanned: HashSet<String>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the descriptors contributed by one assembly
    ///
    /// Descriptors with an empty `assembly` field are attributed to
    /// `assembly_id`. The batch is applied atomically: if any descriptor is
    /// rejected, none are added.
    pub fn register_assembly(
        &mut self,
        assembly_id: &str,
        descriptors: impl IntoIterator<Item = ModuleDescriptor>,
    ) -> Result<usize, RegistryError> {
        let assembly_id = PathId::parse(assembly_id)?.to_string();

        let mut batch: Vec<ModuleDescriptor> = Vec::new();
        for mut descriptor in descriptors {
            if descriptor.assembly.is_empty() {
                descriptor.assembly = assembly_id.clone();
            }
            let descriptor = descriptor.normalized()?;

            if descriptor.requires(&descriptor.id) {
                return Err(RegistryError::SelfDependency(descriptor.id));
            }
            if self.index.contains_key(&descriptor.id) || batch.iter().any(|d| d.id == descriptor.id) {
                log::warn!("Module '{}' registered twice, keeping the first", descriptor.id);
                return Err(RegistryError::DuplicateModule(descriptor.id));
            }
            batch.push(descriptor);
        }

        let count = batch.len();
        for descriptor in batch {
            log::debug!(
                "Registered module '{}' ({}) from {}",
                descriptor.id,
                descriptor.class_name,
                descriptor.assembly
            );
            self.by_assembly
                .entry(descriptor.assembly.clone())
                .or_default()
                .push(descriptor.id.clone());
            self.index.insert(descriptor.id.clone(), self.descriptors.len());
            self.descriptors.push(Arc::new(descriptor));
        }
        Ok(count)
    }

    /// Register a single descriptor whose `assembly` is already set
    pub fn add_descriptor(&mut self, descriptor: ModuleDescriptor) -> Result<(), RegistryError> {
        let assembly = descriptor.assembly.clone();
        if assembly.is_empty() {
            return Err(RegistryError::MalformedDescriptor {
                assembly,
                reason: format!("module '{}' names no assembly", descriptor.id),
            });
        }
        self.register_assembly(&assembly, std::iter::once(descriptor)).map(|_| ())
    }

    /// Look up a descriptor; the id is normalized first
    pub fn get(&self, id: &str) -> Result<Arc<ModuleDescriptor>, RegistryError> {
        self.find(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Look up a descriptor without an error
    pub fn find(&self, id: &str) -> Option<Arc<ModuleDescriptor>> {
        let index = match self.index.get(id) {
            Some(index) => *index,
            None => {
                let normalized = PathId::parse(id).ok()?;
                *self.index.get(normalized.as_str())?
            }
        };
        self.descriptors.get(index).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// All descriptors in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.descriptors.iter()
    }

    /// Descriptors contributed by an assembly
    pub fn descriptors_of(&self, assembly_id: &str) -> Vec<Arc<ModuleDescriptor>> {
        self.by_assembly
            .get(assembly_id)
            .map(|ids| ids.iter().filter_map(|id| self.find(id)).collect())
            .unwrap_or_default()
    }

    /// Record that an assembly's registration entry point has run
    pub fn mark_scanned(&mut self, assembly_id: &str) {
        self.scanned.insert(assembly_id.to_string());
    }

    pub fn is_scanned(&self, assembly_id: &str) -> bool {
        self.scanned.contains(assembly_id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_modules() -> Vec<ModuleDescriptor> {
        vec![
            ModuleDescriptor::new("module:/core", "Core", "CoreModule"),
            ModuleDescriptor::new("module:/platform/sdl2", "SDL2", "Sdl2Module").depends_on("module:/core"),
        ]
    }

    #[test]
    fn test_register_fills_assembly() {
        let mut registry = ModuleRegistry::new();
        assert_eq!(registry.register_assembly("assembly:/core", core_modules()).unwrap(), 2);

        let sdl2 = registry.get("module:/platform/sdl2").unwrap();
        assert_eq!(sdl2.assembly, "assembly:/core");
        assert_eq!(registry.descriptors_of("assembly:/core").len(), 2);
    }

    #[test]
    fn test_duplicate_is_rejected_atomically() {
        let mut registry = ModuleRegistry::new();
        registry.register_assembly("assembly:/core", core_modules()).unwrap();

        let err = registry
            .register_assembly(
                "assembly:/other",
                vec![
                    ModuleDescriptor::new("module:/fresh", "Fresh", "FreshModule"),
                    ModuleDescriptor::new("module:/core", "Core again", "CoreModule"),
                ],
            )
            .unwrap_err();

        assert_eq!(err, RegistryError::DuplicateModule("module:/core".into()));
        assert!(!registry.contains("module:/fresh"));
        assert_eq!(registry.get("module:/core").unwrap().name, "Core");
    }

    #[test]
    fn test_duplicate_within_batch() {
        let mut registry = ModuleRegistry::new();
        let err = registry
            .register_assembly(
                "assembly:/a",
                vec![
                    ModuleDescriptor::new("module:/x", "X", "X"),
                    ModuleDescriptor::new("module:\\x", "X", "X"),
                ],
            )
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateModule("module:/x".into()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_self_dependency() {
        let mut registry = ModuleRegistry::new();
        let err = registry
            .register_assembly(
                "assembly:/a",
                vec![ModuleDescriptor::new("module:/x", "X", "X").depends_on("module:/x")],
            )
            .unwrap_err();
        assert_eq!(err, RegistryError::SelfDependency("module:/x".into()));
    }

    #[test]
    fn test_get_unknown_and_normalized_lookup() {
        let mut registry = ModuleRegistry::new();
        registry.register_assembly("assembly:/core", core_modules()).unwrap();

        assert!(registry.get("module:\\platform\\sdl2").is_ok());
        assert_eq!(
            registry.get("module:/nope").unwrap_err(),
            RegistryError::NotFound("module:/nope".into())
        );
    }

    #[test]
    fn test_add_descriptor_requires_assembly() {
        let mut registry = ModuleRegistry::new();
        let err = registry
            .add_descriptor(ModuleDescriptor::new("module:/x", "X", "X"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::MalformedDescriptor { .. }));

        registry
            .add_descriptor(ModuleDescriptor::new("module:/x", "X", "X").in_assembly("assembly:/a"))
            .unwrap();
        assert_eq!(registry.len(), 1);
    }
}
