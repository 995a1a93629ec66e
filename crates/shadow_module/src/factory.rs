//! Module instance factory

use std::sync::Arc;

use crate::assembly::{AssemblyCache, AssemblyCatalog};
use crate::descriptor::ModuleDescriptor;
use crate::error::InstantiationError;
use crate::instance::ModuleInstance;

/// Build a live instance for `descriptor`
///
/// Loads the owning assembly if needed and takes a module reference on it.
/// On failure the reference is given back, which may unload the assembly
/// again.
pub fn instantiate(
    descriptor: &Arc<ModuleDescriptor>,
    domain: &str,
    catalog: &AssemblyCatalog,
    cache: &mut AssemblyCache,
) -> Result<ModuleInstance, InstantiationError> {
    let handle = cache.load(catalog, &descriptor.assembly)?;
    cache.acquire(handle);

    let constructed = match cache.get(handle) {
        Some(assembly) => assembly.construct(descriptor),
        None => Err(InstantiationError::UnknownAssembly(descriptor.assembly.clone())),
    };

    match constructed {
        Ok(module) => {
            log::info!("Constructed module '{}' ({})", descriptor.id, descriptor.class_name);
            Ok(ModuleInstance::new(Arc::clone(descriptor), domain, handle, module))
        }
        Err(e) => {
            cache.release(handle);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::StaticAssembly;
    use crate::instance::ModuleState;
    use crate::module::Module;

    struct Dummy;
    impl Module for Dummy {}

    fn setup() -> (AssemblyCatalog, AssemblyCache) {
        let mut catalog = AssemblyCatalog::new();
        catalog
            .add_static(
                StaticAssembly::new("assembly:/test")
                    .module(ModuleDescriptor::new("module:/dummy", "Dummy", "Dummy"), || {
                        Some(Box::new(Dummy))
                    })
                    .module(ModuleDescriptor::new("module:/broken", "Broken", "Broken"), || None),
            )
            .unwrap();
        (catalog, AssemblyCache::new())
    }

    #[test]
    fn test_instantiate_takes_reference() {
        let (catalog, mut cache) = setup();
        let descriptor = Arc::new(ModuleDescriptor::new("module:/dummy", "Dummy", "Dummy").in_assembly("assembly:/test"));

        let instance = instantiate(&descriptor, "core", &catalog, &mut cache).unwrap();
        assert_eq!(instance.state(), ModuleState::Constructed);
        assert_eq!(instance.domain(), "core");
        assert!(instance.downcast_ref::<Dummy>().is_some());
        assert_eq!(cache.ref_count("assembly:/test"), Some(1));
    }

    #[test]
    fn test_failure_gives_reference_back() {
        let (catalog, mut cache) = setup();
        let descriptor =
            Arc::new(ModuleDescriptor::new("module:/broken", "Broken", "Broken").in_assembly("assembly:/test"));

        let err = instantiate(&descriptor, "core", &catalog, &mut cache).unwrap_err();
        assert!(matches!(err, InstantiationError::ConstructionFailed { .. }));
        assert!(!cache.is_loaded("assembly:/test"));
    }
}
