//! Assemblies: the units of code modules come from
//!
//! An assembly is either a shared library opened at runtime or a
//! [`StaticAssembly`] compiled into the process. Both register descriptors
//! with the [`ModuleRegistry`] and construct modules by class name.
//!
//! Loaded assemblies live in the [`AssemblyCache`], reference counted by the
//! number of live module instances they provide.

use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shadow_core::{Arena, Handle, PathId};

use crate::descriptor::ModuleDescriptor;
use crate::error::{InstantiationError, LoadError, ModuleError, RegistryError};
use crate::ffi::{
    module_entry_symbol, AssemblyEntryFn, FfiModuleDescriptor, FfiRegistrar, FfiStatus, ModuleEntryFn,
    ASSEMBLY_ENTRY_NAME_SYMBOL, ASSEMBLY_ENTRY_SYMBOL, SHADOW_MODULE_API_VERSION,
};
use crate::library::DynamicLibrary;
use crate::module::Module;
use crate::native::NativeModule;
use crate::recovery::catch_panic;
use crate::registry::ModuleRegistry;

/// Constructor of an in-process module
pub type ModuleConstructor = Box<dyn Fn() -> Option<Box<dyn Module>> + Send + Sync>;

/// An assembly compiled into the process
///
/// ```ignore
/// let core = StaticAssembly::new("assembly:/core")
///     .module(ModuleDescriptor::new("module:/core", "Core", "CoreModule"), || {
///         Some(Box::new(CoreModule::default()))
///     });
/// ```
pub struct StaticAssembly {
    id: String,
    descriptors: Vec<ModuleDescriptor>,
    constructors: HashMap<String, ModuleConstructor>,
}

impl StaticAssembly {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            descriptors: Vec::new(),
            constructors: HashMap::new(),
        }
    }

    /// Add a module, keyed by its descriptor's class name
    pub fn module<F>(mut self, descriptor: ModuleDescriptor, constructor: F) -> Self
    where
        F: Fn() -> Option<Box<dyn Module>> + Send + Sync + 'static,
    {
        self.constructors.insert(descriptor.class_name.clone(), Box::new(constructor));
        self.descriptors.push(descriptor);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn descriptors(&self) -> &[ModuleDescriptor] {
        &self.descriptors
    }

    fn constructor(&self, class_name: &str) -> Option<&ModuleConstructor> {
        self.constructors.get(class_name)
    }
}

impl fmt::Debug for StaticAssembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticAssembly")
            .field("id", &self.id)
            .field("modules", &self.descriptors.len())
            .finish()
    }
}

/// Where an assembly's code comes from
#[derive(Debug, Clone)]
pub enum AssemblySource {
    Library(PathBuf),
    Static(Arc<StaticAssembly>),
}

/// Known assemblies, by id
#[derive(Debug, Default)]
pub struct AssemblyCatalog {
    library_dir: Option<PathBuf>,
    entries: HashMap<String, AssemblySource>,
    order: Vec<String>,
}

impl AssemblyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative library paths against `dir`
    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    pub fn set_library_dir(&mut self, dir: impl Into<PathBuf>) {
        self.library_dir = Some(dir.into());
    }

    pub fn library_dir(&self) -> Option<&Path> {
        self.library_dir.as_deref()
    }

    /// Declare a shared library assembly; returns the normalized id
    pub fn add_library(&mut self, id: &str, path: impl AsRef<Path>) -> Result<String, RegistryError> {
        let path = path.as_ref();
        let path = match &self.library_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        self.insert(id, AssemblySource::Library(path))
    }

    /// Declare an in-process assembly; returns the normalized id
    pub fn add_static(&mut self, assembly: StaticAssembly) -> Result<String, RegistryError> {
        let id = assembly.id.clone();
        self.insert(&id, AssemblySource::Static(Arc::new(assembly)))
    }

    fn insert(&mut self, id: &str, source: AssemblySource) -> Result<String, RegistryError> {
        let id = PathId::parse(id)?.to_string();
        if self.entries.contains_key(&id) {
            return Err(RegistryError::DuplicateAssembly(id));
        }
        self.entries.insert(id.clone(), source);
        self.order.push(id.clone());
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&AssemblySource> {
        self.entries.get(id)
    }

    /// Path of a library assembly
    pub fn library_path(&self, id: &str) -> Option<&Path> {
        match self.entries.get(id)? {
            AssemblySource::Library(path) => Some(path),
            AssemblySource::Static(_) => None,
        }
    }

    /// Ids in declaration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }
}

enum AssemblyCode {
    Library(DynamicLibrary),
    Static(Arc<StaticAssembly>),
}

/// A loaded assembly
pub struct Assembly {
    id: String,
    code: AssemblyCode,
    module_refs: usize,
}

/// Collects descriptors pushed through [`FfiRegistrar`]
struct Registration {
    descriptors: Vec<ModuleDescriptor>,
    errors: Vec<String>,
}

unsafe extern "C" fn add_descriptor(context: *mut c_void, raw: *const FfiModuleDescriptor) -> FfiStatus {
    if context.is_null() || raw.is_null() {
        return FfiStatus::INVALID_ARGUMENT;
    }
    // Safety: `context` is the `Registration` owned by `Assembly::register`
    // for the duration of the entry point call.
    let registration = unsafe { &mut *(context as *mut Registration) };
    match unsafe { (*raw).to_descriptor() } {
        Ok(descriptor) => {
            registration.descriptors.push(descriptor);
            FfiStatus::OK
        }
        Err(reason) => {
            registration.errors.push(reason);
            FfiStatus::INVALID_ARGUMENT
        }
    }
}

/// Call a registration entry point and register what it reports
///
/// Any malformed descriptor rejects the whole batch.
///
/// # Safety
/// `entry` must be a valid function for the duration of the call.
unsafe fn run_entry(
    assembly_id: &str,
    entry: AssemblyEntryFn,
    registry: &mut ModuleRegistry,
) -> Result<usize, ModuleError> {
    let mut registration = Registration {
        descriptors: Vec::new(),
        errors: Vec::new(),
    };
    let mut registrar = FfiRegistrar {
        api_version: SHADOW_MODULE_API_VERSION,
        context: &mut registration as *mut Registration as *mut c_void,
        add_descriptor,
    };
    unsafe { entry(&mut registrar) };

    if let Some(reason) = registration.errors.into_iter().next() {
        return Err(RegistryError::MalformedDescriptor {
            assembly: assembly_id.to_string(),
            reason,
        }
        .into());
    }
    Ok(registry.register_assembly(assembly_id, registration.descriptors)?)
}

impl Assembly {
    /// Load the code behind a catalog entry
    pub fn open(id: &str, source: &AssemblySource) -> Result<Self, LoadError> {
        let code = match source {
            AssemblySource::Library(path) => AssemblyCode::Library(DynamicLibrary::load(path)?),
            AssemblySource::Static(assembly) => AssemblyCode::Static(Arc::clone(assembly)),
        };
        log::info!("Loaded assembly '{}'", id);
        Ok(Self {
            id: id.to_string(),
            code,
            module_refs: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of live modules built from this assembly
    pub fn module_refs(&self) -> usize {
        self.module_refs
    }

    pub fn is_library(&self) -> bool {
        matches!(self.code, AssemblyCode::Library(_))
    }

    /// Run the registration entry point, adding this assembly's descriptors
    pub fn register(&self, registry: &mut ModuleRegistry) -> Result<usize, ModuleError> {
        match &self.code {
            AssemblyCode::Static(assembly) => {
                Ok(registry.register_assembly(&self.id, assembly.descriptors().iter().cloned())?)
            }
            AssemblyCode::Library(library) => {
                let symbol = library
                    .string_variable(ASSEMBLY_ENTRY_NAME_SYMBOL)
                    .unwrap_or_else(|| ASSEMBLY_ENTRY_SYMBOL.to_string());

                // Safety: the entry point has the `AssemblyEntryFn` signature
                // by contract with the library.
                let entry = unsafe { library.symbol::<AssemblyEntryFn>(&symbol) }.ok_or_else(|| {
                    ModuleError::MissingEntryPoint {
                        assembly: self.id.clone(),
                        symbol: symbol.clone(),
                    }
                })?;

                log::debug!("Calling {} in '{}'", symbol, self.id);
                unsafe { run_entry(&self.id, entry, registry) }
            }
        }
    }

    /// Build a module of the descriptor's class
    pub fn construct(&self, descriptor: &ModuleDescriptor) -> Result<Box<dyn Module>, InstantiationError> {
        let failed = |reason: String| {
            InstantiationError::construction_failed(&descriptor.id, &descriptor.class_name, reason)
        };

        match &self.code {
            AssemblyCode::Static(assembly) => {
                let constructor = assembly
                    .constructor(&descriptor.class_name)
                    .ok_or_else(|| failed(format!("no constructor for class in '{}'", self.id)))?;
                catch_panic(|| constructor())
                    .map_err(failed)?
                    .ok_or_else(|| failed("constructor returned nothing".to_string()))
            }
            AssemblyCode::Library(library) => {
                let symbol = module_entry_symbol(&descriptor.class_name);
                // Safety: `<ClassName>_entry` has the `ModuleEntryFn`
                // signature by contract with the library.
                let entry = unsafe { library.symbol::<ModuleEntryFn>(&symbol) }
                    .ok_or_else(|| failed(format!("symbol '{}' not found", symbol)))?;
                let handle = unsafe { entry() };
                // Safety: the library stays loaded while this assembly holds
                // a reference for the instance.
                let module = unsafe { NativeModule::from_handle(&descriptor.class_name, handle) }.map_err(failed)?;
                Ok(Box::new(module))
            }
        }
    }

    fn unload(self) {
        match self.code {
            AssemblyCode::Library(library) => library.unload(),
            AssemblyCode::Static(_) => {}
        }
        log::info!("Unloaded assembly '{}'", self.id);
    }
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembly")
            .field("id", &self.id)
            .field("library", &self.is_library())
            .field("module_refs", &self.module_refs)
            .finish()
    }
}

/// Loaded assemblies, each unloaded once its last module reference goes
#[derive(Default)]
pub struct AssemblyCache {
    assemblies: Arena<Assembly>,
    by_id: HashMap<String, Handle<Assembly>>,
}

impl AssemblyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a loaded assembly or load it from the catalog, without taking a
    /// reference
    pub fn load(&mut self, catalog: &AssemblyCatalog, id: &str) -> Result<Handle<Assembly>, InstantiationError> {
        if let Some(handle) = self.by_id.get(id) {
            return Ok(*handle);
        }
        let source = catalog
            .get(id)
            .ok_or_else(|| InstantiationError::UnknownAssembly(id.to_string()))?;
        let assembly = Assembly::open(id, source)?;
        let handle = self.assemblies.insert(assembly);
        self.by_id.insert(id.to_string(), handle);
        Ok(handle)
    }

    /// Take a module reference
    pub fn acquire(&mut self, handle: Handle<Assembly>) -> bool {
        match self.assemblies.get_mut(handle) {
            Some(assembly) => {
                assembly.module_refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drop a module reference, unloading the assembly when none remain.
    /// Returns true if the assembly was unloaded.
    pub fn release(&mut self, handle: Handle<Assembly>) -> bool {
        let remaining = match self.assemblies.get_mut(handle) {
            Some(assembly) => {
                assembly.module_refs = assembly.module_refs.saturating_sub(1);
                assembly.module_refs
            }
            None => {
                log::warn!("Released a stale assembly handle {:?}", handle);
                return false;
            }
        };
        if remaining == 0 {
            self.remove(handle);
            true
        } else {
            false
        }
    }

    fn remove(&mut self, handle: Handle<Assembly>) {
        if let Some(assembly) = self.assemblies.remove(handle) {
            self.by_id.remove(&assembly.id);
            assembly.unload();
        }
    }

    /// Unload an assembly nothing references. Returns false if it is not
    /// loaded or still in use.
    pub fn unload(&mut self, id: &str) -> bool {
        let Some(handle) = self.by_id.get(id).copied() else {
            return false;
        };
        let refs = self.assemblies.get(handle).map(|a| a.module_refs).unwrap_or(0);
        if refs > 0 {
            log::warn!("Not unloading assembly '{}': {} module(s) still live", id, refs);
            return false;
        }
        self.remove(handle);
        true
    }

    /// Unload everything
    pub fn unload_all(&mut self) {
        self.by_id.clear();
        for assembly in self.assemblies.drain() {
            if assembly.module_refs > 0 {
                log::warn!(
                    "Unloading assembly '{}' with {} module reference(s)",
                    assembly.id,
                    assembly.module_refs
                );
            }
            assembly.unload();
        }
    }

    pub fn get(&self, handle: Handle<Assembly>) -> Option<&Assembly> {
        self.assemblies.get(handle)
    }

    pub fn find(&self, id: &str) -> Option<Handle<Assembly>> {
        self.by_id.get(id).copied()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Module references held on a loaded assembly
    pub fn ref_count(&self, id: &str) -> Option<usize> {
        let handle = self.find(id)?;
        self.assemblies.get(handle).map(|a| a.module_refs)
    }

    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }
}
