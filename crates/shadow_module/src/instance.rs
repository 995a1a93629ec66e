//! Live module instances

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use shadow_core::Handle;

use crate::assembly::Assembly;
use crate::descriptor::ModuleDescriptor;
use crate::module::Module;

/// Lifecycle state of a module
///
/// ```text
/// Registered -> Resolving -> Constructed -> PreInitialized -> Initialized -> Active
/// Active <-> Disabled
/// Active | Disabled -> Destroyed
/// Resolving | Constructed -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    Registered,
    Resolving,
    Constructed,
    PreInitialized,
    Initialized,
    Active,
    Disabled,
    Destroyed,
    Failed,
}

impl ModuleState {
    /// Whether the instance takes part in frames (enabled or not)
    pub fn is_live(&self) -> bool {
        matches!(self, ModuleState::Active | ModuleState::Disabled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ModuleState::Destroyed | ModuleState::Failed)
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A constructed module bound to its descriptor
///
/// Owned exclusively by the manager. The module object is taken out while
/// one of its callbacks runs, so `module()` is `None` during that window.
pub struct ModuleInstance {
    pub(crate) descriptor: Arc<ModuleDescriptor>,
    pub(crate) domain: String,
    pub(crate) state: ModuleState,
    pub(crate) assembly: Handle<Assembly>,
    pub(crate) module: Option<Box<dyn Module>>,
    /// Concrete type of `module`, known even while it is checked out
    type_id: TypeId,
}

impl ModuleInstance {
    pub(crate) fn new(
        descriptor: Arc<ModuleDescriptor>,
        domain: impl Into<String>,
        assembly: Handle<Assembly>,
        module: Box<dyn Module>,
    ) -> Self {
        let type_id = Any::type_id((*module).as_any());
        Self {
            descriptor,
            domain: domain.into(),
            state: ModuleState::Constructed,
            assembly,
            module: Some(module),
            type_id,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &Arc<ModuleDescriptor> {
        &self.descriptor
    }

    /// Domain tag given at activation
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == ModuleState::Active
    }

    /// Handle of the assembly that provides the module's code
    pub fn assembly(&self) -> Handle<Assembly> {
        self.assembly
    }

    /// The module object, unless one of its callbacks is running
    pub fn module(&self) -> Option<&dyn Module> {
        self.module.as_deref()
    }

    /// Downcast the module object to its concrete type
    pub fn downcast_ref<T: Module>(&self) -> Option<&T> {
        self.module.as_deref()?.as_any().downcast_ref::<T>()
    }

    /// Whether the module object is a `T`
    pub fn is<T: Module>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.module.is_none()
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("id", &self.descriptor.id)
            .field("domain", &self.domain)
            .field("state", &self.state)
            .field("assembly", &self.assembly)
            .finish()
    }
}
