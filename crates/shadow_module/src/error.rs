//! Error types for the module runtime

use std::path::PathBuf;

use shadow_core::CoreError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::module::Phase;

/// Result type for module runtime operations
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors from opening a shared library
#[derive(Debug, Error)]
pub enum LoadError {
    /// Nothing exists at the (normalized) library path
    #[error("Library not found at '{}'", .0.display())]
    NotFound(PathBuf),

    /// The OS loader rejected the binary
    #[error("Failed to link library '{}': {message}", .path.display())]
    LinkFailure { path: PathBuf, message: String },
}

/// Errors from the descriptor registry and assembly catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A descriptor with this id is already registered
    #[error("Module '{0}' is already registered")]
    DuplicateModule(String),

    /// No descriptor with this id
    #[error("Module '{0}' is not registered")]
    NotFound(String),

    /// A descriptor lists itself as a dependency
    #[error("Module '{0}' depends on itself")]
    SelfDependency(String),

    /// An assembly with this id is already in the catalog
    #[error("Assembly '{0}' is already known")]
    DuplicateAssembly(String),

    /// A descriptor crossed the C ABI with a null or non-UTF-8 field
    #[error("Malformed descriptor from assembly '{assembly}': {reason}")]
    MalformedDescriptor { assembly: String, reason: String },

    /// Descriptor or assembly id is not a valid path id
    #[error(transparent)]
    InvalidId(#[from] CoreError),
}

/// Errors from dependency resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The requested root is not in the registry
    #[error("Module '{0}' is not registered")]
    UnknownModule(String),

    /// A dependency id is absent from the registry
    #[error("Module '{missing}' is missing, required by '{required_by}'")]
    MissingDependency { missing: String, required_by: String },

    /// The dependency chain loops back on itself
    #[error("Cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },
}

/// Errors from turning a descriptor into a live instance
#[derive(Debug, Error)]
pub enum InstantiationError {
    /// The owning library could not be opened
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The descriptor names an assembly that is not in the catalog
    #[error("Assembly '{0}' is not known")]
    UnknownAssembly(String),

    /// The construction entry point is missing or produced nothing
    #[error("Failed to construct module '{module}' ({class_name}): {reason}")]
    ConstructionFailed {
        module: String,
        class_name: String,
        reason: String,
    },
}

impl InstantiationError {
    /// Create a construction failure
    pub fn construction_failed(
        module: impl Into<String>,
        class_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        InstantiationError::ConstructionFailed {
            module: module.into(),
            class_name: class_name.into(),
            reason: reason.into(),
        }
    }
}

/// Failure signaled by a module callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PhaseError(pub String);

impl PhaseError {
    /// Create a phase error from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for PhaseError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PhaseError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Errors surfaced by the module manager
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Dependency resolution error
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Instantiation error
    #[error("Instantiation error: {0}")]
    Instantiation(#[from] InstantiationError),

    /// Library loading error outside of instantiation
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// `pre_init` or `init` failed during activation
    #[error("Module '{module}' failed during {phase}: {message}")]
    Callback {
        module: String,
        phase: Phase,
        message: String,
    },

    /// Other live modules still depend on this one
    #[error("Module '{module}' is still required by: {}", .dependents.join(", "))]
    DependentsStillActive {
        module: String,
        dependents: Vec<String>,
    },

    /// No live instance with this id
    #[error("Module '{0}' is not active")]
    NotFound(String),

    /// The instance exists but is not of the requested type
    #[error("Module '{module}' is not a {expected}")]
    TypeMismatch {
        module: String,
        expected: &'static str,
    },

    /// The module is executing a callback and cannot be borrowed
    #[error("Module '{0}' is busy running a callback")]
    Busy(String),

    /// A library has no registration entry point
    #[error("Assembly '{assembly}' does not export '{symbol}'")]
    MissingEntryPoint { assembly: String, symbol: String },

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid id passed to an operation
    #[error(transparent)]
    InvalidId(#[from] CoreError),

    /// Hot-reload watcher error
    #[error("Hot-reload failed: {0}")]
    HotReload(String),
}
