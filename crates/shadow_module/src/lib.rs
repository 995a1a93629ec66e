//! # shadow_module - Engine Module Runtime
//!
//! Discovers, loads, orders and drives the engine's pluggable modules.
//!
//! ## Pieces
//!
//! - **Assemblies**: shared libraries opened with `libloading`, or static
//!   assemblies compiled into the process
//! - **Registry**: descriptors contributed by each assembly's entry point
//! - **Resolver**: dependency-ordered activation lists with cycle detection
//! - **Manager**: owns live modules, runs PreInit/Init on activation and the
//!   per-frame phases in registration order, tears down in reverse
//!
//! ## Example
//!
//! ```ignore
//! use shadow_module::prelude::*;
//!
//! let mut manager = ModuleManager::new();
//! manager.install_static_assembly(
//!     StaticAssembly::new("assembly:/core")
//!         .module(ModuleDescriptor::new("module:/core", "Core", "CoreModule"), || {
//!             Some(Box::new(CoreModule::default()))
//!         }),
//! )?;
//! manager.activate_module("module:/core")?;
//!
//! let mut clock = FrameClock::new();
//! manager.run_frame(&clock.tick());
//! manager.shutdown();
//! ```

pub mod assembly;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod ffi;
#[cfg(feature = "hot-reload")]
pub mod hot_reload;
pub mod instance;
pub mod library;
pub mod manager;
pub mod module;
pub mod native;
pub mod recovery;
pub mod registry;
pub mod resolver;

pub use assembly::{Assembly, AssemblyCache, AssemblyCatalog, AssemblySource, StaticAssembly};
pub use config::{ConfigError, ModuleConfig};
pub use descriptor::ModuleDescriptor;
pub use dispatch::{pump_events, EventQueue, EventSource};
pub use error::{
    InstantiationError, LoadError, ModuleError, PhaseError, RegistryError, ResolutionError, Result,
};
#[cfg(feature = "hot-reload")]
pub use hot_reload::{AssemblyWatcher, HotReloadConfig};
pub use instance::{ModuleInstance, ModuleState};
pub use library::DynamicLibrary;
pub use manager::{LifecycleEvent, ModuleContext, ModuleManager, PhaseReport, DEFAULT_DOMAIN};
pub use module::{Module, MouseButton, Phase, PhaseResult, PlatformEvent};
pub use resolver::resolve;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::assembly::StaticAssembly;
    pub use crate::descriptor::ModuleDescriptor;
    pub use crate::error::{ModuleError, PhaseError, Result};
    pub use crate::manager::{ModuleContext, ModuleManager};
    pub use crate::module::{Module, Phase, PhaseResult, PlatformEvent};
    pub use shadow_core::{FrameClock, FrameTime};
}
