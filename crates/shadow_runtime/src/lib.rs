//! # shadow_runtime - Engine Runtime
//!
//! Boot configuration, the built-in core assembly and the application main
//! loop used by the `shadow` binary.

pub mod app;
pub mod boot_config;
pub mod builtin;

pub use app::{Application, RuntimeError};
pub use boot_config::{BootConfig, BootError};
