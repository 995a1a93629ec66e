//! Module configuration
//!
//! Declares which assemblies exist, optional static descriptors and the
//! modules to activate at startup.
//!
//! # Format
//!
//! ```toml
//! library_dir = "target/debug"
//! default_domain = "core"
//! hot_reload = false
//!
//! [[assemblies]]
//! id = "assembly:/sample"
//! path = "shadow_sample_assembly"
//!
//! [[descriptors]]
//! id = "module:/game"
//! name = "Game"
//! class_name = "GameModule"
//! assembly = "assembly:/sample"
//! dependencies = ["module:/core"]
//!
//! [[startup]]
//! id = "module:/platform/sdl2"
//! domain = "core"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::descriptor::ModuleDescriptor;
use crate::error::Result;
use crate::manager::ModuleManager;

/// Errors from reading module configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// A shared library assembly to put in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssemblyEntry {
    pub id: String,
    /// Library path; relative paths resolve against `library_dir` and the
    /// platform extension is appended when absent
    pub path: PathBuf,
    /// Run the registration entry point during install
    #[serde(default = "default_scan")]
    pub scan: bool,
}

fn default_scan() -> bool {
    true
}

/// A module to activate at startup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartupEntry {
    pub id: String,
    /// Domain tag, the default domain when absent
    #[serde(default)]
    pub domain: Option<String>,
}

/// Parsed module configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModuleConfig {
    #[serde(default)]
    pub library_dir: Option<PathBuf>,
    #[serde(default)]
    pub default_domain: Option<String>,
    #[serde(default)]
    pub hot_reload: bool,
    #[serde(default)]
    pub assemblies: Vec<AssemblyEntry>,
    #[serde(default)]
    pub descriptors: Vec<ModuleDescriptor>,
    #[serde(default)]
    pub startup: Vec<StartupEntry>,
}

impl ModuleConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        let config: ModuleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a config file
    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check fields serde cannot
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for assembly in &self.assemblies {
            if assembly.path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "assembly '{}' has an empty path",
                    assembly.id
                )));
            }
        }
        for descriptor in &self.descriptors {
            if descriptor.assembly.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "descriptor '{}' names no assembly",
                    descriptor.id
                )));
            }
        }
        if let Some(domain) = &self.default_domain {
            if domain.trim().is_empty() {
                return Err(ConfigError::Validation("default_domain is empty".to_string()));
            }
        }
        Ok(())
    }

    /// Catalog the assemblies, scan them and register static descriptors.
    /// Returns the number of descriptors registered.
    pub fn install(&self, manager: &mut ModuleManager) -> Result<usize> {
        if let Some(dir) = &self.library_dir {
            manager.catalog_mut().set_library_dir(dir);
        }
        if let Some(domain) = &self.default_domain {
            manager.set_default_domain(domain.clone());
        }

        let mut registered = 0;
        for entry in &self.assemblies {
            let id = manager.add_library_assembly(&entry.id, &entry.path)?;
            if entry.scan {
                registered += manager.load_modules_from_assembly(&id)?;
            }
        }
        for descriptor in &self.descriptors {
            manager.register_descriptor(descriptor.clone())?;
            registered += 1;
        }
        Ok(registered)
    }

    /// Activate the startup modules in order
    pub fn activate_startup(&self, manager: &mut ModuleManager) -> Result<usize> {
        for entry in &self.startup {
            match &entry.domain {
                Some(domain) => manager.activate_module_in(&entry.id, domain)?,
                None => manager.activate_module(&entry.id)?,
            }
        }
        Ok(self.startup.len())
    }
}
