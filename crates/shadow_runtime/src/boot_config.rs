//! Boot Configuration
//!
//! Decides how the runtime starts: which config file to read, which game
//! assembly to load and how many frames to run.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Command line: `-config <path>`, `-game <path>`, `-frames <n>`, `-debug`, `-no-gui`
//! 2. Environment: `SHADOW_CONFIG`, `SHADOW_LIBRARY_DIR`, `SHADOW_DEBUG`, `SHADOW_MAX_FRAMES`
//! 3. Config file: `shadow.toml` or `config/shadow.toml`
//!
//! # Example Config File
//!
//! ```toml
//! [boot]
//! debug = false
//! headless = false
//! target_fps = 60
//! max_frames = 600
//!
//! [modules]
//! library_dir = "target/debug"
//! default_domain = "core"
//!
//! [[modules.assemblies]]
//! id = "assembly:/sample"
//! path = "shadow_sample_assembly"
//!
//! [[modules.startup]]
//! id = "module:/sample/greeter"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use shadow_module::{ConfigError, ModuleConfig};
use thiserror::Error;

/// Files searched when no config path is given
pub const CONFIG_SEARCH_PATHS: [&str; 2] = ["shadow.toml", "config/shadow.toml"];

/// Errors from assembling the boot configuration
#[derive(Debug, Error)]
pub enum BootError {
    #[error("Failed to read '{}': {source}", .path.display())]
    Config { path: PathBuf, source: ConfigError },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// `[boot]` section of the config file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BootSection {
    pub debug: bool,
    pub headless: bool,
    /// Frame rate cap, 0 for uncapped
    pub target_fps: u32,
    /// Stop after this many frames, 0 for no limit
    pub max_frames: u64,
}

impl Default for BootSection {
    fn default() -> Self {
        Self {
            debug: false,
            headless: false,
            target_fps: 60,
            max_frames: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BootFile {
    boot: BootSection,
    modules: ModuleConfig,
}

/// Complete boot configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BootConfig {
    /// Enable debug logging and the debug module
    pub debug: bool,
    /// Run without a window
    pub headless: bool,
    pub target_fps: u32,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
    /// Game assembly to load and activate
    pub game: Option<PathBuf>,
    /// Assemblies, descriptors and startup modules
    pub modules: ModuleConfig,
    /// Config file the settings came from
    pub config_path: Option<PathBuf>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::from_section(BootSection::default(), ModuleConfig::default())
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_frames(value: &str) -> Result<u64, BootError> {
    value
        .trim()
        .parse()
        .map_err(|_| BootError::InvalidArgument(format!("frame count '{}' is not a number", value)))
}

impl BootConfig {
    fn from_section(boot: BootSection, modules: ModuleConfig) -> Self {
        Self {
            debug: boot.debug,
            headless: boot.headless,
            target_fps: boot.target_fps,
            max_frames: (boot.max_frames > 0).then_some(boot.max_frames),
            game: None,
            modules,
            config_path: None,
        }
    }

    /// Load boot configuration from the process environment and arguments
    pub fn load() -> Result<Self, BootError> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::resolve(&args, |key| std::env::var(key).ok())
    }

    /// Load boot configuration from explicit sources
    pub fn resolve(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self, BootError> {
        let explicit = Self::config_arg(args)?
            .map(PathBuf::from)
            .or_else(|| env("SHADOW_CONFIG").filter(|p| !p.is_empty()).map(PathBuf::from));

        // 1. Config file
        let mut config = match explicit {
            Some(path) => Self::load_from_file(&path)?,
            None => {
                let found = CONFIG_SEARCH_PATHS.iter().map(Path::new).find(|p| p.is_file());
                match found {
                    Some(path) => Self::load_from_file(path)?,
                    None => Self::default(),
                }
            }
        };

        // 2. Environment
        if let Some(dir) = env("SHADOW_LIBRARY_DIR").filter(|d| !d.is_empty()) {
            config.modules.library_dir = Some(PathBuf::from(dir));
        }
        if env("SHADOW_DEBUG").map(|v| truthy(&v)).unwrap_or(false) {
            config.debug = true;
        }
        if let Some(frames) = env("SHADOW_MAX_FRAMES") {
            config.max_frames = Some(parse_frames(&frames)?);
        }

        // 3. Command line
        config.apply_args(args)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, BootError> {
        let wrap = |source: ConfigError| BootError::Config {
            path: path.to_path_buf(),
            source,
        };
        let content = std::fs::read_to_string(path).map_err(|e| wrap(e.into()))?;
        let mut config = Self::from_toml_str(&content).map_err(wrap)?;
        config.config_path = Some(path.to_path_buf());
        log::debug!("Loaded boot config from {}", path.display());
        Ok(config)
    }

    /// Parse the config file format
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: BootFile = toml::from_str(content)?;
        file.modules.validate()?;
        Ok(Self::from_section(file.boot, file.modules))
    }

    fn config_arg(args: &[String]) -> Result<Option<String>, BootError> {
        match args.iter().position(|a| a == "-config") {
            Some(index) => args
                .get(index + 1)
                .cloned()
                .map(Some)
                .ok_or_else(|| BootError::InvalidArgument("-config needs a path".to_string())),
            None => Ok(None),
        }
    }

    fn apply_args(&mut self, args: &[String]) -> Result<(), BootError> {
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-config" => {
                    iter.next();
                }
                "-game" => {
                    let path = iter
                        .next()
                        .ok_or_else(|| BootError::InvalidArgument("-game needs a path".to_string()))?;
                    self.game = Some(PathBuf::from(path));
                }
                "-frames" => {
                    let frames = iter
                        .next()
                        .ok_or_else(|| BootError::InvalidArgument("-frames needs a count".to_string()))?;
                    self.max_frames = Some(parse_frames(frames)?);
                }
                "-debug" => self.debug = true,
                "-no-gui" => self.headless = true,
                other => log::warn!("Ignoring unknown argument '{}'", other),
            }
        }
        Ok(())
    }

    /// Log filter used when `RUST_LOG` is not set
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn print_summary(&self) {
        log::info!("Boot Configuration:");
        log::info!("  Debug: {}, Headless: {}", self.debug, self.headless);
        match self.max_frames {
            Some(frames) => log::info!("  Frames: {} at {} fps", frames, self.target_fps),
            None => log::info!("  Frames: unlimited at {} fps", self.target_fps),
        }
        if let Some(game) = &self.game {
            log::info!("  Game: {}", game.display());
        }
        if let Some(dir) = &self.modules.library_dir {
            log::info!("  Library dir: {}", dir.display());
        }
        log::info!(
            "  Assemblies: {}, startup modules: {}",
            self.modules.assemblies.len(),
            self.modules.startup.len()
        );
        if let Some(path) = &self.config_path {
            log::info!("  Config: {}", path.display());
        }
    }
}
