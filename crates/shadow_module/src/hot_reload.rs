//! Hot-reload of library assemblies
//!
//! Watches the files behind library assemblies and reports which assemblies
//! changed once their writes have settled. The manager then reloads the
//! modules they provide with [`ModuleManager::reload_assembly`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::assembly::AssemblyCatalog;
use crate::error::{ModuleError, Result};
use crate::library::DynamicLibrary;
use crate::manager::ModuleManager;

/// Configuration for hot-reload
#[derive(Debug, Clone)]
pub struct HotReloadConfig {
    /// Wait this long after the last change before reporting a file
    pub debounce: Duration,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// Reports changed library assemblies
pub struct AssemblyWatcher {
    config: HotReloadConfig,
    watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    /// Canonical library path -> assembly id
    watched: HashMap<PathBuf, String>,
    /// Assembly id -> time of the last change
    pending: HashMap<String, Instant>,
}

impl AssemblyWatcher {
    pub fn new(config: HotReloadConfig) -> Result<Self> {
        let (tx, rx) = channel();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| ModuleError::HotReload(e.to_string()))?;

        Ok(Self {
            config,
            watcher,
            events: rx,
            watched: HashMap::new(),
            pending: HashMap::new(),
        })
    }

    /// Watch the library behind an assembly
    pub fn watch(&mut self, assembly_id: &str, path: impl AsRef<Path>) -> Result<()> {
        let requested = path.as_ref();
        let file = DynamicLibrary::locate(requested)
            .ok_or_else(|| ModuleError::HotReload(format!("no library at '{}'", requested.display())))?;
        let file = file.canonicalize().map_err(|e| ModuleError::HotReload(e.to_string()))?;
        let dir = file
            .parent()
            .ok_or_else(|| ModuleError::HotReload(format!("'{}' has no parent directory", file.display())))?;

        // Libraries are usually replaced rather than written in place, so
        // the directory is watched instead of the file.
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| ModuleError::HotReload(e.to_string()))?;

        log::debug!("Watching '{}' for assembly '{}'", file.display(), assembly_id);
        self.watched.insert(file, assembly_id.to_string());
        Ok(())
    }

    /// Watch every library assembly in the catalog whose file exists
    pub fn watch_catalog(&mut self, catalog: &AssemblyCatalog) -> usize {
        let mut count = 0;
        for id in catalog.ids() {
            let Some(path) = catalog.library_path(id) else {
                continue;
            };
            match self.watch(id, path) {
                Ok(()) => count += 1,
                Err(e) => log::warn!("Not watching assembly '{}': {}", id, e),
            }
        }
        count
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    fn handle_event(&mut self, event: &Event, now: Instant) {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }
        for path in &event.paths {
            let path = path.canonicalize().unwrap_or_else(|_| path.clone());
            if let Some(id) = self.watched.get(&path) {
                log::debug!("Change detected in '{}'", path.display());
                self.pending.insert(id.clone(), now);
            }
        }
    }

    fn take_settled(&mut self, now: Instant) -> Vec<String> {
        let debounce = self.config.debounce;
        let mut ready: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, changed)| now.duration_since(**changed) >= debounce)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ready {
            self.pending.remove(id);
        }
        ready.sort();
        ready
    }

    /// Drain file events and return assemblies whose changes have settled
    pub fn poll(&mut self) -> Vec<String> {
        let now = Instant::now();
        while let Ok(result) = self.events.try_recv() {
            match result {
                Ok(event) => self.handle_event(&event, now),
                Err(e) => log::warn!("File watcher error: {}", e),
            }
        }
        self.take_settled(Instant::now())
    }

    /// Reload the modules of every settled assembly. Returns how many
    /// assemblies were reloaded successfully.
    pub fn reload_changed(&mut self, manager: &mut ModuleManager) -> usize {
        let mut reloaded = 0;
        for id in self.poll() {
            match manager.reload_assembly(&id) {
                Ok(count) => {
                    log::info!("Hot-reloaded assembly '{}' ({} module(s))", id, count);
                    reloaded += 1;
                }
                Err(e) => log::error!("Failed to hot-reload assembly '{}': {}", id, e),
            }
        }
        reloaded
    }
}
