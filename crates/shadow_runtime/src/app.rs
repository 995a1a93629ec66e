//! Application
//!
//! Owns the module manager and drives the main loop: pump events, tick the
//! clock, run the frame phases, pick up rebuilt assemblies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use shadow_core::{FrameClock, FrameTime};
use shadow_module::{pump_events, EventQueue, ModuleError, ModuleManager, PlatformEvent};
#[cfg(feature = "hot-reload")]
use shadow_module::{AssemblyWatcher, HotReloadConfig};
use thiserror::Error;

use crate::boot_config::{BootConfig, BootError};
use crate::builtin;

/// Assembly id given to the `-game` library
pub const GAME_ASSEMBLY: &str = "assembly:/game";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Boot(#[from] BootError),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

pub struct Application {
    config: BootConfig,
    manager: ModuleManager,
    clock: FrameClock,
    events: EventQueue,
    running: Arc<AtomicBool>,
    #[cfg(feature = "hot-reload")]
    watcher: Option<AssemblyWatcher>,
}

impl Application {
    /// Install the built-in and configured assemblies and activate the
    /// startup modules
    pub fn new(config: BootConfig) -> Result<Self, RuntimeError> {
        let mut manager = ModuleManager::new();
        manager.install_static_assembly(builtin::core_assembly(config.headless))?;
        let registered = config.modules.install(&mut manager)?;
        log::info!("Registered {} module(s) from configuration", registered);

        if config.modules.startup.is_empty() {
            manager.activate_module(builtin::SDL2)?;
            manager.activate_module(builtin::ENTITY_SYSTEM)?;
        } else {
            config.modules.activate_startup(&mut manager)?;
        }
        if config.debug {
            manager.activate_module(builtin::DEBUG)?;
        }

        if let Some(game) = &config.game {
            let id = manager.add_library_assembly(GAME_ASSEMBLY, game)?;
            manager.load_modules_from_assembly(&id)?;
            let descriptors = manager.registry().descriptors_of(&id);
            for descriptor in descriptors {
                manager.activate_module(&descriptor.id)?;
            }
        }

        #[cfg(feature = "hot-reload")]
        let watcher = if config.modules.hot_reload {
            let mut watcher = AssemblyWatcher::new(HotReloadConfig::default())?;
            let count = watcher.watch_catalog(manager.catalog());
            log::info!("Watching {} assembly file(s) for changes", count);
            Some(watcher)
        } else {
            None
        };

        log::info!("{} module(s) active", manager.len());

        Ok(Self {
            config,
            manager,
            clock: FrameClock::new(),
            events: EventQueue::new(),
            running: Arc::new(AtomicBool::new(true)),
            #[cfg(feature = "hot-reload")]
            watcher,
        })
    }

    /// Flag the main loop checks every frame; clear it to stop
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn manager(&self) -> &ModuleManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ModuleManager {
        &mut self.manager
    }

    /// Queue a platform event for the next frame
    pub fn push_event(&mut self, event: PlatformEvent) {
        self.events.push(event);
    }

    /// Run one frame. Returns false once the application should stop.
    pub fn frame(&mut self) -> bool {
        let summary = pump_events(&mut self.events, &mut self.manager);
        if summary.quit_requested {
            self.running.store(false, Ordering::SeqCst);
        }
        if !self.is_running() {
            return false;
        }

        let time = self.clock.tick();
        self.run_phases(&time);

        #[cfg(feature = "hot-reload")]
        if let Some(watcher) = &mut self.watcher {
            watcher.reload_changed(&mut self.manager);
        }

        if let Some(max) = self.config.max_frames {
            if time.frame >= max {
                log::info!("Reached frame limit ({})", max);
                self.running.store(false, Ordering::SeqCst);
            }
        }
        self.is_running()
    }

    fn run_phases(&mut self, time: &FrameTime) {
        let failures: usize = self
            .manager
            .run_frame(time)
            .iter()
            .map(|report| report.failures.len())
            .sum();
        if failures > 0 {
            log::warn!("Frame {}: {} module callback(s) failed", time.frame, failures);
        }
    }

    /// Run frames until stopped, capped at the configured frame rate
    pub fn run(&mut self) {
        let budget = (self.config.target_fps > 0)
            .then(|| Duration::from_secs_f64(1.0 / self.config.target_fps as f64));

        log::info!("Main loop running. Press Ctrl+C to exit.");
        loop {
            let started = Instant::now();
            if !self.frame() {
                break;
            }
            if let Some(budget) = budget {
                let spent = started.elapsed();
                if spent < budget {
                    std::thread::sleep(budget - spent);
                }
            }
        }
        log::info!("Main loop stopped after {} frame(s)", self.clock.frame());
    }

    /// Destroy every module in reverse registration order
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.manager.shutdown();
    }
}
