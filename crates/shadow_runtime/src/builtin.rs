//! Built-in core assembly
//!
//! Modules that ship with the runtime and are always available:
//! `core`, `sdl2` (the platform layer), `debug` and `entity-system`.

use shadow_core::FrameTime;
use shadow_module::prelude::*;

pub const CORE_ASSEMBLY: &str = "assembly:/core";

pub const CORE: &str = "module:/core";
pub const SDL2: &str = "module:/sdl2";
pub const DEBUG: &str = "module:/debug";
pub const ENTITY_SYSTEM: &str = "module:/entity-system";

/// Engine bookkeeping shared by every other module
#[derive(Debug, Default)]
pub struct CoreModule {
    frame: u64,
    elapsed: f64,
    last_delta_ms: f64,
}

impl CoreModule {
    /// Last frame seen by `update`
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn last_delta_ms(&self) -> f64 {
        self.last_delta_ms
    }
}

impl Module for CoreModule {
    fn init(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        log::info!("Core module initialized");
        Ok(())
    }

    fn update(&mut self, _ctx: &ModuleContext<'_>, time: &FrameTime) -> PhaseResult {
        self.frame = time.frame;
        self.elapsed = time.elapsed;
        self.last_delta_ms = time.delta_ms();
        Ok(())
    }
}

/// Platform layer: window state and input bookkeeping
///
/// Without a window (`headless`) it only tracks what the event stream
/// reports.
#[derive(Debug)]
pub struct Sdl2Module {
    headless: bool,
    width: u32,
    height: u32,
    focused: bool,
    keys_down: Vec<u32>,
    quit_requested: bool,
}

impl Sdl2Module {
    pub fn new(headless: bool) -> Self {
        Self {
            headless,
            width: 1280,
            height: 720,
            focused: true,
            keys_down: Vec::new(),
            quit_requested: false,
        }
    }

    pub fn is_headless(&self) -> bool {
        self.headless
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_key_down(&self, keycode: u32) -> bool {
        self.keys_down.contains(&keycode)
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }
}

impl Module for Sdl2Module {
    fn init(&mut self, ctx: &ModuleContext<'_>) -> PhaseResult {
        if !ctx.is_module_active(CORE) {
            return Err(PhaseError::new("core module is not active"));
        }
        if self.headless {
            log::info!("Platform layer running headless");
        } else {
            log::info!("Platform layer window {}x{}", self.width, self.height);
        }
        Ok(())
    }

    fn event(&mut self, _ctx: &ModuleContext<'_>, event: &PlatformEvent) -> PhaseResult {
        match *event {
            PlatformEvent::Quit => self.quit_requested = true,
            PlatformEvent::WindowResized { width, height } => {
                if width == 0 || height == 0 {
                    return Err(PhaseError::new(format!("invalid window size {}x{}", width, height)));
                }
                self.width = width;
                self.height = height;
            }
            PlatformEvent::WindowFocus { focused } => self.focused = focused,
            PlatformEvent::KeyDown { keycode, .. } => {
                if !self.keys_down.contains(&keycode) {
                    self.keys_down.push(keycode);
                }
            }
            PlatformEvent::KeyUp { keycode } => self.keys_down.retain(|k| *k != keycode),
            _ => {}
        }
        Ok(())
    }

    fn destroy(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.keys_down.clear();
        log::info!("Platform layer closed");
        Ok(())
    }
}

/// Logs what the module manager is doing
#[derive(Debug)]
pub struct DebugModule {
    report_every: u64,
    reports: u64,
}

impl DebugModule {
    pub fn new(report_every: u64) -> Self {
        Self {
            report_every: report_every.max(1),
            reports: 0,
        }
    }

    pub fn reports(&self) -> u64 {
        self.reports
    }
}

impl Module for DebugModule {
    fn init(&mut self, ctx: &ModuleContext<'_>) -> PhaseResult {
        for module in ctx.manager().modules() {
            log::debug!("  {} [{}] in '{}'", module.id(), module.state(), module.domain());
        }
        Ok(())
    }

    fn update(&mut self, ctx: &ModuleContext<'_>, time: &FrameTime) -> PhaseResult {
        if time.frame % self.report_every != 0 {
            return Ok(());
        }
        self.reports += 1;
        let live = ctx.manager().len();
        match ctx.get::<CoreModule>(CORE) {
            Ok(core) => log::debug!(
                "Frame {}: {} module(s), {:.2} ms, {:.1} s elapsed",
                time.frame,
                live,
                core.last_delta_ms(),
                core.elapsed()
            ),
            Err(_) => log::debug!("Frame {}: {} module(s)", time.frame, live),
        }
        Ok(())
    }
}

/// Entity id
pub type Entity = u32;

/// Minimal entity registry other modules can query
#[derive(Debug, Default)]
pub struct EntitySystemModule {
    next: Entity,
    alive: Vec<Entity>,
}

impl EntitySystemModule {
    pub fn spawn(&mut self) -> Entity {
        self.next += 1;
        self.alive.push(self.next);
        self.next
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        let before = self.alive.len();
        self.alive.retain(|e| *e != entity);
        self.alive.len() != before
    }

    pub fn count(&self) -> usize {
        self.alive.len()
    }
}

impl Module for EntitySystemModule {
    fn init(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        // The world root
        self.spawn();
        Ok(())
    }

    fn destroy(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        log::debug!("Dropping {} entities", self.alive.len());
        self.alive.clear();
        Ok(())
    }
}

/// The runtime's own assembly
pub fn core_assembly(headless: bool) -> StaticAssembly {
    StaticAssembly::new(CORE_ASSEMBLY)
        .module(ModuleDescriptor::new(CORE, "Core", "CoreModule"), || {
            Some(Box::new(CoreModule::default()))
        })
        .module(
            ModuleDescriptor::new(SDL2, "SDL2", "Sdl2Module").depends_on(CORE),
            move || Some(Box::new(Sdl2Module::new(headless))),
        )
        .module(ModuleDescriptor::new(DEBUG, "Debug", "DebugModule"), || {
            Some(Box::new(DebugModule::new(60)))
        })
        .module(
            ModuleDescriptor::new(ENTITY_SYSTEM, "Entity System", "EntitySystemModule"),
            || Some(Box::new(EntitySystemModule::default())),
        )
}
