//! The module interface
//!
//! Every engine module, whether built in-process or loaded from a shared
//! library, is driven through the [`Module`] trait. All callbacks have no-op
//! defaults so a module only implements the phases it cares about.

use std::any::Any;
use std::fmt;

use shadow_core::FrameTime;

use crate::error::PhaseError;
use crate::manager::ModuleContext;

/// Result of a module callback
pub type PhaseResult = Result<(), PhaseError>;

/// Lifecycle and per-frame phases a module takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PreInit,
    Init,
    Update,
    PreRender,
    Render,
    LateRender,
    AfterFrameEnd,
    Event,
    Destroy,
}

impl Phase {
    /// Per-frame phases in the order a frame runs them
    pub const FRAME: [Phase; 5] = [
        Phase::Update,
        Phase::PreRender,
        Phase::Render,
        Phase::LateRender,
        Phase::AfterFrameEnd,
    ];

    /// Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Phase::PreInit => "PreInit",
            Phase::Init => "Init",
            Phase::Update => "Update",
            Phase::PreRender => "PreRender",
            Phase::Render => "Render",
            Phase::LateRender => "LateRender",
            Phase::AfterFrameEnd => "AfterFrameEnd",
            Phase::Event => "Event",
            Phase::Destroy => "Destroy",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    Other(u8),
}

impl MouseButton {
    /// Numeric code, 1-based like most platform layers
    pub fn code(&self) -> u32 {
        match self {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
            MouseButton::Other(n) => *n as u32,
        }
    }
}

/// Platform input and window events forwarded to modules
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    /// The user or the OS asked the application to close
    Quit,
    WindowResized { width: u32, height: u32 },
    WindowFocus { focused: bool },
    KeyDown { keycode: u32, repeat: bool },
    KeyUp { keycode: u32 },
    MouseMotion { x: f32, y: f32 },
    MouseButton { button: MouseButton, pressed: bool, x: f32, y: f32 },
    MouseWheel { dx: f32, dy: f32 },
    /// Application defined event
    Custom { code: u32, data: u64 },
}

impl PlatformEvent {
    pub fn is_quit(&self) -> bool {
        matches!(self, PlatformEvent::Quit)
    }
}

/// Upcast to `Any` for typed lookups
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Name of the concrete type
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// An engine module
///
/// The manager calls `pre_init` and `init` once, in dependency order, when
/// the module is activated. The frame callbacks then run every frame in
/// registration order until `destroy`.
///
/// Callbacks receive a [`ModuleContext`] for read-only lookups of other
/// modules. A module cannot look itself up while one of its callbacks runs.
pub trait Module: AsAny + Send {
    fn pre_init(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        Ok(())
    }

    fn init(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        Ok(())
    }

    fn update(&mut self, _ctx: &ModuleContext<'_>, _time: &FrameTime) -> PhaseResult {
        Ok(())
    }

    fn pre_render(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        Ok(())
    }

    fn render(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        Ok(())
    }

    fn late_render(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        Ok(())
    }

    fn after_frame_end(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        Ok(())
    }

    fn event(&mut self, _ctx: &ModuleContext<'_>, _event: &PlatformEvent) -> PhaseResult {
        Ok(())
    }

    fn destroy(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        Ok(())
    }
}

/// Argument for a single phase call
pub(crate) enum PhaseCall<'a> {
    Plain(Phase),
    Update(&'a FrameTime),
    Event(&'a PlatformEvent),
}

impl PhaseCall<'_> {
    pub(crate) fn phase(&self) -> Phase {
        match self {
            PhaseCall::Plain(phase) => *phase,
            PhaseCall::Update(_) => Phase::Update,
            PhaseCall::Event(_) => Phase::Event,
        }
    }

    pub(crate) fn dispatch(&self, module: &mut dyn Module, ctx: &ModuleContext<'_>) -> PhaseResult {
        match self {
            PhaseCall::Update(time) => module.update(ctx, time),
            PhaseCall::Event(event) => module.event(ctx, event),
            PhaseCall::Plain(Phase::PreInit) => module.pre_init(ctx),
            PhaseCall::Plain(Phase::Init) => module.init(ctx),
            PhaseCall::Plain(Phase::PreRender) => module.pre_render(ctx),
            PhaseCall::Plain(Phase::Render) => module.render(ctx),
            PhaseCall::Plain(Phase::LateRender) => module.late_render(ctx),
            PhaseCall::Plain(Phase::AfterFrameEnd) => module.after_frame_end(ctx),
            PhaseCall::Plain(Phase::Destroy) => module.destroy(ctx),
            PhaseCall::Plain(Phase::Update) | PhaseCall::Plain(Phase::Event) => {
                Err(PhaseError::new("phase requires an argument"))
            }
        }
    }
}
