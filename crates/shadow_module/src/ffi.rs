//! C ABI shared with assembly libraries
//!
//! A library exports two kinds of symbols:
//!
//! - `assembly_entry(*mut FfiRegistrar)`, called once after loading, which
//!   registers the library's module descriptors. The name can be overridden
//!   by exporting a `const char* assembly_entry_name` variable.
//! - `<ClassName>_entry() -> FfiModuleHandle`, one per module class, which
//!   hands ownership of a heap allocated module to the engine.
//!
//! A module crosses the boundary as an opaque instance pointer plus a
//! capability table of function pointers. All types are `#[repr(C)]`.

use std::ffi::{c_char, c_void, CStr};

use shadow_core::FrameTime;

use crate::descriptor::ModuleDescriptor;
use crate::module::{MouseButton, PlatformEvent};

/// API version for compatibility checking
pub const SHADOW_MODULE_API_VERSION: u32 = 1;

/// Default registration entry point
pub const ASSEMBLY_ENTRY_SYMBOL: &str = "assembly_entry";

/// Optional variable naming a different registration entry point
pub const ASSEMBLY_ENTRY_NAME_SYMBOL: &str = "assembly_entry_name";

/// Symbol of the constructor for a module class
pub fn module_entry_symbol(class_name: &str) -> String {
    format!("{}_entry", class_name)
}

/// Status returned by every callback
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FfiStatus(pub i32);

impl FfiStatus {
    pub const OK: Self = Self(0);
    pub const ERROR: Self = Self(1);
    pub const INVALID_ARGUMENT: Self = Self(2);

    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }
}

/// Descriptor as passed by `assembly_entry`
///
/// All strings are NUL-terminated UTF-8 and only need to live for the
/// duration of the `add_descriptor` call. `assembly` may be null, in which
/// case the registering assembly's id is used.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiModuleDescriptor {
    pub id: *const c_char,
    pub name: *const c_char,
    pub class_name: *const c_char,
    pub assembly: *const c_char,
    pub dependencies: *const *const c_char,
    pub dependency_count: usize,
}

unsafe fn read_str(ptr: *const c_char, field: &str) -> Result<String, String> {
    if ptr.is_null() {
        return Err(format!("'{}' is null", field));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_owned)
        .map_err(|_| format!("'{}' is not valid UTF-8", field))
}

impl FfiModuleDescriptor {
    /// Copy into an owned descriptor
    ///
    /// # Safety
    /// Every non-null pointer must point to a valid NUL-terminated string and
    /// `dependencies` must point to `dependency_count` such pointers.
    pub unsafe fn to_descriptor(&self) -> Result<ModuleDescriptor, String> {
        unsafe {
            let mut descriptor = ModuleDescriptor::new(
                read_str(self.id, "id")?,
                read_str(self.name, "name")?,
                read_str(self.class_name, "class_name")?,
            );
            if !self.assembly.is_null() {
                descriptor.assembly = read_str(self.assembly, "assembly")?;
            }

            if self.dependency_count > 0 {
                if self.dependencies.is_null() {
                    return Err("'dependencies' is null".to_string());
                }
                let deps = std::slice::from_raw_parts(self.dependencies, self.dependency_count);
                for dep in deps {
                    descriptor.dependencies.push(read_str(*dep, "dependencies")?);
                }
            }
            Ok(descriptor)
        }
    }
}

/// Registry handle passed to `assembly_entry`
#[repr(C)]
pub struct FfiRegistrar {
    pub api_version: u32,
    pub context: *mut c_void,
    pub add_descriptor: unsafe extern "C" fn(*mut c_void, *const FfiModuleDescriptor) -> FfiStatus,
}

impl FfiRegistrar {
    /// Register a descriptor from inside `assembly_entry`
    ///
    /// # Safety
    /// `self` must be the registrar passed to the entry point, and
    /// `descriptor` must satisfy [`FfiModuleDescriptor::to_descriptor`].
    pub unsafe fn add(&mut self, descriptor: &FfiModuleDescriptor) -> FfiStatus {
        unsafe { (self.add_descriptor)(self.context, descriptor) }
    }
}

/// Signature of the registration entry point
pub type AssemblyEntryFn = unsafe extern "C" fn(*mut FfiRegistrar);

/// Owned module crossing the boundary
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiModuleHandle {
    pub instance: *mut c_void,
    pub vtable: *const FfiModuleVTable,
}

impl FfiModuleHandle {
    pub const fn null() -> Self {
        Self {
            instance: std::ptr::null_mut(),
            vtable: std::ptr::null(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.instance.is_null() || self.vtable.is_null()
    }
}

/// Signature of a `<ClassName>_entry` constructor
pub type ModuleEntryFn = unsafe extern "C" fn() -> FfiModuleHandle;

type Callback = unsafe extern "C" fn(*mut c_void) -> FfiStatus;

/// Capability table of a native module
///
/// Every slot is required; a module that has nothing to do in a phase points
/// the slot at a function returning [`FfiStatus::OK`]. `release` frees the
/// instance and is called exactly once, after `destroy`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiModuleVTable {
    pub api_version: u32,
    pub pre_init: Option<Callback>,
    pub init: Option<Callback>,
    pub update: Option<unsafe extern "C" fn(*mut c_void, FfiFrameTime) -> FfiStatus>,
    pub pre_render: Option<Callback>,
    pub render: Option<Callback>,
    pub late_render: Option<Callback>,
    pub after_frame_end: Option<Callback>,
    pub event: Option<unsafe extern "C" fn(*mut c_void, *const FfiPlatformEvent) -> FfiStatus>,
    pub destroy: Option<Callback>,
    pub release: Option<unsafe extern "C" fn(*mut c_void)>,
}

impl FfiModuleVTable {
    /// Name of the first empty slot, if any
    pub fn missing_slot(&self) -> Option<&'static str> {
        let slots: [(&'static str, bool); 10] = [
            ("pre_init", self.pre_init.is_some()),
            ("init", self.init.is_some()),
            ("update", self.update.is_some()),
            ("pre_render", self.pre_render.is_some()),
            ("render", self.render.is_some()),
            ("late_render", self.late_render.is_some()),
            ("after_frame_end", self.after_frame_end.is_some()),
            ("event", self.event.is_some()),
            ("destroy", self.destroy.is_some()),
            ("release", self.release.is_some()),
        ];
        slots.iter().find(|(_, present)| !present).map(|(name, _)| *name)
    }
}

/// Frame timing for `update`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfiFrameTime {
    pub frame: u64,
    pub delta: f32,
    pub elapsed: f64,
}

impl From<&FrameTime> for FfiFrameTime {
    fn from(t: &FrameTime) -> Self {
        Self {
            frame: t.frame,
            delta: t.delta,
            elapsed: t.elapsed,
        }
    }
}

/// Flattened platform event
///
/// `kind` selects which fields are meaningful; see the `KIND_*` constants.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfiPlatformEvent {
    pub kind: u32,
    pub x: f32,
    pub y: f32,
    pub code: u32,
    pub flags: u32,
    pub data: u64,
}

impl FfiPlatformEvent {
    pub const KIND_QUIT: u32 = 1;
    pub const KIND_WINDOW_RESIZED: u32 = 2;
    pub const KIND_WINDOW_FOCUS: u32 = 3;
    pub const KIND_KEY_DOWN: u32 = 4;
    pub const KIND_KEY_UP: u32 = 5;
    pub const KIND_MOUSE_MOTION: u32 = 6;
    pub const KIND_MOUSE_BUTTON: u32 = 7;
    pub const KIND_MOUSE_WHEEL: u32 = 8;
    pub const KIND_CUSTOM: u32 = 100;

    /// Set in `flags` for key repeats, button presses and focus gain
    pub const FLAG_ACTIVE: u32 = 1;
}

impl From<&PlatformEvent> for FfiPlatformEvent {
    fn from(event: &PlatformEvent) -> Self {
        let flag = |on: bool| if on { Self::FLAG_ACTIVE } else { 0 };
        let mut out = Self::default();
        match *event {
            PlatformEvent::Quit => out.kind = Self::KIND_QUIT,
            PlatformEvent::WindowResized { width, height } => {
                out.kind = Self::KIND_WINDOW_RESIZED;
                out.x = width as f32;
                out.y = height as f32;
            }
            PlatformEvent::WindowFocus { focused } => {
                out.kind = Self::KIND_WINDOW_FOCUS;
                out.flags = flag(focused);
            }
            PlatformEvent::KeyDown { keycode, repeat } => {
                out.kind = Self::KIND_KEY_DOWN;
                out.code = keycode;
                out.flags = flag(repeat);
            }
            PlatformEvent::KeyUp { keycode } => {
                out.kind = Self::KIND_KEY_UP;
                out.code = keycode;
            }
            PlatformEvent::MouseMotion { x, y } => {
                out.kind = Self::KIND_MOUSE_MOTION;
                out.x = x;
                out.y = y;
            }
            PlatformEvent::MouseButton { button, pressed, x, y } => {
                out.kind = Self::KIND_MOUSE_BUTTON;
                out.code = button.code();
                out.flags = flag(pressed);
                out.x = x;
                out.y = y;
            }
            PlatformEvent::MouseWheel { dx, dy } => {
                out.kind = Self::KIND_MOUSE_WHEEL;
                out.x = dx;
                out.y = dy;
            }
            PlatformEvent::Custom { code, data } => {
                out.kind = Self::KIND_CUSTOM;
                out.code = code;
                out.data = data;
            }
        }
        out
    }
}

impl From<u32> for MouseButton {
    fn from(code: u32) -> Self {
        match code {
            1 => MouseButton::Left,
            2 => MouseButton::Middle,
            3 => MouseButton::Right,
            n => MouseButton::Other(n as u8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_entry_symbol() {
        assert_eq!(module_entry_symbol("Sdl2Module"), "Sdl2Module_entry");
    }

    #[test]
    fn test_descriptor_conversion() {
        let id = CString::new("module:/game").unwrap();
        let name = CString::new("Game").unwrap();
        let class = CString::new("GameModule").unwrap();
        let dep = CString::new("module:/core").unwrap();
        let deps = [dep.as_ptr()];

        let raw = FfiModuleDescriptor {
            id: id.as_ptr(),
            name: name.as_ptr(),
            class_name: class.as_ptr(),
            assembly: std::ptr::null(),
            dependencies: deps.as_ptr(),
            dependency_count: deps.len(),
        };

        let descriptor = unsafe { raw.to_descriptor() }.unwrap();
        assert_eq!(descriptor.id, "module:/game");
        assert_eq!(descriptor.assembly, "");
        assert_eq!(descriptor.dependencies, vec!["module:/core".to_string()]);
    }

    #[test]
    fn test_null_field_is_rejected() {
        let raw = FfiModuleDescriptor {
            id: std::ptr::null(),
            name: std::ptr::null(),
            class_name: std::ptr::null(),
            assembly: std::ptr::null(),
            dependencies: std::ptr::null(),
            dependency_count: 0,
        };
        let err = unsafe { raw.to_descriptor() }.unwrap_err();
        assert!(err.contains("id"));
    }

    #[test]
    fn test_event_flattening() {
        let ffi = FfiPlatformEvent::from(&PlatformEvent::MouseButton {
            button: MouseButton::Right,
            pressed: true,
            x: 4.0,
            y: 2.0,
        });
        assert_eq!(ffi.kind, FfiPlatformEvent::KIND_MOUSE_BUTTON);
        assert_eq!(ffi.code, 3);
        assert_eq!(ffi.flags, FfiPlatformEvent::FLAG_ACTIVE);
        assert_eq!(MouseButton::from(ffi.code), MouseButton::Right);
    }

    #[test]
    fn test_missing_slot() {
        let vtable = FfiModuleVTable {
            api_version: SHADOW_MODULE_API_VERSION,
            pre_init: None,
            init: None,
            update: None,
            pre_render: None,
            render: None,
            late_render: None,
            after_frame_end: None,
            event: None,
            destroy: None,
            release: None,
        };
        assert_eq!(vtable.missing_slot(), Some("pre_init"));
    }
}
