//! Modules living in a shared library
//!
//! [`NativeModule`] adapts a constructed [`FfiModuleHandle`] to the
//! [`Module`] trait. The owning library must stay loaded for as long as the
//! wrapper exists; the manager drops instances before releasing their
//! assembly.

use std::ffi::c_void;

use shadow_core::FrameTime;

use crate::error::PhaseError;
use crate::ffi::{FfiFrameTime, FfiModuleHandle, FfiModuleVTable, FfiPlatformEvent, FfiStatus, SHADOW_MODULE_API_VERSION};
use crate::manager::ModuleContext;
use crate::module::{Module, PhaseResult, PlatformEvent};

/// A module constructed by a `<ClassName>_entry` symbol
pub struct NativeModule {
    class_name: String,
    instance: *mut c_void,
    vtable: FfiModuleVTable,
}

// Safety: the instance is only touched through `&mut self`, from whichever
// thread currently owns the manager.
unsafe impl Send for NativeModule {}

impl NativeModule {
    /// Take ownership of a handle, validating its capability table
    ///
    /// # Safety
    /// `handle` must come from a constructor of a library that outlives the
    /// returned value, and must not be used elsewhere afterwards.
    pub unsafe fn from_handle(class_name: &str, handle: FfiModuleHandle) -> Result<Self, String> {
        if handle.is_null() {
            return Err("constructor returned null".to_string());
        }
        let vtable = unsafe { *handle.vtable };

        let release = vtable.release;
        let reject = |reason: String| {
            if let Some(release) = release {
                unsafe { release(handle.instance) };
            }
            Err(reason)
        };

        if vtable.api_version != SHADOW_MODULE_API_VERSION {
            return reject(format!(
                "API version mismatch: expected {}, got {}",
                SHADOW_MODULE_API_VERSION, vtable.api_version
            ));
        }
        if let Some(slot) = vtable.missing_slot() {
            return reject(format!("capability table has no '{}' slot", slot));
        }

        Ok(Self {
            class_name: class_name.to_string(),
            instance: handle.instance,
            vtable,
        })
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    fn status(&self, status: FfiStatus, what: &str) -> PhaseResult {
        if status.is_ok() {
            Ok(())
        } else {
            Err(PhaseError::new(format!(
                "{}::{} returned status {}",
                self.class_name, what, status.0
            )))
        }
    }

    fn call(&mut self, slot: Option<unsafe extern "C" fn(*mut c_void) -> FfiStatus>, what: &str) -> PhaseResult {
        match slot {
            // Safety: the slot was validated at construction and the
            // instance is alive until `release` runs in Drop.
            Some(f) => {
                let status = unsafe { f(self.instance) };
                self.status(status, what)
            }
            None => Ok(()),
        }
    }
}

impl Module for NativeModule {
    fn pre_init(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.call(self.vtable.pre_init, "pre_init")
    }

    fn init(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.call(self.vtable.init, "init")
    }

    fn update(&mut self, _ctx: &ModuleContext<'_>, time: &FrameTime) -> PhaseResult {
        match self.vtable.update {
            Some(f) => {
                let status = unsafe { f(self.instance, FfiFrameTime::from(time)) };
                self.status(status, "update")
            }
            None => Ok(()),
        }
    }

    fn pre_render(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.call(self.vtable.pre_render, "pre_render")
    }

    fn render(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.call(self.vtable.render, "render")
    }

    fn late_render(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.call(self.vtable.late_render, "late_render")
    }

    fn after_frame_end(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.call(self.vtable.after_frame_end, "after_frame_end")
    }

    fn event(&mut self, _ctx: &ModuleContext<'_>, event: &PlatformEvent) -> PhaseResult {
        match self.vtable.event {
            Some(f) => {
                let raw = FfiPlatformEvent::from(event);
                let status = unsafe { f(self.instance, &raw) };
                self.status(status, "event")
            }
            None => Ok(()),
        }
    }

    fn destroy(&mut self, _ctx: &ModuleContext<'_>) -> PhaseResult {
        self.call(self.vtable.destroy, "destroy")
    }
}

impl Drop for NativeModule {
    fn drop(&mut self) {
        if let Some(release) = self.vtable.release {
            log::trace!("Releasing native module {}", self.class_name);
            // Safety: `release` runs exactly once, here.
            unsafe { release(self.instance) };
        }
    }
}
