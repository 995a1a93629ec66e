//! Sample module assembly
//!
//! Built as a shared library and loaded by the runtime with
//! `shadow -game target/debug/shadow_sample_assembly`. Exports the
//! registration entry point plus one module entry per class.

use std::ffi::c_void;

use shadow_module::ffi::{
    FfiFrameTime, FfiModuleDescriptor, FfiModuleHandle, FfiModuleVTable, FfiPlatformEvent, FfiRegistrar, FfiStatus,
    SHADOW_MODULE_API_VERSION,
};

/// Greets once on init and counts frames until destroyed
#[derive(Debug, Default)]
pub struct Greeter {
    frames: u64,
    keys: u64,
    initialized: bool,
}

impl Greeter {
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Registers this assembly's descriptors with the host
///
/// # Safety
///
/// `registrar` must be the valid registrar passed in by the host.
#[no_mangle]
pub unsafe extern "C" fn assembly_entry(registrar: *mut FfiRegistrar) {
    let Some(registrar) = (unsafe { registrar.as_mut() }) else {
        return;
    };
    if registrar.api_version != SHADOW_MODULE_API_VERSION {
        return;
    }

    let dependencies = [c"module:/core".as_ptr()];
    let descriptor = FfiModuleDescriptor {
        id: c"module:/sample/greeter".as_ptr(),
        name: c"Greeter".as_ptr(),
        class_name: c"GreeterModule".as_ptr(),
        assembly: std::ptr::null(),
        dependencies: dependencies.as_ptr(),
        dependency_count: dependencies.len(),
    };
    let _ = unsafe { registrar.add(&descriptor) };
}

unsafe fn greeter<'a>(instance: *mut c_void) -> Option<&'a mut Greeter> {
    unsafe { instance.cast::<Greeter>().as_mut() }
}

fn status(ok: bool) -> FfiStatus {
    if ok {
        FfiStatus::OK
    } else {
        FfiStatus::INVALID_ARGUMENT
    }
}

unsafe extern "C" fn noop(instance: *mut c_void) -> FfiStatus {
    status(!instance.is_null())
}

unsafe extern "C" fn greeter_init(instance: *mut c_void) -> FfiStatus {
    match unsafe { greeter(instance) } {
        Some(greeter) => {
            greeter.initialized = true;
            println!("Hello from the sample assembly");
            FfiStatus::OK
        }
        None => FfiStatus::INVALID_ARGUMENT,
    }
}

unsafe extern "C" fn greeter_update(instance: *mut c_void, time: FfiFrameTime) -> FfiStatus {
    match unsafe { greeter(instance) } {
        Some(greeter) if greeter.initialized => {
            greeter.frames = time.frame;
            FfiStatus::OK
        }
        Some(_) => FfiStatus::ERROR,
        None => FfiStatus::INVALID_ARGUMENT,
    }
}

unsafe extern "C" fn greeter_event(instance: *mut c_void, event: *const FfiPlatformEvent) -> FfiStatus {
    let (Some(greeter), Some(event)) = (unsafe { greeter(instance) }, unsafe { event.as_ref() }) else {
        return FfiStatus::INVALID_ARGUMENT;
    };
    if event.kind == FfiPlatformEvent::KIND_KEY_DOWN {
        greeter.keys += 1;
    }
    FfiStatus::OK
}

unsafe extern "C" fn greeter_destroy(instance: *mut c_void) -> FfiStatus {
    match unsafe { greeter(instance) } {
        Some(greeter) => {
            println!("Goodbye after {} frame(s) and {} key press(es)", greeter.frames, greeter.keys);
            greeter.initialized = false;
            FfiStatus::OK
        }
        None => FfiStatus::INVALID_ARGUMENT,
    }
}

unsafe extern "C" fn greeter_release(instance: *mut c_void) {
    if !instance.is_null() {
        drop(unsafe { Box::from_raw(instance.cast::<Greeter>()) });
    }
}

static GREETER_VTABLE: FfiModuleVTable = FfiModuleVTable {
    api_version: SHADOW_MODULE_API_VERSION,
    pre_init: Some(noop),
    init: Some(greeter_init),
    update: Some(greeter_update),
    pre_render: Some(noop),
    render: Some(noop),
    late_render: Some(noop),
    after_frame_end: Some(noop),
    event: Some(greeter_event),
    destroy: Some(greeter_destroy),
    release: Some(greeter_release),
};

/// Construct a `GreeterModule`; the host releases it through the vtable
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn GreeterModule_entry() -> FfiModuleHandle {
    FfiModuleHandle {
        instance: Box::into_raw(Box::<Greeter>::default()).cast(),
        vtable: &GREETER_VTABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadow_module::ModuleDescriptor;

    unsafe extern "C" fn collect(context: *mut c_void, raw: *const FfiModuleDescriptor) -> FfiStatus {
        let out = unsafe { &mut *context.cast::<Vec<ModuleDescriptor>>() };
        match unsafe { (*raw).to_descriptor() } {
            Ok(descriptor) => {
                out.push(descriptor);
                FfiStatus::OK
            }
            Err(_) => FfiStatus::INVALID_ARGUMENT,
        }
    }

    #[test]
    fn test_entry_registers_greeter() {
        let mut found: Vec<ModuleDescriptor> = Vec::new();
        let mut registrar = FfiRegistrar {
            api_version: SHADOW_MODULE_API_VERSION,
            context: (&mut found as *mut Vec<ModuleDescriptor>).cast(),
            add_descriptor: collect,
        };
        unsafe { assembly_entry(&mut registrar) };

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "module:/sample/greeter");
        assert_eq!(found[0].class_name, "GreeterModule");
        assert_eq!(found[0].dependencies, vec!["module:/core".to_string()]);
    }

    #[test]
    fn test_wrong_api_version_registers_nothing() {
        let mut found: Vec<ModuleDescriptor> = Vec::new();
        let mut registrar = FfiRegistrar {
            api_version: SHADOW_MODULE_API_VERSION + 1,
            context: (&mut found as *mut Vec<ModuleDescriptor>).cast(),
            add_descriptor: collect,
        };
        unsafe { assembly_entry(&mut registrar) };
        assert!(found.is_empty());
    }

    #[test]
    fn test_vtable_is_complete() {
        let handle = GreeterModule_entry();
        assert!(!handle.is_null());
        let vtable = unsafe { &*handle.vtable };
        assert_eq!(vtable.missing_slot(), None);

        unsafe {
            assert!(!(vtable.update.unwrap())(handle.instance, FfiFrameTime::default()).is_ok());
            assert!((vtable.init.unwrap())(handle.instance).is_ok());
            let time = FfiFrameTime {
                frame: 7,
                ..FfiFrameTime::default()
            };
            assert!((vtable.update.unwrap())(handle.instance, time).is_ok());
            assert_eq!(greeter(handle.instance).unwrap().frames(), 7);
            (vtable.release.unwrap())(handle.instance);
        }
    }
}
