//! Dynamic library loading
//!
//! Thin layer over `libloading` that adds the engine's path conventions and
//! splits load failures into "nothing there" and "the OS loader refused it".

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::ffi::{c_char, CStr};
use std::path::{Path, PathBuf};

use libloading::Library;

use crate::error::LoadError;

/// A loaded shared library. Closing happens exactly once, either through
/// [`DynamicLibrary::unload`] or when the value is dropped.
pub struct DynamicLibrary {
    library: Library,
    path: PathBuf,
}

impl DynamicLibrary {
    /// Append the platform extension when `path` has none
    pub fn normalize_path(path: &Path) -> PathBuf {
        if path.extension().is_some() {
            path.to_path_buf()
        } else {
            path.with_extension(DLL_EXTENSION)
        }
    }

    /// Find the file a library path refers to. Besides the normalized path,
    /// the platform prefix (`lib` on unix) is tried, so `shadow_sample_assembly`
    /// finds `libshadow_sample_assembly.so`.
    pub fn locate(path: &Path) -> Option<PathBuf> {
        let normalized = Self::normalize_path(path);
        if normalized.is_file() {
            return Some(normalized);
        }

        if DLL_PREFIX.is_empty() {
            return None;
        }
        let file_name = normalized.file_name()?.to_str()?;
        if file_name.starts_with(DLL_PREFIX) {
            return None;
        }
        let prefixed = normalized.with_file_name(format!("{}{}", DLL_PREFIX, file_name));
        prefixed.is_file().then_some(prefixed)
    }

    /// Open a library
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let requested = path.as_ref();
        let path = Self::locate(requested)
            .ok_or_else(|| LoadError::NotFound(Self::normalize_path(requested)))?;

        // Safety: running a library's initializers is inherent to loading it;
        // assemblies are trusted engine plugins.
        let library = unsafe { Library::new(&path) }.map_err(|e| LoadError::LinkFailure {
            path: path.clone(),
            message: e.to_string(),
        })?;

        log::debug!("Opened library '{}'", path.display());
        Ok(Self { library, path })
    }

    /// Look up a symbol, `None` when it is absent
    ///
    /// # Safety
    /// `T` must match the actual type of the exported symbol.
    pub unsafe fn symbol<T: Copy>(&self, name: &str) -> Option<T> {
        unsafe { self.library.get::<T>(name.as_bytes()).ok().map(|s| *s) }
    }

    /// Read an exported `const char*` variable
    pub fn string_variable(&self, name: &str) -> Option<String> {
        // Safety: the variable is declared by the assembly ABI as a pointer
        // to a NUL-terminated string with static lifetime.
        unsafe {
            let variable = self.symbol::<*const *const c_char>(name)?;
            if variable.is_null() || (*variable).is_null() {
                return None;
            }
            Some(CStr::from_ptr(*variable).to_string_lossy().into_owned())
        }
    }

    /// The path the library was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the library. Consuming `self` makes a second close impossible.
    pub fn unload(self) {
        let path = self.path;
        match self.library.close() {
            Ok(()) => log::debug!("Closed library '{}'", path.display()),
            Err(e) => log::error!("Failed to close library '{}': {}", path.display(), e),
        }
    }
}

impl std::fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibrary").field("path", &self.path).finish()
    }
}
