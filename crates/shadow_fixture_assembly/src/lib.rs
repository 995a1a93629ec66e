//! Assembly with a renamed but unexported entry point
//!
//! Names its registration entry through `assembly_entry_name` and never
//! exports that symbol, like a library built against a stale header.
//! Opening it succeeds; registering from it must fail cleanly.

use std::ffi::c_char;

/// Name of the registration entry point this library claims to export
pub const ENTRY_NAME: &str = "fixture_assembly_entry";

/// A `const char*` exported as a symbol
#[repr(transparent)]
pub struct EntryName(*const c_char);

// Safety: points at an immutable string literal.
unsafe impl Sync for EntryName {}

#[no_mangle]
#[allow(non_upper_case_globals)]
pub static assembly_entry_name: EntryName = EntryName(c"fixture_assembly_entry".as_ptr());

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_entry_name_matches() {
        let name = unsafe { CStr::from_ptr(assembly_entry_name.0) };
        assert_eq!(name.to_str().unwrap(), ENTRY_NAME);
    }
}
