//! Panic containment around module code
//!
//! A module callback that panics is treated exactly like one that returned
//! an error: the panic is caught at the call site and turned into a message.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::module::PhaseResult;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Run `f`, turning a panic into `Err(message)`
pub fn catch_panic<F, R>(f: F) -> Result<R, String>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

/// Run a module callback, folding returned errors and panics into one message
pub fn guard<F>(f: F) -> Result<(), String>
where
    F: FnOnce() -> PhaseResult,
{
    match catch_panic(f) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(message) => Err(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PhaseError;

    #[test]
    fn test_guard_ok() {
        assert_eq!(guard(|| Ok(())), Ok(()));
    }

    #[test]
    fn test_guard_error() {
        assert_eq!(guard(|| Err(PhaseError::new("no device"))), Err("no device".to_string()));
    }

    #[test]
    fn test_guard_panic() {
        let result = guard(|| panic!("boom"));
        assert_eq!(result, Err("panicked: boom".to_string()));
    }

    #[test]
    fn test_catch_panic_formatted_payload() {
        let result: Result<(), String> = catch_panic(|| panic!("code {}", 7));
        assert_eq!(result, Err("panicked: code 7".to_string()));
    }
}
