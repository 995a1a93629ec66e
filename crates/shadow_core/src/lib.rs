//! # shadow_core - Shadow Engine Core
//!
//! Small, dependency-light primitives shared by every other engine crate:
//! - **Handles**: generation-checked, non-owning references into an [`Arena`]
//! - **Path ids**: normalized, namespaced identifiers such as `module:/renderer/vulkan`
//! - **Delegates**: typed publish/subscribe callback lists
//! - **Frame clock**: per-frame timing handed to module `update` calls

pub mod delegate;
pub mod error;
pub mod handle;
pub mod path_id;
pub mod time;

pub use delegate::{Delegate, SubscriptionId};
pub use error::{CoreError, Result};
pub use handle::{Arena, Handle};
pub use path_id::PathId;
pub use time::{FrameClock, FrameTime};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::delegate::{Delegate, SubscriptionId};
    pub use crate::error::{CoreError, Result};
    pub use crate::handle::{Arena, Handle};
    pub use crate::path_id::PathId;
    pub use crate::time::{FrameClock, FrameTime};
}
