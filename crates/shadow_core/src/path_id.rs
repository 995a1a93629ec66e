//! Namespaced path identifiers
//!
//! Modules and assemblies are named with ids of the form
//! `prelude[@namespace]:path`, e.g. `module:/renderer/vulkan` or
//! `assembly@game:/levels`. Ids are normalized on construction so two
//! spellings of the same id compare equal.

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// A normalized `prelude[@namespace]:path` identifier
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId {
    normalized: String,
    /// Byte offset of the separating colon
    colon: usize,
    /// Byte offset of the `@` when a namespace is present
    at: Option<usize>,
}

impl PathId {
    /// Parse and normalize an id
    pub fn parse(id: &str) -> Result<Self> {
        let id = id.trim();
        let colon = id.rfind(':').ok_or_else(|| CoreError::InvalidPath {
            id: id.to_string(),
            reason: "missing ':' separator",
        })?;

        let head = &id[..colon];
        let (prelude, namespace) = match head.find('@') {
            Some(at) => (&head[..at], Some(&head[at + 1..])),
            None => (head, None),
        };

        if prelude.is_empty() {
            return Err(CoreError::InvalidPath {
                id: id.to_string(),
                reason: "empty prelude",
            });
        }

        let path = id[colon + 1..].replace('\\', "/");

        let mut normalized = String::with_capacity(id.len());
        normalized.push_str(prelude);
        let at = match namespace.filter(|ns| !ns.is_empty()) {
            Some(ns) => {
                let at = normalized.len();
                normalized.push('@');
                normalized.push_str(ns);
                Some(at)
            }
            None => None,
        };
        let colon = normalized.len();
        normalized.push(':');
        normalized.push_str(&path);

        Ok(Self {
            normalized,
            colon,
            at,
        })
    }

    /// The part before the namespace/colon, e.g. `module`
    pub fn prelude(&self) -> &str {
        &self.normalized[..self.at.unwrap_or(self.colon)]
    }

    /// The optional namespace between `@` and `:`
    pub fn namespace(&self) -> Option<&str> {
        self.at.map(|at| &self.normalized[at + 1..self.colon])
    }

    /// The path after the colon, e.g. `/renderer/vulkan`
    pub fn path(&self) -> &str {
        &self.normalized[self.colon + 1..]
    }

    /// Last non-empty path segment, e.g. `vulkan`
    pub fn leaf(&self) -> &str {
        self.path()
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("")
    }

    /// The full normalized id
    pub fn as_str(&self) -> &str {
        &self.normalized
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl fmt::Debug for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathId({})", self.normalized)
    }
}

impl FromStr for PathId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for PathId {
    fn as_ref(&self) -> &str {
        &self.normalized
    }
}
