//! Slot names.
//!
//! Names are stored in a 32-byte NUL-terminated field. Backslashes are
//! normalised to `/` before storing or comparing, and comparisons are exact
//! byte matches after that (case-sensitive).

use crate::{CacheError, Result};
use std::fmt;

/// Width of the on-disk name field.
pub const NAME_FIELD_LEN: usize = 32;

/// Longest storable name (one byte is kept for the terminator).
pub const MAX_NAME_LEN: usize = NAME_FIELD_LEN - 1;

/// Canonical path separator inside names.
pub const SEPARATOR: char = '/';

/// Normalise path separators in a name.
///
/// # Examples
///
/// ```
/// use cryptcache_storage::normalize_name;
///
/// assert_eq!(normalize_name(r"lang\en\FOGAME"), "lang/en/FOGAME");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '\\' { SEPARATOR } else { c })
        .collect()
}

/// A validated, normalised slot name in its fixed-width field form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotName {
    bytes: [u8; NAME_FIELD_LEN],
}

impl SlotName {
    /// Validate and normalise `name`.
    ///
    /// Names are rejected instead of truncated, since two long names sharing
    /// a prefix would otherwise collide in one slot.
    pub fn new(name: &str) -> Result<Self> {
        let normalized = normalize_name(name);
        let invalid = |reason| CacheError::InvalidName {
            name: name.to_string(),
            reason,
        };

        if normalized.is_empty() {
            return Err(invalid("name is empty"));
        }
        if normalized.as_bytes().contains(&0) {
            return Err(invalid("name contains a NUL byte"));
        }
        if normalized.len() > MAX_NAME_LEN {
            return Err(invalid("name is longer than 31 bytes"));
        }

        let mut bytes = [0u8; NAME_FIELD_LEN];
        bytes[..normalized.len()].copy_from_slice(normalized.as_bytes());
        Ok(Self { bytes })
    }

    /// Build from a raw on-disk field. Bytes after the first NUL are ignored.
    pub fn from_field(field: &[u8; NAME_FIELD_LEN]) -> Self {
        let mut bytes = [0u8; NAME_FIELD_LEN];
        let len = field_len(field);
        bytes[..len].copy_from_slice(&field[..len]);
        Self { bytes }
    }

    /// The empty name held by unused slots.
    pub const fn empty() -> Self {
        Self {
            bytes: [0; NAME_FIELD_LEN],
        }
    }

    /// Name bytes without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..field_len(&self.bytes)]
    }

    /// The full fixed-width field.
    pub const fn field(&self) -> &[u8; NAME_FIELD_LEN] {
        &self.bytes
    }

    /// Whether the name is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes[0] == 0
    }

    /// Whether a raw on-disk field holds exactly this name.
    pub fn matches_field(&self, field: &[u8; NAME_FIELD_LEN]) -> bool {
        let len = field_len(&self.bytes);
        field[..len] == self.bytes[..len] && (len == NAME_FIELD_LEN || field[len] == 0)
    }

    /// Whether the name starts with `prefix` (after normalising the prefix).
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.as_bytes()
            .starts_with(normalize_name(prefix).as_bytes())
    }

    /// Name as text, with invalid UTF-8 replaced.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl fmt::Debug for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotName({:?})", self.to_string_lossy())
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

fn field_len(field: &[u8; NAME_FIELD_LEN]) -> usize {
    field.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_LEN)
}
