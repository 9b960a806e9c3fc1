//! Log levels
//!
//! Levels are plain integers so applications can register their own beyond
//! the built-in DEBUG/WARNING/ERROR. Level 0 is reserved.

use std::collections::BTreeMap;

pub const DEBUG: i32 = 1;
pub const WARNING: i32 = 2;
pub const ERROR: i32 = 3;

/// Sentinel level that never gets a name
pub const RESERVED: i32 = 0;

/// Levels routed to the driver-station hardware channel instead of the console
///
/// These share numeric values with [`WARNING`] and [`ERROR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareLevel {
    Warning = 2,
    Error = 3,
}

impl HardwareLevel {
    /// Interpret a numeric level in the hardware channel namespace
    pub fn from_level(level: i32) -> Option<Self> {
        match level {
            2 => Some(HardwareLevel::Warning),
            3 => Some(HardwareLevel::Error),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, HardwareLevel::Error)
    }
}

/// Level number to display name table
#[derive(Debug, Clone)]
pub struct LevelRegistry {
    names: BTreeMap<i32, String>,
}

impl LevelRegistry {
    /// Register a custom level
    ///
    /// Returns false for the reserved level 0 or a level that already has a
    /// name; existing names are never replaced.
    pub fn add(&mut self, level: i32, name: impl Into<String>) -> bool {
        if level == RESERVED || self.names.contains_key(&level) {
            return false;
        }
        self.names.insert(level, name.into());
        true
    }

    /// Display name for a level, empty if unregistered
    pub fn name(&self, level: i32) -> &str {
        self.names.get(&level).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, level: i32) -> bool {
        self.names.contains_key(&level)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.names.iter().map(|(l, n)| (*l, n.as_str()))
    }
}

impl Default for LevelRegistry {
    fn default() -> Self {
        let names = [(DEBUG, "DEBUG"), (WARNING, "WARNING"), (ERROR, "ERROR")]
            .into_iter()
            .map(|(l, n)| (l, n.to_string()))
            .collect();
        Self { names }
    }
}
