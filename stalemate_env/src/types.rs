//! Common identifier types shared by the engine and the drivers.

use serde::{Deserialize, Serialize};

/// Identifier of a competing process.
///
/// The inner value is the process ordinal (its position in the process
/// list), which also fixes evaluation order in the discrete driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub usize);

impl ProcessId {
    /// Creates a process identifier from its ordinal.
    pub const fn new(ordinal: usize) -> Self {
        Self(ordinal)
    }

    /// Returns the ordinal.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0 + 1)
    }
}

/// Identifier of a resource (or resource type in banker mode).
///
/// The inner value doubles as the resource's position in the global
/// acquisition order used by the ordered policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub usize);

impl ResourceId {
    /// Creates a resource identifier from its ordinal.
    pub const fn new(ordinal: usize) -> Self {
        Self(ordinal)
    }

    /// Returns the ordinal.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0 + 1)
    }
}

/// Derives a sub-seed from a master seed and an extension.
///
/// `master * φ + extension * prime`, so neighbouring extensions land far apart
/// and adding workers never changes the seeds of existing ones.
pub fn derive_seed(master: u64, extension: u64) -> u64 {
    master
        .wrapping_mul(0x9e3779b97f4a7c15)
        .wrapping_add(extension.wrapping_mul(0x517cc1b727220a95))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_one_based() {
        assert_eq!(ProcessId::new(0).to_string(), "P1");
        assert_eq!(ResourceId::new(2).to_string(), "R3");
    }

    #[test]
    fn test_derive_seed_isolation() {
        let a = derive_seed(42, 0);
        let b = derive_seed(42, 1);
        assert_ne!(a, b);
        assert_eq!(a, derive_seed(42, 0));
        assert_ne!(derive_seed(42, 1), derive_seed(43, 1));
    }
}
