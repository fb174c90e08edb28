//! # Entity Handles
//!
//! Entities are lightweight identifiers consisting of:
//! - A slot into the manager's location table
//! - A version counter for safe reuse
//!
//! `EntityId` is itself a component: every archetype carries an identity
//! column holding the id of the entity stored in each row.

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Slot in the manager's location table
/// - Upper 32 bits: Version counter for detecting stale references
///
/// Versions start at 1, so the all-zero value (a freshly zeroed row) is
/// never a live handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity ID from slot and version.
    ///
    /// # Arguments
    ///
    /// * `slot` - The slot in the location table (0 to 2^32-1)
    /// * `version` - The version counter (0 to 2^32-1)
    #[inline]
    #[must_use]
    pub const fn new(slot: u32, version: u32) -> Self {
        Self(((version as u64) << 32) | (slot as u64))
    }

    /// Returns the slot portion of the entity ID.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn slot(self) -> u32 {
        self.0 as u32
    }

    /// Returns the version portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn version(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null/invalid entity ID.
    ///
    /// The manager never issues version `u32::MAX`, so no live handle
    /// compares equal to it.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "EntityId(null)")
        } else {
            write!(f, "EntityId({}.v{})", self.slot(), self.version())
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}.v{}", self.slot(), self.version())
        }
    }
}

/// Index of a component array inside its manager.
///
/// Arrays are never removed from a manager, so an `ArrayId` stays valid for
/// the manager's whole lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(pub(crate) u32);

impl ArrayId {
    /// Returns the position of the array in the manager's array list.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a live entity's data currently resides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityLocation {
    /// The array holding the entity.
    pub array: ArrayId,
    /// The entity's row within that array.
    pub row: usize,
}
