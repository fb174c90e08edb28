//! # Store Error Types
//!
//! All errors that can occur while operating on the entity store.
//! Every variant is a caller-visible contract violation or a capacity limit;
//! nothing is retried or downgraded to a default value internally.

use thiserror::Error;

use crate::ecs::EntityId;

/// Errors that can occur in the entity store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// More distinct component types were registered than a one-byte id can address.
    #[error("component type capacity exceeded: at most {limit} component types can be registered")]
    CapacityExceeded {
        /// The maximum number of component types.
        limit: usize,
    },

    /// A component-type id that no type has been registered under.
    #[error("no component type registered with id {0}")]
    UnknownComponentId(u8),

    /// Typed or untyped access to a component that is not part of the archetype.
    #[error("column not found: {component} is not part of {archetype}")]
    ColumnNotFound {
        /// Name of the requested component type.
        component: &'static str,
        /// Readable form of the archetype that was searched.
        archetype: String,
    },

    /// The handle refers to a destroyed entity or to an older occupant of its slot.
    #[error("stale entity handle {entity}: slot is at version {current}")]
    StaleHandle {
        /// The handle that was used.
        entity: EntityId,
        /// The slot's current version.
        current: u32,
    },

    /// The handle's slot was never allocated by this manager.
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// Attempted to remove more rows than the array holds.
    #[error("row count out of range: {requested} rows requested, {available} available")]
    RowsOutOfRange {
        /// Number of rows requested.
        requested: usize,
        /// Number of rows available.
        available: usize,
    },

    /// A row index outside `0..count`.
    #[error("row {row} out of range (count {count})")]
    RowOutOfRange {
        /// The row that was accessed.
        row: usize,
        /// The array's row count.
        count: usize,
    },

    /// Attempted to set capacity below the number of rows in use.
    #[error("cannot set capacity to {requested}: array already holds {count} rows")]
    CapacityBelowCount {
        /// The requested capacity.
        requested: usize,
        /// The array's row count.
        count: usize,
    },

    /// An untyped value whose byte length does not match the component size.
    #[error("value size mismatch for {component}: expected {expected} bytes, got {actual}")]
    ValueSizeMismatch {
        /// Name of the component type.
        component: &'static str,
        /// Size of the component in bytes.
        expected: usize,
        /// Length of the supplied value.
        actual: usize,
    },

    /// The same column was requested twice for simultaneous mutable access.
    #[error("column {0} requested twice for mutable access")]
    DuplicateColumn(&'static str),

    /// Write access to the entity identity column outside the manager.
    #[error("the entity identity column is read-only")]
    ReadOnlyColumn,

    /// The archetype was interned by a different archetype registry.
    #[error("archetype {0} belongs to a different archetype registry")]
    ForeignArchetype(String),

    /// A query cache was used with a manager other than the one it was built for.
    #[error("query cache belongs to a different world")]
    ForeignWorld,

    /// Invalid configuration file or values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for store operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_handle_message() {
        let err = EcsError::StaleHandle {
            entity: EntityId::new(3, 1),
            current: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("3.v1"));
        assert!(msg.contains("version 2"));
    }

    #[test]
    fn test_capacity_exceeded_message() {
        let err = EcsError::CapacityExceeded { limit: 256 };
        assert!(err.to_string().contains("256"));
    }
}
