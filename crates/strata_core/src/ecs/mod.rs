//! # Entity Component Store
//!
//! Archetype-based, columnar storage for entity/component records.
//!
//! ## Design
//!
//! - Entities sharing a component set live in one [`ComponentArray`], one
//!   contiguous column per component type
//! - Archetypes are interned, so comparing them is a pointer comparison
//! - Rows are removed by swapping in the last row, keeping removal O(1)
//! - Query caches rebuild only when the manager's structural version moves

pub mod archetype;
pub mod array;
mod column;
pub mod component;
pub mod entity;
pub mod flags;
pub mod manager;
pub mod query;
pub mod set;

pub use archetype::{Archetype, ArchetypeRegistry};
pub use array::{ComponentArray, ComponentArrayMut};
pub use component::{Component, ComponentBundle, ComponentType, ComponentTypeRegistry, MAX_COMPONENT_TYPES};
pub use entity::{ArrayId, EntityId, EntityLocation};
pub use flags::ComponentTypeFlags;
pub use manager::{EntityManager, WorldId};
pub use query::{predicate, ArrayPredicate, EntityQueryCache};
pub use set::ComponentTypeSet;
