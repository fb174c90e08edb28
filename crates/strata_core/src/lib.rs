//! # STRATA Core
//!
//! In-memory, archetype-based entity/component store:
//! - Entities with the same component set share contiguous columns
//! - Adding or removing a component moves the entity between archetypes
//! - Typed spans give direct slice access with no per-element lookup
//!
//! ## Architecture Rules
//!
//! 1. **Single writer** - all structural mutation goes through `&mut EntityManager`
//! 2. **Versioned handles** - a destroyed entity's id never reaches its slot's next occupant
//! 3. **No silent fallbacks** - every contract violation is an [`EcsError`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{EntityManager, EntityQueryCache, ComponentType};
//!
//! let mut manager = EntityManager::new();
//! let moving = manager.archetypes().intern_bundle::<(Position, Velocity)>()?;
//! for _ in 0..3 {
//!     manager.create_entity(&moving)?;
//! }
//!
//! let mut array = manager.get_or_create_array(&moving)?;
//! let (pos, vel) = array.get_span_pair::<Position, Velocity>()?;
//! for (p, v) in pos.iter_mut().zip(vel.iter()) {
//!     p.x += v.x;
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::StoreConfig;
pub use ecs::{
    predicate, Archetype, ArchetypeRegistry, ArrayId, ArrayPredicate, Component, ComponentArray,
    ComponentArrayMut, ComponentBundle, ComponentType, ComponentTypeFlags, ComponentTypeRegistry,
    ComponentTypeSet, EntityId, EntityLocation, EntityManager, EntityQueryCache, WorldId,
};
pub use error::{EcsError, EcsResult};
