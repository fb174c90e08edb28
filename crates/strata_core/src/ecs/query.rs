//! # Query Cache
//!
//! Remembers which arrays of a manager satisfy a list of predicates, and
//! recomputes that list only when the manager's structural version moves.
//!
//! ```rust,ignore
//! let mut moving = EntityQueryCache::requiring(&manager, &[pos, vel]);
//!
//! // Once per tick
//! moving.update(&manager)?;
//! for mut array in moving.iter_mut(&mut manager)? {
//!     let (p, v) = array.get_span_pair::<Position, Velocity>()?;
//!     // ...
//! }
//! ```
//!
//! Iteration never refreshes the cache by itself; call
//! [`EntityQueryCache::update`] first.

use super::array::{ComponentArray, ComponentArrayMut};
use super::component::ComponentType;
use super::entity::ArrayId;
use super::flags::ComponentTypeFlags;
use super::manager::{EntityManager, WorldId};
use crate::error::{EcsError, EcsResult};

/// Filter over whole arrays.
pub type ArrayPredicate = Box<dyn Fn(&ComponentArray) -> bool + Send + Sync>;

/// Version-gated list of the arrays matching a set of predicates.
pub struct EntityQueryCache {
    world: WorldId,
    predicates: Vec<ArrayPredicate>,
    /// Manager version at the last rebuild; `None` before the first.
    version: Option<u64>,
    /// Matching arrays, ascending.
    arrays: Vec<ArrayId>,
}

impl EntityQueryCache {
    /// Creates an empty cache bound to `manager`.
    ///
    /// Predicates run in the given order and stop at the first rejection,
    /// so cheap tests belong first.
    #[must_use]
    pub fn new(manager: &EntityManager, predicates: Vec<ArrayPredicate>) -> Self {
        Self {
            world: manager.world_id(),
            predicates,
            version: None,
            arrays: Vec::new(),
        }
    }

    /// Cache over every array whose archetype contains all of `types`.
    #[must_use]
    pub fn requiring(manager: &EntityManager, types: &[ComponentType]) -> Self {
        let flags = types.iter().map(ComponentType::id).collect();
        Self::new(manager, vec![predicate::contains_all(flags)])
    }

    /// Rebuilds the list if the manager changed structurally.
    ///
    /// Returns `true` if a rebuild happened.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ForeignWorld`] if `manager` is not the one this
    /// cache was created for.
    #[allow(clippy::cast_possible_truncation)]
    pub fn update(&mut self, manager: &EntityManager) -> EcsResult<bool> {
        self.check_world(manager)?;
        if self.version == Some(manager.version()) {
            return Ok(false);
        }

        self.arrays.clear();
        for (index, array) in manager.arrays().iter().enumerate() {
            if self.predicates.iter().all(|p| p(array)) {
                // Arrays are indexed by u32 ids, so the index always fits
                self.arrays.push(ArrayId(index as u32));
            }
        }
        self.version = Some(manager.version());
        tracing::trace!(version = manager.version(), matched = self.arrays.len(), "rebuilt query cache");
        Ok(true)
    }

    /// The arrays matched at the last [`EntityQueryCache::update`].
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ForeignWorld`] for another manager.
    pub fn iter<'a>(
        &'a self,
        manager: &'a EntityManager,
    ) -> EcsResult<impl Iterator<Item = &'a ComponentArray> + 'a> {
        self.check_world(manager)?;
        Ok(self
            .arrays
            .iter()
            .filter_map(move |id| manager.array_by_id(*id)))
    }

    /// Mutable views of the arrays matched at the last update.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ForeignWorld`] for another manager.
    pub fn iter_mut<'a>(
        &'a self,
        manager: &'a mut EntityManager,
    ) -> EcsResult<impl Iterator<Item = ComponentArrayMut<'a>> + 'a> {
        self.check_world(manager)?;
        let mut wanted = self.arrays.iter().map(|id| id.index()).peekable();
        Ok(manager
            .arrays_mut()
            .iter_mut()
            .enumerate()
            .filter_map(move |(index, array)| {
                if wanted.peek() == Some(&index) {
                    wanted.next();
                    Some(ComponentArrayMut::new(array))
                } else {
                    None
                }
            }))
    }

    /// Number of arrays matched at the last update.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Returns `true` if no array matched at the last update.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Ids of the arrays matched at the last update.
    #[must_use]
    pub fn array_ids(&self) -> &[ArrayId] {
        &self.arrays
    }

    /// Manager version the list was built against.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    fn check_world(&self, manager: &EntityManager) -> EcsResult<()> {
        if manager.world_id() == self.world {
            Ok(())
        } else {
            Err(EcsError::ForeignWorld)
        }
    }
}

impl std::fmt::Debug for EntityQueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityQueryCache")
            .field("world", &self.world)
            .field("predicates", &self.predicates.len())
            .field("version", &self.version)
            .field("arrays", &self.arrays)
            .finish()
    }
}

/// Common predicates.
pub mod predicate {
    use super::{ArrayPredicate, ComponentArray, ComponentType, ComponentTypeFlags};

    /// Accepts arrays whose archetype contains every id in `flags`.
    #[must_use]
    pub fn contains_all(flags: ComponentTypeFlags) -> ArrayPredicate {
        Box::new(move |array: &ComponentArray| array.archetype().flags().contains_all(&flags))
    }

    /// Accepts arrays whose archetype contains `ty`.
    #[must_use]
    pub fn contains(ty: ComponentType) -> ArrayPredicate {
        Box::new(move |array: &ComponentArray| array.archetype().contains(ty))
    }

    /// Accepts arrays whose archetype contains none of the ids in `flags`.
    #[must_use]
    pub fn excludes(flags: ComponentTypeFlags) -> ArrayPredicate {
        Box::new(move |array: &ComponentArray| !array.archetype().flags().intersects(&flags))
    }

    /// Accepts arrays holding at least one row.
    #[must_use]
    pub fn non_empty() -> ArrayPredicate {
        Box::new(|array: &ComponentArray| !array.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Mass(f32);

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Charge(f32);

    #[test]
    fn test_update_is_noop_without_structural_change() {
        let mut manager = EntityManager::new();
        let a = manager.archetypes().intern_bundle::<(Mass,)>().unwrap();
        let e = manager.create_entity(&a).unwrap();
        let mut cache = EntityQueryCache::requiring(&manager, &[ComponentType::of::<Mass>().unwrap()]);

        assert_eq!(cache.version(), None);
        assert!(cache.update(&manager).unwrap());
        assert!(!cache.update(&manager).unwrap());

        // Row churn in a non-empty array keeps the cache valid
        manager.create_entity(&a).unwrap();
        manager.destroy_entity(e).unwrap();
        assert!(!cache.update(&manager).unwrap());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_predicates_short_circuit() {
        let mut manager = EntityManager::new();
        let a = manager.archetypes().intern_bundle::<(Mass,)>().unwrap();
        let b = manager.archetypes().intern_bundle::<(Charge,)>().unwrap();
        manager.create_entity(&a).unwrap();
        manager.create_entity(&b).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut cache = EntityQueryCache::new(
            &manager,
            vec![
                predicate::contains(ComponentType::of::<Mass>().unwrap()),
                Box::new(move |_: &ComponentArray| {
                    counter.fetch_add(1, Ordering::Relaxed);
                    true
                }),
            ],
        );
        cache.update(&manager).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_excludes_and_non_empty() {
        let mut manager = EntityManager::new();
        let a = manager.archetypes().intern_bundle::<(Mass,)>().unwrap();
        let b = manager.archetypes().intern_bundle::<(Mass, Charge)>().unwrap();
        manager.create_entity(&a).unwrap();
        manager.get_or_create_array(&b).unwrap();

        let charge: ComponentTypeFlags = [ComponentType::of::<Charge>().unwrap().id()].into_iter().collect();
        let mut without_charge = EntityQueryCache::new(&manager, vec![predicate::excludes(charge)]);
        without_charge.update(&manager).unwrap();
        assert_eq!(without_charge.array_ids(), &[manager.array_id(&a).unwrap()]);

        let mut populated = EntityQueryCache::new(&manager, vec![predicate::non_empty()]);
        populated.update(&manager).unwrap();
        assert_eq!(populated.iter(&manager).unwrap().count(), 1);
    }

    #[test]
    fn test_iter_mut_yields_cached_arrays() {
        let mut manager = EntityManager::new();
        let a = manager.archetypes().intern_bundle::<(Mass,)>().unwrap();
        let b = manager.archetypes().intern_bundle::<(Charge,)>().unwrap();
        let c = manager.archetypes().intern_bundle::<(Mass, Charge)>().unwrap();
        for archetype in [&a, &b, &c] {
            manager.create_entity(archetype).unwrap();
        }

        let mut cache = EntityQueryCache::requiring(&manager, &[ComponentType::of::<Mass>().unwrap()]);
        cache.update(&manager).unwrap();
        for mut array in cache.iter_mut(&mut manager).unwrap() {
            array.get_span::<Mass>().unwrap()[0] = Mass(2.0);
        }

        assert_eq!(manager.array(&a).unwrap().get_readonly_span::<Mass>().unwrap(), &[Mass(2.0)]);
        assert_eq!(manager.array(&c).unwrap().get_readonly_span::<Mass>().unwrap(), &[Mass(2.0)]);
    }

    #[test]
    fn test_foreign_world_rejected() {
        let manager = EntityManager::new();
        let other = EntityManager::new();
        let mut cache = EntityQueryCache::new(&manager, Vec::new());
        assert_eq!(cache.update(&other), Err(EcsError::ForeignWorld));
        assert!(cache.iter(&other).is_err());
    }
}
