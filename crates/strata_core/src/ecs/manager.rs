//! # Entity Manager
//!
//! Owns every component array of a world, hands out versioned entity ids,
//! and keeps the `id -> (array, row)` table in step with every row move.
//!
//! ## Structural version
//!
//! The manager publishes a counter that changes whenever the set of
//! non-empty arrays may have changed:
//! - a new array is created
//! - an array goes from empty to non-empty or back
//! - an array is reshaped to a different archetype
//!
//! Ordinary row churn inside a non-empty array does not bump it, so query
//! caches stay valid across most frames.

use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use super::archetype::{Archetype, ArchetypeRegistry};
use super::array::{ComponentArray, ComponentArrayMut};
use super::component::{Component, ComponentType};
use super::entity::{ArrayId, EntityId, EntityLocation};
use crate::config::StoreConfig;
use crate::error::{EcsError, EcsResult};

/// Identifies one manager for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldId(u64);

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

impl WorldId {
    fn next() -> Self {
        Self(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Location-table entry for one slot.
#[derive(Clone, Copy, Debug)]
struct Slot {
    /// Version of the current (or most recent) occupant.
    version: u32,
    /// `None` while the slot is free.
    location: Option<EntityLocation>,
}

/// Storage and identity authority for a set of entities.
///
/// # Example
///
/// ```rust,ignore
/// let mut manager = EntityManager::new();
/// let moving = manager.archetypes().intern_bundle::<(Position, Velocity)>()?;
///
/// let e = manager.create_entity(&moving)?;
/// *manager.get_component_mut::<Velocity>(e)? = Velocity { x: 1.0, y: 0.0 };
/// manager.destroy_entity(e)?;
/// ```
pub struct EntityManager {
    world_id: WorldId,
    archetypes: ArchetypeRegistry,
    arrays: Vec<ComponentArray>,
    array_by_archetype: HashMap<Archetype, ArrayId>,
    slots: Vec<Slot>,
    /// Released slots, reused oldest first.
    free_slots: VecDeque<u32>,
    live: usize,
    version: u64,
    config: StoreConfig,
}

impl EntityManager {
    /// Creates a manager with its own archetype registry and default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(ArchetypeRegistry::new(), StoreConfig::default())
    }

    /// Creates a manager with its own archetype registry.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_registry(ArchetypeRegistry::new(), config)
    }

    /// Creates a manager that accepts archetypes interned by `archetypes`.
    #[must_use]
    pub fn with_registry(archetypes: ArchetypeRegistry, config: StoreConfig) -> Self {
        Self {
            world_id: WorldId::next(),
            archetypes,
            arrays: Vec::new(),
            array_by_archetype: HashMap::new(),
            slots: Vec::new(),
            free_slots: VecDeque::new(),
            live: 0,
            version: 0,
            config,
        }
    }

    /// The registry this manager's archetypes must come from.
    #[inline]
    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeRegistry {
        &self.archetypes
    }

    /// Unique id of this manager.
    #[inline]
    #[must_use]
    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    /// Current structural version.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if there are no live entities.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The sizing policy applied to new arrays.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ========================================================================
    // ARRAYS
    // ========================================================================

    /// Returns the array for `archetype`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ForeignArchetype`] if `archetype` was interned by
    /// another registry.
    pub fn get_or_create_array(&mut self, archetype: &Archetype) -> EcsResult<ComponentArrayMut<'_>> {
        let id = self.array_id_for(archetype)?;
        Ok(ComponentArrayMut::new(&mut self.arrays[id.index()]))
    }

    /// The array for `archetype`, if one has been created.
    #[must_use]
    pub fn array(&self, archetype: &Archetype) -> Option<&ComponentArray> {
        self.array_id(archetype).map(|id| &self.arrays[id.index()])
    }

    /// The id of the array for `archetype`, if one has been created.
    #[must_use]
    pub fn array_id(&self, archetype: &Archetype) -> Option<ArrayId> {
        self.array_by_archetype.get(archetype).copied()
    }

    /// Looks up an array by id.
    #[must_use]
    pub fn array_by_id(&self, id: ArrayId) -> Option<&ComponentArray> {
        self.arrays.get(id.index())
    }

    /// Mutable view of an array by id.
    pub fn array_mut_by_id(&mut self, id: ArrayId) -> Option<ComponentArrayMut<'_>> {
        self.arrays.get_mut(id.index()).map(ComponentArrayMut::new)
    }

    /// Every array, in creation order. An `ArrayId` indexes this slice.
    #[must_use]
    pub fn arrays(&self) -> &[ComponentArray] {
        &self.arrays
    }

    pub(crate) fn arrays_mut(&mut self) -> &mut [ComponentArray] {
        &mut self.arrays
    }

    /// Sole place where arrays are registered.
    fn array_id_for(&mut self, archetype: &Archetype) -> EcsResult<ArrayId> {
        if archetype.registry_id() != self.archetypes.id() {
            return Err(EcsError::ForeignArchetype(archetype.to_string()));
        }
        if let Some(&id) = self.array_by_archetype.get(archetype) {
            return Ok(id);
        }

        let id = ArrayId(u32::try_from(self.arrays.len()).map_err(|_| {
            EcsError::CapacityExceeded {
                limit: u32::MAX as usize,
            }
        })?);
        self.arrays
            .push(ComponentArray::with_config(archetype.clone(), &self.config));
        self.array_by_archetype.insert(archetype.clone(), id);
        self.version += 1;
        tracing::debug!(archetype = %archetype, array = id.0, version = self.version, "created component array");
        Ok(id)
    }

    // ========================================================================
    // ENTITIES
    // ========================================================================

    /// Creates an entity in `archetype` with all components zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ForeignArchetype`] if `archetype` was interned by
    /// another registry, or [`EcsError::CapacityExceeded`] if every slot
    /// index is in use.
    pub fn create_entity(&mut self, archetype: &Archetype) -> EcsResult<EntityId> {
        let array_id = self.array_id_for(archetype)?;
        let (slot, version) = self.allocate_slot()?;
        let id = EntityId::new(slot, version);

        let array = &mut self.arrays[array_id.index()];
        let was_empty = array.is_empty();
        let row = array.add_rows(1)?;
        array.get_span::<EntityId>()?[row] = id;
        if was_empty {
            self.version += 1;
        }

        self.slots[slot as usize].location = Some(EntityLocation {
            array: array_id,
            row,
        });
        self.live += 1;
        Ok(id)
    }

    /// Destroys an entity; the last row of its array takes its place.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleHandle`] or [`EcsError::NotFound`] if `id`
    /// is not live.
    pub fn destroy_entity(&mut self, id: EntityId) -> EcsResult<()> {
        let location = self.get_location(id)?;
        self.swap_remove(location)?;

        let slot = id.slot();
        self.slots[slot as usize].location = None;
        self.free_slots.push_back(slot);
        self.live -= 1;
        Ok(())
    }

    /// Where a live entity's data is stored.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NotFound`] if the slot was never allocated, or
    /// [`EcsError::StaleHandle`] if the entity was destroyed or the slot has
    /// been reused.
    pub fn get_location(&self, id: EntityId) -> EcsResult<EntityLocation> {
        let slot = self
            .slots
            .get(id.slot() as usize)
            .ok_or(EcsError::NotFound(id))?;
        match slot.location {
            Some(location) if slot.version == id.version() => Ok(location),
            _ => Err(EcsError::StaleHandle {
                entity: id,
                current: slot.version,
            }),
        }
    }

    /// Returns `true` if `id` refers to a live entity.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.get_location(id).is_ok()
    }

    /// The archetype a live entity currently belongs to.
    ///
    /// # Errors
    ///
    /// As [`EntityManager::get_location`].
    pub fn get_entity_archetype(&self, id: EntityId) -> EcsResult<Archetype> {
        let location = self.get_location(id)?;
        Ok(self.arrays[location.array.index()].archetype().clone())
    }

    fn allocate_slot(&mut self) -> EcsResult<(u32, u32)> {
        if let Some(slot) = self.free_slots.pop_front() {
            let entry = &mut self.slots[slot as usize];
            entry.version = next_version(entry.version);
            tracing::trace!(slot, version = entry.version, "reusing entity slot");
            return Ok((slot, entry.version));
        }

        let slot = u32::try_from(self.slots.len()).map_err(|_| EcsError::CapacityExceeded {
            limit: u32::MAX as usize,
        })?;
        self.slots.push(Slot {
            version: 1,
            location: None,
        });
        Ok((slot, 1))
    }

    /// Removes the row at `location` by moving the array's last row into it.
    ///
    /// The moved entity's location is updated in the same call, so the
    /// table never points at a row that no longer holds its entity.
    fn swap_remove(&mut self, location: EntityLocation) -> EcsResult<()> {
        let array = &mut self.arrays[location.array.index()];
        let last = array.count() - 1;
        if location.row != last {
            array.copy_rows_within(last, location.row, 1)?;
            let moved = array.entities()[location.row];
            self.slots[moved.slot() as usize].location = Some(location);
        }
        array.remove_rows(1)?;
        if array.is_empty() {
            self.version += 1;
        }
        Ok(())
    }

    // ========================================================================
    // MIGRATION
    // ========================================================================

    /// Moves an entity to another archetype.
    ///
    /// Components present in both archetypes keep their values; components
    /// only in `archetype` start zeroed. Returns the new location.
    ///
    /// # Errors
    ///
    /// As [`EntityManager::get_location`], plus [`EcsError::ForeignArchetype`].
    pub fn set_entity_archetype(
        &mut self,
        id: EntityId,
        archetype: &Archetype,
    ) -> EcsResult<EntityLocation> {
        if archetype.registry_id() != self.archetypes.id() {
            return Err(EcsError::ForeignArchetype(archetype.to_string()));
        }
        let location = self.get_location(id)?;
        let source = &self.arrays[location.array.index()];
        if source.archetype() == archetype {
            return Ok(location);
        }

        // Sole occupant moving to an archetype with no array yet: reuse the
        // array in place instead of copying into a fresh one
        if source.count() == 1 && !self.array_by_archetype.contains_key(archetype) {
            let old = source.archetype().clone();
            self.array_by_archetype.remove(&old);
            self.arrays[location.array.index()].reshape_to(archetype.clone());
            self.array_by_archetype.insert(archetype.clone(), location.array);
            self.version += 1;
            tracing::trace!(entity = %id, from = %old, to = %archetype, "reshaped array in place");
            return Ok(location);
        }

        let dest_id = self.array_id_for(archetype)?;
        let (source, dest) = pair_mut(&mut self.arrays, location.array, dest_id);
        let was_empty = dest.is_empty();
        let dest_row = dest.add_rows(1)?;
        ComponentArray::copy_rows(source, location.row, dest, dest_row, 1)?;
        if was_empty {
            self.version += 1;
        }

        self.swap_remove(location)?;
        let new_location = EntityLocation {
            array: dest_id,
            row: dest_row,
        };
        self.slots[id.slot() as usize].location = Some(new_location);
        tracing::trace!(entity = %id, to = %archetype, row = dest_row, "migrated entity");
        Ok(new_location)
    }

    /// Adds `T` to an entity (migrating it) and stores `value`.
    /// If the entity already has `T`, only the value is replaced.
    ///
    /// # Errors
    ///
    /// As [`EntityManager::set_entity_archetype`], plus
    /// [`EcsError::ReadOnlyColumn`] for [`EntityId`].
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) -> EcsResult<EntityLocation> {
        let ty = ComponentType::of::<T>()?;
        if ty.is_identity() {
            return Err(EcsError::ReadOnlyColumn);
        }
        let current = self.get_entity_archetype(id)?;
        let target = self.archetypes.add(&current, ty);
        let location = self.set_entity_archetype(id, &target)?;
        self.arrays[location.array.index()].get_span::<T>()?[location.row] = value;
        Ok(location)
    }

    /// Removes `T` from an entity, migrating it. A no-op if `T` is absent.
    ///
    /// # Errors
    ///
    /// As [`EntityManager::set_entity_archetype`].
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> EcsResult<EntityLocation> {
        let ty = ComponentType::of::<T>()?;
        let current = self.get_entity_archetype(id)?;
        let target = self.archetypes.remove(&current, ty);
        self.set_entity_archetype(id, &target)
    }

    /// Reads one component of a live entity.
    ///
    /// # Errors
    ///
    /// As [`EntityManager::get_location`], plus [`EcsError::ColumnNotFound`].
    pub fn get_component<T: Component>(&self, id: EntityId) -> EcsResult<&T> {
        let location = self.get_location(id)?;
        let span = self.arrays[location.array.index()].get_readonly_span::<T>()?;
        Ok(&span[location.row])
    }

    /// Mutable access to one component of a live entity.
    ///
    /// # Errors
    ///
    /// As [`EntityManager::get_component`], plus [`EcsError::ReadOnlyColumn`]
    /// for [`EntityId`].
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> EcsResult<&mut T> {
        if TypeId::of::<T>() == TypeId::of::<EntityId>() {
            return Err(EcsError::ReadOnlyColumn);
        }
        let location = self.get_location(id)?;
        let span = self.arrays[location.array.index()].get_span::<T>()?;
        Ok(&mut span[location.row])
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("world_id", &self.world_id)
            .field("arrays", &self.arrays.len())
            .field("live", &self.live)
            .field("version", &self.version)
            .finish()
    }
}

/// Borrows two distinct arrays, one shared and one exclusive.
fn pair_mut(
    arrays: &mut [ComponentArray],
    src: ArrayId,
    dest: ArrayId,
) -> (&ComponentArray, &mut ComponentArray) {
    let (s, d) = (src.index(), dest.index());
    debug_assert_ne!(s, d, "source and destination arrays must differ");
    if s < d {
        let (head, tail) = arrays.split_at_mut(d);
        (&head[s], &mut tail[0])
    } else {
        let (head, tail) = arrays.split_at_mut(s);
        (&tail[0], &mut head[d])
    }
}

/// Version handed out the next time a slot is reused.
///
/// Cycles through `1..u32::MAX`: 0 marks a zeroed row and `u32::MAX` is
/// the version half of [`EntityId::NULL`], so neither is ever live.
const fn next_version(version: u32) -> u32 {
    match version.wrapping_add(1) {
        0 | u32::MAX => 1,
        v => v,
    }
}
