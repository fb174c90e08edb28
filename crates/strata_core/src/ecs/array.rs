//! # Component Arrays
//!
//! Structure-of-arrays storage for every entity of one archetype:
//!
//! ```text
//! Archetype { EntityId, Position, Velocity }, count = 3
//!
//! EntityId[]:  [ e0 | e1 | e2 | 0 ]
//! Position[]:  [ p0 | p1 | p2 | 0 ]
//! Velocity[]:  [ v0 | v1 | v2 | 0 ]
//!                               └── capacity 4, unused rows stay zeroed
//! ```
//!
//! Row `i` of every column belongs to the same entity. Rows are only
//! appended at and removed from the tail; the manager turns an arbitrary
//! removal into a swap with the last row.

use std::any::TypeId;
use std::ops::Deref;

use super::archetype::Archetype;
use super::column::BlobColumn;
use super::component::{Component, ComponentType};
use super::entity::EntityId;
use crate::config::StoreConfig;
use crate::error::{EcsError, EcsResult};

/// Columnar storage for the entities of one archetype.
pub struct ComponentArray {
    archetype: Archetype,
    /// One column per archetype member, in archetype order.
    columns: Vec<BlobColumn>,
    count: usize,
    capacity: usize,
    config: StoreConfig,
}

impl ComponentArray {
    /// Creates an empty array with room for `initial_capacity` rows.
    #[must_use]
    pub fn new(archetype: Archetype, initial_capacity: usize) -> Self {
        Self::build(archetype, initial_capacity, StoreConfig::default())
    }

    /// Creates an empty array sized and grown according to `config`.
    #[must_use]
    pub fn with_config(archetype: Archetype, config: &StoreConfig) -> Self {
        Self::build(archetype, config.initial_capacity, config.clone())
    }

    fn build(archetype: Archetype, capacity: usize, config: StoreConfig) -> Self {
        let columns = archetype
            .components()
            .iter()
            .map(|ty| BlobColumn::new(*ty, capacity))
            .collect();
        Self {
            archetype,
            columns,
            count: 0,
            capacity,
            config,
        }
    }

    /// The archetype whose members this array stores.
    #[inline]
    #[must_use]
    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    /// Number of rows in use.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns `true` if no rows are in use.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of rows allocated.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The growth policy of this array.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The identity column: the id of the entity stored in each row.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        self.columns[0].typed::<EntityId>(self.count)
    }

    // ------------------------------------------------------------------
    // Rows and capacity
    // ------------------------------------------------------------------

    /// Appends `n` zeroed rows and returns the index of the first one.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RowsOutOfRange`] if the new row count would not
    /// fit in a single allocation.
    pub fn add_rows(&mut self, n: usize) -> EcsResult<usize> {
        let start = self.count;
        let end = start
            .checked_add(n)
            .filter(|end| *end <= self.max_rows())
            .ok_or_else(|| EcsError::RowsOutOfRange {
                requested: n,
                available: self.max_rows().saturating_sub(start),
            })?;
        self.ensure_capacity(end)?;
        // Rows past `count` are kept zeroed, so nothing to initialise
        self.count = end;
        Ok(start)
    }

    /// Removes the last `n` rows, zeroing their storage.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RowsOutOfRange`] if `n > count`.
    pub fn remove_rows(&mut self, n: usize) -> EcsResult<()> {
        if n > self.count {
            return Err(EcsError::RowsOutOfRange {
                requested: n,
                available: self.count,
            });
        }
        let start = self.count - n;
        for column in &mut self.columns {
            column.zero_range(start, n);
        }
        self.count = start;
        Ok(())
    }

    /// Zeroes `len` rows starting at `start`. The row count is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RowOutOfRange`] if the range reaches past `count`.
    pub fn clear_rows(&mut self, start: usize, len: usize) -> EcsResult<()> {
        self.check_rows(start, len)?;
        for column in &mut self.columns {
            column.zero_range(start, len);
        }
        Ok(())
    }

    /// Grows the array so that at least `min` rows fit.
    ///
    /// Growth doubles the capacity up to the configured cap; a larger
    /// request is honoured exactly. Never shrinks.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RowsOutOfRange`] if `min` rows of the widest
    /// column would not fit in a single allocation.
    pub fn ensure_capacity(&mut self, min: usize) -> EcsResult<()> {
        if min <= self.capacity {
            return Ok(());
        }
        self.check_row_limit(min)?;
        let new_capacity = self
            .config
            .grown_capacity(self.capacity, min)
            .min(self.max_rows());
        tracing::debug!(
            archetype = %self.archetype,
            from = self.capacity,
            to = new_capacity,
            "growing component array"
        );
        self.resize_columns(new_capacity);
        Ok(())
    }

    /// Sets the allocated row count, shrinking or growing.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityBelowCount`] if `capacity < count`, and
    /// [`EcsError::RowsOutOfRange`] if `capacity` rows would not fit in a
    /// single allocation.
    pub fn set_capacity(&mut self, capacity: usize) -> EcsResult<()> {
        if capacity < self.count {
            return Err(EcsError::CapacityBelowCount {
                requested: capacity,
                count: self.count,
            });
        }
        self.check_row_limit(capacity)?;
        self.resize_columns(capacity);
        Ok(())
    }

    fn resize_columns(&mut self, capacity: usize) {
        for column in &mut self.columns {
            column.resize(capacity);
            debug_assert_eq!(column.capacity(), capacity);
        }
        self.capacity = capacity;
    }

    /// Largest row count whose widest column still fits in one allocation.
    fn max_rows(&self) -> usize {
        let widest = self
            .columns
            .iter()
            .map(|column| column.component_type().size())
            .max()
            .unwrap_or(0)
            .max(1);
        isize::MAX.unsigned_abs() / widest
    }

    fn check_row_limit(&self, rows: usize) -> EcsResult<()> {
        let limit = self.max_rows();
        if rows > limit {
            return Err(EcsError::RowsOutOfRange {
                requested: rows,
                available: limit,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Typed access
    // ------------------------------------------------------------------

    /// Mutable view of the `T` column over rows `0..count`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ColumnNotFound`] if `T` is not part of the archetype.
    pub fn get_span<T: Component>(&mut self) -> EcsResult<&mut [T]> {
        let index = self.require_column::<T>()?;
        Ok(self.columns[index].typed_mut::<T>(self.count))
    }

    /// Read-only view of the `T` column over rows `0..count`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ColumnNotFound`] if `T` is not part of the archetype.
    pub fn get_readonly_span<T: Component>(&self) -> EcsResult<&[T]> {
        let index = self.require_column::<T>()?;
        Ok(self.columns[index].typed::<T>(self.count))
    }

    /// Like [`ComponentArray::get_span`], but `None` when `T` is absent.
    pub fn try_get_span<T: Component>(&mut self) -> Option<&mut [T]> {
        let index = self.column_of::<T>()?;
        Some(self.columns[index].typed_mut::<T>(self.count))
    }

    /// Like [`ComponentArray::get_readonly_span`], but `None` when `T` is absent.
    #[must_use]
    pub fn try_get_readonly_span<T: Component>(&self) -> Option<&[T]> {
        let index = self.column_of::<T>()?;
        Some(self.columns[index].typed::<T>(self.count))
    }

    /// Mutable views of two different columns at once.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ColumnNotFound`] if either type is absent, or
    /// [`EcsError::DuplicateColumn`] if `A` and `B` are the same type.
    pub fn get_span_pair<A: Component, B: Component>(
        &mut self,
    ) -> EcsResult<(&mut [A], &mut [B])> {
        let a = self.require_column::<A>()?;
        let b = self.require_column::<B>()?;
        let count = self.count;
        if a == b {
            return Err(EcsError::DuplicateColumn(std::any::type_name::<A>()));
        }
        if a < b {
            let (head, tail) = self.columns.split_at_mut(b);
            Ok((head[a].typed_mut::<A>(count), tail[0].typed_mut::<B>(count)))
        } else {
            let (head, tail) = self.columns.split_at_mut(a);
            Ok((tail[0].typed_mut::<A>(count), head[b].typed_mut::<B>(count)))
        }
    }

    fn column_of<T: Component>(&self) -> Option<usize> {
        let type_id = TypeId::of::<T>();
        self.columns
            .iter()
            .position(|c| c.component_type().type_id() == type_id)
    }

    fn require_column<T: Component>(&self) -> EcsResult<usize> {
        self.column_of::<T>()
            .ok_or_else(|| EcsError::ColumnNotFound {
                component: std::any::type_name::<T>(),
                archetype: self.archetype.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Untyped access
    // ------------------------------------------------------------------

    /// Raw bytes of one component value.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ColumnNotFound`] or [`EcsError::RowOutOfRange`].
    pub fn get_value(&self, ty: ComponentType, row: usize) -> EcsResult<&[u8]> {
        let index = self.require_index(ty)?;
        self.check_row(row)?;
        Ok(self.columns[index].element(row))
    }

    /// Overwrites one component value from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ColumnNotFound`], [`EcsError::RowOutOfRange`] or
    /// [`EcsError::ValueSizeMismatch`].
    pub fn set_value(&mut self, ty: ComponentType, row: usize, value: &[u8]) -> EcsResult<()> {
        let index = self.require_index(ty)?;
        self.check_row(row)?;
        if value.len() != ty.size() {
            return Err(EcsError::ValueSizeMismatch {
                component: ty.name(),
                expected: ty.size(),
                actual: value.len(),
            });
        }
        self.columns[index].element_mut(row).copy_from_slice(value);
        Ok(())
    }

    fn require_index(&self, ty: ComponentType) -> EcsResult<usize> {
        self.archetype
            .index_of(ty)
            .ok_or_else(|| EcsError::ColumnNotFound {
                component: ty.name(),
                archetype: self.archetype.to_string(),
            })
    }

    fn check_row(&self, row: usize) -> EcsResult<()> {
        if row < self.count {
            Ok(())
        } else {
            Err(EcsError::RowOutOfRange {
                row,
                count: self.count,
            })
        }
    }

    fn check_rows(&self, start: usize, len: usize) -> EcsResult<()> {
        match start.checked_add(len) {
            Some(end) if end <= self.count => Ok(()),
            _ => Err(EcsError::RowOutOfRange {
                row: start.saturating_add(len).saturating_sub(1),
                count: self.count,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Structural copies
    // ------------------------------------------------------------------

    /// Replaces the column set with `archetype`'s.
    ///
    /// Columns shared with the old archetype keep their contents; new
    /// columns start zeroed; dropped columns are freed. Count and capacity
    /// are unchanged.
    pub fn reshape_to(&mut self, archetype: Archetype) {
        if archetype == self.archetype {
            return;
        }
        tracing::debug!(from = %self.archetype, to = %archetype, rows = self.count, "reshaping component array");

        let mut old: Vec<Option<BlobColumn>> =
            std::mem::take(&mut self.columns).into_iter().map(Some).collect();
        let capacity = self.capacity;
        self.columns = archetype
            .components()
            .iter()
            .map(|ty| {
                old.iter_mut()
                    .find(|slot| slot.as_ref().is_some_and(|c| c.component_type() == *ty))
                    .and_then(Option::take)
                    .unwrap_or_else(|| BlobColumn::new(*ty, capacity))
            })
            .collect();
        self.archetype = archetype;
    }

    /// Copies `n` rows from `src` to `dest`, column by column, for every
    /// component type the two archetypes share. Other columns of `dest`
    /// are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RowOutOfRange`] if either range reaches past its
    /// array's `count`.
    pub fn copy_rows(
        src: &Self,
        src_row: usize,
        dest: &mut Self,
        dest_row: usize,
        n: usize,
    ) -> EcsResult<()> {
        src.check_rows(src_row, n)?;
        dest.check_rows(dest_row, n)?;
        if n == 0 {
            return Ok(());
        }

        // Both column lists are sorted by id: merge-walk them
        let mut s = 0;
        let mut d = 0;
        while s < src.columns.len() && d < dest.columns.len() {
            let src_id = src.columns[s].component_type().id();
            let dest_id = dest.columns[d].component_type().id();
            match src_id.cmp(&dest_id) {
                std::cmp::Ordering::Less => s += 1,
                std::cmp::Ordering::Greater => d += 1,
                std::cmp::Ordering::Equal => {
                    dest.columns[d].copy_from(dest_row, &src.columns[s], src_row, n);
                    s += 1;
                    d += 1;
                }
            }
        }
        Ok(())
    }

    /// Copies `n` rows inside this array. The ranges may overlap.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RowOutOfRange`] if either range reaches past `count`.
    pub fn copy_rows_within(&mut self, src_row: usize, dest_row: usize, n: usize) -> EcsResult<()> {
        self.check_rows(src_row, n)?;
        self.check_rows(dest_row, n)?;
        for column in &mut self.columns {
            column.copy_within(src_row, dest_row, n);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ComponentArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentArray")
            .field("archetype", &self.archetype)
            .field("count", &self.count)
            .field("capacity", &self.capacity)
            .finish()
    }
}

// ============================================================================
// MUTABLE VIEW
// ============================================================================

/// Mutable access to an array owned by an entity manager.
///
/// Component values can be read and written, but the row set, the capacity
/// and the identity column belong to the manager and stay out of reach.
pub struct ComponentArrayMut<'a> {
    array: &'a mut ComponentArray,
}

impl<'a> ComponentArrayMut<'a> {
    pub(crate) fn new(array: &'a mut ComponentArray) -> Self {
        Self { array }
    }

    /// Mutable view of the `T` column over rows `0..count`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ReadOnlyColumn`] for [`EntityId`], or
    /// [`EcsError::ColumnNotFound`] if `T` is not part of the archetype.
    pub fn get_span<T: Component>(&mut self) -> EcsResult<&mut [T]> {
        reject_identity::<T>()?;
        self.array.get_span::<T>()
    }

    /// Like [`ComponentArrayMut::get_span`], but `None` when `T` is absent
    /// or is the identity column.
    pub fn try_get_span<T: Component>(&mut self) -> Option<&mut [T]> {
        reject_identity::<T>().ok()?;
        self.array.try_get_span::<T>()
    }

    /// Mutable views of two different columns at once.
    ///
    /// # Errors
    ///
    /// As [`ComponentArray::get_span_pair`], plus [`EcsError::ReadOnlyColumn`]
    /// if either type is [`EntityId`].
    pub fn get_span_pair<A: Component, B: Component>(
        &mut self,
    ) -> EcsResult<(&mut [A], &mut [B])> {
        reject_identity::<A>()?;
        reject_identity::<B>()?;
        self.array.get_span_pair::<A, B>()
    }

    /// Overwrites one component value from raw bytes.
    ///
    /// # Errors
    ///
    /// As [`ComponentArray::set_value`], plus [`EcsError::ReadOnlyColumn`]
    /// for the identity column.
    pub fn set_value(&mut self, ty: ComponentType, row: usize, value: &[u8]) -> EcsResult<()> {
        if ty.is_identity() {
            return Err(EcsError::ReadOnlyColumn);
        }
        self.array.set_value(ty, row, value)
    }
}

impl Deref for ComponentArrayMut<'_> {
    type Target = ComponentArray;

    fn deref(&self) -> &Self::Target {
        self.array
    }
}

fn reject_identity<T: Component>() -> EcsResult<()> {
    if TypeId::of::<T>() == TypeId::of::<EntityId>() {
        Err(EcsError::ReadOnlyColumn)
    } else {
        Ok(())
    }
}
