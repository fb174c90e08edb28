//! # Type-Erased Columns
//!
//! A column is one contiguous, zero-initialised allocation holding
//! `capacity` elements of a single component type. The element type is only
//! known at runtime through its [`ComponentType`]; typed views are handed
//! out after checking the caller's type against it.
//!
//! ```text
//! ptr ──► [ e0 | e1 | e2 | ... | e(capacity-1) ]
//!          └── size bytes each, aligned to align
//! ```

// SAFETY: This module owns raw, aligned allocations for column data.
// Every other module goes through the safe API below.
#![allow(unsafe_code)]

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::any::TypeId;
use std::ptr::NonNull;

use super::component::{Component, ComponentType};

/// Storage for one component type across all rows of an array.
pub(crate) struct BlobColumn {
    ty: ComponentType,
    ptr: NonNull<u8>,
    capacity: usize,
}

impl BlobColumn {
    /// Allocates a zeroed column with room for `capacity` elements.
    pub(crate) fn new(ty: ComponentType, capacity: usize) -> Self {
        Self {
            ty,
            ptr: allocate(ty, capacity),
            capacity,
        }
    }

    #[inline]
    pub(crate) fn component_type(&self) -> ComponentType {
        self.ty
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reallocates to `new_capacity` elements.
    ///
    /// The first `min(capacity, new_capacity)` elements are preserved and
    /// any added space is zeroed.
    pub(crate) fn resize(&mut self, new_capacity: usize) {
        if new_capacity == self.capacity {
            return;
        }
        let new_ptr = allocate(self.ty, new_capacity);
        let kept = self.capacity.min(new_capacity) * self.ty.size();
        // SAFETY: both allocations hold at least `kept` bytes and are distinct.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), kept);
        }
        release(self.ty, self.ptr, self.capacity);
        self.ptr = new_ptr;
        self.capacity = new_capacity;
    }

    /// Bytes of the first `len` elements.
    pub(crate) fn bytes(&self, len: usize) -> &[u8] {
        assert!(len <= self.capacity, "column length out of bounds");
        // SAFETY: the allocation holds `capacity * size` initialised bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), len * self.ty.size()) }
    }

    /// Bytes of a single element.
    pub(crate) fn element(&self, row: usize) -> &[u8] {
        let size = self.ty.size();
        &self.bytes(row + 1)[row * size..]
    }

    /// Mutable bytes of a single element.
    pub(crate) fn element_mut(&mut self, row: usize) -> &mut [u8] {
        assert!(row < self.capacity, "column row out of bounds");
        let size = self.ty.size();
        // SAFETY: `row < capacity`, so the element lies inside the allocation.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(row * size), size) }
    }

    /// Typed view of the first `len` elements.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not the column's type or `len > capacity`.
    pub(crate) fn typed<T: Component>(&self, len: usize) -> &[T] {
        self.check_view::<T>(len);
        // SAFETY: the column stores `T` values (checked above), the pointer is
        // aligned for `T`, and every byte pattern is a valid `T` (Pod).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().cast::<T>(), len) }
    }

    /// Mutable typed view of the first `len` elements.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not the column's type or `len > capacity`.
    pub(crate) fn typed_mut<T: Component>(&mut self, len: usize) -> &mut [T] {
        self.check_view::<T>(len);
        // SAFETY: as in `typed`, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().cast::<T>(), len) }
    }

    /// Copies `n` elements from `src_row` to `dest_row` inside this column.
    /// The ranges may overlap.
    pub(crate) fn copy_within(&mut self, src_row: usize, dest_row: usize, n: usize) {
        assert!(
            src_row + n <= self.capacity && dest_row + n <= self.capacity,
            "column copy out of bounds"
        );
        let size = self.ty.size();
        // SAFETY: both ranges lie inside the allocation; `copy` handles overlap.
        unsafe {
            std::ptr::copy(
                self.ptr.as_ptr().add(src_row * size),
                self.ptr.as_ptr().add(dest_row * size),
                n * size,
            );
        }
    }

    /// Copies `n` elements from another column of the same type.
    pub(crate) fn copy_from(&mut self, dest_row: usize, src: &Self, src_row: usize, n: usize) {
        assert!(self.ty.type_id() == src.ty.type_id(), "column type mismatch");
        assert!(
            src_row + n <= src.capacity && dest_row + n <= self.capacity,
            "column copy out of bounds"
        );
        let size = self.ty.size();
        // SAFETY: distinct columns never share an allocation (`&mut self`
        // and `&src` cannot alias), and both ranges are in bounds.
        unsafe {
            std::ptr::copy_nonoverlapping(
                src.ptr.as_ptr().add(src_row * size),
                self.ptr.as_ptr().add(dest_row * size),
                n * size,
            );
        }
    }

    /// Zeroes `n` elements starting at `start`.
    pub(crate) fn zero_range(&mut self, start: usize, n: usize) {
        assert!(start + n <= self.capacity, "column range out of bounds");
        let size = self.ty.size();
        // SAFETY: the range lies inside the allocation.
        unsafe {
            std::ptr::write_bytes(self.ptr.as_ptr().add(start * size), 0, n * size);
        }
    }

    fn check_view<T: Component>(&self, len: usize) {
        assert!(
            self.ty.type_id() == TypeId::of::<T>(),
            "column holds {}, not {}",
            self.ty.name(),
            std::any::type_name::<T>()
        );
        assert!(len <= self.capacity, "column length out of bounds");
    }
}

impl Drop for BlobColumn {
    fn drop(&mut self) {
        release(self.ty, self.ptr, self.capacity);
    }
}

// SAFETY: the column owns its allocation, and component types are
// `Send + Sync` by the `Component` bound.
unsafe impl Send for BlobColumn {}
// SAFETY: shared access only reads.
unsafe impl Sync for BlobColumn {}

fn layout_for(ty: ComponentType, capacity: usize) -> Layout {
    ty.size()
        .checked_mul(capacity)
        .and_then(|bytes| Layout::from_size_align(bytes, ty.align()).ok())
        .unwrap_or_else(|| panic!("column capacity overflow: {capacity} x {}", ty.name()))
}

fn allocate(ty: ComponentType, capacity: usize) -> NonNull<u8> {
    let layout = layout_for(ty, capacity);
    if layout.size() == 0 {
        return dangling(ty.align());
    }
    // SAFETY: the layout has a non-zero size.
    let ptr = unsafe { alloc_zeroed(layout) };
    NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(layout))
}

fn release(ty: ComponentType, ptr: NonNull<u8>, capacity: usize) {
    let layout = layout_for(ty, capacity);
    if layout.size() > 0 {
        // SAFETY: `ptr` was returned by `alloc_zeroed` with this layout.
        unsafe { dealloc(ptr.as_ptr(), layout) }
    }
}

/// Well-aligned, non-null pointer for zero-byte columns.
fn dangling(align: usize) -> NonNull<u8> {
    // SAFETY: alignments are never zero.
    unsafe { NonNull::new_unchecked(align as *mut u8) }
}
