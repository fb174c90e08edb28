//! # Component Types
//!
//! Components are plain data: any `Pod` value can be stored in a column,
//! copied bitwise between arrays, and brought into existence as all-zero
//! bytes when a row is added.
//!
//! Each runtime type is assigned a one-byte id the first time it is seen.
//! Id 0 always belongs to [`EntityId`], the identity column that every
//! archetype carries.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use bytemuck::Pod;
use parking_lot::Mutex;

use super::entity::EntityId;
use crate::error::{EcsError, EcsResult};

/// Number of distinct component types a registry can hold.
pub const MAX_COMPONENT_TYPES: usize = 256;

/// Marker trait for storable component values.
///
/// Implemented for every `Pod + Send + Sync + 'static` type:
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
/// ```
pub trait Component: Pod + Send + Sync + 'static {}

impl<T: Pod + Send + Sync + 'static> Component for T {}

/// Runtime descriptor of a component type.
///
/// Carries everything needed to allocate and copy a type-erased column.
/// Two descriptors are equal when their ids are equal.
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: u8,
    type_id: TypeId,
    name: &'static str,
    size: usize,
    align: usize,
}

impl ComponentType {
    fn describe<T: Component>(id: u8) -> Self {
        Self {
            id,
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
        }
    }

    /// Returns the descriptor of `T` from the global registry.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExceeded`] if `T` is new and all 256 ids
    /// are in use.
    pub fn of<T: Component>() -> EcsResult<Self> {
        ComponentTypeRegistry::global().id_for::<T>()
    }

    /// The identity column type ([`EntityId`], id 0).
    #[must_use]
    pub fn identity() -> Self {
        Self::describe::<EntityId>(0)
    }

    /// Returns the one-byte id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u8 {
        self.id
    }

    /// Returns the runtime type handle.
    #[inline]
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the full type name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the type name without its module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let generic_start = self.name.find('<').unwrap_or(self.name.len());
        let start = self.name[..generic_start]
            .rfind("::")
            .map_or(0, |i| i + 2);
        &self.name[start..]
    }

    /// Element size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Element alignment in bytes.
    #[inline]
    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }

    /// Returns `true` for the identity column.
    #[inline]
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.id == 0
    }

    /// Returns `true` if this descriptor was created for `T`.
    #[inline]
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl std::hash::Hash for ComponentType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for ComponentType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({}: {})", self.id, self.short_name())
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

struct RegistryTable {
    types: Vec<ComponentType>,
    by_type: HashMap<TypeId, u8>,
}

/// Append-only map from runtime type to [`ComponentType`].
///
/// Only the process-wide instance is reachable from outside the crate,
/// through [`ComponentTypeRegistry::global`] or [`ComponentType::of`], so
/// every descriptor a caller holds maps one id to one type.
pub struct ComponentTypeRegistry {
    table: Mutex<RegistryTable>,
}

static GLOBAL_REGISTRY: OnceLock<ComponentTypeRegistry> = OnceLock::new();

impl ComponentTypeRegistry {
    /// Creates a registry holding only the identity column type.
    ///
    /// Its ids overlap with the global registry's, so descriptors from it
    /// must never reach an [`ArchetypeRegistry`](super::ArchetypeRegistry).
    #[must_use]
    pub(crate) fn new() -> Self {
        let identity = ComponentType::identity();
        let mut by_type = HashMap::new();
        by_type.insert(identity.type_id, identity.id);
        Self {
            table: Mutex::new(RegistryTable {
                types: vec![identity],
                by_type,
            }),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Self {
        GLOBAL_REGISTRY.get_or_init(Self::new)
    }

    /// Returns the descriptor of `T`, assigning the next id on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExceeded`] if `T` is new and the registry
    /// already holds [`MAX_COMPONENT_TYPES`] types.
    pub fn id_for<T: Component>(&self) -> EcsResult<ComponentType> {
        let mut table = self.table.lock();
        if let Some(&id) = table.by_type.get(&TypeId::of::<T>()) {
            return Ok(table.types[usize::from(id)]);
        }

        let id = u8::try_from(table.types.len()).map_err(|_| EcsError::CapacityExceeded {
            limit: MAX_COMPONENT_TYPES,
        })?;
        let ty = ComponentType::describe::<T>(id);
        table.types.push(ty);
        table.by_type.insert(ty.type_id, id);
        tracing::trace!(id, name = ty.name, "registered component type");
        Ok(ty)
    }

    /// Looks up a descriptor by id.
    #[must_use]
    pub fn get(&self, id: u8) -> Option<ComponentType> {
        self.table.lock().types.get(usize::from(id)).copied()
    }

    /// Number of registered types, the identity column included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().types.len()
    }

    /// Always `false`: the identity column is registered at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.lock().types.is_empty()
    }

    /// The identity column type.
    #[must_use]
    pub fn identity(&self) -> ComponentType {
        self.table.lock().types[0]
    }
}

// ============================================================================
// BUNDLES
// ============================================================================

/// A tuple of component types, usable to intern an archetype in one call.
///
/// ```rust,ignore
/// let moving = registry.intern_bundle::<(Position, Velocity)>()?;
/// ```
pub trait ComponentBundle {
    /// Descriptors of the tuple's member types, in tuple order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExceeded`] if a member type cannot be
    /// registered.
    fn component_types() -> EcsResult<Vec<ComponentType>>;
}

macro_rules! impl_component_bundle {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentBundle for ($($name,)+) {
            fn component_types() -> EcsResult<Vec<ComponentType>> {
                Ok(vec![$(ComponentType::of::<$name>()?),+])
            }
        }
    };
}

impl_component_bundle!(A);
impl_component_bundle!(A, B);
impl_component_bundle!(A, B, C);
impl_component_bundle!(A, B, C, D);
impl_component_bundle!(A, B, C, D, E);
impl_component_bundle!(A, B, C, D, E, F);
impl_component_bundle!(A, B, C, D, E, F, G);
impl_component_bundle!(A, B, C, D, E, F, G, H);
