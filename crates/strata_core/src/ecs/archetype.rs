//! # Archetypes
//!
//! An archetype is the canonical set of component types shared by a group
//! of entities. Archetypes are interned: asking a registry twice for the
//! same set yields the same instance, so equality and hashing are pointer
//! operations.
//!
//! ```text
//! {Position}            --add(Velocity)-->    {Position, Velocity}
//!      ^                                              |
//!      +--------------remove(Velocity)----------------+
//! ```
//!
//! Every archetype contains the identity column ([`EntityId`](super::EntityId)).

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::component::{ComponentBundle, ComponentType, ComponentTypeRegistry};
use super::flags::ComponentTypeFlags;
use crate::error::{EcsError, EcsResult};

struct ArchetypeData {
    flags: ComponentTypeFlags,
    /// Sorted by id; `components[0]` is the identity column.
    components: Box<[ComponentType]>,
    registry_id: u64,
}

/// Interned, immutable set of component types.
///
/// Cloning is a reference-count increment. Two archetypes compare equal only
/// if they are the same interned instance.
#[derive(Clone)]
pub struct Archetype(Arc<ArchetypeData>);

impl Archetype {
    /// Returns `true` if `ty` is a member.
    #[inline]
    #[must_use]
    pub fn contains(&self, ty: ComponentType) -> bool {
        self.0.flags.contains(ty.id())
    }

    /// Returns `true` if the type with this id is a member.
    #[inline]
    #[must_use]
    pub fn contains_id(&self, id: u8) -> bool {
        self.0.flags.contains(id)
    }

    /// Returns `true` if every member of `other` is a member of `self`.
    #[inline]
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        self.0.flags.contains_all(&other.0.flags)
    }

    /// Member types in ascending id order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ComponentType] {
        &self.0.components
    }

    /// Member ids as a bitset.
    #[inline]
    #[must_use]
    pub fn flags(&self) -> &ComponentTypeFlags {
        &self.0.flags
    }

    /// Number of member types, the identity column included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.components.len()
    }

    /// Always `false`: the identity column is always present.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.components.is_empty()
    }

    /// Position of `ty` in [`Archetype::components`], which is also its
    /// column index in a component array.
    #[must_use]
    pub fn index_of(&self, ty: ComponentType) -> Option<usize> {
        self.0
            .components
            .binary_search_by_key(&ty.id(), ComponentType::id)
            .ok()
    }

    /// Id of the registry that interned this archetype.
    #[inline]
    #[must_use]
    pub fn registry_id(&self) -> u64 {
        self.0.registry_id
    }
}

impl PartialEq for Archetype {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Archetype {}

impl Hash for Archetype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Archetype { ")?;
        for (i, ty) in self.0.components.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(ty.short_name())?;
        }
        f.write_str(" }")
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

struct RegistryInner {
    id: u64,
    table: Mutex<HashMap<ComponentTypeFlags, Archetype>>,
}

/// Interning table for archetypes.
///
/// One registry is normally shared by a world and everything that builds
/// archetypes for it. The handle is cheap to clone; clones share the table.
///
/// Component types are identified by id, which is unambiguous because
/// callers can only obtain them from the global [`ComponentTypeRegistry`].
#[derive(Clone)]
pub struct ArchetypeRegistry {
    inner: Arc<RegistryInner>,
}

impl ArchetypeRegistry {
    /// Creates an empty registry with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
                table: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Unique id of this registry.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Number of archetypes interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.table.lock().len()
    }

    /// Returns `true` if nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.table.lock().is_empty()
    }

    /// Returns the archetype for a set of types.
    ///
    /// Order and duplicates in `types` do not matter, and the identity
    /// column is added if missing.
    pub fn intern(&self, types: &[ComponentType]) -> Archetype {
        let mut flags: ComponentTypeFlags = types.iter().map(ComponentType::id).collect();
        flags.insert(0);
        self.intern_with(flags, || {
            let mut components = Vec::with_capacity(types.len() + 1);
            components.push(ComponentType::identity());
            components.extend(types.iter().copied().filter(|t| !t.is_identity()));
            components
        })
    }

    /// Returns the archetype for a set of component-type ids.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponentId`] if an id has not been
    /// registered in the global registry.
    pub fn intern_ids(&self, ids: &ComponentTypeFlags) -> EcsResult<Archetype> {
        let registry = ComponentTypeRegistry::global();
        let types = ids
            .iter()
            .map(|id| registry.get(id).ok_or(EcsError::UnknownComponentId(id)))
            .collect::<EcsResult<Vec<_>>>()?;
        Ok(self.intern(&types))
    }

    /// Returns the archetype holding exactly the bundle's types.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExceeded`] if a bundle member cannot be
    /// registered.
    pub fn intern_bundle<B: ComponentBundle>(&self) -> EcsResult<Archetype> {
        Ok(self.intern(&B::component_types()?))
    }

    /// The archetype holding only the identity column.
    pub fn empty(&self) -> Archetype {
        self.intern(&[])
    }

    /// Returns `archetype` with `ty` added; `archetype` itself if already present.
    pub fn add(&self, archetype: &Archetype, ty: ComponentType) -> Archetype {
        self.with_all(archetype, &[ty])
    }

    /// Returns `archetype` without `ty`; `archetype` itself if absent.
    ///
    /// The identity column cannot be removed.
    pub fn remove(&self, archetype: &Archetype, ty: ComponentType) -> Archetype {
        self.without_all(archetype, &[ty])
    }

    /// Returns `archetype` with every type in `types` added.
    pub fn with_all(&self, archetype: &Archetype, types: &[ComponentType]) -> Archetype {
        let mut flags = *archetype.flags();
        for ty in types {
            flags.insert(ty.id());
        }
        if flags == *archetype.flags() && archetype.registry_id() == self.id() {
            return archetype.clone();
        }
        self.intern_with(flags, || {
            let mut components = archetype.components().to_vec();
            components.extend_from_slice(types);
            components
        })
    }

    /// Returns `archetype` with every type in `types` removed.
    pub fn without_all(&self, archetype: &Archetype, types: &[ComponentType]) -> Archetype {
        let mut flags = *archetype.flags();
        for ty in types.iter().filter(|t| !t.is_identity()) {
            flags.remove(ty.id());
        }
        if flags == *archetype.flags() && archetype.registry_id() == self.id() {
            return archetype.clone();
        }
        self.intern_with(flags, || {
            archetype
                .components()
                .iter()
                .copied()
                .filter(|t| flags.contains(t.id()))
                .collect()
        })
    }

    /// Looks up `flags`, building the archetype from `members` on a miss.
    fn intern_with(
        &self,
        flags: ComponentTypeFlags,
        members: impl FnOnce() -> Vec<ComponentType>,
    ) -> Archetype {
        let mut table = self.inner.table.lock();
        if let Some(existing) = table.get(&flags) {
            return existing.clone();
        }

        let mut components = members();
        components.sort_unstable();
        components.dedup();
        debug_assert!(
            components.iter().all(|ty| ComponentTypeRegistry::global()
                .get(ty.id())
                .is_some_and(|known| known.type_id() == ty.type_id())),
            "component type not issued by the global registry"
        );
        let archetype = Archetype(Arc::new(ArchetypeData {
            flags,
            components: components.into_boxed_slice(),
            registry_id: self.inner.id,
        }));
        tracing::trace!(archetype = %archetype, registry = self.inner.id, "interned archetype");
        table.insert(flags, archetype.clone());
        archetype
    }
}

impl Default for ArchetypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArchetypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeRegistry")
            .field("id", &self.inner.id)
            .field("archetypes", &self.len())
            .finish()
    }
}
