//! # Pooled Component-Type Set
//!
//! A variable-length bit-vector of component-type ids. Trailing zero words
//! are trimmed and every distinct bit pattern is pooled process-wide, so
//! sets with few, low ids take a single word and equal sets share one
//! allocation. Interchangeable with [`ComponentTypeFlags`].

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::flags::{iter_bits, ComponentTypeFlags, FLAG_WORDS};

static POOL: OnceLock<Mutex<HashSet<Arc<[u64]>>>> = OnceLock::new();

fn pool() -> &'static Mutex<HashSet<Arc<[u64]>>> {
    POOL.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Returns the pooled instance for `words`, trimming trailing zero words.
fn pooled(words: &[u64]) -> Arc<[u64]> {
    let len = words.iter().rposition(|w| *w != 0).map_or(0, |i| i + 1);
    let words = &words[..len];

    let mut pool = pool().lock();
    if let Some(existing) = pool.get(words) {
        return Arc::clone(existing);
    }
    let instance: Arc<[u64]> = Arc::from(words);
    pool.insert(Arc::clone(&instance));
    instance
}

/// Immutable, pooled set of component-type ids.
#[derive(Clone)]
pub struct ComponentTypeSet {
    words: Arc<[u64]>,
}

impl ComponentTypeSet {
    /// The empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self { words: pooled(&[]) }
    }

    /// Builds a set from ids in any order; duplicates collapse.
    #[must_use]
    pub fn from_ids<I: IntoIterator<Item = u8>>(ids: I) -> Self {
        let mut words = [0u64; FLAG_WORDS];
        for id in ids {
            words[usize::from(id) / 64] |= 1u64 << (id % 64);
        }
        Self {
            words: pooled(&words),
        }
    }

    /// Returns `true` if `id` is a member.
    #[must_use]
    pub fn contains(&self, id: u8) -> bool {
        self.words
            .get(usize::from(id) / 64)
            .is_some_and(|w| (w >> (id % 64)) & 1 == 1)
    }

    /// Returns `true` if every member of `other` is also a member of `self`.
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        if other.words.len() > self.words.len() {
            return false;
        }
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == *b)
    }

    /// Members of either set.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self == other {
            return self.clone();
        }
        let len = self.words.len().max(other.words.len());
        let words: Vec<u64> = (0..len)
            .map(|i| self.word(i) | other.word(i))
            .collect();
        Self {
            words: pooled(&words),
        }
    }

    /// Members of `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let words: Vec<u64> = (0..self.words.len())
            .map(|i| self.word(i) & !other.word(i))
            .collect();
        Self {
            words: pooled(&words),
        }
    }

    /// Number of members.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns `true` if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterates over member ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        iter_bits(&self.words)
    }

    /// Returns `true` if both sets share the same pooled storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.words, &other.words)
    }

    fn word(&self, index: usize) -> u64 {
        self.words.get(index).copied().unwrap_or(0)
    }
}

impl Default for ComponentTypeSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for ComponentTypeSet {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.words == other.words
    }
}

impl Eq for ComponentTypeSet {}

impl std::hash::Hash for ComponentTypeSet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.words.hash(state);
    }
}

impl From<ComponentTypeFlags> for ComponentTypeSet {
    fn from(flags: ComponentTypeFlags) -> Self {
        Self {
            words: pooled(flags.words()),
        }
    }
}

impl From<&ComponentTypeSet> for ComponentTypeFlags {
    fn from(set: &ComponentTypeSet) -> Self {
        let mut words = [0u64; FLAG_WORDS];
        for (dst, src) in words.iter_mut().zip(set.words.iter()) {
            *dst = *src;
        }
        ComponentTypeFlags::from_words(words)
    }
}

impl FromIterator<u8> for ComponentTypeSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self::from_ids(iter)
    }
}

impl fmt::Debug for ComponentTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
