//! # Fixed Component-Type Bitset
//!
//! A set of component-type ids packed into 256 bits (four `u64` words).
//! One bit per possible id, so membership, union and subset tests are a
//! handful of word operations and the set is usable as a hash key.

use std::fmt;

/// Number of 64-bit words needed to address every `u8` id.
pub const FLAG_WORDS: usize = 4;

/// Fixed-capacity set of component-type ids.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentTypeFlags {
    words: [u64; FLAG_WORDS],
}

impl ComponentTypeFlags {
    /// The empty set.
    pub const EMPTY: Self = Self {
        words: [0; FLAG_WORDS],
    };

    /// Creates a set holding a single id.
    #[inline]
    #[must_use]
    pub fn from_id(id: u8) -> Self {
        let mut flags = Self::EMPTY;
        flags.insert(id);
        flags
    }

    /// Creates a set from raw words. Bit `b` of word `w` is id `w * 64 + b`.
    #[inline]
    #[must_use]
    pub const fn from_words(words: [u64; FLAG_WORDS]) -> Self {
        Self { words }
    }

    /// Returns the raw words.
    #[inline]
    #[must_use]
    pub const fn words(&self) -> &[u64; FLAG_WORDS] {
        &self.words
    }

    /// Adds an id to the set.
    #[inline]
    pub fn insert(&mut self, id: u8) {
        let (word, bit) = split(id);
        self.words[word] |= 1u64 << bit;
    }

    /// Removes an id from the set.
    #[inline]
    pub fn remove(&mut self, id: u8) {
        let (word, bit) = split(id);
        self.words[word] &= !(1u64 << bit);
    }

    /// Returns `true` if `id` is a member.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: u8) -> bool {
        let (word, bit) = split(id);
        (self.words[word] >> bit) & 1 == 1
    }

    /// Returns `true` if every member of `other` is also a member of `self`.
    #[inline]
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == *b)
    }

    /// Returns `true` if the two sets share at least one id.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Members of either set.
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut words = self.words;
        for (w, o) in words.iter_mut().zip(other.words.iter()) {
            *w |= o;
        }
        Self { words }
    }

    /// Members of both sets.
    #[inline]
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut words = self.words;
        for (w, o) in words.iter_mut().zip(other.words.iter()) {
            *w &= o;
        }
        Self { words }
    }

    /// Members of `self` that are not in `other`.
    #[inline]
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut words = self.words;
        for (w, o) in words.iter_mut().zip(other.words.iter()) {
            *w &= !o;
        }
        Self { words }
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns `true` if the set has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Iterates over member ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        iter_bits(&self.words)
    }
}

impl FromIterator<u8> for ComponentTypeFlags {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut flags = Self::EMPTY;
        for id in iter {
            flags.insert(id);
        }
        flags
    }
}

impl fmt::Debug for ComponentTypeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[inline]
fn split(id: u8) -> (usize, u32) {
    (usize::from(id) / 64, u32::from(id) % 64)
}

/// Iterates over the set bits of a word slice, lowest id first.
///
/// Ids past 255 cannot occur for valid input; they are skipped.
pub(crate) fn iter_bits(words: &[u64]) -> impl Iterator<Item = u8> + '_ {
    words.iter().enumerate().flat_map(|(word_index, &word)| {
        let base = word_index * 64;
        let mut bits = word;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let tz = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(base + tz)
        })
        .filter_map(|id| u8::try_from(id).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains_remove() {
        let mut flags = ComponentTypeFlags::EMPTY;
        assert!(!flags.contains(200));

        flags.insert(200);
        assert!(flags.contains(200));
        assert_eq!(flags.count(), 1);

        flags.remove(200);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_every_word_is_addressable() {
        let flags: ComponentTypeFlags = [0u8, 63, 64, 127, 128, 191, 192, 255].into_iter().collect();
        assert_eq!(flags.count(), 8);
        assert_eq!(
            flags.iter().collect::<Vec<_>>(),
            vec![0, 63, 64, 127, 128, 191, 192, 255]
        );
    }

    #[test]
    fn test_contains_all() {
        let big: ComponentTypeFlags = [1u8, 2, 3, 100].into_iter().collect();
        let small: ComponentTypeFlags = [2u8, 100].into_iter().collect();
        assert!(big.contains_all(&small));
        assert!(!small.contains_all(&big));
        assert!(big.contains_all(&ComponentTypeFlags::EMPTY));
    }

    #[test]
    fn test_union_difference() {
        let a: ComponentTypeFlags = [1u8, 2].into_iter().collect();
        let b: ComponentTypeFlags = [2u8, 3].into_iter().collect();
        assert_eq!(a.union(&b).iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(a.difference(&b).iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(a.intersection(&b).iter().collect::<Vec<_>>(), vec![2]);
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_iteration_order_is_canonical() {
        let a: ComponentTypeFlags = [9u8, 3, 77, 3].into_iter().collect();
        let b: ComponentTypeFlags = [77u8, 9, 3].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![3, 9, 77]);
    }
}
