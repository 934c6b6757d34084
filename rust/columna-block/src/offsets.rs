//! A growable collection of entry offsets, used while gathering variable-length
//! entries into a freshly owned block.

use crate::shared_array::SharedArray;

/// A collection of offsets for variable-length entries.
///
/// Stores a sequence of monotonically non-decreasing offsets, where each pair of
/// adjacent offsets defines the range of a single entry. The first offset is
/// always present and is zero for offsets built here.
#[derive(Debug, Clone)]
pub struct Offsets(Vec<u32>);

impl Offsets {
    /// Creates an empty collection holding the single leading offset `0`.
    pub fn new() -> Offsets {
        Self::with_capacity(0)
    }

    /// Creates an empty collection with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Offsets {
        let mut offsets = Vec::with_capacity(capacity + 1);
        offsets.push(0);
        Offsets(offsets)
    }

    /// Returns the number of entries, one less than the number of stored offsets.
    #[inline]
    pub fn item_count(&self) -> usize {
        self.0.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Returns the offset that marks the end of the last entry.
    #[inline]
    pub fn last(&self) -> u32 {
        self.0[self.0.len() - 1]
    }

    /// Appends an entry of `len` elements.
    #[inline]
    pub fn push_length(&mut self, len: usize) {
        let last = self.last();
        self.0.push(last + len as u32);
    }

    /// Appends `count` zero-length entries.
    #[inline]
    pub fn push_empty(&mut self, count: usize) {
        let last = self.last();
        self.0.resize(self.0.len() + count, last);
    }

    /// Converts the offsets into the shared form stored by blocks.
    pub fn into_shared(self) -> SharedArray<u32> {
        SharedArray::from_vec(self.0)
    }
}

impl Default for Offsets {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for Offsets {
    type Target = [u32];

    #[inline]
    fn deref(&self) -> &[u32] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let offsets = Offsets::new();
        assert_eq!(offsets.item_count(), 0);
        assert_eq!(offsets.as_slice(), &[0]);
        assert!(offsets.is_empty());
    }

    #[test]
    fn test_push_length() {
        let mut offsets = Offsets::new();
        offsets.push_length(2);
        assert_eq!(offsets.as_slice(), &[0, 2]);

        offsets.push_length(0);
        offsets.push_length(3);
        assert_eq!(offsets.as_slice(), &[0, 2, 2, 5]);
        assert_eq!(offsets.item_count(), 3);
        assert_eq!(offsets.last(), 5);
    }

    #[test]
    fn test_push_empty() {
        let mut offsets = Offsets::with_capacity(4);
        offsets.push_length(5);
        offsets.push_empty(3);
        assert_eq!(offsets.as_slice(), &[0, 5, 5, 5, 5]);
        assert_eq!(offsets.item_count(), 4);

        offsets.push_empty(0);
        assert_eq!(offsets.item_count(), 4);
    }

    #[test]
    fn test_into_shared() {
        let mut offsets = Offsets::new();
        offsets.push_length(1);
        offsets.push_length(4);
        let shared = offsets.into_shared();
        assert_eq!(&*shared, &[0, 1, 5]);
        assert!(shared.is_whole());
    }
}
