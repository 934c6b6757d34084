//! An immutable, cheaply cloneable and sliceable backing array for block views.
//!
//! Every block keeps its ids, offsets, null flags and fixed-width payload in
//! `SharedArray`s. A region of a block holds a clone of the same `Arc` plus a
//! narrower window, so no payload bytes are copied and no view can mutate what
//! another view observes.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// An immutable window into an `Arc<Vec<T>>` shared by any number of block views.
#[derive(Clone)]
pub struct SharedArray<T> {
    inner: Arc<Vec<T>>,
    offset: usize,
    len: usize,
}

impl<T> SharedArray<T> {
    /// Creates a new `SharedArray` owning `vec`, viewing all of it.
    pub fn from_vec(vec: Vec<T>) -> Self {
        let len = vec.len();
        SharedArray {
            inner: Arc::new(vec),
            offset: 0,
            len,
        }
    }

    /// Returns an empty `SharedArray`.
    pub fn empty() -> Self {
        SharedArray::from_vec(Vec::new())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.inner[self.offset..self.offset + self.len]
    }

    /// Returns a view of `len` elements starting at `offset`, sharing the same storage.
    ///
    /// # Panics
    ///
    /// Panics if the window does not fit into this view. Block code validates
    /// regions before slicing.
    pub fn region(&self, offset: usize, len: usize) -> Self {
        assert!(
            offset <= self.len && len <= self.len - offset,
            "region out of bounds"
        );
        SharedArray {
            inner: self.inner.clone(),
            offset: self.offset + offset,
            len,
        }
    }

    /// Returns `true` if this view covers the entire backing vector.
    #[inline]
    pub fn is_whole(&self) -> bool {
        self.offset == 0 && self.len == self.inner.len()
    }

    /// Returns `true` if both views alias the same backing vector.
    #[inline]
    pub fn shares_storage_with(&self, other: &SharedArray<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` if both views alias the same backing vector with the same window.
    #[inline]
    pub fn is_same_view(&self, other: &SharedArray<T>) -> bool {
        self.shares_storage_with(other) && self.offset == other.offset && self.len == other.len
    }

    /// Bytes held by the entire backing vector, regardless of the window.
    ///
    /// This is the retained-heap figure: a narrow region still keeps the whole
    /// vector alive.
    pub fn retained_size_in_bytes(&self) -> u64 {
        std::mem::size_of_val(self.inner.as_slice()) as u64
    }

    /// Returns an owned copy of the window, or a clone of `self` if the window
    /// already covers the whole backing vector.
    pub fn compact(&self) -> Self
    where
        T: Clone,
    {
        if self.is_whole() {
            self.clone()
        } else {
            SharedArray::from_vec(self.as_slice().to_vec())
        }
    }
}

impl<T> Deref for SharedArray<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> AsRef<[T]> for SharedArray<T> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedArray").field(&self.as_slice()).finish()
    }
}

impl<T: PartialEq> PartialEq for SharedArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for SharedArray<T> {}

impl<T> Default for SharedArray<T> {
    fn default() -> Self {
        SharedArray::empty()
    }
}

impl<T> From<Vec<T>> for SharedArray<T> {
    fn from(vec: Vec<T>) -> Self {
        SharedArray::from_vec(vec)
    }
}

impl<T: Clone> From<&[T]> for SharedArray<T> {
    fn from(slice: &[T]) -> Self {
        SharedArray::from_vec(slice.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_shares_storage() {
        let array = SharedArray::from_vec(vec![1u32, 2, 3, 4, 5]);
        let region = array.region(1, 3);
        assert_eq!(&*region, &[2, 3, 4]);
        assert!(region.shares_storage_with(&array));
        assert!(!region.is_same_view(&array));
        assert!(!region.is_whole());

        let nested = region.region(1, 2);
        assert_eq!(&*nested, &[3, 4]);
        assert!(nested.shares_storage_with(&array));
    }

    #[test]
    fn test_retained_size_counts_whole_backing() {
        let array = SharedArray::from_vec(vec![0u32; 10]);
        assert_eq!(array.retained_size_in_bytes(), 40);
        assert_eq!(array.region(2, 3).retained_size_in_bytes(), 40);
    }

    #[test]
    fn test_compact() {
        let array = SharedArray::from_vec(vec![1i64, 2, 3]);
        let same = array.compact();
        assert!(same.is_same_view(&array));

        let region = array.region(1, 2);
        let owned = region.compact();
        assert_eq!(&*owned, &[2, 3]);
        assert!(!owned.shares_storage_with(&array));
        assert!(owned.is_whole());
    }

    #[test]
    #[should_panic]
    fn test_region_out_of_bounds() {
        let array = SharedArray::from_vec(vec![1u8, 2]);
        let _ = array.region(1, 2);
    }

    #[test]
    fn test_empty_and_default() {
        let empty = SharedArray::<i32>::empty();
        assert!(empty.is_empty());
        assert_eq!(empty, SharedArray::default());
        assert_eq!(empty.region(0, 0).len(), 0);
    }
}
