//! Per-position null flags of a block.

use crate::shared_array::SharedArray;

/// Null flags for the positions of a block.
///
/// `None` means no position is null. Flags that contain no `true` entry are
/// collapsed to `None` at construction, so [`Nulls::may_have_null`] is a cheap
/// necessary condition checked before the per-position lookup.
#[derive(Debug, Clone, Default)]
pub struct Nulls(Option<SharedArray<bool>>);

impl Nulls {
    /// No position is null.
    pub fn none() -> Nulls {
        Nulls(None)
    }

    /// Builds null flags from a vector where `true` marks a null position.
    pub fn from_flags(flags: Vec<bool>) -> Nulls {
        if flags.iter().any(|&is_null| is_null) {
            Nulls(Some(SharedArray::from_vec(flags)))
        } else {
            Nulls(None)
        }
    }

    pub fn from_optional_flags(flags: Option<Vec<bool>>) -> Nulls {
        flags.map_or_else(Nulls::none, Nulls::from_flags)
    }

    #[inline]
    pub fn may_have_null(&self) -> bool {
        self.0.is_some()
    }

    /// Returns `true` if the flag at raw `index` is set.
    ///
    /// # Panics
    ///
    /// Panics if flags are present and `index` is out of bounds.
    #[inline]
    pub fn is_null(&self, index: usize) -> bool {
        self.0.as_ref().is_some_and(|flags| flags[index])
    }

    pub fn as_shared(&self) -> Option<&SharedArray<bool>> {
        self.0.as_ref()
    }

    pub fn as_slice(&self) -> Option<&[bool]> {
        self.0.as_deref()
    }

    /// Returns a zero-copy view of `len` flags starting at `offset`.
    pub fn region(&self, offset: usize, len: usize) -> Nulls {
        Nulls(self.0.as_ref().map(|flags| flags.region(offset, len)))
    }

    /// Returns owned flags for `len` positions starting at `offset`, reusing the
    /// backing array when the window already covers all of it.
    pub fn compact(&self, offset: usize, len: usize) -> Nulls {
        Nulls(
            self.0
                .as_ref()
                .map(|flags| flags.region(offset, len).compact()),
        )
    }

    /// Gathers the flags at `indices` into new owned flags.
    pub fn gather(&self, indices: impl Iterator<Item = usize>) -> Nulls {
        match &self.0 {
            Some(flags) => Nulls::from_flags(indices.map(|index| flags[index]).collect()),
            None => Nulls::none(),
        }
    }

    /// Returns `true` if both flag sets alias the same view (or are both absent).
    pub fn is_same_view(&self, other: &Nulls) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(left), Some(right)) => left.is_same_view(right),
            _ => false,
        }
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        self.0
            .as_ref()
            .map_or(0, |flags| flags.retained_size_in_bytes())
    }
}
