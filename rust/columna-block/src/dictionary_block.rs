//! Dictionary-encoded block: per-position ids into a shared dictionary block.
//!
//! Logical position `p` of a [`DictionaryBlock`] holds the value at
//! `dictionary[ids[ids_offset + p]]`. The dictionary may itself be a dictionary
//! block; compaction flattens such chains before rewriting the dictionary.
//!
//! Derived statistics (compact size, unique id count, id sequentiality and the
//! logical size) are computed on first use and published through a
//! `OnceLock`. Two threads racing on the first access may both compute the
//! value from the same immutable inputs; the first published result wins and
//! the other is dropped, so readers never observe a partially built value.

use std::fmt;
use std::sync::{Arc, OnceLock};

use ahash::AHashMap;
use columna_common::{Result, error::Error, verify_arg, verify_state};

use crate::{
    block::Block,
    block_util::{
        SIZE_OF_INT, check_array_range, check_valid_position, check_valid_positions,
        check_valid_region, count_used_positions,
    },
    dictionary_id::DictionaryId,
    shared_array::SharedArray,
};

pub const DICTIONARY_ENCODING: &str = "DICTIONARY";

/// Marks a dictionary index that has not been assigned a compact index yet.
const UNMAPPED: u32 = u32::MAX;

/// Statistics derived from one pass over the ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CompactStats {
    /// Size of the dictionary entries actually referenced, plus the ids.
    size_in_bytes: u64,
    unique_ids: usize,
    /// Referenced dictionary indices strictly increase with position.
    is_sequential_ids: bool,
}

#[derive(Clone)]
pub struct DictionaryBlock {
    position_count: usize,
    dictionary: Arc<Block>,
    ids_offset: usize,
    ids: SharedArray<u32>,
    retained_size_in_bytes: u64,
    dictionary_source_id: DictionaryId,
    stats: OnceLock<CompactStats>,
    logical_size_in_bytes: OnceLock<u64>,
}

impl DictionaryBlock {
    /// Creates a dictionary block over `dictionary` with a freshly minted
    /// dictionary id.
    ///
    /// Every id must address a position of `dictionary`.
    pub fn new(dictionary: Block, ids: Vec<u32>) -> Result<DictionaryBlock> {
        Self::with_dictionary_id(dictionary, ids, DictionaryId::random())
    }

    /// Creates a dictionary block that reuses an existing dictionary id.
    ///
    /// The caller guarantees that blocks sharing `dictionary_id` reference
    /// identical dictionary contents.
    pub fn with_dictionary_id(
        dictionary: Block,
        ids: Vec<u32>,
        dictionary_id: DictionaryId,
    ) -> Result<DictionaryBlock> {
        let dictionary_count = dictionary.position_count();
        if let Some(&id) = ids.iter().find(|&&id| id as usize >= dictionary_count) {
            return Err(Error::invalid_arg(
                "ids",
                format!("id {id} is out of bounds for dictionary of {dictionary_count} positions"),
            ));
        }
        let position_count = ids.len();
        Self::try_new(
            0,
            position_count,
            Arc::new(dictionary),
            SharedArray::from_vec(ids),
            false,
            false,
            dictionary_id,
        )
    }

    /// Creates a dictionary block over a window of `ids`.
    ///
    /// `dictionary_is_compacted` asserts that every dictionary position is
    /// referenced; it pre-populates the compact statistics and is rejected for
    /// nested dictionaries. `is_sequential_ids` is only valid together with it.
    /// Ids are not validated here.
    pub fn try_new(
        ids_offset: usize,
        position_count: usize,
        dictionary: Arc<Block>,
        ids: SharedArray<u32>,
        dictionary_is_compacted: bool,
        is_sequential_ids: bool,
        dictionary_source_id: DictionaryId,
    ) -> Result<DictionaryBlock> {
        verify_arg!(
            ids,
            ids_offset <= ids.len() && ids.len() - ids_offset >= position_count
        );
        verify_arg!(
            dictionary_is_compacted,
            !dictionary_is_compacted || dictionary.resolved_dictionary().is_none()
        );
        verify_arg!(
            is_sequential_ids,
            !is_sequential_ids || dictionary_is_compacted
        );

        let stats = if dictionary_is_compacted {
            OnceLock::from(CompactStats {
                size_in_bytes: dictionary.get_size_in_bytes()?
                    + SIZE_OF_INT * position_count as u64,
                unique_ids: dictionary.position_count(),
                is_sequential_ids,
            })
        } else {
            OnceLock::new()
        };

        Ok(DictionaryBlock {
            position_count,
            retained_size_in_bytes: std::mem::size_of::<Self>() as u64
                + ids.retained_size_in_bytes(),
            dictionary,
            ids_offset,
            ids,
            dictionary_source_id,
            stats,
            logical_size_in_bytes: OnceLock::new(),
        })
    }

    #[inline]
    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn dictionary(&self) -> &Block {
        &self.dictionary
    }

    /// Returns the shared handle of the dictionary block.
    pub fn shared_dictionary(&self) -> &Arc<Block> {
        &self.dictionary
    }

    pub fn dictionary_source_id(&self) -> DictionaryId {
        self.dictionary_source_id
    }

    /// Returns the dictionary position referenced by `position`.
    #[inline]
    pub fn id(&self, position: usize) -> Result<usize> {
        check_valid_position(position, self.position_count)?;
        Ok(self.id_unchecked(position))
    }

    #[inline]
    fn id_unchecked(&self, position: usize) -> usize {
        self.ids[position + self.ids_offset] as usize
    }

    /// Returns the dictionary block this block's dictionary resolves to, if
    /// any, looking through loaded lazy blocks.
    #[inline]
    fn nested_dictionary(&self) -> Option<&DictionaryBlock> {
        self.dictionary.resolved_dictionary()
    }

    /// Returns a zero-copy view of the ids of this block's positions.
    pub fn ids(&self) -> SharedArray<u32> {
        self.ids.region(self.ids_offset, self.position_count)
    }

    pub fn may_have_null(&self) -> bool {
        self.position_count > 0 && self.dictionary.may_have_null()
    }

    pub fn is_null(&self, position: usize) -> Result<bool> {
        check_valid_position(position, self.position_count)?;
        if !self.may_have_null() {
            return Ok(false);
        }
        self.dictionary.is_null(self.id_unchecked(position))
    }

    /// Returns the number of distinct dictionary positions referenced.
    pub fn unique_ids(&self) -> Result<usize> {
        Ok(self.compact_stats()?.unique_ids)
    }

    /// Returns `true` if referenced dictionary positions strictly increase with
    /// position. Nested dictionaries always report `false`.
    pub fn is_sequential_ids(&self) -> Result<bool> {
        Ok(self.compact_stats()?.is_sequential_ids)
    }

    /// Returns `true` if every dictionary position is referenced and the
    /// dictionary is not itself a dictionary block.
    pub fn is_compact(&self) -> Result<bool> {
        if self.nested_dictionary().is_some() {
            return Ok(false);
        }
        Ok(self.compact_stats()?.unique_ids == self.dictionary.position_count())
    }

    /// Returns an equivalent block whose dictionary holds exactly the
    /// referenced values, each once, in first-reference order.
    ///
    /// Nested dictionaries are flattened first. A compacted block gets a new
    /// dictionary id. If the dictionary cannot gather positions (an unloaded
    /// lazy block), `self` is returned unchanged.
    pub fn compact(&self) -> Result<DictionaryBlock> {
        if self.is_compact()? {
            return Ok(self.clone());
        }

        if self.nested_dictionary().is_some() {
            return self.unnest()?.compact();
        }

        // determine which dictionary entries are referenced and build a reindex for them
        let dictionary_size = self.dictionary.position_count();
        let mut dictionary_positions_to_copy =
            Vec::with_capacity(dictionary_size.min(self.position_count));
        let mut remap_index = vec![UNMAPPED; dictionary_size];
        for position in 0..self.position_count {
            let dictionary_index = self.id_unchecked(position);
            let slot = remap_index
                .get_mut(dictionary_index)
                .ok_or_else(|| missing_key(dictionary_index))?;
            if *slot == UNMAPPED {
                *slot = dictionary_positions_to_copy.len() as u32;
                dictionary_positions_to_copy.push(dictionary_index as u32);
            }
        }

        // entire dictionary is referenced
        if dictionary_positions_to_copy.len() == dictionary_size {
            return Ok(self.clone());
        }

        let mut new_ids = Vec::with_capacity(self.position_count);
        for position in 0..self.position_count {
            let new_id = remap_index[self.id_unchecked(position)];
            verify_state!(new_id, new_id != UNMAPPED);
            new_ids.push(new_id);
        }

        if !self.dictionary.supports_copy_positions() {
            log::debug!(
                "skipping compaction: {} dictionary does not support copy_positions",
                self.dictionary.encoding_name()
            );
            return Ok(self.clone());
        }
        // Copying positions requires a loaded dictionary, which may have
        // turned out to be a dictionary block itself.
        if self.nested_dictionary().is_some() {
            return self.unnest()?.compact();
        }
        let compact_dictionary = match self.dictionary.copy_positions(
            &dictionary_positions_to_copy,
            0,
            dictionary_positions_to_copy.len(),
        ) {
            Ok(block) => block,
            Err(e) if e.is_unsupported() => {
                log::debug!("skipping compaction: {e}");
                return Ok(self.clone());
            }
            Err(e) => return Err(e),
        };

        // The copied dictionary follows first-reference order, so the ids are
        // sequential exactly when no dictionary position is referenced twice.
        let is_sequential_ids = self.compact_stats()?.unique_ids == self.position_count;
        verify_state!(
            compact_dictionary,
            compact_dictionary.resolved_dictionary().is_none()
        );
        DictionaryBlock::try_new(
            0,
            self.position_count,
            Arc::new(compact_dictionary),
            SharedArray::from_vec(new_ids),
            true,
            is_sequential_ids,
            DictionaryId::random(),
        )
    }

    /// Resolves every id through the whole chain of nested dictionaries down to
    /// the first non-dictionary block.
    fn unnest(&self) -> Result<DictionaryBlock> {
        let mut ids: Vec<u32> = (0..self.position_count)
            .map(|position| self.id_unchecked(position) as u32)
            .collect();

        let mut dictionary = &self.dictionary;
        while let Some(nested) = dictionary.resolved_dictionary() {
            for id in ids.iter_mut() {
                let index = *id as usize;
                verify_state!(nested_id, index < nested.position_count);
                *id = nested.id_unchecked(index) as u32;
            }
            dictionary = &nested.dictionary;
        }

        let position_count = ids.len();
        DictionaryBlock::try_new(
            0,
            position_count,
            dictionary.clone(),
            SharedArray::from_vec(ids),
            false,
            false,
            DictionaryId::random(),
        )
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block> {
        check_valid_region(self.position_count, offset, length)?;
        if length == self.position_count {
            return Ok(Block::Dictionary(self.clone()));
        }
        DictionaryBlock::try_new(
            self.ids_offset + offset,
            length,
            self.dictionary.clone(),
            self.ids.clone(),
            false,
            false,
            self.dictionary_source_id,
        )
        .map(Block::Dictionary)
    }

    /// Copies a region, choosing the cheapest correct strategy:
    /// a contiguous copy of the dictionary when the ids are the identity,
    /// a direct gather through the dictionary when ids are unique or the
    /// dictionary is nested, and otherwise a compacted dictionary block over
    /// the copied ids.
    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block> {
        check_valid_region(self.position_count, offset, length)?;
        if length == 0 {
            return self.dictionary.copy_region(0, 0);
        }
        // Only statistics that are already computed steer the choice.
        let stats = self.stats.get().copied();
        let is_identity = stats.is_some_and(|stats| {
            stats.unique_ids == self.dictionary.position_count() && stats.is_sequential_ids
        });
        if length == 1 || is_identity {
            return self
                .dictionary
                .copy_region(self.id_unchecked(offset), length);
        }
        let all_unique = stats.is_some_and(|stats| stats.unique_ids == self.position_count);
        if self.nested_dictionary().is_some() || all_unique {
            return self
                .dictionary
                .copy_positions(&self.ids, self.ids_offset + offset, length);
        }
        let start = self.ids_offset + offset;
        let new_ids = self.ids[start..start + length].to_vec();
        DictionaryBlock::try_new(
            0,
            length,
            self.dictionary.clone(),
            SharedArray::from_vec(new_ids),
            false,
            false,
            DictionaryId::random(),
        )?
        .compact()
        .map(Block::Dictionary)
    }

    /// Gathers positions, unwrapping this dictionary layer when positions are
    /// likely unique, and otherwise copying each referenced dictionary entry
    /// once into a compact dictionary.
    pub fn copy_positions(&self, positions: &[u32], offset: usize, length: usize) -> Result<Block> {
        check_array_range(positions.len(), offset, length)?;
        let positions = &positions[offset..offset + length];

        let all_unique = self
            .stats
            .get()
            .is_some_and(|stats| stats.unique_ids == self.position_count);
        if length <= 1 || self.nested_dictionary().is_some() || all_unique {
            let positions_to_copy = positions
                .iter()
                .map(|&position| self.id(position as usize).map(|id| id as u32))
                .collect::<Result<Vec<_>>>()?;
            return self.dictionary.copy_positions(&positions_to_copy, 0, length);
        }

        let mut positions_to_copy = Vec::new();
        let mut old_index_to_new_index =
            AHashMap::with_capacity(length.min(self.dictionary.position_count()));
        let mut new_ids = Vec::with_capacity(length);
        for &position in positions {
            let old_index = self.id(position as usize)? as u32;
            let new_id = *old_index_to_new_index
                .entry(old_index)
                .or_insert_with(|| {
                    positions_to_copy.push(old_index);
                    (positions_to_copy.len() - 1) as u32
                });
            new_ids.push(new_id);
        }
        let compact_dictionary =
            self.dictionary
                .copy_positions(&positions_to_copy, 0, positions_to_copy.len())?;
        if positions_to_copy.len() == length {
            // all positions turned out to be unique
            return Ok(compact_dictionary);
        }
        let dictionary_is_compacted = compact_dictionary.resolved_dictionary().is_none();
        DictionaryBlock::try_new(
            0,
            length,
            Arc::new(compact_dictionary),
            SharedArray::from_vec(new_ids),
            dictionary_is_compacted,
            false,
            DictionaryId::random(),
        )
        .map(Block::Dictionary)
    }

    /// Selects positions without copying the dictionary. The result keeps this
    /// block's dictionary id.
    pub fn get_positions(
        &self,
        positions: &[u32],
        offset: usize,
        length: usize,
    ) -> Result<DictionaryBlock> {
        check_array_range(positions.len(), offset, length)?;
        let dictionary_count = self.dictionary.position_count();
        let mut is_compact = length >= dictionary_count && self.is_compact()?;
        let mut seen = if is_compact {
            vec![false; dictionary_count]
        } else {
            Vec::new()
        };
        let mut new_ids = Vec::with_capacity(length);
        for &position in &positions[offset..offset + length] {
            let id = self.id(position as usize)?;
            if is_compact {
                seen[id] = true;
            }
            new_ids.push(id as u32);
        }
        is_compact = is_compact && seen.iter().all(|&used| used);
        DictionaryBlock::try_new(
            0,
            length,
            self.dictionary.clone(),
            SharedArray::from_vec(new_ids),
            is_compact,
            false,
            self.dictionary_source_id,
        )
    }

    pub fn get_size_in_bytes(&self) -> Result<u64> {
        Ok(self.compact_stats()?.size_in_bytes)
    }

    fn compact_stats(&self) -> Result<&CompactStats> {
        if let Some(stats) = self.stats.get() {
            return Ok(stats);
        }
        let stats = self.calculate_compact_size()?;
        Ok(self.stats.get_or_init(|| stats))
    }

    /// Single pass over the ids counting unique references and checking
    /// sequentiality, then sizing only the referenced dictionary entries.
    fn calculate_compact_size(&self) -> Result<CompactStats> {
        let mut used = vec![false; self.dictionary.position_count()];
        let mut unique_ids = 0;
        let mut previous_position: Option<usize> = None;
        let mut is_sequential_ids = true;
        for position in 0..self.position_count {
            let id = self.id_unchecked(position);
            unique_ids += usize::from(mark_used(&mut used, id)?);

            is_sequential_ids = is_sequential_ids && previous_position.is_none_or(|p| p < id);
            previous_position = Some(id);
        }

        let dictionary_block_size = match self.nested_dictionary() {
            // Size nested dictionaries as if unnested, without copying ids.
            Some(nested) => {
                is_sequential_ids = false;
                if unique_ids == nested.position_count {
                    nested.compacted_dictionary_size_in_bytes()?
                } else {
                    nested.compacted_dictionary_positions_size_in_bytes(&used)?
                }
            }
            None => {
                if unique_ids == self.dictionary.position_count() {
                    self.dictionary.get_size_in_bytes()?
                } else {
                    self.dictionary.get_positions_size_in_bytes(&used)?
                }
            }
        };

        Ok(CompactStats {
            size_in_bytes: dictionary_block_size + SIZE_OF_INT * self.position_count as u64,
            unique_ids,
            is_sequential_ids,
        })
    }

    /// Size of the compacted dictionary, as if nested dictionaries were unnested.
    fn compacted_dictionary_size_in_bytes(&self) -> Result<u64> {
        Ok(self.compact_stats()?.size_in_bytes - SIZE_OF_INT * self.position_count as u64)
    }

    /// Size of the compacted dictionary restricted to the selected positions.
    fn compacted_dictionary_positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        let used = self.used_dictionary_positions(mask)?;
        match self.nested_dictionary() {
            Some(nested) => nested.compacted_dictionary_positions_size_in_bytes(&used),
            None => self.dictionary.get_positions_size_in_bytes(&used),
        }
    }

    /// Maps a position mask to the mask of dictionary positions it references.
    fn used_dictionary_positions(&self, mask: &[bool]) -> Result<Vec<bool>> {
        check_valid_positions(mask, self.position_count)?;
        let mut used = vec![false; self.dictionary.position_count()];
        for (position, _) in mask.iter().enumerate().filter(|(_, selected)| **selected) {
            mark_used(&mut used, self.id_unchecked(position))?;
        }
        Ok(used)
    }

    /// Returns the size of the values as if every position held its own copy.
    ///
    /// The size of each referenced dictionary position is computed once and
    /// reused for every position that references it.
    pub fn get_logical_size_in_bytes(&self) -> Result<u64> {
        if let Some(size) = self.logical_size_in_bytes.get() {
            return Ok(*size);
        }
        let mut seen_sizes: Vec<Option<u64>> = vec![None; self.dictionary.position_count()];
        let mut size_in_bytes = 0u64;
        for position in 0..self.position_count {
            let id = self.id_unchecked(position);
            let seen = seen_sizes.get_mut(id).ok_or_else(|| missing_key(id))?;
            size_in_bytes += match *seen {
                Some(size) => size,
                None => {
                    let size = self.dictionary.get_region_size_in_bytes(id, 1)?;
                    *seen = Some(size);
                    size
                }
            };
        }
        Ok(*self.logical_size_in_bytes.get_or_init(|| size_in_bytes))
    }

    pub fn get_region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
        check_valid_region(self.position_count, offset, length)?;
        if offset == 0 && length == self.position_count {
            return self.get_size_in_bytes();
        }
        let mut used = vec![false; self.dictionary.position_count()];
        for position in offset..offset + length {
            mark_used(&mut used, self.id_unchecked(position))?;
        }
        Ok(self.dictionary.get_positions_size_in_bytes(&used)? + SIZE_OF_INT * length as u64)
    }

    pub fn get_positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        let used = self.used_dictionary_positions(mask)?;
        Ok(self.dictionary.get_positions_size_in_bytes(&used)?
            + SIZE_OF_INT * count_used_positions(mask) as u64)
    }

    pub fn get_retained_size_in_bytes(&self) -> u64 {
        self.retained_size_in_bytes + self.dictionary.get_retained_size_in_bytes()
    }

    /// Returns a block over the loaded dictionary. Loading produces a new
    /// physical dictionary, so the result gets a new dictionary id.
    pub fn get_loaded_block(&self) -> Result<DictionaryBlock> {
        if self.dictionary.is_loaded() {
            return Ok(self.clone());
        }
        let loaded = self.dictionary.get_loaded_block()?;
        DictionaryBlock::try_new(
            self.ids_offset,
            self.position_count,
            Arc::new(loaded),
            self.ids.clone(),
            false,
            false,
            DictionaryId::random(),
        )
    }

    pub fn encoding_name(&self) -> &'static str {
        DICTIONARY_ENCODING
    }
}

/// Marks dictionary position `id` as referenced, returning `true` on the first
/// reference.
fn mark_used(used: &mut [bool], id: usize) -> Result<bool> {
    let slot = used.get_mut(id).ok_or_else(|| missing_key(id))?;
    Ok(!std::mem::replace(slot, true))
}

#[cold]
fn missing_key(id: usize) -> Error {
    Error::internal(format!("id {id} references a non-existent key"))
}

impl fmt::Debug for DictionaryBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictionaryBlock")
            .field("position_count", &self.position_count)
            .field("dictionary_source_id", &self.dictionary_source_id)
            .field("dictionary", &self.dictionary)
            .finish()
    }
}
