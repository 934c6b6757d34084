//! Nested block of variable-length entries over a shared raw element block.
//!
//! Entry `i` of an [`ArrayBlock`] occupies raw element positions
//! `offsets[offset_base + i]..offsets[offset_base + i + 1]`. Regions only shift
//! `offset_base` and shrink `position_count`; the offsets, null flags and raw
//! element block stay shared with the source.

use std::fmt;
use std::sync::{Arc, OnceLock};

use columna_common::{Result, verify_arg};

use crate::{
    block::Block,
    block_util::{
        SIZE_OF_BYTE, SIZE_OF_INT, check_array_range, check_offsets, check_valid_position,
        check_valid_positions, check_valid_region, compact_offsets,
    },
    nulls::Nulls,
    offsets::Offsets,
    shared_array::SharedArray,
    value::Value,
};

pub const ARRAY_ENCODING: &str = "ARRAY";

/// Per-entry overhead: one offset plus one null flag.
const ENTRY_OVERHEAD: u64 = SIZE_OF_INT + SIZE_OF_BYTE;

#[derive(Clone)]
pub struct ArrayBlock {
    offset_base: usize,
    position_count: usize,
    value_is_null: Nulls,
    offsets: SharedArray<u32>,
    raw_element_block: Arc<Block>,
    size_in_bytes: OnceLock<u64>,
}

impl ArrayBlock {
    /// Creates an array block from `position_count + 1` offsets into `values`.
    ///
    /// Validates that offsets are non-decreasing, end within `values`, and that
    /// null entries are empty.
    pub fn from_array_offsets(
        value_is_null: Option<Vec<bool>>,
        offsets: Vec<u32>,
        values: Block,
    ) -> Result<ArrayBlock> {
        verify_arg!(offsets, !offsets.is_empty());
        let position_count = offsets.len() - 1;
        check_offsets(&offsets, position_count, values.position_count())?;
        if let Some(flags) = &value_is_null {
            verify_arg!(value_is_null, flags.len() == position_count);
            for (position, _) in flags.iter().enumerate().filter(|(_, is_null)| **is_null) {
                verify_arg!(
                    value_is_null,
                    offsets[position] == offsets[position + 1]
                );
            }
        }
        Ok(Self::create_internal(
            0,
            position_count,
            Nulls::from_optional_flags(value_is_null),
            SharedArray::from_vec(offsets),
            Arc::new(values),
        ))
    }

    fn create_internal(
        offset_base: usize,
        position_count: usize,
        value_is_null: Nulls,
        offsets: SharedArray<u32>,
        raw_element_block: Arc<Block>,
    ) -> ArrayBlock {
        ArrayBlock {
            offset_base,
            position_count,
            value_is_null,
            offsets,
            raw_element_block,
            size_in_bytes: OnceLock::new(),
        }
    }

    #[inline]
    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn raw_element_block(&self) -> &Block {
        &self.raw_element_block
    }

    /// Returns the shared handle of the raw element block.
    pub fn shared_raw_element_block(&self) -> &Arc<Block> {
        &self.raw_element_block
    }

    /// Returns the whole backing offsets array; entries start at `offset_base()`.
    pub fn offsets(&self) -> &SharedArray<u32> {
        &self.offsets
    }

    pub fn offset_base(&self) -> usize {
        self.offset_base
    }

    #[inline]
    fn offset(&self, position: usize) -> usize {
        self.offsets[position + self.offset_base] as usize
    }

    /// Returns the raw element range of the entry at `position`.
    pub fn entry_range(&self, position: usize) -> Result<std::ops::Range<usize>> {
        check_valid_position(position, self.position_count)?;
        Ok(self.offset(position)..self.offset(position + 1))
    }

    pub fn may_have_null(&self) -> bool {
        self.value_is_null.may_have_null()
    }

    pub fn is_null(&self, position: usize) -> Result<bool> {
        check_valid_position(position, self.position_count)?;
        Ok(self.value_is_null.is_null(position + self.offset_base))
    }

    /// Returns the entry at `position` as a region of the raw element block.
    pub fn get_object(&self, position: usize) -> Result<Block> {
        let range = self.entry_range(position)?;
        self.raw_element_block
            .get_region(range.start, range.end - range.start)
    }

    pub fn get_value(&self, position: usize) -> Result<Value> {
        if self.is_null(position)? {
            return Ok(Value::Null);
        }
        Ok(Value::Array(self.get_object(position)?.to_values()?))
    }

    /// Applies `function` to the raw element block and the entry's start and length.
    pub fn apply<T>(
        &self,
        position: usize,
        function: impl FnOnce(&Block, usize, usize) -> T,
    ) -> Result<T> {
        let range = self.entry_range(position)?;
        Ok(function(
            &self.raw_element_block,
            range.start,
            range.end - range.start,
        ))
    }

    pub fn get_single_value_block(&self, position: usize) -> Result<Block> {
        let range = self.entry_range(position)?;
        let length = range.end - range.start;
        let values = self.raw_element_block.copy_region(range.start, length)?;
        let value_is_null = if self.is_null(position)? {
            Nulls::from_flags(vec![true])
        } else {
            Nulls::none()
        };
        Ok(Block::Array(Self::create_internal(
            0,
            1,
            value_is_null,
            SharedArray::from_vec(vec![0, length as u32]),
            Arc::new(values),
        )))
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block> {
        check_valid_region(self.position_count, offset, length)?;
        Ok(Block::Array(Self::create_internal(
            offset + self.offset_base,
            length,
            self.value_is_null.clone(),
            self.offsets.clone(),
            self.raw_element_block.clone(),
        )))
    }

    /// Copies the raw elements spanned by the region and rebases its offsets to
    /// start at zero.
    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block> {
        check_valid_region(self.position_count, offset, length)?;
        let start = self.offset(offset);
        let end = self.offset(offset + length);
        let values = self.raw_element_block.copy_region(start, end - start)?;
        let offsets = compact_offsets(&self.offsets, offset + self.offset_base, length);
        let value_is_null = self
            .value_is_null
            .compact(offset + self.offset_base, length);
        Ok(Block::Array(Self::create_internal(
            0,
            length,
            value_is_null,
            SharedArray::from_vec(offsets),
            Arc::new(values),
        )))
    }

    /// Gathers the selected entries with a single gather over the raw element
    /// block. Null entries contribute no raw elements.
    pub fn copy_positions(&self, positions: &[u32], offset: usize, length: usize) -> Result<Block> {
        check_array_range(positions.len(), offset, length)?;
        let positions = &positions[offset..offset + length];

        let mut new_offsets = Offsets::with_capacity(length);
        let mut new_value_is_null = self.value_is_null.as_shared().map(|_| vec![false; length]);
        let mut values_positions = Vec::new();
        for (index, &position) in positions.iter().enumerate() {
            let position = position as usize;
            if self.is_null(position)? {
                if let Some(flags) = new_value_is_null.as_mut() {
                    flags[index] = true;
                }
                new_offsets.push_empty(1);
            } else {
                let start = self.offset(position);
                let end = self.offset(position + 1);
                new_offsets.push_length(end - start);
                values_positions.extend(start as u32..end as u32);
            }
        }
        let values =
            self.raw_element_block
                .copy_positions(&values_positions, 0, values_positions.len())?;
        Ok(Block::Array(Self::create_internal(
            0,
            length,
            Nulls::from_optional_flags(new_value_is_null),
            new_offsets.into_shared(),
            Arc::new(values),
        )))
    }

    pub fn get_size_in_bytes(&self) -> Result<u64> {
        if let Some(size) = self.size_in_bytes.get() {
            return Ok(*size);
        }
        let size = self.get_region_size_in_bytes(0, self.position_count)?;
        Ok(*self.size_in_bytes.get_or_init(|| size))
    }

    pub fn get_region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
        check_valid_region(self.position_count, offset, length)?;
        let start = self.offset(offset);
        let end = self.offset(offset + length);
        Ok(self
            .raw_element_block
            .get_region_size_in_bytes(start, end - start)?
            + ENTRY_OVERHEAD * length as u64)
    }

    /// Marks every raw element covered by a selected entry and sizes exactly
    /// those.
    pub fn get_positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        check_valid_positions(mask, self.position_count)?;
        let mut used = vec![false; self.raw_element_block.position_count()];
        let mut used_position_count = 0u64;
        for (position, _) in mask.iter().enumerate().filter(|(_, selected)| **selected) {
            used_position_count += 1;
            used[self.offset(position)..self.offset(position + 1)].fill(true);
        }
        Ok(self.raw_element_block.get_positions_size_in_bytes(&used)?
            + ENTRY_OVERHEAD * used_position_count)
    }

    pub fn get_retained_size_in_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self.offsets.retained_size_in_bytes()
            + self.value_is_null.retained_size_in_bytes()
            + self.raw_element_block.get_retained_size_in_bytes()
    }

    pub fn get_estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
        if self.is_null(position)? {
            return Ok(0);
        }
        let mut size = 0;
        for index in self.offset(position)..self.offset(position + 1) {
            size += self
                .raw_element_block
                .get_estimated_data_size_for_stats(index)?;
        }
        Ok(size)
    }

    pub fn get_loaded_block(&self) -> Result<Block> {
        if self.raw_element_block.is_loaded() {
            return Ok(Block::Array(self.clone()));
        }
        let loaded = self.raw_element_block.get_loaded_block()?;
        Ok(Block::Array(Self::create_internal(
            self.offset_base,
            self.position_count,
            self.value_is_null.clone(),
            self.offsets.clone(),
            Arc::new(loaded),
        )))
    }

    pub fn encoding_name(&self) -> &'static str {
        ARRAY_ENCODING
    }
}

impl fmt::Debug for ArrayBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayBlock")
            .field("position_count", &self.position_count)
            .field("offset_base", &self.offset_base)
            .field("raw_element_block", &self.raw_element_block)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixed_width_block::FixedWidthBlock, variable_width_block::VariableWidthBlock};

    fn letters() -> Block {
        VariableWidthBlock::from_strs(&["a", "b", "c", "d", "e"]).into()
    }

    /// Entries `[a, b]`, null, `[c, d, e]`.
    fn sample() -> ArrayBlock {
        ArrayBlock::from_array_offsets(
            Some(vec![false, true, false]),
            vec![0, 2, 2, 5],
            letters(),
        )
        .unwrap()
    }

    fn strs(values: &[&str]) -> Value {
        Value::Array(values.iter().map(|&value| Value::from(value)).collect())
    }

    #[test]
    fn test_entries() {
        let block = sample();
        assert_eq!(block.position_count(), 3);
        assert_eq!(block.get_value(0).unwrap(), strs(&["a", "b"]));
        assert_eq!(block.get_value(1).unwrap(), Value::Null);
        assert_eq!(block.get_value(2).unwrap(), strs(&["c", "d", "e"]));
        assert!(block.is_null(3).unwrap_err().is_bounds_error());

        let entry = block.get_object(2).unwrap();
        assert_eq!(entry.position_count(), 3);
        assert_eq!(entry.get_slice(0).unwrap(), b"c");
    }

    #[test]
    fn test_from_array_offsets_validation() {
        assert!(ArrayBlock::from_array_offsets(None, vec![0, 3, 2], letters()).is_err());
        assert!(ArrayBlock::from_array_offsets(None, vec![0, 6], letters()).is_err());
        assert!(
            ArrayBlock::from_array_offsets(Some(vec![true]), vec![0, 1], letters()).is_err()
        );
        assert!(ArrayBlock::from_array_offsets(Some(vec![false]), vec![0, 1, 2], letters()).is_err());
    }

    #[test]
    fn test_region_shares_storage() {
        let block = sample();
        let region = block.get_region(1, 2).unwrap();
        let region = region.as_array().unwrap();
        assert_eq!(region.position_count(), 2);
        assert_eq!(region.offset_base(), 1);
        assert!(Arc::ptr_eq(
            region.shared_raw_element_block(),
            block.shared_raw_element_block()
        ));
        assert!(region.offsets().is_same_view(block.offsets()));
        assert!(region.is_null(0).unwrap());
        assert_eq!(region.get_value(1).unwrap(), strs(&["c", "d", "e"]));
    }

    #[test]
    fn test_copy_region_compacts() {
        let block = sample();
        let copy = block.copy_region(1, 2).unwrap();
        let copy = copy.as_array().unwrap();
        assert_eq!(copy.offset_base(), 0);
        assert_eq!(&**copy.offsets(), &[0, 0, 3]);
        assert_eq!(copy.raw_element_block().position_count(), 3);
        assert!(copy.is_null(0).unwrap());
        assert_eq!(copy.get_value(1).unwrap(), strs(&["c", "d", "e"]));
    }

    #[test]
    fn test_copy_positions_gathers_once() {
        let block = sample();
        let copy = block.copy_positions(&[2, 1, 0, 2], 0, 4).unwrap();
        let copy = copy.as_array().unwrap();
        assert_eq!(&**copy.offsets(), &[0, 3, 3, 5, 8]);
        assert_eq!(copy.raw_element_block().position_count(), 8);
        assert_eq!(
            Block::Array(copy.clone()).to_values().unwrap(),
            vec![
                strs(&["c", "d", "e"]),
                Value::Null,
                strs(&["a", "b"]),
                strs(&["c", "d", "e"]),
            ]
        );
        assert!(block.copy_positions(&[3], 0, 1).unwrap_err().is_bounds_error());
    }

    #[test]
    fn test_positions_size_counts_referenced_elements() {
        let raw: Block = FixedWidthBlock::from_values(vec![1i64, 2, 3, 4]).into();
        // Entries [1, 2, 3] and [], raw element 4 is never referenced.
        let block = ArrayBlock::from_array_offsets(None, vec![0, 3, 3], raw).unwrap();
        let block = block.get_region(0, 2).unwrap();
        assert_eq!(
            block.get_positions_size_in_bytes(&[true, false]).unwrap(),
            3 * 9 + 5
        );
        assert_eq!(
            block.get_positions_size_in_bytes(&[true, true]).unwrap(),
            3 * 9 + 2 * 5
        );
        assert_eq!(block.get_size_in_bytes().unwrap(), 3 * 9 + 2 * 5);
    }

    #[test]
    fn test_single_value_block_and_stats() {
        let block = sample();
        let single = block.get_single_value_block(2).unwrap();
        assert_eq!(single.position_count(), 1);
        assert_eq!(single.get_value(0).unwrap(), strs(&["c", "d", "e"]));
        assert_eq!(block.get_estimated_data_size_for_stats(2).unwrap(), 3);
        assert_eq!(block.get_estimated_data_size_for_stats(1).unwrap(), 0);
        assert_eq!(
            block
                .apply(0, |raw, start, length| (raw.position_count(), start, length))
                .unwrap(),
            (5, 0, 2)
        );
    }
}
