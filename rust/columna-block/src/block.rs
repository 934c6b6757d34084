//! The block contract shared by every block kind.
//!
//! A [`Block`] is a fixed-length, position-addressed container holding one
//! column's worth of values for a batch of rows. Blocks are immutable after
//! construction: every derived block (region, copy, gather) is a new value that
//! shares backing storage with its source wherever that is legal.
//!
//! Block kinds form a closed set. Composite kinds ([`ArrayBlock`],
//! [`DictionaryBlock`]) wrap other blocks, including other composites, so every
//! recursive walk matches on the enum instead of inspecting types at runtime.

use std::fmt;

use columna_common::{Result, error::Error};

use crate::{
    array_block::ArrayBlock,
    block_util::{check_array_range, check_valid_position},
    dictionary_block::DictionaryBlock,
    fixed_width_block::FixedWidthBlock,
    lazy_block::LazyBlock,
    value::Value,
    variable_width_block::VariableWidthBlock,
};

/// A column of values for a batch of rows.
#[derive(Clone)]
pub enum Block {
    FixedWidth(FixedWidthBlock),
    VariableWidth(VariableWidthBlock),
    Array(ArrayBlock),
    Dictionary(DictionaryBlock),
    Lazy(LazyBlock),
}

macro_rules! dispatch {
    ($block:expr, $inner:ident => $body:expr) => {
        match $block {
            Block::FixedWidth($inner) => $body,
            Block::VariableWidth($inner) => $body,
            Block::Array($inner) => $body,
            Block::Dictionary($inner) => $body,
            Block::Lazy($inner) => $body,
        }
    };
}

impl Block {
    /// Returns the number of positions in this block.
    #[inline]
    pub fn position_count(&self) -> usize {
        dispatch!(self, block => block.position_count())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.position_count() == 0
    }

    /// Returns `false` only if no position of this block can be null.
    ///
    /// This is a cheap necessary condition; `true` does not imply that a null
    /// position exists.
    pub fn may_have_null(&self) -> bool {
        dispatch!(self, block => block.may_have_null())
    }

    /// Returns `true` if the value at `position` is null.
    pub fn is_null(&self, position: usize) -> Result<bool> {
        dispatch!(self, block => block.is_null(position))
    }

    pub fn get_byte(&self, position: usize) -> Result<i8> {
        match self {
            Block::FixedWidth(block) => block.get_byte(position),
            Block::Dictionary(block) => block.dictionary().get_byte(block.id(position)?),
            Block::Lazy(block) => block.load()?.get_byte(position),
            _ => Err(self.unsupported("get_byte")),
        }
    }

    pub fn get_short(&self, position: usize) -> Result<i16> {
        match self {
            Block::FixedWidth(block) => block.get_short(position),
            Block::Dictionary(block) => block.dictionary().get_short(block.id(position)?),
            Block::Lazy(block) => block.load()?.get_short(position),
            _ => Err(self.unsupported("get_short")),
        }
    }

    pub fn get_int(&self, position: usize) -> Result<i32> {
        match self {
            Block::FixedWidth(block) => block.get_int(position),
            Block::Dictionary(block) => block.dictionary().get_int(block.id(position)?),
            Block::Lazy(block) => block.load()?.get_int(position),
            _ => Err(self.unsupported("get_int")),
        }
    }

    pub fn get_long(&self, position: usize) -> Result<i64> {
        match self {
            Block::FixedWidth(block) => block.get_long(position),
            Block::Dictionary(block) => block.dictionary().get_long(block.id(position)?),
            Block::Lazy(block) => block.load()?.get_long(position),
            _ => Err(self.unsupported("get_long")),
        }
    }

    pub fn get_slice_length(&self, position: usize) -> Result<usize> {
        match self {
            Block::VariableWidth(block) => block.get_slice_length(position),
            Block::Dictionary(block) => block.dictionary().get_slice_length(block.id(position)?),
            Block::Lazy(block) => block.load()?.get_slice_length(position),
            _ => Err(self.unsupported("get_slice_length")),
        }
    }

    pub fn get_slice(&self, position: usize) -> Result<&[u8]> {
        match self {
            Block::VariableWidth(block) => block.get_slice(position),
            Block::Dictionary(block) => block.dictionary().get_slice(block.id(position)?),
            Block::Lazy(block) => block.load()?.get_slice(position),
            _ => Err(self.unsupported("get_slice")),
        }
    }

    /// Returns the nested entry at `position` as a zero-copy view over the raw
    /// element block.
    pub fn get_object(&self, position: usize) -> Result<Block> {
        match self {
            Block::Array(block) => block.get_object(position),
            Block::Dictionary(block) => block.dictionary().get_object(block.id(position)?),
            Block::Lazy(block) => block.load()?.get_object(position),
            _ => Err(self.unsupported("get_object")),
        }
    }

    /// Returns the logical value at `position`.
    pub fn get_value(&self, position: usize) -> Result<Value> {
        match self {
            Block::FixedWidth(block) => block.get_value(position),
            Block::VariableWidth(block) => block.get_value(position),
            Block::Array(block) => block.get_value(position),
            Block::Dictionary(block) => block.dictionary().get_value(block.id(position)?),
            Block::Lazy(block) => block.load()?.get_value(position),
        }
    }

    /// Returns all logical values of this block, in position order.
    pub fn to_values(&self) -> Result<Vec<Value>> {
        (0..self.position_count())
            .map(|position| self.get_value(position))
            .collect()
    }

    /// Returns `true` if both blocks hold the same logical values, position by
    /// position, regardless of encoding.
    pub fn values_equal(&self, other: &Block) -> Result<bool> {
        if self.position_count() != other.position_count() {
            return Ok(false);
        }
        for position in 0..self.position_count() {
            if self.get_value(position)? != other.get_value(position)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns a block holding a single owned copy of the value at `position`.
    pub fn get_single_value_block(&self, position: usize) -> Result<Block> {
        match self {
            Block::Dictionary(block) => block
                .dictionary()
                .get_single_value_block(block.id(position)?),
            Block::Lazy(block) => block.load()?.get_single_value_block(position),
            Block::Array(block) => block.get_single_value_block(position),
            _ => {
                check_valid_position(position, self.position_count())?;
                self.copy_region(position, 1)
            }
        }
    }

    /// Returns a view of `length` positions starting at `offset`.
    ///
    /// The view shares all backing storage with `self`; only the small view
    /// object is allocated.
    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block> {
        dispatch!(self, block => block.get_region(offset, length))
    }

    /// Returns a block that owns its data for `length` positions starting at
    /// `offset`, and is therefore safe to outlive `self`.
    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block> {
        dispatch!(self, block => block.copy_region(offset, length))
    }

    /// Gathers the positions named by `positions[offset..offset + length]` into
    /// a new block. Positions may repeat and appear in any order.
    pub fn copy_positions(&self, positions: &[u32], offset: usize, length: usize) -> Result<Block> {
        dispatch!(self, block => block.copy_positions(positions, offset, length))
    }

    /// Returns `false` if [`copy_positions`](Self::copy_positions) is known to
    /// fail for this block in its current state.
    pub fn supports_copy_positions(&self) -> bool {
        match self {
            Block::Lazy(block) => block.supports_copy_positions(),
            Block::Dictionary(block) => block.dictionary().supports_copy_positions(),
            Block::Array(block) => block.raw_element_block().supports_copy_positions(),
            Block::FixedWidth(_) | Block::VariableWidth(_) => true,
        }
    }

    /// Selects `positions[offset..offset + length]` without copying payload.
    ///
    /// The result is a dictionary block whose dictionary is `self` (or, for a
    /// dictionary block, its dictionary).
    pub fn get_positions(&self, positions: &[u32], offset: usize, length: usize) -> Result<Block> {
        if let Block::Dictionary(block) = self {
            return block.get_positions(positions, offset, length).map(Block::Dictionary);
        }
        check_array_range(positions.len(), offset, length)?;
        let ids = positions[offset..offset + length].to_vec();
        for &position in &ids {
            check_valid_position(position as usize, self.position_count())?;
        }
        Ok(Block::Dictionary(DictionaryBlock::new(self.clone(), ids)?))
    }

    /// Returns the logical size in bytes of this block's positions.
    ///
    /// Dictionary entries referenced by several positions are counted once.
    pub fn get_size_in_bytes(&self) -> Result<u64> {
        dispatch!(self, block => block.get_size_in_bytes())
    }

    /// Returns the size in bytes of `length` positions starting at `offset`.
    pub fn get_region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
        dispatch!(self, block => block.get_region_size_in_bytes(offset, length))
    }

    /// Returns the size in bytes of the positions selected by `mask`.
    ///
    /// `mask` must have exactly `position_count()` entries.
    pub fn get_positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        dispatch!(self, block => block.get_positions_size_in_bytes(mask))
    }

    /// Returns the number of bytes reachable from this block, including payload
    /// shared with other live blocks.
    pub fn get_retained_size_in_bytes(&self) -> u64 {
        dispatch!(self, block => block.get_retained_size_in_bytes())
    }

    /// Returns the size of this block as if every position held its own value.
    pub fn get_logical_size_in_bytes(&self) -> Result<u64> {
        match self {
            Block::Dictionary(block) => block.get_logical_size_in_bytes(),
            Block::Lazy(block) => match block.loaded() {
                Some(loaded) => loaded.get_logical_size_in_bytes(),
                None => Ok(0),
            },
            _ => self.get_size_in_bytes(),
        }
    }

    /// Returns the estimated payload size of the value at `position`, used for
    /// column statistics.
    pub fn get_estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
        match self {
            Block::Dictionary(block) => block
                .dictionary()
                .get_estimated_data_size_for_stats(block.id(position)?),
            Block::Lazy(block) => block.load()?.get_estimated_data_size_for_stats(position),
            Block::Array(block) => block.get_estimated_data_size_for_stats(position),
            Block::FixedWidth(block) => block.get_estimated_data_size_for_stats(position),
            Block::VariableWidth(block) => block.get_estimated_data_size_for_stats(position),
        }
    }

    /// Returns the stable name the encoding registry uses for this block kind.
    pub fn encoding_name(&self) -> &'static str {
        dispatch!(self, block => block.encoding_name())
    }

    /// Returns the directly owned sub-blocks.
    pub fn children(&self) -> Vec<&Block> {
        match self {
            Block::Array(block) => vec![block.raw_element_block()],
            Block::Dictionary(block) => vec![block.dictionary()],
            Block::Lazy(block) => block.loaded().into_iter().collect(),
            Block::FixedWidth(_) | Block::VariableWidth(_) => Vec::new(),
        }
    }

    /// Returns `true` if this block and all of its children are materialized.
    pub fn is_loaded(&self) -> bool {
        match self {
            Block::Lazy(block) => block.loaded().is_some_and(Block::is_loaded),
            Block::Array(block) => block.raw_element_block().is_loaded(),
            Block::Dictionary(block) => block.dictionary().is_loaded(),
            Block::FixedWidth(_) | Block::VariableWidth(_) => true,
        }
    }

    /// Returns a fully materialized equivalent of this block, loading every
    /// lazy child.
    pub fn get_loaded_block(&self) -> Result<Block> {
        match self {
            Block::Lazy(block) => block.load()?.get_loaded_block(),
            Block::Array(block) => block.get_loaded_block(),
            Block::Dictionary(block) => block.get_loaded_block().map(Block::Dictionary),
            Block::FixedWidth(_) | Block::VariableWidth(_) => Ok(self.clone()),
        }
    }

    pub fn as_dictionary(&self) -> Option<&DictionaryBlock> {
        match self {
            Block::Dictionary(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayBlock> {
        match self {
            Block::Array(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_fixed_width(&self) -> Option<&FixedWidthBlock> {
        match self {
            Block::FixedWidth(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_variable_width(&self) -> Option<&VariableWidthBlock> {
        match self {
            Block::VariableWidth(block) => Some(block),
            _ => None,
        }
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self, Block::Dictionary(_))
    }

    /// Returns the dictionary block this block is or, through loaded lazy
    /// blocks, evaluates to.
    pub fn resolved_dictionary(&self) -> Option<&DictionaryBlock> {
        match self {
            Block::Dictionary(block) => Some(block),
            Block::Lazy(block) => block.loaded().and_then(Block::resolved_dictionary),
            _ => None,
        }
    }

    fn unsupported(&self, operation: &str) -> Error {
        Error::unsupported(operation, self.encoding_name())
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, block => fmt::Debug::fmt(block, f))
    }
}

impl From<FixedWidthBlock> for Block {
    fn from(block: FixedWidthBlock) -> Self {
        Block::FixedWidth(block)
    }
}

impl From<VariableWidthBlock> for Block {
    fn from(block: VariableWidthBlock) -> Self {
        Block::VariableWidth(block)
    }
}

impl From<ArrayBlock> for Block {
    fn from(block: ArrayBlock) -> Self {
        Block::Array(block)
    }
}

impl From<DictionaryBlock> for Block {
    fn from(block: DictionaryBlock) -> Self {
        Block::Dictionary(block)
    }
}

impl From<LazyBlock> for Block {
    fn from(block: LazyBlock) -> Self {
        Block::Lazy(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn longs(values: &[i64]) -> Block {
        FixedWidthBlock::from_values(values.to_vec()).into()
    }

    #[test]
    fn test_get_positions_wraps_in_dictionary() {
        let block = longs(&[10, 20, 30]);
        let selected = block.get_positions(&[9, 2, 2, 0], 1, 3).unwrap();
        assert!(selected.is_dictionary());
        assert_eq!(
            selected.to_values().unwrap(),
            vec![Value::Long(30), Value::Long(30), Value::Long(10)]
        );
        assert!(block.get_positions(&[3], 0, 1).unwrap_err().is_bounds_error());
        assert!(block.get_positions(&[0], 1, 1).unwrap_err().is_bounds_error());
    }

    #[test]
    fn test_unsupported_accessors() {
        let block = longs(&[1]);
        assert!(block.get_slice(0).unwrap_err().is_unsupported());
        assert!(block.get_object(0).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_values_equal_across_encodings() {
        let flat = longs(&[30, 10, 10]);
        let dictionary: Block =
            DictionaryBlock::new(longs(&[10, 20, 30, 40]), vec![2, 0, 0])
                .unwrap()
                .into();
        assert!(flat.values_equal(&dictionary).unwrap());
        assert!(!flat.values_equal(&longs(&[30, 10])).unwrap());
        assert!(!flat.values_equal(&longs(&[30, 10, 11])).unwrap());
    }

    #[test]
    fn test_single_value_block() {
        let block = longs(&[5, 6, 7]);
        let single = block.get_single_value_block(1).unwrap();
        assert_eq!(single.position_count(), 1);
        assert_eq!(single.get_long(0).unwrap(), 6);
        assert!(block.get_single_value_block(3).is_err());
    }

    #[test]
    fn test_resolved_dictionary_follows_loaded_lazy() {
        let dictionary: Block = DictionaryBlock::new(longs(&[1, 2]), vec![1, 0])
            .unwrap()
            .into();
        assert!(dictionary.resolved_dictionary().is_some());
        assert!(longs(&[1]).resolved_dictionary().is_none());

        let lazy: Block = LazyBlock::from_block(dictionary).into();
        assert!(lazy.resolved_dictionary().is_none());
        lazy.get_loaded_block().unwrap();
        assert_eq!(lazy.resolved_dictionary().unwrap().position_count(), 2);
    }

    #[test]
    fn test_children() {
        let leaf = longs(&[1, 2]);
        assert!(leaf.children().is_empty());
        let dictionary: Block = DictionaryBlock::new(leaf, vec![1, 1]).unwrap().into();
        let children = dictionary.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].encoding_name(), "LONG_ARRAY");
    }
}
