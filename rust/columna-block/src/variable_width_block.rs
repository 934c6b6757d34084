//! Leaf block of variable-length byte strings.

use std::fmt;

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

pub const VARIABLE_WIDTH_ENCODING: &str = "VARIABLE_WIDTH";

/// A leaf block of byte strings stored back to back in one shared buffer and
/// addressed through `position_count + 1` offsets.
#[derive(Clone)]
pub struct VariableWidthBlock {
    /// Window of `position_count + 1` offsets into `bytes`.
    offsets: SharedArray<u32>,
    bytes: SharedArray<u8>,
    value_is_null: Nulls,
}

impl VariableWidthBlock {
    pub fn new(bytes: Vec<u8>, offsets: Vec<u32>, value_is_null: Option<Vec<bool>>) -> Result<Self> {
        verify_arg!(offsets, !offsets.is_empty());
        let position_count = offsets.len() - 1;
        check_offsets(&offsets, position_count, bytes.len())?;
        if let Some(flags) = &value_is_null {
            verify_arg!(value_is_null, flags.len() == position_count);
        }
        Ok(VariableWidthBlock {
            offsets: SharedArray::from_vec(offsets),
            bytes: SharedArray::from_vec(bytes),
            value_is_null: Nulls::from_optional_flags(value_is_null),
        })
    }

    /// Creates a block where `None` entries are null positions.
    pub fn from_slices<S: AsRef<[u8]>>(values: &[Option<S>]) -> Self {
        let mut offsets = Offsets::with_capacity(values.len());
        let mut bytes = Vec::new();
        for value in values {
            let slice: &[u8] = value.as_ref().map_or(&[], |slice| slice.as_ref());
            bytes.extend_from_slice(slice);
            offsets.push_length(slice.len());
        }
        VariableWidthBlock {
            offsets: offsets.into_shared(),
            bytes: SharedArray::from_vec(bytes),
            value_is_null: Nulls::from_flags(values.iter().map(Option::is_none).collect()),
        }
    }

    pub fn from_strs(values: &[&str]) -> Self {
        let values: Vec<Option<&str>> = values.iter().copied().map(Some).collect();
        Self::from_slices(&values)
    }

    #[inline]
    pub fn position_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn may_have_null(&self) -> bool {
        self.value_is_null.may_have_null()
    }

    pub fn is_null(&self, position: usize) -> Result<bool> {
        check_valid_position(position, self.position_count())?;
        Ok(self.value_is_null.is_null(position))
    }

    pub fn get_slice_length(&self, position: usize) -> Result<usize> {
        check_valid_position(position, self.position_count())?;
        Ok((self.offsets[position + 1] - self.offsets[position]) as usize)
    }

    pub fn get_slice(&self, position: usize) -> Result<&[u8]> {
        check_valid_position(position, self.position_count())?;
        Ok(&self.bytes[self.offsets[position] as usize..self.offsets[position + 1] as usize])
    }

    pub fn get_value(&self, position: usize) -> Result<Value> {
        if self.is_null(position)? {
            return Ok(Value::Null);
        }
        Ok(Value::Bytes(self.get_slice(position)?.to_vec()))
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block> {
        check_valid_region(self.position_count(), offset, length)?;
        Ok(Block::VariableWidth(VariableWidthBlock {
            offsets: self.offsets.region(offset, length + 1),
            bytes: self.bytes.clone(),
            value_is_null: self.value_is_null.region(offset, length),
        }))
    }

    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block> {
        check_valid_region(self.position_count(), offset, length)?;
        let start = self.offsets[offset] as usize;
        let end = self.offsets[offset + length] as usize;
        let value_is_null = self.value_is_null.compact(offset, length);
        if self.offsets.is_whole()
            && self.offsets[0] == 0
            && length == self.position_count()
            && end == self.bytes.len()
            && value_is_null.is_same_view(&self.value_is_null)
        {
            return Ok(Block::VariableWidth(self.clone()));
        }
        Ok(Block::VariableWidth(VariableWidthBlock {
            offsets: SharedArray::from_vec(compact_offsets(&self.offsets, offset, length)),
            bytes: self.bytes.region(start, end - start).compact(),
            value_is_null,
        }))
    }

    pub fn copy_positions(&self, positions: &[u32], offset: usize, length: usize) -> Result<Block> {
        check_array_range(positions.len(), offset, length)?;
        let positions = &positions[offset..offset + length];
        let mut new_offsets = Offsets::with_capacity(length);
        let mut new_bytes = Vec::new();
        for &position in positions {
            let slice = self.get_slice(position as usize)?;
            new_bytes.extend_from_slice(slice);
            new_offsets.push_length(slice.len());
        }
        Ok(Block::VariableWidth(VariableWidthBlock {
            offsets: new_offsets.into_shared(),
            bytes: SharedArray::from_vec(new_bytes),
            value_is_null: self
                .value_is_null
                .gather(positions.iter().map(|&position| position as usize)),
        }))
    }

    pub fn get_size_in_bytes(&self) -> Result<u64> {
        self.get_region_size_in_bytes(0, self.position_count())
    }

    pub fn get_region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
        check_valid_region(self.position_count(), offset, length)?;
        let payload = self.offsets[offset + length] - self.offsets[offset];
        Ok(payload as u64 + (SIZE_OF_INT + SIZE_OF_BYTE) * length as u64)
    }

    pub fn get_positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        check_valid_positions(mask, self.position_count())?;
        let mut size = 0u64;
        for (position, _) in mask.iter().enumerate().filter(|(_, used)| **used) {
            let payload = self.offsets[position + 1] - self.offsets[position];
            size += payload as u64 + SIZE_OF_INT + SIZE_OF_BYTE;
        }
        Ok(size)
    }

    pub fn get_retained_size_in_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self.offsets.retained_size_in_bytes()
            + self.bytes.retained_size_in_bytes()
            + self.value_is_null.retained_size_in_bytes()
    }

    pub fn get_estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
        if self.is_null(position)? {
            Ok(0)
        } else {
            Ok(self.get_slice_length(position)? as u64)
        }
    }

    pub fn encoding_name(&self) -> &'static str {
        VARIABLE_WIDTH_ENCODING
    }
}

impl fmt::Debug for VariableWidthBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableWidthBlock")
            .field("position_count", &self.position_count())
            .field("slice_bytes", &(self.offsets[self.position_count()] - self.offsets[0]))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VariableWidthBlock {
        VariableWidthBlock::from_slices(&[Some("ab"), None, Some(""), Some("cde")])
    }

    #[test]
    fn test_accessors() {
        let block = sample();
        assert_eq!(block.position_count(), 4);
        assert_eq!(block.get_slice(0).unwrap(), b"ab");
        assert!(block.is_null(1).unwrap());
        assert_eq!(block.get_slice_length(2).unwrap(), 0);
        assert!(!block.is_null(2).unwrap());
        assert_eq!(block.get_value(3).unwrap(), Value::from("cde"));
        assert!(block.get_slice(4).unwrap_err().is_bounds_error());
    }

    #[test]
    fn test_new_validates_offsets() {
        assert!(VariableWidthBlock::new(b"abc".to_vec(), vec![0, 2, 1], None).is_err());
        assert!(VariableWidthBlock::new(b"abc".to_vec(), vec![0, 4], None).is_err());
        assert!(VariableWidthBlock::new(b"abc".to_vec(), vec![], None).is_err());
        let block = VariableWidthBlock::new(b"abc".to_vec(), vec![1, 3], None).unwrap();
        assert_eq!(block.get_slice(0).unwrap(), b"bc");
    }

    #[test]
    fn test_region_shares_bytes() {
        let block = sample();
        let region = block.get_region(2, 2).unwrap();
        let region = region.as_variable_width().unwrap();
        assert!(region.bytes.shares_storage_with(&block.bytes));
        assert_eq!(region.get_slice(1).unwrap(), b"cde");
        assert_eq!(region.get_size_in_bytes().unwrap(), 3 + 10);
    }

    #[test]
    fn test_copy_region_rebases() {
        let block = sample();
        let copy = block.copy_region(2, 2).unwrap();
        let copy = copy.as_variable_width().unwrap();
        assert!(!copy.bytes.shares_storage_with(&block.bytes));
        assert_eq!(&*copy.offsets, &[0, 0, 3]);
        assert_eq!(copy.get_slice(1).unwrap(), b"cde");

        let whole = block.copy_region(0, 4).unwrap();
        assert!(whole.as_variable_width().unwrap().bytes.is_same_view(&block.bytes));
    }

    #[test]
    fn test_copy_positions() {
        let block = sample();
        let copy = block.copy_positions(&[3, 1, 0, 3], 0, 4).unwrap();
        assert_eq!(
            copy.to_values().unwrap(),
            vec![
                Value::from("cde"),
                Value::Null,
                Value::from("ab"),
                Value::from("cde")
            ]
        );
    }

    #[test]
    fn test_positions_size() {
        let block = sample();
        assert_eq!(
            block
                .get_positions_size_in_bytes(&[true, false, false, true])
                .unwrap(),
            2 + 3 + 10
        );
    }
}
