//! Leaf block of fixed-width integers.

use std::fmt;

use columna_common::{Result, error::Error, verify_arg};

use crate::{
    block::Block,
    block_util::{
        SIZE_OF_BYTE, check_array_range, check_valid_position, check_valid_positions,
        check_valid_region, count_used_positions,
    },
    nulls::Nulls,
    shared_array::SharedArray,
    value::Value,
};

pub const BYTE_ARRAY_ENCODING: &str = "BYTE_ARRAY";
pub const SHORT_ARRAY_ENCODING: &str = "SHORT_ARRAY";
pub const INT_ARRAY_ENCODING: &str = "INT_ARRAY";
pub const LONG_ARRAY_ENCODING: &str = "LONG_ARRAY";

/// Contiguous payload of a [`FixedWidthBlock`].
#[derive(Clone)]
pub enum FixedWidthValues {
    Byte(SharedArray<i8>),
    Short(SharedArray<i16>),
    Int(SharedArray<i32>),
    Long(SharedArray<i64>),
}

macro_rules! with_values {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            FixedWidthValues::Byte($v) => $body,
            FixedWidthValues::Short($v) => $body,
            FixedWidthValues::Int($v) => $body,
            FixedWidthValues::Long($v) => $body,
        }
    };
}

macro_rules! map_values {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            FixedWidthValues::Byte($v) => FixedWidthValues::Byte($body),
            FixedWidthValues::Short($v) => FixedWidthValues::Short($body),
            FixedWidthValues::Int($v) => FixedWidthValues::Int($body),
            FixedWidthValues::Long($v) => FixedWidthValues::Long($body),
        }
    };
}

impl FixedWidthValues {
    #[inline]
    pub fn len(&self) -> usize {
        with_values!(self, values => values.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of a single value in bytes.
    pub fn width(&self) -> u64 {
        match self {
            FixedWidthValues::Byte(_) => 1,
            FixedWidthValues::Short(_) => 2,
            FixedWidthValues::Int(_) => 4,
            FixedWidthValues::Long(_) => 8,
        }
    }

    pub fn encoding_name(&self) -> &'static str {
        match self {
            FixedWidthValues::Byte(_) => BYTE_ARRAY_ENCODING,
            FixedWidthValues::Short(_) => SHORT_ARRAY_ENCODING,
            FixedWidthValues::Int(_) => INT_ARRAY_ENCODING,
            FixedWidthValues::Long(_) => LONG_ARRAY_ENCODING,
        }
    }

    /// Returns the value at `index` widened to `i64`.
    #[inline]
    pub fn get_long(&self, index: usize) -> i64 {
        with_values!(self, values => i64::from(values[index]))
    }

    fn region(&self, offset: usize, len: usize) -> Self {
        map_values!(self, values => values.region(offset, len))
    }

    fn compact(&self) -> Self {
        map_values!(self, values => values.compact())
    }

    fn gather(&self, positions: &[u32]) -> Self {
        map_values!(self, values => SharedArray::from_vec(
            positions.iter().map(|&position| values[position as usize]).collect()
        ))
    }

    fn is_same_view(&self, other: &FixedWidthValues) -> bool {
        match (self, other) {
            (FixedWidthValues::Byte(left), FixedWidthValues::Byte(right)) => {
                left.is_same_view(right)
            }
            (FixedWidthValues::Short(left), FixedWidthValues::Short(right)) => {
                left.is_same_view(right)
            }
            (FixedWidthValues::Int(left), FixedWidthValues::Int(right)) => left.is_same_view(right),
            (FixedWidthValues::Long(left), FixedWidthValues::Long(right)) => {
                left.is_same_view(right)
            }
            _ => false,
        }
    }

    fn retained_size_in_bytes(&self) -> u64 {
        with_values!(self, values => values.retained_size_in_bytes())
    }
}

/// Native integer types that a [`FixedWidthBlock`] can hold.
pub trait FixedWidthType: Copy + Default + Send + Sync + 'static {
    fn wrap(values: SharedArray<Self>) -> FixedWidthValues;
}

macro_rules! impl_fixed_width_type {
    ($ty:ty, $variant:ident) => {
        impl FixedWidthType for $ty {
            fn wrap(values: SharedArray<Self>) -> FixedWidthValues {
                FixedWidthValues::$variant(values)
            }
        }
    };
}

impl_fixed_width_type!(i8, Byte);
impl_fixed_width_type!(i16, Short);
impl_fixed_width_type!(i32, Int);
impl_fixed_width_type!(i64, Long);

/// A leaf block holding fixed-width integers contiguously, with optional null
/// flags. Regions are windows over the same shared arrays.
#[derive(Clone)]
pub struct FixedWidthBlock {
    values: FixedWidthValues,
    value_is_null: Nulls,
}

impl FixedWidthBlock {
    /// Creates a block from `values` and optional null flags of the same length.
    pub fn new<T: FixedWidthType>(values: Vec<T>, value_is_null: Option<Vec<bool>>) -> Result<Self> {
        if let Some(flags) = &value_is_null {
            verify_arg!(value_is_null, flags.len() == values.len());
        }
        Ok(FixedWidthBlock {
            values: T::wrap(SharedArray::from_vec(values)),
            value_is_null: Nulls::from_optional_flags(value_is_null),
        })
    }

    /// Creates a block in which no position is null.
    pub fn from_values<T: FixedWidthType>(values: Vec<T>) -> Self {
        FixedWidthBlock {
            values: T::wrap(SharedArray::from_vec(values)),
            value_is_null: Nulls::none(),
        }
    }

    /// Creates a block where `None` entries are null positions.
    pub fn from_options<T: FixedWidthType>(values: Vec<Option<T>>) -> Self {
        let flags = values.iter().map(Option::is_none).collect();
        FixedWidthBlock {
            values: T::wrap(SharedArray::from_vec(
                values.into_iter().map(Option::unwrap_or_default).collect(),
            )),
            value_is_null: Nulls::from_flags(flags),
        }
    }

    #[inline]
    pub fn position_count(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &FixedWidthValues {
        &self.values
    }

    pub fn may_have_null(&self) -> bool {
        self.value_is_null.may_have_null()
    }

    pub fn is_null(&self, position: usize) -> Result<bool> {
        check_valid_position(position, self.position_count())?;
        Ok(self.value_is_null.is_null(position))
    }

    pub fn get_byte(&self, position: usize) -> Result<i8> {
        check_valid_position(position, self.position_count())?;
        match &self.values {
            FixedWidthValues::Byte(values) => Ok(values[position]),
            _ => Err(self.unsupported("get_byte")),
        }
    }

    pub fn get_short(&self, position: usize) -> Result<i16> {
        check_valid_position(position, self.position_count())?;
        match &self.values {
            FixedWidthValues::Short(values) => Ok(values[position]),
            _ => Err(self.unsupported("get_short")),
        }
    }

    pub fn get_int(&self, position: usize) -> Result<i32> {
        check_valid_position(position, self.position_count())?;
        match &self.values {
            FixedWidthValues::Int(values) => Ok(values[position]),
            _ => Err(self.unsupported("get_int")),
        }
    }

    /// Returns the value at `position`, widened to `i64` for narrower widths.
    pub fn get_long(&self, position: usize) -> Result<i64> {
        check_valid_position(position, self.position_count())?;
        Ok(self.values.get_long(position))
    }

    pub fn get_value(&self, position: usize) -> Result<Value> {
        if self.is_null(position)? {
            return Ok(Value::Null);
        }
        Ok(Value::Long(self.values.get_long(position)))
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block> {
        check_valid_region(self.position_count(), offset, length)?;
        Ok(Block::FixedWidth(FixedWidthBlock {
            values: self.values.region(offset, length),
            value_is_null: self.value_is_null.region(offset, length),
        }))
    }

    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block> {
        check_valid_region(self.position_count(), offset, length)?;
        let values = self.values.region(offset, length).compact();
        let value_is_null = self.value_is_null.compact(offset, length);
        if values.is_same_view(&self.values) && value_is_null.is_same_view(&self.value_is_null) {
            return Ok(Block::FixedWidth(self.clone()));
        }
        Ok(Block::FixedWidth(FixedWidthBlock {
            values,
            value_is_null,
        }))
    }

    pub fn copy_positions(&self, positions: &[u32], offset: usize, length: usize) -> Result<Block> {
        check_array_range(positions.len(), offset, length)?;
        let positions = &positions[offset..offset + length];
        for &position in positions {
            check_valid_position(position as usize, self.position_count())?;
        }
        Ok(Block::FixedWidth(FixedWidthBlock {
            values: self.values.gather(positions),
            value_is_null: self
                .value_is_null
                .gather(positions.iter().map(|&position| position as usize)),
        }))
    }

    pub fn get_size_in_bytes(&self) -> Result<u64> {
        Ok(self.entry_size() * self.position_count() as u64)
    }

    pub fn get_region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
        check_valid_region(self.position_count(), offset, length)?;
        Ok(self.entry_size() * length as u64)
    }

    pub fn get_positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        check_valid_positions(mask, self.position_count())?;
        Ok(self.entry_size() * count_used_positions(mask) as u64)
    }

    pub fn get_retained_size_in_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self.values.retained_size_in_bytes()
            + self.value_is_null.retained_size_in_bytes()
    }

    pub fn get_estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
        if self.is_null(position)? {
            Ok(0)
        } else {
            Ok(self.values.width())
        }
    }

    pub fn encoding_name(&self) -> &'static str {
        self.values.encoding_name()
    }

    /// Value width plus the null flag.
    fn entry_size(&self) -> u64 {
        self.values.width() + SIZE_OF_BYTE
    }

    fn unsupported(&self, operation: &str) -> Error {
        Error::unsupported(operation, self.encoding_name())
    }
}

impl fmt::Debug for FixedWidthBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedWidthBlock")
            .field("encoding", &self.encoding_name())
            .field("position_count", &self.position_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let block = FixedWidthBlock::from_options(vec![Some(7i32), None, Some(-3)]);
        assert_eq!(block.position_count(), 3);
        assert!(block.may_have_null());
        assert!(block.is_null(1).unwrap());
        assert_eq!(block.get_int(2).unwrap(), -3);
        assert_eq!(block.get_long(0).unwrap(), 7);
        assert_eq!(block.get_value(1).unwrap(), Value::Null);
        assert!(block.get_byte(0).unwrap_err().is_unsupported());
        assert!(block.is_null(3).unwrap_err().is_bounds_error());
        assert_eq!(block.encoding_name(), INT_ARRAY_ENCODING);
    }

    #[test]
    fn test_new_rejects_mismatched_nulls() {
        assert!(FixedWidthBlock::new(vec![1i64, 2], Some(vec![false])).is_err());
        let block = FixedWidthBlock::new(vec![1i16, 2], Some(vec![false, false])).unwrap();
        assert!(!block.may_have_null());
        assert_eq!(block.get_short(1).unwrap(), 2);
    }

    #[test]
    fn test_region_and_copy() {
        let block = FixedWidthBlock::from_values(vec![1i64, 2, 3, 4]);
        let region = block.get_region(1, 2).unwrap();
        assert_eq!(region.get_long(0).unwrap(), 2);
        assert_eq!(region.get_long(1).unwrap(), 3);
        assert!(region.get_long(2).is_err());

        let copy = block.copy_region(1, 2).unwrap();
        let copy = copy.as_fixed_width().unwrap();
        match (copy.values(), block.values()) {
            (FixedWidthValues::Long(copied), FixedWidthValues::Long(source)) => {
                assert!(!copied.shares_storage_with(source));
                assert_eq!(&**copied, &[2, 3]);
            }
            _ => panic!("unexpected payload"),
        }

        let whole = block.copy_region(0, 4).unwrap();
        assert!(whole.as_fixed_width().unwrap().values.is_same_view(&block.values));
    }

    #[test]
    fn test_copy_positions() {
        let block = FixedWidthBlock::from_options(vec![Some(1i8), None, Some(3)]);
        let copy = block.copy_positions(&[2, 1, 2, 0], 0, 4).unwrap();
        assert_eq!(
            copy.to_values().unwrap(),
            vec![Value::Long(3), Value::Null, Value::Long(3), Value::Long(1)]
        );
        assert!(block.copy_positions(&[3], 0, 1).unwrap_err().is_bounds_error());
    }

    #[test]
    fn test_sizes() {
        let block = FixedWidthBlock::from_values(vec![1i64, 2, 3]);
        assert_eq!(block.get_size_in_bytes().unwrap(), 27);
        assert_eq!(block.get_region_size_in_bytes(1, 2).unwrap(), 18);
        assert_eq!(
            block.get_positions_size_in_bytes(&[true, false, true]).unwrap(),
            18
        );
        assert!(block.get_positions_size_in_bytes(&[true]).is_err());
        assert!(block.get_retained_size_in_bytes() >= 24);
        assert_eq!(block.get_estimated_data_size_for_stats(0).unwrap(), 8);
    }
}
