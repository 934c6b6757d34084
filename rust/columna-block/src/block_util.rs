//! Bounds checks and small array helpers shared by the block implementations.

use columna_common::{Result, error::Error};

/// Width of one id or offset entry.
pub const SIZE_OF_INT: u64 = std::mem::size_of::<u32>() as u64;

/// Width of one null flag.
pub const SIZE_OF_BYTE: u64 = std::mem::size_of::<u8>() as u64;

#[inline]
pub fn check_valid_position(position: usize, position_count: usize) -> Result<()> {
    if position < position_count {
        Ok(())
    } else {
        Err(Error::position_out_of_bounds(position, position_count))
    }
}

#[inline]
pub fn check_valid_region(position_count: usize, offset: usize, length: usize) -> Result<()> {
    if offset <= position_count && length <= position_count - offset {
        Ok(())
    } else {
        Err(Error::invalid_region(offset, length, position_count))
    }
}

/// Validates that `[offset, offset + length)` fits into an array of `array_len` entries.
#[inline]
pub fn check_array_range(array_len: usize, offset: usize, length: usize) -> Result<()> {
    if offset <= array_len && length <= array_len - offset {
        Ok(())
    } else {
        Err(Error::invalid_arg(
            "positions",
            format!("range [{offset}, {offset} + {length}) exceeds array of {array_len}"),
        ))
    }
}

/// Validates that a selection mask covers exactly `position_count` positions.
#[inline]
pub fn check_valid_positions(mask: &[bool], position_count: usize) -> Result<()> {
    if mask.len() == position_count {
        Ok(())
    } else {
        Err(Error::invalid_arg(
            "positions",
            format!(
                "mask length {} does not match position count {position_count}",
                mask.len()
            ),
        ))
    }
}

pub fn count_used_positions(mask: &[bool]) -> usize {
    mask.iter().filter(|&&used| used).count()
}

/// Returns `offsets[index..=index + length]` rebased so that the first offset is zero.
pub fn compact_offsets(offsets: &[u32], index: usize, length: usize) -> Vec<u32> {
    let base = offsets[index];
    offsets[index..=index + length]
        .iter()
        .map(|&offset| offset - base)
        .collect()
}

/// Checks that `offsets` has `position_count + 1` non-decreasing entries ending
/// within `value_count`.
pub fn check_offsets(offsets: &[u32], position_count: usize, value_count: usize) -> Result<()> {
    if offsets.len() != position_count + 1 {
        return Err(Error::invalid_arg(
            "offsets",
            format!(
                "expected {} offsets, got {}",
                position_count + 1,
                offsets.len()
            ),
        ));
    }
    if offsets.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(Error::invalid_arg("offsets", "offsets must be non-decreasing"));
    }
    if offsets[position_count] as usize > value_count {
        return Err(Error::invalid_arg(
            "offsets",
            format!(
                "last offset {} exceeds value count {value_count}",
                offsets[position_count]
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_valid_position() {
        assert!(check_valid_position(0, 1).is_ok());
        assert!(check_valid_position(1, 1).unwrap_err().is_bounds_error());
        assert!(check_valid_position(0, 0).is_err());
    }

    #[test]
    fn test_check_valid_region() {
        assert!(check_valid_region(5, 0, 5).is_ok());
        assert!(check_valid_region(5, 5, 0).is_ok());
        assert!(check_valid_region(5, 3, 3).is_err());
        assert!(check_valid_region(5, 6, 0).is_err());
        assert!(check_valid_region(5, 1, usize::MAX).is_err());
    }

    #[test]
    fn test_check_array_range() {
        assert!(check_array_range(4, 1, 3).is_ok());
        assert!(check_array_range(4, 2, 3).unwrap_err().is_bounds_error());
    }

    #[test]
    fn test_compact_offsets() {
        assert_eq!(compact_offsets(&[0, 2, 2, 5, 9], 1, 2), vec![0, 0, 3]);
        assert_eq!(compact_offsets(&[3, 4], 0, 1), vec![0, 1]);
        assert_eq!(compact_offsets(&[3, 4], 1, 0), vec![0]);
    }

    #[test]
    fn test_check_offsets() {
        assert!(check_offsets(&[0, 2, 2, 5], 3, 5).is_ok());
        assert!(check_offsets(&[0, 2, 1, 5], 3, 5).is_err());
        assert!(check_offsets(&[0, 2, 2, 6], 3, 5).is_err());
        assert!(check_offsets(&[0, 2], 3, 5).is_err());
    }

    #[test]
    fn test_count_used_positions() {
        assert_eq!(count_used_positions(&[true, false, true]), 2);
        assert_eq!(count_used_positions(&[]), 0);
    }
}
