//! Random block generation.

use columna_block::{
    Block, array_block::ArrayBlock, dictionary_block::DictionaryBlock,
    fixed_width_block::FixedWidthBlock, lazy_block::LazyBlock,
    variable_width_block::VariableWidthBlock,
};

/// Generates a `LONG_ARRAY` block where roughly one position in
/// `null_one_in` is null. `null_one_in == 0` disables nulls.
pub fn random_long_block(len: usize, null_one_in: u32) -> Block {
    let values = (0..len)
        .map(|_| {
            if null_one_in != 0 && fastrand::u32(0..null_one_in) == 0 {
                None
            } else {
                Some(fastrand::i64(-1000..1000))
            }
        })
        .collect();
    FixedWidthBlock::from_options(values).into()
}

/// Generates a `VARIABLE_WIDTH` block of short lowercase strings, with
/// occasional nulls and empty values.
pub fn random_slice_block(len: usize) -> Block {
    let values = (0..len)
        .map(|_| match fastrand::u8(0..10) {
            0 => None,
            1 => Some(Vec::new()),
            _ => Some(
                (0..fastrand::usize(1..12))
                    .map(|_| fastrand::lowercase() as u8)
                    .collect::<Vec<u8>>(),
            ),
        })
        .collect::<Vec<_>>();
    VariableWidthBlock::from_slices(&values).into()
}

/// Generates a random leaf block of either kind.
pub fn random_leaf(len: usize) -> Block {
    if fastrand::bool() {
        random_long_block(len, 8)
    } else {
        random_slice_block(len)
    }
}

/// Generates `len` ids in `0..dictionary_len`.
pub fn random_ids(len: usize, dictionary_len: usize) -> Vec<u32> {
    assert!(dictionary_len > 0 || len == 0);
    (0..len)
        .map(|_| fastrand::usize(0..dictionary_len) as u32)
        .collect()
}

/// Generates `len` positions in `0..position_count`, possibly repeating and in
/// any order.
pub fn random_positions(len: usize, position_count: usize) -> Vec<u32> {
    random_ids(len, position_count)
}

/// Generates a random `(offset, length)` region of a block with
/// `position_count` positions.
pub fn random_region(position_count: usize) -> (usize, usize) {
    let offset = fastrand::usize(0..=position_count);
    let length = fastrand::usize(0..=position_count - offset);
    (offset, length)
}

/// Generates a position mask of `len` entries.
pub fn random_mask(len: usize) -> Vec<bool> {
    (0..len).map(|_| fastrand::bool()).collect()
}

/// Generates a dictionary block of `len` positions over a random leaf
/// dictionary of `dictionary_len` positions.
pub fn random_dictionary(len: usize, dictionary_len: usize) -> DictionaryBlock {
    DictionaryBlock::new(random_leaf(dictionary_len), random_ids(len, dictionary_len))
        .expect("valid ids")
}

/// Generates a chain of `depth` dictionary blocks, the outermost having `len`
/// positions.
pub fn random_nested_dictionary(len: usize, depth: usize) -> DictionaryBlock {
    assert!(depth > 0);
    let mut dictionary = random_leaf(fastrand::usize(1..16));
    for _ in 1..depth {
        let count = fastrand::usize(1..16);
        let ids = random_ids(count, dictionary.position_count());
        dictionary = DictionaryBlock::new(dictionary, ids)
            .expect("valid ids")
            .into();
    }
    let ids = random_ids(len, dictionary.position_count());
    DictionaryBlock::new(dictionary, ids).expect("valid ids")
}

/// Generates an array block of `len` entries with up to `max_entry_len`
/// elements each, and roughly one null entry in eight.
pub fn random_array_block(len: usize, max_entry_len: usize) -> ArrayBlock {
    let mut offsets = Vec::with_capacity(len + 1);
    let mut nulls = Vec::with_capacity(len);
    offsets.push(0u32);
    let mut total = 0;
    for _ in 0..len {
        let is_null = fastrand::u8(0..8) == 0;
        if !is_null {
            total += fastrand::usize(0..=max_entry_len);
        }
        nulls.push(is_null);
        offsets.push(total as u32);
    }
    ArrayBlock::from_array_offsets(Some(nulls), offsets, random_leaf(total))
        .expect("valid offsets")
}

/// Wraps `block` in a lazy block that materializes it on first access.
pub fn lazy(block: Block) -> Block {
    LazyBlock::from_block(block).into()
}

/// Generates any of the block kinds, with composites nested up to `depth`
/// levels.
pub fn random_block(len: usize, depth: usize) -> Block {
    if depth == 0 {
        return random_leaf(len);
    }
    match fastrand::u8(0..4) {
        0 => random_leaf(len),
        1 => {
            let dictionary = random_block(fastrand::usize(1..12), depth - 1);
            let ids = random_ids(len, dictionary.position_count());
            DictionaryBlock::new(dictionary, ids)
                .expect("valid ids")
                .into()
        }
        2 => random_array_block(len, 4).into(),
        _ => {
            // a region over a wider dictionary block, so ids start at an offset
            let extra = fastrand::usize(1..4);
            let dictionary = random_block(fastrand::usize(1..12), depth - 1);
            let ids = random_ids(len + 2 * extra, dictionary.position_count());
            DictionaryBlock::new(dictionary, ids)
                .and_then(|block| block.get_region(extra, len))
                .expect("valid region")
        }
    }
}
