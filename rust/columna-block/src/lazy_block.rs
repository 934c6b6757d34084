//! A block whose payload is materialized on first access.

use std::fmt;
use std::sync::{Arc, OnceLock};

use columna_common::{Result, error::Error, verify_state};

use crate::block::Block;
use crate::block_util::{
    check_array_range, check_valid_position, check_valid_positions, check_valid_region,
};

pub const LAZY_ENCODING: &str = "LAZY";

/// Produces the materialized block. Must be deterministic.
pub type BlockLoader = Arc<dyn Fn() -> Result<Block> + Send + Sync>;

/// A block that defers producing its payload until it is first read.
///
/// Clones share the load state. Until loaded, the block cannot gather
/// positions: [`LazyBlock::copy_positions`] fails with an unsupported
/// operation error and [`LazyBlock::supports_copy_positions`] returns `false`.
#[derive(Clone)]
pub struct LazyBlock {
    position_count: usize,
    loader: BlockLoader,
    loaded: Arc<OnceLock<Block>>,
}

impl LazyBlock {
    pub fn new(position_count: usize, loader: BlockLoader) -> Self {
        LazyBlock {
            position_count,
            loader,
            loaded: Arc::new(OnceLock::new()),
        }
    }

    /// Creates a lazy block whose loader returns `block`.
    pub fn from_block(block: Block) -> Self {
        let position_count = block.position_count();
        LazyBlock::new(position_count, Arc::new(move || Ok(block.clone())))
    }

    #[inline]
    pub fn position_count(&self) -> usize {
        self.position_count
    }

    /// Returns the materialized block, if it has been loaded.
    pub fn loaded(&self) -> Option<&Block> {
        self.loaded.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Materializes the block, running the loader at most once per successful
    /// load. Concurrent first loads may both run the loader; one result wins.
    pub fn load(&self) -> Result<&Block> {
        if let Some(block) = self.loaded.get() {
            return Ok(block);
        }
        let block = (self.loader)()?;
        verify_state!(
            loaded_position_count,
            block.position_count() == self.position_count
        );
        Ok(self.loaded.get_or_init(|| block))
    }

    pub fn may_have_null(&self) -> bool {
        self.loaded().is_none_or(Block::may_have_null)
    }

    pub fn is_null(&self, position: usize) -> Result<bool> {
        self.load()?.is_null(position)
    }

    pub fn supports_copy_positions(&self) -> bool {
        self.loaded().is_some_and(Block::supports_copy_positions)
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block> {
        check_valid_region(self.position_count, offset, length)?;
        if let Some(block) = self.loaded() {
            return block.get_region(offset, length);
        }
        let source = self.clone();
        Ok(Block::Lazy(LazyBlock::new(
            length,
            Arc::new(move || source.load()?.get_region(offset, length)),
        )))
    }

    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block> {
        self.load()?.copy_region(offset, length)
    }

    pub fn copy_positions(&self, positions: &[u32], offset: usize, length: usize) -> Result<Block> {
        check_array_range(positions.len(), offset, length)?;
        for &position in &positions[offset..offset + length] {
            check_valid_position(position as usize, self.position_count)?;
        }
        match self.loaded() {
            Some(block) => block.copy_positions(positions, offset, length),
            None => Err(Error::unsupported("copy_positions", LAZY_ENCODING)),
        }
    }

    /// Sizes report zero until the block is loaded; computing them never
    /// triggers a load.
    pub fn get_size_in_bytes(&self) -> Result<u64> {
        match self.loaded() {
            Some(block) => block.get_size_in_bytes(),
            None => Ok(0),
        }
    }

    pub fn get_region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
        check_valid_region(self.position_count, offset, length)?;
        match self.loaded() {
            Some(block) => block.get_region_size_in_bytes(offset, length),
            None => Ok(0),
        }
    }

    pub fn get_positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        check_valid_positions(mask, self.position_count)?;
        match self.loaded() {
            Some(block) => block.get_positions_size_in_bytes(mask),
            None => Ok(0),
        }
    }

    pub fn get_retained_size_in_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self
                .loaded()
                .map_or(0, Block::get_retained_size_in_bytes)
    }

    pub fn encoding_name(&self) -> &'static str {
        LAZY_ENCODING
    }
}

impl fmt::Debug for LazyBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyBlock")
            .field("position_count", &self.position_count)
            .field("loaded", &self.loaded().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::fixed_width_block::FixedWidthBlock;

    fn counting_lazy(values: Vec<i64>) -> (LazyBlock, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let count = values.len();
        let lazy = LazyBlock::new(
            count,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(FixedWidthBlock::from_values(values.clone()).into())
            }),
        );
        (lazy, loads)
    }

    #[test]
    fn test_load_once() {
        let (lazy, loads) = counting_lazy(vec![1, 2, 3]);
        assert!(!lazy.is_loaded());
        assert!(lazy.may_have_null());
        assert_eq!(lazy.get_size_in_bytes().unwrap(), 0);
        assert_eq!(lazy.get_region_size_in_bytes(1, 2).unwrap(), 0);
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        assert!(!lazy.is_null(1).unwrap());
        assert!(!lazy.is_null(2).unwrap());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(!lazy.may_have_null());
        assert_eq!(lazy.get_size_in_bytes().unwrap(), 27);
        assert_eq!(lazy.get_positions_size_in_bytes(&[true, false, true]).unwrap(), 18);
    }

    #[test]
    fn test_copy_positions_requires_load() {
        let (lazy, _) = counting_lazy(vec![5, 6]);
        assert!(!lazy.supports_copy_positions());
        assert!(lazy.copy_positions(&[1], 0, 1).unwrap_err().is_unsupported());
        assert!(lazy.copy_positions(&[2], 0, 1).unwrap_err().is_bounds_error());
        assert!(lazy.copy_positions(&[0], 1, 1).unwrap_err().is_bounds_error());
        assert!(!lazy.is_loaded());

        lazy.load().unwrap();
        assert!(lazy.supports_copy_positions());
        let copy = lazy.copy_positions(&[1, 1], 0, 2).unwrap();
        assert_eq!(copy.get_long(1).unwrap(), 6);
    }

    #[test]
    fn test_unloaded_region_stays_lazy() {
        let (lazy, loads) = counting_lazy(vec![5, 6, 7]);
        let region = lazy.get_region(1, 2).unwrap();
        assert_eq!(region.encoding_name(), LAZY_ENCODING);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert_eq!(region.get_long(1).unwrap(), 7);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(lazy.loaded().is_some());
    }

    #[test]
    fn test_loader_position_count_mismatch() {
        let lazy = LazyBlock::new(
            3,
            Arc::new(|| Ok(FixedWidthBlock::from_values(vec![1i64]).into())),
        );
        assert!(lazy.load().unwrap_err().is_internal());
    }
}
