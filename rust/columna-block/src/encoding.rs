//! Registry of block encodings, keyed by the encoding name each block reports.
//!
//! Every block kind reports a stable encoding name through
//! [`Block::encoding_name`]. The [`BlockEncodingManager`] maps those names to
//! [`BlockEncoding`] descriptors so that an engine can resolve how to handle a
//! block it receives. The built-in encodings are registered on construction;
//! engines may add their own at startup.

use std::sync::Arc;

use ahash::AHashMap;
use columna_common::{Result, error::Error};

use crate::{
    array_block::ARRAY_ENCODING,
    block::Block,
    dictionary_block::DICTIONARY_ENCODING,
    fixed_width_block::{
        BYTE_ARRAY_ENCODING, INT_ARRAY_ENCODING, LONG_ARRAY_ENCODING, SHORT_ARRAY_ENCODING,
    },
    lazy_block::LAZY_ENCODING,
    variable_width_block::VARIABLE_WIDTH_ENCODING,
};

/// Describes one block encoding.
pub trait BlockEncoding: Send + Sync + 'static {
    /// Stable name of this encoding. Must match the `encoding_name()` of the
    /// blocks it describes.
    fn name(&self) -> &str;

    /// Returns `true` if blocks of this encoding wrap other blocks.
    fn is_composite(&self) -> bool {
        false
    }
}

/// Descriptor for the encodings implemented in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinEncoding {
    name: &'static str,
    composite: bool,
}

impl BuiltinEncoding {
    pub const BYTE_ARRAY: BuiltinEncoding = BuiltinEncoding::leaf(BYTE_ARRAY_ENCODING);
    pub const SHORT_ARRAY: BuiltinEncoding = BuiltinEncoding::leaf(SHORT_ARRAY_ENCODING);
    pub const INT_ARRAY: BuiltinEncoding = BuiltinEncoding::leaf(INT_ARRAY_ENCODING);
    pub const LONG_ARRAY: BuiltinEncoding = BuiltinEncoding::leaf(LONG_ARRAY_ENCODING);
    pub const VARIABLE_WIDTH: BuiltinEncoding = BuiltinEncoding::leaf(VARIABLE_WIDTH_ENCODING);
    pub const ARRAY: BuiltinEncoding = BuiltinEncoding::composite(ARRAY_ENCODING);
    pub const DICTIONARY: BuiltinEncoding = BuiltinEncoding::composite(DICTIONARY_ENCODING);
    pub const LAZY: BuiltinEncoding = BuiltinEncoding::composite(LAZY_ENCODING);

    pub const ALL: [BuiltinEncoding; 8] = [
        Self::BYTE_ARRAY,
        Self::SHORT_ARRAY,
        Self::INT_ARRAY,
        Self::LONG_ARRAY,
        Self::VARIABLE_WIDTH,
        Self::ARRAY,
        Self::DICTIONARY,
        Self::LAZY,
    ];

    const fn leaf(name: &'static str) -> BuiltinEncoding {
        BuiltinEncoding {
            name,
            composite: false,
        }
    }

    const fn composite(name: &'static str) -> BuiltinEncoding {
        BuiltinEncoding {
            name,
            composite: true,
        }
    }
}

impl BlockEncoding for BuiltinEncoding {
    fn name(&self) -> &str {
        self.name
    }

    fn is_composite(&self) -> bool {
        self.composite
    }
}

/// Name-keyed set of block encodings.
pub struct BlockEncodingManager {
    encodings: AHashMap<String, Arc<dyn BlockEncoding>>,
}

impl BlockEncodingManager {
    /// Creates a manager with all built-in encodings registered.
    pub fn new() -> BlockEncodingManager {
        let mut manager = BlockEncodingManager::empty();
        for encoding in BuiltinEncoding::ALL {
            manager.insert(Arc::new(encoding));
        }
        manager
    }

    /// Creates a manager with no encodings registered.
    pub fn empty() -> BlockEncodingManager {
        BlockEncodingManager {
            encodings: AHashMap::new(),
        }
    }

    /// Registers `encoding`. Fails if an encoding with the same name is
    /// already registered.
    pub fn add_block_encoding(&mut self, encoding: impl Into<Arc<dyn BlockEncoding>>) -> Result<()> {
        let encoding = encoding.into();
        if self.encodings.contains_key(encoding.name()) {
            return Err(Error::duplicate_encoding(encoding.name()));
        }
        self.insert(encoding);
        Ok(())
    }

    pub fn get_block_encoding(&self, name: &str) -> Result<Arc<dyn BlockEncoding>> {
        self.encodings
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_encoding(name))
    }

    /// Resolves the encoding of `block`.
    pub fn encoding_for(&self, block: &Block) -> Result<Arc<dyn BlockEncoding>> {
        self.get_block_encoding(block.encoding_name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.encodings.contains_key(name)
    }

    /// Returns the registered encoding names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names = self.encodings.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    fn insert(&mut self, encoding: Arc<dyn BlockEncoding>) {
        log::trace!("registering block encoding {}", encoding.name());
        self.encodings.insert(encoding.name().to_string(), encoding);
    }
}

impl Default for BlockEncodingManager {
    fn default() -> Self {
        BlockEncodingManager::new()
    }
}
