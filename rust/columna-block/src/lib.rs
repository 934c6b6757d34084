//! In-memory columnar block model.
//!
//! A block holds one column's worth of values for a batch of rows. Query
//! operators pass blocks between pipeline stages, slice them, filter them and
//! compact them before retaining or shipping them elsewhere.
//!
//! # Block kinds
//!
//! - [`fixed_width_block::FixedWidthBlock`] and
//!   [`variable_width_block::VariableWidthBlock`] are the leaf payload blocks.
//! - [`array_block::ArrayBlock`] holds one variable-length list of elements per
//!   position, backed by a single flattened child block.
//! - [`dictionary_block::DictionaryBlock`] represents repeated values as ids
//!   into a shared dictionary block, and owns the compaction and flattening
//!   algorithms.
//! - [`lazy_block::LazyBlock`] defers materialization until first access.
//!
//! All kinds are unified by the [`block::Block`] enum, which exposes the common
//! contract: position access, zero-copy regions, owning copies, positional
//! gathers and size accounting.
//!
//! # Sharing
//!
//! Blocks are immutable. Regions and selections share backing arrays with their
//! source through [`shared_array::SharedArray`]; `copy_*` operations produce
//! blocks that own exactly the data they need. Derived statistics are memoized
//! with one-shot publication and are safe to compute from several threads.

pub mod array_block;
pub mod block;
pub mod block_util;
pub mod dictionary_block;
pub mod dictionary_id;
pub mod encoding;
pub mod fixed_width_block;
pub mod lazy_block;
pub mod nulls;
pub mod offsets;
pub mod shared_array;
pub mod value;
pub mod variable_width_block;

pub use block::Block;
