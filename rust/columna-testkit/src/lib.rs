//! Test utilities for the columna crates.
//!
//! Provides randomized block generators driven by the thread-local `fastrand`
//! generator, so a test that calls `fastrand::seed(..)` first gets a
//! reproducible sequence of blocks.

pub mod block_gen;
