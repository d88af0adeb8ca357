//! Small shared utilities.

pub mod bitset;

pub use bitset::BitSet;
