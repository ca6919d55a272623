//! Read-side snapshot cache.
//!
//! [`SnapshotCachedSpace`] decorates any [`Space`](crate::Space) with an
//! immutable copy of its path to value mapping. Reads that land outside
//! every dirty root are answered from the copy; everything else goes to the
//! live tree. Mutations made through the decorator mark their path dirty and
//! a debounced rebuild refreshes the copy.
mod cached_space;
mod dirty_roots;
mod options;

pub use cached_space::*;
pub use dirty_roots::*;
pub use options::*;

#[cfg(test)]
mod dirty_roots_test;
