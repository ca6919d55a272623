//! # pathspace
//!
//! A path-addressed, concurrent, hierarchical data store.
//!
//! Values and callables are inserted at slash-separated paths, read or
//! taken back with blocking, non-blocking or timeout semantics, and
//! observed through glob patterns and tree traversal. Any number of OS
//! threads may use one space at the same time.
//!
//! ## What this crate provides
//!
//! - **Path model** - [`path::Path`] parsing and glob matching
//! - **Node tree** - [`PathSpace`] with FIFO queues per path
//! - **Blocking wait/notify** - reads and takes that park until a matching insert
//! - **Tasks** - inserted callables run on a [`task::TaskPool`] and become values
//! - **Snapshot cache** - [`snapshot::SnapshotCachedSpace`], a read-side decorator
//!
//! ```
//! use std::time::Duration;
//!
//! use pathspace::PathSpace;
//! use pathspace::SpaceExt;
//!
//! let space = PathSpace::new().unwrap();
//! space.insert_task("/answer", || 6 * 7);
//! let answer: i32 = space.read_block("/answer", Duration::from_secs(5)).unwrap();
//! assert_eq!(answer, 42);
//! ```
//!
//! ## Key Traits
//!
//! - [`Space`] - the type-erased, object-safe surface
//! - [`SpaceExt`] - typed `insert` / `read` / `take` for every [`Space`]

pub mod config;
mod errors;
pub mod metrics;
pub mod path;
pub mod snapshot;
mod space;
pub mod task;

pub use errors::*;
pub use space::*;
