//! The node tree and its concurrency protocol.
//!
//! Every node owns named children and a FIFO of slots. A slot holds a
//! type-tagged value, the pending result of a callable, or the record of a
//! callable that panicked. Reads peek at the head slot, takes pop it, and
//! both may block on a [`Block`] budget until a matching insert arrives.
mod api;
mod node;
mod options;
mod path_space;
mod value;
mod visit;
mod wait_registry;

pub use api::*;
pub use options::*;
pub use path_space::*;
pub use value::*;
pub use visit::*;
