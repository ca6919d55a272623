//! Deferred work and the worker pool that runs it.
//!
//! A [`Task`] runs at most once. The pool accepts tasks by strong or weak
//! reference ([`TaskRef`]); a weakly submitted task whose last owner has been
//! dropped is discarded at dequeue time, which is how pending work under a
//! removed node is cancelled.
#[allow(clippy::module_inception)]
mod task;
mod task_pool;

pub use task::*;
pub use task_pool::*;

#[cfg(test)]
mod task_pool_test;
