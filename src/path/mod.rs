//! Path model and glob matching.
//!
//! A [`Path`] is an absolute, slash-separated sequence of non-empty
//! components. Components containing unescaped `*`, `?` or `[..]` are glob
//! patterns; the component `**` spans zero or more levels.
mod glob;
#[allow(clippy::module_inception)]
mod path;

pub use glob::*;
pub use path::*;
