//! Core types - pure abstractions shared across the codebase.

mod kind;
mod mode;

pub use kind::AssetKind;
pub use mode::{BuildMode, resolve_mode};
