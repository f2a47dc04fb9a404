//! Tracking configuration
//!
//! Settings live in the key/value store and are read wholesale into an
//! immutable [`ConfigSnapshot`]; a reload replaces the snapshot.

pub mod anchor;
pub mod snapshot;

pub use anchor::{Anchor, HorizontalAlign, PositionChoice, VerticalAlign};
pub use snapshot::{ConfigSnapshot, DisplayMode, LevelStyle};
