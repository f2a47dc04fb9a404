//! Per-level overlay placement
//!
//! Lookup priority: the level's dragged custom offset when its flag is set,
//! otherwise the named anchor configured for the level.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Anchor, ConfigSnapshot, PositionChoice};
use crate::constants::keys;
use crate::level::Level;
use crate::store::KeyValueStore;
use crate::types::Point;

/// Where the display sink should put the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Screen-relative gravity
    Anchored(Anchor),
    /// Absolute top-left corner
    Offset(Point),
}

/// Stored custom offset of a level, if its custom flag is set
pub fn load_custom<S: KeyValueStore + ?Sized>(store: &S, level: Level) -> Option<Point> {
    let n = level.number();
    if !store.get_bool(&keys::use_custom_position(n)).unwrap_or(false) {
        return None;
    }
    let x = store.get_int(&keys::custom_x(n))?;
    let y = store.get_int(&keys::custom_y(n))?;
    match (i32::try_from(x), i32::try_from(y)) {
        (Ok(x), Ok(y)) => Some(Point::new(x, y)),
        _ => {
            debug!(level = n, x = x, y = y, "Custom position out of range, ignoring");
            None
        }
    }
}

pub fn save_custom<S: KeyValueStore + ?Sized>(store: &mut S, level: Level, at: Point) {
    let n = level.number();
    store.set_bool(&keys::use_custom_position(n), true);
    store.set_int(&keys::custom_x(n), i64::from(at.x));
    store.set_int(&keys::custom_y(n), i64::from(at.y));
    info!(level = n, x = at.x, y = at.y, "Saved custom position");
}

pub fn clear_custom<S: KeyValueStore + ?Sized>(store: &mut S, level: Level) {
    let n = level.number();
    store.set_bool(&keys::use_custom_position(n), false);
    store.remove(&keys::custom_x(n));
    store.remove(&keys::custom_y(n));
    debug!(level = n, "Cleared custom position");
}

/// Persist a position chosen in settings. Any named anchor drops the custom offset.
pub fn store_choice<S: KeyValueStore + ?Sized>(store: &mut S, level: Level, choice: PositionChoice) {
    store.set_str(&keys::position(level.number()), choice.as_str());
    if let PositionChoice::Named(_) = choice {
        clear_custom(store, level);
    }
}

pub fn resolve_placement<S: KeyValueStore + ?Sized>(
    level: Level,
    config: &ConfigSnapshot,
    store: &S,
) -> Placement {
    match load_custom(store, level) {
        Some(point) => Placement::Offset(point),
        None => Placement::Anchored(config.style(level).position.anchor()),
    }
}
