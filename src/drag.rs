//! Tap and drag discrimination for the overlay surface
//!
//! `Idle -> Pressed -> Dragging -> Idle`, or `Pressed -> Idle` on release.
//! A press becomes a drag as soon as the pointer has moved more than the
//! threshold on either axis, and stays a drag until release even if the
//! pointer comes back.

use std::time::Instant;

use crate::constants::gesture::{DRAG_THRESHOLD_PX, TAP_MAX_DURATION};
use crate::types::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// Nothing for the tracker to do
    None,
    /// Overlay should move its top-left corner here
    Moved(Point),
    /// Short press without movement
    Tap,
    /// Drag finished; final top-left corner
    DragEnded(Point),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DragState {
    #[default]
    Idle,
    Pressed {
        pointer: Point,
        origin: Point,
        at: Instant,
    },
    Dragging {
        pointer: Point,
        origin: Point,
    },
}

#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

fn beyond_threshold(from: Point, to: Point) -> bool {
    let (dx, dy) = to - from;
    dx.abs() > DRAG_THRESHOLD_PX || dy.abs() > DRAG_THRESHOLD_PX
}

/// Window origin translated by the pointer delta since the press
fn translated(origin: Point, press: Point, pointer: Point) -> Point {
    let (dx, dy) = pointer - press;
    origin.offset(dx, dy)
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer went down at `pointer` while the overlay's top-left was at `origin`
    pub fn press(&mut self, pointer: Point, origin: Point, at: Instant) {
        self.state = DragState::Pressed {
            pointer,
            origin,
            at,
        };
    }

    pub fn motion(&mut self, pointer: Point) -> DragOutcome {
        match self.state {
            DragState::Idle => DragOutcome::None,
            DragState::Pressed {
                pointer: press,
                origin,
                ..
            } => {
                if beyond_threshold(press, pointer) {
                    self.state = DragState::Dragging {
                        pointer: press,
                        origin,
                    };
                    DragOutcome::Moved(translated(origin, press, pointer))
                } else {
                    DragOutcome::None
                }
            }
            DragState::Dragging {
                pointer: press,
                origin,
            } => DragOutcome::Moved(translated(origin, press, pointer)),
        }
    }

    pub fn release(&mut self, pointer: Point, at: Instant) -> DragOutcome {
        let outcome = match self.state {
            DragState::Idle => DragOutcome::None,
            DragState::Pressed {
                pointer: press,
                origin,
                at: pressed_at,
            } => {
                if beyond_threshold(press, pointer) {
                    DragOutcome::DragEnded(translated(origin, press, pointer))
                } else if at.saturating_duration_since(pressed_at) < TAP_MAX_DURATION {
                    DragOutcome::Tap
                } else {
                    DragOutcome::None
                }
            }
            DragState::Dragging {
                pointer: press,
                origin,
            } => DragOutcome::DragEnded(translated(origin, press, pointer)),
        };
        self.state = DragState::Idle;
        outcome
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, DragState::Idle)
    }

    /// Forget any gesture in progress
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ms(start: Instant, n: u64) -> Instant {
        start + Duration::from_millis(n)
    }

    #[test]
    fn test_short_still_press_is_tap() {
        let start = Instant::now();
        let mut drag = DragController::new();
        drag.press(Point::new(100, 100), Point::new(80, 90), start);
        assert_eq!(drag.motion(Point::new(105, 96)), DragOutcome::None);
        assert_eq!(drag.release(Point::new(110, 110), ms(start, 150)), DragOutcome::Tap);
        assert!(drag.is_idle());
    }

    #[test]
    fn test_long_still_press_does_nothing() {
        let start = Instant::now();
        let mut drag = DragController::new();
        drag.press(Point::new(100, 100), Point::new(0, 0), start);
        assert_eq!(drag.release(Point::new(100, 100), ms(start, 200)), DragOutcome::None);
    }

    #[test]
    fn test_movement_past_threshold_drags_and_never_taps() {
        let start = Instant::now();
        let mut drag = DragController::new();
        drag.press(Point::new(100, 100), Point::new(50, 60), start);

        assert_eq!(drag.motion(Point::new(111, 100)), DragOutcome::Moved(Point::new(61, 60)));
        assert!(drag.is_dragging());
        // Back near the press point: still a drag
        assert_eq!(drag.motion(Point::new(101, 101)), DragOutcome::Moved(Point::new(51, 61)));
        assert_eq!(
            drag.release(Point::new(100, 100), ms(start, 50)),
            DragOutcome::DragEnded(Point::new(50, 60))
        );
    }

    #[test]
    fn test_release_point_counts_toward_displacement() {
        let start = Instant::now();
        let mut drag = DragController::new();
        drag.press(Point::new(0, 0), Point::new(10, 10), start);
        assert_eq!(
            drag.release(Point::new(0, -25), ms(start, 20)),
            DragOutcome::DragEnded(Point::new(10, -15))
        );
    }

    #[test]
    fn test_threshold_is_exclusive_per_axis() {
        let start = Instant::now();
        let mut drag = DragController::new();
        drag.press(Point::new(0, 0), Point::new(0, 0), start);
        assert_eq!(drag.motion(Point::new(10, -10)), DragOutcome::None);
        assert_eq!(drag.release(Point::new(10, 10), ms(start, 100)), DragOutcome::Tap);
    }

    #[test]
    fn test_events_without_press_are_ignored() {
        let mut drag = DragController::new();
        assert_eq!(drag.motion(Point::new(500, 500)), DragOutcome::None);
        assert_eq!(drag.release(Point::new(500, 500), Instant::now()), DragOutcome::None);
    }
}
