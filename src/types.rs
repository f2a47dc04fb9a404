//! Small value types shared across modules

use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// Screen position in pixels, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl Sub for Point {
    type Output = (i32, i32);

    /// Per-axis delta between two points
    fn sub(self, rhs: Self) -> Self::Output {
        (self.x - rhs.x, self.y - rhs.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_and_offset() {
        let start = Point::new(100, 40);
        let now = Point::new(90, 75);
        let (dx, dy) = now - start;
        assert_eq!((dx, dy), (-10, 35));
        assert_eq!(Point::new(5, 5).offset(dx, dy), Point::new(-5, 40));
    }
}
