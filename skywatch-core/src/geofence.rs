//! No-Fly Zone Geometry
//!
//! A zone is a circle on the monitoring plane. A drone violates the zone
//! when its distance to the zone center is at most the zone radius.
//! Coordinates are planar millimetres, matching the position feed.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A drone position on the monitoring plane.
pub type Position = Point2<f64>;

/// Circular no-fly zone, immutable configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Zone center X coordinate in millimetres
    pub center_x: f64,
    /// Zone center Y coordinate in millimetres
    pub center_y: f64,
    /// Zone radius in millimetres
    pub radius: f64,
}

impl Zone {
    /// Create a zone. Validation happens in [`EngineConfig`](crate::EngineConfig),
    /// which owns all configuration checks.
    pub fn new(center_x: f64, center_y: f64, radius: f64) -> Self {
        Zone {
            center_x,
            center_y,
            radius,
        }
    }

    fn center(&self) -> Position {
        Point2::new(self.center_x, self.center_y)
    }

    /// Euclidean distance from `position` to the zone center.
    pub fn distance_to(&self, position: &Position) -> f64 {
        nalgebra::distance(&self.center(), position)
    }

    /// True when `position` is inside the zone, boundary included.
    pub fn violated_by(&self, position: &Position) -> bool {
        self.distance_to(position) <= self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_center() {
        let zone = Zone::new(0.0, 0.0, 100.0);
        assert_eq!(zone.distance_to(&Position::new(3.0, 4.0)), 5.0);
        assert_eq!(zone.distance_to(&Position::new(0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_violation_boundary_inclusive() {
        let zone = Zone::new(0.0, 0.0, 100.0);
        assert!(zone.violated_by(&Position::new(0.0, 100.0)));
        assert!(zone.violated_by(&Position::new(60.0, 80.0)));
        assert!(!zone.violated_by(&Position::new(0.0, 100.1)));
    }

    #[test]
    fn test_offset_center() {
        let zone = Zone::new(250_000.0, 250_000.0, 100_000.0);
        assert!(zone.violated_by(&Position::new(250_000.0, 250_000.0)));
        assert!(zone.violated_by(&Position::new(300_000.0, 250_000.0)));
        assert!(!zone.violated_by(&Position::new(400_000.0, 400_000.0)));
    }
}
