//! Planar geometry for clearance and creepage measurement
//!
//! All coordinates are millimeters in board space.
//!
//! # Submodules
//! - `primitives` - segment/polygon predicates and distances
//! - `spatial` - uniform grid index over obstacle polygons
//! - `index` - R-tree over feature bounding boxes

pub mod index;
pub mod primitives;
pub mod spatial;

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

pub use primitives::*;
pub use spatial::ObstacleField;

/// Tolerance used for parameter and boundary comparisons (mm)
pub const EPSILON: f64 = 1e-9;

/// A 2D point in board coordinates (mm)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (*other - *self).length()
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(&self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 2D cross product
    pub fn cross(&self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    pub fn midpoint(&self, other: Point) -> Point {
        self.lerp(other, 0.5)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl From<[f64; 2]> for Point {
    fn from(p: [f64; 2]) -> Self {
        Point::new(p[0], p[1])
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn from_point(p: Point) -> Self {
        Self {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
        }
    }

    /// Bounding box of a point set, `None` when empty
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        Some(
            points
                .iter()
                .skip(1)
                .fold(BBox::from_point(*first), |b, p| b.including(*p)),
        )
    }

    pub fn of_segment(a: Point, b: Point) -> Self {
        BBox::from_point(a).including(b)
    }

    pub fn including(self, p: Point) -> Self {
        Self {
            min_x: self.min_x.min(p.x),
            min_y: self.min_y.min(p.y),
            max_x: self.max_x.max(p.x),
            max_y: self.max_y.max(p.y),
        }
    }

    pub fn union(self, other: BBox) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn expand(self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Box-to-box gap, a lower bound on the distance between anything inside them
    pub fn distance(&self, other: &BBox) -> f64 {
        let dx = (self.min_x.max(other.min_x) - self.max_x.min(other.max_x)).max(0.0);
        let dy = (self.min_y.max(other.min_y) - self.max_y.min(other.max_y)).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_distance() {
        let a = BBox::of_segment(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        let b = BBox::of_segment(Point::new(4.0, 5.0), Point::new(6.0, 6.0));
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        assert_eq!(a.distance(&a.expand(1.0)), 0.0);
    }

    #[test]
    fn test_bbox_from_points() {
        assert!(BBox::from_points(&[]).is_none());
        let b = BBox::from_points(&[Point::new(1.0, -2.0), Point::new(-3.0, 4.0)]).unwrap();
        assert_eq!(b.min_x, -3.0);
        assert_eq!(b.max_y, 4.0);
        assert!(b.contains(Point::new(0.0, 0.0)));
    }
}
