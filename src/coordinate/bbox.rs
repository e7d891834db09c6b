#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/** An inclusive interval over two dimensions
*/
pub trait Span2D {
    fn start(&self) -> (f64, f64);
    fn end(&self) -> (f64, f64);

    fn contains(&self, point: (f64, f64)) -> bool {
        let (x, y) = point;
        let (sx, sy) = self.start();
        let (ex, ey) = self.end();
        sx <= x && x <= ex && sy <= y && y <= ey
    }

    fn overlaps<T: Span2D>(&self, other: &T) -> bool {
        let (sx, sy) = self.start();
        let (ex, ey) = self.end();
        let (osx, osy) = other.start();
        let (oex, oey) = other.end();
        ex >= osx && oex >= sx && ey >= osy && oey >= sy
    }

    /// The extent of the box along the first dimension
    fn width(&self) -> f64 {
        self.end().0 - self.start().0
    }

    /// The extent of the box along the second dimension
    fn height(&self) -> f64 {
        self.end().1 - self.start().1
    }
}

/// A closed box over (retention time, m/z) that grows to enclose
/// the points it is shown.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    pub start: (f64, f64),
    pub end: (f64, f64),
}

impl Span2D for BoundingBox {
    fn start(&self) -> (f64, f64) {
        self.start
    }

    fn end(&self) -> (f64, f64) {
        self.end
    }
}

impl BoundingBox {
    pub fn new(start: (f64, f64), end: (f64, f64)) -> Self {
        Self { start, end }
    }

    /// A degenerate box covering exactly one point
    pub fn from_point(point: (f64, f64)) -> Self {
        Self::new(point, point)
    }

    /// Grow the box so that it contains `point`
    pub fn enlarge(&mut self, point: (f64, f64)) {
        self.start.0 = self.start.0.min(point.0);
        self.start.1 = self.start.1.min(point.1);
        self.end.0 = self.end.0.max(point.0);
        self.end.1 = self.end.1.max(point.1);
    }

    /// The smallest box containing both `self` and `other`
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = *self;
        merged.enlarge(other.start);
        merged.enlarge(other.end);
        merged
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_enlarge() {
        let mut bbox = BoundingBox::from_point((10.0, 500.0));
        assert_eq!(bbox.width(), 0.0);
        bbox.enlarge((12.0, 499.5));
        bbox.enlarge((11.0, 500.25));
        assert_eq!(bbox.start, (10.0, 499.5));
        assert_eq!(bbox.end, (12.0, 500.25));
        assert!(bbox.contains((11.5, 500.0)));
        assert!(!bbox.contains((12.5, 500.0)));
        assert_eq!(bbox.height(), 0.75);
    }

    #[test]
    fn test_overlaps() {
        let a = BoundingBox::new((0.0, 0.0), (2.0, 2.0));
        let b = BoundingBox::new((2.0, 1.0), (3.0, 3.0));
        let c = BoundingBox::new((2.5, 0.0), (3.0, 0.5));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.union(&c), BoundingBox::new((0.0, 0.0), (3.0, 2.0)));
    }
}
