/// Measure the distance between two points in the plane.
///
/// The metric orders neighbors during cluster growth, scores candidate
/// clusters, and drives silhouette diagnostics. Membership itself is always
/// decided by the per-axis box tolerance, not by the metric.
pub trait DistanceMetric {
    fn distance(&self, a: (f64, f64), b: (f64, f64)) -> f64;
}

impl<F> DistanceMetric for F
where
    F: Fn((f64, f64), (f64, f64)) -> f64,
{
    #[inline]
    fn distance(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        self(a, b)
    }
}

/// Euclidean distance after dividing each axis by a scale, so that
/// retention time and m/z differences are measured in units of their
/// respective tolerances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledEuclidean {
    pub x_scale: f64,
    pub y_scale: f64,
}

impl ScaledEuclidean {
    pub fn new(x_scale: f64, y_scale: f64) -> Self {
        Self { x_scale, y_scale }
    }
}

impl Default for ScaledEuclidean {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl DistanceMetric for ScaledEuclidean {
    #[inline]
    fn distance(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        let dx = (a.0 - b.0) / self.x_scale;
        let dy = (a.1 - b.1) / self.y_scale;
        dx.hypot(dy)
    }
}
