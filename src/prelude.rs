//! A prelude to bring into scope all the traits of this library.

pub use crate::align::TransformationModel;
pub use crate::cluster::{ClusterPoint, DistanceMetric};
pub use crate::coordinate::{CoordinateLike, MZLocated, Span2D, TimeLocated};
pub use crate::feature::{IntensityMeasurement, KnownCharge};
pub use crate::mass_error::Tolerance;
