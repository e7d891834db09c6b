//! Coordinate systems in which features are located, and the boxes that
//! span them.
//!
//! An LC-MS feature lives in two dimensions, retention [`Time`] and [`MZ`].
//! Types expose their position through [`CoordinateLike`], parameterized by
//! the coordinate system marker.

mod bbox;
mod dim;

pub use bbox::{BoundingBox, Span2D};
pub use dim::{CoordinateLike, MZLocated, Time, TimeLocated, MZ};

pub(crate) use dim::isclose;

/// A type alias for the index of a feature in a [`FeatureStore`](crate::FeatureStore)
pub type IndexType = u32;
