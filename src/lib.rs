//! `mzalign` finds corresponding features across LC-MS runs.
//!
//! Two independent engines share one indexing scheme, a [`SpatialGrid`] of
//! feature indices into a [`FeatureStore`]:
//!
//! - [`cluster::ClusterBuilder`] groups features from many runs into clusters
//!   that each represent one analyte, subject to charge and one-per-run
//!   constraints.
//! - [`align::PoseClusteringAligner`] estimates the retention time
//!   transformation between two runs by voting over implied transformations.
//!
//! Parallel candidate construction and vote tallying are available with
//! the `rayon` feature, and `serde` derives serialization for parameters,
//! records and results.

pub mod align;
pub mod cluster;
pub mod coordinate;
pub mod error;
pub mod feature;
pub mod feature_store;
pub mod grid;
pub mod mass_error;
pub mod prelude;

#[cfg(test)]
mod test_data;

pub use crate::coordinate::{BoundingBox, CoordinateLike, IndexType, Span2D, Time, MZ};
pub use crate::error::{AlignmentError, ClusteringError, ConfigurationError, ModelFitError};
pub use crate::feature::{Feature, IntensityMeasurement, KnownCharge};
pub use crate::feature_store::FeatureStore;
pub use crate::grid::{CellKey, Neighbors, SpatialGrid};
pub use crate::mass_error::Tolerance;
