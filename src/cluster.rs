//! Group features observed across several runs into clusters that represent
//! the same analyte.
//!
//! [`ClusterBuilder`] partitions a point collection into disjoint [`Cluster`]s
//! whose members all lie within a box tolerance of the cluster centroid. Two
//! optional constraints may be enforced: every member shares the same
//! [`ClusterPoint::property_a`] (e.g. charge state) and no two members share a
//! [`ClusterPoint::property_b`] (e.g. source run).
//!
//! ```
//! use mzalign::{Feature, FeatureStore};
//! use mzalign::cluster::{ClusterBuilder, ClusteringParameters};
//!
//! let store: FeatureStore = vec![
//!     Feature::new(100.0, 500.0, 1e4, Some(2), 0),
//!     Feature::new(100.5, 500.002, 2e4, Some(2), 1),
//!     Feature::new(300.0, 720.4, 1e4, Some(1), 0),
//! ].into();
//!
//! let builder = ClusterBuilder::new(ClusteringParameters::new(2.0, 0.01)).unwrap();
//! let result = builder.cluster(&store).unwrap();
//! assert_eq!(result.clusters.len(), 2);
//! assert_eq!(result.clusters[0].members(), &[0, 1]);
//! ```

#[allow(clippy::module_inception)]
mod cluster;
mod builder;
mod metric;
mod silhouette;

pub use builder::{
    Budget, ClusterBuilder, ClusteringParameters, ClusteringResult, NonConvergence,
};
pub use cluster::{Cluster, ClusterPoint, Constraints};
pub use metric::{DistanceMetric, ScaledEuclidean};
pub use silhouette::{average_silhouette_width, silhouette_scores};
