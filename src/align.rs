//! Estimate the retention time transformation that superimposes one feature
//! map (the scene) onto another (the reference).
//!
//! [`PoseClusteringAligner`] never needs to know which features correspond.
//! Every m/z-compatible pair of features implies a transformation, and each
//! implied transformation casts a vote into a [`SpatialGrid`](crate::SpatialGrid)
//! over the transformation's parameters. The most heavily voted neighborhood
//! identifies the dominant transformation and the correspondences that support
//! it, which are then handed to a [`TransformationModel`] for the final fit.
//!
//! ```
//! use mzalign::{Feature, FeatureStore};
//! use mzalign::align::{AlignmentParameters, PoseClusteringAligner, ShiftModel};
//!
//! let reference: FeatureStore = [(100.0, 500.0), (200.0, 600.0), (300.0, 700.0)]
//!     .into_iter()
//!     .map(|(rt, mz)| Feature::at(rt, mz))
//!     .collect();
//! let scene: FeatureStore = reference
//!     .iter()
//!     .map(|f| Feature::at(f.rt + 5.0, f.mz))
//!     .collect();
//!
//! let aligner = PoseClusteringAligner::new(AlignmentParameters::default()).unwrap();
//! let alignment = aligner.align::<ShiftModel>(&reference, &scene).unwrap();
//! assert_eq!(alignment.correspondences.len(), 3);
//! assert!((alignment.transform(205.0) - 200.0).abs() < 1e-9);
//! ```

mod model;
mod params;
mod pose;

pub use model::{IdentityModel, LinearModel, ShiftModel, TransformationModel};
pub use params::AlignmentParameters;
pub use pose::{
    Alignment, AlignmentState, Consensus, Correspondence, PoseClusteringAligner,
    PoseClusteringRun, VotingSummary,
};
