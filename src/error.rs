//! Error types for grid construction, clustering and alignment.
//!
//! [`ConfigurationError`] is fatal: the caller must fix its parameters or input
//! before retrying. [`ClusteringError::InsufficientInput`] and
//! [`AlignmentError::InsufficientCorrespondences`] are recoverable, and carry the
//! counts and thresholds that were in effect so the caller can relax them, skip
//! the input, or fall back to an identity transform.

use thiserror::Error;

use crate::coordinate::IndexType;

/// Invalid parameters or coordinates, detected at the boundary of a call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("grid cells must have positive finite dimensions, got {width} x {height}")]
    NonPositiveCellSize { width: f64, height: f64 },

    #[error("coordinate ({x}, {y}) of entry {index} is not finite")]
    NonFiniteCoordinate { index: IndexType, x: f64, y: f64 },

    #[error("coordinate ({x}, {y}) falls outside the addressable cell range")]
    CellOutOfRange { x: f64, y: f64 },

    #[error("parameter `{name}` = {value} is invalid: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

impl ConfigurationError {
    pub(crate) fn positive(name: &'static str, value: f64) -> Result<(), Self> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(Self::InvalidParameter {
                name,
                value,
                reason: "must be positive and finite",
            })
        }
    }
}

/// Failure modes of [`ClusterBuilder`](crate::cluster::ClusterBuilder)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusteringError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{found} features were provided, at least {required} are required to cluster")]
    InsufficientInput { found: usize, required: usize },
}

/// A [`TransformationModel`](crate::align::TransformationModel) could not be
/// fit to the point pairs it was given.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("could not fit {model} to {pairs} point pairs: {reason}")]
pub struct ModelFitError {
    pub model: &'static str,
    pub pairs: usize,
    pub reason: &'static str,
}

/// Failure modes of [`PoseClusteringAligner`](crate::align::PoseClusteringAligner)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignmentError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(
        "only {found} correspondences support the consensus transform, at least {required} are required \
         ({candidates} candidate pairs, {votes} votes)"
    )]
    InsufficientCorrespondences {
        found: usize,
        required: usize,
        candidates: usize,
        votes: usize,
    },

    #[error(transparent)]
    ModelFit(#[from] ModelFitError),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ConfigurationError::NonPositiveCellSize {
            width: 0.0,
            height: 1.0,
        };
        assert!(err.to_string().contains("0 x 1"));

        let err: ClusteringError = err.into();
        assert!(matches!(err, ClusteringError::Configuration(_)));

        let err = AlignmentError::InsufficientCorrespondences {
            found: 1,
            required: 2,
            candidates: 4,
            votes: 4,
        };
        assert!(err.to_string().starts_with("only 1 correspondences"));
    }

    #[test]
    fn test_positive() {
        assert!(ConfigurationError::positive("rt_threshold", 1.0).is_ok());
        assert!(ConfigurationError::positive("rt_threshold", 0.0).is_err());
        assert!(ConfigurationError::positive("rt_threshold", f64::NAN).is_err());
    }
}
