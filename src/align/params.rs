#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::mass_error::Tolerance;

/// Parameters controlling [`PoseClusteringAligner`](super::PoseClusteringAligner)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct AlignmentParameters {
    /// The largest m/z difference between two features that may correspond.
    /// Accepts strings such as `"0.5Da"` or `"10ppm"` when deserialized.
    #[cfg_attr(
        feature = "serde",
        serde(deserialize_with = "crate::mass_error::deserialize_tolerance")
    )]
    pub mz_tolerance: Tolerance,
    /// Only the most intense features of each map take part in voting.
    /// `None` uses every feature.
    pub num_used_points: Option<usize>,
    /// The width of a voting bucket along the shift axis, in seconds
    pub shift_bucket_size: f64,
    /// The height of a voting bucket along the scale axis
    pub scale_bucket_size: f64,
    /// How many buckets on each side of the winning bucket also count towards it
    pub bucket_window: u32,
    /// The largest retention time difference between corresponding features
    pub max_shift: f64,
    /// Estimate a scale as well as a shift
    pub affine: bool,
    /// Affine votes must have a scale within `[1 / max_scaling, max_scaling]`
    pub max_scaling: f64,
    /// Affine votes are only cast by pairs of correspondences separated by at least
    /// this fraction of each map's retention time span
    pub rt_pair_distance_fraction: f64,
    /// The most affine votes to generate
    pub max_pair_votes: usize,
    /// Fewer supporting correspondences than this is a failure
    pub min_correspondences: usize,
    /// Correspondences the fitted model misses by more than this are pruned
    /// before refitting. Defaults to twice the shift bucket size.
    pub residual_threshold: Option<f64>,
}

impl Default for AlignmentParameters {
    fn default() -> Self {
        Self {
            mz_tolerance: Tolerance::Da(0.5),
            num_used_points: Some(500),
            shift_bucket_size: 3.0,
            scale_bucket_size: 0.005,
            bucket_window: 1,
            max_shift: 1000.0,
            affine: false,
            max_scaling: 2.0,
            rt_pair_distance_fraction: 0.1,
            max_pair_votes: 5_000_000,
            min_correspondences: 2,
            residual_threshold: None,
        }
    }
}

impl AlignmentParameters {
    pub fn mz_tolerance(mut self, mz_tolerance: Tolerance) -> Self {
        self.mz_tolerance = mz_tolerance;
        self
    }

    pub fn num_used_points(mut self, num_used_points: Option<usize>) -> Self {
        self.num_used_points = num_used_points;
        self
    }

    pub fn shift_bucket_size(mut self, shift_bucket_size: f64) -> Self {
        self.shift_bucket_size = shift_bucket_size;
        self
    }

    pub fn bucket_window(mut self, bucket_window: u32) -> Self {
        self.bucket_window = bucket_window;
        self
    }

    pub fn max_shift(mut self, max_shift: f64) -> Self {
        self.max_shift = max_shift;
        self
    }

    /// Enable scale estimation, voting on `(shift, scale)` with buckets
    /// `scale_bucket_size` tall
    pub fn affine(mut self, max_scaling: f64, scale_bucket_size: f64) -> Self {
        self.affine = true;
        self.max_scaling = max_scaling;
        self.scale_bucket_size = scale_bucket_size;
        self
    }

    pub fn max_pair_votes(mut self, max_pair_votes: usize) -> Self {
        self.max_pair_votes = max_pair_votes;
        self
    }

    pub fn min_correspondences(mut self, min_correspondences: usize) -> Self {
        self.min_correspondences = min_correspondences;
        self
    }

    pub fn residual_threshold(mut self, residual_threshold: f64) -> Self {
        self.residual_threshold = Some(residual_threshold);
        self
    }

    /// The residual threshold in effect
    pub fn residual_cutoff(&self) -> f64 {
        self.residual_threshold
            .unwrap_or(2.0 * self.shift_bucket_size)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        ConfigurationError::positive("mz_tolerance", self.mz_tolerance.tol())?;
        ConfigurationError::positive("shift_bucket_size", self.shift_bucket_size)?;
        ConfigurationError::positive("scale_bucket_size", self.scale_bucket_size)?;
        ConfigurationError::positive("max_shift", self.max_shift)?;
        if let Some(threshold) = self.residual_threshold {
            ConfigurationError::positive("residual_threshold", threshold)?;
        }
        if self.num_used_points == Some(0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "num_used_points",
                value: 0.0,
                reason: "at least one feature per map must be used",
            });
        }
        if !(self.max_scaling.is_finite() && self.max_scaling >= 1.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "max_scaling",
                value: self.max_scaling,
                reason: "must be finite and at least 1",
            });
        }
        if !(0.0..1.0).contains(&self.rt_pair_distance_fraction) {
            return Err(ConfigurationError::InvalidParameter {
                name: "rt_pair_distance_fraction",
                value: self.rt_pair_distance_fraction,
                reason: "must lie in [0, 1)",
            });
        }
        if self.min_correspondences == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "min_correspondences",
                value: 0.0,
                reason: "at least one correspondence is required",
            });
        }
        if self.max_pair_votes == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "max_pair_votes",
                value: 0.0,
                reason: "at least one vote is required",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let params = AlignmentParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.residual_cutoff(), 6.0);
        assert_eq!(params.clone().residual_threshold(2.5).residual_cutoff(), 2.5);
    }

    #[test]
    fn test_invalid() {
        let base = AlignmentParameters::default();
        assert!(base.clone().mz_tolerance(Tolerance::PPM(0.0)).validate().is_err());
        assert!(base.clone().num_used_points(Some(0)).validate().is_err());
        assert!(base.clone().affine(0.5, 0.01).validate().is_err());
        assert!(base.clone().min_correspondences(0).validate().is_err());
        assert!(base.clone().shift_bucket_size(-1.0).validate().is_err());
        assert!(base.max_shift(f64::INFINITY).validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json() {
        let params: AlignmentParameters = serde_json::from_str(
            r#"{"mz_tolerance": {"PPM": 20.0}, "affine": true, "num_used_points": null}"#,
        )
        .unwrap();
        assert_eq!(params.mz_tolerance, Tolerance::PPM(20.0));
        assert!(params.affine);
        assert_eq!(params.num_used_points, None);
        assert_eq!(params.max_shift, 1000.0);

        let params: AlignmentParameters =
            serde_json::from_str(r#"{"mz_tolerance": "15ppm", "max_shift": 300.0}"#).unwrap();
        assert_eq!(params.mz_tolerance, Tolerance::PPM(15.0));
        assert_eq!(params.max_shift, 300.0);

        let err = serde_json::from_str::<AlignmentParameters>(r#"{"mz_tolerance": "15 parsecs"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown tolerance unit"));
    }
}
