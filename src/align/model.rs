#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coordinate::isclose;
use crate::error::ModelFitError;

/// A monotone mapping of scene retention times onto reference retention times,
/// fit from corresponding `(scene_rt, reference_rt)` pairs.
///
/// A fitted model is immutable. [`PoseClusteringAligner`](super::PoseClusteringAligner)
/// fits one per call and hands it to the caller.
pub trait TransformationModel: Sized {
    /// Fit the model to `pairs` of `(scene_rt, reference_rt)`
    fn fit(pairs: &[(f64, f64)]) -> Result<Self, ModelFitError>;

    /// Map a scene retention time into the reference's frame
    fn apply(&self, x: f64) -> f64;

    /// The absolute error of the model on one `(scene_rt, reference_rt)` pair
    fn residual(&self, pair: (f64, f64)) -> f64 {
        (self.apply(pair.0) - pair.1).abs()
    }
}

/// Leaves retention times unchanged, for when the caller only wants the
/// correspondences
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdentityModel;

impl TransformationModel for IdentityModel {
    fn fit(_pairs: &[(f64, f64)]) -> Result<Self, ModelFitError> {
        Ok(Self)
    }

    #[inline]
    fn apply(&self, x: f64) -> f64 {
        x
    }
}

/// A constant offset, the mean of `reference_rt - scene_rt`
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShiftModel {
    pub shift: f64,
}

impl TransformationModel for ShiftModel {
    fn fit(pairs: &[(f64, f64)]) -> Result<Self, ModelFitError> {
        if pairs.is_empty() {
            return Err(ModelFitError {
                model: "ShiftModel",
                pairs: 0,
                reason: "at least one pair is required",
            });
        }
        let shift = pairs.iter().map(|(x, y)| y - x).sum::<f64>() / pairs.len() as f64;
        if !shift.is_finite() {
            return Err(ModelFitError {
                model: "ShiftModel",
                pairs: pairs.len(),
                reason: "the offset is not finite",
            });
        }
        Ok(Self { shift })
    }

    #[inline]
    fn apply(&self, x: f64) -> f64 {
        x + self.shift
    }
}

/// An ordinary least squares line, `reference_rt = slope * scene_rt + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for LinearModel {
    fn default() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
        }
    }
}

impl TransformationModel for LinearModel {
    fn fit(pairs: &[(f64, f64)]) -> Result<Self, ModelFitError> {
        let n = pairs.len();
        if n < 2 {
            return Err(ModelFitError {
                model: "LinearModel",
                pairs: n,
                reason: "at least two pairs are required",
            });
        }
        let nf = n as f64;
        let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
        let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / nf;
        let (sxy, sxx) = pairs.iter().fold((0.0f64, 0.0f64), |(sxy, sxx), (x, y)| {
            let dx = x - mean_x;
            (sxy + dx * (y - mean_y), sxx + dx * dx)
        });
        if !sxx.is_finite() || isclose(sxx, 0.0) {
            return Err(ModelFitError {
                model: "LinearModel",
                pairs: n,
                reason: "scene retention times do not vary",
            });
        }
        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(ModelFitError {
                model: "LinearModel",
                pairs: n,
                reason: "the fitted line is not finite",
            });
        }
        Ok(Self { slope, intercept })
    }

    #[inline]
    fn apply(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}
