//! A feature is a detected analyte signal in one LC-MS run: a position in
//! retention time and m/z, an abundance, and where known, a charge state.
//! Each feature remembers which run (map) it was observed in.
//!

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coordinate::{CoordinateLike, Time, MZ};

/// An intensity measurement is an entity that has a measured intensity
/// of whatever it is.
pub trait IntensityMeasurement {
    fn intensity(&self) -> f64;
}

/// An entity whose charge state may or may not have been determined
pub trait KnownCharge {
    fn charge(&self) -> Option<i32>;
}

/// An immutable LC-MS feature record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Feature {
    pub rt: f64,
    pub mz: f64,
    pub intensity: f64,
    pub charge: Option<i32>,
    pub source_id: u32,
}

impl Feature {
    pub fn new(rt: f64, mz: f64, intensity: f64, charge: Option<i32>, source_id: u32) -> Self {
        Self {
            rt,
            mz,
            intensity,
            charge,
            source_id,
        }
    }

    /// A feature with unit intensity and no charge, observed in run 0
    pub fn at(rt: f64, mz: f64) -> Self {
        Self::new(rt, mz, 1.0, None, 0)
    }

    /// The (retention time, m/z) position of the feature
    #[inline]
    pub fn position(&self) -> (f64, f64) {
        (self.rt, self.mz)
    }

    pub fn is_finite(&self) -> bool {
        self.rt.is_finite() && self.mz.is_finite()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Feature(rt={}, mz={}, intensity={}, charge={:?}, source={})",
            self.rt, self.mz, self.intensity, self.charge, self.source_id
        )
    }
}

impl CoordinateLike<MZ> for Feature {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl CoordinateLike<Time> for Feature {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.rt
    }
}

impl IntensityMeasurement for Feature {
    #[inline]
    fn intensity(&self) -> f64 {
        self.intensity
    }
}

impl KnownCharge for Feature {
    #[inline]
    fn charge(&self) -> Option<i32> {
        self.charge
    }
}

impl From<(f64, f64)> for Feature {
    fn from((rt, mz): (f64, f64)) -> Self {
        Self::at(rt, mz)
    }
}

impl From<(f64, f64, f64)> for Feature {
    fn from((rt, mz, intensity): (f64, f64, f64)) -> Self {
        Self::new(rt, mz, intensity, None, 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_accessors() {
        let f = Feature::new(120.5, 445.12, 1e5, Some(2), 3);
        assert_eq!(f.rt(), 120.5);
        assert_eq!(f.mz(), 445.12);
        assert_eq!(IntensityMeasurement::intensity(&f), 1e5);
        assert_eq!(KnownCharge::charge(&f), Some(2));
        assert_eq!(f.position(), (120.5, 445.12));
        assert!(f.to_string().contains("source=3"));
    }

    #[test]
    fn test_conversion() {
        let f: Feature = (10.0, 200.0).into();
        assert_eq!(f.intensity, 1.0);
        assert_eq!(f.charge, None);
        let f: Feature = (10.0, 200.0, 50.0).into();
        assert_eq!(f.intensity, 50.0);
        assert!(f.is_finite());
        assert!(!Feature::at(f64::NAN, 1.0).is_finite());
    }
}
