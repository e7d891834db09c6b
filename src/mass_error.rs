use std::{error::Error, fmt::Display, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize};

/// A failure to parse a mass error tolerance quantity from a string
#[derive(Debug, PartialEq, Eq)]
pub enum ToleranceParsingError {
    /// The unit isn't empty, but not recognized
    UnknownUnit,
    /// The magnitude of the error tolerated couldn't be determined
    InvalidMagnitude,
}

impl Display for ToleranceParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownUnit => f.write_str("unknown tolerance unit, expected Da or PPM"),
            Self::InvalidMagnitude => f.write_str("tolerance magnitude is not a number"),
        }
    }
}

impl Error for ToleranceParsingError {}

/// The largest m/z deviation two signals may have and still be
/// paired as the same analyte.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Tolerance {
    PPM(f64),
    Da(f64),
}

impl FromStr for Tolerance {
    type Err = ToleranceParsingError;

    /// Parse a string of the form "<magnitude:f64><unit:da|ppm>"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (magnitude, unit) = if let Some(m) = s.strip_suffix("ppm") {
            (m, Self::PPM as fn(f64) -> Self)
        } else if let Some(m) = s.strip_suffix("da") {
            (m, Self::Da as fn(f64) -> Self)
        } else {
            return Err(ToleranceParsingError::UnknownUnit);
        };
        magnitude
            .trim()
            .parse::<f64>()
            .map(unit)
            .map_err(|_| ToleranceParsingError::InvalidMagnitude)
    }
}

impl Display for Tolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Da(tol) => write!(f, "{}Da", tol),
            Self::PPM(tol) => write!(f, "{}PPM", tol),
        }
    }
}

impl Tolerance {
    /// The half-width of the tolerated interval in Daltons at `query`
    pub fn width_at(&self, query: f64) -> f64 {
        match self {
            Tolerance::PPM(tol) => query.abs() * *tol / 1e6,
            Tolerance::Da(tol) => *tol,
        }
    }

    /// Compute the error between the two masses, in the appropriate units
    pub fn call(&self, query: f64, reference: f64) -> f64 {
        match self {
            Self::PPM(_tol) => (query - reference) / reference * 1e6,
            Self::Da(_tol) => query - reference,
        }
    }

    /// Return the numeric value of the error threshold in its units
    pub fn tol(&self) -> f64 {
        match self {
            Self::PPM(tol) => *tol,
            Self::Da(tol) => *tol,
        }
    }

    /// Check if `query` is strictly within the tolerated error interval
    /// around `reference`
    pub fn test(&self, query: f64, reference: f64) -> bool {
        self.call(query, reference).abs() < self.tol()
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::Da(0.5)
    }
}

/// Read a [`Tolerance`] written either as a string like `"10ppm"` or in its
/// tagged form, `{"PPM": 10.0}`
#[cfg(feature = "serde")]
pub(crate) fn deserialize_tolerance<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Tolerance, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Tagged(Tolerance),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        Repr::Tagged(tolerance) => Ok(tolerance),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("10ppm".parse::<Tolerance>(), Ok(Tolerance::PPM(10.0)));
        assert_eq!("0.02 Da".parse::<Tolerance>(), Ok(Tolerance::Da(0.02)));
        assert_eq!(
            "0.02".parse::<Tolerance>(),
            Err(ToleranceParsingError::UnknownUnit)
        );
        assert_eq!(
            "xppm".parse::<Tolerance>(),
            Err(ToleranceParsingError::InvalidMagnitude)
        );
        assert_eq!(Tolerance::PPM(5.0).to_string(), "5PPM");
    }

    #[test]
    fn test_ppm() {
        let tol = Tolerance::PPM(10.0);
        assert!((tol.width_at(1000.0) - 0.01).abs() < 1e-12);
        assert!(tol.test(1000.005, 1000.0));
        assert!(!tol.test(1000.02, 1000.0));
        assert!((tol.call(1000.005, 1000.0) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_da() {
        let tol = Tolerance::Da(1.0);
        assert_eq!(tol.width_at(123.0), 1.0);
        assert!(tol.test(500.9, 500.0));
        assert!(!tol.test(501.0, 500.0));
    }
}
