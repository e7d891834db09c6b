use num_traits::{Float, FromPrimitive};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// The Mass To Charge Ratio (m/z) coordinate system
pub struct MZ();

impl MZ {
    /// Access the m/z of the coordinate type
    #[inline]
    pub fn coordinate<T: CoordinateLike<MZ>>(inst: &T) -> f64 {
        CoordinateLike::<MZ>::coordinate(inst)
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// The retention time coordinate system
pub struct Time();

impl Time {
    /// Access the retention time of the coordinate type
    #[inline]
    pub fn coordinate<T: CoordinateLike<Time>>(inst: &T) -> f64 {
        CoordinateLike::<Time>::coordinate(inst)
    }
}

/// Denote a type has a coordinate value on coordinate system `T`
pub trait CoordinateLike<T> {
    /// The trait method for accessing the coordinate of the object on coordinate
    /// system `T`
    fn coordinate(&self) -> f64;
}

/// A named coordinate system membership for m/z
pub trait MZLocated: CoordinateLike<MZ> {
    #[inline]
    fn mz(&self) -> f64 {
        CoordinateLike::<MZ>::coordinate(self)
    }
}

/// A named coordinate system membership for retention time
pub trait TimeLocated: CoordinateLike<Time> {
    #[inline]
    fn rt(&self) -> f64 {
        CoordinateLike::<Time>::coordinate(self)
    }
}

impl<T: CoordinateLike<C>, C> CoordinateLike<C> for &T {
    fn coordinate(&self) -> f64 {
        (*self).coordinate()
    }
}

impl<T: CoordinateLike<MZ>> MZLocated for T {}
impl<T: CoordinateLike<Time>> TimeLocated for T {}

pub(crate) fn _isclose<T>(x: T, y: T, rtol: T, atol: T) -> bool
where
    T: Float,
{
    (x - y).abs() <= (atol + rtol * y.abs())
}

pub(crate) fn isclose<T>(x: T, y: T) -> bool
where
    T: Float + FromPrimitive,
{
    match (T::from_f64(1e-5), T::from_f64(1e-8)) {
        (Some(rtol), Some(atol)) => _isclose(x, y, rtol, atol),
        _ => x == y,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Point(f64, f64);

    impl CoordinateLike<Time> for Point {
        fn coordinate(&self) -> f64 {
            self.0
        }
    }

    impl CoordinateLike<MZ> for Point {
        fn coordinate(&self) -> f64 {
            self.1
        }
    }

    #[test]
    fn test_is_close() {
        assert!(isclose(0.0, 0.0));
        assert!(isclose(500.0, 500.000001));
        assert!(!isclose(500.0, 500.1));
    }

    #[test]
    fn test_located() {
        let p = Point(12.5, 400.2);
        assert_eq!(p.rt(), 12.5);
        assert_eq!(p.mz(), 400.2);
        assert_eq!(MZ::coordinate(&&p), 400.2);
        assert_eq!(Time::coordinate(&p), 12.5);
    }
}
