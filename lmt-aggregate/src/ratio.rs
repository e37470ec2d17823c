use serde::Serialize;
use std::fmt;

/// A quotient which may be undefined.
///
/// Ratios whose denominator is zero (a bucket without endpoints, an empty
/// dataset) are carried as `undefined` all the way to the presentation layer
/// instead of collapsing to `NaN` or `0`.  Serialises as a number or `null`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct Ratio(Option<f64>);

impl Ratio {
    pub const UNDEFINED: Ratio = Ratio(None);

    /// `num / denom`, or undefined if `denom` is zero
    pub fn new(num: f64, denom: f64) -> Ratio {
        if denom == 0. {
            return Ratio::UNDEFINED;
        }
        Ratio::defined(num / denom)
    }

    /// Wraps a plain value.  Non-finite values become undefined.
    pub fn defined(x: f64) -> Ratio {
        if x.is_finite() {
            Ratio(Some(x))
        } else {
            Ratio::UNDEFINED
        }
    }

    pub fn value(self) -> Option<f64> {
        self.0
    }

    pub fn is_defined(self) -> bool {
        self.0.is_some()
    }

    /// `1 - self`
    pub fn complement(self) -> Ratio {
        Ratio(self.0.map(|x| 1. - x))
    }

    /// Rounds half away from zero to the given number of decimal places
    pub fn round(self, places: i32) -> Ratio {
        let scale = 10_f64.powi(places);
        Ratio(self.0.map(|x| (x * scale).round() / scale))
    }
}

impl From<Option<f64>> for Ratio {
    fn from(x: Option<f64>) -> Ratio {
        x.map_or(Ratio::UNDEFINED, Ratio::defined)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.0, f.precision()) {
            (Some(x), Some(p)) => write!(f, "{:.*}", p, x),
            (Some(x), None) => write!(f, "{}", x),
            (None, _) => f.write_str("undefined"),
        }
    }
}
