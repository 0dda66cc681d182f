use std::fmt;

/// Exponent over base-1000 SI factors: level `L` is interpreted as the factor `1000^L`.
///
/// `Scale(-1)` is milli, `Scale(-2)` is micro, `Scale(-3)` is nano, `Scale(0)` is the base unit,
/// `Scale(1)` is kilo, and so on. Lower levels are finer (smaller magnitude per unit).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Scale(i32);

impl Scale {
    pub const NANO: Scale = Scale(-3);
    pub const MICRO: Scale = Scale(-2);
    pub const MILLI: Scale = Scale(-1);
    pub const BASE: Scale = Scale(0);
    pub const KILO: Scale = Scale(1);
    pub const MEGA: Scale = Scale(2);

    pub fn new(level: i32) -> Self {
        Scale(level)
    }

    pub fn level(self) -> i32 {
        self.0
    }

    /// `1000^level` as a floating-point factor.
    pub fn factor(self) -> f64 {
        1000f64.powi(self.0)
    }

    /// Combines two scales as if multiplying their factors (adds levels).
    pub fn product(self, other: Scale) -> Scale {
        Scale(self.0 + other.0)
    }

    /// Combines two scales as if dividing their factors (subtracts levels).
    pub fn quotient(self, other: Scale) -> Scale {
        Scale(self.0 - other.0)
    }

    /// The finer (smaller magnitude) of two scales.
    pub fn finer(self, other: Scale) -> Scale {
        self.min(other)
    }

    /// The coarser (larger magnitude) of two scales.
    pub fn coarser(self, other: Scale) -> Scale {
        self.max(other)
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "10^{}", 3 * self.0)
    }
}
