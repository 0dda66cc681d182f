use super::Scale;
use crate::error::{Result, SimulationError};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Neg;

/// Upper bound on the absolute value of a [`Duration`]'s multiplier; magnitudes beyond this collapse
/// to infinity (`1000^5`).
pub const MULTIPLIER_LIMIT: f64 = 1e15;

/// A multi-scale, fixed-point time difference: a multiplier `m` at precision `p`, optionally locked
/// (`fixed`) to that precision.
///
/// Unfixed durations are free to have their precision coarsened (by addition/subtraction) or refined
/// (by scalar multiplication/division) so long as the multiplier stays within [`MULTIPLIER_LIMIT`].
/// Fixed durations keep their precision exactly; combining two fixed durations at different precisions
/// is a synchronisation error.
#[derive(Copy, Clone, Debug)]
pub struct Duration {
    m: f64,
    p: Scale,
    fixed: bool,
}

fn round_half_away_from_zero(x: f64) -> f64 {
    if x >= 0.0 {
        (x + 0.5).floor()
    } else {
        (x - 0.5).ceil()
    }
}

impl Duration {
    /// The sentinel duration meaning "never".
    pub const INFINITY: Duration = Duration {
        m: f64::INFINITY,
        p: Scale::BASE,
        fixed: false,
    };

    pub const ZERO: Duration = Duration {
        m: 0.0,
        p: Scale::BASE,
        fixed: false,
    };

    fn raw(m: f64, p: Scale, fixed: bool) -> Result<Self> {
        if m.is_nan() {
            return Err(SimulationError::Arithmetic);
        }
        if !m.is_finite() {
            return Ok(Duration {
                m: f64::INFINITY * m.signum(),
                p: Scale::BASE,
                fixed: false,
            });
        }
        if m.abs() > MULTIPLIER_LIMIT {
            return Ok(Duration {
                m: f64::INFINITY * m.signum(),
                p: Scale::BASE,
                fixed: false,
            });
        }
        Ok(Duration { m, p, fixed })
    }

    /// Builds a fixed duration: arithmetic on it never coarsens `p`, and combining it with another
    /// fixed duration of a different precision is rejected.
    pub fn fixed(m: f64, p: Scale) -> Result<Self> {
        Self::raw(m, p, true)
    }

    /// Builds an unfixed duration: `p` may be coarsened by `+`/`-` or refined by `*`/`/`.
    pub fn unfixed(m: f64, p: Scale) -> Result<Self> {
        let d = Self::raw(m, p, false)?;
        Ok(d.coarsened())
    }

    /// Builds a duration from a plain decimal quantity at base precision, scaling down by 1000 until
    /// the magnitude is at least 1 and rounding to the nearest integer multiplier.
    pub fn from_fraction(n: f64) -> Result<Self> {
        if n.is_nan() {
            return Err(SimulationError::Arithmetic);
        }
        if n == 0.0 || !n.is_finite() {
            return Self::unfixed(n, Scale::BASE);
        }
        let mut level = 0i32;
        let mut v = n.abs();
        while v < 1.0 && level > Scale::NANO.level() * 2 {
            v *= 1000.0;
            level -= 1;
        }
        let m = round_half_away_from_zero(v) * n.signum();
        Self::unfixed(m, Scale::new(level))
    }

    pub fn multiplier(&self) -> f64 {
        self.m
    }

    pub fn precision(&self) -> Scale {
        self.p
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn is_finite(&self) -> bool {
        self.m.is_finite()
    }

    pub fn is_infinite(&self) -> bool {
        !self.is_finite()
    }

    /// The duration's quantity in base units, as a plain float. Used for ordering and display only.
    pub fn to_f64(&self) -> f64 {
        self.m * self.p.factor()
    }

    /// Strict identity: both the multiplier and the precision must match exactly. This is the
    /// `equals?` of the specification; ordinary `==` (quantity comparison) is weaker and treats
    /// rescaled-equal values as equal.
    pub fn bit_identical(&self, other: &Self) -> bool {
        self.m.to_bits() == other.m.to_bits() && self.p == other.p && self.fixed == other.fixed
    }

    fn rescale_to(&self, p: Scale) -> Self {
        let m = self.m * self.p.factor() / p.factor();
        Duration { m, p, fixed: self.fixed }
    }

    /// Coarsens precision (increases the scale level) while the multiplier exceeds the limit.
    fn coarsened(mut self) -> Self {
        if self.fixed || !self.m.is_finite() {
            return self;
        }
        while self.m.abs() >= MULTIPLIER_LIMIT {
            self.m /= 1000.0;
            self.p = self.p.product(Scale::new(1));
        }
        self
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        if self.is_infinite() || other.is_infinite() {
            let sign = if self.is_infinite() { self.m.signum() } else { other.m.signum() };
            return Ok(Duration { m: f64::INFINITY * sign, p: Scale::BASE, fixed: false });
        }
        match (self.fixed, other.fixed) {
            (true, true) => {
                if self.p != other.p {
                    return Err(SimulationError::BadSynchronisation(self.p, other.p));
                }
                Self::fixed(self.m + other.m, self.p)
            }
            (true, false) => {
                let rhs = other.rescale_to(self.p);
                Self::fixed(self.m + rhs.m, self.p)
            }
            (false, true) => {
                let lhs = self.rescale_to(other.p);
                Self::fixed(lhs.m + other.m, other.p)
            }
            (false, false) => {
                let p = self.p.finer(other.p);
                let lhs = self.rescale_to(p);
                let rhs = other.rescale_to(p);
                Self::unfixed(lhs.m + rhs.m, p)
            }
        }
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        self.checked_add(&(-*other))
    }

    /// Scalar multiplication. Fixed durations round the result multiplier to the nearest integer, ties
    /// away from zero. Unfixed durations refine precision while a fractional part remains and
    /// refinement stays in range.
    pub fn checked_mul(&self, n: f64) -> Result<Self> {
        if n.is_nan() {
            return Err(SimulationError::Arithmetic);
        }
        if self.is_infinite() {
            return Ok(Duration { m: self.m * n.signum(), p: Scale::BASE, fixed: false });
        }
        if self.fixed {
            return Self::fixed(round_half_away_from_zero(self.m * n), self.p);
        }
        let mut m = self.m * n;
        let mut p = self.p;
        if n.abs() < 1.0 && n != 0.0 {
            let mut guard = 0;
            while m.fract() != 0.0 && m != 0.0 && guard < 64 {
                let refined_m = m * 1000.0;
                let refined_p = p.quotient(Scale::new(1));
                if refined_m.abs() > MULTIPLIER_LIMIT {
                    break;
                }
                m = refined_m;
                p = refined_p;
                guard += 1;
            }
        }
        Self::unfixed(m, p)
    }

    pub fn checked_div_scalar(&self, n: f64) -> Result<Self> {
        if n.is_nan() {
            return Err(SimulationError::Arithmetic);
        }
        if n == 0.0 {
            return Ok(Duration { m: f64::INFINITY * self.m.signum().max(1.0), p: Scale::BASE, fixed: false });
        }
        self.checked_mul(1.0 / n)
    }

    /// Pure floating-point ratio between two durations: `(m_a/m_b) * (p_a/p_b)`.
    pub fn ratio(&self, other: &Self) -> f64 {
        (self.m / other.m) * (self.p.factor() / other.p.factor())
    }
}

impl Neg for Duration {
    type Output = Duration;
    fn neg(self) -> Duration {
        Duration { m: -self.m, p: self.p, fixed: self.fixed }
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        self.to_f64() == other.to_f64()
    }
}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.to_f64().partial_cmp(&other.to_f64())
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.m, self.p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_xor_infinite() {
        let a = Duration::unfixed(3.0, Scale::BASE).unwrap();
        assert_ne!(a.is_finite(), a.is_infinite());
        assert_ne!(Duration::INFINITY.is_finite(), Duration::INFINITY.is_infinite());
    }

    #[test]
    fn add_then_subtract_preserves_quantity() {
        let a = Duration::unfixed(2.0, Scale::BASE).unwrap();
        let b = Duration::unfixed(500.0, Scale::MILLI).unwrap();
        let sum = a.checked_add(&b).unwrap();
        let back = sum.checked_sub(&b).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn unfixed_scale_round_trip() {
        let a = Duration::unfixed(7.0, Scale::BASE).unwrap();
        let scaled = a.checked_mul(0.001).unwrap().checked_mul(1000.0).unwrap();
        assert_eq!(scaled, a);
    }

    #[test]
    fn fixed_precision_mismatch_rejected() {
        let a = Duration::fixed(2.0, Scale::BASE).unwrap();
        let b = Duration::fixed(500.0, Scale::MILLI).unwrap();
        assert!(a.checked_add(&b).is_err());
        let b_rescaled = Duration::fixed(500.0, Scale::BASE).unwrap();
        assert!(a.checked_add(&b_rescaled).is_ok());
    }

    #[test]
    fn cross_precision_comparator_equal() {
        let d = Duration::unfixed(2.0, Scale::BASE).unwrap();
        let e = Duration::unfixed(500.0, Scale::MILLI).unwrap();
        let sum = d.checked_add(&e).unwrap();
        let expected_base = Duration::unfixed(2.5, Scale::BASE).unwrap();
        let expected_milli = Duration::unfixed(2500.0, Scale::MILLI).unwrap();
        assert_eq!(sum, expected_base);
        assert_eq!(sum, expected_milli);
    }

    #[test]
    fn overflow_collapses_to_infinity() {
        let huge = Duration::unfixed(MULTIPLIER_LIMIT * 2.0, Scale::MEGA).unwrap();
        assert!(huge.is_infinite());
    }
}
