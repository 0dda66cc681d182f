use super::{Duration, Scale};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A point on the simulation's virtual clock.
///
/// Internally a sparse, mixed-radix positional representation: one magnitude per [`Scale`] level,
/// each kept within `[-1000, 1000)` by carrying overflow into the next coarser level, mirroring how a
/// multi-scale duration composes into an absolute point. `Infinite` is the sentinel reached only by
/// advancing through an infinite [`Duration`].
#[derive(Clone, Debug)]
pub enum TimePoint {
    Finite {
        components: BTreeMap<i32, f64>,
        /// Precision of the most recent advance, recoverable independently of the carries above.
        last_scale: Scale,
    },
    Infinite,
}

impl TimePoint {
    pub fn zero() -> Self {
        TimePoint::Finite { components: BTreeMap::new(), last_scale: Scale::BASE }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, TimePoint::Infinite)
    }

    /// The precision of the last `advance` call that produced this point, if finite.
    pub fn last_scale(&self) -> Option<Scale> {
        match self {
            TimePoint::Finite { last_scale, .. } => Some(*last_scale),
            TimePoint::Infinite => None,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            TimePoint::Infinite => f64::INFINITY,
            TimePoint::Finite { components, .. } => components
                .iter()
                .fold(0.0, |acc, (level, m)| acc + m * 1000f64.powi(*level)),
        }
    }

    /// Advances this point by a duration, yielding a later (or equal, for zero) point.
    pub fn advance(&self, d: Duration) -> TimePoint {
        if d.is_infinite() {
            return TimePoint::Infinite;
        }
        let TimePoint::Finite { components, .. } = self else {
            return TimePoint::Infinite;
        };
        let mut components = components.clone();
        *components.entry(d.precision().level()).or_insert(0.0) += d.multiplier();
        normalize(&mut components);
        TimePoint::Finite { components, last_scale: d.precision() }
    }

    /// Difference between two points, expressed as an unfixed [`Duration`] at the finer of the two
    /// points' last-touched precisions.
    pub fn diff(&self, other: &TimePoint) -> Duration {
        match (self, other) {
            (TimePoint::Infinite, TimePoint::Infinite) => Duration::ZERO,
            (TimePoint::Infinite, _) => Duration::INFINITY,
            (_, TimePoint::Infinite) => -Duration::INFINITY,
            (a, b) => {
                let level = a.last_scale().unwrap_or(Scale::BASE).finer(b.last_scale().unwrap_or(Scale::BASE));
                let delta = a.to_f64() - b.to_f64();
                let m = delta / 1000f64.powi(level.level());
                Duration::unfixed(m, level).unwrap_or(Duration::ZERO)
            }
        }
    }
}

fn normalize(components: &mut BTreeMap<i32, f64>) {
    let levels: Vec<i32> = components.keys().copied().collect();
    for level in levels {
        let value = *components.get(&level).unwrap();
        if value.abs() >= 1000.0 {
            let carry = (value / 1000.0).trunc();
            let remainder = value - carry * 1000.0;
            components.insert(level, remainder);
            *components.entry(level + 1).or_insert(0.0) += carry;
        }
    }
    components.retain(|_, v| *v != 0.0);
}

impl PartialEq for TimePoint {
    fn eq(&self, other: &Self) -> bool {
        self.to_f64() == other.to_f64()
    }
}

impl Eq for TimePoint {}

impl PartialOrd for TimePoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimePoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_f64().total_cmp(&other.to_f64())
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimePoint::Infinite => write!(f, "inf"),
            TimePoint::Finite { .. } => write!(f, "{}", self.to_f64()),
        }
    }
}

impl Default for TimePoint {
    fn default() -> Self {
        TimePoint::zero()
    }
}
