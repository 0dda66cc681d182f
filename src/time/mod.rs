//! Fixed-point, multi-scale virtual time: [`Scale`] exponents, [`Duration`] differences, and
//! [`TimePoint`] absolute positions on the simulation clock.

mod duration;
mod scale;
mod timepoint;

pub use duration::{Duration, MULTIPLIER_LIMIT};
pub use scale::Scale;
pub use timepoint::TimePoint;
