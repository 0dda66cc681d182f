//! A Parallel DEVS discrete-event simulation kernel: hierarchical atomic/coupled models over a
//! fixed-point, multi-scale time algebra, driven by a pluggable event set.

pub mod error;
pub mod events;
pub mod model;
pub mod observer;
pub mod simulation;
pub mod state;
pub mod time;
pub mod value;

pub use error::{Result, SimulationError};
pub use model::{Atomic, Child, Component, Coupled, PortId, PortMode};
pub use observer::{Notification, NullObserver, Observer, Transition};
pub use simulation::{AbortFlag, ClassCounts, RootCoordinator, Simulation, SimulationConfig, TransitionStats};
pub use state::{StateBuilder, StateSlot, Stateful};
pub use time::{Duration, Scale, TimePoint};
pub use value::Value;
