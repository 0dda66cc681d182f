//! The hierarchical model graph: ports, couplings, atomic/coupled components.

pub mod atomic;
pub mod component;
pub mod coupled;
pub mod port;

pub use atomic::Atomic;
pub use component::Component;
pub use coupled::{Child, Coupled};
pub use port::{PortId, PortMode};

/// Symbolic identifier for models and ports.
pub type Name = String;
