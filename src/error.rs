use thiserror::Error;

/// Errors raised by the simulation kernel, both at model-construction time and at runtime.
///
/// Construction-time variants are returned by the builder API in [`crate::model`] and halt model
/// assembly. Runtime variants are returned from the step loop in [`crate::simulation`] and abort the
/// running simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("port '{0}' is hosted by a different component than the one posting to it")]
    InvalidPortHost(String),

    #[error("no such port '{0}' on component '{1}'")]
    NoSuchPort(String, String),

    #[error("coupling from '{0}' to itself at the same level is not allowed")]
    FeedbackCoupling(String),

    #[error("coupling from '{from}' to '{to}' crosses non-sibling boundaries or has the wrong direction")]
    InvalidCoupling { from: String, to: String },

    #[error("cannot observe port '{0}': only output ports of atomic models are observable")]
    UnobservablePort(String),

    #[error("state of type '{expected}' cannot be assigned from a value of type '{actual}'")]
    InvalidState { expected: String, actual: String },

    #[error("component '{0}' is not owned by the processor driving it")]
    InvalidProcessor(String),

    #[error("cannot combine fixed durations with precisions {0:?} and {1:?}")]
    BadSynchronisation(crate::time::Scale, crate::time::Scale),

    #[error("duration arithmetic produced NaN")]
    Arithmetic,
}

pub type Result<T> = std::result::Result<T, SimulationError>;
