use super::Component;
use crate::error::Result;
use crate::observer::Observer;
use crate::time::Duration;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

/// Interface for atomic DEVS models: leaf simulators with explicit state and transition functions.
///
/// `Send` so a model can be driven from inside a `par_collection`/`par_transition` worker thread; it is
/// never accessed from more than one thread at a time, so `Sync` is not required.
pub trait Atomic: Debug + Send {
    fn component(&self) -> &Component;

    fn component_mut(&mut self) -> &mut Component;

    /// The model class `transition_stats` groups counters by. Defaults to the concrete Rust type name,
    /// since every atomic model class is its own Rust type.
    fn model_class(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Registers an observer on this model as a whole.
    #[inline]
    fn add_observer(&mut self, observer: Arc<Mutex<dyn Observer>>) {
        self.component_mut().add_observer(observer);
    }

    /// Registers an observer on one of this model's own output ports.
    fn add_port_observer(&mut self, port: &str, observer: Arc<Mutex<dyn Observer>>) -> Result<()> {
        let id = self.component().out_port_id(port)?;
        self.component_mut().add_port_observer(id, observer)
    }

    /// Runs once before the simulation starts. By default, it does nothing.
    #[inline]
    fn start(&mut self) {}

    /// Runs once after the simulation stops. By default, it does nothing.
    #[inline]
    fn stop(&mut self) {}

    /// Output function. Only invoked immediately before an internal or confluent transition; posts to
    /// this model's own output ports via `self.component_mut().post(..)`.
    fn output(&mut self);

    /// Internal transition function: fires on self-activation, with no external input.
    fn delta_int(&mut self);

    /// External transition function: fires on external input before `time_advance()` is reached.
    /// `e` is the elapsed time since the model's last state transition.
    fn delta_ext(&mut self, e: Duration);

    /// Confluent transition function: fires when self-activation coincides with external input.
    /// By default, first triggers `delta_int`, then `delta_ext` with elapsed time zero.
    #[inline]
    fn delta_conf(&mut self) {
        self.delta_int();
        self.delta_ext(Duration::ZERO);
    }

    /// Time advance function: the duration until this model's next self-activation, given its current
    /// state. Must be pure with respect to state (no side effects).
    fn time_advance(&self) -> Duration;
}
