//! The observer hook surface: points in the step loop and per-model transitions external
//! notifiers (tracers, loggers, test probes) can hook into. The kernel never depends on a concrete
//! observer; it only calls through this trait, synchronously, between transition phases.

use crate::time::TimePoint;
use std::sync::{Arc, Mutex};

/// Which of the four DEVS transition functions produced a given [`Notification::Update`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Transition {
    Init,
    Internal,
    External,
    Confluent,
}

/// Points in the step loop, and per-model transition events, an [`Observer`] can hook into.
#[derive(Clone, Debug)]
pub enum Notification {
    PreInit,
    PostInit,
    PreSimulation,
    PostSimulation,
    PostAbort,
    PreStep(TimePoint),
    PostStep(TimePoint),
    /// Fired once per atomic model transition (including the initial `start`), naming the model and
    /// which transition function ran.
    Update { model: String, time: TimePoint, transition: Transition },
}

/// Registered either on a whole model (via `Component::add_observer`) or on one of an atomic model's
/// output ports (via `Atomic::add_port_observer`). Errors are contained by the kernel: a failing
/// observer is logged and the simulation continues (section 7, "Observer errors are contained").
///
/// `Send` because a registered observer may be reached from inside a parallel collection/transition
/// wave (the `par_collection`/`par_transition` features) even though it is only ever called from one
/// thread at a time, serialized behind its `Mutex`.
pub trait Observer: Send {
    fn notify(&mut self, note: Notification) -> crate::error::Result<()>;
}

/// No-op observer used when the caller does not need step-by-step hooks.
#[derive(Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn notify(&mut self, _note: Notification) -> crate::error::Result<()> {
        Ok(())
    }
}

/// Notifies every observer in `observers` with a clone of `note`, containing and logging any error
/// instead of propagating it.
pub(crate) fn notify_all(observers: &[Arc<Mutex<dyn Observer>>], note: &Notification) {
    for observer in observers {
        let mut observer = observer.lock().expect("observer mutex poisoned");
        if let Err(e) = observer.notify(note.clone()) {
            log::warn!("observer callback failed: {e}; continuing per contained-error contract");
        }
    }
}
