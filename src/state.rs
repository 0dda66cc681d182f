use crate::error::{Result, SimulationError};
use crate::value::Value;
use std::any::{Any, TypeId};
use std::fmt::Debug;

/// A value type owned by an atomic model, with named fields a tracer or observer can read back.
///
/// Implementers are ordinary Rust structs; [`Stateful::fields`] is the declarative seam an external
/// serializer would use (persisting state is out of scope for this crate).
pub trait Stateful: Clone + Debug + 'static {
    /// Snapshot of the state's named fields, in declaration order.
    fn fields(&self) -> Vec<(&'static str, Value)>;
}

/// Builder for a [`Stateful`] value: starts from a default and applies field overrides in sequence,
/// each override seeing the effect of the ones before it. This replaces the declarative-block/macro
/// idiom of a dynamic host language with ordinary closures over `&mut S`.
pub struct StateBuilder<S> {
    value: S,
}

impl<S: Stateful> StateBuilder<S> {
    pub fn new(default: S) -> Self {
        Self { value: default }
    }

    /// Applies an override (or a lazy initializer reading other already-applied fields) to the state
    /// under construction.
    pub fn with<F: FnOnce(&mut S)>(mut self, f: F) -> Self {
        f(&mut self.value);
        self
    }

    pub fn build(self) -> S {
        self.value
    }
}

/// A typed slot holding a model's current [`Stateful`] value behind a type identity check.
///
/// Assigning a state instance of a different concrete type than the slot's declared class is rejected
/// with [`SimulationError::InvalidState`] rather than silently accepted, matching the "subclass state is
/// not assignable to the parent slot" invariant.
#[derive(Debug)]
pub struct StateSlot<S: Stateful> {
    value: S,
    expected: TypeId,
}

impl<S: Stateful> StateSlot<S> {
    pub fn new(value: S) -> Self {
        Self { expected: TypeId::of::<S>(), value }
    }

    pub fn get(&self) -> &S {
        &self.value
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.value
    }

    /// Assigns a new value to the slot, checked dynamically via `Any` so that callers holding a
    /// type-erased state handle (e.g. from a generic host API) cannot smuggle in a mismatched class.
    pub fn assign_dyn(&mut self, new_value: Box<dyn Any>) -> Result<()> {
        if new_value.as_ref().type_id() != self.expected {
            return Err(SimulationError::InvalidState {
                expected: std::any::type_name::<S>().to_string(),
                actual: "<erased>".to_string(),
            });
        }
        match new_value.downcast::<S>() {
            Ok(boxed) => {
                self.value = *boxed;
                Ok(())
            }
            Err(_) => Err(SimulationError::InvalidState {
                expected: std::any::type_name::<S>().to_string(),
                actual: "<erased>".to_string(),
            }),
        }
    }

    pub fn assign(&mut self, new_value: S) {
        self.value = new_value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Counter {
        count: i64,
        doubled: i64,
    }

    impl Stateful for Counter {
        fn fields(&self) -> Vec<(&'static str, Value)> {
            vec![("count", Value::Int(self.count)), ("doubled", Value::Int(self.doubled))]
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Other {
        x: i64,
    }
    impl Stateful for Other {
        fn fields(&self) -> Vec<(&'static str, Value)> {
            vec![("x", Value::Int(self.x))]
        }
    }

    #[test]
    fn builder_applies_overrides_in_order() {
        let built = StateBuilder::new(Counter { count: 0, doubled: 0 })
            .with(|s| s.count = 5)
            .with(|s| s.doubled = s.count * 2)
            .build();
        assert_eq!(built, Counter { count: 5, doubled: 10 });
    }

    #[test]
    fn mismatched_state_class_rejected() {
        let mut slot = StateSlot::new(Counter { count: 0, doubled: 0 });
        let wrong: Box<dyn Any> = Box::new(Other { x: 1 });
        assert!(slot.assign_dyn(wrong).is_err());
        let right: Box<dyn Any> = Box::new(Counter { count: 3, doubled: 6 });
        assert!(slot.assign_dyn(right).is_ok());
        assert_eq!(slot.get().count, 3);
    }
}
