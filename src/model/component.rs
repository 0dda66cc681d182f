use super::port::{Port, PortId, PortMode};
use super::Name;
use crate::error::{Result, SimulationError};
use crate::observer::{notify_all, Notification, Observer};
use crate::time::{Duration, Scale, TimePoint};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex};

/// Generic DEVS component: the runtime state every atomic or coupled model carries regardless of kind
/// (name, ports, clock, precision). Models compose a `Component` rather than inheriting from it.
pub struct Component {
    name: Name,
    precision: Scale,
    t_last: TimePoint,
    t_next: TimePoint,
    elapsed: Duration,
    input_index: HashMap<Name, usize>,
    output_index: HashMap<Name, usize>,
    input_ports: Vec<Port>,
    output_ports: Vec<Port>,
    observers: Vec<Arc<Mutex<dyn Observer>>>,
    port_observers: HashMap<PortId, Vec<Arc<Mutex<dyn Observer>>>>,
}

impl Component {
    pub fn new(name: &str) -> Self {
        Self::with_precision(name, Scale::BASE)
    }

    pub fn with_precision(name: &str, precision: Scale) -> Self {
        Component {
            name: name.to_string(),
            precision,
            t_last: TimePoint::zero(),
            t_next: TimePoint::zero(),
            elapsed: Duration::ZERO,
            input_index: HashMap::new(),
            output_index: HashMap::new(),
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            observers: Vec::new(),
            port_observers: HashMap::new(),
        }
    }

    /// Registers an observer on this model as a whole; notified on every transition it undergoes.
    pub fn add_observer(&mut self, observer: Arc<Mutex<dyn Observer>>) {
        self.observers.push(observer);
    }

    /// Registers an observer on one of this component's own output ports. Only meaningful for an
    /// atomic model's output ports (see [`crate::model::Atomic::add_port_observer`]); rejects input
    /// ports outright.
    pub(crate) fn add_port_observer(&mut self, id: PortId, observer: Arc<Mutex<dyn Observer>>) -> Result<()> {
        if id.mode != PortMode::Output {
            return Err(SimulationError::UnobservablePort(self.port_name(id).to_string()));
        }
        self.port_observers.entry(id).or_default().push(observer);
        Ok(())
    }

    pub(crate) fn notify_model_observers(&self, note: &Notification) {
        notify_all(&self.observers, note);
    }

    pub(crate) fn notify_port_observers(&self, id: PortId, note: &Notification) {
        if let Some(observers) = self.port_observers.get(&id) {
            notify_all(observers, note);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precision(&self) -> Scale {
        self.precision
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn t_last(&self) -> &TimePoint {
        &self.t_last
    }

    pub fn t_next(&self) -> &TimePoint {
        &self.t_next
    }

    pub(crate) fn set_clock(&mut self, t_last: TimePoint, t_next: TimePoint) {
        self.t_last = t_last;
        self.t_next = t_next;
    }

    pub(crate) fn set_elapsed(&mut self, e: Duration) {
        self.elapsed = e;
    }

    /// Adds a new input port. Panics if the component already has an input port with this name,
    /// mirroring the builder-time "already contains" guards of the host construction API.
    pub fn add_in_port(&mut self, name: &str) -> PortId {
        if self.input_index.contains_key(name) {
            panic!("component {} already contains input port with name {}", self.name, name);
        }
        let index = self.input_ports.len();
        self.input_ports.push(Port::new(name, PortMode::Input));
        self.input_index.insert(name.to_string(), index);
        PortId { index, mode: PortMode::Input }
    }

    /// Adds a new output port. Panics if the component already has an output port with this name.
    pub fn add_out_port(&mut self, name: &str) -> PortId {
        if self.output_index.contains_key(name) {
            panic!("component {} already contains output port with name {}", self.name, name);
        }
        let index = self.output_ports.len();
        self.output_ports.push(Port::new(name, PortMode::Output));
        self.output_index.insert(name.to_string(), index);
        PortId { index, mode: PortMode::Output }
    }

    pub fn in_port_id(&self, name: &str) -> Result<PortId> {
        self.input_index
            .get(name)
            .map(|&index| PortId { index, mode: PortMode::Input })
            .ok_or_else(|| SimulationError::NoSuchPort(name.to_string(), self.name.clone()))
    }

    pub fn out_port_id(&self, name: &str) -> Result<PortId> {
        self.output_index
            .get(name)
            .map(|&index| PortId { index, mode: PortMode::Output })
            .ok_or_else(|| SimulationError::NoSuchPort(name.to_string(), self.name.clone()))
    }

    fn port(&self, id: PortId) -> &Port {
        match id.mode {
            PortMode::Input => &self.input_ports[id.index],
            PortMode::Output => &self.output_ports[id.index],
        }
    }

    fn port_mut(&mut self, id: PortId) -> &mut Port {
        match id.mode {
            PortMode::Input => &mut self.input_ports[id.index],
            PortMode::Output => &mut self.output_ports[id.index],
        }
    }

    /// Posts a value to one of this component's own output ports. Only meaningful called from within
    /// an atomic model's `output()` while producing λ.
    pub fn post(&mut self, id: PortId, value: Value) -> Result<()> {
        if id.mode != PortMode::Output {
            return Err(SimulationError::InvalidPortHost(self.name.clone()));
        }
        self.port_mut(id).push(value);
        Ok(())
    }

    pub fn values(&self, id: PortId) -> &[Value] {
        self.port(id).values()
    }

    /// Delivers a value into any port regardless of mode, used by the simulation driver to route
    /// messages along couplings into destination input ports.
    pub(crate) fn deliver(&mut self, id: PortId, value: Value) {
        self.port_mut(id).push(value);
    }

    pub fn port_name(&self, id: PortId) -> &str {
        self.port(id).name()
    }

    pub fn is_input_empty(&self) -> bool {
        self.input_ports.iter().all(Port::is_empty)
    }

    pub fn is_output_empty(&self) -> bool {
        self.output_ports.iter().all(Port::is_empty)
    }

    pub fn clear_input(&mut self) {
        self.input_ports.iter_mut().for_each(Port::clear);
    }

    pub fn clear_output(&mut self) {
        self.output_ports.iter_mut().for_each(Port::clear);
    }

    pub fn input_ports(&self) -> impl Iterator<Item = (PortId, &Port)> {
        self.input_ports.iter().enumerate().map(|(index, p)| (PortId { index, mode: PortMode::Input }, p))
    }

    pub fn output_ports(&self) -> impl Iterator<Item = (PortId, &Port)> {
        self.output_ports.iter().enumerate().map(|(index, p)| (PortId { index, mode: PortMode::Output }, p))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("precision", &self.precision)
            .field("t_last", &self.t_last)
            .field("t_next", &self.t_next)
            .field("elapsed", &self.elapsed)
            .field("input_ports", &self.input_ports)
            .field("output_ports", &self.output_ports)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "already contains input port")]
    fn duplicate_port_rejected() {
        let mut c = Component::new("a");
        c.add_in_port("x");
        c.add_in_port("x");
    }

    #[test]
    fn missing_port_rejected() {
        let c = Component::new("a");
        assert!(c.in_port_id("nope").is_err());
    }

    #[test]
    fn post_and_read_values() {
        let mut c = Component::new("a");
        let out = c.add_out_port("out");
        c.post(out, Value::Int(1)).unwrap();
        assert!(!c.is_output_empty());
        assert_eq!(c.values(out), &[Value::Int(1)]);
        c.clear_output();
        assert!(c.is_output_empty());
    }
}
