use crate::value::Value;
use std::fmt;

/// Whether a [`Port`] carries messages into or out of its host component.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PortMode {
    Input,
    Output,
}

/// A handle to one of a component's ports: its position in the owning component's port vector plus
/// its mode. Equality is by `(host-relative index, mode)`, matching the specification's `(host, name)`
/// identity once the host is implicit (the component the id was obtained from).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PortId {
    pub(crate) index: usize,
    pub(crate) mode: PortMode,
}

impl PortId {
    pub fn mode(&self) -> PortMode {
        self.mode
    }
}

/// A named message buffer. Only output ports of atomic models are observable from outside the kernel.
#[derive(Debug, Default)]
pub struct Port {
    name: String,
    mode: Option<PortMode>,
    buffer: Vec<Value>,
}

impl Port {
    pub(crate) fn new(name: &str, mode: PortMode) -> Self {
        Port { name: name.to_string(), mode: Some(mode), buffer: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> PortMode {
        self.mode.expect("port constructed without a mode")
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.buffer
    }

    pub fn push(&mut self, value: Value) {
        self.buffer.push(value);
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = Value>) {
        self.buffer.extend(values);
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
