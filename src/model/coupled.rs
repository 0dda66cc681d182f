use super::atomic::Atomic;
use super::component::Component;
use super::port::{PortId, PortMode};
use super::Name;
use crate::error::{Result, SimulationError};
use crate::events::EventSetKind;
use crate::time::Scale;
use std::collections::HashMap;
use std::fmt::{self, Debug};

/// A child of a coupled model: either a leaf [`Atomic`] or a nested [`Coupled`].
///
/// A tagged variant stands in for the host-language inheritance a dynamic DEVS implementation would
/// use; coordinator logic (see [`crate::simulation`]) specializes per variant at each step rather than
/// going through a shared virtual-dispatch interface for the hot routing path.
#[derive(Debug)]
pub enum Child {
    Atomic(Box<dyn Atomic>),
    Coupled(Box<Coupled>),
}

impl Child {
    pub fn name(&self) -> &str {
        self.component().name()
    }

    pub fn component(&self) -> &Component {
        match self {
            Child::Atomic(a) => a.component(),
            Child::Coupled(c) => &c.component,
        }
    }

    pub fn component_mut(&mut self) -> &mut Component {
        match self {
            Child::Atomic(a) => a.component_mut(),
            Child::Coupled(c) => &mut c.component,
        }
    }
}

pub(crate) type Ic = (usize, PortId, usize, PortId);
pub(crate) type Eic = (PortId, usize, PortId);
pub(crate) type Eoc = (usize, PortId, PortId);

/// Coupled DEVS model: owns child models and the three coupling lists that route messages between
/// them (IC, EIC, EOC).
#[derive(Debug)]
pub struct Coupled {
    pub(crate) component: Component,
    children: Vec<Child>,
    child_index: HashMap<Name, usize>,
    /// Internal couplings: `(src_child, src_out_port, dst_child, dst_in_port)`.
    pub(crate) ic: Vec<Ic>,
    /// External input couplings: `(self_in_port, dst_child, dst_in_port)`.
    pub(crate) eic: Vec<Eic>,
    /// External output couplings: `(src_child, src_out_port, self_out_port)`.
    pub(crate) eoc: Vec<Eoc>,
    preferred_event_set: Option<EventSetKind>,
}

impl Coupled {
    pub fn new(name: &str) -> Self {
        Coupled {
            component: Component::new(name),
            children: Vec::new(),
            child_index: HashMap::new(),
            ic: Vec::new(),
            eic: Vec::new(),
            eoc: Vec::new(),
            preferred_event_set: None,
        }
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn add_in_port(&mut self, name: &str) -> PortId {
        self.component.add_in_port(name)
    }

    pub fn add_out_port(&mut self, name: &str) -> PortId {
        self.component.add_out_port(name)
    }

    /// Declares the event-set discipline this coupled model prefers the simulation to use for its own
    /// children, if the caller's `Simulation` configuration does not override it.
    pub fn prefer_event_set(&mut self, kind: EventSetKind) {
        self.preferred_event_set = Some(kind);
    }

    pub fn preferred_event_set(&self) -> Option<EventSetKind> {
        self.preferred_event_set
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Borrows this coupled model's own component and children simultaneously, along with its
    /// coupling lists, for the simulation driver's message-propagation phases.
    pub(crate) fn split_mut(&mut self) -> (&mut Component, &mut [Child], &[Ic], &[Eic], &[Eoc]) {
        (&mut self.component, &mut self.children, &self.ic, &self.eic, &self.eoc)
    }

    /// Adds a child model. Panics if a child with the same name already exists, mirroring the host
    /// construction API's builder-time guards.
    pub fn add_atomic<A: Atomic + 'static>(&mut self, atomic: A) -> &mut Self {
        self.add_child(Child::Atomic(Box::new(atomic)))
    }

    pub fn add_coupled(&mut self, coupled: Coupled) -> &mut Self {
        self.add_child(Child::Coupled(Box::new(coupled)))
    }

    fn add_child(&mut self, child: Child) -> &mut Self {
        let name = child.name().to_string();
        if self.child_index.contains_key(&name) {
            panic!("coupled model {} already contains component with name {}", self.component.name(), name);
        }
        self.child_index.insert(name, self.children.len());
        self.children.push(child);
        self
    }

    fn child_index(&self, name: &str) -> Result<usize> {
        self.child_index
            .get(name)
            .copied()
            .ok_or_else(|| SimulationError::NoSuchPort(name.to_string(), self.component.name().to_string()))
    }

    /// Attaches a coupling. `src_child`/`dst_child` name the owning child, or `None` to mean this
    /// coupled model's own port, matching the specification's host-based classification:
    /// - both `None` is a feedback coupling on the parent itself, rejected;
    /// - both `Some` is an internal coupling (IC) between siblings;
    /// - `src_child: None` is an external input coupling (EIC);
    /// - `dst_child: None` is an external output coupling (EOC).
    ///
    /// Duplicate couplings are idempotent.
    pub fn attach(
        &mut self,
        src_port: &str,
        dst_port: &str,
        src_child: Option<&str>,
        dst_child: Option<&str>,
    ) -> Result<()> {
        match (src_child, dst_child) {
            (None, None) => Err(SimulationError::FeedbackCoupling(self.component.name().to_string())),
            (Some(sc), Some(dc)) => {
                let si = self.child_index(sc)?;
                let di = self.child_index(dc)?;
                let sp = self.children[si].component().out_port_id(src_port)?;
                let dp = self.children[di].component().in_port_id(dst_port)?;
                let entry = (si, sp, di, dp);
                if !self.ic.contains(&entry) {
                    self.ic.push(entry);
                }
                Ok(())
            }
            (None, Some(dc)) => {
                let sp = self.component.in_port_id(src_port)?;
                let di = self.child_index(dc)?;
                let dp = self.children[di].component().in_port_id(dst_port)?;
                let entry = (sp, di, dp);
                if !self.eic.contains(&entry) {
                    self.eic.push(entry);
                }
                Ok(())
            }
            (Some(sc), None) => {
                let si = self.child_index(sc)?;
                let sp = self.children[si].component().out_port_id(src_port)?;
                let dp = self.component.out_port_id(dst_port)?;
                let entry = (si, sp, dp);
                if !self.eoc.contains(&entry) {
                    self.eoc.push(entry);
                }
                Ok(())
            }
        }
    }

    /// Internal coupling between two children's ports.
    pub fn add_ic(&mut self, src_child: &str, src_port: &str, dst_child: &str, dst_port: &str) -> Result<()> {
        self.attach(src_port, dst_port, Some(src_child), Some(dst_child))
    }

    /// External input coupling from one of this model's own input ports to a child's input port.
    pub fn add_eic(&mut self, src_port: &str, dst_child: &str, dst_port: &str) -> Result<()> {
        self.attach(src_port, dst_port, None, Some(dst_child))
    }

    /// External output coupling from a child's output port to one of this model's own output ports.
    pub fn add_eoc(&mut self, src_child: &str, src_port: &str, dst_port: &str) -> Result<()> {
        self.attach(src_port, dst_port, Some(src_child), None)
    }

    pub fn n_ics(&self) -> usize {
        self.ic.len()
    }

    pub fn n_eics(&self) -> usize {
        self.eic.len()
    }

    pub fn n_eocs(&self) -> usize {
        self.eoc.len()
    }

    pub fn precision(&self) -> Scale {
        self.component.precision()
    }

    /// Registers an observer on this coupled model as a whole.
    pub fn add_observer(&mut self, observer: std::sync::Arc<std::sync::Mutex<dyn crate::observer::Observer>>) {
        self.component.add_observer(observer);
    }

    /// A coupled model's own output ports only aggregate an EOC chain; they never fire independently of
    /// the atomic leaf that actually produced the value, so they are not directly observable.
    pub fn add_port_observer(
        &mut self,
        _port: &str,
        _observer: std::sync::Arc<std::sync::Mutex<dyn crate::observer::Observer>>,
    ) -> Result<()> {
        Err(SimulationError::UnobservablePort(self.component.name().to_string()))
    }

    /// Replaces every multi-hop `atomic.out -> ... -> atomic.in` path through nested EIC/IC/EOC chains
    /// with a single direct IC between the atomic leaves, discarding intermediate coupled shells. The
    /// set of delivered `(source_output_port, destination_input_port)` pairs and the fan-out
    /// multiplicity along every path are preserved; distinct paths between the same pair of ports
    /// produce distinct IC entries. After flattening, the returned model's children are all atomic.
    pub fn flatten(self) -> Coupled {
        let resolved = flatten_rec(self);
        let mut flat = Coupled::new(&resolved.name);
        flat.component = resolved.component;
        flat.preferred_event_set = resolved.preferred_event_set;
        for leaf in resolved.leaves {
            flat.children.push(Child::Atomic(leaf));
        }
        for (i, child) in flat.children.iter().enumerate() {
            flat.child_index.insert(child.name().to_string(), i);
        }
        flat.ic = resolved.ic;
        for (self_port, targets) in resolved.input_targets {
            for (leaf_idx, dst_port) in targets {
                flat.eic.push((self_port, leaf_idx, dst_port));
            }
        }
        for (self_port, sources) in resolved.output_sources {
            for (leaf_idx, src_port) in sources {
                flat.eoc.push((leaf_idx, src_port, self_port));
            }
        }
        flat
    }
}

impl fmt::Display for Coupled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-level result of the bottom-up flattening recursion: the atomic leaves collected so far, the
/// direct IC entries already resolved to leaf indices, and (for this level's own ports) which leaves
/// would receive a message on a given self input port, or send on behalf of a given self output port.
struct FlatLevel {
    name: Name,
    component: Component,
    preferred_event_set: Option<EventSetKind>,
    leaves: Vec<Box<dyn Atomic>>,
    ic: Vec<Ic>,
    input_targets: HashMap<PortId, Vec<(usize, PortId)>>,
    output_sources: HashMap<PortId, Vec<(usize, PortId)>>,
}

fn flatten_rec(coupled: Coupled) -> FlatLevel {
    let Coupled { component, children, ic, eic, eoc, preferred_event_set, .. } = coupled;
    let name = component.name().to_string();

    // Flatten each child first, and build per-child lookup tables translating a child's own port
    // into the set of (global leaf index, leaf port) pairs that realize it once flattened.
    let mut leaves: Vec<Box<dyn Atomic>> = Vec::new();
    let mut ic_acc: Vec<Ic> = Vec::new();
    // child_input[child_idx][port] -> Vec<(leaf_idx, leaf_port)>
    let mut child_input: Vec<HashMap<PortId, Vec<(usize, PortId)>>> = Vec::new();
    let mut child_output: Vec<HashMap<PortId, Vec<(usize, PortId)>>> = Vec::new();

    for child in children {
        match child {
            Child::Atomic(atomic) => {
                let leaf_idx = leaves.len();
                let comp = atomic.component();
                let mut inputs = HashMap::new();
                for (id, _) in comp.input_ports() {
                    inputs.insert(id, vec![(leaf_idx, id)]);
                }
                let mut outputs = HashMap::new();
                for (id, _) in comp.output_ports() {
                    outputs.insert(id, vec![(leaf_idx, id)]);
                }
                child_input.push(inputs);
                child_output.push(outputs);
                leaves.push(atomic);
            }
            Child::Coupled(sub) => {
                let sub_result = flatten_rec(*sub);
                let offset = leaves.len();
                leaves.extend(sub_result.leaves);
                ic_acc.extend(sub_result.ic.into_iter().map(|(s, sp, d, dp)| (s + offset, sp, d + offset, dp)));
                let shift = |m: HashMap<PortId, Vec<(usize, PortId)>>| -> HashMap<PortId, Vec<(usize, PortId)>> {
                    m.into_iter().map(|(k, v)| (k, v.into_iter().map(|(i, p)| (i + offset, p)).collect())).collect()
                };
                child_input.push(shift(sub_result.input_targets));
                child_output.push(shift(sub_result.output_sources));
            }
        }
    }

    for (src_child, src_port, dst_child, dst_port) in ic {
        let sources = child_output[src_child].get(&src_port).cloned().unwrap_or_default();
        let destinations = child_input[dst_child].get(&dst_port).cloned().unwrap_or_default();
        for &(src_leaf, src_leaf_port) in &sources {
            for &(dst_leaf, dst_leaf_port) in &destinations {
                ic_acc.push((src_leaf, src_leaf_port, dst_leaf, dst_leaf_port));
            }
        }
    }

    let mut input_targets: HashMap<PortId, Vec<(usize, PortId)>> = HashMap::new();
    for (self_port, dst_child, dst_port) in eic {
        let destinations = child_input[dst_child].get(&dst_port).cloned().unwrap_or_default();
        input_targets.entry(self_port).or_default().extend(destinations);
    }

    let mut output_sources: HashMap<PortId, Vec<(usize, PortId)>> = HashMap::new();
    for (src_child, src_port, self_port) in eoc {
        let sources = child_output[src_child].get(&src_port).cloned().unwrap_or_default();
        output_sources.entry(self_port).or_default().extend(sources);
    }

    FlatLevel { name, component, preferred_event_set, leaves, ic: ic_acc, input_targets, output_sources }
}

impl std::hash::Hash for PortId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        (self.mode == PortMode::Output).hash(state);
    }
}
