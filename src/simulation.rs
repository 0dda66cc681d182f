//! Drives a model graph through the Parallel DEVS abstract simulation protocol: collection
//! (output + internal-coupling message propagation) followed by transition (state update), repeated
//! until the configured end time or until no model has further activity.

use crate::events::{EventSet, EventSetKind};
use crate::model::{Child, Component, Coupled, PortId};
use crate::observer::{Notification, Observer, Transition};
use crate::time::TimePoint;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "par_any")]
use rayon::prelude::*;

/// Per-run tuning: which event set to hand each coordinator, when to stop, and whether to preserve
/// the model's authored hierarchy or collapse it into one flat coordinator first.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// If `false`, the model is flattened (see [`Coupled::flatten`]) before simulating, trading the
    /// authored hierarchy's structure for a single coordination level.
    pub maintain_hierarchy: bool,
    /// Event set a coupled model uses for its own children, unless it names a preference of its own
    /// via `Coupled::prefer_event_set`.
    pub scheduler: EventSetKind,
    pub end_time: Option<TimePoint>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig { maintain_hierarchy: true, scheduler: EventSetKind::BinaryHeap, end_time: None }
    }
}

fn emit(observer: &mut dyn Observer, note: Notification) {
    if let Err(e) = observer.notify(note) {
        log::warn!("observer callback failed: {e}; continuing per contained-error contract");
    }
}

/// A shared flag an external notifier can raise (from within an [`Observer`] callback, since those run
/// synchronously between transition phases) to request that the running [`Simulation`] stop at the next
/// step boundary. Cloning shares the same underlying flag.
#[derive(Clone, Default, Debug)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-model-class counts of how many times each transition function ran.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ClassCounts {
    pub internal: u64,
    pub external: u64,
    pub confluent: u64,
}

/// Counts of how many models underwent each kind of transition over a run, in total and broken down by
/// atomic model class (the concrete Rust type implementing `Atomic`).
#[derive(Clone, Debug, Default)]
pub struct TransitionStats {
    pub steps: u64,
    pub internal: u64,
    pub external: u64,
    pub confluent: u64,
    pub per_class: HashMap<&'static str, ClassCounts>,
}

impl TransitionStats {
    fn record(&mut self, class: &'static str, transition: Transition) {
        let counts = self.per_class.entry(class).or_default();
        match transition {
            Transition::Internal => {
                self.internal += 1;
                counts.internal += 1;
            }
            Transition::External => {
                self.external += 1;
                counts.external += 1;
            }
            Transition::Confluent => {
                self.confluent += 1;
                counts.confluent += 1;
            }
            Transition::Init => {}
        }
    }

    fn merge(&mut self, other: TransitionStats) {
        self.internal += other.internal;
        self.external += other.external;
        self.confluent += other.confluent;
        for (class, counts) in other.per_class {
            let entry = self.per_class.entry(class).or_default();
            entry.internal += counts.internal;
            entry.external += counts.external;
            entry.confluent += counts.confluent;
        }
    }
}

/// Per-coordinator runtime state mirroring the shape of the model tree: an [`EventSet`] of child
/// index to next scheduled time for every coupled node, and the last collected imminent set (needed
/// again during transition).
enum Processor {
    Atomic,
    Coupled { children: Vec<Processor>, events: Box<dyn EventSet>, imminent: Vec<usize> },
}

fn build_processor(coupled: &Coupled, config: &SimulationConfig) -> Processor {
    let kind = coupled.preferred_event_set().unwrap_or(config.scheduler);
    let children = coupled.children().iter().map(|c| build_child_processor(c, config)).collect();
    Processor::Coupled { children, events: kind.build(), imminent: Vec::new() }
}

fn build_child_processor(child: &Child, config: &SimulationConfig) -> Processor {
    match child {
        Child::Atomic(_) => Processor::Atomic,
        Child::Coupled(c) => build_processor(c, config),
    }
}

fn route(src: &Component, src_port: PortId, dst: &mut Component, dst_port: PortId) {
    if src.values(src_port).is_empty() {
        return;
    }
    for value in src.values(src_port).to_vec() {
        dst.deliver(dst_port, value);
    }
}

fn start_child(child: &mut Child, proc: &mut Processor, t_start: TimePoint, observer: &mut dyn Observer) -> TimePoint {
    match (child, proc) {
        (Child::Atomic(atomic), Processor::Atomic) => {
            atomic.start();
            let t_next = t_start.advance(atomic.time_advance());
            atomic.component_mut().set_clock(t_start.clone(), t_next.clone());
            let note =
                Notification::Update { model: atomic.component().name().to_string(), time: t_start, transition: Transition::Init };
            atomic.component().notify_model_observers(&note);
            emit(observer, note);
            t_next
        }
        (Child::Coupled(coupled), proc @ Processor::Coupled { .. }) => start_coupled(coupled, proc, t_start, observer),
        _ => unreachable!("processor shape diverged from model shape"),
    }
}

/// Sink observer used inside a parallel fan-out: `dyn Observer` is not `Send`, so a worker thread
/// notifies nothing and the owning thread re-emits the real notifications afterward.
#[cfg(feature = "par_any")]
struct Sink;
#[cfg(feature = "par_any")]
impl Observer for Sink {
    fn notify(&mut self, _note: Notification) -> crate::error::Result<()> {
        Ok(())
    }
}

fn start_coupled(coupled: &mut Coupled, proc: &mut Processor, t_start: TimePoint, observer: &mut dyn Observer) -> TimePoint {
    let Processor::Coupled { children, events, .. } = proc else { unreachable!() };
    let (component, kids, ..) = coupled.split_mut();
    let mut t_next_min = TimePoint::Infinite;

    #[cfg(feature = "par_start")]
    let t_nexts: Vec<TimePoint> = kids
        .par_iter_mut()
        .zip(children.par_iter_mut())
        .map(|(kid, child_proc)| start_child(kid, child_proc, t_start.clone(), &mut Sink))
        .collect();
    #[cfg(not(feature = "par_start"))]
    let t_nexts: Vec<TimePoint> = kids
        .iter_mut()
        .zip(children.iter_mut())
        .map(|(kid, child_proc)| start_child(kid, child_proc, t_start.clone(), observer))
        .collect();

    for (i, t_next) in t_nexts.into_iter().enumerate() {
        log::trace!("processor: push child={i} t={t_next:?}");
        events.push(i, t_next.clone());
        if t_next < t_next_min {
            t_next_min = t_next;
        }
    }
    #[cfg(feature = "par_start")]
    for kid in kids.iter() {
        let note = Notification::Update { model: kid.name().to_string(), time: t_start.clone(), transition: Transition::Init };
        emit(observer, note);
    }
    component.set_clock(t_start, t_next_min.clone());
    t_next_min
}

fn stop_child(child: &mut Child, proc: &mut Processor, t_stop: TimePoint) {
    match (child, proc) {
        (Child::Atomic(atomic), Processor::Atomic) => {
            atomic.component_mut().set_clock(t_stop.clone(), TimePoint::Infinite);
            atomic.stop();
        }
        (Child::Coupled(coupled), proc @ Processor::Coupled { .. }) => stop_coupled(coupled, proc, t_stop),
        _ => unreachable!(),
    }
}

fn stop_coupled(coupled: &mut Coupled, proc: &mut Processor, t_stop: TimePoint) {
    let Processor::Coupled { children, .. } = proc else { unreachable!() };
    let (component, kids, ..) = coupled.split_mut();

    #[cfg(feature = "par_stop")]
    kids.par_iter_mut()
        .zip(children.par_iter_mut())
        .for_each(|(kid, child_proc)| stop_child(kid, child_proc, t_stop.clone()));
    #[cfg(not(feature = "par_stop"))]
    for (i, kid) in kids.iter_mut().enumerate() {
        stop_child(kid, &mut children[i], t_stop.clone());
    }

    component.set_clock(t_stop, TimePoint::Infinite);
}

/// Runs the output function of every model imminent at `t`, then copies messages along internal
/// couplings whose source fired (EOC only; IC is deferred to the transition phase to match the
/// two-phase DEVS protocol).
fn collection_child(child: &mut Child, proc: &mut Processor, t: &TimePoint) {
    match (child, proc) {
        (Child::Atomic(atomic), Processor::Atomic) => atomic.output(),
        (Child::Coupled(coupled), proc @ Processor::Coupled { .. }) => collection_coupled(coupled, proc, t),
        _ => unreachable!(),
    }
}

fn collection_coupled(coupled: &mut Coupled, proc: &mut Processor, t: &TimePoint) {
    let Processor::Coupled { children, events, imminent } = proc else { unreachable!() };
    *imminent = events.pop_imminent();
    let (component, kids, _ic, _eic, eoc) = coupled.split_mut();

    #[cfg(feature = "par_collection")]
    {
        let imminent_set: std::collections::HashSet<usize> = imminent.iter().copied().collect();
        kids.par_iter_mut().zip(children.par_iter_mut()).enumerate().for_each(|(i, (kid, child_proc))| {
            if imminent_set.contains(&i) {
                collection_child(kid, child_proc, t);
            }
        });
    }
    #[cfg(not(feature = "par_collection"))]
    {
        for &i in imminent.iter() {
            collection_child(&mut kids[i], &mut children[i], t);
        }
    }

    for &(src_child, src_port, self_port) in eoc {
        let values = kids[src_child].component().values(src_port).to_vec();
        for value in values {
            component.deliver(self_port, value);
        }
    }
}

/// Copies messages along internal and external-input couplings, then runs the transition function of
/// every model that either fired during collection or received a message, and reschedules it. Returns
/// the new `t_next` together with the [`TransitionStats`] delta this call produced (so callers can merge
/// it without sharing mutable state across a parallel child walk).
fn transition_child(
    child: &mut Child,
    proc: &mut Processor,
    t: &TimePoint,
    observer: &mut dyn Observer,
) -> (TimePoint, TransitionStats) {
    match (child, proc) {
        (Child::Atomic(atomic), Processor::Atomic) => {
            let component = atomic.component();
            let t_next = component.t_next().clone();
            let has_input = !component.is_input_empty();
            let e = t.diff(component.t_last());
            let transition = if has_input && *t == t_next {
                atomic.delta_conf();
                Transition::Confluent
            } else if has_input {
                atomic.delta_ext(e);
                Transition::External
            } else {
                atomic.delta_int();
                Transition::Internal
            };
            let mut delta = TransitionStats::default();
            delta.record(atomic.model_class(), transition);

            let new_t_next = t.advance(atomic.time_advance());
            let component = atomic.component_mut();
            component.set_clock(t.clone(), new_t_next.clone());
            component.set_elapsed(e);

            let note = Notification::Update { model: component.name().to_string(), time: t.clone(), transition };
            component.notify_model_observers(&note);
            for (id, port) in component.output_ports() {
                if !port.is_empty() {
                    component.notify_port_observers(id, &note);
                }
            }
            emit(observer, note);

            component.clear_input();
            component.clear_output();
            (new_t_next, delta)
        }
        (Child::Coupled(coupled), proc @ Processor::Coupled { .. }) => transition_coupled(coupled, proc, t, observer),
        _ => unreachable!(),
    }
}

#[cfg_attr(feature = "par_transition", allow(unused_variables))]
fn transition_coupled(
    coupled: &mut Coupled,
    proc: &mut Processor,
    t: &TimePoint,
    observer: &mut dyn Observer,
) -> (TimePoint, TransitionStats) {
    let Processor::Coupled { children, events, imminent } = proc else { unreachable!() };
    let (component, kids, ic, eic, _eoc) = coupled.split_mut();

    for &(src_child, src_port, dst_child, dst_port) in ic {
        let values = kids[src_child].component().values(src_port).to_vec();
        for value in values {
            kids[dst_child].component_mut().deliver(dst_port, value);
        }
    }
    for &(self_port, dst_child, dst_port) in eic {
        route(component, self_port, kids[dst_child].component_mut(), dst_port);
    }

    let mut active: Vec<usize> = imminent.clone();
    for (i, kid) in kids.iter().enumerate() {
        if !kid.component().is_input_empty() && !active.contains(&i) {
            active.push(i);
        }
    }
    imminent.clear();

    let mut stats = TransitionStats::default();

    #[cfg(feature = "par_transition")]
    {
        let active_set: std::collections::HashSet<usize> = active.iter().copied().collect();
        // `observer` cannot cross the parallel boundary (it is `&mut dyn Observer`, not `Send`), so
        // children run against a null sink here; the root-level observer already saw the per-model
        // `Update` notifications via `Component::notify_model_observers`, which is called inside
        // `transition_child` regardless of which observer is passed in.
        let results: Vec<(usize, TimePoint, TransitionStats)> = kids
            .par_iter_mut()
            .zip(children.par_iter_mut())
            .enumerate()
            .filter(|(i, _)| active_set.contains(i))
            .map(|(i, (kid, child_proc))| {
                let mut sink = Sink;
                let (new_t_next, delta) = transition_child(kid, child_proc, t, &mut sink);
                (i, new_t_next, delta)
            })
            .collect();
        for (i, new_t_next, delta) in results {
            log::trace!("processor: adjust child={i} t={new_t_next:?}");
            events.adjust(i, new_t_next);
            stats.merge(delta);
        }
    }
    #[cfg(not(feature = "par_transition"))]
    {
        for &i in &active {
            let (new_t_next, delta) = transition_child(&mut kids[i], &mut children[i], t, observer);
            log::trace!("processor: adjust child={i} t={new_t_next:?}");
            events.adjust(i, new_t_next);
            stats.merge(delta);
        }
    }

    let new_t_next = events.peek_min().cloned().unwrap_or(TimePoint::Infinite);
    component.set_clock(t.clone(), new_t_next.clone());
    component.clear_input();
    component.clear_output();
    (new_t_next, stats)
}

/// Drives one model (atomic or coupled) through the simulation protocol.
pub struct Simulation {
    root: Coupled,
    processor: Processor,
    config: SimulationConfig,
    t: TimePoint,
    stats: TransitionStats,
    abort_flag: AbortFlag,
    wall_start: Option<Instant>,
}

impl Simulation {
    pub fn new(model: Coupled, config: SimulationConfig) -> Self {
        let model = if config.maintain_hierarchy { model } else { model.flatten() };
        let processor = build_processor(&model, &config);
        Simulation {
            root: model,
            processor,
            config,
            t: TimePoint::zero(),
            stats: TransitionStats::default(),
            abort_flag: AbortFlag::new(),
            wall_start: None,
        }
    }

    pub fn model(&self) -> &Coupled {
        &self.root
    }

    pub fn stats(&self) -> TransitionStats {
        self.stats.clone()
    }

    /// The simulated time the model has reached so far (distinct from `t_next`, the time of the next
    /// pending activation).
    pub fn virtual_time(&self) -> &TimePoint {
        &self.t
    }

    pub fn t_next(&self) -> &TimePoint {
        self.root.component.t_next()
    }

    /// Wall-clock time elapsed since the run started, or `0.0` if it has not started yet.
    pub fn elapsed_secs(&self) -> f64 {
        self.wall_start.map(|start| start.elapsed().as_secs_f64()).unwrap_or(0.0)
    }

    /// A handle that can be cloned into an [`Observer`] callback to request the run stop at the next
    /// step boundary (see [`AbortFlag`]).
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort_flag.clone()
    }

    /// Requests the running simulation stop at the next step boundary, honored by `run`/`run_steps`.
    pub fn abort(&mut self) {
        self.abort_flag.request();
    }

    fn init(&mut self, observer: &mut dyn Observer) {
        emit(observer, Notification::PreInit);
        self.t = start_coupled(&mut self.root, &mut self.processor, TimePoint::zero(), observer);
        emit(observer, Notification::PostInit);
    }

    fn finish(&mut self, observer: &mut dyn Observer) {
        let t_stop = self.t.clone();
        stop_coupled(&mut self.root, &mut self.processor, t_stop);
        emit(observer, Notification::PostSimulation);
    }

    fn finish_aborted(&mut self, observer: &mut dyn Observer) {
        log::error!("simulation aborted at t={:?}", self.t);
        let t_stop = self.t.clone();
        stop_coupled(&mut self.root, &mut self.processor, t_stop);
        emit(observer, Notification::PostAbort);
    }

    fn step(&mut self, observer: &mut dyn Observer) {
        let t = self.t.clone();
        emit(observer, Notification::PreStep(t.clone()));
        collection_coupled(&mut self.root, &mut self.processor, &t);
        let (new_t, delta) = transition_coupled(&mut self.root, &mut self.processor, &t, observer);
        self.t = new_t;
        self.stats.merge(delta);
        self.stats.steps += 1;
        let imminent_size = match &self.processor {
            Processor::Coupled { imminent, .. } => imminent.len(),
            Processor::Atomic => 0,
        };
        log::debug!("step {}: t={:?} imminent={}", self.stats.steps, t, imminent_size);
        emit(observer, Notification::PostStep(t));
    }

    /// Runs until the model reaches quiescence (`t_next` is infinite), the configured `end_time`, or an
    /// abort is requested, whichever comes first.
    pub fn run(&mut self, observer: &mut dyn Observer) {
        self.wall_start = Some(Instant::now());
        emit(observer, Notification::PreSimulation);
        self.init(observer);
        loop {
            if self.abort_flag.is_requested() {
                self.finish_aborted(observer);
                return;
            }
            if self.t.is_infinite() {
                break;
            }
            if let Some(end) = &self.config.end_time {
                if self.t >= *end {
                    break;
                }
            }
            self.step(observer);
        }
        self.finish(observer);
    }

    /// Runs for a bounded number of steps, ignoring `end_time`.
    pub fn run_steps(&mut self, mut n_steps: usize, observer: &mut dyn Observer) {
        self.wall_start = Some(Instant::now());
        emit(observer, Notification::PreSimulation);
        self.init(observer);
        while n_steps > 0 && !self.t.is_infinite() {
            if self.abort_flag.is_requested() {
                self.finish_aborted(observer);
                return;
            }
            self.step(observer);
            n_steps -= 1;
        }
        self.finish(observer);
    }
}

/// Thin entry point wrapping a [`Simulation`] with `Deref`/`DerefMut` to the underlying model, mirroring
/// the convenience of driving a simulation without threading the coordinator through call sites.
pub struct RootCoordinator(Simulation);

impl RootCoordinator {
    pub fn new(model: Coupled, config: SimulationConfig) -> Self {
        RootCoordinator(Simulation::new(model, config))
    }

    pub fn simulate_time(&mut self, end_time: TimePoint) {
        self.0.config.end_time = Some(end_time);
        let mut observer = crate::observer::NullObserver;
        self.0.run(&mut observer);
    }

    pub fn simulate_steps(&mut self, n_steps: usize) {
        let mut observer = crate::observer::NullObserver;
        self.0.run_steps(n_steps, &mut observer);
    }
}

impl Deref for RootCoordinator {
    type Target = Simulation;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for RootCoordinator {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Atomic;
    use crate::observer::NullObserver;
    use crate::time::{Duration, Scale};
    use crate::value::Value;

    #[derive(Debug)]
    struct Generator {
        component: Component,
        out: PortId,
        period: Duration,
        count: u32,
    }

    impl Generator {
        fn new(period: Duration) -> Self {
            let mut component = Component::new("gen");
            let out = component.add_out_port("out");
            Generator { component, out, period, count: 0 }
        }
    }

    impl Atomic for Generator {
        fn component(&self) -> &Component {
            &self.component
        }
        fn component_mut(&mut self) -> &mut Component {
            &mut self.component
        }
        fn output(&mut self) {
            self.component.post(self.out, Value::Int(self.count as i64)).unwrap();
        }
        fn delta_int(&mut self) {
            self.count += 1;
        }
        fn delta_ext(&mut self, _e: Duration) {}
        fn time_advance(&self) -> Duration {
            self.period
        }
    }

    #[derive(Default, Debug)]
    struct ReceiverProbe {
        received: Vec<i64>,
    }

    #[derive(Debug)]
    struct Receiver {
        component: Component,
        input: PortId,
        probe: std::sync::Arc<std::sync::Mutex<ReceiverProbe>>,
    }

    impl Receiver {
        fn new(probe: std::sync::Arc<std::sync::Mutex<ReceiverProbe>>) -> Self {
            let mut component = Component::new("recv");
            let input = component.add_in_port("in");
            Receiver { component, input, probe }
        }
    }

    impl Atomic for Receiver {
        fn component(&self) -> &Component {
            &self.component
        }
        fn component_mut(&mut self) -> &mut Component {
            &mut self.component
        }
        fn output(&mut self) {}
        fn delta_int(&mut self) {}
        fn delta_ext(&mut self, _e: Duration) {
            let mut probe = self.probe.lock().unwrap();
            for v in self.component.values(self.input) {
                probe.received.push(v.as_int().unwrap());
            }
        }
        fn time_advance(&self) -> Duration {
            Duration::INFINITY
        }
    }

    #[test]
    fn generator_receiver_delivers_messages() {
        let probe = std::sync::Arc::new(std::sync::Mutex::new(ReceiverProbe::default()));
        let mut top = Coupled::new("top");
        top.add_atomic(Generator::new(Duration::fixed(1.0, Scale::BASE).unwrap()));
        top.add_atomic(Receiver::new(probe.clone()));
        top.add_ic("gen", "out", "recv", "in").unwrap();

        let mut sim = Simulation::new(top, SimulationConfig::default());
        let mut observer = NullObserver;
        let end = TimePoint::zero().advance(Duration::fixed(5.0, Scale::BASE).unwrap());
        sim.config.end_time = Some(end);
        sim.run(&mut observer);

        assert_eq!(probe.lock().unwrap().received, vec![0, 1, 2, 3]);
        assert!(sim.stats().steps > 0);
    }

    #[test]
    fn stats_are_broken_down_per_model_class() {
        let probe = std::sync::Arc::new(std::sync::Mutex::new(ReceiverProbe::default()));
        let mut top = Coupled::new("top");
        top.add_atomic(Generator::new(Duration::fixed(1.0, Scale::BASE).unwrap()));
        top.add_atomic(Receiver::new(probe));
        top.add_ic("gen", "out", "recv", "in").unwrap();

        let mut sim = Simulation::new(top, SimulationConfig::default());
        let mut observer = NullObserver;
        let end = TimePoint::zero().advance(Duration::fixed(5.0, Scale::BASE).unwrap());
        sim.config.end_time = Some(end);
        sim.run(&mut observer);

        let stats = sim.stats();
        let gen_class = std::any::type_name::<Generator>();
        let recv_class = std::any::type_name::<Receiver>();
        assert_eq!(stats.per_class[gen_class].internal, 4);
        assert_eq!(stats.per_class[recv_class].external, 4);
        assert_eq!(stats.internal, 4);
        assert_eq!(stats.external, 4);
    }

    #[test]
    fn abort_stops_run_and_notifies_post_abort() {
        struct AbortAfterFirstStep(AbortFlag, u32);
        impl Observer for AbortAfterFirstStep {
            fn notify(&mut self, note: Notification) -> crate::error::Result<()> {
                if let Notification::PostStep(_) = note {
                    self.1 += 1;
                    if self.1 == 1 {
                        self.0.request();
                    }
                }
                Ok(())
            }
        }

        let mut top = Coupled::new("top");
        top.add_atomic(Generator::new(Duration::fixed(1.0, Scale::BASE).unwrap()));

        let mut sim = Simulation::new(top, SimulationConfig::default());
        let flag = sim.abort_flag();
        let mut observer = AbortAfterFirstStep(flag, 0);
        sim.run(&mut observer);

        assert_eq!(observer.1, 1);
        assert!(sim.virtual_time() < &TimePoint::zero().advance(Duration::fixed(3.0, Scale::BASE).unwrap()));
    }
}
