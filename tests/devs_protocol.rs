//! End-to-end coverage of the Parallel DEVS abstract simulation protocol: generator/receiver
//! message delivery, EIC/EOC routing equivalence under nesting, flattening equivalence, and a
//! mixed-precision pipeline.

use pdevs_kernel::{Atomic, Component, Coupled, Duration, PortId, Scale, Simulation, SimulationConfig, TimePoint, Value};
use std::sync::{Arc, Mutex};

#[derive(Default, Debug)]
struct GeneratorProbe {
    int_calls: u32,
    output_calls: u32,
}

#[derive(Debug)]
struct Generator {
    component: Component,
    out: PortId,
    probe: Arc<Mutex<GeneratorProbe>>,
}

impl Generator {
    fn new(name: &str, probe: Arc<Mutex<GeneratorProbe>>) -> Self {
        let mut component = Component::new(name);
        let out = component.add_out_port("out");
        Generator { component, out, probe }
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
        self.probe.lock().unwrap().output_calls += 1;
        self.component.post(self.out, Value::Text("value".to_string())).unwrap();
    }
    fn delta_int(&mut self) {
        self.probe.lock().unwrap().int_calls += 1;
    }
    fn delta_ext(&mut self, _e: Duration) {}
    fn time_advance(&self) -> Duration {
        Duration::fixed(1.0, Scale::BASE).unwrap()
    }
}

#[derive(Default, Debug)]
struct ReceiverProbe {
    int_calls: u32,
    ext_calls: u32,
    elapsed_at_entry: Option<Duration>,
    bag: Vec<String>,
}

#[derive(Debug)]
struct Receiver {
    component: Component,
    input: PortId,
    probe: Arc<Mutex<ReceiverProbe>>,
}

impl Receiver {
    fn new(probe: Arc<Mutex<ReceiverProbe>>) -> Self {
        let mut component = Component::new("R");
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
    fn delta_int(&mut self) {
        self.probe.lock().unwrap().int_calls += 1;
    }
    fn delta_ext(&mut self, e: Duration) {
        let mut probe = self.probe.lock().unwrap();
        probe.ext_calls += 1;
        probe.elapsed_at_entry = Some(e);
        for v in self.component.values(self.input) {
            probe.bag.push(v.as_text().unwrap().to_string());
        }
    }
    fn time_advance(&self) -> Duration {
        Duration::INFINITY
    }
}

/// Scenario 1: two generators wired directly into one receiver via flat internal couplings.
#[test]
fn two_generators_one_receiver_flat() {
    let g1_probe = Arc::new(Mutex::new(GeneratorProbe::default()));
    let g2_probe = Arc::new(Mutex::new(GeneratorProbe::default()));
    let r_probe = Arc::new(Mutex::new(ReceiverProbe::default()));

    let mut top = Coupled::new("top");
    top.add_atomic(Generator::new("G1", g1_probe.clone()));
    top.add_atomic(Generator::new("G2", g2_probe.clone()));
    top.add_atomic(Receiver::new(r_probe.clone()));
    top.add_ic("G1", "out", "R", "in").unwrap();
    top.add_ic("G2", "out", "R", "in").unwrap();

    let mut sim = Simulation::new(top, SimulationConfig::default());
    sim.run_steps(1, &mut pdevs_kernel::NullObserver);

    assert_eq!(g1_probe.lock().unwrap().int_calls, 1);
    assert_eq!(g2_probe.lock().unwrap().int_calls, 1);
    assert_eq!(g1_probe.lock().unwrap().output_calls, 1);
    assert_eq!(g2_probe.lock().unwrap().output_calls, 1);

    let r = r_probe.lock().unwrap();
    assert_eq!(r.ext_calls, 1);
    assert_eq!(r.int_calls, 0);
    let mut bag = r.bag.clone();
    bag.sort();
    assert_eq!(bag, vec!["value".to_string(), "value".to_string()]);
    assert_eq!(r.elapsed_at_entry, Some(Duration::fixed(1.0, Scale::BASE).unwrap()));
}

/// Builds the nested-shell topology from scenario 2: `GEN = {G1, G2}` and `RECV = {R}`, joined by a
/// single top-level IC, with EOC/EIC bridging the shells' own ports.
fn nested_topology(
    g1_probe: Arc<Mutex<GeneratorProbe>>,
    g2_probe: Arc<Mutex<GeneratorProbe>>,
    r_probe: Arc<Mutex<ReceiverProbe>>,
) -> Coupled {
    let mut gen = Coupled::new("GEN");
    gen.add_out_port("out1");
    gen.add_out_port("out2");
    gen.add_atomic(Generator::new("G1", g1_probe));
    gen.add_atomic(Generator::new("G2", g2_probe));
    gen.add_eoc("G1", "out", "out1").unwrap();
    gen.add_eoc("G2", "out", "out2").unwrap();

    let mut recv = Coupled::new("RECV");
    recv.add_in_port("in1");
    recv.add_in_port("in2");
    recv.add_atomic(Receiver::new(r_probe));
    recv.add_eic("in1", "R", "in").unwrap();
    recv.add_eic("in2", "R", "in").unwrap();

    let mut top = Coupled::new("top");
    top.add_coupled(gen);
    top.add_coupled(recv);
    top.add_ic("GEN", "out1", "RECV", "in1").unwrap();
    top.add_ic("GEN", "out2", "RECV", "in2").unwrap();
    top
}

/// Scenario 2: the same behavior through two intermediate coupled shells, proving EIC/EOC routing
/// equivalence with the flat topology.
#[test]
fn nested_shells_eic_eoc_equivalence() {
    let g1_probe = Arc::new(Mutex::new(GeneratorProbe::default()));
    let g2_probe = Arc::new(Mutex::new(GeneratorProbe::default()));
    let r_probe = Arc::new(Mutex::new(ReceiverProbe::default()));
    let top = nested_topology(g1_probe.clone(), g2_probe.clone(), r_probe.clone());

    let mut sim = Simulation::new(top, SimulationConfig { maintain_hierarchy: true, ..Default::default() });
    sim.run_steps(1, &mut pdevs_kernel::NullObserver);

    assert_eq!(g1_probe.lock().unwrap().int_calls, 1);
    assert_eq!(g2_probe.lock().unwrap().int_calls, 1);
    let r = r_probe.lock().unwrap();
    assert_eq!(r.ext_calls, 1);
    assert_eq!(r.int_calls, 0);
    let mut bag = r.bag.clone();
    bag.sort();
    assert_eq!(bag, vec!["value".to_string(), "value".to_string()]);
}

/// Scenario 3: flattening the nested topology before simulating must yield byte-identical counters
/// and bag contents to the hierarchical run.
#[test]
fn flattening_preserves_behavior() {
    let g1_probe = Arc::new(Mutex::new(GeneratorProbe::default()));
    let g2_probe = Arc::new(Mutex::new(GeneratorProbe::default()));
    let r_probe = Arc::new(Mutex::new(ReceiverProbe::default()));
    let top = nested_topology(g1_probe.clone(), g2_probe.clone(), r_probe.clone());

    let mut sim =
        Simulation::new(top, SimulationConfig { maintain_hierarchy: false, ..Default::default() });
    sim.run_steps(1, &mut pdevs_kernel::NullObserver);

    assert_eq!(g1_probe.lock().unwrap().int_calls, 1);
    assert_eq!(g2_probe.lock().unwrap().int_calls, 1);
    let r = r_probe.lock().unwrap();
    assert_eq!(r.ext_calls, 1);
    assert_eq!(r.int_calls, 0);
    let mut bag = r.bag.clone();
    bag.sort();
    assert_eq!(bag, vec!["value".to_string(), "value".to_string()]);
}

#[derive(Debug)]
struct MicroGenerator {
    component: Component,
    out: PortId,
    max: u32,
    count: u32,
    int_calls: Arc<Mutex<u32>>,
}

impl Atomic for MicroGenerator {
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
        *self.int_calls.lock().unwrap() += 1;
    }
    fn delta_ext(&mut self, _e: Duration) {}
    fn time_advance(&self) -> Duration {
        if self.count > self.max {
            Duration::INFINITY
        } else {
            Duration::fixed(1.0, Scale::MICRO).unwrap()
        }
    }
}

#[derive(Debug)]
struct Buffer {
    component: Component,
    input: PortId,
    out: PortId,
    held: Option<i64>,
}

impl Atomic for Buffer {
    fn component(&self) -> &Component {
        &self.component
    }
    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }
    fn output(&mut self) {
        if let Some(v) = self.held {
            self.component.post(self.out, Value::Int(v)).unwrap();
        }
    }
    fn delta_int(&mut self) {
        self.held = None;
    }
    fn delta_ext(&mut self, _e: Duration) {
        if let Some(v) = self.component.values(self.input).first() {
            self.held = Some(v.as_int().unwrap());
        }
    }
    fn time_advance(&self) -> Duration {
        if self.held.is_some() {
            Duration::fixed(1.0, Scale::MICRO).unwrap()
        } else {
            Duration::INFINITY
        }
    }
}

#[derive(Default, Debug)]
struct CpuProbe {
    processed: Vec<i64>,
}

#[derive(Debug)]
struct Cpu {
    component: Component,
    input: PortId,
    probe: Arc<Mutex<CpuProbe>>,
}

impl Atomic for Cpu {
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
            probe.processed.push(v.as_int().unwrap());
        }
    }
    fn time_advance(&self) -> Duration {
        Duration::INFINITY
    }
}

/// Scenario 4: a generator/buffer/CPU pipeline spanning `micro` and `nano` precisions must advance
/// without raising, and the generator's internal-transition count equals `max + 1` (including the
/// terminal transition into infinity).
#[test]
fn mixed_precision_pipeline_advances_without_error() {
    let max = 5;
    let cpu_probe = Arc::new(Mutex::new(CpuProbe::default()));
    let gen_int_calls = Arc::new(Mutex::new(0));

    let mut gen_component = Component::with_precision("gen", Scale::MICRO);
    let gen_out = gen_component.add_out_port("out");
    let gen = MicroGenerator { component: gen_component, out: gen_out, max, count: 0, int_calls: gen_int_calls.clone() };

    let mut buf_component = Component::with_precision("buf", Scale::MICRO);
    let buf_in = buf_component.add_in_port("in");
    let buf_out = buf_component.add_out_port("out");
    let buf = Buffer { component: buf_component, input: buf_in, out: buf_out, held: None };

    let mut cpu_component = Component::with_precision("cpu", Scale::NANO);
    let cpu_in = cpu_component.add_in_port("in");
    let cpu = Cpu { component: cpu_component, input: cpu_in, probe: cpu_probe.clone() };

    let mut top = Coupled::new("pipeline");
    top.add_atomic(gen);
    top.add_atomic(buf);
    top.add_atomic(cpu);
    top.add_ic("gen", "out", "buf", "in").unwrap();
    top.add_ic("buf", "out", "cpu", "in").unwrap();

    let end = TimePoint::zero().advance(Duration::fixed(1000.0, Scale::BASE).unwrap());
    let config = SimulationConfig { end_time: Some(end), ..Default::default() };
    let mut sim = Simulation::new(top, config);
    sim.run(&mut pdevs_kernel::NullObserver);

    assert_eq!(cpu_probe.lock().unwrap().processed, (0..=max as i64).collect::<Vec<_>>());
    assert_eq!(*gen_int_calls.lock().unwrap(), max + 1);
}
