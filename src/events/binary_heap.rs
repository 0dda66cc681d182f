use super::EventSet;
use crate::time::TimePoint;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// An entry queued in the heap. `seq` breaks ties between equal times so two ids scheduled at the
/// same instant pop in insertion order rather than arbitrarily.
#[derive(Debug)]
struct Entry {
    time: TimePoint,
    seq: u64,
    id: usize,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // `BinaryHeap` is a max-heap; reverse both keys to make the smallest time (and earliest
    // insertion on ties) compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.partial_cmp(&self.time).unwrap_or(Ordering::Equal).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// `EventSet` backed by `std::collections::BinaryHeap`, with lazy deletion: `adjust`/`delete` push a
/// stale marker and the heap top is validated against `current` on pop, since a binary heap has no
/// native decrease-key.
#[derive(Debug, Default)]
pub struct BinaryHeapEventSet {
    heap: BinaryHeap<Entry>,
    current: HashMap<usize, TimePoint>,
    next_seq: u64,
}

impl BinaryHeapEventSet {
    pub fn new() -> Self {
        BinaryHeapEventSet { heap: BinaryHeap::new(), current: HashMap::new(), next_seq: 0 }
    }

    fn is_stale(&self, entry: &Entry) -> bool {
        match self.current.get(&entry.id) {
            Some(t) => *t != entry.time,
            None => true,
        }
    }
}

impl EventSet for BinaryHeapEventSet {
    fn push(&mut self, id: usize, t: TimePoint) {
        log::trace!("binary heap: push id={id} t={t:?}");
        self.current.insert(id, t.clone());
        self.heap.push(Entry { time: t, seq: self.next_seq, id });
        self.next_seq += 1;
    }

    fn delete(&mut self, id: usize) {
        log::trace!("binary heap: delete id={id}");
        self.current.remove(&id);
    }

    fn peek_min(&self) -> Option<&TimePoint> {
        self.current.values().min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
    }

    fn pop_imminent(&mut self) -> Vec<usize> {
        while let Some(top) = self.heap.peek() {
            if self.is_stale(top) {
                self.heap.pop();
                continue;
            }
            break;
        }
        let t_min = match self.heap.peek() {
            Some(e) => e.time.clone(),
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        while let Some(top) = self.heap.peek() {
            if self.is_stale(top) {
                self.heap.pop();
                continue;
            }
            if top.time != t_min {
                break;
            }
            let entry = self.heap.pop().unwrap();
            self.current.remove(&entry.id);
            out.push(entry.id);
        }
        out
    }

    fn size(&self) -> usize {
        self.current.len()
    }
}
