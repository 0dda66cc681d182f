//! Pluggable priority queues over pending activation times, keyed by a model's integer id.
//!
//! The kernel only ever needs the set of ids imminent at the minimum scheduled time, so every
//! implementation here exposes the same narrow [`EventSet`] interface and differs only in how it
//! finds and updates that minimum. Ladder and calendar queues are intentionally not provided: they
//! pay for amortized-constant scheduling under near-uniform time distributions, which this kernel's
//! logarithmic-precision, frequently-infinite `TimePoint`s do not exhibit.

mod binary_heap;
mod fibonacci_heap;
mod heap_set;

use crate::time::TimePoint;

pub use self::binary_heap::BinaryHeapEventSet;
pub use self::fibonacci_heap::FibonacciHeapEventSet;
pub use self::heap_set::HeapSetEventSet;

/// A priority queue mapping model ids to their next scheduled activation time.
///
/// Implementations must support decreasing or increasing an id's key in place (`adjust`), since a
/// coordinator reschedules the same id on almost every step rather than inserting a fresh one.
///
/// `Send` so the `Processor` tree that owns one per coupled node can be walked from inside a
/// `par_collection`/`par_transition` worker thread.
pub trait EventSet: std::fmt::Debug + Send {
    /// Schedules `id` at time `t`, replacing any existing entry for `id`.
    fn push(&mut self, id: usize, t: TimePoint);

    /// Equivalent to `push`, named for the common case where `t` differs from the previous key.
    fn adjust(&mut self, id: usize, t: TimePoint) {
        self.push(id, t);
    }

    /// Removes `id` from the set, if present.
    fn delete(&mut self, id: usize);

    /// The minimum scheduled time currently in the set, if non-empty.
    fn peek_min(&self) -> Option<&TimePoint>;

    /// Removes and returns every id currently scheduled at the minimum time.
    fn pop_imminent(&mut self) -> Vec<usize>;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Which [`EventSet`] implementation a coordinator should instantiate.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum EventSetKind {
    #[default]
    BinaryHeap,
    FibonacciHeap,
    HeapSet,
}

impl EventSetKind {
    pub fn build(self) -> Box<dyn EventSet> {
        match self {
            EventSetKind::BinaryHeap => Box::new(BinaryHeapEventSet::new()),
            EventSetKind::FibonacciHeap => Box::new(FibonacciHeapEventSet::new()),
            EventSetKind::HeapSet => Box::new(HeapSetEventSet::new()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_suite {
    //! Shared conformance tests run against every `EventSet` implementation.
    use super::*;

    pub(crate) fn exercise(mut set: Box<dyn EventSet>) {
        assert!(set.is_empty());
        set.push(0, TimePoint::zero());
        set.push(1, TimePoint::zero().advance(crate::time::Duration::fixed(5.0, crate::time::Scale::BASE).unwrap()));
        set.push(2, TimePoint::zero());
        assert_eq!(set.size(), 3);
        assert_eq!(set.peek_min(), Some(&TimePoint::zero()));

        let imminent = set.pop_imminent();
        assert_eq!(imminent.len(), 2);
        assert!(imminent.contains(&0));
        assert!(imminent.contains(&2));
        assert_eq!(set.size(), 1);

        set.adjust(1, TimePoint::zero());
        assert_eq!(set.peek_min(), Some(&TimePoint::zero()));

        set.delete(1);
        assert!(set.is_empty());
    }
}
