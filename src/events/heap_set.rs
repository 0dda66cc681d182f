use super::EventSet;
use crate::time::TimePoint;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Bit pattern of a [`TimePoint`]'s total-ordered quantity, used as a bucket key. Two points that
/// compare equal (`to_f64()` identical) always hash identically since both derive from the same
/// `f64::total_cmp`-compatible bit pattern.
type Bucket = u64;

fn bucket_of(t: &TimePoint) -> Bucket {
    t.to_f64().to_bits()
}

/// `EventSet` that groups ids by identical scheduled time ("heap of sets"): an outer ordered map from
/// bucket to the set of ids sharing that time, so an entire imminent set is removed in one step
/// instead of being popped id-by-id.
#[derive(Debug, Default)]
pub struct HeapSetEventSet {
    buckets: BTreeMap<Bucket, (TimePoint, HashSet<usize>)>,
    location: HashMap<usize, Bucket>,
}

impl HeapSetEventSet {
    pub fn new() -> Self {
        HeapSetEventSet { buckets: BTreeMap::new(), location: HashMap::new() }
    }
}

impl EventSet for HeapSetEventSet {
    fn push(&mut self, id: usize, t: TimePoint) {
        log::trace!("heap-set: push id={id} t={t:?}");
        if let Some(old) = self.location.remove(&id) {
            if let Some((_, set)) = self.buckets.get_mut(&old) {
                set.remove(&id);
                if set.is_empty() {
                    self.buckets.remove(&old);
                }
            }
        }
        let key = bucket_of(&t);
        self.buckets.entry(key).or_insert_with(|| (t, HashSet::new())).1.insert(id);
        self.location.insert(id, key);
    }

    fn delete(&mut self, id: usize) {
        log::trace!("heap-set: delete id={id}");
        if let Some(key) = self.location.remove(&id) {
            if let Some((_, set)) = self.buckets.get_mut(&key) {
                set.remove(&id);
                if set.is_empty() {
                    self.buckets.remove(&key);
                }
            }
        }
    }

    fn peek_min(&self) -> Option<&TimePoint> {
        self.buckets.values().next().map(|(t, _)| t)
    }

    fn pop_imminent(&mut self) -> Vec<usize> {
        let Some((&key, _)) = self.buckets.iter().next() else { return Vec::new() };
        let (_, set) = self.buckets.remove(&key).unwrap();
        for id in &set {
            self.location.remove(id);
        }
        set.into_iter().collect()
    }

    fn size(&self) -> usize {
        self.location.len()
    }
}
