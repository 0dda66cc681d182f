use super::EventSet;
use crate::time::TimePoint;
use std::collections::HashMap;

/// Arena index into [`FibonacciHeapEventSet::nodes`]. `usize::MAX` stands for "no link".
type Link = usize;
const NIL: Link = usize::MAX;

#[derive(Debug)]
struct Node {
    id: usize,
    key: TimePoint,
    parent: Link,
    child: Link,
    left: Link,
    right: Link,
    degree: usize,
    marked: bool,
}

/// A Fibonacci heap, implemented with an arena of `Node`s addressed by index rather than raw
/// pointers, so `decrease_key` (used by `adjust`) runs in amortized O(1) without `unsafe`.
#[derive(Debug, Default)]
pub struct FibonacciHeapEventSet {
    nodes: Vec<Node>,
    min: Link,
    count: usize,
    index: HashMap<usize, Link>,
}

impl FibonacciHeapEventSet {
    pub fn new() -> Self {
        FibonacciHeapEventSet { nodes: Vec::new(), min: NIL, count: 0, index: HashMap::new() }
    }

    fn alloc(&mut self, id: usize, key: TimePoint) -> Link {
        let idx = self.nodes.len();
        self.nodes.push(Node { id, key, parent: NIL, child: NIL, left: idx, right: idx, degree: 0, marked: false });
        idx
    }

    /// Splices `node`'s singleton ring into the circular root list anchored at `list`.
    fn splice_into(&mut self, list: Link, node: Link) {
        let list_right = self.nodes[list].right;
        self.nodes[list].right = node;
        self.nodes[node].left = list;
        self.nodes[node].right = list_right;
        self.nodes[list_right].left = node;
    }

    fn remove_from_ring(&mut self, node: Link) {
        let (left, right) = (self.nodes[node].left, self.nodes[node].right);
        self.nodes[left].right = right;
        self.nodes[right].left = left;
        self.nodes[node].left = node;
        self.nodes[node].right = node;
    }

    fn insert_root(&mut self, node: Link) {
        if self.min == NIL {
            self.min = node;
        } else {
            self.splice_into(self.min, node);
            if self.nodes[node].key < self.nodes[self.min].key {
                self.min = node;
            }
        }
    }

    fn link(&mut self, child: Link, parent: Link) {
        self.remove_from_ring(child);
        self.nodes[child].parent = parent;
        self.nodes[child].marked = false;
        let parent_child = self.nodes[parent].child;
        if parent_child == NIL {
            self.nodes[parent].child = child;
            self.nodes[child].left = child;
            self.nodes[child].right = child;
        } else {
            self.splice_into(parent_child, child);
        }
        self.nodes[parent].degree += 1;
    }

    fn consolidate(&mut self) {
        if self.min == NIL {
            return;
        }
        let roots: Vec<Link> = self.ring_members(self.min);
        let mut degree_table: HashMap<usize, Link> = HashMap::new();
        for root in roots {
            let mut current = root;
            let mut degree = self.nodes[current].degree;
            while let Some(&other) = degree_table.get(&degree) {
                if other == current {
                    break;
                }
                let (lo, hi) =
                    if self.nodes[current].key <= self.nodes[other].key { (current, other) } else { (other, current) };
                degree_table.remove(&degree);
                self.link(hi, lo);
                current = lo;
                degree = self.nodes[current].degree;
            }
            degree_table.insert(degree, current);
        }
        self.min = NIL;
        for (_, node) in degree_table {
            self.nodes[node].left = node;
            self.nodes[node].right = node;
            self.nodes[node].parent = NIL;
            self.insert_root(node);
        }
    }

    fn ring_members(&self, start: Link) -> Vec<Link> {
        let mut out = Vec::new();
        if start == NIL {
            return out;
        }
        let mut current = start;
        loop {
            out.push(current);
            current = self.nodes[current].right;
            if current == start {
                break;
            }
        }
        out
    }

    fn cut(&mut self, node: Link, parent: Link) {
        self.remove_from_ring(node);
        self.nodes[parent].degree -= 1;
        if self.nodes[parent].child == node {
            self.nodes[parent].child = if self.nodes[node].right == node { NIL } else { self.nodes[node].right };
        }
        self.nodes[node].parent = NIL;
        self.nodes[node].marked = false;
        self.insert_root(node);
    }

    fn cascading_cut(&mut self, node: Link) {
        let parent = self.nodes[node].parent;
        if parent == NIL {
            return;
        }
        if !self.nodes[node].marked {
            self.nodes[node].marked = true;
        } else {
            self.cut(node, parent);
            self.cascading_cut(parent);
        }
    }

    fn decrease_key(&mut self, node: Link, new_key: TimePoint) {
        debug_assert!(new_key <= self.nodes[node].key);
        self.nodes[node].key = new_key;
        let parent = self.nodes[node].parent;
        if parent != NIL && self.nodes[node].key < self.nodes[parent].key {
            self.cut(node, parent);
            self.cascading_cut(parent);
        }
        if self.min != NIL && self.nodes[node].key < self.nodes[self.min].key {
            self.min = node;
        }
    }
}

impl EventSet for FibonacciHeapEventSet {
    fn push(&mut self, id: usize, t: TimePoint) {
        log::trace!("fibonacci heap: push id={id} t={t:?}");
        if let Some(&link) = self.index.get(&id) {
            if t < self.nodes[link].key {
                self.decrease_key(link, t);
            } else if t > self.nodes[link].key {
                // A Fibonacci heap has no efficient increase-key; delete and reinsert.
                self.delete(id);
                self.push(id, t);
            }
            return;
        }
        let node = self.alloc(id, t);
        self.insert_root(node);
        self.index.insert(id, node);
        self.count += 1;
    }

    fn delete(&mut self, id: usize) {
        log::trace!("fibonacci heap: delete id={id}");
        let Some(link) = self.index.remove(&id) else { return };
        self.decrease_key(link, TimePoint::zero());
        // zero may not be the true minimum possible value, so force this node to the root next.
        let parent = self.nodes[link].parent;
        if parent != NIL {
            self.cut(link, parent);
        }
        self.min = link;
        let _ = self.extract_min_link();
    }

    fn peek_min(&self) -> Option<&TimePoint> {
        if self.min == NIL {
            None
        } else {
            Some(&self.nodes[self.min].key)
        }
    }

    fn pop_imminent(&mut self) -> Vec<usize> {
        let Some(t_min) = self.peek_min().cloned() else { return Vec::new() };
        let mut out = Vec::new();
        while let Some(t) = self.peek_min() {
            if *t != t_min {
                break;
            }
            if let Some(id) = self.extract_min_link() {
                out.push(id);
            } else {
                break;
            }
        }
        out
    }

    fn size(&self) -> usize {
        self.count
    }
}

impl FibonacciHeapEventSet {
    fn extract_min_link(&mut self) -> Option<usize> {
        let z = self.min;
        if z == NIL {
            return None;
        }
        let children = self.ring_members(self.nodes[z].child);
        for child in children {
            self.remove_from_ring(child);
            self.nodes[child].parent = NIL;
            self.insert_root(child);
        }
        let z_right = self.nodes[z].right;
        self.remove_from_ring(z);
        if z_right == z {
            self.min = NIL;
        } else {
            self.min = z_right;
            self.consolidate();
        }
        self.count -= 1;
        let id = self.nodes[z].id;
        self.index.remove(&id);
        Some(id)
    }
}
