//! Detector-side copy of the plain-to-plain edges currently rendered

use std::collections::{HashMap, VecDeque};

use tracing::debug;
use understory_core::NodeId;

type Adjacency = HashMap<NodeId, HashMap<NodeId, usize>>;

/// Multigraph of edge multiplicities with degree bookkeeping.
///
/// Every update is O(1); no edge touching a community ever lands here.
#[derive(Debug, Clone, Default)]
pub struct DetectorMirror {
    adjacency: Adjacency,
    reverse: Adjacency,
    out_degree: HashMap<NodeId, usize>,
    in_degree: HashMap<NodeId, usize>,
    edge_count: usize,
}

impl DetectorMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn insert_edge(&mut self, source: &NodeId, target: &NodeId) {
        *self
            .adjacency
            .entry(source.clone())
            .or_default()
            .entry(target.clone())
            .or_insert(0) += 1;
        *self
            .reverse
            .entry(target.clone())
            .or_default()
            .entry(source.clone())
            .or_insert(0) += 1;
        *self.out_degree.entry(source.clone()).or_insert(0) += 1;
        *self.in_degree.entry(target.clone()).or_insert(0) += 1;
        self.edge_count += 1;
    }

    /// Remove one copy of `source -> target`. Returns false if none existed.
    pub fn delete_edge(&mut self, source: &NodeId, target: &NodeId) -> bool {
        if !decrement(&mut self.adjacency, source, target) {
            debug!("mirror has no edge {} -> {}", source, target);
            return false;
        }
        decrement(&mut self.reverse, target, source);
        decrement_degree(&mut self.out_degree, source);
        decrement_degree(&mut self.in_degree, target);
        self.edge_count -= 1;
        true
    }

    pub fn contains(&self, source: &NodeId, target: &NodeId) -> bool {
        self.multiplicity(source, target) > 0
    }

    pub fn multiplicity(&self, source: &NodeId, target: &NodeId) -> usize {
        self.adjacency
            .get(source)
            .and_then(|t| t.get(target))
            .copied()
            .unwrap_or(0)
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }

    pub fn has_node(&self, id: &NodeId) -> bool {
        self.out_degree.contains_key(id) || self.in_degree.contains_key(id)
    }

    pub fn out_degree(&self, id: &NodeId) -> usize {
        self.out_degree.get(id).copied().unwrap_or(0)
    }

    pub fn in_degree(&self, id: &NodeId) -> usize {
        self.in_degree.get(id).copied().unwrap_or(0)
    }

    /// Every node touching at least one mirrored edge, in id order.
    pub fn nodes(&self) -> Vec<&NodeId> {
        let mut ids: Vec<&NodeId> = self
            .out_degree
            .keys()
            .chain(self.in_degree.keys().filter(|id| !self.out_degree.contains_key(*id)))
            .collect();
        ids.sort();
        ids
    }

    /// `(source, target, multiplicity)` for every distinct mirrored pair.
    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId, usize)> {
        self.adjacency
            .iter()
            .flat_map(|(s, targets)| targets.iter().map(move |(t, c)| (s, t, *c)))
    }

    /// Neighbours ignoring direction.
    pub fn neighbours<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a NodeId> + 'a {
        let out = self.adjacency.get(id).into_iter().flat_map(|m| m.keys());
        let inc = self.reverse.get(id).into_iter().flat_map(|m| m.keys());
        out.chain(inc)
    }

    /// Breadth-first hop counts from `from`, ignoring edge direction.
    pub fn hop_distances(&self, from: &NodeId) -> HashMap<NodeId, usize> {
        let mut dist = HashMap::new();
        let mut queue = VecDeque::new();
        dist.insert(from.clone(), 0);
        queue.push_back(from.clone());

        while let Some(current) = queue.pop_front() {
            let d = dist[&current];
            for next in self.neighbours(&current) {
                if !dist.contains_key(next) {
                    dist.insert(next.clone(), d + 1);
                    queue.push_back(next.clone());
                }
            }
        }
        dist
    }
}

fn decrement(map: &mut Adjacency, from: &NodeId, to: &NodeId) -> bool {
    let Some(targets) = map.get_mut(from) else {
        return false;
    };
    let Some(count) = targets.get_mut(to) else {
        return false;
    };
    *count -= 1;
    if *count == 0 {
        targets.remove(to);
        if targets.is_empty() {
            map.remove(from);
        }
    }
    true
}

fn decrement_degree(degrees: &mut HashMap<NodeId, usize>, id: &NodeId) {
    if let Some(d) = degrees.get_mut(id) {
        *d -= 1;
        if *d == 0 {
            degrees.remove(id);
        }
    }
}
