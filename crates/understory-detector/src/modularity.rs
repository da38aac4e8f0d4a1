//! Greedy modularity joining over the detector mirror.
//!
//! Agglomerative clustering in the style of Clauset, Newman and Moore,
//! adapted to directed graphs. Every node starts alone; the pair whose merge
//! raises modularity the most is joined until no merge gains anything:
//!
//! ```text
//! ΔQ(i, j) = e_ij / m − (k_i^out · k_j^in + k_i^in · k_j^out) / m²
//! ```
//!
//! where `e_ij` counts edges between `i` and `j` in either direction and `m`
//! is the number of mirrored edges. Gains are kept in a sparse row per group,
//! so a merge only touches the two rows involved and their neighbours.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;
use understory_core::NodeId;

use crate::error::DetectorError;
use crate::mirror::DetectorMirror;

/// Merges must gain strictly more than this.
const MIN_GAIN: f64 = 1e-10;

/// One group of the final partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Members in id order.
    pub members: Vec<NodeId>,
    /// Summed modularity gain of the merges that built the group.
    pub quality: f64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    gain: f64,
    row: usize,
    partner: usize,
}

impl Candidate {
    fn pair(&self) -> (usize, usize) {
        (self.row.min(self.partner), self.row.max(self.partner))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain
            .total_cmp(&other.gain)
            .then_with(|| other.pair().cmp(&self.pair()))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Working state of one joining pass.
struct Joining {
    dq: Vec<HashMap<usize, f64>>,
    a_out: Vec<f64>,
    a_in: Vec<f64>,
    size: Vec<usize>,
    quality: Vec<f64>,
    members: Vec<Vec<usize>>,
    alive: Vec<bool>,
    best: Vec<Option<(usize, f64)>>,
    heap: BinaryHeap<Candidate>,
    limit: usize,
}

impl Joining {
    fn eligible(&self, i: usize, j: usize) -> bool {
        self.size[i] + self.size[j] <= self.limit
    }

    fn scan_best(&self, i: usize) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (&j, &gain) in &self.dq[i] {
            if !self.eligible(i, j) {
                continue;
            }
            best = match best {
                Some((p, g)) if !beats(gain, j, g, p) => Some((p, g)),
                _ => Some((j, gain)),
            };
        }
        best
    }

    fn set_best(&mut self, i: usize, best: Option<(usize, f64)>) {
        self.best[i] = best;
        if let Some((partner, gain)) = best {
            self.heap.push(Candidate {
                gain,
                row: i,
                partner,
            });
        }
    }

    fn is_current(&self, c: &Candidate) -> bool {
        self.alive[c.row]
            && self.alive[c.partner]
            && matches!(self.best[c.row], Some((p, g)) if p == c.partner && g.to_bits() == c.gain.to_bits())
    }

    /// Fold group `j` into group `i`.
    fn merge(&mut self, i: usize, j: usize) {
        let gain = self.dq[i].get(&j).copied().unwrap_or(0.0);
        let row_j = std::mem::take(&mut self.dq[j]);
        self.dq[i].remove(&j);

        // Neighbours of i only: j's expected share is subtracted.
        let only_i: Vec<usize> = self.dq[i]
            .keys()
            .copied()
            .filter(|k| !row_j.contains_key(k))
            .collect();
        for k in only_i {
            let v = self.dq[i][&k] - (self.a_out[j] * self.a_in[k] + self.a_in[j] * self.a_out[k]);
            self.dq[i].insert(k, v);
            self.dq[k].insert(i, v);
        }

        // Neighbours of j (shared ones simply add up).
        for (k, vj) in row_j {
            if k == i {
                continue;
            }
            let v = match self.dq[i].get(&k) {
                Some(vi) => vi + vj,
                None => vj - (self.a_out[i] * self.a_in[k] + self.a_in[i] * self.a_out[k]),
            };
            self.dq[i].insert(k, v);
            self.dq[k].insert(i, v);
            self.dq[k].remove(&j);
        }

        self.a_out[i] += self.a_out[j];
        self.a_in[i] += self.a_in[j];
        self.size[i] += self.size[j];
        self.quality[i] += self.quality[j] + gain;
        let absorbed = std::mem::take(&mut self.members[j]);
        self.members[i].extend(absorbed);
        self.alive[j] = false;
        self.best[j] = None;

        let best_i = self.scan_best(i);
        self.set_best(i, best_i);

        let neighbours: Vec<usize> = self.dq[i].keys().copied().collect();
        for k in neighbours {
            let updated = match self.best[k] {
                Some((p, _)) if p == i || p == j => self.scan_best(k),
                current => {
                    let v = self.dq[k][&i];
                    let challenger = self.eligible(k, i).then_some((i, v));
                    match (current, challenger) {
                        (Some((p, g)), Some((c, cv))) if beats(cv, c, g, p) => Some((c, cv)),
                        (None, challenger) => challenger,
                        _ => continue,
                    }
                }
            };
            self.set_best(k, updated);
        }
    }
}

/// Higher gain wins; equal gains go to the smaller partner index.
fn beats(gain: f64, partner: usize, best_gain: f64, best_partner: usize) -> bool {
    gain > best_gain || (gain == best_gain && partner < best_partner)
}

/// Owner of the mirror; answers "best group to collapse" queries.
#[derive(Debug, Clone, Default)]
pub struct ModularityJoiner {
    mirror: DetectorMirror,
}

impl ModularityJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mirror(&self) -> &DetectorMirror {
        &self.mirror
    }

    pub fn reset(&mut self) {
        self.mirror.clear();
    }

    pub fn insert_edge(&mut self, source: &NodeId, target: &NodeId) {
        self.mirror.insert_edge(source, target);
    }

    pub fn delete_edge(&mut self, source: &NodeId, target: &NodeId) {
        self.mirror.delete_edge(source, target);
    }

    /// Run the joining to completion and return every group that absorbed at
    /// least one merge, ordered by smallest member id. No group grows beyond
    /// `limit` members.
    pub fn partitions(&self, limit: usize) -> Vec<Partition> {
        let m = self.mirror.edge_count() as f64;
        if m == 0.0 {
            return Vec::new();
        }

        let ids = self.mirror.nodes();
        let index: HashMap<&NodeId, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let n = ids.len();

        let mut dq: Vec<HashMap<usize, f64>> = vec![HashMap::new(); n];
        for (s, t, count) in self.mirror.edges() {
            if s == t {
                continue;
            }
            let (i, j) = (index[s], index[t]);
            let share = count as f64 / m;
            *dq[i].entry(j).or_insert(0.0) += share;
            *dq[j].entry(i).or_insert(0.0) += share;
        }

        let a_out: Vec<f64> = ids.iter().map(|id| self.mirror.out_degree(id) as f64 / m).collect();
        let a_in: Vec<f64> = ids.iter().map(|id| self.mirror.in_degree(id) as f64 / m).collect();
        for (i, row) in dq.iter_mut().enumerate() {
            for (&j, v) in row.iter_mut() {
                *v -= a_out[i] * a_in[j] + a_in[i] * a_out[j];
            }
        }

        let mut state = Joining {
            dq,
            a_out,
            a_in,
            size: vec![1; n],
            quality: vec![0.0; n],
            members: (0..n).map(|i| vec![i]).collect(),
            alive: vec![true; n],
            best: vec![None; n],
            heap: BinaryHeap::new(),
            limit: limit.max(2),
        };
        for i in 0..n {
            let best = state.scan_best(i);
            state.set_best(i, best);
        }

        let mut merges = 0usize;
        while let Some(candidate) = state.heap.pop() {
            if !state.is_current(&candidate) {
                continue;
            }
            if candidate.gain <= MIN_GAIN {
                break;
            }
            let (i, j) = candidate.pair();
            state.merge(i, j);
            merges += 1;
        }
        debug!("joined {} nodes with {} merges", n, merges);

        let mut result: Vec<Partition> = (0..n)
            .filter(|&i| state.alive[i] && state.members[i].len() > 1)
            .map(|i| {
                let mut members: Vec<NodeId> =
                    state.members[i].iter().map(|&k| ids[k].clone()).collect();
                members.sort();
                Partition {
                    members,
                    quality: state.quality[i],
                }
            })
            .collect();
        result.sort_by(|a, b| a.members[0].cmp(&b.members[0]));
        result
    }

    /// Pick the group to collapse next.
    ///
    /// Without a focus this is the highest-quality group. With a focus, the
    /// focus's own group is excluded and the group farthest from it (by hop
    /// count, ties to higher quality) wins. A focus outside the mirror is
    /// ignored.
    pub fn get_community(
        &self,
        limit: usize,
        focus: Option<&NodeId>,
    ) -> Result<Option<Vec<NodeId>>, DetectorError> {
        let partitions = self.partitions(limit);

        let Some(focus) = focus.filter(|f| self.mirror.has_node(f)) else {
            let best = partitions.into_iter().fold(None::<Partition>, |best, p| match best {
                Some(b) if b.quality >= p.quality => Some(b),
                _ => Some(p),
            });
            return Ok(best.map(|p| p.members));
        };

        let dist = self.mirror.hop_distances(focus);
        let mut farthest: Option<(usize, Partition)> = None;
        for p in partitions {
            if p.members.contains(focus) {
                continue;
            }
            let Some(d) = p.members.iter().filter_map(|id| dist.get(id)).min().copied() else {
                return Err(DetectorError::UnreachableFocus {
                    focus: focus.clone(),
                    unreachable: p.members[0].clone(),
                });
            };
            farthest = match farthest {
                Some((bd, bp)) if bd > d || (bd == d && bp.quality >= p.quality) => Some((bd, bp)),
                _ => Some((d, p)),
            };
        }
        Ok(farthest.map(|(_, p)| p.members))
    }
}
