//! Similarity bucketing of freshly fetched siblings

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::config::EngineConfig;
use crate::model::{NodeId, NodeRecord, Payload, Reason};

/// A group of sibling nodes that will be shown as one shape when it has more
/// than one member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub reason: Reason,
    pub nodes: Vec<NodeId>,
}

impl Bucket {
    fn new(reason: Reason) -> Self {
        Bucket {
            reason,
            nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bucketer {
    priority: Vec<String>,
    threshold: f64,
}

impl Bucketer {
    pub fn new(priority: Vec<String>, threshold: f64) -> Self {
        Bucketer { priority, threshold }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.priority_attributes.clone(), config.similarity_threshold)
    }

    pub fn priority(&self) -> &[String] {
        &self.priority
    }

    /// Split `nodes` into at most `child_limit` buckets (unless a priority
    /// list is configured, which produces one bucket per attribute value).
    pub fn bucket(&self, nodes: &[NodeRecord], child_limit: usize) -> Vec<Bucket> {
        if nodes.len() <= child_limit {
            return nodes
                .iter()
                .map(|n| Bucket {
                    reason: Reason::Single,
                    nodes: vec![n.id.clone()],
                })
                .collect();
        }
        if !self.priority.is_empty() {
            return self.bucket_by_priority(nodes);
        }
        self.bucket_by_similarity(nodes, child_limit.max(1))
    }

    fn bucket_by_priority(&self, nodes: &[NodeRecord]) -> Vec<Bucket> {
        let mut buckets: Vec<Bucket> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        let mut fallback = Bucket::new(Reason::Default);

        for node in nodes {
            let hit = self
                .priority
                .iter()
                .find_map(|key| node.data.get(key).map(|v| (key.clone(), value_text(v))));

            match hit {
                Some(slot) => {
                    let i = *index.entry(slot.clone()).or_insert_with(|| {
                        let (key, value) = slot;
                        buckets.push(Bucket::new(Reason::Attribute { key, value }));
                        buckets.len() - 1
                    });
                    buckets[i].nodes.push(node.id.clone());
                }
                None => fallback.nodes.push(node.id.clone()),
            }
        }

        if !fallback.nodes.is_empty() {
            buckets.push(fallback);
        }
        buckets
    }

    fn bucket_by_similarity(&self, nodes: &[NodeRecord], count: usize) -> Vec<Bucket> {
        // Each bucket is compared against its first member.
        let mut buckets: Vec<(Option<&Payload>, Bucket)> = (0..count)
            .map(|_| (None, Bucket::new(Reason::Single)))
            .collect();

        for node in nodes {
            let mut shortest = 0;
            let mut shortest_len = usize::MAX;
            let mut joined = None;

            for (i, (example, bucket)) in buckets.iter().enumerate() {
                let score = example.map_or(1.0, |ex| similarity(ex, &node.data));
                if score > self.threshold {
                    joined = Some(i);
                    break;
                }
                if bucket.nodes.len() < shortest_len {
                    shortest = i;
                    shortest_len = bucket.nodes.len();
                }
            }

            let slot = joined.unwrap_or(shortest);
            let (example, bucket) = &mut buckets[slot];
            if example.is_none() {
                *example = Some(&node.data);
                bucket.reason = Reason::Similar {
                    example: node.id.clone(),
                };
            }
            bucket.nodes.push(node.id.clone());
        }

        buckets
            .into_iter()
            .map(|(_, b)| b)
            .filter(|b| !b.nodes.is_empty())
            .collect()
    }
}

impl Default for Bucketer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Weighted attribute overlap in `(0, 1]`.
///
/// Every key present on both sides scores 1, plus 4 more when the values are
/// equal; the total is normalised by five points per key in the union.
pub fn similarity(example: &Payload, candidate: &Payload) -> f64 {
    let keys: BTreeSet<&String> = example.keys().chain(candidate.keys()).collect();
    let mut matches = 0usize;
    for key in &keys {
        if let (Some(a), Some(b)) = (example.get(*key), candidate.get(*key)) {
            matches += 1;
            if a == b {
                matches += 4;
            }
        }
    }
    (matches + 1) as f64 / (keys.len() * 5 + 1) as f64
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
