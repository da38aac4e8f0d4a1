//! Fixtures for engine tests

use std::collections::BTreeMap;

use tokio::sync::mpsc::UnboundedReceiver;
use understory_core::{Counters, EdgeRecord, EngineConfig, NodeId, NodeRecord};
use understory_detector::{channel, DetectorWorker, Response};

use crate::engine::{Applied, Engine};

/// An engine with a detector worker driven by hand.
pub struct Harness {
    pub engine: Engine,
    pub worker: DetectorWorker,
    pub responses: UnboundedReceiver<Response>,
}

impl Harness {
    pub fn new(config: EngineConfig) -> Self {
        let (handle, worker, responses) = channel();
        let engine = Engine::builder()
            .config(config)
            .detector(handle)
            .build()
            .unwrap();
        Harness {
            engine,
            worker,
            responses,
        }
    }

    pub fn with_limit(node_limit: usize) -> Self {
        Self::new(EngineConfig {
            node_limit,
            ..EngineConfig::default()
        })
    }

    /// Run the detector and feed its answers back until it goes quiet.
    /// Returns every response that did something.
    pub fn pump(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        loop {
            self.worker.process_pending();
            let mut answered = false;
            while let Ok(response) = self.responses.try_recv() {
                answered = true;
                match self.engine.handle_response(response) {
                    Applied::Ignored => {}
                    other => applied.push(other),
                }
            }
            if !answered {
                break;
            }
        }
        applied
    }

    pub fn add_nodes(&mut self, ids: &[&str]) {
        for id in ids {
            assert!(self.engine.insert_node(NodeRecord::new(*id)));
        }
    }

    pub fn add_edges(&mut self, edges: &[(&str, &str, &str)]) {
        for (id, s, t) in edges {
            assert!(self.engine.insert_edge(EdgeRecord::new(*id, *s, *t)).unwrap());
        }
    }

    /// Counters of every node held anywhere.
    pub fn node_counters(&self) -> BTreeMap<NodeId, Counters> {
        self.engine
            .known_node_ids()
            .into_iter()
            .filter_map(|id| self.engine.counters(&id).map(|c| (id, c)))
            .collect()
    }

    /// The rendered plain-to-plain edges must be exactly what the detector holds.
    pub fn assert_mirror_matches(&mut self) {
        self.worker.process_pending();
        let mut expected: BTreeMap<(NodeId, NodeId), usize> = BTreeMap::new();
        for edge in self.engine.edges().filter(|e| e.is_restored()) {
            *expected
                .entry((edge.source.clone(), edge.target.clone()))
                .or_insert(0) += 1;
        }
        let actual: BTreeMap<(NodeId, NodeId), usize> = self
            .worker
            .joiner()
            .mirror()
            .edges()
            .map(|(s, t, c)| ((s.clone(), t.clone()), c))
            .collect();
        assert_eq!(actual, expected);
    }
}

pub fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

/// Five-node cycle with a chord:
/// A->B, B->C, C->D, D->E, E->A, A->C.
pub fn scenario(node_limit: usize) -> Harness {
    let mut h = Harness::with_limit(node_limit);
    h.add_nodes(&["A", "B", "C", "D", "E"]);
    h.add_edges(&[
        ("ab", "A", "B"),
        ("bc", "B", "C"),
        ("cd", "C", "D"),
        ("de", "D", "E"),
        ("ea", "E", "A"),
        ("ac", "A", "C"),
    ]);
    h
}
