//! Where pages of the underlying graph come from

use std::collections::HashMap;

use anyhow::{Context, Result};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use understory_core::{EdgeRecord, NodeId, NodePage, NodeRecord};

/// Loads a node together with its children and the edges reaching them.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    async fn load_node(&self, id: &NodeId) -> Result<NodePage>;
}

/// A whole graph held in memory, served one page at a time.
pub struct MemorySource {
    inner: StableDiGraph<NodeRecord, EdgeRecord>,
    index: HashMap<NodeId, NodeIndex>,
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Add or replace a node.
    pub fn add_node(&mut self, node: NodeRecord) {
        match self.index.get(&node.id) {
            Some(&idx) => {
                if let Some(weight) = self.inner.node_weight_mut(idx) {
                    *weight = node;
                }
            }
            None => {
                let id = node.id.clone();
                let idx = self.inner.add_node(node);
                self.index.insert(id, idx);
            }
        }
    }

    /// Add an edge between two nodes already present.
    pub fn add_edge(&mut self, edge: EdgeRecord) -> Result<()> {
        let source = *self
            .index
            .get(&edge.source)
            .with_context(|| format!("edge {} has unknown source {}", edge.id, edge.source))?;
        let target = *self
            .index
            .get(&edge.target)
            .with_context(|| format!("edge {} has unknown target {}", edge.id, edge.target))?;
        self.inner.add_edge(source, target, edge);
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    /// The node, its out-neighbours, and the out-edges reaching them.
    pub fn page(&self, id: &NodeId) -> Option<NodePage> {
        let idx = *self.index.get(id)?;
        let node = self.inner.node_weight(idx)?.clone();

        let mut children: Vec<NodeRecord> = Vec::new();
        let mut edges = Vec::new();
        for edge_ref in self.inner.edges_directed(idx, Direction::Outgoing) {
            edges.push(edge_ref.weight().clone());
            if let Some(child) = self.inner.node_weight(edge_ref.target()) {
                if !children.iter().any(|c| c.id == child.id) {
                    children.push(child.clone());
                }
            }
        }
        // petgraph walks adjacency newest first
        children.reverse();
        edges.reverse();

        Some(NodePage {
            node: Some(node),
            children,
            edges,
        })
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DataSource for MemorySource {
    async fn load_node(&self, id: &NodeId) -> Result<NodePage> {
        self.page(id)
            .with_context(|| format!("no node {} in the source", id))
    }
}
