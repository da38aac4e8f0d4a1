//! Core data structures for the rendered working set

use std::fmt;

use serde::{Deserialize, Serialize};

/// Arbitrary attributes attached to a node or edge by the data source.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Opaque, stable identifier for a node (plain or community).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

/// Unique edge identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        EdgeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        EdgeId(id.to_string())
    }
}

impl From<String> for EdgeId {
    fn from(id: String) -> Self {
        EdgeId(id)
    }
}

/// A node as delivered by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub data: Payload,
}

impl NodeRecord {
    pub fn new(id: impl Into<NodeId>) -> Self {
        NodeRecord {
            id: id.into(),
            data: Payload::new(),
        }
    }

    /// Attach a single attribute, builder style.
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// A directed edge as delivered by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub data: Payload,
}

impl EdgeRecord {
    pub fn new(id: impl Into<EdgeId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        EdgeRecord {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            data: Payload::new(),
        }
    }
}

/// One page returned by the data source for `load_node`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePage {
    pub node: Option<NodeRecord>,
    pub children: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// Rendered edge counts in each direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub inbound: usize,
    pub outbound: usize,
}

/// A plain node in the working set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub data: Payload,
    pub outbound: usize,
    pub inbound: usize,
    pub expanded: bool,
}

impl Node {
    pub fn counters(&self) -> Counters {
        Counters {
            inbound: self.inbound,
            outbound: self.outbound,
        }
    }
}

impl From<NodeRecord> for Node {
    fn from(record: NodeRecord) -> Self {
        Node {
            id: record.id,
            data: record.data,
            outbound: 0,
            inbound: 0,
            expanded: false,
        }
    }
}

/// The true endpoints of an edge, independent of any grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoints {
    pub source: NodeId,
    pub target: NodeId,
}

/// A rendered edge.
///
/// `source`/`target` always name the entity currently visible for each end,
/// which is a community id while that end is absorbed. `origin` is never
/// re-pointed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub origin: Endpoints,
    pub data: Payload,
}

impl Edge {
    /// Point both ends back at the original nodes.
    pub fn restore(&mut self) {
        self.source = self.origin.source.clone();
        self.target = self.origin.target.clone();
    }

    pub fn is_restored(&self) -> bool {
        self.source == self.origin.source && self.target == self.origin.target
    }
}

impl From<EdgeRecord> for Edge {
    fn from(record: EdgeRecord) -> Self {
        Edge {
            origin: Endpoints {
                source: record.source.clone(),
                target: record.target.clone(),
            },
            id: record.id,
            source: record.source,
            target: record.target,
            data: record.data,
        }
    }
}

/// Why a group of nodes was put into one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Reason {
    /// Bucket holding one node only.
    Single,
    /// Nodes resembling the bucket's first member.
    Similar { example: NodeId },
    /// Nodes sharing the value of a priority attribute.
    Attribute { key: String, value: String },
    /// Nodes carrying none of the priority attributes.
    Default,
    /// Group chosen by the modularity detector.
    Modularity,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Single => f.write_str("One Node"),
            Reason::Similar { .. } => f.write_str("Similar Nodes"),
            Reason::Attribute { key, value } => write!(f, "{}: {}", key, value),
            Reason::Default => f.write_str("default"),
            Reason::Modularity => f.write_str("Dense Group"),
        }
    }
}
