//! Top-level visible entities: plain nodes and communities

use serde::Serialize;

use crate::community::Community;
use crate::model::{Counters, Node, NodeId};

/// Something drawn on the canvas as a single shape.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Visible {
    Plain(Node),
    Community(Community),
}

impl Visible {
    pub fn id(&self) -> &NodeId {
        match self {
            Visible::Plain(n) => &n.id,
            Visible::Community(c) => c.id(),
        }
    }

    pub fn counters(&self) -> Counters {
        match self {
            Visible::Plain(n) => n.counters(),
            Visible::Community(c) => c.counters(),
        }
    }

    pub fn is_expanded(&self) -> bool {
        match self {
            Visible::Plain(n) => n.expanded,
            Visible::Community(c) => c.is_expanded(),
        }
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        match self {
            Visible::Plain(n) => n.expanded = expanded,
            Visible::Community(c) if expanded => c.expand(),
            Visible::Community(c) => c.collapse(),
        }
    }

    /// Rendering cost: one shape, plus the members an expanded community shows.
    pub fn load(&self) -> usize {
        match self {
            Visible::Community(c) if c.is_expanded() => 1 + c.size(),
            _ => 1,
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, Visible::Plain(_))
    }

    pub fn as_plain(&self) -> Option<&Node> {
        match self {
            Visible::Plain(n) => Some(n),
            Visible::Community(_) => None,
        }
    }

    pub fn as_plain_mut(&mut self) -> Option<&mut Node> {
        match self {
            Visible::Plain(n) => Some(n),
            Visible::Community(_) => None,
        }
    }

    pub fn as_community(&self) -> Option<&Community> {
        match self {
            Visible::Community(c) => Some(c),
            Visible::Plain(_) => None,
        }
    }

    pub fn as_community_mut(&mut self) -> Option<&mut Community> {
        match self {
            Visible::Community(c) => Some(c),
            Visible::Plain(_) => None,
        }
    }
}
