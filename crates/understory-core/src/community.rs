//! Community super-node: owns absorbed nodes and reclassifies the edges
//! crossing its boundary.
//!
//! Boundary edges stay rendered at the top level (owned by the engine) with
//! the absorbed end re-pointed at the community; the community only records
//! which member each boundary edge really belongs to. Internal edges are not
//! rendered and are owned here until dissolve.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::model::{Counters, Edge, EdgeId, Node, NodeId, Reason};

/// Where an inserted edge ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Still crosses the boundary; the caller keeps rendering the re-pointed edge.
    Boundary(Edge),
    /// Both ends are members; the community took ownership.
    Internal,
}

/// Result of detaching one side of an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Detachment {
    /// The boundary edge is no longer tracked by this community.
    Removed,
    /// A formerly internal edge now crosses the boundary; the caller owns it.
    Demoted(Edge),
    /// The edge is not known on that side.
    Missing,
}

/// An edge removed by [`Community::remove_outbound_edges_from_node`].
#[derive(Debug, Clone, PartialEq)]
pub enum Severed {
    /// A rendered boundary edge; the caller must drop it and update its target.
    Boundary(EdgeId),
    /// An internal edge, already fully accounted for inside the community.
    Internal(Edge),
}

/// Everything needed to put a community's contents back on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct DissolveInfo {
    pub id: NodeId,
    pub members: Vec<Node>,
    /// Internal edges with both endpoints restored.
    pub internal_edges: Vec<Edge>,
    /// Boundary edges whose target is a member; restore their `target`.
    pub inbound_edges: Vec<EdgeId>,
    /// Boundary edges whose source is a member; restore their `source`.
    pub outbound_edges: Vec<EdgeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Community {
    id: NodeId,
    reason: Option<Reason>,
    members: BTreeMap<NodeId, Node>,
    internal: BTreeMap<EdgeId, Edge>,
    /// Boundary edge -> member that is its true target.
    inbound: BTreeMap<EdgeId, NodeId>,
    /// Boundary edge -> member that is its true source.
    outbound: BTreeMap<EdgeId, NodeId>,
    /// Member -> outbound and internal edges it is the true source of.
    #[serde(skip)]
    out_reference: HashMap<NodeId, BTreeSet<EdgeId>>,
    expanded: bool,
}

impl Community {
    pub fn new(id: NodeId, reason: Option<Reason>) -> Self {
        Community {
            id,
            reason,
            members: BTreeMap::new(),
            internal: BTreeMap::new(),
            inbound: BTreeMap::new(),
            outbound: BTreeMap::new(),
            out_reference: HashMap::new(),
            expanded: false,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn reason(&self) -> Option<&Reason> {
        self.reason.as_ref()
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn expand(&mut self) {
        self.expanded = true;
    }

    pub fn collapse(&mut self) {
        self.expanded = false;
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.members.contains_key(id)
    }

    pub fn member(&self, id: &NodeId) -> Option<&Node> {
        self.members.get(id)
    }

    pub fn member_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.members.get_mut(id)
    }

    pub fn members(&self) -> impl Iterator<Item = &Node> {
        self.members.values()
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.members.keys()
    }

    pub fn internal_edges(&self) -> impl Iterator<Item = &Edge> {
        self.internal.values()
    }

    pub fn has_internal_edge(&self, id: &EdgeId) -> bool {
        self.internal.contains_key(id)
    }

    pub fn inbound_edge_ids(&self) -> impl Iterator<Item = &EdgeId> {
        self.inbound.keys()
    }

    pub fn outbound_edge_ids(&self) -> impl Iterator<Item = &EdgeId> {
        self.outbound.keys()
    }

    /// Inbound boundary edges landing on `member`.
    pub fn inbound_edges_to<'a>(&'a self, member: &'a NodeId) -> impl Iterator<Item = &'a EdgeId> {
        self.inbound
            .iter()
            .filter(move |(_, target)| *target == member)
            .map(|(id, _)| id)
    }

    /// Boundary edge counts; internal edges are invisible from outside.
    pub fn counters(&self) -> Counters {
        Counters {
            inbound: self.inbound.len(),
            outbound: self.outbound.len(),
        }
    }

    /// Take ownership of a node. Its counters restart at zero and are rebuilt
    /// as the caller reclassifies the node's edges.
    pub fn absorb(&mut self, mut node: Node) {
        node.inbound = 0;
        node.outbound = 0;
        debug!("{} absorbs {}", self.id, node.id);
        self.members.insert(node.id.clone(), node);
    }

    /// Drop a member whose edges have already been removed.
    pub fn remove_member(&mut self, id: &NodeId) -> Option<Node> {
        let node = self.members.remove(id)?;
        if let Some(refs) = self.out_reference.remove(id) {
            for edge_id in refs {
                self.outbound.remove(&edge_id);
                self.internal.remove(&edge_id);
            }
        }
        self.inbound.retain(|_, target| target != id);
        self.internal
            .retain(|_, edge| edge.origin.source != *id && edge.origin.target != *id);
        Some(node)
    }

    /// Record an edge whose true source is a member.
    pub fn insert_outbound_edge(&mut self, mut edge: Edge) -> Placement {
        let member = edge.origin.source.clone();
        self.bump(&member, |n| n.outbound += 1);
        self.out_reference
            .entry(member.clone())
            .or_default()
            .insert(edge.id.clone());

        if self.inbound.remove(&edge.id).is_some() {
            debug!("{}: edge {} became internal", self.id, edge.id);
            edge.restore();
            self.internal.insert(edge.id.clone(), edge);
            return Placement::Internal;
        }

        edge.source = self.id.clone();
        self.outbound.insert(edge.id.clone(), member);
        Placement::Boundary(edge)
    }

    /// Record an edge whose true target is a member.
    pub fn insert_inbound_edge(&mut self, mut edge: Edge) -> Placement {
        let member = edge.origin.target.clone();
        self.bump(&member, |n| n.inbound += 1);

        if self.outbound.remove(&edge.id).is_some() {
            debug!("{}: edge {} became internal", self.id, edge.id);
            edge.restore();
            self.internal.insert(edge.id.clone(), edge);
            return Placement::Internal;
        }

        edge.target = self.id.clone();
        self.inbound.insert(edge.id.clone(), member);
        Placement::Boundary(edge)
    }

    /// Detach the source side of an edge whose true source is a member.
    ///
    /// An internal edge is demoted to an inbound boundary edge with its source
    /// restored, rather than dropped.
    pub fn remove_outbound_edge(&mut self, id: &EdgeId) -> Detachment {
        if let Some(member) = self.outbound.remove(id) {
            self.bump(&member, |n| n.outbound = n.outbound.saturating_sub(1));
            self.forget_reference(&member, id);
            return Detachment::Removed;
        }

        match self.internal.remove(id) {
            Some(mut edge) => {
                let source = edge.origin.source.clone();
                self.bump(&source, |n| n.outbound = n.outbound.saturating_sub(1));
                self.forget_reference(&source, id);
                edge.target = self.id.clone();
                self.inbound.insert(id.clone(), edge.origin.target.clone());
                Detachment::Demoted(edge)
            }
            None => Detachment::Missing,
        }
    }

    /// Detach the target side of an edge whose true target is a member.
    ///
    /// An internal edge is demoted to an outbound boundary edge with its target
    /// restored, rather than dropped.
    pub fn remove_inbound_edge(&mut self, id: &EdgeId) -> Detachment {
        if let Some(member) = self.inbound.remove(id) {
            self.bump(&member, |n| n.inbound = n.inbound.saturating_sub(1));
            return Detachment::Removed;
        }

        match self.internal.remove(id) {
            Some(mut edge) => {
                let target = edge.origin.target.clone();
                self.bump(&target, |n| n.inbound = n.inbound.saturating_sub(1));
                edge.source = self.id.clone();
                self.outbound.insert(id.clone(), edge.origin.source.clone());
                Detachment::Demoted(edge)
            }
            None => Detachment::Missing,
        }
    }

    /// Remove every outbound and internal edge whose true source is `member`.
    pub fn remove_outbound_edges_from_node(&mut self, member: &NodeId) -> Vec<Severed> {
        let Some(refs) = self.out_reference.remove(member) else {
            return Vec::new();
        };

        let mut severed = Vec::with_capacity(refs.len());
        for id in refs {
            if self.outbound.remove(&id).is_some() {
                self.bump(member, |n| n.outbound = n.outbound.saturating_sub(1));
                severed.push(Severed::Boundary(id));
            } else if let Some(edge) = self.internal.remove(&id) {
                self.bump(member, |n| n.outbound = n.outbound.saturating_sub(1));
                let target = edge.origin.target.clone();
                self.bump(&target, |n| n.inbound = n.inbound.saturating_sub(1));
                severed.push(Severed::Internal(edge));
            }
        }
        debug!("{}: severed {} edges from {}", self.id, severed.len(), member);
        severed
    }

    /// Break the community apart, handing back everything it holds.
    pub fn get_dissolve_info(self) -> DissolveInfo {
        DissolveInfo {
            id: self.id,
            members: self.members.into_values().collect(),
            internal_edges: self
                .internal
                .into_values()
                .map(|mut e| {
                    e.restore();
                    e
                })
                .collect(),
            inbound_edges: self.inbound.into_keys().collect(),
            outbound_edges: self.outbound.into_keys().collect(),
        }
    }

    fn bump(&mut self, member: &NodeId, f: impl FnOnce(&mut Node)) {
        match self.members.get_mut(member) {
            Some(node) => f(node),
            None => debug!("{}: {} is not a member", self.id, member),
        }
    }

    fn forget_reference(&mut self, member: &NodeId, id: &EdgeId) {
        if let Some(refs) = self.out_reference.get_mut(member) {
            refs.remove(id);
            if refs.is_empty() {
                self.out_reference.remove(member);
            }
        }
    }
}
