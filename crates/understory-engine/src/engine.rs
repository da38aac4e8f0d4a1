//! The coarsening engine: the rendered working set, its communities, and the
//! bookkeeping that keeps the detector's mirror in step with it.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, info, warn};
use understory_core::{
    Bucketer, Community, Counters, Detachment, Edge, EdgeId, EdgeRecord, EngineConfig, Error, Node,
    NodeId, NodePage, NodeRecord, Placement, Reason, Result, Severed, Visible,
};
use understory_detector::{CommandName, DetectorError, DetectorHandle, Outcome, Response};

/// Where one end of an edge currently lives.
#[derive(Debug, Clone, PartialEq)]
enum Endpoint {
    Plain,
    Member(NodeId),
}

/// What `check_node_limit` did about the rendered load.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitCheck {
    /// Load already fits.
    Within,
    /// Collapsing expanded communities was enough.
    Relieved(Vec<NodeId>),
    /// A `getCommunity` request went out.
    Requested,
    /// A request is already outstanding; this one was dropped.
    Pending,
    /// The detector could not be reached.
    Unavailable,
}

/// Result of `explore` on a visible entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Exploration {
    /// A plain node needs its page loaded; hand it to `apply_fetch`.
    FetchRequired(NodeId),
    /// A community was opened.
    Expanded(LimitCheck),
    Collapsed,
}

/// How a detector response was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Collapsed(NodeId),
    /// Nothing worth collapsing.
    Empty,
    /// The focus was unreachable; asked again without one.
    Retried,
    /// The proposed ids no longer name at least two plain nodes.
    Discarded,
    Failed(DetectorError),
    Ignored,
}

#[derive(Debug, Clone)]
struct JoinRequest {
    focus: Option<NodeId>,
}

#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    detector: Option<DetectorHandle>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn detector(mut self, detector: DetectorHandle) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let detector = self
            .detector
            .ok_or_else(|| Error::Configuration("a detector handle is required".into()))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;
        detector
            .construct()
            .map_err(|e| Error::Configuration(format!("detector unavailable: {}", e)))?;

        info!(
            "Engine ready (node limit {}, child limit {})",
            config.node_limit, config.child_limit
        );
        Ok(Engine {
            bucketer: Bucketer::from_config(&config),
            config,
            entities: BTreeMap::new(),
            edges: BTreeMap::new(),
            incident: HashMap::new(),
            membership: HashMap::new(),
            detector,
            join: None,
            next_community: 0,
        })
    }
}

/// Owns every rendered node and edge.
///
/// Plain nodes and communities live side by side in `entities`. Every edge
/// with at least one visible end is in `edges`, re-pointed at the community
/// for any absorbed end; edges with both ends in one community are held by
/// that community instead. Only edges between two plain nodes are mirrored to
/// the detector.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    bucketer: Bucketer,
    entities: BTreeMap<NodeId, Visible>,
    edges: BTreeMap<EdgeId, Edge>,
    /// True endpoint -> rendered edges starting or ending there.
    incident: HashMap<NodeId, BTreeSet<EdgeId>>,
    /// Absorbed node -> owning community.
    membership: HashMap<NodeId, NodeId>,
    detector: DetectorHandle,
    join: Option<JoinRequest>,
    next_community: u64,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn node_limit(&self) -> usize {
        self.config.node_limit
    }

    pub fn child_limit(&self) -> usize {
        self.config.child_limit
    }

    /// Visible shapes plus the members shown by expanded communities.
    pub fn load(&self) -> usize {
        self.entities.values().map(Visible::load).sum()
    }

    pub fn is_join_pending(&self) -> bool {
        self.join.is_some()
    }

    pub fn entity(&self, id: &NodeId) -> Option<&Visible> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Visible> {
        self.entities.values()
    }

    pub fn visible_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.entities.keys()
    }

    /// A node by id, whether plain or absorbed.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        match self.membership.get(id) {
            Some(cid) => self.community(cid).and_then(|c| c.member(id)),
            None => self.entities.get(id).and_then(Visible::as_plain),
        }
    }

    pub fn community(&self, id: &NodeId) -> Option<&Community> {
        self.entities.get(id).and_then(Visible::as_community)
    }

    pub fn communities(&self) -> impl Iterator<Item = &Community> {
        self.entities.values().filter_map(Visible::as_community)
    }

    pub fn community_of(&self, member: &NodeId) -> Option<&NodeId> {
        self.membership.get(member)
    }

    pub fn is_plain(&self, id: &NodeId) -> bool {
        self.entities.get(id).is_some_and(Visible::is_plain)
    }

    /// Counters of a visible entity or of an absorbed member.
    pub fn counters(&self, id: &NodeId) -> Option<Counters> {
        match self.entities.get(id) {
            Some(entity) => Some(entity.counters()),
            None => self.node(id).map(Node::counters),
        }
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Rendered top-level edges.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Every node id held anywhere, plain or absorbed.
    pub fn known_node_ids(&self) -> BTreeSet<NodeId> {
        self.entities
            .values()
            .flat_map(|e| match e {
                Visible::Plain(n) => vec![n.id.clone()],
                Visible::Community(c) => c.member_ids().cloned().collect(),
            })
            .collect()
    }

    /// Every edge id held anywhere, rendered or internal to a community.
    pub fn known_edge_ids(&self) -> BTreeSet<EdgeId> {
        self.edges
            .keys()
            .cloned()
            .chain(self.communities().flat_map(|c| c.internal_edges().map(|e| e.id.clone())))
            .collect()
    }

    // ── Insertion and removal ───────────────────────────────────────────

    /// Add a plain node. Returns false if the id is already known.
    pub fn insert_node(&mut self, record: NodeRecord) -> bool {
        if self.entities.contains_key(&record.id) || self.membership.contains_key(&record.id) {
            return false;
        }
        debug!("insert node {}", record.id);
        self.entities
            .insert(record.id.clone(), Visible::Plain(Node::from(record)));
        true
    }

    /// Add an edge between two known nodes. Returns false if the id is
    /// already known; fails without side effects if an endpoint is not.
    pub fn insert_edge(&mut self, record: EdgeRecord) -> Result<bool> {
        if self.knows_edge(&record.id) {
            return Ok(false);
        }
        let source = self.locate(&record.source).ok_or_else(|| Error::Integrity {
            edge: record.id.clone(),
            node: record.source.clone(),
        })?;
        let target = self.locate(&record.target).ok_or_else(|| Error::Integrity {
            edge: record.id.clone(),
            node: record.target.clone(),
        })?;
        debug!("insert edge {} ({} -> {})", record.id, record.source, record.target);
        self.place_edge(Edge::from(record), source, target);
        Ok(true)
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<()> {
        if self.detach_edge(id).is_some() {
            debug!("removed edge {}", id);
            return Ok(());
        }

        let owner = self
            .communities()
            .find(|c| c.has_internal_edge(id))
            .map(|c| c.id().clone())
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))?;
        let community = self.community_entry(&owner)?;
        // An internal edge is demoted to the boundary first, then dropped there.
        if let Detachment::Demoted(_) = community.remove_outbound_edge(id) {
            community.remove_inbound_edge(id);
        }
        debug!("removed internal edge {} of {}", id, owner);
        Ok(())
    }

    /// Remove a plain node, an absorbed member, or a whole community with
    /// every node it holds.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<()> {
        if let Some(owner) = self.membership.get(id).cloned() {
            return self.remove_member(&owner, id);
        }

        match self.entities.get(id) {
            Some(Visible::Plain(_)) => {
                for edge_id in self.edges_touching(id) {
                    self.detach_edge(&edge_id);
                }
                self.entities.remove(id);
                info!("removed node {}", id);
                Ok(())
            }
            Some(Visible::Community(_)) => {
                let members = self.dissolve_community(id)?;
                for member in &members {
                    self.remove_node(member)?;
                }
                info!("removed community {} with {} members", id, members.len());
                Ok(())
            }
            None => Err(Error::UnknownEntity(id.to_string())),
        }
    }

    fn remove_member(&mut self, owner: &NodeId, id: &NodeId) -> Result<()> {
        let severed = self.community_entry(owner)?.remove_outbound_edges_from_node(id);
        for cut in severed {
            match cut {
                Severed::Boundary(edge_id) => {
                    self.detach_edge(&edge_id);
                }
                Severed::Internal(edge) => debug!("dropped internal edge {} of {}", edge.id, owner),
            }
        }

        let (inbound, internal): (Vec<EdgeId>, Vec<EdgeId>) = match self.community(owner) {
            Some(c) => (
                c.inbound_edges_to(id).cloned().collect(),
                c.internal_edges()
                    .filter(|e| e.origin.target == *id)
                    .map(|e| e.id.clone())
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        for edge_id in &inbound {
            self.detach_edge(edge_id);
        }
        for edge_id in &internal {
            self.remove_edge(edge_id)?;
        }

        let community = self.community_entry(owner)?;
        community.remove_member(id);
        let emptied = community.is_empty();
        self.membership.remove(id);
        if emptied {
            self.entities.remove(owner);
            info!("community {} lost its last member", owner);
        }
        debug!("removed member {} of {}", id, owner);
        Ok(())
    }

    // ── Communities ─────────────────────────────────────────────────────

    /// Fold the given plain nodes into a new community. Ids that are not
    /// currently plain are skipped.
    pub fn collapse_community(&mut self, ids: &[NodeId], reason: Option<Reason>) -> Result<NodeId> {
        let members: BTreeSet<NodeId> = ids.iter().filter(|id| self.is_plain(id)).cloned().collect();
        if members.is_empty() {
            return Err(Error::EmptyCommunity);
        }
        if members.len() < ids.len() {
            debug!("skipping {} ids that are not plain", ids.len() - members.len());
        }

        let touching: BTreeSet<EdgeId> = members
            .iter()
            .filter_map(|id| self.incident.get(id))
            .flatten()
            .cloned()
            .collect();
        let detached: Vec<Edge> = touching.iter().filter_map(|id| self.detach_edge(id)).collect();

        let cid = self.fresh_community_id();
        let mut community = Community::new(cid.clone(), reason);
        for id in &members {
            if let Some(Visible::Plain(node)) = self.entities.remove(id) {
                community.absorb(node);
                self.membership.insert(id.clone(), cid.clone());
            }
        }
        self.entities.insert(cid.clone(), Visible::Community(community));

        for edge in detached {
            self.reattach_edge(edge);
        }
        info!("collapsed {} nodes into {}", members.len(), cid);
        Ok(cid)
    }

    /// The next `*community_<n>` id not already taken by a node.
    fn fresh_community_id(&mut self) -> NodeId {
        loop {
            self.next_community += 1;
            let cid = NodeId::new(format!("*community_{}", self.next_community));
            if !self.entities.contains_key(&cid) && !self.membership.contains_key(&cid) {
                return cid;
            }
        }
    }

    /// Put a community's members back on the canvas as plain nodes. Returns
    /// the restored member ids.
    pub fn dissolve_community(&mut self, id: &NodeId) -> Result<Vec<NodeId>> {
        match self.entities.get(id) {
            Some(Visible::Community(_)) => {}
            Some(Visible::Plain(_)) => return Err(Error::NotACommunity(id.clone())),
            None => return Err(Error::UnknownEntity(id.to_string())),
        }
        let Some(Visible::Community(community)) = self.entities.remove(id) else {
            return Err(Error::NotACommunity(id.clone()));
        };
        let info = community.get_dissolve_info();

        let mut restored = Vec::with_capacity(info.members.len());
        for node in info.members {
            self.membership.remove(&node.id);
            restored.push(node.id.clone());
            self.entities.insert(node.id.clone(), Visible::Plain(node));
        }

        for edge_id in info.outbound_edges {
            if let Some(edge) = self.edges.get_mut(&edge_id) {
                edge.source = edge.origin.source.clone();
                if edge.is_restored() {
                    self.notify_insert(&edge_id);
                }
            }
        }
        for edge_id in info.inbound_edges {
            if let Some(edge) = self.edges.get_mut(&edge_id) {
                edge.target = edge.origin.target.clone();
                if edge.is_restored() {
                    self.notify_insert(&edge_id);
                }
            }
        }
        for edge in info.internal_edges {
            let edge_id = edge.id.clone();
            self.render(edge);
            self.notify_insert(&edge_id);
        }

        info!("dissolved {} into {} nodes", id, restored.len());
        Ok(restored)
    }

    /// Open a collapsed community, then bring the load back under budget
    /// without closing it again.
    pub fn expand_community(&mut self, id: &NodeId) -> Result<LimitCheck> {
        let community = self.community_entry(id)?;
        community.expand();
        debug!("expanded {}", id);
        Ok(self.check_node_limit(Some(id)))
    }

    // ── Budget ──────────────────────────────────────────────────────────

    /// Bring the load back under `node_limit`.
    ///
    /// Expanded communities other than `focus` are closed largest first.
    /// Only when none is left is the detector asked for a group; at most one
    /// such request is outstanding.
    pub fn check_node_limit(&mut self, focus: Option<&NodeId>) -> LimitCheck {
        let limit = self.config.node_limit;
        let mut closed = Vec::new();

        while self.load() > limit {
            let largest = self
                .communities()
                .filter(|c| c.is_expanded() && Some(c.id()) != focus)
                .max_by_key(|c| (c.size(), Reverse(c.id().clone())))
                .map(|c| c.id().clone());
            let Some(cid) = largest else {
                break;
            };
            if let Some(entity) = self.entities.get_mut(&cid) {
                entity.set_expanded(false);
            }
            info!("closed {} to relieve the load", cid);
            closed.push(cid);
        }

        if self.load() <= limit {
            return if closed.is_empty() {
                LimitCheck::Within
            } else {
                LimitCheck::Relieved(closed)
            };
        }
        if self.join.is_some() {
            debug!("community request already outstanding");
            return LimitCheck::Pending;
        }

        let focus = focus.filter(|f| self.is_plain(f)).cloned();
        match self.detector.get_community(limit, focus.as_ref()) {
            Ok(()) => {
                info!("load {} exceeds {}; requesting a community", self.load(), limit);
                self.join = Some(JoinRequest { focus });
                LimitCheck::Requested
            }
            Err(e) => {
                warn!("Cannot reach detector: {}", e);
                LimitCheck::Unavailable
            }
        }
    }

    pub fn set_node_limit(&mut self, limit: usize) -> Result<LimitCheck> {
        if limit == 0 {
            return Err(Error::Configuration("node limit must be positive".into()));
        }
        self.config.node_limit = limit;
        Ok(self.check_node_limit(None))
    }

    pub fn set_child_limit(&mut self, limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(Error::Configuration("child limit must be positive".into()));
        }
        self.config.child_limit = limit;
        Ok(())
    }

    /// Apply one detector response.
    pub fn handle_response(&mut self, response: Response) -> Applied {
        if response.cmd != CommandName::GetCommunity {
            if let Some(e) = &response.error {
                warn!("Detector failed {:?}: {}", response.cmd, e);
            }
            return Applied::Ignored;
        }
        let Some(request) = self.join.take() else {
            warn!("Discarding unsolicited community response");
            return Applied::Ignored;
        };

        match response.into_result() {
            Err(DetectorError::UnreachableFocus { focus, unreachable }) => {
                warn!("{} is unreachable from {}; retrying without focus", unreachable, focus);
                match self.detector.get_community(self.config.node_limit, None) {
                    Ok(()) => {
                        self.join = Some(JoinRequest { focus: None });
                        Applied::Retried
                    }
                    Err(e) => {
                        warn!("Cannot reach detector: {}", e);
                        Applied::Failed(e)
                    }
                }
            }
            Err(e) => {
                warn!("Community detection failed: {}", e);
                Applied::Failed(e)
            }
            Ok(Outcome::Community(ids)) if ids.is_empty() => {
                debug!("detector found nothing to collapse");
                Applied::Empty
            }
            Ok(Outcome::Community(ids)) => {
                let plain = ids.iter().filter(|id| self.is_plain(id)).count();
                if plain < 2 {
                    warn!("Discarding stale community of {} ids ({} plain)", ids.len(), plain);
                    self.check_node_limit(request.focus.as_ref());
                    return Applied::Discarded;
                }
                match self.collapse_community(&ids, Some(Reason::Modularity)) {
                    Ok(cid) => {
                        self.check_node_limit(request.focus.as_ref());
                        Applied::Collapsed(cid)
                    }
                    Err(e) => {
                        warn!("Could not collapse proposed community: {}", e);
                        Applied::Discarded
                    }
                }
            }
            Ok(Outcome::Constructed { .. }) => Applied::Ignored,
        }
    }

    /// Drop the outstanding request without an answer.
    pub fn abandon_request(&mut self) {
        if self.join.take().is_some() {
            warn!("Abandoning outstanding community request");
        }
    }

    // ── Exploration ─────────────────────────────────────────────────────

    /// Toggle a visible entity between expanded and collapsed.
    pub fn explore(&mut self, id: &NodeId) -> Result<Exploration> {
        let (plain, expanded) = match self.entities.get(id) {
            Some(entity) => (entity.is_plain(), entity.is_expanded()),
            None => return Err(Error::UnknownEntity(id.to_string())),
        };
        match (plain, expanded) {
            (true, false) => Ok(Exploration::FetchRequired(id.clone())),
            (true, true) => {
                self.collapse_node(id);
                Ok(Exploration::Collapsed)
            }
            (false, false) => Ok(Exploration::Expanded(self.expand_community(id)?)),
            (false, true) => {
                self.community_entry(id)?.collapse();
                debug!("closed {}", id);
                Ok(Exploration::Collapsed)
            }
        }
    }

    /// Merge a loaded page under `origin`: the node itself, its children,
    /// and the edges between them. Only children that were not known before
    /// are bucketed; every bucket with more than one node becomes a
    /// community. Returns the communities created.
    pub fn apply_fetch(&mut self, origin: &NodeId, page: NodePage) -> Result<Vec<NodeId>> {
        if let Some(record) = page.node {
            self.insert_node(record);
        }
        if !self.entities.contains_key(origin) && !self.membership.contains_key(origin) {
            return Err(Error::UnknownEntity(origin.to_string()));
        }

        let fresh: Vec<NodeRecord> = page
            .children
            .into_iter()
            .filter(|child| self.insert_node(child.clone()))
            .collect();
        for record in page.edges {
            if let Err(e) = self.insert_edge(record) {
                warn!("Skipping edge: {}", e);
            }
        }

        let mut created = Vec::new();
        for bucket in self.bucketer.bucket(&fresh, self.config.child_limit) {
            if bucket.nodes.len() > 1 {
                created.push(self.collapse_community(&bucket.nodes, Some(bucket.reason))?);
            }
        }

        if let Some(entity) = self.entities.get_mut(origin) {
            if entity.is_plain() {
                entity.set_expanded(true);
            }
        }
        info!(
            "loaded {}: {} new children, {} grouped",
            origin,
            fresh.len(),
            created.len()
        );
        Ok(created)
    }

    /// Close an expanded plain node: drop its outbound edges and everything
    /// that becomes unreachable because of it.
    pub fn collapse_node(&mut self, id: &NodeId) {
        let mut seen = HashSet::from([id.clone()]);
        self.cascade_from(id, &mut seen);
        if let Some(entity) = self.entities.get_mut(id) {
            entity.set_expanded(false);
        }
    }

    fn cascade_from(&mut self, id: &NodeId, seen: &mut HashSet<NodeId>) {
        let outgoing: Vec<EdgeId> = self
            .edges_touching(id)
            .into_iter()
            .filter(|edge_id| self.edges.get(edge_id).is_some_and(|e| e.origin.source == *id))
            .collect();

        for edge_id in outgoing {
            let Some(edge) = self.detach_edge(&edge_id) else {
                continue;
            };
            let target = edge.origin.target;
            match self.locate(&target) {
                Some(Endpoint::Plain) => {
                    let orphaned = self.counters(&target).is_some_and(|c| c.inbound == 0);
                    if orphaned && seen.insert(target.clone()) {
                        debug!("{} became unreachable", target);
                        self.cascade_from(&target, seen);
                        self.drop_quietly(&target);
                    }
                }
                Some(Endpoint::Member(cid)) => {
                    let orphaned = self.counters(&cid).is_some_and(|c| c.inbound == 0);
                    if orphaned && seen.insert(cid.clone()) {
                        debug!("{} became unreachable", cid);
                        let members = match self.dissolve_community(&cid) {
                            Ok(members) => members,
                            Err(e) => {
                                warn!("Could not dissolve {}: {}", cid, e);
                                continue;
                            }
                        };
                        for member in members {
                            if self.entities.contains_key(&member) {
                                seen.insert(member.clone());
                                self.cascade_from(&member, seen);
                                self.drop_quietly(&member);
                            }
                        }
                    }
                }
                None => {}
            }
        }
    }

    fn drop_quietly(&mut self, id: &NodeId) {
        if let Err(e) = self.remove_node(id) {
            debug!("{} already gone: {}", id, e);
        }
    }

    // ── Edge bookkeeping ────────────────────────────────────────────────

    fn knows_edge(&self, id: &EdgeId) -> bool {
        self.edges.contains_key(id) || self.communities().any(|c| c.has_internal_edge(id))
    }

    fn locate(&self, id: &NodeId) -> Option<Endpoint> {
        if let Some(cid) = self.membership.get(id) {
            return Some(Endpoint::Member(cid.clone()));
        }
        self.entities
            .get(id)
            .filter(|e| e.is_plain())
            .map(|_| Endpoint::Plain)
    }

    fn community_entry(&mut self, id: &NodeId) -> Result<&mut Community> {
        match self.entities.get_mut(id) {
            Some(Visible::Community(c)) => Ok(c),
            Some(Visible::Plain(_)) => Err(Error::NotACommunity(id.clone())),
            None => Err(Error::UnknownEntity(id.to_string())),
        }
    }

    fn plain_entry(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.entities.get_mut(id).and_then(Visible::as_plain_mut)
    }

    /// Top-level edges whose true source or target is `id`.
    fn edges_touching(&self, id: &NodeId) -> Vec<EdgeId> {
        self.incident
            .get(id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn render(&mut self, edge: Edge) {
        for end in [&edge.origin.source, &edge.origin.target] {
            self.incident
                .entry(end.clone())
                .or_default()
                .insert(edge.id.clone());
        }
        self.edges.insert(edge.id.clone(), edge);
    }

    fn unrender(&mut self, id: &EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        for end in [&edge.origin.source, &edge.origin.target] {
            if let Some(ids) = self.incident.get_mut(end) {
                ids.remove(id);
                if ids.is_empty() {
                    self.incident.remove(end);
                }
            }
        }
        Some(edge)
    }

    /// Account for a new edge at both ends and render it unless it became
    /// internal to a community.
    fn place_edge(&mut self, mut edge: Edge, source: Endpoint, target: Endpoint) {
        match &source {
            Endpoint::Plain => {
                if let Some(node) = self.plain_entry(&edge.origin.source) {
                    node.outbound += 1;
                }
            }
            Endpoint::Member(cid) => {
                let Ok(community) = self.community_entry(cid) else {
                    return;
                };
                match community.insert_outbound_edge(edge) {
                    Placement::Boundary(e) => edge = e,
                    Placement::Internal => return,
                }
            }
        }

        match &target {
            Endpoint::Plain => {
                if let Some(node) = self.plain_entry(&edge.origin.target) {
                    node.inbound += 1;
                }
            }
            Endpoint::Member(cid) => {
                let Ok(community) = self.community_entry(cid) else {
                    return;
                };
                match community.insert_inbound_edge(edge) {
                    Placement::Boundary(e) => edge = e,
                    Placement::Internal => return,
                }
            }
        }

        if source == Endpoint::Plain && target == Endpoint::Plain {
            if let Err(e) = self.detector.insert_edge(&edge.origin.source, &edge.origin.target) {
                warn!("Detector missed edge {}: {}", edge.id, e);
            }
        }
        self.render(edge);
    }

    /// Re-place an edge taken out by `detach_edge`, resolving its ends anew.
    fn reattach_edge(&mut self, edge: Edge) {
        match (self.locate(&edge.origin.source), self.locate(&edge.origin.target)) {
            (Some(source), Some(target)) => self.place_edge(edge, source, target),
            _ => warn!("Dropping edge {} with a vanished endpoint", edge.id),
        }
    }

    /// Take a rendered edge out of the working set, undoing its counters and
    /// mirror entry. The returned edge has its endpoints restored.
    fn detach_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        let mut edge = self.unrender(id)?;
        if edge.is_restored() {
            if let Err(e) = self.detector.delete_edge(&edge.origin.source, &edge.origin.target) {
                warn!("Detector missed removal of {}: {}", id, e);
            }
        }

        match self.locate(&edge.origin.source) {
            Some(Endpoint::Plain) => {
                if let Some(node) = self.plain_entry(&edge.origin.source) {
                    node.outbound = node.outbound.saturating_sub(1);
                }
            }
            Some(Endpoint::Member(cid)) => {
                if let Ok(community) = self.community_entry(&cid) {
                    community.remove_outbound_edge(id);
                }
            }
            None => {}
        }
        match self.locate(&edge.origin.target) {
            Some(Endpoint::Plain) => {
                if let Some(node) = self.plain_entry(&edge.origin.target) {
                    node.inbound = node.inbound.saturating_sub(1);
                }
            }
            Some(Endpoint::Member(cid)) => {
                if let Ok(community) = self.community_entry(&cid) {
                    community.remove_inbound_edge(id);
                }
            }
            None => {}
        }

        edge.restore();
        Some(edge)
    }

    fn notify_insert(&self, id: &EdgeId) {
        if let Some(edge) = self.edges.get(id) {
            if let Err(e) = self.detector.insert_edge(&edge.origin.source, &edge.origin.target) {
                warn!("Detector missed edge {}: {}", id, e);
            }
        }
    }
}
