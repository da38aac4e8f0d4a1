//! Async exploration: fetch pages, feed them to the engine, and wait out the
//! detector's answers.

use anyhow::Result;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use understory_core::{EdgeId, EdgeRecord, EngineConfig, NodeId, NodeRecord};
use understory_detector::{channel, Response};

use crate::engine::{Applied, Engine, Exploration, LimitCheck};
use crate::source::DataSource;

/// Start a detector worker on the current tokio runtime and build an engine
/// wired to it.
pub fn spawn_detector(
    config: EngineConfig,
) -> Result<(Engine, UnboundedReceiver<Response>, JoinHandle<()>)> {
    let (handle, worker, responses) = channel();
    let task = worker.spawn();
    let engine = Engine::builder().config(config).detector(handle).build()?;
    Ok((engine, responses, task))
}

pub struct Explorer<S> {
    engine: Engine,
    responses: UnboundedReceiver<Response>,
    source: S,
}

impl<S: DataSource> Explorer<S> {
    pub fn new(engine: Engine, responses: UnboundedReceiver<Response>, source: S) -> Self {
        Explorer {
            engine,
            responses,
            source,
        }
    }

    /// Spawn a detector and wrap a fresh engine around it.
    pub fn spawn(config: EngineConfig, source: S) -> Result<(Self, JoinHandle<()>)> {
        let (engine, responses, task) = spawn_detector(config)?;
        Ok((Self::new(engine, responses, source), task))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load the starting node and its first page.
    pub async fn load_root(&mut self, id: &NodeId) -> Result<()> {
        let page = self.source.load_node(id).await?;
        self.engine.apply_fetch(id, page)?;
        self.engine.check_node_limit(Some(id));
        self.settle().await;
        Ok(())
    }

    /// Expand or collapse a visible entity, fetching its page when needed.
    pub async fn explore(&mut self, id: &NodeId) -> Result<Exploration> {
        let exploration = self.engine.explore(id)?;
        if let Exploration::FetchRequired(target) = &exploration {
            let page = self.source.load_node(target).await?;
            self.engine.apply_fetch(target, page)?;
            let check = self.engine.check_node_limit(Some(target));
            debug!("after loading {}: {:?}", target, check);
        }
        self.settle().await;
        Ok(exploration)
    }

    pub async fn set_node_limit(&mut self, limit: usize) -> Result<LimitCheck> {
        let check = self.engine.set_node_limit(limit)?;
        self.settle().await;
        Ok(check)
    }

    pub fn set_child_limit(&mut self, limit: usize) -> Result<()> {
        Ok(self.engine.set_child_limit(limit)?)
    }

    pub async fn expand_community(&mut self, id: &NodeId) -> Result<LimitCheck> {
        let check = self.engine.expand_community(id)?;
        self.settle().await;
        Ok(check)
    }

    pub async fn dissolve_community(&mut self, id: &NodeId) -> Result<Vec<NodeId>> {
        let restored = self.engine.dissolve_community(id)?;
        self.engine.check_node_limit(None);
        self.settle().await;
        Ok(restored)
    }

    pub async fn insert_node(&mut self, record: NodeRecord) -> Result<bool> {
        let inserted = self.engine.insert_node(record);
        if inserted {
            self.engine.check_node_limit(None);
            self.settle().await;
        }
        Ok(inserted)
    }

    pub fn insert_edge(&mut self, record: EdgeRecord) -> Result<bool> {
        Ok(self.engine.insert_edge(record)?)
    }

    pub fn remove_node(&mut self, id: &NodeId) -> Result<()> {
        Ok(self.engine.remove_node(id)?)
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<()> {
        Ok(self.engine.remove_edge(id)?)
    }

    /// Apply detector responses until no community request is outstanding.
    pub async fn settle(&mut self) {
        while let Ok(response) = self.responses.try_recv() {
            self.apply(response);
        }
        while self.engine.is_join_pending() {
            match self.responses.recv().await {
                Some(response) => self.apply(response),
                None => {
                    warn!("Detector stopped answering");
                    self.engine.abandon_request();
                }
            }
        }
    }

    fn apply(&mut self, response: Response) {
        match self.engine.handle_response(response) {
            Applied::Collapsed(id) => info!("grouped nodes into {}", id),
            Applied::Failed(e) => warn!("Community request failed: {}", e),
            other => debug!("detector response: {:?}", other),
        }
    }
}
