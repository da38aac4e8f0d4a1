//! Detector actor and the handle the engine talks to it through

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use understory_core::NodeId;

use crate::error::DetectorError;
use crate::modularity::ModularityJoiner;
use crate::protocol::{Command, Outcome, Response};

/// Engine-side end of the command channel. Sends never block.
#[derive(Debug, Clone)]
pub struct DetectorHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl DetectorHandle {
    pub fn send(&self, command: Command) -> Result<(), DetectorError> {
        self.commands
            .send(command)
            .map_err(|_| DetectorError::ChannelClosed)
    }

    pub fn construct(&self) -> Result<(), DetectorError> {
        self.send(Command::Construct {
            init: serde_json::Value::Null,
        })
    }

    pub fn insert_edge(&self, source: &NodeId, target: &NodeId) -> Result<(), DetectorError> {
        self.send(Command::InsertEdge {
            source: source.clone(),
            target: target.clone(),
        })
    }

    pub fn delete_edge(&self, source: &NodeId, target: &NodeId) -> Result<(), DetectorError> {
        self.send(Command::DeleteEdge {
            source: source.clone(),
            target: target.clone(),
        })
    }

    pub fn get_community(&self, limit: usize, focus: Option<&NodeId>) -> Result<(), DetectorError> {
        self.send(Command::GetCommunity {
            limit,
            focus: focus.cloned(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Owns the joiner and its mirror; nothing else touches them.
#[derive(Debug)]
pub struct DetectorWorker {
    joiner: ModularityJoiner,
    commands: mpsc::UnboundedReceiver<Command>,
    responses: mpsc::UnboundedSender<Response>,
}

/// Create a connected handle, worker, and response receiver.
pub fn channel() -> (DetectorHandle, DetectorWorker, mpsc::UnboundedReceiver<Response>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (response_tx, response_rx) = mpsc::unbounded_channel();
    let worker = DetectorWorker {
        joiner: ModularityJoiner::new(),
        commands: command_rx,
        responses: response_tx,
    };
    (DetectorHandle { commands: command_tx }, worker, response_rx)
}

impl DetectorWorker {
    pub fn joiner(&self) -> &ModularityJoiner {
        &self.joiner
    }

    /// Apply one command. Edge notifications produce no response.
    pub fn handle(&mut self, command: Command) -> Option<Response> {
        let name = command.name();
        match command {
            Command::Construct { .. } => {
                self.joiner.reset();
                Some(Response::ok(name, Outcome::Constructed { ok: true }))
            }
            Command::InsertEdge { source, target } => {
                self.joiner.insert_edge(&source, &target);
                None
            }
            Command::DeleteEdge { source, target } => {
                self.joiner.delete_edge(&source, &target);
                None
            }
            Command::GetCommunity { limit, focus } => {
                let response = match self.joiner.get_community(limit, focus.as_ref()) {
                    Ok(found) => {
                        let ids = found.unwrap_or_default();
                        debug!("detector proposes {} nodes", ids.len());
                        Response::ok(name, Outcome::Community(ids))
                    }
                    Err(e) => {
                        warn!("Community detection failed: {}", e);
                        Response::failed(name, e)
                    }
                };
                Some(response)
            }
        }
    }

    /// Drain every queued command without waiting. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(command) = self.commands.try_recv() {
            handled += 1;
            if let Some(response) = self.handle(command) {
                if self.responses.send(response).is_err() {
                    debug!("Response receiver dropped");
                }
            }
        }
        handled
    }

    /// Serve commands until every handle is dropped.
    pub async fn run(mut self) {
        info!("Detector worker started");
        while let Some(command) = self.commands.recv().await {
            if let Some(response) = self.handle(command) {
                if self.responses.send(response).is_err() {
                    debug!("Response receiver dropped; stopping detector");
                    break;
                }
            }
        }
        info!("Detector worker stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
