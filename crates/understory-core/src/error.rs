//! Error taxonomy shared by the engine crates

use crate::model::{EdgeId, NodeId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required construction dependency is missing or a setting is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// An edge names a node that is neither rendered nor absorbed.
    #[error("edge {edge} references unknown node {node}")]
    Integrity { edge: EdgeId, node: NodeId },

    #[error("unknown entity {0}")]
    UnknownEntity(String),

    #[error("{0} is not a community")]
    NotACommunity(NodeId),

    #[error("none of the requested ids is a plain node")]
    EmptyCommunity,
}
