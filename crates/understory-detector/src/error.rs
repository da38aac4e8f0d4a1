//! Detector failures, carried in the `error` field of a response envelope

use serde::{Deserialize, Serialize};
use understory_core::NodeId;

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DetectorError {
    #[error("detector channel is closed")]
    ChannelClosed,

    #[error("malformed detector message: {message}")]
    Malformed { message: String },

    /// Some candidate group cannot be reached from the focus node.
    #[error("{unreachable} cannot be reached from focus {focus}")]
    UnreachableFocus { focus: NodeId, unreachable: NodeId },
}
