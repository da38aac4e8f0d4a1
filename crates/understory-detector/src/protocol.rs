//! Command/response envelopes exchanged between the engine and the detector

use serde::{Deserialize, Serialize};
use understory_core::NodeId;

use crate::error::DetectorError;

/// Engine -> detector message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Command {
    /// (Re)initialise the detector with an empty mirror.
    Construct {
        #[serde(default)]
        init: serde_json::Value,
    },
    InsertEdge { source: NodeId, target: NodeId },
    DeleteEdge { source: NodeId, target: NodeId },
    GetCommunity {
        limit: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        focus: Option<NodeId>,
    },
}

impl Command {
    pub fn name(&self) -> CommandName {
        match self {
            Command::Construct { .. } => CommandName::Construct,
            Command::InsertEdge { .. } => CommandName::InsertEdge,
            Command::DeleteEdge { .. } => CommandName::DeleteEdge,
            Command::GetCommunity { .. } => CommandName::GetCommunity,
        }
    }

    /// Whether the detector answers this command at all.
    pub fn expects_response(&self) -> bool {
        matches!(self, Command::Construct { .. } | Command::GetCommunity { .. })
    }

    pub fn from_json(text: &str) -> Result<Self, DetectorError> {
        serde_json::from_str(text).map_err(|e| DetectorError::Malformed {
            message: e.to_string(),
        })
    }
}

/// Correlates a response with the command that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandName {
    Construct,
    InsertEdge,
    DeleteEdge,
    GetCommunity,
}

/// Payload of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Constructed { ok: bool },
    /// Ids to collapse; empty when no group improves modularity.
    Community(Vec<NodeId>),
}

/// Detector -> engine envelope: `{cmd, result?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub cmd: CommandName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DetectorError>,
}

impl Response {
    pub fn ok(cmd: CommandName, outcome: Outcome) -> Self {
        Response {
            cmd,
            result: Some(outcome),
            error: None,
        }
    }

    pub fn failed(cmd: CommandName, error: DetectorError) -> Self {
        Response {
            cmd,
            result: None,
            error: Some(error),
        }
    }

    /// `error` short-circuits `result`; an envelope carrying neither is malformed.
    pub fn into_result(self) -> Result<Outcome, DetectorError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.result.ok_or_else(|| DetectorError::Malformed {
            message: format!("{:?} response carries neither result nor error", self.cmd),
        })
    }

    pub fn from_json(text: &str) -> Result<Self, DetectorError> {
        serde_json::from_str(text).map_err(|e| DetectorError::Malformed {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd = Command::GetCommunity {
            limit: 6,
            focus: Some(NodeId::from("c1")),
        };
        insta::assert_snapshot!(
            serde_json::to_string(&cmd).unwrap(),
            @r#"{"cmd":"getCommunity","limit":6,"focus":"c1"}"#
        );

        let unfocused = Command::GetCommunity { limit: 2, focus: None };
        insta::assert_snapshot!(
            serde_json::to_string(&unfocused).unwrap(),
            @r#"{"cmd":"getCommunity","limit":2}"#
        );
    }

    #[test]
    fn test_command_round_trip_from_json() {
        let cmd = Command::from_json(r#"{"cmd":"insertEdge","source":"a","target":"b"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::InsertEdge {
                source: NodeId::from("a"),
                target: NodeId::from("b"),
            }
        );
        assert_eq!(cmd.name(), CommandName::InsertEdge);
        assert!(!cmd.expects_response());

        let construct = Command::from_json(r#"{"cmd":"construct"}"#).unwrap();
        assert!(construct.expects_response());
    }

    #[test]
    fn test_malformed_command() {
        let err = Command::from_json(r#"{"cmd":"explode"}"#).unwrap_err();
        assert!(matches!(err, DetectorError::Malformed { .. }));
    }

    #[test]
    fn test_response_envelopes() {
        let ok = Response::ok(
            CommandName::GetCommunity,
            Outcome::Community(vec![NodeId::from("a"), NodeId::from("b")]),
        );
        insta::assert_snapshot!(
            serde_json::to_string(&ok).unwrap(),
            @r#"{"cmd":"getCommunity","result":["a","b"]}"#
        );

        let failed = Response::failed(
            CommandName::GetCommunity,
            DetectorError::UnreachableFocus {
                focus: NodeId::from("d"),
                unreachable: NodeId::from("a"),
            },
        );
        insta::assert_snapshot!(
            serde_json::to_string(&failed).unwrap(),
            @r#"{"cmd":"getCommunity","error":{"kind":"unreachableFocus","focus":"d","unreachable":"a"}}"#
        );
    }

    #[test]
    fn test_error_short_circuits_result() {
        let both = Response {
            cmd: CommandName::GetCommunity,
            result: Some(Outcome::Community(vec![])),
            error: Some(DetectorError::ChannelClosed),
        };
        assert_eq!(both.into_result(), Err(DetectorError::ChannelClosed));

        let neither = Response::from_json(r#"{"cmd":"getCommunity"}"#).unwrap();
        assert!(matches!(neither.into_result(), Err(DetectorError::Malformed { .. })));

        let constructed = Response::from_json(r#"{"cmd":"construct","result":{"ok":true}}"#).unwrap();
        assert_eq!(constructed.into_result(), Ok(Outcome::Constructed { ok: true }));
    }
}
