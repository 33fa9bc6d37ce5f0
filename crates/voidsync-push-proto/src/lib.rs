// SPDX-License-Identifier: Apache-2.0
//! Wire schema for the push channel (§4.9, §6): a tagged `{type, data}`
//! envelope carried over a persistent framed-text connection at `/ws`.
//!
//! Client-to-server and server-to-client messages share one envelope shape
//! so a single `serde_json` round-trip handles both directions; the `type`
//! tag selects the payload shape via serde's internally-tagged enum
//! representation.

use serde::{Deserialize, Serialize};
use voidsync_types::{Change, ChangeId, ChangeStatus};

/// A message sent from a client to the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Client-initiated half of the keep-alive handshake; the server
    /// replies with `Pong`.
    Ping,
    /// Subscribe this connection to `channel` (e.g. `"changes"`).
    Subscribe {
        /// Channel name.
        channel: String,
    },
    /// Unsubscribe this connection from `channel`.
    Unsubscribe {
        /// Channel name.
        channel: String,
    },
}

/// A message sent from the push channel to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Sent once, immediately after the connection is accepted.
    Connected {
        /// Server-assigned client id.
        client_id: String,
    },
    /// Acknowledges a successful `Subscribe`.
    Subscribed {
        /// Channel name.
        channel: String,
    },
    /// Acknowledges a successful `Unsubscribe`.
    Unsubscribed {
        /// Channel name.
        channel: String,
    },
    /// Fan-out notification that the change list has moved: a new
    /// submission, or a status transition that callers should reflect in a
    /// change listing. Carries the affected changes inline so observers need
    /// not immediately re-query.
    ChangesUpdated {
        /// The changes affected by whatever triggered this event.
        changes: Vec<Change>,
    },
    /// A single change's status transitioned.
    ChangeStatus {
        /// The change that transitioned.
        change_id: ChangeId,
        /// Its new status.
        status: ChangeStatus,
    },
    /// Reply to a client `Ping`, or the server's own keep-alive probe.
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_subscribe_round_trips_through_json() {
        let message = ClientMessage::Subscribe {
            channel: "changes".to_string(),
        };
        let json = serde_json::to_string(&message).expect("serializes");
        assert_eq!(json, r#"{"type":"Subscribe","data":{"channel":"changes"}}"#);
        let decoded: ClientMessage = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(decoded, message);
    }

    #[test]
    fn server_change_status_round_trips_through_json() {
        let message = ServerMessage::ChangeStatus {
            change_id: 42,
            status: ChangeStatus::Approved,
        };
        let json = serde_json::to_string(&message).expect("serializes");
        let decoded: ServerMessage = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(decoded, message);
    }

    #[test]
    fn pong_has_no_data_field_payload() {
        let json = serde_json::to_string(&ServerMessage::Pong).expect("serializes");
        assert_eq!(json, r#"{"type":"Pong"}"#);
    }
}
