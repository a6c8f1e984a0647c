//! Messages relayed between participants of a room

use crate::awareness::{ClientId, PresenceRecord};
use serde::{Deserialize, Serialize};

/// Messages fanned out by the room to every participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomMessage {
    /// Incremental automerge changes made by one participant
    DocUpdate {
        client_id: ClientId,
        data: Vec<u8>,
        /// Milliseconds since the epoch, stamped by the sender
        sent_at: i64,
    },

    /// New presence state of one participant; `None` when they left
    Presence {
        client_id: ClientId,
        state: Option<PresenceRecord>,
    },
}

impl RoomMessage {
    pub fn doc_update(client_id: ClientId, data: Vec<u8>) -> Self {
        RoomMessage::DocUpdate {
            client_id,
            data,
            sent_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Participant that produced the message
    pub fn sender(&self) -> ClientId {
        match self {
            RoomMessage::DocUpdate { client_id, .. } | RoomMessage::Presence { client_id, .. } => {
                *client_id
            }
        }
    }

    /// Serialize message to JSON bytes
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| crate::CollabError::InvalidMessage(e.to_string()))
    }
}
