//! Presence records exchanged over the awareness channel

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Connection-scoped participant identifier assigned by the room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl ClientId {
    /// Reserved for changes relayed by the room itself (e.g. resyncs)
    pub const RELAY: ClientId = ClientId(0);
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name and colour shown next to a participant's caret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUser {
    pub name: String,
    pub color: String,
}

impl PresenceUser {
    pub fn new(name: impl Into<String>, saturation: u8, lightness: u8) -> Self {
        let name = name.into();
        let color = color_for_name(&name, saturation, lightness);
        Self { name, color }
    }
}

/// Caret range in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRange {
    pub index: usize,
    pub length: usize,
}

impl CursorRange {
    pub fn caret(index: usize) -> Self {
        Self { index, length: 0 }
    }

    pub fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }

    /// Keep the range inside a document of `len` characters
    pub fn clamp_to(self, len: usize) -> Self {
        let index = self.index.min(len);
        Self {
            index,
            length: self.length.min(len - index),
        }
    }
}

/// Ephemeral per-participant state: `{ user: {name, color}, cursor: {index, length} | null }`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PresenceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<PresenceUser>,

    #[serde(default)]
    pub cursor: Option<CursorRange>,
}

/// Order-dependent hash of the name's UTF-16 units mapped to an HSL hue
pub fn color_for_name(name: &str, saturation: u8, lightness: u8) -> String {
    let mut hash: i32 = 0;
    for unit in name.encode_utf16() {
        hash = (unit as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    let hue = hash.unsigned_abs() % 360;
    format!("hsl({}, {}%, {}%)", hue, saturation, lightness)
}

/// Identifiers touched by one presence change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AwarenessUpdate {
    pub added: Vec<ClientId>,
    pub updated: Vec<ClientId>,
    pub removed: Vec<ClientId>,
}

impl AwarenessUpdate {
    /// Everyone currently present, as if they had all just joined
    pub fn replay<'a>(ids: impl IntoIterator<Item = &'a ClientId>) -> Self {
        Self {
            added: ids.into_iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn merge(&mut self, other: AwarenessUpdate) {
        self.added.extend(other.added);
        self.updated.extend(other.updated);
        self.removed.extend(other.removed);
    }
}

/// Local view of everyone's presence in the room
#[derive(Debug, Clone)]
pub struct AwarenessState {
    local: ClientId,
    states: BTreeMap<ClientId, PresenceRecord>,
}

impl AwarenessState {
    pub fn new(local: ClientId) -> Self {
        Self {
            local,
            states: BTreeMap::new(),
        }
    }

    pub fn local_id(&self) -> ClientId {
        self.local
    }

    pub fn local_record(&self) -> PresenceRecord {
        self.states.get(&self.local).cloned().unwrap_or_default()
    }

    pub fn set_local(&mut self, record: PresenceRecord) -> AwarenessUpdate {
        self.apply(self.local, Some(record))
    }

    /// Record a peer's new state; `None` means the peer left
    pub fn apply(&mut self, client: ClientId, state: Option<PresenceRecord>) -> AwarenessUpdate {
        let mut update = AwarenessUpdate::default();
        match state {
            None => {
                if self.states.remove(&client).is_some() {
                    update.removed.push(client);
                }
            }
            Some(record) => match self.states.insert(client, record.clone()) {
                None => update.added.push(client),
                Some(previous) if previous != record => update.updated.push(client),
                Some(_) => {}
            },
        }
        update
    }

    /// Bring the view in line with an authoritative snapshot
    pub fn reconcile(&mut self, snapshot: BTreeMap<ClientId, PresenceRecord>) -> AwarenessUpdate {
        let mut update = AwarenessUpdate::default();

        let gone: Vec<ClientId> = self
            .states
            .keys()
            .filter(|id| !snapshot.contains_key(id))
            .copied()
            .collect();
        for id in gone {
            update.merge(self.apply(id, None));
        }
        for (id, record) in snapshot {
            update.merge(self.apply(id, Some(record)));
        }
        update
    }

    pub fn states(&self) -> &BTreeMap<ClientId, PresenceRecord> {
        &self.states
    }
}

/// Presence half of the shared-document provider
pub trait PresenceChannel {
    fn client_id(&self) -> ClientId;

    /// Publish the participant's name and colour
    fn set_local_user(&mut self, user: PresenceUser) -> crate::Result<()>;

    /// Publish the caret range, `None` when the selection was cleared
    fn set_local_cursor(&mut self, cursor: Option<CursorRange>) -> crate::Result<()>;

    /// Current record of every participant, including this one
    fn states(&self) -> BTreeMap<ClientId, PresenceRecord>;
}
