//! Room admission and the in-process relay

use crate::awareness::{ClientId, PresenceRecord};
use crate::doc::{AutomergeText, SharedText};
use crate::protocol::RoomMessage;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Messages buffered per subscriber before it starts lagging
const ROOM_CHANNEL_CAPACITY: usize = 256;

/// Options passed when entering a room
#[derive(Debug, Clone, Default)]
pub struct EnterOptions {
    pub initial_presence: PresenceRecord,
}

/// Result of a room admission
#[derive(Debug)]
pub struct Session {
    pub room: Option<RoomHandle>,
}

/// Authenticated broker admitting clients into named rooms
///
/// Bridges run on one thread, so admission futures need not be `Send`.
#[async_trait(?Send)]
pub trait RoomGateway {
    /// `Ok(None)` means the gateway refused admission without an error
    async fn enter_room(
        &self,
        room_id: &str,
        options: EnterOptions,
    ) -> crate::Result<Option<Session>>;

    /// Legacy alias of [`RoomGateway::enter_room`]
    async fn enter(&self, room_id: &str, options: EnterOptions) -> crate::Result<Option<Session>> {
        self.enter_room(room_id, options).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct RoomShared {
    room_id: String,
    doc: Mutex<AutomergeText>,
    presence: Mutex<BTreeMap<ClientId, PresenceRecord>>,
    tx: broadcast::Sender<Vec<u8>>,
}

impl RoomShared {
    fn broadcast(&self, message: &RoomMessage) -> crate::Result<()> {
        let bytes = message.to_bytes()?;
        // No receivers is fine: the room may be empty.
        let _ = self.tx.send(bytes);
        Ok(())
    }
}

/// A participant's connection to a room
#[derive(Clone)]
pub struct RoomHandle {
    shared: Arc<RoomShared>,
    client_id: ClientId,
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("room_id", &self.shared.room_id)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl RoomHandle {
    pub fn room_id(&self) -> &str {
        &self.shared.room_id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Full saved state of the room's document
    pub fn snapshot(&self) -> Vec<u8> {
        lock(&self.shared.doc).save()
    }

    /// Merge this participant's changes into the room and fan them out
    pub fn publish_update(&self, data: Vec<u8>) -> crate::Result<()> {
        lock(&self.shared.doc).apply_update(&data, self.client_id)?;
        self.shared
            .broadcast(&RoomMessage::doc_update(self.client_id, data))
    }

    /// Replace this participant's presence state and fan it out
    pub fn publish_presence(&self, state: PresenceRecord) -> crate::Result<()> {
        lock(&self.shared.presence).insert(self.client_id, state.clone());
        self.shared.broadcast(&RoomMessage::Presence {
            client_id: self.client_id,
            state: Some(state),
        })
    }

    pub fn presence_snapshot(&self) -> BTreeMap<ClientId, PresenceRecord> {
        lock(&self.shared.presence).clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.shared.tx.subscribe()
    }

    /// Drop this participant's presence. Safe to call more than once.
    pub fn leave(&self) {
        let removed = lock(&self.shared.presence).remove(&self.client_id).is_some();
        if removed {
            tracing::debug!(room = %self.shared.room_id, client = %self.client_id, "Participant left");
            if let Err(e) = self.shared.broadcast(&RoomMessage::Presence {
                client_id: self.client_id,
                state: None,
            }) {
                tracing::warn!("Failed to announce departure: {}", e);
            }
        }
    }
}

/// In-process relay: one canonical document and presence map per room
pub struct MemoryHub {
    field: String,
    rooms: Mutex<HashMap<String, Arc<RoomShared>>>,
    capacity: Option<usize>,
    closed: AtomicBool,
    next_client: AtomicU64,
}

impl MemoryHub {
    /// Rooms created by this hub hold their text under `field`
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            rooms: Mutex::new(HashMap::new()),
            capacity: None,
            closed: AtomicBool::new(false),
            next_client: AtomicU64::new(1),
        }
    }

    /// Refuse admission once a room holds `max_participants`
    pub fn with_capacity(mut self, max_participants: usize) -> Self {
        self.capacity = Some(max_participants);
        self
    }

    /// Refuse every admission from now on
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Canonical text of a room, if it exists
    pub fn room_text(&self, room_id: &str) -> Option<String> {
        let room = lock(&self.rooms).get(room_id).cloned()?;
        let text = lock(&room.doc).text().ok();
        text
    }

    /// Participants currently present in a room
    pub fn participants(&self, room_id: &str) -> usize {
        lock(&self.rooms)
            .get(room_id)
            .map(|room| lock(&room.presence).len())
            .unwrap_or(0)
    }

    fn room(&self, room_id: &str) -> crate::Result<Arc<RoomShared>> {
        let mut rooms = lock(&self.rooms);
        if let Some(room) = rooms.get(room_id) {
            return Ok(Arc::clone(room));
        }

        let (tx, _) = broadcast::channel(ROOM_CHANNEL_CAPACITY);
        let room = Arc::new(RoomShared {
            room_id: room_id.to_string(),
            doc: Mutex::new(AutomergeText::create(&self.field)?),
            presence: Mutex::new(BTreeMap::new()),
            tx,
        });
        rooms.insert(room_id.to_string(), Arc::clone(&room));
        tracing::info!(room = %room_id, "Created room");
        Ok(room)
    }
}

#[async_trait(?Send)]
impl RoomGateway for MemoryHub {
    async fn enter_room(
        &self,
        room_id: &str,
        options: EnterOptions,
    ) -> crate::Result<Option<Session>> {
        if self.closed.load(Ordering::SeqCst) {
            tracing::warn!(room = %room_id, "Hub closed, refusing admission");
            return Ok(None);
        }

        let room = self.room(room_id)?;
        if let Some(max) = self.capacity {
            if lock(&room.presence).len() >= max {
                tracing::warn!(room = %room_id, max, "Room full");
                return Ok(None);
            }
        }

        let client_id = ClientId(self.next_client.fetch_add(1, Ordering::SeqCst));
        let handle = RoomHandle {
            shared: room,
            client_id,
        };
        handle.publish_presence(options.initial_presence)?;

        tracing::debug!(room = %room_id, client = %client_id, "Admitted participant");
        Ok(Some(Session { room: Some(handle) }))
    }
}
