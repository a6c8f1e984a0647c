//! Shared-document provider: replicated text plus presence for one room

use crate::awareness::{
    AwarenessState, AwarenessUpdate, ClientId, CursorRange, PresenceChannel, PresenceRecord,
    PresenceUser,
};
use crate::doc::{AutomergeText, MemoryText, Origin, SharedText, TextEvent, TextOp, Transaction};
use crate::gateway::RoomHandle;
use crate::protocol::RoomMessage;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

/// Something the provider observed since the last poll
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    Text(TextEvent),
    Presence(AwarenessUpdate),
}

/// Replicated text and awareness channel the bridge is wired to
pub trait CollabProvider: SharedText + PresenceChannel {
    /// Drain events that arrived from peers
    fn poll(&mut self) -> Vec<ProviderEvent>;
}

/// Provider connected to a [`RoomHandle`], backed by automerge
pub struct RoomProvider {
    room: RoomHandle,
    text: AutomergeText,
    awareness: AwarenessState,
    updates: Receiver<Vec<u8>>,
}

impl RoomProvider {
    /// Subscribe to the room, then load its document and presence.
    ///
    /// On failure the participant leaves the room again.
    pub fn connect(room: RoomHandle, field: &str) -> crate::Result<Self> {
        // Subscribing first means nothing published after the snapshot is missed.
        let updates = room.subscribe();
        let text = match AutomergeText::load(&room.snapshot(), field) {
            Ok(text) => text,
            Err(e) => {
                room.leave();
                return Err(e);
            }
        };

        let mut awareness = AwarenessState::new(room.client_id());
        awareness.reconcile(room.presence_snapshot());

        tracing::debug!(room = %room.room_id(), client = %room.client_id(), "Provider connected");
        Ok(Self {
            room,
            text,
            awareness,
            updates,
        })
    }

    pub fn room_id(&self) -> &str {
        self.room.room_id()
    }

    fn publish_local(&mut self, record: PresenceRecord) -> crate::Result<()> {
        self.awareness.set_local(record.clone());
        self.room.publish_presence(record)
    }

    fn handle_message(&mut self, bytes: &[u8], events: &mut Vec<ProviderEvent>) {
        let message = match RoomMessage::from_bytes(bytes) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Ignoring room message: {}", e);
                return;
            }
        };
        if message.sender() == self.room.client_id() {
            return;
        }

        match message {
            RoomMessage::DocUpdate { client_id, data, .. } => {
                match self.text.apply_update(&data, client_id) {
                    Ok(Some(event)) => events.push(ProviderEvent::Text(event)),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(client = %client_id, "Rejected document update: {}", e),
                }
            }
            RoomMessage::Presence { client_id, state } => {
                let update = self.awareness.apply(client_id, state);
                if !update.is_empty() {
                    events.push(ProviderEvent::Presence(update));
                }
            }
        }
    }

    /// Catch up after missing messages: merge the full room state
    fn resync(&mut self, events: &mut Vec<ProviderEvent>) {
        let before = self.text.text().ok();
        match self.text.apply_update(&self.room.snapshot(), ClientId::RELAY) {
            Ok(Some(_)) => events.push(ProviderEvent::Text(TextEvent {
                origin: Origin::Remote(ClientId::RELAY),
                delta: None,
            })),
            Ok(None) => {}
            Err(e) => tracing::warn!("Resync failed, text kept as {:?}: {}", before, e),
        }

        let update = self.awareness.reconcile(self.room.presence_snapshot());
        if !update.is_empty() {
            events.push(ProviderEvent::Presence(update));
        }
    }
}

impl SharedText for RoomProvider {
    fn text(&self) -> crate::Result<String> {
        self.text.text()
    }

    fn len(&self) -> crate::Result<usize> {
        self.text.len()
    }

    fn transact(&mut self, txn: Transaction) -> crate::Result<TextEvent> {
        let event = self.text.transact(txn)?;
        let update = self.text.take_update();
        if !update.is_empty() {
            self.room.publish_update(update)?;
        }
        Ok(event)
    }
}

impl PresenceChannel for RoomProvider {
    fn client_id(&self) -> ClientId {
        self.room.client_id()
    }

    fn set_local_user(&mut self, user: PresenceUser) -> crate::Result<()> {
        let mut record = self.awareness.local_record();
        record.user = Some(user);
        self.publish_local(record)
    }

    fn set_local_cursor(&mut self, cursor: Option<CursorRange>) -> crate::Result<()> {
        let mut record = self.awareness.local_record();
        record.cursor = cursor;
        self.publish_local(record)
    }

    fn states(&self) -> BTreeMap<ClientId, PresenceRecord> {
        self.awareness.states().clone()
    }
}

impl CollabProvider for RoomProvider {
    fn poll(&mut self) -> Vec<ProviderEvent> {
        let mut events = Vec::new();
        loop {
            match self.updates.try_recv() {
                Ok(bytes) => self.handle_message(&bytes, &mut events),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Room receiver lagged, resyncing");
                    self.resync(&mut events);
                }
            }
        }
        events
    }
}

impl Drop for RoomProvider {
    fn drop(&mut self) {
        self.room.leave();
    }
}

/// Provider without a room: remote activity is scripted by the caller.
///
/// Clones share state, so a test can keep a handle after giving the provider
/// to a bridge.
#[derive(Clone)]
pub struct MemoryProvider {
    client_id: ClientId,
    inner: Arc<Mutex<MemoryProviderInner>>,
}

struct MemoryProviderInner {
    text: MemoryText,
    awareness: AwarenessState,
    queued: VecDeque<ProviderEvent>,
    structured: bool,
}

impl MemoryProvider {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            inner: Arc::new(Mutex::new(MemoryProviderInner {
                text: MemoryText::new(),
                awareness: AwarenessState::new(client_id),
                queued: VecDeque::new(),
                structured: true,
            })),
        }
    }

    pub fn with_text(self, content: &str) -> Self {
        self.lock().text = MemoryText::with_content(content);
        self
    }

    /// Emit remote text events without a delta, forcing full replacement
    pub fn without_structured_deltas(self) -> Self {
        self.lock().structured = false;
        self
    }

    /// A peer edits the document; the event is delivered on the next poll
    pub fn remote_edit(&self, from: ClientId, ops: Vec<TextOp>) -> crate::Result<()> {
        let mut inner = self.lock();
        let mut event = inner.text.transact(Transaction::remote(from, ops))?;
        if !inner.structured {
            event.delta = None;
        }
        inner.queued.push_back(ProviderEvent::Text(event));
        Ok(())
    }

    /// A peer publishes (or, with `None`, drops) its presence
    pub fn remote_presence(&self, from: ClientId, state: Option<PresenceRecord>) {
        let mut inner = self.lock();
        let update = inner.awareness.apply(from, state);
        if !update.is_empty() {
            inner.queued.push_back(ProviderEvent::Presence(update));
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryProviderInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_local(&self, change: impl FnOnce(&mut PresenceRecord)) {
        let mut inner = self.lock();
        let mut record = inner.awareness.local_record();
        change(&mut record);
        inner.awareness.set_local(record);
    }
}

impl SharedText for MemoryProvider {
    fn text(&self) -> crate::Result<String> {
        self.lock().text.text()
    }

    fn transact(&mut self, txn: Transaction) -> crate::Result<TextEvent> {
        self.lock().text.transact(txn)
    }
}

impl PresenceChannel for MemoryProvider {
    fn client_id(&self) -> ClientId {
        self.client_id
    }

    fn set_local_user(&mut self, user: PresenceUser) -> crate::Result<()> {
        self.update_local(|record| record.user = Some(user));
        Ok(())
    }

    fn set_local_cursor(&mut self, cursor: Option<CursorRange>) -> crate::Result<()> {
        self.update_local(|record| record.cursor = cursor);
        Ok(())
    }

    fn states(&self) -> BTreeMap<ClientId, PresenceRecord> {
        self.lock().awareness.states().clone()
    }
}

impl CollabProvider for MemoryProvider {
    fn poll(&mut self) -> Vec<ProviderEvent> {
        self.lock().queued.drain(..).collect()
    }
}
