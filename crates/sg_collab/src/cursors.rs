//! Remote cursor decorations drawn on the surface

use crate::awareness::{AwarenessUpdate, ClientId, CursorRange, PresenceRecord};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Cursor-decoration extension registered on the surface
pub trait CursorLayer {
    /// Draw or move the decoration for `id`
    fn create_or_update(
        &mut self,
        id: &str,
        name: &str,
        color: &str,
        range: CursorRange,
    ) -> crate::Result<()>;

    /// Remove the decoration for `id`; removing an absent one is not an error
    fn remove(&mut self, id: &str) -> crate::Result<()>;

    /// Identifiers of the decorations currently drawn
    fn ids(&self) -> Vec<String>;
}

/// Outcome of one batch of decoration changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecorationSummary {
    pub drawn: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Reflect a presence update in the cursor layer.
///
/// Added and updated participants get a decoration when their record carries
/// both a user and a cursor, otherwise any existing decoration is removed.
/// Removed participants lose theirs unconditionally. The local participant is
/// never drawn. A failure on one participant does not stop the batch.
pub fn apply_presence(
    layer: &mut dyn CursorLayer,
    states: &BTreeMap<ClientId, PresenceRecord>,
    update: &AwarenessUpdate,
    local: ClientId,
) -> DecorationSummary {
    let mut summary = DecorationSummary::default();

    for client in update.added.iter().chain(update.updated.iter()) {
        if *client == local {
            continue;
        }
        let id = client.to_string();

        let drawn = match states.get(client) {
            Some(PresenceRecord {
                user: Some(user),
                cursor: Some(range),
            }) => layer
                .create_or_update(&id, &user.name, &user.color, *range)
                .map(|_| true),
            _ => layer.remove(&id).map(|_| false),
        };

        match drawn {
            Ok(true) => summary.drawn += 1,
            Ok(false) => summary.removed += 1,
            Err(e) => {
                tracing::warn!(client = %client, "Cursor decoration failed: {}", e);
                summary.failed += 1;
            }
        }
    }

    for client in &update.removed {
        match layer.remove(&client.to_string()) {
            Ok(()) => summary.removed += 1,
            Err(e) => {
                tracing::warn!(client = %client, "Cursor removal failed: {}", e);
                summary.failed += 1;
            }
        }
    }

    summary
}

/// A decoration as drawn by [`MemoryCursors`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub name: String,
    pub color: String,
    pub range: CursorRange,
}

#[derive(Debug, Default)]
struct CursorsInner {
    decorations: BTreeMap<String, Decoration>,
    failing: HashSet<String>,
}

/// In-memory cursor layer; clones share the same decorations
#[derive(Debug, Clone, Default)]
pub struct MemoryCursors {
    inner: Arc<Mutex<CursorsInner>>,
}

impl MemoryCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `id` fail from now on
    pub fn fail_on(&self, id: &str) {
        self.lock().failing.insert(id.to_string());
    }

    pub fn decoration(&self, id: &str) -> Option<Decoration> {
        self.lock().decorations.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CursorsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CursorLayer for MemoryCursors {
    fn create_or_update(
        &mut self,
        id: &str,
        name: &str,
        color: &str,
        range: CursorRange,
    ) -> crate::Result<()> {
        let mut inner = self.lock();
        if inner.failing.contains(id) {
            return Err(crate::CollabError::Decoration {
                client_id: id.to_string(),
                reason: "decoration rejected".to_string(),
            });
        }
        inner.decorations.insert(
            id.to_string(),
            Decoration {
                name: name.to_string(),
                color: color.to_string(),
                range,
            },
        );
        Ok(())
    }

    fn remove(&mut self, id: &str) -> crate::Result<()> {
        let mut inner = self.lock();
        if inner.failing.contains(id) {
            return Err(crate::CollabError::Decoration {
                client_id: id.to_string(),
                reason: "removal rejected".to_string(),
            });
        }
        inner.decorations.remove(id);
        Ok(())
    }

    fn ids(&self) -> Vec<String> {
        self.lock().decorations.keys().cloned().collect()
    }
}
