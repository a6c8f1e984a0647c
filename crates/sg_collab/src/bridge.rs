//! The collaborative document bridge
//!
//! Keeps one surface and one shared text convergent:
//!
//! - user edits on the surface are translated and applied to the shared text
//!   in one transaction tagged [`Origin::Local`]
//! - shared-text events not tagged local are replayed into the surface
//! - selection changes are published as presence; peers' presence is drawn
//!   through the cursor layer
//! - every surface change is snapshotted to local storage
//!
//! Failures after setup are logged and dropped; the editor stays usable.

use crate::awareness::{color_for_name, AwarenessUpdate, ClientId, CursorRange, PresenceUser};
use crate::config::BridgeConfig;
use crate::cursors::{apply_presence, CursorLayer};
use crate::delta::Delta;
use crate::doc::{Origin, TextEvent, Transaction};
use crate::gateway::{EnterOptions, RoomGateway};
use crate::provider::{CollabProvider, ProviderEvent, RoomProvider};
use crate::storage::{Autosave, LocalStore};
use crate::surface::{ChangeSource, EditorHost, RichTextSurface, TextChange};
use crate::translate::translate;
use sg_common::DisplayIdentity;

/// Lifecycle of one bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    /// Surface built, room not entered yet
    Mounting,
    /// Waiting for the gateway to admit us
    Joining,
    Joined,
    /// Reconciling one local or remote change
    Synchronizing,
    /// Admission failed; the editor stays local-only for good
    Failed,
}

impl BridgeState {
    pub fn can_transition_to(self, next: BridgeState) -> bool {
        use BridgeState::*;
        matches!(
            (self, next),
            (Uninitialized, Mounting)
                | (Mounting, Joining)
                | (Joining, Joined)
                | (Joining, Failed)
                | (Joined, Synchronizing)
                | (Synchronizing, Joined)
        )
    }
}

pub struct Bridge {
    config: BridgeConfig,
    state: BridgeState,
    identity: DisplayIdentity,
    surface: Box<dyn RichTextSurface>,
    cursors: Box<dyn CursorLayer>,
    provider: Option<Box<dyn CollabProvider>>,
    autosave: Autosave,
}

impl Bridge {
    /// Find the mount point, register the cursor module and build the surface.
    ///
    /// The cursor module is registered before the surface exists; hosts may
    /// refuse to build a surface otherwise.
    pub fn mount(
        host: &mut dyn EditorHost,
        config: BridgeConfig,
        store: Box<dyn LocalStore>,
    ) -> crate::Result<Self> {
        tracing::debug!(mount = %config.mount_id, "Mounting study guide editor");

        let mount = host.find_mount(&config.mount_id).ok_or_else(|| {
            crate::CollabError::MountNotFound {
                mount_id: config.mount_id.clone(),
            }
        })?;

        let identity = DisplayIdentity::new(
            mount.room_id(&config.default_room),
            mount.user_display(&config.default_display_name),
        );

        let cursors = host.register_cursor_module();
        let surface = host.create_surface(&mount)?;
        let autosave = Autosave::new(store, &config.storage_key_prefix, &identity.room_id)
            .enabled(config.autosave_enabled);

        let mut bridge = Self {
            config,
            state: BridgeState::Uninitialized,
            identity,
            surface,
            cursors,
            provider: None,
            autosave,
        };
        bridge.transition(BridgeState::Mounting);
        Ok(bridge)
    }

    /// Enter the room and wire the provider. No retry on failure.
    pub async fn join(&mut self, gateway: &dyn RoomGateway) -> crate::Result<()> {
        if self.state != BridgeState::Mounting {
            return Err(crate::CollabError::RoomAdmission {
                room_id: self.identity.room_id.clone(),
                reason: format!("cannot join from state {:?}", self.state),
            });
        }
        self.transition(BridgeState::Joining);

        let options = EnterOptions::default();
        let session = match gateway.enter_room(&self.identity.room_id, options).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(self.fail_join("gateway returned no session".to_string())),
            Err(e) => return Err(self.fail_join(e.to_string())),
        };
        let Some(room) = session.room else {
            return Err(self.fail_join("session exposes no room".to_string()));
        };

        let provider = match RoomProvider::connect(room, &self.config.text_field) {
            Ok(provider) => provider,
            Err(e) => return Err(self.fail_join(e.to_string())),
        };
        self.attach(Box::new(provider))
    }

    fn fail_join(&mut self, reason: String) -> crate::CollabError {
        self.transition(BridgeState::Failed);
        tracing::error!(
            room = %self.identity.room_id,
            "Could not join room, editing stays local: {}",
            reason
        );
        crate::CollabError::RoomAdmission {
            room_id: self.identity.room_id.clone(),
            reason,
        }
    }

    /// Wire an already-connected provider: publish identity, load the shared
    /// text into the surface and replay everyone's presence.
    pub fn attach(&mut self, mut provider: Box<dyn CollabProvider>) -> crate::Result<()> {
        if self.state == BridgeState::Mounting {
            self.transition(BridgeState::Joining);
        }
        if self.state != BridgeState::Joining {
            return Err(crate::CollabError::RoomAdmission {
                room_id: self.identity.room_id.clone(),
                reason: format!("cannot attach a provider in state {:?}", self.state),
            });
        }

        let user = PresenceUser {
            name: self.identity.display_name.clone(),
            color: color_for_name(
                &self.identity.display_name,
                self.config.saturation,
                self.config.lightness,
            ),
        };
        if let Err(e) = provider.set_local_user(user) {
            tracing::warn!("Failed to publish presence: {}", e);
        }

        // The shared document is the source of truth on load.
        let loaded = provider.text().and_then(|shared| {
            if shared == self.surface.text() {
                return Ok(None);
            }
            self.surface
                .set_contents(&Delta::from_text(&shared), ChangeSource::Api)
                .map(Some)
        });
        match loaded {
            Ok(Some(change)) => self.on_text_change(&change),
            Ok(None) => {}
            Err(e) => return Err(self.fail_join(e.to_string())),
        }

        let client = provider.client_id();
        let replay = AwarenessUpdate::replay(provider.states().keys());
        self.provider = Some(provider);
        self.transition(BridgeState::Joined);

        tracing::info!(
            room = %self.identity.room_id,
            client = %client,
            user = %self.identity.display_name,
            "Joined collaboration room"
        );

        self.on_presence_update(&replay);
        Ok(())
    }

    /// Surface change handler: snapshot always, propagate user edits.
    pub fn on_text_change(&mut self, change: &TextChange) {
        self.autosave.record(&self.surface.contents());

        if change.source != ChangeSource::User {
            return;
        }
        if self.provider.is_none() {
            tracing::trace!("Local-only mode, change not shared");
            return;
        }
        self.propagate_local(&change.delta);
    }

    fn propagate_local(&mut self, delta: &Delta) {
        self.enter_sync();

        let applied = match self.provider.as_mut() {
            Some(provider) => provider
                .len()
                .and_then(|len| translate(delta, len))
                .and_then(|ops| provider.transact(Transaction::local(ops))),
            None => Err(crate::CollabError::NotJoined),
        };

        match applied {
            // The observer sees every transaction, ours included.
            Ok(event) => self.on_shared_change(&event),
            Err(e) => tracing::warn!("Dropping local change: {}", e),
        }

        self.leave_sync();
    }

    /// Shared-text observer: replay remote changes into the surface.
    pub fn on_shared_change(&mut self, event: &TextEvent) {
        if event.origin.is_local() {
            tracing::trace!("Skipping self-originated transaction");
            return;
        }

        self.enter_sync();
        let outcome = match &event.delta {
            Some(delta) => self.surface.update_contents(delta, ChangeSource::Api),
            None => self.replace_from_shared(),
        };
        match outcome {
            Ok(change) => self.on_text_change(&change),
            Err(e) => {
                let from = match event.origin {
                    Origin::Remote(client) => client,
                    Origin::Local => ClientId::RELAY,
                };
                tracing::warn!(from = %from, "Failed to apply remote change: {}", e);
            }
        }
        self.leave_sync();
    }

    /// Rebuild the surface from the shared text, keeping the caret in range
    fn replace_from_shared(&mut self) -> crate::Result<TextChange> {
        let provider = self.provider.as_ref().ok_or(crate::CollabError::NotJoined)?;
        let text = provider.text()?;

        let selection = self.surface.selection();
        let change = self
            .surface
            .set_contents(&Delta::from_text(&text), ChangeSource::Api)?;
        self.surface.set_selection(selection);
        Ok(change)
    }

    /// Selection handler: publish the caret of user-caused selections
    pub fn on_selection_change(&mut self, range: Option<CursorRange>, source: ChangeSource) {
        if source != ChangeSource::User {
            return;
        }
        if let Some(provider) = self.provider.as_mut() {
            if let Err(e) = provider.set_local_cursor(range) {
                tracing::warn!("Failed to publish cursor: {}", e);
            }
        }
    }

    /// Presence handler: redraw the cursors the update touches
    pub fn on_presence_update(&mut self, update: &AwarenessUpdate) {
        let Some(provider) = self.provider.as_ref() else {
            return;
        };
        let states = provider.states();
        let summary = apply_presence(self.cursors.as_mut(), &states, update, provider.client_id());
        tracing::debug!(
            drawn = summary.drawn,
            removed = summary.removed,
            failed = summary.failed,
            "Presence applied"
        );
    }

    /// Deliver everything the provider received since the last call
    pub fn pump(&mut self) -> usize {
        let events = match self.provider.as_mut() {
            Some(provider) => provider.poll(),
            None => return 0,
        };
        let count = events.len();

        for event in events {
            match event {
                ProviderEvent::Text(event) => self.on_shared_change(&event),
                ProviderEvent::Presence(update) => self.on_presence_update(&update),
            }
        }
        count
    }

    /// Apply a keystroke-level delta as the user would
    pub fn user_edit(&mut self, delta: &Delta) -> crate::Result<()> {
        let change = self.surface.update_contents(delta, ChangeSource::User)?;
        self.on_text_change(&change);
        Ok(())
    }

    /// Move the caret as the user would
    pub fn user_select(&mut self, range: Option<CursorRange>) {
        self.surface.set_selection(range);
        let range = self.surface.selection();
        self.on_selection_change(range, ChangeSource::User);
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn identity(&self) -> &DisplayIdentity {
        &self.identity
    }

    pub fn room_id(&self) -> &str {
        &self.identity.room_id
    }

    pub fn display_name(&self) -> &str {
        &self.identity.display_name
    }

    pub fn surface(&self) -> &dyn RichTextSurface {
        self.surface.as_ref()
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.provider.as_ref().map(|p| p.client_id())
    }

    /// Text of the shared document, when joined
    pub fn shared_text(&self) -> Option<String> {
        self.provider.as_ref().and_then(|p| p.text().ok())
    }

    pub fn autosave_key(&self) -> &str {
        self.autosave.key()
    }

    fn enter_sync(&mut self) {
        if self.state == BridgeState::Joined {
            self.transition(BridgeState::Synchronizing);
        }
    }

    fn leave_sync(&mut self) {
        if self.state == BridgeState::Synchronizing {
            self.transition(BridgeState::Joined);
        }
    }

    fn transition(&mut self, next: BridgeState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!("Ignoring bridge transition {:?} -> {:?}", self.state, next);
            return;
        }
        tracing::trace!("Bridge {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Mount the editor and join its room.
///
/// Returns `None` when the editor cannot be mounted. A failed admission still
/// returns the bridge, in local-only mode.
pub async fn init_study_guide(
    host: &mut dyn EditorHost,
    gateway: &dyn RoomGateway,
    store: Box<dyn LocalStore>,
    config: BridgeConfig,
) -> Option<Bridge> {
    if let Err(e) = config.validate() {
        tracing::error!("Study guide editor disabled: {}", e);
        return None;
    }

    let mut bridge = match Bridge::mount(host, config, store) {
        Ok(bridge) => bridge,
        Err(e) => {
            tracing::error!("Study guide editor disabled: {}", e);
            return None;
        }
    };

    // join() already logged the reason and left the bridge local-only.
    let _ = bridge.join(gateway).await;
    Some(bridge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awareness::PresenceRecord;
    use crate::cursors::MemoryCursors;
    use crate::doc::TextOp;
    use crate::provider::MemoryProvider;
    use crate::storage::MemoryStore;
    use crate::surface::{MemoryHost, MemorySurface};

    const LOCAL: ClientId = ClientId(1);
    const PEER: ClientId = ClientId(2);

    struct Fixture {
        bridge: Bridge,
        surface: MemorySurface,
        cursors: MemoryCursors,
        store: MemoryStore,
    }

    fn mounted(store: MemoryStore) -> Fixture {
        let mut host = MemoryHost::new();
        host.add_mount(
            "study-guide-editor",
            &[("data-room-id", "r1"), ("data-user-display", "alice")],
        );
        let bridge =
            Bridge::mount(&mut host, BridgeConfig::default(), Box::new(store.clone())).unwrap();
        Fixture {
            bridge,
            surface: host.surface().unwrap(),
            cursors: host.cursors(),
            store,
        }
    }

    fn joined(provider: MemoryProvider) -> Fixture {
        let mut fixture = mounted(MemoryStore::new());
        fixture.bridge.attach(Box::new(provider)).unwrap();
        fixture
    }

    fn insert(index: usize, text: &str) -> Vec<TextOp> {
        vec![TextOp::Insert {
            index,
            text: text.to_string(),
        }]
    }

    #[test]
    fn test_state_transitions() {
        use BridgeState::*;
        assert!(Uninitialized.can_transition_to(Mounting));
        assert!(Joining.can_transition_to(Failed));
        assert!(Synchronizing.can_transition_to(Joined));
        assert!(!Failed.can_transition_to(Joining));
        assert!(!Failed.can_transition_to(Joined));
        assert!(!Joined.can_transition_to(Joining));
    }

    #[test]
    fn test_mount_registers_cursors_before_surface() {
        let mut host = MemoryHost::new();
        host.add_mount("study-guide-editor", &[]);
        let bridge =
            Bridge::mount(&mut host, BridgeConfig::default(), Box::new(MemoryStore::new()))
                .unwrap();

        assert_eq!(host.calls(), &["register_cursor_module", "create_surface"]);
        assert_eq!(bridge.room_id(), "studyguide-default");
        assert_eq!(bridge.display_name(), "anonymous");
        assert_eq!(bridge.autosave_key(), "studyguide:studyguide-default");
        assert_eq!(bridge.state(), BridgeState::Mounting);
    }

    #[test]
    fn test_missing_mount_is_reported() {
        let mut host = MemoryHost::new();
        let err = Bridge::mount(&mut host, BridgeConfig::default(), Box::new(MemoryStore::new()))
            .err()
            .unwrap();
        assert!(matches!(err, crate::CollabError::MountNotFound { .. }));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_attach_publishes_identity_and_loads_shared_text() {
        let fixture = joined(MemoryProvider::new(LOCAL).with_text("existing notes"));

        assert_eq!(fixture.bridge.state(), BridgeState::Joined);
        assert_eq!(fixture.surface.text(), "existing notes");
        assert_eq!(fixture.bridge.client_id(), Some(LOCAL));
        // Loading remote content is not a user edit.
        assert_eq!(fixture.surface.user_changes(), 0);
    }

    #[test]
    fn test_local_edits_mirror_into_shared_text() {
        let mut fixture = joined(MemoryProvider::new(LOCAL));
        let edits = [
            Delta::new().insert("hello"),
            Delta::new().retain(5).insert(" world"),
            Delta::new().retain(1).delete(4).insert("ey"),
            Delta::new().retain(4).delete(5).insert("world!"),
        ];
        for edit in &edits {
            fixture.bridge.user_edit(edit).unwrap();
        }

        assert_eq!(fixture.surface.text(), "hey world!");
        assert_eq!(fixture.bridge.shared_text().as_deref(), Some("hey world!"));
        assert_eq!(fixture.bridge.state(), BridgeState::Joined);
    }

    #[test]
    fn test_local_insert_does_not_echo() {
        let mut fixture = joined(MemoryProvider::new(LOCAL));
        fixture.bridge.user_edit(&Delta::new().insert("hello")).unwrap();

        // The observer ran for the local transaction but touched nothing.
        assert_eq!(fixture.surface.api_changes(), 0);
        assert_eq!(fixture.surface.text(), "hello");

        let event = TextEvent {
            origin: Origin::Local,
            delta: Some(Delta::new().insert("hello")),
        };
        fixture.bridge.on_shared_change(&event);
        assert_eq!(fixture.surface.text(), "hello");
        assert_eq!(fixture.surface.api_changes(), 0);
    }

    #[test]
    fn test_remote_edits_converge_with_structured_deltas() {
        let peer = MemoryProvider::new(LOCAL).with_text("abc");
        let mut fixture = joined(peer.clone());

        peer.remote_edit(PEER, insert(3, "def")).unwrap();
        peer.remote_edit(PEER, vec![TextOp::Delete { index: 0, len: 1 }])
            .unwrap();

        assert_eq!(fixture.bridge.pump(), 2);
        assert_eq!(fixture.surface.text(), "bcdef");
        assert_eq!(fixture.bridge.shared_text().as_deref(), Some("bcdef"));
    }

    #[test]
    fn test_remote_edits_converge_through_full_replace() {
        let peer = MemoryProvider::new(LOCAL)
            .with_text("abc")
            .without_structured_deltas();
        let mut fixture = joined(peer.clone());
        fixture.bridge.user_select(Some(CursorRange::caret(2)));

        peer.remote_edit(PEER, insert(0, ">> ")).unwrap();
        fixture.bridge.pump();

        assert_eq!(fixture.surface.text(), ">> abc");
        assert_eq!(fixture.surface.selection(), Some(CursorRange::caret(2)));
    }

    #[test]
    fn test_interleaved_edits_converge() {
        let peer = MemoryProvider::new(LOCAL);
        let mut fixture = joined(peer.clone());

        fixture.bridge.user_edit(&Delta::new().insert("world")).unwrap();
        peer.remote_edit(PEER, insert(0, "hello ")).unwrap();
        fixture.bridge.pump();
        fixture
            .bridge
            .user_edit(&Delta::new().retain(11).insert("!"))
            .unwrap();

        assert_eq!(fixture.surface.text(), "hello world!");
        assert_eq!(fixture.bridge.shared_text().as_deref(), Some("hello world!"));
    }

    #[test]
    fn test_bad_remote_delta_is_contained() {
        let mut fixture = joined(MemoryProvider::new(LOCAL).with_text("abc"));
        let event = TextEvent {
            origin: Origin::Remote(PEER),
            delta: Some(Delta::new().retain(10).insert("x")),
        };

        fixture.bridge.on_shared_change(&event);

        assert_eq!(fixture.surface.text(), "abc");
        assert_eq!(fixture.bridge.state(), BridgeState::Joined);
    }

    #[test]
    fn test_untranslatable_local_change_is_dropped() {
        let mut fixture = joined(MemoryProvider::new(LOCAL).with_text("abc"));
        let change = TextChange {
            delta: Delta::new().retain(50).insert("x"),
            source: ChangeSource::User,
        };

        fixture.bridge.on_text_change(&change);

        assert_eq!(fixture.bridge.shared_text().as_deref(), Some("abc"));
        assert_eq!(fixture.bridge.state(), BridgeState::Joined);
    }

    #[test]
    fn test_presence_replay_on_attach() {
        let provider = MemoryProvider::new(LOCAL);
        provider.remote_presence(
            PEER,
            Some(PresenceRecord {
                user: Some(PresenceUser::new("bob", 70, 50)),
                cursor: Some(CursorRange::caret(0)),
            }),
        );
        provider.remote_presence(
            ClientId(3),
            Some(PresenceRecord {
                user: Some(PresenceUser::new("carol", 70, 50)),
                cursor: None,
            }),
        );
        let mut fixture = joined(provider);

        assert_eq!(fixture.cursors.ids(), vec!["2".to_string()]);
        assert_eq!(fixture.cursors.decoration("2").unwrap().name, "bob");

        // Replaying the queued updates changes nothing.
        fixture.bridge.pump();
        assert_eq!(fixture.cursors.ids(), vec!["2".to_string()]);
    }

    #[test]
    fn test_selection_publishes_cursor_for_user_only() {
        let mut fixture = joined(MemoryProvider::new(LOCAL).with_text("abcdef"));

        fixture
            .bridge
            .on_selection_change(Some(CursorRange::new(1, 2)), ChangeSource::Api);
        let states = fixture.bridge.provider.as_ref().unwrap().states();
        assert_eq!(states[&LOCAL].cursor, None);

        fixture.bridge.user_select(Some(CursorRange::new(1, 2)));
        let states = fixture.bridge.provider.as_ref().unwrap().states();
        assert_eq!(states[&LOCAL].cursor, Some(CursorRange::new(1, 2)));
        assert_eq!(
            states[&LOCAL].user.as_ref().map(|u| u.color.clone()),
            Some(color_for_name("alice", 70, 50))
        );

        fixture.bridge.user_select(None);
        let states = fixture.bridge.provider.as_ref().unwrap().states();
        assert_eq!(states[&LOCAL].cursor, None);
    }

    #[test]
    fn test_every_change_is_snapshotted() {
        let peer = MemoryProvider::new(LOCAL);
        let mut fixture = joined(peer.clone());

        fixture.bridge.user_edit(&Delta::new().insert("local")).unwrap();
        peer.remote_edit(PEER, insert(0, "remote ")).unwrap();
        fixture.bridge.pump();

        assert_eq!(fixture.surface.text(), "remote local");
        assert_eq!(fixture.store.writes(), 2);
        let saved = fixture.store.get_item("studyguide:r1").unwrap().unwrap();
        let saved: Delta = serde_json::from_str(&saved).unwrap();
        assert_eq!(saved.plain_text(), "remote local");
    }

    #[test]
    fn test_storage_failure_does_not_block_edit() {
        let mut fixture = mounted(MemoryStore::with_quota(0));
        fixture
            .bridge
            .attach(Box::new(MemoryProvider::new(LOCAL)))
            .unwrap();

        fixture.bridge.user_edit(&Delta::new().insert("hi")).unwrap();

        assert_eq!(fixture.surface.text(), "hi");
        assert_eq!(fixture.bridge.shared_text().as_deref(), Some("hi"));
        assert_eq!(fixture.store.writes(), 0);
    }

    #[test]
    fn test_local_only_editing_before_join() {
        let mut fixture = mounted(MemoryStore::new());
        fixture.bridge.user_edit(&Delta::new().insert("draft")).unwrap();

        assert_eq!(fixture.surface.text(), "draft");
        assert_eq!(fixture.bridge.shared_text(), None);
        assert_eq!(fixture.bridge.pump(), 0);
        assert_eq!(fixture.store.writes(), 1);
    }
}
