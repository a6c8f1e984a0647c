//! # StudyGuide Collaborative Document Bridge
//!
//! Keeps one rich-text surface and one replicated text document convergent,
//! broadcasts caret presence and draws remote participants' cursors.
//!
//! ## Architecture
//!
//! - **Surface**: the embedded editor, seen through [`RichTextSurface`] and
//!   mounted by an [`EditorHost`]
//! - **Shared document**: automerge-rs text behind [`SharedText`], wired to a
//!   room by [`RoomProvider`]
//! - **Presence**: per-participant `{user, cursor}` records behind
//!   [`PresenceChannel`], rendered through a [`CursorLayer`]
//! - **Gateway**: room admission via [`RoomGateway`]; [`MemoryHub`] is the
//!   in-process relay
//! - **Autosave**: write-only snapshots in a [`LocalStore`]
//!
//! Every mutation of the shared document carries an [`Origin`]; the bridge's
//! observer skips events whose origin is [`Origin::Local`] so local edits never
//! echo back into the surface.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sg_collab::{init_study_guide, BridgeConfig, MemoryHost, MemoryHub, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = MemoryHub::new("quill");
//!     let mut host = MemoryHost::new();
//!     host.add_mount("study-guide-editor", &[("data-room-id", "r1"), ("data-user-display", "alice")]);
//!
//!     let config = BridgeConfig::default();
//!     if let Some(mut bridge) = init_study_guide(&mut host, &hub, Box::new(MemoryStore::new()), config).await {
//!         bridge.pump();
//!     }
//! }
//! ```

pub mod awareness;
pub mod bridge;
pub mod config;
pub mod cursors;
pub mod delta;
pub mod doc;
pub mod gateway;
pub mod protocol;
pub mod provider;
pub mod storage;
pub mod surface;
pub mod translate;

pub use awareness::{
    color_for_name, AwarenessState, AwarenessUpdate, ClientId, CursorRange, PresenceChannel,
    PresenceRecord, PresenceUser,
};
pub use bridge::{init_study_guide, Bridge, BridgeState};
pub use config::BridgeConfig;
pub use cursors::{apply_presence, CursorLayer, DecorationSummary, MemoryCursors};
pub use delta::{Delta, DeltaOp, DocumentContent, InsertValue, EMBED_PLACEHOLDER};
pub use doc::{AutomergeText, MemoryText, Origin, SharedText, TextEvent, TextOp, Transaction};
pub use gateway::{EnterOptions, MemoryHub, RoomGateway, RoomHandle, Session};
pub use protocol::RoomMessage;
pub use provider::{CollabProvider, MemoryProvider, ProviderEvent, RoomProvider};
pub use storage::{Autosave, FileStore, LocalStore, MemoryStore};
pub use surface::{
    ChangeSource, EditorHost, MemoryHost, MemorySurface, MountPoint, RichTextSurface, TextChange,
};
pub use translate::translate;

/// Common result type for bridge operations
pub type Result<T> = std::result::Result<T, CollabError>;

/// Errors that can occur while bridging the editor and the shared document
#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    #[error("Mount point not found: {mount_id}")]
    MountNotFound { mount_id: String },

    #[error("Room admission failed for {room_id}: {reason}")]
    RoomAdmission { room_id: String, reason: String },

    #[error("Bridge has not joined a room")]
    NotJoined,

    #[error("Delta translation failed: {0}")]
    Translation(String),

    #[error("Delta does not fit the document: {0}")]
    Delta(String),

    #[error("CRDT operation failed: {0}")]
    CrdtError(String),

    #[error("Editor surface error: {0}")]
    Surface(String),

    #[error("Cursor decoration failed for {client_id}: {reason}")]
    Decoration { client_id: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] sg_common::StudyGuideError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] anyhow::Error),
}

impl From<automerge::AutomergeError> for CollabError {
    fn from(e: automerge::AutomergeError) -> Self {
        CollabError::CrdtError(e.to_string())
    }
}
