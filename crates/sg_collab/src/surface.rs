//! Rich-text surface seam and its mount contract

use crate::awareness::CursorRange;
use crate::cursors::{CursorLayer, MemoryCursors};
use crate::delta::{Delta, DocumentContent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Mount attribute carrying the room identifier
pub const ROOM_ATTRIBUTE: &str = "data-room-id";

/// Mount attribute carrying the participant's display name
pub const USER_ATTRIBUTE: &str = "data-user-display";

/// What caused a surface change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// Keystrokes, paste, toolbar clicks
    User,
    /// Programmatic change, e.g. a remote edit applied by the bridge
    Api,
}

/// Change event emitted by the surface
#[derive(Debug, Clone, PartialEq)]
pub struct TextChange {
    pub delta: Delta,
    pub source: ChangeSource,
}

/// Embedded editor as seen by the bridge
pub trait RichTextSurface {
    /// Whole document as a delta of inserts
    fn contents(&self) -> Delta;

    /// Plain text, embeds rendered as placeholders
    fn text(&self) -> String;

    /// Apply a change and return the change event it emits
    fn update_contents(&mut self, delta: &Delta, source: ChangeSource) -> crate::Result<TextChange>;

    /// Replace the whole document and return the change event it emits
    fn set_contents(&mut self, contents: &Delta, source: ChangeSource) -> crate::Result<TextChange>;

    fn selection(&self) -> Option<CursorRange>;

    fn set_selection(&mut self, range: Option<CursorRange>);
}

/// Element the editor is mounted on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub id: String,
    attributes: HashMap<String, String>,
}

impl MountPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Attribute value; blank values count as absent
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn room_id(&self, default: &str) -> String {
        self.attribute(ROOM_ATTRIBUTE).unwrap_or(default).to_string()
    }

    pub fn user_display(&self, default: &str) -> String {
        self.attribute(USER_ATTRIBUTE).unwrap_or(default).to_string()
    }
}

/// Page hosting the editor: finds the mount point and builds the surface
pub trait EditorHost {
    fn find_mount(&self, mount_id: &str) -> Option<MountPoint>;

    /// Register the cursor-decoration extension. Must precede `create_surface`.
    fn register_cursor_module(&mut self) -> Box<dyn CursorLayer>;

    fn create_surface(&mut self, mount: &MountPoint) -> crate::Result<Box<dyn RichTextSurface>>;
}

#[derive(Debug, Default)]
struct SurfaceInner {
    content: DocumentContent,
    selection: Option<CursorRange>,
    user_changes: usize,
    api_changes: usize,
}

/// In-memory surface; clones share the same document
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    inner: Arc<Mutex<SurfaceInner>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of changes applied with [`ChangeSource::User`]
    pub fn user_changes(&self) -> usize {
        self.lock().user_changes
    }

    /// Number of changes applied programmatically
    pub fn api_changes(&self) -> usize {
        self.lock().api_changes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SurfaceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn count(inner: &mut SurfaceInner, source: ChangeSource) {
        match source {
            ChangeSource::User => inner.user_changes += 1,
            ChangeSource::Api => inner.api_changes += 1,
        }
    }
}

impl RichTextSurface for MemorySurface {
    fn contents(&self) -> Delta {
        self.lock().content.to_delta()
    }

    fn text(&self) -> String {
        self.lock().content.plain_text()
    }

    fn update_contents(&mut self, delta: &Delta, source: ChangeSource) -> crate::Result<TextChange> {
        let mut inner = self.lock();
        inner.content.apply(delta)?;
        Self::count(&mut inner, source);
        Ok(TextChange {
            delta: delta.clone(),
            source,
        })
    }

    fn set_contents(&mut self, contents: &Delta, source: ChangeSource) -> crate::Result<TextChange> {
        let next = DocumentContent::from_delta(contents)?;
        let mut inner = self.lock();
        let old_len = inner.content.len();
        inner.content = next;
        let len = inner.content.len();
        inner.selection = inner.selection.map(|r| r.clamp_to(len));
        Self::count(&mut inner, source);

        let mut delta = Delta::from_ops(contents.ops().to_vec());
        delta = delta.delete(old_len);
        Ok(TextChange { delta, source })
    }

    fn selection(&self) -> Option<CursorRange> {
        self.lock().selection
    }

    fn set_selection(&mut self, range: Option<CursorRange>) {
        let mut inner = self.lock();
        let len = inner.content.len();
        inner.selection = range.map(|r| r.clamp_to(len));
    }
}

/// In-memory page: a set of mount points and a log of host calls
#[derive(Debug, Default)]
pub struct MemoryHost {
    mounts: HashMap<String, MountPoint>,
    cursors: MemoryCursors,
    surface: Option<MemorySurface>,
    cursors_registered: bool,
    calls: Vec<&'static str>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mount(&mut self, id: &str, attributes: &[(&str, &str)]) {
        let mount = attributes
            .iter()
            .fold(MountPoint::new(id), |m, (name, value)| m.with_attribute(name, value));
        self.mounts.insert(id.to_string(), mount);
    }

    /// Shared handle on the cursor layer handed to the bridge
    pub fn cursors(&self) -> MemoryCursors {
        self.cursors.clone()
    }

    /// Shared handle on the last surface built
    pub fn surface(&self) -> Option<MemorySurface> {
        self.surface.clone()
    }

    /// Host calls in the order they were made
    pub fn calls(&self) -> &[&'static str] {
        &self.calls
    }
}

impl EditorHost for MemoryHost {
    fn find_mount(&self, mount_id: &str) -> Option<MountPoint> {
        self.mounts.get(mount_id).cloned()
    }

    fn register_cursor_module(&mut self) -> Box<dyn CursorLayer> {
        self.calls.push("register_cursor_module");
        self.cursors_registered = true;
        Box::new(self.cursors.clone())
    }

    fn create_surface(&mut self, mount: &MountPoint) -> crate::Result<Box<dyn RichTextSurface>> {
        self.calls.push("create_surface");
        if !self.cursors_registered {
            return Err(crate::CollabError::Surface(format!(
                "cursor module must be registered before building the editor on '{}'",
                mount.id
            )));
        }
        let surface = MemorySurface::new();
        self.surface = Some(surface.clone());
        Ok(Box::new(surface))
    }
}
