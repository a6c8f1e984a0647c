//! Shared text document: the replicated side of the bridge

use crate::awareness::ClientId;
use crate::delta::Delta;
use automerge::{transaction::Transactable, AutoCommit, ObjId, ObjType, ReadDoc, Value, ROOT};
use serde::{Deserialize, Serialize};

/// Who caused a mutation of the shared document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Applied by this client's bridge from a surface edit
    Local,
    /// Received from a peer (or the relay during a resync)
    Remote(ClientId),
}

impl Origin {
    pub fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }
}

/// Primitive text mutation, indexed in characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOp {
    Insert { index: usize, text: String },
    Delete { index: usize, len: usize },
}

/// Ops applied together, tagged with their origin
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub origin: Origin,
    pub ops: Vec<TextOp>,
}

impl Transaction {
    pub fn local(ops: Vec<TextOp>) -> Self {
        Self {
            origin: Origin::Local,
            ops,
        }
    }

    pub fn remote(from: ClientId, ops: Vec<TextOp>) -> Self {
        Self {
            origin: Origin::Remote(from),
            ops,
        }
    }
}

/// Change notification emitted for every mutation, local or remote
#[derive(Debug, Clone, PartialEq)]
pub struct TextEvent {
    pub origin: Origin,
    /// Structured change, when the provider can describe one
    pub delta: Option<Delta>,
}

/// Replicated text the bridge mirrors the surface into
pub trait SharedText {
    fn text(&self) -> crate::Result<String>;

    fn len(&self) -> crate::Result<usize> {
        Ok(self.text()?.chars().count())
    }

    fn is_empty(&self) -> crate::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Apply every op of `txn` or none of them
    fn transact(&mut self, txn: Transaction) -> crate::Result<TextEvent>;
}

/// Apply ops to a character buffer, failing on out-of-range indices
pub(crate) fn apply_text_ops(chars: &mut Vec<char>, ops: &[TextOp]) -> crate::Result<()> {
    for op in ops {
        match op {
            TextOp::Insert { index, text } => {
                if *index > chars.len() {
                    return Err(crate::CollabError::CrdtError(format!(
                        "insert at {} beyond length {}",
                        index,
                        chars.len()
                    )));
                }
                chars.splice(*index..*index, text.chars());
            }
            TextOp::Delete { index, len } => {
                if index + len > chars.len() {
                    return Err(crate::CollabError::CrdtError(format!(
                        "delete {}..{} beyond length {}",
                        index,
                        index + len,
                        chars.len()
                    )));
                }
                chars.drain(*index..index + len);
            }
        }
    }
    Ok(())
}

/// Plain in-memory text, used where no replication is needed
#[derive(Debug, Clone, Default)]
pub struct MemoryText {
    content: String,
}

impl MemoryText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl SharedText for MemoryText {
    fn text(&self) -> crate::Result<String> {
        Ok(self.content.clone())
    }

    fn transact(&mut self, txn: Transaction) -> crate::Result<TextEvent> {
        let mut chars: Vec<char> = self.content.chars().collect();
        apply_text_ops(&mut chars, &txn.ops)?;

        let next: String = chars.into_iter().collect();
        let delta = Delta::diff_text(&self.content, &next);
        self.content = next;

        Ok(TextEvent {
            origin: txn.origin,
            delta: Some(delta),
        })
    }
}

/// Automerge document holding one text object under a named field
pub struct AutomergeText {
    doc: AutoCommit,
    text_id: ObjId,
}

impl AutomergeText {
    /// Create a fresh document with an empty text field
    pub fn create(field: &str) -> crate::Result<Self> {
        let mut doc = AutoCommit::new();
        let text_id = doc.put_object(ROOT, field, ObjType::Text)?;
        let _ = doc.commit();
        Ok(Self { doc, text_id })
    }

    /// Load a document saved with [`AutomergeText::save`]
    pub fn load(data: &[u8], field: &str) -> crate::Result<Self> {
        let doc = AutoCommit::load(data)?;
        let text_id = Self::find_text(&doc, field)?;
        Ok(Self { doc, text_id })
    }

    fn find_text(doc: &AutoCommit, field: &str) -> crate::Result<ObjId> {
        match doc.get(ROOT, field)? {
            Some((Value::Object(ObjType::Text), id)) => Ok(id),
            Some(_) => Err(crate::CollabError::CrdtError(format!(
                "field '{}' is not a text object",
                field
            ))),
            None => Err(crate::CollabError::CrdtError(format!(
                "field '{}' not found",
                field
            ))),
        }
    }

    /// Full document state
    pub fn save(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    /// Changes made since the previous call, ready to publish
    pub fn take_update(&mut self) -> Vec<u8> {
        self.doc.save_incremental()
    }

    /// Merge changes (or a whole saved document) received from a peer.
    ///
    /// Returns `None` when the text did not change, e.g. a duplicate update.
    pub fn apply_update(&mut self, data: &[u8], from: ClientId) -> crate::Result<Option<TextEvent>> {
        let before = self.text()?;
        self.doc.load_incremental(data)?;
        let after = self.text()?;

        if before == after {
            return Ok(None);
        }

        Ok(Some(TextEvent {
            origin: Origin::Remote(from),
            delta: Some(Delta::diff_text(&before, &after)),
        }))
    }
}

impl SharedText for AutomergeText {
    fn text(&self) -> crate::Result<String> {
        Ok(self.doc.text(&self.text_id)?)
    }

    fn len(&self) -> crate::Result<usize> {
        Ok(self.doc.length(&self.text_id))
    }

    fn transact(&mut self, txn: Transaction) -> crate::Result<TextEvent> {
        let before = self.text()?;

        // Dry run first so a bad op never leaves a half-applied change behind.
        let mut chars: Vec<char> = before.chars().collect();
        apply_text_ops(&mut chars, &txn.ops)?;

        for op in &txn.ops {
            let applied = match op {
                TextOp::Insert { index, text } => self.doc.splice_text(&self.text_id, *index, 0, text),
                TextOp::Delete { index, len } => {
                    self.doc.splice_text(&self.text_id, *index, *len as _, "")
                }
            };
            if let Err(e) = applied {
                self.doc.rollback();
                return Err(e.into());
            }
        }
        let _ = self.doc.commit();

        let after = self.text()?;
        Ok(TextEvent {
            origin: txn.origin,
            delta: Some(Delta::diff_text(&before, &after)),
        })
    }
}
