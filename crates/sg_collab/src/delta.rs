//! Rich-text deltas: ordered retain/insert/delete operations
//!
//! The JSON form matches what the editor emits (`{"ops":[{"insert":"hi"}]}`).
//! Lengths are counted in Unicode scalar values and every embed counts as one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Codepoint standing in for a non-text embed inside plain text
pub const EMBED_PLACEHOLDER: char = '\u{FFFC}';

/// Content of an insert operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsertValue {
    Text(String),
    /// Image, formula, video... anything that is not a run of characters
    Embed(Map<String, Value>),
}

impl InsertValue {
    pub fn len(&self) -> usize {
        match self {
            InsertValue::Text(text) => text.chars().count(),
            InsertValue::Embed(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single delta operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeltaOp {
    Insert {
        insert: InsertValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Map<String, Value>>,
    },
    Retain {
        retain: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Map<String, Value>>,
    },
    Delete {
        delete: usize,
    },
}

impl DeltaOp {
    pub fn len(&self) -> usize {
        match self {
            DeltaOp::Insert { insert, .. } => insert.len(),
            DeltaOp::Retain { retain, .. } => *retain,
            DeltaOp::Delete { delete } => *delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered list of operations describing either a change or a whole document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    ops: Vec<DeltaOp>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ops(ops: Vec<DeltaOp>) -> Self {
        Self { ops }
    }

    /// Document delta holding `text` as a single insert
    pub fn from_text(text: &str) -> Self {
        Self::new().insert(text)
    }

    pub fn ops(&self) -> &[DeltaOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn insert(self, text: impl Into<String>) -> Self {
        self.push(DeltaOp::Insert {
            insert: InsertValue::Text(text.into()),
            attributes: None,
        })
    }

    pub fn insert_embed(self, embed: Map<String, Value>) -> Self {
        self.push(DeltaOp::Insert {
            insert: InsertValue::Embed(embed),
            attributes: None,
        })
    }

    pub fn retain(self, count: usize) -> Self {
        self.push(DeltaOp::Retain {
            retain: count,
            attributes: None,
        })
    }

    pub fn delete(self, count: usize) -> Self {
        self.push(DeltaOp::Delete { delete: count })
    }

    fn push(mut self, op: DeltaOp) -> Self {
        if !op.is_empty() {
            self.ops.push(op);
        }
        self
    }

    /// Minimal change turning `old` into `new`: common prefix and suffix are
    /// retained, the differing middle is replaced.
    pub fn diff_text(old: &str, new: &str) -> Self {
        let old: Vec<char> = old.chars().collect();
        let new: Vec<char> = new.chars().collect();

        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let max_suffix = old.len().min(new.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();

        let inserted: String = new[prefix..new.len() - suffix].iter().collect();

        Self::new()
            .retain(prefix)
            .insert(inserted)
            .delete(old.len() - prefix - suffix)
            .chop()
    }

    /// Drop a trailing plain retain; it changes nothing
    pub fn chop(mut self) -> Self {
        if let Some(DeltaOp::Retain {
            attributes: None, ..
        }) = self.ops.last()
        {
            self.ops.pop();
        }
        self
    }

    /// Plain text of a document delta; embeds become [`EMBED_PLACEHOLDER`]
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for op in &self.ops {
            if let DeltaOp::Insert { insert, .. } = op {
                match insert {
                    InsertValue::Text(t) => text.push_str(t),
                    InsertValue::Embed(_) => text.push(EMBED_PLACEHOLDER),
                }
            }
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Char(char),
    Embed(Map<String, Value>),
}

/// Materialised document a delta can be applied to
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentContent {
    items: Vec<Item>,
}

impl DocumentContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a document delta (inserts only)
    pub fn from_delta(delta: &Delta) -> crate::Result<Self> {
        let mut content = Self::new();
        content.apply(delta)?;
        if content.len() != delta.ops().iter().map(DeltaOp::len).sum::<usize>() {
            return Err(crate::CollabError::Delta(
                "document deltas may only contain inserts".to_string(),
            ));
        }
        Ok(content)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply a change delta. Nothing is modified when the delta does not fit.
    pub fn apply(&mut self, delta: &Delta) -> crate::Result<()> {
        let mut next = Vec::with_capacity(self.items.len());
        let mut cursor: usize = 0;

        for op in delta.ops() {
            match op {
                DeltaOp::Retain { retain, .. } => {
                    let end = cursor
                        .checked_add(*retain)
                        .filter(|end| *end <= self.items.len())
                        .ok_or_else(|| {
                            crate::CollabError::Delta(format!(
                                "retain {} at {} runs past length {}",
                                retain,
                                cursor,
                                self.items.len()
                            ))
                        })?;
                    next.extend_from_slice(&self.items[cursor..end]);
                    cursor = end;
                }
                DeltaOp::Insert { insert, .. } => match insert {
                    InsertValue::Text(text) => next.extend(text.chars().map(Item::Char)),
                    InsertValue::Embed(embed) => next.push(Item::Embed(embed.clone())),
                },
                DeltaOp::Delete { delete } => {
                    let end = cursor
                        .checked_add(*delete)
                        .filter(|end| *end <= self.items.len())
                        .ok_or_else(|| {
                            crate::CollabError::Delta(format!(
                                "delete {} at {} runs past length {}",
                                delete,
                                cursor,
                                self.items.len()
                            ))
                        })?;
                    cursor = end;
                }
            }
        }

        next.extend_from_slice(&self.items[cursor..]);
        self.items = next;
        Ok(())
    }

    /// Render back to a document delta, merging adjacent characters
    pub fn to_delta(&self) -> Delta {
        let mut delta = Delta::new();
        let mut run = String::new();

        for item in &self.items {
            match item {
                Item::Char(c) => run.push(*c),
                Item::Embed(embed) => {
                    delta = delta.insert(std::mem::take(&mut run));
                    delta = delta.insert_embed(embed.clone());
                }
            }
        }
        delta.insert(run)
    }

    pub fn plain_text(&self) -> String {
        self.items
            .iter()
            .map(|item| match item {
                Item::Char(c) => *c,
                Item::Embed(_) => EMBED_PLACEHOLDER,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image() -> Map<String, Value> {
        let mut embed = Map::new();
        embed.insert("image".to_string(), json!("https://example.com/graph.png"));
        embed
    }

    #[test]
    fn test_wire_shape_matches_editor() {
        let delta = Delta::new().retain(3).insert("hi").delete(2);
        let value = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            value,
            json!({"ops": [{"retain": 3}, {"insert": "hi"}, {"delete": 2}]})
        );

        let parsed: Delta = serde_json::from_value(json!({
            "ops": [
                {"retain": 1, "attributes": {"bold": true}},
                {"insert": {"image": "a.png"}},
                {"delete": 4}
            ]
        }))
        .unwrap();

        assert!(matches!(parsed.ops()[0], DeltaOp::Retain { retain: 1, attributes: Some(_) }));
        assert!(matches!(
            parsed.ops()[1],
            DeltaOp::Insert { insert: InsertValue::Embed(_), .. }
        ));
        assert!(matches!(parsed.ops()[2], DeltaOp::Delete { delete: 4 }));
    }

    #[test]
    fn test_zero_length_ops_are_dropped() {
        let delta = Delta::new().retain(0).insert("").delete(0);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_diff_text_replaces_middle() {
        let delta = Delta::diff_text("the cat sat", "the dog sat");
        assert_eq!(delta, Delta::new().retain(4).insert("dog").delete(3));

        let mut doc = DocumentContent::from_delta(&Delta::from_text("the cat sat")).unwrap();
        doc.apply(&delta).unwrap();
        assert_eq!(doc.plain_text(), "the dog sat");
    }

    #[test]
    fn test_diff_text_repeated_characters() {
        // Prefix and suffix must not overlap on runs like "aaa" -> "aa".
        let delta = Delta::diff_text("aaa", "aa");
        let mut doc = DocumentContent::from_delta(&Delta::from_text("aaa")).unwrap();
        doc.apply(&delta).unwrap();
        assert_eq!(doc.plain_text(), "aa");

        assert!(Delta::diff_text("same", "same").is_empty());
    }

    #[test]
    fn test_apply_rejects_overlong_retain_without_mutating() {
        let mut doc = DocumentContent::from_delta(&Delta::from_text("abc")).unwrap();
        let err = doc.apply(&Delta::new().retain(5).insert("x")).unwrap_err();
        assert!(err.to_string().contains("retain 5"));
        assert_eq!(doc.plain_text(), "abc");
    }

    #[test]
    fn test_apply_rejects_counts_that_would_overflow() {
        let mut doc = DocumentContent::from_delta(&Delta::from_text("abc")).unwrap();
        let huge: Delta =
            serde_json::from_str(r#"{"ops":[{"retain":1},{"retain":18446744073709551615}]}"#)
                .unwrap();
        assert!(matches!(doc.apply(&huge), Err(crate::CollabError::Delta(_))));

        let huge = Delta::new().retain(2).delete(usize::MAX);
        assert!(matches!(doc.apply(&huge), Err(crate::CollabError::Delta(_))));
        assert_eq!(doc.plain_text(), "abc");
    }

    #[test]
    fn test_chop_keeps_formatting_retains() {
        assert!(Delta::new().retain(4).chop().is_empty());
        assert_eq!(
            Delta::new().insert("a").retain(2).chop(),
            Delta::new().insert("a")
        );

        let mut bold = Map::new();
        bold.insert("bold".to_string(), json!(true));
        let formatted = Delta::from_ops(vec![DeltaOp::Retain {
            retain: 3,
            attributes: Some(bold),
        }]);
        assert_eq!(formatted.clone().chop(), formatted);
    }

    #[test]
    fn test_embeds_render_as_placeholder() {
        let delta = Delta::new().insert("see ").insert_embed(image()).insert(" above");
        let doc = DocumentContent::from_delta(&delta).unwrap();

        assert_eq!(doc.len(), 11);
        assert_eq!(doc.plain_text(), format!("see {} above", EMBED_PLACEHOLDER));
        assert_eq!(doc.to_delta(), delta);
    }

    #[test]
    fn test_document_delta_cannot_delete() {
        assert!(DocumentContent::from_delta(&Delta::new().delete(1)).is_err());
    }
}
