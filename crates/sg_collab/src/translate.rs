//! Surface delta -> shared-text operations

use crate::delta::{Delta, DeltaOp, InsertValue, EMBED_PLACEHOLDER};
use crate::doc::TextOp;

/// Translate a surface delta into shared-text operations, preserving order.
///
/// A retain advances the offset, an insert lands at the offset and advances
/// it by its length, a delete removes at the offset without advancing.
/// `doc_len` is the current length of the shared text; ops reaching past it
/// are rejected.
pub fn translate(delta: &Delta, doc_len: usize) -> crate::Result<Vec<TextOp>> {
    let mut ops = Vec::with_capacity(delta.ops().len());
    let mut offset: usize = 0;
    let mut len = doc_len;

    for op in delta.ops() {
        match op {
            DeltaOp::Retain { retain, .. } => {
                offset = offset
                    .checked_add(*retain)
                    .filter(|end| *end <= len)
                    .ok_or_else(|| {
                        crate::CollabError::Translation(format!(
                            "retain {} at offset {} exceeds length {}",
                            retain, offset, len
                        ))
                    })?;
            }
            DeltaOp::Insert { insert, .. } => {
                let text = match insert {
                    InsertValue::Text(text) => text.clone(),
                    InsertValue::Embed(_) => EMBED_PLACEHOLDER.to_string(),
                };
                let inserted = text.chars().count();
                if inserted == 0 {
                    continue;
                }
                ops.push(TextOp::Insert {
                    index: offset,
                    text,
                });
                offset += inserted;
                len += inserted;
            }
            DeltaOp::Delete { delete } => {
                if *delete == 0 {
                    continue;
                }
                let in_range = offset.checked_add(*delete).is_some_and(|end| end <= len);
                if !in_range {
                    return Err(crate::CollabError::Translation(format!(
                        "delete {} at offset {} exceeds length {}",
                        delete, offset, len
                    )));
                }
                ops.push(TextOp::Delete {
                    index: offset,
                    len: *delete,
                });
                len -= delete;
            }
        }
    }

    Ok(ops)
}
