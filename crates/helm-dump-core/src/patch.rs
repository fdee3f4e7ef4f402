//! Byte-span patches.
//!
//! A [`Patch`] records which bytes of the *original* document hold an
//! extracted literal. Applying it splices in a reference expression:
//!
//! ```text
//! data[..=begin] ++ "{{ .Values.<key> }}\n" ++ data[end..]
//! ```
//!
//! Every application changes the length of the buffer, so a document's
//! patches are always applied from the highest `begin_offset` down
//! ([`PatchPlan::apply`]). Applying them in any other order shifts the text
//! under the offsets of the patches not yet applied.

use crate::error::{ExtractError, Result};

/// Reference expression written in place of an extracted literal.
pub fn reference_expression(values_key: &str) -> String {
    format!("{{{{ .Values.{} }}}}\n", values_key)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Canonical path of the patched entry.
    pub path: String,
    /// Last byte kept in front of the replacement.
    pub begin_offset: usize,
    /// First byte kept after the replacement.
    pub end_offset: usize,
}

impl Patch {
    /// Bytes replaced by this patch, `[begin + 1, end)`.
    pub fn replaced(&self) -> std::ops::Range<usize> {
        self.begin_offset + 1..self.end_offset.max(self.begin_offset + 1)
    }

    pub fn overlaps(&self, other: &Patch) -> bool {
        let a = self.replaced();
        let b = other.replaced();
        a.start < b.end && b.start < a.end
    }

    /// Apply this patch alone to `data`.
    ///
    /// When the kept prefix ends with the `:` indicator (the value started
    /// on a later line), a single space separates it from the expression.
    /// Offsets beyond the buffer are clamped.
    pub fn apply(&self, values_key: &str, data: &[u8]) -> Vec<u8> {
        if data.is_empty() {
            return reference_expression(values_key).into_bytes();
        }
        let begin = self.begin_offset.min(data.len() - 1);
        let end = self.end_offset.clamp(begin + 1, data.len());

        let expression = reference_expression(values_key);
        let mut out = Vec::with_capacity(data.len() + expression.len() + 1);
        out.extend_from_slice(&data[..=begin]);
        if data[begin] == b':' {
            out.push(b' ');
        }
        out.extend_from_slice(expression.as_bytes());
        out.extend_from_slice(&data[end..]);
        out
    }
}

/// Collects the patches found by one or more matcher passes over a document.
#[derive(Debug, Default)]
pub struct PatchCollector {
    patches: Vec<Patch>,
}

impl PatchCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_patch(&mut self, path: impl Into<String>, begin_offset: usize, end_offset: usize) {
        self.patches.push(Patch {
            path: path.into(),
            begin_offset,
            end_offset,
        });
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Hand over the collected patches, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Patch> {
        std::mem::take(&mut self.patches)
    }
}

/// The patches planned for one document, each with its values key.
#[derive(Debug, Default)]
pub struct PatchPlan {
    entries: Vec<(Patch, String)>,
}

impl PatchPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `patches` fit into the plan without overlapping each other
    /// or anything already planned.
    pub fn check(&self, patches: &[Patch]) -> Result<()> {
        for (i, patch) in patches.iter().enumerate() {
            let planned = self.entries.iter().map(|(p, _)| p);
            let earlier = patches[..i].iter();
            if let Some(other) = planned.chain(earlier).find(|p| p.overlaps(patch)) {
                return Err(ExtractError::PatchOverlap {
                    path: patch.path.clone(),
                    other: other.path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Add `patches` for `values_key`; all or nothing.
    pub fn add(&mut self, patches: Vec<Patch>, values_key: &str) -> Result<()> {
        self.check(&patches)?;
        self.entries
            .extend(patches.into_iter().map(|p| (p, values_key.to_string())));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every planned patch to `original`, highest offset first.
    pub fn apply(mut self, original: &[u8]) -> Vec<u8> {
        self.entries
            .sort_by(|(a, _), (b, _)| b.begin_offset.cmp(&a.begin_offset));
        self.entries
            .iter()
            .fold(original.to_vec(), |data, (patch, key)| patch.apply(key, &data))
    }
}
