//! Syntax-tree traversal and path matching.
//!
//! [`walk`] visits every addressable node of a [`SyntaxTree`] once, handing
//! the visitor the node's canonical path. [`PathMatcher`] is the visitor
//! that turns the mapping entry at one target path into a [`Patch`](crate::patch::Patch).

use crate::error::{ExtractError, Result};
use crate::patch::PatchCollector;
use crate::path::{FieldPath, Segment};
use crate::syntax::{Entry, Node, NodeKind, SyntaxTree};

/// What [`walk`] hands to a [`Visitor`].
#[derive(Debug, Clone, Copy)]
pub enum Visited<'t> {
    /// The document root.
    Root(&'t Node),
    /// A mapping entry. `flow` is set inside `{...}` collections.
    Entry { entry: &'t Entry, flow: bool },
    /// The value node of the entry visited just before, same path.
    Value(&'t Node),
    /// An item of a sequence.
    Item { node: &'t Node, flow: bool },
}

pub trait Visitor {
    fn visit(&mut self, path: &FieldPath, visited: Visited<'_>);
}

/// Depth-first, document-order traversal. Entries with complex keys are
/// not addressable and are skipped along with their subtrees.
pub fn walk<V: Visitor + ?Sized>(tree: &SyntaxTree, visitor: &mut V) {
    if let Some(root) = tree.root() {
        let mut path = FieldPath::root();
        visitor.visit(&path, Visited::Root(root));
        walk_children(root, &mut path, visitor);
    }
}

fn walk_children<V: Visitor + ?Sized>(node: &Node, path: &mut FieldPath, visitor: &mut V) {
    match &node.kind {
        NodeKind::Mapping(entries) => {
            for entry in entries {
                let Some(key) = &entry.key else { continue };
                path.push(Segment::Field(key.clone()));
                visitor.visit(
                    path,
                    Visited::Entry {
                        entry,
                        flow: node.flow,
                    },
                );
                visitor.visit(path, Visited::Value(&entry.value));
                walk_children(&entry.value, path, visitor);
                path.pop();
            }
        }
        NodeKind::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(Segment::Index(i as i64));
                visitor.visit(
                    path,
                    Visited::Item {
                        node: item,
                        flow: node.flow,
                    },
                );
                walk_children(item, path, visitor);
                path.pop();
            }
        }
        NodeKind::Scalar(_) | NodeKind::Alias => {}
    }
}

/// Emits a patch for every mapping entry whose canonical path equals the
/// target.
pub struct PathMatcher<'a> {
    target: String,
    source: &'a [u8],
    collector: &'a mut PatchCollector,
    matched: usize,
    unpatchable: Option<String>,
}

impl<'a> PathMatcher<'a> {
    pub fn new(target: &FieldPath, source: &'a [u8], collector: &'a mut PatchCollector) -> Self {
        Self {
            target: target.canonical(),
            source,
            collector,
            matched: 0,
            unpatchable: None,
        }
    }

    /// Walk `tree` and report the outcome: the number of patches emitted, or
    /// why none could be.
    pub fn run(mut self, tree: &SyntaxTree) -> Result<usize> {
        walk(tree, &mut self);
        if self.matched > 0 {
            return Ok(self.matched);
        }
        match self.unpatchable {
            Some(reason) => Err(ExtractError::UnpatchableNode {
                path: self.target,
                reason,
            }),
            None => Err(ExtractError::PatchNotFound { path: self.target }),
        }
    }

    fn refuse(&mut self, reason: &str) {
        if self.unpatchable.is_none() {
            self.unpatchable = Some(reason.to_string());
        }
    }
}

impl Visitor for PathMatcher<'_> {
    fn visit(&mut self, path: &FieldPath, visited: Visited<'_>) {
        if matches!(visited, Visited::Value(_)) || path.canonical() != self.target {
            return;
        }
        match visited {
            Visited::Root(_) => self.refuse("the document root has no entry to rewrite"),
            Visited::Item { .. } => self.refuse("sequence items have no key to keep"),
            Visited::Entry { flow: true, .. } => {
                self.refuse("entries of flow collections cannot hold a multi-line expression")
            }
            Visited::Entry { entry, flow: false } => match entry.indicator {
                None => self.refuse("value indicator not found"),
                Some(colon) => {
                    let (begin, end) = entry_span(self.source, entry, colon);
                    log::debug!(
                        target: "helm_dump::patch",
                        "{}: bytes {}..{}",
                        self.target,
                        begin,
                        end
                    );
                    self.collector.add_patch(self.target.clone(), begin, end);
                    self.matched += 1;
                }
            },
            Visited::Value(_) => {}
        }
    }
}

/// Begin and end offsets of the patch for `entry`, whose `:` is at `colon`.
fn entry_span(source: &[u8], entry: &Entry, colon: usize) -> (usize, usize) {
    let len = source.len();
    if len == 0 {
        return (0, 0);
    }
    let colon = colon.min(len.saturating_sub(1));
    let line_end = source[colon..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(len, |p| colon + p);

    let rest = trim_start(&source[colon + 1..line_end]);
    let inline = !rest.is_empty() && rest[0] != b'#';
    let begin = if inline && source.get(colon + 1) == Some(&b' ') {
        colon + 1
    } else {
        colon
    };

    let floor = (line_end + 1).min(len);
    let following = entry.value.span.end;
    let mut end = if following >= len {
        len
    } else {
        line_start(source, following)
    };

    let key_column = entry.key_span.start - line_start(source, entry.key_span.start);
    while end > floor {
        let previous = line_start(source, end - 1);
        if !is_trailing_trivia(&source[previous..end], key_column) {
            break;
        }
        end = previous;
    }
    (begin, end.max(floor))
}

fn line_start(source: &[u8], offset: usize) -> usize {
    source[..offset.min(source.len())]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |p| p + 1)
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r'))
        .count();
    &bytes[skip..]
}

/// Blank lines, and comments no deeper than the key, belong after the entry.
fn is_trailing_trivia(line: &[u8], key_column: usize) -> bool {
    let indent = line.iter().take_while(|&&b| b == b' ').count();
    match trim_start(line).first() {
        None | Some(b'\n') => true,
        Some(b'#') => indent <= key_column,
        Some(_) => false,
    }
}
