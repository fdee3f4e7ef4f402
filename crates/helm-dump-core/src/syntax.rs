//! Syntax tree with byte spans.
//!
//! The tree is built from the YAML event stream of the first document in a
//! file. It is never used to regenerate text: its only job is to tell, for
//! any node, where it starts and where the token following it starts, in
//! byte offsets of the original source, and for every mapping entry where
//! its `:` indicator sits.

use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::Marker;

use crate::error::{ExtractError, Result};

/// Byte range `[start, end)`; `end` is the start of the following token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Scalar(String),
    Mapping(Vec<Entry>),
    Sequence(Vec<Node>),
    Alias,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    /// Flow collection (`{...}` / `[...]`).
    pub flow: bool,
}

/// A `key: value` pair of a mapping.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Scalar key text; `None` for complex keys.
    pub key: Option<String>,
    pub key_span: Span,
    /// Byte offset of the `:` value indicator, when it could be located.
    pub indicator: Option<usize>,
    pub value: Node,
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    root: Option<Node>,
    source_len: usize,
}

impl SyntaxTree {
    pub fn parse(source: &str) -> Result<Self> {
        let mut log = EventLog::default();
        let mut parser = Parser::new_from_str(source);
        parser
            .load(&mut log, false)
            .map_err(|e| ExtractError::Syntax(e.to_string()))?;

        let offsets = ByteOffsets::new(source);
        let events = log
            .events
            .into_iter()
            .map(|(event, index)| (event, offsets.byte(index)))
            .collect();

        let mut builder = Builder {
            source: source.as_bytes(),
            events,
            pos: 0,
        };
        let root = builder.document()?;
        Ok(Self {
            root,
            source_len: source.len(),
        })
    }

    /// Root node, `None` for an empty document.
    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }
}

#[derive(Default)]
struct EventLog {
    events: Vec<(Event, usize)>,
}

impl MarkedEventReceiver for EventLog {
    fn on_event(&mut self, event: Event, mark: Marker) {
        self.events.push((event, mark.index()));
    }
}

/// Maps the scanner's character indices to byte offsets.
struct ByteOffsets {
    table: Option<Vec<usize>>,
    len: usize,
}

impl ByteOffsets {
    fn new(source: &str) -> Self {
        let table = if source.is_ascii() {
            None
        } else {
            Some(source.char_indices().map(|(b, _)| b).collect())
        };
        Self {
            table,
            len: source.len(),
        }
    }

    fn byte(&self, char_index: usize) -> usize {
        match &self.table {
            None => char_index.min(self.len),
            Some(table) => table.get(char_index).copied().unwrap_or(self.len),
        }
    }
}

struct Builder<'s> {
    source: &'s [u8],
    events: Vec<(Event, usize)>,
    pos: usize,
}

impl Builder<'_> {
    fn document(&mut self) -> Result<Option<Node>> {
        while let Some((event, _)) = self.events.get(self.pos) {
            if starts_node(event) {
                return self.node().map(Some);
            }
            if matches!(event, Event::StreamEnd) {
                break;
            }
            self.pos += 1;
        }
        Ok(None)
    }

    /// Offset of the next unconsumed event, i.e. the following token.
    fn following(&self) -> usize {
        self.events
            .get(self.pos)
            .map(|(_, offset)| *offset)
            .unwrap_or(self.source.len())
    }

    fn node(&mut self) -> Result<Node> {
        let (event, start) = match self.events.get(self.pos) {
            Some((event, start)) => (event.clone(), *start),
            None => return Err(ExtractError::Syntax("unexpected end of event stream".into())),
        };
        self.pos += 1;

        match event {
            Event::Scalar(value, ..) => Ok(Node {
                kind: NodeKind::Scalar(value),
                span: Span {
                    start,
                    end: self.following(),
                },
                flow: false,
            }),
            Event::Alias(..) => Ok(Node {
                kind: NodeKind::Alias,
                span: Span {
                    start,
                    end: self.following(),
                },
                flow: false,
            }),
            Event::MappingStart(..) => {
                let flow = opens_flow(self.source, start, b'{');
                let mut entries = Vec::new();
                loop {
                    match self.events.get(self.pos) {
                        Some((Event::MappingEnd, _)) => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => {
                            let key = self.node()?;
                            let value = self.node()?;
                            let key_text = match &key.kind {
                                NodeKind::Scalar(text) => Some(text.clone()),
                                _ => None,
                            };
                            let indicator = match key_text {
                                Some(_) => find_indicator(self.source, key.span.start),
                                None => None,
                            };
                            entries.push(Entry {
                                key: key_text,
                                key_span: key.span,
                                indicator,
                                value,
                            });
                        }
                        None => {
                            return Err(ExtractError::Syntax("unterminated mapping".into()))
                        }
                    }
                }
                Ok(Node {
                    kind: NodeKind::Mapping(entries),
                    span: Span {
                        start,
                        end: self.following(),
                    },
                    flow,
                })
            }
            Event::SequenceStart(..) => {
                let flow = opens_flow(self.source, start, b'[');
                let mut items = Vec::new();
                loop {
                    match self.events.get(self.pos) {
                        Some((Event::SequenceEnd, _)) => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => items.push(self.node()?),
                        None => {
                            return Err(ExtractError::Syntax("unterminated sequence".into()))
                        }
                    }
                }
                Ok(Node {
                    kind: NodeKind::Sequence(items),
                    span: Span {
                        start,
                        end: self.following(),
                    },
                    flow,
                })
            }
            other => Err(ExtractError::Syntax(format!(
                "unexpected event {:?} at byte {}",
                other, start
            ))),
        }
    }
}

fn starts_node(event: &Event) -> bool {
    matches!(
        event,
        Event::Scalar(..) | Event::Alias(..) | Event::MappingStart(..) | Event::SequenceStart(..)
    )
}

/// Whether the collection starting at `start` opens with `bracket`, past
/// any anchor or tag properties.
fn opens_flow(source: &[u8], start: usize, bracket: u8) -> bool {
    let mut i = start;
    while let Some(&b) = source.get(i) {
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'&' | b'!' => {
                while source.get(i).is_some_and(|c| !c.is_ascii_whitespace()) {
                    i += 1;
                }
            }
            _ => return b == bracket,
        }
    }
    false
}

/// Locate the `:` that ends the key starting at `key_start`.
///
/// Quoted keys are skipped as a unit; for plain keys the indicator is the
/// first `:` followed by whitespace or end of input on the key's line.
fn find_indicator(source: &[u8], key_start: usize) -> Option<usize> {
    let mut i = key_start;
    match source.get(i) {
        Some(b'"') => {
            i += 1;
            while i < source.len() {
                match source[i] {
                    b'\\' => i += 2,
                    b'"' => break,
                    _ => i += 1,
                }
            }
            i += 1;
        }
        Some(b'\'') => {
            i += 1;
            while i < source.len() {
                if source[i] == b'\'' {
                    if source.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    break;
                }
                i += 1;
            }
            i += 1;
        }
        _ => {}
    }

    while i < source.len() {
        match source[i] {
            b'\n' => return None,
            b':' => {
                let next = source.get(i + 1);
                if next.map_or(true, |c| c.is_ascii_whitespace()) {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
