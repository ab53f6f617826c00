//! Tolerant tree building over `quick-xml` events.
//!
//! Corpus files are a run of sibling `<REUTERS>` fragments with no enclosing
//! root, sprinkled with bare `&`, control bytes and the odd unbalanced tag.
//! [`MarkupLoader`] wraps the content in a synthetic root and builds a small
//! arena tree, repairing instead of failing:
//!
//! - an end tag closes the nearest open element with the same name and
//!   everything opened after it; an end tag with no open match is ignored;
//! - elements still open at end of input are closed;
//! - a `<` that does not start a tag name, or that opens markup the
//!   tokenizer rejects, is kept as a literal `<` and tokenizing resumes
//!   right after it;
//! - entity and character references are decoded, references to characters
//!   XML forbids are dropped, unknown references stay literal.

use std::fmt;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::DecodeError;

/// Tag of the synthesized root wrapping a whole file.
pub const ROOT_TAG: &str = "root";
/// Tag of one document fragment.
pub const FRAGMENT_TAG: &str = "REUTERS";

const ROOT_ID: usize = 0;
const MAX_REFERENCE_LEN: usize = 10;

/// Read-only access to one element of a parsed tree.
pub trait ElementView: Sized {
    /// Element name as written in the source.
    fn tag(&self) -> &str;

    /// Value of the attribute `name`, if present.
    fn attribute(&self, name: &str) -> Option<&str>;

    /// First direct child named `tag`.
    fn child(&self, tag: &str) -> Option<Self>;

    /// All elements reached by a `/`-separated path of child tags, in document order.
    fn children_at(&self, path: &str) -> Vec<Self>;

    /// Direct text content; `None` when the element holds no text of its own.
    fn text(&self) -> Option<&str>;
}

#[derive(Clone, Debug)]
struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<usize>,
}

impl NodeData {
    fn new(tag: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            tag,
            attributes,
            text: None,
            children: Vec::new(),
        }
    }
}

/// A parsed corpus file: the synthetic root and everything recovered below it.
#[derive(Clone, Debug)]
pub struct MarkupTree {
    nodes: Vec<NodeData>,
    fragment_tag: String,
    recovered_errors: usize,
}

impl MarkupTree {
    /// The synthesized root element.
    pub fn root(&self) -> Element<'_> {
        Element {
            tree: self,
            id: ROOT_ID,
        }
    }

    /// Top-level document fragments in source order.
    pub fn fragments(&self) -> impl Iterator<Item = Element<'_>> + '_ {
        self.root()
            .children()
            .filter(move |el| el.tag() == self.fragment_tag)
    }

    /// Number of stray `<` kept as text while building the tree.
    pub fn recovered_errors(&self) -> usize {
        self.recovered_errors
    }

    fn node(&self, id: usize) -> &NodeData {
        &self.nodes[id]
    }
}

/// Borrowed handle to one element of a [`MarkupTree`].
#[derive(Clone, Copy)]
pub struct Element<'a> {
    tree: &'a MarkupTree,
    id: usize,
}

impl<'a> Element<'a> {
    /// Direct child elements in document order.
    pub fn children(self) -> impl Iterator<Item = Element<'a>> + 'a {
        let tree = self.tree;
        tree.node(self.id)
            .children
            .iter()
            .map(move |&id| Element { tree, id })
    }

    fn data(&self) -> &'a NodeData {
        self.tree.node(self.id)
    }
}

impl fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        f.debug_struct("Element")
            .field("tag", &data.tag)
            .field("attributes", &data.attributes)
            .field("children", &data.children.len())
            .finish()
    }
}

impl ElementView for Element<'_> {
    fn tag(&self) -> &str {
        &self.data().tag
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.data()
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn child(&self, tag: &str) -> Option<Self> {
        self.children().find(|el| el.tag() == tag)
    }

    fn children_at(&self, path: &str) -> Vec<Self> {
        let mut level = vec![*self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            level = level
                .iter()
                .flat_map(|el| el.children())
                .filter(|el| el.tag() == segment)
                .collect();
            if level.is_empty() {
                break;
            }
        }
        level
    }

    fn text(&self) -> Option<&str> {
        self.data().text.as_deref()
    }
}

/// Turns raw corpus bytes into a [`MarkupTree`].
#[derive(Clone, Debug)]
pub struct MarkupLoader {
    fragment_tag: String,
}

impl Default for MarkupLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupLoader {
    pub fn new() -> Self {
        Self {
            fragment_tag: FRAGMENT_TAG.to_string(),
        }
    }

    /// Use a different fragment element name than `REUTERS`.
    pub fn with_fragment_tag(tag: impl Into<String>) -> Self {
        Self {
            fragment_tag: tag.into(),
        }
    }

    /// Decode `bytes` as UTF-8 and build the tree.
    pub fn load(&self, bytes: &[u8]) -> Result<MarkupTree, DecodeError> {
        let content = std::str::from_utf8(bytes).map_err(DecodeError::from)?;
        Ok(self.parse(content))
    }

    /// Build the tree from already decoded content.
    pub fn parse(&self, content: &str) -> MarkupTree {
        let mut builder = TreeBuilder::new();
        let mut recovered_errors = 0usize;
        let mut offset = 0usize;
        while let Some(stray) = builder.feed(&content[offset..]) {
            // Keep the `<` and re-tokenize from the byte after it.
            recovered_errors += 1;
            builder.push_text("<");
            offset += stray + 1;
            debug!(position = offset - 1, "kept stray '<' as text");
        }

        let tree = MarkupTree {
            nodes: builder.nodes,
            fragment_tag: self.fragment_tag.clone(),
            recovered_errors,
        };
        debug!(
            fragments = tree.fragments().count(),
            recovered_errors, "markup tree built"
        );
        tree
    }
}

fn lenient_reader(input: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(input);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.check_comments = false;
    config.expand_empty_elements = false;
    reader
}

/// Offset of the first `<` at or after `from`.
fn next_open(input: &str, from: usize) -> Option<usize> {
    input[from..].find('<').map(|idx| from + idx)
}

struct TreeBuilder {
    nodes: Vec<NodeData>,
    stack: Vec<usize>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            nodes: vec![NodeData::new(ROOT_TAG.to_string(), Vec::new())],
            stack: vec![ROOT_ID],
        }
    }

    fn current(&self) -> usize {
        self.stack.last().copied().unwrap_or(ROOT_ID)
    }

    /// Tokenize `input` into the tree until end of input, or until a `<` that
    /// does not open well-formed markup. Returns that `<`'s offset in `input`.
    ///
    /// Text events never contain `<`, so the markup that produced an event
    /// starts at the first `<` after the end of the previous markup event.
    fn feed(&mut self, input: &str) -> Option<usize> {
        let mut reader = lenient_reader(input);
        let mut markup_end = 0usize;
        loop {
            let event = reader.read_event();
            let position = reader.buffer_position() as usize;
            match event {
                Ok(Event::Start(start)) => {
                    if !self.open_start(&start) {
                        return next_open(input, markup_end);
                    }
                }
                Ok(Event::Empty(start)) => {
                    if !self.open_start(&start) {
                        return next_open(input, markup_end);
                    }
                    self.stack.pop();
                }
                Ok(Event::End(end)) => {
                    self.close(&String::from_utf8_lossy(end.name().as_ref()));
                }
                Ok(Event::Text(text)) => {
                    self.push_text(&decode_text(&String::from_utf8_lossy(&text)));
                    continue;
                }
                Ok(Event::CData(data)) => {
                    self.push_text(&strip_invalid_chars(&String::from_utf8_lossy(&data)));
                }
                Ok(Event::Eof) => return None,
                Ok(_) => {}
                Err(err) => {
                    debug!(%err, offset = markup_end, "recovering from markup error");
                    return next_open(input, markup_end);
                }
            }
            markup_end = position;
        }
    }

    /// Open an element for `start`; returns `false` when its name is not a
    /// valid tag name and nothing was opened.
    fn open_start(&mut self, start: &BytesStart<'_>) -> bool {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        if !is_name_start(tag.chars().next()) {
            return false;
        }
        let attributes = start
            .html_attributes()
            .with_checks(false)
            .filter_map(Result::ok)
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = decode_text(&String::from_utf8_lossy(&attr.value));
                (key, value)
            })
            .collect();

        let id = self.nodes.len();
        self.nodes.push(NodeData::new(tag, attributes));
        let parent = self.current();
        self.nodes[parent].children.push(id);
        self.stack.push(id);
        true
    }

    fn close(&mut self, tag: &str) {
        let depth = self
            .stack
            .iter()
            .rposition(|&id| id != ROOT_ID && self.nodes[id].tag == tag);
        if let Some(depth) = depth {
            self.stack.truncate(depth);
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let current = self.current();
        self.nodes[current]
            .text
            .get_or_insert_with(String::new)
            .push_str(text);
    }
}

fn is_name_start(first: Option<char>) -> bool {
    matches!(first, Some(c) if c.is_alphabetic() || c == '_' || c == ':')
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

fn strip_invalid_chars(raw: &str) -> String {
    raw.chars().filter(|c| is_xml_char(*c)).collect()
}

/// Decode entity and character references the way a recovering parser would.
pub(crate) fn decode_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.extend(rest[..amp].chars().filter(|c| is_xml_char(*c)));
        let tail = &rest[amp..];
        match resolve_reference(tail) {
            Some((decoded, consumed)) => {
                out.extend(decoded);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.extend(rest.chars().filter(|c| is_xml_char(*c)));
    out
}

/// Resolve a reference at the start of `tail` (which begins with `&`).
///
/// Returns the decoded character (`None` when it must be dropped) and the
/// number of bytes consumed, or `None` when `tail` holds no valid reference.
fn resolve_reference(tail: &str) -> Option<(Option<char>, usize)> {
    let window = tail
        .char_indices()
        .nth(MAX_REFERENCE_LEN + 2)
        .map_or(tail.len(), |(idx, _)| idx);
    let semi = tail[1..window].find(';')? + 1;
    let name = &tail[1..semi];
    let decoded = match name {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "quot" => '"',
        "apos" => '\'',
        _ => {
            let code = parse_char_reference(name.strip_prefix('#')?)?;
            let ch = char::from_u32(code).filter(|c| is_xml_char(*c));
            return Some((ch, semi + 1));
        }
    };
    Some((Some(decoded), semi + 1))
}

fn parse_char_reference(digits: &str) -> Option<u32> {
    let (digits, radix) = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16),
        None => (digits, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(digits, radix).ok()
}
