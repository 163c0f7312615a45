//! Fix engine: records text edits against original sources
//!
//! Every range handed to the [`Fixer`] is expressed in ORIGINAL source
//! coordinates. Edits are applied immediately to a per-file changes buffer
//! and remembered in a shift table, so later edits can be translated into
//! the changed buffer no matter in which order they were recorded.

use crate::error::{Error, Result};
use crate::format::{CanonicalFormatter, Formatter};
use crate::hclext::{Attribute, Block};
use crate::syntax::scanner::{Scanner, SeekMode, Token, TokenKind};
use crate::syntax::{Pos, Range, SyntaxKind};
use crate::value::Value;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap());

/// An edit already applied to a file, in original coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub start: usize,
    pub end: usize,
    /// Length of the replacement text
    pub new_len: usize,
}

impl Shift {
    fn delta(&self) -> isize {
        self.new_len as isize - (self.end - self.start) as isize
    }

    /// Identical ranges never overlap; touching at an endpoint is fine.
    fn overlaps(&self, start: usize, end: usize) -> bool {
        if self.start == start && self.end == end {
            return false;
        }
        match (self.start == self.end, start == end) {
            (false, false) => start < self.end && self.start < end,
            (true, false) => start < self.start && self.start < end,
            (false, true) => self.start < start && start < self.end,
            (true, true) => false,
        }
    }
}

/// Source text paired with the original range it was taken from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub bytes: Vec<u8>,
    pub range: Range,
}

/// One piece of replacement text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPart {
    Bytes(Vec<u8>),
    /// Text moved from elsewhere in the file; its range counts as consumed
    Node(TextNode),
}

impl From<&str> for TextPart {
    fn from(s: &str) -> Self {
        TextPart::Bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for TextPart {
    fn from(s: String) -> Self {
        TextPart::Bytes(s.into_bytes())
    }
}

impl From<&[u8]> for TextPart {
    fn from(b: &[u8]) -> Self {
        TextPart::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for TextPart {
    fn from(b: Vec<u8>) -> Self {
        TextPart::Bytes(b)
    }
}

impl From<TextNode> for TextPart {
    fn from(node: TextNode) -> Self {
        TextPart::Node(node)
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    changes: BTreeMap<String, Vec<u8>>,
    shifts: BTreeMap<String, Vec<Shift>>,
}

pub struct Fixer {
    sources: BTreeMap<String, Vec<u8>>,
    changes: BTreeMap<String, Vec<u8>>,
    shifts: BTreeMap<String, Vec<Shift>>,
    stash: Option<Snapshot>,
    formatter: Box<dyn Formatter + Send>,
}

impl fmt::Debug for Fixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixer")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("changes", &self.changes.keys().collect::<Vec<_>>())
            .field("shifts", &self.shifts)
            .field("stashed", &self.stash.is_some())
            .finish()
    }
}

impl Fixer {
    pub fn new(sources: BTreeMap<String, Vec<u8>>) -> Self {
        Self::with_formatter(sources, CanonicalFormatter)
    }

    pub fn with_formatter(
        sources: BTreeMap<String, Vec<u8>>,
        formatter: impl Formatter + Send + 'static,
    ) -> Self {
        Self {
            sources,
            changes: BTreeMap::new(),
            shifts: BTreeMap::new(),
            stash: None,
            formatter: Box::new(formatter),
        }
    }

    /// Replace the original `range` with the concatenation of `parts`.
    ///
    /// Fails without touching any state when the file is unknown or when
    /// `range` (or the range of a [`TextNode`] part) overlaps an earlier
    /// edit. Editing exactly the same range again, empty or not, supersedes
    /// the earlier text.
    pub fn replace_text<I>(&mut self, range: &Range, parts: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<TextPart>,
    {
        let filename = range.filename.as_str();
        let source = self
            .sources
            .get(filename)
            .ok_or_else(|| Error::FileNotFound(filename.to_owned()))?;
        if range.start.byte > range.end.byte || range.end.byte > source.len() {
            return Err(Error::InvalidRange(range.clone()));
        }

        let mut consumed = vec![range.clone()];
        let mut text = Vec::new();
        for part in parts {
            match part.into() {
                TextPart::Bytes(bytes) => text.extend_from_slice(&bytes),
                TextPart::Node(node) => {
                    text.extend_from_slice(&node.bytes);
                    consumed.push(node.range);
                }
            }
        }

        let shifts = self.shifts.get(filename).map(Vec::as_slice).unwrap_or_default();
        if let Some(overlap) = consumed
            .iter()
            .find(|r| shifts.iter().any(|s| s.overlaps(r.start.byte, r.end.byte)))
        {
            return Err(Error::RangeOverlap(overlap.clone()));
        }

        let (s, e) = (range.start.byte, range.end.byte);
        let identical = shifts.iter().position(|shift| shift.start == s && shift.end == e);
        let mut start = map_offset(shifts, s, false);
        let end = match identical {
            Some(i) => {
                // An earlier insert at this point is already counted in `start`
                if range.is_empty() {
                    start -= shifts[i].new_len;
                }
                start + shifts[i].new_len
            }
            None if range.is_empty() => start,
            None => map_offset(shifts, e, true),
        };
        let current_len = self.changes.get(filename).map_or(source.len(), Vec::len);
        if end > current_len {
            return Err(Error::InvalidRange(range.clone()));
        }

        let new_len = text.len();
        let buffer = self
            .changes
            .entry(filename.to_owned())
            .or_insert_with(|| source.clone());
        buffer.splice(start..end, text);

        let shifts = self.shifts.entry(filename.to_owned()).or_default();
        match identical {
            Some(i) => shifts[i].new_len = new_len,
            None => {
                shifts.push(Shift { start: s, end: e, new_len });
                shifts.sort_by_key(|shift| (shift.start, shift.end));
            }
        }
        log::trace!("replaced {} with {} byte(s)", range, new_len);
        Ok(())
    }

    pub fn insert_text_before(&mut self, range: &Range, text: impl Into<TextPart>) -> Result<()> {
        self.replace_text(&Range::at(range.filename.clone(), range.start), [text])
    }

    pub fn insert_text_after(&mut self, range: &Range, text: impl Into<TextPart>) -> Result<()> {
        self.replace_text(&Range::at(range.filename.clone(), range.end), [text])
    }

    pub fn remove(&mut self, range: &Range) -> Result<()> {
        self.replace_text(range, Vec::<TextPart>::new())
    }

    /// Remove an attribute together with its comments.
    ///
    /// Line comments directly above the attribute and a comment trailing it
    /// on the same line go with it; a `/* */` comment in front of it stays.
    /// If nothing else shares the line, the whole line is removed.
    pub fn remove_attribute(&mut self, attr: &Attribute) -> Result<()> {
        let (source, mut scanner) = self.scanner_for(&attr.range.filename)?;
        let range = decorated_range(&mut scanner, source, &attr.range)?;
        self.remove(&range)
    }

    /// Remove a block from its type keyword to its closing brace, with the
    /// same comment handling as [`Fixer::remove_attribute`].
    pub fn remove_block(&mut self, block: &Block) -> Result<()> {
        let (source, mut scanner) = self.scanner_for(&block.def_range.filename)?;
        let end = block_end(&mut scanner, &block.def_range)?;
        let whole = Range::new(
            block.def_range.filename.clone(),
            block.def_range.start,
            end,
        );
        let range = decorated_range(&mut scanner, source, &whole)?;
        self.remove(&range)
    }

    fn scanner_for(&self, filename: &str) -> Result<(&[u8], Scanner)> {
        if SyntaxKind::from_filename(filename) == Some(SyntaxKind::Json) {
            return Err(Error::Unsupported(format!(
                "structural removal is not supported in JSON files: {}",
                filename
            )));
        }
        let source = self
            .sources
            .get(filename)
            .ok_or_else(|| Error::FileNotFound(filename.to_owned()))?;
        let scanner = Scanner::new(source, filename)?;
        Ok((source.as_slice(), scanner))
    }

    /// Original bytes at `range`; empty for an unknown file
    pub fn text_at(&self, range: &Range) -> TextNode {
        let bytes = self
            .sources
            .get(&range.filename)
            .and_then(|src| src.get(range.byte_range()))
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        TextNode {
            bytes,
            range: range.clone(),
        }
    }

    pub fn value_text(&self, value: &Value) -> Result<String> {
        value_text(value)
    }

    pub fn range_to(&self, bytes: &[u8], filename: &str, start: Pos) -> Range {
        range_to(bytes, filename, start)
    }

    /// Changed buffers; only files that were edited are present
    pub fn changes(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn sources(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.sources
    }

    pub fn shifts(&self, filename: &str) -> &[Shift] {
        self.shifts.get(filename).map(Vec::as_slice).unwrap_or_default()
    }

    /// Run the formatter over every changed buffer. A buffer the formatter
    /// rejects is kept as it is.
    pub fn format_changes(&mut self) {
        for (filename, buffer) in self.changes.iter_mut() {
            match self.formatter.format(filename, buffer) {
                Ok(formatted) => *buffer = formatted,
                Err(diags) => log::warn!("{}: skipping format: {}", filename, diags),
            }
        }
    }

    /// Promote changes into the originals
    pub fn apply_changes(&mut self) {
        let changes = std::mem::take(&mut self.changes);
        self.sources.extend(changes);
        self.shifts.clear();
    }

    pub fn stash_changes(&mut self) {
        self.stash = Some(Snapshot {
            changes: self.changes.clone(),
            shifts: self.shifts.clone(),
        });
    }

    /// Drop every edit made since the last stash
    pub fn pop_changes_from_stash(&mut self) {
        if let Some(snapshot) = self.stash.take() {
            self.changes = snapshot.changes;
            self.shifts = snapshot.shifts;
        }
    }
}

/// Translate an original offset into the changed buffer
fn map_offset(shifts: &[Shift], offset: usize, is_end: bool) -> usize {
    let mut mapped = offset as isize;
    for shift in shifts {
        if shift.end < offset || (shift.end == offset && (!is_end || shift.start < shift.end)) {
            mapped += shift.delta();
        }
    }
    mapped.max(0) as usize
}

fn decorated_range(scanner: &mut Scanner, source: &[u8], range: &Range) -> Result<Range> {
    let mut start = range.start;
    let mut end = range.end;

    scanner.seek(range.start, SeekMode::TokenStart)?;
    let line_head = if scanner.scan_backward() {
        let mut prev = scanner.token().cloned();
        let head = prev.as_ref().is_some_and(Token::ends_line);
        while head {
            let Some(comment) = prev.take().filter(Token::is_line_comment) else {
                break;
            };
            let moved = scanner.scan_backward();
            if moved && !scanner.token().is_some_and(Token::ends_line) {
                break;
            }
            start = comment.range.start;
            if !moved {
                break;
            }
            prev = scanner.token().cloned();
        }
        head
    } else {
        true
    };

    scanner.seek(range.end, SeekMode::TokenEnd)?;
    let next = if scanner.scan() {
        scanner.token().cloned()
    } else {
        None
    };
    let whole_line = line_head
        && next
            .as_ref()
            .map_or(true, |t| t.ends_line() || t.is_line_comment() || t.kind == TokenKind::Eof);

    match next {
        Some(tok) if tok.is_line_comment() => {
            end = if whole_line {
                tok.range.end
            } else {
                let content = &tok.text[..tok.text.len() - tok.newline_len()];
                tok.range.start.advance(content)
            };
        }
        Some(tok) if tok.kind == TokenKind::Newline && whole_line => end = tok.range.end,
        _ => {}
    }

    if whole_line || !line_head {
        start = skip_blanks_back(source, start);
    } else {
        end = skip_blanks_forward(source, end);
    }
    Ok(Range::new(range.filename.clone(), start, end))
}

/// End of the closing brace of the block whose header ends at `def_range`
fn block_end(scanner: &mut Scanner, def_range: &Range) -> Result<Pos> {
    scanner.seek(def_range.end, SeekMode::TokenEnd)?;
    let mut depth = 0usize;
    while scanner.scan() {
        let Some(tok) = scanner.token() else {
            break;
        };
        match tok.kind {
            TokenKind::OBrace => depth += 1,
            TokenKind::CBrace if depth <= 1 => return Ok(tok.range.end),
            TokenKind::CBrace => depth -= 1,
            TokenKind::Eof => break,
            _ => {}
        }
    }
    Err(Error::Scan(format!("unterminated block at {}", def_range)))
}

fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

fn skip_blanks_back(source: &[u8], pos: Pos) -> Pos {
    let n = source[..pos.byte.min(source.len())]
        .iter()
        .rev()
        .take_while(|b| is_blank(**b))
        .count();
    Pos::new(pos.line, pos.column - n, pos.byte - n)
}

fn skip_blanks_forward(source: &[u8], pos: Pos) -> Pos {
    let n = source
        .get(pos.byte..)
        .unwrap_or_default()
        .iter()
        .take_while(|b| is_blank(**b))
        .count();
    Pos::new(pos.line, pos.column + n, pos.byte + n)
}

/// The range `bytes` would span if placed at `start`, counting characters
/// rather than bytes for columns
pub fn range_to(bytes: &[u8], filename: &str, start: Pos) -> Range {
    let mut end = start;
    for chunk in bytes.utf8_chunks() {
        end = end.advance(chunk.valid());
        end.byte += chunk.invalid().len();
        end.column += chunk.invalid().len();
    }
    Range::new(filename, start, end)
}

/// Render a value in native syntax, on a single line.
///
/// Unknown, sensitive and ephemeral values have no text and yield their
/// sentinel error.
pub fn value_text(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Marked(_, marks) if marks.sensitive => return Err(Error::SensitiveValue),
        Value::Marked(_, marks) if marks.ephemeral => return Err(Error::EphemeralValue),
        Value::Marked(inner, _) => value_text(inner)?,
        Value::Unknown => return Err(Error::UnknownValue),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::List(items) => {
            let items = items.iter().map(value_text).collect::<Result<Vec<_>>>()?;
            format!("[{}]", items.join(", "))
        }
        Value::Map(map) if map.is_empty() => "{}".to_string(),
        Value::Map(map) => {
            let mut items = Vec::with_capacity(map.len());
            for (key, value) in map {
                let key = if is_identifier(key) {
                    key.clone()
                } else {
                    quote(key)
                };
                items.push(format!("{} = {}", key, value_text(value)?));
            }
            format!("{{ {} }}", items.join(", "))
        }
    })
}

pub(crate) fn is_identifier(s: &str) -> bool {
    IDENT_RE.is_match(s)
}

/// Quote a string literal, escaping template sequences
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
