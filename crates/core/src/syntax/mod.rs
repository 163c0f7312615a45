//! Source positions, ranges, parsed files and bodies
//!
//! The config language comes in two surface forms: the native syntax
//! (`.tf`, `.hcl`) and the JSON syntax (`.tf.json`, `.json`). Both are parsed
//! into a [`File`] whose [`Body`] can later be projected onto a schema by
//! the [`crate::hclext`] extractor.

pub mod diagnostic;
pub mod expr;
pub mod json;
pub mod native;
pub mod scanner;

pub use diagnostic::{Diagnostic, DiagnosticSeverity, Diagnostics};
pub use expr::Expression;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Filename suffixes parsed with the native syntax parser
pub const NATIVE_SUFFIXES: &[&str] = &[".tf", ".hcl"];

/// Filename suffixes parsed with the JSON syntax parser
pub const JSON_SUFFIXES: &[&str] = &[".tf.json", ".json"];

/// A position in a source file.
///
/// `line` and `column` are 1-based, `byte` is a 0-based offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

impl Pos {
    /// The first position of any file
    pub const START: Pos = Pos {
        line: 1,
        column: 1,
        byte: 0,
    };

    pub fn new(line: usize, column: usize, byte: usize) -> Self {
        Self { line, column, byte }
    }

    /// Advance past `text`, counting newlines and characters (not bytes)
    pub fn advance(mut self, text: &str) -> Pos {
        for ch in text.chars() {
            self.byte += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self
    }
}

/// A span of source text. The end position is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub filename: String,
    pub start: Pos,
    pub end: Pos,
}

impl Range {
    pub fn new(filename: impl Into<String>, start: Pos, end: Pos) -> Self {
        Self {
            filename: filename.into(),
            start,
            end,
        }
    }

    /// Empty range located at `pos`
    pub fn at(filename: impl Into<String>, pos: Pos) -> Self {
        Self::new(filename, pos, pos)
    }

    /// Range spanning from the start of `from` to the end of `to`
    pub fn between(from: &Range, to: &Range) -> Self {
        Self::new(from.filename.clone(), from.start, to.end)
    }

    /// The range `text` would occupy if placed at `start`
    pub fn spanning(text: &str, filename: impl Into<String>, start: Pos) -> Self {
        Self::new(filename, start, start.advance(text))
    }

    pub fn is_empty(&self) -> bool {
        self.start.byte == self.end.byte
    }

    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.start.byte..self.end.byte
    }

    pub fn contains_byte(&self, byte: usize) -> bool {
        self.start.byte <= byte && byte < self.end.byte
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(
                f,
                "{}:{},{}-{}",
                self.filename, self.start.line, self.start.column, self.end.column
            )
        } else {
            write!(
                f,
                "{}:{},{}-{},{}",
                self.filename, self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

/// Which parser a file name selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    Native,
    Json,
}

impl SyntaxKind {
    /// Pick the surface syntax from the filename suffix
    pub fn from_filename(filename: &str) -> Option<Self> {
        if JSON_SUFFIXES.iter().any(|s| filename.ends_with(s)) {
            Some(SyntaxKind::Json)
        } else if NATIVE_SUFFIXES.iter().any(|s| filename.ends_with(s)) {
            Some(SyntaxKind::Native)
        } else {
            None
        }
    }
}

/// Diagnostic returned when a filename has no known surface syntax
pub(crate) fn unexpected_extension(filename: &str) -> Diagnostic {
    let valid: Vec<&str> = NATIVE_SUFFIXES
        .iter()
        .chain(JSON_SUFFIXES.iter())
        .copied()
        .collect();
    Diagnostic::error(
        "Unexpected file extension",
        format!(
            "The file name `{}` is a file with an unexpected extension. Valid extensions are {}.",
            filename,
            valid
                .iter()
                .map(|s| format!("`{}`", s))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    )
}

/// Source text with a line index for byte → position lookups
#[derive(Debug)]
pub struct Source {
    name: String,
    text: String,
    line_starts: Vec<usize>,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            name: name.into(),
            text,
            line_starts,
        }
    }

    /// Decode raw bytes, rejecting anything that is not UTF-8
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, Diagnostics> {
        let name = name.into();
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(Self::new(name, text)),
            Err(e) => {
                let pos = Pos::START.advance(&String::from_utf8_lossy(&bytes[..e.valid_up_to()]));
                Err(Diagnostics::from(
                    Diagnostic::error(
                        "Invalid character encoding",
                        "All input files must be UTF-8 encoded.",
                    )
                    .with_subject(Range::at(name, pos)),
                ))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Position of the given byte offset
    pub fn pos_at(&self, byte: usize) -> Pos {
        let byte = byte.min(self.text.len());
        let line_idx = self.line_starts.partition_point(|&start| start <= byte) - 1;
        let line_start = self.line_starts[line_idx];
        let column = match self.text.get(line_start..byte) {
            Some(s) => s.chars().count() + 1,
            None => byte - line_start + 1,
        };
        Pos::new(line_idx + 1, column, byte)
    }

    /// Range covering the given byte span
    pub fn range(&self, span: std::ops::Range<usize>) -> Range {
        Range::new(self.name.clone(), self.pos_at(span.start), self.pos_at(span.end))
    }

    pub fn slice(&self, span: std::ops::Range<usize>) -> &str {
        self.text.get(span).unwrap_or("")
    }
}

/// A parsed configuration file
#[derive(Debug, Clone)]
pub struct File {
    source: Arc<Source>,
    body: Body,
}

impl File {
    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn bytes(&self) -> &[u8] {
        self.source.text().as_bytes()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn syntax(&self) -> SyntaxKind {
        match self.body.inner {
            BodyInner::Native(_) => SyntaxKind::Native,
            BodyInner::Json(_) => SyntaxKind::Json,
        }
    }
}

/// Parse file bytes with the syntax selected by the filename suffix
pub fn parse_file(bytes: &[u8], filename: &str) -> Result<File, Diagnostics> {
    let kind = SyntaxKind::from_filename(filename)
        .ok_or_else(|| Diagnostics::from(unexpected_extension(filename)))?;
    let source = Arc::new(Source::from_bytes(filename, bytes)?);
    let body = match kind {
        SyntaxKind::Native => native::parse_body(source.clone())?,
        SyntaxKind::Json => json::parse_body(source.clone())?,
    };
    log::trace!("parsed {} ({} bytes)", filename, bytes.len());
    Ok(File { source, body })
}

/// A body as produced by one of the surface parsers
#[derive(Debug, Clone)]
pub struct Body {
    inner: BodyInner,
    source: Arc<Source>,
    missing_item_range: Range,
}

#[derive(Debug, Clone)]
enum BodyInner {
    Native(hcl_edit::structure::Body),
    Json(json::Node),
}

/// Parser-level schema: attribute names and block headers only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub attributes: Vec<AttributeSpec>,
    pub blocks: Vec<BlockHeaderSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeaderSpec {
    pub type_name: String,
    pub label_names: Vec<String>,
}

impl Schema {
    fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    fn block(&self, type_name: &str) -> Option<&BlockHeaderSpec> {
        self.blocks.iter().find(|b| b.type_name == type_name)
    }
}

/// An attribute as found by the parser
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub expr: Expression,
    pub range: Range,
    pub name_range: Range,
}

/// A block as found by the parser, with its body not yet projected
#[derive(Debug, Clone)]
pub struct Block {
    pub type_name: String,
    pub labels: Vec<String>,
    pub body: Body,
    pub def_range: Range,
    pub type_range: Range,
    pub label_ranges: Vec<Range>,
}

/// Result of a parser-level content extraction
#[derive(Debug, Clone, Default)]
pub struct Content {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<Block>,
}

impl Body {
    pub(crate) fn native(
        body: hcl_edit::structure::Body,
        source: Arc<Source>,
        missing_item_range: Range,
    ) -> Self {
        Self {
            inner: BodyInner::Native(body),
            source,
            missing_item_range,
        }
    }

    pub(crate) fn json(node: json::Node, source: Arc<Source>) -> Self {
        let missing_item_range = json::missing_item_range(&node);
        Self {
            inner: BodyInner::Json(node),
            source,
            missing_item_range,
        }
    }

    /// Where diagnostics about absent items in this body point
    pub fn missing_item_range(&self) -> &Range {
        &self.missing_item_range
    }

    pub fn filename(&self) -> &str {
        self.source.name()
    }

    /// Extract content; items not in the schema are errors
    pub fn content(&self, schema: &Schema) -> (Content, Diagnostics) {
        self.extract(schema, false)
    }

    /// Extract content; items not in the schema are skipped
    pub fn partial_content(&self, schema: &Schema) -> (Content, Diagnostics) {
        self.extract(schema, true)
    }

    /// Interpret the body as a flat attribute map
    pub fn just_attributes(&self) -> (Vec<Attribute>, Diagnostics) {
        match &self.inner {
            BodyInner::Native(body) => native::just_attributes(body, &self.source),
            BodyInner::Json(node) => json::just_attributes(node, &self.source),
        }
    }

    fn extract(&self, schema: &Schema, partial: bool) -> (Content, Diagnostics) {
        match &self.inner {
            BodyInner::Native(body) => {
                native::content(body, &self.source, &self.missing_item_range, schema, partial)
            }
            BodyInner::Json(node) => {
                json::content(node, &self.source, &self.missing_item_range, schema, partial)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_advance_counts_characters() {
        let end = Pos::START.advance("héllo\nwörld");
        assert_eq!(end.line, 2);
        assert_eq!(end.column, 6);
        assert_eq!(end.byte, "héllo\nwörld".len());
    }

    #[test]
    fn test_source_pos_at() {
        let source = Source::new("main.tf", "a = 1\nbé = 2\n");
        assert_eq!(source.pos_at(0), Pos::new(1, 1, 0));
        assert_eq!(source.pos_at(6), Pos::new(2, 1, 6));
        // column counts characters, the multi-byte é is one column
        assert_eq!(source.pos_at(9), Pos::new(2, 3, 9));
    }

    #[test]
    fn test_syntax_kind_from_filename() {
        assert_eq!(SyntaxKind::from_filename("main.tf"), Some(SyntaxKind::Native));
        assert_eq!(SyntaxKind::from_filename("a.hcl"), Some(SyntaxKind::Native));
        assert_eq!(SyntaxKind::from_filename("main.tf.json"), Some(SyntaxKind::Json));
        assert_eq!(SyntaxKind::from_filename("x.json"), Some(SyntaxKind::Json));
        assert_eq!(SyntaxKind::from_filename("main.yaml"), None);
    }

    #[test]
    fn test_range_display() {
        let range = Range::new("main.tf", Pos::new(1, 3, 2), Pos::new(1, 8, 7));
        assert_eq!(range.to_string(), "main.tf:1,3-8");
        let range = Range::new("main.tf", Pos::new(1, 3, 2), Pos::new(2, 2, 12));
        assert_eq!(range.to_string(), "main.tf:1,3-2,2");
    }

    #[test]
    fn test_parse_file_rejects_unknown_extension() {
        let err = parse_file(b"a = 1", "main.yaml").unwrap_err();
        assert!(err.to_string().contains("Valid extensions are"));
    }
}
