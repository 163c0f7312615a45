//! Token scanner for the native syntax
//!
//! The lexer keeps comments and newlines as real tokens so structural
//! edits can decide which decorations belong to an attribute or block.
//! Quoted strings and heredocs are split into template tokens, the same
//! way the reference parser tokenizes them, so interpolation braces never
//! get confused with block braces.

use super::{Diagnostics, Pos, Range, Source};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    /// Opening `"` of a quoted template
    OQuote,
    /// Closing `"` of a quoted template
    CQuote,
    /// Literal text inside a quoted template, escapes not yet decoded
    QuotedLit,
    /// `<<EOT` or `<<-EOT` up to and including the newline
    OHeredoc,
    /// The closing marker line of a heredoc, without its newline
    CHeredoc,
    /// Literal text inside a heredoc or bare template
    StringLit,
    /// `${` or `${~`
    TemplateInterp,
    /// `%{` or `%{~`
    TemplateControl,
    /// `}` or `~}` closing an interpolation or directive
    TemplateSeqEnd,
    OBrace,
    CBrace,
    OBrack,
    CBrack,
    OParen,
    CParen,
    Comma,
    Dot,
    Ellipsis,
    Colon,
    Question,
    Equal,
    FatArrow,
    Operator,
    Newline,
    /// Line comment (`#`, `//`, newline included) or delimited comment (`/* */`)
    Comment,
    Invalid,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range,
    pub text: String,
}

impl Token {
    pub fn is_line_comment(&self) -> bool {
        self.kind == TokenKind::Comment && !self.text.starts_with("/*")
    }

    pub fn is_delimited_comment(&self) -> bool {
        self.kind == TokenKind::Comment && self.text.starts_with("/*")
    }

    /// Whether the token terminates its line
    pub fn ends_line(&self) -> bool {
        self.kind == TokenKind::Newline || (self.is_line_comment() && self.text.ends_with('\n'))
    }

    /// Byte length of the line terminator at the end of the token
    pub fn newline_len(&self) -> usize {
        if self.text.ends_with("\r\n") {
            2
        } else if self.text.ends_with('\n') {
            1
        } else {
            0
        }
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Interp { braces: usize },
    Quoted,
    Heredoc { marker: String },
    Template,
}

struct Lexer<'a> {
    text: &'a str,
    filename: &'a str,
    idx: usize,
    pos: Pos,
    tokens: Vec<Token>,
    modes: Vec<Mode>,
}

/// Tokenize native-syntax source text
pub fn lex(text: &str, filename: &str, start: Pos) -> Vec<Token> {
    Lexer::new(text, filename, start, Vec::new()).run()
}

/// Tokenize the content of a template that has no surrounding quotes,
/// such as a JSON string value
pub fn lex_template(text: &str, filename: &str, start: Pos) -> Vec<Token> {
    Lexer::new(text, filename, start, vec![Mode::Template]).run()
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str, filename: &'a str, start: Pos, modes: Vec<Mode>) -> Self {
        Self {
            text,
            filename,
            idx: 0,
            pos: start,
            tokens: Vec::new(),
            modes,
        }
    }

    fn run(mut self) -> Vec<Token> {
        while self.idx < self.text.len() {
            match self.modes.last().cloned() {
                Some(Mode::Quoted) => self.lex_quoted(),
                Some(Mode::Heredoc { marker }) => self.lex_heredoc(&marker),
                Some(Mode::Template) => self.lex_bare_template(),
                Some(Mode::Interp { .. }) | None => self.lex_normal(),
            }
        }
        self.emit(TokenKind::Eof, 0);
        self.tokens
    }

    fn rest(&self) -> &'a str {
        &self.text[self.idx..]
    }

    fn emit(&mut self, kind: TokenKind, len: usize) {
        let text = &self.text[self.idx..self.idx + len];
        let start = self.pos;
        let end = start.advance(text);
        self.tokens.push(Token {
            kind,
            range: Range::new(self.filename, start, end),
            text: text.to_owned(),
        });
        self.idx += len;
        self.pos = end;
    }

    fn skip(&mut self, len: usize) {
        self.pos = self.pos.advance(&self.text[self.idx..self.idx + len]);
        self.idx += len;
    }

    fn interp_depth(&self) -> Option<usize> {
        match self.modes.last() {
            Some(Mode::Interp { braces }) => Some(*braces),
            _ => None,
        }
    }

    fn lex_normal(&mut self) {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let next = bytes.get(1).copied();
        match bytes[0] {
            b' ' | b'\t' => {
                let n = rest.len() - rest.trim_start_matches([' ', '\t']).len();
                self.skip(n);
            }
            b'\r' if next == Some(b'\n') => self.emit(TokenKind::Newline, 2),
            b'\n' => self.emit(TokenKind::Newline, 1),
            b'#' => self.line_comment(),
            b'/' if next == Some(b'/') => self.line_comment(),
            b'/' if next == Some(b'*') => {
                let len = rest[2..].find("*/").map(|i| i + 4).unwrap_or(rest.len());
                self.emit(TokenKind::Comment, len);
            }
            b'"' => {
                self.emit(TokenKind::OQuote, 1);
                self.modes.push(Mode::Quoted);
            }
            b'<' if next == Some(b'<') => match heredoc_header(rest) {
                Some((len, marker)) => {
                    self.emit(TokenKind::OHeredoc, len);
                    self.modes.push(Mode::Heredoc { marker });
                }
                None => self.emit(TokenKind::Operator, 1),
            },
            b'{' => {
                if let Some(Mode::Interp { braces }) = self.modes.last_mut() {
                    *braces += 1;
                }
                self.emit(TokenKind::OBrace, 1);
            }
            b'}' => match self.interp_depth() {
                Some(0) => {
                    self.modes.pop();
                    self.emit(TokenKind::TemplateSeqEnd, 1);
                }
                Some(_) => {
                    if let Some(Mode::Interp { braces }) = self.modes.last_mut() {
                        *braces -= 1;
                    }
                    self.emit(TokenKind::CBrace, 1);
                }
                None => self.emit(TokenKind::CBrace, 1),
            },
            b'~' if next == Some(b'}') && self.interp_depth() == Some(0) => {
                self.modes.pop();
                self.emit(TokenKind::TemplateSeqEnd, 2);
            }
            b'[' => self.emit(TokenKind::OBrack, 1),
            b']' => self.emit(TokenKind::CBrack, 1),
            b'(' => self.emit(TokenKind::OParen, 1),
            b')' => self.emit(TokenKind::CParen, 1),
            b',' => self.emit(TokenKind::Comma, 1),
            b':' => self.emit(TokenKind::Colon, 1),
            b'?' => self.emit(TokenKind::Question, 1),
            b'.' if rest.starts_with("...") => self.emit(TokenKind::Ellipsis, 3),
            b'.' => self.emit(TokenKind::Dot, 1),
            b'=' if next == Some(b'=') => self.emit(TokenKind::Operator, 2),
            b'=' if next == Some(b'>') => self.emit(TokenKind::FatArrow, 2),
            b'=' => self.emit(TokenKind::Equal, 1),
            b'!' | b'<' | b'>' if next == Some(b'=') => self.emit(TokenKind::Operator, 2),
            b'&' if next == Some(b'&') => self.emit(TokenKind::Operator, 2),
            b'|' if next == Some(b'|') => self.emit(TokenKind::Operator, 2),
            b'!' | b'<' | b'>' | b'+' | b'-' | b'*' | b'/' | b'%' => {
                self.emit(TokenKind::Operator, 1)
            }
            b'0'..=b'9' => self.emit(TokenKind::Number, number_len(rest)),
            _ => {
                let len = ident_len(rest);
                if len > 0 {
                    self.emit(TokenKind::Ident, len);
                } else {
                    let ch_len = rest.chars().next().map_or(1, char::len_utf8);
                    self.emit(TokenKind::Invalid, ch_len);
                }
            }
        }
    }

    fn line_comment(&mut self) {
        let rest = self.rest();
        let len = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        self.emit(TokenKind::Comment, len);
    }

    /// Emit `${` / `%{` and enter interpolation mode if the input starts with one
    fn template_open(&mut self) -> bool {
        let rest = self.rest();
        let (kind, len) = if rest.starts_with("${~") {
            (TokenKind::TemplateInterp, 3)
        } else if rest.starts_with("${") {
            (TokenKind::TemplateInterp, 2)
        } else if rest.starts_with("%{~") {
            (TokenKind::TemplateControl, 3)
        } else if rest.starts_with("%{") {
            (TokenKind::TemplateControl, 2)
        } else {
            return false;
        };
        self.emit(kind, len);
        self.modes.push(Mode::Interp { braces: 0 });
        true
    }

    fn lex_quoted(&mut self) {
        if self.rest().starts_with('"') {
            self.modes.pop();
            self.emit(TokenKind::CQuote, 1);
            return;
        }
        if self.template_open() {
            return;
        }
        let len = literal_len(self.rest(), true);
        if len == 0 {
            // unterminated string; the newline is lexed in normal mode
            self.modes.pop();
            return;
        }
        self.emit(TokenKind::QuotedLit, len);
    }

    fn at_line_start(&self) -> bool {
        self.idx == 0 || self.text.as_bytes()[self.idx - 1] == b'\n'
    }

    fn lex_heredoc(&mut self, marker: &str) {
        let rest = self.rest();
        if self.at_line_start() {
            let line_end = rest.find('\n').unwrap_or(rest.len());
            let line = rest[..line_end].trim_end_matches('\r');
            if line.trim_start() == marker {
                self.modes.pop();
                self.emit(TokenKind::CHeredoc, line.len());
                return;
            }
        }
        if self.template_open() {
            return;
        }
        let mut len = literal_len(rest, false);
        if let Some(nl) = rest[..len].find('\n') {
            len = nl + 1;
        }
        self.emit(TokenKind::StringLit, len);
    }

    fn lex_bare_template(&mut self) {
        if self.template_open() {
            return;
        }
        let len = literal_len(self.rest(), false);
        self.emit(TokenKind::StringLit, len);
    }
}

fn ident_len(rest: &str) -> usize {
    let mut chars = rest.char_indices();
    match chars.next() {
        Some((_, ch)) if ch.is_alphabetic() || ch == '_' => {}
        _ => return 0,
    }
    for (i, ch) in chars {
        if !(ch.is_alphanumeric() || ch == '_' || ch == '-') {
            return i;
        }
    }
    rest.len()
}

fn number_len(rest: &str) -> usize {
    let b = rest.as_bytes();
    let digits = |mut i: usize| {
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let mut i = digits(0);
    if i + 1 < b.len() && b[i] == b'.' && b[i + 1].is_ascii_digit() {
        i = digits(i + 1);
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        if j < b.len() && b[j].is_ascii_digit() {
            i = digits(j);
        }
    }
    i
}

/// Parse `<<EOT\n` / `<<-EOT\n`, returning the header length and the marker
fn heredoc_header(rest: &str) -> Option<(usize, String)> {
    let b = rest.as_bytes();
    let mut i = 2;
    if b.get(i) == Some(&b'-') {
        i += 1;
    }
    let marker_start = i;
    match b.get(i) {
        Some(c) if c.is_ascii_alphabetic() || *c == b'_' => {}
        _ => return None,
    }
    while i < b.len() && (b[i].is_ascii_alphanumeric() || b[i] == b'_' || b[i] == b'-') {
        i += 1;
    }
    let marker = rest[marker_start..i].to_owned();
    let tail = &rest[i..];
    if tail.starts_with("\r\n") {
        Some((i + 2, marker))
    } else if tail.starts_with('\n') {
        Some((i + 1, marker))
    } else {
        None
    }
}

/// Length of template literal text up to the next delimiter
fn literal_len(rest: &str, quoted: bool) -> usize {
    let b = rest.as_bytes();
    let mut i = 0;
    while i < b.len() {
        match b[i] {
            b'"' | b'\n' if quoted => break,
            b'\\' if quoted => {
                i += 2;
                continue;
            }
            b'$' | b'%' if b.get(i + 1) == Some(&b'{') => break,
            b'$' | b'%' if b.get(i + 1) == Some(&b[i]) && b.get(i + 2) == Some(&b'{') => {
                i += 3;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    // an escape may step into a multi-byte character; settle on a boundary
    let mut end = i.min(b.len());
    while !rest.is_char_boundary(end) {
        end += 1;
    }
    end
}

/// Which end of a token a seek position refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    TokenStart,
    TokenEnd,
}

/// Bidirectional cursor over the tokens of a file
#[derive(Debug, Clone)]
pub struct Scanner {
    filename: String,
    tokens: Vec<Token>,
    /// `None` while positioned before the first token
    index: Option<usize>,
    pub pos: Pos,
}

impl Scanner {
    pub fn new(bytes: &[u8], filename: &str) -> std::result::Result<Self, Diagnostics> {
        let source = Source::from_bytes(filename, bytes)?;
        Ok(Self {
            filename: filename.to_owned(),
            tokens: lex(source.text(), filename, Pos::START),
            index: None,
            pos: Pos::START,
        })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The token under the cursor; `None` before the first token
    pub fn token(&self) -> Option<&Token> {
        self.index.map(|i| &self.tokens[i])
    }

    /// Place the cursor on the token starting (or ending) at `to`.
    ///
    /// Seeking to a start position before the first token leaves the cursor
    /// in front of the token stream, so the next [`Scanner::scan`] yields
    /// the first token.
    pub fn seek(&mut self, to: Pos, mode: SeekMode) -> Result<()> {
        let found = match mode {
            SeekMode::TokenStart => self
                .tokens
                .iter()
                .position(|t| t.range.start.byte == to.byte),
            SeekMode::TokenEnd => self
                .tokens
                .iter()
                .position(|t| t.range.end.byte == to.byte && !t.range.is_empty()),
        };
        match found {
            Some(index) => {
                self.index = Some(index);
                self.pos = to;
                Ok(())
            }
            None if mode == SeekMode::TokenStart
                && self.tokens.first().map_or(true, |t| to.byte <= t.range.start.byte) =>
            {
                self.index = None;
                self.pos = to;
                Ok(())
            }
            None => Err(Error::Scan(format!(
                "no token {} at {}:{},{}",
                match mode {
                    SeekMode::TokenStart => "starts",
                    SeekMode::TokenEnd => "ends",
                },
                self.filename,
                to.line,
                to.column
            ))),
        }
    }

    /// Move to the next token; false once the terminal token is current
    pub fn scan(&mut self) -> bool {
        let next = self.index.map_or(0, |i| i + 1);
        if next >= self.tokens.len() {
            return false;
        }
        self.index = Some(next);
        self.pos = self.tokens[next].range.end;
        true
    }

    /// Move to the previous token; false at the first token
    pub fn scan_backward(&mut self) -> bool {
        match self.index {
            Some(i) if i > 0 => {
                self.index = Some(i - 1);
                self.pos = self.tokens[i - 1].range.start;
                true
            }
            _ => false,
        }
    }
}
