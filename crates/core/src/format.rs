//! Source formatting applied to fixed files before they are written back

use crate::syntax::scanner::{self, Token, TokenKind};
use crate::syntax::{unexpected_extension, Diagnostic, Diagnostics, Pos, Range, SyntaxKind};
use std::ops::Range as Span;

/// Rewrites a whole file into canonical layout
pub trait Formatter {
    fn format(&self, filename: &str, src: &[u8]) -> Result<Vec<u8>, Diagnostics>;
}

/// Layout normalisation for the native syntax.
///
/// - line endings become `\n`
/// - trailing whitespace is stripped, except inside heredoc bodies
/// - the `=` of consecutive single-line attributes at the same depth is aligned
/// - the file ends in exactly one newline
///
/// JSON files and sources the lexer cannot tokenize are returned as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn format(&self, filename: &str, src: &[u8]) -> Result<Vec<u8>, Diagnostics> {
        let kind = SyntaxKind::from_filename(filename)
            .ok_or_else(|| Diagnostics::from(unexpected_extension(filename)))?;
        if kind == SyntaxKind::Json {
            return Ok(src.to_vec());
        }
        let text = std::str::from_utf8(src).map_err(|_| {
            Diagnostics::from(
                Diagnostic::error(
                    "Invalid character encoding",
                    "All input files must be UTF-8 encoded.",
                )
                .with_subject(Range::at(filename, Pos::START)),
            )
        })?;
        Ok(format_native(&text.replace("\r\n", "\n"), filename).into_bytes())
    }
}

fn format_native(text: &str, filename: &str) -> String {
    let tokens = scanner::lex(text, filename, Pos::START);
    if tokens.iter().any(|t| t.kind == TokenKind::Invalid) {
        log::debug!("{}: not formatting, source has invalid tokens", filename);
        return text.to_owned();
    }

    let mut edits = alignment_edits(&tokens);
    let protected = heredoc_bodies(&tokens);
    let mut line_start = 0;
    for line in text.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        let trimmed = content.trim_end_matches([' ', '\t']);
        if trimmed.len() < content.len() {
            let start = line_start + trimmed.len();
            if !protected.iter().any(|p| p.contains(&start)) {
                edits.push((start..line_start + content.len(), String::new()));
            }
        }
        line_start += line.len();
    }
    edits.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (span, replacement) in edits {
        if span.start < last {
            continue;
        }
        out.push_str(&text[last..span.start]);
        out.push_str(&replacement);
        last = span.end;
    }
    out.push_str(&text[last..]);

    let body = out.trim_end_matches('\n');
    if body.is_empty() {
        String::new()
    } else {
        format!("{}\n", body)
    }
}

/// Byte spans between each heredoc opener and its closing marker
fn heredoc_bodies(tokens: &[Token]) -> Vec<Span<usize>> {
    let mut spans = Vec::new();
    let mut open = Vec::new();
    for tok in tokens {
        match tok.kind {
            TokenKind::OHeredoc => open.push(tok.range.end.byte),
            TokenKind::CHeredoc => {
                if let Some(start) = open.pop() {
                    spans.push(start..tok.range.start.byte);
                }
            }
            _ => {}
        }
    }
    spans
}

struct Candidate {
    line: usize,
    depth: usize,
    name_end: usize,
    name_width: usize,
    value_start: usize,
}

fn opens(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::OBrace
            | TokenKind::OBrack
            | TokenKind::OParen
            | TokenKind::TemplateInterp
            | TokenKind::TemplateControl
    )
}

fn closes(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::CBrace | TokenKind::CBrack | TokenKind::CParen | TokenKind::TemplateSeqEnd
    )
}

fn alignment_edits(tokens: &[Token]) -> Vec<(Span<usize>, String)> {
    let mut candidates = Vec::new();
    let mut depth = 0usize;
    let mut at_line_start = true;
    for (i, tok) in tokens.iter().enumerate() {
        if at_line_start
            && tok.kind == TokenKind::Ident
            && tokens.get(i + 1).map(|t| t.kind) == Some(TokenKind::Equal)
        {
            if let Some(value) = tokens.get(i + 2) {
                if value.kind != TokenKind::Eof
                    && !value.ends_line()
                    && is_single_line(&tokens[i + 2..])
                {
                    candidates.push(Candidate {
                        line: tok.range.start.line,
                        depth,
                        name_end: tok.range.end.byte,
                        name_width: tok.text.chars().count(),
                        value_start: value.range.start.byte,
                    });
                }
            }
        }
        if opens(tok.kind) {
            depth += 1;
        } else if closes(tok.kind) {
            depth = depth.saturating_sub(1);
        }
        at_line_start = tok.ends_line();
    }

    let mut edits = Vec::new();
    let mut group: Vec<&Candidate> = Vec::new();
    for candidate in &candidates {
        let continues = group
            .last()
            .is_some_and(|prev| prev.line + 1 == candidate.line && prev.depth == candidate.depth);
        if !continues {
            align_group(&group, &mut edits);
            group.clear();
        }
        group.push(candidate);
    }
    align_group(&group, &mut edits);
    edits
}

fn align_group(group: &[&Candidate], edits: &mut Vec<(Span<usize>, String)>) {
    let width = group.iter().map(|c| c.name_width).max().unwrap_or(0);
    for c in group {
        let padding = " ".repeat(width - c.name_width + 1);
        edits.push((c.name_end..c.value_start, format!("{}= ", padding)));
    }
}

/// Whether the expression starting at `rest[0]` ends on its own line
fn is_single_line(rest: &[Token]) -> bool {
    let mut depth = 0i32;
    for tok in rest {
        if tok.kind == TokenKind::Eof || tok.ends_line() {
            return depth == 0;
        }
        if tok.kind == TokenKind::OHeredoc {
            return false;
        }
        if opens(tok.kind) {
            depth += 1;
        } else if closes(tok.kind) {
            depth -= 1;
            if depth < 0 {
                return false;
            }
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(src: &str) -> String {
        let out = CanonicalFormatter.format("main.tf", src.as_bytes()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_aligns_consecutive_attributes() {
        assert_eq!(
            fmt("resource \"a\" \"b\" {\n  ami = \"x\"\n  instance_type   =  \"t2\"\n}\n"),
            "resource \"a\" \"b\" {\n  ami           = \"x\"\n  instance_type = \"t2\"\n}\n"
        );
    }

    #[test]
    fn test_blank_line_breaks_alignment_group() {
        assert_eq!(fmt("a = 1\n\nlong = 2\n"), "a = 1\n\nlong = 2\n");
    }

    #[test]
    fn test_multi_line_attribute_is_not_aligned() {
        let src = "a = 1\ntags = {\n  x = 1\n}\n";
        assert_eq!(fmt(src), src);
    }

    #[test]
    fn test_trailing_whitespace_and_final_newline() {
        assert_eq!(fmt("a = 1   \r\nb = 2\n\n\n"), "a = 1\nb = 2\n");
        assert_eq!(fmt("a = 1"), "a = 1\n");
        assert_eq!(fmt("\n\n"), "");
    }

    #[test]
    fn test_heredoc_body_is_untouched() {
        let src = "a = <<EOT\nkeep  \nEOT\n";
        assert_eq!(fmt(src), src);
    }

    #[test]
    fn test_json_passes_through() {
        let out = CanonicalFormatter
            .format("main.tf.json", b"{\"a\":   1}  ")
            .unwrap();
        assert_eq!(out, b"{\"a\":   1}  ");
    }
}
