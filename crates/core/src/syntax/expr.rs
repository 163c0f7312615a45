//! Unevaluated expressions
//!
//! An expression keeps its source text and range next to the parsed tree.
//! The text is what crosses the host/plugin boundary; the far side calls
//! [`Expression::parse`] to get an equivalent expression back.

use super::json::{self, Node, NodeKind};
use super::scanner::{self, Token, TokenKind};
use super::{unexpected_extension, Diagnostic, Diagnostics, Pos, Range, SyntaxKind};

#[derive(Debug, Clone)]
pub struct Expression {
    kind: ExprKind,
    range: Range,
    text: String,
}

#[derive(Debug, Clone)]
enum ExprKind {
    Native(hcl_edit::expr::Expression),
    Json(Node),
}

/// A variable reference such as `var.name`, `local.value` or `each`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    pub root: String,
    pub attr: Option<String>,
}

const KEYWORDS: &[&str] = &[
    "true", "false", "null", "for", "in", "if", "else", "endif", "endfor",
];

impl Expression {
    pub(crate) fn native(expr: hcl_edit::expr::Expression, range: Range, text: String) -> Self {
        Self {
            kind: ExprKind::Native(expr),
            range,
            text,
        }
    }

    pub(crate) fn json(node: Node, text: String) -> Self {
        Self {
            range: node.range.clone(),
            kind: ExprKind::Json(node),
            text,
        }
    }

    /// Parse expression source placed at `start` in `filename`.
    ///
    /// The filename suffix picks the syntax. Native expressions get a
    /// trailing newline appended before parsing so that a heredoc closing
    /// marker at the very end of the input is recognized; the recorded text
    /// and range stay those of the bytes as given.
    pub fn parse(bytes: &[u8], filename: &str, start: Pos) -> Result<Self, Diagnostics> {
        let kind = SyntaxKind::from_filename(filename)
            .ok_or_else(|| Diagnostics::from(unexpected_extension(filename)))?;
        let text = std::str::from_utf8(bytes).map_err(|_| {
            Diagnostics::from(
                Diagnostic::error(
                    "Invalid character encoding",
                    "All input files must be UTF-8 encoded.",
                )
                .with_subject(Range::at(filename, start)),
            )
        })?;
        match kind {
            SyntaxKind::Native => {
                if text.trim().is_empty() {
                    return Err(Diagnostics::from(
                        Diagnostic::error(
                            "Invalid expression",
                            "Expected the start of an expression, but found the end of the input.",
                        )
                        .with_subject(Range::at(filename, start)),
                    ));
                }
                let parsed = hcl_edit::parser::parse_expr(&format!("{}\n", text))
                    .or_else(|_| hcl_edit::parser::parse_expr(text))
                    .map_err(|e| {
                        let offset = e.location().offset().min(text.len());
                        let pos = start.advance(text.get(..offset).unwrap_or(text));
                        Diagnostics::from(
                            Diagnostic::error("Invalid expression", e.message().to_string())
                                .with_subject(Range::at(filename, pos)),
                        )
                    })?;
                Ok(Self::native(
                    parsed,
                    Range::spanning(text, filename, start),
                    text.to_owned(),
                ))
            }
            SyntaxKind::Json => {
                let node = json::parse_expression(text, filename, start)?;
                Ok(Self::json(node, text.to_owned()))
            }
        }
    }

    pub fn range(&self) -> &Range {
        &self.range
    }

    /// Source text of the expression
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_json(&self) -> bool {
        matches!(self.kind, ExprKind::Json(_))
    }

    /// The JSON value behind a JSON-syntax expression
    pub fn json_node(&self) -> Option<&Node> {
        match &self.kind {
            ExprKind::Json(node) => Some(node),
            ExprKind::Native(_) => None,
        }
    }

    /// Variables referenced by the expression, sorted and deduplicated
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        match &self.kind {
            ExprKind::Native(_) => {
                let tokens = scanner::lex(&self.text, &self.range.filename, self.range.start);
                collect_references(&tokens, &mut refs);
            }
            ExprKind::Json(node) => json_references(node, &mut refs),
        }
        refs.sort();
        refs.dedup();
        refs
    }

    /// Convert into the evaluator's expression tree
    pub fn to_hcl(&self) -> hcl::Expression {
        match &self.kind {
            ExprKind::Native(expr) => hcl::Expression::from(expr.clone()),
            ExprKind::Json(node) => json_to_hcl(node),
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.range == other.range && self.text == other.text
    }
}

fn collect_references(tokens: &[Token], out: &mut Vec<Reference>) {
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind != TokenKind::Ident || KEYWORDS.contains(&tok.text.as_str()) {
            continue;
        }
        if i > 0 && tokens[i - 1].kind == TokenKind::Dot {
            continue;
        }
        let next = tokens.get(i + 1).map(|t| t.kind);
        if matches!(
            next,
            Some(TokenKind::OParen | TokenKind::Equal | TokenKind::FatArrow)
        ) {
            continue;
        }
        let attr = match (tokens.get(i + 1), tokens.get(i + 2)) {
            (Some(dot), Some(name)) if dot.kind == TokenKind::Dot && name.kind == TokenKind::Ident => {
                Some(name.text.clone())
            }
            _ => None,
        };
        out.push(Reference {
            root: tok.text.clone(),
            attr,
        });
    }
}

fn json_references(node: &Node, out: &mut Vec<Reference>) {
    match &node.kind {
        NodeKind::String(s) => {
            let tokens = scanner::lex_template(s, &node.range.filename, node.range.start);
            collect_references(&tokens, out);
        }
        NodeKind::Array(items) => items.iter().for_each(|n| json_references(n, out)),
        NodeKind::Object(props) => props.iter().for_each(|p| json_references(&p.value, out)),
        _ => {}
    }
}

fn is_template(s: &str) -> bool {
    s.contains("${") || s.contains("%{")
}

fn json_to_hcl(node: &Node) -> hcl::Expression {
    match &node.kind {
        NodeKind::Null => hcl::Expression::Null,
        NodeKind::Bool(b) => hcl::Expression::Bool(*b),
        NodeKind::Number(text) => match text.parse::<i64>() {
            Ok(i) => hcl::Expression::Number(hcl::Number::from(i)),
            Err(_) => text
                .parse::<f64>()
                .ok()
                .and_then(hcl::Number::from_f64)
                .map_or(hcl::Expression::Null, hcl::Expression::Number),
        },
        NodeKind::String(s) if is_template(s) => hcl::Expression::TemplateExpr(Box::new(
            hcl::TemplateExpr::QuotedString(s.clone()),
        )),
        NodeKind::String(s) => hcl::Expression::String(s.clone()),
        NodeKind::Array(items) => hcl::Expression::Array(items.iter().map(json_to_hcl).collect()),
        NodeKind::Object(props) => hcl::Expression::Object(
            props
                .iter()
                .filter(|p| p.name != "//")
                .map(|p| {
                    (
                        hcl::ObjectKey::Expression(hcl::Expression::String(p.name.clone())),
                        json_to_hcl(&p.value),
                    )
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_native_expression_is_invalid() {
        let inputs: [&[u8]; 3] = [b"", b" ", b"\n"];
        for src in inputs {
            let diags = Expression::parse(src, "main.tf", Pos::START).unwrap_err();
            assert_eq!(diags[0].summary, "Invalid expression");
        }
    }

    #[test]
    fn test_parse_heredoc_without_trailing_newline() {
        let src = b"<<EOT\nhello\nEOT";
        let expr = Expression::parse(src, "main.tf", Pos::START).unwrap();
        assert_eq!(expr.text(), "<<EOT\nhello\nEOT");
        assert_eq!(expr.range().end, Pos::new(3, 4, 15));
    }

    #[test]
    fn test_parse_rejects_unknown_extension() {
        let err = Expression::parse(b"1", "main.txt", Pos::START).unwrap_err();
        assert_eq!(err[0].summary, "Unexpected file extension");
    }

    #[test]
    fn test_parse_json_keeps_start() {
        let start = Pos::new(2, 10, 20);
        let expr = Expression::parse(b"\"${var.a}\"", "main.tf.json", start).unwrap();
        assert!(expr.is_json());
        assert_eq!(expr.range().start, start);
    }

    #[test]
    fn test_references() {
        let expr = Expression::parse(
            b"\"${var.name}-${local.suffix}\" == lower(var.name) ? each.key : x",
            "main.tf",
            Pos::START,
        )
        .unwrap();
        let roots: Vec<(String, Option<String>)> = expr
            .references()
            .into_iter()
            .map(|r| (r.root, r.attr))
            .collect();
        assert_eq!(
            roots,
            vec![
                ("each".to_string(), Some("key".to_string())),
                ("local".to_string(), Some("suffix".to_string())),
                ("var".to_string(), Some("name".to_string())),
                ("x".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_json_template_references() {
        let expr = Expression::parse(b"[\"${var.a}\", \"plain\"]", "x.tf.json", Pos::START).unwrap();
        assert_eq!(
            expr.references(),
            vec![Reference {
                root: "var".to_string(),
                attr: Some("a".to_string())
            }]
        );
    }

    #[test]
    fn test_equality_uses_range_and_text() {
        let a = Expression::parse(b"1 + 2", "main.tf", Pos::START).unwrap();
        let b = Expression::parse(b"1 + 2", "main.tf", Pos::START).unwrap();
        let c = Expression::parse(b"1 + 2", "main.tf", Pos::new(2, 1, 10)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
