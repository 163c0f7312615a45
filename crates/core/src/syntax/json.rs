//! JSON surface syntax
//!
//! A small JSON parser that remembers the range of every value and
//! property name, plus the schema-directed interpretation of JSON
//! objects as bodies: a property is an attribute or a block depending on
//! what the schema asks for, nested object keys become block labels and an
//! array of objects stands for repeated blocks.

use super::{Attribute, Block, Body, Content, Diagnostic, Diagnostics, Expression, Pos, Range};
use super::{Schema, Source};
use std::collections::HashSet;
use std::sync::Arc;

/// A JSON value together with the source range it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Null,
    Bool(bool),
    /// Number literal, kept as written
    Number(String),
    String(String),
    Array(Vec<Node>),
    Object(Vec<Property>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub name_range: Range,
    pub value: Node,
}

impl Node {
    /// Range of the first character, `{` or `[` for containers
    pub fn open_range(&self) -> Range {
        let first = self
            .range
            .byte_range()
            .len()
            .min(1);
        Range::new(
            self.range.filename.clone(),
            self.range.start,
            Pos {
                column: self.range.start.column + first,
                byte: self.range.start.byte + first,
                ..self.range.start
            },
        )
    }

    /// Range of the closing `}` or `]`
    fn close_range(&self) -> Range {
        let end = self.range.end;
        let start = Pos {
            column: end.column.saturating_sub(1).max(1),
            byte: end.byte.saturating_sub(1),
            ..end
        };
        Range::new(self.range.filename.clone(), start, end)
    }
}

/// Where diagnostics about absent items inside `node` point
pub(crate) fn missing_item_range(node: &Node) -> Range {
    match node.kind {
        NodeKind::Object(_) => node.close_range(),
        _ => node.open_range(),
    }
}

struct Parser<'a> {
    text: &'a str,
    filename: &'a str,
    idx: usize,
    pos: Pos,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, filename: &'a str, start: Pos) -> Self {
        Self {
            text,
            filename,
            idx: 0,
            pos: start,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.idx).copied()
    }

    fn rest(&self) -> &'a str {
        &self.text[self.idx..]
    }

    fn bump(&mut self, len: usize) {
        self.pos = self.pos.advance(&self.text[self.idx..self.idx + len]);
        self.idx += len;
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.bump(1);
        }
    }

    /// Range of the character under the cursor
    fn here(&self) -> Range {
        let len = self.rest().chars().next().map_or(0, char::len_utf8);
        Range::spanning(&self.rest()[..len], self.filename, self.pos)
    }

    fn error(&self, summary: &str, detail: impl Into<String>) -> Diagnostics {
        Diagnostic::error(summary, detail)
            .with_subject(self.here())
            .into()
    }

    fn value(&mut self) -> Result<Node, Diagnostics> {
        self.skip_ws();
        let start = self.pos;
        let kind = match self.peek() {
            None => {
                return Err(self.error(
                    "Missing JSON value",
                    "A JSON value must start with a brace, a bracket, a number, a string, or a keyword.",
                ))
            }
            Some(b'{') => self.object()?,
            Some(b'[') => self.array()?,
            Some(b'"') => NodeKind::String(self.string()?),
            Some(b'-' | b'0'..=b'9') => self.number()?,
            Some(c) if c.is_ascii_alphabetic() => self.keyword()?,
            Some(_) => {
                return Err(self.error(
                    "Invalid JSON token",
                    "A JSON value must start with a brace, a bracket, a number, a string, or a keyword.",
                ))
            }
        };
        Ok(Node {
            kind,
            range: Range::new(self.filename, start, self.pos),
        })
    }

    fn object(&mut self) -> Result<NodeKind, Diagnostics> {
        let open = self.here();
        self.bump(1);
        let mut props = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'}') => {
                    self.bump(1);
                    return Ok(NodeKind::Object(props));
                }
                Some(b'"') => {}
                None => {
                    return Err(Diagnostic::error(
                        "Unclosed object",
                        "No closing brace was found for this JSON object.",
                    )
                    .with_subject(open)
                    .into())
                }
                Some(_) => {
                    return Err(self.error(
                        "Invalid object property name",
                        "A JSON object property name must be a string.",
                    ))
                }
            }
            let name_start = self.pos;
            let name = self.string()?;
            let name_range = Range::new(self.filename, name_start, self.pos);
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.error(
                    "Missing property value colon",
                    "A colon must appear between an object property's name and its value.",
                ));
            }
            self.bump(1);
            let value = self.value()?;
            props.push(Property {
                name,
                name_range,
                value,
            });
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.bump(1);
                    self.skip_ws();
                    if self.peek() == Some(b'}') {
                        return Err(self.error(
                            "Trailing comma in object",
                            "JSON does not permit a trailing comma after the final property in an object.",
                        ));
                    }
                }
                Some(b'}') => {}
                None => {
                    return Err(Diagnostic::error(
                        "Unclosed object",
                        "No closing brace was found for this JSON object.",
                    )
                    .with_subject(open)
                    .into())
                }
                Some(_) => {
                    return Err(self.error(
                        "Missing property separator comma",
                        "A comma must appear between each property definition in an object.",
                    ))
                }
            }
        }
    }

    fn array(&mut self) -> Result<NodeKind, Diagnostics> {
        let open = self.here();
        self.bump(1);
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b']') => {
                    self.bump(1);
                    return Ok(NodeKind::Array(items));
                }
                None => {
                    return Err(Diagnostic::error(
                        "Unclosed array",
                        "No closing bracket was found for this JSON array.",
                    )
                    .with_subject(open)
                    .into())
                }
                _ => {}
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.bump(1);
                    self.skip_ws();
                    if self.peek() == Some(b']') {
                        return Err(self.error(
                            "Trailing comma in array",
                            "JSON does not permit a trailing comma after the final value in an array.",
                        ));
                    }
                }
                Some(b']') => {}
                None => {
                    return Err(Diagnostic::error(
                        "Unclosed array",
                        "No closing bracket was found for this JSON array.",
                    )
                    .with_subject(open)
                    .into())
                }
                Some(_) => {
                    return Err(self.error(
                        "Missing array element separator comma",
                        "A comma must appear between each value in an array.",
                    ))
                }
            }
        }
    }

    fn string(&mut self) -> Result<String, Diagnostics> {
        let open = self.here();
        self.bump(1);
        let mut out = String::new();
        loop {
            let rest = self.rest();
            let Some(ch) = rest.chars().next() else {
                return Err(Diagnostic::error(
                    "Unterminated string",
                    "No closing quote was found for this JSON string.",
                )
                .with_subject(open)
                .into());
            };
            match ch {
                '"' => {
                    self.bump(1);
                    return Ok(out);
                }
                '\\' => {
                    let (decoded, len) = self.escape(rest)?;
                    out.push(decoded);
                    self.bump(len);
                }
                c if (c as u32) < 0x20 => {
                    return Err(self.error(
                        "Invalid character in string",
                        "Control characters must be escaped in JSON strings.",
                    ))
                }
                c => {
                    out.push(c);
                    self.bump(c.len_utf8());
                }
            }
        }
    }

    /// Decode the escape sequence at the start of `rest`
    fn escape(&self, rest: &str) -> Result<(char, usize), Diagnostics> {
        let simple = match rest.as_bytes().get(1) {
            Some(b'"') => Some('"'),
            Some(b'\\') => Some('\\'),
            Some(b'/') => Some('/'),
            Some(b'b') => Some('\u{8}'),
            Some(b'f') => Some('\u{c}'),
            Some(b'n') => Some('\n'),
            Some(b'r') => Some('\r'),
            Some(b't') => Some('\t'),
            Some(b'u') => None,
            _ => {
                return Err(self.error(
                    "Invalid escape sequence",
                    "The characters after a backslash do not form a valid JSON escape sequence.",
                ))
            }
        };
        if let Some(c) = simple {
            return Ok((c, 2));
        }
        let hex = |s: Option<&str>| s.and_then(|h| u32::from_str_radix(h, 16).ok());
        let Some(code) = hex(rest.get(2..6)) else {
            return Err(self.error(
                "Invalid escape sequence",
                "A \\u escape must be followed by four hexadecimal digits.",
            ));
        };
        if (0xD800..0xDC00).contains(&code) && rest.get(6..8) == Some("\\u") {
            if let Some(low) = hex(rest.get(8..12)).filter(|l| (0xDC00..0xE000).contains(l)) {
                let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                return Ok((char::from_u32(combined).unwrap_or('\u{FFFD}'), 12));
            }
        }
        Ok((char::from_u32(code).unwrap_or('\u{FFFD}'), 6))
    }

    fn number(&mut self) -> Result<NodeKind, Diagnostics> {
        let b = self.rest().as_bytes();
        let digits = |mut i: usize| {
            while i < b.len() && b[i].is_ascii_digit() {
                i += 1;
            }
            i
        };
        let mut i = usize::from(b.first() == Some(&b'-'));
        let int_end = digits(i);
        if int_end == i {
            return Err(self.error("Invalid number", "A number must contain at least one digit."));
        }
        i = int_end;
        if b.get(i) == Some(&b'.') {
            let frac_end = digits(i + 1);
            if frac_end == i + 1 {
                return Err(self.error(
                    "Invalid number",
                    "A decimal point must be followed by at least one digit.",
                ));
            }
            i = frac_end;
        }
        if matches!(b.get(i), Some(b'e' | b'E')) {
            let mut j = i + 1;
            if matches!(b.get(j), Some(b'+' | b'-')) {
                j += 1;
            }
            let exp_end = digits(j);
            if exp_end == j {
                return Err(self.error("Invalid number", "An exponent must contain at least one digit."));
            }
            i = exp_end;
        }
        let text = self.rest()[..i].to_owned();
        if !text.parse::<f64>().is_ok_and(f64::is_finite) {
            return Err(self.error(
                "Invalid number",
                format!("The number {} is outside the supported range.", text),
            ));
        }
        self.bump(i);
        Ok(NodeKind::Number(text))
    }

    fn keyword(&mut self) -> Result<NodeKind, Diagnostics> {
        let len = self
            .rest()
            .bytes()
            .take_while(u8::is_ascii_alphanumeric)
            .count();
        let word = &self.rest()[..len];
        let kind = match word {
            "true" => NodeKind::Bool(true),
            "false" => NodeKind::Bool(false),
            "null" => NodeKind::Null,
            _ => {
                return Err(Diagnostic::error(
                    "Invalid JSON keyword",
                    format!(
                        "The keyword {:?} is not valid. Valid keywords are \"true\", \"false\", and \"null\".",
                        word
                    ),
                )
                .with_subject(Range::spanning(word, self.filename, self.pos))
                .into())
            }
        };
        self.bump(len);
        Ok(kind)
    }

    fn finish(mut self, node: Node) -> Result<Node, Diagnostics> {
        self.skip_ws();
        if self.idx < self.text.len() {
            return Err(self.error(
                "Extraneous data after value",
                "Extra characters appear after the JSON value.",
            ));
        }
        Ok(node)
    }
}

/// Parse a whole JSON file
pub(crate) fn parse_body(source: Arc<Source>) -> Result<Body, Diagnostics> {
    let node = {
        let mut parser = Parser::new(source.text(), source.name(), Pos::START);
        let node = parser.value()?;
        parser.finish(node)?
    };
    Ok(Body::json(node, source))
}

/// Parse a standalone JSON value placed at `start`
pub fn parse_expression(text: &str, filename: &str, start: Pos) -> Result<Node, Diagnostics> {
    let mut parser = Parser::new(text, filename, start);
    let node = parser.value()?;
    parser.finish(node)
}

fn object_required(node: &Node) -> Diagnostic {
    Diagnostic::error(
        "Incorrect JSON value type",
        "A JSON object is required here, setting the arguments for this block.",
    )
    .with_subject(node.open_range())
}

fn attribute(prop: &Property, source: &Source) -> Attribute {
    let text = source.slice(prop.value.range.byte_range()).to_owned();
    Attribute {
        name: prop.name.clone(),
        expr: Expression::json(prop.value.clone(), text),
        range: Range::between(&prop.name_range, &prop.value.range),
        name_range: prop.name_range.clone(),
    }
}

fn duplicate_argument(prop: &Property, first: &Property) -> Diagnostic {
    Diagnostic::error(
        "Duplicate argument",
        format!(
            "The argument {:?} was already set at {}.",
            prop.name, first.name_range
        ),
    )
    .with_subject(prop.name_range.clone())
}

pub(crate) fn content(
    node: &Node,
    source: &Arc<Source>,
    missing_item_range: &Range,
    schema: &Schema,
    partial: bool,
) -> (Content, Diagnostics) {
    let mut content = Content::default();
    let mut diags = Diagnostics::new();
    let props = match &node.kind {
        NodeKind::Object(props) => props,
        _ => {
            diags.push(object_required(node));
            return (content, diags);
        }
    };
    let mut used: HashSet<&str> = HashSet::new();

    for spec in &schema.attributes {
        let mut found = props.iter().filter(|p| p.name == spec.name);
        let Some(first) = found.next() else {
            if spec.required {
                diags.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!(
                            "The argument {:?} is required, but no definition was found.",
                            spec.name
                        ),
                    )
                    .with_subject(missing_item_range.clone()),
                );
            }
            continue;
        };
        content.attributes.push(attribute(first, source));
        for dup in found {
            diags.push(duplicate_argument(dup, first));
        }
        used.insert(spec.name.as_str());
    }

    for spec in &schema.blocks {
        for prop in props.iter().filter(|p| p.name == spec.type_name) {
            let mut unpack = BlockUnpacker {
                type_name: &spec.type_name,
                type_range: &prop.name_range,
                source,
                labels: Vec::new(),
                label_ranges: Vec::new(),
                blocks: &mut content.blocks,
                diags: &mut diags,
            };
            unpack.unpack(&prop.value, &spec.label_names);
            used.insert(spec.type_name.as_str());
        }
    }
    content.blocks.sort_by_key(|b| b.def_range.start.byte);

    if !partial {
        for prop in props {
            if prop.name == "//" || used.contains(prop.name.as_str()) {
                continue;
            }
            let suggestion = super::native::name_suggestion(
                &prop.name,
                schema
                    .attributes
                    .iter()
                    .map(|a| a.name.as_str())
                    .chain(schema.blocks.iter().map(|b| b.type_name.as_str())),
            )
            .map(|s| format!(" Did you mean {:?}?", s))
            .unwrap_or_default();
            diags.push(
                Diagnostic::error(
                    "Extraneous JSON object property",
                    format!("No argument or block type is named {:?}.{}", prop.name, suggestion),
                )
                .with_subject(prop.name_range.clone()),
            );
        }
    }

    (content, diags)
}

struct BlockUnpacker<'s, 'o> {
    type_name: &'s str,
    type_range: &'s Range,
    source: &'s Arc<Source>,
    labels: Vec<String>,
    label_ranges: Vec<Range>,
    blocks: &'o mut Vec<Block>,
    diags: &'o mut Diagnostics,
}

impl BlockUnpacker<'_, '_> {
    fn unpack(&mut self, value: &Node, labels_left: &[String]) {
        if let Some((label_name, rest)) = labels_left.split_first() {
            let Some(props) = self.label_properties(value, label_name) else {
                return;
            };
            if props.is_empty() {
                self.diags.push(
                    Diagnostic::error(
                        "Missing block label",
                        format!(
                            "At least one object property is required, whose name represents the {} block's {}.",
                            self.type_name, label_name
                        ),
                    )
                    .with_subject(value.open_range()),
                );
            }
            for prop in props {
                self.labels.push(prop.name.clone());
                self.label_ranges.push(prop.name_range.clone());
                self.unpack(&prop.value, rest);
                self.labels.pop();
                self.label_ranges.pop();
            }
            return;
        }

        match &value.kind {
            NodeKind::Null => {}
            NodeKind::Object(_) => self.push(value),
            NodeKind::Array(items) => items.iter().for_each(|item| self.push(item)),
            _ => self.diags.push(
                Diagnostic::error(
                    "Incorrect JSON value type",
                    format!(
                        "Either a JSON object or a JSON array is required, representing the contents of one or more {:?} blocks.",
                        self.type_name
                    ),
                )
                .with_subject(value.open_range()),
            ),
        }
    }

    /// Properties whose names are the values of the next label
    fn label_properties<'n>(&mut self, value: &'n Node, label_name: &str) -> Option<Vec<&'n Property>> {
        let mut props = Vec::new();
        let objects: Vec<&Node> = match &value.kind {
            NodeKind::Array(items) => items.iter().collect(),
            _ => vec![value],
        };
        for obj in objects {
            match &obj.kind {
                NodeKind::Object(p) => props.extend(p.iter().filter(|p| p.name != "//")),
                _ => {
                    self.diags.push(
                        Diagnostic::error(
                            "Incorrect JSON value type",
                            format!(
                                "A JSON object is required here, whose keys represent the {} block's {}.",
                                self.type_name, label_name
                            ),
                        )
                        .with_subject(obj.open_range()),
                    );
                    return None;
                }
            }
        }
        Some(props)
    }

    fn push(&mut self, node: &Node) {
        self.blocks.push(Block {
            type_name: self.type_name.to_owned(),
            labels: self.labels.clone(),
            body: Body::json(node.clone(), self.source.clone()),
            def_range: node.open_range(),
            type_range: self.type_range.clone(),
            label_ranges: self.label_ranges.clone(),
        });
    }
}

pub(crate) fn just_attributes(node: &Node, source: &Arc<Source>) -> (Vec<Attribute>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let props = match &node.kind {
        NodeKind::Object(props) => props,
        _ => {
            diags.push(object_required(node));
            return (Vec::new(), diags);
        }
    };
    let mut attrs: Vec<Attribute> = Vec::new();
    let mut firsts: Vec<&Property> = Vec::new();
    for prop in props {
        if prop.name == "//" {
            continue;
        }
        if let Some(first) = firsts.iter().find(|f| f.name == prop.name) {
            diags.push(duplicate_argument(prop, first));
            continue;
        }
        firsts.push(prop);
        attrs.push(attribute(prop, source));
    }
    (attrs, diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_file, AttributeSpec, BlockHeaderSpec};

    fn resource_schema() -> Schema {
        Schema {
            attributes: vec![],
            blocks: vec![BlockHeaderSpec {
                type_name: "resource".to_string(),
                label_names: vec!["type".to_string(), "name".to_string()],
            }],
        }
    }

    #[test]
    fn test_number_out_of_range() {
        let diags = parse_expression("[1, 1e400]", "x.json", Pos::START).unwrap_err();
        assert_eq!(diags[0].summary, "Invalid number");
        assert_eq!(diags[0].subject.as_ref().unwrap().start.byte, 4);
        assert!(parse_expression("1e300", "x.json", Pos::START).is_ok());
    }

    #[test]
    fn test_parse_tracks_ranges() {
        let node = parse_expression("{\"a\": [1, true]}", "x.json", Pos::START).unwrap();
        let NodeKind::Object(props) = &node.kind else {
            panic!("expected object");
        };
        assert_eq!(props[0].name_range.byte_range(), 1..4);
        assert_eq!(props[0].value.range.byte_range(), 6..15);
        assert_eq!(node.range.byte_range(), 0..16);
    }

    #[test]
    fn test_parse_with_offset_start() {
        let start = Pos::new(3, 5, 40);
        let node = parse_expression("\"x\"", "x.json", start).unwrap();
        assert_eq!(node.range.start, start);
        assert_eq!(node.range.end, Pos::new(3, 8, 43));
    }

    #[test]
    fn test_string_escapes() {
        let node = parse_expression(r#""a\n\"é😀""#, "x.json", Pos::START).unwrap();
        assert_eq!(node.kind, NodeKind::String("a\n\"é😀".to_string()));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_expression("{\"a\" 1}", "x.json", Pos::START).is_err());
        assert!(parse_expression("[1,]", "x.json", Pos::START).is_err());
        assert!(parse_expression("nope", "x.json", Pos::START).is_err());
        assert!(parse_expression("1 2", "x.json", Pos::START).is_err());
    }

    #[test]
    fn test_labels_from_nested_objects() {
        let src = r#"{"resource": {"aws_instance": {"a": {"ami": "x"}, "b": [{}, {}]}}}"#;
        let file = parse_file(src.as_bytes(), "main.tf.json").unwrap();
        let (content, diags) = file.body().content(&resource_schema());
        assert!(diags.is_empty(), "{}", diags);
        let labels: Vec<Vec<String>> = content.blocks.iter().map(|b| b.labels.clone()).collect();
        assert_eq!(
            labels,
            vec![
                vec!["aws_instance".to_string(), "a".to_string()],
                vec!["aws_instance".to_string(), "b".to_string()],
                vec!["aws_instance".to_string(), "b".to_string()],
            ]
        );
        assert_eq!(content.blocks[0].type_range.byte_range(), 1..11);
    }

    #[test]
    fn test_extraneous_property_and_comments() {
        let src = r#"{"//": "note", "nmae": "x"}"#;
        let file = parse_file(src.as_bytes(), "main.tf.json").unwrap();
        let schema = Schema {
            attributes: vec![AttributeSpec {
                name: "name".to_string(),
                required: false,
            }],
            blocks: vec![],
        };
        let (_, diags) = file.body().content(&schema);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Extraneous JSON object property");
        assert_eq!(
            diags[0].detail,
            "No argument or block type is named \"nmae\". Did you mean \"name\"?"
        );
        let (_, partial) = file.body().partial_content(&schema);
        assert!(partial.is_empty());
    }

    #[test]
    fn test_missing_required_points_at_closing_brace() {
        let file = parse_file(b"{}", "main.tf.json").unwrap();
        let schema = Schema {
            attributes: vec![AttributeSpec {
                name: "name".to_string(),
                required: true,
            }],
            blocks: vec![],
        };
        let (_, diags) = file.body().content(&schema);
        assert_eq!(diags[0].subject.as_ref().unwrap().byte_range(), 1..2);
    }

    #[test]
    fn test_body_must_be_object() {
        let file = parse_file(b"[1]", "main.tf.json").unwrap();
        let (_, diags) = file.body().just_attributes();
        assert_eq!(diags[0].summary, "Incorrect JSON value type");
    }

    #[test]
    fn test_duplicate_argument() {
        let file = parse_file(br#"{"a": 1, "a": 2}"#, "main.tf.json").unwrap();
        let (attrs, diags) = file.body().just_attributes();
        assert_eq!(attrs.len(), 1);
        assert_eq!(diags[0].summary, "Duplicate argument");
    }
}
