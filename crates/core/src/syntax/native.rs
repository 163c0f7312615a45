//! Native syntax bodies backed by `hcl-edit`
//!
//! `hcl-edit` keeps byte spans on every structure, which is all the
//! extractor needs to hand out precise ranges. Content extraction follows
//! the rules of the reference native parser, including the exact wording
//! of its diagnostics, because rule authors match on them.

use super::{
    Attribute, Block, Body, Content, Diagnostic, Diagnostics, Expression, Pos, Range, Schema,
    Source,
};
use hcl_edit::structure::{self, BlockLabel, Structure};
use hcl_edit::Span;
use std::collections::HashMap;
use std::sync::Arc;

/// Parse a whole file
pub(crate) fn parse_body(source: Arc<Source>) -> Result<Body, Diagnostics> {
    let body = structure_body(&source)?;
    let mut diags = Diagnostics::new();
    check_redefined(&body, &source, &mut diags);
    if diags.has_errors() {
        return Err(diags);
    }
    let missing = Range::at(source.name(), Pos::START);
    Ok(Body::native(body, source, missing))
}

fn structure_body(source: &Source) -> Result<structure::Body, Diagnostics> {
    hcl_edit::parser::parse_body(source.text()).map_err(|e| {
        let pos = source.pos_at(e.location().offset());
        Diagnostics::from(
            Diagnostic::error("Invalid configuration syntax", e.message().to_string())
                .with_subject(Range::at(source.name(), pos)),
        )
    })
}

/// Attributes are only allowed once per body, at any depth
fn check_redefined(body: &structure::Body, source: &Source, diags: &mut Diagnostics) {
    let mut seen: HashMap<&str, Range> = HashMap::new();
    for item in body.iter() {
        match item {
            Structure::Attribute(attr) => {
                let name_range = range_of(source, attr.key.span());
                match seen.get(attr.key.as_str()) {
                    Some(first) => diags.push(
                        Diagnostic::error(
                            "Attribute redefined",
                            format!(
                                "The argument {:?} was already set at {}. Each argument may be set only once.",
                                attr.key.as_str(),
                                first
                            ),
                        )
                        .with_subject(name_range),
                    ),
                    None => {
                        seen.insert(attr.key.as_str(), name_range);
                    }
                }
            }
            Structure::Block(block) => check_redefined(&block.body, source, diags),
        }
    }
}

fn range_of(source: &Source, span: Option<std::ops::Range<usize>>) -> Range {
    match span {
        Some(span) => source.range(span),
        None => Range::at(source.name(), Pos::START),
    }
}

fn attribute(attr: &structure::Attribute, source: &Arc<Source>) -> Attribute {
    let name_range = range_of(source, attr.key.span());
    let expr = match attr.value.span() {
        Some(span) => {
            let text = source.slice(span.clone()).trim_end();
            let range = Range::spanning(text, source.name(), source.pos_at(span.start));
            Expression::native(attr.value.clone(), range, text.to_owned())
        }
        None => Expression::native(
            attr.value.clone(),
            Range::at(source.name(), name_range.end),
            String::new(),
        ),
    };
    Attribute {
        name: attr.key.as_str().to_owned(),
        range: Range::between(&name_range, expr.range()),
        name_range,
        expr,
    }
}

fn label_text(label: &BlockLabel) -> String {
    match label {
        BlockLabel::Ident(ident) => ident.as_str().to_owned(),
        BlockLabel::String(s) => s.as_str().to_owned(),
    }
}

fn block(block: &structure::Block, source: &Arc<Source>) -> Block {
    let type_range = range_of(source, block.ident.span());
    let label_ranges: Vec<Range> = block
        .labels
        .iter()
        .map(|l| range_of(source, l.span()))
        .collect();
    let def_range = Range::between(&type_range, label_ranges.last().unwrap_or(&type_range));
    let header_end = def_range.end.byte;
    let brace = source.text()[header_end..]
        .find('{')
        .map(|i| header_end + i)
        .unwrap_or(header_end);
    Block {
        type_name: block.ident.as_str().to_owned(),
        labels: block.labels.iter().map(label_text).collect(),
        body: Body::native(
            block.body.clone(),
            source.clone(),
            Range::at(source.name(), source.pos_at(brace)),
        ),
        def_range,
        type_range,
        label_ranges,
    }
}

/// Range of the `{` that opens a block body
fn open_brace_range(block: &Block) -> Range {
    let at = block.body.missing_item_range();
    Range::spanning("{", at.filename.clone(), at.start)
}

fn items(body: &structure::Body, source: &Arc<Source>) -> (Vec<Attribute>, Vec<Block>) {
    let mut attrs = Vec::new();
    let mut blocks = Vec::new();
    for item in body.iter() {
        match item {
            Structure::Attribute(attr) => attrs.push(attribute(attr, source)),
            Structure::Block(b) => blocks.push(block(b, source)),
        }
    }
    (attrs, blocks)
}

pub(crate) fn content(
    body: &structure::Body,
    source: &Arc<Source>,
    missing_item_range: &Range,
    schema: &Schema,
    partial: bool,
) -> (Content, Diagnostics) {
    let (attrs, blocks) = items(body, source);
    let mut content = Content::default();
    let mut diags = Diagnostics::new();

    for attr_schema in &schema.attributes {
        match attrs.iter().find(|a| a.name == attr_schema.name) {
            Some(attr) => content.attributes.push(attr.clone()),
            None if attr_schema.required => diags.push(
                Diagnostic::error(
                    "Missing required argument",
                    format!(
                        "The argument {:?} is required, but no definition was found.",
                        attr_schema.name
                    ),
                )
                .with_subject(missing_item_range.clone()),
            ),
            None => {}
        }
    }

    for attr in &attrs {
        if schema.attribute(&attr.name).is_some() {
            continue;
        }
        let suggestion = if partial {
            None
        } else {
            name_suggestion(&attr.name, schema.attributes.iter().map(|a| a.name.as_str()))
        };
        let hint = match suggestion {
            Some(s) => format!(" Did you mean {:?}?", s),
            None if schema.block(&attr.name).is_some() => {
                format!(" Did you mean to define a block of type {:?}?", attr.name)
            }
            None if !partial => String::new(),
            None => continue,
        };
        diags.push(
            Diagnostic::error(
                "Unsupported argument",
                format!("An argument named {:?} is not expected here.{}", attr.name, hint),
            )
            .with_subject(attr.name_range.clone()),
        );
    }

    for block in blocks {
        let Some(block_schema) = schema.block(&block.type_name) else {
            let suggestion = if partial {
                None
            } else {
                name_suggestion(
                    &block.type_name,
                    schema.blocks.iter().map(|b| b.type_name.as_str()),
                )
            };
            let hint = match suggestion {
                Some(s) => format!(" Did you mean {:?}?", s),
                None if schema.attribute(&block.type_name).is_some() => format!(
                    " Did you mean to define argument {:?}? If so, use the equals sign to assign it a value.",
                    block.type_name
                ),
                None if !partial => String::new(),
                None => continue,
            };
            diags.push(
                Diagnostic::error(
                    "Unsupported block type",
                    format!("Blocks of type {:?} are not expected here.{}", block.type_name, hint),
                )
                .with_subject(block.type_range.clone()),
            );
            continue;
        };

        let expected = block_schema.label_names.len();
        if block.labels.len() > expected {
            let detail = if expected == 0 {
                format!("No labels are expected for {} blocks.", block.type_name)
            } else {
                format!(
                    "Only {} labels ({}) are expected for {} blocks.",
                    expected,
                    block_schema.label_names.join(", "),
                    block.type_name
                )
            };
            diags.push(
                Diagnostic::error(format!("Extraneous label for {}", block.type_name), detail)
                    .with_subject(block.label_ranges[expected].clone()),
            );
            continue;
        }
        if block.labels.len() < expected {
            diags.push(
                Diagnostic::error(
                    format!(
                        "Missing {} for {}",
                        block_schema.label_names[block.labels.len()],
                        block.type_name
                    ),
                    format!(
                        "All {} blocks must have {} labels ({}).",
                        block.type_name,
                        expected,
                        block_schema.label_names.join(", ")
                    ),
                )
                .with_subject(open_brace_range(&block)),
            );
            continue;
        }
        content.blocks.push(block);
    }

    (content, diags)
}

pub(crate) fn just_attributes(
    body: &structure::Body,
    source: &Arc<Source>,
) -> (Vec<Attribute>, Diagnostics) {
    let (attrs, blocks) = items(body, source);
    let mut diags = Diagnostics::new();
    if let Some(first) = blocks.first() {
        diags.push(
            Diagnostic::error(
                format!("Unexpected {:?} block", first.type_name),
                "Blocks are not allowed here.",
            )
            .with_subject(first.type_range.clone()),
        );
    }
    (attrs, diags)
}

/// First candidate within a small edit distance of `given`
pub(crate) fn name_suggestion<'a>(
    given: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<&'a str> {
    candidates
        .into_iter()
        .find(|c| levenshtein(given, c) < 3)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        prev = cur;
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_file, AttributeSpec, BlockHeaderSpec};

    fn schema(attrs: &[(&str, bool)], blocks: &[(&str, &[&str])]) -> Schema {
        Schema {
            attributes: attrs
                .iter()
                .map(|(name, required)| AttributeSpec {
                    name: name.to_string(),
                    required: *required,
                })
                .collect(),
            blocks: blocks
                .iter()
                .map(|(t, labels)| BlockHeaderSpec {
                    type_name: t.to_string(),
                    label_names: labels.iter().map(|l| l.to_string()).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_attribute_ranges() {
        let file = parse_file(b"foo = \"bar\" # trailing\n", "main.tf").unwrap();
        let (content, diags) = file.body().content(&schema(&[("foo", true)], &[]));
        assert!(diags.is_empty(), "{}", diags);
        let attr = &content.attributes[0];
        assert_eq!(attr.name_range.byte_range(), 0..3);
        assert_eq!(attr.expr.range().byte_range(), 6..11);
        assert_eq!(attr.expr.text(), "\"bar\"");
        assert_eq!(attr.range.byte_range(), 0..11);
    }

    #[test]
    fn test_block_ranges() {
        let src = "resource \"aws_instance\" \"web\" {\n  ami = 1\n}\n";
        let file = parse_file(src.as_bytes(), "main.tf").unwrap();
        let (content, diags) = file
            .body()
            .content(&schema(&[], &[("resource", &["type", "name"])]));
        assert!(diags.is_empty(), "{}", diags);
        let block = &content.blocks[0];
        assert_eq!(block.labels, vec!["aws_instance", "web"]);
        assert_eq!(block.type_range.byte_range(), 0..8);
        assert_eq!(block.label_ranges[1].byte_range(), 24..29);
        assert_eq!(block.def_range.byte_range(), 0..29);
        assert_eq!(block.body.missing_item_range().start.byte, 30);
    }

    #[test]
    fn test_missing_required_argument() {
        let file = parse_file(b"", "main.tf").unwrap();
        let (_, diags) = file.body().content(&schema(&[("name", true)], &[]));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Missing required argument");
        assert_eq!(
            diags[0].detail,
            "The argument \"name\" is required, but no definition was found."
        );
    }

    #[test]
    fn test_unknown_items_only_rejected_in_strict_mode() {
        let file = parse_file(b"foo = 1\nbar {}\n", "main.tf").unwrap();
        let (_, strict) = file.body().content(&Schema::default());
        assert_eq!(strict.len(), 2);
        assert_eq!(strict[0].summary, "Unsupported argument");
        assert_eq!(strict[1].summary, "Unsupported block type");
        let (content, partial) = file.body().partial_content(&Schema::default());
        assert!(partial.is_empty());
        assert!(content.attributes.is_empty());
    }

    #[test]
    fn test_block_written_as_attribute() {
        let file = parse_file(b"bar = {}\n", "main.tf").unwrap();
        let (_, diags) = file.body().partial_content(&schema(&[], &[("bar", &[])]));
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].detail,
            "An argument named \"bar\" is not expected here. Did you mean to define a block of type \"bar\"?"
        );
    }

    #[test]
    fn test_label_arity() {
        let file = parse_file(b"a \"x\" \"y\" {}\nb {}\n", "main.tf").unwrap();
        let (content, diags) = file
            .body()
            .content(&schema(&[], &[("a", &["name"]), ("b", &["name"])]));
        assert!(content.blocks.is_empty());
        assert_eq!(diags[0].summary, "Extraneous label for a");
        assert_eq!(diags[0].detail, "Only 1 labels (name) are expected for a blocks.");
        assert_eq!(diags[0].subject.as_ref().unwrap().byte_range(), 6..9);
        assert_eq!(diags[1].summary, "Missing name for b");
        assert_eq!(diags[1].detail, "All b blocks must have 1 labels (name).");
    }

    #[test]
    fn test_attribute_redefined() {
        let err = parse_file(b"a = 1\na = 2\n", "main.tf").unwrap_err();
        assert_eq!(err[0].summary, "Attribute redefined");
    }

    #[test]
    fn test_just_attributes_rejects_blocks() {
        let file = parse_file(b"a = 1\nb {}\n", "main.tf").unwrap();
        let (attrs, diags) = file.body().just_attributes();
        assert_eq!(attrs.len(), 1);
        assert_eq!(diags[0].summary, "Unexpected \"b\" block");
    }

    #[test]
    fn test_name_suggestion() {
        assert_eq!(name_suggestion("nmae", ["name", "type"]), Some("name"));
        assert_eq!(name_suggestion("zzzz", ["name"]), None);
    }
}
