use super::{Block, BodyContent, BodySchema, SchemaMode};
use crate::syntax::{Body, Diagnostics};

/// Extract `body` strictly: attributes and blocks the schema does not
/// name are reported.
///
/// An absent body yields empty content, an absent schema is the empty
/// schema.
pub fn content(body: Option<&Body>, schema: Option<&BodySchema>) -> (BodyContent, Diagnostics) {
    extract(body, schema, false)
}

/// Extract `body`, silently skipping anything the schema does not name
pub fn partial_content(
    body: Option<&Body>,
    schema: Option<&BodySchema>,
) -> (BodyContent, Diagnostics) {
    extract(body, schema, true)
}

fn extract(
    body: Option<&Body>,
    schema: Option<&BodySchema>,
    partial: bool,
) -> (BodyContent, Diagnostics) {
    let Some(body) = body else {
        return (BodyContent::default(), Diagnostics::new());
    };
    let empty = BodySchema::default();
    let schema = schema.unwrap_or(&empty);

    if schema.mode == SchemaMode::JustAttributes {
        let (attrs, diags) = body.just_attributes();
        let content = BodyContent {
            attributes: attrs.into_iter().map(|a| (a.name.clone(), a.into())).collect(),
            blocks: Vec::new(),
            missing_item_range: Some(body.missing_item_range().clone()),
        };
        return (content, diags);
    }

    let syntax_schema = schema.to_syntax();
    let (found, mut diags) = if partial {
        body.partial_content(&syntax_schema)
    } else {
        body.content(&syntax_schema)
    };

    let mut content = BodyContent {
        missing_item_range: Some(body.missing_item_range().clone()),
        ..BodyContent::default()
    };
    for attr in found.attributes {
        content.attributes.insert(attr.name.clone(), attr.into());
    }
    for block in found.blocks {
        let child = schema.block_schema(&block.type_name).map(|b| &b.body);
        let (inner, child_diags) = extract(Some(&block.body), child, partial);
        diags.extend(child_diags);
        content.blocks.push(Block {
            type_name: block.type_name,
            labels: block.labels,
            body: inner,
            def_range: block.def_range,
            type_range: block.type_range,
            label_ranges: block.label_ranges,
        });
    }
    (content, diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_file;

    #[test]
    fn test_absent_body_is_empty() {
        let (content, diags) = content(None, Some(&BodySchema::new().required("a")));
        assert!(content.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_absent_schema_is_empty_schema() {
        let file = parse_file(b"a = 1\n", "main.tf").unwrap();
        let (found, diags) = partial_content(Some(file.body()), None);
        assert!(found.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_nested_diagnostics_propagate() {
        let src = "a {\n  b {\n    unknown = 1\n  }\n}\n";
        let file = parse_file(src.as_bytes(), "main.tf").unwrap();
        let schema = BodySchema::new().block("a", &[], BodySchema::new().block("b", &[], BodySchema::new()));
        let (found, diags) = content(Some(file.body()), Some(&schema));
        assert_eq!(found.blocks[0].body.blocks[0].type_name, "b");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Unsupported argument");
    }

    #[test]
    fn test_just_attributes_mode() {
        let file = parse_file(b"x = 1\ny = \"a\"\n", "main.tf").unwrap();
        let (found, diags) = content(Some(file.body()), Some(&BodySchema::just_attributes()));
        assert!(diags.is_empty());
        assert_eq!(found.attributes.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    }
}
