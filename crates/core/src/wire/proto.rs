//! Wire forms of body contents
//!
//! Expressions travel as their source bytes plus the range they came from
//! and are re-parsed on arrival.

use crate::hclext::{Attribute, Block, BodyContent};
use crate::syntax::{Diagnostics, Expression, Range};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireExpression {
    pub bytes: Vec<u8>,
    /// Filename and start position pick the parser and anchor positions
    pub range: Range,
}

impl WireExpression {
    pub fn rehydrate(&self) -> Result<Expression, Diagnostics> {
        Expression::parse(&self.bytes, &self.range.filename, self.range.start)
    }
}

impl From<&Expression> for WireExpression {
    fn from(expr: &Expression) -> Self {
        Self {
            bytes: expr.text().as_bytes().to_vec(),
            range: expr.range().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAttribute {
    pub name: String,
    pub expr: WireExpression,
    pub range: Range,
    pub name_range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBlock {
    pub type_name: String,
    pub labels: Vec<String>,
    pub body: WireBodyContent,
    pub def_range: Range,
    pub type_range: Range,
    pub label_ranges: Vec<Range>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBodyContent {
    pub attributes: BTreeMap<String, WireAttribute>,
    pub blocks: Vec<WireBlock>,
    #[serde(default)]
    pub missing_item_range: Option<Range>,
}

impl From<&BodyContent> for WireBodyContent {
    fn from(content: &BodyContent) -> Self {
        Self {
            attributes: content
                .attributes
                .iter()
                .map(|(name, attr)| (name.clone(), WireAttribute::from(attr)))
                .collect(),
            blocks: content.blocks.iter().map(WireBlock::from).collect(),
            missing_item_range: content.missing_item_range.clone(),
        }
    }
}

impl From<&Attribute> for WireAttribute {
    fn from(attr: &Attribute) -> Self {
        Self {
            name: attr.name.clone(),
            expr: WireExpression::from(&attr.expr),
            range: attr.range.clone(),
            name_range: attr.name_range.clone(),
        }
    }
}

impl From<&Block> for WireBlock {
    fn from(block: &Block) -> Self {
        Self {
            type_name: block.type_name.clone(),
            labels: block.labels.clone(),
            body: WireBodyContent::from(&block.body),
            def_range: block.def_range.clone(),
            type_range: block.type_range.clone(),
            label_ranges: block.label_ranges.clone(),
        }
    }
}

impl WireBodyContent {
    /// Re-parse every expression. Diagnostics from all attributes are
    /// collected before failing.
    pub fn rehydrate(&self) -> Result<BodyContent, Diagnostics> {
        let mut diags = Diagnostics::new();
        let content = self.rehydrate_into(&mut diags);
        if diags.has_errors() {
            return Err(diags);
        }
        Ok(content)
    }

    fn rehydrate_into(&self, diags: &mut Diagnostics) -> BodyContent {
        let mut attributes = BTreeMap::new();
        for (name, attr) in &self.attributes {
            match attr.expr.rehydrate() {
                Ok(expr) => {
                    attributes.insert(
                        name.clone(),
                        Attribute {
                            name: attr.name.clone(),
                            expr,
                            range: attr.range.clone(),
                            name_range: attr.name_range.clone(),
                        },
                    );
                }
                Err(d) => diags.extend(d),
            }
        }
        let blocks = self
            .blocks
            .iter()
            .map(|block| Block {
                type_name: block.type_name.clone(),
                labels: block.labels.clone(),
                body: block.body.rehydrate_into(diags),
                def_range: block.def_range.clone(),
                type_range: block.type_range.clone(),
                label_ranges: block.label_ranges.clone(),
            })
            .collect();
        BodyContent {
            attributes,
            blocks,
            missing_item_range: self.missing_item_range.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hclext::{self, BodySchema};
    use crate::syntax::{parse_file, Pos};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_body_content_survives_the_wire() {
        let src = r#"
resource "aws_instance" "web" {
  ami = "ami-123"
  user_data = <<EOT
echo hi
EOT
  ebs_block_device {
    size = 10 + 2
  }
}
"#;
        let file = parse_file(src.as_bytes(), "main.tf").unwrap();
        let schema = BodySchema::new().block(
            "resource",
            &["type", "name"],
            BodySchema::new()
                .attribute("ami")
                .attribute("user_data")
                .block("ebs_block_device", &[], BodySchema::new().attribute("size")),
        );
        let (content, diags) = hclext::content(Some(file.body()), Some(&schema));
        assert!(diags.is_empty());

        let wire = WireBodyContent::from(&content);
        let bytes = rmp_serde::to_vec_named(&wire).unwrap();
        let decoded: WireBodyContent = rmp_serde::from_slice(&bytes).unwrap();
        let back = decoded.rehydrate().unwrap();
        assert_eq!(back, content);
        assert_eq!(back.blocks[0].labels, vec!["aws_instance", "web"]);
    }

    #[test]
    fn test_unparseable_expression_is_reported() {
        let wire = WireExpression {
            bytes: b"1 +".to_vec(),
            range: Range::at("main.tf", Pos::START),
        };
        assert_eq!(wire.rehydrate().unwrap_err()[0].summary, "Invalid expression");
    }
}
