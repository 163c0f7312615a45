use crate::syntax::{self, Expression, Range};
use std::collections::BTreeMap;

/// A body projected onto a schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyContent {
    pub attributes: BTreeMap<String, Attribute>,
    pub blocks: Vec<Block>,
    /// Where an item missing from this body would go
    pub missing_item_range: Option<Range>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub expr: Expression,
    pub range: Range,
    pub name_range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub type_name: String,
    pub labels: Vec<String>,
    pub body: BodyContent,
    pub def_range: Range,
    pub type_range: Range,
    pub label_ranges: Vec<Range>,
}

impl BodyContent {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.blocks.is_empty()
    }

    /// Blocks of one type, in document order
    pub fn blocks_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.type_name == type_name)
    }
}

impl From<syntax::Attribute> for Attribute {
    fn from(attr: syntax::Attribute) -> Self {
        Self {
            name: attr.name,
            expr: attr.expr,
            range: attr.range,
            name_range: attr.name_range,
        }
    }
}
