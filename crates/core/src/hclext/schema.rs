use crate::syntax;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaMode {
    #[default]
    Default,
    /// No schema: every attribute is accepted, blocks are not
    JustAttributes,
}

/// Expected shape of a body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodySchema {
    #[serde(default)]
    pub mode: SchemaMode,
    #[serde(default)]
    pub attributes: Vec<AttributeSchema>,
    #[serde(default)]
    pub blocks: Vec<BlockSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSchema {
    pub type_name: String,
    pub label_names: Vec<String>,
    #[serde(default)]
    pub body: BodySchema,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            required,
        }
    }
}

impl BlockSchema {
    pub fn new(type_name: impl Into<String>, label_names: &[&str], body: BodySchema) -> Self {
        Self {
            type_name: type_name.into(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            body,
        }
    }
}

impl BodySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn just_attributes() -> Self {
        Self {
            mode: SchemaMode::JustAttributes,
            ..Self::default()
        }
    }

    /// Add an optional attribute
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(AttributeSchema::new(name, false));
        self
    }

    /// Add a required attribute
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(AttributeSchema::new(name, true));
        self
    }

    pub fn block(mut self, type_name: impl Into<String>, label_names: &[&str], body: BodySchema) -> Self {
        self.blocks.push(BlockSchema::new(type_name, label_names, body));
        self
    }

    pub fn block_schema(&self, type_name: &str) -> Option<&BlockSchema> {
        self.blocks.iter().find(|b| b.type_name == type_name)
    }

    pub(crate) fn to_syntax(&self) -> syntax::Schema {
        syntax::Schema {
            attributes: self
                .attributes
                .iter()
                .map(|a| syntax::AttributeSpec {
                    name: a.name.clone(),
                    required: a.required,
                })
                .collect(),
            blocks: self
                .blocks
                .iter()
                .map(|b| syntax::BlockHeaderSpec {
                    type_name: b.type_name.clone(),
                    label_names: b.label_names.clone(),
                })
                .collect(),
        }
    }
}
