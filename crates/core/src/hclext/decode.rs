//! Binding body content into Rust types
//!
//! A target type lists its fields with [`impl_decode!`](crate::impl_decode):
//!
//! ```
//! use ruleplug::impl_decode;
//!
//! #[derive(Debug, Default)]
//! struct Bread {
//!     name: String,
//!     kind: String,
//!     baked: bool,
//! }
//!
//! impl_decode!(Bread {
//!     name => label("name"),
//!     kind => attr("type"),
//!     baked => optional("baked"),
//! });
//! ```
//!
//! `attr` is a required attribute, `optional` an optional one, `label` the
//! next positional label of the enclosing block and `block` a nested block.
//! The cardinality of a nested block follows from the field type: a plain
//! struct is exactly one block, `Option<T>` at most one and `Vec<T>` any
//! number.

use super::{AttributeSchema, BlockSchema, BodyContent, BodySchema};
use crate::eval::EvalContext;
use crate::syntax::{Diagnostic, Diagnostics};
use crate::value::FromValue;

/// A type that can be described by a schema and populated from content
pub trait Decode: Default {
    /// Names of the labels the type's block carries, in order
    fn label_names() -> Vec<&'static str>;

    fn schema() -> BodySchema;

    fn decode(&mut self, content: &BodyContent, ctx: &EvalContext, diags: &mut Diagnostics);

    fn set_labels(&mut self, labels: &[String]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    RequiredSingle,
    OptionalSingle,
    Repeated,
}

/// A field holding nested blocks
pub trait BlockField {
    type Element: Decode;

    const CARDINALITY: Cardinality;

    /// Make room for `n` blocks and hand out the elements to decode into.
    /// Existing elements are reused; `n == 0` leaves the field alone.
    fn elements_mut(&mut self, n: usize) -> Vec<&mut Self::Element>;
}

impl<T: Decode> BlockField for Option<T> {
    type Element = T;
    const CARDINALITY: Cardinality = Cardinality::OptionalSingle;

    fn elements_mut(&mut self, n: usize) -> Vec<&mut T> {
        if n == 0 {
            return Vec::new();
        }
        vec![self.get_or_insert_with(T::default)]
    }
}

impl<T: Decode> BlockField for Vec<T> {
    type Element = T;
    const CARDINALITY: Cardinality = Cardinality::Repeated;

    fn elements_mut(&mut self, n: usize) -> Vec<&mut T> {
        if n == 0 {
            return Vec::new();
        }
        self.resize_with(n, T::default);
        self.iter_mut().collect()
    }
}

/// Schema for a type, as a body
pub fn implied_body_schema<T: Decode>() -> BodySchema {
    T::schema()
}

/// Populate `target` from `content`, evaluating attribute expressions in
/// `ctx`. Mismatches are reported as diagnostics; fields with nothing to
/// decode keep their current value.
pub fn decode_body<T: Decode>(content: &BodyContent, ctx: &EvalContext, target: &mut T) -> Diagnostics {
    let mut diags = Diagnostics::new();
    target.decode(content, ctx, &mut diags);
    diags
}

#[doc(hidden)]
pub fn block_schema_of<S, F: BlockField>(type_name: &str, _field: fn(&S) -> &F) -> BlockSchema {
    BlockSchema {
        type_name: type_name.to_owned(),
        label_names: F::Element::label_names()
            .into_iter()
            .map(str::to_owned)
            .collect(),
        body: F::Element::schema(),
    }
}

#[doc(hidden)]
pub fn attribute_schema(name: &str, required: bool) -> AttributeSchema {
    AttributeSchema::new(name, required)
}

#[doc(hidden)]
pub fn decode_attribute<T: FromValue>(
    field: &mut T,
    name: &str,
    required: bool,
    content: &BodyContent,
    ctx: &EvalContext,
    diags: &mut Diagnostics,
) {
    let Some(attr) = content.attributes.get(name) else {
        if required {
            diags.push(Diagnostic::error(
                format!("Missing {:?} argument", name),
                format!("The argument {:?} is required, but no definition was found.", name),
            ));
        }
        return;
    };
    let value = match ctx.evaluate_as(&attr.expr, &T::implied_type()) {
        Ok(value) => value,
        Err(errs) => {
            diags.extend(errs);
            return;
        }
    };
    match T::from_value(value) {
        Ok(v) => *field = v,
        Err(e) => diags.push(
            Diagnostic::error(
                "Unsuitable value type",
                format!("Unsuitable value for {:?}: {}", name, e),
            )
            .with_subject(attr.expr.range().clone()),
        ),
    }
}

#[doc(hidden)]
pub fn decode_blocks<F: BlockField>(
    field: &mut F,
    type_name: &str,
    content: &BodyContent,
    ctx: &EvalContext,
    diags: &mut Diagnostics,
) {
    let blocks: Vec<_> = content.blocks_of_type(type_name).collect();
    let single = F::CARDINALITY != Cardinality::Repeated;
    if single && blocks.len() > 1 {
        diags.push(
            Diagnostic::error(
                format!("Duplicate {} block", type_name),
                format!(
                    "Only one {} block is allowed. Another was defined at {}.",
                    type_name, blocks[0].def_range
                ),
            )
            .with_subject(blocks[1].def_range.clone()),
        );
        return;
    }
    if blocks.is_empty() {
        if F::CARDINALITY == Cardinality::RequiredSingle {
            let mut diag = Diagnostic::error(
                format!("Missing {} block", type_name),
                format!("A {} block is required.", type_name),
            );
            if let Some(range) = &content.missing_item_range {
                diag = diag.with_subject(range.clone());
            }
            diags.push(diag);
        }
        return;
    }
    for (element, block) in field.elements_mut(blocks.len()).into_iter().zip(&blocks) {
        element.set_labels(&block.labels);
        element.decode(&block.body, ctx, diags);
    }
}

/// Describe a struct's fields for schema synthesis and binding.
///
/// Each entry is `field => kind("name")` where kind is one of `attr`,
/// `optional`, `label` or `block`. Label fields must be `String`s and are
/// filled in declaration order.
#[macro_export]
macro_rules! impl_decode {
    ($ty:ty { $($field:ident => $kind:ident($name:literal)),* $(,)? }) => {
        impl $crate::hclext::Decode for $ty {
            #[allow(unused_mut)]
            fn label_names() -> ::std::vec::Vec<&'static str> {
                let mut names = ::std::vec::Vec::new();
                $($crate::__decode_label_name!(names, $kind, $name);)*
                names
            }

            #[allow(unused_mut)]
            fn schema() -> $crate::hclext::BodySchema {
                let mut schema = $crate::hclext::BodySchema::new();
                $($crate::__decode_schema!(schema, $ty, $field, $kind, $name);)*
                schema
            }

            #[allow(unused_variables)]
            fn decode(
                &mut self,
                content: &$crate::hclext::BodyContent,
                ctx: &$crate::eval::EvalContext,
                diags: &mut $crate::syntax::Diagnostics,
            ) {
                $($crate::__decode_field!(self, content, ctx, diags, $field, $kind, $name);)*
            }

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn set_labels(&mut self, labels: &[::std::string::String]) {
                let mut index = 0usize;
                $($crate::__decode_set_label!(self, labels, index, $field, $kind);)*
            }
        }

        impl $crate::hclext::BlockField for $ty {
            type Element = $ty;
            const CARDINALITY: $crate::hclext::Cardinality =
                $crate::hclext::Cardinality::RequiredSingle;

            fn elements_mut(&mut self, n: usize) -> ::std::vec::Vec<&mut $ty> {
                if n == 0 {
                    ::std::vec::Vec::new()
                } else {
                    ::std::vec![self]
                }
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __decode_label_name {
    ($names:ident, label, $name:literal) => {
        $names.push($name);
    };
    ($names:ident, $kind:ident, $name:literal) => {};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __decode_schema {
    ($schema:ident, $ty:ty, $field:ident, attr, $name:literal) => {
        $schema
            .attributes
            .push($crate::hclext::decode::attribute_schema($name, true));
    };
    ($schema:ident, $ty:ty, $field:ident, optional, $name:literal) => {
        $schema
            .attributes
            .push($crate::hclext::decode::attribute_schema($name, false));
    };
    ($schema:ident, $ty:ty, $field:ident, label, $name:literal) => {};
    ($schema:ident, $ty:ty, $field:ident, block, $name:literal) => {
        $schema
            .blocks
            .push($crate::hclext::decode::block_schema_of($name, |v: &$ty| &v.$field));
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __decode_field {
    ($self:ident, $content:ident, $ctx:ident, $diags:ident, $field:ident, attr, $name:literal) => {
        $crate::hclext::decode::decode_attribute(
            &mut $self.$field,
            $name,
            true,
            $content,
            $ctx,
            $diags,
        );
    };
    ($self:ident, $content:ident, $ctx:ident, $diags:ident, $field:ident, optional, $name:literal) => {
        $crate::hclext::decode::decode_attribute(
            &mut $self.$field,
            $name,
            false,
            $content,
            $ctx,
            $diags,
        );
    };
    ($self:ident, $content:ident, $ctx:ident, $diags:ident, $field:ident, label, $name:literal) => {};
    ($self:ident, $content:ident, $ctx:ident, $diags:ident, $field:ident, block, $name:literal) => {
        $crate::hclext::decode::decode_blocks(&mut $self.$field, $name, $content, $ctx, $diags);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __decode_set_label {
    ($self:ident, $labels:ident, $index:ident, $field:ident, label) => {
        match $labels.get($index) {
            Some(label) => $self.$field = label.clone(),
            None => panic!(
                "block has no label for field `{}` at position {}",
                stringify!($field),
                $index
            ),
        }
        $index += 1;
    };
    ($self:ident, $labels:ident, $index:ident, $field:ident, $kind:ident) => {};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hclext::content;
    use crate::syntax::parse_file;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, PartialEq)]
    struct Root {
        noodle: Option<Noodle>,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Noodle {
        name: String,
        sub_name: String,
        kind: String,
        breads: Vec<Bread>,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Bread {
        name: String,
        kind: String,
        baked: bool,
    }

    impl_decode!(Root { noodle => block("noodle") });
    impl_decode!(Noodle {
        name => label("name"),
        sub_name => label("subname"),
        kind => attr("type"),
        breads => block("bread"),
    });
    impl_decode!(Bread {
        name => label("name"),
        kind => attr("type"),
        baked => optional("baked"),
    });

    #[test]
    fn test_implied_schema() {
        let schema = implied_body_schema::<Noodle>();
        let expected = BodySchema::new().required("type").block(
            "bread",
            &["name"],
            BodySchema::new().required("type").attribute("baked"),
        );
        assert_eq!(schema, expected);
        assert_eq!(Noodle::label_names(), vec!["name", "subname"]);
    }

    #[test]
    fn test_sequence_reuses_and_truncates() {
        let src = "bread \"a\" {\n  type = \"rye\"\n}\n";
        let file = parse_file(src.as_bytes(), "main.tf").unwrap();
        let (found, _) = content(Some(file.body()), Some(&implied_body_schema::<Noodle>()));

        let mut noodle = Noodle {
            breads: vec![
                Bread {
                    name: "old".to_string(),
                    kind: "old".to_string(),
                    baked: true,
                },
                Bread::default(),
            ],
            ..Noodle::default()
        };
        let diags = decode_body(&found, &EvalContext::new(), &mut noodle);
        assert_eq!(diags.len(), 1, "{}", diags);
        assert_eq!(
            noodle.breads,
            vec![Bread {
                name: "a".to_string(),
                kind: "rye".to_string(),
                baked: true,
            }]
        );
    }

    #[test]
    fn test_unsuitable_value() {
        let file = parse_file(b"type = [1]\n", "main.tf").unwrap();
        let (found, _) = content(Some(file.body()), Some(&implied_body_schema::<Bread>()));
        let mut bread = Bread::default();
        let diags = decode_body(&found, &EvalContext::new(), &mut bread);
        assert_eq!(diags[0].summary, "Unsuitable value type");
    }

    #[test]
    fn test_optional_block_absent_keeps_value() {
        let mut root = Root {
            noodle: Some(Noodle::default()),
        };
        let diags = decode_body(&BodyContent::default(), &EvalContext::new(), &mut root);
        assert!(diags.is_empty());
        assert!(root.noodle.is_some());
    }
}
