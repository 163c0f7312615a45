//! Tests for schema synthesis and typed decoding of bodies

use pretty_assertions::assert_eq;
use ruleplug::hclext::{content, decode_body, implied_body_schema};
use ruleplug::syntax::parse_file;
use ruleplug::{impl_decode, Diagnostics, EvalContext};

#[derive(Debug, Default, PartialEq)]
struct Root {
    noodle: Noodle,
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

#[derive(Debug, Default)]
struct Named {
    name: String,
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
impl_decode!(Named { name => attr("name") });

/// Extract with the implied schema, then bind; returns the binder's
/// diagnostics after checking extraction found nothing wrong
fn decode<T: ruleplug::Decode>(src: &str, filename: &str) -> (T, Diagnostics) {
    let file = parse_file(src.as_bytes(), filename).unwrap();
    let (found, diags) = content(Some(file.body()), Some(&implied_body_schema::<T>()));
    assert!(diags.is_empty(), "{}", diags);
    let mut target = T::default();
    let diags = decode_body(&found, &EvalContext::new(), &mut target);
    (target, diags)
}

fn expected_noodle() -> Noodle {
    Noodle {
        name: "foo".to_string(),
        sub_name: "bar".to_string(),
        kind: "rice".to_string(),
        breads: vec![
            Bread {
                name: "baz".to_string(),
                kind: "focaccia".to_string(),
                baked: true,
            },
            Bread {
                name: "quz".to_string(),
                kind: "rye".to_string(),
                baked: false,
            },
        ],
    }
}

#[test]
fn test_nested_blocks() {
    let src = r#"
noodle "foo" "bar" {
  type = "rice"

  bread "baz" {
    type  = "focaccia"
    baked = true
  }

  bread "quz" {
    type = "rye"
  }
}
"#;
    let (root, diags) = decode::<Root>(src, "main.tf");
    assert!(diags.is_empty(), "{}", diags);
    assert_eq!(root.noodle, expected_noodle());
}

#[test]
fn test_nested_blocks_json() {
    let src = r#"{
  "noodle": {
    "foo": {
      "bar": {
        "type": "rice",
        "bread": {
          "baz": { "type": "focaccia", "baked": true },
          "quz": { "type": "rye" }
        }
      }
    }
  }
}"#;
    let (root, diags) = decode::<Root>(src, "main.tf.json");
    assert!(diags.is_empty(), "{}", diags);
    assert_eq!(root.noodle, expected_noodle());
}

#[test]
fn test_missing_required_attribute() {
    let file = parse_file(b"", "main.tf").unwrap();
    let (found, _) = content(Some(file.body()), Some(&implied_body_schema::<Named>()));
    assert!(found.is_empty());
    let mut named = Named::default();
    let diags = decode_body(&found, &EvalContext::new(), &mut named);
    assert_eq!(named.name, "");
    assert_eq!(diags.len(), 1);
    assert!(diags[0].summary.contains("name"), "{}", diags[0].summary);
}

#[test]
fn test_duplicate_single_block() {
    let src = "noodle \"a\" \"b\" {\n  type = \"rice\"\n}\nnoodle \"c\" \"d\" {\n  type = \"udon\"\n}\n";
    let (_, diags) = decode::<Root>(src, "main.tf");
    assert_eq!(diags.len(), 1, "{}", diags);
    assert_eq!(diags[0].summary, "Duplicate noodle block");
    let subject = diags[0].subject.as_ref().unwrap();
    assert_eq!(subject.start.line, 4);
}

#[derive(Debug, Default)]
struct Bowl {
    noodle: Noodle,
}

#[derive(Debug, Default)]
struct Table {
    bowl: Option<Bowl>,
}

impl_decode!(Bowl { noodle => block("noodle") });
impl_decode!(Table { bowl => block("bowl") });

#[test]
fn test_missing_block_points_at_enclosing_body() {
    let (table, diags) = decode::<Table>("bowl {\n}\n", "main.tf");
    assert!(table.bowl.is_some());
    assert_eq!(diags.len(), 1, "{}", diags);
    assert_eq!(diags[0].summary, "Missing noodle block");
    let subject = diags[0].subject.as_ref().unwrap();
    assert_eq!(subject.filename, "main.tf");
    assert_eq!(subject.start.byte, 5);
}
