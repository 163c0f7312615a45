//! Evaluated values, expected types and typed decoding
//!
//! A [`Value`] may carry marks (sensitive, ephemeral) and may be unknown.
//! Marks survive the trip across the wire so rules can refuse to look at
//! sensitive data.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// The value as a whole number, if it is one
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Int(i) => Some(i),
            Number::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(f as i64),
            Number::Float(_) => None,
        }
    }

    fn parse(s: &str) -> Option<Number> {
        let s = s.trim();
        s.parse::<i64>()
            .map(Number::Int)
            .ok()
            .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(Number::Float))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_i64() {
            Some(i) => write!(f, "{}", i),
            None => write!(f, "{}", self.as_f64()),
        }
    }
}

/// Marks a value can carry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marks {
    pub sensitive: bool,
    pub ephemeral: bool,
}

impl Marks {
    pub const SENSITIVE: Marks = Marks {
        sensitive: true,
        ephemeral: false,
    };
    pub const EPHEMERAL: Marks = Marks {
        sensitive: false,
        ephemeral: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.sensitive && !self.ephemeral
    }

    pub fn union(self, other: Marks) -> Marks {
        Marks {
            sensitive: self.sensitive || other.sensitive,
            ephemeral: self.ephemeral || other.ephemeral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    /// Known only after apply
    Unknown,
    Bool(bool),
    Number(Number),
    String(String),
    /// Lists, sets and tuples
    List(Vec<Value>),
    /// Maps and objects
    Map(BTreeMap<String, Value>),
    Marked(Box<Value>, Marks),
}

impl Value {
    /// Attach marks; an empty mark set leaves the value as it is
    pub fn mark(self, marks: Marks) -> Value {
        if marks.is_empty() {
            return self;
        }
        match self {
            Value::Marked(inner, existing) => Value::Marked(inner, existing.union(marks)),
            other => Value::Marked(Box::new(other), marks),
        }
    }

    /// Marks on the value itself, not on nested elements
    pub fn marks(&self) -> Marks {
        match self {
            Value::Marked(_, marks) => *marks,
            _ => Marks::default(),
        }
    }

    /// Union of the marks on the value and everything inside it
    pub fn deep_marks(&self) -> Marks {
        match self {
            Value::Marked(inner, marks) => marks.union(inner.deep_marks()),
            Value::List(items) => items
                .iter()
                .fold(Marks::default(), |acc, v| acc.union(v.deep_marks())),
            Value::Map(map) => map
                .values()
                .fold(Marks::default(), |acc, v| acc.union(v.deep_marks())),
            _ => Marks::default(),
        }
    }

    /// Strip the top-level marks
    pub fn unmark(self) -> (Value, Marks) {
        match self {
            Value::Marked(inner, marks) => {
                let (inner, nested) = inner.unmark();
                (inner, marks.union(nested))
            }
            other => (other, Marks::default()),
        }
    }

    /// Strip marks everywhere, returning their union
    pub fn unmark_deep(self) -> (Value, Marks) {
        match self {
            Value::Marked(inner, marks) => {
                let (inner, nested) = inner.unmark_deep();
                (inner, marks.union(nested))
            }
            Value::List(items) => {
                let mut marks = Marks::default();
                let items = items
                    .into_iter()
                    .map(|v| {
                        let (v, m) = v.unmark_deep();
                        marks = marks.union(m);
                        v
                    })
                    .collect();
                (Value::List(items), marks)
            }
            Value::Map(map) => {
                let mut marks = Marks::default();
                let map = map
                    .into_iter()
                    .map(|(k, v)| {
                        let (v, m) = v.unmark_deep();
                        marks = marks.union(m);
                        (k, v)
                    })
                    .collect();
                (Value::Map(map), marks)
            }
            other => (other, Marks::default()),
        }
    }

    fn unmarked(&self) -> &Value {
        match self {
            Value::Marked(inner, _) => inner.unmarked(),
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.unmarked(), Value::Null)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self.unmarked(), Value::Unknown)
    }

    /// Known all the way down
    pub fn is_wholly_known(&self) -> bool {
        match self.unmarked() {
            Value::Unknown => false,
            Value::List(items) => items.iter().all(Value::is_wholly_known),
            Value::Map(map) => map.values().all(Value::is_wholly_known),
            _ => true,
        }
    }

    /// Attribute or map element lookup, keeping the container's marks
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        match self {
            Value::Marked(inner, marks) => inner.get_attr(name).map(|v| v.mark(*marks)),
            Value::Map(map) => map.get(name).cloned(),
            Value::Unknown => Some(Value::Unknown),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.unmarked() {
            Value::Null => "null",
            Value::Unknown => "unknown",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Marked(..) => "marked",
        }
    }

    /// Convert into the evaluator's value type. Unknown becomes null and
    /// marks are dropped; callers track both separately.
    pub fn to_hcl(&self) -> hcl::Value {
        match self.unmarked() {
            Value::Null | Value::Unknown | Value::Marked(..) => hcl::Value::Null,
            Value::Bool(b) => hcl::Value::Bool(*b),
            Value::Number(Number::Int(i)) => hcl::Value::Number(hcl::Number::from(*i)),
            Value::Number(Number::Float(f)) => hcl::Number::from_f64(*f)
                .map_or(hcl::Value::Null, hcl::Value::Number),
            Value::String(s) => hcl::Value::String(s.clone()),
            Value::List(items) => hcl::Value::Array(items.iter().map(Value::to_hcl).collect()),
            Value::Map(map) => hcl::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_hcl())).collect(),
            ),
        }
    }
}

impl From<hcl::Value> for Value {
    fn from(value: hcl::Value) -> Self {
        match value {
            hcl::Value::Null => Value::Null,
            hcl::Value::Bool(b) => Value::Bool(b),
            hcl::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Number(Number::Int(i)),
                None => Value::Number(Number::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            hcl::Value::String(s) => Value::String(s),
            hcl::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            hcl::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(Number::Int(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(Number::Float(f))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Expected type of an evaluation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    /// Any type; the value is returned as evaluated
    Dynamic,
    Bool,
    Number,
    String,
    List(Box<Type>),
    Set(Box<Type>),
    Map(Box<Type>),
    Tuple(Vec<Type>),
    Object(BTreeMap<String, Type>),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Dynamic => write!(f, "any"),
            Type::Bool => write!(f, "bool"),
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::List(el) => write!(f, "list of {}", el),
            Type::Set(el) => write!(f, "set of {}", el),
            Type::Map(el) => write!(f, "map of {}", el),
            Type::Tuple(_) => write!(f, "tuple"),
            Type::Object(_) => write!(f, "object"),
        }
    }
}

/// A value did not fit the expected type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    /// Location inside the value, like `[2]` or `.name`
    pub path: String,
    pub message: String,
}

impl ConversionError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            message: message.into(),
        }
    }

    fn under(mut self, step: String) -> Self {
        self.path = step + &self.path;
        self
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for ConversionError {}

impl Type {
    /// Convert `value` to this type. Null and unknown values convert to
    /// any type; marks are kept.
    pub fn convert(&self, value: Value) -> Result<Value, ConversionError> {
        let (value, marks) = value.unmark();
        if matches!(value, Value::Null | Value::Unknown) || *self == Type::Dynamic {
            return Ok(value.mark(marks));
        }
        let converted = match (self, value) {
            (Type::Bool, Value::Bool(b)) => Value::Bool(b),
            (Type::Bool, Value::String(s)) => match s.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(ConversionError::new("a bool is required")),
            },
            (Type::Number, Value::Number(n)) => Value::Number(n),
            (Type::Number, Value::String(s)) => match Number::parse(&s) {
                Some(n) => Value::Number(n),
                None => return Err(ConversionError::new("a number is required")),
            },
            (Type::String, Value::String(s)) => Value::String(s),
            (Type::String, Value::Bool(b)) => Value::String(b.to_string()),
            (Type::String, Value::Number(n)) => Value::String(n.to_string()),
            (Type::List(el), Value::List(items)) => Value::List(convert_items(el, items)?),
            (Type::Set(el), Value::List(items)) => {
                let mut unique: Vec<Value> = Vec::new();
                for item in convert_items(el, items)? {
                    if !unique.contains(&item) {
                        unique.push(item);
                    }
                }
                Value::List(unique)
            }
            (Type::Map(el), Value::Map(map)) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    let v = el.convert(v).map_err(|e| e.under(format!("[{:?}]", k)))?;
                    out.insert(k, v);
                }
                Value::Map(out)
            }
            (Type::Tuple(types), Value::List(items)) => {
                if types.len() != items.len() {
                    return Err(ConversionError::new(format!(
                        "tuple required with {} elements",
                        types.len()
                    )));
                }
                let mut out = Vec::with_capacity(items.len());
                for (i, (ty, v)) in types.iter().zip(items).enumerate() {
                    out.push(ty.convert(v).map_err(|e| e.under(format!("[{}]", i)))?);
                }
                Value::List(out)
            }
            (Type::Object(attrs), Value::Map(mut map)) => {
                let mut out = BTreeMap::new();
                for (name, ty) in attrs {
                    let Some(v) = map.remove(name) else {
                        return Err(ConversionError::new(format!(
                            "attribute {:?} is required",
                            name
                        )));
                    };
                    out.insert(
                        name.clone(),
                        ty.convert(v).map_err(|e| e.under(format!(".{}", name)))?,
                    );
                }
                Value::Map(out)
            }
            (ty, value) => {
                return Err(ConversionError::new(format!(
                    "{} required, but have {}",
                    ty,
                    value.type_name()
                )))
            }
        };
        Ok(converted.mark(marks))
    }
}

fn convert_items(el: &Type, items: Vec<Value>) -> Result<Vec<Value>, ConversionError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, v)| el.convert(v).map_err(|e| e.under(format!("[{}]", i))))
        .collect()
}

/// Rust types an evaluated value can be decoded into
pub trait FromValue: Sized {
    /// Type requested from the evaluator for this target
    fn implied_type() -> Type;

    fn from_value(value: Value) -> Result<Self, ConversionError>;

    /// Targets that can hold marked, unknown and null values themselves
    /// receive them instead of a sentinel error
    fn accepts_marked() -> bool {
        false
    }
}

fn unexpected(expected: &str, value: &Value) -> ConversionError {
    ConversionError::new(format!("{} required, but have {}", expected, value.type_name()))
}

impl FromValue for Value {
    fn implied_type() -> Type {
        Type::Dynamic
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }

    fn accepts_marked() -> bool {
        true
    }
}

impl FromValue for String {
    fn implied_type() -> Type {
        Type::String
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value.unmark().0 {
            Value::String(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }
}

impl FromValue for bool {
    fn implied_type() -> Type {
        Type::Bool
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value.unmark().0 {
            Value::Bool(b) => Ok(b),
            other => Err(unexpected("bool", &other)),
        }
    }
}

impl FromValue for f64 {
    fn implied_type() -> Type {
        Type::Number
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value.unmark().0 {
            Value::Number(n) => Ok(n.as_f64()),
            other => Err(unexpected("number", &other)),
        }
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {$(
        impl FromValue for $ty {
            fn implied_type() -> Type {
                Type::Number
            }

            fn from_value(value: Value) -> Result<Self, ConversionError> {
                match value.unmark().0 {
                    Value::Number(n) => n
                        .as_i64()
                        .and_then(|i| <$ty>::try_from(i).ok())
                        .ok_or_else(|| ConversionError::new(format!(
                            "a whole number in the range of {} is required, but have {}",
                            stringify!($ty),
                            n
                        ))),
                    other => Err(unexpected("number", &other)),
                }
            }
        }
    )*};
}

impl_from_value_int!(i64, i32, u32, u64, usize);

impl<T: FromValue> FromValue for Vec<T> {
    fn implied_type() -> Type {
        Type::List(Box::new(T::implied_type()))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value.unmark().0 {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| T::from_value(v).map_err(|e| e.under(format!("[{}]", i))))
                .collect(),
            other => Err(unexpected("list", &other)),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn implied_type() -> Type {
        Type::Map(Box::new(T::implied_type()))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value.unmark().0 {
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| {
                    let v = T::from_value(v).map_err(|e| e.under(format!("[{:?}]", k)))?;
                    Ok((k, v))
                })
                .collect(),
            other => Err(unexpected("map", &other)),
        }
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn implied_type() -> Type {
        Type::Map(Box::new(T::implied_type()))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        BTreeMap::<String, T>::from_value(value).map(|m| m.into_iter().collect())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn implied_type() -> Type {
        T::implied_type()
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
