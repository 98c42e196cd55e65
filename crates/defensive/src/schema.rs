//! Reference schema and validator
//!
//! Contracts validate through the `Validator` trait. `SchemaValidator` is
//! the built-in implementation working on `Schema` trees:
//!
//! - keys are checked in declaration order and the first violation wins
//! - numeric strings are coerced to numbers, `"true"`/`"false"` to booleans
//! - every value is required unless marked `optional()`; `null` counts as
//!   absent
//! - nested objects reject undeclared keys; the top-level parameter record
//!   passes undeclared parameters through unchanged

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::error::ValidationError;

/// Validation engine used by the validation stage.
pub trait Validator: Send + Sync {
    /// Validate the named-parameter record `value` against `schema` and
    /// return its normalized form.
    fn validate(&self, value: &Value, schema: &SchemaMap) -> Result<Value, ValidationError>;
}

/// Constraint set of one value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaKind {
    Any,
    Number {
        min: Option<f64>,
        max: Option<f64>,
        integer: bool,
    },
    String {
        min: Option<usize>,
        max: Option<usize>,
        email: bool,
        pattern: Option<Pattern>,
    },
    Boolean,
    Array {
        items: Option<Box<Schema>>,
        min: Option<usize>,
        max: Option<usize>,
    },
    Object {
        keys: SchemaMap,
    },
}

/// Compiled regular expression of a string schema
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, s: &str) -> bool {
        self.0.is_match(s)
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Self(regex)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A schema node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    #[serde(flatten)]
    kind: SchemaKind,
    optional: bool,
}

impl Schema {
    fn of(kind: SchemaKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub fn any() -> Self {
        Self::of(SchemaKind::Any)
    }

    pub fn number() -> Self {
        Self::of(SchemaKind::Number {
            min: None,
            max: None,
            integer: false,
        })
    }

    pub fn string() -> Self {
        Self::of(SchemaKind::String {
            min: None,
            max: None,
            email: false,
            pattern: None,
        })
    }

    pub fn boolean() -> Self {
        Self::of(SchemaKind::Boolean)
    }

    pub fn array() -> Self {
        Self::of(SchemaKind::Array {
            items: None,
            min: None,
            max: None,
        })
    }

    pub fn object() -> Self {
        Self::of(SchemaKind::Object {
            keys: SchemaMap::new(),
        })
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Allow the value to be absent or `null`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Lower bound: value for numbers, length for strings, item count for
    /// arrays. Ignored by other kinds.
    pub fn min(mut self, bound: impl Into<f64>) -> Self {
        let bound = bound.into();
        match &mut self.kind {
            SchemaKind::Number { min, .. } => *min = Some(bound),
            SchemaKind::String { min, .. } | SchemaKind::Array { min, .. } => {
                *min = Some(bound as usize)
            }
            _ => {}
        }
        self
    }

    /// Upper bound, see `min`.
    pub fn max(mut self, bound: impl Into<f64>) -> Self {
        let bound = bound.into();
        match &mut self.kind {
            SchemaKind::Number { max, .. } => *max = Some(bound),
            SchemaKind::String { max, .. } | SchemaKind::Array { max, .. } => {
                *max = Some(bound as usize)
            }
            _ => {}
        }
        self
    }

    pub fn integer(mut self) -> Self {
        if let SchemaKind::Number { integer, .. } = &mut self.kind {
            *integer = true;
        }
        self
    }

    pub fn email(mut self) -> Self {
        if let SchemaKind::String { email, .. } = &mut self.kind {
            *email = true;
        }
        self
    }

    /// Require strings to match `regex`. Compiled once, so an invalid
    /// expression fails here rather than at validation time.
    pub fn pattern(self, regex: &str) -> Result<Self, regex::Error> {
        Ok(self.matching(Regex::new(regex)?))
    }

    /// `pattern` with an already compiled expression.
    pub fn matching(mut self, regex: Regex) -> Self {
        if let SchemaKind::String { pattern, .. } = &mut self.kind {
            *pattern = Some(Pattern::from(regex));
        }
        self
    }

    /// Schema of every array item.
    pub fn items(mut self, schema: Schema) -> Self {
        if let SchemaKind::Array { items, .. } = &mut self.kind {
            *items = Some(Box::new(schema));
        }
        self
    }

    /// Declare an object key. Keys are checked in declaration order.
    pub fn key(mut self, name: impl Into<String>, schema: Schema) -> Self {
        if let SchemaKind::Object { keys } = &mut self.kind {
            keys.insert(name, schema);
        }
        self
    }
}

/// Ordered mapping of names to schemas
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SchemaMap {
    entries: Vec<(String, Schema)>,
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `insert`.
    pub fn key(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.insert(name, schema);
        self
    }

    /// Declare `name`; re-declaring replaces the schema in place.
    pub fn insert(&mut self, name: impl Into<String>, schema: Schema) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = schema,
            None => self.entries.push((name, schema)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Schema)> for SchemaMap {
    fn from_iter<I: IntoIterator<Item = (S, Schema)>>(iter: I) -> Self {
        let mut map = SchemaMap::new();
        for (name, schema) in iter {
            map.insert(name, schema);
        }
        map
    }
}

/// Built-in validator for `Schema` trees
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl Validator for SchemaValidator {
    fn validate(&self, value: &Value, schema: &SchemaMap) -> Result<Value, ValidationError> {
        let record = value
            .as_object()
            .ok_or_else(|| ValidationError::new("value", "must be an object"))?;
        let mut normalized = record.clone();
        for (name, field) in schema.iter() {
            match check_field(field, record.get(name), name)? {
                Some(v) => normalized.insert(name.to_string(), v),
                None => normalized.remove(name),
            };
        }
        Ok(Value::Object(normalized))
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Check a possibly absent value. `Ok(None)` means "absent and allowed".
fn check_field(
    schema: &Schema,
    value: Option<&Value>,
    path: &str,
) -> Result<Option<Value>, ValidationError> {
    match value {
        None | Some(Value::Null) if schema.optional => Ok(None),
        None | Some(Value::Null) => Err(ValidationError::new(path, "is required")),
        Some(v) => check(schema, v, path).map(Some),
    }
}

fn check(schema: &Schema, value: &Value, path: &str) -> Result<Value, ValidationError> {
    match &schema.kind {
        SchemaKind::Any => Ok(value.clone()),
        SchemaKind::Number { min, max, integer } => {
            check_number(value, *min, *max, *integer, path)
        }
        SchemaKind::String {
            min,
            max,
            email,
            pattern,
        } => check_string(value, *min, *max, *email, pattern.as_ref(), path),
        SchemaKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if s == "true" => Ok(Value::Bool(true)),
            Value::String(s) if s == "false" => Ok(Value::Bool(false)),
            _ => Err(ValidationError::new(path, "must be a boolean")),
        },
        SchemaKind::Array { items, min, max } => {
            let list = value
                .as_array()
                .ok_or_else(|| ValidationError::new(path, "must be an array"))?;
            if let Some(min) = min {
                if list.len() < *min {
                    return Err(ValidationError::new(
                        path,
                        format!("must contain at least {} items", min),
                    ));
                }
            }
            if let Some(max) = max {
                if list.len() > *max {
                    return Err(ValidationError::new(
                        path,
                        format!("must contain less than or equal to {} items", max),
                    ));
                }
            }
            match items {
                Some(item_schema) => list
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        check_field(item_schema, Some(item), &join_path(path, &i.to_string()))
                            .map(|v| v.unwrap_or(Value::Null))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                None => Ok(value.clone()),
            }
        }
        SchemaKind::Object { keys } => {
            let object = value
                .as_object()
                .ok_or_else(|| ValidationError::new(path, "must be an object"))?;
            let mut normalized = Map::new();
            for (name, field) in keys.iter() {
                if let Some(v) = check_field(field, object.get(name), &join_path(path, name))? {
                    normalized.insert(name.to_string(), v);
                }
            }
            if let Some(unknown) = object.keys().find(|k| keys.get(k).is_none()) {
                return Err(ValidationError::new(
                    join_path(path, unknown),
                    "is not allowed",
                ));
            }
            Ok(Value::Object(normalized))
        }
    }
}

fn check_number(
    value: &Value,
    min: Option<f64>,
    max: Option<f64>,
    integer: bool,
    path: &str,
) -> Result<Value, ValidationError> {
    let number = match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => parse_number(s.trim()),
        _ => None,
    }
    .ok_or_else(|| ValidationError::new(path, "must be a number"))?;
    let n = number
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ValidationError::new(path, "must be a number"))?;

    if integer && !number.is_i64() && !number.is_u64() && n.fract() != 0.0 {
        return Err(ValidationError::new(path, "must be an integer"));
    }
    if let Some(min) = min {
        if n < min {
            return Err(ValidationError::new(
                path,
                format!("must be greater or equal to {}", min),
            ));
        }
    }
    if let Some(max) = max {
        if n > max {
            return Err(ValidationError::new(
                path,
                format!("must be less or equal to {}", max),
            ));
        }
    }
    Ok(Value::Number(number))
}

/// Integers parse exactly; anything else goes through `f64`, with integral
/// results stored as integers.
fn parse_number(s: &str) -> Option<Number> {
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        return Some(Number::from(n));
    }
    if let Ok(n) = s.parse::<u64>() {
        return Some(Number::from(n));
    }
    let n = s.parse::<f64>().ok().filter(|n| n.is_finite())?;
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Number::from(n as i64))
    } else {
        Number::from_f64(n)
    }
}

fn check_string(
    value: &Value,
    min: Option<usize>,
    max: Option<usize>,
    email: bool,
    pattern: Option<&Pattern>,
    path: &str,
) -> Result<Value, ValidationError> {
    let s = value
        .as_str()
        .ok_or_else(|| ValidationError::new(path, "must be a string"))?;
    let length = s.chars().count();
    if let Some(min) = min {
        if length < min {
            return Err(ValidationError::new(
                path,
                format!("length must be at least {} characters long", min),
            ));
        }
    }
    if let Some(max) = max {
        if length > max {
            return Err(ValidationError::new(
                path,
                format!(
                    "length must be less than or equal to {} characters long",
                    max
                ),
            ));
        }
    }
    if email && !is_email(s) {
        return Err(ValidationError::new(path, "must be a valid email"));
    }
    if let Some(pattern) = pattern {
        if !pattern.is_match(s) {
            return Err(ValidationError::new(
                path,
                format!(
                    "with value \"{}\" fails to match the required pattern: {}",
                    s,
                    pattern.as_str()
                ),
            ));
        }
    }
    Ok(value.clone())
}

fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !s.chars().any(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
