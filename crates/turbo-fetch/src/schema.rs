//! Schema validation for decoded response bodies.
//!
//! A [`Schema`] turns an untyped JSON value into a typed one or explains why it
//! can't. The client is generic over the trait, so any validator can be plugged
//! in; this module ships a few implementations:
//!
//! - [`Unchecked`] - passes the value through untouched
//! - [`Typed`] - serde deserialization into `T`
//! - [`Shape`] - structural validation with per-field error paths
//! - [`ShapeOf`] - a [`Shape`] check followed by deserialization
//! - [`FnSchema`] - adapts a closure

use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserialize, DeserializeOwned};
use serde::Serialize;
use serde_json::{Map, Value};

/// Validates a decoded JSON value and produces a typed output.
pub trait Schema {
    /// The value produced on success.
    type Output;

    /// Validate `value`, returning the typed output or a structured error.
    fn parse(&self, value: &Value) -> Result<Self::Output, SchemaError>;
}

impl<S: Schema + ?Sized> Schema for &S {
    type Output = S::Output;

    fn parse(&self, value: &Value) -> Result<Self::Output, SchemaError> {
        (**self).parse(value)
    }
}

// === Errors ===

/// One step in the path to an invalid value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// A single validation problem at a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    /// Location of the offending value, outermost first.
    pub path: Vec<PathSegment>,
    /// What was wrong.
    pub message: String,
}

impl SchemaIssue {
    /// Create an issue at `path`.
    pub fn new(path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// Create an issue about the value as a whole.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new(Vec::new(), message)
    }

    /// Render the path as `items[0].name`, or `(root)` when empty.
    pub fn path_string(&self) -> String {
        if self.path.is_empty() {
            return "(root)".to_string();
        }
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(index) => {
                    out.push_str(&format!("[{}]", index));
                }
            }
        }
        out
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path_string(), self.message)
    }
}

/// Structured validation failure. Always holds at least one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaError {
    issues: Vec<SchemaIssue>,
}

impl SchemaError {
    /// Create an error from a list of issues.
    ///
    /// An empty list is replaced by a single root issue.
    pub fn new(issues: Vec<SchemaIssue>) -> Self {
        if issues.is_empty() {
            return Self {
                issues: vec![SchemaIssue::root("invalid value")],
            };
        }
        Self { issues }
    }

    /// The individual issues, in discovery order.
    pub fn issues(&self) -> &[SchemaIssue] {
        &self.issues
    }
}

impl From<SchemaIssue> for SchemaError {
    fn from(issue: SchemaIssue) -> Self {
        Self::new(vec![issue])
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

// === Unchecked ===

/// Accepts any value and returns it unchanged.
///
/// This is the weak mode: callers get no structural guarantee.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unchecked;

impl Schema for Unchecked {
    type Output = Value;

    fn parse(&self, value: &Value) -> Result<Value, SchemaError> {
        Ok(value.clone())
    }
}

// === Typed ===

/// Deserializes into `T` with serde.
///
/// Errors carry serde's message as a single root issue.
pub struct Typed<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    /// Create a schema for `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Typed<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Typed<T> {}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Typed<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> Schema for Typed<T> {
    type Output = T;

    fn parse(&self, value: &Value) -> Result<T, SchemaError> {
        <T as Deserialize<'_>>::deserialize(value)
            .map_err(|e| SchemaError::from(SchemaIssue::root(e.to_string())))
    }
}

// === Shape ===

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Any,
    Null,
    Boolean,
    Number,
    Integer,
    String,
    Literal(Value),
    Array(Box<Shape>),
    Object {
        fields: Vec<(String, Shape)>,
        strict: bool,
    },
    OneOf(Vec<Shape>),
}

/// Structural description of a JSON value.
///
/// ```rust,ignore
/// let user = Shape::object([
///     ("name", Shape::string()),
///     ("age", Shape::integer().optional()),
///     ("tags", Shape::array(Shape::string())),
/// ]);
/// ```
///
/// Objects strip keys they don't declare unless made [`strict`](Shape::strict).
/// Validation keeps going after the first problem so every issue is reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    kind: Kind,
    optional: bool,
    nullable: bool,
}

impl Shape {
    fn of(kind: Kind) -> Self {
        Self {
            kind,
            optional: false,
            nullable: false,
        }
    }

    /// Any JSON value.
    pub fn any() -> Self {
        Self::of(Kind::Any)
    }

    /// `null`.
    pub fn null() -> Self {
        Self::of(Kind::Null)
    }

    /// `true` or `false`.
    pub fn boolean() -> Self {
        Self::of(Kind::Boolean)
    }

    /// Any number.
    pub fn number() -> Self {
        Self::of(Kind::Number)
    }

    /// A number with no fractional part.
    pub fn integer() -> Self {
        Self::of(Kind::Integer)
    }

    /// A string.
    pub fn string() -> Self {
        Self::of(Kind::String)
    }

    /// Exactly `value`.
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::of(Kind::Literal(value.into()))
    }

    /// An array whose elements all match `item`.
    pub fn array(item: Shape) -> Self {
        Self::of(Kind::Array(Box::new(item)))
    }

    /// An object with the given fields.
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Shape)>,
        K: Into<String>,
    {
        Self::of(Kind::Object {
            fields: fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
            strict: false,
        })
    }

    /// The first of `variants` that matches.
    pub fn one_of(variants: impl IntoIterator<Item = Shape>) -> Self {
        Self::of(Kind::OneOf(variants.into_iter().collect()))
    }

    /// Allow the field to be absent from its parent object.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Also accept `null`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Reject keys the object doesn't declare. No effect on non-objects.
    pub fn strict(mut self) -> Self {
        if let Kind::Object { strict, .. } = &mut self.kind {
            *strict = true;
        }
        self
    }

    /// Check against this shape, then deserialize into `T`.
    pub fn typed<T: DeserializeOwned>(self) -> ShapeOf<T> {
        ShapeOf {
            shape: self,
            typed: Typed::new(),
        }
    }

    fn check(
        &self,
        value: &Value,
        path: &mut Vec<PathSegment>,
        issues: &mut Vec<SchemaIssue>,
    ) -> Value {
        if self.nullable && value.is_null() {
            return Value::Null;
        }

        match &self.kind {
            Kind::Any => value.clone(),
            Kind::Null => expect_kind(value, value.is_null(), "null", path, issues),
            Kind::Boolean => expect_kind(value, value.is_boolean(), "boolean", path, issues),
            Kind::Number => expect_kind(value, value.is_number(), "number", path, issues),
            Kind::Integer => match as_integer(value) {
                Some(integer) => integer,
                None => expect_kind(value, false, "integer", path, issues),
            },
            Kind::String => expect_kind(value, value.is_string(), "string", path, issues),
            Kind::Literal(expected) => {
                if value != expected {
                    issues.push(SchemaIssue::new(
                        path.clone(),
                        format!("expected literal {}", expected),
                    ));
                }
                value.clone()
            }
            Kind::Array(item) => match value.as_array() {
                Some(elements) => {
                    let mut out = Vec::with_capacity(elements.len());
                    for (i, element) in elements.iter().enumerate() {
                        path.push(PathSegment::Index(i));
                        out.push(item.check(element, path, issues));
                        path.pop();
                    }
                    Value::Array(out)
                }
                None => expect_kind(value, false, "array", path, issues),
            },
            Kind::Object { fields, strict } => match value.as_object() {
                Some(map) => {
                    let mut out = Map::new();
                    for (key, shape) in fields {
                        path.push(PathSegment::Key(key.clone()));
                        match map.get(key) {
                            Some(field) => {
                                out.insert(key.clone(), shape.check(field, path, issues));
                            }
                            None if shape.optional => {}
                            None => issues.push(SchemaIssue::new(path.clone(), "required")),
                        }
                        path.pop();
                    }
                    if *strict {
                        for key in map.keys() {
                            if !fields.iter().any(|(declared, _)| declared == key) {
                                path.push(PathSegment::Key(key.clone()));
                                issues.push(SchemaIssue::new(path.clone(), "unrecognized key"));
                                path.pop();
                            }
                        }
                    }
                    Value::Object(out)
                }
                None => expect_kind(value, false, "object", path, issues),
            },
            Kind::OneOf(variants) => {
                for variant in variants {
                    let mut scratch = Vec::new();
                    let out = variant.check(value, path, &mut scratch);
                    if scratch.is_empty() {
                        return out;
                    }
                }
                issues.push(SchemaIssue::new(path.clone(), "no variant matched"));
                value.clone()
            }
        }
    }
}

impl Schema for Shape {
    type Output = Value;

    fn parse(&self, value: &Value) -> Result<Value, SchemaError> {
        let mut issues = Vec::new();
        let out = self.check(value, &mut Vec::new(), &mut issues);
        if issues.is_empty() {
            Ok(out)
        } else {
            Err(SchemaError::new(issues))
        }
    }
}

fn expect_kind(
    value: &Value,
    ok: bool,
    expected: &str,
    path: &[PathSegment],
    issues: &mut Vec<SchemaIssue>,
) -> Value {
    if !ok {
        issues.push(SchemaIssue::new(
            path.to_vec(),
            format!("expected {}, received {}", expected, kind_name(value)),
        ));
    }
    value.clone()
}

/// Whole numbers within `i64` or `u64` range, with `3.0` normalized to `3`.
fn as_integer(value: &Value) -> Option<Value> {
    let Value::Number(n) = value else { return None };
    if n.is_i64() || n.is_u64() {
        return Some(value.clone());
    }
    let f = n.as_f64()?;
    if f.fract() != 0.0 {
        return None;
    }
    if f >= i64::MIN as f64 && f < -(i64::MIN as f64) {
        Some(Value::from(f as i64))
    } else if f >= 0.0 && f < u64::MAX as f64 {
        Some(Value::from(f as u64))
    } else {
        None
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// === ShapeOf ===

/// A [`Shape`] check followed by deserialization into `T`.
///
/// Gives path-aware errors for structural problems and a typed result.
pub struct ShapeOf<T> {
    shape: Shape,
    typed: Typed<T>,
}

impl<T> fmt::Debug for ShapeOf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeOf")
            .field("shape", &self.shape)
            .field("typed", &self.typed)
            .finish()
    }
}

impl<T: DeserializeOwned> Schema for ShapeOf<T> {
    type Output = T;

    fn parse(&self, value: &Value) -> Result<T, SchemaError> {
        let checked = self.shape.parse(value)?;
        self.typed.parse(&checked)
    }
}

// === FnSchema ===

/// Adapts a validation function into a [`Schema`].
pub struct FnSchema<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

/// Wrap `f` as a schema.
///
/// ```rust,ignore
/// let positive = schema_fn(|v: &Value| match v.as_i64() {
///     Some(n) if n > 0 => Ok(n),
///     _ => Err(SchemaIssue::root("expected positive integer").into()),
/// });
/// ```
pub fn schema_fn<F, T>(f: F) -> FnSchema<F, T>
where
    F: Fn(&Value) -> Result<T, SchemaError>,
{
    FnSchema {
        f,
        _marker: PhantomData,
    }
}

impl<F, T> Schema for FnSchema<F, T>
where
    F: Fn(&Value) -> Result<T, SchemaError>,
{
    type Output = T;

    fn parse(&self, value: &Value) -> Result<T, SchemaError> {
        (self.f)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn name_schema() -> Shape {
        Shape::object([("name", Shape::string())])
    }

    // === Shape Tests ===

    #[test]
    fn test_object_accepts_matching_value() {
        let out = name_schema().parse(&json!({"name": "a"})).unwrap();
        assert_eq!(out, json!({"name": "a"}));
    }

    #[test]
    fn test_object_rejects_wrong_field_type() {
        let err = name_schema().parse(&json!({"name": 1})).unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert_eq!(err.issues()[0].path, vec![PathSegment::from("name")]);
        assert_eq!(err.to_string(), "name: expected string, received number");
    }

    #[test]
    fn test_object_reports_missing_field() {
        let err = name_schema().parse(&json!({})).unwrap_err();
        assert_eq!(err.to_string(), "name: required");
    }

    #[test]
    fn test_object_rejects_non_object() {
        let err = name_schema().parse(&json!([1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "(root): expected object, received array");
    }

    #[test]
    fn test_object_strips_unknown_keys() {
        let out = name_schema()
            .parse(&json!({"name": "a", "extra": true}))
            .unwrap();
        assert_eq!(out, json!({"name": "a"}));
    }

    #[test]
    fn test_strict_object_rejects_unknown_keys() {
        let err = name_schema()
            .strict()
            .parse(&json!({"name": "a", "extra": true}))
            .unwrap_err();
        assert_eq!(err.to_string(), "extra: unrecognized key");
    }

    #[test]
    fn test_optional_field_may_be_absent() {
        let schema = Shape::object([
            ("name", Shape::string()),
            ("nickname", Shape::string().optional()),
        ]);
        assert_eq!(
            schema.parse(&json!({"name": "a"})).unwrap(),
            json!({"name": "a"})
        );
        assert!(schema.parse(&json!({"name": "a", "nickname": 3})).is_err());
    }

    #[test]
    fn test_nullable_accepts_null() {
        let schema = Shape::object([("deleted_at", Shape::string().nullable())]);
        assert!(schema.parse(&json!({"deleted_at": null})).is_ok());
        assert!(schema.parse(&json!({"deleted_at": "2024-01-01"})).is_ok());
        assert!(Shape::string().parse(&json!(null)).is_err());
    }

    #[test]
    fn test_collects_all_issues_with_nested_paths() {
        let schema = Shape::object([
            ("id", Shape::integer()),
            (
                "items",
                Shape::array(Shape::object([("sku", Shape::string())])),
            ),
        ]);
        let err = schema
            .parse(&json!({"id": 1.5, "items": [{"sku": "a"}, {"sku": false}]}))
            .unwrap_err();
        assert_eq!(err.issues().len(), 2);
        assert_eq!(
            err.to_string(),
            "id: expected integer, received number; items[1].sku: expected string, received boolean"
        );
    }

    #[test]
    fn test_integer_accepts_whole_floats() {
        assert_eq!(Shape::integer().parse(&json!(3)).unwrap(), json!(3));
        assert_eq!(Shape::integer().parse(&json!(3.0)).unwrap(), json!(3));
        assert_eq!(Shape::integer().parse(&json!(-7.0)).unwrap(), json!(-7));
        assert_eq!(Shape::integer().parse(&json!(u64::MAX)).unwrap(), json!(u64::MAX));
        assert!(Shape::integer().parse(&json!("3")).is_err());
    }

    #[test]
    fn test_integer_rejects_out_of_range_floats() {
        let schema = Shape::object([("id", Shape::integer())]);
        let err = schema.parse(&json!({"id": 1e300})).unwrap_err();
        assert_eq!(err.to_string(), "id: expected integer, received number");
        assert!(Shape::integer().parse(&json!(-1e20)).is_err());
    }

    #[test]
    fn test_literal() {
        let schema = Shape::literal("ok");
        assert!(schema.parse(&json!("ok")).is_ok());
        let err = schema.parse(&json!("nope")).unwrap_err();
        assert_eq!(err.to_string(), r#"(root): expected literal "ok""#);
    }

    #[test]
    fn test_one_of() {
        let schema = Shape::one_of([Shape::string(), Shape::integer()]);
        assert!(schema.parse(&json!("a")).is_ok());
        assert!(schema.parse(&json!(2)).is_ok());
        let err = schema.parse(&json!(true)).unwrap_err();
        assert_eq!(err.to_string(), "(root): no variant matched");
    }

    #[test]
    fn test_any_and_null() {
        assert!(Shape::any().parse(&json!({"x": [1]})).is_ok());
        assert!(Shape::null().parse(&json!(null)).is_ok());
        assert!(Shape::null().parse(&json!(0)).is_err());
        assert!(Shape::boolean().parse(&json!(false)).is_ok());
        assert!(Shape::number().parse(&json!(0.25)).is_ok());
    }

    // === Typed Tests ===

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    #[test]
    fn test_typed_parses_struct() {
        let user = Typed::<User>::new().parse(&json!({"name": "a"})).unwrap();
        assert_eq!(user, User { name: "a".into() });
    }

    #[test]
    fn test_typed_reports_root_issue() {
        let err = Typed::<User>::new()
            .parse(&json!({"name": 1}))
            .unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert!(err.issues()[0].path.is_empty());
        assert!(err.issues()[0].message.contains("invalid type"));
    }

    #[test]
    fn test_shape_of_combines_paths_and_types() {
        let schema = name_schema().typed::<User>();
        assert_eq!(
            schema.parse(&json!({"name": "a", "role": "admin"})).unwrap(),
            User { name: "a".into() }
        );
        let err = schema.parse(&json!({"name": null})).unwrap_err();
        assert_eq!(err.to_string(), "name: expected string, received null");
    }

    #[test]
    fn test_shape_of_whole_float_fills_integer_field() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Item {
            id: i64,
        }

        let schema = Shape::object([("id", Shape::integer())]).typed::<Item>();
        assert_eq!(schema.parse(&json!({"id": 3.0})).unwrap(), Item { id: 3 });
    }

    // === Other Schemas ===

    #[test]
    fn test_unchecked_is_identity() {
        let body = json!({"x": 1});
        assert_eq!(Unchecked.parse(&body).unwrap(), body);
    }

    #[test]
    fn test_schema_fn() {
        let positive = schema_fn(|v: &Value| match v.as_i64() {
            Some(n) if n > 0 => Ok(n),
            _ => Err(SchemaIssue::root("expected positive integer").into()),
        });
        assert_eq!(positive.parse(&json!(5)).unwrap(), 5);
        assert!(positive.parse(&json!(-5)).is_err());
    }

    #[test]
    fn test_schema_by_reference() {
        let schema = name_schema();
        let by_ref = &schema;
        assert!(by_ref.parse(&json!({"name": "a"})).is_ok());
    }

    // === Error Tests ===

    #[test]
    fn test_empty_issue_list_becomes_root_issue() {
        let err = SchemaError::new(Vec::new());
        assert_eq!(err.to_string(), "(root): invalid value");
    }

    #[test]
    fn test_error_serializes_paths() {
        let err = SchemaError::from(SchemaIssue::new(
            vec![PathSegment::from("items"), PathSegment::Index(0), PathSegment::from("sku")],
            "required",
        ));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"issues": [{"path": ["items", 0, "sku"], "message": "required"}]})
        );
    }
}
