use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use argbind_rt::TypeDesc;
use chrono::NaiveDateTime;
use serde_json::{Map, Value as JsonValue, json};
use uuid::Uuid;

use crate::request::{HttpFile, NameValueCollection, RequestContext};

#[derive(Clone)]
pub enum Value {
    Null,
    /// Placeholder produced for void-marker parameters; callers drop it.
    Skip,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(String),
    Char(char),
    String(String),
    DateTime(NaiveDateTime),
    Guid(Uuid),
    Enum {
        name: String,
        variant: String,
        ordinal: i64,
    },
    List(Vec<Value>),
    Struct {
        name: String,
        fields: BTreeMap<String, Value>,
    },
    File(Arc<HttpFile>),
    Context(Arc<RequestContext>),
    Collection(Arc<NameValueCollection>),
    Opaque(OpaqueValue),
}

/// Value of a type only a registered converter knows how to build.
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl Value {
    pub fn opaque<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Value::Opaque(OpaqueValue {
            type_name: type_name.into(),
            inner: Arc::new(value),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "Null".to_string(),
            Value::Skip => "Skip".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Decimal(_) => "Decimal".to_string(),
            Value::Char(_) => "Char".to_string(),
            Value::String(_) => "String".to_string(),
            Value::DateTime(_) => "DateTime".to_string(),
            Value::Guid(_) => "Guid".to_string(),
            Value::Enum { name, .. } => name.clone(),
            Value::List(_) => "List".to_string(),
            Value::Struct { name, .. } => name.clone(),
            Value::File(_) => "File".to_string(),
            Value::Context(_) => "Context".to_string(),
            Value::Collection(_) => "NameValues".to_string(),
            Value::Opaque(value) => value.type_name.clone(),
        }
    }

    /// Whether this value may be passed where `ty` is declared. No coercion
    /// happens: an `Int` is not a `Float`.
    pub fn is_assignable_to(&self, ty: &TypeDesc) -> bool {
        match (self, ty) {
            (_, TypeDesc::Any) => true,
            (Value::Null, ty) => ty.is_nullable() || !ty.is_value_type(),
            (value, TypeDesc::Option(inner)) => value.is_assignable_to(inner),
            (Value::Bool(_), TypeDesc::Bool)
            | (Value::Int(_), TypeDesc::Int)
            | (Value::Float(_), TypeDesc::Float)
            | (Value::Decimal(_), TypeDesc::Decimal)
            | (Value::Char(_), TypeDesc::Char)
            | (Value::String(_), TypeDesc::String)
            | (Value::DateTime(_), TypeDesc::DateTime)
            | (Value::Guid(_), TypeDesc::Guid)
            | (Value::File(_), TypeDesc::File)
            | (Value::Context(_), TypeDesc::Context)
            | (Value::Collection(_), TypeDesc::NameValues) => true,
            (Value::Enum { name, .. }, TypeDesc::Enum(ty)) => *name == ty.name,
            (Value::Struct { name, .. }, TypeDesc::Struct(ty)) => *name == ty.name,
            (Value::Struct { name, .. }, TypeDesc::Custom(ty)) => name == ty,
            (Value::Opaque(value), TypeDesc::Custom(ty)) => value.type_name == *ty,
            (Value::List(items), TypeDesc::Array(elem)) => {
                items.iter().all(|item| item.is_assignable_to(elem))
            }
            _ => false,
        }
    }

    /// Value a compound member keeps when the request does not carry it.
    pub fn zero_for(ty: &TypeDesc) -> Value {
        match ty {
            TypeDesc::Bool => Value::Bool(false),
            TypeDesc::Int => Value::Int(0),
            TypeDesc::Float => Value::Float(0.0),
            TypeDesc::Decimal => Value::Decimal("0".to_string()),
            TypeDesc::Char => Value::Char('\0'),
            TypeDesc::DateTime => Value::DateTime(NaiveDateTime::default()),
            TypeDesc::Guid => Value::Guid(Uuid::nil()),
            TypeDesc::Enum(ty) => ty
                .variant_with_ordinal(0)
                .or_else(|| ty.variants.first())
                .map(|variant| Value::Enum {
                    name: ty.name.clone(),
                    variant: variant.name.clone(),
                    ordinal: variant.ordinal,
                })
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Skip => json!({ "$skip": true }),
            Value::Bool(v) => JsonValue::Bool(*v),
            Value::Int(v) => json!(v),
            Value::Float(v) => json!(v),
            Value::Decimal(v) => JsonValue::String(v.clone()),
            Value::Char(v) => JsonValue::String(v.to_string()),
            Value::String(v) => JsonValue::String(v.clone()),
            Value::DateTime(v) => JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Value::Guid(v) => JsonValue::String(v.hyphenated().to_string()),
            Value::Enum { variant, .. } => JsonValue::String(variant.clone()),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Struct { fields, .. } => {
                let mut out = Map::new();
                for (key, value) in fields {
                    out.insert(key.clone(), value.to_json());
                }
                JsonValue::Object(out)
            }
            Value::File(file) => json!({
                "field": file.field_name,
                "file_name": file.file_name,
                "content_type": file.content_type,
                "length": file.len(),
            }),
            Value::Context(ctx) => json!({ "$context": ctx.request.url.as_str() }),
            Value::Collection(coll) => {
                let mut out = Map::new();
                for key in coll.keys() {
                    let values = coll
                        .get_values(key)
                        .into_iter()
                        .map(|value| JsonValue::String(value.to_string()))
                        .collect();
                    out.insert(key.to_string(), JsonValue::Array(values));
                }
                JsonValue::Object(out)
            }
            Value::Opaque(value) => json!({ "$opaque": value.type_name }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Skip, Value::Skip) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Guid(a), Value::Guid(b)) => a == b,
            (
                Value::Enum {
                    name: a, variant: va, ..
                },
                Value::Enum {
                    name: b, variant: vb, ..
                },
            ) => a == b && va == vb,
            (Value::List(a), Value::List(b)) => a == b,
            (
                Value::Struct { name: a, fields: fa },
                Value::Struct { name: b, fields: fb },
            ) => a == b && fa == fb,
            (Value::File(a), Value::File(b)) => a == b,
            (Value::Context(a), Value::Context(b)) => Arc::ptr_eq(a, b),
            (Value::Collection(a), Value::Collection(b)) => Arc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Skip => f.write_str("Skip"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Decimal(v) => write!(f, "Decimal({v})"),
            Value::Char(v) => write!(f, "Char({v:?})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::DateTime(v) => write!(f, "DateTime({v})"),
            Value::Guid(v) => write!(f, "Guid({v})"),
            Value::Enum { name, variant, .. } => write!(f, "{name}::{variant}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Struct { name, fields } => {
                let mut out = f.debug_struct(name);
                for (key, value) in fields {
                    out.field(key, value);
                }
                out.finish()
            }
            Value::File(file) => write!(f, "File({:?}, {} bytes)", file.file_name, file.len()),
            Value::Context(ctx) => write!(f, "Context({})", ctx.request.url),
            Value::Collection(coll) => write!(f, "Collection({} entries)", coll.len()),
            Value::Opaque(value) => write!(f, "Opaque({})", value.type_name),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Char(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Guid(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
