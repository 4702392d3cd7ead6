use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// A bound record value. The engine binds streams to this closed
/// enumeration instead of relying on runtime introspection; hosts with
/// their own record types convert at the boundary through a
/// `PropertyAccessor`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Number(f64),
    Char(char),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Uuid(Uuid),
    List(Vec<Value>),
    Record(Bean),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The canonical type this value resolves to when no type is
    /// declared in the mapping. Containers have no affinity.
    pub fn affinity(&self) -> Option<ValueType> {
        match self {
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Int(_) => Some(ValueType::I64),
            Value::UInt(_) => Some(ValueType::U64),
            Value::Number(_) => Some(ValueType::Decimal),
            Value::Char(_) => Some(ValueType::Char),
            Value::Text(_) => Some(ValueType::Text),
            Value::Date(_) => Some(ValueType::Date),
            Value::Time(_) => Some(ValueType::Time),
            Value::DateTime(_) => Some(ValueType::DateTime),
            Value::Uuid(_) => Some(ValueType::Uuid),
            Value::Null | Value::List(_) | Value::Record(_) => None,
        }
    }

    #[inline]
    pub fn as_record(&self) -> Option<&Bean> {
        match self {
            Value::Record(bean) => Some(bean),
            _ => None,
        }
    }

    #[inline]
    pub fn as_record_mut(&mut self) -> Option<&mut Bean> {
        match self {
            Value::Record(bean) => Some(bean),
            _ => None,
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

/// A record object: an optional class name used for write-side dispatch
/// and a set of named fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bean {
    class: Option<String>,
    fields: FxHashMap<String, Value>,
}

impl Bean {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn of_class<S: Into<String>>(class: S) -> Self {
        Self {
            class: Some(class.into()),
            fields: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    #[inline]
    pub fn set<S: Into<String>>(&mut self, name: S, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Builder-style `set`, convenient in tests and host code.
    pub fn with<S: Into<String>>(mut self, name: S, value: Value) -> Self {
        self.set(name, value);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Target types the built-in handlers convert to and from.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    #[serde(rename = "string")]
    #[strum(serialize = "string")]
    Text,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Decimal,
    Date,
    Time,
    DateTime,
    Uuid,
}

impl ValueType {
    /// Widening chain used when no handler is registered for the exact
    /// type: a narrower integer falls back to its wider sibling.
    pub(crate) fn widened(self) -> Option<ValueType> {
        match self {
            ValueType::I8 => Some(ValueType::I16),
            ValueType::I16 => Some(ValueType::I32),
            ValueType::I32 => Some(ValueType::I64),
            ValueType::U8 => Some(ValueType::U16),
            ValueType::U16 => Some(ValueType::U32),
            ValueType::U32 => Some(ValueType::U64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bean_fields() {
        let mut bean = Bean::of_class("employee");
        bean.set("name", Value::from("marie"));
        bean.set("age", Value::Int(37));

        assert_eq!(bean.class(), Some("employee"));
        assert_eq!(bean.get("name"), Some(&Value::Text("marie".to_string())));
        assert_eq!(bean.get("missing"), None);
        assert_eq!(bean.len(), 2);
    }

    #[test]
    fn affinity() {
        assert_eq!(Value::Int(1).affinity(), Some(ValueType::I64));
        assert_eq!(Value::Number(1.5).affinity(), Some(ValueType::Decimal));
        assert_eq!(Value::Null.affinity(), None);
        assert_eq!(Value::List(Vec::new()).affinity(), None);
    }

    #[test]
    fn type_names() {
        assert_eq!(ValueType::Text.to_string(), "string");
        assert_eq!(ValueType::DateTime.to_string(), "datetime");
        assert_eq!("i32".parse::<ValueType>().unwrap(), ValueType::I32);
        assert_eq!("string".parse::<ValueType>().unwrap(), ValueType::Text);
    }
}
