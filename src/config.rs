mod loader;

pub use loader::{FsImportResolver, ImportResolver, MappingLoader, Scheme};

use crate::value::ValueType;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::Display;

/// A parsed mapping document: imports, stream-independent type handler
/// declarations, and stream layouts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MappingConfig {
    pub imports: Vec<ImportConfig>,
    pub type_handlers: Vec<TypeHandlerConfig>,
    pub streams: Vec<StreamConfig>,
}

impl MappingConfig {
    pub fn stream(&self, name: &str) -> Option<&StreamConfig> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Folds an imported document into this one. Local declarations are
    /// kept ahead of imported ones so they win on name lookup.
    pub(crate) fn merge(&mut self, imported: MappingConfig) {
        self.type_handlers.extend(imported.type_handlers);
        self.streams.extend(imported.streams);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportConfig {
    pub resource: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypeHandlerConfig {
    pub name: Option<String>,
    pub r#type: Option<ValueType>,
    /// Identifier of the codec implementation; built-ins are selected
    /// by their type name.
    pub class: Option<String>,
    pub format: Option<String>,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamConfig {
    pub name: String,
    pub format: StreamFormat,
    pub mode: Mode,
    pub ordered: bool,
    pub resource_bundle: Option<String>,
    pub min_occurs: u32,
    pub max_occurs: Limit,
    pub delimiter: Option<char>,
    pub quote: Option<char>,
    pub escape: Option<char>,
    pub xml_name: Option<String>,
    pub xml_namespace: Option<String>,
    pub xml_prefix: Option<String>,
    pub xml_type: Option<XmlType>,
    pub children: Vec<ComponentConfig>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            format: StreamFormat::Delimited,
            mode: Mode::ReadWrite,
            ordered: true,
            resource_bundle: None,
            min_occurs: 0,
            max_occurs: Limit::Bounded(1),
            delimiter: None,
            quote: None,
            escape: None,
            xml_name: None,
            xml_namespace: None,
            xml_prefix: None,
            xml_type: None,
            children: Vec::new(),
        }
    }
}

/// A child of a stream or group: either a nested group or a record.
/// Declaration order is significant for selector tie-breaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "camelCase")]
pub enum ComponentConfig {
    Group(GroupConfig),
    Record(RecordConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupConfig {
    pub name: String,
    pub order: Option<u32>,
    pub min_occurs: u32,
    pub max_occurs: Limit,
    pub xml_name: Option<String>,
    pub xml_namespace: Option<String>,
    pub xml_prefix: Option<String>,
    pub xml_type: Option<XmlType>,
    pub children: Vec<ComponentConfig>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            order: None,
            min_occurs: 0,
            max_occurs: Limit::Unbounded,
            xml_name: None,
            xml_namespace: None,
            xml_prefix: None,
            xml_type: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordConfig {
    pub name: String,
    pub order: Option<u32>,
    pub min_occurs: u32,
    pub max_occurs: Limit,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub class: Option<String>,
    pub xml_name: Option<String>,
    pub xml_namespace: Option<String>,
    pub xml_prefix: Option<String>,
    pub parts: Vec<PartConfig>,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            order: None,
            min_occurs: 0,
            max_occurs: Limit::Unbounded,
            min_length: None,
            max_length: None,
            class: None,
            xml_name: None,
            xml_namespace: None,
            xml_prefix: None,
            parts: Vec::new(),
        }
    }
}

/// A part of a record layout: a bound field, a nested segment/bean, or
/// a constant property.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "camelCase")]
pub enum PartConfig {
    Field(FieldConfig),
    Segment(SegmentConfig),
    Property(PropertyConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmentConfig {
    pub name: String,
    pub class: Option<String>,
    pub getter: Option<String>,
    pub setter: Option<String>,
    pub collection: Option<Collection>,
    pub min_occurs: u32,
    pub max_occurs: Limit,
    pub nillable: bool,
    pub xml_name: Option<String>,
    pub xml_namespace: Option<String>,
    pub xml_prefix: Option<String>,
    pub xml_type: Option<XmlType>,
    pub xml_wrapper: Option<String>,
    pub parts: Vec<PartConfig>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            class: None,
            getter: None,
            setter: None,
            collection: None,
            min_occurs: 1,
            max_occurs: Limit::Bounded(1),
            nillable: false,
            xml_name: None,
            xml_namespace: None,
            xml_prefix: None,
            xml_type: None,
            xml_wrapper: None,
            parts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldConfig {
    pub name: String,
    pub getter: Option<String>,
    pub setter: Option<String>,
    pub collection: Option<Collection>,
    pub position: Option<usize>,
    pub length: Option<usize>,
    pub padding: Option<char>,
    pub justify: Justify,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_occurs: u32,
    pub max_occurs: Limit,
    pub regex: Option<String>,
    pub literal: Option<String>,
    pub type_handler: Option<String>,
    pub r#type: Option<ValueType>,
    pub format: Option<String>,
    pub default: Option<String>,
    pub required: bool,
    /// Strips surrounding ASCII whitespace before validation. For XML
    /// element text this also decides whether literal matching sees the
    /// raw or the trimmed text.
    pub trim: bool,
    /// Record identifier: the field's literal or regex participates in
    /// record matching.
    pub rid: bool,
    pub ignore: bool,
    pub nillable: bool,
    pub truncate: bool,
    pub xml_type: Option<XmlType>,
    pub xml_name: Option<String>,
    pub xml_namespace: Option<String>,
    pub xml_prefix: Option<String>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            getter: None,
            setter: None,
            collection: None,
            position: None,
            length: None,
            padding: None,
            justify: Justify::Left,
            min_length: None,
            max_length: None,
            min_occurs: 1,
            max_occurs: Limit::Bounded(1),
            regex: None,
            literal: None,
            type_handler: None,
            r#type: None,
            format: None,
            default: None,
            required: false,
            trim: false,
            rid: false,
            ignore: false,
            nillable: false,
            truncate: false,
            xml_type: None,
            xml_name: None,
            xml_namespace: None,
            xml_prefix: None,
        }
    }
}

/// A constant bean property: produced on read without consuming stream
/// content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyConfig {
    pub name: String,
    pub r#type: Option<ValueType>,
    pub value: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StreamFormat {
    Delimited,
    Fixed,
    Csv,
    Xml,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Read,
    Write,
    ReadWrite,
}

impl Mode {
    #[inline]
    pub fn allows_read(self) -> bool {
        !matches!(self, Mode::Write)
    }

    #[inline]
    pub fn allows_write(self) -> bool {
        !matches!(self, Mode::Read)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Justify {
    Left,
    Right,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    List,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XmlType {
    Element,
    Attribute,
    Text,
    None,
}

/// An occurrence bound: a number or `unbounded`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Limit {
    Bounded(u32),
    Unbounded,
}

impl Limit {
    #[inline]
    pub fn allows(self, count: u32) -> bool {
        match self {
            Limit::Bounded(max) => count < max,
            Limit::Unbounded => true,
        }
    }

    #[inline]
    pub fn is_unbounded(self) -> bool {
        matches!(self, Limit::Unbounded)
    }
}

impl Default for Limit {
    fn default() -> Self {
        Limit::Unbounded
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Bounded(n) => write!(f, "{}", n),
            Limit::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Limit::Bounded(n) => serializer.serialize_u32(*n),
            Limit::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct LimitVisitor;

        impl<'de> Visitor<'de> for LimitVisitor {
            type Value = Limit;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or \"unbounded\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Limit, E> {
                if value > u32::MAX as u64 {
                    return Err(E::custom("occurrence bound out of range"));
                }
                Ok(Limit::Bounded(value as u32))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Limit, E> {
                if value < 0 || value > u32::MAX as i64 {
                    return Err(E::custom("occurrence bound out of range"));
                }
                Ok(Limit::Bounded(value as u32))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Limit, E> {
                match value {
                    "unbounded" => Ok(Limit::Unbounded),
                    _ => value
                        .parse::<u32>()
                        .map(Limit::Bounded)
                        .map_err(|_| E::custom("occurrence bound out of range")),
                }
            }
        }

        deserializer.deserialize_any(LimitVisitor)
    }
}
