use crate::accessor::{NamedAccessor, PropertyAccessor};
use crate::config::{Justify, Limit, XmlType};
use crate::context::{MarshallingContext, UnmarshallingContext};
use crate::error::{FieldErrorKind, RecordErrorKind};
use crate::format::{fixed_slice, MarshalBuffer, Raw, XmlNode};
use crate::types::TypeHandler;
use crate::value::Value;

use regex::Regex;
use std::sync::Arc;

/// A compiled field: the smallest bound value in a record, with its
/// extraction coordinates, validation rules, and type handler resolved
/// at stream-build time.
pub(crate) struct Field {
    pub name: String,
    pub accessor: Option<NamedAccessor>,
    pub collection: bool,
    pub min_occurs: u32,
    pub max_occurs: Limit,
    /// Position relative to the owning segment: a token index for
    /// delimited records, a character offset for fixed-length ones.
    pub position: usize,
    pub length: Option<usize>,
    pub padding: char,
    pub justify: Justify,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub literal: Option<String>,
    pub regex: Option<Regex>,
    pub regex_text: Option<String>,
    pub required: bool,
    pub trim: bool,
    pub nillable: bool,
    pub rid: bool,
    pub truncate: bool,
    pub default_value: Option<Value>,
    pub handler: Arc<dyn TypeHandler>,
    pub xml_type: XmlType,
    pub xml_name: String,
}

enum Extracted {
    Missing,
    Nil,
    Text(String),
}

impl Field {
    fn extract_flat(&self, raw: &Raw, base: usize, occurrence: usize) -> Extracted {
        match raw {
            Raw::Delimited(tokens) => {
                match tokens.get(base + self.position + occurrence) {
                    Some(token) => Extracted::Text(token.clone()),
                    None => Extracted::Missing,
                }
            }
            Raw::Fixed(text) => {
                let length = self.length.unwrap_or(0);
                let start = base + self.position + occurrence * length;
                if start >= text.chars().count() {
                    return Extracted::Missing;
                }
                Extracted::Text(fixed_slice(text, start, length).to_string())
            }
            _ => Extracted::Missing,
        }
    }

    fn extract_xml(&self, node: &XmlNode, occurrence: usize) -> Extracted {
        match self.xml_type {
            XmlType::Attribute => match node.attribute(&self.xml_name) {
                Some(value) => Extracted::Text(value.to_string()),
                None => Extracted::Missing,
            },
            XmlType::Element => match node.children_named(&self.xml_name).nth(occurrence) {
                Some(child) if child.is_nil() => Extracted::Nil,
                Some(child) => Extracted::Text(child.text.clone()),
                None => Extracted::Missing,
            },
            XmlType::Text => {
                if occurrence == 0 {
                    Extracted::Text(node.text.clone())
                } else {
                    Extracted::Missing
                }
            }
            XmlType::None => Extracted::Missing,
        }
    }

    /// Whether this field, used as a record identifier, accepts the raw
    /// record.
    pub fn rid_matches_flat(&self, raw: &Raw, base: usize) -> bool {
        let extracted = self.extract_flat(raw, base, 0);
        self.rid_matches(extracted)
    }

    pub fn rid_matches_xml(&self, node: &XmlNode) -> bool {
        self.rid_matches(self.extract_xml(node, 0))
    }

    fn rid_matches(&self, extracted: Extracted) -> bool {
        let text = match extracted {
            Extracted::Text(text) => text,
            _ => return false,
        };
        let text = self.normalize(text);
        if let Some(literal) = &self.literal {
            return text == *literal;
        }
        if let Some(regex) = &self.regex {
            return regex.is_match(&text);
        }
        self.handler.parse(&text).is_ok()
    }

    pub fn unmarshal_flat(
        &self,
        ctx: &mut UnmarshallingContext,
        base: usize,
        target: &mut Value,
    ) {
        if self.collection {
            let mut items = Vec::new();
            let mut occurrence: u32 = 0;
            while self.max_occurs.allows(occurrence) {
                let extracted = self.extract_flat(ctx.raw(), base, occurrence as usize);
                if matches!(extracted, Extracted::Missing) && occurrence >= self.min_occurs {
                    break;
                }
                if let Some(value) = self.bind_one(ctx, extracted) {
                    items.push(value);
                }
                occurrence += 1;
            }
            self.store(ctx, target, Value::List(items));
        } else {
            let extracted = self.extract_flat(ctx.raw(), base, 0);
            if let Some(value) = self.bind_one(ctx, extracted) {
                self.store(ctx, target, value);
            }
        }
    }

    pub fn unmarshal_xml(
        &self,
        ctx: &mut UnmarshallingContext,
        node: &XmlNode,
        target: &mut Value,
    ) {
        if self.collection {
            let mut items = Vec::new();
            let mut occurrence: u32 = 0;
            while self.max_occurs.allows(occurrence) {
                let extracted = self.extract_xml(node, occurrence as usize);
                if matches!(extracted, Extracted::Missing) && occurrence >= self.min_occurs {
                    break;
                }
                if let Some(value) = self.bind_one(ctx, extracted) {
                    items.push(value);
                }
                occurrence += 1;
            }
            self.store(ctx, target, Value::List(items));
        } else {
            let extracted = self.extract_xml(node, 0);
            if let Some(value) = self.bind_one(ctx, extracted) {
                self.store(ctx, target, value);
            }
        }
    }

    /// The unmarshal pipeline for one occurrence: unpad, trim, empty
    /// handling, length bounds, literal, regex, then the type handler.
    /// Returns `None` when a validation error was recorded.
    fn bind_one(&self, ctx: &mut UnmarshallingContext, extracted: Extracted) -> Option<Value> {
        let text = match extracted {
            Extracted::Nil => {
                if !self.nillable && self.required {
                    ctx.add_field_error(&self.name, FieldErrorKind::Required, "required".into());
                    return None;
                }
                return Some(Value::Null);
            }
            Extracted::Missing => {
                if self.required {
                    ctx.add_field_error(&self.name, FieldErrorKind::Required, "required".into());
                    return None;
                }
                return Some(self.default_or_null());
            }
            Extracted::Text(text) => text,
        };

        let text = self.normalize(text);
        if text.is_empty() {
            if self.required {
                ctx.add_field_error(&self.name, FieldErrorKind::Required, "required".into());
                return None;
            }
            return Some(self.default_or_null());
        }

        let chars = text.chars().count();
        if let Some(min) = self.min_length {
            if chars < min {
                ctx.add_field_error(
                    &self.name,
                    FieldErrorKind::FieldTooShort,
                    format!("shorter than minimum length {}", min),
                );
                return None;
            }
        }
        if let Some(max) = self.max_length {
            if chars > max {
                ctx.add_field_error(
                    &self.name,
                    FieldErrorKind::FieldTooLong,
                    format!("exceeds maximum length {}", max),
                );
                return None;
            }
        }

        if let Some(literal) = &self.literal {
            if text != *literal {
                ctx.add_field_error(
                    &self.name,
                    FieldErrorKind::Literal,
                    format!("expected literal '{}'", literal),
                );
                return None;
            }
        }

        if let Some(regex) = &self.regex {
            if !regex.is_match(&text) {
                ctx.add_field_error(
                    &self.name,
                    FieldErrorKind::Regex,
                    format!(
                        "does not match pattern '{}'",
                        self.regex_text.as_deref().unwrap_or_default()
                    ),
                );
                return None;
            }
        }

        match self.handler.parse(&text) {
            Ok(value) => Some(value),
            Err(message) => {
                ctx.add_field_error(&self.name, FieldErrorKind::TypeHandler, message);
                None
            }
        }
    }

    /// Unpads (when a padded length is configured) and trims.
    fn normalize(&self, text: String) -> String {
        let text = if self.length.is_some() {
            self.unpad(&text)
        } else {
            text
        };
        if self.trim {
            text.trim_matches(|c: char| c.is_ascii_whitespace())
                .to_string()
        } else {
            text
        }
    }

    fn unpad(&self, text: &str) -> String {
        let stripped = match self.justify {
            Justify::Right => text.trim_start_matches(self.padding),
            Justify::Left => text.trim_end_matches(self.padding),
        };
        // an all-padding field of a data-bearing padding char keeps one
        if stripped.is_empty() && !text.is_empty() && self.padding.is_alphanumeric() {
            self.padding.to_string()
        } else {
            stripped.to_string()
        }
    }

    fn default_or_null(&self) -> Value {
        self.default_value.clone().unwrap_or(Value::Null)
    }

    fn store(&self, ctx: &mut UnmarshallingContext, target: &mut Value, value: Value) {
        if let Some(accessor) = &self.accessor {
            if let Err(message) = accessor.set(target, value) {
                ctx.add_field_error(&self.name, FieldErrorKind::TypeHandler, message);
            }
        }
    }

    pub fn marshal_flat(
        &self,
        ctx: &mut MarshallingContext,
        buffer: &mut MarshalBuffer,
        base: usize,
        source: &Value,
    ) {
        if self.collection {
            let values = self.read_value(source);
            let items: Vec<Value> = match values {
                Some(Value::List(items)) => items,
                Some(other) => vec![other],
                None => Vec::new(),
            };
            let mut occurrence: u32 = 0;
            for item in items {
                if !self.max_occurs.allows(occurrence) {
                    break;
                }
                self.emit_flat(ctx, buffer, base, occurrence as usize, Some(&item));
                occurrence += 1;
            }
            // hold remaining mandatory positions with empty fields
            while occurrence < self.min_occurs {
                self.emit_flat(ctx, buffer, base, occurrence as usize, None);
                occurrence += 1;
            }
        } else {
            let value = self.read_value(source);
            self.emit_flat(ctx, buffer, base, 0, value.as_ref());
        }
    }

    fn emit_flat(
        &self,
        ctx: &mut MarshallingContext,
        buffer: &mut MarshalBuffer,
        base: usize,
        occurrence: usize,
        value: Option<&Value>,
    ) {
        let text = match self.format_text(ctx, value) {
            Some(text) => text,
            None => return,
        };
        match buffer {
            MarshalBuffer::Delimited(_) => {
                buffer.set_token(base + self.position + occurrence, text);
            }
            MarshalBuffer::Fixed(_) => {
                let length = self.length.unwrap_or(0);
                let offset = base + self.position + occurrence * length;
                if let Err(message) = buffer.place(offset, &text) {
                    ctx.add_record_error(RecordErrorKind::Malformed, message);
                }
            }
            MarshalBuffer::Xml(_) => {}
        }
    }

    pub fn marshal_xml(&self, ctx: &mut MarshallingContext, node: &mut XmlNode, source: &Value) {
        if self.collection {
            let items: Vec<Value> = match self.read_value(source) {
                Some(Value::List(items)) => items,
                Some(other) => vec![other],
                None => Vec::new(),
            };
            let mut occurrence: u32 = 0;
            for item in items {
                if !self.max_occurs.allows(occurrence) {
                    break;
                }
                self.emit_xml(ctx, node, Some(&item));
                occurrence += 1;
            }
        } else {
            let value = self.read_value(source);
            self.emit_xml(ctx, node, value.as_ref());
        }
    }

    fn emit_xml(&self, ctx: &mut MarshallingContext, node: &mut XmlNode, value: Option<&Value>) {
        match self.xml_type {
            XmlType::Attribute => {
                let text = match value {
                    Some(_) => match self.format_text(ctx, value) {
                        Some(text) => text,
                        None => return,
                    },
                    None => match &self.literal {
                        Some(literal) => literal.clone(),
                        None => return,
                    },
                };
                node.set_attribute(self.xml_name.clone(), text);
            }
            XmlType::Element => {
                let mut child = XmlNode::new(self.xml_name.clone());
                match value {
                    Some(_) => match self.format_text(ctx, value) {
                        Some(text) => child.text = text,
                        None => return,
                    },
                    None => {
                        if self.nillable {
                            child.set_nil();
                        } else if let Some(literal) = &self.literal {
                            child.text = literal.clone();
                        } else if !self.required {
                            return;
                        }
                    }
                }
                node.add_child(child);
            }
            XmlType::Text => {
                if let Some(text) = self.format_text(ctx, value) {
                    node.text = text;
                }
            }
            XmlType::None => {}
        }
    }

    fn read_value(&self, source: &Value) -> Option<Value> {
        let value = self
            .accessor
            .as_ref()
            .and_then(|a| a.get(source))
            .filter(|v| !v.is_null())
            .cloned();
        value.or_else(|| self.default_value.clone())
    }

    /// The marshal pipeline: format through the handler, then apply
    /// justify/padding and the length bound.
    fn format_text(&self, ctx: &mut MarshallingContext, value: Option<&Value>) -> Option<String> {
        let mut text = match value {
            Some(value) => match self.handler.format(value) {
                Ok(text) => text,
                Err(message) => {
                    ctx.add_field_error(&self.name, FieldErrorKind::TypeHandler, message);
                    return None;
                }
            },
            None => self.literal.clone().unwrap_or_default(),
        };

        if let Some(length) = self.length {
            let chars = text.chars().count();
            if chars > length {
                if self.truncate {
                    text = match self.justify {
                        Justify::Left => text.chars().take(length).collect(),
                        Justify::Right => text.chars().skip(chars - length).collect(),
                    };
                } else {
                    ctx.add_field_error(
                        &self.name,
                        FieldErrorKind::FieldTooLong,
                        format!("exceeds field length {}", length),
                    );
                    return None;
                }
            } else if chars < length {
                let pad: String = std::iter::repeat(self.padding)
                    .take(length - chars)
                    .collect();
                text = match self.justify {
                    Justify::Left => format!("{}{}", text, pad),
                    Justify::Right => format!("{}{}", pad, text),
                };
            }
        }

        Some(text)
    }
}
