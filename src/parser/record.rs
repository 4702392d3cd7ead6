use super::segment::{Part, Segment};
use crate::config::Limit;
use crate::context::{MarshallingContext, UnmarshallingContext};
use crate::error::RecordErrorKind;
use crate::format::{FormatCodec, MarshalBuffer, Raw, XmlNode};
use crate::value::{Bean, Value};

/// A leaf selector: one physical record definition and its bound
/// segment tree.
pub(crate) struct Record {
    pub name: String,
    pub min_occurs: u32,
    pub max_occurs: Limit,
    pub count: u32,
    pub class: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub xml_name: String,
    pub xml_namespace: Option<String>,
    pub xml_prefix: Option<String>,
    pub layout: Segment,
}

impl Record {
    #[inline]
    pub fn is_max_occurs_reached(&self) -> bool {
        !self.max_occurs.allows(self.count)
    }

    #[inline]
    pub fn is_satisfied(&self) -> bool {
        self.count >= self.min_occurs
    }

    /// Identifier match against a raw record: for XML the subtree root
    /// name, plus every field flagged as a record identifier.
    pub fn matches(&self, raw: &Raw) -> bool {
        if let Raw::Xml(node) = raw {
            if node.name != self.xml_name {
                return false;
            }
            return rid_match_xml(&self.layout, node);
        }
        rid_match_flat(&self.layout, raw, 0)
    }

    /// Write-side dispatch. A requested record name matches exactly; a
    /// nameless write matches first on the bound class, then falls back
    /// to class-unbound records.
    pub fn defines(&self, requested: Option<&str>, value: &Value, exact: bool) -> bool {
        match requested {
            Some(name) => exact && name == self.name,
            None => {
                let class = value.as_record().and_then(Bean::class);
                if exact {
                    self.class.is_some() && self.class.as_deref() == class
                } else {
                    self.class.is_none()
                }
            }
        }
    }

    /// Unmarshals the current raw record. Framing errors short-circuit
    /// the segment descent, but the caller still fires record
    /// completion so the report is whole.
    pub fn unmarshal(&self, ctx: &mut UnmarshallingContext) -> Value {
        ctx.set_record_name(self.name.clone());
        self.validate_length(ctx);
        if ctx.has_record_errors() {
            return Value::Null;
        }

        let mut bean = match &self.class {
            Some(class) => Value::Record(Bean::of_class(class.clone())),
            None => Value::Record(Bean::new()),
        };

        match ctx.raw() {
            Raw::Xml(node) => {
                let node = node.clone();
                self.layout.unmarshal_parts_xml(ctx, &node, &mut bean);
            }
            _ => self.layout.unmarshal_parts_flat(ctx, 0, &mut bean),
        }
        bean
    }

    fn validate_length(&self, ctx: &mut UnmarshallingContext) {
        let (actual, unit) = match ctx.raw() {
            Raw::Fixed(text) => (text.chars().count(), "record length"),
            Raw::Delimited(tokens) => (tokens.len(), "field count"),
            _ => return,
        };

        let message = match (self.min_length, self.max_length) {
            (Some(min), _) if actual < min => match self.max_length {
                Some(max) => format!("expected {} {} to {}, was {}", unit, min, max, actual),
                None => format!("expected {} of at least {}, was {}", unit, min, actual),
            },
            (_, Some(max)) if actual > max => match self.min_length {
                Some(min) => format!("expected {} {} to {}, was {}", unit, min, max, actual),
                None => format!("expected {} of at most {}, was {}", unit, max, actual),
            },
            _ => return,
        };
        ctx.add_record_error(RecordErrorKind::RecordLength, message);
    }

    /// Marshals a value through the segment tree into a fresh buffer.
    pub fn marshal(
        &self,
        ctx: &mut MarshallingContext,
        codec: &FormatCodec,
        value: &Value,
    ) -> MarshalBuffer {
        match codec {
            FormatCodec::Xml => {
                let mut node = XmlNode::new(self.qualified_name());
                if let Some(namespace) = &self.xml_namespace {
                    match &self.xml_prefix {
                        Some(prefix) => {
                            node.set_attribute(format!("xmlns:{}", prefix), namespace.clone())
                        }
                        None => node.set_attribute("xmlns", namespace.clone()),
                    }
                }
                self.layout.marshal_parts_xml(ctx, &mut node, value);
                MarshalBuffer::Xml(node)
            }
            _ => {
                let mut buffer = codec.new_buffer();
                self.layout.marshal_parts_flat(ctx, &mut buffer, 0, value);
                buffer
            }
        }
    }

    fn qualified_name(&self) -> String {
        match &self.xml_prefix {
            Some(prefix) => format!("{}:{}", prefix, self.xml_name),
            None => self.xml_name.clone(),
        }
    }
}

fn rid_match_flat(segment: &Segment, raw: &Raw, base: usize) -> bool {
    for part in &segment.parts {
        match part {
            Part::Field(field) => {
                if field.rid && !field.rid_matches_flat(raw, base + segment.start) {
                    return false;
                }
            }
            Part::Segment(child) if !child.collection => {
                if !rid_match_flat(child, raw, base + segment.start) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

fn rid_match_xml(segment: &Segment, node: &XmlNode) -> bool {
    for part in &segment.parts {
        match part {
            Part::Field(field) => {
                if field.rid && !field.rid_matches_xml(node) {
                    return false;
                }
            }
            Part::Segment(child) if !child.collection => {
                let scope = if child.accessor.is_some() {
                    node.child(&child.xml_name)
                } else {
                    Some(node)
                };
                match scope {
                    Some(scope) => {
                        if !rid_match_xml(child, scope) {
                            return false;
                        }
                    }
                    None => {
                        if has_rid(child) {
                            return false;
                        }
                    }
                }
            }
            _ => {}
        }
    }
    true
}

fn has_rid(segment: &Segment) -> bool {
    segment.parts.iter().any(|part| match part {
        Part::Field(field) => field.rid,
        Part::Segment(child) => has_rid(child),
        Part::Constant(_) => false,
    })
}
