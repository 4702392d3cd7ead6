use super::field::Field;
use super::property::Constant;
use crate::accessor::{NamedAccessor, PropertyAccessor};
use crate::config::Limit;
use crate::context::{MarshallingContext, UnmarshallingContext};
use crate::error::FieldErrorKind;
use crate::format::{MarshalBuffer, XmlNode};
use crate::value::{Bean, Value};

pub(crate) enum Part {
    Field(Field),
    Segment(Segment),
    Constant(Constant),
}

/// A logical grouping of fields and nested beans inside a record. The
/// record's own layout is the root segment, which binds its parts
/// directly into the record value.
pub(crate) struct Segment {
    pub name: String,
    pub class: Option<String>,
    /// Absent on the root segment, which has no property of its own.
    pub accessor: Option<NamedAccessor>,
    pub collection: bool,
    pub min_occurs: u32,
    pub max_occurs: Limit,
    /// First format unit of this segment relative to its parent.
    pub start: usize,
    /// Format units consumed by one occurrence.
    pub width: usize,
    pub parts: Vec<Part>,
    pub nillable: bool,
    pub xml_name: String,
    pub xml_wrapper: Option<String>,
}

impl Segment {
    fn new_bean(&self) -> Value {
        match &self.class {
            Some(class) => Value::Record(Bean::of_class(class.clone())),
            None => Value::Record(Bean::new()),
        }
    }

    fn store(&self, ctx: &mut UnmarshallingContext, target: &mut Value, value: Value) {
        if let Some(accessor) = &self.accessor {
            if let Err(message) = accessor.set(target, value) {
                ctx.add_field_error(&self.name, FieldErrorKind::TypeHandler, message);
            }
        }
    }

    pub fn unmarshal_parts_flat(
        &self,
        ctx: &mut UnmarshallingContext,
        base: usize,
        target: &mut Value,
    ) {
        for part in &self.parts {
            match part {
                Part::Field(field) => field.unmarshal_flat(ctx, base, target),
                Part::Segment(segment) => segment.unmarshal_flat(ctx, base, target),
                Part::Constant(constant) => constant.unmarshal(ctx, target),
            }
        }
    }

    pub fn unmarshal_flat(
        &self,
        ctx: &mut UnmarshallingContext,
        base: usize,
        target: &mut Value,
    ) {
        if self.accessor.is_none() {
            self.unmarshal_parts_flat(ctx, base + self.start, target);
            return;
        }

        if self.collection {
            let mut items = Vec::new();
            let mut occurrence: u32 = 0;
            while self.max_occurs.allows(occurrence) {
                let block = base + self.start + occurrence as usize * self.width;
                if occurrence >= self.min_occurs && block >= ctx.raw().len() {
                    break;
                }
                let mut bean = self.new_bean();
                self.unmarshal_parts_flat(ctx, block, &mut bean);
                items.push(bean);
                occurrence += 1;
                if self.width == 0 {
                    break;
                }
            }
            self.store(ctx, target, Value::List(items));
        } else {
            let mut bean = self.new_bean();
            self.unmarshal_parts_flat(ctx, base + self.start, &mut bean);
            self.store(ctx, target, bean);
        }
    }

    pub fn unmarshal_parts_xml(
        &self,
        ctx: &mut UnmarshallingContext,
        node: &XmlNode,
        target: &mut Value,
    ) {
        for part in &self.parts {
            match part {
                Part::Field(field) => field.unmarshal_xml(ctx, node, target),
                Part::Segment(segment) => segment.unmarshal_xml(ctx, node, target),
                Part::Constant(constant) => constant.unmarshal(ctx, target),
            }
        }
    }

    pub fn unmarshal_xml(
        &self,
        ctx: &mut UnmarshallingContext,
        node: &XmlNode,
        target: &mut Value,
    ) {
        if self.accessor.is_none() {
            self.unmarshal_parts_xml(ctx, node, target);
            return;
        }

        let scope = match &self.xml_wrapper {
            Some(name) => match node.child(name) {
                Some(child) => child,
                None => {
                    if self.min_occurs > 0 {
                        ctx.add_field_error(
                            &self.name,
                            FieldErrorKind::Required,
                            "required".into(),
                        );
                    }
                    return;
                }
            },
            None => node,
        };

        if self.collection {
            let mut items = Vec::new();
            let mut occurrence: u32 = 0;
            for child in scope.children_named(&self.xml_name) {
                if !self.max_occurs.allows(occurrence) {
                    break;
                }
                let mut bean = self.new_bean();
                self.unmarshal_parts_xml(ctx, child, &mut bean);
                items.push(bean);
                occurrence += 1;
            }
            if occurrence < self.min_occurs {
                ctx.add_field_error(&self.name, FieldErrorKind::Required, "required".into());
            }
            self.store(ctx, target, Value::List(items));
        } else {
            match scope.child(&self.xml_name) {
                Some(child) if child.is_nil() && self.nillable => {
                    self.store(ctx, target, Value::Null);
                }
                Some(child) => {
                    let mut bean = self.new_bean();
                    self.unmarshal_parts_xml(ctx, child, &mut bean);
                    self.store(ctx, target, bean);
                }
                None => {
                    if self.min_occurs > 0 {
                        ctx.add_field_error(
                            &self.name,
                            FieldErrorKind::Required,
                            "required".into(),
                        );
                    }
                }
            }
        }
    }

    pub fn marshal_parts_flat(
        &self,
        ctx: &mut MarshallingContext,
        buffer: &mut MarshalBuffer,
        base: usize,
        source: &Value,
    ) {
        for part in &self.parts {
            match part {
                Part::Field(field) => field.marshal_flat(ctx, buffer, base, source),
                Part::Segment(segment) => segment.marshal_flat(ctx, buffer, base, source),
                Part::Constant(_) => {}
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
        let accessor = match &self.accessor {
            Some(accessor) => accessor,
            None => {
                self.marshal_parts_flat(ctx, buffer, base + self.start, source);
                return;
            }
        };

        let value = accessor.get(source).cloned().unwrap_or(Value::Null);
        if self.collection {
            let items: &[Value] = match &value {
                Value::List(items) => items,
                Value::Null => &[],
                other => std::slice::from_ref(other),
            };
            let mut occurrence: u32 = 0;
            for item in items {
                if !self.max_occurs.allows(occurrence) {
                    break;
                }
                let block = base + self.start + occurrence as usize * self.width;
                self.marshal_parts_flat(ctx, buffer, block, item);
                occurrence += 1;
            }
        } else if !value.is_null() {
            self.marshal_parts_flat(ctx, buffer, base + self.start, &value);
        }
    }

    pub fn marshal_parts_xml(
        &self,
        ctx: &mut MarshallingContext,
        node: &mut XmlNode,
        source: &Value,
    ) {
        for part in &self.parts {
            match part {
                Part::Field(field) => field.marshal_xml(ctx, node, source),
                Part::Segment(segment) => segment.marshal_xml(ctx, node, source),
                Part::Constant(_) => {}
            }
        }
    }

    pub fn marshal_xml(
        &self,
        ctx: &mut MarshallingContext,
        node: &mut XmlNode,
        source: &Value,
    ) {
        let accessor = match &self.accessor {
            Some(accessor) => accessor,
            None => {
                self.marshal_parts_xml(ctx, node, source);
                return;
            }
        };

        let value = accessor.get(source).cloned().unwrap_or(Value::Null);
        let mut out = Vec::new();

        if self.collection {
            let items: &[Value] = match &value {
                Value::List(items) => items,
                Value::Null => &[],
                other => std::slice::from_ref(other),
            };
            let mut occurrence: u32 = 0;
            for item in items {
                if !self.max_occurs.allows(occurrence) {
                    break;
                }
                let mut child = XmlNode::new(self.xml_name.clone());
                self.marshal_parts_xml(ctx, &mut child, item);
                out.push(child);
                occurrence += 1;
            }
        } else if value.is_null() {
            if self.nillable {
                let mut child = XmlNode::new(self.xml_name.clone());
                child.set_nil();
                out.push(child);
            }
        } else {
            let mut child = XmlNode::new(self.xml_name.clone());
            self.marshal_parts_xml(ctx, &mut child, &value);
            out.push(child);
        }

        match &self.xml_wrapper {
            Some(name) => {
                let mut wrapper = XmlNode::new(name.clone());
                for child in out {
                    wrapper.add_child(child);
                }
                node.add_child(wrapper);
            }
            None => {
                for child in out {
                    node.add_child(child);
                }
            }
        }
    }
}
