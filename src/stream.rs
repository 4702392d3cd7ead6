use crate::accessor::NamedAccessor;
use crate::config::{
    ComponentConfig, FieldConfig, GroupConfig, Limit, MappingConfig, Mode, PartConfig,
    PropertyConfig, RecordConfig, SegmentConfig, StreamConfig, StreamFormat, TypeHandlerConfig,
    XmlType,
};
use crate::context::{MarshallingContext, UnmarshallingContext};
use crate::error::RecordErrorKind;
use crate::format::{DelimitedCodec, FormatCodec, Raw};
use crate::io::{RecordReader, RecordWriter};
use crate::parser::field::Field;
use crate::parser::group::Group;
use crate::parser::property::Constant;
use crate::parser::record::Record;
use crate::parser::segment::{Part, Segment};
use crate::parser::{Match, NodeId, ParserTree, Selector};
use crate::types::{TextHandler, TypeHandler, TypeHandlerRegistry};
use crate::value::{Value, ValueType};
use crate::{Error, Result};

use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use regex::Regex;
use std::sync::Arc;

/// Compiles a stream configuration into a reusable [`Stream`].
///
/// The builder owns the per-stream type handler registrations; `build`
/// chains them onto the frozen default registry and compiles the parser
/// tree, rejecting invalid configurations up front.
pub struct StreamBuilder {
    config: StreamConfig,
    mapping_handlers: Vec<TypeHandlerConfig>,
    named_handlers: Vec<(String, Arc<dyn TypeHandler>)>,
    typed_handlers: Vec<(ValueType, Option<String>, Arc<dyn TypeHandler>)>,
}

impl StreamBuilder {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            mapping_handlers: Vec::new(),
            named_handlers: Vec::new(),
            typed_handlers: Vec::new(),
        }
    }

    /// Builder for a named stream of a mapping document, carrying the
    /// document's `typeHandler` declarations along.
    pub fn from_mapping(mapping: &MappingConfig, stream: &str) -> Result<Self> {
        let config = mapping
            .stream(stream)
            .cloned()
            .ok_or_else(|| Error::MalformedMapping(format!("no stream named '{}'", stream)))?;
        Ok(Self {
            config,
            mapping_handlers: mapping.type_handlers.clone(),
            named_handlers: Vec::new(),
            typed_handlers: Vec::new(),
        })
    }

    pub fn type_handler<S: Into<String>>(
        &mut self,
        name: S,
        handler: Arc<dyn TypeHandler>,
    ) -> &mut Self {
        self.named_handlers.push((name.into(), handler));
        self
    }

    pub fn type_handler_for(
        &mut self,
        ty: ValueType,
        format: Option<String>,
        handler: Arc<dyn TypeHandler>,
    ) -> &mut Self {
        self.typed_handlers.push((ty, format, handler));
        self
    }

    pub fn build(&self) -> Result<Stream> {
        let mut registry =
            TypeHandlerRegistry::chained(Arc::new(TypeHandlerRegistry::with_defaults()));
        for config in &self.mapping_handlers {
            registry.register_configured(config)?;
        }
        for (name, handler) in &self.named_handlers {
            registry.register_named(name.clone(), handler.clone());
        }
        for (ty, format, handler) in &self.typed_handlers {
            registry.register(*ty, format.clone(), handler.clone());
        }

        let codec = match self.config.format {
            StreamFormat::Delimited => FormatCodec::Delimited(DelimitedCodec {
                delimiter: self.config.delimiter.unwrap_or('\t'),
                quote: self.config.quote,
                escape: self.config.escape,
            }),
            StreamFormat::Csv => FormatCodec::Delimited(DelimitedCodec {
                delimiter: self.config.delimiter.unwrap_or(','),
                quote: Some(self.config.quote.unwrap_or('"')),
                escape: self.config.escape,
            }),
            StreamFormat::Fixed => FormatCodec::Fixed,
            StreamFormat::Xml => FormatCodec::Xml,
        };

        let compiler = Compiler {
            format: self.config.format,
            ordered: self.config.ordered,
            registry: &registry,
        };
        let tree = compiler.compile(&self.config)?;

        Ok(Stream {
            name: self.config.name.clone(),
            mode: self.config.mode,
            codec,
            tree,
        })
    }
}

/// A compiled stream definition. The parser tree is built once and
/// reused across records; `reset` rewinds it between independent runs
/// over the same definition.
pub struct Stream {
    name: String,
    mode: Mode,
    codec: FormatCodec,
    tree: ParserTree,
}

impl Stream {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn read_from<R: RecordReader>(&mut self, reader: R) -> Result<StreamReader<'_, R>> {
        if !self.mode.allows_read() {
            return Err(Error::InvalidMode("reading"));
        }
        Ok(StreamReader {
            stream: self,
            reader,
            ctx: UnmarshallingContext::new(),
            eof: false,
        })
    }

    pub fn write_to<W: RecordWriter>(&mut self, writer: W) -> Result<StreamWriter<'_, W>> {
        if !self.mode.allows_write() {
            return Err(Error::InvalidMode("writing"));
        }
        Ok(StreamWriter {
            stream: self,
            writer,
            ctx: MarshallingContext::new(),
        })
    }

    /// Clears all occurrence counters, depth-first.
    pub fn reset(&mut self) {
        self.tree.reset();
    }

    /// Snapshot of every selector's occurrence count, suitable for an
    /// external checkpoint store.
    pub fn snapshot_state(&self, namespace: &str) -> FxHashMap<String, String> {
        let mut state = FxHashMap::default();
        self.tree.snapshot_state(namespace, &mut state);
        state
    }

    /// Restores selector counts from a checkpoint. Fails fast when an
    /// expected key is absent; unknown keys are ignored.
    pub fn restore_state(
        &mut self,
        namespace: &str,
        state: &FxHashMap<String, String>,
    ) -> Result<()> {
        self.tree.restore_state(namespace, state)
    }
}

/// Pull-reader binding raw records to values through the parser tree.
pub struct StreamReader<'a, R> {
    stream: &'a mut Stream,
    reader: R,
    ctx: UnmarshallingContext,
    eof: bool,
}

impl<'a, R: RecordReader> StreamReader<'a, R> {
    /// Reads and binds the next record. An [`Error::InvalidRecord`] is
    /// recoverable: the caller may keep reading.
    pub fn read(&mut self) -> Result<Option<Value>> {
        if self.eof {
            return Ok(None);
        }

        let frame = match self.reader.read()? {
            Some(frame) => frame,
            None => {
                self.eof = true;
                if let Some(name) = self.stream.tree.close() {
                    return Err(Error::UnexpectedEof(name.to_string()));
                }
                return Ok(None);
            }
        };

        let raw = match self.stream.codec.open(frame.body) {
            Ok(raw) => raw,
            Err(message) => {
                self.ctx.record_started(frame.line, Raw::None);
                self.ctx
                    .add_record_error(RecordErrorKind::Malformed, message);
                return Err(self.complete_with_errors());
            }
        };
        self.ctx.record_started(frame.line, raw);

        match self.stream.tree.match_next_read(&mut self.ctx) {
            Match::Hit(id) => {
                let value = self.stream.tree.record(id).unmarshal(&mut self.ctx);
                match self.ctx.record_completed() {
                    Some(report) => Err(Error::invalid_record(report)),
                    None => Ok(Some(value)),
                }
            }
            Match::Exhausted(id) => {
                let name = self.stream.tree.record(id).name.clone();
                self.ctx.set_record_name(name);
                self.ctx.add_record_error(
                    RecordErrorKind::RecordTooMany,
                    "too many occurrences".to_string(),
                );
                Err(self.complete_with_errors())
            }
            Match::Miss => {
                if let Some(id) = self.stream.tree.match_any(&self.ctx) {
                    let name = self.stream.tree.record(id).name.clone();
                    self.ctx.set_record_name(name);
                }
                self.ctx.add_record_error(
                    RecordErrorKind::UnexpectedRecord,
                    "unexpected record".to_string(),
                );
                Err(self.complete_with_errors())
            }
        }
    }

    fn complete_with_errors(&mut self) -> Error {
        match self.ctx.record_completed() {
            Some(report) => Error::invalid_record(report),
            None => Error::MalformedDocument("record completed without errors".to_string()),
        }
    }

    /// Skips raw records without matching or binding them; occurrence
    /// counters are untouched. Returns how many were actually skipped.
    pub fn skip(&mut self, count: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < count {
            match self.reader.read()? {
                Some(_) => {
                    self.ctx.record_skipped();
                    skipped += 1;
                }
                None => break,
            }
        }
        Ok(skipped)
    }

    /// Finalization check; fails when a selector's minimum occurrences
    /// are unsatisfied.
    pub fn close(&mut self) -> Result<()> {
        match self.stream.tree.close() {
            Some(name) => Err(Error::UnexpectedEof(name.to_string())),
            None => Ok(()),
        }
    }

    #[inline]
    pub fn line(&self) -> u64 {
        self.ctx.line()
    }

    #[inline]
    pub fn record_count(&self) -> u64 {
        self.ctx.record_count()
    }

    #[inline]
    pub fn record_name(&self) -> Option<&str> {
        self.ctx.record_name()
    }
}

/// Push-writer marshalling values through the parser tree into raw
/// records.
pub struct StreamWriter<'a, W> {
    stream: &'a mut Stream,
    writer: W,
    ctx: MarshallingContext,
}

impl<'a, W: RecordWriter> StreamWriter<'a, W> {
    /// Writes a value, dispatching on its record class.
    pub fn write(&mut self, value: &Value) -> Result<()> {
        self.write_dispatch(None, value)
    }

    /// Writes a value to the named record definition.
    pub fn write_named(&mut self, name: &str, value: &Value) -> Result<()> {
        self.write_dispatch(Some(name), value)
    }

    fn write_dispatch(&mut self, name: Option<&str>, value: &Value) -> Result<()> {
        match self.stream.tree.match_next_write(name, value) {
            Match::Hit(id) => {
                let record = self.stream.tree.record(id);
                self.ctx.record_started(record.name.clone());
                let buffer = record.marshal(&mut self.ctx, &self.stream.codec, value);
                self.ctx.buffer = Some(buffer);
                self.ctx
                    .write_record(&self.stream.codec, &mut self.writer)?;
                match self.ctx.record_completed() {
                    Some(report) => Err(Error::invalid_record(report)),
                    None => Ok(()),
                }
            }
            Match::Exhausted(id) => {
                let record_name = self.stream.tree.record(id).name.clone();
                self.ctx.record_started(record_name);
                self.ctx.add_record_error(
                    RecordErrorKind::RecordTooMany,
                    "too many occurrences".to_string(),
                );
                match self.ctx.record_completed() {
                    Some(report) => Err(Error::invalid_record(report)),
                    None => Err(Error::UnmatchedValue),
                }
            }
            Match::Miss => Err(Error::UnmatchedValue),
        }
    }

    /// Finalization check, then a flush of the downstream writer.
    pub fn close(&mut self) -> Result<()> {
        if let Some(name) = self.stream.tree.close() {
            return Err(Error::UnexpectedEof(name.to_string()));
        }
        self.writer.flush()
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    #[inline]
    pub fn record_count(&self) -> u64 {
        self.ctx.record_count()
    }
}

// ---- configuration compiler ------------------------------------------------

struct Compiler<'a> {
    format: StreamFormat,
    ordered: bool,
    registry: &'a TypeHandlerRegistry,
}

impl Compiler<'_> {
    fn is_flat(&self) -> bool {
        self.format != StreamFormat::Xml
    }

    fn compile(&self, config: &StreamConfig) -> Result<ParserTree> {
        if config.name.is_empty() {
            return Err(Error::MalformedMapping("stream requires a name".to_string()));
        }
        check_occurs(&config.name, config.min_occurs, config.max_occurs)?;

        let mut nodes = Vec::new();
        let mut names = FxHashSet::default();
        claim_name(&mut names, &config.name)?;

        // root placeholder keeps the root at index 0, in document order
        nodes.push(Selector::Group(Group::new(
            config.name.clone(),
            config.min_occurs,
            config.max_occurs,
            config.ordered,
            Vec::new(),
            Vec::new(),
        )));
        let (children, child_orders) =
            self.compile_children(&config.children, &mut nodes, &mut names)?;
        self.check_ambiguity(&nodes, &children, &child_orders)?;

        nodes[0] = Selector::Group(Group::new(
            config.name.clone(),
            config.min_occurs,
            config.max_occurs,
            config.ordered,
            children,
            child_orders,
        ));
        Ok(ParserTree::new(nodes, 0))
    }

    fn compile_children(
        &self,
        children: &[ComponentConfig],
        nodes: &mut Vec<Selector>,
        names: &mut FxHashSet<String>,
    ) -> Result<(Vec<NodeId>, Vec<u32>)> {
        let explicit: Vec<Option<u32>> = children
            .iter()
            .map(|child| match child {
                ComponentConfig::Group(g) => g.order,
                ComponentConfig::Record(r) => r.order,
            })
            .collect();
        let any_set = explicit.iter().any(|o| o.is_some());
        if any_set && !explicit.iter().all(|o| o.is_some()) {
            return Err(Error::MalformedMapping(
                "order must be set on all children of a group or none".to_string(),
            ));
        }
        let orders: Vec<u32> = if any_set {
            explicit.into_iter().flatten().collect()
        } else {
            (1..=children.len() as u32).collect()
        };

        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            let id = match child {
                ComponentConfig::Group(group) => self.compile_group(group, nodes, names)?,
                ComponentConfig::Record(record) => self.compile_record(record, nodes, names)?,
            };
            ids.push(id);
        }
        Ok((ids, orders))
    }

    fn compile_group(
        &self,
        config: &GroupConfig,
        nodes: &mut Vec<Selector>,
        names: &mut FxHashSet<String>,
    ) -> Result<NodeId> {
        check_occurs(&config.name, config.min_occurs, config.max_occurs)?;
        claim_name(names, &config.name)?;

        let (children, child_orders) = self.compile_children(&config.children, nodes, names)?;
        self.check_ambiguity(nodes, &children, &child_orders)?;

        nodes.push(Selector::Group(Group::new(
            config.name.clone(),
            config.min_occurs,
            config.max_occurs,
            self.ordered,
            children,
            child_orders,
        )));
        Ok(nodes.len() - 1)
    }

    fn compile_record(
        &self,
        config: &RecordConfig,
        nodes: &mut Vec<Selector>,
        names: &mut FxHashSet<String>,
    ) -> Result<NodeId> {
        check_occurs(&config.name, config.min_occurs, config.max_occurs)?;
        claim_name(names, &config.name)?;

        let mut unbounded_seen = false;
        let mut cursor = 0;
        let parts = self.compile_parts(&config.parts, 0, &mut cursor, &mut unbounded_seen)?;
        let xml_name = config
            .xml_name
            .clone()
            .unwrap_or_else(|| config.name.clone());

        let layout = Segment {
            name: config.name.clone(),
            class: None,
            accessor: None,
            collection: false,
            min_occurs: 1,
            max_occurs: Limit::Bounded(1),
            start: 0,
            width: cursor,
            parts,
            nillable: false,
            xml_name: xml_name.clone(),
            xml_wrapper: None,
        };

        nodes.push(Selector::Record(Record {
            name: config.name.clone(),
            min_occurs: config.min_occurs,
            max_occurs: config.max_occurs,
            count: 0,
            class: config.class.clone(),
            min_length: config.min_length,
            max_length: config.max_length,
            xml_name,
            xml_namespace: config.xml_namespace.clone(),
            xml_prefix: config.xml_prefix.clone(),
            layout,
        }));
        Ok(nodes.len() - 1)
    }

    fn compile_parts(
        &self,
        parts: &[PartConfig],
        depth: usize,
        cursor: &mut usize,
        unbounded_seen: &mut bool,
    ) -> Result<Vec<Part>> {
        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            if *unbounded_seen && self.is_flat() {
                return Err(Error::MalformedMapping(
                    "only the last part of a flat record may repeat unbounded".to_string(),
                ));
            }
            match part {
                PartConfig::Field(field) => {
                    out.push(Part::Field(self.compile_field(field, cursor, unbounded_seen)?));
                }
                PartConfig::Segment(segment) => {
                    if self.is_flat() && depth > 0 {
                        return Err(Error::MalformedMapping(format!(
                            "segment '{}' is nested; nested segments require an XML stream",
                            segment.name
                        )));
                    }
                    out.push(Part::Segment(self.compile_segment(
                        segment,
                        depth,
                        cursor,
                        unbounded_seen,
                    )?));
                }
                PartConfig::Property(property) => {
                    out.push(Part::Constant(self.compile_property(property)?));
                }
            }
        }
        Ok(out)
    }

    fn compile_field(
        &self,
        config: &FieldConfig,
        cursor: &mut usize,
        unbounded_seen: &mut bool,
    ) -> Result<Field> {
        if config.name.is_empty() {
            return Err(Error::MalformedMapping("field requires a name".to_string()));
        }
        check_occurs(&config.name, config.min_occurs, config.max_occurs)?;

        let collection = config.collection.is_some();
        let repeats = match config.max_occurs {
            Limit::Bounded(n) => n > 1,
            Limit::Unbounded => true,
        };
        if repeats && !collection {
            return Err(Error::MalformedMapping(format!(
                "repeating field '{}' requires a collection binding",
                config.name
            )));
        }

        if self.format == StreamFormat::Fixed && config.length.is_none() {
            return Err(Error::MalformedMapping(format!(
                "field '{}' requires a length in a fixed-length stream",
                config.name
            )));
        }

        let position = if self.is_flat() {
            let position = match config.position {
                Some(position) => {
                    if position < *cursor {
                        return Err(Error::MalformedMapping(format!(
                            "field '{}' is positioned at {}, before the end of the \
                             preceding part",
                            config.name, position
                        )));
                    }
                    position
                }
                None => *cursor,
            };
            let span = match self.format {
                StreamFormat::Fixed => config.length.unwrap_or(1),
                _ => 1,
            };
            match config.max_occurs {
                Limit::Bounded(n) => *cursor = position + span * n as usize,
                Limit::Unbounded => {
                    *unbounded_seen = true;
                    *cursor = position + span;
                }
            }
            position
        } else {
            0
        };

        let handler = match (&config.type_handler, config.r#type) {
            (Some(name), _) => self
                .registry
                .by_name(name)
                .ok_or_else(|| Error::UnknownTypeHandler(name.clone()))?,
            (None, Some(ty)) => self
                .registry
                .for_type(ty, config.format.as_deref())
                .ok_or_else(|| Error::UnknownTypeHandler(ty.to_string()))?,
            (None, None) => self
                .registry
                .for_type(ValueType::Text, None)
                .unwrap_or_else(|| Arc::new(TextHandler)),
        };

        let regex = match &config.regex {
            Some(pattern) => Some(Regex::new(&format!("^(?:{})$", pattern))?),
            None => None,
        };

        let default_value = match &config.default {
            Some(text) => Some(handler.parse(text).map_err(|message| {
                Error::MalformedMapping(format!(
                    "invalid default for field '{}': {}",
                    config.name, message
                ))
            })?),
            None => None,
        };

        let accessor = if config.ignore {
            None
        } else {
            Some(NamedAccessor::with_keys(
                config.getter.clone().unwrap_or_else(|| config.name.clone()),
                config.setter.clone().unwrap_or_else(|| config.name.clone()),
            ))
        };

        Ok(Field {
            name: config.name.clone(),
            accessor,
            collection,
            min_occurs: config.min_occurs,
            max_occurs: config.max_occurs,
            position,
            length: config.length,
            padding: config.padding.unwrap_or(' '),
            justify: config.justify,
            min_length: config.min_length,
            max_length: config.max_length,
            literal: config.literal.clone(),
            regex,
            regex_text: config.regex.clone(),
            required: config.required,
            trim: config.trim,
            nillable: config.nillable,
            rid: config.rid,
            truncate: config.truncate,
            default_value,
            handler,
            xml_type: config.xml_type.unwrap_or(XmlType::Element),
            xml_name: config
                .xml_name
                .clone()
                .unwrap_or_else(|| config.name.clone()),
        })
    }

    fn compile_segment(
        &self,
        config: &SegmentConfig,
        depth: usize,
        cursor: &mut usize,
        unbounded_seen: &mut bool,
    ) -> Result<Segment> {
        if config.name.is_empty() {
            return Err(Error::MalformedMapping(
                "segment requires a name".to_string(),
            ));
        }
        check_occurs(&config.name, config.min_occurs, config.max_occurs)?;

        let start = if self.is_flat() { *cursor } else { 0 };
        let mut inner_cursor = 0;
        let parts =
            self.compile_parts(&config.parts, depth + 1, &mut inner_cursor, unbounded_seen)?;
        let width = inner_cursor;

        if self.is_flat() {
            match config.max_occurs {
                Limit::Bounded(n) => *cursor = start + width * n as usize,
                Limit::Unbounded => {
                    *unbounded_seen = true;
                    *cursor = start + width;
                }
            }
        }

        let unbound = config.class.is_none()
            && config.collection.is_none()
            && config.getter.is_none()
            && config.setter.is_none();
        let accessor = if unbound {
            None
        } else {
            Some(NamedAccessor::with_keys(
                config.getter.clone().unwrap_or_else(|| config.name.clone()),
                config.setter.clone().unwrap_or_else(|| config.name.clone()),
            ))
        };

        Ok(Segment {
            name: config.name.clone(),
            class: config.class.clone(),
            accessor,
            collection: config.collection.is_some(),
            min_occurs: config.min_occurs,
            max_occurs: config.max_occurs,
            start,
            width,
            parts,
            nillable: config.nillable,
            xml_name: config
                .xml_name
                .clone()
                .unwrap_or_else(|| config.name.clone()),
            xml_wrapper: config.xml_wrapper.clone(),
        })
    }

    fn compile_property(&self, config: &PropertyConfig) -> Result<Constant> {
        if config.name.is_empty() {
            return Err(Error::MalformedMapping(
                "property requires a name".to_string(),
            ));
        }
        let handler = self
            .registry
            .for_type(config.r#type.unwrap_or(ValueType::Text), None)
            .unwrap_or_else(|| Arc::new(TextHandler));
        let value = handler.parse(&config.value).map_err(|message| {
            Error::MalformedMapping(format!(
                "invalid value for property '{}': {}",
                config.name, message
            ))
        })?;
        Ok(Constant {
            name: config.name.clone(),
            accessor: NamedAccessor::new(config.name.clone()),
            value,
        })
    }

    /// Sibling records at the same order rank must be distinguishable:
    /// either by record identifier fields or by distinct literal
    /// signatures.
    fn check_ambiguity(
        &self,
        nodes: &[Selector],
        children: &[NodeId],
        orders: &[u32],
    ) -> Result<()> {
        for ((a, a_order), (b, b_order)) in children.iter().zip(orders).tuple_combinations() {
            // unordered groups try every child at every position
            if self.ordered && a_order != b_order {
                continue;
            }
            let (left, right) = match (&nodes[*a], &nodes[*b]) {
                (Selector::Record(left), Selector::Record(right)) => (left, right),
                _ => continue,
            };
            let (left_has, left_sig) = rid_signature(left, self.is_flat());
            let (right_has, right_sig) = rid_signature(right, self.is_flat());
            let ambiguous = (!left_has && !right_has)
                || (left_has && right_has && !left_sig.is_empty() && left_sig == right_sig);
            if ambiguous {
                return Err(Error::MalformedMapping(format!(
                    "ambiguous record identifier between '{}' and '{}'",
                    left.name, right.name
                )));
            }
        }
        Ok(())
    }
}

fn check_occurs(name: &str, min: u32, max: Limit) -> Result<()> {
    match max {
        Limit::Bounded(0) => Err(Error::MalformedMapping(format!(
            "'{}' has a maxOccurs of 0",
            name
        ))),
        Limit::Bounded(n) if n < min => Err(Error::MalformedMapping(format!(
            "'{}' has a minOccurs greater than its maxOccurs",
            name
        ))),
        _ => Ok(()),
    }
}

fn claim_name(names: &mut FxHashSet<String>, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::MalformedMapping(
            "selector requires a name".to_string(),
        ));
    }
    if !names.insert(name.to_string()) {
        return Err(Error::MalformedMapping(format!(
            "duplicate selector name '{}'",
            name
        )));
    }
    Ok(())
}

fn rid_signature(record: &Record, flat: bool) -> (bool, Vec<(String, String)>) {
    let mut has_rid = false;
    let mut signature = Vec::new();
    collect_rid(&record.layout, 0, flat, &mut has_rid, &mut signature);
    signature.sort();
    (has_rid, signature)
}

fn collect_rid(
    segment: &Segment,
    base: usize,
    flat: bool,
    has_rid: &mut bool,
    signature: &mut Vec<(String, String)>,
) {
    for part in &segment.parts {
        match part {
            Part::Field(field) => {
                if field.rid {
                    *has_rid = true;
                    if let Some(literal) = &field.literal {
                        // identifiers are keyed by token/char position in
                        // flat formats and by element name in XML
                        let key = if flat {
                            (base + segment.start + field.position).to_string()
                        } else {
                            field.xml_name.clone()
                        };
                        signature.push((key, literal.clone()));
                    }
                }
            }
            Part::Segment(child) if !child.collection => {
                collect_rid(child, base + segment.start, flat, has_rid, signature);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Justify;
    use crate::error::{FieldErrorKind, InvalidRecord};
    use crate::io::{LineRecordReader, LineRecordWriter, XmlDocumentReader};
    use std::io::Cursor;

    fn field(name: &str) -> FieldConfig {
        FieldConfig {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn rid(name: &str, literal: &str) -> FieldConfig {
        FieldConfig {
            rid: true,
            literal: Some(literal.to_string()),
            ..field(name)
        }
    }

    fn typed(name: &str, ty: ValueType) -> FieldConfig {
        FieldConfig {
            r#type: Some(ty),
            ..field(name)
        }
    }

    fn record(name: &str, min: u32, max: Limit, parts: Vec<PartConfig>) -> ComponentConfig {
        ComponentConfig::Record(RecordConfig {
            name: name.to_string(),
            min_occurs: min,
            max_occurs: max,
            parts,
            ..Default::default()
        })
    }

    /// Group [header(1..1), detail(1..unbounded), trailer(1..1)], pipe
    /// delimited, discriminated by a literal in the first field.
    fn batch_config() -> StreamConfig {
        StreamConfig {
            name: "batch".to_string(),
            format: StreamFormat::Delimited,
            delimiter: Some('|'),
            children: vec![
                ComponentConfig::Record(RecordConfig {
                    name: "header".to_string(),
                    min_occurs: 1,
                    max_occurs: Limit::Bounded(1),
                    class: Some("Hdr".to_string()),
                    parts: vec![
                        PartConfig::Field(rid("type", "H")),
                        PartConfig::Field(typed("count", ValueType::I32)),
                    ],
                    ..Default::default()
                }),
                ComponentConfig::Record(RecordConfig {
                    name: "detail".to_string(),
                    min_occurs: 1,
                    max_occurs: Limit::Unbounded,
                    class: Some("Det".to_string()),
                    parts: vec![
                        PartConfig::Field(rid("type", "D")),
                        PartConfig::Field(field("data")),
                    ],
                    ..Default::default()
                }),
                ComponentConfig::Record(RecordConfig {
                    name: "trailer".to_string(),
                    min_occurs: 1,
                    max_occurs: Limit::Bounded(1),
                    class: Some("Tlr".to_string()),
                    parts: vec![
                        PartConfig::Field(rid("type", "T")),
                        PartConfig::Field(typed("count", ValueType::I32)),
                    ],
                    ..Default::default()
                }),
            ],
            ..Default::default()
        }
    }

    fn expect_report(result: Result<Option<Value>>) -> InvalidRecord {
        match result {
            Err(Error::InvalidRecord(report)) => *report,
            other => panic!("expected an invalid record, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn header_detail_trailer() {
        let mut stream = StreamBuilder::new(batch_config()).build().unwrap();
        let mut reader = stream
            .read_from(LineRecordReader::new(Cursor::new("H|1\nD|a\nD|b\nT|2\n")))
            .unwrap();

        let header = reader.read().unwrap().unwrap();
        assert_eq!(reader.record_name(), Some("header"));
        assert_eq!(
            header.as_record().unwrap().get("count"),
            Some(&Value::Int(1))
        );
        assert_eq!(header.as_record().unwrap().class(), Some("Hdr"));

        let first = reader.read().unwrap().unwrap();
        let second = reader.read().unwrap().unwrap();
        assert_eq!(
            first.as_record().unwrap().get("data"),
            Some(&Value::Text("a".to_string()))
        );
        assert_eq!(
            second.as_record().unwrap().get("data"),
            Some(&Value::Text("b".to_string()))
        );

        let trailer = reader.read().unwrap().unwrap();
        assert_eq!(
            trailer.as_record().unwrap().get("count"),
            Some(&Value::Int(2))
        );

        assert!(reader.read().unwrap().is_none());
        reader.close().unwrap();

        let state = stream.snapshot_state("cp");
        assert_eq!(state.get("cp.detail.count").map(String::as_str), Some("2"));
    }

    #[test]
    fn round_trip_preserves_bytes() {
        let input = "H|1\nD|a\nD|b\nT|2\n";
        let mut stream = StreamBuilder::new(batch_config()).build().unwrap();
        let mut values = Vec::new();
        {
            let mut reader = stream
                .read_from(LineRecordReader::new(Cursor::new(input)))
                .unwrap();
            while let Some(value) = reader.read().unwrap() {
                values.push(value);
            }
        }

        // class-based dispatch picks the right record for each value
        let mut out_stream = StreamBuilder::new(batch_config()).build().unwrap();
        let mut writer = out_stream.write_to(LineRecordWriter::new(Vec::new())).unwrap();
        for value in &values {
            writer.write(value).unwrap();
        }
        writer.close().unwrap();

        let bytes = writer.into_writer().into_inner();
        assert_eq!(String::from_utf8(bytes).unwrap(), input);
    }

    #[test]
    fn missing_required_field() {
        let config = StreamConfig {
            name: "employees".to_string(),
            format: StreamFormat::Fixed,
            children: vec![record(
                "employee",
                0,
                Limit::Unbounded,
                vec![PartConfig::Field(FieldConfig {
                    length: Some(10),
                    required: true,
                    trim: true,
                    ..field("name")
                })],
            )],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        let mut reader = stream
            .read_from(LineRecordReader::new(Cursor::new("          \n")))
            .unwrap();

        let report = expect_report(reader.read());
        assert_eq!(
            report.to_string(),
            "Invalid record 'employee'\n ==> Invalid 'name':  required"
        );
        assert_eq!(report.field_errors.len(), 1);
        assert_eq!(report.field_errors[0].kind, FieldErrorKind::Required);

        // the reader recovers after an invalid record
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn field_errors_in_declaration_order() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Delimited,
            delimiter: Some('|'),
            children: vec![record(
                "r",
                0,
                Limit::Unbounded,
                vec![
                    PartConfig::Field(FieldConfig {
                        required: true,
                        ..field("first")
                    }),
                    PartConfig::Field(typed("second", ValueType::I32)),
                    PartConfig::Field(FieldConfig {
                        required: true,
                        ..field("third")
                    }),
                ],
            )],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        let mut reader = stream
            .read_from(LineRecordReader::new(Cursor::new("|abc|\n")))
            .unwrap();

        let report = expect_report(reader.read());
        let fields: Vec<&str> = report
            .field_errors
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(fields, vec!["first", "second", "third"]);
    }

    #[test]
    fn max_occurs_breach() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Delimited,
            delimiter: Some('|'),
            children: vec![record(
                "a",
                1,
                Limit::Bounded(2),
                vec![PartConfig::Field(rid("type", "A"))],
            )],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        let mut reader = stream
            .read_from(LineRecordReader::new(Cursor::new("A\nA\nA\n")))
            .unwrap();

        assert!(reader.read().unwrap().is_some());
        assert!(reader.read().unwrap().is_some());

        let report = expect_report(reader.read());
        assert_eq!(report.record_name(), Some("a"));
        assert_eq!(report.record_errors[0].kind, RecordErrorKind::RecordTooMany);
    }

    #[test]
    fn ordering_rejects_early_records() {
        let mut stream = StreamBuilder::new(batch_config()).build().unwrap();
        let mut reader = stream
            .read_from(LineRecordReader::new(Cursor::new("H|1\nT|2\n")))
            .unwrap();

        assert!(reader.read().unwrap().is_some());

        // trailer may not appear before detail satisfied its minimum
        let report = expect_report(reader.read());
        assert_eq!(report.record_name(), Some("trailer"));
        assert_eq!(
            report.record_errors[0].kind,
            RecordErrorKind::UnexpectedRecord
        );

        // end of stream now reports the unsatisfied detail record
        match reader.read() {
            Err(Error::UnexpectedEof(name)) => assert_eq!(name, "detail"),
            other => panic!("expected unexpected-EOF, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn group_repeats_when_bounds_allow() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Delimited,
            delimiter: Some('|'),
            children: vec![ComponentConfig::Group(GroupConfig {
                name: "pair".to_string(),
                min_occurs: 1,
                max_occurs: Limit::Unbounded,
                children: vec![
                    record(
                        "h",
                        1,
                        Limit::Bounded(1),
                        vec![PartConfig::Field(rid("type", "H"))],
                    ),
                    record(
                        "d",
                        1,
                        Limit::Bounded(1),
                        vec![PartConfig::Field(rid("type", "D"))],
                    ),
                ],
                ..Default::default()
            })],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        let mut reader = stream
            .read_from(LineRecordReader::new(Cursor::new("H\nD\nH\nD\n")))
            .unwrap();

        for _ in 0..4 {
            assert!(reader.read().unwrap().is_some());
        }
        assert!(reader.read().unwrap().is_none());
        reader.close().unwrap();

        let state = stream.snapshot_state("cp");
        assert_eq!(state.get("cp.pair.count").map(String::as_str), Some("2"));
    }

    #[test]
    fn unordered_stream_accepts_any_order() {
        let mut config = batch_config();
        config.ordered = false;
        let mut stream = StreamBuilder::new(config).build().unwrap();
        let mut reader = stream
            .read_from(LineRecordReader::new(Cursor::new("D|a\nT|2\nH|1\n")))
            .unwrap();

        let names: Vec<String> = (0..3)
            .map(|_| {
                reader.read().unwrap().unwrap();
                reader.record_name().unwrap().to_string()
            })
            .collect();
        assert_eq!(names, vec!["detail", "trailer", "header"]);
        assert!(reader.read().unwrap().is_none());
        reader.close().unwrap();
    }

    #[test]
    fn checkpoint_resume() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Delimited,
            delimiter: Some('|'),
            children: vec![record(
                "r",
                0,
                Limit::Unbounded,
                vec![PartConfig::Field(typed("n", ValueType::I32))],
            )],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config.clone()).build().unwrap();
        {
            let mut reader = stream
                .read_from(LineRecordReader::new(Cursor::new("1\n2\n3\n4\n5\n")))
                .unwrap();
            for _ in 0..5 {
                reader.read().unwrap().unwrap();
            }
        }
        let state = stream.snapshot_state("cp");
        assert_eq!(state.get("cp.r.count").map(String::as_str), Some("5"));

        // a fresh tree restored from the snapshot continues at the 6th
        let mut resumed = StreamBuilder::new(config.clone()).build().unwrap();
        resumed.restore_state("cp", &state).unwrap();
        {
            let mut reader = resumed
                .read_from(LineRecordReader::new(Cursor::new("6\n")))
                .unwrap();
            reader.read().unwrap().unwrap();
        }
        let state = resumed.snapshot_state("cp");
        assert_eq!(state.get("cp.r.count").map(String::as_str), Some("6"));

        // a restore with a missing required key fails fast
        let mut broken = StreamBuilder::new(config).build().unwrap();
        let empty = FxHashMap::default();
        assert!(matches!(
            broken.restore_state("cp", &empty),
            Err(Error::MissingStateKey(_))
        ));
    }

    #[test]
    fn unordered_xml_children_bind_by_name() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Xml,
            children: vec![record(
                "rec",
                0,
                Limit::Unbounded,
                vec![
                    PartConfig::Field(typed("a", ValueType::I32)),
                    PartConfig::Field(field("b")),
                    PartConfig::Field(field("c")),
                ],
            )],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        let mut reader = stream
            .read_from(
                XmlDocumentReader::from_str("<root><rec><c/><a>1</a><b>2</b></rec></root>")
                    .unwrap(),
            )
            .unwrap();

        let value = reader.read().unwrap().unwrap();
        let bean = value.as_record().unwrap();
        assert_eq!(bean.get("a"), Some(&Value::Int(1)));
        assert_eq!(bean.get("b"), Some(&Value::Text("2".to_string())));
        assert_eq!(bean.get("c"), Some(&Value::Null));
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn fixed_padding_round_trip() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Fixed,
            children: vec![record(
                "r",
                0,
                Limit::Unbounded,
                vec![PartConfig::Field(FieldConfig {
                    length: Some(5),
                    padding: Some('0'),
                    justify: Justify::Right,
                    r#type: Some(ValueType::I32),
                    ..field("amount")
                })],
            )],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        {
            let mut reader = stream
                .read_from(LineRecordReader::new(Cursor::new("00042\n")))
                .unwrap();
            let value = reader.read().unwrap().unwrap();
            assert_eq!(
                value.as_record().unwrap().get("amount"),
                Some(&Value::Int(42))
            );
        }

        stream.reset();
        let mut writer = stream.write_to(LineRecordWriter::new(Vec::new())).unwrap();
        let value = Value::Record(crate::value::Bean::new().with("amount", Value::Int(42)));
        writer.write_named("r", &value).unwrap();
        let bytes = writer.into_writer().into_inner();
        assert_eq!(String::from_utf8(bytes).unwrap(), "00042\n");
    }

    #[test]
    fn record_length_validation() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Fixed,
            children: vec![ComponentConfig::Record(RecordConfig {
                name: "r".to_string(),
                min_occurs: 0,
                max_occurs: Limit::Unbounded,
                min_length: Some(10),
                max_length: Some(10),
                parts: vec![PartConfig::Field(FieldConfig {
                    length: Some(10),
                    ..field("name")
                })],
                ..Default::default()
            })],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        let mut reader = stream
            .read_from(LineRecordReader::new(Cursor::new("short\n")))
            .unwrap();

        let report = expect_report(reader.read());
        assert_eq!(report.record_errors[0].kind, RecordErrorKind::RecordLength);
        assert_eq!(
            report.record_errors[0].message,
            "expected record length 10 to 10, was 5"
        );
        // framing errors short-circuit the field pipeline
        assert!(report.field_errors.is_empty());
    }

    #[test]
    fn skip_advances_without_counting() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Delimited,
            delimiter: Some('|'),
            children: vec![record(
                "r",
                0,
                Limit::Unbounded,
                vec![PartConfig::Field(field("n"))],
            )],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        let mut reader = stream
            .read_from(LineRecordReader::new(Cursor::new("1\n2\n3\n")))
            .unwrap();

        assert_eq!(reader.skip(2).unwrap(), 2);
        assert_eq!(reader.record_count(), 2);
        reader.read().unwrap().unwrap();

        let state = stream.snapshot_state("cp");
        assert_eq!(state.get("cp.r.count").map(String::as_str), Some("1"));
    }

    #[test]
    fn writer_close_reports_unsatisfied_minimum() {
        let mut stream = StreamBuilder::new(batch_config()).build().unwrap();
        let mut writer = stream.write_to(LineRecordWriter::new(Vec::new())).unwrap();

        let header = Value::Record(
            crate::value::Bean::of_class("Hdr")
                .with("type", Value::from("H"))
                .with("count", Value::Int(1)),
        );
        writer.write(&header).unwrap();

        match writer.close() {
            Err(Error::UnexpectedEof(name)) => assert_eq!(name, "detail"),
            other => panic!("expected unexpected-EOF, got {:?}", other),
        }
    }

    #[test]
    fn mode_constrains_direction() {
        let mut config = batch_config();
        config.mode = Mode::Read;
        let mut stream = StreamBuilder::new(config).build().unwrap();

        assert!(matches!(
            stream.write_to(LineRecordWriter::new(Vec::new())),
            Err(Error::InvalidMode("writing"))
        ));
        assert!(stream
            .read_from(LineRecordReader::new(Cursor::new("")))
            .is_ok());
    }

    #[test]
    fn rejects_zero_max_occurs() {
        let config = StreamConfig {
            name: "s".to_string(),
            children: vec![record("r", 0, Limit::Bounded(0), Vec::new())],
            ..Default::default()
        };
        assert!(matches!(
            StreamBuilder::new(config).build(),
            Err(Error::MalformedMapping(_))
        ));
    }

    #[test]
    fn rejects_ambiguous_identifiers() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Delimited,
            ordered: false,
            children: vec![
                record(
                    "a",
                    0,
                    Limit::Unbounded,
                    vec![PartConfig::Field(rid("type", "X"))],
                ),
                record(
                    "b",
                    0,
                    Limit::Unbounded,
                    vec![PartConfig::Field(rid("type", "X"))],
                ),
            ],
            ..Default::default()
        };
        match StreamBuilder::new(config).build() {
            Err(Error::MalformedMapping(message)) => {
                assert!(message.contains("ambiguous"), "got: {}", message)
            }
            other => panic!("expected a mapping error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_unbounded_middle_part() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Delimited,
            children: vec![record(
                "r",
                0,
                Limit::Unbounded,
                vec![
                    PartConfig::Field(FieldConfig {
                        collection: Some(crate::config::Collection::List),
                        max_occurs: Limit::Unbounded,
                        min_occurs: 0,
                        ..field("items")
                    }),
                    PartConfig::Field(field("after")),
                ],
            )],
            ..Default::default()
        };
        assert!(matches!(
            StreamBuilder::new(config).build(),
            Err(Error::MalformedMapping(_))
        ));
    }

    #[test]
    fn duplicate_selector_names_rejected() {
        let config = StreamConfig {
            name: "s".to_string(),
            children: vec![
                record("r", 0, Limit::Unbounded, vec![PartConfig::Field(rid("t", "A"))]),
                record("r", 0, Limit::Unbounded, vec![PartConfig::Field(rid("t", "B"))]),
            ],
            ..Default::default()
        };
        assert!(matches!(
            StreamBuilder::new(config).build(),
            Err(Error::MalformedMapping(_))
        ));
    }

    #[test]
    fn repeating_segment_consumes_blocks() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Delimited,
            delimiter: Some('|'),
            children: vec![ComponentConfig::Record(RecordConfig {
                name: "order".to_string(),
                min_occurs: 0,
                max_occurs: Limit::Unbounded,
                parts: vec![
                    PartConfig::Field(field("id")),
                    PartConfig::Segment(SegmentConfig {
                        name: "items".to_string(),
                        collection: Some(crate::config::Collection::List),
                        min_occurs: 0,
                        max_occurs: Limit::Unbounded,
                        parts: vec![
                            PartConfig::Field(field("sku")),
                            PartConfig::Field(typed("qty", ValueType::I32)),
                        ],
                        ..Default::default()
                    }),
                ],
                ..Default::default()
            })],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        {
            let mut reader = stream
                .read_from(LineRecordReader::new(Cursor::new("7|a|2|b|3\n")))
                .unwrap();
            let value = reader.read().unwrap().unwrap();
            let bean = value.as_record().unwrap();
            assert_eq!(bean.get("id"), Some(&Value::Text("7".to_string())));
            let items = bean.get("items").unwrap().as_list().unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(
                items[0].as_record().unwrap().get("sku"),
                Some(&Value::Text("a".to_string()))
            );
            assert_eq!(items[1].as_record().unwrap().get("qty"), Some(&Value::Int(3)));

            // write the same value back out
            let value = value.clone();
            drop(reader);
            stream.reset();
            let mut writer = stream.write_to(LineRecordWriter::new(Vec::new())).unwrap();
            writer.write_named("order", &value).unwrap();
            let bytes = writer.into_writer().into_inner();
            assert_eq!(String::from_utf8(bytes).unwrap(), "7|a|2|b|3\n");
        }
    }

    #[test]
    fn nested_xml_segment_binds_child_bean() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Xml,
            children: vec![ComponentConfig::Record(RecordConfig {
                name: "order".to_string(),
                min_occurs: 0,
                max_occurs: Limit::Unbounded,
                parts: vec![
                    PartConfig::Field(field("id")),
                    PartConfig::Segment(SegmentConfig {
                        name: "customer".to_string(),
                        class: Some("Customer".to_string()),
                        parts: vec![
                            PartConfig::Field(field("name")),
                            PartConfig::Field(field("city")),
                        ],
                        ..Default::default()
                    }),
                ],
                ..Default::default()
            })],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        let mut reader = stream
            .read_from(
                XmlDocumentReader::from_str(
                    "<root><order><id>7</id>\
                     <customer><name>ada</name><city>york</city></customer></order></root>",
                )
                .unwrap(),
            )
            .unwrap();

        let value = reader.read().unwrap().unwrap();
        let bean = value.as_record().unwrap();
        assert_eq!(bean.get("id"), Some(&Value::Text("7".to_string())));
        let customer = bean.get("customer").unwrap().as_record().unwrap();
        assert_eq!(customer.class(), Some("Customer"));
        assert_eq!(customer.get("name"), Some(&Value::Text("ada".to_string())));
        assert_eq!(customer.get("city"), Some(&Value::Text("york".to_string())));
    }

    #[test]
    fn wrapped_xml_collection_round_trip() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Xml,
            children: vec![ComponentConfig::Record(RecordConfig {
                name: "order".to_string(),
                min_occurs: 0,
                max_occurs: Limit::Unbounded,
                parts: vec![PartConfig::Segment(SegmentConfig {
                    name: "item".to_string(),
                    collection: Some(crate::config::Collection::List),
                    min_occurs: 0,
                    max_occurs: Limit::Unbounded,
                    xml_wrapper: Some("items".to_string()),
                    parts: vec![PartConfig::Field(field("sku"))],
                    ..Default::default()
                })],
                ..Default::default()
            })],
            ..Default::default()
        };

        let input = "<root><order><items>\
                     <item><sku>a</sku></item><item><sku>b</sku></item>\
                     </items></order></root>";

        let mut stream = StreamBuilder::new(config).build().unwrap();
        let value = {
            let mut reader = stream
                .read_from(XmlDocumentReader::from_str(input).unwrap())
                .unwrap();
            reader.read().unwrap().unwrap()
        };
        let items = value.as_record().unwrap().get("item").unwrap();
        assert_eq!(items.as_list().unwrap().len(), 2);

        stream.reset();
        let mut writer = stream
            .write_to(crate::io::XmlDocumentWriter::new(Vec::new(), "root"))
            .unwrap();
        writer.write_named("order", &value).unwrap();
        let mut inner = writer.into_writer();
        inner.finish().unwrap();
        assert_eq!(String::from_utf8(inner.into_inner()).unwrap(), input);
    }

    #[test]
    fn constant_property_binds_without_stream_content() {
        let config = StreamConfig {
            name: "s".to_string(),
            format: StreamFormat::Delimited,
            delimiter: Some('|'),
            children: vec![ComponentConfig::Record(RecordConfig {
                name: "r".to_string(),
                min_occurs: 0,
                max_occurs: Limit::Unbounded,
                parts: vec![
                    PartConfig::Field(field("n")),
                    PartConfig::Property(PropertyConfig {
                        name: "source".to_string(),
                        r#type: Some(ValueType::Text),
                        value: "import".to_string(),
                    }),
                ],
                ..Default::default()
            })],
            ..Default::default()
        };

        let mut stream = StreamBuilder::new(config).build().unwrap();
        let mut reader = stream
            .read_from(LineRecordReader::new(Cursor::new("x\n")))
            .unwrap();

        let value = reader.read().unwrap().unwrap();
        let bean = value.as_record().unwrap();
        assert_eq!(bean.get("n"), Some(&Value::Text("x".to_string())));
        assert_eq!(bean.get("source"), Some(&Value::Text("import".to_string())));
    }
}
