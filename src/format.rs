mod delimited;
mod fixed;
mod xml;

pub use xml::XmlNode;

pub(crate) use delimited::DelimitedCodec;
pub(crate) use fixed::{fixed_slice, place_fixed};
pub(crate) use xml::{parse_document, write_node};

use crate::io::RecordBody;

/// Format-typed view of the raw record currently being unmarshalled.
#[derive(Debug, Clone)]
pub(crate) enum Raw {
    None,
    Delimited(Vec<String>),
    Fixed(String),
    Xml(XmlNode),
}

impl Raw {
    /// Record length in format units: tokens for delimited records,
    /// characters for fixed-length ones.
    pub fn len(&self) -> usize {
        match self {
            Raw::None => 0,
            Raw::Delimited(tokens) => tokens.len(),
            Raw::Fixed(text) => text.chars().count(),
            Raw::Xml(node) => node.children.len(),
        }
    }
}

/// Outbound record under construction, one shape per stream format.
#[derive(Debug, Clone)]
pub(crate) enum MarshalBuffer {
    Delimited(Vec<Option<String>>),
    Fixed(String),
    Xml(XmlNode),
}

impl MarshalBuffer {
    pub fn set_token(&mut self, index: usize, text: String) {
        if let MarshalBuffer::Delimited(slots) = self {
            if slots.len() <= index {
                slots.resize(index + 1, None);
            }
            slots[index] = Some(text);
        }
    }

    pub fn place(&mut self, offset: usize, text: &str) -> std::result::Result<(), String> {
        match self {
            MarshalBuffer::Fixed(buf) => place_fixed(buf, offset, text),
            _ => Ok(()),
        }
    }
}

/// The stream's framing codec, fixed at build time.
#[derive(Debug, Clone)]
pub(crate) enum FormatCodec {
    Delimited(DelimitedCodec),
    Fixed,
    Xml,
}

impl FormatCodec {
    /// Converts one raw frame from the reader into the format-typed
    /// view. A failure here is a malformed-record error on the current
    /// record, not a fatal stream error.
    pub fn open(&self, body: RecordBody) -> std::result::Result<Raw, String> {
        match (self, body) {
            (FormatCodec::Delimited(codec), RecordBody::Line(line)) => {
                codec.tokenize(&line).map(Raw::Delimited)
            }
            (FormatCodec::Fixed, RecordBody::Line(line)) => Ok(Raw::Fixed(line)),
            (FormatCodec::Xml, RecordBody::Node(node)) => Ok(Raw::Xml(node)),
            _ => Err("record does not match the stream format".to_string()),
        }
    }

    pub fn new_buffer(&self) -> MarshalBuffer {
        match self {
            FormatCodec::Delimited(_) => MarshalBuffer::Delimited(Vec::new()),
            FormatCodec::Fixed => MarshalBuffer::Fixed(String::new()),
            FormatCodec::Xml => MarshalBuffer::Xml(XmlNode::default()),
        }
    }

    pub fn render(&self, buffer: MarshalBuffer) -> std::result::Result<RecordBody, String> {
        match (self, buffer) {
            (FormatCodec::Delimited(codec), MarshalBuffer::Delimited(slots)) => {
                codec.render(&slots).map(RecordBody::Line)
            }
            (FormatCodec::Fixed, MarshalBuffer::Fixed(text)) => Ok(RecordBody::Line(text)),
            (FormatCodec::Xml, MarshalBuffer::Xml(node)) => Ok(RecordBody::Node(node)),
            _ => Err("marshal buffer does not match the stream format".to_string()),
        }
    }
}
