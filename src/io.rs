use crate::format::{parse_document, write_node, XmlNode};
use crate::{Error, Result};

use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// One raw record as produced by a [`RecordReader`]: a line for the
/// flat formats, an element subtree for XML.
#[derive(Debug, Clone)]
pub enum RecordBody {
    Line(String),
    Node(XmlNode),
}

#[derive(Debug, Clone)]
pub struct RawRecord {
    /// 1-based position of the record in its source.
    pub line: u64,
    pub body: RecordBody,
}

/// Transport-level tokenizer: yields one raw record at a time. All I/O
/// the engine performs goes through this trait and [`RecordWriter`].
pub trait RecordReader {
    fn read(&mut self) -> Result<Option<RawRecord>>;
}

pub trait RecordWriter {
    fn write(&mut self, body: &RecordBody) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Line-oriented reader for delimited and fixed-length streams.
pub struct LineRecordReader<R> {
    inner: R,
    line: u64,
}

impl<R: BufRead> LineRecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, line: 0 }
    }
}

impl<R: BufRead> RecordReader for LineRecordReader<R> {
    fn read(&mut self) -> Result<Option<RawRecord>> {
        let mut buf = String::new();
        if self.inner.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        Ok(Some(RawRecord {
            line: self.line,
            body: RecordBody::Line(buf),
        }))
    }
}

/// Line-oriented writer; terminates every record with a newline.
pub struct LineRecordWriter<W> {
    inner: W,
}

impl<W: Write> LineRecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> RecordWriter for LineRecordWriter<W> {
    fn write(&mut self, body: &RecordBody) -> Result<()> {
        match body {
            RecordBody::Line(line) => {
                self.inner.write_all(line.as_bytes())?;
                self.inner.write_all(b"\n")?;
                Ok(())
            }
            RecordBody::Node(_) => Err(Error::MalformedDocument(
                "line writer received an XML record".to_string(),
            )),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Reads a whole XML document up front and yields each child element
/// of the document root as one record subtree.
pub struct XmlDocumentReader {
    records: VecDeque<XmlNode>,
    root_name: String,
    line: u64,
}

impl XmlDocumentReader {
    pub fn from_str(text: &str) -> Result<Self> {
        let root = parse_document(text).map_err(Error::MalformedDocument)?;
        Ok(Self {
            records: root.children.into(),
            root_name: root.name,
            line: 0,
        })
    }

    pub fn from_reader<R: std::io::Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_str(&text)
    }

    #[inline]
    pub fn root_name(&self) -> &str {
        &self.root_name
    }
}

impl RecordReader for XmlDocumentReader {
    fn read(&mut self) -> Result<Option<RawRecord>> {
        match self.records.pop_front() {
            Some(node) => {
                self.line += 1;
                Ok(Some(RawRecord {
                    line: self.line,
                    body: RecordBody::Node(node),
                }))
            }
            None => Ok(None),
        }
    }
}

/// Writes records as subtrees inside one document root element.
pub struct XmlDocumentWriter<W> {
    inner: W,
    root_name: String,
    started: bool,
}

impl<W: Write> XmlDocumentWriter<W> {
    pub fn new<S: Into<String>>(inner: W, root_name: S) -> Self {
        Self {
            inner,
            root_name: root_name.into(),
            started: false,
        }
    }

    /// Closes the document root. Must be called once after the last
    /// record.
    pub fn finish(&mut self) -> Result<()> {
        if !self.started {
            self.inner
                .write_all(format!("<{}>", self.root_name).as_bytes())?;
            self.started = true;
        }
        self.inner
            .write_all(format!("</{}>", self.root_name).as_bytes())?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> RecordWriter for XmlDocumentWriter<W> {
    fn write(&mut self, body: &RecordBody) -> Result<()> {
        let node = match body {
            RecordBody::Node(node) => node,
            RecordBody::Line(_) => {
                return Err(Error::MalformedDocument(
                    "XML writer received a flat record".to_string(),
                ))
            }
        };
        if !self.started {
            self.inner
                .write_all(format!("<{}>", self.root_name).as_bytes())?;
            self.started = true;
        }
        let mut out = String::new();
        write_node(node, &mut out);
        self.inner.write_all(out.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_lines_without_terminators() {
        let mut reader = LineRecordReader::new(Cursor::new("a|1\r\nb|2\nc|3"));
        let mut lines = Vec::new();
        while let Some(record) = reader.read().unwrap() {
            match record.body {
                RecordBody::Line(line) => lines.push((record.line, line)),
                other => panic!("unexpected body {:?}", other),
            }
        }
        assert_eq!(
            lines,
            vec![
                (1, "a|1".to_string()),
                (2, "b|2".to_string()),
                (3, "c|3".to_string())
            ]
        );
    }

    #[test]
    fn xml_reader_yields_subtrees() {
        let mut reader =
            XmlDocumentReader::from_str("<batch><r><a>1</a></r><r><a>2</a></r></batch>").unwrap();
        assert_eq!(reader.root_name(), "batch");

        let first = reader.read().unwrap().unwrap();
        match first.body {
            RecordBody::Node(node) => assert_eq!(node.child("a").unwrap().text, "1"),
            other => panic!("unexpected body {:?}", other),
        }
        assert!(reader.read().unwrap().is_some());
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn xml_writer_wraps_records() {
        let mut writer = XmlDocumentWriter::new(Vec::new(), "batch");
        let mut node = XmlNode::new("r");
        node.set_attribute("id", "1");
        writer.write(&RecordBody::Node(node)).unwrap();
        writer.finish().unwrap();

        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out, "<batch><r id=\"1\"/></batch>");
    }

    #[test]
    fn empty_xml_document_still_closes() {
        let mut writer = XmlDocumentWriter::new(Vec::new(), "batch");
        writer.finish().unwrap();
        assert_eq!(String::from_utf8(writer.into_inner()).unwrap(), "<batch></batch>");
    }
}
