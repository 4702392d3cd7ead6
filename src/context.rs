use crate::error::{
    FieldError, FieldErrorKind, InvalidRecord, RecordError, RecordErrorKind,
};
use crate::format::{FormatCodec, MarshalBuffer, Raw};
use crate::io::RecordWriter;
use crate::Result;

/// Read-side state for one record at a time: the format-typed raw view,
/// position counters, and the accumulated validation errors. Errors
/// gathered while a record unmarshals become visible atomically through
/// [`UnmarshallingContext::record_completed`].
#[derive(Debug)]
pub struct UnmarshallingContext {
    pub(crate) line: u64,
    pub(crate) record_count: u64,
    pub(crate) record_name: Option<String>,
    pub(crate) raw: Raw,
    pub(crate) field_errors: Vec<FieldError>,
    pub(crate) record_errors: Vec<RecordError>,
}

impl UnmarshallingContext {
    pub(crate) fn new() -> Self {
        Self {
            line: 0,
            record_count: 0,
            record_name: None,
            raw: Raw::None,
            field_errors: Vec::new(),
            record_errors: Vec::new(),
        }
    }

    /// Begins a new record: installs the raw view and clears per-record
    /// state left over from the previous one.
    pub(crate) fn record_started(&mut self, line: u64, raw: Raw) {
        self.line = line;
        self.raw = raw;
        self.record_name = None;
        self.field_errors.clear();
        self.record_errors.clear();
    }

    /// Ends the current record. Returns the complete validation report
    /// when any error accumulated.
    pub(crate) fn record_completed(&mut self) -> Option<InvalidRecord> {
        self.record_count += 1;
        if self.field_errors.is_empty() && self.record_errors.is_empty() {
            return None;
        }
        Some(InvalidRecord {
            record_name: self.record_name.clone(),
            line: self.line,
            record_errors: std::mem::take(&mut self.record_errors),
            field_errors: std::mem::take(&mut self.field_errors),
        })
    }

    /// Records an event that advances the logical position without
    /// binding or matching.
    pub(crate) fn record_skipped(&mut self) {
        self.record_count += 1;
    }

    #[inline]
    pub fn line(&self) -> u64 {
        self.line
    }

    #[inline]
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    #[inline]
    pub fn record_name(&self) -> Option<&str> {
        self.record_name.as_deref()
    }

    #[inline]
    pub fn has_record_errors(&self) -> bool {
        !self.record_errors.is_empty()
    }

    #[inline]
    pub fn has_field_errors(&self) -> bool {
        !self.field_errors.is_empty()
    }

    #[inline]
    pub(crate) fn raw(&self) -> &Raw {
        &self.raw
    }

    pub(crate) fn set_record_name<S: Into<String>>(&mut self, name: S) {
        self.record_name = Some(name.into());
    }

    pub(crate) fn add_record_error(&mut self, kind: RecordErrorKind, message: String) {
        self.record_errors.push(RecordError { kind, message });
    }

    pub(crate) fn add_field_error(&mut self, field: &str, kind: FieldErrorKind, message: String) {
        self.field_errors.push(FieldError {
            field: field.to_string(),
            kind,
            message,
        });
    }
}

/// Write-side state: the outbound record's buffer and the errors raised
/// while marshalling it. The buffer is cleared when the record is taken
/// for writing, whatever the outcome.
#[derive(Debug)]
pub struct MarshallingContext {
    pub(crate) record_count: u64,
    pub(crate) record_name: Option<String>,
    pub(crate) buffer: Option<MarshalBuffer>,
    pub(crate) field_errors: Vec<FieldError>,
    pub(crate) record_errors: Vec<RecordError>,
}

impl MarshallingContext {
    pub(crate) fn new() -> Self {
        Self {
            record_count: 0,
            record_name: None,
            buffer: None,
            field_errors: Vec::new(),
            record_errors: Vec::new(),
        }
    }

    pub(crate) fn record_started<S: Into<String>>(&mut self, name: S) {
        self.record_name = Some(name.into());
        self.buffer = None;
        self.field_errors.clear();
        self.record_errors.clear();
    }

    pub(crate) fn record_completed(&mut self) -> Option<InvalidRecord> {
        self.record_count += 1;
        if self.field_errors.is_empty() && self.record_errors.is_empty() {
            return None;
        }
        self.buffer = None;
        Some(InvalidRecord {
            record_name: self.record_name.clone(),
            line: self.record_count,
            record_errors: std::mem::take(&mut self.record_errors),
            field_errors: std::mem::take(&mut self.field_errors),
        })
    }

    /// Flushes the marshal buffer to the downstream writer and clears
    /// it. A record that accumulated errors is dropped instead of
    /// written; rendering failures accumulate as record errors.
    pub(crate) fn write_record<W: RecordWriter>(
        &mut self,
        codec: &FormatCodec,
        writer: &mut W,
    ) -> Result<()> {
        let buffer = match self.buffer.take() {
            Some(buffer) => buffer,
            None => return Ok(()),
        };
        if !self.field_errors.is_empty() || !self.record_errors.is_empty() {
            return Ok(());
        }
        match codec.render(buffer) {
            Ok(body) => writer.write(&body),
            Err(message) => {
                self.add_record_error(RecordErrorKind::Malformed, message);
                Ok(())
            }
        }
    }

    #[inline]
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    #[inline]
    pub fn record_name(&self) -> Option<&str> {
        self.record_name.as_deref()
    }

    pub(crate) fn add_record_error(&mut self, kind: RecordErrorKind, message: String) {
        self.record_errors.push(RecordError { kind, message });
    }

    pub(crate) fn add_field_error(&mut self, field: &str, kind: FieldErrorKind, message: String) {
        self.field_errors.push(FieldError {
            field: field.to_string(),
            kind,
            message,
        });
    }
}
