use std::fmt;
use std::io;
use strum_macros::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    RegexBuild(#[from] regex::Error),
    #[error("Malformed mapping: {0}")]
    MalformedMapping(String),
    #[error("Unresolved import '{0}'")]
    UnresolvedImport(String),
    #[error("Circular import '{0}'")]
    CircularImport(String),
    #[error("Unknown type handler '{0}'")]
    UnknownTypeHandler(String),
    #[error("Malformed document: {0}")]
    MalformedDocument(String),
    #[error("Stream mode does not permit {0}")]
    InvalidMode(&'static str),
    #[error("No record matched the supplied value")]
    UnmatchedValue,
    #[error("End of stream before '{0}' satisfied its minimum occurrences")]
    UnexpectedEof(String),
    #[error("Missing state key '{0}'")]
    MissingStateKey(String),
    #[error("Invalid state value for key '{0}'")]
    InvalidStateValue(String),
    #[error(transparent)]
    InvalidRecord(Box<InvalidRecord>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the caller may keep reading or writing the stream after
    /// observing this error. Everything except an invalid record aborts
    /// the stream.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidRecord(_))
    }

    pub(crate) fn invalid_record(report: InvalidRecord) -> Self {
        Error::InvalidRecord(Box::new(report))
    }
}

/// Validation report for a single record, accumulated over every failing
/// field so callers see the complete picture at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRecord {
    pub record_name: Option<String>,
    pub line: u64,
    pub record_errors: Vec<RecordError>,
    pub field_errors: Vec<FieldError>,
}

impl InvalidRecord {
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
}

impl fmt::Display for InvalidRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid record '{}'",
            self.record_name.as_deref().unwrap_or("unknown")
        )?;
        for error in &self.record_errors {
            write!(f, "\n ==> {}", error.message)?;
        }
        for error in &self.field_errors {
            write!(f, "\n ==> Invalid '{}':  {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidRecord {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub kind: RecordErrorKind,
    pub message: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab_case")]
pub enum RecordErrorKind {
    Malformed,
    RecordLength,
    UnexpectedRecord,
    RecordTooMany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
    pub message: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab_case")]
pub enum FieldErrorKind {
    Required,
    Literal,
    Regex,
    TypeHandler,
    FieldTooLong,
    FieldTooShort,
}
