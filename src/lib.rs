//! A declarative record-binding engine for flat textual streams.
//!
//! A [`Stream`] is compiled once from a mapping configuration and then
//! binds delimited, fixed-length, CSV or XML records to [`Value`]s in
//! both directions through [`StreamReader`] and [`StreamWriter`].

mod accessor;
pub mod config;
mod context;
mod error;
mod format;
pub mod io;
mod parser;
mod stream;
pub mod types;
mod value;

pub use accessor::{NamedAccessor, PropertyAccessor};
pub use context::{MarshallingContext, UnmarshallingContext};
pub use error::{
    Error, FieldError, FieldErrorKind, InvalidRecord, RecordError, RecordErrorKind, Result,
};
pub use format::XmlNode;
pub use stream::{Stream, StreamBuilder, StreamReader, StreamWriter};
pub use types::{TypeHandler, TypeHandlerRegistry};
pub use value::{Bean, Value, ValueType};
