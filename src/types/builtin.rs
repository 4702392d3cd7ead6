use super::TypeHandler;
use crate::value::{Value, ValueType};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use uuid::Uuid;

const DATE_PATTERN: &str = "%Y-%m-%d";
const TIME_PATTERN: &str = "%H:%M:%S";
const DATETIME_PATTERN: &str = "%Y-%m-%dT%H:%M:%S";

pub(crate) fn default_handler(ty: ValueType, format: Option<&str>) -> Arc<dyn TypeHandler> {
    match ty {
        ValueType::Text => Arc::new(TextHandler),
        ValueType::Bool => Arc::new(BoolHandler),
        ValueType::Char => Arc::new(CharHandler),
        ValueType::I8 | ValueType::I16 | ValueType::I32 | ValueType::I64 => {
            Arc::new(IntHandler::new(ty))
        }
        ValueType::U8 | ValueType::U16 | ValueType::U32 | ValueType::U64 => {
            Arc::new(UIntHandler::new(ty))
        }
        ValueType::Decimal => Arc::new(DecimalHandler::new(format)),
        ValueType::Date => Arc::new(DateHandler::new(format.unwrap_or(DATE_PATTERN))),
        ValueType::Time => Arc::new(TimeHandler::new(format.unwrap_or(TIME_PATTERN))),
        ValueType::DateTime => {
            Arc::new(DateTimeHandler::new(format.unwrap_or(DATETIME_PATTERN)))
        }
        ValueType::Uuid => Arc::new(UuidHandler),
    }
}

fn mismatch(ty: ValueType) -> String {
    format!("expected a {} value", ty)
}

fn unparsable(text: &str, ty: ValueType) -> String {
    format!("'{}' is not a valid {}", text, ty)
}

/// Identity codec for text fields.
pub struct TextHandler;

impl TypeHandler for TextHandler {
    fn target_type(&self) -> ValueType {
        ValueType::Text
    }

    fn parse(&self, text: &str) -> std::result::Result<Value, String> {
        Ok(Value::Text(text.to_string()))
    }

    fn format(&self, value: &Value) -> std::result::Result<String, String> {
        match value {
            Value::Text(text) => Ok(text.clone()),
            Value::Char(c) => Ok(c.to_string()),
            _ => Err(mismatch(ValueType::Text)),
        }
    }
}

/// `true`/`false`, also accepting `1`/`0` on input.
pub struct BoolHandler;

impl TypeHandler for BoolHandler {
    fn target_type(&self) -> ValueType {
        ValueType::Bool
    }

    fn parse(&self, text: &str) -> std::result::Result<Value, String> {
        match text {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(unparsable(text, ValueType::Bool)),
        }
    }

    fn format(&self, value: &Value) -> std::result::Result<String, String> {
        match value {
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(mismatch(ValueType::Bool)),
        }
    }
}

pub struct CharHandler;

impl TypeHandler for CharHandler {
    fn target_type(&self) -> ValueType {
        ValueType::Char
    }

    fn parse(&self, text: &str) -> std::result::Result<Value, String> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Value::Char(c)),
            _ => Err(unparsable(text, ValueType::Char)),
        }
    }

    fn format(&self, value: &Value) -> std::result::Result<String, String> {
        match value {
            Value::Char(c) => Ok(c.to_string()),
            _ => Err(mismatch(ValueType::Char)),
        }
    }
}

/// Signed integers of the standard widths. Values are carried as
/// `Value::Int`; the handler enforces the declared width's range.
pub struct IntHandler {
    ty: ValueType,
    min: i64,
    max: i64,
}

impl IntHandler {
    pub fn new(ty: ValueType) -> Self {
        let (min, max) = match ty {
            ValueType::I8 => (i8::MIN as i64, i8::MAX as i64),
            ValueType::I16 => (i16::MIN as i64, i16::MAX as i64),
            ValueType::I32 => (i32::MIN as i64, i32::MAX as i64),
            _ => (i64::MIN, i64::MAX),
        };
        Self { ty, min, max }
    }
}

impl TypeHandler for IntHandler {
    fn target_type(&self) -> ValueType {
        self.ty
    }

    fn parse(&self, text: &str) -> std::result::Result<Value, String> {
        let parsed = text
            .parse::<i64>()
            .map_err(|_| unparsable(text, self.ty))?;
        if parsed < self.min || parsed > self.max {
            return Err(format!("{} is out of range for {}", parsed, self.ty));
        }
        Ok(Value::Int(parsed))
    }

    fn format(&self, value: &Value) -> std::result::Result<String, String> {
        match value {
            Value::Int(i) if *i >= self.min && *i <= self.max => Ok(i.to_string()),
            Value::Int(i) => Err(format!("{} is out of range for {}", i, self.ty)),
            Value::UInt(u) if *u <= self.max as u64 => Ok(u.to_string()),
            _ => Err(mismatch(self.ty)),
        }
    }
}

/// Unsigned integers of the standard widths, carried as `Value::UInt`.
pub struct UIntHandler {
    ty: ValueType,
    max: u64,
}

impl UIntHandler {
    pub fn new(ty: ValueType) -> Self {
        let max = match ty {
            ValueType::U8 => u8::MAX as u64,
            ValueType::U16 => u16::MAX as u64,
            ValueType::U32 => u32::MAX as u64,
            _ => u64::MAX,
        };
        Self { ty, max }
    }
}

impl TypeHandler for UIntHandler {
    fn target_type(&self) -> ValueType {
        self.ty
    }

    fn parse(&self, text: &str) -> std::result::Result<Value, String> {
        let parsed = text
            .parse::<u64>()
            .map_err(|_| unparsable(text, self.ty))?;
        if parsed > self.max {
            return Err(format!("{} is out of range for {}", parsed, self.ty));
        }
        Ok(Value::UInt(parsed))
    }

    fn format(&self, value: &Value) -> std::result::Result<String, String> {
        match value {
            Value::UInt(u) if *u <= self.max => Ok(u.to_string()),
            Value::UInt(u) => Err(format!("{} is out of range for {}", u, self.ty)),
            Value::Int(i) if *i >= 0 && *i as u64 <= self.max => Ok(i.to_string()),
            _ => Err(mismatch(self.ty)),
        }
    }
}

/// Decimal codec. A pattern such as `0.00` fixes the number of emitted
/// fraction digits; without one, values format with the shortest
/// round-trippable representation.
pub struct DecimalHandler {
    precision: Option<usize>,
}

impl DecimalHandler {
    pub fn new(pattern: Option<&str>) -> Self {
        let precision = pattern.map(|p| match p.find('.') {
            Some(dot) => p[dot + 1..].chars().take_while(|c| *c == '0' || *c == '#').count(),
            None => 0,
        });
        Self { precision }
    }
}

impl TypeHandler for DecimalHandler {
    fn target_type(&self) -> ValueType {
        ValueType::Decimal
    }

    fn parse(&self, text: &str) -> std::result::Result<Value, String> {
        text.parse::<f64>()
            .map(Value::Number)
            .map_err(|_| unparsable(text, ValueType::Decimal))
    }

    fn format(&self, value: &Value) -> std::result::Result<String, String> {
        let number = match value {
            Value::Number(n) => *n,
            Value::Int(i) => *i as f64,
            Value::UInt(u) => *u as f64,
            _ => return Err(mismatch(ValueType::Decimal)),
        };
        Ok(match self.precision {
            Some(precision) => format!("{:.*}", precision, number),
            None => number.to_string(),
        })
    }
}

pub struct DateHandler {
    pattern: String,
}

impl DateHandler {
    pub fn new<S: Into<String>>(pattern: S) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl TypeHandler for DateHandler {
    fn target_type(&self) -> ValueType {
        ValueType::Date
    }

    fn parse(&self, text: &str) -> std::result::Result<Value, String> {
        NaiveDate::parse_from_str(text, &self.pattern)
            .map(Value::Date)
            .map_err(|_| unparsable(text, ValueType::Date))
    }

    fn format(&self, value: &Value) -> std::result::Result<String, String> {
        match value {
            Value::Date(d) => Ok(d.format(&self.pattern).to_string()),
            _ => Err(mismatch(ValueType::Date)),
        }
    }
}

pub struct TimeHandler {
    pattern: String,
}

impl TimeHandler {
    pub fn new<S: Into<String>>(pattern: S) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl TypeHandler for TimeHandler {
    fn target_type(&self) -> ValueType {
        ValueType::Time
    }

    fn parse(&self, text: &str) -> std::result::Result<Value, String> {
        NaiveTime::parse_from_str(text, &self.pattern)
            .map(Value::Time)
            .map_err(|_| unparsable(text, ValueType::Time))
    }

    fn format(&self, value: &Value) -> std::result::Result<String, String> {
        match value {
            Value::Time(t) => Ok(t.format(&self.pattern).to_string()),
            _ => Err(mismatch(ValueType::Time)),
        }
    }
}

pub struct DateTimeHandler {
    pattern: String,
}

impl DateTimeHandler {
    pub fn new<S: Into<String>>(pattern: S) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl TypeHandler for DateTimeHandler {
    fn target_type(&self) -> ValueType {
        ValueType::DateTime
    }

    fn parse(&self, text: &str) -> std::result::Result<Value, String> {
        NaiveDateTime::parse_from_str(text, &self.pattern)
            .map(Value::DateTime)
            .map_err(|_| unparsable(text, ValueType::DateTime))
    }

    fn format(&self, value: &Value) -> std::result::Result<String, String> {
        match value {
            Value::DateTime(dt) => Ok(dt.format(&self.pattern).to_string()),
            _ => Err(mismatch(ValueType::DateTime)),
        }
    }
}

pub struct UuidHandler;

impl TypeHandler for UuidHandler {
    fn target_type(&self) -> ValueType {
        ValueType::Uuid
    }

    fn parse(&self, text: &str) -> std::result::Result<Value, String> {
        Uuid::parse_str(text)
            .map(Value::Uuid)
            .map_err(|_| unparsable(text, ValueType::Uuid))
    }

    fn format(&self, value: &Value) -> std::result::Result<String, String> {
        match value {
            Value::Uuid(u) => Ok(u.to_string()),
            _ => Err(mismatch(ValueType::Uuid)),
        }
    }
}
