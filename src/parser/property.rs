use crate::accessor::{NamedAccessor, PropertyAccessor};
use crate::context::UnmarshallingContext;
use crate::error::FieldErrorKind;
use crate::value::Value;

/// A constant bean property: produces its configured value on read
/// without consuming anything from the stream, and is never written.
pub(crate) struct Constant {
    pub name: String,
    pub accessor: NamedAccessor,
    pub value: Value,
}

impl Constant {
    pub fn unmarshal(&self, ctx: &mut UnmarshallingContext, target: &mut Value) {
        if let Err(message) = self.accessor.set(target, self.value.clone()) {
            ctx.add_field_error(&self.name, FieldErrorKind::TypeHandler, message);
        }
    }
}
