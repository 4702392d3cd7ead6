mod builtin;

pub use builtin::{
    BoolHandler, CharHandler, DateHandler, DateTimeHandler, DecimalHandler, IntHandler,
    TextHandler, TimeHandler, UIntHandler, UuidHandler,
};

use crate::config::TypeHandlerConfig;
use crate::value::{Value, ValueType};
use crate::{Error, Result};

use fxhash::FxHashMap;
use std::sync::Arc;
use strum::IntoEnumIterator;

/// A bidirectional text-to-value codec.
///
/// Handlers are stateless: one instance may serve any number of streams
/// concurrently and must not retain references to contexts. Parse and
/// format are inverse on the values a handler accepts.
pub trait TypeHandler: Send + Sync {
    fn target_type(&self) -> ValueType;

    fn parse(&self, text: &str) -> std::result::Result<Value, String>;

    fn format(&self, value: &Value) -> std::result::Result<String, String>;
}

/// Resolves type handlers for fields.
///
/// Resolution order: explicit handler name, then `(type, format)`, then
/// type alone, then the type's widening chain. A per-stream registry
/// chains to the frozen default registry, so stream-local registrations
/// shadow the defaults without mutating them.
pub struct TypeHandlerRegistry {
    parent: Option<Arc<TypeHandlerRegistry>>,
    by_name: FxHashMap<String, Arc<dyn TypeHandler>>,
    by_type: FxHashMap<(ValueType, Option<String>), Arc<dyn TypeHandler>>,
}

impl TypeHandlerRegistry {
    pub fn new() -> Self {
        Self {
            parent: None,
            by_name: FxHashMap::default(),
            by_type: FxHashMap::default(),
        }
    }

    /// The default registry: one handler per [`ValueType`], each also
    /// registered under the type's name.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for ty in ValueType::iter() {
            let handler = builtin::default_handler(ty, None);
            registry.register_named(ty.to_string(), handler.clone());
            registry.register(ty, None, handler);
        }
        registry
    }

    pub fn chained(parent: Arc<TypeHandlerRegistry>) -> Self {
        Self {
            parent: Some(parent),
            by_name: FxHashMap::default(),
            by_type: FxHashMap::default(),
        }
    }

    pub fn register_named<S: Into<String>>(&mut self, name: S, handler: Arc<dyn TypeHandler>) {
        self.by_name.insert(name.into(), handler);
    }

    pub fn register(
        &mut self,
        ty: ValueType,
        format: Option<String>,
        handler: Arc<dyn TypeHandler>,
    ) {
        self.by_type.insert((ty, format), handler);
    }

    /// Registers a handler described by a mapping `typeHandler` element.
    /// The element's `class` selects a built-in codec by name.
    pub fn register_configured(&mut self, config: &TypeHandlerConfig) -> Result<()> {
        let id = config
            .class
            .as_deref()
            .ok_or_else(|| Error::MalformedMapping("typeHandler requires a class".to_string()))?;
        let base = id
            .parse::<ValueType>()
            .map_err(|_| Error::UnknownTypeHandler(id.to_string()))?;
        let handler = builtin::default_handler(base, config.format.as_deref());

        if let Some(name) = &config.name {
            self.register_named(name.clone(), handler.clone());
        }
        if let Some(ty) = config.r#type {
            self.register(ty, config.format.clone(), handler);
        } else if config.name.is_none() {
            self.register(base, config.format.clone(), handler);
        }
        Ok(())
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn TypeHandler>> {
        match self.by_name.get(name) {
            Some(handler) => Some(handler.clone()),
            None => self.parent.as_ref().and_then(|p| p.by_name(name)),
        }
    }

    /// Resolves a handler for a declared type and optional format. A
    /// `(type, format)` registration wins over a bare `type` one; when
    /// neither is present the search widens narrow integer types. A
    /// format string on the field constructs a fresh built-in handler
    /// when no explicit registration covers it.
    pub fn for_type(&self, ty: ValueType, format: Option<&str>) -> Option<Arc<dyn TypeHandler>> {
        if let Some(handler) = self.lookup_type(ty, format) {
            return Some(handler);
        }
        if format.is_some() {
            return Some(builtin::default_handler(ty, format));
        }
        let mut widened = ty.widened();
        while let Some(wide) = widened {
            if let Some(handler) = self.lookup_type(wide, None) {
                return Some(handler);
            }
            widened = wide.widened();
        }
        None
    }

    fn lookup_type(&self, ty: ValueType, format: Option<&str>) -> Option<Arc<dyn TypeHandler>> {
        if let Some(format) = format {
            if let Some(handler) = self.by_type.get(&(ty, Some(format.to_string()))) {
                return Some(handler.clone());
            }
        }
        if format.is_none() {
            if let Some(handler) = self.by_type.get(&(ty, None)) {
                return Some(handler.clone());
            }
        }
        self.parent.as_ref().and_then(|p| p.lookup_type(ty, format))
    }
}

impl Default for TypeHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
