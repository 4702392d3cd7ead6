use crate::value::Value;

/// Reads and writes one property of a record value.
///
/// The engine never introspects host types; everything it knows about a
/// record object goes through this trait. The default implementation,
/// [`NamedAccessor`], addresses `Bean` fields by name. Hosts with richer
/// record representations implement the trait themselves and register
/// accessors on the stream builder.
pub trait PropertyAccessor: Send + Sync {
    /// Whether this accessor recognizes the given record value. Used on
    /// the write side to dispatch a value to a record definition.
    fn defines(&self, _value: &Value) -> bool {
        true
    }

    fn get<'a>(&self, target: &'a Value) -> Option<&'a Value>;

    /// Writes a property into the target. Fails when the target cannot
    /// hold named properties.
    fn set(&self, target: &mut Value, value: Value) -> std::result::Result<(), String>;
}

/// Property access by field name, with independent keys for the read and
/// write sides when the mapping declares explicit getter/setter names.
#[derive(Debug, Clone)]
pub struct NamedAccessor {
    get_key: String,
    set_key: String,
}

impl NamedAccessor {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        Self {
            get_key: name.clone(),
            set_key: name,
        }
    }

    pub fn with_keys<G, S>(getter: G, setter: S) -> Self
    where
        G: Into<String>,
        S: Into<String>,
    {
        Self {
            get_key: getter.into(),
            set_key: setter.into(),
        }
    }

    #[inline]
    pub fn get_key(&self) -> &str {
        &self.get_key
    }

    #[inline]
    pub fn set_key(&self) -> &str {
        &self.set_key
    }
}

impl PropertyAccessor for NamedAccessor {
    fn defines(&self, value: &Value) -> bool {
        value
            .as_record()
            .map(|bean| bean.get(&self.get_key).is_some())
            .unwrap_or(false)
    }

    fn get<'a>(&self, target: &'a Value) -> Option<&'a Value> {
        target.as_record().and_then(|bean| bean.get(&self.get_key))
    }

    fn set(&self, target: &mut Value, value: Value) -> std::result::Result<(), String> {
        match target.as_record_mut() {
            Some(bean) => {
                bean.set(self.set_key.clone(), value);
                Ok(())
            }
            None => Err(format!(
                "cannot set property '{}' on a non-record value",
                self.set_key
            )),
        }
    }
}
