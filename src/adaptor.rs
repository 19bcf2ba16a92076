//! The adaptor registry: custom per-type convert functions, the
//! highest-ranked serialization strategy and one of the two deserialization
//! paths.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use crate::host::OpaqueValue;
use crate::value::JsonObject;

/// Produces the JSON shape of a host value, or `None` to decline.
pub type SerializeFn = Rc<dyn Fn(&dyn Any) -> Option<JsonObject>>;

/// Rebuilds a host value from a parsed object, or `None` to decline.
pub type DeserializeFn = Rc<dyn Fn(&JsonObject) -> Option<OpaqueValue>>;

#[derive(Clone, Default)]
struct AdaptorEntry {
    serialize: Option<SerializeFn>,
    deserialize: Option<DeserializeFn>,
}

/// Map from exact runtime type to its registered handlers. No supertype or
/// trait matching: a handler for one type serves that type only.
#[derive(Default)]
pub struct AdaptorRegistry {
    handlers: HashMap<TypeId, AdaptorEntry>,
}

impl AdaptorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded from the preset table.
    #[must_use]
    pub fn with_presets() -> Self {
        Self {
            handlers: presets(),
        }
    }

    /// Registers handlers for `T`. An existing entry is partially updated:
    /// only the supplied (`Some`) slots are replaced.
    pub fn register<T: Any>(
        &mut self,
        serialize: Option<SerializeFn>,
        deserialize: Option<DeserializeFn>,
    ) {
        self.register_dynamic(TypeId::of::<T>(), serialize, deserialize);
    }

    /// Type-erased form of [`AdaptorRegistry::register`].
    pub fn register_dynamic(
        &mut self,
        type_id: TypeId,
        serialize: Option<SerializeFn>,
        deserialize: Option<DeserializeFn>,
    ) {
        let entry = self.handlers.entry(type_id).or_default();
        if let Some(serialize) = serialize {
            entry.serialize = Some(serialize);
        }
        if let Some(deserialize) = deserialize {
            entry.deserialize = Some(deserialize);
        }
    }

    /// Runs the registered serialize handler for `type_id`, if any. `None`
    /// means no handler, or a handler that declined.
    #[must_use]
    pub fn serialize(&self, type_id: TypeId, value: &dyn Any) -> Option<JsonObject> {
        let handler = self.handlers.get(&type_id)?.serialize.as_deref()?;
        handler(value)
    }

    /// Runs the registered deserialize handler for `type_id`, if any.
    #[must_use]
    pub fn deserialize(&self, type_id: TypeId, data: &JsonObject) -> Option<OpaqueValue> {
        let handler = self.handlers.get(&type_id)?.deserialize.as_deref()?;
        handler(data)
    }

    #[must_use]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.handlers.contains_key(&type_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Preset adaptors seeded into [`AdaptorRegistry::with_presets`].
/// Intentionally empty; deployments that need stock adaptors add them here.
fn presets() -> HashMap<TypeId, AdaptorEntry> {
    HashMap::new()
}
