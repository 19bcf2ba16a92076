//! The engine: the explicit context object that owns the adaptor registry
//! and the descriptor cache, and drives serialization and typed
//! deserialization.
//!
//! One engine per thread of work. The document model and the registry use
//! `Rc`, so an engine is neither `Send` nor `Sync`: concurrent use is ruled
//! out by the compiler rather than by convention. Callers that want a shared
//! engine put it behind a lock of their own choosing.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;

use crate::adaptor::{AdaptorRegistry, DeserializeFn, SerializeFn};
use crate::error::SerializeError;
use crate::host::{OpaqueValue, SelfDescribing};
use crate::reflect::DescriptorCache;
use crate::safety;
use crate::serializer::{SerializeOptions, Serializer};
use crate::value::{JsonObject, JsonValue};

/// The serialization engine. Parsing is stateless and lives in
/// [`crate::parse`]; everything that needs per-process state (adaptors,
/// cached descriptors) goes through an engine instance.
pub struct Engine {
    adaptors: AdaptorRegistry,
    descriptors: RefCell<DescriptorCache>,
}

impl Engine {
    /// A fresh engine, with the adaptor registry seeded from the preset
    /// table and an empty descriptor cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adaptors: AdaptorRegistry::with_presets(),
            descriptors: RefCell::new(DescriptorCache::new()),
        }
    }

    #[must_use]
    pub fn adaptors(&self) -> &AdaptorRegistry {
        &self.adaptors
    }

    #[must_use]
    pub fn adaptors_mut(&mut self) -> &mut AdaptorRegistry {
        &mut self.adaptors
    }

    /// Registers adaptor handlers for `T`; see
    /// [`AdaptorRegistry::register`].
    pub fn register<T: Any>(
        &mut self,
        serialize: Option<SerializeFn>,
        deserialize: Option<DeserializeFn>,
    ) {
        self.adaptors.register::<T>(serialize, deserialize);
    }

    /// Drops every cached type descriptor. Tables are re-read from
    /// [`crate::reflect::Introspect::member_table`] on next use.
    pub fn clear_descriptors(&self) {
        self.descriptors.borrow_mut().clear();
    }

    /// Serializes a document tree to JSON text.
    ///
    /// Unless `options.ignore_safety_checks` is set (and **it is set in
    /// [`SerializeOptions::default`]**), the safety checker runs first and a
    /// detected cycle aborts with [`SerializeError::CircularReference`].
    /// With the permissive default nothing guards against a cyclic document,
    /// and rendering one does not terminate; callers that cannot trust their
    /// trees use [`SerializeOptions::checked`].
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::CircularReference`] when the cycle check is
    /// enabled and fails.
    pub fn serialize(
        &self,
        value: &JsonValue,
        options: SerializeOptions,
    ) -> Result<String, SerializeError> {
        if !safety::is_render_safe(value, &options) {
            return Err(SerializeError::CircularReference);
        }
        Ok(Serializer::render(
            value,
            &self.adaptors,
            &self.descriptors,
            options,
        ))
    }

    /// Deserializes a parsed object into a `T`, trying the adaptor registry
    /// first and the self-describing capability second.
    ///
    /// The capability path needs an instance to populate: the caller's
    /// `instance` if supplied, otherwise whatever
    /// [`SelfDescribing::instantiate`] produces. When neither yields one the
    /// failure is logged at error level and `None` is returned: the lossy,
    /// recoverable outcome, not a panic.
    pub fn deserialize<T: SelfDescribing>(
        &self,
        data: &JsonObject,
        instance: Option<T>,
    ) -> Option<T> {
        if let Some(opaque) = self.adaptors.deserialize(TypeId::of::<T>(), data) {
            // An adaptor that produced a value of the wrong type degrades to
            // None, like every other recoverable failure here.
            return opaque.take::<T>();
        }

        let Some(mut instance) = instance.or_else(T::instantiate) else {
            log::error!(
                "deserialize: no instance of `{}` could be constructed; \
                 supply one or implement `instantiate`",
                type_name::<T>()
            );
            return None;
        };
        instance.apply_json(data);
        Some(instance)
    }

    /// Type-erased deserialization: the adaptor registry is the only
    /// strategy that can run without a typed instance. A miss is logged at
    /// warning level and yields `None`.
    pub fn deserialize_opaque(&self, type_id: TypeId, data: &JsonObject) -> Option<OpaqueValue> {
        let result = self.adaptors.deserialize(type_id, data);
        if result.is_none() {
            log::warn!("deserialize: no deserializer is registered for {type_id:?}");
        }
        result
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[derive(Default, Debug, PartialEq)]
    struct Creature {
        name: String,
        hp: i64,
    }

    impl SelfDescribing for Creature {
        fn to_json(&self) -> Option<JsonObject> {
            let json = JsonObject::new();
            json.set("name", self.name.as_str());
            json.set("hp", self.hp);
            Some(json)
        }

        fn apply_json(&mut self, data: &JsonObject) {
            self.name = data.get("name").as_string("");
            self.hp = data.get("hp").as_int(0);
        }

        fn instantiate() -> Option<Self> {
            Some(Self::default())
        }
    }

    struct Orphan {
        tag: i64,
    }

    impl SelfDescribing for Orphan {
        fn to_json(&self) -> Option<JsonObject> {
            None
        }

        fn apply_json(&mut self, data: &JsonObject) {
            self.tag = data.get("tag").as_int(0);
        }
        // No `instantiate`: an instance must come from the caller.
    }

    fn creature_data() -> JsonObject {
        let data = JsonObject::new();
        data.set("name", "imp");
        data.set("hp", 12);
        data
    }

    #[test]
    fn capability_deserialization_constructs_and_populates() {
        let engine = Engine::new();
        let creature: Creature = engine.deserialize(&creature_data(), None).unwrap();
        assert_eq!(
            creature,
            Creature {
                name: "imp".into(),
                hp: 12
            }
        );
    }

    #[test]
    fn caller_instances_are_populated_in_place() {
        let engine = Engine::new();
        let orphan = engine
            .deserialize(
                &{
                    let data = JsonObject::new();
                    data.set("tag", 9);
                    data
                },
                Some(Orphan { tag: 0 }),
            )
            .unwrap();
        assert_eq!(orphan.tag, 9);
    }

    #[test]
    fn missing_instance_fails_recoverably() {
        let engine = Engine::new();
        assert!(engine.deserialize::<Orphan>(&JsonObject::new(), None).is_none());
    }

    #[test]
    fn adaptors_outrank_the_capability() {
        let mut engine = Engine::new();
        engine.register::<Creature>(
            None,
            Some(Rc::new(|_: &JsonObject| {
                Some(OpaqueValue::new(Creature {
                    name: "adapted".into(),
                    hp: 1,
                }))
            })),
        );
        let creature: Creature = engine.deserialize(&creature_data(), None).unwrap();
        assert_eq!(creature.name, "adapted");
    }

    #[test]
    fn opaque_deserialization_misses_quietly() {
        let engine = Engine::new();
        assert!(engine
            .deserialize_opaque(TypeId::of::<Creature>(), &creature_data())
            .is_none());
    }
}
