//! The document model: a polymorphic value tree of scalars and shared-handle
//! containers, with best-effort coercion accessors.
//!
//! Containers are reference handles (`Rc`-backed): cloning a [`JsonObject`] or
//! [`JsonArray`] aliases the same underlying storage. This is what lets a
//! caller deliberately embed one container in two places, and, if they embed
//! it inside itself, what the safety checker exists to catch.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::host::OpaqueValue;
use crate::serializer;

/// A single node in the document tree. The variant is the type tag; no
/// separate kind field is stored.
#[derive(Debug, Clone, Default)]
pub enum JsonValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Object(JsonObject),
    Array(JsonArray),
    /// A host value that is not part of the document model, rendered through
    /// the serializer's strategy chain.
    Opaque(OpaqueValue),
}

impl JsonValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    /// Best-effort integer view. Numeric variants cross-cast, numeric text is
    /// parsed, everything else yields the caller-supplied default.
    #[must_use]
    pub fn as_int(&self, default: i64) -> i64 {
        match self {
            JsonValue::Int(i) => *i,
            JsonValue::Float(f) => *f as i64,
            JsonValue::Text(s) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Best-effort float view; same fallback rules as [`JsonValue::as_int`].
    #[must_use]
    pub fn as_float(&self, default: f64) -> f64 {
        match self {
            JsonValue::Int(i) => *i as f64,
            JsonValue::Float(f) => *f,
            JsonValue::Text(s) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Best-effort boolean view. Text matches the boolean words
    /// case-insensitively; anything else yields the default.
    #[must_use]
    pub fn as_bool(&self, default: bool) -> bool {
        match self {
            JsonValue::Bool(b) => *b,
            JsonValue::Text(s) => {
                if s.eq_ignore_ascii_case("true") {
                    true
                } else if s.eq_ignore_ascii_case("false") {
                    false
                } else {
                    default
                }
            }
            _ => default,
        }
    }

    /// Textual view of the value. Scalars render their plain form, containers
    /// render as serialized JSON, opaque values render their type name, and
    /// null yields the caller-supplied default.
    #[must_use]
    pub fn as_string(&self, default: &str) -> String {
        match self {
            JsonValue::Null => default.to_string(),
            JsonValue::Bool(b) => b.to_string(),
            JsonValue::Int(i) => i.to_string(),
            JsonValue::Float(f) => f.to_string(),
            JsonValue::Text(s) => s.clone(),
            JsonValue::Object(_) | JsonValue::Array(_) => serializer::render_detached(self),
            JsonValue::Opaque(o) => o.type_name().to_string(),
        }
    }

    /// Returns the object handle, or `None` if this is not an object.
    #[must_use]
    pub fn as_object(&self) -> Option<JsonObject> {
        match self {
            JsonValue::Object(o) => Some(o.clone()),
            _ => None,
        }
    }

    /// Returns the array handle, or `None` if this is not an array.
    #[must_use]
    pub fn as_array(&self) -> Option<JsonArray> {
        match self {
            JsonValue::Array(a) => Some(a.clone()),
            _ => None,
        }
    }

    /// Typed view of an opaque host value.
    #[must_use]
    pub fn as_host<T: Any>(&self) -> Option<&T> {
        match self {
            JsonValue::Opaque(o) => o.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Deep copy. Containers are detached into fresh storage; opaque handles
    /// stay shared (the engine cannot clone an arbitrary host value). The
    /// tree must be acyclic.
    #[must_use]
    pub fn duplicate(&self) -> JsonValue {
        match self {
            JsonValue::Object(o) => JsonValue::Object(o.duplicate()),
            JsonValue::Array(a) => JsonValue::Array(a.duplicate()),
            other => other.clone(),
        }
    }
}

/// Structural equality: scalars by value, containers element-wise (aliased
/// handles short-circuit), opaque values by allocation identity.
impl PartialEq for JsonValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsonValue::Null, JsonValue::Null) => true,
            (JsonValue::Bool(a), JsonValue::Bool(b)) => a == b,
            (JsonValue::Int(a), JsonValue::Int(b)) => a == b,
            (JsonValue::Float(a), JsonValue::Float(b)) => a == b,
            (JsonValue::Text(a), JsonValue::Text(b)) => a == b,
            (JsonValue::Object(a), JsonValue::Object(b)) => {
                a.ptr_eq(b) || a.entries() == b.entries()
            }
            (JsonValue::Array(a), JsonValue::Array(b)) => a.ptr_eq(b) || a.items() == b.items(),
            (JsonValue::Opaque(a), JsonValue::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// A JSON object: text keys mapped to values, behind a shared handle.
///
/// Key iteration order is unspecified by contract; the current storage keeps
/// keys sorted, which is what makes serialization canonical.
#[derive(Debug, Clone, Default)]
pub struct JsonObject {
    entries: Rc<RefCell<BTreeMap<String, JsonValue>>>,
}

impl JsonObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the value under `key`, or a null sentinel if the key is absent.
    #[must_use]
    pub fn get(&self, key: &str) -> JsonValue {
        self.entries
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(JsonValue::Null)
    }

    /// Inserts or overwrites the value under `key`.
    pub fn set(&self, key: &str, value: impl Into<JsonValue>) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.into());
    }

    /// Inserts only if `key` is absent; the first insertion wins. Returns
    /// whether the entry was added.
    pub fn add(&self, key: &str, value: impl Into<JsonValue>) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), value.into());
        true
    }

    /// Removes the entry under `key`; returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.borrow_mut().remove(key).is_some()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Snapshot of the current entries. Values are handle clones, so
    /// container contents stay shared with the tree.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, JsonValue)> {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Whether two handles alias the same underlying storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &JsonObject) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    /// Deep copy into fresh storage; see [`JsonValue::duplicate`].
    #[must_use]
    pub fn duplicate(&self) -> JsonObject {
        let copy = JsonObject::new();
        for (key, value) in self.entries() {
            copy.set(&key, value.duplicate());
        }
        copy
    }

    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.entries) as *const () as usize
    }
}

impl PartialEq for JsonObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.entries() == other.entries()
    }
}

/// A JSON array: a 0-indexed sequence of values behind a shared handle.
#[derive(Debug, Clone, Default)]
pub struct JsonArray {
    items: Rc<RefCell<Vec<JsonValue>>>,
}

impl JsonArray {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the value at `index`, or a null sentinel when out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> JsonValue {
        self.items
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(JsonValue::Null)
    }

    /// Writes the value at `index`, padding with null sentinels when the
    /// index is past the current length.
    pub fn set(&self, index: usize, value: impl Into<JsonValue>) {
        let mut items = self.items.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, JsonValue::Null);
        }
        items[index] = value.into();
    }

    pub fn push(&self, value: impl Into<JsonValue>) {
        self.items.borrow_mut().push(value.into());
    }

    /// Inserts at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, value: impl Into<JsonValue>) {
        let mut items = self.items.borrow_mut();
        let index = index.min(items.len());
        items.insert(index, value.into());
    }

    /// Removes the value at `index`; returns whether it existed.
    pub fn remove_at(&self, index: usize) -> bool {
        let mut items = self.items.borrow_mut();
        if index >= items.len() {
            return false;
        }
        items.remove(index);
        true
    }

    #[must_use]
    pub fn index_of(&self, value: &JsonValue) -> Option<usize> {
        self.items.borrow().iter().position(|item| item == value)
    }

    #[must_use]
    pub fn contains(&self, value: &JsonValue) -> bool {
        self.index_of(value).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.items.borrow_mut().clear();
    }

    /// Snapshot of the current items; see [`JsonObject::entries`].
    #[must_use]
    pub fn items(&self) -> Vec<JsonValue> {
        self.items.borrow().clone()
    }

    /// Whether two handles alias the same underlying storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &JsonArray) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }

    /// Deep copy into fresh storage; see [`JsonValue::duplicate`].
    #[must_use]
    pub fn duplicate(&self) -> JsonArray {
        let copy = JsonArray::new();
        for item in self.items() {
            copy.push(item.duplicate());
        }
        copy
    }

    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.items) as *const () as usize
    }
}

impl PartialEq for JsonArray {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.items() == other.items()
    }
}

// --- Conversions into JsonValue, one per primitive kind ---

impl From<bool> for JsonValue {
    fn from(value: bool) -> Self {
        JsonValue::Bool(value)
    }
}

impl From<i32> for JsonValue {
    fn from(value: i32) -> Self {
        JsonValue::Int(i64::from(value))
    }
}

impl From<i64> for JsonValue {
    fn from(value: i64) -> Self {
        JsonValue::Int(value)
    }
}

impl From<f32> for JsonValue {
    fn from(value: f32) -> Self {
        JsonValue::Float(f64::from(value))
    }
}

impl From<f64> for JsonValue {
    fn from(value: f64) -> Self {
        JsonValue::Float(value)
    }
}

impl From<&str> for JsonValue {
    fn from(value: &str) -> Self {
        JsonValue::Text(value.to_string())
    }
}

impl From<String> for JsonValue {
    fn from(value: String) -> Self {
        JsonValue::Text(value)
    }
}

impl From<JsonObject> for JsonValue {
    fn from(value: JsonObject) -> Self {
        JsonValue::Object(value)
    }
}

impl From<JsonArray> for JsonValue {
    fn from(value: JsonArray) -> Self {
        JsonValue::Array(value)
    }
}

impl From<OpaqueValue> for JsonValue {
    fn from(value: OpaqueValue) -> Self {
        JsonValue::Opaque(value)
    }
}

impl<T: Into<JsonValue>> From<Option<T>> for JsonValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(JsonValue::Null, Into::into)
    }
}

// --- Conversions out of JsonValue, mirroring the coercion accessors ---

impl From<JsonValue> for i32 {
    fn from(value: JsonValue) -> Self {
        value.as_int(0) as i32
    }
}

impl From<JsonValue> for i64 {
    fn from(value: JsonValue) -> Self {
        value.as_int(0)
    }
}

impl From<JsonValue> for f32 {
    fn from(value: JsonValue) -> Self {
        value.as_float(0.0) as f32
    }
}

impl From<JsonValue> for f64 {
    fn from(value: JsonValue) -> Self {
        value.as_float(0.0)
    }
}

impl From<JsonValue> for bool {
    fn from(value: JsonValue) -> Self {
        value.as_bool(false)
    }
}

impl From<JsonValue> for String {
    fn from(value: JsonValue) -> Self {
        value.as_string("")
    }
}

// --- Rendering ---

/// Renders the serialized text with default options and no registered
/// adaptors. Opaque values fall back to their wrap-time capabilities.
impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serializer::render_detached(self))
    }
}

impl fmt::Display for JsonObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&JsonValue::Object(self.clone()), f)
    }
}

impl fmt::Display for JsonArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&JsonValue::Array(self.clone()), f)
    }
}

// --- serde interop ---

/// Model-native serde view. Opaque values serialize as their type name; the
/// strategy chain only runs through an [`crate::api::Engine`].
impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonValue::Null => serializer.serialize_unit(),
            JsonValue::Bool(b) => serializer.serialize_bool(*b),
            JsonValue::Int(i) => serializer.serialize_i64(*i),
            JsonValue::Float(f) => serializer.serialize_f64(*f),
            JsonValue::Text(s) => serializer.serialize_str(s),
            JsonValue::Object(o) => {
                let entries = o.entries();
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in &entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            JsonValue::Array(a) => {
                let items = a.items();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in &items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            JsonValue::Opaque(o) => serializer.serialize_str(o.type_name()),
        }
    }
}

impl From<&serde_json::Value> for JsonValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => JsonValue::Null,
            serde_json::Value::Bool(b) => JsonValue::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(JsonValue::Int)
                .unwrap_or_else(|| JsonValue::Float(n.as_f64().unwrap_or(0.0))),
            serde_json::Value::String(s) => JsonValue::Text(s.clone()),
            serde_json::Value::Array(items) => {
                let array = JsonArray::new();
                for item in items {
                    array.push(JsonValue::from(item));
                }
                JsonValue::Array(array)
            }
            serde_json::Value::Object(map) => {
                let object = JsonObject::new();
                for (key, item) in map {
                    object.set(key, JsonValue::from(item));
                }
                JsonValue::Object(object)
            }
        }
    }
}

impl From<&JsonValue> for serde_json::Value {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => serde_json::Value::Null,
            JsonValue::Bool(b) => serde_json::Value::Bool(*b),
            JsonValue::Int(i) => serde_json::Value::Number((*i).into()),
            JsonValue::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            JsonValue::Text(s) => serde_json::Value::String(s.clone()),
            JsonValue::Object(o) => {
                let mut map = serde_json::Map::new();
                for (key, item) in o.entries() {
                    map.insert(key, serde_json::Value::from(&item));
                }
                serde_json::Value::Object(map)
            }
            JsonValue::Array(a) => serde_json::Value::Array(
                a.items().iter().map(serde_json::Value::from).collect(),
            ),
            JsonValue::Opaque(o) => serde_json::Value::String(o.type_name().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_text_coerces_to_int() {
        assert_eq!(JsonValue::from("42").as_int(0), 42);
        assert_eq!(JsonValue::from("abc").as_int(-7), -7);
    }

    #[test]
    fn numeric_cross_casts() {
        assert_eq!(JsonValue::Float(3.9).as_int(0), 3);
        assert_eq!(JsonValue::Int(3).as_float(0.0), 3.0);
        assert_eq!(JsonValue::from("2.5").as_float(0.0), 2.5);
    }

    #[test]
    fn boolean_words_match_case_insensitively() {
        assert!(JsonValue::from("TRUE").as_bool(false));
        assert!(!JsonValue::from("False").as_bool(true));
        assert!(JsonValue::from("maybe").as_bool(true));
    }

    #[test]
    fn null_string_view_uses_default() {
        assert_eq!(JsonValue::Null.as_string("fallback"), "fallback");
        assert_eq!(JsonValue::Int(5).as_string(""), "5");
    }

    #[test]
    fn add_keeps_first_insertion() {
        let object = JsonObject::new();
        assert!(object.add("k", 1));
        assert!(!object.add("k", 2));
        assert_eq!(object.get("k").as_int(0), 1);

        object.set("k", 2);
        assert_eq!(object.get("k").as_int(0), 2);
    }

    #[test]
    fn missing_key_reads_null() {
        let object = JsonObject::new();
        assert!(object.get("absent").is_null());
    }

    #[test]
    fn array_set_pads_with_nulls() {
        let array = JsonArray::new();
        array.set(3, "x");
        assert_eq!(array.len(), 4);
        assert!(array.get(0).is_null());
        assert_eq!(array.get(3).as_string(""), "x");
        assert!(array.get(99).is_null());
    }

    #[test]
    fn clones_alias_storage() {
        let object = JsonObject::new();
        let alias = object.clone();
        alias.set("k", true);
        assert!(object.get("k").as_bool(false));
        assert!(object.ptr_eq(&alias));
    }

    #[test]
    fn duplicate_detaches_storage() {
        let object = JsonObject::new();
        object.set("k", 1);
        let copy = object.duplicate();
        copy.set("k", 2);
        assert_eq!(object.get("k").as_int(0), 1);
        assert!(!object.ptr_eq(&copy));
    }

    #[test]
    fn structural_equality() {
        let a = JsonArray::new();
        a.push(1);
        a.push("two");
        let b = JsonArray::new();
        b.push(1);
        b.push("two");
        assert_eq!(JsonValue::Array(a), JsonValue::Array(b));
        assert_ne!(JsonValue::Int(1), JsonValue::Float(1.0));
    }

    #[test]
    fn serde_json_round_trip() {
        let source = serde_json::json!({"a": 1, "b": [true, null], "c": {"d": 2.5}});
        let value = JsonValue::from(&source);
        assert_eq!(value.as_object().unwrap().len(), 3);
        assert_eq!(serde_json::Value::from(&value), source);
    }
}
