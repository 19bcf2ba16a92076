//! Rendering the document tree to JSON text.
//!
//! Rendering is non-pretty and recursive. Model-native nodes render
//! directly; opaque host values go through the strategy chain in fixed
//! order (adaptor registry, self-describing capability, reflective mapper)
//! and degrade to an escaped textual fallback when every strategy declines.
//! Rendering an unknown shape never fails; the only refusal is the safety
//! gate, which runs before rendering starts.

use std::cell::RefCell;
use std::fmt::Write as _;

use crate::adaptor::AdaptorRegistry;
use crate::host::OpaqueValue;
use crate::reflect::{self, DescriptorCache};
use crate::value::{JsonArray, JsonObject, JsonValue};

/// Options that shape one serialization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Skips every pre-render safety check. **Set in the `Default`
    /// configuration**: callers opt *in* to cycle detection, not out of it.
    pub ignore_safety_checks: bool,
    /// Skips only the circular-reference check when safety checks run.
    pub ignore_circular_reference: bool,
    /// Emits characters outside printable ASCII as-is instead of `\uXXXX`.
    /// The short escapes for quotes, backslashes and control characters
    /// still apply.
    pub ignore_unicode_encode: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            ignore_safety_checks: true,
            ignore_circular_reference: false,
            ignore_unicode_encode: false,
        }
    }
}

impl SerializeOptions {
    /// The default options with the safety checks switched on.
    #[must_use]
    pub fn checked() -> Self {
        Self {
            ignore_safety_checks: false,
            ..Self::default()
        }
    }
}

pub(crate) struct Serializer<'a> {
    out: String,
    adaptors: &'a AdaptorRegistry,
    descriptors: &'a RefCell<DescriptorCache>,
    options: SerializeOptions,
}

impl<'a> Serializer<'a> {
    pub(crate) fn render(
        value: &JsonValue,
        adaptors: &'a AdaptorRegistry,
        descriptors: &'a RefCell<DescriptorCache>,
        options: SerializeOptions,
    ) -> String {
        let mut serializer = Serializer {
            out: String::new(),
            adaptors,
            descriptors,
            options,
        };
        serializer.process(value);
        serializer.out
    }

    fn process(&mut self, value: &JsonValue) {
        match value {
            JsonValue::Null => self.out.push_str("null"),
            JsonValue::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            JsonValue::Int(i) => {
                let _ = write!(self.out, "{i}");
            }
            JsonValue::Float(f) => {
                // Lowercase textual form, so non-finite floats render as
                // `nan` / `inf` rather than their display casing.
                self.out.push_str(&f.to_string().to_ascii_lowercase());
            }
            JsonValue::Text(s) => self.append_quoted(s),
            JsonValue::Object(object) => self.serialize_object(object),
            JsonValue::Array(array) => self.serialize_array(array),
            JsonValue::Opaque(opaque) => self.serialize_opaque(opaque),
        }
    }

    fn serialize_object(&mut self, object: &JsonObject) {
        self.out.push('{');
        let mut first = true;
        for (key, value) in object.entries() {
            if !first {
                self.out.push(',');
            }
            // Keys are emitted verbatim, not escaped. Known limitation.
            self.out.push('"');
            self.out.push_str(&key);
            self.out.push_str("\":");
            self.process(&value);
            first = false;
        }
        self.out.push('}');
    }

    fn serialize_array(&mut self, array: &JsonArray) {
        self.out.push('[');
        let mut first = true;
        for item in array.items() {
            if !first {
                self.out.push(',');
            }
            self.process(&item);
            first = false;
        }
        self.out.push(']');
    }

    /// The strategy chain, in fixed order. Each strategy may decline by
    /// producing nothing, handing the value to the next one.
    fn serialize_opaque(&mut self, opaque: &OpaqueValue) {
        if let Some(object) = self.adaptors.serialize(opaque.type_id(), opaque.as_any()) {
            return self.serialize_object(&object);
        }
        if let Some(shape) = opaque.describe().and_then(|d| d.to_json()) {
            return self.serialize_object(&shape);
        }
        if let Some(provider) = opaque.descriptor_provider() {
            let descriptor = provider(&mut self.descriptors.borrow_mut());
            let object = reflect::map_to_object(&descriptor, opaque.as_any());
            return self.serialize_object(&object);
        }
        self.append_quoted(opaque.type_name());
    }

    fn append_quoted(&mut self, text: &str) {
        self.out.push('"');
        self.append_escaped(text);
        self.out.push('"');
    }

    fn append_escaped(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\u{8}' => self.out.push_str("\\b"),
                '\u{c}' => self.out.push_str("\\f"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if (' '..='~').contains(&c) => self.out.push(c),
                c if self.options.ignore_unicode_encode => self.out.push(c),
                c => {
                    // One escape per UTF-16 code unit, so characters beyond
                    // the basic plane become surrogate pairs.
                    let mut units = [0u16; 2];
                    for unit in c.encode_utf16(&mut units) {
                        let _ = write!(self.out, "\\u{unit:04x}");
                    }
                }
            }
        }
    }
}

/// Renders with default options and no registered adaptors; opaque values
/// fall back to their wrap-time capabilities. Backs the `Display` impls and
/// the textual container views. Assumes an acyclic tree.
pub(crate) fn render_detached(value: &JsonValue) -> String {
    let adaptors = AdaptorRegistry::default();
    let descriptors = RefCell::new(DescriptorCache::new());
    Serializer::render(value, &adaptors, &descriptors, SerializeOptions::default())
}
