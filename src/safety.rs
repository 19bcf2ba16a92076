//! Pre-serialization safety checks.

use crate::serializer::SerializeOptions;
use crate::value::JsonValue;

/// Identity of a node on the visit stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeId {
    Object(usize),
    Array(usize),
    Opaque(usize),
}

/// Depth-first cycle detector over the document tree.
///
/// Containers are pushed onto an identity stack before their children are
/// visited and popped afterwards; revisiting a container already on the
/// stack is a cycle. An opaque host value is only matched against the stack
/// by its own identity and never descended into, so a cycle hidden inside a
/// host value's own fields is invisible here. Documented limitation.
pub struct CycleChecker {
    stack: Vec<NodeId>,
}

impl CycleChecker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(16),
        }
    }

    /// Returns true when the tree reachable from `root` contains a cycle.
    /// Scalars are always safe.
    #[must_use]
    pub fn is_unsafe(root: &JsonValue) -> bool {
        Self::new().visit(root)
    }

    fn visit(&mut self, value: &JsonValue) -> bool {
        match value {
            JsonValue::Object(object) => {
                let id = NodeId::Object(object.address());
                if self.stack.contains(&id) {
                    return true;
                }
                self.stack.push(id);
                for (_, child) in object.entries() {
                    if self.visit(&child) {
                        return true;
                    }
                }
                self.stack.pop();
                false
            }
            JsonValue::Array(array) => {
                let id = NodeId::Array(array.address());
                if self.stack.contains(&id) {
                    return true;
                }
                self.stack.push(id);
                for item in array.items() {
                    if self.visit(&item) {
                        return true;
                    }
                }
                self.stack.pop();
                false
            }
            // Shallow containment only.
            JsonValue::Opaque(opaque) => self.stack.contains(&NodeId::Opaque(opaque.address())),
            _ => false,
        }
    }
}

impl Default for CycleChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// The gate the serializer runs before rendering. Returns true when the
/// document may be rendered under the given options; failures are reported
/// through the log collaborator, the caller turns them into the hard error.
#[must_use]
pub fn is_render_safe(root: &JsonValue, options: &SerializeOptions) -> bool {
    if options.ignore_safety_checks {
        return true;
    }
    if !options.ignore_circular_reference && CycleChecker::is_unsafe(root) {
        log::error!("serialize: document failed the circular reference check");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OpaqueValue;
    use crate::value::{JsonArray, JsonObject};

    #[test]
    fn scalars_are_safe() {
        assert!(!CycleChecker::is_unsafe(&JsonValue::Null));
        assert!(!CycleChecker::is_unsafe(&JsonValue::from("text")));
    }

    #[test]
    fn direct_self_embedding_is_a_cycle() {
        let object = JsonObject::new();
        object.set("me", object.clone());
        assert!(CycleChecker::is_unsafe(&JsonValue::Object(object)));
    }

    #[test]
    fn nested_self_embedding_is_a_cycle() {
        let outer = JsonObject::new();
        let inner = JsonArray::new();
        inner.push(outer.clone());
        outer.set("inner", inner);
        assert!(CycleChecker::is_unsafe(&JsonValue::Object(outer)));
    }

    #[test]
    fn shared_but_acyclic_containers_are_safe() {
        // The same leaf twice is aliasing, not a cycle: it leaves the stack
        // before its second visit begins.
        let leaf = JsonObject::new();
        leaf.set("k", 1);
        let root = JsonArray::new();
        root.push(leaf.clone());
        root.push(leaf);
        assert!(!CycleChecker::is_unsafe(&JsonValue::Array(root)));
    }

    #[test]
    fn opaque_values_are_not_descended_into() {
        // A host value whose own field aliases a containing object: the
        // checker cannot see through the opaque boundary.
        struct Holder {
            _inner: JsonObject,
        }
        let outer = JsonObject::new();
        outer.set(
            "holder",
            OpaqueValue::new(Holder {
                _inner: outer.clone(),
            }),
        );
        assert!(!CycleChecker::is_unsafe(&JsonValue::Object(outer)));
    }

    #[test]
    fn gate_honours_the_permissive_default() {
        let object = JsonObject::new();
        object.set("me", object.clone());
        let cyclic = JsonValue::Object(object);

        assert!(is_render_safe(&cyclic, &SerializeOptions::default()));
        assert!(!is_render_safe(&cyclic, &SerializeOptions::checked()));
        assert!(is_render_safe(
            &cyclic,
            &SerializeOptions {
                ignore_safety_checks: false,
                ignore_circular_reference: true,
                ..SerializeOptions::default()
            }
        ));
    }
}
