//! Opaque host values: anything handed to the engine that is not part of the
//! document model, plus the capabilities a host type can carry into the
//! serializer's strategy chain.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::rc::Rc;

use crate::reflect::{provider_of, DescriptorProvider, Introspect};
use crate::value::JsonObject;

/// An opt-in capability letting a host type control its own JSON shape.
///
/// Ranks below the adaptor registry and above the reflective mapper in the
/// serializer's strategy chain.
pub trait SelfDescribing: Any {
    /// Produce the JSON shape of `self`. Returning `None` declines, and the
    /// serializer falls through to the next strategy.
    fn to_json(&self) -> Option<JsonObject>;

    /// Populate `self` from a parsed object.
    fn apply_json(&mut self, data: &JsonObject);

    /// Stand-in for a parameterless constructor, used when deserialization
    /// needs an instance and the caller supplied none. Types that can be
    /// built from nothing override this, usually forwarding to `Default`.
    fn instantiate() -> Option<Self>
    where
        Self: Sized,
    {
        None
    }
}

/// A reference to a host value, with the capabilities it was wrapped with.
///
/// Which strategies can reach a value is decided here, at wrap time: a value
/// wrapped with [`OpaqueValue::new`] is visible only to the adaptor registry
/// and the textual fallback, [`OpaqueValue::describing`] adds the
/// self-describing path, and [`OpaqueValue::introspective`] adds the
/// reflective mapper. Identity is allocation identity; cloning the wrapper
/// aliases the same host value.
#[derive(Clone)]
pub struct OpaqueValue {
    value: Rc<dyn Any>,
    type_id: TypeId,
    type_name: &'static str,
    describing: Option<Rc<dyn SelfDescribing>>,
    descriptor: Option<DescriptorProvider>,
}

impl OpaqueValue {
    /// Wraps a bare host value.
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            value: Rc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            describing: None,
            descriptor: None,
        }
    }

    /// Wraps a host value that describes its own JSON shape.
    pub fn describing<T: SelfDescribing>(value: T) -> Self {
        let value = Rc::new(value);
        Self {
            value: value.clone(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            describing: Some(value),
            descriptor: None,
        }
    }

    /// Wraps a host value that publishes a member table for the reflective
    /// mapper.
    pub fn introspective<T: Introspect>(value: T) -> Self {
        Self {
            value: Rc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            describing: None,
            descriptor: Some(provider_of::<T>),
        }
    }

    /// The exact runtime type of the wrapped value; adaptor lookup keys on
    /// this.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The wrapped type's name, doubling as the textual fallback when every
    /// strategy declines.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Typed view of the wrapped value.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Takes the wrapped value out, if this wrapper holds the only reference
    /// and the type matches.
    pub fn take<T: Any>(mut self) -> Option<T> {
        self.describing = None;
        let value = self.value.downcast::<T>().ok()?;
        Rc::try_unwrap(value).ok()
    }

    /// Whether two wrappers alias the same host allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &OpaqueValue) -> bool {
        self.address() == other.address()
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        &*self.value
    }

    pub(crate) fn describe(&self) -> Option<&dyn SelfDescribing> {
        self.describing.as_deref()
    }

    pub(crate) fn descriptor_provider(&self) -> Option<DescriptorProvider> {
        self.descriptor
    }

    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.value) as *const () as usize
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}
