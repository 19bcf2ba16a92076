//! The reflective mapper: the lowest-ranked serialization strategy, deriving
//! a JSON shape from a type's declared member table.
//!
//! There is no runtime introspection to lean on, so a host type publishes an
//! explicit [`MemberTable`] through [`Introspect`]. The table states facts
//! about each member (name, category, visibility, markers, accessor); the
//! *rules* (opt-in for non-public members, opt-out for public ones,
//! sequence/scalar filing, constant exclusion) live here, in the descriptor
//! builder. Descriptors are built once per engine and cached by `TypeId`.
//!
//! This path is serialize-only. The reverse direction exists only through
//! the adaptor registry and the self-describing capability.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::{JsonArray, JsonObject, JsonValue};

/// Implemented by host types that publish a member table for the reflective
/// mapper.
pub trait Introspect: Any {
    fn member_table() -> MemberTable
    where
        Self: Sized;
}

/// Produces the cached descriptor for a type. Captured as a plain function
/// pointer so an [`crate::host::OpaqueValue`] can carry it without generics.
pub type DescriptorProvider = fn(&mut DescriptorCache) -> Rc<TypeDescriptor>;

pub(crate) fn provider_of<T: Introspect>(cache: &mut DescriptorCache) -> Rc<TypeDescriptor> {
    cache.descriptor_of::<T>()
}

/// The declared member set of one host type.
#[derive(Default)]
pub struct MemberTable {
    ignore: bool,
    members: Vec<MemberSpec>,
}

impl MemberTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A whole-type opt-out: discovery is short-circuited and values of this
    /// type map to an empty object. Members of this type are excluded from
    /// other descriptors as well.
    #[must_use]
    pub fn ignored() -> Self {
        Self {
            ignore: true,
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn member(mut self, spec: MemberSpec) -> Self {
        self.members.push(spec);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
    Public,
    NonPublic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Allow,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Field,
    Property,
}

enum Accessor {
    Scalar(Box<dyn Fn(&dyn Any) -> JsonValue>),
    Sequence(Box<dyn Fn(&dyn Any) -> Vec<JsonValue>>),
}

/// One declared member. Constructors fix the name, category and accessor;
/// the builder methods state visibility and markers.
pub struct MemberSpec {
    name: &'static str,
    category: Category,
    visibility: Visibility,
    marker: Option<Marker>,
    constant: bool,
    declared: Option<DescriptorProvider>,
    accessor: Option<Accessor>,
}

impl MemberSpec {
    fn with_accessor(name: &'static str, category: Category, accessor: Option<Accessor>) -> Self {
        Self {
            name,
            category,
            visibility: Visibility::Public,
            marker: None,
            constant: false,
            declared: None,
            accessor,
        }
    }

    /// A scalar field, read through `get`.
    pub fn field<T, F>(name: &'static str, get: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> JsonValue + 'static,
    {
        Self::with_accessor(
            name,
            Category::Field,
            Some(Accessor::Scalar(Box::new(move |host: &dyn Any| {
                host.downcast_ref::<T>().map_or(JsonValue::Null, &get)
            }))),
        )
    }

    /// A sequence-shaped field; elements are wrapped one by one into the
    /// emitted array.
    pub fn sequence_field<T, F>(name: &'static str, get: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Vec<JsonValue> + 'static,
    {
        Self::with_accessor(
            name,
            Category::Field,
            Some(Accessor::Sequence(Box::new(move |host: &dyn Any| {
                host.downcast_ref::<T>().map(&get).unwrap_or_default()
            }))),
        )
    }

    /// A scalar property, read through `get`.
    pub fn property<T, F>(name: &'static str, get: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> JsonValue + 'static,
    {
        Self::with_accessor(
            name,
            Category::Property,
            Some(Accessor::Scalar(Box::new(move |host: &dyn Any| {
                host.downcast_ref::<T>().map_or(JsonValue::Null, &get)
            }))),
        )
    }

    /// A sequence-shaped property.
    pub fn sequence_property<T, F>(name: &'static str, get: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Vec<JsonValue> + 'static,
    {
        Self::with_accessor(
            name,
            Category::Property,
            Some(Accessor::Sequence(Box::new(move |host: &dyn Any| {
                host.downcast_ref::<T>().map(&get).unwrap_or_default()
            }))),
        )
    }

    /// A property with no independently reachable getter (indexed or
    /// write-only). Always skipped by the builder.
    #[must_use]
    pub fn indexed_property(name: &'static str) -> Self {
        Self::with_accessor(name, Category::Property, None)
    }

    /// Marks the member as not publicly visible; such members need
    /// [`MemberSpec::allow`] to be serialized.
    #[must_use]
    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    /// Explicit opt-in marker.
    #[must_use]
    pub fn allow(mut self) -> Self {
        self.marker = Some(Marker::Allow);
        self
    }

    /// Explicit opt-out marker.
    #[must_use]
    pub fn ignore(mut self) -> Self {
        self.marker = Some(Marker::Ignore);
        self
    }

    /// Marks a compile-time constant; constants are never serialized.
    #[must_use]
    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    /// Records the member's declared type, so a member of a whole-type
    /// ignored type can be excluded.
    #[must_use]
    pub fn of<U: Introspect>(mut self) -> Self {
        self.declared = Some(provider_of::<U>);
        self
    }
}

pub struct ScalarMember {
    pub name: &'static str,
    get: Box<dyn Fn(&dyn Any) -> JsonValue>,
}

pub struct SequenceMember {
    pub name: &'static str,
    get: Box<dyn Fn(&dyn Any) -> Vec<JsonValue>>,
}

/// The cached, already-filtered view of one host type: the four member lists
/// the serializer visits, in order, plus the whole-type ignore flag.
pub struct TypeDescriptor {
    pub type_name: &'static str,
    pub ignored: bool,
    pub scalar_fields: Vec<ScalarMember>,
    pub sequence_fields: Vec<SequenceMember>,
    pub scalar_properties: Vec<ScalarMember>,
    pub sequence_properties: Vec<SequenceMember>,
}

impl TypeDescriptor {
    fn empty(type_name: &'static str, ignored: bool) -> Self {
        Self {
            type_name,
            ignored,
            scalar_fields: Vec::new(),
            sequence_fields: Vec::new(),
            scalar_properties: Vec::new(),
            sequence_properties: Vec::new(),
        }
    }

    /// Total member count across the four lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scalar_fields.len()
            + self.sequence_fields.len()
            + self.scalar_properties.len()
            + self.sequence_properties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compiler-generated (unnameable) types announce themselves in their type
/// name. Such inline shapes skip the marker rules entirely: every readable
/// member is included.
const INLINE_TYPE_MARKER: &str = "{{closure}}";

fn is_inline_shaped(type_name: &str) -> bool {
    type_name.contains(INLINE_TYPE_MARKER)
}

/// Per-engine descriptor store, keyed by `TypeId`. Descriptors are built on
/// first encounter and kept until [`DescriptorCache::clear`].
#[derive(Default)]
pub struct DescriptorCache {
    entries: HashMap<TypeId, Rc<TypeDescriptor>>,
}

impl DescriptorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor_of<T: Introspect>(&mut self) -> Rc<TypeDescriptor> {
        let id = TypeId::of::<T>();
        if let Some(descriptor) = self.entries.get(&id) {
            return descriptor.clone();
        }
        self.build(id, type_name::<T>(), T::member_table())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn build(
        &mut self,
        id: TypeId,
        type_name: &'static str,
        table: MemberTable,
    ) -> Rc<TypeDescriptor> {
        // Register a provisional entry first, so a member whose declared
        // type is the type under construction resolves without recursing.
        let provisional = Rc::new(TypeDescriptor::empty(type_name, table.ignore));
        self.entries.insert(id, provisional.clone());
        if table.ignore {
            return provisional;
        }

        let inline = is_inline_shaped(type_name);
        let mut descriptor = TypeDescriptor::empty(type_name, false);
        for spec in table.members {
            let Some(accessor) = spec.accessor else {
                continue;
            };
            if !inline {
                if spec.constant {
                    continue;
                }
                if let Some(declared) = spec.declared {
                    if declared(self).ignored {
                        continue;
                    }
                }
                let included = match spec.visibility {
                    Visibility::NonPublic => spec.marker == Some(Marker::Allow),
                    Visibility::Public => spec.marker != Some(Marker::Ignore),
                };
                if !included {
                    continue;
                }
            }
            match (spec.category, accessor) {
                (Category::Field, Accessor::Scalar(get)) => descriptor
                    .scalar_fields
                    .push(ScalarMember { name: spec.name, get }),
                (Category::Field, Accessor::Sequence(get)) => descriptor
                    .sequence_fields
                    .push(SequenceMember { name: spec.name, get }),
                (Category::Property, Accessor::Scalar(get)) => descriptor
                    .scalar_properties
                    .push(ScalarMember { name: spec.name, get }),
                (Category::Property, Accessor::Sequence(get)) => descriptor
                    .sequence_properties
                    .push(SequenceMember { name: spec.name, get }),
            }
        }

        let descriptor = Rc::new(descriptor);
        self.entries.insert(id, descriptor.clone());
        descriptor
    }
}

/// Maps a host value to an object through its descriptor: scalar fields,
/// sequence fields, scalar properties, sequence properties, in that order.
/// An ignored type maps to an empty object.
pub(crate) fn map_to_object(descriptor: &TypeDescriptor, host: &dyn Any) -> JsonObject {
    let json = JsonObject::new();
    if descriptor.ignored {
        return json;
    }
    for member in &descriptor.scalar_fields {
        json.set(member.name, (member.get)(host));
    }
    for member in &descriptor.sequence_fields {
        let array = JsonArray::new();
        for element in (member.get)(host) {
            array.push(element);
        }
        json.set(member.name, array);
    }
    for member in &descriptor.scalar_properties {
        json.set(member.name, (member.get)(host));
    }
    for member in &descriptor.sequence_properties {
        let array = JsonArray::new();
        for element in (member.get)(host) {
            array.push(element);
        }
        json.set(member.name, array);
    }
    json
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Creature {
        name: String,
        hp: i64,
        secret: i64,
        tags: Vec<String>,
    }

    impl Introspect for Creature {
        fn member_table() -> MemberTable {
            MemberTable::new()
                .member(MemberSpec::field("name", |c: &Creature| {
                    JsonValue::from(c.name.as_str())
                }))
                .member(MemberSpec::field("hp", |c: &Creature| JsonValue::from(c.hp)))
                .member(
                    MemberSpec::field("secret", |c: &Creature| JsonValue::from(c.secret))
                        .non_public(),
                )
                .member(MemberSpec::sequence_field("tags", |c: &Creature| {
                    c.tags.iter().map(|t| JsonValue::from(t.as_str())).collect()
                }))
        }
    }

    struct Shadow;

    impl Introspect for Shadow {
        fn member_table() -> MemberTable {
            MemberTable::ignored()
        }
    }

    struct Carrier {
        visible: i64,
        hidden: i64,
        shadow_link: i64,
    }

    impl Introspect for Carrier {
        fn member_table() -> MemberTable {
            MemberTable::new()
                .member(MemberSpec::field("visible", |c: &Carrier| {
                    JsonValue::from(c.visible)
                }))
                .member(
                    MemberSpec::field("hidden", |c: &Carrier| JsonValue::from(c.hidden)).ignore(),
                )
                .member(
                    MemberSpec::field("shadow_link", |c: &Carrier| {
                        JsonValue::from(c.shadow_link)
                    })
                    .of::<Shadow>(),
                )
                .member(MemberSpec::field("VERSION", |_: &Carrier| JsonValue::Int(1)).constant())
                .member(MemberSpec::indexed_property("items"))
        }
    }

    fn sample() -> Creature {
        Creature {
            name: "imp".into(),
            hp: 12,
            secret: 99,
            tags: vec!["small".into(), "fiend".into()],
        }
    }

    #[test]
    fn non_public_members_need_opt_in() {
        let mut cache = DescriptorCache::new();
        let descriptor = cache.descriptor_of::<Creature>();
        assert_eq!(descriptor.len(), 3);

        let json = map_to_object(&descriptor, &sample());
        assert!(json.get("secret").is_null());
        assert_eq!(json.get("hp").as_int(0), 12);
    }

    #[test]
    fn opt_out_constant_and_getterless_members_are_excluded() {
        let mut cache = DescriptorCache::new();
        let descriptor = cache.descriptor_of::<Carrier>();
        // `visible` survives; the rest are filtered for four different
        // reasons.
        assert_eq!(descriptor.len(), 1);
        assert_eq!(descriptor.scalar_fields[0].name, "visible");
    }

    #[test]
    fn sequence_members_file_separately() {
        let mut cache = DescriptorCache::new();
        let descriptor = cache.descriptor_of::<Creature>();
        assert_eq!(descriptor.sequence_fields.len(), 1);

        let json = map_to_object(&descriptor, &sample());
        let tags = json.get("tags").as_array().expect("array member");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get(1).as_string(""), "fiend");
    }

    #[test]
    fn ignored_types_map_to_empty_objects() {
        let mut cache = DescriptorCache::new();
        let descriptor = cache.descriptor_of::<Shadow>();
        assert!(descriptor.ignored);
        assert!(map_to_object(&descriptor, &Shadow).is_empty());
    }

    #[test]
    fn descriptors_are_cached_until_cleared() {
        let mut cache = DescriptorCache::new();
        let first = cache.descriptor_of::<Creature>();
        let second = cache.descriptor_of::<Creature>();
        assert!(Rc::ptr_eq(&first, &second));

        cache.clear();
        assert!(cache.is_empty());
        let rebuilt = cache.descriptor_of::<Creature>();
        assert!(!Rc::ptr_eq(&first, &rebuilt));
    }

    #[test]
    fn inline_shaped_names_relax_the_marker_rules() {
        struct Probe {
            inner: i64,
        }
        let table = MemberTable::new()
            .member(
                MemberSpec::field("inner", |p: &Probe| JsonValue::from(p.inner))
                    .non_public(),
            )
            .member(MemberSpec::indexed_property("skipped"));

        let mut cache = DescriptorCache::new();
        let descriptor = cache.build(
            TypeId::of::<Probe>(),
            "reflect::tests::{{closure}}::Probe",
            table,
        );
        // No opt-in marker, still included; the getter-less member stays out.
        assert_eq!(descriptor.len(), 1);
        let json = map_to_object(&descriptor, &Probe { inner: 4 });
        assert_eq!(json.get("inner").as_int(0), 4);
    }

    #[test]
    fn self_referential_declared_types_terminate() {
        struct Node {
            weight: i64,
        }
        impl Introspect for Node {
            fn member_table() -> MemberTable {
                MemberTable::new().member(
                    MemberSpec::field("weight", |n: &Node| JsonValue::from(n.weight)).of::<Node>(),
                )
            }
        }

        let mut cache = DescriptorCache::new();
        let descriptor = cache.descriptor_of::<Node>();
        assert_eq!(descriptor.len(), 1);
    }
}
