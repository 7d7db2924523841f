//! Compiled, immutable mapping metadata.
//!
//! Each [`ClassMetadata`] owns a flat arena of [`PropertyMetadata`]. Dotted
//! property paths become a tree inside that arena: an intermediate entry per
//! shared prefix, with the leaf entries as its children. Nested graphs are
//! referenced by [`ClassId`], so recursive schemas compile to cyclic id
//! references instead of cyclic ownership.

mod builder;

use std::any::TypeId;
use std::sync::Arc;

use crate::{
    ObjectGraph, PropertyAccessor, PropertyUse, SchemaError, TypeDescriptor, TypeRegistry,
    ValueType,
};

/// Index of a class inside its [`GraphMetadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

impl ClassId {
    /// Position in [`GraphMetadata::classes`].
    pub fn index(self) -> usize {
        self.0
    }
}

/// The compiled form of a [`GraphSchema`](crate::GraphSchema).
#[derive(Debug)]
pub struct GraphMetadata {
    classes: Vec<ClassMetadata>,
    root: RootMetadata,
}

/// What a document's root element holds.
#[derive(Debug, Clone)]
pub enum RootMetadata {
    /// A single object of this class.
    Class(ClassId),
    /// A sequence of objects under a collection element.
    Collection(CollectionMetadata),
}

/// Compiled [`ObjectCollection`](crate::ObjectCollection).
#[derive(Debug, Clone)]
pub struct CollectionMetadata {
    name: String,
    container: Option<String>,
    classes: Vec<ClassId>,
}

impl CollectionMetadata {
    /// Element name of the collection root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the container type, if the schema gave one.
    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    /// Classes allowed as items.
    pub fn classes(&self) -> &[ClassId] {
        &self.classes
    }
}

impl GraphMetadata {
    /// Compiles `schema` against the types in `types`.
    pub fn build(schema: &crate::GraphSchema, types: &TypeRegistry) -> Result<Self, SchemaError> {
        builder::MetadataBuilder::new(types).build(schema)
    }

    /// The class with the given id.
    pub fn class(&self, id: ClassId) -> &ClassMetadata {
        &self.classes[id.0]
    }

    /// All classes reachable from the root.
    pub fn classes(&self) -> &[ClassMetadata] {
        &self.classes
    }

    /// The root description.
    pub fn root(&self) -> &RootMetadata {
        &self.root
    }

    /// The root collection, if the schema has one.
    pub fn collection(&self) -> Option<&CollectionMetadata> {
        match &self.root {
            RootMetadata::Collection(collection) => Some(collection),
            RootMetadata::Class(_) => None,
        }
    }

    /// Classes that may appear at the root (or directly under the collection).
    pub fn root_classes(&self) -> &[ClassId] {
        match &self.root {
            RootMetadata::Class(id) => std::slice::from_ref(id),
            RootMetadata::Collection(collection) => &collection.classes,
        }
    }

    /// The root class mapped to element `name`.
    pub fn root_class_by_element(&self, name: &str) -> Option<&ClassMetadata> {
        self.root_classes()
            .iter()
            .map(|id| self.class(*id))
            .find(|class| class.name() == name)
    }

    /// The root class mapping the Rust type `type_id`.
    pub fn root_class_by_type(&self, type_id: TypeId) -> Option<&ClassMetadata> {
        self.root_classes()
            .iter()
            .map(|id| self.class(*id))
            .find(|class| class.type_id() == type_id)
    }
}

/// Compiled [`ObjectGraph`].
#[derive(Debug)]
pub struct ClassMetadata {
    id: ClassId,
    graph: Arc<ObjectGraph>,
    descriptor: Arc<TypeDescriptor>,
    properties: Vec<PropertyMetadata>,
    top_level: Vec<usize>,
    link_parent: Option<usize>,
}

impl ClassMetadata {
    /// Id of this class.
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.graph.name
    }

    /// The schema graph this class was compiled from.
    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    /// The mapped type.
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Rust type of instances.
    pub fn type_id(&self) -> TypeId {
        self.descriptor.type_id()
    }

    /// Registered type name.
    pub fn type_name(&self) -> &'static str {
        self.descriptor.name()
    }

    /// Element holding free-form key/value pairs.
    pub fn custom_properties_element(&self) -> Option<&str> {
        self.graph.custom_properties.as_deref()
    }

    /// The property at `index` in this class's arena.
    pub fn property(&self, index: usize) -> &PropertyMetadata {
        &self.properties[index]
    }

    /// Every entry of the arena: top-level properties, intermediates, leaves
    /// and the synthesized back-reference.
    pub fn all_properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    /// Indices of the top-level properties, in document order.
    pub fn top_level(&self) -> &[usize] {
        &self.top_level
    }

    /// Top-level properties, in document order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.top_level.iter().map(|index| &self.properties[*index])
    }

    /// Children of a composed property, in document order.
    pub fn children<'s>(
        &'s self,
        property: &'s PropertyMetadata,
    ) -> impl Iterator<Item = &'s PropertyMetadata> {
        property.children.iter().map(|index| &self.properties[*index])
    }

    /// The back-reference property set to the owner when nested.
    pub fn link_parent(&self) -> Option<&PropertyMetadata> {
        self.link_parent.map(|index| &self.properties[index])
    }

    /// Whether `property` is the back-reference.
    pub fn is_link_parent(&self, property: &PropertyMetadata) -> bool {
        self.link_parent == Some(property.index)
    }

    /// Top-level property mapped to element (or attribute) `name`.
    pub fn find_by_element(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties()
            .find(|p| p.element_name == name && !self.is_link_parent(p))
    }

    /// Child of a composed property mapped to element (or attribute) `name`.
    pub fn find_child_by_element<'s>(
        &'s self,
        parent: &'s PropertyMetadata,
        name: &str,
    ) -> Option<&'s PropertyMetadata> {
        self.children(parent).find(move |p| p.element_name == name)
    }

    /// Property with the dotted `path`.
    pub fn find_by_path(&self, path: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.path == path)
    }

    /// Leaf properties, depth first, in document order.
    pub fn endpoints(&self) -> Vec<&PropertyMetadata> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.top_level.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            let property = &self.properties[index];
            if property.children.is_empty() {
                out.push(property);
            } else {
                stack.extend(property.children.iter().rev().copied());
            }
        }
        out
    }

    /// Arena indices from the top-level ancestor down to `index`.
    pub fn chain(&self, index: usize) -> Vec<usize> {
        let mut chain = vec![index];
        let mut current = self.properties[index].parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.properties[parent].parent;
        }
        chain.reverse();
        chain
    }
}

/// How a property's value travels through a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// A leaf value written as text.
    Scalar,
    /// A collection of leaf values, one element per item.
    ScalarCollection,
    /// An intermediate object reached by a dotted path; its children are
    /// written inside its element.
    Composed,
    /// A nested object of the given class.
    Nested(ClassId),
    /// A collection of nested objects of the given class.
    NestedCollection(ClassId),
}

/// Compiled property: either a declared one, an implicit one found on the
/// type, an intermediate of a dotted path, or the back-reference.
#[derive(Debug)]
pub struct PropertyMetadata {
    index: usize,
    name: &'static str,
    path: String,
    element_name: String,
    usage: PropertyUse,
    attribute: bool,
    include_null: bool,
    declared: bool,
    accessor: PropertyAccessor,
    parent: Option<usize>,
    children: Vec<usize>,
    nested: Option<ClassId>,
}

impl PropertyMetadata {
    /// Position in the owning class's arena.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Accessor name (the last segment of the path).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Full dotted path from the owning class.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Element or attribute name.
    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    /// How the property takes part in the mapping.
    pub fn usage(&self) -> PropertyUse {
        self.usage
    }

    /// Whether the document must provide a value.
    pub fn is_required(&self) -> bool {
        self.usage == PropertyUse::Required
    }

    /// Whether the property is skipped when writing.
    pub fn is_ignored(&self) -> bool {
        self.usage == PropertyUse::Ignore
    }

    /// Whether the property is written as an attribute.
    pub fn is_attribute(&self) -> bool {
        self.attribute
    }

    /// Whether nulls are written as empty elements.
    pub fn include_null(&self) -> bool {
        self.include_null
    }

    /// Whether the schema declared this property (rather than it being found
    /// on the type or synthesized).
    pub fn is_declared(&self) -> bool {
        self.declared
    }

    /// The accessor reaching the value from its immediate owner.
    pub fn accessor(&self) -> &PropertyAccessor {
        &self.accessor
    }

    /// Arena index of the composed parent.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Arena indices of the children, for composed properties.
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// Class of the nested object(s).
    pub fn nested(&self) -> Option<ClassId> {
        self.nested
    }

    /// The field type.
    pub fn value_type(&self) -> ValueType {
        self.accessor.value_type()
    }

    /// The type text is converted to and from: the item type for collections.
    pub fn conversion_type(&self) -> ValueType {
        self.accessor.value_type().item()
    }

    /// Whether the field is a collection.
    pub fn is_collection(&self) -> bool {
        self.accessor.value_type().is_collection()
    }

    /// Whether the property has children.
    pub fn is_composed(&self) -> bool {
        !self.children.is_empty()
    }

    /// Whether the property carries a value itself.
    pub fn is_endpoint(&self) -> bool {
        self.children.is_empty()
    }

    /// How the value travels through a document.
    pub fn kind(&self) -> PropertyKind {
        match (self.is_composed(), self.nested, self.is_collection()) {
            (true, _, _) => PropertyKind::Composed,
            (false, Some(class), false) => PropertyKind::Nested(class),
            (false, Some(class), true) => PropertyKind::NestedCollection(class),
            (false, None, true) => PropertyKind::ScalarCollection,
            (false, None, false) => PropertyKind::Scalar,
        }
    }
}
