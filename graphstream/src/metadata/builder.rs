//! Compiles a [`GraphSchema`] into [`GraphMetadata`].

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use super::{
    ClassId, ClassMetadata, CollectionMetadata, GraphMetadata, PropertyMetadata, RootMetadata,
};
use crate::tracing_macros::{debug, trace};
use crate::{
    AccessError, GraphSchema, ObjectGraph, PropertyAccessor, PropertyDecl, PropertyUse,
    SchemaError, TypeDescriptor, TypeRegistry, ValueKind,
};

/// Walks the schema depth-first. Each distinct graph (by identity) becomes
/// exactly one class, so graphs that reference each other terminate.
pub(crate) struct MetadataBuilder<'t> {
    types: &'t TypeRegistry,
    classes: Vec<Option<ClassMetadata>>,
    class_types: Vec<TypeId>,
    memo: HashMap<*const ObjectGraph, ClassId>,
}

/// Arena under construction for one class.
struct PropertyTable<'g> {
    graph: &'g ObjectGraph,
    properties: Vec<PropertyMetadata>,
    top_level: Vec<usize>,
}

impl PropertyTable<'_> {
    fn siblings(&self, parent: Option<usize>) -> &[usize] {
        match parent {
            Some(parent) => &self.properties[parent].children,
            None => &self.top_level,
        }
    }

    fn find(&self, parent: Option<usize>, name: &str) -> Option<usize> {
        self.siblings(parent)
            .iter()
            .copied()
            .find(|index| self.properties[*index].name == name)
    }

    fn push(&mut self, mut property: PropertyMetadata) -> usize {
        let index = self.properties.len();
        property.index = index;
        match property.parent {
            Some(parent) => self.properties[parent].children.push(index),
            None => self.top_level.push(index),
        }
        self.properties.push(property);
        index
    }

    fn invalid(&self, property: &str, reason: &'static str) -> SchemaError {
        SchemaError::InvalidComposition {
            graph: self.graph.name.clone(),
            property: property.to_string(),
            reason,
        }
    }
}

impl<'t> MetadataBuilder<'t> {
    pub(crate) fn new(types: &'t TypeRegistry) -> Self {
        Self {
            types,
            classes: Vec::new(),
            class_types: Vec::new(),
            memo: HashMap::new(),
        }
    }

    pub(crate) fn build(mut self, schema: &GraphSchema) -> Result<GraphMetadata, SchemaError> {
        let root = match schema {
            GraphSchema::Graph(graph) => RootMetadata::Class(self.class(graph)?),
            GraphSchema::Collection(collection) => {
                let mut classes = Vec::with_capacity(collection.graphs.len());
                for (position, graph) in collection.graphs.iter().enumerate() {
                    if collection.graphs[..position]
                        .iter()
                        .any(|earlier| earlier.name == graph.name)
                    {
                        return Err(SchemaError::ConflictingGraph {
                            name: graph.name.clone(),
                        });
                    }
                    classes.push(self.class(graph)?);
                }
                RootMetadata::Collection(CollectionMetadata {
                    name: collection.name.clone(),
                    container: collection.container.clone(),
                    classes,
                })
            }
        };

        let mut classes: Vec<ClassMetadata> = self.classes.into_iter().flatten().collect();
        resolve_compatible_types(&mut classes, &root)?;
        debug!(classes = classes.len(), "metadata built");
        Ok(GraphMetadata { classes, root })
    }

    fn class(&mut self, graph: &Arc<ObjectGraph>) -> Result<ClassId, SchemaError> {
        let key = Arc::as_ptr(graph);
        if let Some(id) = self.memo.get(&key) {
            return Ok(*id);
        }

        let descriptor = self
            .types
            .get(&graph.type_name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownType {
                name: graph.type_name.clone(),
            })?;

        // Reserve the slot first so that cycles back to this graph resolve.
        let id = ClassId(self.classes.len());
        self.classes.push(None);
        self.class_types.push(descriptor.type_id());
        self.memo.insert(key, id);
        trace!(graph = %graph.name, ty = descriptor.name(), ?id, "building class");

        let mut table = PropertyTable {
            graph,
            properties: Vec::new(),
            top_level: Vec::new(),
        };

        for decl in &graph.properties {
            self.declare(&mut table, &descriptor, decl)?;
        }

        if !graph.ignore_undeclared {
            for accessor in descriptor.properties() {
                let is_link = graph.parent_property.as_deref() == Some(accessor.name());
                if is_link || table.find(None, accessor.name()).is_some() {
                    continue;
                }
                if !(accessor.is_readable() && accessor.is_writable()) {
                    trace!(property = accessor.name(), "skipping inaccessible property");
                    continue;
                }
                table.push(implicit(graph, accessor.clone()));
            }
        }

        let link_parent = match &graph.parent_property {
            None => None,
            Some(name) => Some(match table.find(None, name) {
                Some(index) => index,
                None => {
                    let accessor = descriptor.property(name).cloned().ok_or_else(|| {
                        SchemaError::UnknownProperty {
                            owner: descriptor.name().to_string(),
                            property: name.clone(),
                        }
                    })?;
                    if !accessor.is_writable() {
                        return Err(AccessError::NotWritable {
                            owner: accessor.owner(),
                            property: accessor.name(),
                        }
                        .into());
                    }
                    // Kept out of the top level: it is set, never read.
                    let mut link = implicit(graph, accessor);
                    link.index = table.properties.len();
                    table.properties.push(link);
                    table.properties.len() - 1
                }
            }),
        };

        let PropertyTable {
            properties,
            top_level,
            ..
        } = table;
        self.classes[id.0] = Some(ClassMetadata {
            id,
            graph: graph.clone(),
            descriptor,
            properties,
            top_level,
            link_parent,
        });
        Ok(id)
    }

    fn declare(
        &mut self,
        table: &mut PropertyTable<'_>,
        descriptor: &Arc<TypeDescriptor>,
        decl: &PropertyDecl,
    ) -> Result<(), SchemaError> {
        let segments: Vec<&str> = decl.name.split('.').collect();
        if decl.graph.is_some() && segments.len() > 1 {
            return Err(table.invalid(
                &decl.name,
                "a nested graph cannot sit on a dotted path",
            ));
        }
        if decl.graph.is_some() && decl.attribute {
            return Err(table.invalid(&decl.name, "a nested graph cannot be an attribute"));
        }

        let mut owner = descriptor.clone();
        let mut parent: Option<usize> = None;
        for (depth, segment) in segments.iter().enumerate() {
            let last = depth + 1 == segments.len();
            let path = segments[..=depth].join(".");

            if let Some(existing) = table.find(parent, segment) {
                let entry = &table.properties[existing];
                if last {
                    return Err(table.invalid(&decl.name, "declared more than once"));
                }
                if entry.declared || entry.nested.is_some() {
                    return Err(table.invalid(
                        &decl.name,
                        "a prefix of this path is declared as a property of its own",
                    ));
                }
                owner = self.intermediate_type(table, &decl.name, &entry.accessor)?;
                parent = Some(existing);
                continue;
            }

            let accessor = owner.property(segment).cloned().ok_or_else(|| {
                SchemaError::UnknownProperty {
                    owner: owner.name().to_string(),
                    property: decl.name.clone(),
                }
            })?;

            if !last {
                let next = self.intermediate_type(table, &decl.name, &accessor)?;
                parent = Some(table.push(PropertyMetadata {
                    index: 0,
                    name: accessor.name(),
                    path,
                    element_name: segment.to_string(),
                    usage: PropertyUse::Optional,
                    attribute: false,
                    include_null: table.graph.include_null,
                    declared: false,
                    accessor,
                    parent,
                    children: Vec::new(),
                    nested: None,
                }));
                owner = next;
                continue;
            }

            if decl.usage != PropertyUse::Ignore && !accessor.is_writable() {
                return Err(AccessError::NotWritable {
                    owner: accessor.owner(),
                    property: accessor.name(),
                }
                .into());
            }

            let nested = match &decl.graph {
                None => None,
                Some(graph) => {
                    let item = accessor.value_type().item();
                    if !matches!(item.kind(), ValueKind::Object) {
                        return Err(
                            table.invalid(&decl.name, "a nested graph needs an object field")
                        );
                    }
                    let class = self.class(graph)?;
                    if self.type_of(class) != item.type_id() {
                        return Err(table.invalid(
                            &decl.name,
                            "the nested graph maps a different type than the field holds",
                        ));
                    }
                    Some(class)
                }
            };

            table.push(PropertyMetadata {
                index: 0,
                name: accessor.name(),
                path,
                element_name: decl
                    .element_name
                    .clone()
                    .unwrap_or_else(|| segment.to_string()),
                usage: decl.usage,
                attribute: decl.attribute,
                include_null: decl.include_null.unwrap_or(table.graph.include_null),
                declared: true,
                accessor,
                parent,
                children: Vec::new(),
                nested,
            });
        }
        Ok(())
    }

    /// Type reached through an intermediate segment of a dotted path.
    fn intermediate_type(
        &self,
        table: &PropertyTable<'_>,
        property: &str,
        accessor: &PropertyAccessor,
    ) -> Result<Arc<TypeDescriptor>, SchemaError> {
        let ty = accessor.value_type();
        if ty.is_collection() || !matches!(ty.kind(), ValueKind::Object) {
            return Err(table.invalid(
                property,
                "a dotted path must step through single objects",
            ));
        }
        self.types
            .get_by_type(ty.type_id())
            .cloned()
            .ok_or_else(|| SchemaError::UnknownType {
                name: ty.type_name().to_string(),
            })
    }

    fn type_of(&self, class: ClassId) -> TypeId {
        self.class_types[class.0]
    }
}

fn implicit(graph: &ObjectGraph, accessor: PropertyAccessor) -> PropertyMetadata {
    PropertyMetadata {
        index: 0,
        name: accessor.name(),
        path: accessor.name().to_string(),
        element_name: accessor.name().to_string(),
        usage: PropertyUse::Optional,
        attribute: false,
        include_null: graph.include_null,
        declared: false,
        accessor,
        parent: None,
        children: Vec::new(),
        nested: None,
    }
}

/// Object-typed properties without an explicit graph reuse a root graph of
/// the same type. Implicit object properties nothing can map are ignored.
fn resolve_compatible_types(
    classes: &mut [ClassMetadata],
    root: &RootMetadata,
) -> Result<(), SchemaError> {
    let roots: Vec<(TypeId, ClassId)> = match root {
        RootMetadata::Class(id) => vec![*id],
        RootMetadata::Collection(collection) => collection.classes.clone(),
    }
    .into_iter()
    .map(|id| (classes[id.0].type_id(), id))
    .collect();

    for class in classes.iter_mut() {
        let link = class.link_parent;
        for property in class.properties.iter_mut() {
            if property.nested.is_some()
                || !property.children.is_empty()
                || Some(property.index) == link
                || !property.accessor.value_type().is_object()
            {
                continue;
            }
            let item = property.accessor.value_type().item().type_id();
            match roots.iter().find(|(type_id, _)| *type_id == item) {
                Some(_) if property.attribute => {
                    return Err(SchemaError::InvalidComposition {
                        graph: class.graph.name.clone(),
                        property: property.path.clone(),
                        reason: "a nested graph cannot be an attribute",
                    });
                }
                Some((_, id)) => {
                    trace!(property = %property.path, class = ?id, "resolved compatible graph");
                    property.nested = Some(*id);
                }
                None if !property.declared => property.usage = PropertyUse::Ignore,
                None => {}
            }
        }
    }
    Ok(())
}
