//! The mapping schema: which properties of which types map to which
//! elements and attributes.
//!
//! Schemas are plain data. Build them with the chained helpers below or load
//! them from a document (see `graphstream-xml`), then compile them with
//! [`StreamContext::new`](crate::StreamContext::new).

use std::sync::Arc;

/// How a declared property takes part in the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyUse {
    /// The document must provide a value (possibly an explicit empty one).
    Required,
    /// The document may omit the property.
    #[default]
    Optional,
    /// The property is never written to documents.
    Ignore,
}

/// One property of an [`ObjectGraph`].
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    /// Property name. A dotted name such as `address.street` reaches into
    /// a nested object.
    pub name: String,
    /// How the property takes part in the mapping.
    pub usage: PropertyUse,
    /// Element or attribute name, when it differs from the property name.
    pub element_name: Option<String>,
    /// Whether the property is written as an attribute.
    pub attribute: bool,
    /// Whether null values are written as empty elements. Inherits the
    /// graph's setting when unset.
    pub include_null: Option<bool>,
    /// Graph for the nested object(s) held by this property.
    pub graph: Option<Arc<ObjectGraph>>,
}

impl PropertyDecl {
    /// An optional element property.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: PropertyUse::Optional,
            element_name: None,
            attribute: false,
            include_null: None,
            graph: None,
        }
    }

    /// Marks the property required.
    pub fn required(mut self) -> Self {
        self.usage = PropertyUse::Required;
        self
    }

    /// Marks the property ignored.
    pub fn ignored(mut self) -> Self {
        self.usage = PropertyUse::Ignore;
        self
    }

    /// Sets the element (or attribute) name.
    pub fn element_name(mut self, name: impl Into<String>) -> Self {
        self.element_name = Some(name.into());
        self
    }

    /// Writes the property as an attribute.
    pub fn attribute(mut self) -> Self {
        self.attribute = true;
        self
    }

    /// Overrides null inclusion for this property.
    pub fn include_null(mut self, include: bool) -> Self {
        self.include_null = Some(include);
        self
    }

    /// Maps the nested object(s) with `graph`.
    pub fn graph(mut self, graph: impl Into<Arc<ObjectGraph>>) -> Self {
        self.graph = Some(graph.into());
        self
    }
}

/// Mapping of one type to one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGraph {
    /// Element name.
    pub name: String,
    /// Registered type name.
    pub type_name: String,
    /// Declared properties, in document order.
    pub properties: Vec<PropertyDecl>,
    /// Property set to the owning object when this graph is nested.
    pub parent_property: Option<String>,
    /// Whether undeclared readable and writable properties stay unmapped.
    pub ignore_undeclared: bool,
    /// Element holding free-form key/value pairs.
    pub custom_properties: Option<String>,
    /// Default null inclusion for the graph's properties.
    pub include_null: bool,
}

impl ObjectGraph {
    /// Maps `type_name` to the element `name`.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            properties: Vec::new(),
            parent_property: None,
            ignore_undeclared: false,
            custom_properties: None,
            include_null: false,
        }
    }

    /// Declares a property.
    pub fn property(mut self, property: PropertyDecl) -> Self {
        self.properties.push(property);
        self
    }

    /// Sets the back-reference property.
    pub fn parent_property(mut self, name: impl Into<String>) -> Self {
        self.parent_property = Some(name.into());
        self
    }

    /// Leaves undeclared properties unmapped.
    pub fn ignore_undeclared(mut self) -> Self {
        self.ignore_undeclared = true;
        self
    }

    /// Captures free-form key/value pairs under the element `name`.
    pub fn custom_properties(mut self, name: impl Into<String>) -> Self {
        self.custom_properties = Some(name.into());
        self
    }

    /// Sets the default null inclusion.
    pub fn include_null(mut self, include: bool) -> Self {
        self.include_null = include;
        self
    }

    /// Finds a declaration by property name.
    pub fn find_property(&self, name: &str) -> Option<&PropertyDecl> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// A root element holding a sequence of objects of the listed graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCollection {
    /// Root element name.
    pub name: String,
    /// Name of the container type, kept for reference.
    pub container: Option<String>,
    /// Graphs allowed as items.
    pub graphs: Vec<Arc<ObjectGraph>>,
}

impl ObjectCollection {
    /// A collection rooted at the element `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container: None,
            graphs: Vec::new(),
        }
    }

    /// Records the container type name.
    pub fn container(mut self, type_name: impl Into<String>) -> Self {
        self.container = Some(type_name.into());
        self
    }

    /// Allows items of `graph`.
    pub fn graph(mut self, graph: impl Into<Arc<ObjectGraph>>) -> Self {
        self.graphs.push(graph.into());
        self
    }
}

/// A whole schema: one root graph or one collection of graphs.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphSchema {
    /// A single object per document.
    Graph(Arc<ObjectGraph>),
    /// A sequence of objects under one root element.
    Collection(ObjectCollection),
}

impl GraphSchema {
    /// A single-graph schema.
    pub fn graph(graph: impl Into<Arc<ObjectGraph>>) -> Self {
        Self::Graph(graph.into())
    }

    /// A collection schema.
    pub fn collection(collection: ObjectCollection) -> Self {
        Self::Collection(collection)
    }

    /// The root-level graphs.
    pub fn graphs(&self) -> &[Arc<ObjectGraph>] {
        match self {
            Self::Graph(graph) => std::slice::from_ref(graph),
            Self::Collection(collection) => &collection.graphs,
        }
    }
}

impl From<ObjectGraph> for GraphSchema {
    fn from(graph: ObjectGraph) -> Self {
        Self::graph(graph)
    }
}

impl From<ObjectCollection> for GraphSchema {
    fn from(collection: ObjectCollection) -> Self {
        Self::Collection(collection)
    }
}
