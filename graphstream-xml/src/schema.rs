//! Loading [`GraphSchema`]s from their XML form.
//!
//! ```xml
//! <graphSchema>
//!   <objectGraph name="order" class="Order" customPropertiesNode="extra">
//!     <property name="id" use="REQUIRED" xmlAttribute="true"/>
//!     <property name="customer.name" elementName="customerName"/>
//!     <property name="lines">
//!       <objectGraph name="line" class="OrderLine" parentProperty="order"/>
//!     </property>
//!   </objectGraph>
//! </graphSchema>
//! ```
//!
//! A collection schema wraps several graphs:
//!
//! ```xml
//! <graphSchema>
//!   <objectCollection name="shipments" class="Vec">
//!     <objectGraph name="order" class="Order"/>
//!     <objectGraph name="refund" class="Refund"/>
//!   </objectCollection>
//! </graphSchema>
//! ```

use std::fmt;
use std::sync::Arc;

use facet::Facet;
use facet_xml as xml;
use graphstream::{GraphSchema, ObjectCollection, ObjectGraph, PropertyDecl, PropertyUse};

use crate::tracing_macros::trace;

/// Failure while loading a schema document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaLoadError {
    /// The document is not well-formed or does not have the expected shape.
    Document(String),
    /// An attribute holds a value outside its vocabulary.
    InvalidValue {
        /// Attribute name.
        attribute: &'static str,
        /// The offending value.
        value: String,
    },
    /// The root holds neither a graph nor a collection, or more than one.
    InvalidRoot(&'static str),
    /// A property holds more than one nested graph.
    MultipleNestedGraphs {
        /// Property name.
        property: String,
    },
}

impl fmt::Display for SchemaLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaLoadError::Document(msg) => write!(f, "invalid schema document: {msg}"),
            SchemaLoadError::InvalidValue { attribute, value } => {
                write!(f, "invalid value `{value}` for attribute `{attribute}`")
            }
            SchemaLoadError::InvalidRoot(reason) => write!(f, "invalid schema root: {reason}"),
            SchemaLoadError::MultipleNestedGraphs { property } => {
                write!(f, "property `{property}` declares more than one nested objectGraph")
            }
        }
    }
}

impl std::error::Error for SchemaLoadError {}

#[derive(Debug, Facet)]
#[facet(rename = "graphSchema")]
struct GraphSchemaDoc {
    #[facet(xml::elements, rename = "objectGraph", default)]
    graphs: Vec<ObjectGraphDoc>,
    #[facet(xml::elements, rename = "objectCollection", default)]
    collections: Vec<ObjectCollectionDoc>,
}

#[derive(Debug, Facet)]
struct ObjectCollectionDoc {
    #[facet(xml::attribute)]
    name: String,
    #[facet(xml::attribute, rename = "class", default)]
    class: Option<String>,
    #[facet(xml::elements, rename = "objectGraph", default)]
    graphs: Vec<ObjectGraphDoc>,
}

#[derive(Debug, Facet)]
struct ObjectGraphDoc {
    #[facet(xml::attribute)]
    name: String,
    #[facet(xml::attribute, rename = "class")]
    class: String,
    #[facet(xml::attribute, rename = "parentProperty", default)]
    parent_property: Option<String>,
    #[facet(xml::attribute, rename = "ignorePropsNotDeclared", default)]
    ignore_undeclared: Option<String>,
    #[facet(xml::attribute, rename = "customPropertiesNode", default)]
    custom_properties: Option<String>,
    #[facet(xml::attribute, rename = "includeNullValues", default)]
    include_null: Option<String>,
    #[facet(xml::elements, rename = "property", default)]
    properties: Vec<PropertyDoc>,
}

#[derive(Debug, Facet)]
struct PropertyDoc {
    #[facet(xml::attribute)]
    name: String,
    #[facet(xml::attribute, rename = "use", default)]
    usage: Option<String>,
    #[facet(xml::attribute, rename = "elementName", default)]
    element_name: Option<String>,
    #[facet(xml::attribute, rename = "xmlAttribute", default)]
    attribute: Option<String>,
    #[facet(xml::attribute, rename = "includeNullValues", default)]
    include_null: Option<String>,
    #[facet(xml::elements, rename = "objectGraph", default)]
    #[facet(recursive_type)]
    graphs: Vec<ObjectGraphDoc>,
}

/// Parses a schema document.
pub fn load_schema(input: &str) -> Result<GraphSchema, SchemaLoadError> {
    let doc: GraphSchemaDoc =
        facet_xml::from_str(input).map_err(|e| SchemaLoadError::Document(e.to_string()))?;
    trace!(
        graphs = doc.graphs.len(),
        collections = doc.collections.len(),
        "schema document parsed"
    );

    let GraphSchemaDoc {
        mut graphs,
        mut collections,
    } = doc;
    match (graphs.len(), collections.len()) {
        (1, 0) => {
            let graph = graphs.remove(0);
            Ok(GraphSchema::graph(convert_graph(graph)?))
        }
        (0, 1) => {
            let doc = collections.remove(0);
            let mut collection = ObjectCollection::new(doc.name);
            if let Some(class) = doc.class {
                collection = collection.container(class);
            }
            for graph in doc.graphs {
                collection = collection.graph(convert_graph(graph)?);
            }
            Ok(GraphSchema::collection(collection))
        }
        (0, 0) => Err(SchemaLoadError::InvalidRoot(
            "expected an objectGraph or an objectCollection",
        )),
        _ => Err(SchemaLoadError::InvalidRoot(
            "expected exactly one objectGraph or objectCollection",
        )),
    }
}

fn convert_graph(doc: ObjectGraphDoc) -> Result<ObjectGraph, SchemaLoadError> {
    let mut graph = ObjectGraph::new(doc.name, doc.class);
    if let Some(parent) = doc.parent_property {
        graph = graph.parent_property(parent);
    }
    if flag("ignorePropsNotDeclared", doc.ignore_undeclared)? == Some(true) {
        graph = graph.ignore_undeclared();
    }
    if let Some(node) = doc.custom_properties {
        graph = graph.custom_properties(node);
    }
    if let Some(include) = flag("includeNullValues", doc.include_null)? {
        graph = graph.include_null(include);
    }
    for property in doc.properties {
        graph = graph.property(convert_property(property)?);
    }
    Ok(graph)
}

fn convert_property(doc: PropertyDoc) -> Result<PropertyDecl, SchemaLoadError> {
    let mut decl = PropertyDecl::new(doc.name);
    decl.usage = match doc.usage.as_deref() {
        None | Some("NOT_REQUIRED") => PropertyUse::Optional,
        Some("REQUIRED") => PropertyUse::Required,
        Some("IGNORE") => PropertyUse::Ignore,
        Some(other) => {
            return Err(SchemaLoadError::InvalidValue {
                attribute: "use",
                value: other.to_string(),
            });
        }
    };
    decl.element_name = doc.element_name;
    decl.attribute = flag("xmlAttribute", doc.attribute)?.unwrap_or(false);
    decl.include_null = flag("includeNullValues", doc.include_null)?;

    let mut graphs = doc.graphs;
    if graphs.len() > 1 {
        return Err(SchemaLoadError::MultipleNestedGraphs {
            property: decl.name,
        });
    }
    if let Some(nested) = graphs.pop() {
        decl.graph = Some(Arc::new(convert_graph(nested)?));
    }
    Ok(decl)
}

fn flag(attribute: &'static str, value: Option<String>) -> Result<Option<bool>, SchemaLoadError> {
    match value.as_deref().map(str::trim) {
        None => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(other) => Err(SchemaLoadError::InvalidValue {
            attribute,
            value: other.to_string(),
        }),
    }
}
