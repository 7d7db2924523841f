//! Schema-driven streaming conversion between in-memory object graphs and
//! tree-structured documents.
//!
//! A [`GraphSchema`] declares which properties of which types map to which
//! elements and attributes. [`StreamContext::new`] compiles it against a
//! [`TypeRegistry`] into immutable [`GraphMetadata`], after which the context
//! hands out engines:
//!
//! - [`Marshaller`] walks objects and pushes events into a [`DocumentWriter`].
//! - [`Unmarshaller`] consumes [`DocumentEvent`]s, accumulates field values,
//!   and instantiates each object once its element closes.
//!
//! The crate never tokenizes text itself. Format crates (such as
//! `graphstream-xml`) implement [`DocumentParser`] and [`DocumentWriter`].
//!
//! ```
//! use graphstream::{
//!     EventBuffer, GraphSchema, ObjectGraph, ObjectRef, PropertyDecl, StreamContext,
//!     TypeDescriptor, TypeRegistry,
//! };
//!
//! #[derive(Default)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let types = TypeRegistry::new().with(
//!     TypeDescriptor::builder::<Point>("Point")
//!         .default_constructor()
//!         .field("x", |p: &Point| &p.x, |p, v| p.x = v)
//!         .field("y", |p: &Point| &p.y, |p, v| p.y = v)
//!         .build(),
//! );
//! let schema = GraphSchema::graph(
//!     ObjectGraph::new("point", "Point").property(PropertyDecl::new("x").attribute()),
//! );
//! let context = StreamContext::new(&schema, types).unwrap();
//!
//! let mut events = EventBuffer::new();
//! context
//!     .marshaller()
//!     .write(&ObjectRef::new(Point { x: 3, y: 4 }), &mut events)
//!     .unwrap();
//!
//! let read = context.unmarshaller().read(&mut events.parser()).unwrap();
//! let point = read.single().and_then(|o| o.downcast::<Point>()).unwrap();
//! assert_eq!((point.borrow().x, point.borrow().y), (3, 4));
//! ```

#![warn(missing_docs)]

mod tracing_macros;

mod access;
mod context;
mod convert;
mod document;
mod error;
mod marshal;
mod metadata;
mod schema;
mod unmarshal;
mod value;

pub use access::*;
pub use context::*;
pub use convert::*;
pub use document::*;
pub use error::*;
pub use marshal::*;
pub use metadata::*;
pub use schema::*;
pub use unmarshal::*;
pub use value::*;
