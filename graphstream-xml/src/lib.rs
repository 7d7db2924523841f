//! XML support for [`graphstream`]: a streaming tokenizer, a writer, and a
//! loader for the XML form of mapping schemas.
//!
//! ```
//! use graphstream::{ObjectRef, StreamContext, TypeDescriptor, TypeRegistry};
//!
//! #[derive(Default)]
//! struct Book {
//!     title: String,
//!     pages: i32,
//! }
//!
//! let schema = graphstream_xml::load_schema(
//!     r#"<graphSchema>
//!          <objectGraph name="book" class="Book">
//!            <property name="pages" xmlAttribute="true"/>
//!          </objectGraph>
//!        </graphSchema>"#,
//! )
//! .unwrap();
//! let types = TypeRegistry::new().with(
//!     TypeDescriptor::builder::<Book>("Book")
//!         .default_constructor()
//!         .field("title", |b: &Book| &b.title, |b, v| b.title = v)
//!         .field("pages", |b: &Book| &b.pages, |b, v| b.pages = v)
//!         .build(),
//! );
//! let context = StreamContext::new(&schema, types).unwrap();
//!
//! let book = ObjectRef::new(Book { title: "Dune".into(), pages: 412 });
//! let xml = graphstream_xml::to_string(&context, &book).unwrap();
//! assert_eq!(xml, r#"<book pages="412"><title>Dune</title></book>"#);
//!
//! let back = graphstream_xml::from_str(&context, &xml).unwrap();
//! let back = back.single().and_then(|o| o.downcast::<Book>()).unwrap();
//! assert_eq!(back.borrow().title, "Dune");
//! ```

#![warn(missing_docs)]

mod tracing_macros;

mod escaping;
mod parser;
mod schema;
mod writer;

pub use parser::{XmlError, XmlParser};
pub use schema::{SchemaLoadError, load_schema};
pub use writer::{SerializeOptions, XmlWriteError, XmlWriter};

use graphstream::{ObjectConsumer, Source, StreamContext, StreamError, Unmarshalled};

/// Marshals `source` to compact XML bytes.
pub fn to_vec<'s>(
    context: &StreamContext,
    source: impl Into<Source<'s>>,
) -> Result<Vec<u8>, StreamError<XmlWriteError>> {
    to_vec_with_options(context, source, &SerializeOptions::default())
}

/// Marshals `source` to XML bytes with the given options.
pub fn to_vec_with_options<'s>(
    context: &StreamContext,
    source: impl Into<Source<'s>>,
    options: &SerializeOptions,
) -> Result<Vec<u8>, StreamError<XmlWriteError>> {
    let mut writer = XmlWriter::with_options(Vec::new(), options.clone());
    context.marshaller().write(source, &mut writer)?;
    Ok(writer.into_inner())
}

/// Marshals `source` to a compact XML string.
pub fn to_string<'s>(
    context: &StreamContext,
    source: impl Into<Source<'s>>,
) -> Result<String, StreamError<XmlWriteError>> {
    to_string_with_options(context, source, &SerializeOptions::default())
}

/// Marshals `source` to an indented XML string.
pub fn to_string_pretty<'s>(
    context: &StreamContext,
    source: impl Into<Source<'s>>,
) -> Result<String, StreamError<XmlWriteError>> {
    to_string_with_options(context, source, &SerializeOptions::default().pretty())
}

/// Marshals `source` to an XML string with the given options.
pub fn to_string_with_options<'s>(
    context: &StreamContext,
    source: impl Into<Source<'s>>,
    options: &SerializeOptions,
) -> Result<String, StreamError<XmlWriteError>> {
    let bytes = to_vec_with_options(context, source, options)?;
    String::from_utf8(bytes).map_err(|e| {
        StreamError::Document(XmlWriteError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e,
        )))
    })
}

/// Unmarshals every root object in `input`.
pub fn from_str(
    context: &StreamContext,
    input: &str,
) -> Result<Unmarshalled, StreamError<XmlError>> {
    from_slice(context, input.as_bytes())
}

/// Unmarshals every root object in `input`.
pub fn from_slice(
    context: &StreamContext,
    input: &[u8],
) -> Result<Unmarshalled, StreamError<XmlError>> {
    let mut parser = XmlParser::new(input);
    context.unmarshaller().read(&mut parser)
}

/// Unmarshals `input`, handing each root object to `consumer` as soon as it
/// is complete instead of collecting it.
pub fn from_str_with_consumer(
    context: &StreamContext,
    input: &str,
    consumer: &mut dyn ObjectConsumer,
) -> Result<(), StreamError<XmlError>> {
    let mut parser = XmlParser::new(input.as_bytes());
    context
        .streaming_unmarshaller(consumer)
        .read(&mut parser)
        .map(|_| ())
}

/// Loads a schema document and compiles it against `types`.
pub fn context_from_schema(
    schema: &str,
    types: graphstream::TypeRegistry,
) -> Result<StreamContext, Box<dyn std::error::Error + Send + Sync>> {
    let schema = load_schema(schema)?;
    Ok(StreamContext::new(&schema, types)?)
}
