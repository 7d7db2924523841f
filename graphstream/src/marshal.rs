//! Marshalling: objects in, document events out.

use crate::tracing_macros::{trace, trace_span};
use crate::{
    AccessError, ClassMetadata, CustomPropertiesReader, DocumentWriter, ObjectProvider, ObjectRef,
    PropertyKind, PropertyMetadata, StreamContext, StreamError, StructureError, Value,
};

/// The objects a [`Marshaller`] writes.
pub enum Source<'s> {
    /// One object.
    Object(&'s ObjectRef),
    /// Several objects, in order.
    Objects(&'s [ObjectRef]),
    /// Objects pulled from a provider until it runs dry.
    Provider(&'s mut dyn ObjectProvider),
}

impl<'s> From<&'s ObjectRef> for Source<'s> {
    fn from(object: &'s ObjectRef) -> Self {
        Source::Object(object)
    }
}

impl<'s> From<&'s [ObjectRef]> for Source<'s> {
    fn from(objects: &'s [ObjectRef]) -> Self {
        Source::Objects(objects)
    }
}

impl<'s> From<&'s Vec<ObjectRef>> for Source<'s> {
    fn from(objects: &'s Vec<ObjectRef>) -> Self {
        Source::Objects(objects)
    }
}

impl<'s, P: ObjectProvider + 's> From<&'s mut P> for Source<'s> {
    fn from(provider: &'s mut P) -> Self {
        Source::Provider(provider)
    }
}

/// Writes objects as documents according to a [`StreamContext`].
///
/// For each object the writer receives the class element, then attribute
/// properties, then element properties in declaration order, then the
/// custom properties element if any reader contributed pairs.
pub struct Marshaller<'a> {
    context: &'a StreamContext,
    readers: Vec<Box<dyn CustomPropertiesReader + 'a>>,
}

impl<'a> Marshaller<'a> {
    pub(crate) fn new(context: &'a StreamContext) -> Self {
        Self {
            context,
            readers: Vec::new(),
        }
    }

    /// Adds a custom property reader. Pairs from later readers replace
    /// earlier ones with the same key.
    pub fn add_property_reader(&mut self, reader: impl CustomPropertiesReader + 'a) -> &mut Self {
        self.readers.push(Box::new(reader));
        self
    }

    /// Writes `source` as one document.
    ///
    /// Under a collection schema the objects are wrapped in the collection
    /// element; otherwise they are written as consecutive root elements.
    pub fn write<'s, W: DocumentWriter>(
        &self,
        source: impl Into<Source<'s>>,
        writer: &mut W,
    ) -> Result<(), StreamError<W::Error>> {
        let collection = self.context.metadata().collection();
        writer.start_document().map_err(StreamError::Document)?;
        if let Some(collection) = collection {
            writer
                .start_element(collection.name())
                .map_err(StreamError::Document)?;
        }

        match source.into() {
            Source::Object(object) => self.write_root(object, writer)?,
            Source::Objects(objects) => {
                for object in objects {
                    self.write_root(object, writer)?;
                }
            }
            Source::Provider(provider) => {
                let mut index = 0;
                while let Some(object) = provider.object_at(index) {
                    self.write_root(&object, writer)?;
                    index += 1;
                }
            }
        }

        if let Some(collection) = collection {
            writer
                .end_element(collection.name())
                .map_err(StreamError::Document)?;
        }
        writer.end_document().map_err(StreamError::Document)
    }

    fn write_root<W: DocumentWriter>(
        &self,
        object: &ObjectRef,
        writer: &mut W,
    ) -> Result<(), StreamError<W::Error>> {
        let runtime = self.context.runtime_type(object);
        let class = self
            .context
            .metadata()
            .root_class_by_type(runtime)
            .ok_or_else(|| StructureError {
                message: format!("no graph maps objects of type `{}`", object.type_name()),
                path: String::new(),
            })?;
        self.write_object(class, object, writer)
    }

    fn write_object<W: DocumentWriter>(
        &self,
        class: &ClassMetadata,
        object: &ObjectRef,
        writer: &mut W,
    ) -> Result<(), StreamError<W::Error>> {
        trace_span!("write_object", graph = class.name());
        writer
            .start_element(class.name())
            .map_err(StreamError::Document)?;
        self.write_members(class, class.top_level(), Some(object), writer)?;
        self.write_custom_properties(class, object, writer)?;
        writer
            .end_element(class.name())
            .map_err(StreamError::Document)
    }

    /// Writes the properties at `indices` of `owner`: attributes first, then
    /// elements. A missing owner writes every property as null.
    fn write_members<W: DocumentWriter>(
        &self,
        class: &ClassMetadata,
        indices: &[usize],
        owner: Option<&ObjectRef>,
        writer: &mut W,
    ) -> Result<(), StreamError<W::Error>> {
        let members: Vec<&PropertyMetadata> = indices
            .iter()
            .map(|index| class.property(*index))
            .filter(|p| !p.is_ignored() && !class.is_link_parent(p))
            .collect();

        for property in members.iter().filter(|p| is_attribute(p)) {
            let value = read(property, owner)?;
            if value.is_null() && !property.include_null() {
                continue;
            }
            let text = self
                .context
                .converters()
                .to_text(&property.conversion_type(), &value)?;
            trace!(attribute = property.element_name(), %text);
            writer
                .attribute(property.element_name(), &text)
                .map_err(StreamError::Document)?;
        }

        for property in members.iter().filter(|p| !is_attribute(p)) {
            self.write_element(class, property, owner, writer)?;
        }
        Ok(())
    }

    fn write_element<W: DocumentWriter>(
        &self,
        class: &ClassMetadata,
        property: &PropertyMetadata,
        owner: Option<&ObjectRef>,
        writer: &mut W,
    ) -> Result<(), StreamError<W::Error>> {
        let value = read(property, owner)?;
        let name = property.element_name();
        match property.kind() {
            PropertyKind::Composed => {
                let target = value.as_object();
                if target.is_none() && !property.include_null() {
                    return Ok(());
                }
                writer.start_element(name).map_err(StreamError::Document)?;
                self.write_members(class, property.children(), target, writer)?;
                writer.end_element(name).map_err(StreamError::Document)
            }
            PropertyKind::Nested(nested) => match &value {
                Value::Object(child) => {
                    let nested = self.context.metadata().class(nested);
                    writer.start_element(name).map_err(StreamError::Document)?;
                    self.write_members(nested, nested.top_level(), Some(child), writer)?;
                    self.write_custom_properties(nested, child, writer)?;
                    writer.end_element(name).map_err(StreamError::Document)
                }
                _ => write_empty(property, writer),
            },
            PropertyKind::NestedCollection(nested) => {
                let items = value.as_list().unwrap_or_default();
                if items.is_empty() {
                    return write_empty(property, writer);
                }
                let nested = self.context.metadata().class(nested);
                writer.start_element(name).map_err(StreamError::Document)?;
                for item in items {
                    if let Value::Object(child) = item {
                        self.write_object(nested, child, writer)?;
                    }
                }
                writer.end_element(name).map_err(StreamError::Document)
            }
            PropertyKind::ScalarCollection => {
                let items = value.as_list().unwrap_or_default();
                if items.is_empty() {
                    return write_empty(property, writer);
                }
                for item in items {
                    let text = self
                        .context
                        .converters()
                        .to_text(&property.conversion_type(), item)?;
                    writer.start_element(name).map_err(StreamError::Document)?;
                    writer.characters(&text).map_err(StreamError::Document)?;
                    writer.end_element(name).map_err(StreamError::Document)?;
                }
                Ok(())
            }
            PropertyKind::Scalar => {
                if value.is_null() {
                    return write_empty(property, writer);
                }
                let text = self
                    .context
                    .converters()
                    .to_text(&property.conversion_type(), &value)?;
                writer.start_element(name).map_err(StreamError::Document)?;
                writer.characters(&text).map_err(StreamError::Document)?;
                writer.end_element(name).map_err(StreamError::Document)
            }
        }
    }

    fn write_custom_properties<W: DocumentWriter>(
        &self,
        class: &ClassMetadata,
        object: &ObjectRef,
        writer: &mut W,
    ) -> Result<(), StreamError<W::Error>> {
        let Some(element) = class.custom_properties_element() else {
            return Ok(());
        };

        let mut merged = std::collections::BTreeMap::new();
        for reader in &self.readers {
            if let Some(pairs) = reader.read(object) {
                merged.extend(pairs);
            }
        }
        if merged.is_empty() {
            return Ok(());
        }

        writer.start_element(element).map_err(StreamError::Document)?;
        for (key, value) in &merged {
            let text = self.context.converters().display(value)?;
            writer.start_element(key).map_err(StreamError::Document)?;
            writer.characters(&text).map_err(StreamError::Document)?;
            writer.end_element(key).map_err(StreamError::Document)?;
        }
        writer.end_element(element).map_err(StreamError::Document)
    }
}

fn is_attribute(property: &PropertyMetadata) -> bool {
    property.is_attribute() && property.is_endpoint()
}

fn read(property: &PropertyMetadata, owner: Option<&ObjectRef>) -> Result<Value, AccessError> {
    match owner {
        Some(owner) => property.accessor().get(owner),
        None => Ok(Value::Null),
    }
}

fn write_empty<W: DocumentWriter>(
    property: &PropertyMetadata,
    writer: &mut W,
) -> Result<(), StreamError<W::Error>> {
    if !property.include_null() {
        return Ok(());
    }
    writer
        .start_element(property.element_name())
        .map_err(StreamError::Document)?;
    writer
        .end_element(property.element_name())
        .map_err(StreamError::Document)
}
