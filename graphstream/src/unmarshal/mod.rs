//! Unmarshalling: document events in, objects out.
//!
//! The engine is a push state machine. Each event is interpreted against the
//! innermost open selection:
//!
//! | state              | element start                 | text               | element end                |
//! |--------------------|-------------------------------|--------------------|----------------------------|
//! | root               | open collection or root class | ignored            | collection closes          |
//! | class              | enter a property              | error              | instantiate the object     |
//! | property           | composed child or nested item | convert and store  | record an explicit null    |
//! | custom properties  | start a key                   | store under key    | end key or container       |
//!
//! Objects are only built when their element closes, so every value,
//! including nested objects, is known at construction time.

mod selection;
mod values;

use std::collections::BTreeMap;
use std::convert::Infallible;

use selection::{NodeSelection, SelectionStack};
use values::{ObjectValues, PropertyValue};
pub use values::Slot;

use crate::tracing_macros::trace;
use crate::{
    AccessError, ClassMetadata, CustomPropertiesWriter, DocumentEvent, DocumentParser,
    ObjectConsumer, ObjectRef, PropertyKind, PropertyMetadata, RequiredPropertyMissing,
    StreamContext, StreamError, StructureError, Value,
};

type Fault = StreamError<Infallible>;

/// What an unmarshaller produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Unmarshalled {
    /// Nothing: an empty document, a root that carried no values, or a
    /// streaming read whose objects all went to the consumer.
    Empty,
    /// The single root object.
    Single(ObjectRef),
    /// The objects of a collection document, or several root objects.
    List(Vec<ObjectRef>),
}

impl Unmarshalled {
    /// The single root object, if that is what was read.
    pub fn single(self) -> Option<ObjectRef> {
        match self {
            Unmarshalled::Single(object) => Some(object),
            _ => None,
        }
    }

    /// All objects read, in document order.
    pub fn into_vec(self) -> Vec<ObjectRef> {
        match self {
            Unmarshalled::Empty => Vec::new(),
            Unmarshalled::Single(object) => vec![object],
            Unmarshalled::List(objects) => objects,
        }
    }

    /// Whether nothing was read.
    pub fn is_empty(&self) -> bool {
        matches!(self, Unmarshalled::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Root,
    Class,
    Property,
    CustomProperties,
}

#[derive(Debug, Default)]
struct CustomCapture {
    pairs: BTreeMap<String, String>,
    key: Option<String>,
    depth: usize,
}

/// Reads documents into objects according to a [`StreamContext`].
///
/// Feed it a whole document with [`read`](Self::read), or push events one at
/// a time with [`element_start`](Self::element_start),
/// [`text`](Self::text) and [`element_end`](Self::element_end), then call
/// [`finish`](Self::finish).
pub struct Unmarshaller<'a> {
    context: &'a StreamContext,
    selection: SelectionStack,
    objects: Vec<ObjectValues>,
    collection_open: bool,
    custom: Option<CustomCapture>,
    results: Vec<ObjectRef>,
    consumer: Option<&'a mut dyn ObjectConsumer>,
    writers: Vec<Box<dyn CustomPropertiesWriter + 'a>>,
}

impl<'a> Unmarshaller<'a> {
    pub(crate) fn new(
        context: &'a StreamContext,
        consumer: Option<&'a mut dyn ObjectConsumer>,
    ) -> Self {
        Self {
            context,
            selection: SelectionStack::default(),
            objects: Vec::new(),
            collection_open: false,
            custom: None,
            results: Vec::new(),
            consumer,
            writers: Vec::new(),
        }
    }

    /// Adds a receiver for captured custom properties.
    pub fn add_property_writer(&mut self, writer: impl CustomPropertiesWriter + 'a) -> &mut Self {
        self.writers.push(Box::new(writer));
        self
    }

    /// Removes the writer at `index` in registration order.
    pub fn remove_property_writer(
        &mut self,
        index: usize,
    ) -> Option<Box<dyn CustomPropertiesWriter + 'a>> {
        (index < self.writers.len()).then(|| self.writers.remove(index))
    }

    /// Reads every event of `parser`, then finishes.
    pub fn read<'de, P: DocumentParser<'de>>(
        mut self,
        parser: &mut P,
    ) -> Result<Unmarshalled, StreamError<P::Error>> {
        while let Some(event) = parser.next_event().map_err(StreamError::Document)? {
            match event {
                DocumentEvent::ElementStart { name, attributes } => {
                    let attributes: Vec<(&str, &str)> = attributes
                        .iter()
                        .map(|(k, v)| (k.as_ref(), v.as_ref()))
                        .collect();
                    self.start(&name, &attributes)
                        .map_err(Fault::widen::<P::Error>)?;
                }
                DocumentEvent::Text(text) => {
                    self.on_text(&text).map_err(Fault::widen::<P::Error>)?;
                }
                DocumentEvent::ElementEnd { name } => {
                    self.end(&name).map_err(Fault::widen::<P::Error>)?;
                }
            }
        }
        self.finish()
    }

    /// Pushes an element start with its attributes.
    pub fn element_start<E>(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> Result<(), StreamError<E>> {
        self.start(name, attributes).map_err(Fault::widen)
    }

    /// Pushes character data.
    pub fn text<E>(&mut self, text: &str) -> Result<(), StreamError<E>> {
        self.on_text(text).map_err(Fault::widen)
    }

    /// Pushes an element end.
    pub fn element_end<E>(&mut self, name: &str) -> Result<(), StreamError<E>> {
        self.end(name).map_err(Fault::widen)
    }

    /// Completes the read and returns what was collected.
    pub fn finish<E>(self) -> Result<Unmarshalled, StreamError<E>> {
        if !self.selection.is_empty() {
            return Err(self.structure("document ended inside an open element").widen());
        }
        let mut results = self.results;
        Ok(match results.len() {
            0 => Unmarshalled::Empty,
            1 if !self.collection_open => match results.pop() {
                Some(object) => Unmarshalled::Single(object),
                None => Unmarshalled::Empty,
            },
            _ => Unmarshalled::List(results),
        })
    }

    fn state(&self) -> NodeState {
        match self.selection.top() {
            None => NodeState::Root,
            Some(_) if self.custom.is_some() => NodeState::CustomProperties,
            Some(NodeSelection::Class(_)) => NodeState::Class,
            Some(NodeSelection::Property { .. }) => NodeState::Property,
        }
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), Fault> {
        let state = self.state();
        #[cfg(feature = "tracing")]
        {
            use owo_colors::OwoColorize;
            trace!(element = %name.cyan(), ?state, "element start");
        }
        match state {
            NodeState::Root => self.start_root(name, attributes),
            NodeState::Class => self.start_in_class(name, attributes),
            NodeState::Property => self.start_in_property(name, attributes),
            NodeState::CustomProperties => {
                if let Some(capture) = self.custom.as_mut() {
                    capture.depth += 1;
                    capture.key = Some(name.to_string());
                }
                Ok(())
            }
        }
    }

    fn start_root(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), Fault> {
        let metadata = self.context.metadata();
        if let Some(collection) = metadata.collection()
            && !self.collection_open
        {
            if collection.name() != name {
                return Err(self.structure(format!(
                    "expected collection element <{}>, found <{name}>",
                    collection.name()
                )));
            }
            self.collection_open = true;
            return Ok(());
        }

        let class = metadata
            .root_class_by_element(name)
            .ok_or_else(|| self.structure(format!("no graph is mapped to element <{name}>")))?;
        self.selection.push_class(class.id());
        if let Some(consumer) = self.consumer.as_deref_mut() {
            consumer.start_object(class).map_err(Fault::Callback)?;
        }
        self.begin_object(class, attributes)
    }

    fn start_in_class(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), Fault> {
        let context = self.context;
        let Some(NodeSelection::Class(id)) = self.selection.top() else {
            return Err(self.structure("class element expected"));
        };
        let class = context.metadata().class(id);
        if class.custom_properties_element() == Some(name) {
            if !attributes.is_empty() {
                return Err(self.structure("custom properties element cannot carry attributes"));
            }
            self.custom = Some(CustomCapture::default());
            return Ok(());
        }
        let property = class.find_by_element(name).ok_or_else(|| {
            self.structure(format!("element <{name}> is not mapped in graph `{}`", class.name()))
        })?;
        self.enter_property(class, property, attributes)
    }

    fn start_in_property(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), Fault> {
        let context = self.context;
        let Some(NodeSelection::Property {
            class, property, ..
        }) = self.selection.top()
        else {
            return Err(self.structure("property element expected"));
        };
        let class = context.metadata().class(class);
        let property = class.property(property);
        self.selection.mark_populated();

        match property.kind() {
            PropertyKind::Composed => {
                let child = class.find_child_by_element(property, name).ok_or_else(|| {
                    self.structure(format!(
                        "element <{name}> is not mapped under `{}`",
                        property.path()
                    ))
                })?;
                self.enter_property(class, child, attributes)
            }
            PropertyKind::NestedCollection(nested) => {
                let nested = context.metadata().class(nested);
                if nested.name() != name {
                    return Err(self.structure(format!(
                        "expected <{}> items in `{}`, found <{name}>",
                        nested.name(),
                        property.path()
                    )));
                }
                self.selection.push_class(nested.id());
                self.begin_object(nested, attributes)
            }
            _ => Err(self.structure(format!(
                "property `{}` cannot hold element <{name}>",
                property.path()
            ))),
        }
    }

    fn enter_property(
        &mut self,
        class: &ClassMetadata,
        property: &PropertyMetadata,
        attributes: &[(&str, &str)],
    ) -> Result<(), Fault> {
        self.selection.push_property(class.id(), property.index());
        match property.kind() {
            PropertyKind::Nested(nested) => {
                let nested = self.context.metadata().class(nested);
                self.selection.push_class(nested.id());
                self.begin_object(nested, attributes)
            }
            PropertyKind::Composed => {
                for (name, text) in attributes {
                    let child = class
                        .find_child_by_element(property, name)
                        .filter(|child| child.is_endpoint())
                        .ok_or_else(|| {
                            self.structure(format!(
                                "attribute `{name}` is not mapped under `{}`",
                                property.path()
                            ))
                        })?;
                    self.store_text(class, child, text)?;
                }
                Ok(())
            }
            _ if attributes.is_empty() => Ok(()),
            _ => Err(self.structure(format!(
                "property element <{}> cannot carry attributes",
                property.element_name()
            ))),
        }
    }

    /// Opens the values of a new object and stores its attributes.
    fn begin_object(
        &mut self,
        class: &ClassMetadata,
        attributes: &[(&str, &str)],
    ) -> Result<(), Fault> {
        self.objects.push(ObjectValues::new(class.id()));
        for (name, text) in attributes {
            let property = class
                .find_by_element(name)
                .filter(|p| p.is_endpoint())
                .ok_or_else(|| {
                    self.structure(format!(
                        "attribute `{name}` is not mapped in graph `{}`",
                        class.name()
                    ))
                })?;
            self.store_text(class, property, text)?;
        }
        Ok(())
    }

    fn store_text(
        &mut self,
        class: &ClassMetadata,
        property: &PropertyMetadata,
        text: &str,
    ) -> Result<(), Fault> {
        let value = self
            .context
            .converters()
            .from_text(text, &property.conversion_type())?;
        trace!(property = property.path(), %value, "stored");
        self.current()?.store(class, property, value);
        Ok(())
    }

    fn on_text(&mut self, text: &str) -> Result<(), Fault> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        match self.state() {
            NodeState::Root => Ok(()),
            NodeState::Class => Err(self.structure(format!("unexpected text `{text}`"))),
            NodeState::Property => {
                let context = self.context;
                let Some(NodeSelection::Property {
                    class, property, ..
                }) = self.selection.top()
                else {
                    return Err(self.structure("property element expected"));
                };
                let class = context.metadata().class(class);
                let property = class.property(property);
                if !matches!(
                    property.kind(),
                    PropertyKind::Scalar | PropertyKind::ScalarCollection
                ) {
                    return Err(self.structure(format!(
                        "property `{}` cannot hold text `{text}`",
                        property.path()
                    )));
                }
                self.store_text(class, property, text)?;
                self.selection.mark_populated();
                Ok(())
            }
            NodeState::CustomProperties => {
                if let Some(capture) = self.custom.as_mut()
                    && let Some(key) = capture.key.clone()
                {
                    capture.pairs.insert(key, text.to_string());
                    return Ok(());
                }
                Err(self.structure(format!("custom property text `{text}` has no key")))
            }
        }
    }

    fn end(&mut self, _name: &str) -> Result<(), Fault> {
        trace!(element = _name, "element end");
        match self.state() {
            NodeState::Root => Ok(()),
            NodeState::Property => self.end_property(),
            NodeState::Class => self.end_class(),
            NodeState::CustomProperties => {
                if let Some(capture) = self.custom.as_mut()
                    && capture.depth > 0
                {
                    capture.depth -= 1;
                    capture.key = None;
                    return Ok(());
                }
                if let Some(capture) = self.custom.take() {
                    self.current()?.set_custom(capture.pairs);
                }
                Ok(())
            }
        }
    }

    fn end_property(&mut self) -> Result<(), Fault> {
        let context = self.context;
        if let Some(NodeSelection::Property {
            class,
            property,
            populated: false,
        }) = self.selection.pop()
        {
            let class = context.metadata().class(class);
            self.current()?.store_null(class, class.property(property));
        }
        Ok(())
    }

    fn end_class(&mut self) -> Result<(), Fault> {
        let context = self.context;
        let values = self
            .objects
            .last()
            .ok_or_else(|| self.structure("no object is open"))?;
        let class = context.metadata().class(values.class());
        if !values.is_empty() {
            self.check_required(class, values)?;
        }
        self.selection.pop();
        let values = self
            .objects
            .pop()
            .ok_or_else(|| self.structure("no object is open"))?;

        let object = if values.is_empty() {
            None
        } else {
            Some(self.instantiate(class, values)?)
        };

        match self.selection.top() {
            Some(NodeSelection::Property {
                class: owner,
                property,
                ..
            }) => {
                let owner = context.metadata().class(owner);
                let property = owner.property(property);
                let values = self.current()?;
                if property.is_collection() {
                    values.push_item(owner, property, object);
                } else {
                    values.store(owner, property, object.map_or(Value::Null, Value::Object));
                    self.selection.pop();
                }
                Ok(())
            }
            Some(NodeSelection::Class(_)) => Err(self.structure("object closed inside an object")),
            None => {
                trace!(graph = class.name(), "root object complete");
                match self.consumer.as_deref_mut() {
                    Some(consumer) => consumer.end_object(object).map_err(Fault::Callback),
                    None => {
                        self.results.extend(object);
                        Ok(())
                    }
                }
            }
        }
    }

    fn check_required(&self, class: &ClassMetadata, values: &ObjectValues) -> Result<(), Fault> {
        for property in class.endpoints() {
            if !property.is_required() {
                continue;
            }
            if !values
                .slot(class, property.index())
                .is_some_and(|slot| slot.is_set())
            {
                return Err(RequiredPropertyMissing {
                    graph: class.name().to_string(),
                    property: property.path().to_string(),
                    path: self.history(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn instantiate(
        &mut self,
        class: &ClassMetadata,
        values: ObjectValues,
    ) -> Result<ObjectRef, Fault> {
        let flattened = values.flatten(class);
        let (entries, custom) = values.into_parts();

        let object = match self.context.intercept(class.descriptor(), &flattened) {
            Some(object) => {
                trace!(graph = class.name(), "instance supplied by interceptor");
                for entry in &entries {
                    self.link_entry(class, &object, entry)?;
                }
                object
            }
            None => {
                let object = class.descriptor().construct()?;
                for entry in entries {
                    self.apply(class, &object, entry)?;
                }
                object
            }
        };

        if let Some(pairs) = custom {
            for writer in &mut self.writers {
                writer.write(&object, &pairs).map_err(Fault::Callback)?;
            }
        }
        Ok(object)
    }

    fn apply(
        &self,
        class: &ClassMetadata,
        owner: &ObjectRef,
        entry: PropertyValue,
    ) -> Result<(), Fault> {
        let property = class.property(entry.property());
        let (slot, children) = entry.into_parts();

        if property.is_composed() {
            if children.is_empty() {
                if slot == Slot::ExplicitNull {
                    property.accessor().set(owner, Value::Null)?;
                }
                return Ok(());
            }
            let existing = if property.accessor().is_readable() {
                property.accessor().get(owner)?
            } else {
                Value::Null
            };
            let target = match existing {
                Value::Object(target) => target,
                _ => {
                    let created = self.create_intermediate(class, property, &children)?;
                    property
                        .accessor()
                        .set(owner, Value::Object(created.clone()))?;
                    created
                }
            };
            for child in children {
                self.apply(class, &target, child)?;
            }
            return Ok(());
        }

        let value = match slot {
            Slot::Unset => return Ok(()),
            Slot::ExplicitNull => Value::Null,
            Slot::Value(value) => value,
        };
        self.link(property, owner, &value)?;
        property.accessor().set(owner, value)?;
        Ok(())
    }

    /// Builds the object behind an intermediate of a dotted path.
    fn create_intermediate(
        &self,
        class: &ClassMetadata,
        property: &PropertyMetadata,
        children: &[PropertyValue],
    ) -> Result<ObjectRef, Fault> {
        let ty = property.value_type();
        let descriptor = self
            .context
            .types()
            .get_by_type(ty.type_id())
            .ok_or(AccessError::NoConstructor {
                type_name: ty.type_name(),
            })?;
        let mut params = BTreeMap::new();
        collect_values(class, children, &mut params);
        match self.context.intercept(descriptor, &params) {
            Some(object) => Ok(object),
            None => Ok(descriptor.construct()?),
        }
    }

    /// Points the nested object(s) held in `value` back at `owner`.
    fn link(
        &self,
        property: &PropertyMetadata,
        owner: &ObjectRef,
        value: &Value,
    ) -> Result<(), Fault> {
        let Some(nested) = property.nested() else {
            return Ok(());
        };
        let Some(link) = self.context.metadata().class(nested).link_parent() else {
            return Ok(());
        };
        let children: Vec<&ObjectRef> = match value {
            Value::Object(child) => vec![child],
            Value::List(items) => items.iter().filter_map(Value::as_object).collect(),
            _ => Vec::new(),
        };
        for child in children {
            link.accessor().set(child, Value::Object(owner.clone()))?;
        }
        Ok(())
    }

    fn link_entry(
        &self,
        class: &ClassMetadata,
        owner: &ObjectRef,
        entry: &PropertyValue,
    ) -> Result<(), Fault> {
        let property = class.property(entry.property());
        if let Slot::Value(value) = entry.slot() {
            self.link(property, owner, value)?;
        }
        Ok(())
    }

    fn current(&mut self) -> Result<&mut ObjectValues, Fault> {
        match self.objects.last_mut() {
            Some(values) => Ok(values),
            None => Err(StreamError::Structure(StructureError {
                message: "no object is open".to_string(),
                path: String::new(),
            })),
        }
    }

    /// Renders the objects being read, outermost first.
    fn history(&self) -> String {
        let metadata = self.context.metadata();
        self.objects
            .iter()
            .map(|values| values.describe(metadata.class(values.class())))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn structure(&self, message: impl Into<String>) -> Fault {
        StreamError::Structure(StructureError {
            message: message.into(),
            path: self.history(),
        })
    }
}

fn collect_values(
    class: &ClassMetadata,
    values: &[PropertyValue],
    out: &mut BTreeMap<String, Value>,
) {
    for value in values {
        if let Slot::Value(v) = value.slot() {
            out.insert(class.property(value.property()).name().to_string(), v.clone());
        }
    }
}
