//! The stream context and the user hooks it and its engines call.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::tracing_macros::debug;
use crate::{
    CallbackError, ClassMetadata, Converter, ConverterRegistry, GraphMetadata, GraphSchema,
    Marshaller, ObjectRef, SchemaError, TypeDescriptor, TypeRegistry, Unmarshaller, Value,
};

/// Hook into object creation and runtime type resolution.
///
/// Both methods default to deferring to the engine.
pub trait InstantiationInterceptor: Send + Sync {
    /// Supplies a fully built instance for `descriptor`, given the values
    /// collected for it keyed by property path. Returning `Some` skips the
    /// engine's own construction and value application.
    fn new_object(
        &self,
        descriptor: &TypeDescriptor,
        properties: &BTreeMap<String, Value>,
    ) -> Option<ObjectRef> {
        let _ = (descriptor, properties);
        None
    }

    /// Reports the type `object` should be written as.
    fn resolve_runtime_type(&self, object: &ObjectRef) -> Option<TypeId> {
        let _ = object;
        None
    }
}

/// Supplies free-form key/value pairs for an object while marshalling.
pub trait CustomPropertiesReader {
    /// Pairs for `object`, or `None` to contribute nothing.
    fn read(&self, object: &ObjectRef) -> Option<BTreeMap<String, Value>>;
}

impl<F> CustomPropertiesReader for F
where
    F: Fn(&ObjectRef) -> Option<BTreeMap<String, Value>>,
{
    fn read(&self, object: &ObjectRef) -> Option<BTreeMap<String, Value>> {
        self(object)
    }
}

/// Receives free-form key/value pairs captured while unmarshalling.
pub trait CustomPropertiesWriter {
    /// Called once the object owning the pairs has been instantiated.
    fn write(
        &mut self,
        object: &ObjectRef,
        properties: &BTreeMap<String, String>,
    ) -> Result<(), CallbackError>;
}

impl<F> CustomPropertiesWriter for F
where
    F: FnMut(&ObjectRef, &BTreeMap<String, String>) -> Result<(), CallbackError>,
{
    fn write(
        &mut self,
        object: &ObjectRef,
        properties: &BTreeMap<String, String>,
    ) -> Result<(), CallbackError> {
        self(object, properties)
    }
}

/// Receives root objects one by one instead of collecting them.
pub trait ObjectConsumer {
    /// A root element of `class` opened.
    fn start_object(&mut self, class: &ClassMetadata) -> Result<(), CallbackError> {
        let _ = class;
        Ok(())
    }

    /// The root element closed. `None` means it carried no values.
    fn end_object(&mut self, object: Option<ObjectRef>) -> Result<(), CallbackError>;
}

/// Supplies root objects by index while marshalling, until it returns `None`.
pub trait ObjectProvider {
    /// The object at `index`.
    fn object_at(&mut self, index: usize) -> Option<ObjectRef>;
}

impl<F> ObjectProvider for F
where
    F: FnMut(usize) -> Option<ObjectRef>,
{
    fn object_at(&mut self, index: usize) -> Option<ObjectRef> {
        self(index)
    }
}

/// Compiled metadata plus everything the engines share: types, converters
/// and instantiation interceptors.
///
/// A context is immutable once the engines run and may be shared between
/// any number of them.
pub struct StreamContext {
    metadata: GraphMetadata,
    types: TypeRegistry,
    converters: ConverterRegistry,
    interceptors: Vec<Arc<dyn InstantiationInterceptor>>,
}

impl StreamContext {
    /// Compiles `schema` against `types`.
    pub fn new(schema: &GraphSchema, types: TypeRegistry) -> Result<Self, SchemaError> {
        let metadata = GraphMetadata::build(schema, &types)?;
        debug!(
            classes = metadata.classes().len(),
            types = types.len(),
            "stream context ready"
        );
        Ok(Self {
            metadata,
            types,
            converters: ConverterRegistry::new(),
            interceptors: Vec::new(),
        })
    }

    /// The compiled metadata.
    pub fn metadata(&self) -> &GraphMetadata {
        &self.metadata
    }

    /// The registered types.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// The converters.
    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Uses `converter` for fields of type `T`.
    pub fn register_converter<T: Any>(&mut self, converter: impl Converter + 'static) -> &mut Self {
        self.converters.register::<T>(converter);
        self
    }

    /// Adds an interceptor. Interceptors are consulted in registration order;
    /// the first answer wins.
    pub fn add_interceptor(
        &mut self,
        interceptor: impl InstantiationInterceptor + 'static,
    ) -> &mut Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Removes the interceptor at `index` in registration order.
    pub fn remove_interceptor(
        &mut self,
        index: usize,
    ) -> Option<Arc<dyn InstantiationInterceptor>> {
        (index < self.interceptors.len()).then(|| self.interceptors.remove(index))
    }

    /// The registered interceptors.
    pub fn interceptors(&self) -> &[Arc<dyn InstantiationInterceptor>] {
        &self.interceptors
    }

    /// A marshaller bound to this context.
    pub fn marshaller(&self) -> Marshaller<'_> {
        Marshaller::new(self)
    }

    /// An unmarshaller that collects root objects.
    pub fn unmarshaller(&self) -> Unmarshaller<'_> {
        Unmarshaller::new(self, None)
    }

    /// An unmarshaller that hands each root object to `consumer`.
    pub fn streaming_unmarshaller<'a>(
        &'a self,
        consumer: &'a mut dyn ObjectConsumer,
    ) -> Unmarshaller<'a> {
        Unmarshaller::new(self, Some(consumer))
    }

    /// Asks the interceptors for an instance of `descriptor`.
    pub fn intercept(
        &self,
        descriptor: &TypeDescriptor,
        properties: &BTreeMap<String, Value>,
    ) -> Option<ObjectRef> {
        self.interceptors
            .iter()
            .find_map(|interceptor| interceptor.new_object(descriptor, properties))
    }

    /// The type `object` is written as: the first interceptor's answer, or
    /// its concrete type.
    pub fn runtime_type(&self, object: &ObjectRef) -> TypeId {
        self.interceptors
            .iter()
            .find_map(|interceptor| interceptor.resolve_runtime_type(object))
            .unwrap_or_else(|| object.type_id())
    }
}

impl fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamContext")
            .field("metadata", &self.metadata)
            .field("types", &self.types)
            .field("converters", &self.converters)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
