//! Property accessors: uniform, type-erased reads and writes of named fields.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::{AccessError, FieldValue, ObjectRef, Value, ValueType};

type GetFn = dyn Fn(&dyn Any) -> Result<Value, AccessError> + Send + Sync;
type SetFn = dyn Fn(&mut (dyn Any + 'static), Value) -> Result<(), AccessError> + Send + Sync;
type ConstructFn = dyn Fn() -> ObjectRef + Send + Sync;

/// Reads and writes one named property of one type.
///
/// Either half may be missing: a property without a getter is write-only,
/// one without a setter is read-only.
#[derive(Clone)]
pub struct PropertyAccessor {
    owner: &'static str,
    name: &'static str,
    value_type: ValueType,
    getter: Option<Arc<GetFn>>,
    setter: Option<Arc<SetFn>>,
}

impl PropertyAccessor {
    /// The property name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the type declaring the property.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// The field type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Whether [`get`](Self::get) can succeed.
    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    /// Whether [`set`](Self::set) can succeed.
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Reads the property from `instance`.
    pub fn get(&self, instance: &ObjectRef) -> Result<Value, AccessError> {
        let getter = self.getter.as_ref().ok_or(AccessError::NotReadable {
            owner: self.owner,
            property: self.name,
        })?;
        let target = instance.borrow()?;
        getter(&*target)
    }

    /// Writes `value` into the property of `instance`.
    pub fn set(&self, instance: &ObjectRef, value: Value) -> Result<(), AccessError> {
        let setter = self.setter.as_ref().ok_or(AccessError::NotWritable {
            owner: self.owner,
            property: self.name,
        })?;
        let mut target = instance.borrow_mut()?;
        setter(&mut *target, value)
    }
}

impl fmt::Debug for PropertyAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAccessor")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Everything the engines know about a mapped type: its name, how to build
/// a blank instance, and its properties in declaration order.
#[derive(Clone)]
pub struct TypeDescriptor {
    name: &'static str,
    type_id: TypeId,
    constructor: Option<Arc<ConstructFn>>,
    properties: Vec<PropertyAccessor>,
}

impl TypeDescriptor {
    /// Starts describing `T` under the schema-facing `name`.
    pub fn builder<T: Any>(name: &'static str) -> TypeBuilder<T> {
        TypeBuilder {
            name,
            constructor: None,
            properties: Vec::new(),
            inherited: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// The schema-facing type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The described Rust type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// All properties: own ones first, then inherited ones.
    pub fn properties(&self) -> &[PropertyAccessor] {
        &self.properties
    }

    /// Looks a property up by name.
    pub fn property(&self, name: &str) -> Option<&PropertyAccessor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Whether [`construct`](Self::construct) can succeed.
    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    /// Builds a blank instance.
    pub fn construct(&self) -> Result<ObjectRef, AccessError> {
        self.constructor
            .as_ref()
            .map(|construct| construct())
            .ok_or(AccessError::NoConstructor {
                type_name: self.name,
            })
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("constructor", &self.has_constructor())
            .field("properties", &self.properties)
            .finish()
    }
}

/// Builder for a [`TypeDescriptor`].
pub struct TypeBuilder<T> {
    name: &'static str,
    constructor: Option<Arc<ConstructFn>>,
    properties: Vec<PropertyAccessor>,
    inherited: Vec<PropertyAccessor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any> TypeBuilder<T> {
    /// Uses `construct` to build blank instances.
    pub fn constructor(mut self, construct: fn() -> T) -> Self {
        self.constructor = Some(Arc::new(move || ObjectRef::new(construct())));
        self
    }

    /// Uses `T::default` to build blank instances.
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(T::default)
    }

    /// Adds a read-write property backed by a field.
    pub fn field<V: FieldValue>(
        self,
        name: &'static str,
        get: fn(&T) -> &V,
        set: fn(&mut T, V),
    ) -> Self {
        let getter = erase_getter::<T>(move |target| get(target).to_value());
        self.push(name, V::value_type(), Some(getter), Some(erase_setter(set)))
    }

    /// Adds a read-only property computed from the instance.
    pub fn getter<V: FieldValue>(self, name: &'static str, get: fn(&T) -> V) -> Self {
        let getter = erase_getter::<T>(move |target| get(target).to_value());
        self.push(name, V::value_type(), Some(getter), None)
    }

    /// Adds a write-only property.
    pub fn setter<V: FieldValue>(self, name: &'static str, set: fn(&mut T, V)) -> Self {
        self.push(name, V::value_type(), None, Some(erase_setter(set)))
    }

    /// Inherits the properties of `base`, reached through `project` and
    /// `project_mut`. Own properties shadow inherited ones of the same name.
    pub fn extends<B: Any>(
        mut self,
        base: &TypeDescriptor,
        project: fn(&T) -> &B,
        project_mut: fn(&mut T) -> &mut B,
    ) -> Self {
        for accessor in &base.properties {
            let getter = accessor.getter.clone().map(|inner| -> Arc<GetFn> {
                Arc::new(move |target: &dyn Any| {
                    let target = target.downcast_ref::<T>().ok_or(AccessError::WrongInstance {
                        expected: type_name::<T>(),
                    })?;
                    inner(project(target) as &dyn Any)
                })
            });
            let setter = accessor.setter.clone().map(|inner| -> Arc<SetFn> {
                Arc::new(move |target: &mut (dyn Any + 'static), value| {
                    let target = target.downcast_mut::<T>().ok_or(AccessError::WrongInstance {
                        expected: type_name::<T>(),
                    })?;
                    inner(project_mut(target) as &mut dyn Any, value)
                })
            });
            self.inherited.push(PropertyAccessor {
                owner: self.name,
                name: accessor.name,
                value_type: accessor.value_type,
                getter,
                setter,
            });
        }
        self
    }

    /// Finishes the descriptor.
    pub fn build(self) -> TypeDescriptor {
        let mut properties = self.properties;
        for accessor in self.inherited {
            if properties.iter().all(|own| own.name != accessor.name) {
                properties.push(accessor);
            }
        }
        TypeDescriptor {
            name: self.name,
            type_id: TypeId::of::<T>(),
            constructor: self.constructor,
            properties,
        }
    }

    fn push(
        mut self,
        name: &'static str,
        value_type: ValueType,
        getter: Option<Arc<GetFn>>,
        setter: Option<Arc<SetFn>>,
    ) -> Self {
        self.properties.retain(|p| p.name != name);
        self.properties.push(PropertyAccessor {
            owner: self.name,
            name,
            value_type,
            getter,
            setter,
        });
        self
    }
}

fn erase_getter<T: Any>(read: impl Fn(&T) -> Value + Send + Sync + 'static) -> Arc<GetFn> {
    Arc::new(move |target: &dyn Any| {
        let target = target
            .downcast_ref::<T>()
            .ok_or(AccessError::WrongInstance {
                expected: type_name::<T>(),
            })?;
        Ok(read(target))
    })
}

fn erase_setter<T: Any, V: FieldValue>(write: fn(&mut T, V)) -> Arc<SetFn> {
    Arc::new(move |target: &mut (dyn Any + 'static), value| {
        let target = target
            .downcast_mut::<T>()
            .ok_or(AccessError::WrongInstance {
                expected: type_name::<T>(),
            })?;
        write(target, V::from_value(value)?);
        Ok(())
    })
}

/// All mapped types, by schema name and by Rust type.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    by_name: HashMap<&'static str, Arc<TypeDescriptor>>,
    by_type: HashMap<TypeId, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `descriptor`, replacing any previous one with the same name
    /// or type.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.by_name.insert(descriptor.name, descriptor.clone());
        self.by_type.insert(descriptor.type_id, descriptor.clone());
        descriptor
    }

    /// Registers `descriptor` and returns the registry.
    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Looks a type up by schema name.
    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.by_name.get(name)
    }

    /// Looks a type up by Rust type.
    pub fn get_by_type(&self, type_id: TypeId) -> Option<&Arc<TypeDescriptor>> {
        self.by_type.get(&type_id)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}
