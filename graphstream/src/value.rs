//! Dynamic values exchanged between accessors, converters and the engines.

use std::any::{Any, TypeId, type_name};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::{Rc, Weak};

use chrono::{DateTime, FixedOffset};

use crate::AccessError;

/// A shared, mutable object. Nested objects in a graph are held this way so
/// that both engines and the owning object can reach them.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wraps `value` into a [`Shared`] handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// A type-erased handle to a [`Shared`] object.
///
/// Cloning the handle clones the pointer, not the object.
#[derive(Clone)]
pub struct ObjectRef {
    cell: Rc<RefCell<dyn Any>>,
    typed: Rc<dyn Any>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ObjectRef {
    /// Moves `value` into a fresh shared object.
    pub fn new<T: Any>(value: T) -> Self {
        Self::from_shared(shared(value))
    }

    /// Erases an existing shared object.
    pub fn from_shared<T: Any>(object: Shared<T>) -> Self {
        let typed: Rc<dyn Any> = object.clone();
        Self {
            cell: object,
            typed,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Recovers the typed handle if the object is a `T`.
    pub fn downcast<T: Any>(&self) -> Option<Shared<T>> {
        self.typed.clone().downcast::<RefCell<T>>().ok()
    }

    /// Whether the object is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// The concrete type of the object.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust name of the concrete type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrows the object for reading.
    pub fn borrow(&self) -> Result<Ref<'_, dyn Any>, AccessError> {
        self.cell.try_borrow().map_err(|_| AccessError::Borrowed {
            type_name: self.type_name,
        })
    }

    /// Borrows the object for writing.
    pub fn borrow_mut(&self) -> Result<RefMut<'_, dyn Any>, AccessError> {
        self.cell.try_borrow_mut().map_err(|_| AccessError::Borrowed {
            type_name: self.type_name,
        })
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.typed, &other.typed)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef<{}>@{:p}", self.type_name, Rc::as_ptr(&self.typed))
    }
}

impl<T: Any> From<Shared<T>> for ObjectRef {
    fn from(object: Shared<T>) -> Self {
        Self::from_shared(object)
    }
}

/// A property value in flight between an object and a document.
#[derive(Debug, Clone)]
pub enum Value {
    /// No value.
    Null,
    /// A string.
    Text(String),
    /// A 32-bit integer.
    Int(i32),
    /// A 64-bit integer.
    Long(i64),
    /// A single character.
    Char(char),
    /// A boolean.
    Bool(bool),
    /// A 32-bit float.
    Float(f32),
    /// A 64-bit float.
    Double(f64),
    /// A timestamp with its offset.
    DateTime(DateTime<FixedOffset>),
    /// An enumeration constant, by name.
    Enum(&'static str),
    /// A value only a registered converter understands.
    Custom(Rc<dyn Any>),
    /// A nested object.
    Object(ObjectRef),
    /// The items of a collection, in order.
    List(Vec<Value>),
}

impl Value {
    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The nested object, if this is one.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The collection items, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Char(_) => "char",
            Value::Bool(_) => "bool",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::DateTime(_) => "date-time",
            Value::Enum(_) => "enum",
            Value::Custom(_) => "custom value",
            Value::Object(_) => "object",
            Value::List(_) => "list",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Custom(a), Value::Custom(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Text(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::DateTime(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Enum(name) => f.write_str(name),
            Value::Custom(_) => f.write_str("<custom>"),
            Value::Object(object) => write!(f, "<{}>", object.type_name()),
            Value::List(items) => write!(f, "[{} items]", items.len()),
        }
    }
}

/// What a field holds, as far as conversion and metadata care.
#[derive(Clone, Copy, Debug)]
pub enum ValueKind {
    /// `String`.
    Text,
    /// `i32`.
    Int,
    /// `i64`.
    Long,
    /// `char`.
    Char,
    /// `bool`.
    Bool,
    /// `f32`.
    Float,
    /// `f64`.
    Double,
    /// `DateTime<FixedOffset>`.
    DateTime,
    /// An enumeration with the given constant names.
    Enum(&'static [&'static str]),
    /// A [`Shared`] object.
    Object,
    /// A collection whose items have the returned type.
    Collection(fn() -> ValueType),
    /// A type handled only by a registered converter.
    Custom,
}

/// Static description of a field type.
#[derive(Clone, Copy)]
pub struct ValueType {
    type_id: TypeId,
    type_name: &'static str,
    kind: ValueKind,
}

impl ValueType {
    /// Describes `T` as a value of the given kind.
    pub fn of<T: Any>(kind: ValueKind) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            kind,
        }
    }

    /// The described type. For objects this is the object type, not the handle.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust name of the described type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The value kind.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Whether values of this type are collections.
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, ValueKind::Collection(_))
    }

    /// The item type of a collection, or the type itself.
    pub fn item(&self) -> ValueType {
        match self.kind {
            ValueKind::Collection(item) => item(),
            _ => *self,
        }
    }

    /// Whether the type (or its items) are objects.
    pub fn is_object(&self) -> bool {
        matches!(self.item().kind, ValueKind::Object)
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueType")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A Rust type that can live in a mapped field.
///
/// Implementations exist for the scalar types, `DateTime<FixedOffset>`,
/// `Option`, `Vec`, `BTreeSet`, [`Shared`] objects and weak back-references.
/// Enumerations opt in with [`enumeration!`](crate::enumeration).
pub trait FieldValue: Sized + 'static {
    /// Static description of the field type.
    fn value_type() -> ValueType;

    /// Reads the field into a [`Value`].
    fn to_value(&self) -> Value;

    /// Converts a [`Value`] back into the field type.
    fn from_value(value: Value) -> Result<Self, AccessError>;
}

pub(crate) fn mismatch<T>(value: &Value) -> AccessError {
    AccessError::TypeMismatch {
        expected: type_name::<T>(),
        got: value.kind_name().to_string(),
    }
}

macro_rules! scalar_field {
    ($ty:ty, $kind:ident) => {
        impl FieldValue for $ty {
            fn value_type() -> ValueType {
                ValueType::of::<$ty>(ValueKind::$kind)
            }

            fn to_value(&self) -> Value {
                Value::$kind(self.clone())
            }

            fn from_value(value: Value) -> Result<Self, AccessError> {
                match value {
                    Value::$kind(v) => Ok(v),
                    Value::Null => Ok(<$ty>::default()),
                    other => Err(mismatch::<$ty>(&other)),
                }
            }
        }
    };
}

scalar_field!(String, Text);
scalar_field!(i32, Int);
scalar_field!(i64, Long);
scalar_field!(char, Char);
scalar_field!(bool, Bool);
scalar_field!(f32, Float);
scalar_field!(f64, Double);
scalar_field!(DateTime<FixedOffset>, DateTime);

impl<T: FieldValue> FieldValue for Option<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn to_value(&self) -> Value {
        match self {
            Some(value) => value.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::of::<Vec<T>>(ValueKind::Collection(T::value_type))
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn value_type() -> ValueType {
        ValueType::of::<BTreeSet<T>>(ValueKind::Collection(T::value_type))
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            Value::Null => Ok(BTreeSet::new()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: Any> FieldValue for Shared<T> {
    fn value_type() -> ValueType {
        ValueType::of::<T>(ValueKind::Object)
    }

    fn to_value(&self) -> Value {
        Value::Object(ObjectRef::from_shared(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Object(object) => {
                object
                    .downcast::<T>()
                    .ok_or_else(|| AccessError::TypeMismatch {
                        expected: type_name::<T>(),
                        got: object.type_name().to_string(),
                    })
            }
            other => Err(mismatch::<T>(&other)),
        }
    }
}

/// Back-references to an owner are held weakly so that parent and child do
/// not keep each other alive.
impl<T: Any> FieldValue for Weak<RefCell<T>> {
    fn value_type() -> ValueType {
        ValueType::of::<T>(ValueKind::Object)
    }

    fn to_value(&self) -> Value {
        match self.upgrade() {
            Some(object) => Value::Object(ObjectRef::from_shared(object)),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, AccessError> {
        match value {
            Value::Null => Ok(Weak::new()),
            other => Shared::<T>::from_value(other).map(|object| Rc::downgrade(&object)),
        }
    }
}

/// Implements [`FieldValue`] for a fieldless enum, mapping each variant to
/// its name.
///
/// ```
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Status {
///     Open,
///     Closed,
/// }
///
/// graphstream::enumeration!(Status { Open, Closed });
///
/// use graphstream::{FieldValue, Value};
/// assert_eq!(Status::Closed.to_value(), Value::Enum("Closed"));
/// assert_eq!(Status::from_value(Value::Enum("Open")), Ok(Status::Open));
/// ```
#[macro_export]
macro_rules! enumeration {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::FieldValue for $name {
            fn value_type() -> $crate::ValueType {
                $crate::ValueType::of::<$name>($crate::ValueKind::Enum(&[
                    $(stringify!($variant)),+
                ]))
            }

            fn to_value(&self) -> $crate::Value {
                match self {
                    $($name::$variant => $crate::Value::Enum(stringify!($variant)),)+
                }
            }

            fn from_value(
                value: $crate::Value,
            ) -> ::core::result::Result<Self, $crate::AccessError> {
                match value {
                    $crate::Value::Enum(name) => match name {
                        $(stringify!($variant) => Ok($name::$variant),)+
                        other => Err($crate::AccessError::TypeMismatch {
                            expected: stringify!($name),
                            got: other.to_string(),
                        }),
                    },
                    other => Err($crate::AccessError::TypeMismatch {
                        expected: stringify!($name),
                        got: other.kind_name().to_string(),
                    }),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_recovers_the_shared_handle() {
        let original = shared(String::from("hello"));
        let object = ObjectRef::from_shared(original.clone());
        let back = object.downcast::<String>().unwrap();
        assert!(Rc::ptr_eq(&original, &back));
        assert!(object.downcast::<i32>().is_none());
    }

    #[test]
    fn null_coerces_to_zero_values() {
        assert_eq!(i32::from_value(Value::Null), Ok(0));
        assert_eq!(bool::from_value(Value::Null), Ok(false));
        assert_eq!(String::from_value(Value::Null), Ok(String::new()));
        assert_eq!(Option::<i64>::from_value(Value::Null), Ok(None));
        assert_eq!(Vec::<i32>::from_value(Value::Null), Ok(Vec::new()));
    }

    #[test]
    fn sets_deduplicate_list_values() {
        let set = BTreeSet::<i32>::from_value(Value::List(vec![
            Value::Int(3),
            Value::Int(1),
            Value::Int(3),
        ]))
        .unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn object_fields_report_the_pointee_type() {
        let ty = <Shared<String>>::value_type();
        assert!(ty.is_object());
        assert_eq!(ty.type_id(), TypeId::of::<String>());
        let list = <Vec<Shared<String>>>::value_type();
        assert!(list.is_collection());
        assert_eq!(list.item().type_id(), TypeId::of::<String>());
    }

    #[test]
    fn weak_references_upgrade_while_the_owner_lives() {
        let owner = shared(7_i32);
        let weak = Weak::<RefCell<i32>>::from_value(Value::Object(ObjectRef::from_shared(
            owner.clone(),
        )))
        .unwrap();
        assert!(weak.to_value().as_object().is_some());
        drop(owner);
        assert!(weak.to_value().is_null());
    }
}
