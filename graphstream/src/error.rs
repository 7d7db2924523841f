//! Error types for metadata building, property access and streaming.

use std::convert::Infallible;
use std::fmt;

/// Error returned by user callbacks: object consumers and custom property writers.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Error raised while compiling a [`GraphSchema`](crate::GraphSchema) into metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A graph names a type that is not registered.
    UnknownType {
        /// The type name from the schema.
        name: String,
    },

    /// A declared property has no accessor on its owning type.
    UnknownProperty {
        /// The owning type.
        owner: String,
        /// The declared property name.
        property: String,
    },

    /// A declaration combines features that cannot be mapped together.
    InvalidComposition {
        /// The owning graph.
        graph: String,
        /// The offending property.
        property: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Two graphs of a collection share an element name.
    ConflictingGraph {
        /// The duplicated element name.
        name: String,
    },

    /// A declared property cannot be accessed the way the mapping requires.
    Access(AccessError),
}

impl From<AccessError> for SchemaError {
    fn from(e: AccessError) -> Self {
        Self::Access(e)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { name } => write!(f, "unknown type `{name}`"),
            Self::UnknownProperty { owner, property } => {
                write!(f, "type `{owner}` has no property `{property}`")
            }
            Self::InvalidComposition {
                graph,
                property,
                reason,
            } => write!(f, "invalid property `{property}` in graph `{graph}`: {reason}"),
            Self::ConflictingGraph { name } => {
                write!(f, "more than one graph is mapped to element <{name}>")
            }
            Self::Access(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SchemaError {}

/// Error raised while reading or writing a property through an accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessError {
    /// The property has no getter.
    NotReadable {
        /// The owning type.
        owner: &'static str,
        /// The property name.
        property: &'static str,
    },

    /// The property has no setter.
    NotWritable {
        /// The owning type.
        owner: &'static str,
        /// The property name.
        property: &'static str,
    },

    /// The instance is not of the accessor's owning type.
    WrongInstance {
        /// The owning type the accessor was built for.
        expected: &'static str,
    },

    /// A value of the wrong shape was handed to a setter.
    TypeMismatch {
        /// The field type.
        expected: &'static str,
        /// What was found.
        got: String,
    },

    /// The instance is already borrowed elsewhere.
    Borrowed {
        /// The instance type.
        type_name: &'static str,
    },

    /// The type cannot be instantiated without an interceptor.
    NoConstructor {
        /// The type that was requested.
        type_name: &'static str,
    },
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReadable { owner, property } => {
                write!(f, "property `{owner}.{property}` is not readable")
            }
            Self::NotWritable { owner, property } => {
                write!(f, "property `{owner}.{property}` is not writable")
            }
            Self::WrongInstance { expected } => {
                write!(f, "accessor applied to an instance that is not a `{expected}`")
            }
            Self::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, got {got}")
            }
            Self::Borrowed { type_name } => {
                write!(f, "instance of `{type_name}` is already borrowed")
            }
            Self::NoConstructor { type_name } => {
                write!(f, "type `{type_name}` has no constructor")
            }
        }
    }
}

impl std::error::Error for AccessError {}

/// Text that could not be converted to or from a typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionError {
    /// The offending text (or a rendering of the offending value).
    pub text: String,
    /// The target type.
    pub target: &'static str,
}

impl ConversionError {
    /// Creates a conversion error for `text` targeting `target`.
    pub fn new(text: impl Into<String>, target: &'static str) -> Self {
        Self {
            text: text.into(),
            target,
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot convert `{}` to {}", self.text, self.target)
    }
}

impl std::error::Error for ConversionError {}

/// The document does not match the metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureError {
    /// What went wrong.
    pub message: String,
    /// Rendering of the objects being read when the error occurred.
    pub path: String,
}

impl fmt::Display for StructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (while reading {})", self.message, self.path)
        }
    }
}

impl std::error::Error for StructureError {}

/// A required property received no value before its object closed.
#[derive(Debug, Clone, PartialEq)]
pub struct RequiredPropertyMissing {
    /// The graph whose object was being completed.
    pub graph: String,
    /// Dotted path of the missing property.
    pub property: String,
    /// Rendering of the objects being read when the error occurred.
    pub path: String,
}

impl fmt::Display for RequiredPropertyMissing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "property `{}.{}` is required (while reading {})",
            self.graph, self.property, self.path
        )
    }
}

impl std::error::Error for RequiredPropertyMissing {}

/// Error returned by the marshalling and unmarshalling engines.
///
/// `E` is the document layer's error: the writer's error when marshalling,
/// the parser's error when unmarshalling.
#[derive(Debug)]
pub enum StreamError<E> {
    /// The document writer or parser failed.
    Document(E),

    /// Metadata could not be built.
    Schema(SchemaError),

    /// A property could not be read or written.
    Access(AccessError),

    /// A value could not be converted.
    Conversion(ConversionError),

    /// The document does not match the metadata.
    Structure(StructureError),

    /// A required property is missing.
    RequiredPropertyMissing(RequiredPropertyMissing),

    /// A user callback failed.
    Callback(CallbackError),
}

impl StreamError<Infallible> {
    /// Re-types an error that cannot carry a document error.
    pub fn widen<E>(self) -> StreamError<E> {
        match self {
            StreamError::Document(never) => match never {},
            StreamError::Schema(e) => StreamError::Schema(e),
            StreamError::Access(e) => StreamError::Access(e),
            StreamError::Conversion(e) => StreamError::Conversion(e),
            StreamError::Structure(e) => StreamError::Structure(e),
            StreamError::RequiredPropertyMissing(e) => StreamError::RequiredPropertyMissing(e),
            StreamError::Callback(e) => StreamError::Callback(e),
        }
    }
}

impl<E> From<SchemaError> for StreamError<E> {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

impl<E> From<AccessError> for StreamError<E> {
    fn from(e: AccessError) -> Self {
        Self::Access(e)
    }
}

impl<E> From<ConversionError> for StreamError<E> {
    fn from(e: ConversionError) -> Self {
        Self::Conversion(e)
    }
}

impl<E> From<StructureError> for StreamError<E> {
    fn from(e: StructureError) -> Self {
        Self::Structure(e)
    }
}

impl<E> From<RequiredPropertyMissing> for StreamError<E> {
    fn from(e: RequiredPropertyMissing) -> Self {
        Self::RequiredPropertyMissing(e)
    }
}

impl<E: fmt::Display> fmt::Display for StreamError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(e) => write!(f, "document error: {e}"),
            Self::Schema(e) => write!(f, "schema error: {e}"),
            Self::Access(e) => write!(f, "access error: {e}"),
            Self::Conversion(e) => write!(f, "conversion error: {e}"),
            Self::Structure(e) => write!(f, "structure error: {e}"),
            Self::RequiredPropertyMissing(e) => write!(f, "{e}"),
            Self::Callback(e) => write!(f, "callback failed: {e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for StreamError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Document(e) => Some(e),
            Self::Schema(e) => Some(e),
            Self::Access(e) => Some(e),
            Self::Conversion(e) => Some(e),
            Self::Structure(e) => Some(e),
            Self::RequiredPropertyMissing(e) => Some(e),
            Self::Callback(e) => Some(e.as_ref()),
        }
    }
}
