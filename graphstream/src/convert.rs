//! Text conversion of leaf values.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use crate::{ConversionError, Value, ValueKind, ValueType};

/// Format used for date-time values: `yyyy-MM-ddTHH:mm:ss` plus a numeric
/// offset such as `+0100`.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Converts leaf values to document text and back.
pub trait Converter: Send + Sync {
    /// Renders a non-null value.
    fn to_text(&self, value: &Value) -> Result<String, ConversionError>;

    /// Parses non-empty text into a value of `target`.
    fn from_text(&self, text: &str, target: &ValueType) -> Result<Value, ConversionError>;
}

/// The built-in conversions for strings, numbers, characters, booleans,
/// date-times and enumerations.
///
/// Booleans are written as `1`/`0` and read from `1`, `0`, `true` or `false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConverters;

impl Converter for DefaultConverters {
    fn to_text(&self, value: &Value) -> Result<String, ConversionError> {
        Ok(match value {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => "0".to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::DateTime(d) => d.format(DATE_TIME_FORMAT).to_string(),
            Value::Enum(name) => (*name).to_string(),
            Value::Custom(_) | Value::Object(_) | Value::List(_) => {
                return Err(ConversionError::new(value.to_string(), "text"));
            }
        })
    }

    fn from_text(&self, text: &str, target: &ValueType) -> Result<Value, ConversionError> {
        let fail = || ConversionError::new(text, target.type_name());
        match target.kind() {
            ValueKind::Text => Ok(Value::Text(text.to_string())),
            ValueKind::Int => text.trim().parse().map(Value::Int).map_err(|_| fail()),
            ValueKind::Long => text.trim().parse().map(Value::Long).map_err(|_| fail()),
            ValueKind::Float => text.trim().parse().map(Value::Float).map_err(|_| fail()),
            ValueKind::Double => text.trim().parse().map(Value::Double).map_err(|_| fail()),
            ValueKind::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(fail()),
                }
            }
            ValueKind::Bool => match text.trim() {
                "1" | "true" => Ok(Value::Bool(true)),
                "0" | "false" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            ValueKind::DateTime => {
                DateTime::<FixedOffset>::parse_from_str(text.trim(), DATE_TIME_FORMAT)
                    .map(Value::DateTime)
                    .map_err(|_| fail())
            }
            ValueKind::Enum(constants) => constants
                .iter()
                .find(|name| **name == text)
                .map(|name| Value::Enum(*name))
                .ok_or_else(fail),
            ValueKind::Collection(item) => self.from_text(text, &item()),
            ValueKind::Object | ValueKind::Custom => Err(fail()),
        }
    }
}

/// Converter lookup: per-type overrides first, [`DefaultConverters`] otherwise.
///
/// Null values render as empty text and empty text parses as null, whatever
/// the converter.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    overrides: HashMap<TypeId, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// A registry with only the built-in conversions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `converter` for fields of type `T`, and for collections of `T`.
    pub fn register<T: Any>(&mut self, converter: impl Converter + 'static) {
        self.overrides.insert(TypeId::of::<T>(), Arc::new(converter));
    }

    /// The converter responsible for `target`.
    pub fn find(&self, target: &ValueType) -> &dyn Converter {
        match self.overrides.get(&target.item().type_id()) {
            Some(converter) => converter.as_ref(),
            None => &DefaultConverters,
        }
    }

    /// Renders `value`, a value of `target`.
    pub fn to_text(&self, target: &ValueType, value: &Value) -> Result<String, ConversionError> {
        if value.is_null() {
            return Ok(String::new());
        }
        self.find(target).to_text(value)
    }

    /// Parses `text` into a value of `target`.
    pub fn from_text(&self, text: &str, target: &ValueType) -> Result<Value, ConversionError> {
        if text.is_empty() {
            return Ok(Value::Null);
        }
        self.find(target).from_text(text, target)
    }

    /// Renders a value whose declared type is unknown, such as a custom
    /// property. Custom values are rendered by the converter registered for
    /// their concrete type.
    pub fn display(&self, value: &Value) -> Result<String, ConversionError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Custom(inner) => match self.overrides.get(&Any::type_id(&**inner)) {
                Some(converter) => converter.to_text(value),
                None => Err(ConversionError::new(value.to_string(), "text")),
            },
            other => DefaultConverters.to_text(other),
        }
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("overrides", &self.overrides.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldValue;
    use chrono::TimeZone;

    #[test]
    fn booleans_are_written_as_digits() {
        let registry = ConverterRegistry::new();
        let ty = bool::value_type();
        assert_eq!(registry.to_text(&ty, &Value::Bool(true)).unwrap(), "1");
        assert_eq!(registry.to_text(&ty, &Value::Bool(false)).unwrap(), "0");
        assert_eq!(registry.from_text("true", &ty).unwrap(), Value::Bool(true));
        assert_eq!(registry.from_text("0", &ty).unwrap(), Value::Bool(false));
        assert!(registry.from_text("yes", &ty).is_err());
    }

    #[test]
    fn empty_text_is_null() {
        let registry = ConverterRegistry::new();
        assert_eq!(registry.from_text("", &i32::value_type()).unwrap(), Value::Null);
        assert_eq!(registry.to_text(&i32::value_type(), &Value::Null).unwrap(), "");
    }

    #[test]
    fn characters_need_exactly_one_char() {
        let registry = ConverterRegistry::new();
        let ty = char::value_type();
        assert_eq!(registry.from_text("x", &ty).unwrap(), Value::Char('x'));
        let err = registry.from_text("xy", &ty).unwrap_err();
        assert_eq!(err.text, "xy");
        assert_eq!(err.target, "char");
    }

    #[test]
    fn date_times_keep_their_offset() {
        let registry = ConverterRegistry::new();
        let ty = <chrono::DateTime<FixedOffset>>::value_type();
        let offset = FixedOffset::east_opt(3600).unwrap();
        let moment = offset.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let text = registry.to_text(&ty, &Value::DateTime(moment)).unwrap();
        assert_eq!(text, "2024-03-01T12:30:05+0100");
        assert_eq!(registry.from_text(&text, &ty).unwrap(), Value::DateTime(moment));
    }

    #[test]
    fn malformed_numbers_report_target() {
        let registry = ConverterRegistry::new();
        let err = registry.from_text("twelve", &i64::value_type()).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert `twelve` to i64");
    }

    #[test]
    fn collections_convert_through_their_items() {
        let registry = ConverterRegistry::new();
        let ty = <Vec<i32>>::value_type();
        assert_eq!(registry.from_text("42", &ty).unwrap(), Value::Int(42));
    }

    struct Shouting;

    impl Converter for Shouting {
        fn to_text(&self, value: &Value) -> Result<String, ConversionError> {
            Ok(value.to_string().to_uppercase())
        }

        fn from_text(&self, text: &str, _target: &ValueType) -> Result<Value, ConversionError> {
            Ok(Value::Text(text.to_lowercase()))
        }
    }

    #[test]
    fn overrides_take_precedence() {
        let mut registry = ConverterRegistry::new();
        registry.register::<String>(Shouting);
        let ty = String::value_type();
        assert_eq!(
            registry.to_text(&ty, &Value::Text("abc".into())).unwrap(),
            "ABC"
        );
        assert_eq!(
            registry.from_text("XyZ", &ty).unwrap(),
            Value::Text("xyz".into())
        );
        assert_eq!(
            registry.to_text(&i32::value_type(), &Value::Int(3)).unwrap(),
            "3"
        );
    }
}
