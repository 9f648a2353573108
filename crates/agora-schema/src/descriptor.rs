//! Compiling example templates into schema descriptors.
//!
//! A template is an example value whose shape declares the accepted input:
//!
//! | Template | Accepts |
//! |---|---|
//! | `null` | anything |
//! | `true` / `false` | a boolean |
//! | `0` | an integer |
//! | `0.0` | any number |
//! | `""` | any string |
//! | `"[a-z]+"` | a string matching the whole pattern |
//! | `[]` | any array |
//! | `[t]` | an array of `t` |
//! | `[t1, t2]` | a two-element tuple |
//! | `{}` | any object |
//! | `{"k": t, "o?": t}` | an object with required `k` and optional (nullable) `o` |

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};
use crate::validation;

/// Suffix marking an optional, nullable record field in a template.
pub const OPTIONAL_SUFFIX: char = '?';

/// A compiled schema.
///
/// Descriptors are immutable and cheap to share; compile once per service
/// registration and reuse for every exchange.
#[derive(Debug, Clone)]
pub enum Descriptor {
    /// Any value, including `null`.
    Any,
    /// A JSON boolean.
    Boolean,
    /// An integral number.
    Integer,
    /// Any number.
    Number,
    /// Any string.
    String,
    /// A string fully matching the pattern.
    Pattern(Regex),
    /// Any array.
    AnyArray,
    /// An array whose elements all match the descriptor.
    Array(Box<Descriptor>),
    /// A fixed-length array matched position by position.
    Tuple(Vec<Descriptor>),
    /// Any object.
    AnyRecord,
    /// An object with declared fields; undeclared fields are ignored.
    Record(IndexMap<String, Field>),
    /// `null` or a value matching the descriptor.
    Nullable(Box<Descriptor>),
}

/// A declared record field.
#[derive(Debug, Clone)]
pub struct Field {
    /// Descriptor the field value must satisfy.
    pub descriptor: Descriptor,
    /// Whether the field must be present.
    pub required: bool,
}

impl Descriptor {
    /// Compiles a template value into a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when a string pattern is not a valid regular
    /// expression.
    ///
    /// # Example
    ///
    /// ```
    /// use agora_schema::Descriptor;
    /// use serde_json::json;
    ///
    /// let descriptor = Descriptor::compile(&json!({"name": "", "age": 0})).unwrap();
    /// assert!(descriptor.validate(&json!({"name": "ada", "age": 36})).is_ok());
    /// assert!(descriptor.validate(&json!({"name": "ada"})).is_err());
    /// ```
    pub fn compile(template: &Value) -> SchemaResult<Self> {
        compile_at(template, "$")
    }

    /// Validates a value against this descriptor.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] found.
    pub fn validate(&self, value: &Value) -> SchemaResult<()> {
        validation::validate(value, self)
    }

    /// Returns `true` if this descriptor accepts every value.
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

fn compile_at(template: &Value, path: &str) -> SchemaResult<Descriptor> {
    let descriptor = match template {
        Value::Null => Descriptor::Any,
        Value::Bool(_) => Descriptor::Boolean,
        Value::Number(n) if n.is_f64() => Descriptor::Number,
        Value::Number(_) => Descriptor::Integer,
        Value::String(s) if s.is_empty() => Descriptor::String,
        Value::String(pattern) => {
            let anchored = format!("^(?:{pattern})$");
            let regex = Regex::new(&anchored)
                .map_err(|e| SchemaError::new(path, format!("invalid pattern: {e}")))?;
            Descriptor::Pattern(regex)
        }
        Value::Array(items) => match items.as_slice() {
            [] => Descriptor::AnyArray,
            [single] => Descriptor::Array(Box::new(compile_at(single, &format!("{path}[]"))?)),
            many => Descriptor::Tuple(
                many.iter()
                    .enumerate()
                    .map(|(i, item)| compile_at(item, &format!("{path}[{i}]")))
                    .collect::<SchemaResult<_>>()?,
            ),
        },
        Value::Object(map) if map.is_empty() => Descriptor::AnyRecord,
        Value::Object(map) => {
            let mut fields = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                let (name, required) = match key.strip_suffix(OPTIONAL_SUFFIX) {
                    Some(name) if !name.is_empty() => (name, false),
                    _ => (key.as_str(), true),
                };
                let mut descriptor = compile_at(value, &format!("{path}.{name}"))?;
                if !required && !descriptor.is_any() {
                    descriptor = Descriptor::Nullable(Box::new(descriptor));
                }
                fields.insert(
                    name.to_string(),
                    Field {
                        descriptor,
                        required,
                    },
                );
            }
            Descriptor::Record(fields)
        }
    };
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_scalars() {
        assert!(matches!(Descriptor::compile(&json!(null)), Ok(Descriptor::Any)));
        assert!(matches!(Descriptor::compile(&json!(false)), Ok(Descriptor::Boolean)));
        assert!(matches!(Descriptor::compile(&json!(0)), Ok(Descriptor::Integer)));
        assert!(matches!(Descriptor::compile(&json!(0.0)), Ok(Descriptor::Number)));
        assert!(matches!(Descriptor::compile(&json!("")), Ok(Descriptor::String)));
        assert!(matches!(
            Descriptor::compile(&json!("[a-z]+")),
            Ok(Descriptor::Pattern(_))
        ));
    }

    #[test]
    fn test_compile_arrays() {
        assert!(matches!(Descriptor::compile(&json!([])), Ok(Descriptor::AnyArray)));
        assert!(matches!(Descriptor::compile(&json!([0])), Ok(Descriptor::Array(_))));
        match Descriptor::compile(&json!([0, "", true])) {
            Ok(Descriptor::Tuple(items)) => assert_eq!(items.len(), 3),
            other => panic!("expected tuple, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_record_optional_fields() {
        let descriptor = Descriptor::compile(&json!({"name": "", "nick?": ""})).unwrap();
        let Descriptor::Record(fields) = descriptor else {
            panic!("expected record");
        };
        assert!(fields["name"].required);
        assert!(!fields["nick"].required);
        assert!(matches!(fields["nick"].descriptor, Descriptor::Nullable(_)));
    }

    #[test]
    fn test_compile_invalid_pattern_names_field() {
        let err = Descriptor::compile(&json!({"code": "(["})).unwrap_err();
        assert_eq!(err.field, "$.code");
        assert!(err.reason.starts_with("invalid pattern"));
    }

    #[test]
    fn test_lone_question_mark_is_a_required_key() {
        let descriptor = Descriptor::compile(&json!({"?": 0})).unwrap();
        let Descriptor::Record(fields) = descriptor else {
            panic!("expected record");
        };
        assert!(fields["?"].required);
    }
}
