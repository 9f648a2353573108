//! Structural validation of decoded values against descriptors.
//!
//! Validation stops at the first mismatch. Values are never coerced: the
//! string `"3"` does not satisfy an integer descriptor.

use serde_json::Value;
use tracing::trace;

use crate::descriptor::Descriptor;
use crate::error::{SchemaError, SchemaResult};

/// Validates `value` against `descriptor`.
///
/// # Errors
///
/// Returns a [`SchemaError`] naming the first offending field.
///
/// # Example
///
/// ```
/// use agora_schema::{validate, Descriptor};
/// use serde_json::json;
///
/// let descriptor = Descriptor::compile(&json!({"tags": [""]})).unwrap();
/// let err = validate(&json!({"tags": ["a", 2]}), &descriptor).unwrap_err();
/// assert_eq!(err.field, "$.tags[1]");
/// ```
pub fn validate(value: &Value, descriptor: &Descriptor) -> SchemaResult<()> {
    let result = check(value, descriptor, "$");
    if let Err(ref err) = result {
        trace!(field = %err.field, reason = %err.reason, "schema mismatch");
    }
    result
}

fn check(value: &Value, descriptor: &Descriptor, path: &str) -> SchemaResult<()> {
    match descriptor {
        Descriptor::Any => Ok(()),
        Descriptor::Boolean => expect(value.is_boolean(), path, "boolean", value),
        Descriptor::Integer => expect(
            value.is_i64() || value.is_u64(),
            path,
            "integer",
            value,
        ),
        Descriptor::Number => expect(value.is_number(), path, "number", value),
        Descriptor::String => expect(value.is_string(), path, "string", value),
        Descriptor::Pattern(regex) => match value.as_str() {
            Some(s) if regex.is_match(s) => Ok(()),
            Some(_) => Err(SchemaError::new(
                path,
                format!("does not match pattern {}", regex.as_str()),
            )),
            None => Err(SchemaError::expected(path, "string", value)),
        },
        Descriptor::AnyArray => expect(value.is_array(), path, "array", value),
        Descriptor::Array(element) => {
            let items = value
                .as_array()
                .ok_or_else(|| SchemaError::expected(path, "array", value))?;
            for (i, item) in items.iter().enumerate() {
                check(item, element, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        Descriptor::Tuple(elements) => {
            let items = value
                .as_array()
                .ok_or_else(|| SchemaError::expected(path, "array", value))?;
            if items.len() != elements.len() {
                return Err(SchemaError::new(
                    path,
                    format!("expected {} items, got {}", elements.len(), items.len()),
                ));
            }
            for (i, (item, element)) in items.iter().zip(elements).enumerate() {
                check(item, element, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        Descriptor::AnyRecord => expect(value.is_object(), path, "object", value),
        Descriptor::Record(fields) => {
            let object = value
                .as_object()
                .ok_or_else(|| SchemaError::expected(path, "object", value))?;
            for (name, field) in fields {
                let field_path = format!("{path}.{name}");
                match object.get(name) {
                    Some(v) => check(v, &field.descriptor, &field_path)?,
                    None if field.required => return Err(SchemaError::missing(field_path)),
                    None => {}
                }
            }
            Ok(())
        }
        Descriptor::Nullable(inner) => {
            if value.is_null() {
                Ok(())
            } else {
                check(value, inner, path)
            }
        }
    }
}

fn expect(ok: bool, path: &str, expected: &str, value: &Value) -> SchemaResult<()> {
    if ok {
        Ok(())
    } else {
        Err(SchemaError::expected(path, expected, value))
    }
}
