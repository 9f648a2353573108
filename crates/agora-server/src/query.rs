//! Parameter decoding.
//!
//! Query strings are decoded as `application/x-www-form-urlencoded`. Values
//! stay strings; a name without `=` is `null`; a name given more than once
//! collects its values into an array in order of appearance.

use agora_core::{AgoraError, AgoraResult, Params};
use serde_json::Value;

/// Default key for a decoded body that is not a record.
pub const DEFAULT_ARGUMENT: &str = "arg0";

/// Decodes a query string into a parameter bag.
///
/// # Example
///
/// ```rust
/// use agora_server::decode_query;
/// use serde_json::json;
///
/// let params = decode_query("tag=a&name=Ada%20L&tag=b&flag").unwrap();
/// assert_eq!(params["name"], json!("Ada L"));
/// assert_eq!(params["tag"], json!(["a", "b"]));
/// assert_eq!(params["flag"], json!(null));
/// ```
pub fn decode_query(query: &str) -> AgoraResult<Params> {
    let mut params = Params::new();
    for piece in query.split('&').filter(|piece| !piece.is_empty()) {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(piece)
            .map_err(|e| AgoraError::validation(format!("undecodable query string: {e}")))?;
        let Some((name, value)) = pairs.into_iter().next() else {
            continue;
        };
        let value = if piece.contains('=') {
            Value::String(value)
        } else {
            Value::Null
        };
        match params.get_mut(&name) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(name, value);
            }
        }
    }
    Ok(params)
}

/// Merges a decoded body into the bag.
///
/// Record fields overwrite existing entries; any other value is stored
/// under [`DEFAULT_ARGUMENT`].
pub fn merge_body(params: &mut Params, decoded: Value) {
    match decoded {
        Value::Object(fields) => {
            for (name, value) in fields {
                params.insert(name, value);
            }
        }
        other => {
            params.insert(DEFAULT_ARGUMENT.to_string(), other);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_query() {
        assert!(decode_query("").unwrap().is_empty());
    }

    #[test]
    fn test_values_stay_strings() {
        let params = decode_query("age=36&admin=true").unwrap();
        assert_eq!(params["age"], json!("36"));
        assert_eq!(params["admin"], json!("true"));
    }

    #[test]
    fn test_repeated_names_keep_order() {
        let params = decode_query("k=1&k=2&k=3").unwrap();
        assert_eq!(params["k"], json!(["1", "2", "3"]));
    }

    #[test]
    fn test_bare_name_is_null() {
        let params = decode_query("flag&empty=&flag").unwrap();
        assert_eq!(params["flag"], json!([null, null]));
        assert_eq!(params["empty"], json!(""));

        let params = decode_query("a%20b&&c=1").unwrap();
        assert_eq!(params["a b"], Value::Null);
        assert_eq!(params["c"], json!("1"));
    }

    #[test]
    fn test_plus_decodes_to_space() {
        let params = decode_query("q=hello+world").unwrap();
        assert_eq!(params["q"], json!("hello world"));
    }

    #[test]
    fn test_merge_record_overwrites() {
        let mut params = decode_query("name=old&keep=1").unwrap();
        merge_body(&mut params, json!({"name": "new", "age": 3}));
        assert_eq!(params["name"], json!("new"));
        assert_eq!(params["keep"], json!("1"));
        assert_eq!(params["age"], json!(3));
    }

    #[test]
    fn test_merge_scalar_goes_to_default_argument() {
        let mut params = Params::new();
        merge_body(&mut params, json!("bob"));
        assert_eq!(params[DEFAULT_ARGUMENT], json!("bob"));

        merge_body(&mut params, json!([1, 2]));
        assert_eq!(params[DEFAULT_ARGUMENT], json!([1, 2]));
    }
}
