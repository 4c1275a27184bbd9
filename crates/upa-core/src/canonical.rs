//! Canonical encoding of signed payloads
//!
//! Signer and verifier must agree on the exact bytes, independently of how
//! either side's JSON library orders object keys. Objects are written with
//! keys sorted by their UTF-8 bytes and no insignificant whitespace.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Canonical bytes of a call: `{"body": <payload>, "operation": <op>}`
pub fn canonical_call(operation: &str, body: &Value) -> Vec<u8> {
    let envelope = serde_json::json!({
        "operation": operation,
        "body": body,
    });
    canonical_json(&envelope)
}

/// Canonical bytes of any serializable payload
pub fn canonical_bytes<T: Serialize>(operation: &str, body: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(body)?;
    Ok(canonical_call(operation, &value))
}

/// Canonical JSON encoding of a value
pub fn canonical_json(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String(key.clone()), out);
                out.push(b':');
                write_value(val, out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out);
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) {
    // Scalars have a single serde_json rendering; it cannot fail for a Value.
    out.extend_from_slice(value.to_string().as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_is_irrelevant() {
        let a: Value = serde_json::from_str(r#"{"price":10,"origin":"Lisboa","destination":"Porto"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"destination":"Porto","origin":"Lisboa","price":10}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_nested_objects_sorted() {
        let v = json!({"b": {"y": 1, "x": [ {"d": 2, "c": 1} ]}, "a": null});
        assert_eq!(
            String::from_utf8(canonical_json(&v)).unwrap(),
            r#"{"a":null,"b":{"x":[{"c":1,"d":2}],"y":1}}"#
        );
    }

    #[test]
    fn test_strings_escaped() {
        let v = json!({"k": "quote\" and é"});
        assert_eq!(
            String::from_utf8(canonical_json(&v)).unwrap(),
            r#"{"k":"quote\" and é"}"#
        );
    }

    #[test]
    fn test_operation_is_bound() {
        let body = json!({"id": "T1-1"});
        assert_ne!(
            canonical_call("GET /v1/jobs/T1-1", &body),
            canonical_call("DELETE /v1/jobs", &body)
        );
    }
}
