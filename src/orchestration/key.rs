//! Deterministic cache keys from request parameters.
//!
//! Parameters are serialized to JSON and written back out compactly with
//! object keys sorted at every depth, so field order never changes the key.
use serde::Serialize;
use serde_json::Value;

use crate::error::AppResult;

pub fn create_key<P: Serialize + ?Sized>(params: &P) -> AppResult<String> {
    let value = serde_json::to_value(params)?;
    let mut out = String::new();
    write_canonical(&value, &mut out)?;
    Ok(out)
}

// Sorts explicitly instead of relying on `serde_json::Map` being a BTreeMap,
// which stops holding once any crate in the build enables `preserve_order`.
fn write_canonical(value: &Value, out: &mut String) -> AppResult<()> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(k)?);
                out.push(':');
                write_canonical(&map[k], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}
