//! Minimal canonical JSON: object keys sorted, array order preserved.
//!
//! Used only to fingerprint a completed run's event log for the
//! reproducibility check (§9: "deterministic replay from a seed + scenario +
//! twin"); not used on the hot step loop.

use serde_json::Value;
use std::collections::BTreeMap;

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let mut tree = BTreeMap::new();
            for (k, v) in map {
                tree.insert(k, to_canonical_json(v));
            }
            let items: Vec<String> = tree.into_iter()
                                          .map(|(k, v)| format!("{}:{}", serde_json::to_string(&k).unwrap(), v))
                                          .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(to_canonical_json(&v), "{\"a\":2,\"b\":1}");
    }

    #[test]
    fn preserves_array_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(to_canonical_json(&v), "[3,1,2]");
    }
}
