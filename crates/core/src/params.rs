// SPDX-License-Identifier: MIT

//! Loosely-typed payload representation shared by the orchestration layer.
//!
//! NodeTask parameters and results, MasterAction parameters, and slave
//! progress-update payloads are all opaque to the core: it only needs to
//! store and round-trip them. `serde_json::Value` covers that without a
//! bespoke schema.

use std::collections::HashMap;

/// A string-keyed map of dynamic values, e.g. MasterAction initiation
/// parameters or a NodeTask's result payload.
pub type ParamMap = HashMap<String, serde_json::Value>;

/// Parse a slave's `resultJson` string into a [`ParamMap`].
///
/// Per spec, a parse failure must not be silently dropped: it is preserved
/// as a `DeserializationError` entry so the failure is visible in the
/// persisted result instead of vanishing.
pub fn parse_result_json(raw: &str) -> ParamMap {
    if raw.trim().is_empty() {
        return ParamMap::new();
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        Ok(other) => {
            let mut map = ParamMap::new();
            map.insert("value".to_string(), other);
            map
        }
        Err(e) => {
            let mut map = ParamMap::new();
            map.insert("DeserializationError".to_string(), serde_json::Value::String(e.to_string()));
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_payload() {
        let map = parse_result_json(r#"{"exit_code": 0, "ok": true}"#);
        assert_eq!(map.get("exit_code"), Some(&serde_json::json!(0)));
        assert_eq!(map.get("ok"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn empty_string_yields_empty_map() {
        assert!(parse_result_json("").is_empty());
        assert!(parse_result_json("   ").is_empty());
    }

    #[test]
    fn malformed_json_is_preserved_not_dropped() {
        let map = parse_result_json("{not json");
        assert!(map.contains_key("DeserializationError"));
    }

    #[test]
    fn bare_scalar_is_wrapped() {
        let map = parse_result_json("42");
        assert_eq!(map.get("value"), Some(&serde_json::json!(42)));
    }
}
