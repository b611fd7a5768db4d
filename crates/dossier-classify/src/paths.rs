//! Field-path extraction and structural sampling.
//!
//! Paths use dotted keys with bracketed indices, e.g. `github.events[0].type`.
//! Arrays are sampled, not enumerated: only the element at index 0 is walked.

use dossier_core::ClassificationConfig;
use serde_json::{Map, Value};

/// Walks a value and emits addressable field paths up to a depth limit.
#[derive(Debug, Clone, Copy)]
pub struct FieldPathExtractor {
    max_depth: usize,
}

impl Default for FieldPathExtractor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_DEPTH)
    }
}

impl FieldPathExtractor {
    /// Default number of key segments walked.
    pub const DEFAULT_MAX_DEPTH: usize = 3;

    /// Extractor that stops after `max_depth` key segments.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Extractor using `[classification] max_path_depth`.
    #[must_use]
    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self::new(config.max_path_depth)
    }

    /// Depth-first paths in document order. Empty for null or scalar roots.
    ///
    /// Object keys consume depth; array indices do not, since only one
    /// element per array is visited.
    #[must_use]
    pub fn extract(&self, value: &Value) -> Vec<String> {
        let mut paths = Vec::new();
        self.walk(value, "", 0, &mut paths);
        paths
    }

    fn walk(&self, value: &Value, prefix: &str, depth: usize, out: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                if depth >= self.max_depth {
                    return;
                }
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    out.push(path.clone());
                    self.walk(child, &path, depth + 1, out);
                }
            }
            Value::Array(items) => {
                if let Some(first) = items.first() {
                    let path = format!("{prefix}[0]");
                    out.push(path.clone());
                    self.walk(first, &path, depth, out);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
        }
    }
}

/// Bounded outline of `value` where every leaf is replaced by a type tag.
///
/// Objects keep at most `max_keys` keys; arrays keep a sample of their first
/// element. Below `max_depth` containers collapse to `"object"`/`"array"`.
/// No string leaf from the input is ever copied into the sample.
#[must_use]
pub fn structural_sample(value: &Value, max_depth: usize, max_keys: usize) -> Value {
    sample(value, 0, max_depth, max_keys)
}

fn sample(value: &Value, depth: usize, max_depth: usize, max_keys: usize) -> Value {
    match value {
        Value::Null => Value::from("null"),
        Value::Bool(_) => Value::from("boolean"),
        Value::Number(_) => Value::from("number"),
        Value::String(_) => Value::from("string"),
        Value::Array(_) | Value::Object(_) if depth >= max_depth => {
            Value::from(if value.is_array() { "array" } else { "object" })
        }
        Value::Array(items) => Value::Array(
            items
                .first()
                .map(|first| sample(first, depth + 1, max_depth, max_keys))
                .into_iter()
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .take(max_keys)
                .map(|(k, v)| (k.clone(), sample(v, depth + 1, max_depth, max_keys)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_roots_yield_nothing() {
        let extractor = FieldPathExtractor::default();
        assert!(extractor.extract(&Value::Null).is_empty());
        assert!(extractor.extract(&json!(42)).is_empty());
        assert!(extractor.extract(&json!("text")).is_empty());
        assert!(extractor.extract(&json!(true)).is_empty());
    }

    #[test]
    fn test_nested_object() {
        let paths = FieldPathExtractor::default().extract(&json!({"a": {"b": 1}}));
        assert_eq!(paths, vec!["a", "a.b"]);
    }

    #[test]
    fn test_arrays_sample_first_element() {
        let value = json!({
            "github": {
                "events": [
                    {"type": "PushEvent", "repo": "x"},
                    {"type": "WatchEvent", "extra": 1}
                ]
            }
        });
        let paths = FieldPathExtractor::default().extract(&value);
        assert_eq!(
            paths,
            vec![
                "github",
                "github.events",
                "github.events[0]",
                "github.events[0].type",
                "github.events[0].repo",
            ]
        );
    }

    #[test]
    fn test_depth_limit() {
        let value = json!({"a": {"b": {"c": {"d": 1}}}});
        assert_eq!(
            FieldPathExtractor::default().extract(&value),
            vec!["a", "a.b", "a.b.c"]
        );
        assert_eq!(FieldPathExtractor::new(1).extract(&value), vec!["a"]);
        assert!(FieldPathExtractor::new(0).extract(&value).is_empty());
    }

    #[test]
    fn test_empty_array_and_root_array() {
        let extractor = FieldPathExtractor::default();
        assert_eq!(extractor.extract(&json!({"tags": []})), vec!["tags"]);
        assert_eq!(extractor.extract(&json!([{"id": 1}])), vec!["[0]", "[0].id"]);
    }

    #[test]
    fn test_sample_has_only_type_tags() {
        let value = json!({
            "email": "[REDACTED]",
            "name": "Octo Cat",
            "age": 7,
            "active": true,
            "nothing": null,
            "orgs": [{"login": "acme", "role": "admin"}]
        });
        let sample = structural_sample(&value, 2, 10);
        assert_eq!(
            sample,
            json!({
                "email": "string",
                "name": "string",
                "age": "number",
                "active": "boolean",
                "nothing": "null",
                "orgs": ["object"]
            })
        );
        assert!(!sample.to_string().contains("Octo"));
    }

    #[test]
    fn test_sample_bounds_breadth() {
        let value = json!({"a": 1, "b": 2, "c": 3, "d": 4, "e": 5, "f": 6, "g": 7});
        let sample = structural_sample(&value, 2, 5);
        let keys: Vec<&String> = sample.as_object().expect("object").keys().collect();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_sample_collapses_below_depth() {
        let value = json!({"a": {"b": {"c": "deep"}}, "list": [[1]]});
        let sample = structural_sample(&value, 2, 5);
        assert_eq!(sample, json!({"a": {"b": "object"}, "list": ["array"]}));
        assert_eq!(structural_sample(&json!([]), 2, 5), json!([]));
    }
}
