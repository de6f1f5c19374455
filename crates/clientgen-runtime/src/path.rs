//! Dot-separated paths into JSON documents.
//!
//! Paging and polling metadata name values by path (`result.items`), and
//! flattened properties live below their container (`properties.size`).

// External imports (alphabetized)
use serde_json::{Map, Value as JsonValue};

/// Resolve a dot separated path inside a JSON document
pub fn lookup<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| current.get(segment))
}

/// Write `value` at `path`, creating intermediate objects and replacing any
/// non-object value in the way
pub fn insert_path<S: AsRef<str>>(object: &mut Map<String, JsonValue>, path: &[S], value: JsonValue) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        object.insert(first.as_ref().to_string(), value);
        return;
    }
    let entry = object
        .entry(first.as_ref().to_string())
        .or_insert_with(|| JsonValue::Object(Map::new()));
    if !entry.is_object() {
        *entry = JsonValue::Object(Map::new());
    }
    if let JsonValue::Object(inner) = entry {
        insert_path(inner, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_and_insert_agree() {
        let mut object = Map::new();
        insert_path(&mut object, &["properties", "size"], json!(3));
        insert_path(&mut object, &["properties", "color"], json!("red"));
        insert_path(&mut object, &["name"], json!("w"));

        let value = JsonValue::Object(object);
        assert_eq!(value, json!({"properties": {"size": 3, "color": "red"}, "name": "w"}));
        assert_eq!(lookup(&value, "properties.size"), Some(&json!(3)));
        assert_eq!(lookup(&value, "properties.missing"), None);
    }
}
