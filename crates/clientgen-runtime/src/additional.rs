//! Guarded access to additional-properties maps.
//!
//! A model's open map is flattened into the same JSON object as its declared
//! properties, so a declared name stored in the map would be written twice.

use crate::error::{Result, RuntimeError};

use indexmap::IndexMap;

/// Insert into an open map, refusing names that belong to declared properties.
pub fn insert_additional<V>(
    map: &mut IndexMap<String, V>,
    known: &[&str],
    key: impl Into<String>,
    value: V,
) -> Result<Option<V>> {
    let key = key.into();
    if known.contains(&key.as_str()) {
        return Err(RuntimeError::KnownProperty(key));
    }
    Ok(map.insert(key, value))
}

/// Drop any entry shadowing a declared property; returns how many were removed.
pub fn strip_known<V>(map: &mut IndexMap<String, V>, known: &[&str]) -> usize {
    let before = map.len();
    map.retain(|key, _| !known.contains(&key.as_str()));
    before - map.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as JsonValue};

    #[test]
    fn test_known_names_are_rejected() -> Result<()> {
        let mut map: IndexMap<String, JsonValue> = IndexMap::new();
        insert_additional(&mut map, &["flag"], "prop1", json!("abc"))?;
        assert!(matches!(
            insert_additional(&mut map, &["flag"], "flag", json!(false)),
            Err(RuntimeError::KnownProperty(name)) if name == "flag"
        ));
        assert_eq!(map.len(), 1);

        map.insert("flag".to_string(), json!(true));
        assert_eq!(strip_known(&mut map, &["flag"]), 1);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["prop1"]);
        Ok(())
    }
}
