//! Three-state optional values.
//!
//! An optional property whose schema is also nullable has three wire states:
//! the key is absent, the key is present with `null`, or the key carries a
//! value. `Option<T>` can only express two of them.
//!
//! Fields of this type are declared with
//! `#[serde(default, skip_serializing_if = "Nullable::is_absent")]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nullable<T> {
    Absent,
    Null,
    Value(T),
}

// derived Default would require `T: Default`
impl<T> Default for Nullable<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Nullable<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_ref(&self) -> Nullable<&T> {
        match self {
            Self::Absent => Nullable::Absent,
            Self::Null => Nullable::Null,
            Self::Value(value) => Nullable::Value(value),
        }
    }

    /// The value, if present and not null
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Nullable<T> {
    /// `None` maps to an explicit null, not to an absent key
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Value(value),
            None => Self::Null,
        }
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => serializer.serialize_some(value),
            Self::Null | Self::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Patch {
        #[serde(default, skip_serializing_if = "Nullable::is_absent")]
        description: Nullable<String>,
    }

    #[test]
    fn test_three_states_roundtrip() -> crate::Result<()> {
        let absent: Patch = serde_json::from_value(json!({}))?;
        let null: Patch = serde_json::from_value(json!({"description": null}))?;
        let value: Patch = serde_json::from_value(json!({"description": "blue"}))?;

        assert_eq!(absent.description, Nullable::Absent);
        assert_eq!(null.description, Nullable::Null);
        assert_eq!(value.description.value().map(String::as_str), Some("blue"));

        assert_eq!(serde_json::to_value(&absent)?, json!({}));
        assert_eq!(serde_json::to_value(&null)?, json!({"description": null}));
        assert_eq!(serde_json::to_value(&value)?, json!({"description": "blue"}));
        Ok(())
    }
}
