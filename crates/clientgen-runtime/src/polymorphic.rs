//! Discriminator dispatch for polymorphic models.
//!
//! Generated polymorphic enums deserialize by reading the discriminator
//! first and then decoding the payload as the matching variant. A value no
//! variant claims lands in [`UnknownVariant`], which keeps the raw payload so
//! it serializes back unchanged.

// Internal imports (std, crate)
use crate::error::{Result, RuntimeError};

// External imports (alphabetized)
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

/// Discriminator value of a payload, if the property is present and a string
pub fn discriminator_value<'a>(payload: &'a JsonValue, property: &str) -> Option<&'a str> {
    payload.get(property).and_then(JsonValue::as_str)
}

/// Payload whose discriminator matched no known variant
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownVariant {
    discriminator: Option<String>,
    payload: Map<String, JsonValue>,
}

impl UnknownVariant {
    /// Capture an object payload. Anything but a JSON object is rejected,
    /// since no polymorphic model has a non-object wire form.
    pub fn from_payload(property: &str, payload: JsonValue) -> Result<Self> {
        match payload {
            JsonValue::Object(payload) => Ok(Self {
                discriminator: payload
                    .get(property)
                    .and_then(JsonValue::as_str)
                    .map(str::to_string),
                payload,
            }),
            other => Err(RuntimeError::encoding(format!(
                "expected an object for a polymorphic value, found {}",
                other
            ))),
        }
    }

    /// The unrecognized discriminator, `None` when the payload had none
    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    pub fn payload(&self) -> &Map<String, JsonValue> {
        &self.payload
    }
}

impl Serialize for UnknownVariant {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.payload.serialize(serializer)
    }
}

/// Check that a variant payload carries the expected discriminator literal
pub fn expect_discriminator(payload: &JsonValue, property: &str, expected: &str) -> Result<()> {
    match discriminator_value(payload, property) {
        Some(found) if found == expected => Ok(()),
        found => Err(RuntimeError::encoding(format!(
            "expected {} '{}', found {:?}",
            property, expected, found
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_variant_keeps_payload() -> Result<()> {
        let payload = json!({"kind": "whale", "age": 12});
        let unknown = UnknownVariant::from_payload("kind", payload.clone())?;
        assert_eq!(unknown.discriminator(), Some("whale"));
        assert_eq!(serde_json::to_value(&unknown)?, payload);

        let untagged = UnknownVariant::from_payload("kind", json!({"age": 1}))?;
        assert_eq!(untagged.discriminator(), None);

        assert!(UnknownVariant::from_payload("kind", json!([1])).is_err());
        Ok(())
    }

    #[test]
    fn test_expect_discriminator() {
        let payload = json!({"kind": "shark"});
        assert!(expect_discriminator(&payload, "kind", "shark").is_ok());
        assert!(expect_discriminator(&payload, "kind", "salmon").is_err());
    }
}
