//! Yggdrasil profile records and their JSON wire form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A profile property value, optionally signed by the issuing provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValue {
    pub value: String,
    pub signature: Option<String>,
}

/// A player identity as returned by a profile lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameProfile {
    pub id: Uuid,
    pub name: String,
    pub properties: BTreeMap<String, PropertyValue>,
}

/// A name-to-UUID lookup result (`{"id": ..., "name": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRef {
    #[serde(with = "unsigned_uuid")]
    pub id: Uuid,
    pub name: String,
}

#[derive(Serialize, Deserialize)]
struct PropertyWire {
    name: String,
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ProfileWire {
    #[serde(with = "unsigned_uuid")]
    id: Uuid,
    name: String,
    #[serde(default)]
    properties: Vec<PropertyWire>,
}

impl Serialize for GameProfile {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ProfileWire {
            id: self.id,
            name: self.name.clone(),
            properties: self
                .properties
                .iter()
                .map(|(name, p)| PropertyWire {
                    name: name.clone(),
                    value: p.value.clone(),
                    signature: p.signature.clone(),
                })
                .collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GameProfile {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = ProfileWire::deserialize(deserializer)?;
        Ok(GameProfile {
            id: wire.id,
            name: wire.name,
            properties: wire
                .properties
                .into_iter()
                .map(|p| {
                    (
                        p.name,
                        PropertyValue {
                            value: p.value,
                            signature: p.signature,
                        },
                    )
                })
                .collect(),
        })
    }
}

/// Serde adapter for the dashless lowercase hex form used on the wire.
pub mod unsigned_uuid {
    use serde::{Deserialize, Deserializer, Serializer};
    use uuid::Uuid;

    pub fn serialize<S: Serializer>(id: &Uuid, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&id.simple())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Uuid, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Uuid::parse_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse exactly 32 hex digits (no dashes).
pub fn parse_unsigned_uuid(raw: &str) -> Option<Uuid> {
    if raw.len() != 32 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Uuid::try_parse(raw).ok()
}
