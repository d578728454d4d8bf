use std::str::FromStr;

use uuid::Uuid;

/// Stable cross-system identity of a change request. Unlike the request number it
/// never changes when a request moves between numbering scopes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RequestUuid(Uuid);

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid request uuid {value:?}")]
pub struct InvalidRequestUuidError {
    value: String,
}

impl RequestUuid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for RequestUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for RequestUuid {
    type Err = InvalidRequestUuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| InvalidRequestUuidError {
                value: s.to_string(),
            })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RequestUuid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RequestUuid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
