use std::str::FromStr;

use git2::Oid;

/// Full object id of a commit in the target repository.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CommitId(Oid);

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid commit id {value:?}: expected 40 hex characters")]
pub struct InvalidCommitIdError {
    value: String,
}

impl std::fmt::Debug for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CommitId({})", self.short())
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CommitId {
    pub fn oid(self) -> Oid {
        self.0
    }

    /// First 12 hex characters, used in log lines.
    pub fn short(self) -> String {
        let mut hex = self.0.to_string();
        hex.truncate(12);
        hex
    }
}

impl From<Oid> for CommitId {
    fn from(oid: Oid) -> Self {
        Self(oid)
    }
}

impl From<CommitId> for Oid {
    fn from(commit_id: CommitId) -> Self {
        commit_id.0
    }
}

impl FromStr for CommitId {
    type Err = InvalidCommitIdError;

    /// Only full-length ids are accepted; abbreviated ids are ambiguous outside a repository.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidCommitIdError {
            value: s.to_string(),
        };
        if s.len() != 40 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        Oid::from_str(s).map(Self).map_err(|_| invalid())
    }
}

impl TryFrom<&str> for CommitId {
    type Error = InvalidCommitIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for CommitId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for CommitId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
