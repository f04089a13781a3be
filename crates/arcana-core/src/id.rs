//! Typed ID wrappers for queue-runtime entities.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use ulid::Ulid;

/// A lexicographically time-ordered job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Creates a new job id from the current time.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parses a job id from its 26-character canonical string form.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

/// A strongly-typed wrapper for worker identifiers.
///
/// Worker ids are opaque strings (`<prefix>-<random>` by convention) rather
/// than ULIDs: they are not required to be time-ordered, only unique per
/// process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(format!("{}-{}", prefix.into(), Ulid::new()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_time_ordered() {
        let a = JobId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = JobId::new();
        assert!(a < b);
    }

    #[test]
    fn job_id_round_trips_through_string() {
        let id = JobId::new();
        let parsed = JobId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn worker_id_carries_prefix() {
        let id = WorkerId::new("worker");
        assert!(id.as_str().starts_with("worker-"));
    }
}
