//! Version identifiers for Envoy state.
//!
//! Every successful mutation of a node's Envoy state is stamped with a
//! fresh [`StateVersion`]. The UUID makes versions unique across
//! control-plane replicas; the timestamp gives the ordering used by the
//! cross-process reload path.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version of one node's Envoy state: a random identifier plus the UTC
/// instant at which it was assigned.
///
/// Versions are compared by timestamp, not identifier; two replicas that
/// race produce distinct identifiers and the later stamp wins on reload.
///
/// # Example
///
/// ```rust
/// use kage_core::StateVersion;
///
/// let v1 = StateVersion::new();
/// let v2 = StateVersion::new();
/// assert_ne!(v1, v2);
/// assert!(v2.newer_than(&v1) || v2.stamp() == v1.stamp());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateVersion {
    id: Uuid,
    stamp: DateTime<Utc>,
}

impl StateVersion {
    /// Assign a fresh version stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stamp: Utc::now(),
        }
    }

    /// The unique identifier of this version.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The instant this version was assigned.
    #[must_use]
    pub fn stamp(&self) -> DateTime<Utc> {
        self.stamp
    }

    /// True when this version was assigned strictly after `other`.
    #[must_use]
    pub fn newer_than(&self, other: &Self) -> bool {
        self.stamp > other.stamp
    }
}

impl Default for StateVersion {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
