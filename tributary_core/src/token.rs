//! Identity types for readers and the requests they issue.
//!
//! [`ReaderId`] names a reader instance and is stamped on every notification it publishes, so a
//! consumer merging several readers can tell their outputs apart. [`CorrelationToken`] is minted
//! for every read request and every scheduled timer; a reply is only acted upon while its token is
//! the one the reader is waiting for.
//!
//! Both wrap a [`Uuid`] but are distinct types, so a reader id can never be compared against a
//! request token by accident.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one reader instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReaderId(Uuid);

impl ReaderId {
    /// Mints a fresh, random reader id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReaderId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ReaderId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reader:{}", self.0)
    }
}

/// Correlates a request issued by a reader with its eventual reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken(Uuid);

impl CorrelationToken {
    /// Mints a fresh, random token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CorrelationToken {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_tokens_are_unique() {
        assert_ne!(CorrelationToken::new(), CorrelationToken::new());
        assert_ne!(ReaderId::new(), ReaderId::new());
    }

    #[test]
    fn reader_id_display_is_prefixed() {
        let id = Uuid::new_v4();
        assert_eq!(ReaderId::from(id).to_string(), format!("reader:{id}"));
    }
}
