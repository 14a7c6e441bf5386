//! Basic type definitions for the relay
//!
//! - `SessionId`: UUID-based identity of one connection, independent of its
//!   (mutable) display name
//! - `Presence`: one row of an online-user listing

use uuid::Uuid;

/// Unique session identifier (newtype pattern)
///
/// Display names can change at any time, so the registry uses this to make
/// sure a teardown only ever removes its own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered user as reported by `who`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub address: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_unique() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
    }
}
