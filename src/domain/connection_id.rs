//! Connection identity.

use std::fmt;

use serde::Serialize;

/// Identifier of one logical connection.
///
/// Minted by the registry when `connect()` succeeds and shared by the
/// source half, the sink half and every [`crate::Connection`] handle to it.
/// Ids are random (UUID v4), so handles from different contexts never
/// collide. Shows up as the `connection` field of trace records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub(crate) fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
