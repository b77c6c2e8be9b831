//! Handles to established connections.

use std::sync::{Arc, Weak};

use crate::domain::ConnectionId;
use crate::domain::node::{self, Wire};

/// Opaque handle to one connection.
///
/// Holds no strong reference: a handle never keeps a callback alive, and a
/// handle to a connection that is gone behaves exactly like an empty one.
/// Cloning a handle does not duplicate the connection.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    wire: Weak<Wire>,
    id: Option<ConnectionId>,
}

impl Connection {
    pub(crate) fn new(wire: &Arc<Wire>) -> Self {
        Self {
            wire: Arc::downgrade(wire),
            id: Some(wire.id()),
        }
    }

    /// A handle that refers to nothing. Returned when `connect()` is refused.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Identifier of the connection, `None` for an empty handle.
    #[must_use]
    pub const fn id(&self) -> Option<ConnectionId> {
        self.id
    }

    /// Returns `true` if the handle was issued for a real connection, live
    /// or not.
    #[must_use]
    pub const fn is_issued(&self) -> bool {
        self.id.is_some()
    }

    /// Returns `true` while the connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.wire.upgrade().is_some_and(|wire| wire.is_attached())
    }

    /// Tears the connection down.
    ///
    /// Safe from any thread and from inside the connection's own callback.
    /// Returns `true` only for the call that removed it; every later call,
    /// and any call on an empty handle, is a no-op returning `false`.
    pub fn disconnect(&self) -> bool {
        node::sever(&self.wire)
    }

    /// Converts the handle into a guard that disconnects on drop.
    #[must_use = "dropping the guard immediately disconnects"]
    pub fn scoped(self) -> ScopedConnection {
        ScopedConnection { connection: self }
    }

    pub(crate) fn wire(&self) -> &Weak<Wire> {
        &self.wire
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

/// Disconnects `connection`. Same as [`Connection::disconnect`].
pub fn disconnect(connection: &Connection) -> bool {
    connection.disconnect()
}

/// Connection that is torn down when the guard drops.
#[derive(Debug)]
pub struct ScopedConnection {
    connection: Connection,
}

impl ScopedConnection {
    /// The guarded handle.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Gives up the guard without disconnecting.
    #[must_use]
    pub fn release(mut self) -> Connection {
        std::mem::take(&mut self.connection)
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        self.connection.disconnect();
    }
}

impl From<Connection> for ScopedConnection {
    fn from(connection: Connection) -> Self {
        connection.scoped()
    }
}
