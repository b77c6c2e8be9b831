//! Bulk ownership of connections.
//!
//! A [`ConnectionScope`] is a member of a composite object. Everything the
//! object wires up on behalf of its children goes through the scope, and all
//! of it is disconnected when the scope is cleared or dropped, without the
//! object keeping any handle itself.

use std::fmt;

use super::connection::Connection;
use super::event_source::EventSource;
use crate::context::Context;
use crate::domain::node::{self, Position};
use crate::domain::{Connectable, Endpoint};

/// Aggregator of connections for bulk teardown.
///
/// The scope is itself connectable: its endpoint holds one tracker node per
/// tracked connection, and may also be the receiver of connections.
/// Dropping the scope disconnects everything it tracks; handles it issued
/// become no-ops.
pub struct ConnectionScope {
    endpoint: Endpoint,
}

impl ConnectionScope {
    /// Creates an empty scope.
    ///
    /// The current thread must have entered `context`.
    #[must_use]
    pub fn new(context: &Context) -> Self {
        Self {
            endpoint: Endpoint::new(context),
        }
    }

    /// Connects `callback` from `source` to `receiver` and tracks the
    /// connection.
    pub fn connect<A, R, F>(&self, source: &EventSource<A>, receiver: &R, callback: F) -> Connection
    where
        A: 'static,
        R: Connectable + ?Sized,
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.connect_at(source, receiver, Position::Back, callback)
    }

    /// Same as [`ConnectionScope::connect`] with an explicit position.
    pub fn connect_at<A, R, F>(
        &self,
        source: &EventSource<A>,
        receiver: &R,
        position: Position,
        callback: F,
    ) -> Connection
    where
        A: 'static,
        R: Connectable + ?Sized,
        F: Fn(&A) + Send + Sync + 'static,
    {
        let connection = source.connect_at(receiver, position, callback);
        if connection.is_issued() && !self.track(&connection) {
            connection.disconnect();
        }
        connection
    }

    /// Adopts a connection made elsewhere. Returns `false` if the connection
    /// is already gone or the scope is tearing down.
    pub fn track(&self, connection: &Connection) -> bool {
        node::track(self.endpoint.domain(), connection.wire())
    }

    /// Disconnects every tracked connection and everything this scope
    /// receives. The scope stays usable. Returns how many nodes were removed.
    pub fn clear(&self) -> usize {
        self.endpoint.remove_all()
    }

    /// Number of tracked connections that are still established.
    #[must_use]
    pub fn len(&self) -> usize {
        node::count_tracked(self.endpoint.domain())
    }

    /// Returns `true` if no tracked connection is established.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Connectable for ConnectionScope {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl fmt::Debug for ConnectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionScope")
            .field("endpoint", &self.endpoint)
            .field("tracked", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn clear_disconnects_across_sources_and_receivers() {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let a = EventSource::<()>::new(&ctx);
        let b = EventSource::<()>::new(&ctx);
        let first = Endpoint::new(&ctx);
        let second = Endpoint::new(&ctx);
        let scope = ConnectionScope::new(&ctx);

        let handles = [
            scope.connect(&a, &first, |_| {}),
            scope.connect(&a, &second, |_| {}),
            scope.connect(&b, &first, |_| {}),
        ];
        let unrelated = a.connect(&second, |_| {});
        assert_eq!(scope.len(), 3);

        assert_eq!(scope.clear(), 3);
        assert!(scope.is_empty());
        assert!(handles.iter().all(|handle| !handle.is_connected()));
        assert!(unrelated.is_connected());
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        scope.connect(&b, &second, |_| {});
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn drop_disconnects_and_handles_become_no_ops() {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let source = EventSource::<()>::new(&ctx);
        let receiver = Endpoint::new(&ctx);
        let calls = Arc::new(AtomicUsize::new(0));

        let scope = ConnectionScope::new(&ctx);
        let seen = Arc::clone(&calls);
        let handle = scope.connect(&source, &receiver, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        source.fire(&());
        drop(scope);

        source.fire(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!handle.is_connected());
        assert!(!handle.disconnect());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn connections_removed_elsewhere_stop_counting() {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let source = EventSource::<()>::new(&ctx);
        let receiver = Endpoint::new(&ctx);
        let scope = ConnectionScope::new(&ctx);

        let handle = scope.connect(&source, &receiver, |_| {});
        scope.connect(&source, &receiver, |_| {});
        assert!(handle.disconnect());
        assert_eq!(scope.len(), 1);

        drop(receiver);
        assert!(scope.is_empty());
        assert_eq!(scope.clear(), 2);
    }

    #[test]
    fn len_drops_as_soon_as_a_connection_ends_mid_fire() {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let source = EventSource::<()>::new(&ctx);
        let receiver = Endpoint::new(&ctx);
        let scope = Arc::new(ConnectionScope::new(&ctx));
        let slot = Arc::new(Mutex::new(Connection::empty()));
        let seen_len = Arc::new(AtomicUsize::new(usize::MAX));

        let own = Arc::clone(&slot);
        let weak_scope = Arc::downgrade(&scope);
        let seen = Arc::clone(&seen_len);
        let handle = scope.connect(&source, &receiver, move |_| {
            own.lock().disconnect();
            if let Some(scope) = weak_scope.upgrade() {
                seen.store(scope.len(), Ordering::SeqCst);
            }
        });
        *slot.lock() = handle;
        assert_eq!(scope.len(), 1);

        assert_eq!(source.fire(&()), 1);
        assert_eq!(seen_len.load(Ordering::SeqCst), 0);
        assert!(scope.is_empty());
    }

    #[test]
    fn track_adopts_existing_connections() {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let source = EventSource::<u8>::new(&ctx);
        let receiver = Endpoint::new(&ctx);
        let scope = ConnectionScope::new(&ctx);

        let handle = source.connect(&receiver, |_| {});
        assert!(scope.track(&handle));
        assert!(!scope.track(&Connection::empty()));
        scope.clear();
        assert!(!handle.is_connected());
    }

    #[test]
    fn scope_can_receive_as_well_as_track() {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let source = EventSource::<()>::new(&ctx);
        let scope = ConnectionScope::new(&ctx);

        let handle = scope.connect(&source, &scope, |_| {});
        assert_eq!(scope.connection_count(), 2);
        drop(scope);
        assert!(!handle.is_connected());
        assert_eq!(source.subscriber_count(), 0);
    }
}
