//! Typed, fireable signals.
//!
//! An [`EventSource<A>`] is owned by the object that emits it. The owner
//! keeps the source private, calls [`EventSource::fire`] itself, and hands
//! external callers the connect-only [`Signal`] view returned by
//! [`EventSource::signal`].
//!
//! # Firing
//!
//! `fire` copies the current subscriber list under the source's lock and
//! invokes the copy with no lock held, so callbacks may connect, disconnect
//! or fire on the same source. Each entry's liveness is checked immediately
//! before it is invoked: a subscriber disconnected mid-fire is skipped, and
//! one connected mid-fire is not part of that call.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use super::connection::Connection;
use crate::context::Context;
use crate::domain::node::{self, NodeRole, Position};
use crate::domain::{Connectable, Endpoint};

/// Type-erased callback stored in a connection.
struct Callback<A: 'static>(Box<dyn Fn(&A) + Send + Sync>);

/// Signal carrying `&A` to its subscribers.
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use hydra_signals::{Context, Endpoint, EventSource, RegistryConfig};
///
/// let ctx = Context::new(RegistryConfig::default());
/// let _entered = ctx.enter();
/// let clicked = EventSource::<()>::new(&ctx);
/// let receiver = Endpoint::new(&ctx);
///
/// let count = Arc::new(AtomicUsize::new(0));
/// let seen = Arc::clone(&count);
/// clicked.connect(&receiver, move |_| {
///     seen.fetch_add(1, Ordering::SeqCst);
/// });
///
/// clicked.fire(&());
/// drop(receiver);
/// clicked.fire(&());
/// assert_eq!(count.load(Ordering::SeqCst), 1);
/// ```
pub struct EventSource<A: 'static> {
    endpoint: Endpoint,
    _args: PhantomData<fn(&A)>,
}

impl<A: 'static> EventSource<A> {
    /// Creates a source with no subscribers.
    ///
    /// The current thread must have entered `context`.
    #[must_use]
    pub fn new(context: &Context) -> Self {
        Self {
            endpoint: Endpoint::new(context),
            _args: PhantomData,
        }
    }

    /// Connect-only view for external callers.
    #[must_use]
    pub const fn signal(&self) -> Signal<'_, A> {
        Signal { source: self }
    }

    /// Subscribes `callback` on behalf of `receiver`, after every existing
    /// subscriber.
    ///
    /// The connection lives until it is disconnected or either endpoint is
    /// dropped. Returns an empty handle if either endpoint is tearing down.
    pub fn connect<R, F>(&self, receiver: &R, callback: F) -> Connection
    where
        R: Connectable + ?Sized,
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.connect_at(receiver, Position::Back, callback)
    }

    /// Subscribes ahead of every existing subscriber.
    pub fn connect_front<R, F>(&self, receiver: &R, callback: F) -> Connection
    where
        R: Connectable + ?Sized,
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.connect_at(receiver, Position::Front, callback)
    }

    /// Subscribes at `position` in invocation order.
    pub fn connect_at<R, F>(&self, receiver: &R, position: Position, callback: F) -> Connection
    where
        R: Connectable + ?Sized,
        F: Fn(&A) + Send + Sync + 'static,
    {
        let slot = Box::new(Callback::<A>(Box::new(callback)));
        node::link(
            self.endpoint.domain(),
            receiver.endpoint().domain(),
            position,
            slot,
        )
        .map_or_else(Connection::empty, |wire| Connection::new(&wire))
    }

    /// Subscribes a method of `target`, which is also the receiving endpoint.
    ///
    /// The callback holds `target` weakly, so the connection never keeps it
    /// alive; dropping the last `Arc` tears the connection down. A fire that
    /// races that drop may find the target gone; the method is then skipped
    /// and the connection disconnected on the spot.
    pub fn connect_method<T, F>(&self, target: &Arc<T>, method: F) -> Connection
    where
        T: Connectable + Send + Sync + 'static,
        F: Fn(&T, &A) + Send + Sync + 'static,
    {
        let weak = Arc::downgrade(target);
        let own = Arc::new(OnceLock::<Connection>::new());
        let slot = Arc::clone(&own);
        let connection = self.connect(target.as_ref(), move |args: &A| match weak.upgrade() {
            Some(target) => method(&*target, args),
            None => {
                if let Some(connection) = slot.get() {
                    connection.disconnect();
                }
            }
        });
        let _ = own.set(connection.clone());
        connection
    }

    /// Disconnects `connection` if this source emits it. Idempotent; see
    /// [`Connection::disconnect`].
    ///
    /// Returns `false` without touching it for a handle issued by another
    /// source.
    pub fn disconnect(&self, connection: &Connection) -> bool {
        node::is_sourced_by(connection.wire(), self.endpoint.domain()) && connection.disconnect()
    }

    /// Invokes every subscriber with `args`, in order. Returns how many
    /// callbacks ran, counting a `connect_method` callback whose target was
    /// already dropping even though the method itself was not reached.
    ///
    /// A panicking callback propagates to the caller; the registry stays
    /// consistent because no lock is held while callbacks run.
    pub fn fire(&self, args: &A) -> usize {
        let snapshot = self.endpoint.domain().acquire().outgoing();
        let mut invoked = 0;
        for wire in &snapshot {
            if !wire.is_attached() {
                continue;
            }
            if let Some(Callback(callback)) = wire.slot::<Callback<A>>() {
                callback(args);
                invoked += 1;
            }
        }
        invoked
    }

    /// Number of connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.endpoint.count(NodeRole::Source)
    }

    /// Disconnects every subscriber. Returns how many this call removed.
    ///
    /// Connections in which this source is the receiving end are torn down
    /// too.
    pub fn disconnect_all(&self) -> usize {
        self.endpoint.remove_all()
    }
}

impl<A: 'static> Connectable for EventSource<A> {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl<A: 'static> fmt::Debug for EventSource<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("endpoint", &self.endpoint)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Connect-only view of an [`EventSource`].
pub struct Signal<'a, A: 'static> {
    source: &'a EventSource<A>,
}

impl<A: 'static> Signal<'_, A> {
    /// See [`EventSource::connect`].
    pub fn connect<R, F>(&self, receiver: &R, callback: F) -> Connection
    where
        R: Connectable + ?Sized,
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.source.connect(receiver, callback)
    }

    /// See [`EventSource::connect_front`].
    pub fn connect_front<R, F>(&self, receiver: &R, callback: F) -> Connection
    where
        R: Connectable + ?Sized,
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.source.connect_front(receiver, callback)
    }

    /// See [`EventSource::connect_at`].
    pub fn connect_at<R, F>(&self, receiver: &R, position: Position, callback: F) -> Connection
    where
        R: Connectable + ?Sized,
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.source.connect_at(receiver, position, callback)
    }

    /// See [`EventSource::connect_method`].
    pub fn connect_method<T, F>(&self, target: &Arc<T>, method: F) -> Connection
    where
        T: Connectable + Send + Sync + 'static,
        F: Fn(&T, &A) + Send + Sync + 'static,
    {
        self.source.connect_method(target, method)
    }

    /// See [`EventSource::disconnect`].
    pub fn disconnect(&self, connection: &Connection) -> bool {
        self.source.disconnect(connection)
    }

    /// See [`EventSource::subscriber_count`].
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.source.subscriber_count()
    }
}

impl<A: 'static> Clone for Signal<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: 'static> Copy for Signal<'_, A> {}

impl<A: 'static> fmt::Debug for Signal<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("source", &self.source.endpoint.id())
            .finish()
    }
}

/// Connects `callback` from `source` to `receiver`. Same as
/// [`EventSource::connect`].
pub fn connect<A, R, F>(source: &EventSource<A>, receiver: &R, callback: F) -> Connection
where
    A: 'static,
    R: Connectable + ?Sized,
    F: Fn(&A) + Send + Sync + 'static,
{
    source.connect(receiver, callback)
}
