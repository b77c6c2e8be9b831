//! Signal layer: typed event sources, connection handles and scopes.
//!
//! Built on the domain layer. [`EventSource`] creates connections,
//! [`Connection`] and [`ScopedConnection`] refer to one of them, and
//! [`ConnectionScope`] owns many for bulk teardown.

pub mod connection;
pub mod event_source;
pub mod scope;

pub use connection::{Connection, ScopedConnection, disconnect};
pub use event_source::{EventSource, Signal, connect};
pub use scope::ConnectionScope;
