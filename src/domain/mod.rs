//! Domain layer: lock domains, connection nodes and the connectable
//! capability.
//!
//! This module contains the registry core: [`LockDomain`] for ordered
//! per-participant locking, the node lists that hold both halves of every
//! connection, and [`Endpoint`] / [`Connectable`] through which objects take
//! part in connections.

pub mod connection_id;
pub mod endpoint;
pub mod lock_domain;
pub(crate) mod node;

pub use connection_id::ConnectionId;
pub use endpoint::{Connectable, Endpoint};
pub use lock_domain::{DomainId, LockDomain, PairGuard, acquire_pair};
pub use node::Position;
