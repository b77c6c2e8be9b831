//! # hydra-signals
//!
//! Thread-safe signal/slot connection registry.
//!
//! Objects emit typed events through an [`EventSource`] and subscribe to
//! other objects' events with [`connect`]. A connection lives until it is
//! disconnected or either endpoint is destroyed, whichever comes first, and
//! all of those may race each other on different threads. Teardown of a
//! connection is mutually exclusive with any concurrent attempt to tear down
//! the same connection from the other side, and a callback is never invoked
//! once its connection is gone.
//!
//! ## Architecture
//!
//! ```text
//! Owners (user types embedding an Endpoint)
//!     │
//!     ├── EventSource / Signal (signal/)
//!     ├── Connection / ScopedConnection (signal/)
//!     ├── ConnectionScope (signal/)
//!     │
//!     ├── Endpoint + Connectable (domain/)
//!     ├── Node lists: slab + generations (domain/)
//!     ├── LockDomain + acquire_pair (domain/)
//!     │
//!     └── Context: config, id blocks, counters
//! ```
//!
//! ## Example
//!
//! ```
//! use hydra_signals::{Connectable, Context, Endpoint, EventSource, RegistryConfig};
//!
//! struct Button {
//!     endpoint: Endpoint,
//!     clicked: EventSource<()>,
//! }
//!
//! impl Connectable for Button {
//!     fn endpoint(&self) -> &Endpoint {
//!         &self.endpoint
//!     }
//! }
//!
//! let ctx = Context::new(RegistryConfig::default());
//! let _entered = ctx.enter();
//!
//! let button = Button {
//!     endpoint: Endpoint::new(&ctx),
//!     clicked: EventSource::new(&ctx),
//! };
//! let dialog = Endpoint::new(&ctx);
//!
//! let handle = hydra_signals::connect(&button.clicked, &dialog, |_| {});
//! assert_eq!(button.clicked.fire(&()), 1);
//! assert!(hydra_signals::disconnect(&handle));
//! assert!(!hydra_signals::disconnect(&handle));
//! ```

pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod signal;
pub mod stress;

pub use config::RegistryConfig;
pub use context::{Context, EnterGuard, StatsSnapshot};
pub use domain::{Connectable, ConnectionId, DomainId, Endpoint, Position};
pub use error::SignalError;
pub use signal::{
    Connection, ConnectionScope, EventSource, ScopedConnection, Signal, connect, disconnect,
};
pub use stress::{StressHarness, StressReport};
