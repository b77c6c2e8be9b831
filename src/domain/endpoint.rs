//! The connectable capability.
//!
//! Any object that can be either end of a connection embeds an [`Endpoint`]
//! and implements [`Connectable`] by returning it. The endpoint owns the
//! object's node list and lock domain; when it drops, every connection to or
//! from the object is torn down before the domain reference is released.

use std::fmt;
use std::sync::Arc;

use super::DomainId;
use super::lock_domain::LockDomain;
use super::node::{self, Domain, NodeList, NodeRole};
use crate::context::Context;

/// Capability of being an endpoint of connections.
///
/// ```
/// use hydra_signals::{Connectable, Context, Endpoint, RegistryConfig};
///
/// struct Label {
///     endpoint: Endpoint,
/// }
///
/// impl Connectable for Label {
///     fn endpoint(&self) -> &Endpoint {
///         &self.endpoint
///     }
/// }
///
/// let ctx = Context::new(RegistryConfig::default());
/// let _entered = ctx.enter();
/// let label = Label { endpoint: Endpoint::new(&ctx) };
/// assert_eq!(label.connection_count(), 0);
/// ```
pub trait Connectable {
    /// The endpoint holding this object's connections.
    fn endpoint(&self) -> &Endpoint;

    /// Number of connection halves currently attached to this object.
    fn connection_count(&self) -> usize {
        self.endpoint().len()
    }

    /// Tears down every connection to or from this object. Returns how many
    /// this call removed.
    fn disconnect_all(&self) -> usize {
        self.endpoint().remove_all()
    }
}

impl Connectable for Endpoint {
    fn endpoint(&self) -> &Endpoint {
        self
    }
}

impl<T: Connectable + ?Sized> Connectable for Arc<T> {
    fn endpoint(&self) -> &Endpoint {
        (**self).endpoint()
    }
}

impl<T: Connectable + ?Sized> Connectable for Box<T> {
    fn endpoint(&self) -> &Endpoint {
        (**self).endpoint()
    }
}

/// Node list plus lock domain of one connectable object.
pub struct Endpoint {
    domain: Arc<Domain>,
}

impl Endpoint {
    /// Creates an endpoint with a fresh lock domain.
    ///
    /// The current thread must have entered `context`.
    #[must_use]
    pub fn new(context: &Context) -> Self {
        let id = context.next_domain_id();
        Self {
            domain: LockDomain::shared(id, NodeList::new(context.clone())),
        }
    }

    /// Identity of this endpoint's lock domain.
    #[must_use]
    pub fn id(&self) -> DomainId {
        self.domain.id()
    }

    /// Number of attached nodes across all roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.domain.acquire().len()
    }

    /// Returns `true` if nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tears down every attached node. Returns how many this call removed.
    pub fn remove_all(&self) -> usize {
        node::remove_all(&self.domain)
    }

    pub(crate) fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    pub(crate) fn count(&self, role: NodeRole) -> usize {
        self.domain.acquire().count(role)
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.domain.acquire().begin_close();
        let removed = node::remove_all(&self.domain);
        if removed > 0 {
            tracing::debug!(domain = %self.domain.id(), removed, "endpoint torn down");
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.domain.id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::domain::node::{Position, link};

    fn connect(source: &Endpoint, sink: &Endpoint) {
        if link(source.domain(), sink.domain(), Position::Back, Box::new(())).is_none() {
            panic!("link refused");
        }
    }

    #[test]
    fn drop_releases_connections_and_domain() {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let source = Endpoint::new(&ctx);
        let sink = Endpoint::new(&ctx);
        connect(&source, &sink);
        connect(&source, &sink);
        assert_eq!(source.len(), 2);

        drop(sink);
        assert!(source.is_empty());
        drop(source);

        let stats = ctx.stats();
        assert!(stats.is_balanced(), "unbalanced: {stats:?}");
        assert_eq!(stats.domains_released, 2);
    }

    #[test]
    fn remove_all_keeps_endpoint_usable() {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let source = Endpoint::new(&ctx);
        let sink = Endpoint::new(&ctx);
        connect(&source, &sink);

        assert_eq!(sink.disconnect_all(), 1);
        assert_eq!(sink.disconnect_all(), 0);
        connect(&source, &sink);
        assert_eq!(source.connection_count(), 1);
    }

    #[test]
    fn capability_forwards_through_smart_pointers() {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let shared = Arc::new(Endpoint::new(&ctx));
        let boxed: Box<dyn Connectable> = Box::new(Endpoint::new(&ctx));
        assert_eq!(shared.endpoint().id(), shared.id());
        assert_ne!(boxed.endpoint().id(), shared.id());
    }
}
