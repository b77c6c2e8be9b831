//! Runtime context shared by every participant of one registry.
//!
//! A [`Context`] is created once at process start and passed explicitly to
//! every constructor that needs it. It allocates [`DomainId`]s, holds the
//! [`RegistryConfig`], and keeps accounting counters that tests and the
//! stress harness read through [`Context::stats`].
//!
//! Each thread that constructs participants must first call
//! [`Context::enter`]. The returned [`EnterGuard`] installs thread-local
//! bookkeeping: a block of domain ids reserved from the shared counter, so
//! that constructing participants does not contend on one atomic. Dropping
//! the guard tears the bookkeeping down and restores whatever the thread had
//! entered before.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::config::RegistryConfig;
use crate::domain::DomainId;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_STATE: RefCell<Option<ThreadState>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, Copy)]
struct ThreadState {
    context_id: u64,
    next_id: u64,
    block_end: u64,
}

/// Shared handle to one registry's runtime state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    id: u64,
    config: RegistryConfig,
    next_domain: AtomicU64,
    counters: Counters,
}

impl Context {
    /// Creates a context with the given configuration.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
                config,
                next_domain: AtomicU64::new(1),
                counters: Counters::default(),
            }),
        }
    }

    /// Returns the configuration this context was built with.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Attaches the current thread to this context.
    ///
    /// Entering a context the thread is already attached to is a no-op that
    /// returns an inert guard.
    #[must_use = "the thread is detached again when the guard drops"]
    pub fn enter(&self) -> EnterGuard {
        let id = self.inner.id;
        let nested = THREAD_STATE.with(|slot| {
            slot.borrow()
                .as_ref()
                .is_some_and(|state| state.context_id == id)
        });
        if nested {
            return EnterGuard {
                context: self.clone(),
                prev: None,
                nested: true,
                _not_send: PhantomData,
            };
        }

        let prev = THREAD_STATE.with(|slot| {
            slot.borrow_mut().replace(ThreadState {
                context_id: id,
                next_id: 0,
                block_end: 0,
            })
        });
        self.inner
            .counters
            .threads_attached
            .fetch_add(1, Ordering::Relaxed);
        tracing::debug!(context = id, "thread attached");
        EnterGuard {
            context: self.clone(),
            prev,
            nested: false,
            _not_send: PhantomData,
        }
    }

    /// Returns `true` if the current thread has entered this context.
    #[must_use]
    pub fn is_entered(&self) -> bool {
        THREAD_STATE.with(|slot| {
            slot.borrow()
                .as_ref()
                .is_some_and(|state| state.context_id == self.inner.id)
        })
    }

    /// Returns a point-in-time copy of the accounting counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.counters.snapshot()
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.inner.counters
    }

    /// Allocates the next domain id from this thread's reserved block.
    pub(crate) fn next_domain_id(&self) -> DomainId {
        let local = THREAD_STATE.with(|slot| {
            let mut slot = slot.borrow_mut();
            let state = slot
                .as_mut()
                .filter(|state| state.context_id == self.inner.id)?;
            if state.next_id == state.block_end {
                let size = self.inner.config.id_block_size;
                state.next_id = self.inner.next_domain.fetch_add(size, Ordering::Relaxed);
                state.block_end = state.next_id + size;
            }
            let id = state.next_id;
            state.next_id += 1;
            Some(id)
        });
        debug_assert!(
            local.is_some(),
            "participant constructed on a thread that has not entered its context"
        );
        self.inner
            .counters
            .domains_created
            .fetch_add(1, Ordering::Relaxed);
        match local {
            Some(id) => DomainId::new(id),
            None => {
                tracing::warn!(
                    context = self.inner.id,
                    "participant constructed before Context::enter on this thread"
                );
                DomainId::new(self.inner.next_domain.fetch_add(1, Ordering::Relaxed))
            }
        }
    }
}

/// Thread attachment returned by [`Context::enter`].
///
/// Must be dropped on the thread that created it.
#[derive(Debug)]
pub struct EnterGuard {
    context: Context,
    prev: Option<ThreadState>,
    nested: bool,
    _not_send: PhantomData<*const ()>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        if self.nested {
            return;
        }
        let prev = self.prev.take();
        THREAD_STATE.with(|slot| {
            *slot.borrow_mut() = prev;
        });
        self.context
            .inner
            .counters
            .threads_detached
            .fetch_add(1, Ordering::Relaxed);
        tracing::debug!(context = self.context.inner.id, "thread detached");
    }
}

/// Accounting counters, updated with relaxed atomics.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) domains_created: AtomicU64,
    pub(crate) domains_released: AtomicU64,
    pub(crate) threads_attached: AtomicU64,
    pub(crate) threads_detached: AtomicU64,
    pub(crate) connections_made: AtomicU64,
    pub(crate) connections_destroyed: AtomicU64,
    pub(crate) connections_rejected: AtomicU64,
    pub(crate) nodes_allocated: AtomicU64,
    pub(crate) nodes_released: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            domains_created: read(&self.domains_created),
            domains_released: read(&self.domains_released),
            threads_attached: read(&self.threads_attached),
            threads_detached: read(&self.threads_detached),
            connections_made: read(&self.connections_made),
            connections_destroyed: read(&self.connections_destroyed),
            connections_rejected: read(&self.connections_rejected),
            nodes_allocated: read(&self.nodes_allocated),
            nodes_released: read(&self.nodes_released),
        }
    }
}

/// Point-in-time copy of a context's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Lock domains handed out.
    pub domains_created: u64,
    /// Lock domains whose last reference was dropped.
    pub domains_released: u64,
    /// Successful [`Context::enter`] calls (nested entries excluded).
    pub threads_attached: u64,
    /// Dropped [`EnterGuard`]s (nested entries excluded).
    pub threads_detached: u64,
    /// Connections established.
    pub connections_made: u64,
    /// Connections torn down; each connection is counted exactly once.
    pub connections_destroyed: u64,
    /// `connect()` calls refused because an endpoint was tearing down.
    pub connections_rejected: u64,
    /// Nodes linked into any list.
    pub nodes_allocated: u64,
    /// Nodes unlinked from their list.
    pub nodes_released: u64,
}

impl StatsSnapshot {
    /// Connections currently established.
    #[must_use]
    pub const fn live_connections(&self) -> u64 {
        self.connections_made
            .saturating_sub(self.connections_destroyed)
    }

    /// Nodes currently linked.
    #[must_use]
    pub const fn live_nodes(&self) -> u64 {
        self.nodes_allocated.saturating_sub(self.nodes_released)
    }

    /// Returns `true` when everything created has been released.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.connections_made == self.connections_destroyed
            && self.nodes_allocated == self.nodes_released
            && self.domains_created == self.domains_released
    }
}
