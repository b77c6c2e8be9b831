//! Per-participant mutual exclusion with a total order for dual locking.
//!
//! A [`LockDomain`] owns the state it guards behind a
//! [`parking_lot::Mutex`]. Domains are shared through [`Arc`]: cloning the
//! `Arc` retains the domain and dropping it releases the reference, so a
//! domain stays alive for as long as any in-flight operation still holds it.
//!
//! Two domains are always locked through [`acquire_pair`], which takes them
//! in [`LockDomain::compare`] order regardless of argument order. Any two
//! threads locking the same pair therefore agree on the order and cannot
//! deadlock against each other.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

/// Identity of a lock domain.
///
/// Allocated by [`crate::Context`] and unique within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DomainId(u64);

impl DomainId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// Reference-counted mutual-exclusion unit guarding a `T`.
pub struct LockDomain<T> {
    id: DomainId,
    state: Mutex<T>,
}

impl<T> LockDomain<T> {
    /// Creates a domain guarding `value`.
    #[must_use]
    pub fn new(id: DomainId, value: T) -> Self {
        Self {
            id,
            state: Mutex::new(value),
        }
    }

    /// Creates a domain already wrapped for sharing.
    #[must_use]
    pub fn shared(id: DomainId, value: T) -> Arc<Self> {
        Arc::new(Self::new(id, value))
    }

    /// Returns the domain identity.
    #[must_use]
    pub const fn id(&self) -> DomainId {
        self.id
    }

    /// Blocks until the domain is locked. Not reentrant.
    pub fn acquire(&self) -> MutexGuard<'_, T> {
        self.state.lock()
    }

    /// Takes another reference to a shared domain.
    #[must_use]
    pub fn retain(this: &Arc<Self>) -> Arc<Self> {
        Arc::clone(this)
    }

    /// Drops one reference. The domain is freed with its last reference.
    pub fn release_ref(this: Arc<Self>) {
        drop(this);
    }

    /// Number of live references to a shared domain.
    #[must_use]
    pub fn ref_count(this: &Arc<Self>) -> usize {
        Arc::strong_count(this)
    }

    /// Total order over domains: id first, address as a tiebreak so two
    /// distinct domains never compare equal.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }

    fn order_key(&self) -> (DomainId, usize) {
        (self.id, std::ptr::from_ref(self) as usize)
    }
}

impl<T> PartialEq for LockDomain<T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<T> Eq for LockDomain<T> {}

impl<T> PartialOrd for LockDomain<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for LockDomain<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl<T> fmt::Debug for LockDomain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockDomain")
            .field("id", &self.id)
            .field("locked", &self.state.is_locked())
            .finish()
    }
}

/// Scoped guard over two domains, released together on drop.
///
/// `left` and `right` refer to the arguments of [`acquire_pair`] in the
/// order the caller passed them, whatever order they were locked in.
pub struct PairGuard<'a, T> {
    inner: PairInner<'a, T>,
}

enum PairInner<'a, T> {
    Shared(MutexGuard<'a, T>),
    Distinct {
        left: MutexGuard<'a, T>,
        right: MutexGuard<'a, T>,
    },
}

impl<T> PairGuard<'_, T> {
    /// State of the first domain passed to [`acquire_pair`].
    pub fn left(&mut self) -> &mut T {
        match &mut self.inner {
            PairInner::Shared(guard) => &mut **guard,
            PairInner::Distinct { left, .. } => &mut **left,
        }
    }

    /// State of the second domain passed to [`acquire_pair`].
    ///
    /// When both arguments were the same domain this is the same state as
    /// [`PairGuard::left`].
    pub fn right(&mut self) -> &mut T {
        match &mut self.inner {
            PairInner::Shared(guard) => &mut **guard,
            PairInner::Distinct { right, .. } => &mut **right,
        }
    }

    /// Returns `true` if both sides are one domain locked once.
    #[must_use]
    pub const fn is_shared(&self) -> bool {
        matches!(self.inner, PairInner::Shared(_))
    }
}

impl<T> fmt::Debug for PairGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairGuard")
            .field("shared", &self.is_shared())
            .finish()
    }
}

/// Locks two domains in their total order.
///
/// Passing the same domain twice locks it once.
pub fn acquire_pair<'a, T>(left: &'a LockDomain<T>, right: &'a LockDomain<T>) -> PairGuard<'a, T> {
    let inner = match left.compare(right) {
        Ordering::Equal => PairInner::Shared(left.acquire()),
        Ordering::Less => {
            let left = left.acquire();
            let right = right.acquire();
            PairInner::Distinct { left, right }
        }
        Ordering::Greater => {
            let right = right.acquire();
            let left = left.acquire();
            PairInner::Distinct { left, right }
        }
    };
    PairGuard { inner }
}
