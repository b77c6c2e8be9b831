//! Workloads run by the stress harness.
//!
//! Each scenario is built once on the harness thread and shared by every
//! worker. Workers follow a deterministic schedule derived from their index
//! and iteration counter, so a failing run can be replayed with the same
//! configuration.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::report::WorkerTally;
use crate::context::Context;
use crate::domain::{Connectable, Endpoint};
use crate::error::SignalError;
use crate::signal::{Connection, EventSource};

/// One stress workload.
pub trait Scenario: Send + Sync + Sized + 'static {
    /// Name used in reports and logs.
    const NAME: &'static str;

    /// Builds the shared participants. Runs on a thread that has entered
    /// `context`.
    fn setup(context: &Context) -> Self;

    /// Runs one worker's share of the load.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvariantViolated`] if the registry misbehaves
    /// while the worker runs.
    fn work(
        &self,
        context: &Context,
        worker: usize,
        iterations: usize,
    ) -> Result<WorkerTally, SignalError>;

    /// Checks scenario-specific invariants once every worker has finished.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvariantViolated`] on a mismatch.
    fn verify(&self, _totals: &WorkerTally) -> Result<(), SignalError> {
        Ok(())
    }
}

/// A participant that both emits and receives.
#[derive(Debug)]
pub struct Peer {
    changed: EventSource<u64>,
    received: AtomicU64,
}

impl Peer {
    fn new(context: &Context) -> Self {
        Self {
            changed: EventSource::new(context),
            received: AtomicU64::new(0),
        }
    }

    fn on_changed(&self, _value: &u64) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

impl Connectable for Peer {
    fn endpoint(&self) -> &Endpoint {
        self.changed.endpoint()
    }
}

fn counting(counter: &Arc<AtomicU64>) -> impl Fn(&u64) + Send + Sync + 'static {
    let counter = Arc::clone(counter);
    move |_: &u64| {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

fn record(tally: &mut WorkerTally, connection: &Connection) {
    if connection.is_issued() {
        tally.connects += 1;
    }
}

/// Concurrent connect, duplicate disconnect, transient receiver destruction
/// and fire on two mutually connected peers.
#[derive(Debug)]
pub struct Churn {
    a: Arc<Peer>,
    b: Arc<Peer>,
    pool: Mutex<Vec<Connection>>,
    transient_hits: Arc<AtomicU64>,
}

impl Scenario for Churn {
    const NAME: &'static str = "churn";

    fn setup(context: &Context) -> Self {
        Self {
            a: Arc::new(Peer::new(context)),
            b: Arc::new(Peer::new(context)),
            pool: Mutex::new(Vec::new()),
            transient_hits: Arc::new(AtomicU64::new(0)),
        }
    }

    fn work(
        &self,
        context: &Context,
        worker: usize,
        iterations: usize,
    ) -> Result<WorkerTally, SignalError> {
        let mut tally = WorkerTally::default();
        for i in 0..iterations {
            match (i + worker) % 5 {
                0 => {
                    let connection = self.a.changed.connect_method(&self.b, Peer::on_changed);
                    record(&mut tally, &connection);
                    self.pool.lock().push(connection);
                }
                1 => {
                    let connection = self.b.changed.connect_method(&self.a, Peer::on_changed);
                    record(&mut tally, &connection);
                    self.pool.lock().push(connection);
                }
                2 => {
                    let popped = self.pool.lock().pop();
                    if let Some(connection) = popped {
                        tally.record_disconnect(connection.disconnect());
                        if connection.disconnect() {
                            return Err(SignalError::InvariantViolated(format!(
                                "connection {:?} disconnected twice",
                                connection.id()
                            )));
                        }
                        tally.record_disconnect(false);
                    }
                }
                3 => {
                    let transient = Endpoint::new(context);
                    let first = self.a.changed.connect(&transient, counting(&self.transient_hits));
                    let second = self.b.changed.connect(&transient, counting(&self.transient_hits));
                    record(&mut tally, &first);
                    record(&mut tally, &second);
                    self.pool.lock().extend([first, second]);
                    drop(transient);
                }
                _ => {
                    let value = u64::try_from(i).unwrap_or(u64::MAX);
                    tally.invocations += self.a.changed.fire(&value) as u64;
                    tally.invocations += self.b.changed.fire(&value) as u64;
                    tally.fires += 2;
                }
            }
        }
        Ok(tally)
    }

    fn verify(&self, totals: &WorkerTally) -> Result<(), SignalError> {
        let delivered = self.a.received()
            + self.b.received()
            + self.transient_hits.load(Ordering::Relaxed);
        if delivered != totals.invocations {
            return Err(SignalError::InvariantViolated(format!(
                "{delivered} callbacks ran but fire() reported {}",
                totals.invocations
            )));
        }
        Ok(())
    }
}

/// Threads connecting A→B and B→A at the same time while receivers are
/// cleared underneath them.
#[derive(Debug)]
pub struct CrossConnect {
    a: Peer,
    b: Peer,
}

impl Scenario for CrossConnect {
    const NAME: &'static str = "cross_connect";

    fn setup(context: &Context) -> Self {
        Self {
            a: Peer::new(context),
            b: Peer::new(context),
        }
    }

    fn work(
        &self,
        _context: &Context,
        worker: usize,
        iterations: usize,
    ) -> Result<WorkerTally, SignalError> {
        let (from, to) = if worker % 2 == 0 {
            (&self.a, &self.b)
        } else {
            (&self.b, &self.a)
        };
        let mut tally = WorkerTally::default();
        for i in 0..iterations {
            let connection = from.changed.connect(to, |_| {});
            record(&mut tally, &connection);
            if i % 3 == 0 {
                tally.record_disconnect(connection.disconnect());
            }
            if i % 7 == 0 {
                to.disconnect_all();
            }
            if i % 11 == 0 {
                tally.invocations += from.changed.fire(&0) as u64;
                tally.fires += 1;
            }
        }
        Ok(tally)
    }
}

/// Firing threads racing subscribers that disconnect themselves from inside
/// their own callback.
#[derive(Debug)]
pub struct FireStorm {
    source: EventSource<u64>,
    receiver: Endpoint,
    removed: Arc<AtomicU64>,
}

impl FireStorm {
    fn subscribe(&self) -> Connection {
        let slot = Arc::new(Mutex::new(Connection::empty()));
        let removed = Arc::clone(&self.removed);
        let own = Arc::clone(&slot);
        let connection = self.source.connect(&self.receiver, move |_| {
            if own.lock().disconnect() {
                removed.fetch_add(1, Ordering::Relaxed);
            }
        });
        *slot.lock() = connection.clone();
        connection
    }
}

impl Scenario for FireStorm {
    const NAME: &'static str = "fire_storm";

    fn setup(context: &Context) -> Self {
        Self {
            source: EventSource::new(context),
            receiver: Endpoint::new(context),
            removed: Arc::new(AtomicU64::new(0)),
        }
    }

    fn work(
        &self,
        _context: &Context,
        worker: usize,
        iterations: usize,
    ) -> Result<WorkerTally, SignalError> {
        let mut tally = WorkerTally::default();
        for i in 0..iterations {
            if worker % 2 == 0 {
                let value = u64::try_from(i).unwrap_or(u64::MAX);
                tally.invocations += self.source.fire(&value) as u64;
                tally.fires += 1;
                continue;
            }
            let connection = self.subscribe();
            record(&mut tally, &connection);
            if i % 4 == 0 && connection.disconnect() {
                self.removed.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(tally)
    }

    fn verify(&self, totals: &WorkerTally) -> Result<(), SignalError> {
        let removed = self.removed.load(Ordering::Relaxed);
        let remaining = self.source.subscriber_count() as u64;
        if removed + remaining != totals.connects {
            return Err(SignalError::InvariantViolated(format!(
                "{} connections made but {removed} removed and {remaining} remaining",
                totals.connects
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;

    fn run_inline<S: Scenario>(workers: usize, iterations: usize) -> (Context, WorkerTally) {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let scenario = S::setup(&ctx);
        let mut totals = WorkerTally::default();
        for worker in 0..workers {
            let Ok(tally) = scenario.work(&ctx, worker, iterations) else {
                panic!("{} worker {worker} failed", S::NAME);
            };
            totals.merge(&tally);
        }
        if let Err(err) = scenario.verify(&totals) {
            panic!("{} verification failed: {err}", S::NAME);
        }
        drop(scenario);
        (ctx, totals)
    }

    #[test]
    fn churn_balances_on_one_thread() {
        let (ctx, totals) = run_inline::<Churn>(2, 50);
        assert!(totals.connects > 0);
        assert!(totals.fires > 0);
        assert!(ctx.stats().is_balanced(), "{:?}", ctx.stats());
    }

    #[test]
    fn cross_connect_balances_on_one_thread() {
        let (ctx, totals) = run_inline::<CrossConnect>(2, 30);
        assert_eq!(totals.connects, 60);
        assert!(ctx.stats().is_balanced(), "{:?}", ctx.stats());
    }

    #[test]
    fn fire_storm_subscribers_remove_themselves() {
        let (ctx, totals) = run_inline::<FireStorm>(2, 20);
        assert_eq!(totals.connects, 20);
        assert!(ctx.stats().is_balanced(), "{:?}", ctx.stats());
    }

    #[test]
    fn self_disconnecting_subscriber_runs_once() {
        let ctx = Context::new(RegistryConfig::default());
        let _entered = ctx.enter();
        let storm = FireStorm::setup(&ctx);
        let connection = storm.subscribe();

        assert_eq!(storm.source.fire(&1), 1);
        assert_eq!(storm.source.fire(&2), 0);
        assert!(!connection.is_connected());
        assert_eq!(storm.removed.load(Ordering::Relaxed), 1);
    }
}
