//! In-memory multi-rank cluster: every rank is a thread of the current process and the
//! all-gather goes through a shared slot table guarded by a reusable barrier.

use std::{
    fmt,
    sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError},
    thread,
};

use super::{Communicator, Distribution, Payload};

struct Exchange {
    barrier: Barrier,
    slots: Mutex<Vec<Option<Payload>>>,
}

impl Exchange {
    fn slots(&self) -> MutexGuard<'_, Vec<Option<Payload>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A set of `N` in-memory ranks sharing one exchange area.
///
/// Build the communicators with [`LocalCluster::communicators`] and hand one to each thread,
/// or let [`LocalCluster::run`] spawn the threads.
pub struct LocalCluster {
    num_ranks: usize,
    exchange: Arc<Exchange>,
}

impl LocalCluster {
    /// Create a cluster of `num_ranks` ranks.
    ///
    /// Panics
    /// ----------
    /// * if `num_ranks == 0`.
    pub fn new(num_ranks: usize) -> Self {
        assert!(num_ranks > 0, "a cluster needs at least one rank");
        LocalCluster {
            num_ranks,
            exchange: Arc::new(Exchange {
                barrier: Barrier::new(num_ranks),
                slots: Mutex::new(vec![None; num_ranks]),
            }),
        }
    }

    /// One communicator per rank, in rank order.
    pub fn communicators(&self) -> Vec<LocalCommunicator> {
        (0..self.num_ranks)
            .map(|rank| LocalCommunicator {
                rank,
                size: self.num_ranks,
                exchange: Arc::clone(&self.exchange),
            })
            .collect()
    }

    /// Run `f` once per rank on its own thread and collect the results in rank order.
    ///
    /// Each invocation receives the [`Distribution`] of its rank. A panic on any rank is
    /// propagated once all threads have been joined; ranks still waiting on a collective the
    /// panicking rank never reached stay blocked.
    pub fn run<R, F>(num_ranks: usize, f: F) -> Vec<R>
    where
        F: Fn(Arc<Distribution>) -> R + Sync,
        R: Send,
    {
        let cluster = LocalCluster::new(num_ranks);
        let f = &f;

        thread::scope(|scope| {
            let handles: Vec<_> = cluster
                .communicators()
                .into_iter()
                .map(|comm| {
                    scope.spawn(move || f(Arc::new(Distribution::new(Arc::new(comm)))))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|err| std::panic::resume_unwind(err)))
                .collect()
        })
    }
}

/// Communicator of one rank of a [`LocalCluster`].
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    exchange: Arc<Exchange>,
}

impl fmt::Debug for LocalCommunicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCommunicator")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather(&self, local: Payload) -> Vec<Payload> {
        // A rank only rewrites its own slot once every rank has read the previous round.
        self.exchange.slots()[self.rank] = Some(local);
        self.exchange.barrier.wait();

        let gathered: Option<Vec<Payload>> = self.exchange.slots().iter().cloned().collect();
        self.exchange.barrier.wait();

        gathered.unwrap_or_else(|| {
            panic!("rank {} found an empty slot after the exchange barrier", self.rank)
        })
    }
}
