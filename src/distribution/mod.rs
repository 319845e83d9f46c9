//! # Partition map and collective operations
//!
//! Observations are partitioned across *ranks*: independent execution units each holding a
//! disjoint local slice of the observation collection. This module models the partition map
//! ([`Distribution`]) and the communication capability it relies on ([`Communicator`]).
//!
//! ## Communication model
//!
//! The only primitive is a blocking, type-erased **all-gather**: every rank contributes one
//! payload and receives the payloads of all ranks, ordered by rank. Everything else
//! (rank-major concatenation, sums, global offsets, logical AND) is derived from it in
//! [`Distribution`].
//!
//! Collectives are **ordering contracts across the whole rank set**: every rank must call the
//! same sequence of collective operations in the same order. A rank that skips one leaves the
//! others blocked; this is not diagnosed here.
//!
//! ## Implementations
//!
//! * [`SingleProcess`] – one rank, gathering is the identity. Backs [`Distribution::local`],
//!   the partition map used whenever an answer can be computed from local data alone.
//! * [`LocalCluster`] – `N` in-memory ranks running on threads, used to exercise the
//!   multi-partition code paths without an external message-passing runtime.
//!
//! ## Global identifiers
//!
//! Global identifiers are rank-major: the locations of rank 0 come first, then those of rank
//! 1, and so on, each rank keeping its local order. The global id of local position `i` on
//! rank `r` is `i + Σ_{q<r} nlocs(q)` (see [`Distribution::global_offset`]).

mod local_cluster;

use std::{any::Any, fmt, sync::Arc};

pub use local_cluster::{LocalCluster, LocalCommunicator};

/// Type-erased value exchanged by a collective operation.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Blocking collective communication between the ranks of a partition set.
pub trait Communicator: Send + Sync + fmt::Debug {
    /// Index of the current rank, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks taking part in collectives.
    fn size(&self) -> usize;

    /// Contribute `local` and return the contributions of all ranks, ordered by rank.
    ///
    /// Blocks until every rank has contributed.
    fn all_gather(&self, local: Payload) -> Vec<Payload>;
}

/// Communicator of a single, isolated rank. Collectives return the local contribution only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather(&self, local: Payload) -> Vec<Payload> {
        vec![local]
    }
}

/// Partition map of an observation space: which rank this is, and how local data relate to
/// the global, rank-major identifier space.
#[derive(Debug, Clone)]
pub struct Distribution {
    comm: Arc<dyn Communicator>,
}

impl Distribution {
    pub fn new(comm: Arc<dyn Communicator>) -> Self {
        Distribution { comm }
    }

    /// A partition map that never communicates: every collective operates on local data only.
    pub fn local() -> Self {
        Distribution::new(Arc::new(SingleProcess))
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn num_ranks(&self) -> usize {
        self.comm.size()
    }

    /// `true` if materialising a global view requires data from other ranks.
    pub fn is_distributed(&self) -> bool {
        self.comm.size() > 1
    }

    /// Concatenate `local` from all ranks, in rank order.
    ///
    /// This is a collective operation.
    ///
    /// Panics
    /// ----------
    /// * if another rank contributed a different element type, which means the ranks called
    ///   collectives in a different order.
    pub fn all_gatherv<T>(&self, local: &[T]) -> Vec<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        if !self.is_distributed() {
            return local.to_vec();
        }

        let payload: Payload = Arc::new(local.to_vec());
        let gathered = self.comm.all_gather(payload);

        let mut global = Vec::new();
        for (rank, part) in gathered.iter().enumerate() {
            let part = part.downcast_ref::<Vec<T>>().unwrap_or_else(|| {
                panic!(
                    "collective mismatch: rank {rank} contributed a value of another type to all_gatherv<{}>",
                    std::any::type_name::<T>()
                )
            });
            global.extend_from_slice(part);
        }
        global
    }

    /// Gather one value per rank, in rank order.
    ///
    /// This is a collective operation.
    pub fn all_gather<T>(&self, value: T) -> Vec<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.all_gatherv(std::slice::from_ref(&value))
    }

    /// Number of locations held by each rank, given the local count `nlocs`.
    ///
    /// This is a collective operation.
    pub fn location_counts(&self, nlocs: usize) -> Vec<usize> {
        self.all_gather(nlocs)
    }

    /// Global id of local position 0: the number of locations held by lower ranks.
    ///
    /// This is a collective operation.
    pub fn global_offset(&self, nlocs: usize) -> usize {
        self.location_counts(nlocs)[..self.rank()].iter().sum()
    }

    /// Sum of `value` over all ranks.
    ///
    /// This is a collective operation.
    pub fn sum(&self, value: usize) -> usize {
        self.all_gather(value).into_iter().sum()
    }

    /// `true` if `value` is `true` on every rank.
    ///
    /// This is a collective operation.
    pub fn all(&self, value: bool) -> bool {
        self.all_gather(value).into_iter().all(|v| v)
    }
}

impl Default for Distribution {
    fn default() -> Self {
        Distribution::local()
    }
}
