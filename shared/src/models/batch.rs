//! Batches of records handed from the batcher to exporters.

use super::{Signal, TelemetryRecord};
use chrono::{DateTime, Utc};

/// A set of exporter indices, stored as a bitmask.
///
/// Exporters are addressed by their position in the configuration, so at most
/// [`ExporterSet::CAPACITY`] exporters can be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExporterSet(u64);

impl ExporterSet {
    /// Maximum number of exporters a set can address.
    pub const CAPACITY: usize = 64;

    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns a copy of this set with `index` added.
    ///
    /// Indices at or beyond [`Self::CAPACITY`] are ignored.
    #[must_use]
    pub fn with(self, index: usize) -> Self {
        if index >= Self::CAPACITY {
            return self;
        }
        Self(self.0 | (1 << index))
    }

    /// Returns true if `index` is in the set.
    #[must_use]
    pub fn contains(self, index: usize) -> bool {
        index < Self::CAPACITY && self.0 & (1 << index) != 0
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of exporters in the set.
    #[must_use]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates over the indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..Self::CAPACITY).filter(move |i| self.contains(*i))
    }
}

impl FromIterator<usize> for ExporterSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// An ordered, bounded group of records bound for one set of exporters.
///
/// A batch has no mutating API: once built it is only read.
#[derive(Debug)]
pub struct Batch {
    id: u64,
    created_at: DateTime<Utc>,
    destinations: ExporterSet,
    records: Vec<TelemetryRecord>,
}

impl Batch {
    /// Creates a batch.
    #[must_use]
    pub fn new(
        id: u64,
        created_at: DateTime<Utc>,
        destinations: ExporterSet,
        records: Vec<TelemetryRecord>,
    ) -> Self {
        Self {
            id,
            created_at,
            destinations,
            records,
        }
    }

    /// Batch sequence number, increasing in creation order.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the first record of the batch was accumulated.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Exporters this batch must be delivered to.
    #[must_use]
    pub fn destinations(&self) -> ExporterSet {
        self.destinations
    }

    /// The records, in arrival order.
    #[must_use]
    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records of each signal, indexed by [`Signal::index`].
    #[must_use]
    pub fn signal_counts(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for record in &self.records {
            counts[record.signal().index()] += 1;
        }
        counts
    }

    /// Number of records of one signal.
    #[must_use]
    pub fn count_of(&self, signal: Signal) -> usize {
        self.signal_counts()[signal.index()]
    }
}
