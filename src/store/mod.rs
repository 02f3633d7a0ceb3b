pub mod errors;
pub mod persistence;

use std::{num::NonZeroUsize, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

pub use errors::StoreError;
pub use persistence::{JsonFiles, Persistence};

use crate::readings::{Fields, Reading};

/// Default number of readings retained in the history.
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => unreachable!(),
};

/// Latest reading plus a bounded, ingestion-ordered history of readings.
///
/// Cheap to clone; every clone shares the same state. All writes go through
/// [`put`](Self::put), which holds the write lock for the whole
/// stamp / append / trim / persist sequence and then publishes the result as
/// a new immutable [`Snapshot`]. Readers only ever grab the published `Arc`,
/// so they observe either the state before a `put` or the state after it.
#[derive(Debug, Clone)]
pub struct ReadingStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: RwLock<Arc<Snapshot>>,
    capacity: NonZeroUsize,
    persistence: Persistence,
}

#[derive(Debug)]
struct Snapshot {
    current: Option<Reading>,
    /// Oldest first, `len() <= capacity`.
    history: Arc<[Reading]>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            current: None,
            history: Arc::from(Vec::new()),
        }
    }
}

impl ReadingStore {
    /// Store that keeps everything in process memory.
    pub fn in_memory(capacity: NonZeroUsize) -> Self {
        Self::with_persistence(capacity, Persistence::Memory)
    }

    /// Store mirrored to `persistence`, which is first reset to the empty
    /// state: history does not survive a restart.
    pub async fn open(capacity: NonZeroUsize, persistence: Persistence) -> Result<Self, StoreError> {
        persistence.reset().await?;
        Ok(Self::with_persistence(capacity, persistence))
    }

    fn with_persistence(capacity: NonZeroUsize, persistence: Persistence) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Arc::default()),
                capacity,
                persistence,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity.get()
    }

    /// Accept a reading: stamp it with the ingestion time, make it the
    /// current reading and append it to the history, dropping the oldest
    /// entries beyond capacity.
    ///
    /// Returns the reading as stored. On [`StoreError::StorageFault`]
    /// nothing is published.
    pub async fn put(&self, fields: Fields) -> Result<Reading, StoreError> {
        let mut state = self.inner.state.write().await;

        let timestamp = next_timestamp(state.current.as_ref().map(Reading::timestamp), Utc::now());
        let reading = Reading::stamped(fields, timestamp);
        let history = append_bounded(&state.history, reading.clone(), self.inner.capacity);

        self.inner.persistence.save(&reading, &history).await?;

        *state = Arc::new(Snapshot {
            current: Some(reading.clone()),
            history: history.into(),
        });

        debug!(
            timestamp = %reading.timestamp(),
            fields = reading.fields().len(),
            history_len = state.history.len(),
            "reading accepted"
        );
        Ok(reading)
    }

    /// Copy of the most recently accepted reading.
    pub async fn current(&self) -> Result<Reading, StoreError> {
        self.snapshot().await.current.clone().ok_or(StoreError::NotFound)
    }

    /// Copy of the history, oldest first. Empty until the first `put`.
    pub async fn history(&self) -> Vec<Reading> {
        self.snapshot().await.history.to_vec()
    }

    /// Ingestion time of the current reading, if any.
    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.snapshot().await.current.as_ref().map(Reading::timestamp)
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.history.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.inner.state.read().await)
    }
}

/// Ingestion timestamps never go backwards, even if the wall clock does.
fn next_timestamp(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(previous) if previous > now => previous,
        _ => now,
    }
}

/// `history + [reading]`, keeping only the last `capacity` entries.
fn append_bounded(history: &[Reading], reading: Reading, capacity: NonZeroUsize) -> Vec<Reading> {
    let keep = capacity.get() - 1;
    let start = history.len().saturating_sub(keep);

    let mut next = Vec::with_capacity(history.len() - start + 1);
    next.extend_from_slice(&history[start..]);
    next.push(reading);
    next
}
