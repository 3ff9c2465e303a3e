//! Retransmission queue of unacknowledged and reneged DATA chunks.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{PathId, Tsn};

/// A DATA chunk held for possible retransmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    tsn: Tsn,
    length: u32,
    last_destination: PathId,
    acknowledged: bool,
    counts_as_outstanding: bool,
    reneged: bool,
}

impl DataChunk {
    /// A freshly sent chunk, in flight on `destination`.
    pub fn new(tsn: Tsn, destination: PathId, length: u32) -> Self {
        Self {
            tsn,
            length,
            last_destination: destination,
            acknowledged: false,
            counts_as_outstanding: true,
            reneged: false,
        }
    }

    /// Mark as acknowledged.
    pub fn acknowledged(mut self) -> Self {
        self.acknowledged = true;
        self.counts_as_outstanding = false;
        self
    }

    /// Mark as reneged by the receiver. Only acknowledged chunks can be.
    pub fn reneged(mut self) -> Self {
        self.reneged = self.acknowledged;
        self
    }

    /// Stop counting the chunk against its path's outstanding bytes.
    pub fn not_outstanding(mut self) -> Self {
        self.counts_as_outstanding = false;
        self
    }

    pub fn tsn(&self) -> Tsn {
        self.tsn
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn last_destination(&self) -> PathId {
        self.last_destination
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn counts_as_outstanding(&self) -> bool {
        self.counts_as_outstanding
    }

    pub fn is_reneged(&self) -> bool {
        self.reneged
    }

    /// Whether the chunk has to be sent again if its path fails.
    pub fn needs_retransmission(&self) -> bool {
        (!self.acknowledged && self.counts_as_outstanding) || self.reneged
    }
}

/// Collection of chunks the controller can scan and re-route.
pub trait RetransmissionQueue {
    /// Visit every chunk in a stable order.
    fn for_each_chunk(&self, visitor: &mut dyn FnMut(&DataChunk));

    /// Point a chunk at a new destination path.
    ///
    /// Only the last destination changes. Returns false if the chunk is unknown.
    fn move_chunk(&mut self, tsn: Tsn, to: PathId) -> bool;
}

/// Retransmission queue ordered by TSN.
#[derive(Debug, Default, Clone)]
pub struct PayloadQueue {
    chunks: BTreeMap<Tsn, DataChunk>,
}

impl PayloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, tsn: Tsn) -> Option<&DataChunk> {
        self.chunks.get(&tsn)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataChunk> {
        self.chunks.values()
    }

    /// Chunks whose last destination is `path`.
    pub fn chunks_on(&self, path: PathId) -> impl Iterator<Item = &DataChunk> {
        self.chunks
            .values()
            .filter(move |c| c.last_destination == path)
    }

    pub fn insert(&mut self, chunk: DataChunk) -> Result<()> {
        if self.chunks.contains_key(&chunk.tsn) {
            return Err(Error::DuplicateChunk(chunk.tsn));
        }
        self.chunks.insert(chunk.tsn, chunk);
        Ok(())
    }

    /// Mark a chunk acknowledged. Returns the bytes it held outstanding, if any.
    pub fn acknowledge(&mut self, tsn: Tsn) -> Result<Option<(PathId, u32)>> {
        let chunk = self.chunks.get_mut(&tsn).ok_or(Error::ChunkNotFound(tsn))?;
        let released = (chunk.counts_as_outstanding && !chunk.acknowledged)
            .then_some((chunk.last_destination, chunk.length));
        chunk.acknowledged = true;
        chunk.counts_as_outstanding = false;
        chunk.reneged = false;
        Ok(released)
    }

    /// Mark a previously acknowledged chunk as reneged.
    ///
    /// Returns false, leaving the chunk alone, if it was never acknowledged.
    pub fn renege(&mut self, tsn: Tsn) -> Result<bool> {
        let chunk = self.chunks.get_mut(&tsn).ok_or(Error::ChunkNotFound(tsn))?;
        if !chunk.acknowledged {
            return Ok(false);
        }
        chunk.reneged = true;
        Ok(true)
    }

    pub fn remove(&mut self, tsn: Tsn) -> Option<DataChunk> {
        self.chunks.remove(&tsn)
    }

    /// Drop acknowledged, non-reneged chunks. Returns how many were removed.
    pub fn purge_acknowledged(&mut self) -> usize {
        let before = self.chunks.len();
        self.chunks.retain(|_, c| !c.acknowledged || c.reneged);
        before - self.chunks.len()
    }
}

impl RetransmissionQueue for PayloadQueue {
    fn for_each_chunk(&self, visitor: &mut dyn FnMut(&DataChunk)) {
        for chunk in self.chunks.values() {
            visitor(chunk);
        }
    }

    fn move_chunk(&mut self, tsn: Tsn, to: PathId) -> bool {
        match self.chunks.get_mut(&tsn) {
            Some(chunk) => {
                chunk.last_destination = to;
                true
            }
            None => false,
        }
    }
}
