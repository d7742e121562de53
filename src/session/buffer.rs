//! Receive-side reassembly buffer.

/// Accumulates PUSH payloads between deliveries.
///
/// The buffer never grows past its capacity: a chunk that would reach it
/// flushes the accumulated bytes and starts a fresh window holding only
/// that chunk.
#[derive(Debug)]
pub struct RecvBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl RecvBuffer {
    /// Create an empty buffer with a fixed capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Accept one chunk payload.
    ///
    /// Returns the previously accumulated bytes when they must be
    /// delivered before `chunk` can be held. A chunk that could never fit
    /// is appended to the flushed bytes instead and the buffer is left
    /// empty.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        if self.data.len() + chunk.len() < self.capacity {
            self.data.extend_from_slice(chunk);
            return None;
        }

        let mut flushed = self.take();
        if chunk.len() < self.capacity {
            self.data.extend_from_slice(chunk);
        } else {
            flushed.extend_from_slice(chunk);
        }
        Some(flushed)
    }

    /// Take everything accumulated so far, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.data, Vec::with_capacity(self.capacity))
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
