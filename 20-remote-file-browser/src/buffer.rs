//! Growable byte container that accumulates one command's output.
//!
//! The buffer keeps `capacity >= len` at all times and never gives capacity
//! back while a command runs. Two growth paths exist:
//!
//! - [`ResponseBuffer::reserve_for_file`] sizes the buffer for a whole file
//!   in one exact-fit step before the read starts.
//! - [`ResponseBuffer::extend_from_slice`] doubles the capacity when an
//!   append would not fit.
//!
//! Every reservation is fallible; a failed one leaves the buffer untouched
//! and surfaces as [`ResourceError::Allocation`].

use crate::error::ResourceError;

/// Capacity every response starts with.
pub const BASELINE_CAPACITY: usize = 1024;

/// Extra room reserved past a file's size for the sentinel byte.
pub const SENTINEL_MARGIN: usize = 10;

/// Marker appended after a file body so the client can strip it.
pub const SENTINEL: u8 = b' ';

#[derive(Debug)]
pub struct ResponseBuffer {
    bytes: Vec<u8>,
}

impl ResponseBuffer {
    /// Allocates a buffer with [`BASELINE_CAPACITY`].
    pub fn new() -> Result<Self, ResourceError> {
        Self::with_capacity(BASELINE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, ResourceError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(capacity)
            .map_err(|source| ResourceError::Allocation {
                requested: capacity,
                source,
            })?;
        Ok(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Makes room for at least `total` bytes in a single reservation.
    ///
    /// Does nothing when the current capacity already suffices.
    pub fn reserve_total(&mut self, total: usize) -> Result<(), ResourceError> {
        if total <= self.bytes.capacity() {
            return Ok(());
        }
        let additional = total - self.bytes.len();
        self.bytes
            .try_reserve_exact(additional)
            .map_err(|source| ResourceError::Allocation {
                requested: total,
                source,
            })
    }

    /// Sizes the buffer for a file of `file_size` bytes plus the sentinel margin.
    pub fn reserve_for_file(&mut self, file_size: u64) -> Result<(), ResourceError> {
        let total = usize::try_from(file_size)
            .ok()
            .and_then(|size| size.checked_add(self.bytes.len()))
            .and_then(|size| size.checked_add(SENTINEL_MARGIN))
            .ok_or(ResourceError::Oversized {
                requested: file_size,
            })?;
        self.reserve_total(total)
    }

    /// Appends `data`, doubling the capacity first if it would not fit.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<(), ResourceError> {
        let needed = self
            .bytes
            .len()
            .checked_add(data.len())
            .ok_or(ResourceError::Oversized {
                requested: u64::MAX,
            })?;
        if needed > self.bytes.capacity() {
            let doubled = self.bytes.capacity().saturating_mul(2);
            self.reserve_total(needed.max(doubled))?;
        }
        self.bytes.extend_from_slice(data);
        Ok(())
    }

    pub fn push_sentinel(&mut self) -> Result<(), ResourceError> {
        self.extend_from_slice(&[SENTINEL])
    }

    /// Drops the contents but keeps the allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}
