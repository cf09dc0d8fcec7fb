//! Allocation shim
//!
//! The translated module and its runtime never own memory. Every dynamic
//! allocation they make, including the linear memory itself, is redirected
//! through [`Allocator`] into a [`HostHeap`] supplied by the host.
//!
//! # Zero fill
//!
//! `alloc_zeroed` must hand out zeroed bytes. A host heap declares whether it
//! guarantees that through [`HostHeap::zero_fills`]; when it does not, the
//! shim clears the block itself before returning it.

use super::{BridgeError, BridgeResult};
use std::ops::{Deref, DerefMut};

/// Byte written into fresh blocks by a heap that does not zero-fill
pub const DIRTY_BYTE: u8 = 0xA5;

/// A block of bytes owned by a host heap
///
/// Blocks are only created by [`HostHeap`] implementations and must be handed
/// back through [`Allocator::release`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HostBlock {
    bytes: Box<[u8]>,
}

impl HostBlock {
    /// Wrap storage produced by a host heap
    pub fn from_host(bytes: Vec<u8>) -> Self {
        HostBlock {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Give the storage back to the heap that produced it
    pub fn into_host(self) -> Vec<u8> {
        self.bytes.into_vec()
    }
}

impl Deref for HostBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for HostBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// The host's managed allocator
pub trait HostHeap: Send {
    /// Allocate `size` bytes, or None if the heap cannot satisfy the request
    fn allocate(&mut self, size: usize) -> Option<HostBlock>;

    /// Resize a block, preserving the common prefix
    ///
    /// On failure the original block is handed back untouched.
    fn reallocate(&mut self, block: HostBlock, new_size: usize) -> Result<HostBlock, HostBlock>;

    fn release(&mut self, block: HostBlock);

    /// Whether fresh blocks (and the grown tail of reallocated ones) are zeroed
    fn zero_fills(&self) -> bool;
}

/// Default host heap with byte accounting and an optional budget
#[derive(Debug, Clone)]
pub struct ManagedHeap {
    limit: Option<usize>,
    zero_fill: bool,
    live: usize,
    peak: usize,
}

impl ManagedHeap {
    /// An unbounded heap that zero-fills, like a conservative GC heap
    pub fn new() -> Self {
        ManagedHeap {
            limit: None,
            zero_fill: true,
            live: 0,
            peak: 0,
        }
    }

    /// Cap the number of live bytes
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Choose whether fresh bytes are zeroed or left dirty
    pub fn with_zero_fill(mut self, zero_fill: bool) -> Self {
        self.zero_fill = zero_fill;
        self
    }

    pub fn live_bytes(&self) -> usize {
        self.live
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak
    }

    fn fresh_byte(&self) -> u8 {
        if self.zero_fill {
            0
        } else {
            DIRTY_BYTE
        }
    }

    fn admit(&mut self, extra: usize) -> bool {
        let Some(total) = self.live.checked_add(extra) else {
            return false;
        };
        if self.limit.is_some_and(|limit| total > limit) {
            return false;
        }
        self.live = total;
        self.peak = self.peak.max(total);
        true
    }
}

impl Default for ManagedHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl HostHeap for ManagedHeap {
    fn allocate(&mut self, size: usize) -> Option<HostBlock> {
        if !self.admit(size) {
            return None;
        }
        let mut bytes = Vec::new();
        if bytes.try_reserve_exact(size).is_err() {
            self.live -= size;
            return None;
        }
        bytes.resize(size, self.fresh_byte());
        Some(HostBlock::from_host(bytes))
    }

    fn reallocate(&mut self, block: HostBlock, new_size: usize) -> Result<HostBlock, HostBlock> {
        let old_size = block.len();
        if new_size > old_size && !self.admit(new_size - old_size) {
            return Err(block);
        }

        let mut bytes = block.into_host();
        if new_size > old_size {
            if bytes.try_reserve_exact(new_size - old_size).is_err() {
                self.live -= new_size - old_size;
                return Err(HostBlock::from_host(bytes));
            }
            bytes.resize(new_size, self.fresh_byte());
        } else {
            bytes.truncate(new_size);
            self.live -= old_size - new_size;
        }
        Ok(HostBlock::from_host(bytes))
    }

    fn release(&mut self, block: HostBlock) {
        self.live = self.live.saturating_sub(block.len());
    }

    fn zero_fills(&self) -> bool {
        self.zero_fill
    }
}

/// The allocation shim: calloc, free and realloc on top of a host heap
pub struct Allocator {
    heap: Box<dyn HostHeap>,
}

impl Allocator {
    pub fn new(heap: Box<dyn HostHeap>) -> Self {
        Allocator { heap }
    }

    pub fn heap(&self) -> &dyn HostHeap {
        self.heap.as_ref()
    }

    /// calloc: `count * size` bytes, all zero before first use
    pub fn alloc_zeroed(&mut self, count: usize, size: usize) -> BridgeResult<HostBlock> {
        let requested = count
            .checked_mul(size)
            .ok_or(BridgeError::AllocationFailure { requested: usize::MAX })?;

        let mut block = self
            .heap
            .allocate(requested)
            .ok_or(BridgeError::AllocationFailure { requested })?;
        if !self.heap.zero_fills() {
            block.fill(0);
        }

        log::trace!("alloc_zeroed({count}, {size}) -> {requested} bytes");
        Ok(block)
    }

    /// free: a missing block is a no-op
    pub fn release(&mut self, block: Option<HostBlock>) {
        if let Some(block) = block {
            log::trace!("release({} bytes)", block.len());
            self.heap.release(block);
        }
    }

    /// realloc: on failure `block` is left exactly as it was
    ///
    /// Bytes past the old length are unspecified, as with C `realloc`.
    pub fn reallocate(&mut self, block: &mut HostBlock, new_size: usize) -> BridgeResult<()> {
        let old_size = block.len();
        match self.heap.reallocate(std::mem::take(block), new_size) {
            Ok(resized) => {
                *block = resized;
                log::trace!("reallocate({old_size} -> {new_size} bytes)");
                Ok(())
            }
            Err(original) => {
                *block = original;
                Err(BridgeError::AllocationFailure { requested: new_size })
            }
        }
    }

    /// realloc for growth paths that need the new tail zeroed
    pub fn reallocate_zeroed(&mut self, block: &mut HostBlock, new_size: usize) -> BridgeResult<()> {
        let old_size = block.len();
        self.reallocate(block, new_size)?;
        if new_size > old_size && !self.heap.zero_fills() {
            block[old_size..].fill(0);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator")
            .field("zero_fills", &self.heap.zero_fills())
            .finish()
    }
}
