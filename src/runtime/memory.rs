//! Linear memory of the embedded module
//!
//! The backing storage is a [`HostBlock`] obtained from the allocation shim,
//! so the host heap owns every byte and growth is a real reallocation that
//! may move the buffer.
//!
//! Memory layout:
//! - Page size: 64KiB (65,536 bytes)
//! - Address space: 32-bit
//! - Every access is bounds checked; an access outside `[0, size)` is a
//!   `BoundsViolation` and touches nothing

use super::alloc::{Allocator, HostBlock};
use super::{BridgeError, BridgeResult};
use byteorder::{ByteOrder, LittleEndian};

/// Page size in bytes (64KiB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages (4GiB total)
pub const MAX_PAGES: u32 = 65536;

#[derive(Debug)]
pub struct Memory {
    data: HostBlock,
    current_pages: u32,
    max_pages: Option<u32>,
}

impl Memory {
    /// Allocate zeroed memory of `initial_pages` through the shim
    ///
    /// # Errors
    /// - `InvalidModule` if the limits are inconsistent or exceed [`MAX_PAGES`]
    /// - `AllocationFailure` if the host heap cannot provide the pages
    pub fn new(initial_pages: u32, max_pages: Option<u32>, alloc: &mut Allocator) -> BridgeResult<Self> {
        if initial_pages > MAX_PAGES {
            return Err(BridgeError::InvalidModule(format!(
                "Initial memory size {initial_pages} pages exceeds maximum {MAX_PAGES} pages"
            )));
        }

        if let Some(max) = max_pages {
            if initial_pages > max {
                return Err(BridgeError::InvalidModule(format!(
                    "Initial size {initial_pages} pages exceeds specified maximum {max} pages"
                )));
            }
            if max > MAX_PAGES {
                return Err(BridgeError::InvalidModule(format!(
                    "Maximum size {max} pages exceeds system maximum {MAX_PAGES} pages"
                )));
            }
        }

        let data = alloc.alloc_zeroed(initial_pages as usize, PAGE_SIZE)?;

        Ok(Memory {
            data,
            current_pages: initial_pages,
            max_pages,
        })
    }

    /// Current size in pages
    pub fn size(&self) -> u32 {
        self.current_pages
    }

    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Current size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grow by `delta_pages`, returning the previous size in pages or -1
    ///
    /// A failed growth leaves memory untouched and is not a fault. A
    /// successful one may relocate the backing buffer.
    pub fn grow(&mut self, delta_pages: u32, alloc: &mut Allocator) -> i32 {
        let current = self.current_pages;

        let Some(new_pages) = current.checked_add(delta_pages) else {
            return -1;
        };
        if new_pages > self.max_pages.unwrap_or(MAX_PAGES) {
            return -1;
        }
        if delta_pages == 0 {
            return current as i32;
        }

        match alloc.reallocate_zeroed(&mut self.data, new_pages as usize * PAGE_SIZE) {
            Ok(()) => {
                log::debug!("memory grew from {current} to {new_pages} pages");
                self.current_pages = new_pages;
                current as i32
            }
            Err(err) => {
                log::warn!("memory growth by {delta_pages} pages refused: {err}");
                -1
            }
        }
    }

    /// Hand the backing storage back to the host heap
    pub fn release(&mut self, alloc: &mut Allocator) {
        alloc.release(Some(std::mem::take(&mut self.data)));
        self.current_pages = 0;
    }

    #[inline]
    fn check_bounds(&self, addr: u32, size: usize) -> BridgeResult<usize> {
        let start = addr as usize;
        match start.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(start),
            _ => Err(BridgeError::bounds(u64::from(addr), size as u64, self.data.len() as u64)),
        }
    }

    /// The whole of linear memory
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Borrow `[addr, addr + len)` without copying
    pub fn bytes(&self, addr: u32, len: usize) -> BridgeResult<&[u8]> {
        let start = self.check_bounds(addr, len)?;
        Ok(&self.data[start..start + len])
    }

    pub fn read_u8(&self, addr: u32) -> BridgeResult<u8> {
        let addr = self.check_bounds(addr, 1)?;
        Ok(self.data[addr])
    }

    pub fn read_u16(&self, addr: u32) -> BridgeResult<u16> {
        let addr = self.check_bounds(addr, 2)?;
        Ok(LittleEndian::read_u16(&self.data[addr..]))
    }

    pub fn read_u32(&self, addr: u32) -> BridgeResult<u32> {
        let addr = self.check_bounds(addr, 4)?;
        Ok(LittleEndian::read_u32(&self.data[addr..]))
    }

    pub fn read_u64(&self, addr: u32) -> BridgeResult<u64> {
        let addr = self.check_bounds(addr, 8)?;
        Ok(LittleEndian::read_u64(&self.data[addr..]))
    }

    pub fn read_i32(&self, addr: u32) -> BridgeResult<i32> {
        let addr = self.check_bounds(addr, 4)?;
        Ok(LittleEndian::read_i32(&self.data[addr..]))
    }

    pub fn read_i64(&self, addr: u32) -> BridgeResult<i64> {
        let addr = self.check_bounds(addr, 8)?;
        Ok(LittleEndian::read_i64(&self.data[addr..]))
    }

    pub fn read_f32(&self, addr: u32) -> BridgeResult<f32> {
        let addr = self.check_bounds(addr, 4)?;
        Ok(LittleEndian::read_f32(&self.data[addr..]))
    }

    pub fn read_f64(&self, addr: u32) -> BridgeResult<f64> {
        let addr = self.check_bounds(addr, 8)?;
        Ok(LittleEndian::read_f64(&self.data[addr..]))
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> BridgeResult<()> {
        let addr = self.check_bounds(addr, 1)?;
        self.data[addr] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) -> BridgeResult<()> {
        let addr = self.check_bounds(addr, 2)?;
        LittleEndian::write_u16(&mut self.data[addr..], value);
        Ok(())
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> BridgeResult<()> {
        let addr = self.check_bounds(addr, 4)?;
        LittleEndian::write_u32(&mut self.data[addr..], value);
        Ok(())
    }

    pub fn write_u64(&mut self, addr: u32, value: u64) -> BridgeResult<()> {
        let addr = self.check_bounds(addr, 8)?;
        LittleEndian::write_u64(&mut self.data[addr..], value);
        Ok(())
    }

    pub fn write_i32(&mut self, addr: u32, value: i32) -> BridgeResult<()> {
        self.write_u32(addr, value as u32)
    }

    pub fn write_i64(&mut self, addr: u32, value: i64) -> BridgeResult<()> {
        self.write_u64(addr, value as u64)
    }

    pub fn write_f32(&mut self, addr: u32, value: f32) -> BridgeResult<()> {
        let addr = self.check_bounds(addr, 4)?;
        LittleEndian::write_f32(&mut self.data[addr..], value);
        Ok(())
    }

    pub fn write_f64(&mut self, addr: u32, value: f64) -> BridgeResult<()> {
        let addr = self.check_bounds(addr, 8)?;
        LittleEndian::write_f64(&mut self.data[addr..], value);
        Ok(())
    }

    /// Copy `len` bytes out of memory
    pub fn read_bytes(&self, addr: u32, len: usize) -> BridgeResult<Vec<u8>> {
        Ok(self.bytes(addr, len)?.to_vec())
    }

    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> BridgeResult<()> {
        let addr = self.check_bounds(addr, bytes.len())?;
        self.data[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::alloc::ManagedHeap;

    fn allocator() -> Allocator {
        Allocator::new(Box::new(ManagedHeap::new()))
    }

    #[test]
    fn test_memory_creation() {
        let mut alloc = allocator();
        let mem = Memory::new(1, None, &mut alloc).unwrap();
        assert_eq!(mem.size(), 1);
        assert_eq!(mem.len(), PAGE_SIZE);

        let mem = Memory::new(1, Some(10), &mut alloc).unwrap();
        assert_eq!(mem.max_pages(), Some(10));

        let mem = Memory::new(0, Some(0), &mut alloc).unwrap();
        assert!(mem.is_empty());
    }

    #[test]
    fn test_memory_creation_errors() {
        let mut alloc = allocator();
        assert!(matches!(
            Memory::new(10, Some(5), &mut alloc),
            Err(BridgeError::InvalidModule(_))
        ));
        assert!(Memory::new(MAX_PAGES + 1, None, &mut alloc).is_err());
        assert!(Memory::new(1, Some(MAX_PAGES + 1), &mut alloc).is_err());
    }

    #[test]
    fn test_memory_creation_heap_exhausted() {
        let mut alloc = Allocator::new(Box::new(ManagedHeap::new().with_limit(PAGE_SIZE)));
        assert!(matches!(
            Memory::new(2, None, &mut alloc),
            Err(BridgeError::AllocationFailure { .. })
        ));
    }

    #[test]
    fn test_memory_grow() {
        let mut alloc = allocator();
        let mut mem = Memory::new(1, Some(10), &mut alloc).unwrap();

        assert_eq!(mem.grow(2, &mut alloc), 1);
        assert_eq!(mem.size(), 3);
        assert_eq!(mem.len(), 3 * PAGE_SIZE);

        assert_eq!(mem.grow(7, &mut alloc), 3);
        assert_eq!(mem.grow(1, &mut alloc), -1);
        assert_eq!(mem.size(), 10);

        assert_eq!(mem.grow(0, &mut alloc), 10);
    }

    #[test]
    fn test_memory_grow_overflow() {
        let mut alloc = allocator();
        let mut mem = Memory::new(1, None, &mut alloc).unwrap();
        assert_eq!(mem.grow(u32::MAX, &mut alloc), -1);
        assert_eq!(mem.size(), 1);
    }

    #[test]
    fn test_memory_grow_heap_refuses() {
        let mut alloc = Allocator::new(Box::new(ManagedHeap::new().with_limit(2 * PAGE_SIZE)));
        let mut mem = Memory::new(1, None, &mut alloc).unwrap();
        mem.write_u32(0, 0xDEADBEEF).unwrap();

        assert_eq!(mem.grow(2, &mut alloc), -1);
        assert_eq!(mem.size(), 1);
        assert_eq!(mem.len(), PAGE_SIZE);
        assert_eq!(mem.read_u32(0).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_bounds_checking() {
        let mut alloc = allocator();
        let mem = Memory::new(1, None, &mut alloc).unwrap();

        assert!(mem.check_bounds(0, 1).is_ok());
        assert!(mem.check_bounds(PAGE_SIZE as u32 - 1, 1).is_ok());
        assert!(mem.check_bounds(0, PAGE_SIZE).is_ok());

        assert!(mem.check_bounds(PAGE_SIZE as u32, 1).is_err());
        assert!(mem.check_bounds(PAGE_SIZE as u32 - 1, 2).is_err());
        assert!(mem.check_bounds(u32::MAX, 1).is_err());
        assert!(mem.check_bounds(u32::MAX, usize::MAX).is_err());

        assert_eq!(
            mem.check_bounds(65530, 10),
            Err(BridgeError::BoundsViolation {
                offset: 65530,
                length: 10,
                size: 65536
            })
        );
    }

    #[test]
    fn test_read_write_u32() {
        let mut alloc = allocator();
        let mut mem = Memory::new(1, None, &mut alloc).unwrap();

        mem.write_u32(100, 0x12345678).unwrap();
        assert_eq!(mem.read_u32(100).unwrap(), 0x12345678);

        // Little-endian storage
        assert_eq!(mem.bytes(100, 4).unwrap(), &[0x78, 0x56, 0x34, 0x12]);

        mem.write_u32(PAGE_SIZE as u32 - 4, 0xDEADBEEF).unwrap();
        assert_eq!(mem.read_u32(PAGE_SIZE as u32 - 4).unwrap(), 0xDEADBEEF);

        assert!(mem.write_u32(PAGE_SIZE as u32 - 3, 1).is_err());
        assert!(mem.read_u32(PAGE_SIZE as u32 - 3).is_err());
    }

    #[test]
    fn test_read_write_mixed_widths() {
        let mut alloc = allocator();
        let mut mem = Memory::new(1, None, &mut alloc).unwrap();

        mem.write_u8(0, 0xFF).unwrap();
        assert_eq!(mem.read_u8(0).unwrap(), 0xFF);
        mem.write_u16(2, 0xBEEF).unwrap();
        assert_eq!(mem.read_u16(2).unwrap(), 0xBEEF);
        mem.write_u64(3, 0x123456789ABCDEF0).unwrap();
        assert_eq!(mem.read_u64(3).unwrap(), 0x123456789ABCDEF0);

        mem.write_i32(20, i32::MIN).unwrap();
        assert_eq!(mem.read_i32(20).unwrap(), i32::MIN);
        mem.write_i64(30, -2).unwrap();
        assert_eq!(mem.read_i64(30).unwrap(), -2);
    }

    #[test]
    fn test_floating_point() {
        let mut alloc = allocator();
        let mut mem = Memory::new(1, None, &mut alloc).unwrap();

        mem.write_f32(0, std::f32::consts::PI).unwrap();
        assert_eq!(mem.read_f32(0).unwrap(), std::f32::consts::PI);
        mem.write_f64(10, std::f64::consts::E).unwrap();
        assert_eq!(mem.read_f64(10).unwrap(), std::f64::consts::E);
        mem.write_f32(24, f32::NAN).unwrap();
        assert!(mem.read_f32(24).unwrap().is_nan());
    }

    #[test]
    fn test_bytes_operations() {
        let mut alloc = allocator();
        let mut mem = Memory::new(1, None, &mut alloc).unwrap();

        mem.write_bytes(100, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(mem.read_bytes(100, 5).unwrap(), vec![1, 2, 3, 4, 5]);
        assert!(mem.read_bytes(200, 0).unwrap().is_empty());

        let tail = vec![0xFF; 10];
        mem.write_bytes(PAGE_SIZE as u32 - 10, &tail).unwrap();
        assert_eq!(mem.bytes(PAGE_SIZE as u32 - 10, 10).unwrap(), &tail[..]);

        assert!(mem.write_bytes(PAGE_SIZE as u32 - 5, &[0; 10]).is_err());
        assert!(mem.bytes(PAGE_SIZE as u32 - 5, 10).is_err());
    }

    #[test]
    fn test_zero_initialisation_on_dirty_heap() {
        let mut alloc = Allocator::new(Box::new(ManagedHeap::new().with_zero_fill(false)));
        let mut mem = Memory::new(1, None, &mut alloc).unwrap();
        assert!(mem.data().iter().all(|&b| b == 0));

        mem.write_u32(0, 0xDEADBEEF).unwrap();
        assert_eq!(mem.grow(1, &mut alloc), 1);

        assert_eq!(mem.read_u32(0).unwrap(), 0xDEADBEEF);
        assert!(mem.data()[PAGE_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_release() {
        let mut alloc = allocator();
        let mut mem = Memory::new(2, None, &mut alloc).unwrap();
        mem.release(&mut alloc);
        assert_eq!(mem.size(), 0);
        assert!(mem.is_empty());
    }
}
