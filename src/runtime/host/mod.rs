//! Host services available to the module's imports
//!
//! A [`HostContext`] bundles everything the import bridge forwards to: a
//! millisecond clock and sleep primitive, the text output sink, the
//! peripheral hooks, and the allocation shim over the host heap.
//!
//! # Usage
//!
//! ```ignore
//! use wasmbed::runtime::{HostContext, ManualClock};
//!
//! let clock = ManualClock::new();
//! let host = HostContext::builder()
//!     .clock(Box::new(clock.clone()))
//!     .stdout(Box::new(std::io::stdout()))
//!     .build();
//! ```

pub mod clock;
pub mod peripherals;
pub mod wiring;

pub use clock::{Clock, ManualClock, SystemClock};
pub use peripherals::{NoopPeripherals, Peripherals};
pub use wiring::{create_wiring_imports, WIRING_MODULE};

use super::alloc::{Allocator, HostHeap, ManagedHeap};
use super::{BridgeError, BridgeResult};
use std::io::Write;

pub struct HostContext {
    clock: Box<dyn Clock>,
    stdout: Box<dyn Write + Send>,
    peripherals: Box<dyn Peripherals>,
    allocator: Allocator,
}

impl HostContext {
    pub fn builder() -> HostContextBuilder {
        HostContextBuilder::new()
    }

    pub fn ticks_ms(&self) -> u32 {
        self.clock.ticks_ms()
    }

    pub fn sleep_ms(&mut self, ms: u32) {
        self.clock.sleep_ms(ms);
    }

    /// Write bytes to the output sink as-is
    pub fn print(&mut self, bytes: &[u8]) -> BridgeResult<()> {
        self.stdout
            .write_all(bytes)
            .and_then(|()| self.stdout.flush())
            .map_err(|e| BridgeError::Output(e.to_string()))
    }

    pub fn peripherals_mut(&mut self) -> &mut dyn Peripherals {
        self.peripherals.as_mut()
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut Allocator {
        &mut self.allocator
    }
}

impl Default for HostContext {
    fn default() -> Self {
        HostContextBuilder::new().build()
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("ticks_ms", &self.clock.ticks_ms())
            .field("allocator", &self.allocator)
            .finish()
    }
}

/// Builder for [`HostContext`]
///
/// Unset services default to the system clock, process stdout, no-op
/// peripherals and an unbounded zero-filling [`ManagedHeap`].
pub struct HostContextBuilder {
    clock: Option<Box<dyn Clock>>,
    stdout: Option<Box<dyn Write + Send>>,
    peripherals: Option<Box<dyn Peripherals>>,
    heap: Option<Box<dyn HostHeap>>,
}

impl HostContextBuilder {
    pub fn new() -> Self {
        Self {
            clock: None,
            stdout: None,
            peripherals: None,
            heap: None,
        }
    }

    pub fn clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn stdout(mut self, stdout: Box<dyn Write + Send>) -> Self {
        self.stdout = Some(stdout);
        self
    }

    pub fn peripherals(mut self, peripherals: Box<dyn Peripherals>) -> Self {
        self.peripherals = Some(peripherals);
        self
    }

    pub fn heap(mut self, heap: Box<dyn HostHeap>) -> Self {
        self.heap = Some(heap);
        self
    }

    pub fn build(self) -> HostContext {
        HostContext {
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock::new())),
            stdout: self.stdout.unwrap_or_else(|| Box::new(std::io::stdout())),
            peripherals: self.peripherals.unwrap_or_else(|| Box::new(NoopPeripherals)),
            allocator: Allocator::new(self.heap.unwrap_or_else(|| Box::new(ManagedHeap::new()))),
        }
    }
}

impl Default for HostContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
