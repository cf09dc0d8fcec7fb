//! Host-side runtime for an embedded, ahead-of-time translated module
//!
//! This module provides everything that sits between the translated module
//! and the host: the allocation shim, linear memory, the import and export
//! bridges, and the trap translator.

pub mod alloc;
pub mod bytes;
pub mod context;
pub mod exports;
pub mod global;
pub mod host;
pub mod imports;
pub mod instance;
pub mod memory;
pub mod module;
pub mod ops;
pub mod trap;
pub mod value;

pub use alloc::{Allocator, HostBlock, HostHeap, ManagedHeap};
pub use context::Context;
pub use exports::HostValue;
pub use host::{Clock, HostContext, ManualClock, NoopPeripherals, Peripherals, SystemClock};
pub use imports::{Caller, HostFunction, ImportObject};
pub use instance::{Instance, MEMORY_VIEW_NAME};
pub use memory::Memory;
pub use module::{DataSegment, ExportDecl, ImportDecl, MemoryLimits, ModuleDefinition};
pub use trap::{Trap, TrapKind, TrapPolicy, TrapTranslator};
pub use value::{FunctionType, Value, ValueType};

/// Result alias used throughout the bridge
pub type BridgeResult<T> = Result<T, BridgeError>;

/// The single error type surfaced to the host
///
/// `AllocationFailure`, `BoundsViolation`, `Trap` and `Output` can only be
/// raised while module code runs and poison the instance. `UnknownSymbol`
/// and `ArgumentMismatch` are raised before the module is entered and are
/// local to the offending call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("Allocation failure: host heap could not provide {requested} bytes")]
    AllocationFailure { requested: usize },
    #[error("Out of bounds: offset {offset} + length {length} exceeds memory size {size}")]
    BoundsViolation { offset: u64, length: u64, size: u64 },
    #[error("{0}")]
    Trap(Trap),
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
    #[error("Argument mismatch calling {export}: {reason}")]
    ArgumentMismatch { export: String, reason: String },
    #[error("Unresolved import {module}.{name}: {reason}")]
    Link {
        module: String,
        name: String,
        reason: String,
    },
    #[error("Invalid module: {0}")]
    InvalidModule(String),
    #[error("Instance poisoned by an earlier fault: {0}")]
    Poisoned(String),
    #[error("A module instance has already been constructed in this process")]
    AlreadyConstructed,
    #[error("No module instance has been constructed")]
    NotConstructed,
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Output sink failed: {0}")]
    Output(String),
}

impl BridgeError {
    /// Whether this error may only be raised before module code is entered
    pub fn is_request_scoped(&self) -> bool {
        matches!(self, BridgeError::UnknownSymbol(_) | BridgeError::ArgumentMismatch { .. })
    }

    pub(crate) fn bounds(offset: u64, length: u64, size: u64) -> Self {
        BridgeError::BoundsViolation { offset, length, size }
    }
}

impl From<Trap> for BridgeError {
    fn from(trap: Trap) -> Self {
        BridgeError::Trap(trap)
    }
}
