//! Bridge configuration
//!
//! Loaded from JSON; every field is optional.
//!
//! ```json
//! {
//!     "trap_policy": "raise",
//!     "verbose_traps": true,
//!     "max_call_depth": 500,
//!     "max_memory_pages": 16,
//!     "heap_limit": 1048576
//! }
//! ```

use crate::runtime::{BridgeError, BridgeResult, ManagedHeap, TrapPolicy};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_MAX_CALL_DEPTH: u32 = 500;

/// Upper bound on `max_call_depth`
///
/// Internal calls nest on the native stack, so the limit must trap well
/// before a 2 MiB thread stack runs out.
pub const MAX_CALL_DEPTH: u32 = 1000;

/// Byte budget the CLI gives the host heap when `heap_limit` is unset
pub const DEFAULT_HEAP_LIMIT: usize = 256 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// What the trap translator does after reporting a fault
    pub trap_policy: TrapPolicy,
    /// Include the module's own message in trap diagnostics
    pub verbose_traps: bool,
    /// Nesting limit for calls inside the module
    pub max_call_depth: u32,
    /// Cap on the module's declared maximum memory, in pages
    pub max_memory_pages: Option<u32>,
    /// Byte budget for the default host heap
    pub heap_limit: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            trap_policy: TrapPolicy::Raise,
            verbose_traps: true,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_memory_pages: None,
            heap_limit: None,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(text: &str) -> BridgeResult<Self> {
        let config: BridgeConfig = serde_json::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// The default host heap, bounded by `heap_limit` when set
    pub fn managed_heap(&self) -> ManagedHeap {
        match self.heap_limit {
            Some(limit) => ManagedHeap::new().with_limit(limit),
            None => ManagedHeap::new(),
        }
    }

    /// The host heap for standalone runs: `heap_limit`, or
    /// [`DEFAULT_HEAP_LIMIT`] when unset
    pub fn bounded_heap(&self) -> ManagedHeap {
        ManagedHeap::new().with_limit(self.heap_limit.unwrap_or(DEFAULT_HEAP_LIMIT))
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.max_call_depth == 0 {
            return Err(BridgeError::Config("max_call_depth must be at least 1".to_string()));
        }
        if self.max_call_depth > MAX_CALL_DEPTH {
            return Err(BridgeError::Config(format!(
                "max_call_depth {} exceeds {MAX_CALL_DEPTH}",
                self.max_call_depth
            )));
        }
        if self.max_memory_pages.is_some_and(|pages| pages > crate::runtime::memory::MAX_PAGES) {
            return Err(BridgeError::Config(format!(
                "max_memory_pages exceeds {} pages",
                crate::runtime::memory::MAX_PAGES
            )));
        }
        Ok(())
    }
}
