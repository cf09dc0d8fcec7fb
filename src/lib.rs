//! A bridge that embeds one ahead-of-time translated WebAssembly module in a
//! host runtime.
//!
//! The module arrives as a static binding table produced by a translator
//! (see [`runtime::ModuleDefinition`]). The bridge satisfies its imports from
//! host services, redirects its allocations into the host heap, exposes its
//! exports with argument validation, and turns every fault it raises into a
//! single host-visible error that poisons the instance.
//!
//! # Modules
//!
//! - [`runtime`] -- Allocation shim, linear memory, import/export bridges, trap translator.
//! - [`config`] -- JSON bridge configuration.
//! - [`apps`] -- Translated modules bundled with the bridge.
//!
//! # Example
//!
//! Bring up the bundled arithmetic module and call an export:
//!
//! ```
//! use wasmbed::apps::arith;
//! use wasmbed::config::BridgeConfig;
//! use wasmbed::runtime::{HostContext, HostValue, ImportObject, Instance};
//!
//! let host = HostContext::builder().stdout(Box::new(std::io::sink())).build();
//! let mut instance =
//!     Instance::construct(&arith::MODULE, &ImportObject::new(), host, &BridgeConfig::default()).unwrap();
//!
//! let sum = instance.invoke("add", &[HostValue::Int(2), HostValue::Int(3)]).unwrap();
//! assert_eq!(sum, HostValue::Int(5));
//! ```

pub mod apps;
pub mod config;
pub mod runtime;
