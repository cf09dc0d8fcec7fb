//! The live module instance
//!
//! [`Instance::construct`] is the only way to obtain one, and it either
//! returns a fully initialised instance or nothing: imports are linked,
//! memory is allocated through the shim, data segments are applied, then
//! the initialize hook and the start hook run, in that order. Exports are
//! callable only through the returned value, so no export can run before
//! bring-up has finished.

use super::context::Context;
use super::exports::{marshal_args, marshal_result, HostValue};
use super::host::HostContext;
use super::imports::{HostFunction, ImportObject};
use super::memory::Memory;
use super::module::{ExportDecl, HookFn, ModuleDefinition};
use super::trap::{Trap, TrapKind, TrapTranslator};
use super::{BridgeError, BridgeResult, Value};
use crate::config::BridgeConfig;
use std::sync::Arc;

/// Reserved name of the linear memory view
pub const MEMORY_VIEW_NAME: &str = "_memory";

pub struct Instance {
    definition: &'static ModuleDefinition,
    memory: Memory,
    globals: Vec<Value>,
    imports: Vec<Arc<HostFunction>>,
    host: HostContext,
    translator: TrapTranslator,
    max_call_depth: u32,
    released: bool,
}

impl Instance {
    /// Link, allocate and initialise an instance of `definition`
    ///
    /// # Errors
    /// - `Link` if an import is missing or mistyped
    /// - `InvalidModule` or `AllocationFailure` if memory cannot be set up
    /// - any error raised by the initialize or start hook
    pub fn construct(
        definition: &'static ModuleDefinition,
        imports: &ImportObject,
        mut host: HostContext,
        config: &BridgeConfig,
    ) -> BridgeResult<Self> {
        config.validate()?;
        definition.validate()?;
        let imports = imports.resolve(definition.imports)?;

        let maximum = match (definition.memory.maximum, config.max_memory_pages) {
            (Some(declared), Some(cap)) => Some(declared.min(cap)),
            (declared, cap) => declared.or(cap),
        };
        let memory = Memory::new(definition.memory.initial, maximum, host.allocator_mut())?;

        let mut instance = Instance {
            definition,
            memory,
            globals: definition.globals.to_vec(),
            imports,
            host,
            translator: TrapTranslator::new(config.trap_policy, config.verbose_traps),
            max_call_depth: config.max_call_depth,
            released: false,
        };

        match instance.initialize() {
            Ok(()) => {
                log::info!(
                    "instantiated {} ({} pages, {} imports, {} exports)",
                    definition.name,
                    instance.memory.size(),
                    instance.imports.len(),
                    definition.exports.len()
                );
                Ok(instance)
            }
            Err(err) => {
                instance.release();
                Err(err)
            }
        }
    }

    fn initialize(&mut self) -> BridgeResult<()> {
        for segment in self.definition.data {
            self.memory.write_bytes(segment.offset, segment.bytes)?;
        }

        self.run_hook("_initialize", self.definition.initialize_hook())?;
        self.run_hook("_start", self.definition.start_hook())
    }

    fn run_hook(&mut self, name: &str, hook: HookFn) -> BridgeResult<()> {
        log::debug!("{}: running {name}", self.definition.name);
        let result = hook(&mut self.context());
        result.map_err(|err| self.translator.translate(name, err))
    }

    fn context(&mut self) -> Context<'_> {
        Context::new(
            &mut self.memory,
            &mut self.host,
            &mut self.globals,
            self.definition.imports,
            &self.imports,
            self.max_call_depth,
        )
    }

    /// Call an export with host values
    ///
    /// Arguments are validated before the module is entered. Any error raised
    /// while module code runs poisons the instance; every later call fails
    /// with the same `Poisoned` error.
    pub fn invoke(&mut self, name: &str, args: &[HostValue]) -> BridgeResult<HostValue> {
        self.translator.check()?;
        let export = self.lookup(name)?;
        let values = marshal_args(export, args)?;
        self.enter(export, &values).map(marshal_result)
    }

    /// Call an export with values already in the module's native form
    pub fn invoke_values(&mut self, name: &str, args: &[Value]) -> BridgeResult<Option<Value>> {
        self.translator.check()?;
        let export = self.lookup(name)?;
        if !export.ty.accepts(args) {
            let given: Vec<String> = args.iter().map(|a| a.typ().to_string()).collect();
            return Err(BridgeError::ArgumentMismatch {
                export: name.to_string(),
                reason: format!("expected {}, got ({})", export.ty, given.join(", ")),
            });
        }
        self.enter(export, args)
    }

    fn lookup(&self, name: &str) -> BridgeResult<&'static ExportDecl> {
        let definition: &'static ModuleDefinition = self.definition;
        definition
            .export(name)
            .ok_or_else(|| BridgeError::UnknownSymbol(name.to_string()))
    }

    fn enter(&mut self, export: &ExportDecl, args: &[Value]) -> BridgeResult<Option<Value>> {
        let result = (export.func)(&mut self.context(), args).and_then(|result| {
            if result.map(|v| v.typ()) != export.ty.result {
                return Err(Trap::new(TrapKind::Unreachable)
                    .with_message(format!("{} returned a value that does not match {}", export.name, export.ty))
                    .into());
            }
            Ok(result)
        });
        result.map_err(|err| self.translator.translate(export.name, err))
    }

    /// The aliased view of a named module buffer
    ///
    /// Only [`MEMORY_VIEW_NAME`] is recognised. The view borrows the instance,
    /// so it cannot outlive a call that might grow and relocate memory.
    pub fn named_view(&mut self, name: &str) -> BridgeResult<&mut [u8]> {
        if name != MEMORY_VIEW_NAME {
            return Err(BridgeError::UnknownSymbol(name.to_string()));
        }
        Ok(self.memory.data_mut())
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    /// The export binding, for registering into a host namespace
    pub fn exports(&self) -> &'static [ExportDecl] {
        self.definition.exports
    }

    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    pub fn is_poisoned(&self) -> bool {
        self.translator.is_poisoned()
    }

    pub fn poison_cause(&self) -> Option<&str> {
        self.translator.poison_cause()
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut HostContext {
        &mut self.host
    }

    /// Release linear memory back to the host heap
    pub fn teardown(mut self) {
        self.release();
        log::info!("tore down {}", self.definition.name);
    }

    fn release(&mut self) {
        if !self.released {
            self.memory.release(self.host.allocator_mut());
            self.released = true;
        }
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("module", &self.definition.name)
            .field("pages", &self.memory.size())
            .field("poisoned", &self.translator.poison_cause())
            .finish()
    }
}
