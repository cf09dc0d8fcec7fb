//! Execution context handed to translated routines
//!
//! Translated code never touches the instance directly. Every export and
//! hook receives a [`Context`], which gives it its linear memory and
//! globals, routes its import calls to the linked host functions, forwards
//! its libc-style allocation and byte primitives to the bridge, and counts
//! call depth so runaway recursion becomes a trap instead of a native stack
//! overflow.

use super::alloc::HostBlock;
use super::host::HostContext;
use super::imports::{Caller, HostFunction};
use super::memory::Memory;
use super::module::ImportDecl;
use super::trap::{Trap, TrapKind};
use super::{bytes, BridgeError, BridgeResult, Value};
use std::sync::Arc;

pub struct Context<'a> {
    memory: &'a mut Memory,
    host: &'a mut HostContext,
    globals: &'a mut [Value],
    import_decls: &'static [ImportDecl],
    imports: &'a [Arc<HostFunction>],
    depth: u32,
    max_depth: u32,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        memory: &'a mut Memory,
        host: &'a mut HostContext,
        globals: &'a mut [Value],
        import_decls: &'static [ImportDecl],
        imports: &'a [Arc<HostFunction>],
        max_depth: u32,
    ) -> Self {
        Context {
            memory,
            host,
            globals,
            import_decls,
            imports,
            depth: 0,
            max_depth,
        }
    }

    pub fn memory(&self) -> &Memory {
        &*self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut *self.memory
    }

    /// memory.grow: previous size in pages, or -1
    pub fn grow_memory(&mut self, delta_pages: u32) -> i32 {
        self.memory.grow(delta_pages, self.host.allocator_mut())
    }

    /// Call the import at `index` in declaration order
    pub fn call_import(&mut self, index: usize, args: &[Value]) -> BridgeResult<Option<Value>> {
        let (Some(decl), Some(func)) = (self.import_decls.get(index), self.imports.get(index)) else {
            return Err(Trap::new(TrapKind::Unreachable)
                .with_message(format!("call to undeclared import #{index}"))
                .into());
        };
        if !func.ty.accepts(args) {
            return Err(Trap::new(TrapKind::Unreachable)
                .with_message(format!("{}.{} called with mismatched arguments", decl.module, decl.name))
                .into());
        }

        log::trace!("import {}.{}({args:?})", decl.module, decl.name);
        let mut caller = Caller {
            memory: &mut *self.memory,
            host: &mut *self.host,
        };
        func.call(&mut caller, args)
    }

    /// Enter a nested module function
    ///
    /// Every internal call goes through here so recursion deeper than the
    /// configured limit traps with `CallStackExhausted`.
    pub fn call<R>(&mut self, f: impl FnOnce(&mut Self) -> BridgeResult<R>) -> BridgeResult<R> {
        if self.depth >= self.max_depth {
            return Err(Trap::new(TrapKind::CallStackExhausted).into());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn global(&self, index: usize) -> BridgeResult<Value> {
        self.globals.get(index).copied().ok_or_else(|| undeclared_global(index))
    }

    /// global.set: the stored type never changes
    pub fn set_global(&mut self, index: usize, value: Value) -> BridgeResult<()> {
        let slot = self.globals.get_mut(index).ok_or_else(|| undeclared_global(index))?;
        if slot.typ() != value.typ() {
            return Err(Trap::new(TrapKind::Unreachable)
                .with_message(format!("global {index} is {}, not {}", slot.typ(), value.typ()))
                .into());
        }
        *slot = value;
        Ok(())
    }

    /// calloc through the host heap
    pub fn alloc_zeroed(&mut self, count: usize, size: usize) -> BridgeResult<HostBlock> {
        self.host.allocator_mut().alloc_zeroed(count, size)
    }

    /// free
    pub fn release(&mut self, block: Option<HostBlock>) {
        self.host.allocator_mut().release(block);
    }

    /// realloc
    pub fn reallocate(&mut self, block: &mut HostBlock, new_size: usize) -> BridgeResult<()> {
        self.host.allocator_mut().reallocate(block, new_size)
    }

    pub fn memcpy(&mut self, dst: u32, src: u32, len: u32) -> BridgeResult<()> {
        bytes::copy(self.memory.data_mut(), dst, src, len)
    }

    pub fn memmove(&mut self, dst: u32, src: u32, len: u32) -> BridgeResult<()> {
        bytes::move_bytes(self.memory.data_mut(), dst, src, len)
    }

    pub fn memset(&mut self, dst: u32, value: u8, len: u32) -> BridgeResult<()> {
        bytes::fill(self.memory.data_mut(), dst, value, len)
    }

    pub fn memcmp(&self, lhs: u32, rhs: u32, len: u32) -> BridgeResult<i32> {
        bytes::compare(self.memory.data(), lhs, rhs, len)
    }

    pub fn strlen(&self, offset: u32) -> BridgeResult<u32> {
        bytes::length(self.memory.data(), offset)
    }

    pub fn strcmp(&self, lhs: u32, rhs: u32) -> BridgeResult<i32> {
        bytes::compare_str(self.memory.data(), lhs, rhs)
    }

    pub fn strncmp(&self, lhs: u32, rhs: u32, n: u32) -> BridgeResult<i32> {
        bytes::compare_str_bounded(self.memory.data(), lhs, rhs, n)
    }

    /// The fault raised by an `unreachable` instruction
    pub fn unreachable(&self) -> BridgeError {
        Trap::new(TrapKind::Unreachable).into()
    }

    /// The module's own runtime gave up
    pub fn abort(&self, message: impl Into<String>) -> BridgeError {
        Trap::abort(message).into()
    }
}

fn undeclared_global(index: usize) -> BridgeError {
    Trap::new(TrapKind::Unreachable)
        .with_message(format!("access to undeclared global {index}"))
        .into()
}
