//! Static binding table of a translated module
//!
//! The translator emits one [`ModuleDefinition`] per module as a `static`:
//! memory limits, data segments, globals, the import and export bindings,
//! and the optional lifecycle hooks. Nothing in it changes at runtime.

use super::context::Context;
use super::memory::{MAX_PAGES, PAGE_SIZE};
use super::{BridgeError, BridgeResult, FunctionType, Value};
use std::collections::HashSet;

/// A translated export
pub type ExportFn = fn(&mut Context<'_>, &[Value]) -> BridgeResult<Option<Value>>;

/// A translated lifecycle hook (`_initialize` or `_start`)
pub type HookFn = fn(&mut Context<'_>) -> BridgeResult<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    pub initial: u32,
    pub maximum: Option<u32>,
}

/// Bytes copied into linear memory at instantiation
#[derive(Debug, Clone, Copy)]
pub struct DataSegment {
    pub offset: u32,
    pub bytes: &'static [u8],
}

#[derive(Debug, Clone, Copy)]
pub struct ImportDecl {
    pub module: &'static str,
    pub name: &'static str,
    pub ty: FunctionType,
}

impl ImportDecl {
    pub const fn new(module: &'static str, name: &'static str, ty: FunctionType) -> Self {
        ImportDecl { module, name, ty }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExportDecl {
    pub name: &'static str,
    pub ty: FunctionType,
    pub func: ExportFn,
}

#[derive(Debug)]
pub struct ModuleDefinition {
    pub name: &'static str,
    pub memory: MemoryLimits,
    pub data: &'static [DataSegment],
    pub globals: &'static [Value],
    pub imports: &'static [ImportDecl],
    pub exports: &'static [ExportDecl],
    pub initialize: Option<HookFn>,
    pub start: Option<HookFn>,
}

/// Stands in for a hook the module does not define
pub fn noop_hook(_ctx: &mut Context<'_>) -> BridgeResult<()> {
    Ok(())
}

impl ModuleDefinition {
    pub fn export(&self, name: &str) -> Option<&ExportDecl> {
        self.exports.iter().find(|e| e.name == name)
    }

    pub fn initialize_hook(&self) -> HookFn {
        self.initialize.unwrap_or(noop_hook)
    }

    pub fn start_hook(&self) -> HookFn {
        self.start.unwrap_or(noop_hook)
    }

    /// Reject tables a correct translator would never emit
    pub fn validate(&self) -> BridgeResult<()> {
        let mut seen = HashSet::new();
        for export in self.exports {
            if !seen.insert(export.name) {
                return Err(BridgeError::InvalidModule(format!(
                    "{}: export {} declared twice",
                    self.name, export.name
                )));
            }
        }

        let initial_bytes = u64::from(self.memory.initial.min(MAX_PAGES)) * PAGE_SIZE as u64;
        for segment in self.data {
            let end = u64::from(segment.offset) + segment.bytes.len() as u64;
            if end > initial_bytes {
                return Err(BridgeError::InvalidModule(format!(
                    "{}: data segment at {} ({} bytes) does not fit in initial memory of {} bytes",
                    self.name,
                    segment.offset,
                    segment.bytes.len(),
                    initial_bytes
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ValueType;

    fn answer(_ctx: &mut Context<'_>, _args: &[Value]) -> BridgeResult<Option<Value>> {
        Ok(Some(Value::I32(42)))
    }

    const ANSWER: ExportDecl = ExportDecl {
        name: "answer",
        ty: FunctionType::new(&[], Some(ValueType::I32)),
        func: answer,
    };

    fn definition(exports: &'static [ExportDecl], data: &'static [DataSegment]) -> ModuleDefinition {
        ModuleDefinition {
            name: "test",
            memory: MemoryLimits {
                initial: 1,
                maximum: None,
            },
            data,
            globals: &[],
            imports: &[],
            exports,
            initialize: None,
            start: None,
        }
    }

    static ONE: [ExportDecl; 1] = [ANSWER];
    static TWICE: [ExportDecl; 2] = [ANSWER, ANSWER];

    #[test]
    fn test_export_lookup() {
        let def = definition(&ONE, &[]);
        assert!(def.validate().is_ok());
        assert_eq!(def.export("answer").map(|e| e.ty.params.len()), Some(0));
        assert!(def.export("question").is_none());
    }

    #[test]
    fn test_duplicate_export() {
        let def = definition(&TWICE, &[]);
        assert!(matches!(def.validate(), Err(BridgeError::InvalidModule(_))));
    }

    #[test]
    fn test_data_segment_must_fit() {
        static FITS: [DataSegment; 1] = [DataSegment {
            offset: 65532,
            bytes: b"abcd",
        }];
        static OVERHANGS: [DataSegment; 1] = [DataSegment {
            offset: 65533,
            bytes: b"abcd",
        }];
        assert!(definition(&[], &FITS).validate().is_ok());
        assert!(definition(&[], &OVERHANGS).validate().is_err());
    }
}
