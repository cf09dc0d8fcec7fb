//! Import resolution for the embedded module
//!
//! Host functions are registered under `(module, name)` and linked against
//! the module's import declarations before instantiation. A missing import
//! or a signature mismatch fails the link; nothing is resolved lazily.

use super::host::HostContext;
use super::memory::Memory;
use super::module::ImportDecl;
use super::{BridgeError, BridgeResult, FunctionType, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// What a host function sees of the running instance
pub struct Caller<'a> {
    pub memory: &'a mut Memory,
    pub host: &'a mut HostContext,
}

type HostFn = dyn Fn(&mut Caller<'_>, &[Value]) -> BridgeResult<Option<Value>> + Send + Sync;

/// A host-side implementation of one import
pub struct HostFunction {
    pub ty: FunctionType,
    func: Box<HostFn>,
}

impl HostFunction {
    pub fn new<F>(ty: FunctionType, func: F) -> Self
    where
        F: Fn(&mut Caller<'_>, &[Value]) -> BridgeResult<Option<Value>> + Send + Sync + 'static,
    {
        HostFunction {
            ty,
            func: Box::new(func),
        }
    }

    pub fn call(&self, caller: &mut Caller<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
        (self.func)(caller, args)
    }
}

impl std::fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunction").field("ty", &self.ty).finish()
    }
}

/// Host functions a module can import, mapped by (module_name, field_name)
#[derive(Debug, Default)]
pub struct ImportObject {
    functions: HashMap<(String, String), Arc<HostFunction>>,
}

impl ImportObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function import, replacing any earlier one with the same name
    pub fn add_function(&mut self, module: impl Into<String>, name: impl Into<String>, func: HostFunction) {
        self.functions.insert((module.into(), name.into()), Arc::new(func));
    }

    /// Get a function import
    ///
    /// # Errors
    /// Returns `UnknownSymbol` if the import doesn't exist
    pub fn get_function(&self, module: &str, name: &str) -> BridgeResult<&HostFunction> {
        self.functions
            .get(&(module.to_string(), name.to_string()))
            .map(|f| f.as_ref())
            .ok_or_else(|| BridgeError::UnknownSymbol(format!("{module}.{name}")))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Link a module's import declarations, in declaration order
    ///
    /// # Errors
    /// Returns `Link` for the first import that is missing or whose
    /// signature differs from the declared one
    pub fn resolve(&self, decls: &[ImportDecl]) -> BridgeResult<Vec<Arc<HostFunction>>> {
        decls
            .iter()
            .map(|decl| {
                let link_error = |reason: String| BridgeError::Link {
                    module: decl.module.to_string(),
                    name: decl.name.to_string(),
                    reason,
                };

                let func = self
                    .functions
                    .get(&(decl.module.to_string(), decl.name.to_string()))
                    .ok_or_else(|| link_error("not provided by the host".to_string()))?;
                if func.ty != decl.ty {
                    return Err(link_error(format!(
                        "module expects {}, host provides {}",
                        decl.ty, func.ty
                    )));
                }

                log::debug!("resolved import {}.{} {}", decl.module, decl.name, decl.ty);
                Ok(Arc::clone(func))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ValueType;

    const UNARY: FunctionType = FunctionType::new(&[ValueType::I32], None);
    const NULLARY: FunctionType = FunctionType::new(&[], Some(ValueType::I32));

    fn imports() -> ImportObject {
        let mut imports = ImportObject::new();
        imports.add_function("env", "tick", HostFunction::new(NULLARY, |_, _| Ok(Some(Value::I32(1)))));
        imports.add_function("env", "sink", HostFunction::new(UNARY, |_, _| Ok(None)));
        imports
    }

    #[test]
    fn test_get_function() {
        let imports = imports();
        assert_eq!(imports.len(), 2);
        assert_eq!(imports.get_function("env", "tick").unwrap().ty, NULLARY);
        assert_eq!(
            imports.get_function("env", "missing").unwrap_err(),
            BridgeError::UnknownSymbol("env.missing".to_string())
        );
    }

    #[test]
    fn test_resolve_in_declaration_order() {
        let decls = [
            ImportDecl::new("env", "sink", UNARY),
            ImportDecl::new("env", "tick", NULLARY),
        ];
        let resolved = imports().resolve(&decls).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].ty, UNARY);
        assert_eq!(resolved[1].ty, NULLARY);
    }

    #[test]
    fn test_resolve_missing_import() {
        let decls = [ImportDecl::new("env", "absent", UNARY)];
        assert!(matches!(
            imports().resolve(&decls),
            Err(BridgeError::Link { ref name, .. }) if name == "absent"
        ));
    }

    #[test]
    fn test_resolve_signature_mismatch() {
        let decls = [ImportDecl::new("env", "tick", UNARY)];
        let err = imports().resolve(&decls).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unresolved import env.tick: module expects (i32), host provides () -> i32"
        );
    }
}
