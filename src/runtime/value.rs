//! Module-side value representation and function signatures

use fhex::ToHex;
use std::fmt;

/// Numeric types a translated module passes across its boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Runtime representation of a module value in its native numeric form
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// Get the type of this value
    pub fn typ(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
        }
    }

    /// Convert to i32, returning None if wrong type
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to u32 (reinterpreting an i32), returning None if wrong type
    pub fn as_u32(&self) -> Option<u32> {
        self.as_i32().map(|v| v as u32)
    }

    /// Convert to i64, returning None if wrong type
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to f32, returning None if wrong type
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to f64, returning None if wrong type
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{}", v.to_hex()),
            Value::F64(v) => write!(f, "f64:{}", v.to_hex()),
        }
    }
}

/// Signature of an import or export
///
/// Signatures are fixed when the module is translated, so the parameter list
/// is a static slice and can live in a `static` binding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionType {
    pub params: &'static [ValueType],
    pub result: Option<ValueType>,
}

impl FunctionType {
    pub const fn new(params: &'static [ValueType], result: Option<ValueType>) -> Self {
        FunctionType { params, result }
    }

    /// Check a list of values against the parameter types
    pub fn accepts(&self, args: &[Value]) -> bool {
        args.len() == self.params.len() && args.iter().zip(self.params).all(|(arg, typ)| arg.typ() == *typ)
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")?;
        if let Some(result) = self.result {
            write!(f, " -> {result}")?;
        }
        Ok(())
    }
}
