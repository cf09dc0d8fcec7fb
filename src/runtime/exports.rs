//! Argument and result marshaling for export calls
//!
//! Host callers pass [`HostValue`]s. Before module code is entered every
//! argument is checked against the export's signature and converted to the
//! module's native numeric form; anything that does not convert is an
//! `ArgumentMismatch`. Only integer/real numeric conversions are performed.

use super::module::ExportDecl;
use super::{BridgeError, BridgeResult, Value, ValueType};
use std::fmt;

/// A value as the host runtime represents it
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    None,
    Int(i64),
    Float(f64),
    Str(String),
}

impl HostValue {
    fn kind(&self) -> &'static str {
        match self {
            HostValue::None => "none",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "str",
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::None => f.write_str("None"),
            HostValue::Int(v) => write!(f, "{v}"),
            HostValue::Float(v) => write!(f, "{v:?}"),
            HostValue::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Int(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Int(i64::from(v))
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::Str(v.to_string())
    }
}

/// Validate and convert a full argument list for `export`
pub fn marshal_args(export: &ExportDecl, args: &[HostValue]) -> BridgeResult<Vec<Value>> {
    let params = export.ty.params;
    if args.len() != params.len() {
        return Err(mismatch(
            export,
            format!("expected {} arguments, got {}", params.len(), args.len()),
        ));
    }

    params
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (typ, arg))| {
            marshal_arg(*typ, arg).ok_or_else(|| {
                mismatch(
                    export,
                    format!("argument {index}: cannot pass {} {arg} as {typ}", arg.kind()),
                )
            })
        })
        .collect()
}

/// Convert one host value to a parameter of type `typ`
///
/// An `Int` reaches an i32 parameter when it lies in `[-2^31, 2^32)`, wrapping
/// the upper half into negative values. A `Float` reaches an integer
/// parameter only when it is integral and in range.
pub fn marshal_arg(typ: ValueType, arg: &HostValue) -> Option<Value> {
    match (typ, arg) {
        (ValueType::I32, HostValue::Int(v)) => int_to_i32(*v),
        (ValueType::I64, HostValue::Int(v)) => Some(Value::I64(*v)),
        (ValueType::F32, HostValue::Int(v)) => Some(Value::F32(*v as f32)),
        (ValueType::F64, HostValue::Int(v)) => Some(Value::F64(*v as f64)),
        (ValueType::F32, HostValue::Float(v)) => Some(Value::F32(*v as f32)),
        (ValueType::F64, HostValue::Float(v)) => Some(Value::F64(*v)),
        (ValueType::I32, HostValue::Float(v)) => integral(*v).and_then(int_to_i32),
        (ValueType::I64, HostValue::Float(v)) => integral(*v).map(Value::I64),
        _ => None,
    }
}

/// Convert a module result back to a host value
pub fn marshal_result(result: Option<Value>) -> HostValue {
    match result {
        None => HostValue::None,
        Some(Value::I32(v)) => HostValue::Int(i64::from(v)),
        Some(Value::I64(v)) => HostValue::Int(v),
        Some(Value::F32(v)) => HostValue::Float(f64::from(v)),
        Some(Value::F64(v)) => HostValue::Float(v),
    }
}

fn int_to_i32(v: i64) -> Option<Value> {
    if (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&v) {
        Some(Value::I32(v as i32))
    } else {
        None
    }
}

fn integral(v: f64) -> Option<i64> {
    // 2^63 itself is out of range for i64
    const LIMIT: f64 = 9223372036854775808.0;
    if v.is_finite() && v.fract() == 0.0 && (-LIMIT..LIMIT).contains(&v) {
        Some(v as i64)
    } else {
        None
    }
}

fn mismatch(export: &ExportDecl, reason: String) -> BridgeError {
    BridgeError::ArgumentMismatch {
        export: export.name.to_string(),
        reason,
    }
}
