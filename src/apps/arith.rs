//! Arithmetic test module
//!
//! Hand-lowered the way the translator lowers a small C unit: every fault
//! site calls a trapping helper, internal calls go through
//! [`Context::call`], and scratch memory comes from the allocation shim.

use crate::runtime::module::{ExportDecl, MemoryLimits, ModuleDefinition};
use crate::runtime::{ops, BridgeResult, Context, FunctionType, Value, ValueType};

const I32: ValueType = ValueType::I32;
const I64: ValueType = ValueType::I64;
const F64: ValueType = ValueType::F64;

fn arg_i32(args: &[Value], index: usize) -> i32 {
    args.get(index).and_then(Value::as_i32).unwrap_or_default()
}

fn add(_ctx: &mut Context<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
    let (a, b) = (arg_i32(args, 0), arg_i32(args, 1));
    Ok(Some(Value::I32(a.wrapping_add(b))))
}

fn div(_ctx: &mut Context<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
    let quotient = ops::i32_div_s(arg_i32(args, 0), arg_i32(args, 1))?;
    Ok(Some(Value::I32(quotient)))
}

fn arg_f64(args: &[Value], index: usize) -> f64 {
    args.get(index).and_then(Value::as_f64).unwrap_or_default()
}

/// (int) x
fn trunc(_ctx: &mut Context<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
    Ok(Some(Value::I32(ops::i32_trunc_f64_s(arg_f64(args, 0))?)))
}

/// (unsigned) x
fn trunc_u(_ctx: &mut Context<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
    Ok(Some(Value::I32(ops::i32_trunc_f64_u(arg_f64(args, 0))?)))
}

fn fib_inner(ctx: &mut Context<'_>, n: i32) -> BridgeResult<i64> {
    if n < 2 {
        return Ok(i64::from(n.max(0)));
    }
    let a = ctx.call(|ctx| fib_inner(ctx, n - 1))?;
    let b = ctx.call(|ctx| fib_inner(ctx, n - 2))?;
    Ok(a.wrapping_add(b))
}

fn fib(ctx: &mut Context<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
    fib_inner(ctx, arg_i32(args, 0)).map(|v| Some(Value::I64(v)))
}

fn sum_squares(ctx: &mut Context<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
    let n = arg_i32(args, 0);
    if n <= 0 {
        return Ok(Some(Value::I64(0)));
    }

    let mut scratch = ctx.alloc_zeroed(n as usize, 8)?;
    for (i, slot) in scratch.chunks_exact_mut(8).enumerate() {
        let i = i as i64 + 1;
        slot.copy_from_slice(&(i * i).to_le_bytes());
    }
    let total = scratch
        .chunks_exact(8)
        .map(|slot| {
            let mut word = [0u8; 8];
            word.copy_from_slice(slot);
            i64::from_le_bytes(word)
        })
        .fold(0i64, i64::wrapping_add);
    ctx.release(Some(scratch));

    Ok(Some(Value::I64(total)))
}

fn grow(ctx: &mut Context<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
    let previous = ctx.grow_memory(arg_i32(args, 0) as u32);
    Ok(Some(Value::I32(previous)))
}

fn load(ctx: &mut Context<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
    let value = ctx.memory().read_i32(arg_i32(args, 0) as u32)?;
    Ok(Some(Value::I32(value)))
}

fn store(ctx: &mut Context<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
    ctx.memory_mut().write_i32(arg_i32(args, 0) as u32, arg_i32(args, 1))?;
    Ok(None)
}

fn crash(ctx: &mut Context<'_>, _args: &[Value]) -> BridgeResult<Option<Value>> {
    Err(ctx.unreachable())
}

/// abort(message, length): the message is read from linear memory
fn bail(ctx: &mut Context<'_>, args: &[Value]) -> BridgeResult<Option<Value>> {
    let (offset, len) = (arg_i32(args, 0) as u32, arg_i32(args, 1) as u32);
    let message = String::from_utf8_lossy(ctx.memory().bytes(offset, len as usize)?).into_owned();
    Err(ctx.abort(message))
}

static EXPORTS: [ExportDecl; 11] = [
    ExportDecl {
        name: "add",
        ty: FunctionType::new(&[I32, I32], Some(I32)),
        func: add,
    },
    ExportDecl {
        name: "div",
        ty: FunctionType::new(&[I32, I32], Some(I32)),
        func: div,
    },
    ExportDecl {
        name: "trunc",
        ty: FunctionType::new(&[F64], Some(I32)),
        func: trunc,
    },
    ExportDecl {
        name: "trunc_u",
        ty: FunctionType::new(&[F64], Some(I32)),
        func: trunc_u,
    },
    ExportDecl {
        name: "fib",
        ty: FunctionType::new(&[I32], Some(I64)),
        func: fib,
    },
    ExportDecl {
        name: "sum_squares",
        ty: FunctionType::new(&[I32], Some(I64)),
        func: sum_squares,
    },
    ExportDecl {
        name: "grow",
        ty: FunctionType::new(&[I32], Some(I32)),
        func: grow,
    },
    ExportDecl {
        name: "load",
        ty: FunctionType::new(&[I32], Some(I32)),
        func: load,
    },
    ExportDecl {
        name: "store",
        ty: FunctionType::new(&[I32, I32], None),
        func: store,
    },
    ExportDecl {
        name: "crash",
        ty: FunctionType::new(&[], None),
        func: crash,
    },
    ExportDecl {
        name: "bail",
        ty: FunctionType::new(&[I32, I32], None),
        func: bail,
    },
];

pub static MODULE: ModuleDefinition = ModuleDefinition {
    name: "arith",
    memory: MemoryLimits {
        initial: 1,
        maximum: Some(4),
    },
    data: &[],
    globals: &[],
    imports: &[],
    exports: &EXPORTS,
    initialize: None,
    start: None,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::runtime::{BridgeError, HostContext, HostValue, ImportObject, Instance, Trap, TrapKind};

    fn instance() -> Instance {
        let host = HostContext::builder().stdout(Box::new(std::io::sink())).build();
        Instance::construct(&MODULE, &ImportObject::new(), host, &BridgeConfig::default()).unwrap()
    }

    #[test]
    fn test_fib() {
        let mut instance = instance();
        assert_eq!(instance.invoke("fib", &[HostValue::Int(20)]).unwrap(), HostValue::Int(6765));
        assert_eq!(instance.invoke("fib", &[HostValue::Int(-3)]).unwrap(), HostValue::Int(0));
    }

    #[test]
    fn test_fib_exhausts_call_stack() {
        let mut instance = instance();
        assert_eq!(
            instance.invoke("fib", &[HostValue::Int(10_000)]),
            Err(BridgeError::Trap(Trap::new(TrapKind::CallStackExhausted)))
        );
    }

    #[test]
    fn test_sum_squares() {
        let mut instance = instance();
        assert_eq!(instance.invoke("sum_squares", &[HostValue::Int(10)]).unwrap(), HostValue::Int(385));
        assert_eq!(instance.invoke("sum_squares", &[HostValue::Int(0)]).unwrap(), HostValue::Int(0));
    }

    #[test]
    fn test_trunc() {
        let mut instance = instance();
        assert_eq!(instance.invoke("trunc", &[HostValue::Float(-7.9)]).unwrap(), HostValue::Int(-7));
        assert_eq!(instance.invoke("trunc_u", &[HostValue::Float(4294967295.0)]).unwrap(), HostValue::Int(-1));
        // Integers reach an f64 parameter as-is
        assert_eq!(instance.invoke("trunc", &[HostValue::Int(12)]).unwrap(), HostValue::Int(12));
    }

    #[test]
    fn test_trunc_faults() {
        let mut instance = instance();
        assert_eq!(
            instance.invoke("trunc", &[HostValue::Float(f64::NAN)]),
            Err(BridgeError::Trap(Trap::new(TrapKind::InvalidConversion)))
        );

        let mut instance = self::instance();
        assert_eq!(
            instance.invoke("trunc_u", &[HostValue::Float(-1.0)]),
            Err(BridgeError::Trap(Trap::new(TrapKind::IntegerOverflow)))
        );
    }

    #[test]
    fn test_div() {
        let mut instance = instance();
        assert_eq!(
            instance.invoke("div", &[HostValue::Int(-9), HostValue::Int(2)]).unwrap(),
            HostValue::Int(-4)
        );
        assert_eq!(
            instance.invoke("div", &[HostValue::Int(1), HostValue::Int(0)]),
            Err(BridgeError::Trap(Trap::new(TrapKind::IntegerDivideByZero)))
        );
    }
}
