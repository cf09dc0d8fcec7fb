//! The `wiring` import namespace
//!
//! These are the board-support calls a compiled sketch imports: a
//! millisecond clock, a blocking delay, text output from linear memory, and
//! the GPIO and watchdog hooks. Each import forwards to [`HostContext`](super::HostContext)
//! services and does no work of its own.
//!
//! | Import                     | Signature        | Entry point       |
//! |----------------------------|------------------|-------------------|
//! | `wiring.millis`            | `() -> i32`      | [`elapsed_time`]  |
//! | `wiring.delay`             | `(i32)`          | [`delay`]         |
//! | `wiring.print`             | `(i32, i32)`     | [`write_text`]    |
//! | `wiring.pinMode`           | `(i32, i32)`     | [`configure_pin`] |
//! | `wiring.digitalWrite`      | `(i32, i32)`     | [`write_pin`]     |
//! | `wiring.stopWdt`           | `()`             | [`stop_watchdog`] |

use crate::runtime::bytes::check_range;
use crate::runtime::imports::{Caller, HostFunction, ImportObject};
use crate::runtime::trap::{Trap, TrapKind};
use crate::runtime::{BridgeResult, FunctionType, Value, ValueType};

/// Import module name the sketch links against
pub const WIRING_MODULE: &str = "wiring";

const I32: ValueType = ValueType::I32;

pub const MILLIS_TYPE: FunctionType = FunctionType::new(&[], Some(I32));
pub const DELAY_TYPE: FunctionType = FunctionType::new(&[I32], None);
pub const PRINT_TYPE: FunctionType = FunctionType::new(&[I32, I32], None);
pub const PIN_MODE_TYPE: FunctionType = FunctionType::new(&[I32, I32], None);
pub const DIGITAL_WRITE_TYPE: FunctionType = FunctionType::new(&[I32, I32], None);
pub const STOP_WDT_TYPE: FunctionType = FunctionType::new(&[], None);

/// Milliseconds on the host's monotonic clock, wrapping at 2^32
pub fn elapsed_time(caller: &Caller<'_>) -> u32 {
    caller.host.ticks_ms()
}

/// Hand control to the host's sleep for `ms` milliseconds
pub fn delay(caller: &mut Caller<'_>, ms: u32) {
    caller.host.sleep_ms(ms);
}

/// Send `[offset, offset + len)` of linear memory to the output sink
///
/// The range is checked before anything is written, so a violation emits
/// nothing.
pub fn write_text(caller: &mut Caller<'_>, offset: u32, len: u32) -> BridgeResult<()> {
    let range = check_range(caller.memory.len(), offset, len)?;
    caller.host.print(&caller.memory.data()[range])
}

pub fn configure_pin(caller: &mut Caller<'_>, pin: u32, mode: u32) {
    caller.host.peripherals_mut().configure_pin(pin, mode);
}

pub fn write_pin(caller: &mut Caller<'_>, pin: u32, value: u32) {
    caller.host.peripherals_mut().write_pin(pin, value);
}

pub fn stop_watchdog(caller: &mut Caller<'_>) {
    caller.host.peripherals_mut().stop_watchdog();
}

/// Extract an i32 argument as the unsigned value the module meant
fn extract_u32(args: &[Value], index: usize) -> BridgeResult<u32> {
    args.get(index).and_then(Value::as_u32).ok_or_else(|| {
        Trap::new(TrapKind::Unreachable)
            .with_message(format!("wiring import expected an i32 at argument {index}"))
            .into()
    })
}

/// Create the `wiring` import functions
pub fn create_wiring_imports() -> ImportObject {
    let mut imports = ImportObject::new();
    add_wiring_imports(&mut imports);
    imports
}

/// Register the `wiring` functions into an existing ImportObject
pub fn add_wiring_imports(imports: &mut ImportObject) {
    imports.add_function(
        WIRING_MODULE,
        "millis",
        HostFunction::new(MILLIS_TYPE, |caller, _args| {
            Ok(Some(Value::I32(elapsed_time(caller) as i32)))
        }),
    );

    imports.add_function(
        WIRING_MODULE,
        "delay",
        HostFunction::new(DELAY_TYPE, |caller, args| {
            delay(caller, extract_u32(args, 0)?);
            Ok(None)
        }),
    );

    imports.add_function(
        WIRING_MODULE,
        "print",
        HostFunction::new(PRINT_TYPE, |caller, args| {
            write_text(caller, extract_u32(args, 0)?, extract_u32(args, 1)?)?;
            Ok(None)
        }),
    );

    imports.add_function(
        WIRING_MODULE,
        "pinMode",
        HostFunction::new(PIN_MODE_TYPE, |caller, args| {
            configure_pin(caller, extract_u32(args, 0)?, extract_u32(args, 1)?);
            Ok(None)
        }),
    );

    imports.add_function(
        WIRING_MODULE,
        "digitalWrite",
        HostFunction::new(DIGITAL_WRITE_TYPE, |caller, args| {
            write_pin(caller, extract_u32(args, 0)?, extract_u32(args, 1)?);
            Ok(None)
        }),
    );

    imports.add_function(
        WIRING_MODULE,
        "stopWdt",
        HostFunction::new(STOP_WDT_TYPE, |caller, _args| {
            stop_watchdog(caller);
            Ok(None)
        }),
    );
}
