//! The blink sketch
//!
//! A board-support program in the shape the translator produces for a
//! wiring sketch: `setup` and `loop` exports, an `_initialize` hook, and
//! every board call going through the `wiring` imports.

use crate::runtime::host::wiring::{
    DELAY_TYPE, DIGITAL_WRITE_TYPE, MILLIS_TYPE, PIN_MODE_TYPE, PRINT_TYPE, STOP_WDT_TYPE, WIRING_MODULE,
};
use crate::runtime::module::{DataSegment, ExportDecl, ImportDecl, MemoryLimits, ModuleDefinition};
use crate::runtime::{ops, BridgeResult, Context, FunctionType, Value};

pub const LED_PIN: i32 = 2;
pub const BLINK_INTERVAL_MS: i32 = 500;
const OUTPUT: i32 = 1;

// Import indices, in declaration order
const MILLIS: usize = 0;
const DELAY: usize = 1;
const PRINT: usize = 2;
const PIN_MODE: usize = 3;
const DIGITAL_WRITE: usize = 4;
const STOP_WDT: usize = 5;

// Globals
const PIN: usize = 0;
const STATE: usize = 1;
const LAST_TOGGLE: usize = 2;

const BANNER: &[u8] = b"Blink sketch started\n";
const LED_ON: &[u8] = b"LED on\n";
const LED_OFF: &[u8] = b"LED off\n";

const BANNER_AT: u32 = 16;
const LED_ON_AT: u32 = 48;
const LED_OFF_AT: u32 = 64;

fn global_i32(ctx: &Context<'_>, index: usize) -> BridgeResult<i32> {
    Ok(ctx.global(index)?.as_i32().unwrap_or_default())
}

fn print(ctx: &mut Context<'_>, offset: u32, text: &[u8]) -> BridgeResult<()> {
    ctx.call_import(PRINT, &[Value::I32(offset as i32), Value::I32(text.len() as i32)])?;
    Ok(())
}

fn initialize(ctx: &mut Context<'_>) -> BridgeResult<()> {
    ctx.set_global(PIN, Value::I32(LED_PIN))
}

fn setup(ctx: &mut Context<'_>, _args: &[Value]) -> BridgeResult<Option<Value>> {
    let pin = global_i32(ctx, PIN)?;
    ctx.call_import(STOP_WDT, &[])?;
    ctx.call_import(PIN_MODE, &[Value::I32(pin), Value::I32(OUTPUT)])?;
    print(ctx, BANNER_AT, BANNER)?;
    Ok(None)
}

fn blink_loop(ctx: &mut Context<'_>, _args: &[Value]) -> BridgeResult<Option<Value>> {
    let pin = global_i32(ctx, PIN)?;
    let state = ops::i32_rem_u(global_i32(ctx, STATE)?.wrapping_add(1), 2)?;
    ctx.set_global(STATE, Value::I32(state))?;

    ctx.call_import(DIGITAL_WRITE, &[Value::I32(pin), Value::I32(state)])?;
    if state == 1 {
        print(ctx, LED_ON_AT, LED_ON)?;
    } else {
        print(ctx, LED_OFF_AT, LED_OFF)?;
    }

    if let Some(now) = ctx.call_import(MILLIS, &[])? {
        ctx.set_global(LAST_TOGGLE, now)?;
    }
    ctx.call_import(DELAY, &[Value::I32(BLINK_INTERVAL_MS)])?;
    Ok(None)
}

static DATA: [DataSegment; 3] = [
    DataSegment {
        offset: BANNER_AT,
        bytes: BANNER,
    },
    DataSegment {
        offset: LED_ON_AT,
        bytes: LED_ON,
    },
    DataSegment {
        offset: LED_OFF_AT,
        bytes: LED_OFF,
    },
];

static IMPORTS: [ImportDecl; 6] = [
    ImportDecl::new(WIRING_MODULE, "millis", MILLIS_TYPE),
    ImportDecl::new(WIRING_MODULE, "delay", DELAY_TYPE),
    ImportDecl::new(WIRING_MODULE, "print", PRINT_TYPE),
    ImportDecl::new(WIRING_MODULE, "pinMode", PIN_MODE_TYPE),
    ImportDecl::new(WIRING_MODULE, "digitalWrite", DIGITAL_WRITE_TYPE),
    ImportDecl::new(WIRING_MODULE, "stopWdt", STOP_WDT_TYPE),
];

static EXPORTS: [ExportDecl; 2] = [
    ExportDecl {
        name: "setup",
        ty: FunctionType::new(&[], None),
        func: setup,
    },
    ExportDecl {
        name: "loop",
        ty: FunctionType::new(&[], None),
        func: blink_loop,
    },
];

pub static MODULE: ModuleDefinition = ModuleDefinition {
    name: "blink",
    memory: MemoryLimits {
        initial: 1,
        maximum: Some(1),
    },
    data: &DATA,
    globals: &[Value::I32(0), Value::I32(0), Value::I32(0)],
    imports: &IMPORTS,
    exports: &EXPORTS,
    initialize: Some(initialize),
    start: None,
};
