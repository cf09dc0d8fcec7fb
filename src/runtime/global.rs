//! Process-wide instance slot
//!
//! For hosts whose extension model has no place to keep an [`Instance`]
//! handle. The slot accepts exactly one successful bring-up per process;
//! after that, even once torn down, it refuses a second one.

use super::exports::HostValue;
use super::host::HostContext;
use super::imports::ImportObject;
use super::instance::Instance;
use super::module::ModuleDefinition;
use super::{BridgeError, BridgeResult};
use crate::config::BridgeConfig;
use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Slot {
    claimed: bool,
    instance: Option<Instance>,
}

static SLOT: Lazy<Mutex<Slot>> = Lazy::new(|| Mutex::new(Slot::default()));

fn slot() -> MutexGuard<'static, Slot> {
    // A panic while holding the lock leaves the slot itself consistent
    SLOT.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Construct the process's instance
///
/// # Errors
/// `AlreadyConstructed` if an instance was ever brought up in this process,
/// otherwise whatever [`Instance::construct`] fails with. A failed bring-up
/// does not claim the slot.
pub fn bring_up(
    definition: &'static ModuleDefinition,
    imports: &ImportObject,
    host: HostContext,
    config: &BridgeConfig,
) -> BridgeResult<()> {
    let mut slot = slot();
    if slot.claimed {
        return Err(BridgeError::AlreadyConstructed);
    }

    let instance = Instance::construct(definition, imports, host, config)?;
    slot.claimed = true;
    slot.instance = Some(instance);
    Ok(())
}

/// Run `f` against the live instance
pub fn with_instance<R>(f: impl FnOnce(&mut Instance) -> R) -> BridgeResult<R> {
    let mut slot = slot();
    let instance = slot.instance.as_mut().ok_or(BridgeError::NotConstructed)?;
    Ok(f(instance))
}

pub fn invoke(name: &str, args: &[HostValue]) -> BridgeResult<HostValue> {
    with_instance(|instance| instance.invoke(name, args))?
}

pub fn is_live() -> bool {
    slot().instance.is_some()
}

/// Tear the instance down; the slot stays claimed
pub fn teardown() -> BridgeResult<()> {
    let instance = slot().instance.take().ok_or(BridgeError::NotConstructed)?;
    instance.teardown();
    Ok(())
}
