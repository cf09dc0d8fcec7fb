//! Translated modules bundled with the bridge

pub mod arith;
pub mod blink;

use crate::runtime::ModuleDefinition;

/// Every bundled module, by name
pub static APPS: [&ModuleDefinition; 2] = [&arith::MODULE, &blink::MODULE];

pub fn by_name(name: &str) -> Option<&'static ModuleDefinition> {
    APPS.iter().copied().find(|m| m.name == name)
}
