//! Peripheral hooks the module drives through its imports
//!
//! The bridge fixes only the call shape. Real deployments supply an
//! implementation backed by hardware; the defaults do nothing.

pub trait Peripherals: Send {
    /// Set the mode of a GPIO pin
    fn configure_pin(&mut self, _pin: u32, _mode: u32) {}

    /// Drive a GPIO pin
    fn write_pin(&mut self, _pin: u32, _value: u32) {}

    /// Disable the hardware watchdog
    fn stop_watchdog(&mut self) {}
}

/// Peripherals that ignore every request
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPeripherals;

impl Peripherals for NoopPeripherals {}
