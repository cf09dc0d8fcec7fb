//! Common test utilities shared between integration tests

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};
use wasmbed::config::BridgeConfig;
use wasmbed::runtime::{HostContext, ImportObject, Instance, ManualClock, ModuleDefinition, Peripherals};

/// Captured writer that stores output for testing
pub struct CapturedWriter(pub Arc<Mutex<Vec<u8>>>);

impl Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A GPIO or watchdog request seen by [`RecordingPeripherals`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEvent {
    Mode { pin: u32, mode: u32 },
    Write { pin: u32, value: u32 },
    StopWatchdog,
}

/// Peripherals that log every request
pub struct RecordingPeripherals(pub Arc<Mutex<Vec<PinEvent>>>);

impl Peripherals for RecordingPeripherals {
    fn configure_pin(&mut self, pin: u32, mode: u32) {
        self.0.lock().unwrap().push(PinEvent::Mode { pin, mode });
    }

    fn write_pin(&mut self, pin: u32, value: u32) {
        self.0.lock().unwrap().push(PinEvent::Write { pin, value });
    }

    fn stop_watchdog(&mut self) {
        self.0.lock().unwrap().push(PinEvent::StopWatchdog);
    }
}

/// Everything a test needs to observe a running instance
pub struct Harness {
    pub clock: ManualClock,
    pub stdout: Arc<Mutex<Vec<u8>>>,
    pub events: Arc<Mutex<Vec<PinEvent>>>,
}

impl Harness {
    pub fn new() -> Self {
        Harness {
            clock: ManualClock::new(),
            stdout: Arc::new(Mutex::new(Vec::new())),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn host(&self) -> HostContext {
        HostContext::builder()
            .clock(Box::new(self.clock.clone()))
            .stdout(Box::new(CapturedWriter(self.stdout.clone())))
            .peripherals(Box::new(RecordingPeripherals(self.events.clone())))
            .build()
    }

    pub fn instantiate(&self, definition: &'static ModuleDefinition, imports: &ImportObject) -> Instance {
        Instance::construct(definition, imports, self.host(), &BridgeConfig::default())
            .expect("Failed to construct instance")
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.stdout.lock().unwrap()).into_owned()
    }

    pub fn events(&self) -> Vec<PinEvent> {
        self.events.lock().unwrap().clone()
    }
}
