//! Fault classification and the trap translator
//!
//! Every error that escapes module code passes through [`TrapTranslator`]
//! exactly once. The translator formats one diagnostic, records it as the
//! cause that poisons the instance, and either hands the error back to the
//! host or halts the process, depending on the configured [`TrapPolicy`].

use super::BridgeError;
use serde::Deserialize;
use std::fmt;

/// Classification of a module-internal fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapKind {
    /// An `unreachable` instruction or other illegal operation
    Unreachable,
    IntegerDivideByZero,
    IntegerOverflow,
    /// Float to integer conversion of NaN or an out of range value
    InvalidConversion,
    CallStackExhausted,
    /// Explicit abort requested by the module's own runtime
    Abort,
}

impl TrapKind {
    pub fn description(self) -> &'static str {
        match self {
            TrapKind::Unreachable => "unreachable executed",
            TrapKind::IntegerDivideByZero => "integer divide by zero",
            TrapKind::IntegerOverflow => "integer overflow",
            TrapKind::InvalidConversion => "invalid conversion to integer",
            TrapKind::CallStackExhausted => "call stack exhausted",
            TrapKind::Abort => "aborted",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A raised fault: its kind plus an optional detail message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trap {
    pub kind: TrapKind,
    pub message: Option<String>,
}

impl Trap {
    pub fn new(kind: TrapKind) -> Self {
        Trap { kind, message: None }
    }

    /// An explicit abort carrying the module's own message
    pub fn abort(message: impl Into<String>) -> Self {
        Trap {
            kind: TrapKind::Abort,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.kind, message),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// What happens once a fault has been reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapPolicy {
    /// Return the fault to the host as a catchable error
    #[default]
    Raise,
    /// Abort the whole process after reporting
    Halt,
}

/// The single choke point for faults raised while module code runs
#[derive(Debug)]
pub struct TrapTranslator {
    policy: TrapPolicy,
    verbose: bool,
    poisoned: Option<String>,
}

impl TrapTranslator {
    pub fn new(policy: TrapPolicy, verbose: bool) -> Self {
        TrapTranslator {
            policy,
            verbose,
            poisoned: None,
        }
    }

    /// The diagnostic of the fault that poisoned the instance, if any
    pub fn poison_cause(&self) -> Option<&str> {
        self.poisoned.as_deref()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Refuse to enter module code once a fault has been observed
    pub fn check(&self) -> Result<(), BridgeError> {
        match &self.poisoned {
            Some(cause) => Err(BridgeError::Poisoned(cause.clone())),
            None => Ok(()),
        }
    }

    /// Report a fault raised during `call` and poison the instance
    ///
    /// With [`TrapPolicy::Halt`] this never returns.
    pub fn translate(&mut self, call: &str, err: BridgeError) -> BridgeError {
        let err = self.redact(err);
        let diagnostic = format!("{call}: {err}");
        log::error!("module fault in {diagnostic}");

        if self.poisoned.is_none() {
            self.poisoned = Some(diagnostic);
        }

        if self.policy == TrapPolicy::Halt {
            log::logger().flush();
            std::process::abort();
        }

        err
    }

    /// Without verbose traps only the fault kind is reported
    fn redact(&self, err: BridgeError) -> BridgeError {
        match err {
            BridgeError::Trap(trap) if !self.verbose => BridgeError::Trap(Trap::new(trap.kind)),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TrapKind::Unreachable, "unreachable executed")]
    #[case(TrapKind::IntegerDivideByZero, "integer divide by zero")]
    #[case(TrapKind::IntegerOverflow, "integer overflow")]
    #[case(TrapKind::InvalidConversion, "invalid conversion to integer")]
    #[case(TrapKind::CallStackExhausted, "call stack exhausted")]
    #[case(TrapKind::Abort, "aborted")]
    fn test_trap_descriptions(#[case] kind: TrapKind, #[case] expected: &str) {
        assert_eq!(Trap::new(kind).to_string(), expected);
    }

    #[test]
    fn test_trap_with_message() {
        let trap = Trap::abort("heap corrupted");
        assert_eq!(trap.kind, TrapKind::Abort);
        assert_eq!(trap.to_string(), "aborted: heap corrupted");

        let trap = Trap::new(TrapKind::Unreachable).with_message("in loop");
        assert_eq!(trap.to_string(), "unreachable executed: in loop");
    }

    #[test]
    fn test_translate_poisons() {
        let mut translator = TrapTranslator::new(TrapPolicy::Raise, true);
        assert!(translator.check().is_ok());

        let err = translator.translate("div", Trap::new(TrapKind::IntegerDivideByZero).into());
        assert_eq!(err, BridgeError::Trap(Trap::new(TrapKind::IntegerDivideByZero)));
        assert!(translator.is_poisoned());
        assert_eq!(translator.poison_cause(), Some("div: integer divide by zero"));

        // Every later check fails the same way
        let first = translator.check().unwrap_err();
        let second = translator.check().unwrap_err();
        assert_eq!(first, second);
        assert_eq!(
            first,
            BridgeError::Poisoned("div: integer divide by zero".to_string())
        );
    }

    #[test]
    fn test_first_fault_is_kept() {
        let mut translator = TrapTranslator::new(TrapPolicy::Raise, true);
        translator.translate("a", Trap::new(TrapKind::Unreachable).into());
        translator.translate("b", Trap::new(TrapKind::Abort).into());
        assert_eq!(translator.poison_cause(), Some("a: unreachable executed"));
    }

    #[test]
    fn test_quiet_translator_drops_details() {
        let mut translator = TrapTranslator::new(TrapPolicy::Raise, false);
        let err = translator.translate("bail", Trap::abort("secret detail").into());
        assert_eq!(err, BridgeError::Trap(Trap::new(TrapKind::Abort)));
        assert_eq!(translator.poison_cause(), Some("bail: aborted"));
    }

    #[test]
    fn test_non_trap_errors_pass_through() {
        let mut translator = TrapTranslator::new(TrapPolicy::Raise, false);
        let err = translator.translate("print", BridgeError::bounds(10, 20, 16));
        assert_eq!(err, BridgeError::bounds(10, 20, 16));
        assert!(translator.is_poisoned());
    }

    #[test]
    fn test_policy_deserialises() {
        let policy: TrapPolicy = serde_json::from_str("\"halt\"").unwrap();
        assert_eq!(policy, TrapPolicy::Halt);
        assert_eq!(TrapPolicy::default(), TrapPolicy::Raise);
    }
}
