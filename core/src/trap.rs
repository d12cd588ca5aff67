use core::fmt;

/// Taxonomy of terminating runtime errors, matching the trap codes visible at the host
/// boundary (External Interfaces, §6).
///
/// A trap is not an [`Error`](crate) in the Rust sense of "something went wrong with the host
/// program" — it is a defined outcome of executing Wasm code, the same way a `panic` in the
/// guest is a defined outcome rather than a bug in the interpreter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrapCode {
    /// Catch-all for traps that don't need their own code; `trap(fmt, ...)` in the distilled
    /// spec implies this variant.
    Misc,
    DivByZero,
    IntegerOverflow,
    OutOfBoundsMemoryAccess,
    Unreachable,
    TooManyFrames,
    TooManyStackVals,
    CallIndirectOutOfBoundsTableAccess,
    CallIndirectNullFuncref,
    CallIndirectFuncTypeMismatch,
    InvalidConversionToInteger,
    /// Payload carried out-of-band in `ExecContext::exit_code`; raised by a host `proc_exit`.
    VoluntaryExit,
    OutOfBoundsDataAccess,
    OutOfBoundsTableAccess,
    OutOfBoundsElementAccess,
}

impl TrapCode {
    pub fn as_str(self) -> &'static str {
        match self {
            TrapCode::Misc => "misc trap",
            TrapCode::DivByZero => "integer divide by zero",
            TrapCode::IntegerOverflow => "integer overflow",
            TrapCode::OutOfBoundsMemoryAccess => "out of bounds memory access",
            TrapCode::Unreachable => "unreachable executed",
            TrapCode::TooManyFrames => "call stack exhausted",
            TrapCode::TooManyStackVals => "value stack exhausted",
            TrapCode::CallIndirectOutOfBoundsTableAccess => {
                "undefined element: out of bounds table access"
            }
            TrapCode::CallIndirectNullFuncref => "uninitialized element (null funcref)",
            TrapCode::CallIndirectFuncTypeMismatch => "indirect call type mismatch",
            TrapCode::InvalidConversionToInteger => "invalid conversion to integer",
            TrapCode::VoluntaryExit => "voluntary exit",
            TrapCode::OutOfBoundsDataAccess => "out of bounds data segment access",
            TrapCode::OutOfBoundsTableAccess => "out of bounds table access",
            TrapCode::OutOfBoundsElementAccess => "out of bounds element segment access",
        }
    }
}

impl fmt::Display for TrapCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TrapCode {}

/// A trap raised during execution: the [`TrapCode`] plus an optional human-readable message
/// (the "report" the distilled spec's `trap_with_id`/`trap` write to) and, for
/// [`TrapCode::VoluntaryExit`], the process-style exit code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trap {
    code: TrapCode,
    message: alloc::string::String,
    exit_code: Option<i32>,
}

impl Trap {
    pub fn new(code: TrapCode, message: impl Into<alloc::string::String>) -> Self {
        Trap {
            code,
            message: message.into(),
            exit_code: None,
        }
    }

    pub fn voluntary_exit(exit_code: i32) -> Self {
        Trap {
            code: TrapCode::VoluntaryExit,
            message: alloc::format!("voluntary exit({exit_code})"),
            exit_code: Some(exit_code),
        }
    }

    pub fn code(&self) -> TrapCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Trap {}

impl From<TrapCode> for Trap {
    fn from(code: TrapCode) -> Self {
        Trap::new(code, code.as_str())
    }
}
