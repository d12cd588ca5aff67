//! Host/system errors (§7: distinct from [`waspvm_core::Trap`] and
//! [`waspvm_validation::ValidationError`]).
//!
//! An `Error` is something that happened *around* Wasm execution -- a malformed binary, an
//! import that couldn't be resolved, a host running out of memory -- as opposed to a `Trap`
//! (something a running Wasm program did to itself) or a `ValidationError` (a module that was
//! never well-formed to begin with).

use alloc::string::String;
use core::fmt;

use waspvm_core::Trap;
use waspvm_validation::ValidationError;

#[derive(Debug)]
pub enum Error {
    /// The binary could not be decoded: malformed section, bad LEB128, truncated stream, or a
    /// construct this runtime doesn't support (e.g. `memory64`, SIMD, sub-word atomics).
    Decode(String),
    /// A function body or constant expression failed structural type checking.
    Validation(ValidationError),
    /// Instantiation failed: an import was missing or its type didn't match what the module
    /// declared.
    Link(LinkError),
    /// A table or memory `grow` would exceed implementation limits, or the host is out of
    /// memory for the new allocation.
    ResourceLimit(String),
    /// Instantiation itself trapped: an active element or data segment's offset was out of
    /// bounds, or the start function trapped (§4.2 "All-or-nothing").
    Trap(Trap),
}

#[derive(Debug)]
pub enum LinkError {
    Missing { module: String, name: String },
    TypeMismatch { module: String, name: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decode(msg) => write!(f, "failed to decode module: {msg}"),
            Error::Validation(e) => write!(f, "module failed validation: {e}"),
            Error::Link(e) => write!(f, "{e}"),
            Error::ResourceLimit(msg) => write!(f, "resource limit exceeded: {msg}"),
            Error::Trap(t) => write!(f, "instantiation trapped: {t}"),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Missing { module, name } => {
                write!(f, "missing import: {module}::{name}")
            }
            LinkError::TypeMismatch { module, name } => {
                write!(f, "import type mismatch: {module}::{name}")
            }
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<Trap> for Error {
    fn from(e: Trap) -> Self {
        Error::Trap(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
