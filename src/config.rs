//! Runtime limits and enabled-proposal switches, passed into validation and instantiation: a
//! small struct of limit constants rather than a file-based config system, which has no natural
//! place in an embeddable interpreter core.

/// Fixed process-wide caps the executor enforces (§4.3: "Requested capacity that would exceed
/// fixed process caps traps with `TOO_MANY_FRAMES` / `TOO_MANY_STACKVALS`").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of nested function activations.
    pub max_frames: u32,
    /// Maximum number of value-stack cells live in a single function activation's operand
    /// stack (each nested call gets its own budget; see `exec::OperandStack`).
    pub max_stack_cells: u32,
    /// Whether `memory.atomic.*` / shared memories are accepted at all; disabling this rejects
    /// shared memory imports/definitions and atomic opcodes at validation time.
    pub enable_threads: bool,
}

impl Config {
    pub const fn new() -> Self {
        Config {
            max_frames: 1024,
            max_stack_cells: 1 << 20,
            enable_threads: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
