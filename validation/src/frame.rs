use crate::jumptable::Slot;
use alloc::vec::Vec;
use waspvm_core::{Pc, ResultType};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CtrlFrameKind {
    /// The implicit outermost frame representing the function body.
    Func,
    Block,
    Loop,
    If,
    /// The `else` arm of an `if`; tracked as its own frame so `end` sees the same pop/patch
    /// logic it would for a plain `block`.
    Else,
}

/// One entry on the control-frame stack (Validator, "Control-frame stack").
pub struct CtrlFrame {
    pub kind: CtrlFrameKind,
    pub start_types: ResultType,
    pub end_types: ResultType,
    /// Operand-stack length when this frame was entered (after `start_types` were re-pushed).
    pub height: usize,
    pub unreachable: bool,
    /// The pc of the instruction that opened this frame (`block`/`loop`/`if`), used to resolve
    /// backward branches (`loop`) immediately and to locate the opening `if` once its matching
    /// `else`/`end` is reached. `None` only for the implicit function-body frame.
    pub pc: Option<Pc>,
    /// `(pc, slot)` pairs of not-yet-resolved forward branches targeting this frame's label,
    /// patched once this frame's `end` is reached and its exit pc is known.
    pub pending_end_targets: Vec<(Pc, Slot)>,
}
