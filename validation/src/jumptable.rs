use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use waspvm_core::Pc;

/// A resolved branch target: where to jump, how many result values to preserve, and the operand
/// stack height to unwind to first (Validator, "Jump-table emission").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub pc: Pc,
    pub arity: u32,
    pub height: usize,
}

/// What a particular instruction's jump-table entry means. Stored once per `pc` that can
/// transfer control: `br`/`br_if` (`Br`), `br_table` (`Table`), and the implicit jumps `if`
/// (to its `else`-or-`end`) and `else` (to its `end`) need to skip the arm not taken.
#[derive(Clone, Debug, PartialEq)]
pub enum BranchInfo {
    Br(Target),
    Table {
        targets: Arc<[Target]>,
        default: Target,
    },
    /// `if`'s false-branch target, taken when the condition is zero.
    IfElse(Target),
    /// `else`'s target once the preceding `if` arm completes.
    ElseEnd(Target),
}

/// Identifies which [`Target`] inside a [`BranchInfo`] a deferred forward branch refers to, so
/// several `br_table` entries that share one `pc` can each be patched independently once their
/// (possibly distinct) enclosing frames end.
#[derive(Copy, Clone, Debug)]
pub enum Slot {
    Br,
    TableEntry(usize),
    TableDefault,
}

/// A dense, pc-indexed table of branch resolutions built once during validation and consulted
/// by the executor for O(1) branch dispatch — no re-walking the control-frame stack at runtime.
#[derive(Clone, Debug, Default)]
pub struct JumpTable {
    slots: Vec<Option<BranchInfo>>,
}

impl JumpTable {
    pub fn new(len: usize) -> Self {
        JumpTable {
            slots: vec![None; len],
        }
    }

    pub fn set(&mut self, pc: Pc, info: BranchInfo) {
        self.slots[pc as usize] = Some(info);
    }

    pub fn get(&self, pc: Pc) -> Option<&BranchInfo> {
        self.slots.get(pc as usize).and_then(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Overwrites the still-unresolved placeholder `Target` at `pc`/`slot` once the branch's
    /// target frame has finished (its exit pc and arity are now known).
    pub fn patch_forward_target(&mut self, pc: Pc, slot: Slot, target: Target) {
        let entry = self.slots[pc as usize]
            .as_mut()
            .expect("pending jump slot must already hold a placeholder BranchInfo");
        match (entry, slot) {
            (BranchInfo::Br(t), Slot::Br) => *t = target,
            (BranchInfo::IfElse(t), Slot::Br) => *t = target,
            (BranchInfo::ElseEnd(t), Slot::Br) => *t = target,
            (BranchInfo::Table { targets, .. }, Slot::TableEntry(i)) => {
                Arc::get_mut(targets)
                    .expect("jump table not yet shared across threads during validation")[i] =
                    target;
            }
            (BranchInfo::Table { default, .. }, Slot::TableDefault) => *default = target,
            (_, _) => unreachable!("branch slot kind does not match the recorded BranchInfo"),
        }
    }
}
