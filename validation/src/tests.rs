use super::*;
use waspvm_core::{BlockType, FuncType, Instr};

struct StubCtx {
    memories: u32,
    /// Every global index below this is immutable i32, for const-expr `global.get` tests;
    /// `num_imported_globals` of those (the front of the index space) count as imported.
    globals: u32,
    num_imported_globals: u32,
}

impl ValidationContext for StubCtx {
    fn func_type(&self, _type_idx: u32) -> Option<&FuncType> {
        None
    }
    fn func_type_of(&self, _func_idx: u32) -> Option<&FuncType> {
        None
    }
    fn global_type(&self, global_idx: u32) -> Option<(ValueType, bool)> {
        (global_idx < self.globals).then_some((ValueType::I32, false))
    }
    fn num_imported_globals(&self) -> u32 {
        self.num_imported_globals
    }
    fn table_type(&self, _table_idx: u32) -> Option<RefType> {
        None
    }
    fn table_exists(&self, _table_idx: u32) -> bool {
        false
    }
    fn memory_exists(&self, mem_idx: u32) -> bool {
        mem_idx < self.memories
    }
    fn data_count(&self) -> Option<u32> {
        None
    }
    fn elem_type(&self, _elem_idx: u32) -> Option<RefType> {
        None
    }
}

fn ctx() -> StubCtx {
    StubCtx { memories: 1, globals: 0, num_imported_globals: 0 }
}

fn const_expr_flags() -> ValidationFlags {
    ValidationFlags {
        const_expr: true,
        generate_jump_table: false,
    }
}

fn jump_flags() -> ValidationFlags {
    ValidationFlags {
        const_expr: false,
        generate_jump_table: true,
    }
}

#[test]
fn well_typed_body_validates() {
    let ft = FuncType::new(vec![], vec![ValueType::I32]);
    let instrs = [Instr::I32Const(1), Instr::End];
    let jt = validate_function(&ctx(), &ft, &[], &instrs, jump_flags());
    assert!(jt.is_ok());
}

#[test]
fn stack_underflow_is_rejected() {
    let ft = FuncType::new(vec![], vec![ValueType::I32]);
    let instrs = [Instr::End];
    let err = validate_function(&ctx(), &ft, &[], &instrs, jump_flags()).unwrap_err();
    assert_eq!(err, ValidationError::StackUnderflow);
}

#[test]
fn type_mismatch_is_rejected() {
    let ft = FuncType::new(vec![], vec![ValueType::I32]);
    let instrs = [Instr::I64Const(1), Instr::End];
    let err = validate_function(&ctx(), &ft, &[], &instrs, jump_flags()).unwrap_err();
    assert_eq!(
        err,
        ValidationError::TypeMismatch {
            expected: ValueType::I32,
            actual: ValueType::I64,
        }
    );
}

/// `(block (result i32) unreachable)`: once `unreachable` marks the frame polymorphic, the
/// block's declared `i32` result is satisfied without ever being pushed for real.
#[test]
fn unreachable_code_is_polymorphic() {
    let ft = FuncType::new(vec![], vec![ValueType::I32]);
    let instrs = [
        Instr::Block(BlockType::Value(ValueType::I32)),
        Instr::Unreachable,
        Instr::End,
        Instr::End,
    ];
    let jt = validate_function(&ctx(), &ft, &[], &instrs, jump_flags());
    assert!(jt.is_ok());
}

#[test]
fn values_left_over_at_block_end_are_rejected() {
    let ft = FuncType::new(vec![], vec![]);
    let instrs = [Instr::Block(BlockType::Empty), Instr::I32Const(1), Instr::End, Instr::End];
    let err = validate_function(&ctx(), &ft, &[], &instrs, jump_flags()).unwrap_err();
    assert_eq!(err, ValidationError::UnusedValuesAtFrameEnd);
}

#[test]
fn backward_branch_in_loop_resolves_to_loop_header() {
    // loop { br 0 }; end
    let ft = FuncType::new(vec![], vec![]);
    let instrs = [
        Instr::Loop(BlockType::Empty),
        Instr::Br(0),
        Instr::End,
        Instr::End,
    ];
    let jt = validate_function(&ctx(), &ft, &[], &instrs, jump_flags()).unwrap();
    match jt.get(1) {
        Some(BranchInfo::Br(target)) => {
            assert_eq!(target.pc, 0);
            assert_eq!(target.arity, 0);
            assert_eq!(target.height, 0);
        }
        other => panic!("expected a resolved backward Br target, got {other:?}"),
    }
}

#[test]
fn forward_branch_in_block_resolves_past_end() {
    // block { br 0 }; end
    let ft = FuncType::new(vec![], vec![]);
    let instrs = [
        Instr::Block(BlockType::Empty),
        Instr::Br(0),
        Instr::End,
        Instr::End,
    ];
    let jt = validate_function(&ctx(), &ft, &[], &instrs, jump_flags()).unwrap();
    match jt.get(1) {
        Some(BranchInfo::Br(target)) => {
            assert_eq!(target.pc, 3, "forward branch must land just past the matching end");
            assert_eq!(target.arity, 0);
        }
        other => panic!("expected a resolved forward Br target, got {other:?}"),
    }
}

#[test]
fn if_without_else_jumps_past_end_when_false() {
    // i32.const 0; if {}; end
    let ft = FuncType::new(vec![], vec![]);
    let instrs = [
        Instr::I32Const(0),
        Instr::If(BlockType::Empty),
        Instr::End,
        Instr::End,
    ];
    let jt = validate_function(&ctx(), &ft, &[], &instrs, jump_flags()).unwrap();
    match jt.get(1) {
        Some(BranchInfo::IfElse(target)) => assert_eq!(target.pc, 3),
        other => panic!("expected an IfElse slot on the `if` pc, got {other:?}"),
    }
}

#[test]
fn else_arm_jumps_past_matching_end() {
    // i32.const 0; if {} else {}; end
    let ft = FuncType::new(vec![], vec![]);
    let instrs = [
        Instr::I32Const(0),
        Instr::If(BlockType::Empty),
        Instr::Else,
        Instr::End,
        Instr::End,
    ];
    let jt = validate_function(&ctx(), &ft, &[], &instrs, jump_flags()).unwrap();
    match jt.get(1) {
        Some(BranchInfo::IfElse(target)) => {
            assert_eq!(target.pc, 3, "if's false branch should skip the else marker itself")
        }
        other => panic!("expected an IfElse slot, got {other:?}"),
    }
    match jt.get(2) {
        Some(BranchInfo::ElseEnd(target)) => assert_eq!(target.pc, 4),
        other => panic!("expected an ElseEnd slot, got {other:?}"),
    }
}

#[test]
fn br_table_entries_resolve_independently() {
    // block { block { br_table 0 1 0 } }; end; end
    let ft = FuncType::new(vec![], vec![]);
    let instrs = [
        Instr::Block(BlockType::Empty),
        Instr::Block(BlockType::Empty),
        Instr::BrTable(Arc::from([0u32, 1u32]), 0u32),
        Instr::End,
        Instr::End,
        Instr::End,
    ];
    let jt = validate_function(&ctx(), &ft, &[], &instrs, jump_flags()).unwrap();
    match jt.get(2) {
        Some(BranchInfo::Table { targets, default }) => {
            assert_eq!(targets[0].pc, 4, "label 0 targets the inner block's end");
            assert_eq!(targets[1].pc, 5, "label 1 targets the outer block's end");
            assert_eq!(default.pc, 4);
        }
        other => panic!("expected a Table slot, got {other:?}"),
    }
}

#[test]
fn memory_instruction_checks_memory_index() {
    let ft = FuncType::new(vec![], vec![]);
    let instrs = [
        Instr::MemorySize(1), // only memory 0 exists
        Instr::Drop,
        Instr::End,
    ];
    let err = validate_function(&ctx(), &ft, &[], &instrs, jump_flags()).unwrap_err();
    assert_eq!(err, ValidationError::InvalidMemIndex(1));
}

#[test]
fn unclosed_block_is_rejected() {
    let ft = FuncType::new(vec![], vec![]);
    let instrs = [Instr::Block(BlockType::Empty)];
    let err = validate_function(&ctx(), &ft, &[], &instrs, jump_flags()).unwrap_err();
    assert_eq!(err, ValidationError::UnclosedBlock);
}

#[test]
fn const_expr_accepts_global_get_of_an_imported_immutable_global() {
    let ft = FuncType::new(vec![], vec![ValueType::I32]);
    let instrs = [Instr::GlobalGet(0), Instr::End];
    let ctx = StubCtx { memories: 1, globals: 1, num_imported_globals: 1 };
    let jt = validate_function(&ctx, &ft, &[], &instrs, const_expr_flags());
    assert!(jt.is_ok());
}

#[test]
fn const_expr_rejects_global_get_of_a_local_global() {
    let ft = FuncType::new(vec![], vec![ValueType::I32]);
    // global 0 is immutable, but it is a locally-defined global, not imported.
    let instrs = [Instr::GlobalGet(0), Instr::End];
    let ctx = StubCtx { memories: 1, globals: 1, num_imported_globals: 0 };
    let err = validate_function(&ctx, &ft, &[], &instrs, const_expr_flags()).unwrap_err();
    assert_eq!(err, ValidationError::ConstExprLocalGlobal(0));
}
