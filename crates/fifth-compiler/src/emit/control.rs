//! Conditionals and loops
//!
//! Labels come from the function-wide counter in the emit context, so
//! nested constructs never collide and numbering never restarts inside a
//! function.

use super::Emitter;
use fifth_ast::{Block, Expr, Stmt};
use fifth_il::{BranchKind, Instruction, InstructionSequence};

fn terminates(seq: &InstructionSequence) -> bool {
    seq.last().is_some_and(Instruction::is_terminator)
}

impl Emitter<'_, '_> {
    /// ```text
    ///     <cond>
    ///     brfalse IL_false_n
    ///     <then>
    ///     br IL_end_m          ; omitted when <then> ends in ret or br
    /// IL_false_n:
    ///     <else>
    /// IL_end_m:                ; omitted when both branches end in ret or br
    /// ```
    pub(super) fn if_else(
        &mut self,
        cond: &Expr,
        then_block: &Block,
        else_block: Option<&Block>,
    ) -> InstructionSequence {
        let otherwise = self.cx.label("IL_false");
        let end = self.cx.label("IL_end");

        let mut seq = self.expression(cond);
        seq.push(Instruction::branch(BranchKind::IfFalse, &otherwise));

        let then_seq = self.block(then_block);
        let then_terminates = terminates(&then_seq);
        seq.append(then_seq);

        let else_seq = else_block.map(|block| self.block(block));
        let else_terminates = else_seq.as_ref().is_some_and(terminates);
        if else_seq.is_some() && !then_terminates {
            seq.push(Instruction::branch(BranchKind::Always, &end));
        }

        seq.push(Instruction::Label(otherwise));
        if let Some(else_seq) = else_seq {
            seq.append(else_seq);
        }
        if !(then_terminates && else_terminates) {
            seq.push(Instruction::Label(end));
        }
        seq
    }

    /// ```text
    /// IL_while_start_n:
    ///     <cond>
    ///     brfalse IL_while_end_m
    ///     <body>
    ///     <step>
    ///     br IL_while_start_n
    /// IL_while_end_m:
    /// ```
    ///
    /// Without a condition the loop only ends through `ret`.
    pub(super) fn while_loop(
        &mut self,
        cond: Option<&Expr>,
        body: &Block,
        step: Option<&Stmt>,
    ) -> InstructionSequence {
        let start = self.cx.label("IL_while_start");
        let end = self.cx.label("IL_while_end");

        let mut seq = InstructionSequence::new();
        seq.push(Instruction::Label(start.clone()));
        if let Some(cond) = cond {
            seq.append(self.expression(cond));
            seq.push(Instruction::branch(BranchKind::IfFalse, &end));
        }
        seq.append(self.block(body));
        if let Some(step) = step {
            seq.append(self.statement(step));
        }
        seq.push(Instruction::branch(BranchKind::Always, &start));
        seq.push(Instruction::Label(end));
        seq
    }
}

#[cfg(test)]
mod tests {
    use crate::emit::Emitter;
    use fifth_ast::*;
    use fifth_il::{Instruction, InstructionSequence};
    use fifth_semantic::{ProgramIndex, TypeInference};
    use fifth_types::SignatureDb;
    use pretty_assertions::assert_eq;

    fn labels(seq: &InstructionSequence) -> Vec<String> {
        seq.iter()
            .filter_map(|i| match i {
                Instruction::Label(label) => Some(label.name().to_string()),
                _ => None,
            })
            .collect()
    }

    fn emit(function: &FunctionDef) -> InstructionSequence {
        let host = SignatureDb::builtin().expect("signatures");
        let mut b = AstBuilder::new();
        let program = b.program(vec![]);
        let inference = TypeInference::new(ProgramIndex::build(&program), host);
        Emitter::new(&inference).function(function, None).body
    }

    #[test]
    fn test_nested_labels_are_unique() {
        // f(n: int): int { while (n > 0) { if (n == 3) { return n; } n = n - 1; } return 0; }
        let mut b = AstBuilder::new();
        let n = b.var("n");
        let three = b.int(3);
        let is_three = b.binary(BinaryOp::Eq, n, three);
        let n = b.var("n");
        let ret = b.ret(Some(n));
        let then_block = b.block(vec![ret]);
        let check = b.if_else(is_three, then_block, None);
        let n = b.var("n");
        let n2 = b.var("n");
        let one = b.int(1);
        let less = b.binary(BinaryOp::Sub, n2, one);
        let dec = b.assign(n, less);
        let body = b.block(vec![check, dec]);
        let n = b.var("n");
        let zero = b.int(0);
        let positive = b.binary(BinaryOp::Gt, n, zero);
        let looped = b.while_loop(positive, body);
        let zero = b.int(0);
        let ret = b.ret(Some(zero));
        let body = b.block(vec![looped, ret]);
        let param = b.param("n", "int");
        let f = b.function("f", vec![param], "int", body);

        let seq = emit(&f);
        assert_eq!(
            labels(&seq),
            ["IL_while_start_0", "IL_false_2", "IL_end_3", "IL_while_end_1"]
        );
        assert_eq!(seq.net_stack_effect(), 0);
    }

    #[test]
    fn test_end_label_skipped_when_both_branches_return() {
        let mut b = AstBuilder::new();
        let cond = b.bool(true);
        let one = b.int(1);
        let ret_one = b.ret(Some(one));
        let then_block = b.block(vec![ret_one]);
        let two = b.int(2);
        let ret_two = b.ret(Some(two));
        let else_block = b.block(vec![ret_two]);
        let branch = b.if_else(cond, then_block, Some(else_block));
        let body = b.block(vec![branch]);
        let f = b.function("f", vec![], "int", body);

        let seq = emit(&f);
        assert_eq!(labels(&seq), ["IL_false_0"]);
        assert!(!seq.iter().any(|i| matches!(
            i,
            Instruction::Branch(fifth_il::Branch {
                kind: fifth_il::BranchKind::Always,
                ..
            })
        )));
        assert!(matches!(seq.last(), Some(Instruction::Return { value: true })));
    }
}
