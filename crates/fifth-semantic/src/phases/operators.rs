//! Compound assignment and unary operator lowering

use super::graphs::kg_call;
use super::{builder_for, duplicate};
use fifth_ast::rewrite::{self, Rewriter, Rewritten};
use fifth_ast::*;
use fifth_types::{FifthType, HostType};
use std::rc::Rc;

struct CompoundLowering {
    builder: AstBuilder,
}

impl Rewriter for CompoundLowering {
    fn rewrite_stmt(&mut self, stmt: &StmtRef) -> Rewritten<StmtRef> {
        let Rewritten { node, prologue } = rewrite::walk_stmt(self, stmt);
        let StmtKind::CompoundAssign { target, op, value } = &node.kind else {
            return Rewritten::with_prologue(node, prologue);
        };

        let b = &mut self.builder;
        b.set_location(node.location().cloned());
        let graph_target = target.ty().is_some_and(FifthType::is_graph);
        let kind = match value.ty() {
            Some(ty) if graph_target && *op == BinaryOp::Add && (ty.is_triple() || ty.is_graph()) => {
                let method = if ty.is_triple() { "Assert" } else { "Merge" };
                let graph = FifthType::Host(HostType::graph());
                let call = kg_call(b, method, vec![target.clone(), value.clone()], graph);
                StmtKind::Expr(call)
            }
            _ => {
                let current = duplicate(target, b);
                let combined = b.binary(*op, current, value.clone());
                StmtKind::Assign {
                    target: target.clone(),
                    value: combined,
                }
            }
        };
        Rewritten::with_prologue(node.with_kind(kind), prologue)
    }
}

/// `x op= e` becomes `x = x op e`, or a graph call on graph targets
pub(super) fn lower_compound(ast: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
    CompoundLowering {
        builder: builder_for(ast),
    }
    .rewrite_assembly(ast)
}

struct UnaryLowering {
    builder: AstBuilder,
}

impl Rewriter for UnaryLowering {
    fn rewrite_stmt(&mut self, stmt: &StmtRef) -> Rewritten<StmtRef> {
        let Rewritten { node, prologue } = rewrite::walk_stmt(self, stmt);
        let StmtKind::Expr(expr) = &node.kind else {
            return Rewritten::with_prologue(node, prologue);
        };
        let ExprKind::Unary { op, operand } = &expr.kind else {
            return Rewritten::with_prologue(node, prologue);
        };
        let step = match op {
            UnaryOp::Increment => Some(BinaryOp::Add),
            UnaryOp::Decrement => Some(BinaryOp::Sub),
            _ => None,
        };
        let Some(step) = step else {
            return Rewritten::with_prologue(node, prologue);
        };

        let b = &mut self.builder;
        b.set_location(node.location().cloned());
        let current = duplicate(operand, b);
        let one = b.int(1);
        let value = b.binary(step, current, one);
        let assign = node.with_kind(StmtKind::Assign {
            target: operand.clone(),
            value,
        });
        Rewritten::with_prologue(assign, prologue)
    }

    fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
        let rewritten = rewrite::walk_expr(self, expr);
        match &rewritten.node.kind {
            ExprKind::Unary {
                op: UnaryOp::Plus,
                operand,
            } => Rewritten::with_prologue(operand.clone(), rewritten.prologue),
            _ => rewritten,
        }
    }
}

/// `x++`/`x--` statements become assignments; unary plus disappears
pub(super) fn lower_unary(ast: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
    UnaryLowering {
        builder: builder_for(ast),
    }
    .rewrite_assembly(ast)
}
