//! Statements

use super::Emitter;
use fifth_ast::{AstNode, Block, Expr, ExprKind, Stmt, StmtKind};
use fifth_il::{Instruction, InstructionSequence, StackOp, Store};
use fifth_semantic::Qualifier;
use fifth_types::FifthType;

impl Emitter<'_, '_> {
    /// Emit `stmt`; the stack depth is the same before and after
    pub fn statement(&mut self, stmt: &Stmt) -> InstructionSequence {
        match &stmt.kind {
            StmtKind::VarDecl {
                name,
                type_name,
                init,
            } => {
                let declared = type_name
                    .as_deref()
                    .map(FifthType::parse)
                    .filter(|ty| !ty.is_unknown());
                let ty = declared
                    .or_else(|| init.as_ref().map(|e| self.type_of(e)))
                    .unwrap_or_default();
                // The initializer sees the scope before the declaration
                let value = init.as_ref().map(|e| (self.il_type_of(e), self.expression(e)));
                self.cx.declare_local(name, ty);
                match value {
                    Some((value_ty, value)) => self.store_name(name, value, &value_ty),
                    None => InstructionSequence::new(),
                }
            }
            StmtKind::Assign { target, value } => self.assign(target, value),
            StmtKind::CompoundAssign { target, op, value } => {
                let combined = value.with_kind(ExprKind::Binary {
                    op: *op,
                    lhs: target.clone(),
                    rhs: value.clone(),
                });
                let combined = match target.ty() {
                    Some(ty) => combined.with_type(ty.clone()),
                    None => combined,
                };
                self.assign(target, &combined)
            }
            StmtKind::Expr(expr) => self.expression_statement(expr),
            StmtKind::Return(value) => {
                let mut seq = InstructionSequence::new();
                match value {
                    Some(value) => {
                        let value_ty = self.il_type_of(value);
                        let returns = self.types.il_type(self.cx.return_type());
                        seq.append(self.expression(value));
                        self.coerce(&value_ty, &returns, &mut seq);
                        seq.push(Instruction::Return { value: true });
                    }
                    None => seq.push(Instruction::Return { value: false }),
                }
                seq
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => self.if_else(cond, then_block, else_block.as_deref()),
            StmtKind::While { cond, body } => self.while_loop(Some(cond.as_ref()), body, None),
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.cx.push_scope();
                let mut seq = InstructionSequence::new();
                if let Some(init) = init {
                    seq.append(self.statement(init));
                }
                seq.append(self.while_loop(cond.as_deref(), body, step.as_deref()));
                self.cx.pop_scope();
                seq
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::Try { body, finally, .. } => {
                // Handlers have no encoding yet; the protected block and the
                // finally block run in sequence
                let mut seq = self.block(body);
                if let Some(finally) = finally {
                    seq.append(self.block(finally));
                }
                seq
            }
        }
    }

    /// Statements of `block` in a scope of their own
    pub fn block(&mut self, block: &Block) -> InstructionSequence {
        self.cx.push_scope();
        let mut seq = InstructionSequence::new();
        for stmt in &block.statements {
            seq.append(self.statement(stmt));
        }
        self.cx.pop_scope();
        seq
    }

    /// Evaluate for effect; the result is dropped unless the call is void
    fn expression_statement(&mut self, expr: &Expr) -> InstructionSequence {
        let mut seq = self.expression(expr);
        let void = seq.last().is_some_and(Instruction::is_void_call);
        if !void && !seq.is_empty() {
            seq.push(Instruction::Stack(StackOp::Pop));
        }
        seq
    }

    fn assign(&mut self, target: &Expr, value: &Expr) -> InstructionSequence {
        let value_ty = self.il_type_of(value);
        match &target.kind {
            ExprKind::VarRef(name) => {
                let value = self.expression(value);
                self.store_name(name, value, &value_ty)
            }
            ExprKind::MemberAccess {
                lhs,
                rhs: Some(member),
            } => {
                let Some(member) = member.var_name() else {
                    return self.discard(value, "assignment to a call result");
                };
                if self.names_type(lhs) {
                    let inference = self.inference;
                    let field = match inference.qualifier(lhs, self.cx.env()) {
                        Qualifier::HostType(host) => Some(self.field_ref(&FifthType::Host(host), member)),
                        Qualifier::Class(class) => Some(self.field_ref(&FifthType::Named(class), member)),
                        Qualifier::Value(_) => None,
                    };
                    if let Some(field) = field {
                        let mut seq = self.expression(value);
                        self.coerce(&value_ty, &field.ty, &mut seq);
                        seq.push(Instruction::Store(Store::StaticField(field)));
                        return seq;
                    }
                }
                let receiver = self.type_of(lhs);
                let field = self.field_ref(&receiver, member);
                let mut seq = self.expression(lhs);
                seq.append(self.expression(value));
                self.coerce(&value_ty, &field.ty, &mut seq);
                seq.push(Instruction::Store(Store::Field(field)));
                seq
            }
            _ => self.discard(value, "assignment to a non-assignable target"),
        }
    }

    /// Evaluate `value` and drop it
    fn discard(&mut self, value: &Expr, why: &str) -> InstructionSequence {
        tracing::warn!(function = %self.cx.function(), why, "value discarded");
        let mut seq = self.expression(value);
        seq.push(Instruction::Stack(StackOp::Pop));
        seq
    }
}
