//! `for` loops become `while` loops

use super::builder_for;
use fifth_ast::rewrite::{self, Rewriter, Rewritten};
use fifth_ast::*;
use std::rc::Rc;

struct ForLowering {
    builder: AstBuilder,
}

impl Rewriter for ForLowering {
    fn rewrite_stmt(&mut self, stmt: &StmtRef) -> Rewritten<StmtRef> {
        let Rewritten { node, prologue } = rewrite::walk_stmt(self, stmt);
        let StmtKind::For {
            init,
            cond,
            step,
            body,
        } = &node.kind
        else {
            return Rewritten::with_prologue(node, prologue);
        };

        let b = &mut self.builder;
        b.set_location(node.location().cloned());
        let cond = match cond {
            Some(cond) => cond.clone(),
            None => b.bool(true),
        };
        let mut statements = body.statements.clone();
        statements.extend(step.iter().cloned());
        let looped = b.while_loop(cond, body.with_statements(statements));

        let mut outer: Vec<StmtRef> = init.iter().cloned().collect();
        outer.push(looped);
        let scope = b.block(outer);
        Rewritten::with_prologue(node.with_kind(StmtKind::Block(scope)), prologue)
    }
}

pub(super) fn lower(ast: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
    ForLowering {
        builder: builder_for(ast),
    }
    .rewrite_assembly(ast)
}
