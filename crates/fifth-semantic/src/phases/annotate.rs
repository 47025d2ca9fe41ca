//! Type annotation
//!
//! Records the inferred type on every expression node. Nodes whose type is
//! already recorded are left alone, so annotating twice shares the whole tree.

use super::{walk_qualified, PhaseContext};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::infer::{TypeEnvironment, TypeInference};
use crate::program::ProgramIndex;
use fifth_ast::rewrite::{self, Rewriter, Rewritten};
use fifth_ast::*;
use fifth_types::{FifthType, HostTypeProvider};
use std::rc::Rc;

/// Initializer incompatible with the declared type
pub const TYPE_MISMATCH: &str = "E3001";

struct Annotator<'a, 'h> {
    inference: TypeInference<'h>,
    env: TypeEnvironment,
    class: Option<String>,
    diagnostics: &'a mut Diagnostics,
    check: bool,
}

fn typed(expr: ExprRef, ty: Option<FifthType>) -> ExprRef {
    match ty {
        Some(ty) if !ty.is_unknown() && expr.ty() != Some(&ty) => expr.with_type(ty),
        _ => expr,
    }
}

impl Annotator<'_, '_> {
    fn compatible(&self, value: &FifthType, declared: &FifthType) -> bool {
        if value.is_compatible_with(declared) {
            return true;
        }
        let host = self.inference.host();
        match (value.to_host(), declared.to_host()) {
            (Some(from), Some(to)) => host.is_assignable(&from, &to),
            _ => false,
        }
    }

    fn check_declaration(&mut self, stmt: &Stmt, declared: &FifthType, init: &Expr) {
        let Some(value) = init.ty() else {
            return;
        };
        if declared.is_unknown() || value.is_unknown() || self.compatible(value, declared) {
            return;
        }
        self.diagnostics.push(
            Diagnostic::error(format!(
                "Type mismatch: cannot assign '{}' to '{}'",
                value, declared
            ))
            .with_code(TYPE_MISMATCH)
            .at(stmt),
        );
    }
}

impl Rewriter for Annotator<'_, '_> {
    fn rewrite_class(&mut self, class: &Rc<ClassDef>) -> Rc<ClassDef> {
        self.class = Some(class.name.clone());
        let rewritten = rewrite::walk_class(self, class);
        self.class = None;
        rewritten
    }

    fn rewrite_function(&mut self, function: &Rc<FunctionDef>) -> Rc<FunctionDef> {
        self.env = TypeEnvironment::for_function(function, self.class.as_deref());
        rewrite::walk_function(self, function)
    }

    fn rewrite_block(&mut self, block: &Rc<Block>) -> Rc<Block> {
        self.env.push_scope();
        let rewritten = rewrite::walk_block(self, block);
        self.env.pop_scope();
        rewritten
    }

    fn rewrite_catch(&mut self, catch: &Rc<CatchClause>) -> Rc<CatchClause> {
        self.env.push_scope();
        if let Some(variable) = &catch.variable {
            let ty = FifthType::parse(catch.exception_type.as_deref().unwrap_or("System.Exception"));
            self.env.declare(variable, ty);
        }
        let rewritten = rewrite::walk_catch(self, catch);
        self.env.pop_scope();
        rewritten
    }

    fn rewrite_stmt(&mut self, stmt: &StmtRef) -> Rewritten<StmtRef> {
        let rewritten = rewrite::walk_stmt(self, stmt);
        if let StmtKind::VarDecl {
            name,
            type_name,
            init,
        } = &rewritten.node.kind
        {
            let declared = type_name.as_deref().map(FifthType::parse);
            if let (true, Some(declared), Some(init)) = (self.check, &declared, init) {
                self.check_declaration(&rewritten.node, declared, init);
            }
            let ty = declared
                .or_else(|| init.as_ref().and_then(|e| e.ty().cloned()))
                .unwrap_or_default();
            self.env.declare(name, ty);
        }
        rewritten
    }

    fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
        let rewritten = match &expr.kind {
            ExprKind::ListComprehension { var, source, .. } => {
                let element = self
                    .inference
                    .infer(source, &self.env)
                    .and_then(|ty| ty.element().cloned())
                    .unwrap_or_default();
                self.env.push_scope();
                self.env.declare(var, element);
                let rewritten = rewrite::walk_expr(self, expr);
                self.env.pop_scope();
                rewritten
            }
            ExprKind::MemberAccess { .. } => {
                let Rewritten { node, prologue } = walk_qualified(self, expr);
                let ty = self.inference.infer(&node, &self.env);
                // The member node carries the type of the access itself
                let retyped = match (&node.kind, &ty) {
                    (ExprKind::MemberAccess { lhs, rhs: Some(rhs) }, Some(member))
                        if rhs.ty() != Some(member) =>
                    {
                        Some(node.with_kind(ExprKind::MemberAccess {
                            lhs: lhs.clone(),
                            rhs: Some(rhs.with_type(member.clone())),
                        }))
                    }
                    _ => None,
                };
                let node = retyped.unwrap_or(node);
                return Rewritten::with_prologue(typed(node, ty), prologue);
            }
            _ => rewrite::walk_expr(self, expr),
        };
        let ty = self.inference.infer(&rewritten.node, &self.env);
        Rewritten::with_prologue(typed(rewritten.node, ty), rewritten.prologue)
    }
}

/// Annotate every expression; with `check`, also report declarations whose
/// initializer cannot be stored in the declared type
pub(super) fn annotate(ast: &Rc<AssemblyDef>, cx: &mut PhaseContext<'_>, check: bool) -> Rc<AssemblyDef> {
    let host: &dyn HostTypeProvider = cx.host;
    let mut annotator = Annotator {
        inference: TypeInference::new(ProgramIndex::build(ast), host),
        env: TypeEnvironment::new(),
        class: None,
        diagnostics: &mut *cx.diagnostics,
        check,
    };
    annotator.rewrite_assembly(ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifth_types::SignatureDb;

    fn run(program: &Rc<AssemblyDef>, check: bool) -> (Rc<AssemblyDef>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let annotated = {
            let mut cx = PhaseContext::new(SignatureDb::builtin().unwrap(), &mut diagnostics);
            annotate(program, &mut cx, check)
        };
        (annotated, diagnostics)
    }

    fn body_of(ast: &AssemblyDef) -> &[StmtRef] {
        &ast.modules[0].functions[0].body.statements
    }

    #[test]
    fn test_expressions_receive_types() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let half = b.literal(Literal::Double(0.5));
        let sum = b.binary(BinaryOp::Add, one, half);
        let decl = b.var_decl("x", None, Some(sum));
        let x = b.var("x");
        let ret = b.ret(Some(x));
        let body = b.block(vec![decl, ret]);
        let main = b.function("main", vec![], "double", body);
        let program = b.program(vec![main]);

        let (annotated, diagnostics) = run(&program, true);
        assert!(diagnostics.is_empty());
        let StmtKind::VarDecl { init: Some(init), .. } = &body_of(&annotated)[0].kind else {
            panic!("expected declaration");
        };
        assert_eq!(init.ty(), Some(&FifthType::DOUBLE));
        let StmtKind::Return(Some(x)) = &body_of(&annotated)[1].kind else {
            panic!("expected return");
        };
        assert_eq!(x.ty(), Some(&FifthType::DOUBLE));
    }

    #[test]
    fn test_annotation_is_idempotent() {
        let mut b = AstBuilder::new();
        let greeting = b.string("hi");
        let decl = b.var_decl("s", Some("string"), Some(greeting));
        let body = b.block(vec![decl]);
        let main = b.function("main", vec![], "void", body);
        let program = b.program(vec![main]);

        let (once, _) = run(&program, true);
        let (twice, _) = run(&once, false);
        assert!(!Rc::ptr_eq(&once, &program));
        assert!(Rc::ptr_eq(&once, &twice));
    }

    #[test]
    fn test_mismatched_initializer_is_an_error() {
        let mut b = AstBuilder::new();
        let text = b.string("nope");
        let decl = b.var_decl("n", Some("int"), Some(text));
        let body = b.block(vec![decl]);
        let main = b.function("main", vec![], "void", body);
        let program = b.program(vec![main]);

        let (_, diagnostics) = run(&program, true);
        assert!(diagnostics.contains_code(TYPE_MISMATCH));
        assert_eq!(
            diagnostics.iter().next().unwrap().message,
            "Type mismatch: cannot assign 'string' to 'int'"
        );

        // The final pass only types nodes
        let (_, diagnostics) = run(&program, false);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_widening_is_accepted() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let decl = b.var_decl("d", Some("double"), Some(one));
        let body = b.block(vec![decl]);
        let main = b.function("main", vec![], "void", body);
        let program = b.program(vec![main]);

        let (_, diagnostics) = run(&program, true);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_host_call_is_typed() {
        let mut b = AstBuilder::new();
        let math = b.var("Math");
        let two = b.literal(Literal::Double(2.0));
        let sqrt = b.call("Sqrt", vec![two]);
        let access = b.member(math, sqrt);
        let ret = b.ret(Some(access));
        let body = b.block(vec![ret]);
        let main = b.function("main", vec![], "double", body);
        let program = b.program(vec![main]);

        let (annotated, _) = run(&program, true);
        let StmtKind::Return(Some(access)) = &body_of(&annotated)[0].kind else {
            panic!("expected return");
        };
        assert_eq!(access.ty(), Some(&FifthType::DOUBLE));
    }
}
