//! Name resolution for variable references and free calls

use super::{bind_call, walk_qualified, PhaseContext};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::linkage::ParentMap;
use crate::program::ProgramIndex;
use crate::symbols::SymbolTable;
use fifth_ast::rewrite::{self, Rewriter, Rewritten};
use fifth_ast::*;
use fifth_types::{HostType, HostTypeProvider};
use std::rc::Rc;

/// Unresolved variable or function
pub const UNRESOLVED_SYMBOL: &str = "E2001";

struct Resolver<'a> {
    host: &'a dyn HostTypeProvider,
    parents: &'a ParentMap,
    symbols: &'a SymbolTable,
    diagnostics: &'a mut Diagnostics,
    program: ProgramIndex,
    class: Option<String>,
}

impl Resolver<'_> {
    fn is_type_name(&self, name: &str) -> bool {
        name.starts_with(|c: char| c.is_ascii_uppercase())
            && (self.program.has_class(name) || self.host.find_type(name).is_some())
    }

    fn unresolved(&mut self, what: &str, name: &str, node: &Expr) {
        self.diagnostics.push(
            Diagnostic::error(format!("Unresolved symbol '{}'", name))
                .with_code(UNRESOLVED_SYMBOL)
                .at(node)
                .with_note(format!("no {} named '{}' is in scope", what, name)),
        );
    }

    fn builtin_host(&self, name: &str) -> Option<HostType> {
        self.host
            .builtin_hosts()
            .iter()
            .find(|host| !self.host.lookup(host, name).is_empty())
            .cloned()
    }

    /// Bind a free call, or report it
    fn bind(&mut self, expr: &ExprRef, name: &str, args: &[ExprRef]) -> ExprRef {
        if self.program.has_function(name) {
            return bind_call(expr, CallTarget::Function);
        }
        let in_class = self
            .class
            .as_deref()
            .and_then(|class| self.program.class(class))
            .is_some_and(|class| class.methods.contains_key(name));
        if in_class {
            let class = self.class.clone().unwrap_or_default();
            return bind_call(expr, CallTarget::Method { class });
        }
        if self.program.has_class(name) && args.is_empty() {
            return expr.with_kind(ExprKind::ObjectInit {
                type_name: name.to_string(),
                properties: Vec::new(),
            });
        }
        if let Some(host) = self.builtin_host(name) {
            return bind_call(expr, CallTarget::External { host });
        }
        self.unresolved("function", name, expr);
        expr.clone()
    }
}

impl Rewriter for Resolver<'_> {
    fn rewrite_class(&mut self, class: &Rc<ClassDef>) -> Rc<ClassDef> {
        self.class = Some(class.name.clone());
        let rewritten = rewrite::walk_class(self, class);
        self.class = None;
        rewritten
    }

    fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
        match &expr.kind {
            ExprKind::VarRef(name) => {
                let bound = self.symbols.resolve_at(name, expr.id(), self.parents).is_some();
                if !bound && !self.is_type_name(name) {
                    self.unresolved("variable", name, expr);
                }
                Rewritten::new(expr.clone())
            }
            ExprKind::Call {
                name,
                args,
                target: CallTarget::Unresolved,
            } => {
                let rewritten = rewrite::walk_expr(self, expr);
                let node = self.bind(&rewritten.node, name, args);
                Rewritten::with_prologue(node, rewritten.prologue)
            }
            _ => walk_qualified(self, expr),
        }
    }
}

pub(super) fn resolve(ast: &Rc<AssemblyDef>, cx: &mut PhaseContext<'_>) -> Rc<AssemblyDef> {
    let mut resolver = Resolver {
        host: cx.host,
        parents: &cx.parents,
        symbols: &cx.symbols,
        diagnostics: &mut *cx.diagnostics,
        program: ProgramIndex::build(ast),
        class: None,
    };
    let resolved = resolver.rewrite_assembly(ast);
    tracing::debug!(errors = cx.diagnostics.len(), "resolved references");
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifth_types::SignatureDb;

    fn run(program: &Rc<AssemblyDef>) -> (Rc<AssemblyDef>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let resolved = {
            let mut cx = PhaseContext::new(SignatureDb::builtin().unwrap(), &mut diagnostics);
            cx.parents = ParentMap::build(program);
            cx.symbols = SymbolTable::build(program, cx.diagnostics);
            resolve(program, &mut cx)
        };
        (resolved, diagnostics)
    }

    #[test]
    fn test_unknown_variable_is_reported() {
        let mut b = AstBuilder::new();
        let x = b.var("x");
        let ret = b.ret(Some(x));
        let body = b.block(vec![ret]);
        let main = b.function("main", vec![], "int", body);
        let program = b.program(vec![main]);

        let (_, diagnostics) = run(&program);
        assert!(diagnostics.has_errors());
        assert!(diagnostics.contains_code(UNRESOLVED_SYMBOL));
        assert_eq!(
            diagnostics.iter().next().unwrap().message,
            "Unresolved symbol 'x'"
        );
    }

    #[test]
    fn test_calls_are_bound() {
        let mut b = AstBuilder::new();
        let body = b.block(vec![]);
        let helper = b.function("helper", vec![], "void", body);
        let class = b.class("Person", vec![], vec![], vec![]);

        let call = b.call("helper", vec![]);
        let first = b.expr_stmt(call);
        let make = b.call("Person", vec![]);
        let decl = b.var_decl("p", Some("Person"), Some(make));
        let body = b.block(vec![first, decl]);
        let main = b.function("main", vec![], "void", body);
        let module = b.module("main", vec![class], vec![helper, main]);
        let program = b.assembly("program", vec![module]);

        let (resolved, diagnostics) = run(&program);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let statements = &resolved.modules[0].functions[1].body.statements;
        let StmtKind::Expr(call) = &statements[0].kind else {
            panic!("expected call statement");
        };
        assert!(matches!(&call.kind, ExprKind::Call { target: CallTarget::Function, .. }));
        let StmtKind::VarDecl { init: Some(init), .. } = &statements[1].kind else {
            panic!("expected declaration");
        };
        assert!(matches!(&init.kind, ExprKind::ObjectInit { type_name, .. } if type_name == "Person"));
    }

    #[test]
    fn test_type_qualifiers_and_member_names_pass() {
        let mut b = AstBuilder::new();
        let math = b.var("Math");
        let two = b.literal(Literal::Double(2.0));
        let sqrt = b.call("Sqrt", vec![two]);
        let access = b.member(math, sqrt);
        let ret = b.ret(Some(access));
        let body = b.block(vec![ret]);
        let main = b.function("main", vec![], "double", body);
        let program = b.program(vec![main]);

        let (_, diagnostics) = run(&program);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_unknown_function_is_reported() {
        let mut b = AstBuilder::new();
        let call = b.call("nowhere", vec![]);
        let stmt = b.expr_stmt(call);
        let body = b.block(vec![stmt]);
        let main = b.function("main", vec![], "void", body);
        let program = b.program(vec![main]);

        let (_, diagnostics) = run(&program);
        assert_eq!(diagnostics.count(crate::diagnostic::Severity::Error), 1);
    }
}
