//! Binding of unqualified calls to standard library routines

use super::{bind_call, walk_qualified, PhaseContext};
use crate::program::ProgramIndex;
use fifth_ast::rewrite::{self, Rewriter, Rewritten};
use fifth_ast::*;
use fifth_types::{HostType, HostTypeProvider};
use std::rc::Rc;

struct BuiltinInjector<'a> {
    host: &'a dyn HostTypeProvider,
    program: ProgramIndex,
    class: Option<String>,
}

impl BuiltinInjector<'_> {
    fn is_user_callable(&self, name: &str) -> bool {
        self.program.has_function(name)
            || self.program.has_class(name)
            || self
                .class
                .as_deref()
                .and_then(|class| self.program.class(class))
                .is_some_and(|class| class.methods.contains_key(name))
    }

    fn builtin_host(&self, name: &str) -> Option<HostType> {
        self.host
            .builtin_hosts()
            .iter()
            .find(|host| !self.host.lookup(host, name).is_empty())
            .cloned()
    }
}

impl Rewriter for BuiltinInjector<'_> {
    fn rewrite_class(&mut self, class: &Rc<ClassDef>) -> Rc<ClassDef> {
        self.class = Some(class.name.clone());
        let rewritten = rewrite::walk_class(self, class);
        self.class = None;
        rewritten
    }

    fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
        match &expr.kind {
            ExprKind::Call {
                name,
                target: CallTarget::Unresolved,
                ..
            } if !self.is_user_callable(name) => {
                let host = self.builtin_host(name);
                let rewritten = rewrite::walk_expr(self, expr);
                match host {
                    Some(host) => {
                        tracing::trace!(call = %name, %host, "bound builtin");
                        let node = bind_call(&rewritten.node, CallTarget::External { host });
                        Rewritten::with_prologue(node, rewritten.prologue)
                    }
                    None => rewritten,
                }
            }
            _ => walk_qualified(self, expr),
        }
    }
}

pub(super) fn inject(ast: &Rc<AssemblyDef>, cx: &PhaseContext<'_>) -> Rc<AssemblyDef> {
    BuiltinInjector {
        host: cx.host,
        program: ProgramIndex::build(ast),
        class: None,
    }
    .rewrite_assembly(ast)
}
