//! Validation of calls into the host runtime
//!
//! Runs after type annotation, so every expression that denotes a value
//! carries a type. An untyped capitalized qualifier therefore names a type.

use super::{bind_call, walk_qualified, PhaseContext};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::program::ProgramIndex;
use crate::resolve::MethodResolver;
use fifth_ast::rewrite::{self, Rewriter, Rewritten};
use fifth_ast::*;
use fifth_types::{FifthType, HostType, HostTypeProvider};
use std::rc::Rc;

/// Qualifier names no known type
pub const UNKNOWN_EXTERNAL_TYPE: &str = "E3002";
/// No host overload accepts the arguments
pub const NO_MATCHING_OVERLOAD: &str = "W3101";

struct ExternalValidator<'a> {
    host: &'a dyn HostTypeProvider,
    resolver: MethodResolver<'a>,
    program: ProgramIndex,
    diagnostics: &'a mut Diagnostics,
}

impl ExternalValidator<'_> {
    fn check_overload(&mut self, host: &HostType, call: &Expr, name: &str, args: &[ExprRef]) {
        let types: Vec<FifthType> = args.iter().map(|a| a.ty().cloned().unwrap_or_default()).collect();
        if self.resolver.resolve_with_types(host, name, &types, None).is_some() {
            return;
        }
        let rendered: Vec<String> = types.iter().map(ToString::to_string).collect();
        self.diagnostics.push(
            Diagnostic::warning(format!(
                "No overload of '{}.{}' accepts ({})",
                host,
                name,
                rendered.join(", ")
            ))
            .with_code(NO_MATCHING_OVERLOAD)
            .at(call)
            .with_note("the first declared overload is called instead"),
        );
    }

    /// `Host.name(args)` bound to `host`, unless it already is
    fn bind_member(&mut self, node: &ExprRef, host: HostType) -> Option<ExprRef> {
        let ExprKind::MemberAccess { lhs, rhs: Some(rhs) } = &node.kind else {
            return None;
        };
        let ExprKind::Call { name, args, target } = &rhs.kind else {
            return None;
        };
        self.check_overload(&host, rhs, name, args);
        if matches!(target, CallTarget::External { host: bound } if *bound == host) {
            return None;
        }
        tracing::trace!(call = %name, %host, "bound qualified host call");
        Some(node.with_kind(ExprKind::MemberAccess {
            lhs: lhs.clone(),
            rhs: Some(bind_call(rhs, CallTarget::External { host })),
        }))
    }

    /// Host type named by an untyped capitalized qualifier
    fn qualifier_host(&mut self, lhs: &Expr) -> Option<HostType> {
        let name = lhs.var_name()?;
        if lhs.ty().is_some() || !name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return None;
        }
        if self.program.has_class(name) {
            return None;
        }
        match self.host.find_type(name) {
            Some(info) => Some(info.name.clone()),
            None => {
                self.diagnostics.push(
                    Diagnostic::error(format!("Unknown external type '{}'", name))
                        .with_code(UNKNOWN_EXTERNAL_TYPE)
                        .at(lhs),
                );
                None
            }
        }
    }
}

impl Rewriter for ExternalValidator<'_> {
    fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
        match &expr.kind {
            ExprKind::MemberAccess { lhs, rhs: Some(_) } => {
                let host = self.qualifier_host(lhs);
                let Rewritten { node, prologue } = walk_qualified(self, expr);
                let bound = host.and_then(|host| self.bind_member(&node, host));
                Rewritten::with_prologue(bound.unwrap_or(node), prologue)
            }
            ExprKind::Call {
                name,
                args,
                target: CallTarget::External { host },
            } => {
                let rewritten = rewrite::walk_expr(self, expr);
                if self.host.type_info(host).is_none() {
                    self.diagnostics.push(
                        Diagnostic::error(format!("Unknown external type '{}'", host))
                            .with_code(UNKNOWN_EXTERNAL_TYPE)
                            .at(&**expr),
                    );
                } else {
                    self.check_overload(host, expr, name, args);
                }
                rewritten
            }
            _ => walk_qualified(self, expr),
        }
    }
}

pub(super) fn validate(ast: &Rc<AssemblyDef>, cx: &mut PhaseContext<'_>) -> Rc<AssemblyDef> {
    let host: &dyn HostTypeProvider = cx.host;
    ExternalValidator {
        host,
        resolver: MethodResolver::new(host),
        program: ProgramIndex::build(ast),
        diagnostics: &mut *cx.diagnostics,
    }
    .rewrite_assembly(ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifth_types::SignatureDb;

    fn run(program: &Rc<AssemblyDef>) -> (Rc<AssemblyDef>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let validated = {
            let mut cx = PhaseContext::new(SignatureDb::builtin().unwrap(), &mut diagnostics);
            validate(program, &mut cx)
        };
        (validated, diagnostics)
    }

    fn qualified(b: &mut AstBuilder, qualifier: &str, method: &str, args: Vec<ExprRef>) -> Rc<AssemblyDef> {
        let q = b.var(qualifier);
        let call = b.call(method, args);
        let access = b.member(q, call);
        let stmt = b.expr_stmt(access);
        let body = b.block(vec![stmt]);
        let main = b.function("main", vec![], "void", body);
        b.program(vec![main])
    }

    #[test]
    fn test_unknown_qualifier_is_an_error() {
        let mut b = AstBuilder::new();
        let program = qualified(&mut b, "Nowhere", "Go", vec![]);
        let (_, diagnostics) = run(&program);
        assert!(diagnostics.has_errors());
        assert!(diagnostics.contains_code(UNKNOWN_EXTERNAL_TYPE));
    }

    #[test]
    fn test_host_call_is_bound() {
        let mut b = AstBuilder::new();
        let x = b.literal(Literal::Double(4.0)).with_type(FifthType::DOUBLE);
        let program = qualified(&mut b, "Math", "Sqrt", vec![x]);
        let (validated, diagnostics) = run(&program);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let StmtKind::Expr(access) = &validated.modules[0].functions[0].body.statements[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::MemberAccess { rhs: Some(call), .. } = &access.kind else {
            panic!("expected member access");
        };
        assert!(matches!(
            &call.kind,
            ExprKind::Call { target: CallTarget::External { host }, .. } if host.name() == "System.Math"
        ));
    }

    #[test]
    fn test_unmatched_overload_is_a_warning() {
        let mut b = AstBuilder::new();
        let text = b.string("four").with_type(FifthType::STRING);
        let program = qualified(&mut b, "Math", "Sqrt", vec![text]);
        let (_, diagnostics) = run(&program);
        assert!(!diagnostics.has_errors());
        assert!(diagnostics.contains_code(NO_MATCHING_OVERLOAD));
    }
}
