//! Destructuring parameters become local declarations
//!
//! `p: Person { a: age | a > 0 }` turns into a plain parameter `p` guarded by
//! `p.age > 0`, and the body opens with `a: int = p.age;`.

use super::{builder_for, walk_qualified};
use fifth_ast::rewrite::{self, Rewriter, Rewritten};
use fifth_ast::*;
use rustc_hash::FxHashMap;
use std::rc::Rc;

struct Destructure<'a> {
    builder: AstBuilder,
    classes: FxHashMap<&'a str, &'a ClassDef>,
}

impl Destructure<'_> {
    fn member_type(&self, class: &str, property: &str) -> Option<&str> {
        self.classes.get(class)?.member_type(property)
    }

    /// Binding variables rewritten to reads of the parameter's property
    fn project(&mut self, param: &ParamDef, expr: &ExprRef) -> ExprRef {
        struct Project<'p> {
            param: &'p ParamDef,
            builder: &'p mut AstBuilder,
        }

        impl Rewriter for Project<'_> {
            fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
                if let ExprKind::VarRef(name) = &expr.kind {
                    let bound = self
                        .param
                        .destructuring
                        .iter()
                        .flatten()
                        .find(|binding| &binding.variable == name);
                    if let Some(binding) = bound {
                        self.builder.set_location(expr.location().cloned());
                        let receiver = self.builder.var(self.param.name.clone());
                        let access = self.builder.field_access(receiver, binding.property.clone());
                        return Rewritten::new(access);
                    }
                }
                walk_qualified(self, expr)
            }
        }

        Project {
            param,
            builder: &mut self.builder,
        }
        .rewrite_expr(expr)
        .node
    }
}

impl Rewriter for Destructure<'_> {
    fn rewrite_function(&mut self, function: &Rc<FunctionDef>) -> Rc<FunctionDef> {
        if function.params.iter().all(|p| p.destructuring.is_none()) {
            return function.clone();
        }

        let mut prologue = Vec::new();
        let mut params = Vec::with_capacity(function.params.len());
        for param in &function.params {
            let Some(bindings) = &param.destructuring else {
                params.push(param.clone());
                continue;
            };

            let mut guard = param.guard.clone();
            for binding in bindings {
                self.builder.set_location(binding.location().cloned());
                let receiver = self.builder.var(param.name.clone());
                let init = self.builder.field_access(receiver, binding.property.clone());
                let type_name = self
                    .member_type(&param.type_name, &binding.property)
                    .map(str::to_string);
                prologue.push(self.builder.var_decl(
                    binding.variable.clone(),
                    type_name.as_deref(),
                    Some(init),
                ));

                if let Some(constraint) = &binding.constraint {
                    let constraint = self.project(param, constraint);
                    guard = Some(match guard {
                        Some(previous) => self.builder.binary(BinaryOp::And, previous, constraint),
                        None => constraint,
                    });
                }
            }
            tracing::trace!(
                function = %function.name,
                param = %param.name,
                bindings = bindings.len(),
                "lowered destructuring"
            );
            params.push(param.without_destructuring().with_guard(guard));
        }

        let body = rewrite::walk_block(self, &function.body);
        prologue.extend(body.statements.iter().cloned());
        function
            .with_params(params)
            .with_body(body.with_statements(prologue))
    }
}

pub(super) fn lower(ast: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
    let classes = ast.classes().map(|c| (c.name.as_str(), &**c)).collect();
    Destructure {
        builder: builder_for(ast),
        classes,
    }
    .rewrite_assembly(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_become_declarations() {
        let mut b = AstBuilder::new();
        let age = b.field("age", "int");
        let person = b.class("Person", vec![age], vec![], vec![]);

        let a = b.var("a");
        let zero = b.int(0);
        let constraint = b.binary(BinaryOp::Gt, a, zero);
        let binding = b.binding("a", "age", Some(constraint));
        let param = b.param("p", "Person");
        let param = Rc::new(ParamDef {
            destructuring: Some(vec![binding]),
            ..(*param).clone()
        });
        let a = b.var("a");
        let ret = b.ret(Some(a));
        let body = b.block(vec![ret]);
        let f = b.function("age_of", vec![param], "int", body);
        let module = b.module("main", vec![person], vec![f]);
        let program = b.assembly("program", vec![module]);

        let lowered = lower(&program);
        let f = &lowered.modules[0].functions[0];
        let param = &f.params[0];
        assert!(param.destructuring.is_none());

        let guard = param.guard.as_ref().unwrap();
        let ExprKind::Binary { lhs, .. } = &guard.kind else {
            panic!("expected comparison");
        };
        assert!(matches!(&lhs.kind, ExprKind::MemberAccess { lhs, .. } if lhs.var_name() == Some("p")));

        let StmtKind::VarDecl { name, type_name, init } = &f.body.statements[0].kind else {
            panic!("expected declaration");
        };
        assert_eq!(name, "a");
        assert_eq!(type_name.as_deref(), Some("int"));
        assert!(init.is_some());
        assert!(f.body.statements[1].is_return());
    }

    #[test]
    fn test_plain_functions_are_shared() {
        let mut b = AstBuilder::new();
        let p = b.param("x", "int");
        let body = b.block(vec![]);
        let f = b.function("f", vec![p], "void", body);
        let program = b.program(vec![f]);
        assert!(Rc::ptr_eq(&lower(&program), &program));
    }
}
