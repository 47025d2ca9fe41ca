//! Guarded overload groups
//!
//! Functions of one name in a module (or methods of one name in a class)
//! form a group. A group whose members carry parameter guards is checked
//! for completeness and then compiled into one dispatcher plus renamed,
//! unguarded implementations:
//!
//! ```text
//! fib(n: int | n <= 1): int { return n; }      fib(n: int): int {
//! fib(n: int): int { ... }                ==>      if (n <= 1) { return fib__0(n); }
//!                                                  return fib__1(n);
//!                                              }
//! ```

use super::{builder_for, same_shape, walk_qualified};
use crate::diagnostic::{Diagnostic, Diagnostics};
use fifth_ast::rewrite::{Rewriter, Rewritten};
use fifth_ast::*;
use fifth_types::FifthType;
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;

/// Incomplete guarded group
pub const GUARD_INCOMPLETE: &str = "E1001";
/// More than one unguarded overload
pub const MULTIPLE_BASE: &str = "E1002";
/// Overloads disagree on parameter count
pub const ARITY_MISMATCH: &str = "E1003";
/// Base overload is not the last one
pub const BASE_NOT_LAST: &str = "W1101";
/// Two overloads carry the same guard
pub const DUPLICATE_GUARD: &str = "W1102";

/// Functions sharing a name within one module or class
#[derive(Debug, Clone)]
pub struct OverloadGroup {
    /// Declaring class, for methods
    pub class: Option<String>,
    /// Shared name
    pub name: String,
    /// Members in source order
    pub members: Vec<Rc<FunctionDef>>,
}

impl OverloadGroup {
    /// Whether any member has a guard or a destructuring constraint
    pub fn is_guarded(&self) -> bool {
        self.members.iter().any(|m| has_guard(m))
    }

    fn arity(&self) -> Option<usize> {
        let first = self.members.first()?.params.len();
        self.members
            .iter()
            .all(|m| m.params.len() == first)
            .then_some(first)
    }

    fn label(&self) -> String {
        let arity = self.members.first().map_or(0, |m| m.params.len());
        format!("{}/{}", self.name, arity)
    }
}

fn has_guard(function: &FunctionDef) -> bool {
    function.params.iter().any(|p| {
        p.guard.is_some()
            || p.destructuring
                .iter()
                .flatten()
                .any(|binding| binding.constraint.is_some())
    })
}

fn group_by_name(owner: Option<&str>, functions: &[Rc<FunctionDef>], groups: &mut Vec<OverloadGroup>) {
    let mut order: Vec<&str> = Vec::new();
    let mut by_name: FxHashMap<&str, Vec<Rc<FunctionDef>>> = FxHashMap::default();
    for function in functions.iter().filter(|f| f.kind != FunctionKind::Constructor) {
        let members = by_name.entry(function.name.as_str()).or_insert_with(|| {
            order.push(function.name.as_str());
            Vec::new()
        });
        members.push(function.clone());
    }
    for name in order {
        let Some(members) = by_name.remove(name) else {
            continue;
        };
        if members.len() > 1 {
            groups.push(OverloadGroup {
                class: owner.map(str::to_string),
                name: name.to_string(),
                members,
            });
        }
    }
}

/// Collect every overload group
pub(super) fn gather(ast: &AssemblyDef) -> Vec<OverloadGroup> {
    let mut groups = Vec::new();
    for module in &ast.modules {
        group_by_name(None, &module.functions, &mut groups);
        for class in &module.classes {
            group_by_name(Some(&class.name), &class.methods, &mut groups);
        }
    }
    tracing::debug!(groups = groups.len(), "gathered overload groups");
    groups
}

/// Check guard completeness of every group
pub(super) fn validate(groups: &[OverloadGroup], diagnostics: &mut Diagnostics) {
    for group in groups {
        let first = &group.members[0];
        if !group.is_guarded() {
            // Unguarded overloads of different arity are ordinary overloads
            if group.arity().is_some() {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Function '{}' has more than one unguarded base case",
                        group.label()
                    ))
                    .with_code(MULTIPLE_BASE)
                    .at(&**first),
                );
            }
            continue;
        }

        if group.arity().is_none() {
            diagnostics.push(
                Diagnostic::error(format!(
                    "Guarded overloads of '{}' disagree on parameter count",
                    group.name
                ))
                .with_code(ARITY_MISMATCH)
                .at(&**first),
            );
            continue;
        }

        let bases: Vec<usize> = group
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| !has_guard(m))
            .map(|(i, _)| i)
            .collect();
        match bases.as_slice() {
            [] => diagnostics.push(
                Diagnostic::error(format!(
                    "Function '{}' has guarded overloads but no unguarded base case",
                    group.label()
                ))
                .with_code(GUARD_INCOMPLETE)
                .at(&**first)
                .with_note("add an overload without guards to handle the remaining inputs"),
            ),
            [base] if *base != group.members.len() - 1 => diagnostics.push(
                Diagnostic::warning(format!(
                    "Base case of '{}' is not the last overload; later overloads are unreachable",
                    group.label()
                ))
                .with_code(BASE_NOT_LAST)
                .at(&*group.members[*base]),
            ),
            [_] => {}
            [_, second, ..] => diagnostics.push(
                Diagnostic::error(format!(
                    "Function '{}' has more than one unguarded base case",
                    group.label()
                ))
                .with_code(MULTIPLE_BASE)
                .at(&*group.members[*second]),
            ),
        }

        for (i, later) in group.members.iter().enumerate() {
            if !has_guard(later) {
                continue;
            }
            let duplicate = group.members[..i]
                .iter()
                .any(|earlier| has_guard(earlier) && same_guards(earlier, later));
            if duplicate {
                diagnostics.push(
                    Diagnostic::warning(format!(
                        "Overload {} of '{}' repeats an earlier guard",
                        i,
                        group.label()
                    ))
                    .with_code(DUPLICATE_GUARD)
                    .at(&**later),
                );
            }
        }
    }
}

fn same_guards(a: &FunctionDef, b: &FunctionDef) -> bool {
    fn same_opt(a: &Option<ExprRef>, b: &Option<ExprRef>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => same_shape(a, b),
            (None, None) => true,
            _ => false,
        }
    }
    a.params.iter().zip(&b.params).all(|(p, q)| {
        let bindings = |param: &ParamDef| -> Vec<(String, Option<ExprRef>)> {
            param
                .destructuring
                .iter()
                .flatten()
                .map(|binding| (binding.property.clone(), binding.constraint.clone()))
                .collect()
        };
        let (left, right) = (bindings(p), bindings(q));
        same_opt(&p.guard, &q.guard)
            && left.len() == right.len()
            && left
                .iter()
                .zip(&right)
                .all(|((lp, lc), (rp, rc))| lp == rp && same_opt(lc, rc))
    })
}

// ============================================================================
// Transformation
// ============================================================================

/// Rewrites one member's guard into the dispatcher's terms: parameters are
/// renamed to the dispatcher's and destructured names read the property
struct GuardSubstitution<'b> {
    renames: FxHashMap<String, String>,
    bindings: FxHashMap<String, (String, String)>,
    builder: &'b mut AstBuilder,
}

impl Rewriter for GuardSubstitution<'_> {
    fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
        if let ExprKind::VarRef(name) = &expr.kind {
            if let Some((param, property)) = self.bindings.get(name) {
                self.builder.set_location(expr.location().cloned());
                let receiver = self.builder.var(param.clone());
                return Rewritten::new(self.builder.field_access(receiver, property.clone()));
            }
            if let Some(renamed) = self.renames.get(name) {
                return Rewritten::new(expr.with_kind(ExprKind::VarRef(renamed.clone())));
            }
        }
        walk_qualified(self, expr)
    }
}

fn guard_condition(member: &FunctionDef, dispatcher_params: &[Rc<ParamDef>], b: &mut AstBuilder) -> Option<ExprRef> {
    let mut renames = FxHashMap::default();
    let mut bindings = FxHashMap::default();
    for (param, target) in member.params.iter().zip(dispatcher_params) {
        if param.name != target.name {
            renames.insert(param.name.clone(), target.name.clone());
        }
        for binding in param.destructuring.iter().flatten() {
            bindings.insert(
                binding.variable.clone(),
                (target.name.clone(), binding.property.clone()),
            );
        }
    }

    let conditions: Vec<ExprRef> = member
        .params
        .iter()
        .flat_map(|param| {
            param.guard.iter().cloned().chain(
                param
                    .destructuring
                    .iter()
                    .flatten()
                    .filter_map(|binding| binding.constraint.clone()),
            )
        })
        .collect();

    let mut substitution = GuardSubstitution {
        renames,
        bindings,
        builder: b,
    };
    let mut combined: Option<ExprRef> = None;
    for condition in conditions {
        let condition = substitution.rewrite_expr(&condition).node;
        combined = Some(match combined {
            Some(previous) => substitution.builder.binary(BinaryOp::And, previous, condition),
            None => condition,
        });
    }
    combined
}

fn strip_guards(function: &Rc<FunctionDef>, name: String) -> Rc<FunctionDef> {
    let params = function
        .params
        .iter()
        .map(|param| {
            let destructuring = param.destructuring.as_ref().map(|bindings| {
                bindings
                    .iter()
                    .map(|binding| {
                        if binding.constraint.is_none() {
                            binding.clone()
                        } else {
                            Rc::new(PropertyBinding {
                                constraint: None,
                                ..(**binding).clone()
                            })
                        }
                    })
                    .collect()
            });
            Rc::new(ParamDef {
                guard: None,
                destructuring,
                ..(**param).clone()
            })
        })
        .collect();
    Rc::new(FunctionDef {
        name,
        params,
        ..(**function).clone()
    })
}

fn dispatch(group: &OverloadGroup, b: &mut AstBuilder) -> Vec<Rc<FunctionDef>> {
    let first = &group.members[0];
    b.set_location(first.location().cloned());
    let params: Vec<Rc<ParamDef>> = first
        .params
        .iter()
        .map(|p| b.param(p.name.clone(), p.type_name.clone()))
        .collect();
    let returns_void = FifthType::parse(&first.return_type).is_void();
    let target = match &group.class {
        Some(class) => CallTarget::Method {
            class: class.clone(),
        },
        None => CallTarget::Function,
    };

    let mut statements = Vec::new();
    let mut implementations = Vec::new();
    for (i, member) in group.members.iter().enumerate() {
        let implementation = format!("{}__{}", group.name, i);
        let condition = guard_condition(member, &params, b);

        b.set_location(member.location().cloned());
        let args = params.iter().map(|p| b.var(p.name.clone())).collect();
        let call = b.expr(ExprKind::Call {
            name: implementation.clone(),
            args,
            target: target.clone(),
        });
        let mut forward = if returns_void {
            let call = b.expr_stmt(call);
            vec![call, b.ret(None)]
        } else {
            vec![b.ret(Some(call))]
        };

        match condition {
            Some(condition) => {
                let then_block = b.block(forward);
                statements.push(b.if_else(condition, then_block, None));
            }
            None => {
                statements.append(&mut forward);
                implementations.push(strip_guards(member, implementation));
                // Anything after the base case is unreachable
                break;
            }
        }
        implementations.push(strip_guards(member, implementation));
    }

    let body = b.block(statements);
    b.set_location(first.location().cloned());
    let dispatcher = b.callable(
        group.name.clone(),
        params,
        first.return_type.clone(),
        body,
        first.kind,
    );
    tracing::debug!(
        function = %group.label(),
        clauses = implementations.len(),
        "built overload dispatcher"
    );

    let mut functions = vec![dispatcher];
    functions.extend(implementations);
    functions
}

fn replace_members(
    functions: &[Rc<FunctionDef>],
    groups: &[(&OverloadGroup, Vec<Rc<FunctionDef>>)],
) -> Option<Vec<Rc<FunctionDef>>> {
    let mut touched = false;
    let mut emitted: FxHashSet<usize> = FxHashSet::default();
    let mut result = Vec::with_capacity(functions.len());
    for function in functions {
        let owner = groups
            .iter()
            .position(|(group, _)| group.members.iter().any(|m| m.id() == function.id()));
        match owner {
            Some(index) => {
                touched = true;
                if emitted.insert(index) {
                    result.extend(groups[index].1.iter().cloned());
                }
            }
            None => result.push(function.clone()),
        }
    }
    touched.then_some(result)
}

/// Replace every guarded group by its dispatcher and implementations
pub(super) fn transform(ast: &Rc<AssemblyDef>, groups: &[OverloadGroup]) -> Rc<AssemblyDef> {
    let guarded: Vec<&OverloadGroup> = groups.iter().filter(|g| g.is_guarded()).collect();
    if guarded.is_empty() {
        return ast.clone();
    }

    let mut b = builder_for(ast);
    let lowered: Vec<(&OverloadGroup, Vec<Rc<FunctionDef>>)> =
        guarded.into_iter().map(|g| (g, dispatch(g, &mut b))).collect();

    let module_groups: Vec<_> = lowered.iter().filter(|(g, _)| g.class.is_none()).cloned().collect();
    let modules = ast
        .modules
        .iter()
        .map(|module| {
            let mut module = module.clone();
            if let Some(functions) = replace_members(&module.functions, &module_groups) {
                module = module.with_functions(functions);
            }
            let mut classes_changed = false;
            let classes: Vec<_> = module
                .classes
                .iter()
                .map(|class| {
                    let class_groups: Vec<_> = lowered
                        .iter()
                        .filter(|(g, _)| g.class.as_deref() == Some(class.name.as_str()))
                        .cloned()
                        .collect();
                    match replace_members(&class.methods, &class_groups) {
                        Some(methods) => {
                            classes_changed = true;
                            class.with_methods(methods)
                        }
                        None => class.clone(),
                    }
                })
                .collect();
            if classes_changed {
                module = module.with_classes(classes);
            }
            module
        })
        .collect();
    ast.with_modules(modules)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// fib(n | n <= 1) { return n; }  fib(n) { return n; }
    fn fib(b: &mut AstBuilder, base_last: bool) -> Rc<AssemblyDef> {
        let n = b.var("n");
        let one = b.int(1);
        let guard = b.binary(BinaryOp::Le, n, one);
        let param = b.guarded_param("n", "int", Some(guard));
        let n = b.var("n");
        let ret = b.ret(Some(n));
        let body = b.block(vec![ret]);
        let guarded = b.function("fib", vec![param], "int", body);

        let param = b.param("m", "int");
        let m = b.var("m");
        let ret = b.ret(Some(m));
        let body = b.block(vec![ret]);
        let base = b.function("fib", vec![param], "int", body);

        let functions = if base_last {
            vec![guarded, base]
        } else {
            vec![base, guarded]
        };
        b.program(functions)
    }

    fn codes(diagnostics: &Diagnostics) -> Vec<String> {
        diagnostics.iter().filter_map(|d| d.code.clone()).collect()
    }

    #[test]
    fn test_gather_groups_by_name() {
        let mut b = AstBuilder::new();
        let program = fib(&mut b, true);
        let groups = gather(&program);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 2);
        assert!(groups[0].is_guarded());
    }

    #[test]
    fn test_complete_group_is_clean() {
        let mut b = AstBuilder::new();
        let program = fib(&mut b, true);
        let mut diagnostics = Diagnostics::new();
        validate(&gather(&program), &mut diagnostics);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_base_not_last_warns() {
        let mut b = AstBuilder::new();
        let program = fib(&mut b, false);
        let mut diagnostics = Diagnostics::new();
        validate(&gather(&program), &mut diagnostics);
        assert_eq!(codes(&diagnostics), [BASE_NOT_LAST]);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn test_missing_base_is_an_error() {
        let mut b = AstBuilder::new();
        let mut functions = Vec::new();
        for limit in [0, 1] {
            let n = b.var("n");
            let bound = b.int(limit);
            let guard = b.binary(BinaryOp::Eq, n, bound);
            let param = b.guarded_param("n", "int", Some(guard));
            let body = b.block(vec![]);
            functions.push(b.function("f", vec![param], "void", body));
        }
        let program = b.program(functions);
        let mut diagnostics = Diagnostics::new();
        validate(&gather(&program), &mut diagnostics);
        assert_eq!(codes(&diagnostics), [GUARD_INCOMPLETE]);
        assert!(diagnostics.iter().next().unwrap().message.contains("'f/1'"));
    }

    #[test]
    fn test_duplicate_guard_and_arity_mismatch() {
        let mut b = AstBuilder::new();
        let mut functions = Vec::new();
        for _ in 0..2 {
            let n = b.var("n");
            let zero = b.int(0);
            let guard = b.binary(BinaryOp::Gt, n, zero);
            let param = b.guarded_param("n", "int", Some(guard));
            let body = b.block(vec![]);
            functions.push(b.function("f", vec![param], "void", body));
        }
        let param = b.param("n", "int");
        let body = b.block(vec![]);
        functions.push(b.function("f", vec![param], "void", body));
        let program = b.program(functions);
        let mut diagnostics = Diagnostics::new();
        validate(&gather(&program), &mut diagnostics);
        assert_eq!(codes(&diagnostics), [DUPLICATE_GUARD]);

        let mut b = AstBuilder::new();
        let n = b.var("n");
        let zero = b.int(0);
        let guard = b.binary(BinaryOp::Gt, n, zero);
        let param = b.guarded_param("n", "int", Some(guard));
        let body = b.block(vec![]);
        let one = b.function("g", vec![param], "void", body);
        let body = b.block(vec![]);
        let two = b.function("g", vec![], "void", body);
        let program = b.program(vec![one, two]);
        let mut diagnostics = Diagnostics::new();
        validate(&gather(&program), &mut diagnostics);
        assert_eq!(codes(&diagnostics), [ARITY_MISMATCH]);
    }

    #[test]
    fn test_transform_builds_dispatcher() {
        let mut b = AstBuilder::new();
        let program = fib(&mut b, true);
        let groups = gather(&program);
        let lowered = transform(&program, &groups);

        let functions = &lowered.modules[0].functions;
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["fib", "fib__0", "fib__1"]);
        assert!(functions.iter().all(|f| !has_guard(f)));

        let dispatcher = &functions[0];
        assert_eq!(dispatcher.params[0].name, "n");
        let statements = &dispatcher.body.statements;
        assert_eq!(statements.len(), 2);
        let StmtKind::If { then_block, .. } = &statements[0].kind else {
            panic!("expected guard test");
        };
        let StmtKind::Return(Some(call)) = &then_block.statements[0].kind else {
            panic!("expected forwarding return");
        };
        assert!(matches!(&call.kind, ExprKind::Call { name, target: CallTarget::Function, .. } if name == "fib__0"));
        assert!(statements[1].is_return());

        // The base clause keeps its own parameter name
        assert_eq!(functions[2].params[0].name, "m");
    }

    #[test]
    fn test_guard_is_renamed_to_dispatcher_parameters() {
        let mut b = AstBuilder::new();
        let base = b.param("n", "int");
        let body = b.block(vec![]);
        let base = b.function("f", vec![base], "void", body);
        let x = b.var("x");
        let zero = b.int(0);
        let guard = b.binary(BinaryOp::Lt, x, zero);
        let param = b.guarded_param("x", "int", Some(guard));
        let body = b.block(vec![]);
        let guarded = b.function("f", vec![param], "void", body);
        let program = b.program(vec![guarded, base]);
        let mut seeded = builder_for(&program);
        let groups = gather(&program);
        let dispatcher_params = vec![seeded.param("n", "int")];
        let condition = guard_condition(&groups[0].members[0], &dispatcher_params, &mut seeded).unwrap();
        let ExprKind::Binary { lhs, .. } = &condition.kind else {
            panic!("expected comparison");
        };
        assert_eq!(lhs.var_name(), Some("n"));
    }
}
