//! Persistent tree rewriting
//!
//! A [`Rewriter`] produces a new tree from an old one. Every hook defaults to
//! the matching `walk_*` function, which rewrites the children and rebuilds
//! the node only when a child actually changed; otherwise the original `Rc`
//! is returned, so untouched subtrees stay shared and `Rc::ptr_eq` tells a
//! caller whether anything happened.
//!
//! Expression and statement rewrites may ask for statements to run first.
//! Those travel upward in [`Rewritten::prologue`] until the nearest enclosing
//! block splices them in front of the statement that needed them. Parameter
//! prologues are spliced at the top of the function body. Prologues raised by
//! a loop condition or step are hoisted ahead of the loop.

use crate::ast::*;
use std::rc::Rc;

/// A rewritten node plus statements that must execute before it
#[derive(Debug, Clone)]
pub struct Rewritten<T> {
    /// Replacement node
    pub node: T,
    /// Statements to run first, in order
    pub prologue: Vec<StmtRef>,
}

impl<T> Rewritten<T> {
    /// Replacement with no prologue
    pub fn new(node: T) -> Self {
        Self {
            node,
            prologue: Vec::new(),
        }
    }

    /// Replacement preceded by `prologue`
    pub fn with_prologue(node: T, prologue: Vec<StmtRef>) -> Self {
        Self { node, prologue }
    }
}

/// AST rewriter trait
pub trait Rewriter: Sized {
    /// Assembly root
    fn rewrite_assembly(&mut self, assembly: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
        walk_assembly(self, assembly)
    }

    /// Module
    fn rewrite_module(&mut self, module: &Rc<ModuleDef>) -> Rc<ModuleDef> {
        walk_module(self, module)
    }

    /// Class
    fn rewrite_class(&mut self, class: &Rc<ClassDef>) -> Rc<ClassDef> {
        walk_class(self, class)
    }

    /// Field; leaf
    fn rewrite_field(&mut self, field: &Rc<FieldDef>) -> Rc<FieldDef> {
        field.clone()
    }

    /// Property; leaf
    fn rewrite_property(&mut self, property: &Rc<PropertyDef>) -> Rc<PropertyDef> {
        property.clone()
    }

    /// Function, method or constructor
    fn rewrite_function(&mut self, function: &Rc<FunctionDef>) -> Rc<FunctionDef> {
        walk_function(self, function)
    }

    /// Parameter
    fn rewrite_param(&mut self, param: &Rc<ParamDef>) -> Rewritten<Rc<ParamDef>> {
        walk_param(self, param)
    }

    /// Destructuring binding
    fn rewrite_binding(&mut self, binding: &Rc<PropertyBinding>) -> Rewritten<Rc<PropertyBinding>> {
        walk_binding(self, binding)
    }

    /// Block
    fn rewrite_block(&mut self, block: &Rc<Block>) -> Rc<Block> {
        walk_block(self, block)
    }

    /// Statement
    fn rewrite_stmt(&mut self, stmt: &StmtRef) -> Rewritten<StmtRef> {
        walk_stmt(self, stmt)
    }

    /// Catch clause
    fn rewrite_catch(&mut self, catch: &Rc<CatchClause>) -> Rc<CatchClause> {
        walk_catch(self, catch)
    }

    /// Expression
    fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
        walk_expr(self, expr)
    }
}

fn same<T>(a: &Rc<T>, b: &Rc<T>) -> bool {
    Rc::ptr_eq(a, b)
}

fn same_all<T>(a: &[Rc<T>], b: &[Rc<T>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Rc::ptr_eq(x, y))
}

fn same_opt<T>(a: &Option<Rc<T>>, b: &Option<Rc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn expr_child<R: Rewriter>(r: &mut R, expr: &ExprRef, prologue: &mut Vec<StmtRef>) -> ExprRef {
    let rewritten = r.rewrite_expr(expr);
    prologue.extend(rewritten.prologue);
    rewritten.node
}

fn expr_opt<R: Rewriter>(
    r: &mut R,
    expr: &Option<ExprRef>,
    prologue: &mut Vec<StmtRef>,
) -> Option<ExprRef> {
    expr.as_ref().map(|e| expr_child(r, e, prologue))
}

fn expr_all<R: Rewriter>(r: &mut R, exprs: &[ExprRef], prologue: &mut Vec<StmtRef>) -> Vec<ExprRef> {
    exprs.iter().map(|e| expr_child(r, e, prologue)).collect()
}

fn stmt_opt<R: Rewriter>(
    r: &mut R,
    stmt: &Option<StmtRef>,
    prologue: &mut Vec<StmtRef>,
) -> Option<StmtRef> {
    stmt.as_ref().map(|s| {
        let rewritten = r.rewrite_stmt(s);
        prologue.extend(rewritten.prologue);
        rewritten.node
    })
}

// ============================================================================
// Declarations
// ============================================================================

/// Rewrite every module
pub fn walk_assembly<R: Rewriter>(r: &mut R, assembly: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
    let modules: Vec<_> = assembly.modules.iter().map(|m| r.rewrite_module(m)).collect();
    if same_all(&modules, &assembly.modules) {
        assembly.clone()
    } else {
        assembly.with_modules(modules)
    }
}

/// Rewrite classes and functions
pub fn walk_module<R: Rewriter>(r: &mut R, module: &Rc<ModuleDef>) -> Rc<ModuleDef> {
    let classes: Vec<_> = module.classes.iter().map(|c| r.rewrite_class(c)).collect();
    let functions: Vec<_> = module.functions.iter().map(|f| r.rewrite_function(f)).collect();
    if same_all(&classes, &module.classes) && same_all(&functions, &module.functions) {
        return module.clone();
    }
    Rc::new(ModuleDef {
        classes,
        functions,
        ..(**module).clone()
    })
}

/// Rewrite members
pub fn walk_class<R: Rewriter>(r: &mut R, class: &Rc<ClassDef>) -> Rc<ClassDef> {
    let fields: Vec<_> = class.fields.iter().map(|f| r.rewrite_field(f)).collect();
    let properties: Vec<_> = class.properties.iter().map(|p| r.rewrite_property(p)).collect();
    let methods: Vec<_> = class.methods.iter().map(|m| r.rewrite_function(m)).collect();
    if same_all(&fields, &class.fields)
        && same_all(&properties, &class.properties)
        && same_all(&methods, &class.methods)
    {
        return class.clone();
    }
    Rc::new(ClassDef {
        fields,
        properties,
        methods,
        ..(**class).clone()
    })
}

/// Rewrite parameters and body; parameter prologues open the body
pub fn walk_function<R: Rewriter>(r: &mut R, function: &Rc<FunctionDef>) -> Rc<FunctionDef> {
    let mut prologue = Vec::new();
    let params: Vec<_> = function
        .params
        .iter()
        .map(|p| {
            let rewritten = r.rewrite_param(p);
            prologue.extend(rewritten.prologue);
            rewritten.node
        })
        .collect();

    let mut body = r.rewrite_block(&function.body);
    if !prologue.is_empty() {
        prologue.extend(body.statements.iter().cloned());
        body = body.with_statements(prologue);
    }

    if same_all(&params, &function.params) && same(&body, &function.body) {
        return function.clone();
    }
    Rc::new(FunctionDef {
        params,
        body,
        ..(**function).clone()
    })
}

/// Rewrite the guard and destructuring bindings
pub fn walk_param<R: Rewriter>(r: &mut R, param: &Rc<ParamDef>) -> Rewritten<Rc<ParamDef>> {
    let mut prologue = Vec::new();
    let guard = expr_opt(r, &param.guard, &mut prologue);
    let destructuring = param.destructuring.as_ref().map(|bindings| {
        bindings
            .iter()
            .map(|b| {
                let rewritten = r.rewrite_binding(b);
                prologue.extend(rewritten.prologue);
                rewritten.node
            })
            .collect::<Vec<_>>()
    });

    let unchanged = same_opt(&guard, &param.guard)
        && match (&destructuring, &param.destructuring) {
            (Some(new), Some(old)) => same_all(new, old),
            (None, None) => true,
            _ => false,
        };
    if unchanged {
        return Rewritten::with_prologue(param.clone(), prologue);
    }
    let node = Rc::new(ParamDef {
        guard,
        destructuring,
        ..(**param).clone()
    });
    Rewritten::with_prologue(node, prologue)
}

/// Rewrite the binding's constraint
pub fn walk_binding<R: Rewriter>(
    r: &mut R,
    binding: &Rc<PropertyBinding>,
) -> Rewritten<Rc<PropertyBinding>> {
    let mut prologue = Vec::new();
    let constraint = expr_opt(r, &binding.constraint, &mut prologue);
    if same_opt(&constraint, &binding.constraint) {
        return Rewritten::with_prologue(binding.clone(), prologue);
    }
    let node = Rc::new(PropertyBinding {
        constraint,
        ..(**binding).clone()
    });
    Rewritten::with_prologue(node, prologue)
}

// ============================================================================
// Statements
// ============================================================================

/// Rewrite statements, splicing each prologue ahead of its statement
pub fn walk_block<R: Rewriter>(r: &mut R, block: &Rc<Block>) -> Rc<Block> {
    let mut statements = Vec::with_capacity(block.statements.len());
    for stmt in &block.statements {
        let rewritten = r.rewrite_stmt(stmt);
        statements.extend(rewritten.prologue);
        statements.push(rewritten.node);
    }
    if same_all(&statements, &block.statements) {
        block.clone()
    } else {
        block.with_statements(statements)
    }
}

/// Rewrite a statement's children
pub fn walk_stmt<R: Rewriter>(r: &mut R, stmt: &StmtRef) -> Rewritten<StmtRef> {
    let mut prologue = Vec::new();
    let kind = match &stmt.kind {
        StmtKind::VarDecl {
            name,
            type_name,
            init,
        } => {
            let new_init = expr_opt(r, init, &mut prologue);
            if same_opt(&new_init, init) {
                None
            } else {
                Some(StmtKind::VarDecl {
                    name: name.clone(),
                    type_name: type_name.clone(),
                    init: new_init,
                })
            }
        }
        StmtKind::Assign { target, value } => {
            let new_target = expr_child(r, target, &mut prologue);
            let new_value = expr_child(r, value, &mut prologue);
            if same(&new_target, target) && same(&new_value, value) {
                None
            } else {
                Some(StmtKind::Assign {
                    target: new_target,
                    value: new_value,
                })
            }
        }
        StmtKind::CompoundAssign { target, op, value } => {
            let new_target = expr_child(r, target, &mut prologue);
            let new_value = expr_child(r, value, &mut prologue);
            if same(&new_target, target) && same(&new_value, value) {
                None
            } else {
                Some(StmtKind::CompoundAssign {
                    target: new_target,
                    op: *op,
                    value: new_value,
                })
            }
        }
        StmtKind::Expr(expr) => {
            let new_expr = expr_child(r, expr, &mut prologue);
            (!same(&new_expr, expr)).then(|| StmtKind::Expr(new_expr))
        }
        StmtKind::Return(value) => {
            let new_value = expr_opt(r, value, &mut prologue);
            (!same_opt(&new_value, value)).then(|| StmtKind::Return(new_value))
        }
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => {
            let new_cond = expr_child(r, cond, &mut prologue);
            let new_then = r.rewrite_block(then_block);
            let new_else = else_block.as_ref().map(|b| r.rewrite_block(b));
            if same(&new_cond, cond) && same(&new_then, then_block) && same_opt(&new_else, else_block)
            {
                None
            } else {
                Some(StmtKind::If {
                    cond: new_cond,
                    then_block: new_then,
                    else_block: new_else,
                })
            }
        }
        StmtKind::While { cond, body } => {
            let new_cond = expr_child(r, cond, &mut prologue);
            let new_body = r.rewrite_block(body);
            if same(&new_cond, cond) && same(&new_body, body) {
                None
            } else {
                Some(StmtKind::While {
                    cond: new_cond,
                    body: new_body,
                })
            }
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            let new_init = stmt_opt(r, init, &mut prologue);
            let new_cond = expr_opt(r, cond, &mut prologue);
            let new_step = stmt_opt(r, step, &mut prologue);
            let new_body = r.rewrite_block(body);
            if same_opt(&new_init, init)
                && same_opt(&new_cond, cond)
                && same_opt(&new_step, step)
                && same(&new_body, body)
            {
                None
            } else {
                Some(StmtKind::For {
                    init: new_init,
                    cond: new_cond,
                    step: new_step,
                    body: new_body,
                })
            }
        }
        StmtKind::Block(block) => {
            let new_block = r.rewrite_block(block);
            (!same(&new_block, block)).then(|| StmtKind::Block(new_block))
        }
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            let new_body = r.rewrite_block(body);
            let new_catches: Vec<_> = catches.iter().map(|c| r.rewrite_catch(c)).collect();
            let new_finally = finally.as_ref().map(|b| r.rewrite_block(b));
            if same(&new_body, body) && same_all(&new_catches, catches) && same_opt(&new_finally, finally)
            {
                None
            } else {
                Some(StmtKind::Try {
                    body: new_body,
                    catches: new_catches,
                    finally: new_finally,
                })
            }
        }
    };

    let node = match kind {
        Some(kind) => stmt.with_kind(kind),
        None => stmt.clone(),
    };
    Rewritten::with_prologue(node, prologue)
}

/// Rewrite the handler body
pub fn walk_catch<R: Rewriter>(r: &mut R, catch: &Rc<CatchClause>) -> Rc<CatchClause> {
    let body = r.rewrite_block(&catch.body);
    if same(&body, &catch.body) {
        return catch.clone();
    }
    Rc::new(CatchClause {
        body,
        ..(**catch).clone()
    })
}

// ============================================================================
// Expressions
// ============================================================================

/// Rewrite an expression's operands
pub fn walk_expr<R: Rewriter>(r: &mut R, expr: &ExprRef) -> Rewritten<ExprRef> {
    let mut prologue = Vec::new();
    let kind = match &expr.kind {
        ExprKind::Literal(_) | ExprKind::VarRef(_) => None,
        ExprKind::Binary { op, lhs, rhs } => {
            let new_lhs = expr_child(r, lhs, &mut prologue);
            let new_rhs = expr_child(r, rhs, &mut prologue);
            if same(&new_lhs, lhs) && same(&new_rhs, rhs) {
                None
            } else {
                Some(ExprKind::Binary {
                    op: *op,
                    lhs: new_lhs,
                    rhs: new_rhs,
                })
            }
        }
        ExprKind::Unary { op, operand } => {
            let new_operand = expr_child(r, operand, &mut prologue);
            (!same(&new_operand, operand)).then(|| ExprKind::Unary {
                op: *op,
                operand: new_operand,
            })
        }
        ExprKind::MemberAccess { lhs, rhs } => {
            let new_lhs = expr_child(r, lhs, &mut prologue);
            let new_rhs = expr_opt(r, rhs, &mut prologue);
            if same(&new_lhs, lhs) && same_opt(&new_rhs, rhs) {
                None
            } else {
                Some(ExprKind::MemberAccess {
                    lhs: new_lhs,
                    rhs: new_rhs,
                })
            }
        }
        ExprKind::Call { name, args, target } => {
            let new_args = expr_all(r, args, &mut prologue);
            (!same_all(&new_args, args)).then(|| ExprKind::Call {
                name: name.clone(),
                args: new_args,
                target: target.clone(),
            })
        }
        ExprKind::ObjectInit {
            type_name,
            properties,
        } => {
            let new_values: Vec<_> = properties
                .iter()
                .map(|p| expr_child(r, &p.value, &mut prologue))
                .collect();
            let unchanged = properties
                .iter()
                .zip(&new_values)
                .all(|(p, v)| same(&p.value, v));
            (!unchanged).then(|| ExprKind::ObjectInit {
                type_name: type_name.clone(),
                properties: properties
                    .iter()
                    .zip(new_values)
                    .map(|(p, value)| PropertyInit {
                        name: p.name.clone(),
                        value,
                    })
                    .collect(),
            })
        }
        ExprKind::List { elements } => {
            let new_elements = expr_all(r, elements, &mut prologue);
            (!same_all(&new_elements, elements)).then(|| ExprKind::List {
                elements: new_elements,
            })
        }
        ExprKind::ListComprehension {
            var,
            source,
            constraint,
        } => {
            let new_source = expr_child(r, source, &mut prologue);
            let new_constraint = expr_opt(r, constraint, &mut prologue);
            if same(&new_source, source) && same_opt(&new_constraint, constraint) {
                None
            } else {
                Some(ExprKind::ListComprehension {
                    var: var.clone(),
                    source: new_source,
                    constraint: new_constraint,
                })
            }
        }
        ExprKind::Triple {
            subject,
            predicate,
            object,
        } => {
            let s = expr_child(r, subject, &mut prologue);
            let p = expr_child(r, predicate, &mut prologue);
            let o = expr_child(r, object, &mut prologue);
            if same(&s, subject) && same(&p, predicate) && same(&o, object) {
                None
            } else {
                Some(ExprKind::Triple {
                    subject: s,
                    predicate: p,
                    object: o,
                })
            }
        }
        ExprKind::Graph { triples } => {
            let new_triples = expr_all(r, triples, &mut prologue);
            (!same_all(&new_triples, triples)).then(|| ExprKind::Graph {
                triples: new_triples,
            })
        }
    };

    let node = match kind {
        Some(kind) => expr.with_kind(kind),
        None => expr.clone(),
    };
    Rewritten::with_prologue(node, prologue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::AstBuilder;
    use crate::ops::BinaryOp;

    struct Identity;
    impl Rewriter for Identity {}

    struct RenameVar {
        from: &'static str,
        to: &'static str,
    }

    impl Rewriter for RenameVar {
        fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
            match &expr.kind {
                ExprKind::VarRef(name) if name == self.from => {
                    Rewritten::new(expr.with_kind(ExprKind::VarRef(self.to.to_string())))
                }
                _ => walk_expr(self, expr),
            }
        }
    }

    /// Replaces every call with a temporary declared just before the statement
    struct HoistCalls {
        builder: AstBuilder,
    }

    impl Rewriter for HoistCalls {
        fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
            if let ExprKind::Call { .. } = expr.kind {
                let decl = self.builder.var_decl("tmp", Some("int"), Some(expr.clone()));
                let var = self.builder.var("tmp");
                return Rewritten::with_prologue(var, vec![decl]);
            }
            walk_expr(self, expr)
        }
    }

    fn sample(b: &mut AstBuilder) -> Rc<AssemblyDef> {
        let x = b.var("x");
        let one = b.int(1);
        let sum = b.binary(BinaryOp::Add, x, one);
        let ret = b.ret(Some(sum));
        let other = b.var("y");
        let print = b.expr_stmt(other);
        let body = b.block(vec![print, ret]);
        let param = b.param("x", "int");
        let f = b.function("inc", vec![param], "int", body);
        b.program(vec![f])
    }

    #[test]
    fn test_identity_rewrite_preserves_sharing() {
        let mut b = AstBuilder::new();
        let program = sample(&mut b);
        let rewritten = Identity.rewrite_assembly(&program);
        assert!(Rc::ptr_eq(&program, &rewritten));
    }

    #[test]
    fn test_rewrite_copies_only_the_changed_path() {
        let mut b = AstBuilder::new();
        let program = sample(&mut b);
        let rewritten = RenameVar { from: "x", to: "z" }.rewrite_assembly(&program);

        assert!(!Rc::ptr_eq(&program, &rewritten));
        let old_body = &program.modules[0].functions[0].body;
        let new_body = &rewritten.modules[0].functions[0].body;
        // The untouched first statement is shared, the return is rebuilt.
        assert!(Rc::ptr_eq(&old_body.statements[0], &new_body.statements[0]));
        assert!(!Rc::ptr_eq(&old_body.statements[1], &new_body.statements[1]));
        // Rebuilt nodes keep their identity.
        assert_eq!(old_body.statements[1].meta.id, new_body.statements[1].meta.id);
        // The input is untouched.
        let StmtKind::Return(Some(sum)) = &old_body.statements[1].kind else {
            panic!("expected return");
        };
        let ExprKind::Binary { lhs, .. } = &sum.kind else {
            panic!("expected binary");
        };
        assert_eq!(lhs.var_name(), Some("x"));
    }

    #[test]
    fn test_block_absorbs_prologue() {
        let mut b = AstBuilder::new();
        let call = b.call("f", vec![]);
        let ret = b.ret(Some(call));
        let body = b.block(vec![ret]);
        let f = b.function("main", vec![], "int", body);
        let program = b.program(vec![f]);

        let mut hoist = HoistCalls {
            builder: AstBuilder::starting_after(crate::visit::max_node_id(&program)),
        };
        let rewritten = hoist.rewrite_assembly(&program);
        let statements = &rewritten.modules[0].functions[0].body.statements;
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0].kind, StmtKind::VarDecl { .. }));
        assert!(statements[1].is_return());
    }
}
