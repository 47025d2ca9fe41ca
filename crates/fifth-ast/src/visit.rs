//! Read-only traversal
//!
//! Implement [`Visitor`] and override the hooks of interest; each default
//! calls the matching `walk_*` function, which visits the children.

use crate::ast::*;
use crate::node::{AstNode, NodeId};

/// AST visitor trait
pub trait Visitor: Sized {
    /// Assembly root
    fn visit_assembly(&mut self, assembly: &AssemblyDef) {
        walk_assembly(self, assembly);
    }

    /// Module
    fn visit_module(&mut self, module: &ModuleDef) {
        walk_module(self, module);
    }

    /// Class
    fn visit_class(&mut self, class: &ClassDef) {
        walk_class(self, class);
    }

    /// Field; leaf
    fn visit_field(&mut self, _field: &FieldDef) {}

    /// Property; leaf
    fn visit_property(&mut self, _property: &PropertyDef) {}

    /// Function, method or constructor
    fn visit_function(&mut self, function: &FunctionDef) {
        walk_function(self, function);
    }

    /// Parameter
    fn visit_param(&mut self, param: &ParamDef) {
        walk_param(self, param);
    }

    /// Destructuring binding
    fn visit_binding(&mut self, binding: &PropertyBinding) {
        walk_binding(self, binding);
    }

    /// Block
    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    /// Statement
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    /// Catch clause
    fn visit_catch(&mut self, catch: &CatchClause) {
        walk_catch(self, catch);
    }

    /// Expression
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

/// Visit every module
pub fn walk_assembly<V: Visitor>(visitor: &mut V, assembly: &AssemblyDef) {
    for module in &assembly.modules {
        visitor.visit_module(module);
    }
}

/// Visit classes, then functions
pub fn walk_module<V: Visitor>(visitor: &mut V, module: &ModuleDef) {
    for class in &module.classes {
        visitor.visit_class(class);
    }
    for function in &module.functions {
        visitor.visit_function(function);
    }
}

/// Visit fields, properties, then methods
pub fn walk_class<V: Visitor>(visitor: &mut V, class: &ClassDef) {
    for field in &class.fields {
        visitor.visit_field(field);
    }
    for property in &class.properties {
        visitor.visit_property(property);
    }
    for method in &class.methods {
        visitor.visit_function(method);
    }
}

/// Visit parameters, then the body
pub fn walk_function<V: Visitor>(visitor: &mut V, function: &FunctionDef) {
    for param in &function.params {
        visitor.visit_param(param);
    }
    visitor.visit_block(&function.body);
}

/// Visit the guard and destructuring bindings
pub fn walk_param<V: Visitor>(visitor: &mut V, param: &ParamDef) {
    if let Some(guard) = &param.guard {
        visitor.visit_expr(guard);
    }
    for binding in param.destructuring.iter().flatten() {
        visitor.visit_binding(binding);
    }
}

/// Visit the binding's constraint
pub fn walk_binding<V: Visitor>(visitor: &mut V, binding: &PropertyBinding) {
    if let Some(constraint) = &binding.constraint {
        visitor.visit_expr(constraint);
    }
}

/// Visit statements in order
pub fn walk_block<V: Visitor>(visitor: &mut V, block: &Block) {
    for stmt in &block.statements {
        visitor.visit_stmt(stmt);
    }
}

/// Visit a statement's children in evaluation order
pub fn walk_stmt<V: Visitor>(visitor: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::VarDecl { init, .. } => {
            if let Some(init) = init {
                visitor.visit_expr(init);
            }
        }
        StmtKind::Assign { target, value } | StmtKind::CompoundAssign { target, value, .. } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        StmtKind::Expr(expr) => visitor.visit_expr(expr),
        StmtKind::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => {
            visitor.visit_expr(cond);
            visitor.visit_block(then_block);
            if let Some(else_block) = else_block {
                visitor.visit_block(else_block);
            }
        }
        StmtKind::While { cond, body } => {
            visitor.visit_expr(cond);
            visitor.visit_block(body);
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            if let Some(cond) = cond {
                visitor.visit_expr(cond);
            }
            visitor.visit_block(body);
            if let Some(step) = step {
                visitor.visit_stmt(step);
            }
        }
        StmtKind::Block(block) => visitor.visit_block(block),
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            visitor.visit_block(body);
            for catch in catches {
                visitor.visit_catch(catch);
            }
            if let Some(finally) = finally {
                visitor.visit_block(finally);
            }
        }
    }
}

/// Visit the handler body
pub fn walk_catch<V: Visitor>(visitor: &mut V, catch: &CatchClause) {
    visitor.visit_block(&catch.body);
}

/// Visit an expression's operands left to right
pub fn walk_expr<V: Visitor>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::VarRef(_) => {}
        ExprKind::Binary { lhs, rhs, .. } => {
            visitor.visit_expr(lhs);
            visitor.visit_expr(rhs);
        }
        ExprKind::Unary { operand, .. } => visitor.visit_expr(operand),
        ExprKind::MemberAccess { lhs, rhs } => {
            visitor.visit_expr(lhs);
            if let Some(rhs) = rhs {
                visitor.visit_expr(rhs);
            }
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
        ExprKind::ObjectInit { properties, .. } => {
            for property in properties {
                visitor.visit_expr(&property.value);
            }
        }
        ExprKind::List { elements } => {
            for element in elements {
                visitor.visit_expr(element);
            }
        }
        ExprKind::ListComprehension {
            source, constraint, ..
        } => {
            visitor.visit_expr(source);
            if let Some(constraint) = constraint {
                visitor.visit_expr(constraint);
            }
        }
        ExprKind::Triple {
            subject,
            predicate,
            object,
        } => {
            visitor.visit_expr(subject);
            visitor.visit_expr(predicate);
            visitor.visit_expr(object);
        }
        ExprKind::Graph { triples } => {
            for triple in triples {
                visitor.visit_expr(triple);
            }
        }
    }
}

/// Highest node id anywhere in the tree
pub fn max_node_id(assembly: &AssemblyDef) -> NodeId {
    struct MaxId(NodeId);

    impl MaxId {
        fn see(&mut self, id: NodeId) {
            self.0 = self.0.max(id);
        }
    }

    impl Visitor for MaxId {
        fn visit_module(&mut self, module: &ModuleDef) {
            self.see(module.id());
            walk_module(self, module);
        }
        fn visit_class(&mut self, class: &ClassDef) {
            self.see(class.id());
            walk_class(self, class);
        }
        fn visit_field(&mut self, field: &FieldDef) {
            self.see(field.id());
        }
        fn visit_property(&mut self, property: &PropertyDef) {
            self.see(property.id());
        }
        fn visit_function(&mut self, function: &FunctionDef) {
            self.see(function.id());
            walk_function(self, function);
        }
        fn visit_param(&mut self, param: &ParamDef) {
            self.see(param.id());
            walk_param(self, param);
        }
        fn visit_binding(&mut self, binding: &PropertyBinding) {
            self.see(binding.id());
            walk_binding(self, binding);
        }
        fn visit_block(&mut self, block: &Block) {
            self.see(block.id());
            walk_block(self, block);
        }
        fn visit_stmt(&mut self, stmt: &Stmt) {
            self.see(stmt.id());
            walk_stmt(self, stmt);
        }
        fn visit_catch(&mut self, catch: &CatchClause) {
            self.see(catch.id());
            walk_catch(self, catch);
        }
        fn visit_expr(&mut self, expr: &Expr) {
            self.see(expr.id());
            walk_expr(self, expr);
        }
    }

    let mut max = MaxId(assembly.id());
    max.visit_assembly(assembly);
    max.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::AstBuilder;
    use crate::ops::BinaryOp;

    struct CountVars(usize);

    impl Visitor for CountVars {
        fn visit_expr(&mut self, expr: &Expr) {
            if expr.var_name().is_some() {
                self.0 += 1;
            }
            walk_expr(self, expr);
        }
    }

    #[test]
    fn test_visits_nested_expressions() {
        let mut b = AstBuilder::new();
        let x = b.var("x");
        let y = b.var("y");
        let sum = b.binary(BinaryOp::Add, x, y);
        let ret = b.ret(Some(sum));
        let body = b.block(vec![ret]);
        let a = b.param("x", "int");
        let c = b.param("y", "int");
        let f = b.function("add", vec![a, c], "int", body);
        let program = b.program(vec![f]);

        let mut counter = CountVars(0);
        counter.visit_assembly(&program);
        assert_eq!(counter.0, 2);
    }

    #[test]
    fn test_max_node_id_finds_last_allocated() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let stmt = b.expr_stmt(one);
        let body = b.block(vec![stmt]);
        let f = b.function("main", vec![], "void", body);
        let program = b.program(vec![f]);
        let mut next = AstBuilder::starting_after(max_node_id(&program));
        assert_eq!(next.fresh_id().as_u32(), program.id().as_u32() + 1);
    }
}
