//! Node construction with fresh ids
//!
//! Every node that enters a tree through an [`AstBuilder`] receives a new
//! [`NodeId`]. Lowering phases own a builder seeded past the highest id in
//! their input, so synthesized nodes never collide with existing ones.

use crate::ast::*;
use crate::node::{Meta, NodeId, SourceLocation};
use crate::ops::{BinaryOp, UnaryOp};
use std::rc::Rc;

/// Factory for AST nodes
#[derive(Debug, Clone)]
pub struct AstBuilder {
    next: u32,
    location: Option<SourceLocation>,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    /// Builder whose first id is 1
    pub fn new() -> Self {
        Self {
            next: 1,
            location: None,
        }
    }

    /// Builder that continues numbering after `last`
    pub fn starting_after(last: NodeId) -> Self {
        Self {
            next: last.0 + 1,
            location: None,
        }
    }

    /// Attach `location` to every node built until it is changed again
    pub fn set_location(&mut self, location: Option<SourceLocation>) {
        self.location = location;
    }

    /// Allocate the next id
    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    /// Metadata for a new node
    pub fn meta(&mut self) -> Meta {
        Meta {
            id: self.fresh_id(),
            location: self.location.clone(),
            ty: None,
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Expression of any kind
    pub fn expr(&mut self, kind: ExprKind) -> ExprRef {
        Rc::new(Expr {
            meta: self.meta(),
            kind,
        })
    }

    /// Literal expression
    pub fn literal(&mut self, literal: Literal) -> ExprRef {
        self.expr(ExprKind::Literal(literal))
    }

    /// `int` literal
    pub fn int(&mut self, value: i32) -> ExprRef {
        self.literal(Literal::Int(value))
    }

    /// `bool` literal
    pub fn bool(&mut self, value: bool) -> ExprRef {
        self.literal(Literal::Bool(value))
    }

    /// `string` literal
    pub fn string(&mut self, value: impl Into<String>) -> ExprRef {
        self.literal(Literal::String(value.into()))
    }

    /// Variable reference
    pub fn var(&mut self, name: impl Into<String>) -> ExprRef {
        self.expr(ExprKind::VarRef(name.into()))
    }

    /// Binary operation
    pub fn binary(&mut self, op: BinaryOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.expr(ExprKind::Binary { op, lhs, rhs })
    }

    /// Unary operation
    pub fn unary(&mut self, op: UnaryOp, operand: ExprRef) -> ExprRef {
        self.expr(ExprKind::Unary { op, operand })
    }

    /// Unbound call
    pub fn call(&mut self, name: impl Into<String>, args: Vec<ExprRef>) -> ExprRef {
        self.expr(ExprKind::Call {
            name: name.into(),
            args,
            target: CallTarget::Unresolved,
        })
    }

    /// `lhs.rhs`
    pub fn member(&mut self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.expr(ExprKind::MemberAccess {
            lhs,
            rhs: Some(rhs),
        })
    }

    /// `lhs.name` where `name` is a field or property
    pub fn field_access(&mut self, lhs: ExprRef, name: impl Into<String>) -> ExprRef {
        let rhs = self.var(name);
        self.member(lhs, rhs)
    }

    /// `new Type { name = value, ... }`
    pub fn object_init(
        &mut self,
        type_name: impl Into<String>,
        properties: Vec<(String, ExprRef)>,
    ) -> ExprRef {
        self.expr(ExprKind::ObjectInit {
            type_name: type_name.into(),
            properties: properties
                .into_iter()
                .map(|(name, value)| PropertyInit { name, value })
                .collect(),
        })
    }

    /// `[a, b, ...]`
    pub fn list(&mut self, elements: Vec<ExprRef>) -> ExprRef {
        self.expr(ExprKind::List { elements })
    }

    /// `<s, p, o>`
    pub fn triple(&mut self, subject: ExprRef, predicate: ExprRef, object: ExprRef) -> ExprRef {
        self.expr(ExprKind::Triple {
            subject,
            predicate,
            object,
        })
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Statement of any kind
    pub fn stmt(&mut self, kind: StmtKind) -> StmtRef {
        Rc::new(Stmt {
            meta: self.meta(),
            kind,
        })
    }

    /// Block
    pub fn block(&mut self, statements: Vec<StmtRef>) -> Rc<Block> {
        Rc::new(Block {
            meta: self.meta(),
            statements,
        })
    }

    /// `name: type = init;`
    pub fn var_decl(
        &mut self,
        name: impl Into<String>,
        type_name: Option<&str>,
        init: Option<ExprRef>,
    ) -> StmtRef {
        self.stmt(StmtKind::VarDecl {
            name: name.into(),
            type_name: type_name.map(str::to_string),
            init,
        })
    }

    /// `target = value;`
    pub fn assign(&mut self, target: ExprRef, value: ExprRef) -> StmtRef {
        self.stmt(StmtKind::Assign { target, value })
    }

    /// Expression statement
    pub fn expr_stmt(&mut self, expr: ExprRef) -> StmtRef {
        self.stmt(StmtKind::Expr(expr))
    }

    /// `return value;`
    pub fn ret(&mut self, value: Option<ExprRef>) -> StmtRef {
        self.stmt(StmtKind::Return(value))
    }

    /// `if (cond) { ... } else { ... }`
    pub fn if_else(
        &mut self,
        cond: ExprRef,
        then_block: Rc<Block>,
        else_block: Option<Rc<Block>>,
    ) -> StmtRef {
        self.stmt(StmtKind::If {
            cond,
            then_block,
            else_block,
        })
    }

    /// `while (cond) { ... }`
    pub fn while_loop(&mut self, cond: ExprRef, body: Rc<Block>) -> StmtRef {
        self.stmt(StmtKind::While { cond, body })
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Unguarded parameter
    pub fn param(&mut self, name: impl Into<String>, type_name: impl Into<String>) -> Rc<ParamDef> {
        self.guarded_param(name, type_name, None)
    }

    /// Parameter with an optional guard
    pub fn guarded_param(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        guard: Option<ExprRef>,
    ) -> Rc<ParamDef> {
        Rc::new(ParamDef {
            meta: self.meta(),
            name: name.into(),
            type_name: type_name.into(),
            guard,
            destructuring: None,
        })
    }

    /// Destructuring binding `variable: property`
    pub fn binding(
        &mut self,
        variable: impl Into<String>,
        property: impl Into<String>,
        constraint: Option<ExprRef>,
    ) -> Rc<PropertyBinding> {
        Rc::new(PropertyBinding {
            meta: self.meta(),
            variable: variable.into(),
            property: property.into(),
            constraint,
        })
    }

    /// Module-level function
    pub fn function(
        &mut self,
        name: impl Into<String>,
        params: Vec<Rc<ParamDef>>,
        return_type: impl Into<String>,
        body: Rc<Block>,
    ) -> Rc<FunctionDef> {
        self.callable(name, params, return_type, body, FunctionKind::Function)
    }

    /// Function, method or constructor
    pub fn callable(
        &mut self,
        name: impl Into<String>,
        params: Vec<Rc<ParamDef>>,
        return_type: impl Into<String>,
        body: Rc<Block>,
        kind: FunctionKind,
    ) -> Rc<FunctionDef> {
        Rc::new(FunctionDef {
            meta: self.meta(),
            name: name.into(),
            params,
            return_type: return_type.into(),
            body,
            kind,
        })
    }

    /// Class field
    pub fn field(&mut self, name: impl Into<String>, type_name: impl Into<String>) -> Rc<FieldDef> {
        Rc::new(FieldDef {
            meta: self.meta(),
            name: name.into(),
            type_name: type_name.into(),
        })
    }

    /// Class property
    pub fn property(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Rc<PropertyDef> {
        Rc::new(PropertyDef {
            meta: self.meta(),
            name: name.into(),
            type_name: type_name.into(),
        })
    }

    /// Class
    pub fn class(
        &mut self,
        name: impl Into<String>,
        fields: Vec<Rc<FieldDef>>,
        properties: Vec<Rc<PropertyDef>>,
        methods: Vec<Rc<FunctionDef>>,
    ) -> Rc<ClassDef> {
        Rc::new(ClassDef {
            meta: self.meta(),
            name: name.into(),
            base: None,
            fields,
            properties,
            methods,
        })
    }

    /// Module
    pub fn module(
        &mut self,
        name: impl Into<String>,
        classes: Vec<Rc<ClassDef>>,
        functions: Vec<Rc<FunctionDef>>,
    ) -> Rc<ModuleDef> {
        Rc::new(ModuleDef {
            meta: self.meta(),
            name: name.into(),
            namespace: None,
            classes,
            functions,
        })
    }

    /// Assembly
    pub fn assembly(&mut self, name: impl Into<String>, modules: Vec<Rc<ModuleDef>>) -> Rc<AssemblyDef> {
        Rc::new(AssemblyDef {
            meta: self.meta(),
            name: name.into(),
            version: None,
            modules,
        })
    }

    /// Single-module program made of top-level functions
    pub fn program(&mut self, functions: Vec<Rc<FunctionDef>>) -> Rc<AssemblyDef> {
        let module = self.module("main", vec![], functions);
        self.assembly("program", vec![module])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::AstNode;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let two = b.int(2);
        let sum = b.binary(BinaryOp::Add, one.clone(), two.clone());
        assert_eq!(one.id().as_u32(), 1);
        assert_eq!(two.id().as_u32(), 2);
        assert_eq!(sum.id().as_u32(), 3);
    }

    #[test]
    fn test_starting_after_skips_existing_ids() {
        let mut b = AstBuilder::starting_after(NodeId(41));
        assert_eq!(b.fresh_id().as_u32(), 42);
    }

    #[test]
    fn test_location_is_attached() {
        let mut b = AstBuilder::new();
        b.set_location(Some(SourceLocation::new("a.5th", 2, 3)));
        let lit = b.int(0);
        assert_eq!(lit.location(), Some(&SourceLocation::new("a.5th", 2, 3)));
    }
}
