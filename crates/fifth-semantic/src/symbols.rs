//! Symbol tables with scope management
//!
//! One scope per module, class, function and block (catch clauses and list
//! comprehensions open a block scope of their own). Scopes are keyed by the
//! [`NodeId`] of the node that owns them, so a reference is resolved by
//! walking its ancestors in the [`ParentMap`] to the first scope owner and
//! from there up the scope chain.

use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::linkage::ParentMap;
use fifth_ast::visit::{self, Visitor};
use fifth_ast::*;
use fifth_types::FifthType;
use rustc_hash::FxHashMap;

/// What a name denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// User class
    Class,
    /// Module function or class method
    Function,
    /// Class field or property
    Field,
    /// Function parameter
    Parameter,
    /// Local variable, destructured binding or catch variable
    Local,
}

/// Symbol information
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Symbol name
    pub name: String,
    /// Symbol kind
    pub kind: SymbolKind,
    /// Declared type; `Unknown` until inferred
    pub ty: FifthType,
    /// Declaring node
    pub node: NodeId,
}

/// Scope identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// Scope kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Whole assembly
    Global,
    /// Module
    Module,
    /// Class body
    Class,
    /// Function parameters
    Function,
    /// Block
    Block,
}

/// Scope in the scope tree
#[derive(Debug, Clone)]
pub struct Scope {
    /// Scope ID
    pub id: ScopeId,
    /// Scope kind
    pub kind: ScopeKind,
    /// Node owning the scope
    pub owner: NodeId,
    /// Enclosing scope
    pub parent: Option<ScopeId>,
    /// Symbols defined in this scope
    pub symbols: FxHashMap<String, Symbol>,
}

/// Symbol tables for a whole assembly
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    by_owner: FxHashMap<NodeId, ScopeId>,
}

impl SymbolTable {
    /// Build the tables for `assembly`; duplicate definitions are errors
    pub fn build(assembly: &AssemblyDef, diagnostics: &mut Diagnostics) -> Self {
        let mut binder = Binder {
            table: SymbolTable::default(),
            current: ScopeId(0),
            diagnostics,
        };
        binder.push_scope(ScopeKind::Global, assembly.id());
        visit::walk_assembly(&mut binder, assembly);
        binder.table
    }

    /// Scope owned by `node`
    pub fn scope_of(&self, node: NodeId) -> Option<&Scope> {
        self.by_owner.get(&node).map(|id| self.get_scope(*id))
    }

    /// Get a scope by ID
    pub fn get_scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// Number of scopes
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Resolve `name` from a scope outward
    pub fn resolve_from_scope(&self, name: &str, mut scope_id: ScopeId) -> Option<&Symbol> {
        loop {
            let scope = self.get_scope(scope_id);
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(symbol);
            }
            scope_id = scope.parent?;
        }
    }

    /// Resolve `name` as seen from `node`
    pub fn resolve_at(&self, name: &str, node: NodeId, parents: &ParentMap) -> Option<&Symbol> {
        let scope = parents
            .ancestors(node)
            .find_map(|ancestor| self.by_owner.get(&ancestor).copied())?;
        self.resolve_from_scope(name, scope)
    }
}

struct Binder<'d> {
    table: SymbolTable,
    current: ScopeId,
    diagnostics: &'d mut Diagnostics,
}

impl Binder<'_> {
    fn push_scope(&mut self, kind: ScopeKind, owner: NodeId) {
        let id = ScopeId(self.table.scopes.len() as u32);
        let parent = (!self.table.scopes.is_empty()).then_some(self.current);
        self.table.scopes.push(Scope {
            id,
            kind,
            owner,
            parent,
            symbols: FxHashMap::default(),
        });
        self.table.by_owner.insert(owner, id);
        self.current = id;
    }

    fn pop_scope(&mut self) {
        if let Some(parent) = self.table.get_scope(self.current).parent {
            self.current = parent;
        }
    }

    fn define(&mut self, symbol: Symbol, location: Option<&SourceLocation>) {
        let scope = &mut self.table.scopes[self.current.0 as usize];
        if let Some(existing) = scope.symbols.get(&symbol.name) {
            // Functions of one name form an overload group
            if existing.kind == SymbolKind::Function && symbol.kind == SymbolKind::Function {
                return;
            }
            self.diagnostics.push(
                Diagnostic::error(format!("Duplicate definition of '{}'", symbol.name))
                    .with_location(location.cloned()),
            );
            return;
        }
        scope.symbols.insert(symbol.name.clone(), symbol);
    }

    fn define_node(
        &mut self,
        name: &str,
        kind: SymbolKind,
        ty: FifthType,
        node: &impl AstNode,
    ) {
        let symbol = Symbol {
            name: name.to_string(),
            kind,
            ty,
            node: node.id(),
        };
        self.define(symbol, node.location());
    }
}

fn function_type(function: &FunctionDef) -> FifthType {
    FifthType::Function {
        params: function
            .params
            .iter()
            .map(|p| FifthType::parse(&p.type_name))
            .collect(),
        returns: Box::new(function.return_fifth_type()),
    }
}

impl Visitor for Binder<'_> {
    fn visit_module(&mut self, module: &ModuleDef) {
        self.push_scope(ScopeKind::Module, module.id());
        for class in &module.classes {
            let ty = FifthType::Named(class.name.clone());
            self.define_node(&class.name, SymbolKind::Class, ty, &**class);
        }
        for function in &module.functions {
            self.define_node(&function.name, SymbolKind::Function, function_type(function), &**function);
        }
        visit::walk_module(self, module);
        self.pop_scope();
    }

    fn visit_class(&mut self, class: &ClassDef) {
        self.push_scope(ScopeKind::Class, class.id());
        for field in &class.fields {
            self.define_node(&field.name, SymbolKind::Field, FifthType::parse(&field.type_name), &**field);
        }
        for property in &class.properties {
            let ty = FifthType::parse(&property.type_name);
            self.define_node(&property.name, SymbolKind::Field, ty, &**property);
        }
        for method in class.methods.iter().filter(|m| m.kind != FunctionKind::Constructor) {
            self.define_node(&method.name, SymbolKind::Function, function_type(method), &**method);
        }
        visit::walk_class(self, class);
        self.pop_scope();
    }

    fn visit_function(&mut self, function: &FunctionDef) {
        self.push_scope(ScopeKind::Function, function.id());
        visit::walk_function(self, function);
        self.pop_scope();
    }

    fn visit_param(&mut self, param: &ParamDef) {
        self.define_node(&param.name, SymbolKind::Parameter, FifthType::parse(&param.type_name), param);
        visit::walk_param(self, param);
    }

    fn visit_binding(&mut self, binding: &PropertyBinding) {
        self.define_node(&binding.variable, SymbolKind::Local, FifthType::Unknown, binding);
        visit::walk_binding(self, binding);
    }

    fn visit_block(&mut self, block: &Block) {
        self.push_scope(ScopeKind::Block, block.id());
        visit::walk_block(self, block);
        self.pop_scope();
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let StmtKind::VarDecl { name, type_name, .. } = &stmt.kind {
            let ty = type_name
                .as_deref()
                .map(FifthType::parse)
                .unwrap_or_default();
            self.define_node(name, SymbolKind::Local, ty, stmt);
        }
        visit::walk_stmt(self, stmt);
    }

    fn visit_catch(&mut self, catch: &CatchClause) {
        self.push_scope(ScopeKind::Block, catch.id());
        if let Some(variable) = &catch.variable {
            let ty = catch
                .exception_type
                .as_deref()
                .map(FifthType::parse)
                .unwrap_or_else(|| FifthType::parse("System.Exception"));
            self.define_node(variable, SymbolKind::Local, ty, catch);
        }
        visit::walk_catch(self, catch);
        self.pop_scope();
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let ExprKind::ListComprehension { var, .. } = &expr.kind {
            self.push_scope(ScopeKind::Block, expr.id());
            self.define_node(var, SymbolKind::Local, FifthType::Unknown, expr);
            visit::walk_expr(self, expr);
            self.pop_scope();
            return;
        }
        visit::walk_expr(self, expr);
    }
}
