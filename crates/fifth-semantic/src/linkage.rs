//! Parent links
//!
//! The tree itself only points downward. Scope lookup needs the way up, so
//! it is derived into a side table keyed by [`NodeId`] and rebuilt after
//! every phase that restructures the tree.

use fifth_ast::visit::{self, Visitor};
use fifth_ast::*;
use rustc_hash::FxHashMap;

/// NodeId → parent NodeId for a whole assembly
#[derive(Debug, Clone, Default)]
pub struct ParentMap {
    parents: FxHashMap<NodeId, NodeId>,
    root: Option<NodeId>,
}

impl ParentMap {
    /// Derive the parent table of `assembly`
    pub fn build(assembly: &AssemblyDef) -> Self {
        let mut linker = Linker {
            map: ParentMap {
                parents: FxHashMap::default(),
                root: Some(assembly.id()),
            },
            stack: vec![assembly.id()],
        };
        visit::walk_assembly(&mut linker, assembly);
        linker.map
    }

    /// Parent of `node`; `None` for the root and for unknown nodes
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(&node).copied()
    }

    /// Whether `node` is part of the linked tree
    pub fn contains(&self, node: NodeId) -> bool {
        self.root == Some(node) || self.parents.contains_key(&node)
    }

    /// `node` followed by its ancestors up to the root
    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors {
            map: self,
            next: Some(node),
        }
    }

    /// Number of linked non-root nodes
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether nothing is linked
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Iterator over a node and its ancestors
pub struct Ancestors<'a> {
    map: &'a ParentMap,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.map.parent(current);
        Some(current)
    }
}

struct Linker {
    map: ParentMap,
    stack: Vec<NodeId>,
}

impl Linker {
    fn enter(&mut self, id: NodeId) {
        if let Some(&parent) = self.stack.last() {
            self.map.parents.insert(id, parent);
        }
        self.stack.push(id);
    }

    fn leave(&mut self) {
        self.stack.pop();
    }
}

impl Visitor for Linker {
    fn visit_module(&mut self, module: &ModuleDef) {
        self.enter(module.id());
        visit::walk_module(self, module);
        self.leave();
    }

    fn visit_class(&mut self, class: &ClassDef) {
        self.enter(class.id());
        visit::walk_class(self, class);
        self.leave();
    }

    fn visit_field(&mut self, field: &FieldDef) {
        self.enter(field.id());
        self.leave();
    }

    fn visit_property(&mut self, property: &PropertyDef) {
        self.enter(property.id());
        self.leave();
    }

    fn visit_function(&mut self, function: &FunctionDef) {
        self.enter(function.id());
        visit::walk_function(self, function);
        self.leave();
    }

    fn visit_param(&mut self, param: &ParamDef) {
        self.enter(param.id());
        visit::walk_param(self, param);
        self.leave();
    }

    fn visit_binding(&mut self, binding: &PropertyBinding) {
        self.enter(binding.id());
        visit::walk_binding(self, binding);
        self.leave();
    }

    fn visit_block(&mut self, block: &Block) {
        self.enter(block.id());
        visit::walk_block(self, block);
        self.leave();
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        self.enter(stmt.id());
        visit::walk_stmt(self, stmt);
        self.leave();
    }

    fn visit_catch(&mut self, catch: &CatchClause) {
        self.enter(catch.id());
        visit::walk_catch(self, catch);
        self.leave();
    }

    fn visit_expr(&mut self, expr: &Expr) {
        self.enter(expr.id());
        visit::walk_expr(self, expr);
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parents_follow_the_tree() {
        let mut b = AstBuilder::new();
        let x = b.var("x");
        let ret = b.ret(Some(x.clone()));
        let body = b.block(vec![ret.clone()]);
        let param = b.param("x", "int");
        let f = b.function("id", vec![param.clone()], "int", body.clone());
        let program = b.program(vec![f.clone()]);

        let parents = ParentMap::build(&program);
        assert_eq!(parents.parent(x.id()), Some(ret.id()));
        assert_eq!(parents.parent(ret.id()), Some(body.id()));
        assert_eq!(parents.parent(body.id()), Some(f.id()));
        assert_eq!(parents.parent(param.id()), Some(f.id()));
        assert_eq!(parents.parent(program.id()), None);

        let chain: Vec<_> = parents.ancestors(x.id()).collect();
        assert_eq!(chain.len(), 6);
        assert_eq!(chain.last(), Some(&program.id()));
    }

    #[test]
    fn test_unknown_node_has_no_parent() {
        let mut b = AstBuilder::new();
        let program = b.program(vec![]);
        let stray = b.int(3);
        let parents = ParentMap::build(&program);
        assert!(!parents.contains(stray.id()));
        assert!(parents.contains(program.id()));
    }
}
