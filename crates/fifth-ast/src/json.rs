//! JSON interchange for syntax trees
//!
//! A front end hands the backend its tree as JSON. Node ids are not part of
//! the format, so a loaded tree is renumbered before anything else sees it.

use crate::ast::*;
use crate::builder::AstBuilder;
use crate::error::AstResult;
use crate::node::AstNode;
use crate::rewrite::{self, Rewriter, Rewritten};
use std::rc::Rc;

/// Parse an assembly and give every node a fresh id
pub fn from_json(text: &str) -> AstResult<Rc<AssemblyDef>> {
    let assembly: Rc<AssemblyDef> = serde_json::from_str(text)?;
    Ok(renumber(&assembly))
}

/// Serialize an assembly
pub fn to_json(assembly: &AssemblyDef) -> AstResult<String> {
    Ok(serde_json::to_string_pretty(assembly)?)
}

/// Copy of `assembly` in which node ids are unique and start at 1
pub fn renumber(assembly: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
    Renumber {
        builder: AstBuilder::new(),
    }
    .rewrite_assembly(assembly)
}

struct Renumber {
    builder: AstBuilder,
}

impl Renumber {
    fn stamp<T: AstNode>(&mut self, node: &T) -> Rc<T> {
        let meta = node.meta().with_id(self.builder.fresh_id());
        Rc::new(node.with_meta(meta))
    }
}

impl Rewriter for Renumber {
    fn rewrite_assembly(&mut self, assembly: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
        let walked = rewrite::walk_assembly(self, assembly);
        self.stamp(&*walked)
    }

    fn rewrite_module(&mut self, module: &Rc<ModuleDef>) -> Rc<ModuleDef> {
        let walked = rewrite::walk_module(self, module);
        self.stamp(&*walked)
    }

    fn rewrite_class(&mut self, class: &Rc<ClassDef>) -> Rc<ClassDef> {
        let walked = rewrite::walk_class(self, class);
        self.stamp(&*walked)
    }

    fn rewrite_field(&mut self, field: &Rc<FieldDef>) -> Rc<FieldDef> {
        self.stamp(&**field)
    }

    fn rewrite_property(&mut self, property: &Rc<PropertyDef>) -> Rc<PropertyDef> {
        self.stamp(&**property)
    }

    fn rewrite_function(&mut self, function: &Rc<FunctionDef>) -> Rc<FunctionDef> {
        let walked = rewrite::walk_function(self, function);
        self.stamp(&*walked)
    }

    fn rewrite_param(&mut self, param: &Rc<ParamDef>) -> Rewritten<Rc<ParamDef>> {
        let walked = rewrite::walk_param(self, param);
        Rewritten::with_prologue(self.stamp(&*walked.node), walked.prologue)
    }

    fn rewrite_binding(&mut self, binding: &Rc<PropertyBinding>) -> Rewritten<Rc<PropertyBinding>> {
        let walked = rewrite::walk_binding(self, binding);
        Rewritten::with_prologue(self.stamp(&*walked.node), walked.prologue)
    }

    fn rewrite_block(&mut self, block: &Rc<Block>) -> Rc<Block> {
        let walked = rewrite::walk_block(self, block);
        self.stamp(&*walked)
    }

    fn rewrite_stmt(&mut self, stmt: &StmtRef) -> Rewritten<StmtRef> {
        let walked = rewrite::walk_stmt(self, stmt);
        Rewritten::with_prologue(self.stamp(&*walked.node), walked.prologue)
    }

    fn rewrite_catch(&mut self, catch: &Rc<CatchClause>) -> Rc<CatchClause> {
        let walked = rewrite::walk_catch(self, catch);
        self.stamp(&*walked)
    }

    fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
        let walked = rewrite::walk_expr(self, expr);
        Rewritten::with_prologue(self.stamp(&*walked.node), walked.prologue)
    }
}
