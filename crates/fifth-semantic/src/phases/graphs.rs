//! Knowledge-graph lowering
//!
//! Graph literals and additions over graphs and triples become calls into
//! the knowledge-graph host, with each fresh graph hoisted into a
//! `__graphN` declaration ahead of the statement that needs it.

use super::builder_for;
use fifth_ast::rewrite::{self, Rewriter, Rewritten};
use fifth_ast::visit::{self, Visitor};
use fifth_ast::*;
use fifth_types::{FifthType, HostType};
use std::rc::Rc;

/// Host type providing the graph operations
pub(crate) fn kg_host() -> HostType {
    HostType::new("Fifth.System.KG")
}

/// `KG.name(args)` typed as `returns`
pub(crate) fn kg_call(b: &mut AstBuilder, name: &str, args: Vec<ExprRef>, returns: FifthType) -> ExprRef {
    b.expr(ExprKind::Call {
        name: name.to_string(),
        args,
        target: CallTarget::External { host: kg_host() },
    })
    .with_type(returns)
}

fn graph_type() -> FifthType {
    FifthType::Host(HostType::graph())
}

/// Next unused `__graphN` index
fn first_free_index(ast: &AssemblyDef) -> u32 {
    struct Scan(u32);

    impl Visitor for Scan {
        fn visit_stmt(&mut self, stmt: &Stmt) {
            if let StmtKind::VarDecl { name, .. } = &stmt.kind {
                if let Some(n) = name.strip_prefix("__graph").and_then(|n| n.parse::<u32>().ok()) {
                    self.0 = self.0.max(n + 1);
                }
            }
            visit::walk_stmt(self, stmt);
        }
    }

    let mut scan = Scan(0);
    scan.visit_assembly(ast);
    scan.0
}

struct GraphLowering {
    builder: AstBuilder,
    next: u32,
    literals: bool,
}

impl GraphLowering {
    fn new(ast: &AssemblyDef, literals: bool) -> Self {
        Self {
            builder: builder_for(ast),
            next: first_free_index(ast),
            literals,
        }
    }

    /// Declare a fresh empty graph; returns its name
    fn fresh_graph(&mut self, prologue: &mut Vec<StmtRef>) -> String {
        let name = format!("__graph{}", self.next);
        self.next += 1;
        let create = kg_call(&mut self.builder, "CreateGraph", vec![], graph_type());
        prologue.push(self.builder.var_decl(name.clone(), Some("graph"), Some(create)));
        name
    }

    /// `KG.Merge(graph, operand)` or `KG.Assert(graph, operand)` as a statement
    fn absorb(&mut self, graph: &str, operand: ExprRef, prologue: &mut Vec<StmtRef>) {
        let b = &mut self.builder;
        let method = if operand.ty().is_some_and(FifthType::is_graph) {
            "Merge"
        } else {
            "Assert"
        };
        let target = b.var(graph).with_type(graph_type());
        let call = kg_call(b, method, vec![target, operand], graph_type());
        prologue.push(b.expr_stmt(call));
    }

    fn lower(&mut self, expr: &ExprRef, operands: Vec<ExprRef>, prologue: &mut Vec<StmtRef>) -> ExprRef {
        self.builder.set_location(expr.location().cloned());
        let graph = self.fresh_graph(prologue);
        for operand in operands {
            self.absorb(&graph, operand, prologue);
        }
        tracing::trace!(graph = %graph, "hoisted graph construction");
        self.builder.var(graph).with_type(graph_type())
    }
}

fn is_rdf(expr: &Expr) -> bool {
    expr.ty().is_some_and(|ty| ty.is_graph() || ty.is_triple())
}

impl Rewriter for GraphLowering {
    fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
        let Rewritten { node, mut prologue } = rewrite::walk_expr(self, expr);
        let lowered = match &node.kind {
            ExprKind::Graph { triples } if self.literals => {
                let triples = triples.clone();
                Some(self.lower(&node, triples, &mut prologue))
            }
            ExprKind::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
            } if !self.literals && is_rdf(lhs) && is_rdf(rhs) => {
                let operands = vec![lhs.clone(), rhs.clone()];
                Some(self.lower(&node, operands, &mut prologue))
            }
            _ => None,
        };
        Rewritten::with_prologue(lowered.unwrap_or(node), prologue)
    }
}

pub(super) fn lower_literals(ast: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
    GraphLowering::new(ast, true).rewrite_assembly(ast)
}

pub(super) fn lower_additions(ast: &Rc<AssemblyDef>) -> Rc<AssemblyDef> {
    GraphLowering::new(ast, false).rewrite_assembly(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(b: &mut AstBuilder) -> ExprRef {
        let s = b.string("http://example.org/s");
        let p = b.string("http://example.org/p");
        let o = b.int(1);
        b.triple(s, p, o).with_type(FifthType::Host(HostType::triple()))
    }

    fn call_name(stmt: &Stmt) -> &str {
        match &stmt.kind {
            StmtKind::Expr(expr) => match &expr.kind {
                ExprKind::Call { name, .. } => name,
                _ => panic!("expected call"),
            },
            StmtKind::VarDecl { init: Some(init), .. } => match &init.kind {
                ExprKind::Call { name, .. } => name,
                _ => panic!("expected call"),
            },
            _ => panic!("unexpected statement"),
        }
    }

    fn main_with(b: &mut AstBuilder, value: ExprRef) -> Rc<AssemblyDef> {
        let decl = b.var_decl("g", Some("graph"), Some(value));
        let body = b.block(vec![decl]);
        let main = b.function("main", vec![], "void", body);
        b.program(vec![main])
    }

    #[test]
    fn test_graph_literal_is_hoisted() {
        let mut b = AstBuilder::new();
        let triples = vec![triple(&mut b), triple(&mut b)];
        let graph = b.expr(ExprKind::Graph { triples });
        let program = main_with(&mut b, graph);

        let lowered = lower_literals(&program);
        let statements = &lowered.modules[0].functions[0].body.statements;
        let names: Vec<_> = statements[..3].iter().map(|s| call_name(s)).collect();
        assert_eq!(names, ["CreateGraph", "Assert", "Assert"]);
        let StmtKind::VarDecl { init: Some(init), .. } = &statements[3].kind else {
            panic!("expected declaration");
        };
        assert_eq!(init.var_name(), Some("__graph0"));
    }

    #[test]
    fn test_triple_addition_builds_a_graph() {
        let mut b = AstBuilder::new();
        let graph = b.var("h").with_type(graph_type());
        let t = triple(&mut b);
        let sum = b.binary(BinaryOp::Add, graph, t).with_type(graph_type());
        let program = main_with(&mut b, sum);

        let lowered = lower_additions(&program);
        let statements = &lowered.modules[0].functions[0].body.statements;
        let names: Vec<_> = statements[..3].iter().map(|s| call_name(s)).collect();
        assert_eq!(names, ["CreateGraph", "Merge", "Assert"]);

        // Literal lowering leaves additions alone
        assert!(Rc::ptr_eq(&lower_literals(&program), &program));
    }

    #[test]
    fn test_fresh_names_skip_existing_ones() {
        let mut b = AstBuilder::new();
        let taken = b.var_decl("__graph4", Some("graph"), None);
        let graph = b.expr(ExprKind::Graph { triples: vec![] });
        let decl = b.var_decl("g", Some("graph"), Some(graph));
        let body = b.block(vec![taken, decl]);
        let main = b.function("main", vec![], "void", body);
        let program = b.program(vec![main]);

        let lowered = lower_literals(&program);
        let StmtKind::VarDecl { name, .. } = &lowered.modules[0].functions[0].body.statements[1].kind else {
            panic!("expected declaration");
        };
        assert_eq!(name, "__graph5");
    }
}
