//! Lowering phases
//!
//! Each phase maps an assembly to an assembly. Phases that only validate
//! return their input unchanged; rewriting phases go through the
//! [`Rewriter`] so untouched subtrees stay shared.

mod annotate;
mod builtins;
mod classes;
mod destructuring;
mod external;
mod graphs;
mod loops;
mod operators;
mod overloads;
mod resolution;
mod try_catch;

pub use annotate::TYPE_MISMATCH;
pub use external::{NO_MATCHING_OVERLOAD, UNKNOWN_EXTERNAL_TYPE};
pub use overloads::{
    OverloadGroup, ARITY_MISMATCH, BASE_NOT_LAST, DUPLICATE_GUARD, GUARD_INCOMPLETE,
    MULTIPLE_BASE,
};
pub use resolution::UNRESOLVED_SYMBOL;
pub use try_catch::{CATCH_ALL_NOT_LAST, DUPLICATE_CATCH, EMPTY_TRY};

use crate::diagnostic::Diagnostics;
use crate::linkage::ParentMap;
use crate::pipeline::AnalysisPhase;
use crate::symbols::SymbolTable;
use fifth_ast::rewrite::{self, Rewriter, Rewritten};
use fifth_ast::*;
use fifth_types::HostTypeProvider;
use std::rc::Rc;

/// State threaded through the phases of one pipeline run
pub struct PhaseContext<'a> {
    /// Host signature provider
    pub host: &'a dyn HostTypeProvider,
    /// Diagnostics sink
    pub diagnostics: &'a mut Diagnostics,
    /// Parent links, rebuilt by the linking phases
    pub parents: ParentMap,
    /// Symbol tables, rebuilt by the symbol phases
    pub symbols: SymbolTable,
    /// Overload groups found by gathering
    pub overloads: Vec<OverloadGroup>,
}

impl<'a> PhaseContext<'a> {
    /// Fresh context
    pub fn new(host: &'a dyn HostTypeProvider, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            host,
            diagnostics,
            parents: ParentMap::default(),
            symbols: SymbolTable::default(),
            overloads: Vec::new(),
        }
    }
}

/// Run one phase
pub fn run(phase: AnalysisPhase, ast: &Rc<AssemblyDef>, cx: &mut PhaseContext<'_>) -> Rc<AssemblyDef> {
    match phase {
        AnalysisPhase::TreeLink | AnalysisPhase::TreeRelink | AnalysisPhase::TreeFinalLink => {
            cx.parents = ParentMap::build(ast);
            ast.clone()
        }
        AnalysisPhase::SymbolTable
        | AnalysisPhase::SymbolTableRebuild
        | AnalysisPhase::SymbolTableFinal => {
            cx.symbols = SymbolTable::build(ast, cx.diagnostics);
            ast.clone()
        }
        AnalysisPhase::BuiltinInjection => builtins::inject(ast, cx),
        AnalysisPhase::ClassCtorInsertion => classes::insert_constructors(ast),
        AnalysisPhase::PropertyToField => classes::properties_to_fields(ast),
        AnalysisPhase::OverloadGathering => {
            cx.overloads = overloads::gather(ast);
            ast.clone()
        }
        AnalysisPhase::GuardCompleteness => {
            overloads::validate(&cx.overloads, cx.diagnostics);
            ast.clone()
        }
        AnalysisPhase::OverloadTransform => overloads::transform(ast, &cx.overloads),
        AnalysisPhase::DestructuringLowering => destructuring::lower(ast),
        AnalysisPhase::VarRefResolution => resolution::resolve(ast, cx),
        AnalysisPhase::TypeAnnotation => annotate::annotate(ast, cx, true),
        AnalysisPhase::TypeAnnotationFinal => annotate::annotate(ast, cx, false),
        AnalysisPhase::ExternalCallValidation => external::validate(ast, cx),
        AnalysisPhase::TryCatchValidation => {
            try_catch::validate(ast, cx.diagnostics);
            ast.clone()
        }
        AnalysisPhase::ForLoopLowering => loops::lower(ast),
        AnalysisPhase::AugmentedAssignmentLowering => operators::lower_compound(ast),
        AnalysisPhase::UnaryOperatorLowering => operators::lower_unary(ast),
        AnalysisPhase::GraphLiteralLowering => graphs::lower_literals(ast),
        AnalysisPhase::TripleGraphAdditionLowering => graphs::lower_additions(ast),
        AnalysisPhase::All => ast.clone(),
    }
}

/// Builder whose ids never collide with those already in `ast`
pub(crate) fn builder_for(ast: &AssemblyDef) -> AstBuilder {
    AstBuilder::starting_after(visit::max_node_id(ast))
}

/// Rewrite a member access without treating its member as a free name:
/// the qualifier goes through the hook, the member only has its operands
/// rewritten. Other expressions are walked as usual.
pub(crate) fn walk_qualified<R: Rewriter>(r: &mut R, expr: &ExprRef) -> Rewritten<ExprRef> {
    let ExprKind::MemberAccess { lhs, rhs } = &expr.kind else {
        return rewrite::walk_expr(r, expr);
    };
    let mut prologue = Vec::new();
    let new_lhs = r.rewrite_expr(lhs);
    prologue.extend(new_lhs.prologue);
    let new_rhs = rhs.as_ref().map(|rhs| {
        let rewritten = rewrite::walk_expr(r, rhs);
        prologue.extend(rewritten.prologue);
        rewritten.node
    });

    let unchanged = Rc::ptr_eq(&new_lhs.node, lhs)
        && match (&new_rhs, rhs) {
            (Some(new), Some(old)) => Rc::ptr_eq(new, old),
            _ => true,
        };
    if unchanged {
        return Rewritten::with_prologue(expr.clone(), prologue);
    }
    let node = expr.with_kind(ExprKind::MemberAccess {
        lhs: new_lhs.node,
        rhs: new_rhs,
    });
    Rewritten::with_prologue(node, prologue)
}

/// Deep copy of `expr` under fresh ids, for when a subtree has to appear
/// twice in the lowered tree
pub(crate) fn duplicate(expr: &ExprRef, builder: &mut AstBuilder) -> ExprRef {
    struct Renumber<'b>(&'b mut AstBuilder);

    impl Rewriter for Renumber<'_> {
        fn rewrite_expr(&mut self, expr: &ExprRef) -> Rewritten<ExprRef> {
            let walked = rewrite::walk_expr(self, expr);
            let meta = walked.node.meta.with_id(self.0.fresh_id());
            Rewritten::with_prologue(Rc::new(walked.node.with_meta(meta)), walked.prologue)
        }
    }

    Renumber(builder).rewrite_expr(expr).node
}

/// Same call bound to `target`
pub(crate) fn bind_call(expr: &ExprRef, target: CallTarget) -> ExprRef {
    match &expr.kind {
        ExprKind::Call { name, args, .. } => expr.with_kind(ExprKind::Call {
            name: name.clone(),
            args: args.clone(),
            target,
        }),
        _ => expr.clone(),
    }
}

/// Structural equality ignoring node metadata
pub(crate) fn same_shape(a: &Expr, b: &Expr) -> bool {
    fn all(a: &[ExprRef], b: &[ExprRef]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_shape(x, y))
    }
    fn opt(a: &Option<ExprRef>, b: &Option<ExprRef>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => same_shape(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    match (&a.kind, &b.kind) {
        (ExprKind::Literal(x), ExprKind::Literal(y)) => x == y,
        (ExprKind::VarRef(x), ExprKind::VarRef(y)) => x == y,
        (
            ExprKind::Binary { op, lhs, rhs },
            ExprKind::Binary {
                op: op2,
                lhs: lhs2,
                rhs: rhs2,
            },
        ) => op == op2 && same_shape(lhs, lhs2) && same_shape(rhs, rhs2),
        (
            ExprKind::Unary { op, operand },
            ExprKind::Unary {
                op: op2,
                operand: operand2,
            },
        ) => op == op2 && same_shape(operand, operand2),
        (
            ExprKind::MemberAccess { lhs, rhs },
            ExprKind::MemberAccess { lhs: lhs2, rhs: rhs2 },
        ) => same_shape(lhs, lhs2) && opt(rhs, rhs2),
        (
            ExprKind::Call { name, args, .. },
            ExprKind::Call {
                name: name2,
                args: args2,
                ..
            },
        ) => name == name2 && all(args, args2),
        (
            ExprKind::ObjectInit {
                type_name,
                properties,
            },
            ExprKind::ObjectInit {
                type_name: type_name2,
                properties: properties2,
            },
        ) => {
            type_name == type_name2
                && properties.len() == properties2.len()
                && properties
                    .iter()
                    .zip(properties2)
                    .all(|(p, q)| p.name == q.name && same_shape(&p.value, &q.value))
        }
        (ExprKind::List { elements }, ExprKind::List { elements: elements2 }) => {
            all(elements, elements2)
        }
        (
            ExprKind::ListComprehension {
                var,
                source,
                constraint,
            },
            ExprKind::ListComprehension {
                var: var2,
                source: source2,
                constraint: constraint2,
            },
        ) => var == var2 && same_shape(source, source2) && opt(constraint, constraint2),
        (
            ExprKind::Triple {
                subject,
                predicate,
                object,
            },
            ExprKind::Triple {
                subject: s2,
                predicate: p2,
                object: o2,
            },
        ) => same_shape(subject, s2) && same_shape(predicate, p2) && same_shape(object, o2),
        (ExprKind::Graph { triples }, ExprKind::Graph { triples: triples2 }) => {
            all(triples, triples2)
        }
        _ => false,
    }
}
