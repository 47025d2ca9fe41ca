//! End-to-end runs of the lowering pipeline

use fifth_ast::*;
use fifth_semantic::phases::{GUARD_INCOMPLETE, NO_MATCHING_OVERLOAD, UNRESOLVED_SYMBOL};
use fifth_semantic::{apply_phases, AnalysisPhase, Diagnostics};
use fifth_types::{FifthType, SignatureDb};
use pretty_assertions::assert_eq;
use std::rc::Rc;

fn lower(program: &Rc<AssemblyDef>, up_to: AnalysisPhase) -> (Option<Rc<AssemblyDef>>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let host = SignatureDb::builtin().expect("signature table");
    let lowered = apply_phases(program, host, &mut diagnostics, up_to);
    (lowered, diagnostics)
}

fn function<'a>(ast: &'a AssemblyDef, name: &str) -> &'a Rc<FunctionDef> {
    ast.functions()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("no function {}", name))
}

/// square(x: int): int { return x * x; }
/// main(): int {
///     y: int = square(3);
///     y += 1;
///     for (i: int = 0; i < 3; i++) { y = y + i; }
///     return y;
/// }
fn looping_program() -> Rc<AssemblyDef> {
    let mut b = AstBuilder::new();
    b.set_location(Some(SourceLocation::new("main.5th", 1, 1)));
    let x = b.var("x");
    let x2 = b.var("x");
    let product = b.binary(BinaryOp::Mul, x, x2);
    let ret = b.ret(Some(product));
    let body = b.block(vec![ret]);
    let param = b.param("x", "int");
    let square = b.function("square", vec![param], "int", body);

    b.set_location(Some(SourceLocation::new("main.5th", 4, 1)));
    let three = b.int(3);
    let call = b.call("square", vec![three]);
    let decl = b.var_decl("y", Some("int"), Some(call));
    let y = b.var("y");
    let one = b.int(1);
    let bump = b.stmt(StmtKind::CompoundAssign {
        target: y,
        op: BinaryOp::Add,
        value: one,
    });

    let zero = b.int(0);
    let init = b.var_decl("i", Some("int"), Some(zero));
    let i = b.var("i");
    let limit = b.int(3);
    let cond = b.binary(BinaryOp::Lt, i, limit);
    let i = b.var("i");
    let inc = b.unary(UnaryOp::Increment, i);
    let step = b.expr_stmt(inc);
    let y = b.var("y");
    let y2 = b.var("y");
    let i = b.var("i");
    let sum = b.binary(BinaryOp::Add, y2, i);
    let accumulate = b.assign(y, sum);
    let loop_body = b.block(vec![accumulate]);
    let looped = b.stmt(StmtKind::For {
        init: Some(init),
        cond: Some(cond),
        step: Some(step),
        body: loop_body,
    });

    let y = b.var("y");
    let ret = b.ret(Some(y));
    let body = b.block(vec![decl, bump, looped, ret]);
    let main = b.function("main", vec![], "int", body);
    b.program(vec![square, main])
}

/// fib(n: int | n <= 1): int { return n; }
/// fib(n: int): int { return fib(n - 1) + fib(n - 2); }
/// main(): int { return fib(10); }
fn fib_program(with_base: bool) -> Rc<AssemblyDef> {
    let mut b = AstBuilder::new();
    let n = b.var("n");
    let one = b.int(1);
    let guard = b.binary(BinaryOp::Le, n, one);
    let param = b.guarded_param("n", "int", Some(guard));
    let n = b.var("n");
    let ret = b.ret(Some(n));
    let body = b.block(vec![ret]);
    let small = b.function("fib", vec![param], "int", body);

    let mut recurse = |b: &mut AstBuilder, k: i32| {
        let n = b.var("n");
        let k = b.int(k);
        let arg = b.binary(BinaryOp::Sub, n, k);
        b.call("fib", vec![arg])
    };
    let left = recurse(&mut b, 1);
    let right = recurse(&mut b, 2);
    let sum = b.binary(BinaryOp::Add, left, right);
    let ret = b.ret(Some(sum));
    let body = b.block(vec![ret]);
    let param = if with_base {
        b.param("n", "int")
    } else {
        let n = b.var("n");
        let one = b.int(1);
        let guard = b.binary(BinaryOp::Gt, n, one);
        b.guarded_param("n", "int", Some(guard))
    };
    let general = b.function("fib", vec![param], "int", body);

    // An unresolved name that a later phase would report
    let ten = b.int(10);
    let call = b.call("fib", vec![ten]);
    let stray = b.var("nowhere");
    let ignored = b.expr_stmt(stray);
    let ret = b.ret(Some(call));
    let statements = if with_base { vec![ret] } else { vec![ignored, ret] };
    let body = b.block(statements);
    let main = b.function("main", vec![], "int", body);
    b.program(vec![small, general, main])
}

#[test]
fn test_full_pipeline_lowers_and_types() {
    let program = looping_program();
    let (lowered, diagnostics) = lower(&program, AnalysisPhase::All);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
    let lowered = lowered.expect("pipeline result");

    let main = function(&lowered, "main");
    let kinds: Vec<_> = main
        .body
        .statements
        .iter()
        .map(|s| match &s.kind {
            StmtKind::VarDecl { .. } => "decl",
            StmtKind::Assign { .. } => "assign",
            StmtKind::Block(_) => "block",
            StmtKind::Return(_) => "return",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, ["decl", "assign", "block", "return"]);

    let StmtKind::VarDecl { init: Some(call), .. } = &main.body.statements[0].kind else {
        panic!("expected declaration");
    };
    assert!(matches!(&call.kind, ExprKind::Call { target: CallTarget::Function, .. }));
    assert_eq!(call.ty(), Some(&FifthType::INT));

    let StmtKind::Block(scope) = &main.body.statements[2].kind else {
        panic!("expected lowered loop");
    };
    let StmtKind::While { body, .. } = &scope.statements[1].kind else {
        panic!("expected while");
    };
    // The step is now an assignment at the end of the body
    assert!(matches!(body.statements[1].kind, StmtKind::Assign { .. }));
}

#[test]
fn test_pipeline_is_a_fixpoint() {
    let program = looping_program();
    let (once, _) = lower(&program, AnalysisPhase::All);
    let once = once.expect("first run");
    let (twice, diagnostics) = lower(&once, AnalysisPhase::All);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert!(Rc::ptr_eq(&once, &twice.expect("second run")));
}

#[test]
fn test_unchanged_subtrees_are_shared() {
    let mut b = AstBuilder::new();
    let body = b.block(vec![]);
    let helper = b.function("helper", vec![], "void", body);
    b.set_location(Some(SourceLocation::new("shapes.5th", 7, 3)));
    let width = b.field("width", "int");
    let class = b.class("Shape", vec![width], vec![], vec![]);
    let module = b.module("main", vec![class], vec![helper]);
    let program = b.assembly("shapes", vec![module]);

    let (lowered, _) = lower(&program, AnalysisPhase::ClassCtorInsertion);
    let lowered = lowered.expect("lowered");
    assert!(!Rc::ptr_eq(&lowered, &program));

    let before = &program.modules[0];
    let after = &lowered.modules[0];
    assert!(Rc::ptr_eq(&before.functions[0], &after.functions[0]));
    assert!(!Rc::ptr_eq(&before.classes[0], &after.classes[0]));
    assert_eq!(after.classes[0].id(), before.classes[0].id());
    assert_eq!(after.classes[0].location(), before.classes[0].location());
    assert!(Rc::ptr_eq(&before.classes[0].fields[0], &after.classes[0].fields[0]));
    // The input is untouched
    assert!(before.classes[0].methods.is_empty());
}

#[test]
fn test_first_error_stops_the_pipeline() {
    let program = fib_program(false);
    let (lowered, diagnostics) = lower(&program, AnalysisPhase::All);
    assert!(lowered.is_none());
    assert!(diagnostics.contains_code(GUARD_INCOMPLETE));
    // Resolution never ran
    assert!(!diagnostics.contains_code(UNRESOLVED_SYMBOL));
}

#[test]
fn test_guarded_overloads_dispatch() {
    let program = fib_program(true);
    let (lowered, diagnostics) = lower(&program, AnalysisPhase::All);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
    let lowered = lowered.expect("lowered");

    let names: Vec<_> = lowered.functions().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["fib", "fib__0", "fib__1", "main"]);
    let dispatcher = function(&lowered, "fib");
    assert!(!dispatcher.is_guarded());
    assert!(matches!(dispatcher.body.statements[0].kind, StmtKind::If { .. }));
}

#[test]
fn test_incompatible_host_call_warns() {
    let mut b = AstBuilder::new();
    let math = b.var("Math");
    let one = b.int(1);
    let text = b.string("a");
    let max = b.call("Max", vec![one, text]);
    let access = b.member(math, max);
    let stmt = b.expr_stmt(access);
    let body = b.block(vec![stmt]);
    let main = b.function("main", vec![], "void", body);
    let program = b.program(vec![main]);

    let (lowered, diagnostics) = lower(&program, AnalysisPhase::All);
    assert!(lowered.is_some());
    assert!(diagnostics.contains_code(NO_MATCHING_OVERLOAD));
}

#[test]
fn test_runs_are_deterministic() {
    let program = fib_program(true);
    let (first, first_diagnostics) = lower(&program, AnalysisPhase::All);
    let (second, second_diagnostics) = lower(&program, AnalysisPhase::All);
    assert_eq!(first, second);
    assert_eq!(first_diagnostics, second_diagnostics);
}

#[test]
fn test_cutoff_stops_early() {
    let program = looping_program();
    let (lowered, _) = lower(&program, AnalysisPhase::TypeAnnotation);
    let lowered = lowered.expect("lowered");
    let main = function(&lowered, "main");
    assert!(main
        .body
        .statements
        .iter()
        .any(|s| matches!(s.kind, StmtKind::For { .. })));
}
