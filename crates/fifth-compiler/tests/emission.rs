//! Code generation for lowered programs

use fifth_ast::*;
use fifth_compiler::build_assembly;
use fifth_il::{
    verify_method, Arith, AssemblyIr, FieldRef, IlType, Instruction, Load, MethodIr, MethodKind,
    MethodRef, StackOp, Store, TypeRef,
};
use fifth_semantic::{apply_phases, AnalysisPhase, Diagnostics};
use fifth_types::SignatureDb;
use pretty_assertions::assert_eq;
use std::rc::Rc;

// ============================================================================
// Helper Functions
// ============================================================================

fn compile(program: &Rc<AssemblyDef>) -> AssemblyIr {
    let host = SignatureDb::builtin().expect("signature table");
    let mut diagnostics = Diagnostics::new();
    let lowered = apply_phases(program, host, &mut diagnostics, AnalysisPhase::All)
        .unwrap_or_else(|| panic!("lowering failed: {:?}", diagnostics));
    build_assembly(&lowered, host)
}

fn method<'a>(assembly: &'a AssemblyIr, ty: &str, name: &str) -> &'a MethodIr {
    assembly
        .types
        .iter()
        .filter(|t| t.name == ty)
        .flat_map(|t| t.methods.iter())
        .find(|m| m.name == name)
        .unwrap_or_else(|| panic!("no method {}::{}", ty, name))
}

/// main(): void { <statements> }
fn main_with(b: &mut AstBuilder, statements: Vec<StmtRef>) -> Rc<AssemblyDef> {
    let body = b.block(statements);
    let main = b.function("main", vec![], "void", body);
    b.program(vec![main])
}

fn system_call(owner: &str, name: &str, params: Vec<IlType>, returns: IlType, args: usize) -> Instruction {
    Instruction::call(
        MethodRef::static_method(TypeRef::system(owner), name, params, returns),
        args,
    )
}

fn decimal_type() -> IlType {
    IlType::ValueType(TypeRef::system("System.Decimal"))
}

/// Instructions producing the decimal constant `text`
fn decimal_constant(text: &str) -> Vec<Instruction> {
    let culture = TypeRef::system("System.Globalization.CultureInfo");
    vec![
        Instruction::Load(Load::String(text.into())),
        system_call(
            "System.Globalization.CultureInfo",
            "get_InvariantCulture",
            vec![],
            IlType::Class(culture),
            0,
        ),
        system_call(
            "System.Decimal",
            "Parse",
            vec![
                IlType::String,
                IlType::Class(TypeRef::system("System.IFormatProvider")),
            ],
            decimal_type(),
            2,
        ),
    ]
}

fn assert_all_methods_verify(assembly: &AssemblyIr) {
    for ty in &assembly.types {
        for method in &ty.methods {
            if let Err(error) = verify_method(method) {
                panic!("{}::{} does not verify: {}", ty.name, method.name, error);
            }
        }
    }
}

// ============================================================================
// Operator selection
// ============================================================================

#[test]
fn test_integer_addition_uses_add() {
    // x: int = 2 + 3;
    let mut b = AstBuilder::new();
    let two = b.int(2);
    let three = b.int(3);
    let sum = b.binary(BinaryOp::Add, two, three);
    let decl = b.var_decl("x", Some("int"), Some(sum));
    let program = main_with(&mut b, vec![decl]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    assert_eq!(
        main.body.instructions(),
        &[
            Instruction::Load(Load::Int32(2)),
            Instruction::Load(Load::Int32(3)),
            Instruction::Arithmetic(Arith::Add),
            Instruction::Store(Store::Local("x".into())),
            Instruction::Return { value: false },
        ]
    );
    assert_eq!(main.locals.len(), 1);
    assert_eq!(main.locals[0].ty, IlType::I4);
}

#[test]
fn test_string_addition_calls_concat() {
    // s: string = "a" + "b";
    let mut b = AstBuilder::new();
    let a = b.string("a");
    let bee = b.string("b");
    let sum = b.binary(BinaryOp::Add, a, bee);
    let decl = b.var_decl("s", Some("string"), Some(sum));
    let program = main_with(&mut b, vec![decl]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    assert_eq!(
        main.body.instructions(),
        &[
            Instruction::Load(Load::String("a".into())),
            Instruction::Load(Load::String("b".into())),
            system_call(
                "System.String",
                "Concat",
                vec![IlType::String, IlType::String],
                IlType::String,
                2
            ),
            Instruction::Store(Store::Local("s".into())),
            Instruction::Return { value: false },
        ]
    );
    assert!(!main
        .body
        .iter()
        .any(|i| matches!(i, Instruction::Arithmetic(Arith::Add))));
}

#[test]
fn test_power_goes_through_math_pow() {
    // r: int = 2 ** 10;
    let mut b = AstBuilder::new();
    let two = b.int(2);
    let ten = b.int(10);
    let power = b.binary(BinaryOp::Pow, two, ten);
    let decl = b.var_decl("r", Some("int"), Some(power));
    let program = main_with(&mut b, vec![decl]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    assert_eq!(
        &main.body.instructions()[..6],
        &[
            Instruction::Load(Load::Int32(2)),
            Instruction::Arithmetic(Arith::ConvR8),
            Instruction::Load(Load::Int32(10)),
            Instruction::Arithmetic(Arith::ConvR8),
            system_call("System.Math", "Pow", vec![IlType::R8, IlType::R8], IlType::R8, 2),
            Instruction::Arithmetic(Arith::ConvI4),
        ]
    );
}

#[test]
fn test_not_equal_is_negated_equality() {
    // ne(a: int, b: int): bool { return a != b; }
    let mut b = AstBuilder::new();
    let lhs = b.var("a");
    let rhs = b.var("b");
    let ne = b.binary(BinaryOp::Ne, lhs, rhs);
    let ret = b.ret(Some(ne));
    let body = b.block(vec![ret]);
    let pa = b.param("a", "int");
    let pb = b.param("b", "int");
    let f = b.function("ne", vec![pa, pb], "bool", body);
    let program = b.program(vec![f]);

    let assembly = compile(&program);
    let ne = method(&assembly, "Program", "ne");
    assert_eq!(
        ne.body.instructions(),
        &[
            Instruction::Load(Load::Arg("a".into())),
            Instruction::Load(Load::Arg("b".into())),
            Instruction::Arithmetic(Arith::Ceq),
            Instruction::Load(Load::Int32(0)),
            Instruction::Arithmetic(Arith::Ceq),
            Instruction::Return { value: true },
        ]
    );
    assert_eq!(ne.return_type, IlType::Bool);
}

#[test]
fn test_decimal_narrowed_by_explicit_operator() {
    // r: long = 3L * 1.5m;
    let mut b = AstBuilder::new();
    let three = b.literal(Literal::Long(3));
    let half = b.literal(Literal::Decimal("1.5".into()));
    let product = b.binary(BinaryOp::Mul, three, half);
    let decl = b.var_decl("r", Some("long"), Some(product));
    let program = main_with(&mut b, vec![decl]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    let mut expected = vec![Instruction::Load(Load::Int64(3))];
    expected.extend(decimal_constant("1.5"));
    expected.extend([
        system_call("System.Decimal", "op_Explicit", vec![decimal_type()], IlType::I8, 1),
        Instruction::Arithmetic(Arith::Mul),
        Instruction::Store(Store::Local("r".into())),
        Instruction::Return { value: false },
    ]);
    assert_eq!(main.body.instructions(), expected.as_slice());
    assert!(!main
        .body
        .iter()
        .any(|i| matches!(i, Instruction::Arithmetic(Arith::ConvI8))));
}

#[test]
fn test_decimal_not_equal_negates_op_equality() {
    // d: bool = 1.5m != 2.5m;
    let mut b = AstBuilder::new();
    let lhs = b.literal(Literal::Decimal("1.5".into()));
    let rhs = b.literal(Literal::Decimal("2.5".into()));
    let ne = b.binary(BinaryOp::Ne, lhs, rhs);
    let decl = b.var_decl("d", Some("bool"), Some(ne));
    let program = main_with(&mut b, vec![decl]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    let mut expected = decimal_constant("1.5");
    expected.extend(decimal_constant("2.5"));
    expected.extend([
        system_call(
            "System.Decimal",
            "op_Equality",
            vec![decimal_type(), decimal_type()],
            IlType::Bool,
            2,
        ),
        Instruction::Load(Load::Int32(0)),
        Instruction::Arithmetic(Arith::Ceq),
        Instruction::Store(Store::Local("d".into())),
        Instruction::Return { value: false },
    ]);
    assert_eq!(main.body.instructions(), expected.as_slice());
}

// ============================================================================
// Collections and placeholders
// ============================================================================

#[test]
fn test_list_literal_fills_a_new_array() {
    // xs = [1, 2];
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let two = b.int(2);
    let list = b.list(vec![one, two]);
    let decl = b.var_decl("xs", None, Some(list));
    let program = main_with(&mut b, vec![decl]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    assert_eq!(
        main.body.instructions(),
        &[
            Instruction::Load(Load::Int32(2)),
            Instruction::Load(Load::NewArray(IlType::I4)),
            Instruction::Stack(StackOp::Dup),
            Instruction::Load(Load::Int32(0)),
            Instruction::Load(Load::Int32(1)),
            Instruction::Store(Store::Element(IlType::I4)),
            Instruction::Stack(StackOp::Dup),
            Instruction::Load(Load::Int32(1)),
            Instruction::Load(Load::Int32(2)),
            Instruction::Store(Store::Element(IlType::I4)),
            Instruction::Store(Store::Local("xs".into())),
            Instruction::Return { value: false },
        ]
    );
    assert_all_methods_verify(&assembly);
}

#[test]
fn test_list_comprehension_emits_an_empty_array() {
    // xs = [1]; ys = [x from xs];
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let list = b.list(vec![one]);
    let xs = b.var_decl("xs", None, Some(list));
    let source = b.var("xs");
    let comprehension = b.expr(ExprKind::ListComprehension {
        var: "x".into(),
        source,
        constraint: None,
    });
    let ys = b.var_decl("ys", None, Some(comprehension));
    let program = main_with(&mut b, vec![xs, ys]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    let body = main.body.instructions();
    assert_eq!(
        &body[body.len() - 4..],
        &[
            Instruction::Load(Load::Int32(0)),
            Instruction::Load(Load::NewArray(IlType::I4)),
            Instruction::Store(Store::Local("ys".into())),
            Instruction::Return { value: false },
        ]
    );
    assert_all_methods_verify(&assembly);
}

#[test]
fn test_triple_literal_emits_null() {
    // t = <"s", "p", "o">;
    let mut b = AstBuilder::new();
    let subject = b.string("s");
    let predicate = b.string("p");
    let object = b.string("o");
    let triple = b.triple(subject, predicate, object);
    let decl = b.var_decl("t", None, Some(triple));
    let program = main_with(&mut b, vec![decl]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    assert_eq!(
        main.body.instructions(),
        &[
            Instruction::Load(Load::Null),
            Instruction::Store(Store::Local("t".into())),
            Instruction::Return { value: false },
        ]
    );
}

// ============================================================================
// Host calls and classes
// ============================================================================

#[test]
fn test_console_call_keeps_the_stack_empty() {
    // Console.WriteLine("hi");
    let mut b = AstBuilder::new();
    let console = b.var("Console");
    let hi = b.string("hi");
    let call = b.call("WriteLine", vec![hi]);
    let access = b.member(console, call);
    let stmt = b.expr_stmt(access);
    let program = main_with(&mut b, vec![stmt]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    let calls: Vec<(String, String)> = main
        .body
        .iter()
        .filter_map(|i| match i {
            Instruction::Call(call) => Some((call.method.owner.full_name(), call.method.name.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(calls, [("System.Console".to_string(), "WriteLine".to_string())]);
    assert!(!main
        .body
        .iter()
        .any(|i| matches!(i, Instruction::Stack(StackOp::Pop))));
    assert!(assembly.references.iter().any(|r| r.name == "System.Console"));
    assert_all_methods_verify(&assembly);
}

#[test]
fn test_class_gets_fields_and_a_constructor() {
    // class Person { name: string; }
    // main(): void { p: Person = new Person { name = "Ada" }; }
    let mut b = AstBuilder::new();
    let field = b.field("name", "string");
    let person = b.class("Person", vec![field], vec![], vec![]);
    let ada = b.string("Ada");
    let init = b.object_init("Person", vec![("name".to_string(), ada)]);
    let decl = b.var_decl("p", Some("Person"), Some(init));
    let body = b.block(vec![decl]);
    let main = b.function("main", vec![], "void", body);
    let module = b.module("main", vec![person], vec![main]);
    let program = b.assembly("people", vec![module]);

    let assembly = compile(&program);
    let person = assembly
        .types
        .iter()
        .find(|t| t.name == "Person")
        .expect("Person type");
    assert!(!person.is_static);
    assert_eq!(person.fields.len(), 1);
    assert_eq!(person.fields[0].ty, IlType::String);
    let ctor = method(&assembly, "Person", ".ctor");
    assert_eq!(ctor.kind, MethodKind::Constructor);
    assert_eq!(ctor.return_type, IlType::Void);

    let main = method(&assembly, "Program", "Main");
    assert!(matches!(
        main.body.instructions().first(),
        Some(Instruction::Call(call)) if call.method.name == ".ctor"
    ));
    assert!(main.body.iter().any(|i| matches!(
        i,
        Instruction::Store(Store::Field(field)) if field.name == "name"
    )));
    assert_all_methods_verify(&assembly);
}

#[test]
fn test_static_host_field_loads_with_ldsfld() {
    // p: double = Math.PI;
    let mut b = AstBuilder::new();
    let math = b.var("Math");
    let pi = b.field_access(math, "PI");
    let decl = b.var_decl("p", Some("double"), Some(pi));
    let program = main_with(&mut b, vec![decl]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    assert_eq!(
        main.body.instructions(),
        &[
            Instruction::Load(Load::StaticField(FieldRef {
                owner: TypeRef::system("System.Math"),
                name: "PI".into(),
                ty: IlType::R8,
            })),
            Instruction::Store(Store::Local("p".into())),
            Instruction::Return { value: false },
        ]
    );
}

#[test]
fn test_omitted_parameter_takes_its_declared_default() {
    // g = KG.CreateGraph(); KG.CreateLiteral(g, "x");
    let mut b = AstBuilder::new();
    let kg = b.var("KG");
    let create = b.call("CreateGraph", vec![]);
    let graph = b.member(kg, create);
    let decl = b.var_decl("g", None, Some(graph));
    let kg = b.var("KG");
    let g = b.var("g");
    let text = b.string("x");
    let literal = b.call("CreateLiteral", vec![g, text]);
    let access = b.member(kg, literal);
    let stmt = b.expr_stmt(access);
    let program = main_with(&mut b, vec![decl, stmt]);

    let assembly = compile(&program);
    let main = method(&assembly, "Program", "Main");
    let body = main.body.instructions();
    let at = body
        .iter()
        .position(|i| matches!(i, Instruction::Call(call) if call.method.name == "CreateLiteral"))
        .expect("CreateLiteral call");
    assert_eq!(
        &body[at - 3..at],
        &[
            Instruction::Load(Load::Local("g".into())),
            Instruction::Load(Load::String("x".into())),
            Instruction::Load(Load::String("en".into())),
        ]
    );
    let Instruction::Call(call) = &body[at] else {
        unreachable!()
    };
    assert_eq!(call.arg_count, 3);
    assert_eq!(call.method.params.len(), 3);
    assert_all_methods_verify(&assembly);
}

// ============================================================================
// Whole programs
// ============================================================================

/// square(x: int): int { return x * x; }
/// main(): int {
///     y: int = square(3);
///     y += 1;
///     for (i: int = 0; i < 3; i++) { y = y + i; }
///     if (y > 10) { return 1; } else { return 0; }
/// }
fn looping_program() -> Rc<AssemblyDef> {
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let x2 = b.var("x");
    let product = b.binary(BinaryOp::Mul, x, x2);
    let ret = b.ret(Some(product));
    let body = b.block(vec![ret]);
    let param = b.param("x", "int");
    let square = b.function("square", vec![param], "int", body);

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
    let assign = b.assign(y, sum);
    let loop_body = b.block(vec![assign]);
    let for_loop = b.stmt(StmtKind::For {
        init: Some(init),
        cond: Some(cond),
        step: Some(step),
        body: loop_body,
    });

    let y = b.var("y");
    let ten = b.int(10);
    let big = b.binary(BinaryOp::Gt, y, ten);
    let one = b.int(1);
    let ret_one = b.ret(Some(one));
    let then_block = b.block(vec![ret_one]);
    let zero = b.int(0);
    let ret_zero = b.ret(Some(zero));
    let else_block = b.block(vec![ret_zero]);
    let branch = b.if_else(big, then_block, Some(else_block));

    let body = b.block(vec![decl, bump, for_loop, branch]);
    let main = b.function("main", vec![], "int", body);
    b.program(vec![square, main])
}

#[test]
fn test_whole_program_verifies() {
    let assembly = compile(&looping_program());
    assert_all_methods_verify(&assembly);

    let (ty, entry) = assembly.entry_point().expect("entry point");
    assert_eq!(ty.name, "Program");
    assert_eq!(entry.name, "Main");
    assert_eq!(entry.return_type, IlType::I4);

    let locals: Vec<&str> = entry.locals.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(locals, ["y", "i"]);

    let square_calls = entry
        .body
        .iter()
        .filter(|i| matches!(i, Instruction::Call(call) if call.method.name == "square"))
        .count();
    assert_eq!(square_calls, 1);
}

#[test]
fn test_labels_are_unique_per_method() {
    let assembly = compile(&looping_program());
    let main = method(&assembly, "Program", "Main");
    let mut labels: Vec<&str> = main
        .body
        .iter()
        .filter_map(|i| match i {
            Instruction::Label(label) => Some(label.name()),
            _ => None,
        })
        .collect();
    let total = labels.len();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), total);
    assert!(total >= 3);
}

#[test]
fn test_direct_image_is_written() {
    let assembly = compile(&looping_program());
    let image = fifth_pe::write_image(&assembly).expect("image");
    assert_eq!(&image[..2], b"MZ");
}
