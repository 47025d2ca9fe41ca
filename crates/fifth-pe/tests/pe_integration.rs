//! Integration tests for the executable writer

use fifth_il::{
    Arith, AssemblyIr, AssemblyRefIr, BranchKind, IlType, Instruction, InstructionSequence, Label,
    Load, LocalIr, MethodIr, MethodKind, MethodRef, Store, TypeIr, TypeRef,
};
use fifth_pe::{emit, write_image, PeError};
use pretty_assertions::assert_eq;

// ============================================================================
// Helper Functions
// ============================================================================

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn program(methods: Vec<MethodIr>) -> AssemblyIr {
    let mut assembly = AssemblyIr::new("hello");
    assembly.add_reference(AssemblyRefIr::runtime("System.Console"));
    assembly.types.push(TypeIr {
        namespace: String::new(),
        name: "Program".into(),
        base: TypeRef::system("System.Object"),
        is_static: true,
        fields: vec![],
        methods,
    });
    assembly
}

fn main_method(locals: Vec<LocalIr>, body: Vec<Instruction>) -> MethodIr {
    MethodIr {
        name: "Main".into(),
        kind: MethodKind::Static,
        params: vec![],
        return_type: IlType::I4,
        locals,
        body: InstructionSequence::from(body),
        is_entry_point: true,
    }
}

fn hello_world() -> AssemblyIr {
    let write_line = MethodRef::static_method(
        TypeRef::external("System.Console", "System.Console"),
        "WriteLine",
        vec![IlType::String],
        IlType::Void,
    );
    program(vec![main_method(
        vec![],
        vec![
            Instruction::Load(Load::String("Hello, World!".into())),
            Instruction::call(write_line, 1),
            Instruction::Load(Load::Int32(0)),
            Instruction::Return { value: true },
        ],
    )])
}

/// Offset of the first method body in the file
fn first_body() -> usize {
    0x200 + fifth_pe::image::METHOD_BODIES_OFFSET as usize
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_hello_world_image() {
    let image = write_image(&hello_world()).unwrap();
    assert_eq!(&image[..2], b"MZ");
    assert_eq!(&image[0x80..0x84], b"PE\0\0");

    let metadata_rva = read_u32(&image, 0x200 + 16);
    let metadata = 0x200 + (metadata_rva - 0x2000) as usize;
    assert_eq!(&image[metadata..metadata + 4], b"BSJB");

    // Tiny header: ldstr tok; call tok; ldc.i4.0; ret
    let body = first_body();
    assert_eq!(image[body], (12 << 2) | 0x2);
    assert_eq!(image[body + 1], 0x72);
    assert_eq!(read_u32(&image, body + 2) >> 24, 0x70);
    assert_eq!(image[body + 6], 0x28);
    assert_eq!(read_u32(&image, body + 7) >> 24, 0x0A);
    assert_eq!(&image[body + 11..body + 13], &[0x16, 0x2A]);

    // Entry point token in the CLI header
    assert_eq!(read_u32(&image, 0x200 + 28), 0x0600_0001);
}

#[test]
fn test_identical_input_gives_identical_bytes() {
    assert_eq!(write_image(&hello_world()).unwrap(), write_image(&hello_world()).unwrap());
}

#[test]
fn test_loop_uses_fat_header_and_real_branch_offsets() {
    let start = Label::new("IL_while_start_0");
    let end = Label::new("IL_while_end_0");
    let assembly = program(vec![main_method(
        vec![
            LocalIr {
                name: "i".into(),
                ty: IlType::I4,
            },
            LocalIr {
                name: "total".into(),
                ty: IlType::I4,
            },
        ],
        vec![
            Instruction::Load(Load::Int32(0)),
            Instruction::Store(Store::Local("i".into())),
            Instruction::Label(start.clone()),
            Instruction::Load(Load::Local("i".into())),
            Instruction::Load(Load::Int32(10)),
            Instruction::Arithmetic(Arith::Clt),
            Instruction::branch(BranchKind::IfFalse, &end),
            Instruction::Load(Load::Local("i".into())),
            Instruction::Load(Load::Int32(1)),
            Instruction::Arithmetic(Arith::Add),
            Instruction::Store(Store::Local("i".into())),
            Instruction::branch(BranchKind::Always, &start),
            Instruction::Label(end),
            Instruction::Load(Load::Local("total".into())),
            Instruction::Return { value: true },
        ],
    )]);
    let image = write_image(&assembly).unwrap();
    let body = first_body();

    // Fat header with InitLocals and a StandAloneSig token
    assert_eq!(&image[body..body + 2], &[0x13, 0x30]);
    assert_eq!(read_u32(&image, body + 8) >> 24, 0x11);
    let code = &image[body + 12..];

    // ldc.i4.0; stloc.0; start: ldloc.0; ldc.i4.s 10; clt; brfalse end
    assert_eq!(&code[..2], &[0x16, 0x0A]);
    assert_eq!(&code[2..6], &[0x06, 0x1F, 10, 0xFE]);
    assert_eq!(code[7], 0x39);
    let to_end = i32::from_le_bytes(code[8..12].try_into().unwrap());
    // ldloc.0; ldc.i4.1; add; stloc.0; br start
    assert_eq!(&code[12..16], &[0x06, 0x17, 0x58, 0x0A]);
    assert_eq!(code[16], 0x38);
    let to_start = i32::from_le_bytes(code[17..21].try_into().unwrap());
    // end: ldloc.1; ret
    assert_eq!(&code[21..23], &[0x07, 0x2A]);

    assert_eq!(12 + to_end, 21);
    assert_eq!(21 + to_start, 2);
}

#[test]
fn test_missing_entry_point_is_reported() {
    let mut assembly = hello_world();
    assembly.types[0].methods[0].is_entry_point = false;
    assert!(matches!(write_image(&assembly), Err(PeError::NoEntryPoint)));
}

#[test]
fn test_emit_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("hello.exe");
    assert!(emit(&hello_world(), &output));
    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(&bytes[..2], b"MZ");
}

#[test]
fn test_emit_failure_is_false() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("broken.exe");
    let mut assembly = hello_world();
    assembly.types[0].methods[0]
        .body
        .push(Instruction::Store(Store::Local("missing".into())));
    assert!(!emit(&assembly, &output));
    assert!(!output.exists());
}
