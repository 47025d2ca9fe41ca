//! Textual IL rendering for the external assembler

use crate::assembly::{AssemblyIr, MethodIr, MethodKind, TypeIr};
use crate::instruction::{BranchKind, CallKind, Instruction, Load, StackOp, Store};
use crate::types::{quote_ident, IlType};
use crate::verify::max_stack;
use std::fmt::Write;

const INDENT: &str = "    ";

/// Render an assembly as ilasm source
pub fn render_assembly(assembly: &AssemblyIr) -> String {
    let mut out = String::new();

    for reference in &assembly.references {
        let _ = writeln!(out, ".assembly extern {}", quote_ident(&reference.name));
        out.push_str("{\n");
        if let Some(token) = reference.public_key_token {
            let bytes: Vec<String> = token.iter().map(|b| format!("{:02X}", b)).collect();
            let _ = writeln!(out, "{}.publickeytoken = ({} )", INDENT, bytes.join(" "));
        }
        let [major, minor, build, revision] = reference.version;
        let _ = writeln!(out, "{}.ver {}:{}:{}:{}", INDENT, major, minor, build, revision);
        out.push_str("}\n");
    }

    let _ = writeln!(out, ".assembly {}", quote_ident(&assembly.name));
    out.push_str("{\n");
    let [major, minor, build, revision] = assembly.version;
    let _ = writeln!(out, "{}.ver {}:{}:{}:{}", INDENT, major, minor, build, revision);
    out.push_str("}\n");
    let _ = writeln!(out, ".module {}.exe\n", quote_ident(&assembly.name));

    for ty in &assembly.types {
        render_type(&mut out, ty);
    }
    out
}

fn render_type(out: &mut String, ty: &TypeIr) {
    let name = if ty.namespace.is_empty() {
        quote_ident(&ty.name)
    } else {
        format!("{}.{}", ty.namespace, quote_ident(&ty.name))
    };
    let modifiers = if ty.is_static { "abstract sealed " } else { "" };
    let _ = writeln!(
        out,
        ".class public auto ansi {}beforefieldinit {} extends {}",
        modifiers, name, ty.base
    );
    out.push_str("{\n");
    for field in &ty.fields {
        let storage = if field.is_static { "static " } else { "" };
        let _ = writeln!(out, "{}.field public {}{} {}", INDENT, storage, field.ty, quote_ident(&field.name));
    }
    for method in &ty.methods {
        render_method(out, method);
    }
    out.push_str("}\n\n");
}

fn render_method(out: &mut String, method: &MethodIr) {
    let attributes = match method.kind {
        MethodKind::Static => "public hidebysig static",
        MethodKind::Instance => "public hidebysig instance",
        MethodKind::Constructor => "public hidebysig specialname rtspecialname instance",
    };
    let params: Vec<String> = method
        .params
        .iter()
        .map(|p| format!("{} {}", p.ty, quote_ident(&p.name)))
        .collect();
    let _ = writeln!(
        out,
        "{}.method {} {} {}({}) cil managed",
        INDENT,
        attributes,
        method.return_type,
        quote_ident(&method.name),
        params.join(", ")
    );
    let _ = writeln!(out, "{}{{", INDENT);
    let body_indent = INDENT.repeat(2);
    if method.is_entry_point {
        let _ = writeln!(out, "{}.entrypoint", body_indent);
    }
    let depth = max_stack(&method.body).unwrap_or(8).max(1);
    let _ = writeln!(out, "{}.maxstack {}", body_indent, depth);
    if !method.locals.is_empty() {
        let locals: Vec<String> = method
            .locals
            .iter()
            .enumerate()
            .map(|(i, l)| format!("[{}] {} {}", i, l.ty, quote_ident(&l.name)))
            .collect();
        let _ = writeln!(out, "{}.locals init ({})", body_indent, locals.join(", "));
    }
    for instruction in &method.body {
        match instruction {
            Instruction::Label(label) => {
                let _ = writeln!(out, "{}{}:", INDENT, label);
            }
            other => {
                let _ = writeln!(out, "{}{}", body_indent, render_instruction(other));
            }
        }
    }
    let _ = writeln!(out, "{}}}", INDENT);
}

/// One instruction in ilasm syntax
pub fn render_instruction(instruction: &Instruction) -> String {
    match instruction {
        Instruction::Load(load) => match load {
            Load::Int32(value) => format!("ldc.i4 {}", value),
            Load::Int64(value) => format!("ldc.i8 {}", value),
            Load::Float32(value) if value.is_finite() => format!("ldc.r4 {:?}", value),
            Load::Float32(value) => format!("ldc.r4 float32(0x{:08X})", value.to_bits()),
            Load::Float64(value) if value.is_finite() => format!("ldc.r8 {:?}", value),
            Load::Float64(value) => format!("ldc.r8 float64(0x{:016X})", value.to_bits()),
            Load::String(text) => format!("ldstr {}", quote_string(text)),
            Load::Null => "ldnull".to_string(),
            Load::Local(name) => format!("ldloc {}", quote_ident(name)),
            Load::Arg(name) => format!("ldarg {}", quote_ident(name)),
            Load::Field(field) => format!("ldfld {}", field),
            Load::StaticField(field) => format!("ldsfld {}", field),
            Load::NewArray(element) => format!("newarr {}", element),
        },
        Instruction::Store(store) => match store {
            Store::Local(name) => format!("stloc {}", quote_ident(name)),
            Store::Arg(name) => format!("starg {}", quote_ident(name)),
            Store::Field(field) => format!("stfld {}", field),
            Store::StaticField(field) => format!("stsfld {}", field),
            Store::Element(element) => element_store(element),
        },
        Instruction::Arithmetic(op) => op.mnemonic().to_string(),
        Instruction::Branch(branch) => {
            let mnemonic = match branch.kind {
                BranchKind::Always => "br",
                BranchKind::IfFalse => "brfalse",
                BranchKind::IfTrue => "brtrue",
            };
            format!("{} {}", mnemonic, branch.target)
        }
        Instruction::Call(call) => {
            let mnemonic = match call.kind {
                CallKind::Static | CallKind::Instance => "call",
                CallKind::Virtual => "callvirt",
                CallKind::NewObj => "newobj",
            };
            format!("{} {}", mnemonic, call.method)
        }
        Instruction::Stack(StackOp::Pop) => "pop".to_string(),
        Instruction::Stack(StackOp::Dup) => "dup".to_string(),
        Instruction::Box(ty) => format!("box {}", ty),
        Instruction::Return { .. } => "ret".to_string(),
        Instruction::Label(label) => format!("{}:", label),
    }
}

fn element_store(element: &IlType) -> String {
    match element {
        IlType::Bool | IlType::I1 | IlType::U1 => "stelem.i1".to_string(),
        IlType::Char | IlType::I2 => "stelem.i2".to_string(),
        IlType::I4 => "stelem.i4".to_string(),
        IlType::I8 => "stelem.i8".to_string(),
        IlType::R4 => "stelem.r4".to_string(),
        IlType::R8 => "stelem.r8".to_string(),
        IlType::ValueType(_) => format!("stelem {}", element),
        _ => "stelem.ref".to_string(),
    }
}

fn quote_string(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
