//! Lowered syntax tree to [`AssemblyIr`]
//!
//! Module functions become static methods of one static type `Program`;
//! each class becomes a type deriving from `System.Object` with its fields,
//! its parameterless constructor and its methods. References to imported
//! assemblies are collected from every type the result mentions.

use crate::emit::{method_name, Emitter, PROGRAM_TYPE};
use fifth_ast::{AssemblyDef, ClassDef, FunctionDef, FunctionKind};
use fifth_il::{
    AssemblyIr, AssemblyRefIr, FieldIr, IlType, Instruction, Load, MethodIr, MethodKind, MethodRef,
    ParamIr, Store, TypeIr, TypeRef,
};
use fifth_semantic::{ProgramIndex, TypeInference};
use fifth_types::{FifthType, HostTypeProvider};
use std::collections::BTreeSet;

/// Assemblies that ship with the runtime and carry its public key
const RUNTIME_ASSEMBLIES: &[&str] = &["System.Runtime", "System.Console", "System.Private.CoreLib"];

/// Build the assembly for a lowered, typed program
pub fn build_assembly(ast: &AssemblyDef, host: &dyn HostTypeProvider) -> AssemblyIr {
    let inference = TypeInference::new(ProgramIndex::build(ast), host);
    let mut emitter = Emitter::new(&inference);

    let mut assembly = AssemblyIr::new(ast.name.clone());
    assembly.version = parse_version(ast.version.as_deref());

    let program = TypeIr {
        namespace: String::new(),
        name: PROGRAM_TYPE.to_string(),
        base: TypeRef::system("System.Object"),
        is_static: true,
        fields: Vec::new(),
        methods: ast
            .functions()
            .map(|function| lower_function(&mut emitter, function, None))
            .collect(),
    };
    assembly.types.push(program);
    for class in ast.classes() {
        let ty = lower_class(&mut emitter, class);
        assembly.types.push(ty);
    }

    for name in referenced_assemblies(&assembly) {
        let reference = if RUNTIME_ASSEMBLIES.contains(&name.as_str()) {
            AssemblyRefIr::runtime(name)
        } else {
            AssemblyRefIr::library(name)
        };
        assembly.add_reference(reference);
    }

    tracing::debug!(
        assembly = %assembly.name,
        types = assembly.types.len(),
        methods = assembly.method_count(),
        references = assembly.references.len(),
        "built assembly"
    );
    assembly
}

fn lower_class(emitter: &mut Emitter<'_, '_>, class: &ClassDef) -> TypeIr {
    let types = emitter.types();
    if let Some(base) = &class.base {
        tracing::warn!(class = %class.name, %base, "base classes are not emitted; deriving from System.Object");
    }
    let fields = class
        .fields
        .iter()
        .map(|field| FieldIr {
            name: field.name.clone(),
            ty: types.il_type(&FifthType::parse(&field.type_name)),
            is_static: false,
        })
        .collect();
    let methods = class
        .methods
        .iter()
        .map(|method| lower_function(emitter, method, Some(&class.name)))
        .collect();
    TypeIr {
        namespace: String::new(),
        name: class.name.clone(),
        base: TypeRef::system("System.Object"),
        is_static: false,
        fields,
        methods,
    }
}

fn lower_function(
    emitter: &mut Emitter<'_, '_>,
    function: &FunctionDef,
    class: Option<&str>,
) -> MethodIr {
    let types = emitter.types();
    let params = function
        .params
        .iter()
        .map(|param| ParamIr {
            name: param.name.clone(),
            ty: types.il_type(&FifthType::parse(&param.type_name)),
        })
        .collect();
    let return_type = emitter.return_il_type(function);
    let emitted = emitter.function(function, class);

    let (name, kind) = match (class, function.kind) {
        (None, _) => (method_name(&function.name).to_string(), MethodKind::Static),
        (Some(_), FunctionKind::Constructor) => (".ctor".to_string(), MethodKind::Constructor),
        (Some(_), _) => (function.name.clone(), MethodKind::Instance),
    };
    let is_entry_point = class.is_none() && function.name == "main";
    MethodIr {
        name,
        kind,
        params,
        return_type,
        locals: emitted.locals,
        body: emitted.body,
        is_entry_point,
    }
}

/// `"1.2"` becomes `[1, 2, 0, 0]`; missing or malformed parts are zero
fn parse_version(version: Option<&str>) -> [u16; 4] {
    let Some(version) = version else {
        return [1, 0, 0, 0];
    };
    let mut parts = [0u16; 4];
    for (slot, part) in parts.iter_mut().zip(version.split('.')) {
        *slot = part.trim().parse().unwrap_or(0);
    }
    parts
}

/// Names of every imported assembly the definitions mention, sorted
pub fn referenced_assemblies(assembly: &AssemblyIr) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut visit = |ty: &TypeRef| {
        if let Some(name) = &ty.assembly {
            names.insert(name.clone());
        }
    };
    for ty in &assembly.types {
        visit(&ty.base);
        for field in &ty.fields {
            il_type_refs(&field.ty, &mut visit);
        }
        for method in &ty.methods {
            il_type_refs(&method.return_type, &mut visit);
            for param in &method.params {
                il_type_refs(&param.ty, &mut visit);
            }
            for local in &method.locals {
                il_type_refs(&local.ty, &mut visit);
            }
            for instruction in method.body.iter() {
                instruction_refs(instruction, &mut visit);
            }
        }
    }
    names
}

fn il_type_refs(ty: &IlType, visit: &mut impl FnMut(&TypeRef)) {
    match ty {
        IlType::SzArray(element) => il_type_refs(element, visit),
        other => {
            if let Some(reference) = other.type_ref() {
                visit(reference);
            }
        }
    }
}

fn method_refs(method: &MethodRef, visit: &mut impl FnMut(&TypeRef)) {
    visit(&method.owner);
    il_type_refs(&method.return_type, visit);
    for param in &method.params {
        il_type_refs(param, visit);
    }
}

fn instruction_refs(instruction: &Instruction, visit: &mut impl FnMut(&TypeRef)) {
    match instruction {
        Instruction::Load(Load::Field(field) | Load::StaticField(field))
        | Instruction::Store(Store::Field(field) | Store::StaticField(field)) => {
            visit(&field.owner);
            il_type_refs(&field.ty, visit);
        }
        Instruction::Load(Load::NewArray(ty))
        | Instruction::Store(Store::Element(ty))
        | Instruction::Box(ty) => il_type_refs(ty, visit),
        Instruction::Call(call) => method_refs(&call.method, visit),
        _ => {}
    }
}
