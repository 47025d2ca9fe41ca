//! Expression, statement and control-flow emission
//!
//! Translates a lowered, typed function body into an [`InstructionSequence`].
//! Every statement leaves the evaluation stack as it found it; every
//! expression pushes exactly one value, or none for a call to a `void`
//! method.
//!
//! Defensive conditions (an unbound name, a call no overload accepts)
//! degrade to placeholders and a logged warning; the pipeline has already
//! reported anything the user needs to see.

mod constant;
mod control;
mod expr;
mod operators;
mod stmt;

use crate::context::EmitContext;
use crate::types::TypeMapper;
use fifth_ast::{Expr, FunctionDef, FunctionKind};
use fifth_il::{
    Call, CallKind, IlType, Instruction, InstructionSequence, Load, LocalIr, MethodRef, TypeRef,
};
use fifth_semantic::TypeInference;
use fifth_types::FifthType;

/// Name of argument 0 in instance methods
pub const THIS: &str = "this";

/// Type owning every module-level function
pub const PROGRAM_TYPE: &str = "Program";

/// Method name of a module-level function; `main` is the entry point `Main`
pub fn method_name(function: &str) -> &str {
    if function == "main" {
        "Main"
    } else {
        function
    }
}

/// Emitted body of one function
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedBody {
    pub body: InstructionSequence,
    pub locals: Vec<LocalIr>,
}

/// Emitter for the functions of one program
pub struct Emitter<'a, 'h> {
    inference: &'a TypeInference<'h>,
    types: TypeMapper<'h>,
    cx: EmitContext,
}

impl<'a, 'h> Emitter<'a, 'h> {
    pub fn new(inference: &'a TypeInference<'h>) -> Self {
        Self {
            inference,
            types: TypeMapper::new(inference.host()),
            cx: EmitContext::new(),
        }
    }

    pub fn types(&self) -> TypeMapper<'h> {
        self.types
    }

    pub fn context(&self) -> &EmitContext {
        &self.cx
    }

    /// Emit the body of `function`, declared in `class` when it is a method.
    ///
    /// A body that can fall off its end gets a trailing `ret`, preceded by the
    /// zero value of the return type when one is expected.
    pub fn function(&mut self, function: &FunctionDef, class: Option<&str>) -> EmittedBody {
        self.cx.begin_function(function, class);
        let mut body = InstructionSequence::new();

        if function.kind == FunctionKind::Constructor {
            body.push(Instruction::Load(Load::Arg(THIS.to_string())));
            body.push(Instruction::Call(Call {
                kind: CallKind::Instance,
                method: MethodRef::default_ctor(TypeRef::system("System.Object")),
                arg_count: 1,
            }));
        }
        for statement in &function.body.statements {
            body.append(self.statement(statement));
        }

        if !body.last().is_some_and(Instruction::is_terminator) {
            let returns = self.return_il_type(function);
            if returns.is_void() {
                body.push(Instruction::Return { value: false });
            } else {
                body.append(constant::zero_value(&returns));
                body.push(Instruction::Return { value: true });
            }
        }

        let locals: Vec<LocalIr> = self
            .cx
            .locals()
            .iter()
            .map(|(name, ty)| LocalIr {
                name: name.clone(),
                ty: self.types.il_type(ty),
            })
            .collect();
        tracing::debug!(
            function = %function.name,
            instructions = body.len(),
            locals = locals.len(),
            labels = self.cx.labels_issued(),
            "emitted body"
        );
        EmittedBody { body, locals }
    }

    /// Instruction-level return type of `function`
    pub fn return_il_type(&self, function: &FunctionDef) -> IlType {
        if function.kind == FunctionKind::Constructor {
            return IlType::Void;
        }
        self.types.il_type(&function.return_fifth_type())
    }

    /// Type of `expr`: the annotation when present, else inferred here
    fn type_of(&self, expr: &Expr) -> FifthType {
        self.inference
            .infer(expr, self.cx.env())
            .unwrap_or_default()
    }

    fn il_type_of(&self, expr: &Expr) -> IlType {
        self.types.il_type(&self.type_of(expr))
    }

    /// Box `value` when it is a value type and `slot` holds references
    fn coerce(&self, value: &IlType, slot: &IlType, seq: &mut InstructionSequence) {
        if self.types.is_value_type(value) && !self.types.is_value_type(slot) && !slot.is_void() {
            seq.push(Instruction::Box(value.clone()));
        }
    }
}
