//! Instruction variants and sequences

use crate::types::{FieldRef, IlType, MethodRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic branch target, unique within one function
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(pub String);

impl Label {
    /// Label with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Label(name.into())
    }

    /// Label name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Push a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Load {
    /// 32-bit integer constant
    Int32(i32),
    /// 64-bit integer constant
    Int64(i64),
    /// Single-precision constant
    Float32(f32),
    /// Double-precision constant
    Float64(f64),
    /// String literal
    String(String),
    /// Null reference
    Null,
    /// Local variable by name
    Local(String),
    /// Argument by name
    Arg(String),
    /// Instance field of the object on the stack
    Field(FieldRef),
    /// Static field
    StaticField(FieldRef),
    /// New array of the given element type, length taken from the stack
    NewArray(IlType),
}

/// Pop a value into a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Store {
    /// Local variable by name
    Local(String),
    /// Argument by name
    Arg(String),
    /// Instance field; object and value on the stack
    Field(FieldRef),
    /// Static field
    StaticField(FieldRef),
    /// Array element; array, index and value on the stack
    Element(IlType),
}

/// Arithmetic, logic, comparison and conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arith {
    /// `add`
    Add,
    /// `sub`
    Sub,
    /// `mul`
    Mul,
    /// `div`
    Div,
    /// `rem`
    Rem,
    /// `and`
    And,
    /// `or`
    Or,
    /// `xor`
    Xor,
    /// `shl`
    Shl,
    /// `shr`
    Shr,
    /// `neg`
    Neg,
    /// `not` (bitwise complement)
    Not,
    /// `ceq`
    Ceq,
    /// `cgt`
    Cgt,
    /// `clt`
    Clt,
    /// `conv.r4`
    ConvR4,
    /// `conv.r8`
    ConvR8,
    /// `conv.i4`
    ConvI4,
    /// `conv.i8`
    ConvI8,
    /// `nop`
    Nop,
}

impl Arith {
    /// Whether the operation consumes two operands
    pub fn is_binary(self) -> bool {
        !matches!(
            self,
            Arith::Neg
                | Arith::Not
                | Arith::ConvR4
                | Arith::ConvR8
                | Arith::ConvI4
                | Arith::ConvI8
                | Arith::Nop
        )
    }

    /// Mnemonic in textual IL
    pub fn mnemonic(self) -> &'static str {
        match self {
            Arith::Add => "add",
            Arith::Sub => "sub",
            Arith::Mul => "mul",
            Arith::Div => "div",
            Arith::Rem => "rem",
            Arith::And => "and",
            Arith::Or => "or",
            Arith::Xor => "xor",
            Arith::Shl => "shl",
            Arith::Shr => "shr",
            Arith::Neg => "neg",
            Arith::Not => "not",
            Arith::Ceq => "ceq",
            Arith::Cgt => "cgt",
            Arith::Clt => "clt",
            Arith::ConvR4 => "conv.r4",
            Arith::ConvR8 => "conv.r8",
            Arith::ConvI4 => "conv.i4",
            Arith::ConvI8 => "conv.i8",
            Arith::Nop => "nop",
        }
    }
}

/// Branch condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchKind {
    /// `br`
    Always,
    /// `brfalse`
    IfFalse,
    /// `brtrue`
    IfTrue,
}

/// Jump to a label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Branch {
    /// Condition
    pub kind: BranchKind,
    /// Target
    pub target: Label,
}

/// How a method is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    /// `call`
    Static,
    /// `call` on an instance method
    Instance,
    /// `callvirt`
    Virtual,
    /// `newobj`
    NewObj,
}

/// Method invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Call {
    /// Invocation kind
    pub kind: CallKind,
    /// Callee
    pub method: MethodRef,
    /// Values consumed from the stack, receiver included
    pub arg_count: usize,
}

/// Stack manipulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackOp {
    /// `pop`
    Pop,
    /// `dup`
    Dup,
}

/// One instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// Push
    Load(Load),
    /// Pop into a location
    Store(Store),
    /// Operator
    Arithmetic(Arith),
    /// Jump
    Branch(Branch),
    /// Invocation
    Call(Call),
    /// Stack manipulation
    Stack(StackOp),
    /// Box the value type on the stack as an object
    Box(IlType),
    /// `ret`, consuming the return value when `value` is set
    Return {
        /// Whether a value is returned
        value: bool,
    },
    /// Branch target marker; emits no code
    Label(Label),
}

impl Instruction {
    /// Static call of `method` consuming `arg_count` values
    pub fn call(method: MethodRef, arg_count: usize) -> Self {
        Instruction::Call(Call {
            kind: CallKind::Static,
            method,
            arg_count,
        })
    }

    /// Branch of `kind` to `target`
    pub fn branch(kind: BranchKind, target: &Label) -> Self {
        Instruction::Branch(Branch {
            kind,
            target: target.clone(),
        })
    }

    /// Net change of the evaluation stack depth
    pub fn stack_delta(&self) -> i32 {
        match self {
            Instruction::Load(Load::NewArray(_)) => 0,
            Instruction::Load(_) => 1,
            Instruction::Store(store) => match store {
                Store::Local(_) | Store::Arg(_) | Store::StaticField(_) => -1,
                Store::Field(_) => -2,
                Store::Element(_) => -3,
            },
            Instruction::Arithmetic(op) => {
                if op.is_binary() {
                    -1
                } else {
                    0
                }
            }
            Instruction::Branch(branch) => match branch.kind {
                BranchKind::Always => 0,
                BranchKind::IfFalse | BranchKind::IfTrue => -1,
            },
            Instruction::Call(call) => {
                let consumed = call.arg_count as i32;
                match call.kind {
                    CallKind::NewObj => 1 - consumed,
                    _ if call.method.returns_value() => 1 - consumed,
                    _ => -consumed,
                }
            }
            Instruction::Stack(StackOp::Pop) => -1,
            Instruction::Stack(StackOp::Dup) => 1,
            Instruction::Box(_) => 0,
            Instruction::Return { value } => -i32::from(*value),
            Instruction::Label(_) => 0,
        }
    }

    /// Values that must be on the stack before the instruction runs
    pub fn stack_demand(&self) -> i32 {
        match self {
            Instruction::Load(Load::NewArray(_)) => 1,
            Instruction::Load(Load::Field(_)) => 1,
            Instruction::Stack(StackOp::Dup) | Instruction::Box(_) => 1,
            Instruction::Call(call) => call.arg_count as i32,
            Instruction::Arithmetic(op) if !op.is_binary() && *op != Arith::Nop => 1,
            other => (-other.stack_delta()).max(0),
        }
    }

    /// Whether control never falls through to the next instruction
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Return { .. }
                | Instruction::Branch(Branch {
                    kind: BranchKind::Always,
                    ..
                })
        )
    }

    /// Whether this is a call to a method returning `void`
    pub fn is_void_call(&self) -> bool {
        matches!(self, Instruction::Call(call) if call.kind != CallKind::NewObj && !call.method.returns_value())
    }
}

/// Flat instruction list for one expression, statement or method body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionSequence {
    instructions: Vec<Instruction>,
}

impl InstructionSequence {
    /// Empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one instruction
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Append another sequence
    pub fn append(&mut self, other: InstructionSequence) {
        self.instructions.extend(other.instructions);
    }

    /// Instructions in order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Iterate over instructions
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Number of instructions, labels included
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Last instruction
    pub fn last(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// Sum of stack deltas, ignoring control flow
    pub fn net_stack_effect(&self) -> i32 {
        self.instructions.iter().map(Instruction::stack_delta).sum()
    }
}

impl From<Vec<Instruction>> for InstructionSequence {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }
}

impl Extend<Instruction> for InstructionSequence {
    fn extend<T: IntoIterator<Item = Instruction>>(&mut self, iter: T) {
        self.instructions.extend(iter);
    }
}

impl IntoIterator for InstructionSequence {
    type Item = Instruction;
    type IntoIter = std::vec::IntoIter<Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.into_iter()
    }
}

impl<'a> IntoIterator for &'a InstructionSequence {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}
