//! Fifth instruction model
//!
//! The emitters translate each function body into an [`InstructionSequence`],
//! a flat list of stack-machine instructions with symbolic labels and
//! symbolic member references. [`AssemblyIr`] groups the sequences into the
//! types and methods of one output assembly; it is the only input of the
//! binary writer and of the textual IL renderer.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod assembly;
pub mod instruction;
pub mod text;
pub mod types;
pub mod verify;

pub use assembly::{AssemblyIr, AssemblyRefIr, FieldIr, LocalIr, MethodIr, MethodKind, ParamIr, TypeIr};
pub use instruction::{
    Arith, Branch, BranchKind, Call, CallKind, Instruction, InstructionSequence, Label, Load, StackOp,
    Store,
};
pub use text::render_assembly;
pub use types::{FieldRef, IlType, MethodRef, TypeRef};
pub use verify::{max_stack, verify_method, VerifyError};
