//! Instruction sequence verification
//!
//! Simulates the evaluation stack along the linear instruction order,
//! following branches to their labels, and reports the maximum depth.

use crate::assembly::MethodIr;
use crate::instruction::{Instruction, InstructionSequence, Load, Store};
use rustc_hash::{FxHashMap, FxHashSet};

/// Verification errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// An instruction needs more values than the stack holds
    #[error("Stack underflow at instruction {index}: need {needed}, have {depth}")]
    StackUnderflow {
        /// Instruction index
        index: usize,
        /// Values required
        needed: i32,
        /// Values available
        depth: i32,
    },

    /// Two paths reach a label with different stack depths
    #[error("Inconsistent stack depth at label {label}: {expected} vs {actual}")]
    InconsistentDepth {
        /// Label
        label: String,
        /// Depth recorded first
        expected: i32,
        /// Depth on the conflicting path
        actual: i32,
    },

    /// Values left behind at `ret`
    #[error("Stack not empty at return (instruction {index}, depth {depth})")]
    UnbalancedReturn {
        /// Instruction index
        index: usize,
        /// Values left over
        depth: i32,
    },

    /// A branch names a label that is never defined
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),

    /// A label is defined twice
    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    /// A local that the method does not declare
    #[error("Unknown local '{name}' in {method}")]
    UnknownLocal {
        /// Method name
        method: String,
        /// Local name
        name: String,
    },

    /// An argument that the method does not declare
    #[error("Unknown argument '{name}' in {method}")]
    UnknownArg {
        /// Method name
        method: String,
        /// Argument name
        name: String,
    },

    /// Control reaches the end of the body
    #[error("Execution falls off the end of {0}")]
    FallOffEnd(String),
}

/// Maximum evaluation stack depth of a body
pub fn max_stack(seq: &InstructionSequence) -> Result<u16, VerifyError> {
    let mut depth: Option<i32> = Some(0);
    let mut max = 0;
    let mut at_label: FxHashMap<&str, i32> = FxHashMap::default();
    let mut defined: FxHashSet<&str> = FxHashSet::default();
    let mut targets: FxHashSet<&str> = FxHashSet::default();

    for (index, instruction) in seq.iter().enumerate() {
        if let Instruction::Label(label) = instruction {
            let name = label.name();
            if !defined.insert(name) {
                return Err(VerifyError::DuplicateLabel(name.to_string()));
            }
            depth = match (depth, at_label.get(name).copied()) {
                (Some(current), Some(recorded)) if current != recorded => {
                    return Err(VerifyError::InconsistentDepth {
                        label: name.to_string(),
                        expected: recorded,
                        actual: current,
                    });
                }
                (Some(current), _) => Some(current),
                (None, recorded) => Some(recorded.unwrap_or(0)),
            };
            if let Some(current) = depth {
                at_label.insert(name, current);
            }
            continue;
        }

        // Unreachable code after an unconditional jump
        let Some(current) = depth else {
            continue;
        };

        let needed = instruction.stack_demand();
        if current < needed {
            return Err(VerifyError::StackUnderflow {
                index,
                needed,
                depth: current,
            });
        }
        let after = current + instruction.stack_delta();
        max = max.max(after);

        match instruction {
            Instruction::Branch(branch) => {
                let name = branch.target.name();
                targets.insert(name);
                match at_label.get(name) {
                    Some(&recorded) if recorded != after => {
                        return Err(VerifyError::InconsistentDepth {
                            label: name.to_string(),
                            expected: recorded,
                            actual: after,
                        });
                    }
                    Some(_) => {}
                    None => {
                        at_label.insert(name, after);
                    }
                }
            }
            Instruction::Return { .. } if after != 0 => {
                return Err(VerifyError::UnbalancedReturn { index, depth: after });
            }
            _ => {}
        }

        depth = if instruction.is_terminator() {
            None
        } else {
            Some(after)
        };
    }

    if let Some(missing) = targets.iter().find(|t| !defined.contains(*t)) {
        return Err(VerifyError::UndefinedLabel(missing.to_string()));
    }

    Ok(max.clamp(0, i32::from(u16::MAX)) as u16)
}

/// Check a method body and return its maximum stack depth
pub fn verify_method(method: &MethodIr) -> Result<u16, VerifyError> {
    for instruction in &method.body {
        match instruction {
            Instruction::Load(Load::Local(name)) | Instruction::Store(Store::Local(name))
                if method.local_index(name).is_none() =>
            {
                return Err(VerifyError::UnknownLocal {
                    method: method.name.clone(),
                    name: name.clone(),
                });
            }
            Instruction::Load(Load::Arg(name)) | Instruction::Store(Store::Arg(name))
                if method.arg_index(name).is_none() =>
            {
                return Err(VerifyError::UnknownArg {
                    method: method.name.clone(),
                    name: name.clone(),
                });
            }
            _ => {}
        }
    }

    let last_code = method
        .body
        .iter()
        .rev()
        .find(|i| !matches!(i, Instruction::Label(_)));
    if !last_code.is_some_and(Instruction::is_terminator) {
        return Err(VerifyError::FallOffEnd(method.name.clone()));
    }

    let max = max_stack(&method.body)?;
    tracing::trace!(method = %method.name, max_stack = max, "verified body");
    Ok(max)
}
