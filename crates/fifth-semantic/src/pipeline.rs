//! The ordered lowering pipeline
//!
//! Phases run in declaration order. After each phase the error count is
//! compared with the count on entry, and the run stops at the first phase
//! that added an error. Warnings never stop it.

use crate::diagnostic::{Diagnostics, Severity};
use crate::phases::{self, PhaseContext};
use fifth_ast::AssemblyDef;
use fifth_types::HostTypeProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use thiserror::Error;

/// One step of the lowering pipeline, in execution order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnalysisPhase {
    /// Parent links
    TreeLink,
    /// Unqualified calls to standard routines become external calls
    BuiltinInjection,
    /// Classes get a parameterless constructor
    ClassCtorInsertion,
    /// Scopes and symbols
    SymbolTable,
    /// Properties become fields
    PropertyToField,
    /// Same-name functions are grouped
    OverloadGathering,
    /// Guarded groups are checked for a base case
    GuardCompleteness,
    /// Guarded groups become a dispatcher plus implementations
    OverloadTransform,
    /// Destructuring parameters become local declarations
    DestructuringLowering,
    /// Parent links after restructuring
    TreeRelink,
    /// Symbols after restructuring
    SymbolTableRebuild,
    /// Every name must resolve
    VarRefResolution,
    /// Expressions are typed; declarations are checked
    TypeAnnotation,
    /// Host calls are qualified and matched
    ExternalCallValidation,
    /// `try` statements are well formed
    TryCatchValidation,
    /// `for` becomes `while`
    ForLoopLowering,
    /// `x op= e` becomes `x = x op e`
    AugmentedAssignmentLowering,
    /// Increment, decrement and unary plus
    UnaryOperatorLowering,
    /// Graph literals become graph construction
    GraphLiteralLowering,
    /// Additions over graphs and triples become graph construction
    TripleGraphAdditionLowering,
    /// Parent links after hoisting
    TreeFinalLink,
    /// Symbols after hoisting
    SymbolTableFinal,
    /// Types for the nodes introduced by lowering
    TypeAnnotationFinal,
    /// Every phase
    #[default]
    All,
}

impl AnalysisPhase {
    /// Every phase in execution order, `All` last
    pub const ALL: [AnalysisPhase; 24] = [
        AnalysisPhase::TreeLink,
        AnalysisPhase::BuiltinInjection,
        AnalysisPhase::ClassCtorInsertion,
        AnalysisPhase::SymbolTable,
        AnalysisPhase::PropertyToField,
        AnalysisPhase::OverloadGathering,
        AnalysisPhase::GuardCompleteness,
        AnalysisPhase::OverloadTransform,
        AnalysisPhase::DestructuringLowering,
        AnalysisPhase::TreeRelink,
        AnalysisPhase::SymbolTableRebuild,
        AnalysisPhase::VarRefResolution,
        AnalysisPhase::TypeAnnotation,
        AnalysisPhase::ExternalCallValidation,
        AnalysisPhase::TryCatchValidation,
        AnalysisPhase::ForLoopLowering,
        AnalysisPhase::AugmentedAssignmentLowering,
        AnalysisPhase::UnaryOperatorLowering,
        AnalysisPhase::GraphLiteralLowering,
        AnalysisPhase::TripleGraphAdditionLowering,
        AnalysisPhase::TreeFinalLink,
        AnalysisPhase::SymbolTableFinal,
        AnalysisPhase::TypeAnnotationFinal,
        AnalysisPhase::All,
    ];

    /// Name as written on the command line
    pub fn name(self) -> &'static str {
        match self {
            AnalysisPhase::TreeLink => "TreeLink",
            AnalysisPhase::BuiltinInjection => "BuiltinInjection",
            AnalysisPhase::ClassCtorInsertion => "ClassCtorInsertion",
            AnalysisPhase::SymbolTable => "SymbolTable",
            AnalysisPhase::PropertyToField => "PropertyToField",
            AnalysisPhase::OverloadGathering => "OverloadGathering",
            AnalysisPhase::GuardCompleteness => "GuardCompleteness",
            AnalysisPhase::OverloadTransform => "OverloadTransform",
            AnalysisPhase::DestructuringLowering => "DestructuringLowering",
            AnalysisPhase::TreeRelink => "TreeRelink",
            AnalysisPhase::SymbolTableRebuild => "SymbolTableRebuild",
            AnalysisPhase::VarRefResolution => "VarRefResolution",
            AnalysisPhase::TypeAnnotation => "TypeAnnotation",
            AnalysisPhase::ExternalCallValidation => "ExternalCallValidation",
            AnalysisPhase::TryCatchValidation => "TryCatchValidation",
            AnalysisPhase::ForLoopLowering => "ForLoopLowering",
            AnalysisPhase::AugmentedAssignmentLowering => "AugmentedAssignmentLowering",
            AnalysisPhase::UnaryOperatorLowering => "UnaryOperatorLowering",
            AnalysisPhase::GraphLiteralLowering => "GraphLiteralLowering",
            AnalysisPhase::TripleGraphAdditionLowering => "TripleGraphAdditionLowering",
            AnalysisPhase::TreeFinalLink => "TreeFinalLink",
            AnalysisPhase::SymbolTableFinal => "SymbolTableFinal",
            AnalysisPhase::TypeAnnotationFinal => "TypeAnnotationFinal",
            AnalysisPhase::All => "All",
        }
    }
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A phase name that names no phase
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown analysis phase '{0}'")]
pub struct UnknownPhase(pub String);

impl FromStr for AnalysisPhase {
    type Err = UnknownPhase;

    /// Case-insensitive; dashes and underscores are ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        AnalysisPhase::ALL
            .into_iter()
            .find(|phase| phase.name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

/// Run every phase up to and including `up_to`.
///
/// Returns the lowered assembly, or `None` when a phase reported an error;
/// the reasons are in `diagnostics`. The input is never modified.
pub fn apply_phases(
    ast: &Rc<AssemblyDef>,
    host: &dyn HostTypeProvider,
    diagnostics: &mut Diagnostics,
    up_to: AnalysisPhase,
) -> Option<Rc<AssemblyDef>> {
    let baseline = diagnostics.count(Severity::Error);
    let mut cx = PhaseContext::new(host, diagnostics);
    let mut current = ast.clone();

    for phase in AnalysisPhase::ALL {
        if phase > up_to || phase == AnalysisPhase::All {
            break;
        }
        let _span = tracing::debug_span!("phase", name = phase.name()).entered();
        current = phases::run(phase, &current, &mut cx);

        let errors = cx.diagnostics.count(Severity::Error);
        if errors > baseline {
            tracing::debug!(phase = %phase, errors = errors - baseline, "stopping after failed phase");
            return None;
        }
        tracing::debug!(phase = %phase, changed = !Rc::ptr_eq(&current, ast), "phase complete");
    }
    Some(current)
}
