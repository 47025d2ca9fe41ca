//! Shape checks for `try` statements

use crate::diagnostic::{Diagnostic, Diagnostics};
use fifth_ast::visit::{self, Visitor};
use fifth_ast::*;
use rustc_hash::FxHashSet;

/// Try without catch or finally
pub const EMPTY_TRY: &str = "E4001";
/// Catch-all followed by another clause
pub const CATCH_ALL_NOT_LAST: &str = "E4002";
/// Two handlers for one exception type
pub const DUPLICATE_CATCH: &str = "E4003";

struct TryCatchValidator<'d> {
    diagnostics: &'d mut Diagnostics,
}

impl Visitor for TryCatchValidator<'_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let StmtKind::Try {
            catches, finally, ..
        } = &stmt.kind
        {
            if catches.is_empty() && finally.is_none() {
                self.diagnostics.push(
                    Diagnostic::error("A try statement needs at least one catch or a finally block")
                        .with_code(EMPTY_TRY)
                        .at(stmt),
                );
            }

            let mut seen = FxHashSet::default();
            for (i, catch) in catches.iter().enumerate() {
                match &catch.exception_type {
                    None if i + 1 < catches.len() => self.diagnostics.push(
                        Diagnostic::error("A catch-all clause must be the last handler")
                            .with_code(CATCH_ALL_NOT_LAST)
                            .at(&**catch),
                    ),
                    None => {}
                    Some(ty) if !seen.insert(ty.as_str()) => self.diagnostics.push(
                        Diagnostic::error(format!("Exception type '{}' is caught more than once", ty))
                            .with_code(DUPLICATE_CATCH)
                            .at(&**catch),
                    ),
                    Some(_) => {}
                }
            }
        }
        visit::walk_stmt(self, stmt);
    }
}

pub(super) fn validate(ast: &AssemblyDef, diagnostics: &mut Diagnostics) {
    TryCatchValidator { diagnostics }.visit_assembly(ast);
}
