//! Diagnostics accumulated by the lowering phases
//!
//! Semantic problems never surface as `Err`: each phase pushes a
//! [`Diagnostic`] and the pipeline stops after the first phase that recorded
//! an error.

use fifth_ast::{AstNode, SourceLocation};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Diagnostic severity; only [`Severity::Error`] halts the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Advisory problem
    Warning,
    /// Compilation cannot continue
    Error,
}

impl Severity {
    /// Prefix printed before the message
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    fn color(self) -> Color {
        match self {
            Severity::Info => Color::Cyan,
            Severity::Warning => Color::Yellow,
            Severity::Error => Color::Red,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A compile-time condition reported to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Message text
    pub message: String,
    /// Diagnostic code (`E1001`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Source location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Additional notes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            code: None,
            location: None,
            notes: Vec::new(),
        }
    }

    /// Create an error diagnostic
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Create a warning diagnostic
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Create an informational diagnostic
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// Set the diagnostic code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach a source location
    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    /// Attach the location of `node`
    pub fn at(self, node: &impl AstNode) -> Self {
        let location = node.location().cloned();
        self.with_location(location)
    }

    /// Add a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Whether this halts the pipeline
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Write the diagnostic with colors
    pub fn render(&self, out: &mut dyn WriteColor) -> io::Result<()> {
        out.set_color(ColorSpec::new().set_fg(Some(self.severity.color())).set_bold(true))?;
        write!(out, "{}", self.severity)?;
        if let Some(code) = &self.code {
            write!(out, "[{}]", code)?;
        }
        out.reset()?;
        out.set_color(ColorSpec::new().set_bold(true))?;
        write!(out, ":")?;
        out.reset()?;
        writeln!(out, " {}", self.message)?;

        if let Some(location) = &self.location {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Blue)))?;
            write!(out, "  --> ")?;
            out.reset()?;
            writeln!(out, "{}", location)?;
        }
        for note in &self.notes {
            writeln!(out, "  = note: {}", note)?;
        }
        Ok(())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(code) = &self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(location) = &self.location {
            write!(f, " at {}", location)?;
        }
        Ok(())
    }
}

/// Ordered collection of diagnostics for one compilation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(%diagnostic, "recorded diagnostic");
        self.items.push(diagnostic);
    }

    /// Record every diagnostic of `other`
    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in other {
            self.push(diagnostic);
        }
    }

    /// Whether any error was recorded
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    /// Number of diagnostics with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|d| d.severity == severity).count()
    }

    /// All diagnostics in recording order
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a diagnostic with `code` was recorded
    pub fn contains_code(&self, code: &str) -> bool {
        self.items.iter().any(|d| d.code.as_deref() == Some(code))
    }

    /// Print every diagnostic; info and warnings go to stdout, errors to stderr
    pub fn print(&self, choice: ColorChoice) {
        let mut stdout = StandardStream::stdout(choice);
        let mut stderr = StandardStream::stderr(choice);
        for diagnostic in &self.items {
            let out: &mut StandardStream = if diagnostic.is_error() {
                &mut stderr
            } else {
                &mut stdout
            };
            let _ = diagnostic.render(out);
        }
        let _ = stdout.flush();
        let _ = stderr.flush();
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::NoColor;

    #[test]
    fn test_display_includes_code_and_location() {
        let diagnostic = Diagnostic::error("Function 'f/1' has no base case")
            .with_code("E1001")
            .with_location(Some(SourceLocation::new("main.5th", 4, 1)));
        assert_eq!(
            diagnostic.to_string(),
            "error[E1001]: Function 'f/1' has no base case at main.5th:4:1"
        );
    }

    #[test]
    fn test_render_without_color() {
        let diagnostic = Diagnostic::warning("unreachable overload")
            .with_code("W1101")
            .with_note("the base case must come last");
        let mut out = NoColor::new(Vec::new());
        diagnostic.render(&mut out).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(
            text,
            "warning[W1101]: unreachable overload\n  = note: the base case must come last\n"
        );
    }

    #[test]
    fn test_only_errors_count_as_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::info("compiled"));
        diagnostics.push(Diagnostic::warning("careful"));
        assert!(!diagnostics.has_errors());
        diagnostics.push(Diagnostic::error("broken").with_code("E1002"));
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.count(Severity::Warning), 1);
        assert!(diagnostics.contains_code("E1002"));
        assert_eq!(diagnostics.len(), 3);
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }
}
