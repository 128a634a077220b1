//! Declaration-time diagnostics.
//!
//! Validating a node declaration never stops at the first problem: every issue
//! is recorded against the rule, slot or method it belongs to and the whole
//! batch is reported through [`DeclarationErrors`].

use std::fmt::{Display, Formatter};

use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

/// One finding about a node declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    /// The offending element, e.g. `Add::doInt` or `Add::describe`.
    pub source_context: Option<String>,
    pub code: Option<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            source_context: None,
            code: None,
            suggestions: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            ..Self::error(message)
        }
    }

    pub fn with_source_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(context) = &self.source_context {
            write!(f, "[{}] ", context)?;
        }
        write!(f, "{}", self.message)?;

        if let Some(code) = &self.code {
            write!(f, " ({})", code)?;
        }

        if !self.suggestions.is_empty() {
            write!(f, " (hints: {})", self.suggestions.join("; "))?;
        }

        Ok(())
    }
}

/// Output templates for a batch of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagnosticTemplate {
    #[default]
    Pretty,
    Plain,
}

impl DiagnosticTemplate {
    pub fn render(&self, diagnostic: &Diagnostic) -> Vec<String> {
        match self {
            DiagnosticTemplate::Pretty => render_pretty(diagnostic),
            DiagnosticTemplate::Plain => render_plain(diagnostic),
        }
    }
}

fn render_pretty(diagnostic: &Diagnostic) -> Vec<String> {
    let prefix = match diagnostic.level {
        DiagnosticLevel::Error => "×",
        DiagnosticLevel::Warning => "⚠",
    };
    let context = diagnostic.source_context.as_deref().unwrap_or("declaration");

    let header = match diagnostic.code.as_ref() {
        Some(code) => format!("{} [{}] {} ({})", prefix, context, diagnostic.message, code),
        None => format!("{} [{}] {}", prefix, context, diagnostic.message),
    };

    let mut lines = vec![header];
    for suggestion in &diagnostic.suggestions {
        lines.push(format!("   help: {}", suggestion));
    }
    lines
}

fn render_plain(diagnostic: &Diagnostic) -> Vec<String> {
    let level = match diagnostic.level {
        DiagnosticLevel::Error => "ERROR",
        DiagnosticLevel::Warning => "WARNING",
    };
    let context = diagnostic.source_context.as_deref().unwrap_or("declaration");

    let header = match diagnostic.code.as_ref() {
        Some(code) => format!("[{}] {}: {} ({})", context, level, diagnostic.message, code),
        None => format!("[{}] {}: {}", context, level, diagnostic.message),
    };

    let mut lines = vec![header];
    for suggestion in &diagnostic.suggestions {
        lines.push(format!("   suggestion: {}", suggestion));
    }
    lines
}

/// Every problem found while validating one node declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationErrors {
    pub node: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl DeclarationErrors {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.level == DiagnosticLevel::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|diag| diag.level == DiagnosticLevel::Error)
    }

    /// Diagnostics whose source context is exactly `context`.
    pub fn for_context<'a>(&'a self, context: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |diag| diag.source_context.as_deref() == Some(context))
    }

    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |diag| diag.code.as_deref() == Some(code))
    }

    pub fn render(&self, template: DiagnosticTemplate) -> Vec<String> {
        self.diagnostics
            .iter()
            .flat_map(|diag| template.render(diag))
            .collect()
    }
}

impl Display for DeclarationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let count = self.errors().count();
        writeln!(
            f,
            "node kind `{}` has {} declaration error{}:",
            self.node,
            count,
            if count == 1 { "" } else { "s" }
        )?;
        write!(
            f,
            "{}",
            self.render(DiagnosticTemplate::Plain)
                .iter()
                .map(|line| format!("  {}", line))
                .join("\n")
        )
    }
}
