//! Coded, human-readable reports for static, runtime and internal errors.
use std::env;

use crate::{
    graph::{Graph, TermId, validation::StaticError},
    runtime::{EvalError, RuntimeError},
};

pub mod runtime_errors;
pub mod static_errors;

/// Distinguishes graph-construction errors from evaluation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Static,
    Runtime,
    Internal,
}

impl ErrorType {
    /// Returns the prefix string used in error headers
    pub fn prefix(&self) -> &'static str {
        match self {
            ErrorType::Static => "Static error",
            ErrorType::Runtime => "Runtime error",
            ErrorType::Internal => "Internal error",
        }
    }
}

/// Stable error code with title and optional hint
#[derive(Debug, Clone, Copy)]
pub struct ErrorCode {
    pub code: &'static str,
    pub title: &'static str,
    pub error_type: ErrorType,
    pub hint: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: &'static str,
    pub title: &'static str,
    pub error_type: ErrorType,
    pub message: String,
    pub term: Option<TermId>,
    pub term_name: Option<String>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    fn from_code(code: &ErrorCode, message: String) -> Self {
        Self {
            code: code.code,
            title: code.title,
            error_type: code.error_type,
            message,
            term: None,
            term_name: None,
            hints: code.hint.map(|h| vec![h.to_string()]).unwrap_or_default(),
        }
    }

    fn located(mut self, graph: &Graph, term: Option<TermId>) -> Self {
        self.term = term;
        self.term_name = term
            .and_then(|id| graph.term(id))
            .and_then(|t| t.name.clone());
        self
    }

    pub fn from_static(graph: &Graph, error: &StaticError) -> Self {
        Self::from_code(error.code(), error.message()).located(graph, Some(error.term))
    }

    pub fn from_runtime(graph: &Graph, error: &RuntimeError) -> Self {
        Self::from_code(error.kind.code(), error.message()).located(graph, error.term)
    }

    pub fn from_eval(graph: &Graph, error: &EvalError) -> Vec<Self> {
        match error {
            EvalError::Runtime(err) => vec![Self::from_runtime(graph, err)],
            EvalError::Static(errors) => errors.iter().map(|e| Self::from_static(graph, e)).collect(),
            EvalError::Internal(message) => {
                vec![Self::from_code(&runtime_errors::INTERNAL_ERROR, message.clone())]
            }
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Renders with color unless `NO_COLOR` is set.
    pub fn render(&self) -> String {
        self.render_with(env::var_os("NO_COLOR").is_none())
    }

    pub fn render_with(&self, use_color: bool) -> String {
        let mut out = String::new();
        let yellow = "\u{1b}[33m";
        let reset = "\u{1b}[0m";

        // Header: -- Static error: unknown function [E2000]
        if use_color {
            out.push_str(yellow);
        }
        out.push_str(&format!(
            "-- {}: {} [{}]",
            self.error_type.prefix(),
            self.title.to_lowercase(),
            self.code
        ));
        if use_color {
            out.push_str(reset);
        }
        out.push_str("\n\n");
        out.push_str(&self.message);
        out.push('\n');

        if let Some(term) = self.term {
            match &self.term_name {
                Some(name) => out.push_str(&format!("\n  --> term {} ({})\n", term, name)),
                None => out.push_str(&format!("\n  --> term {}\n", term)),
            }
        }
        for hint in &self.hints {
            out.push_str(&format!("\nHint:\n  {}\n", hint));
        }
        out
    }
}

pub fn render_diagnostics(diagnostics: &[Diagnostic], use_color: bool) -> String {
    let mut rendered = diagnostics
        .iter()
        .map(|diag| diag.render_with(use_color))
        .collect::<Vec<_>>()
        .join("\n");
    if diagnostics.len() > 1 {
        rendered.push_str(&format!("\nFound {} errors.\n", diagnostics.len()));
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graph::validation::check_branch,
        runtime::{RuntimeErrorKind, config::WorldConfig, world::initialize_with_config},
    };

    #[test]
    fn renders_static_error() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let term = world.call(branch, "embiggen", vec![]).unwrap();
        world.graph.bind_name(branch, term, "big").unwrap();
        let errors = check_branch(&world.graph, branch);
        let diagnostic = Diagnostic::from_static(&world.graph, &errors[0]);
        let rendered = diagnostic.render_with(false);

        assert!(rendered.starts_with("-- Static error: unknown function [E2000]\n\nUnknown function: embiggen\n"));
        assert!(rendered.contains("(big)"));
        assert!(rendered.contains("Hint:"));
    }

    #[test]
    fn renders_runtime_error_without_location() {
        let world = initialize_with_config(WorldConfig::default()).unwrap();
        let error = RuntimeError::new(RuntimeErrorKind::UserRaised("boom".to_string()));
        let rendered = Diagnostic::from_runtime(&world.graph, &error).render_with(false);
        insta::assert_snapshot!(rendered.trim_end(), @r"
        -- Runtime error: user error [E1020]

        boom
        ");
    }

    #[test]
    fn summary_for_many() {
        let world = initialize_with_config(WorldConfig::default()).unwrap();
        let one = Diagnostic::from_runtime(&world.graph, &RuntimeError::new(RuntimeErrorKind::AssertionFailed));
        let rendered = render_diagnostics(&[one.clone(), one], false);
        assert!(rendered.ends_with("Found 2 errors.\n"));
    }
}
