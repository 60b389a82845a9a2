//! Semantic errors raised by the rewrite pipeline and the resolver

use sqlscope_ast::NodeId;
use sqlscope_diagnostics::{
    Diagnostic, ErrorCode, ErrorKind, RelatedInfo, SourceLocation, Span, SQL0350, SQL0500,
    SQL0550,
};
use thiserror::Error;

/// A semantic error
///
/// Carries the code, the offending node when one exists, and its source
/// span. Errors raised on synthesized nodes have no span of their own and
/// take the span of the statement being analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SemanticError {
    pub code: ErrorCode,
    pub message: String,
    pub node: Option<NodeId>,
    pub span: Span,
    /// Extra detail, e.g. the candidates of an ambiguous reference
    pub context: Option<String>,
}

impl SemanticError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            node: None,
            span: Span::SYNTHETIC,
            context: None,
        }
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Attach the node and span of `node` in one go
    pub fn at(self, node: NodeId, span: Span) -> Self {
        self.with_node(node).with_span(span)
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Fill in `span` if the error does not have one yet
    pub fn or_span(mut self, span: Span) -> Self {
        if self.span.is_synthetic() {
            self.span = span;
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Analyzer invariant broken; never caused by user input
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SQL0550, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(SQL0500, message)
    }

    pub fn access_denied(message: impl std::fmt::Display) -> Self {
        Self::new(SQL0350, format!("Access Denied: {message}"))
    }

    /// Render against the statement text
    pub fn to_diagnostic(&self, source: &str) -> Diagnostic {
        let mut diagnostic = Diagnostic::error(self.code, self.message.clone());
        if !self.span.is_synthetic() {
            diagnostic = diagnostic.with_location(SourceLocation::from_span(self.span, source));
        }
        if let Some(help) = self.code.info().help {
            diagnostic = diagnostic.with_help(help);
        }
        if let Some(context) = &self.context {
            diagnostic = diagnostic.with_related(RelatedInfo::new(context.clone()));
        }
        diagnostic
    }
}

pub type Result<T> = std::result::Result<T, SemanticError>;
