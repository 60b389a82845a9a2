//! Diagnostic records produced from analyzer errors

use crate::{ErrorCode, SourceLocation, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Analysis cannot proceed
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with location and context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Source location
    pub location: Option<SourceLocation>,
    /// Additional context or help
    pub help: Option<String>,
    /// Related information
    pub related: Vec<RelatedInfo>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            location: None,
            help: None,
            related: Vec::new(),
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the span (converts to location using provided source)
    pub fn with_span(mut self, span: Span, source: &str) -> Self {
        self.location = Some(SourceLocation::from_span(span, source));
        self
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add related information
    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }

    /// Render the diagnostic against its source text, underlining the
    /// offending range.
    pub fn render(&self, source: &str) -> String {
        let mut out = format!("{}[{}]: {}", self.severity_label(), self.code, self.message);

        if let Some(loc) = &self.location {
            if let Some(line) = source.lines().nth(loc.line.saturating_sub(1)) {
                let gutter = loc.line.to_string();
                let pad = " ".repeat(gutter.len());
                let marker = format!(
                    "{}{}",
                    " ".repeat(loc.column.saturating_sub(1)),
                    "^".repeat(loc.length.max(1))
                );
                out.push_str(&format!("\n{pad} --> {loc}"));
                out.push_str(&format!("\n{gutter} | {line}"));
                out.push_str(&format!("\n{pad} | {}", self.highlight(&marker)));
            }
        }

        if let Some(help) = &self.help {
            out.push_str(&format!("\n= help: {help}"));
        }
        for related in &self.related {
            out.push_str(&format!("\n= note: {}", related.message));
        }
        out
    }

    #[cfg(feature = "colored")]
    fn severity_label(&self) -> String {
        use colored::Colorize;
        match self.severity {
            Severity::Error => self.severity.to_string().red().bold().to_string(),
        }
    }

    #[cfg(not(feature = "colored"))]
    fn severity_label(&self) -> String {
        self.severity.to_string()
    }

    #[cfg(feature = "colored")]
    fn highlight(&self, marker: &str) -> String {
        use colored::Colorize;
        marker.red().to_string()
    }

    #[cfg(not(feature = "colored"))]
    fn highlight(&self, marker: &str) -> String {
        marker.to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// Related diagnostic information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedInfo {
    /// Location of related code
    pub location: Option<SourceLocation>,
    /// Message explaining the relationship
    pub message: String,
}

impl RelatedInfo {
    /// Create new related info
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            location: None,
            message: message.into(),
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}
