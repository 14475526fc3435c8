// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and reporting for the assembler.

use std::fmt;

use crate::core::report::highlight_line;
use crate::core::source_map::SourceOrigin;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    /// Malformed or unrecognised token or declaration.
    Parse,
    /// Unknown or duplicate name, or a name breaking the naming rules.
    Name,
    /// Template-argument or push-argument count mismatch.
    Arity,
    /// Arithmetic result outside the encodable range.
    ArithmeticRange,
    /// Jump labels left unresolved at the outermost expansion.
    UnmatchedJump,
    /// Missing table or corrupted table placeholder.
    Table,
    /// Macro expansion re-entered itself or nested too deeply.
    Recursion,
    Io,
    Cli,
    Preprocess,
}

/// An assembler error with a kind, message and optional source origin.
#[derive(Debug, Clone)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
    origin: Option<SourceOrigin>,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: &SourceOrigin) -> Self {
        self.origin = Some(origin.clone());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }

    pub fn origin(&self) -> Option<&SourceOrigin> {
        self.origin.as_ref()
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{} ({origin})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for AsmError {}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub(crate) line: u32,
    pub(crate) code: String,
    pub(crate) severity: Severity,
    pub(crate) error: AsmError,
    pub(crate) file: Option<String>,
    pub(crate) source: Option<String>,
    pub(crate) notes: Vec<String>,
    pub(crate) help: Vec<String>,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, error: AsmError) -> Self {
        Self {
            line,
            code: default_diagnostic_code(error.kind()).to_string(),
            severity,
            error,
            file: None,
            source: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Build a diagnostic positioned at the error's origin, if it has one.
    pub fn from_error(severity: Severity, error: AsmError) -> Self {
        let origin = error.origin().cloned();
        let diag = Self::new(origin.as_ref().map_or(0, |o| o.line), severity, error);
        match origin {
            Some(origin) => diag
                .with_file(Some(origin.file))
                .with_source(Some(origin.text)),
            None => diag,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    pub fn format(&self) -> String {
        let sev = severity_label(self.severity);
        format!(
            "{}: {} [{}] - {}",
            self.line,
            sev,
            self.code,
            self.error.message()
        )
    }

    pub fn format_with_context(&self, use_color: bool) -> String {
        let sev = severity_label(self.severity);
        let header = match &self.file {
            Some(file) => format!("{file}:{}: {sev} [{}]", self.line, self.code),
            None => format!("{}: {sev} [{}]", self.line, self.code),
        };

        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');

        for line in build_context_lines(self.line, self.source.as_deref(), use_color) {
            out.push_str(&line);
            out.push('\n');
        }

        for note in &self.notes {
            out.push_str("note: ");
            out.push_str(note);
            out.push('\n');
        }

        for help in &self.help {
            out.push_str("help: ");
            out.push_str(help);
            out.push('\n');
        }

        out.push_str(&format!("{sev}: {}", self.error.message()));
        out
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.error.kind()
    }

    pub fn message(&self) -> &str {
        self.error.message()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn help(&self) -> &[String] {
        &self.help
    }
}

/// Error from a failed compilation run.
#[derive(Debug)]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
}

impl AsmRunError {
    pub fn new(error: AsmError, diagnostics: Vec<Diagnostic>) -> Self {
        Self { error, diagnostics }
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.error.kind()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl From<AsmError> for AsmRunError {
    fn from(error: AsmError) -> Self {
        let diagnostics = vec![Diagnostic::from_error(Severity::Error, error.clone())];
        Self::new(error, diagnostics)
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AsmRunError {}

/// Build context lines for error display.
pub fn build_context_lines(line_num: u32, source: Option<&str>, use_color: bool) -> Vec<String> {
    match source {
        Some(text) => vec![format!(
            "{:>5} | {}",
            line_num,
            highlight_line(text, first_non_blank_column(text), use_color)
        )],
        None => vec![format!("{:>5} | <source unavailable>", line_num)],
    }
}

fn first_non_blank_column(text: &str) -> Option<usize> {
    text.char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(idx, _)| idx + 1)
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "WARNING",
        Severity::Error => "ERROR",
    }
}

fn default_diagnostic_code(kind: AsmErrorKind) -> &'static str {
    match kind {
        AsmErrorKind::Parse => "sfp001",
        AsmErrorKind::Name => "sfn001",
        AsmErrorKind::Arity => "sfa001",
        AsmErrorKind::ArithmeticRange => "sfr001",
        AsmErrorKind::UnmatchedJump => "sfj001",
        AsmErrorKind::Table => "sft001",
        AsmErrorKind::Recursion => "sfc001",
        AsmErrorKind::Io => "sfi001",
        AsmErrorKind::Cli => "sfl001",
        AsmErrorKind::Preprocess => "sfx001",
    }
}

/// Format an error message with an optional parameter.
pub fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}
