//! Error reporting and diagnostics for Porc.
//!
//! This crate provides structured diagnostics with source location tracking.
//! Diagnostics are created by `porc-syntax` and `porc-resolve` and
//! accumulated in an [`ErrStream`], which keeps per-kind counters so callers
//! can distinguish lexical, syntax, and semantic failures without inspecting
//! individual entries.

use std::fmt;

use porc_ast::SourceRange;

// ---------------------------------------------------------------------------
// Severity, kinds, and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// Which compiler stage a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrKind {
    Lexical,
    Syntax,
    Semantic,
}

/// Broad category for diagnostics. Used for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// No token could be formed from the input bytes.
    UndefinedToken,
    /// A string literal ran off the end of the file.
    UnterminatedString,
    /// A block comment was never closed.
    UnterminatedComment,
    /// A specific token was required but the file ended.
    ExpectedToken,
    /// A specific token was required but a different one appeared.
    UnexpectedToken,
    /// A token that fits none of the expected alternatives.
    InvalidToken,
    /// A recoverable omission, e.g. a missing `;` at the end of a line.
    MissingToken,
    /// The same name was given two conflicting definitions in one scope.
    DualDefinition,
    /// Anything that does not group nicely; carries its own [`ErrKind`].
    Custom,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::UndefinedToken,
        Category::UnterminatedString,
        Category::UnterminatedComment,
        Category::ExpectedToken,
        Category::UnexpectedToken,
        Category::InvalidToken,
        Category::MissingToken,
        Category::DualDefinition,
        Category::Custom,
    ];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    /// The stage this category belongs to. `Custom` defaults to syntax; a
    /// custom diagnostic may override its kind at construction.
    pub fn kind(self) -> ErrKind {
        match self {
            Category::UndefinedToken
            | Category::UnterminatedString
            | Category::UnterminatedComment => ErrKind::Lexical,
            Category::ExpectedToken
            | Category::UnexpectedToken
            | Category::InvalidToken
            | Category::MissingToken
            | Category::Custom => ErrKind::Syntax,
            Category::DualDefinition => ErrKind::Semantic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::UndefinedToken => "undefined_token",
            Category::UnterminatedString => "unterminated_string",
            Category::UnterminatedComment => "unterminated_comment",
            Category::ExpectedToken => "expected_token",
            Category::UnexpectedToken => "unexpected_token",
            Category::InvalidToken => "invalid_token",
            Category::MissingToken => "missing_token",
            Category::DualDefinition => "dual_definition",
            Category::Custom => "custom",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::UndefinedToken => "E0001",
            Category::UnterminatedString => "E0002",
            Category::UnterminatedComment => "E0003",
            Category::ExpectedToken => "E0101",
            Category::UnexpectedToken => "E0102",
            Category::InvalidToken => "E0103",
            Category::MissingToken => "E0104",
            Category::DualDefinition => "E0201",
            Category::Custom => "E0900",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::UndefinedToken => "The input bytes do not form any Porc token.",
            Category::UnterminatedString => "A string literal is missing its closing quote.",
            Category::UnterminatedComment => "A block comment is missing its closing `*/`.",
            Category::ExpectedToken => "A required token was not found before end of file.",
            Category::UnexpectedToken => "A different token appeared where a specific one was required.",
            Category::InvalidToken => "A token appeared that fits none of the accepted alternatives.",
            Category::MissingToken => "A token such as `;` was omitted; parsing continued past it.",
            Category::DualDefinition => "A name was defined twice in the same scope.",
            Category::Custom => "A diagnostic outside the fixed taxonomy.",
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    /// Stage counter this diagnostic contributes to. Matches
    /// `category.kind()` except for `Custom` diagnostics.
    pub kind: ErrKind,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub pos: Option<SourceRange>,
    /// Description of the token that was required, if one was.
    pub expected: Option<String>,
    /// Description of the token that actually appeared.
    pub found: Option<String>,
    /// Suggested fix, if any.
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            kind: category.kind(),
            message: message.into(),
            pos: None,
            expected: None,
            found: None,
            help: None,
        }
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(category, message)
        }
    }

    /// A free-form error counted under the given stage.
    pub fn custom(kind: ErrKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            ..Self::error(Category::Custom, message)
        }
    }

    pub fn at(mut self, pos: SourceRange) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn expected(mut self, token: impl Into<String>) -> Self {
        self.expected = Some(token.into());
        self
    }

    pub fn found(mut self, token: impl Into<String>) -> Self {
        self.found = Some(token.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        match self.pos {
            Some(pos) => write!(f, "{prefix} ({pos}): {}", self.message)?,
            None => write!(f, "{prefix}: {}", self.message)?,
        }
        if let Some(expected) = &self.expected {
            write!(f, "\n  expected: {expected}")?;
        }
        if let Some(found) = &self.found {
            write!(f, "\n  found: {found}")?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn single(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ErrStream
// ---------------------------------------------------------------------------

/// Accumulates diagnostics across the tokenizer, parser, and resolver for
/// one compilation. Reporting never aborts; callers check the counters.
#[derive(Debug, Default)]
pub struct ErrStream {
    diags: Vec<Diagnostic>,
    lexical: u32,
    syntax: u32,
    semantic: u32,
}

impl ErrStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diag: Diagnostic) {
        if diag.severity == Severity::Error {
            match diag.kind {
                ErrKind::Lexical => self.lexical += 1,
                ErrKind::Syntax => self.syntax += 1,
                ErrKind::Semantic => self.semantic += 1,
            }
        }
        self.diags.push(diag);
    }

    /// No token could be formed; `data` is the offending input slice.
    pub fn undefined_token(&mut self, data: &str, pos: SourceRange) {
        self.report(
            Diagnostic::error(
                Category::UndefinedToken,
                format!("can't form a token from `{data}`"),
            )
            .at(pos),
        );
    }

    pub fn unterminated_string(&mut self, pos: SourceRange) {
        self.report(
            Diagnostic::error(Category::UnterminatedString, "unterminated string literal")
                .at(pos),
        );
    }

    pub fn unterminated_comment(&mut self, pos: SourceRange) {
        self.report(
            Diagnostic::error(Category::UnterminatedComment, "unterminated block comment")
                .at(pos),
        );
    }

    /// A token was required but the file ended.
    pub fn expected_token(&mut self, expected: &str, pos: SourceRange) {
        self.report(
            Diagnostic::error(
                Category::ExpectedToken,
                format!("was expecting `{expected}`"),
            )
            .at(pos)
            .expected(expected),
        );
    }

    pub fn unexpected_token(&mut self, expected: &str, found: &str, pos: SourceRange) {
        self.report(
            Diagnostic::error(
                Category::UnexpectedToken,
                format!("was expecting `{expected}`, found `{found}`"),
            )
            .at(pos)
            .expected(expected)
            .found(found),
        );
    }

    /// A recoverable omission; `pos` should be the end of the previous
    /// token, not the start of the next line.
    pub fn missing_token(&mut self, expected: &str, pos: SourceRange) {
        self.report(
            Diagnostic::error(Category::MissingToken, format!("missing `{expected}`"))
                .at(pos)
                .expected(expected),
        );
    }

    /// No single expectation to name, the token is just wrong here.
    pub fn invalid_token(&mut self, found: &str, pos: SourceRange) {
        self.report(
            Diagnostic::error(Category::InvalidToken, format!("invalid token `{found}`"))
                .at(pos)
                .found(found),
        );
    }

    /// A token failed to narrow to an operator class; `allowed` names the
    /// accepted alternatives.
    pub fn invalid_token_cast(&mut self, found: &str, allowed: &str, pos: SourceRange) {
        self.report(
            Diagnostic::error(
                Category::InvalidToken,
                format!("invalid token `{found}`, accepted here: {allowed}"),
            )
            .at(pos)
            .expected(allowed)
            .found(found),
        );
    }

    pub fn dual_definition(&mut self, name: &str, first: SourceRange, second: SourceRange) {
        self.report(
            Diagnostic::error(
                Category::DualDefinition,
                format!("`{name}` is defined twice in this scope"),
            )
            .at(second)
            .with_help(format!("first definition at {first}")),
        );
    }

    pub fn custom(&mut self, kind: ErrKind, message: impl Into<String>, pos: Option<SourceRange>) {
        let mut diag = Diagnostic::custom(kind, message);
        diag.pos = pos;
        self.report(diag);
    }

    pub fn lexical_errors(&self) -> u32 {
        self.lexical
    }

    pub fn syntax_errors(&self) -> u32 {
        self.syntax
    }

    pub fn semantic_errors(&self) -> u32 {
        self.semantic
    }

    pub fn had_errors(&self) -> bool {
        self.lexical + self.syntax + self.semantic > 0
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }

    /// Take all accumulated diagnostics and reset the counters.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        self.lexical = 0;
        self.syntax = 0;
        self.semantic = 0;
        std::mem::take(&mut self.diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> SourceRange {
        SourceRange::new(1, 5, 1, 8)
    }

    #[test]
    fn diagnostic_display_includes_range() {
        let diag = Diagnostic::error(Category::MissingToken, "missing `;`").at(pos());
        assert_eq!(diag.to_string(), "Error (1:5 -> 1:8): missing `;`");
    }

    #[test]
    fn diagnostic_display_without_position() {
        let diag = Diagnostic::custom(ErrKind::Semantic, "broadcast arity mismatch");
        assert_eq!(diag.to_string(), "Error: broadcast arity mismatch");
    }

    #[test]
    fn expected_and_found_render_on_their_own_lines() {
        let diag = Diagnostic::error(Category::UnexpectedToken, "was expecting `;`, found `}`")
            .at(pos())
            .expected(";")
            .found("}");
        let s = diag.to_string();
        assert!(s.contains("\n  expected: ;"));
        assert!(s.contains("\n  found: }"));
    }

    #[test]
    fn counters_follow_kinds() {
        let mut err = ErrStream::new();
        err.undefined_token("`", pos());
        err.missing_token(";", pos());
        err.unexpected_token(",", "1", pos());
        err.dual_definition("x", pos(), pos());
        assert_eq!(err.lexical_errors(), 1);
        assert_eq!(err.syntax_errors(), 2);
        assert_eq!(err.semantic_errors(), 1);
        assert!(err.had_errors());
    }

    #[test]
    fn custom_kind_overrides_category_default() {
        let mut err = ErrStream::new();
        err.custom(ErrKind::Semantic, "too few types for variables", Some(pos()));
        assert_eq!(err.syntax_errors(), 0);
        assert_eq!(err.semantic_errors(), 1);
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut err = ErrStream::new();
        err.report(Diagnostic::warning(Category::Custom, "extra `,`").at(pos()));
        assert!(!err.had_errors());
        assert_eq!(err.diagnostics().len(), 1);
    }

    #[test]
    fn drain_resets_counters() {
        let mut err = ErrStream::new();
        err.missing_token(";", pos());
        let drained = err.drain();
        assert_eq!(drained.len(), 1);
        assert!(!err.had_errors());
        assert!(err.diagnostics().is_empty());
    }

    #[test]
    fn category_metadata_is_stable_and_unique() {
        let mut codes = std::collections::BTreeSet::new();
        for cat in Category::all() {
            assert!(!cat.as_str().is_empty());
            assert!(!cat.description().is_empty());
            assert!(codes.insert(cat.code()), "duplicate code {}", cat.code());
        }
    }
}
