//! Tracing types for resolver observability.
//!
//! These capture the step-by-step decisions of the scope walk: every
//! declaration, assignment, and read, with the subscript that was handed
//! out and the scope it landed in. All tracing is opt-in via
//! `PassManager::enable_tracing()` — zero overhead when disabled.

use serde::Serialize;

/// A single step in a resolution trace.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveStep {
    pub step: usize,
    pub action: ResolveAction,
    pub name: String,
    pub subscript: u32,
    /// Scope the entry was recorded in (or resolved from).
    pub scope: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<(u32, u32)>,
}

/// What the resolver did with an identifier occurrence.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAction {
    /// A new binding introduced by a declaration.
    Declare,
    /// A new binding whose value is a function literal.
    DeclareFunc,
    /// Reassignment of an existing binding — subscript bumped.
    Assign,
    /// A read resolved against an existing binding.
    Read,
    /// A name with no binding anywhere in the scope chain; treated as an
    /// external reference at subscript 0.
    External,
}
