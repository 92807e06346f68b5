//! Scope resolution for Porc.
//!
//! A [`PassManager`] makes exactly one pre-order walk over a parsed
//! [`FileDecl`], opening a [`Scope`] on entry to the file root, each type
//! body, each function body, and each braced block, and closing it on exit.
//! At every identifier occurrence and type declaration the registered
//! passes are dispatched in descending priority order; a pass returning
//! [`PassOutcome::Stop`] short-circuits the remaining passes for that node
//! only.
//!
//! Scopes live in an arena owned by the manager and refer to their parent
//! by [`ScopeId`], never by pointer. Scope ids are handed out by a counter
//! on the arena, so two managers never share numbering state.
//!
//! The only pass shipped here is [`SsaPass`], which tags every identifier
//! with an SSA subscript (see the module docs in `ssa.rs`).

use std::collections::HashMap;
use std::fmt;

use porc_ast::{
    AdditiveExpr, AssignExpr, Atom, AtomKind, Expr, ExprKind, FileDecl, Ident,
    LogicalOrExpr, MultiplicativeExpr, PowerExpr, SourceRange, Statement,
    StatementKind, TypeDecl, TypeStatement, VarDecl,
};
use porc_diag::ErrStream;

mod ssa;
mod trace;

pub use ssa::SsaPass;
pub use trace::{ResolveAction, ResolveStep};

// ---------------------------------------------------------------------------
// Scope arena
// ---------------------------------------------------------------------------

/// Index of a [`Scope`] in its owning [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// What kind of lexical region a [`Scope`] covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    TopLevel,
    Type,
    Function,
    Block,
}

/// A name together with the SSA subscript of one particular binding of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SsaName {
    pub name: String,
    pub subscript: u32,
}

impl SsaName {
    pub fn new(name: impl Into<String>, subscript: u32) -> Self {
        Self {
            name: name.into(),
            subscript,
        }
    }
}

impl fmt::Display for SsaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.subscript)
    }
}

/// A registered `type` declaration. Forward declarations (`type Foo;`) and
/// the later defining occurrence share one entry.
#[derive(Debug, Clone, Copy)]
pub struct TypeEntry {
    pub pos: SourceRange,
    pub has_body: bool,
}

/// One lexical region: the file root, a type body, a function body, or a
/// braced block. Holds the SSA counters and the declaration sites recorded
/// while the walk was inside it.
#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Latest subscript handed out per name declared or assigned here.
    pub current_ids: HashMap<String, u32>,
    /// Declaration site of each plain-value binding.
    pub variable_decls: HashMap<SsaName, SourceRange>,
    /// Declaration site of each function-valued binding, kept apart from
    /// `variable_decls` so call-target lookup never has to re-inspect the
    /// tree shape.
    pub func_decls: HashMap<SsaName, SourceRange>,
    pub type_decls: HashMap<String, TypeEntry>,
}

impl Scope {
    fn new(id: ScopeId, kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            kind,
            parent,
            current_ids: HashMap::new(),
            variable_decls: HashMap::new(),
            func_decls: HashMap::new(),
            type_decls: HashMap::new(),
        }
    }
}

/// Arena of every scope created during one walk, plus the push/pop cursor.
/// Scopes are never freed individually; the whole arena is torn down at
/// once when the tree is dropped.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl ScopeTree {
    pub fn new() -> Self {
        let root = Scope::new(ScopeId(0), ScopeKind::TopLevel, None);
        Self {
            scopes: vec![root],
            current: ScopeId(0),
        }
    }

    pub fn current_id(&self) -> ScopeId {
        self.current
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn current(&self) -> &Scope {
        self.get(self.current)
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        let id = self.current;
        self.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    /// Open a child of the current scope and make it current.
    pub fn push(&mut self, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(id, kind, Some(self.current)));
        self.current = id;
        id
    }

    /// Restore the parent of the current scope as current. The root is
    /// never popped.
    pub fn pop(&mut self) {
        debug_assert!(
            self.current().parent.is_some(),
            "scope stack underflow"
        );
        if let Some(parent) = self.current().parent {
            self.current = parent;
        }
    }

    /// Find the nearest enclosing scope with any subscript recorded for
    /// `name`, starting at the current scope.
    pub fn resolve(&self, name: &str) -> Option<(ScopeId, u32)> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            let scope = self.get(id);
            if let Some(&subscript) = scope.current_ids.get(name) {
                return Some((id, subscript));
            }
            cursor = scope.parent;
        }
        None
    }

    /// Register a declaration of `name` in the current scope. The first
    /// declaration of a name gets subscript 0; a re-declaration bumps it.
    pub fn declare(&mut self, name: &str) -> u32 {
        let counter = self
            .current_mut()
            .current_ids
            .entry(name.to_string())
            .and_modify(|n| *n += 1)
            .or_insert(0);
        *counter
    }

    /// Bump the subscript of `name` in the scope that owns it. Used for
    /// reassignment, which rebinds in place rather than shadowing.
    pub fn bump(&mut self, owner: ScopeId, name: &str) -> u32 {
        let counter = self
            .get_mut(owner)
            .current_ids
            .entry(name.to_string())
            .and_modify(|n| *n += 1)
            .or_insert(0);
        *counter
    }

    /// Record a name with no binding anywhere in the chain as an external
    /// reference at subscript 0 in the current scope, so later occurrences
    /// resolve consistently.
    pub fn record_external(&mut self, name: &str) {
        self.current_mut()
            .current_ids
            .entry(name.to_string())
            .or_insert(0);
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Pass dispatch
// ---------------------------------------------------------------------------

/// How an identifier occurrence participates in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentUse {
    /// Plain read.
    Read,
    /// Root of an assignment target; `func` marks a function-valued
    /// right-hand side.
    Assign { func: bool },
    /// A binding introduced by a declaration; `func` likewise.
    Declare { func: bool },
}

/// The node kinds passes dispatch on. One enum rather than a method per
/// kind keeps the pass order enforceable in a single place.
pub enum Node<'a> {
    Ident(&'a mut Ident, IdentUse),
    TypeDecl(&'a TypeDecl),
}

impl Node<'_> {
    fn reborrow(&mut self) -> Node<'_> {
        match self {
            Node::Ident(id, usage) => Node::Ident(&mut **id, *usage),
            Node::TypeDecl(decl) => Node::TypeDecl(*decl),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Continue,
    /// Skip the remaining (lower-priority) passes for this node. Siblings
    /// and children are still walked.
    Stop,
}

/// Shared state handed to passes at each dispatch point.
pub struct PassContext<'a> {
    pub scopes: &'a mut ScopeTree,
    pub err: &'a mut ErrStream,
    trace: Option<&'a mut Vec<ResolveStep>>,
}

impl PassContext<'_> {
    /// Append a trace step when tracing is enabled.
    pub fn trace(
        &mut self,
        action: ResolveAction,
        name: &str,
        subscript: u32,
        scope: ScopeId,
        pos: SourceRange,
    ) {
        if let Some(steps) = self.trace.as_deref_mut() {
            let step = steps.len();
            steps.push(ResolveStep {
                step,
                action,
                name: name.to_string(),
                subscript,
                scope: scope.0,
                span: (pos != SourceRange::NULL)
                    .then_some((pos.line_start, pos.col_start)),
            });
        }
    }
}

/// An analysis threaded through the manager's single tree walk.
pub trait Pass {
    fn name(&self) -> &'static str;
    /// Higher priority runs earlier at each node.
    fn priority(&self) -> i32;
    fn visit(&mut self, node: Node<'_>, ctx: &mut PassContext<'_>) -> PassOutcome;
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns the scope arena and the registered passes, and drives the one walk
/// they all share.
pub struct PassManager {
    scopes: ScopeTree,
    passes: Vec<Box<dyn Pass>>,
    trace: Option<Vec<ResolveStep>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self {
            scopes: ScopeTree::new(),
            passes: Vec::new(),
            trace: None,
        }
    }

    pub fn register(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
        self.passes.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Start recording a [`ResolveStep`] per dispatch decision.
    pub fn enable_tracing(&mut self) {
        self.trace = Some(Vec::new());
    }

    pub fn take_trace(&mut self) -> Vec<ResolveStep> {
        self.trace.take().unwrap_or_default()
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn into_scopes(self) -> ScopeTree {
        self.scopes
    }

    pub fn run(&mut self, file: &mut FileDecl, err: &mut ErrStream) {
        let mut walk = Walk {
            scopes: &mut self.scopes,
            passes: &mut self.passes,
            trace: self.trace.as_mut(),
            err,
        };
        walk.file(file);
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a file with the standard pass set and return the scopes.
pub fn resolve_file(file: &mut FileDecl, err: &mut ErrStream) -> ScopeTree {
    let mut manager = PassManager::new();
    manager.register(Box::new(SsaPass::new()));
    manager.run(file, err);
    manager.into_scopes()
}

// ---------------------------------------------------------------------------
// The walk
// ---------------------------------------------------------------------------

struct Walk<'a> {
    scopes: &'a mut ScopeTree,
    passes: &'a mut Vec<Box<dyn Pass>>,
    trace: Option<&'a mut Vec<ResolveStep>>,
    err: &'a mut ErrStream,
}

impl Walk<'_> {
    fn dispatch(&mut self, mut node: Node<'_>) {
        let mut ctx = PassContext {
            scopes: &mut *self.scopes,
            err: &mut *self.err,
            trace: self.trace.as_deref_mut(),
        };
        for pass in self.passes.iter_mut() {
            if pass.visit(node.reborrow(), &mut ctx) == PassOutcome::Stop {
                break;
            }
        }
    }

    fn file(&mut self, file: &mut FileDecl) {
        for stmt in &mut file.statements {
            self.statement(stmt);
        }
        for decl in &mut file.types {
            self.type_decl(decl);
        }
    }

    fn statement(&mut self, stmt: &mut Statement) {
        match &mut stmt.kind {
            StatementKind::VarDecl(decl) => self.var_decl(decl),
            StatementKind::Assign(assign) => self.assign(assign),
            StatementKind::Expr(expr) => self.expr(expr),
        }
    }

    fn body(&mut self, kind: ScopeKind, stmts: &mut [Statement]) {
        self.scopes.push(kind);
        for stmt in stmts {
            self.statement(stmt);
        }
        self.scopes.pop();
    }

    /// Values are walked before the names they bind, so `x := x + 1;`
    /// reads the old `x`.
    fn var_decl(&mut self, decl: &mut VarDecl) {
        for entry in &mut decl.decls {
            let func = entry.value.as_ref().is_some_and(Expr::is_func_decl);
            if let Some(value) = &mut entry.value {
                self.expr(value);
            }
            self.dispatch(Node::Ident(&mut entry.id, IdentUse::Declare { func }));
        }
    }

    /// Targets pair with right-hand sides positionally; a single value
    /// broadcasts to every target. A target paired with a function literal
    /// rebinds as a function.
    fn assign(&mut self, assign: &mut AssignExpr) {
        let funcs: Vec<bool> = assign.rhs.iter().map(Expr::is_func_decl).collect();
        for rhs in &mut assign.rhs {
            self.expr(rhs);
        }
        for (i, lhs) in assign.lhs.iter_mut().enumerate() {
            let func = if funcs.len() == 1 {
                funcs[0]
            } else {
                funcs.get(i).copied().unwrap_or(false)
            };
            self.assign_target(lhs, func);
        }
    }

    /// In `xs[i], p.x = a, b` only the root names `xs` and `p` are writes;
    /// indices and everything on the right are reads.
    fn assign_target(&mut self, expr: &mut Expr, func: bool) {
        if let ExprKind::Logical(logical) = &mut expr.node {
            if let Some(atom) = logical
                .as_single_additive_mut()
                .and_then(AdditiveExpr::as_single_atom_mut)
            {
                self.assign_target_atom(atom, func);
                return;
            }
        }
        self.expr(expr);
    }

    fn assign_target_atom(&mut self, atom: &mut Atom, func: bool) {
        match &mut atom.node {
            AtomKind::Ident(id) => {
                self.dispatch(Node::Ident(id, IdentUse::Assign { func }))
            }
            AtomKind::Index { base, index } => {
                self.expr(index);
                self.assign_target_atom(base, func);
            }
            AtomKind::Slice {
                base,
                start,
                stop,
                step,
            } => {
                for part in [start, stop, step].into_iter().flatten() {
                    self.expr(part);
                }
                self.assign_target_atom(base, func);
            }
            AtomKind::Member { base, .. } => self.assign_target_atom(base, func),
            AtomKind::Paren(inner) => self.assign_target(inner, func),
            _ => self.atom(atom),
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        match &mut expr.node {
            ExprKind::Logical(logical) => self.logical(logical),
            ExprKind::VarDecl(decl) => self.var_decl(decl),
            ExprKind::Assign(assign) => self.assign(assign),
            ExprKind::FuncDecl(func) => {
                // defaults may only refer to the enclosing scope
                for param in &mut func.params {
                    if let Some(default) = &mut param.value {
                        self.expr(default);
                    }
                }
                self.scopes.push(ScopeKind::Function);
                for param in &mut func.params {
                    self.dispatch(Node::Ident(
                        &mut param.id,
                        IdentUse::Declare { func: false },
                    ));
                }
                for stmt in &mut func.body {
                    self.statement(stmt);
                }
                self.scopes.pop();
            }
            ExprKind::StructDecl(decl) => {
                for member in &mut decl.members {
                    if let Some(default) = &mut member.value {
                        self.expr(default);
                    }
                }
                self.scopes.push(ScopeKind::Type);
                for member in &mut decl.members {
                    self.dispatch(Node::Ident(
                        &mut member.id,
                        IdentUse::Declare { func: false },
                    ));
                }
                for stmt in &mut decl.body {
                    self.statement(stmt);
                }
                self.scopes.pop();
            }
            ExprKind::Range(range) => {
                if let Some(start) = &mut range.start {
                    self.expr(start);
                }
                self.expr(&mut range.stop);
                if let Some(step) = &mut range.step {
                    self.expr(step);
                }
            }
            ExprKind::Collection(coll) => {
                for value in &mut coll.values {
                    self.expr(value);
                }
            }
            ExprKind::Map(map) => {
                for e in map.keys.iter_mut().chain(&mut map.values) {
                    self.expr(e);
                }
            }
            ExprKind::If(block) => {
                for branch in &mut block.branches {
                    self.expr(&mut branch.cond);
                    self.body(ScopeKind::Block, &mut branch.body);
                }
                if let Some(else_body) = &mut block.else_body {
                    self.body(ScopeKind::Block, else_body);
                }
            }
            ExprKind::While(block) => {
                self.expr(&mut block.cond);
                self.body(ScopeKind::Block, &mut block.body);
            }
            ExprKind::For(block) => {
                for iter in &mut block.iterators {
                    self.expr(iter);
                }
                self.scopes.push(ScopeKind::Block);
                for id in &mut block.ids {
                    self.dispatch(Node::Ident(id, IdentUse::Declare { func: false }));
                }
                for stmt in &mut block.body {
                    self.statement(stmt);
                }
                self.scopes.pop();
            }
            ExprKind::Block(body) => self.body(ScopeKind::Block, body),
        }
    }

    fn type_decl(&mut self, decl: &mut TypeDecl) {
        self.dispatch(Node::TypeDecl(decl));
        if decl.body.is_empty() {
            return;
        }
        self.scopes.push(ScopeKind::Type);
        for stmt in &mut decl.body {
            match stmt {
                TypeStatement::TypeDecl(inner) => self.type_decl(inner),
                TypeStatement::Macro(m) => {
                    for arg in &mut m.args {
                        self.expr(arg);
                    }
                }
                TypeStatement::Member(var) => self.var_decl(var),
            }
        }
        self.scopes.pop();
    }

    fn logical(&mut self, logical: &mut LogicalOrExpr) {
        for and in &mut logical.terms {
            for cmp in &mut and.terms {
                self.additive(&mut cmp.first);
                for (_, operand) in &mut cmp.rest {
                    self.additive(operand);
                }
            }
        }
    }

    fn additive(&mut self, additive: &mut AdditiveExpr) {
        self.multiplicative(&mut additive.first);
        for (_, mult) in &mut additive.rest {
            self.multiplicative(mult);
        }
    }

    fn multiplicative(&mut self, mult: &mut MultiplicativeExpr) {
        self.power(&mut mult.first);
        for (_, power) in &mut mult.rest {
            self.power(power);
        }
    }

    fn power(&mut self, power: &mut PowerExpr) {
        for unary in &mut power.terms {
            self.atom(&mut unary.rhs);
        }
    }

    fn atom(&mut self, atom: &mut Atom) {
        match &mut atom.node {
            AtomKind::Ident(id) => self.dispatch(Node::Ident(id, IdentUse::Read)),
            AtomKind::Constant(_) => {}
            AtomKind::Paren(inner) => self.expr(inner),
            AtomKind::Macro(m) => {
                // macro names live in their own namespace and stay untagged
                for arg in &mut m.args {
                    self.expr(arg);
                }
            }
            AtomKind::Index { base, index } => {
                self.atom(base);
                self.expr(index);
            }
            AtomKind::Slice {
                base,
                start,
                stop,
                step,
            } => {
                self.atom(base);
                for part in [start, stop, step].into_iter().flatten() {
                    self.expr(part);
                }
            }
            AtomKind::Call { base, args } => {
                self.atom(base);
                for arg in args {
                    self.expr(arg);
                }
            }
            AtomKind::Member { base, .. } => self.atom(base),
            AtomKind::Fold { func, folded, .. } => {
                self.atom(func);
                self.additive(folded);
            }
        }
    }
}
