//! AST node definitions and source ranges for Porc.
//!
//! This crate defines the tree produced by the parser. Every node carries a
//! [`SourceRange`] for diagnostics, and identifiers additionally carry the
//! SSA subscript written by the resolve pass. The tree is a strict ownership
//! tree (`Box`/`Vec` only); after parsing, the only field ever mutated is
//! [`Ident::subscript`].

use std::fmt;

pub mod print;
pub mod walk;

/// An inclusive line/column region within a source file. Lines and columns
/// are 1-based; `0` never occurs in real positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceRange {
    pub line_start: u32,
    pub col_start: u32,
    pub line_end: u32,
    pub col_end: u32,
}

impl SourceRange {
    /// The "no position" sentinel, used for synthesized nodes.
    pub const NULL: SourceRange = SourceRange {
        line_start: 0,
        col_start: 0,
        line_end: 0,
        col_end: 0,
    };

    pub fn new(line_start: u32, col_start: u32, line_end: u32, col_end: u32) -> Self {
        Self {
            line_start,
            col_start,
            line_end,
            col_end,
        }
    }

    /// A range covering a single point.
    pub fn at(line: u32, col: u32) -> Self {
        Self::new(line, col, line, col)
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Create a range that covers both `self` and `other`.
    /// `NULL` is the identity: merging with it returns the other range.
    pub fn merge(self, other: SourceRange) -> SourceRange {
        if self.is_null() {
            return other;
        }
        if other.is_null() {
            return self;
        }
        let (line_start, col_start) =
            if (self.line_start, self.col_start) <= (other.line_start, other.col_start) {
                (self.line_start, self.col_start)
            } else {
                (other.line_start, other.col_start)
            };
        let (line_end, col_end) =
            if (self.line_end, self.col_end) >= (other.line_end, other.col_end) {
                (self.line_end, self.col_end)
            } else {
                (other.line_end, other.col_end)
            };
        SourceRange {
            line_start,
            col_start,
            line_end,
            col_end,
        }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.line_start, self.col_start, self.line_end, self.col_end
        )
    }
}

/// A value paired with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub pos: SourceRange,
}

impl<T> Spanned<T> {
    pub fn new(node: T, pos: SourceRange) -> Self {
        Self { node, pos }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            pos: self.pos,
        }
    }
}

/// An identifier occurrence. `subscript` is the SSA tag: `0` until the
/// resolve pass runs, then the version of the binding this occurrence
/// refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub pos: SourceRange,
    pub subscript: u32,
}

impl Ident {
    pub fn new(name: impl Into<String>, pos: SourceRange) -> Self {
        Self {
            name: name.into(),
            pos,
            subscript: 0,
        }
    }
}

/// A dotted identifier path: `a.b.c`. Always non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierAccess {
    pub parts: Vec<Ident>,
}

impl IdentifierAccess {
    pub fn new(parts: Vec<Ident>) -> Self {
        debug_assert!(!parts.is_empty(), "identifier access cannot be empty");
        Self { parts }
    }

    pub fn single(id: Ident) -> Self {
        Self { parts: vec![id] }
    }

    pub fn pos(&self) -> SourceRange {
        self.parts
            .iter()
            .fold(SourceRange::NULL, |acc, id| acc.merge(id.pos))
    }
}

// ---------------------------------------------------------------------------
// File level
// ---------------------------------------------------------------------------

/// A parsed source file: its statements plus its `type` declarations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileDecl {
    pub statements: Vec<Statement>,
    pub types: Vec<TypeDecl>,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub prefix: StatementPrefix,
    pub kind: StatementKind,
    pub pos: SourceRange,
}

/// Control-flow prefix on a statement: an optional `yield` combined with at
/// most one of `return`, `break`, `continue`, or the block-value marker `=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementPrefix {
    pub yields: bool,
    pub kind: PrefixKind,
}

impl StatementPrefix {
    pub const NONE: StatementPrefix = StatementPrefix {
        yields: false,
        kind: PrefixKind::None,
    };

    pub fn is_none(&self) -> bool {
        !self.yields && self.kind == PrefixKind::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixKind {
    None,
    Return,
    Break,
    Continue,
    /// `= expr` inside a block, or the implicit final-statement form: the
    /// value this block evaluates to.
    BlockVal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    VarDecl(VarDecl),
    Assign(AssignExpr),
    Expr(Expr),
}

/// `let`-style declaration of one or more names:
/// `a, b : Int = 1, 2;` or `x :: 3;` or `y := f();`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub mutable: bool,
    pub decls: Vec<VarDeclEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclEntry {
    pub id: Ident,
    pub ty: Option<TypeExpr>,
    pub value: Option<Expr>,
}

impl VarDeclEntry {
    pub fn pos(&self) -> SourceRange {
        let pos = self.id.pos;
        let pos = self
            .ty
            .as_ref()
            .map_or(pos, |t| pos.merge(t.pos));
        self.value.as_ref().map_or(pos, |v| pos.merge(v.pos))
    }
}

/// Multi-target assignment: `a, b += 1, 2;`. A single RHS against several
/// LHS targets is a broadcast; target/value arity is not checked at parse
/// time.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignExpr {
    pub lhs: Vec<Expr>,
    pub op: AssignOp,
    pub rhs: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    FloorDiv,
}

impl AssignOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Pow => "**=",
            AssignOp::Mod => "%=",
            AssignOp::FloorDiv => "%/=",
        }
    }
}

// ---------------------------------------------------------------------------
// Type declarations
// ---------------------------------------------------------------------------

/// `type Name is TypeExpr;`, `type Name { ... };`, or a forward declaration
/// `type Name;`. A body may be merged onto a forward declaration later by
/// the resolve pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub id: Ident,
    pub ty: Option<TypeExpr>,
    pub body: Vec<TypeStatement>,
    pub pos: SourceRange,
}

impl TypeDecl {
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeStatement {
    TypeDecl(TypeDecl),
    Macro(MacroExpr),
    Member(VarDecl),
}

pub type TypeExpr = Spanned<TypeExprKind>;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    /// `Name` or `a.b.Name`.
    Named(IdentifierAccess),
    /// Generic application: `Name[T, U]`.
    Generic {
        base: IdentifierAccess,
        args: Vec<TypeExpr>,
    },
    /// `(a: T, b: U)` — entries may be unnamed: `(Int, Flt)`.
    Tuple(Vec<TupleTypeEntry>),
    /// `(args) -> ret`.
    Func {
        params: Vec<TupleTypeEntry>,
        ret: Box<TypeExpr>,
    },
    /// `A | B | C`. Always at least two alternatives.
    Variant(Vec<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleTypeEntry {
    pub id: Option<Ident>,
    pub ty: TypeExpr,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

pub type Expr = Spanned<ExprKind>;

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// The operator tower; a bare atom sits here with single-term layers.
    Logical(LogicalOrExpr),
    /// `let a :: 1` in expression position.
    VarDecl(VarDecl),
    /// Assignment in expression position.
    Assign(AssignExpr),
    /// `(params) -> Ret => body` or `(params) => body`.
    FuncDecl(FuncDecl),
    /// `struct (members) { body }`.
    StructDecl(StructDecl),
    /// `start..stop`, `start..=stop:step`, `..stop`.
    Range(RangeExpr),
    /// `[a, b]` arrays and `(a, b)` tuples.
    Collection(CollectionExpr),
    /// `{key: value, ...}` — never empty, `{}` parses as an empty block.
    Map(MapExpr),
    If(IfBlock),
    While(WhileBlock),
    For(ForBlock),
    /// `{ stmt* }` as an expression; its value is the `BlockVal` statement.
    Block(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub params: Vec<VarDeclEntry>,
    pub ret_type: Option<TypeExpr>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub members: Vec<VarDeclEntry>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeExpr {
    pub inclusive: bool,
    pub start: Option<Box<Expr>>,
    pub stop: Box<Expr>,
    pub step: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionExpr {
    pub values: Vec<Expr>,
    pub kind: CollectionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Array,
    Tuple,
}

/// Parallel key/value lists; `keys.len() == values.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapExpr {
    pub keys: Vec<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfBlock {
    pub branches: Vec<IfBranch>,
    pub else_body: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfBranch {
    pub cond: Expr,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileBlock {
    pub cond: Box<Expr>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForBlock {
    pub ids: Vec<Ident>,
    pub iterators: Vec<Expr>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroExpr {
    pub name: IdentifierAccess,
    pub args: Vec<Expr>,
    pub pos: SourceRange,
}

// ---------------------------------------------------------------------------
// Operator tower
// ---------------------------------------------------------------------------

/// `a || b || c`. A single term is just that term.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalOrExpr {
    pub terms: Vec<LogicalAndExpr>,
}

/// `a && b && c`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalAndExpr {
    pub terms: Vec<ComparisonExpr>,
}

/// `a < b == c`; left-associative chain kept flat as `(op, operand)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpr {
    pub first: AdditiveExpr,
    pub rest: Vec<(ComparisonOp, AdditiveExpr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveExpr {
    pub first: MultiplicativeExpr,
    pub rest: Vec<(AdditiveOp, MultiplicativeExpr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiplicativeExpr {
    pub first: PowerExpr,
    pub rest: Vec<(MultiplicativeOp, PowerExpr)>,
}

/// `a ** b ** c`, right-associative, so kept as the flat term list.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerExpr {
    pub terms: Vec<UnaryExpr>,
}

/// Zero or more prefix operators applied to an atom: `!-x`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub ops: Vec<PrefixOp>,
    pub rhs: Atom,
}

pub type Atom = Spanned<AtomKind>;

#[derive(Debug, Clone, PartialEq)]
pub enum AtomKind {
    Ident(Ident),
    Constant(Constant),
    /// Parenthesised expression used as an atom.
    Paren(Box<Expr>),
    Macro(MacroExpr),
    /// `base[index]`.
    Index { base: Box<Atom>, index: Box<Expr> },
    /// `base[start:stop:step]`; any component may be absent.
    Slice {
        base: Box<Atom>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    /// `base(args)`.
    Call { base: Box<Atom>, args: Vec<Expr> },
    /// `base.member`.
    Member { base: Box<Atom>, member: Ident },
    /// `func <| folded` (`rightward: false`) or `folded |> func`
    /// (`rightward: true`).
    Fold {
        func: Box<Atom>,
        folded: Box<AdditiveExpr>,
        rightward: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Flt(f64),
    Str(String),
    Char(char),
    Bool(bool),
    /// `void`; also what a bare `return;` or `break;` carries.
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Less,
    Greater,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Less => "<",
            ComparisonOp::Greater => ">",
            ComparisonOp::Equal => "==",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::LessEqual => "<=",
            ComparisonOp::GreaterEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditiveOp {
    Add,
    Sub,
}

impl AdditiveOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            AdditiveOp::Add => "+",
            AdditiveOp::Sub => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplicativeOp {
    Mul,
    Div,
    Mod,
    FloorDiv,
}

impl MultiplicativeOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            MultiplicativeOp::Mul => "*",
            MultiplicativeOp::Div => "/",
            MultiplicativeOp::Mod => "%",
            MultiplicativeOp::FloorDiv => "%/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Not,
    Neg,
}

impl PrefixOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            PrefixOp::Not => "!",
            PrefixOp::Neg => "-",
        }
    }
}

// ---------------------------------------------------------------------------
// Tower lifting helpers
// ---------------------------------------------------------------------------
//
// The parser (and the fold desugaring in particular) frequently needs to
// promote an inner node to a full expression, wrapping it in single-term
// layers of the tower.

impl UnaryExpr {
    pub fn from_atom(atom: Atom) -> UnaryExpr {
        UnaryExpr {
            ops: Vec::new(),
            rhs: atom,
        }
    }
}

impl AdditiveExpr {
    pub fn from_atom(atom: Atom) -> AdditiveExpr {
        AdditiveExpr {
            first: MultiplicativeExpr {
                first: PowerExpr {
                    terms: vec![UnaryExpr::from_atom(atom)],
                },
                rest: Vec::new(),
            },
            rest: Vec::new(),
        }
    }

    /// The sole atom of a single-term tower, if this is one.
    pub fn as_single_atom(&self) -> Option<&Atom> {
        if !self.rest.is_empty() || !self.first.rest.is_empty() {
            return None;
        }
        match self.first.first.terms.as_slice() {
            [unary] if unary.ops.is_empty() => Some(&unary.rhs),
            _ => None,
        }
    }

    pub fn as_single_atom_mut(&mut self) -> Option<&mut Atom> {
        if !self.rest.is_empty() || !self.first.rest.is_empty() {
            return None;
        }
        match self.first.first.terms.as_mut_slice() {
            [unary] if unary.ops.is_empty() => Some(&mut unary.rhs),
            _ => None,
        }
    }
}

impl LogicalOrExpr {
    pub fn from_additive(additive: AdditiveExpr) -> LogicalOrExpr {
        LogicalOrExpr {
            terms: vec![LogicalAndExpr {
                terms: vec![ComparisonExpr {
                    first: additive,
                    rest: Vec::new(),
                }],
            }],
        }
    }

    pub fn from_atom(atom: Atom) -> LogicalOrExpr {
        Self::from_additive(AdditiveExpr::from_atom(atom))
    }

    pub fn as_single_additive(&self) -> Option<&AdditiveExpr> {
        match self.terms.as_slice() {
            [and] => match and.terms.as_slice() {
                [cmp] if cmp.rest.is_empty() => Some(&cmp.first),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_single_additive_mut(&mut self) -> Option<&mut AdditiveExpr> {
        match self.terms.as_mut_slice() {
            [and] => match and.terms.as_mut_slice() {
                [cmp] if cmp.rest.is_empty() => Some(&mut cmp.first),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Expr {
    pub fn from_atom(atom: Atom) -> Expr {
        let pos = atom.pos;
        Expr::new(ExprKind::Logical(LogicalOrExpr::from_atom(atom)), pos)
    }

    pub fn from_ident(id: Ident) -> Expr {
        let pos = id.pos;
        Expr::from_atom(Atom::new(AtomKind::Ident(id), pos))
    }

    /// Wrap an already-built expression as a parenthesised atom.
    pub fn paren(expr: Expr) -> Expr {
        let pos = expr.pos;
        Expr::from_atom(Atom::new(AtomKind::Paren(Box::new(expr)), pos))
    }

    pub fn is_func_decl(&self) -> bool {
        matches!(self.node, ExprKind::FuncDecl(_))
    }

    /// Collapse this expression into an atom: a single-atom tower yields its
    /// atom unchanged, anything else becomes a parenthesised atom. Keeps
    /// `(a)` from gaining a layer of parentheses on every re-parse.
    pub fn into_atom(self) -> Atom {
        let pos = self.pos;
        if let ExprKind::Logical(logical) = &self.node {
            if let Some(atom) = logical
                .as_single_additive()
                .and_then(AdditiveExpr::as_single_atom)
            {
                return atom.clone();
            }
        }
        Atom::new(AtomKind::Paren(Box::new(self)), pos)
    }
}
