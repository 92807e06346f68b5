//! Recursive-descent parser.
//!
//! Parse methods return `Option`: `None` means the construct could not be
//! completed and a diagnostic was already pushed to the error stream. The
//! file-level loop resynchronizes at `;` or `}` and keeps going, so one bad
//! statement never hides the rest of the file.
//!
//! The grammar is almost LL(1); the two places that need more are the
//! parenthesis form (`(a)` vs `(a, b)` vs `(a: Int) => ...`) and brace form
//! (`{k: v}` vs `{ stmt; }`), both resolved with one token of pushback.

use std::mem;

use porc_ast::{
    AdditiveExpr, AssignExpr, Atom, AtomKind, CollectionExpr, CollectionKind, ComparisonExpr,
    Constant, Expr, ExprKind, FileDecl, ForBlock, FuncDecl, Ident, IdentifierAccess, IfBlock,
    IfBranch, LogicalAndExpr, LogicalOrExpr, MacroExpr, MapExpr, MultiplicativeExpr, PowerExpr,
    PrefixKind, RangeExpr, SourceRange, Statement, StatementKind, StatementPrefix, StructDecl,
    TupleTypeEntry, TypeDecl, TypeExpr, TypeExprKind, TypeStatement, UnaryExpr, VarDecl,
    VarDeclEntry, WhileBlock,
};
use porc_diag::ErrKind;

use crate::lexer::TokenStream;
use crate::reader::Reader;
use crate::token::{Token, TokenKind};

pub struct Parser<'e, R: Reader> {
    stream: TokenStream<'e, R>,
}

impl<'e, R: Reader> Parser<'e, R> {
    pub fn new(stream: TokenStream<'e, R>) -> Self {
        Self { stream }
    }

    // -- token helpers ----------------------------------------------------

    /// Pop the next token if it matches `kind` (payloads ignored).
    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        let tok = self.stream.peek_current();
        if mem::discriminant(&tok.kind) == mem::discriminant(&kind) {
            Some(self.stream.pop_current())
        } else {
            None
        }
    }

    /// Require the next token to be `kind`, reporting and pushing it back
    /// otherwise so resynchronization can see it.
    fn consume(&mut self, kind: TokenKind) -> Option<Token> {
        let tok = self.stream.pop_current();
        if mem::discriminant(&tok.kind) == mem::discriminant(&kind) {
            return Some(tok);
        }
        let expected = kind.describe();
        match tok.kind {
            TokenKind::EndOfFile => self.stream.err.expected_token(&expected, tok.pos),
            // the scanner already reported this one
            TokenKind::Undefined => self.stream.push_back(tok),
            _ => {
                self.stream
                    .err
                    .unexpected_token(&expected, &tok.kind.describe(), tok.pos);
                self.stream.push_back(tok);
            }
        }
        None
    }

    fn consume_ident(&mut self) -> Option<Ident> {
        let tok = self.stream.pop_current();
        match tok.kind {
            TokenKind::Ident(name) => Some(Ident::new(name, tok.pos)),
            TokenKind::EndOfFile => {
                self.stream.err.expected_token("identifier", tok.pos);
                None
            }
            TokenKind::Undefined => {
                self.stream.push_back(tok);
                None
            }
            kind => {
                self.stream
                    .err
                    .unexpected_token("identifier", &kind.describe(), tok.pos);
                self.stream.push_back(Token::new(kind, tok.pos));
                None
            }
        }
    }

    /// Span from `start` to the last token handed out.
    fn end_pos(&self, start: SourceRange) -> SourceRange {
        match self.stream.last_popped() {
            Some(tok) => start.merge(tok.pos),
            None => start,
        }
    }

    /// Skip to the next statement boundary: past a `;`, or up to a `}` that
    /// the enclosing block will handle.
    fn resync(&mut self) {
        loop {
            let tok = self.stream.peek_current();
            match tok.kind {
                TokenKind::SemiColon => {
                    self.stream.pop_current();
                    return;
                }
                TokenKind::RightBrace | TokenKind::EndOfFile | TokenKind::Undefined => return,
                _ => {
                    self.stream.pop_current();
                }
            }
        }
    }

    /// Statement terminator: `;`, which may be omitted right after a `}` or
    /// when an inner statement already supplied one. A truly missing `;` is
    /// reported but does not abort the statement.
    fn finish_statement(&mut self) {
        if self.eat(TokenKind::SemiColon).is_some() {
            return;
        }
        let last = self
            .stream
            .last_popped()
            .map(|t| (t.pos, matches!(t.kind, TokenKind::RightBrace | TokenKind::SemiColon)));
        match last {
            Some((_, true)) => {}
            Some((pos, false)) => self.stream.err.missing_token(";", pos),
            None => self.stream.err.missing_token(";", SourceRange::NULL),
        }
    }

    // -- file level -------------------------------------------------------

    pub fn parse_file(&mut self) -> FileDecl {
        let mut file = FileDecl::default();
        loop {
            let tok = self.stream.peek_current();
            match tok.kind {
                TokenKind::EndOfFile | TokenKind::Undefined => break,
                TokenKind::Type => match self.parse_type_decl() {
                    Some(decl) => file.types.push(decl),
                    None => self.resync(),
                },
                TokenKind::RightBrace => {
                    self.stream
                        .err
                        .unexpected_token("statement", "}", tok.pos);
                    self.stream.pop_current();
                }
                _ => match self.parse_statement(true) {
                    Some(stmt) => file.statements.push(stmt),
                    None => self.resync(),
                },
            }
        }
        file
    }

    // -- statements -------------------------------------------------------

    fn parse_statement(&mut self, top_level: bool) -> Option<Statement> {
        let start = self.stream.peek_current().pos;
        let prefix = self.parse_prefix();
        if top_level && !prefix.is_none() {
            self.stream.err.custom(
                ErrKind::Semantic,
                "control-flow prefixes are not allowed at file scope",
                Some(start),
            );
            return None;
        }
        if !prefix.is_none() {
            if let Some(semi) = self.eat(TokenKind::SemiColon) {
                // bare `return;`, `break;`, `continue;`
                let void = Expr::from_atom(Atom::new(
                    AtomKind::Constant(Constant::Void),
                    semi.pos,
                ));
                return Some(Statement {
                    prefix,
                    kind: StatementKind::Expr(void),
                    pos: self.end_pos(start),
                });
            }
        }
        let first = self.parse_expr()?;
        let kind = self.parse_statement_tail(first)?;
        if !prefix.is_none() && !matches!(kind, StatementKind::Expr(_)) {
            self.stream.err.custom(
                ErrKind::Semantic,
                "control-flow prefixes only apply to expression statements",
                Some(start),
            );
        }
        self.finish_statement();
        Some(Statement {
            prefix,
            kind,
            pos: self.end_pos(start),
        })
    }

    fn parse_prefix(&mut self) -> StatementPrefix {
        let mut prefix = StatementPrefix::NONE;
        if self.eat(TokenKind::Yield).is_some() {
            prefix.yields = true;
        }
        let tok = self.stream.peek_current();
        prefix.kind = match tok.kind {
            TokenKind::Return => PrefixKind::Return,
            TokenKind::Break => PrefixKind::Break,
            TokenKind::Continue => PrefixKind::Continue,
            TokenKind::Assign => PrefixKind::BlockVal,
            _ => return prefix,
        };
        self.stream.pop_current();
        prefix
    }

    /// Everything after the first expression of a statement: a declaration
    /// (`:` `::` `:=`), a possibly multi-target assignment, or nothing.
    fn parse_statement_tail(&mut self, first: Expr) -> Option<StatementKind> {
        let mut lhs = vec![first];
        while self.eat(TokenKind::Comma).is_some() {
            lhs.push(self.parse_expr()?);
        }
        let tok = self.stream.peek_current();
        match &tok.kind {
            TokenKind::Colon | TokenKind::DoubleColon | TokenKind::ColonAssign => {
                let ids = self.idents_of(lhs)?;
                Some(StatementKind::VarDecl(self.parse_rhs_var_decl(ids)?))
            }
            kind if kind.is_assign_op() => {
                let op = kind.as_assign_op()?;
                self.stream.pop_current();
                let mut rhs = Vec::new();
                self.parse_expr_list(&mut rhs)?;
                Some(StatementKind::Assign(AssignExpr { lhs, op, rhs }))
            }
            _ if lhs.len() == 1 => {
                let expr = lhs.swap_remove(0);
                match expr.node {
                    // `let a := 1;` and `a := 1;` are the same statement
                    ExprKind::VarDecl(decl) => Some(StatementKind::VarDecl(decl)),
                    node => Some(StatementKind::Expr(Expr::new(node, expr.pos))),
                }
            }
            kind => {
                self.stream
                    .err
                    .unexpected_token("assignment", &kind.describe(), tok.pos);
                None
            }
        }
    }

    /// Declaration targets must be plain names.
    fn idents_of(&mut self, exprs: Vec<Expr>) -> Option<Vec<Ident>> {
        let mut ids = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let pos = expr.pos;
            match expr.into_atom().node {
                AtomKind::Ident(id) => ids.push(id),
                _ => {
                    self.stream.err.custom(
                        ErrKind::Syntax,
                        "declarations bind plain names",
                        Some(pos),
                    );
                    return None;
                }
            }
        }
        Some(ids)
    }

    /// The right-hand side of a declaration, after its names:
    /// `: T`, `: T = v`, `: T :: v`, `:: v`, or `:= v`.
    fn parse_rhs_var_decl(&mut self, ids: Vec<Ident>) -> Option<VarDecl> {
        let intro = self.stream.pop_current();
        let mut types: Vec<TypeExpr> = Vec::new();
        let mut values: Vec<Expr> = Vec::new();
        let mutable;
        match intro.kind {
            TokenKind::Colon => {
                types.push(self.parse_type_expr()?);
                while self.eat(TokenKind::Comma).is_some() {
                    types.push(self.parse_type_expr()?);
                }
                match self.stream.peek_current().kind {
                    TokenKind::Assign => {
                        self.stream.pop_current();
                        mutable = true;
                        self.parse_expr_list(&mut values)?;
                    }
                    TokenKind::DoubleColon => {
                        self.stream.pop_current();
                        mutable = false;
                        self.parse_expr_list(&mut values)?;
                    }
                    // `x : Int;` declares without a value
                    _ => mutable = true,
                }
            }
            TokenKind::DoubleColon => {
                mutable = false;
                self.parse_expr_list(&mut values)?;
            }
            TokenKind::ColonAssign => {
                mutable = true;
                self.parse_expr_list(&mut values)?;
            }
            kind => {
                self.stream
                    .err
                    .unexpected_token("`:`, `::`, or `:=`", &kind.describe(), intro.pos);
                return None;
            }
        }
        if types.len() > 1 && types.len() != ids.len() {
            self.stream.err.custom(
                ErrKind::Syntax,
                format!("{} names declared with {} types", ids.len(), types.len()),
                Some(intro.pos),
            );
        }
        if values.len() > 1 && values.len() != ids.len() {
            self.stream.err.custom(
                ErrKind::Syntax,
                format!("{} names declared with {} values", ids.len(), values.len()),
                Some(intro.pos),
            );
        }
        // a single type or value distributes over every name
        let broadcast_ty = types.len() == 1;
        let broadcast_val = values.len() == 1;
        let decls = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| VarDeclEntry {
                id,
                ty: if broadcast_ty {
                    types.first().cloned()
                } else {
                    types.get(i).cloned()
                },
                value: if broadcast_val {
                    values.first().cloned()
                } else {
                    values.get(i).cloned()
                },
            })
            .collect();
        Some(VarDecl { mutable, decls })
    }

    // -- expressions ------------------------------------------------------

    pub fn parse_expr(&mut self) -> Option<Expr> {
        let tok = self.stream.peek_current();
        let start = tok.pos;
        let expr = match tok.kind {
            TokenKind::Let => {
                self.stream.pop_current();
                self.parse_let_decl(false, start)?
            }
            TokenKind::Var => {
                self.stream.pop_current();
                self.parse_let_decl(true, start)?
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Struct => self.parse_struct()?,
            TokenKind::LeftBrace => self.parse_map_or_block()?,
            TokenKind::LeftBracket => {
                let array = self.parse_array()?;
                if self.continues_tower() {
                    let logical = self.parse_tower_from_atom(array.into_atom())?;
                    Expr::new(ExprKind::Logical(logical), self.end_pos(start))
                } else {
                    array
                }
            }
            TokenKind::LeftParen => {
                let e = self.parse_paren_expr()?;
                if matches!(e.node, ExprKind::Logical(_)) {
                    // `(f)(x)`, `(a + b) * c`: keep climbing the tower
                    let logical = self.parse_tower_from_atom(e.into_atom())?;
                    Expr::new(ExprKind::Logical(logical), self.end_pos(start))
                } else {
                    e
                }
            }
            TokenKind::Range | TokenKind::RangeEq => {
                // `..stop` ranges from the beginning
                let inclusive = matches!(tok.kind, TokenKind::RangeEq);
                self.stream.pop_current();
                let stop = self.parse_operand()?;
                let step = if self.eat(TokenKind::Colon).is_some() {
                    Some(Box::new(self.parse_operand()?))
                } else {
                    None
                };
                return Some(Expr::new(
                    ExprKind::Range(RangeExpr {
                        inclusive,
                        start: None,
                        stop: Box::new(stop),
                        step,
                    }),
                    self.end_pos(start),
                ));
            }
            _ => {
                let logical = self.parse_logical_or()?;
                Expr::new(ExprKind::Logical(logical), self.end_pos(start))
            }
        };
        self.parse_range_suffix(expr)
    }

    /// An expression limited to the operator tower, for range bounds.
    fn parse_operand(&mut self) -> Option<Expr> {
        let start = self.stream.peek_current().pos;
        let logical = self.parse_logical_or()?;
        Some(Expr::new(ExprKind::Logical(logical), self.end_pos(start)))
    }

    fn parse_range_suffix(&mut self, expr: Expr) -> Option<Expr> {
        let inclusive = match self.stream.peek_current().kind {
            TokenKind::Range => false,
            TokenKind::RangeEq => true,
            _ => return Some(expr),
        };
        self.stream.pop_current();
        let stop = self.parse_operand()?;
        let step = if self.eat(TokenKind::Colon).is_some() {
            Some(Box::new(self.parse_operand()?))
        } else {
            None
        };
        let pos = self.end_pos(expr.pos);
        Some(Expr::new(
            ExprKind::Range(RangeExpr {
                inclusive,
                start: Some(Box::new(expr)),
                stop: Box::new(stop),
                step,
            }),
            pos,
        ))
    }

    fn parse_expr_list(&mut self, out: &mut Vec<Expr>) -> Option<()> {
        out.push(self.parse_expr()?);
        while self.eat(TokenKind::Comma).is_some() {
            out.push(self.parse_expr()?);
        }
        Some(())
    }

    fn parse_let_decl(&mut self, force_mutable: bool, start: SourceRange) -> Option<Expr> {
        let mut ids = vec![self.consume_ident()?];
        while self.eat(TokenKind::Comma).is_some() {
            ids.push(self.consume_ident()?);
        }
        let mut decl = self.parse_rhs_var_decl(ids)?;
        if force_mutable {
            decl.mutable = true;
        }
        Some(Expr::new(ExprKind::VarDecl(decl), self.end_pos(start)))
    }

    fn parse_if(&mut self) -> Option<Expr> {
        let start = self.stream.pop_current().pos; // `if`
        let mut branches = Vec::new();
        let else_body = loop {
            let cond = self.parse_expr()?;
            let body = self.parse_block()?;
            branches.push(IfBranch { cond, body });
            if self.eat(TokenKind::Else).is_none() {
                break None;
            }
            if self.eat(TokenKind::If).is_none() {
                break Some(self.parse_block()?);
            }
        };
        Some(Expr::new(
            ExprKind::If(IfBlock {
                branches,
                else_body,
            }),
            self.end_pos(start),
        ))
    }

    fn parse_while(&mut self) -> Option<Expr> {
        let start = self.stream.pop_current().pos; // `while`
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Some(Expr::new(
            ExprKind::While(WhileBlock {
                cond: Box::new(cond),
                body,
            }),
            self.end_pos(start),
        ))
    }

    fn parse_for(&mut self) -> Option<Expr> {
        let start = self.stream.pop_current().pos; // `for`
        let parens = self.eat(TokenKind::LeftParen).is_some();
        let mut ids = vec![self.consume_ident()?];
        while self.eat(TokenKind::Comma).is_some() {
            ids.push(self.consume_ident()?);
        }
        self.consume(TokenKind::In)?;
        let mut iterators = Vec::new();
        self.parse_expr_list(&mut iterators)?;
        if parens {
            self.consume(TokenKind::RightParen)?;
        }
        let body = self.parse_block()?;
        Some(Expr::new(
            ExprKind::For(ForBlock {
                ids,
                iterators,
                body,
            }),
            self.end_pos(start),
        ))
    }

    fn parse_struct(&mut self) -> Option<Expr> {
        let start = self.stream.pop_current().pos; // `struct`
        self.consume(TokenKind::LeftParen)?;
        let mut members = Vec::new();
        if !matches!(self.stream.peek_current().kind, TokenKind::RightParen) {
            loop {
                let id = self.consume_ident()?;
                let ty = if self.eat(TokenKind::Colon).is_some() {
                    Some(self.parse_type_expr()?)
                } else {
                    None
                };
                let value = if self.eat(TokenKind::Assign).is_some() {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                members.push(VarDeclEntry { id, ty, value });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen)?;
        let body = self.parse_block()?;
        Some(Expr::new(
            ExprKind::StructDecl(StructDecl { members, body }),
            self.end_pos(start),
        ))
    }

    /// `{...}` in expression position: an empty block, a map, or a block.
    /// `{expr : ...}` commits to a map, so typed declarations inside a block
    /// expression need `let`.
    fn parse_map_or_block(&mut self) -> Option<Expr> {
        let start = self.stream.pop_current().pos; // `{`
        let tok = self.stream.peek_current();
        match tok.kind {
            TokenKind::RightBrace => {
                self.stream.pop_current();
                return Some(Expr::new(ExprKind::Block(Vec::new()), self.end_pos(start)));
            }
            // these can only open a statement
            TokenKind::Let
            | TokenKind::Var
            | TokenKind::Yield
            | TokenKind::Return
            | TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Assign => {
                let mut body = Vec::new();
                self.parse_block_statements(&mut body)?;
                return Some(Expr::new(ExprKind::Block(body), self.end_pos(start)));
            }
            _ => {}
        }
        let first = self.parse_expr()?;
        let first_pos = first.pos;
        if self.eat(TokenKind::Colon).is_some() {
            let mut keys = vec![first];
            let mut values = vec![self.parse_expr()?];
            while self.eat(TokenKind::Comma).is_some() {
                if matches!(self.stream.peek_current().kind, TokenKind::RightBrace) {
                    break;
                }
                keys.push(self.parse_expr()?);
                self.consume(TokenKind::Colon)?;
                values.push(self.parse_expr()?);
            }
            self.consume(TokenKind::RightBrace)?;
            return Some(Expr::new(
                ExprKind::Map(MapExpr { keys, values }),
                self.end_pos(start),
            ));
        }
        // a block whose first statement begins with `first`
        let kind = self.parse_statement_tail(first)?;
        self.finish_statement();
        let stmt = Statement {
            prefix: StatementPrefix::NONE,
            kind,
            pos: self.end_pos(first_pos),
        };
        let mut body = vec![stmt];
        self.parse_block_statements(&mut body)?;
        Some(Expr::new(ExprKind::Block(body), self.end_pos(start)))
    }

    /// Statements up to and including the closing `}`.
    fn parse_block_statements(&mut self, body: &mut Vec<Statement>) -> Option<()> {
        loop {
            let tok = self.stream.peek_current();
            match tok.kind {
                TokenKind::RightBrace => {
                    self.stream.pop_current();
                    return Some(());
                }
                TokenKind::EndOfFile | TokenKind::Undefined => {
                    self.stream.err.expected_token("}", tok.pos);
                    return None;
                }
                _ => match self.parse_statement(false) {
                    Some(stmt) => body.push(stmt),
                    None => self.resync(),
                },
            }
        }
    }

    /// A braced block, or a single statement standing in for one. The single
    /// statement's value is the block's value.
    fn parse_block(&mut self) -> Option<Vec<Statement>> {
        if self.eat(TokenKind::LeftBrace).is_none() {
            let mut stmt = self.parse_statement(false)?;
            if stmt.prefix.is_none() && matches!(stmt.kind, StatementKind::Expr(_)) {
                stmt.prefix.kind = PrefixKind::BlockVal;
            }
            return Some(vec![stmt]);
        }
        let mut body = Vec::new();
        self.parse_block_statements(&mut body)?;
        Some(body)
    }

    fn parse_array(&mut self) -> Option<Expr> {
        let start = self.stream.pop_current().pos; // `[`
        let mut values = Vec::new();
        if !matches!(self.stream.peek_current().kind, TokenKind::RightBracket) {
            self.parse_expr_list(&mut values)?;
        }
        self.consume(TokenKind::RightBracket)?;
        Some(Expr::new(
            ExprKind::Collection(CollectionExpr {
                values,
                kind: CollectionKind::Array,
            }),
            self.end_pos(start),
        ))
    }

    /// After `(` the parser cannot yet know whether it is reading a
    /// parenthesised expression, a tuple, or a function's parameter list.
    /// Plain names are collected as both a parameter and an expression;
    /// a `name: Type` or `name = default` element commits to parameters,
    /// any other expression commits to values, and whatever follows the
    /// closing `)` settles it.
    fn parse_paren_expr(&mut self) -> Option<Expr> {
        let start = self.stream.pop_current().pos; // `(`
        if self.eat(TokenKind::RightParen).is_some() {
            let next = self.stream.peek_current();
            if matches!(next.kind, TokenKind::ReturnType | TokenKind::FatArrow) {
                return self.parse_func_tail(Vec::new(), start);
            }
            return Some(Expr::new(
                ExprKind::Collection(CollectionExpr {
                    values: Vec::new(),
                    kind: CollectionKind::Tuple,
                }),
                self.end_pos(start),
            ));
        }

        let mut params: Vec<VarDeclEntry> = Vec::new();
        let mut exprs: Vec<Expr> = Vec::new();
        let mut typed = false; // saw `name: T` or `name = default`
        let mut general = false; // saw an element that is not a name
        let mut trailing_comma = false;
        loop {
            let tok = self.stream.peek_current();
            if let TokenKind::Ident(name) = tok.kind {
                let id_tok = self.stream.pop_current();
                let id = Ident::new(name, id_tok.pos);
                match self.stream.peek_current().kind {
                    TokenKind::Colon => {
                        self.stream.pop_current();
                        let ty = self.parse_type_expr()?;
                        let value = if self.eat(TokenKind::Assign).is_some() {
                            Some(self.parse_expr()?)
                        } else {
                            None
                        };
                        params.push(VarDeclEntry {
                            id,
                            ty: Some(ty),
                            value,
                        });
                        typed = true;
                    }
                    TokenKind::Assign => {
                        self.stream.pop_current();
                        let value = Some(self.parse_expr()?);
                        params.push(VarDeclEntry {
                            id,
                            ty: None,
                            value,
                        });
                        typed = true;
                    }
                    TokenKind::Comma | TokenKind::RightParen => {
                        exprs.push(Expr::from_ident(id.clone()));
                        params.push(VarDeclEntry {
                            id,
                            ty: None,
                            value: None,
                        });
                    }
                    _ => {
                        self.stream.push_back(id_tok);
                        exprs.push(self.parse_expr()?);
                        general = true;
                    }
                }
            } else {
                exprs.push(self.parse_expr()?);
                general = true;
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
            if matches!(self.stream.peek_current().kind, TokenKind::RightParen) {
                trailing_comma = true;
                break;
            }
        }
        self.consume(TokenKind::RightParen)?;

        let next = self.stream.peek_current();
        if matches!(next.kind, TokenKind::ReturnType | TokenKind::FatArrow) {
            if general {
                self.stream.err.custom(
                    ErrKind::Syntax,
                    "function parameters must be plain or typed names",
                    Some(next.pos),
                );
                return None;
            }
            return self.parse_func_tail(params, start);
        }
        if typed {
            self.stream.err.expected_token("=>", next.pos);
            return None;
        }
        let pos = self.end_pos(start);
        if exprs.len() == 1 && !trailing_comma {
            let inner = exprs.swap_remove(0);
            return Some(Expr::new(
                ExprKind::Logical(LogicalOrExpr::from_atom(Atom::new(
                    AtomKind::Paren(Box::new(inner)),
                    pos,
                ))),
                pos,
            ));
        }
        Some(Expr::new(
            ExprKind::Collection(CollectionExpr {
                values: exprs,
                kind: CollectionKind::Tuple,
            }),
            pos,
        ))
    }

    fn parse_func_tail(&mut self, params: Vec<VarDeclEntry>, start: SourceRange) -> Option<Expr> {
        let ret_type = if self.eat(TokenKind::ReturnType).is_some() {
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        self.consume(TokenKind::FatArrow)?;
        let body = self.parse_block()?;
        Some(Expr::new(
            ExprKind::FuncDecl(FuncDecl {
                params,
                ret_type,
                body,
            }),
            self.end_pos(start),
        ))
    }

    fn parse_macro_expr(&mut self) -> Option<MacroExpr> {
        let start = self.stream.pop_current().pos; // `@`
        let name = self.parse_identifier_access()?;
        self.consume(TokenKind::LeftParen)?;
        let mut args = Vec::new();
        if !matches!(self.stream.peek_current().kind, TokenKind::RightParen) {
            self.parse_expr_list(&mut args)?;
        }
        self.consume(TokenKind::RightParen)?;
        Some(MacroExpr {
            name,
            args,
            pos: self.end_pos(start),
        })
    }

    fn parse_identifier_access(&mut self) -> Option<IdentifierAccess> {
        let mut parts = vec![self.consume_ident()?];
        while self.eat(TokenKind::Dot).is_some() {
            parts.push(self.consume_ident()?);
        }
        Some(IdentifierAccess::new(parts))
    }

    // -- operator tower ---------------------------------------------------

    /// True when the next token extends an operand: a postfix form or a
    /// binary operator.
    fn continues_tower(&mut self) -> bool {
        let kind = self.stream.peek_current().kind;
        matches!(
            kind,
            TokenKind::LeftBracket
                | TokenKind::LeftParen
                | TokenKind::Dot
                | TokenKind::FoldLeft
                | TokenKind::FoldRight
                | TokenKind::Pow
                | TokenKind::And
                | TokenKind::Or
        ) || kind.as_comparison_op().is_some()
            || kind.as_additive_op().is_some()
            || kind.as_multiplicative_op().is_some()
    }

    /// Resume the tower after an operand parsed out-of-band, e.g. the
    /// parenthesised expression in `(a + b) * c`.
    fn parse_tower_from_atom(&mut self, atom: Atom) -> Option<LogicalOrExpr> {
        let atom = self.parse_postfix(atom)?;
        let power = self.parse_power_rest(UnaryExpr::from_atom(atom))?;
        let mult = self.parse_multiplicative_rest(power)?;
        let additive = self.parse_additive_rest(mult)?;
        let cmp = self.parse_comparison_rest(additive)?;
        let and = self.parse_logical_and_rest(cmp)?;
        self.parse_logical_or_rest(and)
    }

    fn parse_logical_or(&mut self) -> Option<LogicalOrExpr> {
        let first = self.parse_logical_and()?;
        self.parse_logical_or_rest(first)
    }

    fn parse_logical_or_rest(&mut self, first: LogicalAndExpr) -> Option<LogicalOrExpr> {
        let mut terms = vec![first];
        while self.eat(TokenKind::Or).is_some() {
            terms.push(self.parse_logical_and()?);
        }
        Some(LogicalOrExpr { terms })
    }

    fn parse_logical_and(&mut self) -> Option<LogicalAndExpr> {
        let first = self.parse_comparison()?;
        self.parse_logical_and_rest(first)
    }

    fn parse_logical_and_rest(&mut self, first: ComparisonExpr) -> Option<LogicalAndExpr> {
        let mut terms = vec![first];
        while self.eat(TokenKind::And).is_some() {
            terms.push(self.parse_comparison()?);
        }
        Some(LogicalAndExpr { terms })
    }

    fn parse_comparison(&mut self) -> Option<ComparisonExpr> {
        let first = self.parse_additive()?;
        self.parse_comparison_rest(first)
    }

    fn parse_comparison_rest(&mut self, first: AdditiveExpr) -> Option<ComparisonExpr> {
        let mut rest = Vec::new();
        loop {
            let tok = self.stream.peek_current();
            let Some(op) = tok.kind.as_comparison_op() else {
                break;
            };
            self.stream.pop_current();
            rest.push((op, self.parse_additive()?));
        }
        Some(ComparisonExpr { first, rest })
    }

    fn parse_additive(&mut self) -> Option<AdditiveExpr> {
        let first = self.parse_multiplicative()?;
        self.parse_additive_rest(first)
    }

    fn parse_additive_rest(&mut self, first: MultiplicativeExpr) -> Option<AdditiveExpr> {
        let mut rest = Vec::new();
        loop {
            let tok = self.stream.peek_current();
            let Some(op) = tok.kind.as_additive_op() else {
                break;
            };
            self.stream.pop_current();
            rest.push((op, self.parse_multiplicative()?));
        }
        let mut additive = AdditiveExpr { first, rest };
        // `xs |> f |> g` applies f first, then g
        while self.eat(TokenKind::FoldRight).is_some() {
            let func = self.parse_atom()?;
            let pos = func.pos;
            additive = AdditiveExpr::from_atom(Atom::new(
                AtomKind::Fold {
                    func: Box::new(func),
                    folded: Box::new(additive),
                    rightward: true,
                },
                pos,
            ));
        }
        Some(additive)
    }

    fn parse_multiplicative(&mut self) -> Option<MultiplicativeExpr> {
        let first = self.parse_power()?;
        self.parse_multiplicative_rest(first)
    }

    fn parse_multiplicative_rest(&mut self, first: PowerExpr) -> Option<MultiplicativeExpr> {
        let mut rest = Vec::new();
        loop {
            let tok = self.stream.peek_current();
            let Some(op) = tok.kind.as_multiplicative_op() else {
                break;
            };
            self.stream.pop_current();
            rest.push((op, self.parse_power()?));
        }
        Some(MultiplicativeExpr { first, rest })
    }

    fn parse_power(&mut self) -> Option<PowerExpr> {
        let first = self.parse_unary()?;
        self.parse_power_rest(first)
    }

    fn parse_power_rest(&mut self, first: UnaryExpr) -> Option<PowerExpr> {
        let mut terms = vec![first];
        while self.eat(TokenKind::Pow).is_some() {
            terms.push(self.parse_unary()?);
        }
        Some(PowerExpr { terms })
    }

    fn parse_unary(&mut self) -> Option<UnaryExpr> {
        let mut ops = Vec::new();
        loop {
            let tok = self.stream.peek_current();
            match tok.kind.as_prefix_op() {
                Some(op) => {
                    self.stream.pop_current();
                    ops.push(op);
                }
                None => break,
            }
        }
        let rhs = self.parse_atom()?;
        Some(UnaryExpr { ops, rhs })
    }

    fn parse_atom(&mut self) -> Option<Atom> {
        let tok = self.stream.peek_current();
        let start = tok.pos;
        let atom = match tok.kind {
            TokenKind::Ident(_)
            | TokenKind::Int(_)
            | TokenKind::Flt(_)
            | TokenKind::Str(_)
            | TokenKind::Char(_)
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Void => {
                let tok = self.stream.pop_current();
                let kind = match tok.kind {
                    TokenKind::Ident(name) => AtomKind::Ident(Ident::new(name, tok.pos)),
                    TokenKind::Int(v) => AtomKind::Constant(Constant::Int(v)),
                    TokenKind::Flt(v) => AtomKind::Constant(Constant::Flt(v)),
                    TokenKind::Str(s) => AtomKind::Constant(Constant::Str(s)),
                    TokenKind::Char(c) => AtomKind::Constant(Constant::Char(c)),
                    TokenKind::True => AtomKind::Constant(Constant::Bool(true)),
                    TokenKind::False => AtomKind::Constant(Constant::Bool(false)),
                    _ => AtomKind::Constant(Constant::Void),
                };
                Atom::new(kind, tok.pos)
            }
            TokenKind::LeftParen => self.parse_paren_expr()?.into_atom(),
            TokenKind::LeftBracket => self.parse_array()?.into_atom(),
            TokenKind::Macro => {
                let m = self.parse_macro_expr()?;
                let pos = m.pos;
                Atom::new(AtomKind::Macro(m), pos)
            }
            TokenKind::EndOfFile => {
                self.stream.err.expected_token("expression", start);
                return None;
            }
            TokenKind::Undefined => return None,
            // left in place for resynchronization
            kind => {
                self.stream
                    .err
                    .unexpected_token("expression", &kind.describe(), start);
                return None;
            }
        };
        self.parse_postfix(atom)
    }

    fn parse_postfix(&mut self, mut atom: Atom) -> Option<Atom> {
        let start = atom.pos;
        loop {
            let tok = self.stream.peek_current();
            match tok.kind {
                TokenKind::LeftBracket => {
                    atom = self.parse_index_or_slice(atom)?;
                }
                TokenKind::LeftParen => {
                    self.stream.pop_current();
                    let mut args = Vec::new();
                    if !matches!(self.stream.peek_current().kind, TokenKind::RightParen) {
                        self.parse_expr_list(&mut args)?;
                    }
                    self.consume(TokenKind::RightParen)?;
                    atom = Atom::new(
                        AtomKind::Call {
                            base: Box::new(atom),
                            args,
                        },
                        self.end_pos(start),
                    );
                }
                TokenKind::Dot => {
                    self.stream.pop_current();
                    let member = self.consume_ident()?;
                    atom = Atom::new(
                        AtomKind::Member {
                            base: Box::new(atom),
                            member,
                        },
                        self.end_pos(start),
                    );
                }
                TokenKind::FoldLeft => {
                    self.stream.pop_current();
                    let folded = self.parse_additive()?;
                    atom = Atom::new(
                        AtomKind::Fold {
                            func: Box::new(atom),
                            folded: Box::new(folded),
                            rightward: false,
                        },
                        self.end_pos(start),
                    );
                    break;
                }
                _ => break,
            }
        }
        Some(atom)
    }

    fn parse_index_or_slice(&mut self, base: Atom) -> Option<Atom> {
        let start = base.pos;
        self.stream.pop_current(); // `[`
        let first = match self.stream.peek_current().kind {
            TokenKind::Colon => None,
            TokenKind::RightBracket => {
                let tok = self.stream.pop_current();
                self.stream
                    .err
                    .unexpected_token("index", "]", tok.pos);
                return None;
            }
            _ => Some(self.parse_expr()?),
        };
        if first.is_some() && self.eat(TokenKind::RightBracket).is_some() {
            return Some(Atom::new(
                AtomKind::Index {
                    base: Box::new(base),
                    index: Box::new(first?),
                },
                self.end_pos(start),
            ));
        }
        self.consume(TokenKind::Colon)?;
        let stop = match self.stream.peek_current().kind {
            TokenKind::Colon | TokenKind::RightBracket => None,
            _ => Some(Box::new(self.parse_expr()?)),
        };
        let step = if self.eat(TokenKind::Colon).is_some() {
            match self.stream.peek_current().kind {
                TokenKind::RightBracket => None,
                _ => Some(Box::new(self.parse_expr()?)),
            }
        } else {
            None
        };
        self.consume(TokenKind::RightBracket)?;
        Some(Atom::new(
            AtomKind::Slice {
                base: Box::new(base),
                start: first.map(Box::new),
                stop,
                step,
            },
            self.end_pos(start),
        ))
    }

    // -- types ------------------------------------------------------------

    fn parse_type_decl(&mut self) -> Option<TypeDecl> {
        let start = self.stream.pop_current().pos; // `type`
        let id = self.consume_ident()?;
        let ty = if self.eat(TokenKind::Is).is_some() {
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let mut body = Vec::new();
        let mut braced = false;
        if self.eat(TokenKind::LeftBrace).is_some() {
            braced = true;
            loop {
                let tok = self.stream.peek_current();
                match tok.kind {
                    TokenKind::RightBrace => {
                        self.stream.pop_current();
                        break;
                    }
                    TokenKind::EndOfFile | TokenKind::Undefined => {
                        self.stream.err.expected_token("}", tok.pos);
                        return None;
                    }
                    _ => match self.parse_type_statement() {
                        Some(stmt) => body.push(stmt),
                        None => self.resync(),
                    },
                }
            }
        }
        if braced {
            // `;` after the body is allowed but not required
            self.eat(TokenKind::SemiColon);
        } else if self.eat(TokenKind::SemiColon).is_none() {
            let pos = self
                .stream
                .last_popped()
                .map(|t| t.pos)
                .unwrap_or(SourceRange::NULL);
            self.stream.err.missing_token(";", pos);
        }
        Some(TypeDecl {
            id,
            ty,
            body,
            pos: self.end_pos(start),
        })
    }

    fn parse_type_statement(&mut self) -> Option<TypeStatement> {
        let tok = self.stream.peek_current();
        match tok.kind {
            TokenKind::Type => Some(TypeStatement::TypeDecl(self.parse_type_decl()?)),
            TokenKind::Macro => {
                let m = self.parse_macro_expr()?;
                self.finish_statement();
                Some(TypeStatement::Macro(m))
            }
            TokenKind::Ident(_) => {
                let mut ids = vec![self.consume_ident()?];
                while self.eat(TokenKind::Comma).is_some() {
                    ids.push(self.consume_ident()?);
                }
                let decl = self.parse_rhs_var_decl(ids)?;
                self.finish_statement();
                Some(TypeStatement::Member(decl))
            }
            TokenKind::Undefined => None,
            kind => {
                self.stream
                    .err
                    .unexpected_token("type member", &kind.describe(), tok.pos);
                None
            }
        }
    }

    fn parse_type_expr(&mut self) -> Option<TypeExpr> {
        let start = self.stream.peek_current().pos;
        let first = self.parse_type_primary()?;
        if !matches!(self.stream.peek_current().kind, TokenKind::Variant) {
            return Some(first);
        }
        let mut alts = vec![first];
        while self.eat(TokenKind::Variant).is_some() {
            alts.push(self.parse_type_primary()?);
        }
        Some(TypeExpr::new(
            TypeExprKind::Variant(alts),
            self.end_pos(start),
        ))
    }

    fn parse_type_primary(&mut self) -> Option<TypeExpr> {
        let tok = self.stream.peek_current();
        let start = tok.pos;
        match tok.kind {
            TokenKind::LeftParen => {
                self.stream.pop_current();
                let mut entries = Vec::new();
                if !matches!(self.stream.peek_current().kind, TokenKind::RightParen) {
                    loop {
                        entries.push(self.parse_tuple_type_entry()?);
                        if self.eat(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightParen)?;
                if self.eat(TokenKind::ReturnType).is_some() {
                    let ret = self.parse_type_expr()?;
                    return Some(TypeExpr::new(
                        TypeExprKind::Func {
                            params: entries,
                            ret: Box::new(ret),
                        },
                        self.end_pos(start),
                    ));
                }
                Some(TypeExpr::new(
                    TypeExprKind::Tuple(entries),
                    self.end_pos(start),
                ))
            }
            TokenKind::Ident(_) => {
                let name = self.parse_identifier_access()?;
                if self.eat(TokenKind::LeftBracket).is_some() {
                    let mut args = vec![self.parse_type_expr()?];
                    while self.eat(TokenKind::Comma).is_some() {
                        args.push(self.parse_type_expr()?);
                    }
                    self.consume(TokenKind::RightBracket)?;
                    return Some(TypeExpr::new(
                        TypeExprKind::Generic { base: name, args },
                        self.end_pos(start),
                    ));
                }
                let pos = name.pos();
                Some(TypeExpr::new(TypeExprKind::Named(name), pos))
            }
            TokenKind::Void => {
                let tok = self.stream.pop_current();
                Some(TypeExpr::new(
                    TypeExprKind::Named(IdentifierAccess::single(Ident::new("void", tok.pos))),
                    tok.pos,
                ))
            }
            TokenKind::EndOfFile => {
                self.stream.err.expected_token("type", start);
                None
            }
            TokenKind::Undefined => None,
            kind => {
                self.stream
                    .err
                    .unexpected_token("type", &kind.describe(), start);
                None
            }
        }
    }

    fn parse_tuple_type_entry(&mut self) -> Option<TupleTypeEntry> {
        let tok = self.stream.peek_current();
        if let TokenKind::Ident(name) = tok.kind {
            let id_tok = self.stream.pop_current();
            if self.eat(TokenKind::Colon).is_some() {
                let id = Ident::new(name, id_tok.pos);
                let ty = self.parse_type_expr()?;
                return Some(TupleTypeEntry { id: Some(id), ty });
            }
            self.stream.push_back(id_tok);
        }
        let ty = self.parse_type_expr()?;
        Some(TupleTypeEntry { id: None, ty })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenStream;
    use crate::reader::StrReader;
    use porc_diag::ErrStream;

    fn parse(source: &str) -> (FileDecl, u32) {
        let mut err = ErrStream::new();
        let file = {
            let stream = TokenStream::new(StrReader::new(source), &mut err);
            Parser::new(stream).parse_file()
        };
        let errors = err.lexical_errors() + err.syntax_errors() + err.semantic_errors();
        (file, errors)
    }

    fn parse_ok(source: &str) -> FileDecl {
        let (file, errors) = parse(source);
        assert_eq!(errors, 0, "unexpected errors in {source:?}");
        file
    }

    fn only_expr(file: &FileDecl) -> &Expr {
        assert_eq!(file.statements.len(), 1);
        match &file.statements[0].kind {
            StatementKind::Expr(e) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    fn only_atom(file: &FileDecl) -> &Atom {
        let expr = only_expr(file);
        match &expr.node {
            ExprKind::Logical(l) => l
                .as_single_additive()
                .and_then(AdditiveExpr::as_single_atom)
                .unwrap(),
            other => panic!("expected tower expression, got {other:?}"),
        }
    }

    #[test]
    fn var_decl_forms() {
        let file = parse_ok("x :: 3;");
        match &file.statements[0].kind {
            StatementKind::VarDecl(decl) => {
                assert!(!decl.mutable);
                assert_eq!(decl.decls.len(), 1);
                assert_eq!(decl.decls[0].id.name, "x");
            }
            other => panic!("{other:?}"),
        }

        let file = parse_ok("a, b := 1, 2;");
        match &file.statements[0].kind {
            StatementKind::VarDecl(decl) => {
                assert!(decl.mutable);
                assert_eq!(decl.decls.len(), 2);
                assert!(decl.decls[1].value.is_some());
            }
            other => panic!("{other:?}"),
        }

        let file = parse_ok("n : Int = 5;");
        match &file.statements[0].kind {
            StatementKind::VarDecl(decl) => {
                assert!(decl.mutable);
                assert!(decl.decls[0].ty.is_some());
            }
            other => panic!("{other:?}"),
        }

        // typed, immutable, no value
        let file = parse_ok("n : Int;");
        match &file.statements[0].kind {
            StatementKind::VarDecl(decl) => assert!(decl.decls[0].value.is_none()),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn let_is_statement_var_decl() {
        let file = parse_ok("let a :: 1;");
        assert!(matches!(
            file.statements[0].kind,
            StatementKind::VarDecl(VarDecl { mutable: false, .. })
        ));
        let file = parse_ok("var a :: 1;");
        assert!(matches!(
            file.statements[0].kind,
            StatementKind::VarDecl(VarDecl { mutable: true, .. })
        ));
    }

    #[test]
    fn multi_target_assignment() {
        let file = parse_ok("a, b += 1, 2;");
        match &file.statements[0].kind {
            StatementKind::Assign(assign) => {
                assert_eq!(assign.lhs.len(), 2);
                assert_eq!(assign.rhs.len(), 2);
                assert_eq!(assign.op, porc_ast::AssignOp::Add);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn assignment_targets_may_be_postfix() {
        let file = parse_ok("xs[0], p.x = 1, 2;");
        match &file.statements[0].kind {
            StatementKind::Assign(assign) => assert_eq!(assign.lhs.len(), 2),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn paren_tuple_func_disambiguation() {
        let file = parse_ok("(a);");
        assert!(matches!(only_atom(&file).node, AtomKind::Paren(_)));

        let file = parse_ok("(a, b);");
        match &only_expr(&file).node {
            ExprKind::Collection(c) => {
                assert_eq!(c.kind, CollectionKind::Tuple);
                assert_eq!(c.values.len(), 2);
            }
            other => panic!("{other:?}"),
        }

        // trailing comma forces a tuple
        let file = parse_ok("(a,);");
        assert!(matches!(
            only_expr(&file).node,
            ExprKind::Collection(CollectionExpr {
                kind: CollectionKind::Tuple,
                ..
            })
        ));

        let file = parse_ok("f := (x: Int, y = 2) -> Int => { = x + y; };");
        match &file.statements[0].kind {
            StatementKind::VarDecl(decl) => match &decl.decls[0].value {
                Some(Expr {
                    node: ExprKind::FuncDecl(func),
                    ..
                }) => {
                    assert_eq!(func.params.len(), 2);
                    assert!(func.params[0].ty.is_some());
                    assert!(func.params[1].value.is_some());
                    assert!(func.ret_type.is_some());
                }
                other => panic!("{other:?}"),
            },
            other => panic!("{other:?}"),
        }

        let file = parse_ok("g := () => { = 1; };");
        match &file.statements[0].kind {
            StatementKind::VarDecl(decl) => {
                assert!(decl.decls[0].value.as_ref().is_some_and(Expr::is_func_decl));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn parenthesised_callee() {
        let file = parse_ok("(f)(1);");
        match &only_atom(&file).node {
            AtomKind::Call { base, args } => {
                assert!(matches!(base.node, AtomKind::Paren(_)));
                assert_eq!(args.len(), 1);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn member_chain() {
        let file = parse_ok("a.b.c;");
        match &only_atom(&file).node {
            AtomKind::Member { base, member } => {
                assert_eq!(member.name, "c");
                assert!(matches!(base.node, AtomKind::Member { .. }));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn index_and_slice() {
        let file = parse_ok("xs[1];");
        assert!(matches!(only_atom(&file).node, AtomKind::Index { .. }));

        let file = parse_ok("xs[1:2:3];");
        match &only_atom(&file).node {
            AtomKind::Slice {
                start, stop, step, ..
            } => {
                assert!(start.is_some() && stop.is_some() && step.is_some());
            }
            other => panic!("{other:?}"),
        }

        let file = parse_ok("xs[:];");
        match &only_atom(&file).node {
            AtomKind::Slice {
                start, stop, step, ..
            } => {
                assert!(start.is_none() && stop.is_none() && step.is_none());
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn fold_directions_and_chaining() {
        let file = parse_ok("f <| xs;");
        match &only_atom(&file).node {
            AtomKind::Fold { rightward, .. } => assert!(!rightward),
            other => panic!("{other:?}"),
        }

        // `xs |> f |> g` is g(f(xs))
        let file = parse_ok("xs |> f |> g;");
        match &only_atom(&file).node {
            AtomKind::Fold {
                func,
                folded,
                rightward,
            } => {
                assert!(*rightward);
                assert!(matches!(&func.node, AtomKind::Ident(id) if id.name == "g"));
                assert!(matches!(
                    folded.as_single_atom().map(|a| &a.node),
                    Some(AtomKind::Fold { .. })
                ));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn power_is_right_assoc_flat() {
        let file = parse_ok("2 ** 3 ** 4;");
        match &only_expr(&file).node {
            ExprKind::Logical(l) => {
                let additive = l.as_single_additive().unwrap();
                assert_eq!(additive.first.first.terms.len(), 3);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn ranges() {
        let file = parse_ok("0..10;");
        match &only_expr(&file).node {
            ExprKind::Range(r) => {
                assert!(!r.inclusive);
                assert!(r.start.is_some());
                assert!(r.step.is_none());
            }
            other => panic!("{other:?}"),
        }

        let file = parse_ok("0..=10:2;");
        match &only_expr(&file).node {
            ExprKind::Range(r) => {
                assert!(r.inclusive);
                assert!(r.step.is_some());
            }
            other => panic!("{other:?}"),
        }

        let file = parse_ok("..5;");
        match &only_expr(&file).node {
            ExprKind::Range(r) => assert!(r.start.is_none()),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn if_else_chain() {
        let file = parse_ok("if a { = 1; } else if b { = 2; } else { = 3; };");
        match &only_expr(&file).node {
            ExprKind::If(block) => {
                assert_eq!(block.branches.len(), 2);
                assert!(block.else_body.is_some());
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn for_with_and_without_parens() {
        let file = parse_ok("for (i, x in 0..10, xs) { i; };");
        match &only_expr(&file).node {
            ExprKind::For(block) => {
                assert_eq!(block.ids.len(), 2);
                assert_eq!(block.iterators.len(), 2);
            }
            other => panic!("{other:?}"),
        }
        parse_ok("for i in 0..10 { i; };");
    }

    #[test]
    fn struct_decl() {
        let file = parse_ok("p := struct (x: Int, y: Int = 0) { dist := 0; };");
        match &file.statements[0].kind {
            StatementKind::VarDecl(decl) => match &decl.decls[0].value {
                Some(Expr {
                    node: ExprKind::StructDecl(s),
                    ..
                }) => {
                    assert_eq!(s.members.len(), 2);
                    assert_eq!(s.body.len(), 1);
                }
                other => panic!("{other:?}"),
            },
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn macro_expr() {
        let file = parse_ok("@io.print(x, 1);");
        match &only_atom(&file).node {
            AtomKind::Macro(m) => {
                assert_eq!(m.name.parts.len(), 2);
                assert_eq!(m.args.len(), 2);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn map_vs_block() {
        let file = parse_ok("{1: 2, 3: 4};");
        match &only_expr(&file).node {
            ExprKind::Map(map) => {
                assert_eq!(map.keys.len(), 2);
                assert_eq!(map.values.len(), 2);
            }
            other => panic!("{other:?}"),
        }

        let file = parse_ok("{ x := 1; = x; };");
        match &only_expr(&file).node {
            ExprKind::Block(body) => {
                assert_eq!(body.len(), 2);
                assert_eq!(body[1].prefix.kind, PrefixKind::BlockVal);
            }
            other => panic!("{other:?}"),
        }

        let file = parse_ok("{};");
        assert!(matches!(only_expr(&file).node, ExprKind::Block(ref b) if b.is_empty()));
    }

    #[test]
    fn type_decls() {
        let file = parse_ok("type Meters is Flt;");
        assert_eq!(file.types.len(), 1);
        assert!(file.types[0].ty.is_some());
        assert!(!file.types[0].has_body());

        let file = parse_ok("type Shape;");
        assert!(file.types[0].ty.is_none());

        let file = parse_ok("type V { x : Int; @derive(eq); type Inner is Int; }");
        assert_eq!(file.types[0].body.len(), 3);
        assert!(matches!(file.types[0].body[0], TypeStatement::Member(_)));
        assert!(matches!(file.types[0].body[1], TypeStatement::Macro(_)));
        assert!(matches!(file.types[0].body[2], TypeStatement::TypeDecl(_)));
    }

    #[test]
    fn type_exprs() {
        let file = parse_ok("f : (a: Int, Str) -> Maybe[Int];");
        match &file.statements[0].kind {
            StatementKind::VarDecl(decl) => match &decl.decls[0].ty.as_ref().unwrap().node {
                TypeExprKind::Func { params, ret } => {
                    assert_eq!(params.len(), 2);
                    assert!(params[0].id.is_some());
                    assert!(params[1].id.is_none());
                    assert!(matches!(ret.node, TypeExprKind::Generic { .. }));
                }
                other => panic!("{other:?}"),
            },
            other => panic!("{other:?}"),
        }

        let file = parse_ok("v : Int | Str | void;");
        match &file.statements[0].kind {
            StatementKind::VarDecl(decl) => match &decl.decls[0].ty.as_ref().unwrap().node {
                TypeExprKind::Variant(alts) => assert_eq!(alts.len(), 3),
                other => panic!("{other:?}"),
            },
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn statement_prefixes() {
        let file = parse_ok("f := () => { yield return x; break; };");
        match &file.statements[0].kind {
            StatementKind::VarDecl(decl) => match &decl.decls[0].value {
                Some(Expr {
                    node: ExprKind::FuncDecl(func),
                    ..
                }) => {
                    assert!(func.body[0].prefix.yields);
                    assert_eq!(func.body[0].prefix.kind, PrefixKind::Return);
                    assert_eq!(func.body[1].prefix.kind, PrefixKind::Break);
                }
                other => panic!("{other:?}"),
            },
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn prefix_rejected_at_file_scope() {
        let (file, errors) = parse("return 1;");
        assert!(file.statements.is_empty());
        assert!(errors >= 1);
    }

    #[test]
    fn missing_semicolon_is_recoverable() {
        let (file, errors) = parse("x := 1 y := 2;");
        assert_eq!(file.statements.len(), 2);
        assert_eq!(errors, 1);
    }

    #[test]
    fn recovery_skips_to_next_statement() {
        let (file, errors) = parse("x := ; y := 2;");
        assert_eq!(file.statements.len(), 1);
        assert!(errors >= 1);
        assert!(matches!(
            file.statements[0].kind,
            StatementKind::VarDecl(_)
        ));
    }

    #[test]
    fn stray_close_brace_does_not_stall() {
        let (file, errors) = parse("} x := 1;");
        assert_eq!(file.statements.len(), 1);
        assert!(errors >= 1);
    }
}
