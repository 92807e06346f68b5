//! Pre-order traversal helpers.
//!
//! A single closure-based walker rather than a visitor trait: analysis
//! passes all want the same traversal order and carry their own state. The
//! visitor is called for each expression before its children, left to right.

use crate::*;

pub fn walk_file<V: FnMut(&Expr)>(file: &FileDecl, visitor: &mut V) {
    for stmt in &file.statements {
        walk_statement(stmt, visitor);
    }
    for ty in &file.types {
        walk_type_decl(ty, visitor);
    }
}

pub fn walk_statement<V: FnMut(&Expr)>(stmt: &Statement, visitor: &mut V) {
    match &stmt.kind {
        StatementKind::VarDecl(decl) => walk_var_decl(decl, visitor),
        StatementKind::Assign(assign) => {
            for expr in assign.lhs.iter().chain(&assign.rhs) {
                walk_expr(expr, visitor);
            }
        }
        StatementKind::Expr(expr) => walk_expr(expr, visitor),
    }
}

pub fn walk_type_decl<V: FnMut(&Expr)>(decl: &TypeDecl, visitor: &mut V) {
    for stmt in &decl.body {
        match stmt {
            TypeStatement::TypeDecl(inner) => walk_type_decl(inner, visitor),
            TypeStatement::Macro(m) => {
                for arg in &m.args {
                    walk_expr(arg, visitor);
                }
            }
            TypeStatement::Member(var) => walk_var_decl(var, visitor),
        }
    }
}

fn walk_var_decl<V: FnMut(&Expr)>(decl: &VarDecl, visitor: &mut V) {
    for entry in &decl.decls {
        if let Some(value) = &entry.value {
            walk_expr(value, visitor);
        }
    }
}

fn walk_body<V: FnMut(&Expr)>(body: &[Statement], visitor: &mut V) {
    for stmt in body {
        walk_statement(stmt, visitor);
    }
}

pub fn walk_expr<V: FnMut(&Expr)>(expr: &Expr, visitor: &mut V) {
    visitor(expr);

    match &expr.node {
        ExprKind::Logical(logical) => walk_logical(logical, visitor),
        ExprKind::VarDecl(decl) => walk_var_decl(decl, visitor),
        ExprKind::Assign(assign) => {
            for e in assign.lhs.iter().chain(&assign.rhs) {
                walk_expr(e, visitor);
            }
        }
        ExprKind::FuncDecl(func) => {
            for param in &func.params {
                if let Some(default) = &param.value {
                    walk_expr(default, visitor);
                }
            }
            walk_body(&func.body, visitor);
        }
        ExprKind::StructDecl(s) => {
            for member in &s.members {
                if let Some(default) = &member.value {
                    walk_expr(default, visitor);
                }
            }
            walk_body(&s.body, visitor);
        }
        ExprKind::Range(range) => {
            if let Some(start) = &range.start {
                walk_expr(start, visitor);
            }
            walk_expr(&range.stop, visitor);
            if let Some(step) = &range.step {
                walk_expr(step, visitor);
            }
        }
        ExprKind::Collection(coll) => {
            for value in &coll.values {
                walk_expr(value, visitor);
            }
        }
        ExprKind::Map(map) => {
            for e in map.keys.iter().chain(&map.values) {
                walk_expr(e, visitor);
            }
        }
        ExprKind::If(block) => {
            for branch in &block.branches {
                walk_expr(&branch.cond, visitor);
                walk_body(&branch.body, visitor);
            }
            if let Some(else_body) = &block.else_body {
                walk_body(else_body, visitor);
            }
        }
        ExprKind::While(block) => {
            walk_expr(&block.cond, visitor);
            walk_body(&block.body, visitor);
        }
        ExprKind::For(block) => {
            for iter in &block.iterators {
                walk_expr(iter, visitor);
            }
            walk_body(&block.body, visitor);
        }
        ExprKind::Block(body) => walk_body(body, visitor),
    }
}

fn walk_logical<V: FnMut(&Expr)>(logical: &LogicalOrExpr, visitor: &mut V) {
    for and in &logical.terms {
        for cmp in &and.terms {
            walk_additive(&cmp.first, visitor);
            for (_, operand) in &cmp.rest {
                walk_additive(operand, visitor);
            }
        }
    }
}

fn walk_additive<V: FnMut(&Expr)>(additive: &AdditiveExpr, visitor: &mut V) {
    let mut mults = vec![&additive.first];
    mults.extend(additive.rest.iter().map(|(_, m)| m));
    for mult in mults {
        let mut powers = vec![&mult.first];
        powers.extend(mult.rest.iter().map(|(_, p)| p));
        for power in powers {
            for unary in &power.terms {
                walk_atom(&unary.rhs, visitor);
            }
        }
    }
}

fn walk_atom<V: FnMut(&Expr)>(atom: &Atom, visitor: &mut V) {
    match &atom.node {
        AtomKind::Ident(_) | AtomKind::Constant(_) => {}
        AtomKind::Paren(expr) => walk_expr(expr, visitor),
        AtomKind::Macro(m) => {
            for arg in &m.args {
                walk_expr(arg, visitor);
            }
        }
        AtomKind::Index { base, index } => {
            walk_atom(base, visitor);
            walk_expr(index, visitor);
        }
        AtomKind::Slice {
            base,
            start,
            stop,
            step,
        } => {
            walk_atom(base, visitor);
            for part in [start, stop, step].into_iter().flatten() {
                walk_expr(part, visitor);
            }
        }
        AtomKind::Call { base, args } => {
            walk_atom(base, visitor);
            for arg in args {
                walk_expr(arg, visitor);
            }
        }
        AtomKind::Member { base, .. } => walk_atom(base, visitor),
        AtomKind::Fold { func, folded, .. } => {
            walk_atom(func, visitor);
            walk_additive(folded, visitor);
        }
    }
}
