//! Source reconstruction.
//!
//! `Display` for every node renders source-equivalent text: parsing the
//! output again yields the same tree (modulo positions). The printer
//! canonicalises whitespace and always emits statement terminators, which
//! the parser accepts even after `}`-terminated statements.

use std::fmt;

use crate::*;

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_block(f: &mut fmt::Formatter<'_>, body: &[Statement]) -> fmt::Result {
    if body.is_empty() {
        return write!(f, "{{}}");
    }
    write!(f, "{{ ")?;
    for stmt in body {
        write!(f, "{stmt} ")?;
    }
    write!(f, "}}")
}

fn escape_into(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    match c {
        '\\' => write!(f, "\\\\"),
        '"' => write!(f, "\\\""),
        '\'' => write!(f, "\\'"),
        '\n' => write!(f, "\\n"),
        '\r' => write!(f, "\\r"),
        '\t' => write!(f, "\\t"),
        c if (c as u32) < 0x20 || c as u32 == 0x7f => write!(f, "\\x{:02x}", c as u32),
        c => write!(f, "{c}"),
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for IdentifierAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl fmt::Display for FileDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            writeln!(f, "{stmt}")?;
        }
        for ty in &self.types {
            writeln!(f, "{ty}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.yields {
            write!(f, "yield ")?;
        }
        match self.prefix.kind {
            PrefixKind::None => {}
            PrefixKind::Return => write!(f, "return ")?,
            PrefixKind::Break => write!(f, "break ")?,
            PrefixKind::Continue => write!(f, "continue ")?,
            PrefixKind::BlockVal => write!(f, "= ")?,
        }
        match &self.kind {
            StatementKind::VarDecl(decl) => write!(f, "{decl};"),
            StatementKind::Assign(assign) => write!(f, "{assign};"),
            StatementKind::Expr(expr) => write!(f, "{expr};"),
        }
    }
}

impl fmt::Display for VarDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.decls.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", entry.id)?;
        }
        let types: Vec<&TypeExpr> = self.decls.iter().filter_map(|d| d.ty.as_ref()).collect();
        if !types.is_empty() {
            write!(f, " : ")?;
            write_list(f, &types)?;
        }
        let values: Vec<&Expr> = self.decls.iter().filter_map(|d| d.value.as_ref()).collect();
        if !values.is_empty() {
            if !types.is_empty() {
                // typed declarations introduce values with `=`/`::`
                write!(f, "{}", if self.mutable { " = " } else { " :: " })?;
            } else {
                write!(f, "{}", if self.mutable { " := " } else { " :: " })?;
            }
            write_list(f, &values)?;
        }
        Ok(())
    }
}

impl fmt::Display for AssignExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.lhs)?;
        write!(f, " {} ", self.op.symbol())?;
        write_list(f, &self.rhs)
    }
}

impl fmt::Display for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type {}", self.id)?;
        if let Some(ty) = &self.ty {
            write!(f, " is {ty}")?;
        }
        if !self.body.is_empty() {
            write!(f, " {{ ")?;
            for stmt in &self.body {
                write!(f, "{stmt} ")?;
            }
            write!(f, "}}")?;
        }
        write!(f, ";")
    }
}

impl fmt::Display for TypeStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeStatement::TypeDecl(decl) => write!(f, "{decl}"),
            TypeStatement::Macro(m) => write!(f, "{m};"),
            TypeStatement::Member(decl) => write!(f, "{decl};"),
        }
    }
}

impl fmt::Display for TypeExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExprKind::Named(path) => write!(f, "{path}"),
            TypeExprKind::Generic { base, args } => {
                write!(f, "{base}[")?;
                write_list(f, args)?;
                write!(f, "]")
            }
            TypeExprKind::Tuple(entries) => {
                write!(f, "(")?;
                write_list(f, entries)?;
                write!(f, ")")
            }
            TypeExprKind::Func { params, ret } => {
                write!(f, "(")?;
                write_list(f, params)?;
                write!(f, ") -> {ret}")
            }
            TypeExprKind::Variant(alts) => {
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{alt}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}

impl fmt::Display for TupleTypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.id {
            write!(f, "{id}: ")?;
        }
        write!(f, "{}", self.ty)
    }
}

impl fmt::Display for VarDeclEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(ty) = &self.ty {
            write!(f, ": {ty}")?;
        }
        if let Some(value) = &self.value {
            write!(f, " = {value}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Logical(logical) => write!(f, "{logical}"),
            ExprKind::VarDecl(decl) => write!(f, "let {decl}"),
            ExprKind::Assign(assign) => write!(f, "{assign}"),
            ExprKind::FuncDecl(func) => write!(f, "{func}"),
            ExprKind::StructDecl(s) => write!(f, "{s}"),
            ExprKind::Range(range) => write!(f, "{range}"),
            ExprKind::Collection(coll) => write!(f, "{coll}"),
            ExprKind::Map(map) => write!(f, "{map}"),
            ExprKind::If(block) => write!(f, "{block}"),
            ExprKind::While(block) => write!(f, "{block}"),
            ExprKind::For(block) => write!(f, "{block}"),
            ExprKind::Block(body) => write_block(f, body),
        }
    }
}

impl fmt::Display for FuncDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        write_list(f, &self.params)?;
        write!(f, ")")?;
        if let Some(ret) = &self.ret_type {
            write!(f, " -> {ret}")?;
        }
        write!(f, " => ")?;
        write_block(f, &self.body)
    }
}

impl fmt::Display for StructDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "struct (")?;
        write_list(f, &self.members)?;
        write!(f, ") ")?;
        write_block(f, &self.body)
    }
}

impl fmt::Display for RangeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = &self.start {
            write!(f, "{start}")?;
        }
        write!(f, "{}", if self.inclusive { "..=" } else { ".." })?;
        write!(f, "{}", self.stop)?;
        if let Some(step) = &self.step {
            write!(f, ":{step}")?;
        }
        Ok(())
    }
}

impl fmt::Display for CollectionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CollectionKind::Array => {
                write!(f, "[")?;
                write_list(f, &self.values)?;
                write!(f, "]")
            }
            CollectionKind::Tuple => {
                write!(f, "(")?;
                write_list(f, &self.values)?;
                if self.values.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for MapExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.keys.iter().zip(&self.values).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for IfBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, branch) in self.branches.iter().enumerate() {
            if i > 0 {
                write!(f, " else ")?;
            }
            write!(f, "if {} ", branch.cond)?;
            write_block(f, &branch.body)?;
        }
        if let Some(else_body) = &self.else_body {
            write!(f, " else ")?;
            write_block(f, else_body)?;
        }
        Ok(())
    }
}

impl fmt::Display for WhileBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "while {} ", self.cond)?;
        write_block(f, &self.body)
    }
}

impl fmt::Display for ForBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "for ")?;
        write_list(f, &self.ids)?;
        write!(f, " in ")?;
        write_list(f, &self.iterators)?;
        write!(f, " ")?;
        write_block(f, &self.body)
    }
}

impl fmt::Display for MacroExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}(", self.name)?;
        write_list(f, &self.args)?;
        write!(f, ")")
    }
}

impl fmt::Display for LogicalOrExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " || ")?;
            }
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

impl fmt::Display for LogicalAndExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " && ")?;
            }
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ComparisonExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, operand) in &self.rest {
            write!(f, " {} {operand}", op.symbol())?;
        }
        Ok(())
    }
}

impl fmt::Display for AdditiveExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, operand) in &self.rest {
            write!(f, " {} {operand}", op.symbol())?;
        }
        Ok(())
    }
}

impl fmt::Display for MultiplicativeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, operand) in &self.rest {
            write!(f, " {} {operand}", op.symbol())?;
        }
        Ok(())
    }
}

impl fmt::Display for PowerExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " ** ")?;
            }
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

impl fmt::Display for UnaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            write!(f, "{}", op.symbol())?;
        }
        write!(f, "{}", self.rhs)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}

impl fmt::Display for AtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomKind::Ident(id) => write!(f, "{id}"),
            AtomKind::Constant(c) => write!(f, "{c}"),
            AtomKind::Paren(expr) => write!(f, "({expr})"),
            AtomKind::Macro(m) => write!(f, "{m}"),
            AtomKind::Index { base, index } => write!(f, "{base}[{index}]"),
            AtomKind::Slice {
                base,
                start,
                stop,
                step,
            } => {
                write!(f, "{base}[")?;
                if let Some(start) = start {
                    write!(f, "{start}")?;
                }
                write!(f, ":")?;
                if let Some(stop) = stop {
                    write!(f, "{stop}")?;
                }
                if let Some(step) = step {
                    write!(f, ":{step}")?;
                }
                write!(f, "]")
            }
            AtomKind::Call { base, args } => {
                write!(f, "{base}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            AtomKind::Member { base, member } => write!(f, "{base}.{member}"),
            AtomKind::Fold {
                func,
                folded,
                rightward,
            } => {
                if *rightward {
                    write!(f, "{folded} |> {func}")
                } else {
                    write!(f, "{func} <| {folded}")
                }
            }
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            // {:?} keeps the trailing `.0` so the literal stays a float
            Constant::Flt(v) => write!(f, "{v:?}"),
            Constant::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    escape_into(f, c)?;
                }
                write!(f, "\"")
            }
            Constant::Char(c) => {
                write!(f, "'")?;
                escape_into(f, *c)?;
                write!(f, "'")
            }
            Constant::Bool(v) => write!(f, "{v}"),
            Constant::Void => write!(f, "void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(kind: AtomKind) -> Atom {
        Atom::new(kind, SourceRange::NULL)
    }

    fn int(v: i64) -> Expr {
        Expr::from_atom(atom(AtomKind::Constant(Constant::Int(v))))
    }

    #[test]
    fn constants_render_as_source() {
        assert_eq!(Constant::Int(10).to_string(), "10");
        assert_eq!(Constant::Flt(123.0).to_string(), "123.0");
        assert_eq!(Constant::Bool(true).to_string(), "true");
        assert_eq!(Constant::Str("Hello".into()).to_string(), "\"Hello\"");
        assert_eq!(Constant::Str("a\nb".into()).to_string(), "\"a\\nb\"");
        assert_eq!(Constant::Char('\t').to_string(), "'\\t'");
    }

    #[test]
    fn statement_gets_terminator() {
        let stmt = Statement {
            prefix: StatementPrefix::NONE,
            kind: StatementKind::Expr(int(10)),
            pos: SourceRange::NULL,
        };
        assert_eq!(stmt.to_string(), "10;");
    }

    #[test]
    fn prefixes_render_in_order() {
        let stmt = Statement {
            prefix: StatementPrefix {
                yields: true,
                kind: PrefixKind::Return,
            },
            kind: StatementKind::Expr(int(1)),
            pos: SourceRange::NULL,
        };
        assert_eq!(stmt.to_string(), "yield return 1;");
    }

    #[test]
    fn var_decl_forms() {
        let entry = |name: &str, value| VarDeclEntry {
            id: Ident::new(name, SourceRange::NULL),
            ty: None,
            value: Some(value),
        };
        let immutable = VarDecl {
            mutable: false,
            decls: vec![entry("x", int(3))],
        };
        assert_eq!(immutable.to_string(), "x :: 3");

        let mutable = VarDecl {
            mutable: true,
            decls: vec![entry("a", int(1)), entry("b", int(2))],
        };
        assert_eq!(mutable.to_string(), "a, b := 1, 2");
    }

    #[test]
    fn fold_directions() {
        let func = atom(AtomKind::Ident(Ident::new("f", SourceRange::NULL)));
        let xs = AdditiveExpr::from_atom(atom(AtomKind::Ident(Ident::new(
            "xs",
            SourceRange::NULL,
        ))));
        let left = AtomKind::Fold {
            func: Box::new(func.clone()),
            folded: Box::new(xs.clone()),
            rightward: false,
        };
        assert_eq!(left.to_string(), "f <| xs");
        let right = AtomKind::Fold {
            func: Box::new(func),
            folded: Box::new(xs),
            rightward: true,
        };
        assert_eq!(right.to_string(), "xs |> f");
    }

    #[test]
    fn range_with_step() {
        let range = RangeExpr {
            inclusive: true,
            start: Some(Box::new(int(0))),
            stop: Box::new(int(10)),
            step: Some(Box::new(int(2))),
        };
        assert_eq!(range.to_string(), "0..=10:2");
    }

    #[test]
    fn empty_block_and_map() {
        assert_eq!(ExprKind::Block(Vec::new()).to_string(), "{}");
        let map = MapExpr {
            keys: vec![int(1)],
            values: vec![int(2)],
        };
        assert_eq!(map.to_string(), "{1: 2}");
    }
}
