//! SSA subscript tagging.
//!
//! Every identifier occurrence is rewritten in place with a subscript:
//!
//! - a declaration registers the name in the current scope, at subscript 0
//!   the first time the scope sees the name and one higher on each
//!   re-declaration;
//! - a reassignment finds the scope that owns the binding and bumps its
//!   counter there, so `x = 2` inside a block rebinds the outer `x` rather
//!   than shadowing it; like a declaration, the new binding lands in
//!   `func_decls` when the paired value is a function literal;
//! - a read resolves to the nearest enclosing binding and copies its
//!   current subscript;
//! - a name with no binding anywhere is treated as external: tagged 0 and
//!   recorded at 0 in the current scope so later occurrences agree.
//!
//! The pass also registers `type` declarations and reports a dual
//! definition when a type is given a body twice in one scope. A bodyless
//! forward declaration merges silently with its later definition.

use porc_ast::{Ident, TypeDecl};

use crate::{
    IdentUse, Node, Pass, PassContext, PassOutcome, ResolveAction, SsaName, TypeEntry,
};

pub struct SsaPass;

impl SsaPass {
    pub fn new() -> Self {
        Self
    }

    fn ident(&mut self, id: &mut Ident, usage: IdentUse, ctx: &mut PassContext<'_>) {
        match usage {
            IdentUse::Declare { func } => {
                let scope = ctx.scopes.current_id();
                let subscript = ctx.scopes.declare(&id.name);
                id.subscript = subscript;
                let key = SsaName::new(id.name.clone(), subscript);
                let decls = if func {
                    &mut ctx.scopes.get_mut(scope).func_decls
                } else {
                    &mut ctx.scopes.get_mut(scope).variable_decls
                };
                decls.insert(key, id.pos);
                let action = if func {
                    ResolveAction::DeclareFunc
                } else {
                    ResolveAction::Declare
                };
                ctx.trace(action, &id.name, subscript, scope, id.pos);
            }
            IdentUse::Assign { func } => match ctx.scopes.resolve(&id.name) {
                Some((owner, _)) => {
                    let subscript = ctx.scopes.bump(owner, &id.name);
                    id.subscript = subscript;
                    let key = SsaName::new(id.name.clone(), subscript);
                    let decls = if func {
                        &mut ctx.scopes.get_mut(owner).func_decls
                    } else {
                        &mut ctx.scopes.get_mut(owner).variable_decls
                    };
                    decls.insert(key, id.pos);
                    ctx.trace(ResolveAction::Assign, &id.name, subscript, owner, id.pos);
                }
                None => self.external(id, ctx),
            },
            IdentUse::Read => match ctx.scopes.resolve(&id.name) {
                Some((owner, subscript)) => {
                    id.subscript = subscript;
                    ctx.trace(ResolveAction::Read, &id.name, subscript, owner, id.pos);
                }
                None => self.external(id, ctx),
            },
        }
    }

    fn external(&mut self, id: &mut Ident, ctx: &mut PassContext<'_>) {
        let scope = ctx.scopes.current_id();
        ctx.scopes.record_external(&id.name);
        id.subscript = 0;
        ctx.trace(ResolveAction::External, &id.name, 0, scope, id.pos);
    }

    fn type_decl(&mut self, decl: &TypeDecl, ctx: &mut PassContext<'_>) -> PassOutcome {
        let has_body = decl.has_body();
        let scope = ctx.scopes.current_mut();
        if let Some(existing) = scope.type_decls.get_mut(&decl.id.name) {
            if existing.has_body && has_body {
                let first = existing.pos;
                ctx.err.dual_definition(&decl.id.name, first, decl.pos);
                return PassOutcome::Stop;
            }
            if has_body {
                existing.has_body = true;
                existing.pos = decl.pos;
            }
        } else {
            scope.type_decls.insert(
                decl.id.name.clone(),
                TypeEntry {
                    pos: decl.pos,
                    has_body,
                },
            );
        }
        PassOutcome::Continue
    }
}

impl Default for SsaPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for SsaPass {
    fn name(&self) -> &'static str {
        "ssa"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn visit(&mut self, node: Node<'_>, ctx: &mut PassContext<'_>) -> PassOutcome {
        match node {
            Node::Ident(id, usage) => {
                self.ident(id, usage, ctx);
                PassOutcome::Continue
            }
            Node::TypeDecl(decl) => self.type_decl(decl, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use porc_ast::{
        AdditiveExpr, AtomKind, Expr, ExprKind, FileDecl, Statement, StatementKind,
    };
    use porc_diag::ErrStream;
    use porc_syntax::parse_file_source;

    use crate::{resolve_file, PassManager, ScopeId, ScopeKind, ScopeTree, SsaName, SsaPass};

    fn resolve(source: &str) -> (FileDecl, ScopeTree, ErrStream) {
        let mut err = ErrStream::new();
        let mut file = parse_file_source(source, &mut err);
        assert_eq!(err.syntax_errors(), 0, "test source must parse: {source}");
        let scopes = resolve_file(&mut file, &mut err);
        (file, scopes, err)
    }

    fn ident_subscript(expr: &Expr) -> u32 {
        let ExprKind::Logical(logical) = &expr.node else {
            panic!("not a plain identifier expression");
        };
        let atom = logical
            .as_single_additive()
            .and_then(AdditiveExpr::as_single_atom)
            .unwrap();
        let AtomKind::Ident(id) = &atom.node else {
            panic!("not an identifier atom");
        };
        id.subscript
    }

    fn assign_target_subscript(stmt: &Statement) -> u32 {
        let StatementKind::Assign(assign) = &stmt.kind else {
            panic!("not an assignment");
        };
        ident_subscript(&assign.lhs[0])
    }

    fn decl_subscript(stmt: &Statement) -> u32 {
        let StatementKind::VarDecl(decl) = &stmt.kind else {
            panic!("not a declaration");
        };
        decl.decls[0].id.subscript
    }

    fn decl_value(stmt: &Statement) -> &Expr {
        let StatementKind::VarDecl(decl) = &stmt.kind else {
            panic!("not a declaration");
        };
        decl.decls[0].value.as_ref().unwrap()
    }

    #[test]
    fn assignments_bump_the_subscript_monotonically() {
        let (file, scopes, _) = resolve("x := 1; x = 2; x = 3;");
        assert_eq!(decl_subscript(&file.statements[0]), 0);
        assert_eq!(assign_target_subscript(&file.statements[1]), 1);
        assert_eq!(assign_target_subscript(&file.statements[2]), 2);
        assert_eq!(scopes.get(ScopeId(0)).current_ids["x"], 2);
    }

    #[test]
    fn a_read_between_assignments_sees_the_preceding_binding() {
        let (file, _, _) = resolve("x := 1; y := x; x = 2; z := x;");
        assert_eq!(ident_subscript(decl_value(&file.statements[1])), 0);
        assert_eq!(ident_subscript(decl_value(&file.statements[3])), 1);
    }

    #[test]
    fn assignment_in_a_block_rebinds_the_outer_name() {
        let (_, scopes, _) = resolve("x := 1; { x = 2; }; y := x;");
        // the bump lands in the owning (root) scope, not the block
        assert_eq!(scopes.get(ScopeId(0)).current_ids["x"], 1);
        let block = scopes
            .iter()
            .find(|s| s.kind == ScopeKind::Block)
            .unwrap();
        assert!(!block.current_ids.contains_key("x"));
    }

    #[test]
    fn block_declarations_do_not_leak_out() {
        let (file, scopes, _) = resolve("{ y := 5; }; y;");
        let block = scopes
            .iter()
            .find(|s| s.kind == ScopeKind::Block)
            .unwrap();
        assert_eq!(block.current_ids["y"], 0);
        // the top-level read is an external reference, recorded at 0
        assert_eq!(scopes.get(ScopeId(0)).current_ids["y"], 0);
        let StatementKind::Expr(expr) = &file.statements[1].kind else {
            panic!("expected expression statement");
        };
        assert_eq!(ident_subscript(expr), 0);
    }

    #[test]
    fn unknown_names_default_to_subscript_zero() {
        let (_, scopes, err) = resolve("print(x);");
        assert!(!err.had_errors());
        let root = scopes.get(ScopeId(0));
        assert_eq!(root.current_ids["print"], 0);
        assert_eq!(root.current_ids["x"], 0);
    }

    #[test]
    fn self_referential_declaration_reads_the_external_binding() {
        let (file, scopes, _) = resolve("x := x + 1;");
        // the read recorded `x` at 0 before the declaration re-bound it
        assert_eq!(decl_subscript(&file.statements[0]), 1);
        assert_eq!(scopes.get(ScopeId(0)).current_ids["x"], 1);
    }

    #[test]
    fn function_values_are_routed_to_func_decls() {
        let (_, scopes, _) = resolve("f := (x) => { = x; }; n := 1;");
        let root = scopes.get(ScopeId(0));
        assert!(root.func_decls.contains_key(&SsaName::new("f", 0)));
        assert!(root.variable_decls.contains_key(&SsaName::new("n", 0)));
        assert!(!root.variable_decls.contains_key(&SsaName::new("f", 0)));
    }

    #[test]
    fn reassignment_with_a_function_value_lands_in_func_decls() {
        let (_, scopes, _) = resolve("f := 1; f = () => { = 1; };");
        let root = scopes.get(ScopeId(0));
        assert!(root.variable_decls.contains_key(&SsaName::new("f", 0)));
        assert!(root.func_decls.contains_key(&SsaName::new("f", 1)));
        assert!(!root.variable_decls.contains_key(&SsaName::new("f", 1)));
    }

    #[test]
    fn a_broadcast_function_value_rebinds_every_target_as_a_function() {
        let (_, scopes, _) = resolve("a := 1; b := 2; a, b = (x) => { = x; };");
        let root = scopes.get(ScopeId(0));
        assert!(root.func_decls.contains_key(&SsaName::new("a", 1)));
        assert!(root.func_decls.contains_key(&SsaName::new("b", 1)));
    }

    #[test]
    fn paired_assignment_routes_each_target_by_its_own_value() {
        let (_, scopes, _) = resolve("f := 1; n := 2; f, n = (x) => { = x; }, 3;");
        let root = scopes.get(ScopeId(0));
        assert!(root.func_decls.contains_key(&SsaName::new("f", 1)));
        assert!(root.variable_decls.contains_key(&SsaName::new("n", 1)));
        assert!(!root.func_decls.contains_key(&SsaName::new("n", 1)));
    }

    #[test]
    fn parameters_live_in_the_function_scope() {
        let (file, scopes, _) = resolve("f := (a) => { = a; }; a;");
        let func = scopes
            .iter()
            .find(|s| s.kind == ScopeKind::Function)
            .unwrap();
        assert_eq!(func.current_ids["a"], 0);
        // the top-level `a` never sees the parameter
        let StatementKind::Expr(expr) = &file.statements[1].kind else {
            panic!("expected expression statement");
        };
        assert_eq!(ident_subscript(expr), 0);
        assert_eq!(scopes.get(ScopeId(0)).current_ids["a"], 0);
    }

    #[test]
    fn for_loop_variables_are_scoped_to_the_body() {
        let (_, scopes, _) = resolve("for i in 0..3 { s := i; };");
        let block = scopes
            .iter()
            .find(|s| s.kind == ScopeKind::Block)
            .unwrap();
        assert_eq!(block.current_ids["i"], 0);
        assert!(!scopes.get(ScopeId(0)).current_ids.contains_key("i"));
    }

    #[test]
    fn dual_type_definition_is_reported_exactly_once() {
        let (_, _, err) = resolve("type Foo { x : Int; };\ntype Foo { y : Int; };");
        assert_eq!(err.semantic_errors(), 1);
    }

    #[test]
    fn forward_declaration_merges_with_the_definition() {
        let (_, scopes, err) = resolve("type Shape;\ntype Shape { s : Int; };");
        assert!(!err.had_errors());
        let entry = &scopes.get(ScopeId(0)).type_decls["Shape"];
        assert!(entry.has_body);
    }

    #[test]
    fn tracing_is_opt_in_and_serialisable() {
        let mut err = ErrStream::new();
        let mut file = parse_file_source("x := 1; x = 2;", &mut err);

        let mut manager = PassManager::new();
        manager.register(Box::new(SsaPass::new()));
        manager.enable_tracing();
        manager.run(&mut file, &mut err);

        let trace = manager.take_trace();
        assert_eq!(trace.len(), 2);
        let json = serde_json::to_string(&trace).unwrap();
        assert!(json.contains("\"declare\""));
        assert!(json.contains("\"assign\""));

        // a second run without tracing records nothing
        assert!(manager.take_trace().is_empty());
    }
}
