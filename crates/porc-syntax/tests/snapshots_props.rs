use std::fmt::Write;

use insta::assert_snapshot;
use porc_diag::ErrStream;
use porc_syntax::{parse_file_source, Parser, StrReader, TokenKind, TokenStream};
use proptest::prelude::*;

/// Sources that must parse cleanly. Each exercises one corner of the
/// grammar; the round-trip test below re-parses the printer's output.
const CORPUS: &[(&str, &str)] = &[
    ("int_stmt", "10;"),
    ("float_stmt", "1.5e3;"),
    ("string_stmt", "\"Hello\";"),
    ("immutable_decl", "x :: 3;"),
    ("mutable_decl", "x := 3;"),
    ("typed_decl", "n : Int = 5;"),
    ("typed_immutable", "n : Int :: 5;"),
    ("multi_decl", "a, b := 1, 2;"),
    ("typed_no_value", "n : Int;"),
    ("compound_assign", "a **= 2;"),
    ("multi_assign", "a, b = 1, 2;"),
    ("postfix_targets", "xs[0], p.x += 1, 2;"),
    ("precedence", "1 + 2 * 3 ** 4 == 25 && !done || retry;"),
    ("unary_stack", "!-x;"),
    ("paren_expr", "(a + b) * c;"),
    ("paren_callee", "(f)(1, 2);"),
    ("tuple", "(a, b, 3);"),
    ("tuple_single", "(a,);"),
    ("empty_tuple", "();"),
    ("array", "[1, 2, 3];"),
    ("array_index", "xs[0];"),
    ("slice_full", "xs[1:10:2];"),
    ("slice_open", "xs[:];"),
    ("member_chain", "a.b.c;"),
    ("call_chain", "f(1)(2);"),
    ("fold_left", "sum <| xs;"),
    ("fold_right_chain", "xs |> f |> g;"),
    ("range", "0..10;"),
    ("range_inclusive_step", "0..=10:2;"),
    ("range_open_start", "..5;"),
    ("func_minimal", "f := () => { = 1; };"),
    ("func_typed", "f := (x: Int, y: Int = 2) -> Int => { = x + y; };"),
    ("func_plain_params", "f := (x, y) => { = x; };"),
    ("struct_decl", "p := struct (x: Int, y: Int = 0) { d := 0; };"),
    ("if_else", "r := if a { = 1; } else if b { = 2; } else { = 3; };"),
    ("while_loop", "while i < 10 { i += 1; };"),
    ("for_loop", "for (i, x in 0..10, xs) { @io.print(i, x); };"),
    ("map", "{1: 2, 3: 4};"),
    ("empty_block", "{};"),
    ("block_value", "v := { a := 1; = a + 1; };"),
    ("macro_stmt", "@io.print(x);"),
    ("type_alias", "type Meters is Flt;"),
    ("type_forward", "type Shape;"),
    ("type_variant", "type Num is Int | Flt;"),
    ("type_generic", "type Pairs is Map[Str, Int];"),
    ("type_func", "type Handler is (a: Int, Str) -> void;"),
    ("type_body", "type V { x : Int; @derive(eq); type Inner is Int; };"),
    ("char_literal", "c :: 'x';"),
    ("void_return", "f := () => { return void; };"),
];

fn parse_and_print(source: &str) -> Result<String, String> {
    let mut err = ErrStream::new();
    let file = parse_file_source(source, &mut err);
    if err.had_errors() {
        let mut rendered = String::new();
        for diag in err.diagnostics() {
            let _ = writeln!(&mut rendered, "- {diag}");
        }
        return Err(rendered);
    }
    Ok(file.to_string())
}

#[test]
fn corpus_parses_cleanly() {
    for (name, source) in CORPUS {
        if let Err(diags) = parse_and_print(source) {
            panic!("case {name} failed:\n{diags}");
        }
    }
}

/// The printer's output is a fixpoint: parsing it and printing again must
/// reproduce it byte for byte.
#[test]
fn corpus_print_parse_is_idempotent() {
    for (name, source) in CORPUS {
        let printed = match parse_and_print(source) {
            Ok(p) => p,
            Err(diags) => panic!("case {name} failed to parse:\n{diags}"),
        };
        let reprinted = match parse_and_print(&printed) {
            Ok(p) => p,
            Err(diags) => panic!(
                "case {name}: printed form failed to re-parse:\n{printed}\n{diags}"
            ),
        };
        assert_eq!(printed, reprinted, "case {name} is not a fixpoint");
    }
}

#[test]
fn printer_canonicalises_simple_statements() {
    let printed = parse_and_print("10;\ntrue;\n\"Hello\";\n").unwrap();
    assert_snapshot!(printed.trim_end(), @r#"
    10;
    true;
    "Hello";
    "#);
}

#[test]
fn printer_canonicalises_declarations() {
    let printed = parse_and_print("let x::3;   y:=x+1;").unwrap();
    assert_snapshot!(printed.trim_end(), @r"
    x :: 3;
    y := x + 1;
    ");
}

#[test]
fn diagnostics_carry_positions() {
    let mut err = ErrStream::new();
    let _ = parse_file_source("x := ;\n", &mut err);
    assert!(err.had_errors());
    assert!(err.diagnostics().iter().any(|d| d.pos.is_some()));
}

#[test]
fn errors_do_not_hide_later_statements() {
    let mut err = ErrStream::new();
    let file = parse_file_source("a := ]; b := 2; c := 3;", &mut err);
    assert!(err.syntax_errors() >= 1);
    assert_eq!(file.statements.len(), 2);
}

fn token_kinds(source: &str, capacity: usize) -> (Vec<TokenKind>, bool) {
    let mut err = ErrStream::new();
    let mut kinds = Vec::new();
    {
        let mut stream = TokenStream::with_capacity(StrReader::new(source), &mut err, capacity);
        loop {
            let tok = stream.pop_current();
            let done = matches!(tok.kind, TokenKind::EndOfFile | TokenKind::Undefined);
            kinds.push(tok.kind);
            if done {
                break;
            }
        }
    }
    (kinds, err.had_errors())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Tokens that straddle a refill boundary must come out exactly like
    /// tokens that do not, for every buffer capacity.
    #[test]
    fn prop_buffer_capacity_never_changes_tokens(
        words in prop::collection::vec(
            prop_oneof![
                "[a-z][a-z0-9_]{0,12}",
                "[0-9]{1,6}",
                "[0-9]{1,4}\\.[0-9]{1,4}",
                Just("\"some longer string literal\"".to_string()),
                Just(":=".to_string()),
                Just("**=".to_string()),
                Just("..=".to_string()),
                Just("|>".to_string()),
            ],
            1..24,
        ),
        capacity in 8usize..96,
    ) {
        let source = words.join(" ");
        let (reference, ref_errors) = token_kinds(&source, 4096);
        let (squeezed, squeezed_errors) = token_kinds(&source, capacity);
        prop_assert_eq!(reference, squeezed);
        prop_assert_eq!(ref_errors, squeezed_errors);
    }

    /// Whatever the input, the parser terminates and every reported
    /// diagnostic is well formed.
    #[test]
    fn prop_parser_terminates_with_coherent_diagnostics(source in "[ -~\\n]{0,64}") {
        let mut err = ErrStream::new();
        let _ = parse_file_source(&source, &mut err);
        for diag in err.diagnostics() {
            prop_assert!(!diag.message.trim().is_empty());
        }
    }

    #[test]
    fn prop_generated_decls_round_trip(count in 1usize..12, base in 0i64..1000) {
        let mut source = String::new();
        for i in 0..count {
            let _ = writeln!(&mut source, "v{i} := {};", base + i as i64);
        }
        let mut err = ErrStream::new();
        let file = parse_file_source(&source, &mut err);
        prop_assert!(!err.had_errors());
        prop_assert_eq!(file.statements.len(), count);
        prop_assert_eq!(file.to_string(), source);
    }

    /// Expressions parsed at any buffer capacity print identically.
    #[test]
    fn prop_expr_capacity_equivalence(capacity in 8usize..64) {
        let source = "total := (weights |> normalize) <| values + 1.25 ** 2;";
        let mut err_a = ErrStream::new();
        let reference = parse_file_source(source, &mut err_a).to_string();

        let mut err_b = ErrStream::new();
        let squeezed = {
            let stream =
                TokenStream::with_capacity(StrReader::new(source), &mut err_b, capacity);
            Parser::new(stream).parse_file()
        };
        prop_assert!(!err_b.had_errors());
        prop_assert_eq!(squeezed.to_string(), reference);
    }
}
