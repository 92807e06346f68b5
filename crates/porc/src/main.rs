//! Command-line driver for the Porc front end.
//!
//! Runs one stage of the pipeline over each input file: `tokenize` dumps
//! the token stream, `parse` pretty-prints the tree, `resolve` additionally
//! runs scope resolution and dumps the scope table. Diagnostics go to
//! stderr; a file that produced any diagnostic counts as failed, and the
//! driver keeps going through the remaining files before exiting non-zero.

use std::path::{Path, PathBuf};

use porc_diag::ErrStream;
use porc_resolve::{PassManager, Scope, ScopeKind, ScopeTree, SsaPass};
use porc_syntax::{FileReader, Parser, TokenKind, TokenStream};

fn main() {
    if let Err(message) = run() {
        eprintln!("{message}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = std::env::args().collect::<Vec<_>>();
    let cli = parse_cli(&args)?;

    let mut failed = 0usize;
    for input in &cli.inputs {
        if cli.verbose {
            eprintln!("porc: {} `{}`", cli.stage.verb(), input.display());
        }
        if !process_file(cli.stage, input, cli.verbose) {
            failed += 1;
        }
    }
    if failed > 0 {
        return Err(format!(
            "{failed} of {} input file(s) failed",
            cli.inputs.len()
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Tokenize,
    Parse,
    Resolve,
}

impl Stage {
    fn verb(self) -> &'static str {
        match self {
            Stage::Tokenize => "tokenizing",
            Stage::Parse => "parsing",
            Stage::Resolve => "resolving",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    stage: Stage,
    inputs: Vec<PathBuf>,
    verbose: bool,
}

fn parse_cli(args: &[String]) -> Result<Cli, String> {
    if args.len() < 2 {
        return Err(usage());
    }

    let stage = match args[1].as_str() {
        "tokenize" => Stage::Tokenize,
        "parse" => Stage::Parse,
        "resolve" => Stage::Resolve,
        _ => return Err(usage()),
    };

    let mut inputs = Vec::new();
    let mut verbose = false;
    for arg in &args[2..] {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            flag if flag.starts_with('-') => {
                return Err(format!("unknown argument `{flag}`\n{}", usage()));
            }
            path => inputs.push(PathBuf::from(path)),
        }
    }
    if inputs.is_empty() {
        return Err(usage());
    }

    Ok(Cli {
        stage,
        inputs,
        verbose,
    })
}

fn usage() -> String {
    "usage:\n  porc tokenize <file.porc>... [-v]\n  porc parse <file.porc>... [-v]\n  porc resolve <file.porc>... [-v]".to_string()
}

fn process_file(stage: Stage, input: &Path, verbose: bool) -> bool {
    let reader = match FileReader::open(input) {
        Ok(reader) => reader,
        Err(err) => {
            eprintln!("failed to read `{}`: {err}", input.display());
            return false;
        }
    };

    let mut err = ErrStream::new();
    match stage {
        Stage::Tokenize => {
            let mut stream = TokenStream::new(reader, &mut err);
            stream.ignore_comments = false;
            loop {
                let tok = stream.pop_current();
                let done = matches!(tok.kind, TokenKind::EndOfFile | TokenKind::Undefined);
                println!("[{}] {:?}", tok.pos, tok.kind);
                if done {
                    break;
                }
            }
        }
        Stage::Parse => {
            let stream = TokenStream::new(reader, &mut err);
            let file = Parser::new(stream).parse_file();
            print!("{file}");
            if verbose {
                let mut exprs = 0usize;
                porc_ast::walk::walk_file(&file, &mut |_| exprs += 1);
                eprintln!(
                    "porc: {} statement(s), {} type(s), {exprs} expression(s)",
                    file.statements.len(),
                    file.types.len()
                );
            }
        }
        Stage::Resolve => {
            let stream = TokenStream::new(reader, &mut err);
            let mut file = Parser::new(stream).parse_file();
            if !err.had_errors() {
                let mut manager = PassManager::new();
                manager.register(Box::new(SsaPass::new()));
                if verbose {
                    manager.enable_tracing();
                }
                manager.run(&mut file, &mut err);
                for step in manager.take_trace() {
                    eprintln!(
                        "porc: {:?} {}.{} (s{})",
                        step.action, step.name, step.subscript, step.scope
                    );
                }
                print_scopes(manager.scopes());
            }
        }
    }

    for diag in err.diagnostics() {
        eprintln!("{diag}");
    }
    !err.had_errors()
}

fn print_scopes(scopes: &ScopeTree) {
    for scope in scopes.iter() {
        match scope.parent {
            Some(parent) => println!("scope {} ({}, parent {parent})", scope.id, kind_name(scope)),
            None => println!("scope {} ({})", scope.id, kind_name(scope)),
        }
        let mut lines = Vec::new();
        for name in scope.variable_decls.keys() {
            lines.push(format!("  var {name}"));
        }
        for name in scope.func_decls.keys() {
            lines.push(format!("  fn {name}"));
        }
        for name in scope.type_decls.keys() {
            lines.push(format!("  type {name}"));
        }
        lines.sort();
        for line in lines {
            println!("{line}");
        }
    }
}

fn kind_name(scope: &Scope) -> &'static str {
    match scope.kind {
        ScopeKind::TopLevel => "top level",
        ScopeKind::Type => "type",
        ScopeKind::Function => "function",
        ScopeKind::Block => "block",
    }
}
