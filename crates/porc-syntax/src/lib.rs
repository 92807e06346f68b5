//! Streaming lexer and recursive descent parser for Porc source code.
//!
//! This crate takes source text (or any [`Reader`]) and produces an AST
//! defined in `porc-ast`. The lexer reads through a fixed-size refill
//! buffer so whole files never need to be resident; the parser pulls tokens
//! one at a time with at most one token of pushback.

pub mod lexer;
pub mod parser;
pub mod reader;
pub mod token;

use porc_ast::{Expr, FileDecl};
use porc_diag::ErrStream;

pub use lexer::{TokenStream, DEFAULT_CAPACITY, MAX_LOOKAHEAD};
pub use parser::Parser;
pub use reader::{FileReader, Reader, StrReader};
pub use token::{token_trie, Token, TokenKind, TokenTrie};

/// Parse a whole source file from a string. Diagnostics land in `err`.
pub fn parse_file_source(source: &str, err: &mut ErrStream) -> FileDecl {
    let stream = TokenStream::new(StrReader::new(source), err);
    Parser::new(stream).parse_file()
}

/// Parse a single expression from a string.
pub fn parse_expr_source(source: &str, err: &mut ErrStream) -> Option<Expr> {
    let stream = TokenStream::new(StrReader::new(source), err);
    Parser::new(stream).parse_expr()
}
