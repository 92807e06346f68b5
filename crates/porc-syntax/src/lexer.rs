//! Streaming tokenizer.
//!
//! The tokenizer reads its input through a fixed-capacity refill buffer, so
//! tokens that straddle a read boundary (long strings, numbers split across
//! refills) must behave exactly like tokens that do not. Tests exercise this
//! by shrinking the buffer capacity until every token straddles a boundary.
//!
//! Lexical failures never panic and never abort: the offending input is
//! reported to the shared [`ErrStream`] and the token comes out as
//! [`TokenKind::Undefined`], which ends the current parse attempt.

use porc_ast::SourceRange;
use porc_diag::{ErrKind, ErrStream};

use crate::reader::Reader;
use crate::token::{token_trie, Token, TokenKind, TRIE_ROOT};

/// How many tokens may sit between the scanner and the parser. The parser
/// may push one popped token back; pushing a second without popping is a
/// contract violation.
pub const MAX_LOOKAHEAD: usize = 2;

/// Default refill buffer capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Smallest usable capacity: the scanner needs a few bytes of lookahead for
/// maximal munch.
const MIN_CAPACITY: usize = 8;

/// A pull-based token stream over a [`Reader`].
pub struct TokenStream<'e, R: Reader> {
    reader: R,
    pub err: &'e mut ErrStream,

    buf: Box<[u8]>,
    cur_index: usize,
    read_size: usize,
    source_done: bool,

    line: u32,
    col: u32,
    mark_line: u32,
    mark_col: u32,

    // lookahead queue, front first; holds at most MAX_LOOKAHEAD tokens
    cur: Option<Token>,
    next_cur: Option<Token>,
    pending: usize,
    last: Option<Token>,

    /// Skip comment tokens on peek/pop. On by default; the CLI `tokenize`
    /// command turns it off.
    pub ignore_comments: bool,
}

impl<'e, R: Reader> TokenStream<'e, R> {
    pub fn new(reader: R, err: &'e mut ErrStream) -> Self {
        Self::with_capacity(reader, err, DEFAULT_CAPACITY)
    }

    /// `capacity` is clamped below to a scanner-usable minimum.
    pub fn with_capacity(reader: R, err: &'e mut ErrStream, capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            reader,
            err,
            buf: vec![0; capacity].into_boxed_slice(),
            cur_index: 0,
            read_size: 0,
            source_done: false,
            line: 1,
            col: 1,
            mark_line: 1,
            mark_col: 1,
            cur: None,
            next_cur: None,
            pending: 0,
            last: None,
            ignore_comments: true,
        }
    }

    // -- token queue ------------------------------------------------------

    pub fn peek_current(&mut self) -> Token {
        if self.pending == 0 {
            self.scan_next();
        }
        self.cur.clone().unwrap_or_else(|| Token::eof(self.point()))
    }

    pub fn pop_current(&mut self) -> Token {
        if self.pending == 0 {
            self.scan_next();
        }
        self.pending -= 1;
        let tok = self
            .cur
            .take()
            .unwrap_or_else(|| Token::eof(self.point()));
        self.cur = self.next_cur.take();
        if !matches!(tok.kind, TokenKind::EndOfFile | TokenKind::Undefined) {
            self.last = Some(tok.clone());
        }
        tok
    }

    /// Re-inject a popped token. At most one token may be pending this way.
    pub fn push_back(&mut self, tok: Token) {
        assert!(
            self.pending < MAX_LOOKAHEAD,
            "can't push back more than {} tokens",
            MAX_LOOKAHEAD - 1
        );
        self.next_cur = self.cur.take();
        self.cur = Some(tok);
        self.pending += 1;
    }

    /// The most recent token handed out by `pop_current`, ignoring
    /// sentinels. Used to place "missing `;`" errors at the end of the
    /// previous line.
    pub fn last_popped(&self) -> Option<&Token> {
        self.last.as_ref()
    }

    fn scan_next(&mut self) {
        let mut tok = self.scan_token();
        if self.ignore_comments {
            while tok.is_comment() {
                tok = self.scan_token();
            }
        }
        self.push_back(tok);
    }

    // -- refill buffer ----------------------------------------------------

    fn available(&self) -> usize {
        self.read_size - self.cur_index
    }

    /// Make at least `n` bytes available from the cursor, compacting unread
    /// bytes to the front and refilling from the reader. Returns how many
    /// bytes are actually available (less than `n` only at end of input).
    fn ensure(&mut self, n: usize) -> usize {
        debug_assert!(n <= self.buf.len(), "lookahead exceeds buffer capacity");
        while self.available() < n && !self.source_done {
            self.buf.copy_within(self.cur_index..self.read_size, 0);
            self.read_size -= self.cur_index;
            self.cur_index = 0;
            match self.reader.read(&mut self.buf[self.read_size..]) {
                Ok(0) => self.source_done = true,
                Ok(k) => self.read_size += k,
                Err(e) => {
                    self.err.custom(
                        ErrKind::Lexical,
                        format!("read error: {e}"),
                        Some(self.point()),
                    );
                    self.source_done = true;
                }
            }
        }
        self.available()
    }

    fn peek_byte(&mut self, i: usize) -> Option<u8> {
        if self.ensure(i + 1) > i {
            Some(self.buf[self.cur_index + i])
        } else {
            None
        }
    }

    /// Consume one byte, tracking line/column.
    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek_byte(0)?;
        self.cur_index += 1;
        if byte == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(byte)
    }

    // -- positions --------------------------------------------------------

    fn mark(&mut self) {
        self.mark_line = self.line;
        self.mark_col = self.col;
    }

    /// Range from the mark to the last consumed byte.
    fn range(&self) -> SourceRange {
        let col_end = if self.col > self.mark_col || self.line > self.mark_line {
            self.col - 1
        } else {
            self.mark_col
        };
        SourceRange::new(self.mark_line, self.mark_col, self.line, col_end)
    }

    fn point(&self) -> SourceRange {
        SourceRange::at(self.line, self.col)
    }

    // -- scanning ---------------------------------------------------------

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();
        self.mark();

        let Some(byte) = self.peek_byte(0) else {
            return Token::eof(self.point());
        };

        match byte {
            b'"' => self.scan_str(),
            b'\'' => self.scan_char(),
            b'0'..=b'9' => self.scan_num(),
            b'.' if matches!(self.peek_byte(1), Some(b'0'..=b'9')) => self.scan_num(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_ident_or_keyword(),
            _ => self.scan_simple_token(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_byte(0), Some(b) if b.is_ascii_whitespace()) {
            self.bump();
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Token {
        let mut text = String::new();
        while matches!(self.peek_byte(0), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            // consumed bytes are ASCII, so pushing as chars is lossless
            text.push(self.bump().unwrap_or_default() as char);
        }
        // the whole identifier run decides: `let5` is an identifier, not
        // the keyword `let` followed by `5`
        let kind = match token_trie().lookup(text.as_bytes()) {
            Some(keyword) => keyword.clone(),
            None => TokenKind::Ident(text),
        };
        Token::new(kind, self.range())
    }

    /// Greedy trie walk over operators and punctuation, remembering the
    /// last complete match.
    fn scan_simple_token(&mut self) -> Token {
        let trie = token_trie();
        let mut node = TRIE_ROOT;
        let mut matched: Option<(TokenKind, usize)> = None;
        let mut i = 0;
        while let Some(byte) = self.peek_byte(i) {
            let Some(next) = trie.step(node, byte) else {
                break;
            };
            node = next;
            i += 1;
            if let Some(kind) = trie.terminal(node) {
                matched = Some((kind.clone(), i));
            }
        }

        let Some((kind, len)) = matched else {
            // no fixed token starts here
            let byte = self.bump().unwrap_or_default();
            let pos = self.range();
            let shown = if byte.is_ascii_graphic() {
                (byte as char).to_string()
            } else {
                format!("\\x{byte:02x}")
            };
            self.err.undefined_token(&shown, pos);
            return Token::new(TokenKind::Undefined, pos);
        };

        for _ in 0..len {
            self.bump();
        }

        match kind {
            TokenKind::LineComment(_) => self.scan_line_comment(),
            TokenKind::BlockComment(_) => self.scan_block_comment(),
            kind => Token::new(kind, self.range()),
        }
    }

    fn scan_line_comment(&mut self) -> Token {
        let mut body = Vec::new();
        while let Some(byte) = self.peek_byte(0) {
            if byte == b'\n' {
                self.bump();
                break;
            }
            self.bump();
            body.push(byte);
        }
        let body = String::from_utf8_lossy(&body).into_owned();
        Token::new(TokenKind::LineComment(body), self.range())
    }

    /// Block comments nest: every `/*` inside needs its own `*/`.
    fn scan_block_comment(&mut self) -> Token {
        let mut body = Vec::new();
        let mut depth = 1u32;
        loop {
            let Some(byte) = self.peek_byte(0) else {
                let pos = self.range();
                self.err.unterminated_comment(pos);
                return Token::new(TokenKind::Undefined, pos);
            };
            match byte {
                b'*' if self.peek_byte(1) == Some(b'/') => {
                    self.bump();
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    body.extend_from_slice(b"*/");
                }
                b'/' if self.peek_byte(1) == Some(b'*') => {
                    self.bump();
                    self.bump();
                    depth += 1;
                    body.extend_from_slice(b"/*");
                }
                _ => {
                    self.bump();
                    body.push(byte);
                }
            }
        }
        let body = String::from_utf8_lossy(&body).into_owned();
        Token::new(TokenKind::BlockComment(body), self.range())
    }

    fn scan_num(&mut self) -> Token {
        let mut digits = String::new();
        let mut handled_dot = false;
        let mut handled_exp = false;
        let mut prev_exp = false;

        loop {
            let Some(byte) = self.peek_byte(0) else {
                break;
            };

            if prev_exp {
                // right after `e`: separator, sign, or digit; anything else
                // cannot be valid syntax, so the whole literal is bad
                match byte {
                    b'_' => {
                        self.bump();
                        continue;
                    }
                    b'+' | b'-' | b'0'..=b'9' => {
                        digits.push(self.bump().unwrap_or_default() as char);
                        handled_exp = true;
                        prev_exp = false;
                        continue;
                    }
                    _ => {
                        let pos = self.range();
                        self.err
                            .custom(ErrKind::Lexical, "malformed exponent", Some(pos));
                        return Token::new(TokenKind::Undefined, pos);
                    }
                }
            }

            match byte {
                b'0'..=b'9' => digits.push(self.bump().unwrap_or_default() as char),
                b'_' => {
                    self.bump();
                }
                b'.' => {
                    // `1..10` is a range, not a float with a dot
                    if handled_dot || handled_exp || self.peek_byte(1) == Some(b'.') {
                        break;
                    }
                    handled_dot = true;
                    digits.push(self.bump().unwrap_or_default() as char);
                }
                b'e' | b'E' => {
                    if handled_exp {
                        break;
                    }
                    prev_exp = true;
                    digits.push(self.bump().unwrap_or_default() as char);
                }
                _ => break,
            }
        }

        if prev_exp {
            // input ended right after `e`
            let pos = self.range();
            self.err
                .custom(ErrKind::Lexical, "malformed exponent", Some(pos));
            return Token::new(TokenKind::Undefined, pos);
        }

        let pos = self.range();
        if handled_dot || handled_exp {
            match digits.parse::<f64>() {
                Ok(value) => Token::new(TokenKind::Flt(value), pos),
                Err(_) => {
                    self.err
                        .custom(ErrKind::Lexical, "invalid float literal", Some(pos));
                    Token::new(TokenKind::Undefined, pos)
                }
            }
        } else {
            match digits.parse::<i64>() {
                Ok(value) => Token::new(TokenKind::Int(value), pos),
                Err(_) => {
                    self.err.custom(
                        ErrKind::Lexical,
                        "integer literal out of range",
                        Some(pos),
                    );
                    Token::new(TokenKind::Undefined, pos)
                }
            }
        }
    }

    /// Payloads are collected as raw bytes and decoded once at the end, so
    /// multi-byte UTF-8 content survives byte-for-byte.
    fn scan_str(&mut self) -> Token {
        self.bump(); // opening quote
        let mut bytes = Vec::new();
        loop {
            let Some(byte) = self.peek_byte(0) else {
                let pos = self.range();
                self.err.unterminated_string(pos);
                return Token::new(TokenKind::Undefined, pos);
            };
            match byte {
                b'"' => {
                    self.bump();
                    break;
                }
                b'\\' => {
                    self.bump();
                    if let Some(c) = self.scan_escape() {
                        bytes.push(c as u8);
                    }
                }
                _ => {
                    self.bump();
                    bytes.push(byte);
                }
            }
        }
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Token::new(TokenKind::Str(text), self.range())
    }

    /// One escape sequence after the backslash; `None` when it produced
    /// nothing (already reported).
    fn scan_escape(&mut self) -> Option<char> {
        let Some(byte) = self.bump() else {
            // EOF right after `\`; the string loop reports unterminated
            return None;
        };
        match byte {
            b'n' => Some('\n'),
            b'r' => Some('\r'),
            b't' => Some('\t'),
            b'v' => Some('\x0b'),
            b'a' => Some('\x07'),
            b'b' => Some('\x08'),
            b'f' => Some('\x0c'),
            b'x' => {
                let mut value: u32 = 0;
                let mut count = 0;
                while count < 2 {
                    match self.peek_byte(0) {
                        Some(b) if b.is_ascii_hexdigit() => {
                            value = value * 16 + (b as char).to_digit(16).unwrap_or(0);
                            self.bump();
                            count += 1;
                        }
                        _ => break,
                    }
                }
                if count == 0 {
                    self.err.custom(
                        ErrKind::Lexical,
                        "`\\x` escape needs at least one hex digit",
                        Some(self.point()),
                    );
                    return None;
                }
                Some(value as u8 as char)
            }
            b'0'..=b'9' => {
                // octal, first digit already consumed
                let mut value: u32 = (byte - b'0') as u32;
                let mut count = 1;
                while count < 3 {
                    match self.peek_byte(0) {
                        Some(b @ b'0'..=b'7') => {
                            value = value * 8 + (b - b'0') as u32;
                            self.bump();
                            count += 1;
                        }
                        _ => break,
                    }
                }
                if value > 0o377 {
                    self.err.custom(
                        ErrKind::Lexical,
                        "octal escape out of range (max `\\377`)",
                        Some(self.point()),
                    );
                    return None;
                }
                Some((value as u8) as char)
            }
            b'u' | b'U' => {
                self.err.custom(
                    ErrKind::Lexical,
                    "unicode escapes are not supported",
                    Some(self.point()),
                );
                None
            }
            other => Some(other as char),
        }
    }

    /// A single byte or one escape sequence between single quotes; ASCII
    /// only.
    fn scan_char(&mut self) -> Token {
        self.bump(); // opening quote
        let value = match self.peek_byte(0) {
            None => {
                let pos = self.range();
                self.err
                    .custom(ErrKind::Lexical, "unterminated character literal", Some(pos));
                return Token::new(TokenKind::Undefined, pos);
            }
            Some(b'\\') => {
                self.bump();
                self.scan_escape()
            }
            Some(b) if b < 0x80 && b != b'\'' => {
                self.bump();
                Some(b as char)
            }
            Some(_) => {
                self.bump();
                let pos = self.range();
                self.err.custom(
                    ErrKind::Lexical,
                    "character literals are single ASCII characters",
                    Some(pos),
                );
                None
            }
        };
        if self.peek_byte(0) == Some(b'\'') {
            self.bump();
        } else {
            let pos = self.range();
            self.err
                .custom(ErrKind::Lexical, "unterminated character literal", Some(pos));
            return Token::new(TokenKind::Undefined, pos);
        }
        match value {
            Some(c) => Token::new(TokenKind::Char(c), self.range()),
            None => Token::new(TokenKind::Undefined, self.range()),
        }
    }
}
