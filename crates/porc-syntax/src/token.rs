//! Token types and the operator/keyword trie.

use std::sync::OnceLock;

use porc_ast::{
    AdditiveOp, AssignOp, ComparisonOp, MultiplicativeOp, PrefixOp, SourceRange,
};

/// A lexical token with its source range.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: SourceRange,
}

impl Token {
    pub fn new(kind: TokenKind, pos: SourceRange) -> Self {
        Self { kind, pos }
    }

    pub fn eof(pos: SourceRange) -> Self {
        Self::new(TokenKind::EndOfFile, pos)
    }

    pub fn is_comment(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::LineComment(_) | TokenKind::BlockComment(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// No token could be formed. Ends the current parse attempt.
    Undefined,
    EndOfFile,

    // -- Literals --
    Ident(String),
    Str(String),
    Flt(f64),
    Int(i64),
    Char(char),
    LineComment(String),
    BlockComment(String),

    // -- Punctuation --
    Comma,
    SemiColon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Colon,
    DoubleColon,
    Dot,
    /// `@`, introduces a macro expression.
    Macro,
    Question,

    // -- Operators --
    Less,
    Greater,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Not,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    FloorDiv,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    PowAssign,
    ModAssign,
    FloorDivAssign,
    FatArrow,
    /// `<|`
    FoldLeft,
    /// `|>`
    FoldRight,
    /// `->`
    ReturnType,
    /// `..`
    Range,
    /// `..=`
    RangeEq,
    /// `:=`
    ColonAssign,
    /// `|`, separates type variants.
    Variant,

    // -- Keywords --
    Let,
    Var,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Yield,
    Break,
    Continue,
    Type,
    Struct,
    True,
    False,
    Void,
    Is,
}

impl TokenKind {
    /// The literal spelling of fixed tokens; `None` for literals and
    /// sentinels.
    pub fn fixed_str(&self) -> Option<&'static str> {
        Some(match self {
            TokenKind::Comma => ",",
            TokenKind::SemiColon => ";",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Colon => ":",
            TokenKind::DoubleColon => "::",
            TokenKind::Dot => ".",
            TokenKind::Macro => "@",
            TokenKind::Question => "?",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::Equal => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::LessEqual => "<=",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Not => "!",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Add => "+",
            TokenKind::Sub => "-",
            TokenKind::Mul => "*",
            TokenKind::Div => "/",
            TokenKind::Mod => "%",
            TokenKind::Pow => "**",
            TokenKind::FloorDiv => "%/",
            TokenKind::Assign => "=",
            TokenKind::AddAssign => "+=",
            TokenKind::SubAssign => "-=",
            TokenKind::MulAssign => "*=",
            TokenKind::DivAssign => "/=",
            TokenKind::PowAssign => "**=",
            TokenKind::ModAssign => "%=",
            TokenKind::FloorDivAssign => "%/=",
            TokenKind::FatArrow => "=>",
            TokenKind::FoldLeft => "<|",
            TokenKind::FoldRight => "|>",
            TokenKind::ReturnType => "->",
            TokenKind::Range => "..",
            TokenKind::RangeEq => "..=",
            TokenKind::ColonAssign => ":=",
            TokenKind::Variant => "|",
            TokenKind::Let => "let",
            TokenKind::Var => "var",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Return => "return",
            TokenKind::Yield => "yield",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Type => "type",
            TokenKind::Struct => "struct",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Void => "void",
            TokenKind::Is => "is",
            _ => return None,
        })
    }

    /// Human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Undefined => "undefined token".to_string(),
            TokenKind::EndOfFile => "end of file".to_string(),
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Flt(_) => "float literal".to_string(),
            TokenKind::Int(_) => "integer literal".to_string(),
            TokenKind::Char(_) => "character literal".to_string(),
            TokenKind::LineComment(_) => "line comment".to_string(),
            TokenKind::BlockComment(_) => "block comment".to_string(),
            other => other
                .fixed_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{other:?}")),
        }
    }

    pub fn is_assign_op(&self) -> bool {
        self.as_assign_op().is_some()
    }

    pub fn as_assign_op(&self) -> Option<AssignOp> {
        Some(match self {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::AddAssign => AssignOp::Add,
            TokenKind::SubAssign => AssignOp::Sub,
            TokenKind::MulAssign => AssignOp::Mul,
            TokenKind::DivAssign => AssignOp::Div,
            TokenKind::PowAssign => AssignOp::Pow,
            TokenKind::ModAssign => AssignOp::Mod,
            TokenKind::FloorDivAssign => AssignOp::FloorDiv,
            _ => return None,
        })
    }

    pub fn as_comparison_op(&self) -> Option<ComparisonOp> {
        Some(match self {
            TokenKind::Less => ComparisonOp::Less,
            TokenKind::Greater => ComparisonOp::Greater,
            TokenKind::Equal => ComparisonOp::Equal,
            TokenKind::NotEqual => ComparisonOp::NotEqual,
            TokenKind::LessEqual => ComparisonOp::LessEqual,
            TokenKind::GreaterEqual => ComparisonOp::GreaterEqual,
            _ => return None,
        })
    }

    pub fn as_additive_op(&self) -> Option<AdditiveOp> {
        Some(match self {
            TokenKind::Add => AdditiveOp::Add,
            TokenKind::Sub => AdditiveOp::Sub,
            _ => return None,
        })
    }

    pub fn as_multiplicative_op(&self) -> Option<MultiplicativeOp> {
        Some(match self {
            TokenKind::Mul => MultiplicativeOp::Mul,
            TokenKind::Div => MultiplicativeOp::Div,
            TokenKind::Mod => MultiplicativeOp::Mod,
            TokenKind::FloorDiv => MultiplicativeOp::FloorDiv,
            _ => return None,
        })
    }

    pub fn as_prefix_op(&self) -> Option<PrefixOp> {
        Some(match self {
            TokenKind::Not => PrefixOp::Not,
            TokenKind::Sub => PrefixOp::Neg,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Trie
// ---------------------------------------------------------------------------

/// Width of the first trie level; tokens are ASCII.
pub const ASCII_SET: usize = 128;

/// Byte-indexed trie over every fixed token spelling: operators,
/// punctuation, comment openers, and keywords. The tokenizer walks it byte
/// by byte, remembering the last complete match (maximal munch), so `**=`
/// beats `**` beats `*`, and `<!` falls back to `<` followed by `!`.
pub struct TokenTrie {
    nodes: Vec<TrieNode>,
}

struct TrieNode {
    terminal: Option<TokenKind>,
    /// Child indices; 0 means no child (the root is never a child).
    children: [u32; ASCII_SET],
}

impl TrieNode {
    fn new() -> Self {
        Self {
            terminal: None,
            children: [0; ASCII_SET],
        }
    }
}

/// Root node index for [`TokenTrie::step`] walks.
pub const TRIE_ROOT: u32 = 0;

impl TokenTrie {
    fn build() -> Self {
        let mut trie = Self {
            nodes: vec![TrieNode::new()],
        };
        // comment openers get placeholder payloads; the tokenizer scans the
        // body after the trie identifies the opener
        trie.insert("//", TokenKind::LineComment(String::new()));
        trie.insert("/*", TokenKind::BlockComment(String::new()));
        for kind in FIXED_TOKENS {
            let text = kind
                .fixed_str()
                .unwrap_or_else(|| unreachable!("fixed token without spelling"));
            trie.insert(text, kind.clone());
        }
        trie
    }

    fn insert(&mut self, text: &str, kind: TokenKind) {
        let mut node = TRIE_ROOT as usize;
        for &byte in text.as_bytes() {
            debug_assert!((byte as usize) < ASCII_SET, "token spelling must be ASCII");
            let child = self.nodes[node].children[byte as usize];
            node = if child == 0 {
                self.nodes.push(TrieNode::new());
                let idx = self.nodes.len() - 1;
                self.nodes[node].children[byte as usize] = idx as u32;
                idx
            } else {
                child as usize
            };
        }
        debug_assert!(
            self.nodes[node].terminal.is_none(),
            "duplicate token spelling `{text}`"
        );
        self.nodes[node].terminal = Some(kind);
    }

    /// Follow one byte from `node`; `None` when no fixed token continues
    /// this way.
    pub fn step(&self, node: u32, byte: u8) -> Option<u32> {
        if byte as usize >= ASCII_SET {
            return None;
        }
        match self.nodes[node as usize].children[byte as usize] {
            0 => None,
            child => Some(child),
        }
    }

    /// The complete token ending at `node`, if any.
    pub fn terminal(&self, node: u32) -> Option<&TokenKind> {
        self.nodes[node as usize].terminal.as_ref()
    }

    /// Exact-match lookup, used to decide keyword vs identifier for a full
    /// identifier run.
    pub fn lookup(&self, text: &[u8]) -> Option<&TokenKind> {
        let mut node = TRIE_ROOT;
        for &byte in text {
            node = self.step(node, byte)?;
        }
        self.terminal(node)
    }
}

const FIXED_TOKENS: &[TokenKind] = &[
    TokenKind::Comma,
    TokenKind::SemiColon,
    TokenKind::LeftParen,
    TokenKind::RightParen,
    TokenKind::LeftBrace,
    TokenKind::RightBrace,
    TokenKind::LeftBracket,
    TokenKind::RightBracket,
    TokenKind::Colon,
    TokenKind::DoubleColon,
    TokenKind::Dot,
    TokenKind::Macro,
    TokenKind::Question,
    TokenKind::Less,
    TokenKind::Greater,
    TokenKind::Equal,
    TokenKind::NotEqual,
    TokenKind::LessEqual,
    TokenKind::GreaterEqual,
    TokenKind::Not,
    TokenKind::And,
    TokenKind::Or,
    TokenKind::Add,
    TokenKind::Sub,
    TokenKind::Mul,
    TokenKind::Div,
    TokenKind::Mod,
    TokenKind::Pow,
    TokenKind::FloorDiv,
    TokenKind::Assign,
    TokenKind::AddAssign,
    TokenKind::SubAssign,
    TokenKind::MulAssign,
    TokenKind::DivAssign,
    TokenKind::PowAssign,
    TokenKind::ModAssign,
    TokenKind::FloorDivAssign,
    TokenKind::FatArrow,
    TokenKind::FoldLeft,
    TokenKind::FoldRight,
    TokenKind::ReturnType,
    TokenKind::Range,
    TokenKind::RangeEq,
    TokenKind::ColonAssign,
    TokenKind::Variant,
    TokenKind::Let,
    TokenKind::Var,
    TokenKind::If,
    TokenKind::Else,
    TokenKind::While,
    TokenKind::For,
    TokenKind::In,
    TokenKind::Return,
    TokenKind::Yield,
    TokenKind::Break,
    TokenKind::Continue,
    TokenKind::Type,
    TokenKind::Struct,
    TokenKind::True,
    TokenKind::False,
    TokenKind::Void,
    TokenKind::Is,
];

/// The shared trie; built once on first use.
pub fn token_trie() -> &'static TokenTrie {
    static TRIE: OnceLock<TokenTrie> = OnceLock::new();
    TRIE.get_or_init(TokenTrie::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn munch(input: &[u8]) -> Option<(TokenKind, usize)> {
        let trie = token_trie();
        let mut node = TRIE_ROOT;
        let mut matched = None;
        for (i, &byte) in input.iter().enumerate() {
            let Some(next) = trie.step(node, byte) else {
                break;
            };
            node = next;
            if let Some(kind) = trie.terminal(node) {
                matched = Some((kind.clone(), i + 1));
            }
        }
        matched
    }

    #[test]
    fn maximal_munch_prefers_longest() {
        assert_eq!(munch(b"**= 1"), Some((TokenKind::PowAssign, 3)));
        assert_eq!(munch(b"** 1"), Some((TokenKind::Pow, 2)));
        assert_eq!(munch(b"%/= x"), Some((TokenKind::FloorDivAssign, 3)));
        assert_eq!(munch(b"..= "), Some((TokenKind::RangeEq, 3)));
    }

    #[test]
    fn failed_long_match_falls_back() {
        // `<!` is not a token: munch stops at `<`
        assert_eq!(munch(b"<!"), Some((TokenKind::Less, 1)));
        // `|` alone is the variant separator, `|>` is fold-right
        assert_eq!(munch(b"| x"), Some((TokenKind::Variant, 1)));
        assert_eq!(munch(b"|> x"), Some((TokenKind::FoldRight, 2)));
    }

    #[test]
    fn keywords_only_match_exactly() {
        let trie = token_trie();
        assert_eq!(trie.lookup(b"let"), Some(&TokenKind::Let));
        assert_eq!(trie.lookup(b"let5"), None);
        assert_eq!(trie.lookup(b"lets"), None);
        assert_eq!(trie.lookup(b"continue"), Some(&TokenKind::Continue));
        assert_eq!(trie.lookup(b"is"), Some(&TokenKind::Is));
    }

    #[test]
    fn comment_openers_resolve() {
        assert!(matches!(munch(b"// hi"), Some((TokenKind::LineComment(_), 2))));
        assert!(matches!(munch(b"/* hi"), Some((TokenKind::BlockComment(_), 2))));
        assert_eq!(munch(b"/ 2"), Some((TokenKind::Div, 1)));
    }

    #[test]
    fn non_ascii_never_steps() {
        assert_eq!(munch("é".as_bytes()), None);
    }
}
