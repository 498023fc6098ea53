// Tue Oct 13 2026 - Alex

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "alignas", "alignof", "auto", "bool", "break", "case", "catch", "char", "char16_t",
        "char32_t", "char8_t", "class", "const", "constexpr", "const_cast", "continue",
        "decltype", "default", "delete", "do", "double", "dynamic_cast", "else", "enum",
        "explicit", "extern", "false", "float", "for", "friend", "goto", "if", "inline", "int",
        "long", "mutable", "namespace", "new", "noexcept", "nullptr", "operator", "private",
        "protected", "public", "register", "reinterpret_cast", "restrict", "return", "short",
        "signed", "sizeof", "static", "static_assert", "static_cast", "struct", "switch",
        "template", "this", "thread_local", "throw", "true", "try", "typedef", "typeid",
        "typename", "union", "unsigned", "using", "virtual", "void", "volatile", "wchar_t",
        "while", "_Bool", "_Alignas", "_Atomic", "_Static_assert", "_Thread_local",
        "__attribute__", "__declspec", "__extension__", "__inline", "__inline__",
        "__restrict", "__restrict__", "__int128", "__const", "__volatile__", "__signed__",
    ]
    .into_iter()
    .collect()
});

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word)
}

/// Position of a token in its source file. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePos {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub fn new(file: Arc<str>, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    pub fn builtin() -> Self {
        Self::new(Arc::from("<builtin>"), 0, 0)
    }

    pub fn is_builtin(&self) -> bool {
        &*self.file == "<builtin>"
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Identifier,
    Keyword,
    IntLiteral,
    FloatLiteral,
    CharLiteral,
    StringLiteral,
    Punct,
    /// Empty operand of a `##` paste. Never leaves macro expansion.
    Placemarker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: SourcePos,
    /// First token on its logical line.
    pub line_start: bool,
    pub leading_space: bool,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: SourcePos) -> Self {
        Self {
            kind,
            text: text.into(),
            pos,
            line_start: false,
            leading_space: false,
        }
    }

    /// Builds an identifier or keyword token depending on the spelling.
    pub fn word(text: impl Into<String>, pos: SourcePos) -> Self {
        let text = text.into();
        let kind = if is_keyword(&text) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Self::new(kind, text, pos)
    }

    pub fn with_line_start(mut self, line_start: bool) -> Self {
        self.line_start = line_start;
        self
    }

    pub fn with_leading_space(mut self, leading_space: bool) -> Self {
        self.leading_space = leading_space;
        self
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    /// Identifiers and keywords, the tokens a macro name may be spelled with.
    pub fn is_word(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier | TokenKind::Keyword)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::CharLiteral
                | TokenKind::StringLiteral
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Joins tokens back into source text, keeping a single space wherever the
/// original had whitespace or a line break.
pub fn spell(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind == TokenKind::Placemarker {
            continue;
        }
        if i > 0 && (tok.leading_space || tok.line_start) && !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&tok.text);
    }
    out
}

/// Value of an integer literal, ignoring `u`/`l` suffixes.
pub fn parse_int_literal(text: &str) -> Option<u64> {
    let body = text.trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L' | 'z' | 'Z'));
    let body = body.replace('\'', "");
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()
    } else if body.len() > 1 && body.starts_with('0') {
        u64::from_str_radix(&body[1..], 8).ok()
    } else {
        body.parse().ok()
    }
}

/// Value of a character literal such as `'h'`, `'\n'` or `L'\x41'`.
pub fn parse_char_literal(text: &str) -> Option<i64> {
    let start = text.find('\'')?;
    let inner = text[start + 1..].strip_suffix('\'')?;
    let mut chars = inner.chars();
    let first = chars.next()?;
    if first != '\\' {
        return Some(first as i64);
    }
    let esc = chars.next()?;
    let value = match esc {
        'n' => 10,
        't' => 9,
        'r' => 13,
        '0'..='7' => {
            let digits: String = std::iter::once(esc).chain(chars.take(2)).collect();
            i64::from_str_radix(&digits, 8).ok()?
        }
        'x' => i64::from_str_radix(chars.as_str(), 16).ok()?,
        'a' => 7,
        'b' => 8,
        'f' => 12,
        'v' => 11,
        other => other as i64,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_literals() {
        assert_eq!(parse_int_literal("0x10"), Some(16));
        assert_eq!(parse_int_literal("010"), Some(8));
        assert_eq!(parse_int_literal("42UL"), Some(42));
        assert_eq!(parse_int_literal("0b101"), Some(5));
        assert_eq!(parse_int_literal("0"), Some(0));
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(parse_char_literal("'h'"), Some(104));
        assert_eq!(parse_char_literal("'\\n'"), Some(10));
        assert_eq!(parse_char_literal("L'\\x41'"), Some(65));
        assert_eq!(parse_char_literal("'\\0'"), Some(0));
    }

    #[test]
    fn test_word_classification() {
        let pos = SourcePos::builtin();
        assert_eq!(Token::word("struct", pos.clone()).kind, TokenKind::Keyword);
        assert_eq!(Token::word("foo", pos).kind, TokenKind::Identifier);
    }
}
