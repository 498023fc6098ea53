// Tue Oct 13 2026 - Alex

use crate::lexer::error::LexError;
use crate::lexer::token::{SourcePos, Token, TokenKind};
use std::sync::Arc;

const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "...", "->*", "::", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&",
    "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "##", ".*", "{", "}", "[", "]", "(",
    ")", "<", ">", ";", ":", ",", ".", "?", "+", "-", "*", "/", "%", "&", "|", "^", "!", "~",
    "=", "#",
];

/// Raw tokenizer. Produces tokens for a whole file; directives and macros are
/// left to the preprocessor.
pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    file: Arc<str>,
    line_start: bool,
    leading_space: bool,
}

impl Scanner {
    pub fn new(file: &str, text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file: Arc::from(file),
            line_start: true,
            leading_space: false,
        }
    }

    /// Scans everything, skipping bad characters and collecting their errors.
    pub fn scan_all(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        loop {
            match self.next_token() {
                Ok(Some(tok)) => tokens.push(tok),
                Ok(None) => break,
                Err(e) => {
                    errors.push(e);
                    self.bump();
                }
            }
        }
        (tokens, errors)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn here(&self) -> SourcePos {
        SourcePos::new(self.file.clone(), self.line, self.column)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    self.bump();
                    self.line_start = true;
                    self.leading_space = false;
                }
                '\\' if matches!(self.peek_at(1), Some('\n')) => {
                    self.bump();
                    self.bump();
                    self.leading_space = true;
                }
                '\\' if self.peek_at(1) == Some('\r') && self.peek_at(2) == Some('\n') => {
                    self.bump();
                    self.bump();
                    self.bump();
                    self.leading_space = true;
                }
                c if c.is_whitespace() => {
                    self.bump();
                    self.leading_space = true;
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    self.leading_space = true;
                }
                '/' if self.peek_at(1) == Some('*') => {
                    let start = self.here();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(LexError::Unterminated { what: "comment", pos: start });
                            }
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                    self.leading_space = true;
                }
                _ => break,
            }
        }
        Ok(())
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_trivia()?;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };
        let pos = self.here();
        let tok = if is_ident_start(c) {
            let word = self.take_while(is_ident_continue);
            match self.peek() {
                Some('\'') if is_literal_prefix(&word) => {
                    let body = self.quoted('\'', "character literal", pos.clone())?;
                    Token::new(TokenKind::CharLiteral, format!("{}{}", word, body), pos)
                }
                Some('"') if is_literal_prefix(&word) => {
                    let body = self.quoted('"', "string literal", pos.clone())?;
                    Token::new(TokenKind::StringLiteral, format!("{}{}", word, body), pos)
                }
                _ => Token::word(word, pos),
            }
        } else if c.is_ascii_digit() || (c == '.' && self.peek_at(1).map_or(false, |d| d.is_ascii_digit())) {
            self.number(pos)
        } else if c == '\'' {
            let body = self.quoted('\'', "character literal", pos.clone())?;
            Token::new(TokenKind::CharLiteral, body, pos)
        } else if c == '"' {
            let body = self.quoted('"', "string literal", pos.clone())?;
            Token::new(TokenKind::StringLiteral, body, pos)
        } else {
            let punct = PUNCTUATORS
                .iter()
                .find(|p| p.chars().enumerate().all(|(i, pc)| self.peek_at(i) == Some(pc)))
                .ok_or(LexError::UnexpectedChar { ch: c, pos: pos.clone() })?;
            for _ in 0..punct.chars().count() {
                self.bump();
            }
            Token::new(TokenKind::Punct, *punct, pos)
        };
        let tok = tok
            .with_line_start(self.line_start)
            .with_leading_space(self.leading_space);
        self.line_start = false;
        self.leading_space = false;
        Ok(Some(tok))
    }

    fn take_while(&mut self, pred: fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn number(&mut self, pos: SourcePos) -> Token {
        let mut text = String::new();
        let hex = self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X'));
        while let Some(c) = self.peek() {
            let exponent = if hex { matches!(c, 'p' | 'P') } else { matches!(c, 'e' | 'E') };
            if exponent && matches!(self.peek_at(1), Some('+') | Some('-')) {
                text.push(c);
                self.bump();
                if let Some(sign) = self.bump() {
                    text.push(sign);
                }
                continue;
            }
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '\'' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let float = text.contains('.')
            || (!hex && text.contains(|c| matches!(c, 'e' | 'E')))
            || (hex && text.contains(|c| matches!(c, 'p' | 'P')));
        let kind = if float { TokenKind::FloatLiteral } else { TokenKind::IntLiteral };
        Token::new(kind, text, pos)
    }

    fn quoted(&mut self, quote: char, what: &'static str, pos: SourcePos) -> Result<String, LexError> {
        let mut out = String::new();
        if let Some(c) = self.bump() {
            out.push(c);
        }
        loop {
            match self.peek() {
                None | Some('\n') => return Err(LexError::Unterminated { what, pos }),
                Some('\\') => {
                    out.push('\\');
                    self.bump();
                    if let Some(c) = self.bump() {
                        out.push(c);
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                    if c == quote {
                        return Ok(out);
                    }
                }
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_literal_prefix(word: &str) -> bool {
    matches!(word, "L" | "u" | "U" | "u8")
}

/// Tokenizes `text`, stopping at the first lexical error.
pub fn tokenize(file: &str, text: &str) -> Result<Vec<Token>, LexError> {
    let mut scanner = Scanner::new(file, text);
    let mut tokens = Vec::new();
    while let Some(tok) = scanner.next_token()? {
        tokens.push(tok);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<String> {
        tokenize("t.h", src).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_declarator_tokens() {
        assert_eq!(
            texts("int (*(*foo1)(void))[3];"),
            vec!["int", "(", "*", "(", "*", "foo1", ")", "(", "void", ")", ")", "[", "3", "]", ";"]
        );
    }

    #[test]
    fn test_longest_punctuator() {
        assert_eq!(texts("a<<=b->c::d...>>"), vec!["a", "<<=", "b", "->", "c", "::", "d", "...", ">>"]);
    }

    #[test]
    fn test_comments_and_line_flags() {
        let toks = tokenize("t.h", "int a; // trailing\n/* block\n comment */ #define X 1").unwrap();
        let hash = toks.iter().find(|t| t.is_punct("#")).unwrap();
        assert!(hash.line_start);
        assert!(hash.leading_space);
        let int = &toks[0];
        assert!(int.line_start);
        assert_eq!(toks.len(), 7);
    }

    #[test]
    fn test_line_continuation() {
        let toks = tokenize("t.h", "#define A \\\n  42\nint").unwrap();
        let value = toks.iter().find(|t| t.text == "42").unwrap();
        assert!(!value.line_start);
        assert!(toks.last().unwrap().line_start);
    }

    #[test]
    fn test_literals() {
        let toks = tokenize("t.h", "0x10 1.5e-3 'h' L\"wide\" \"a\\\"b\"").unwrap();
        let kinds: Vec<TokenKind> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::IntLiteral,
                TokenKind::FloatLiteral,
                TokenKind::CharLiteral,
                TokenKind::StringLiteral,
                TokenKind::StringLiteral
            ]
        );
        assert_eq!(toks[4].text, "\"a\\\"b\"");
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("t.h", "int `x;").unwrap_err();
        assert!(matches!(err, LexError::UnexpectedChar { ch: '`', .. }));
        let (tokens, errors) = Scanner::new("t.h", "int `x;").scan_all();
        assert_eq!(errors.len(), 1);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_positions() {
        let toks = tokenize("t.h", "int\n  foo;").unwrap();
        assert_eq!(toks[1].pos.line, 2);
        assert_eq!(toks[1].pos.column, 3);
    }
}
