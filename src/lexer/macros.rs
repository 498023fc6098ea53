// Tue Oct 13 2026 - Alex

use crate::lexer::error::PreprocessError;
use crate::lexer::scanner::tokenize;
use crate::lexer::token::{spell, SourcePos, Token, TokenKind};
use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct MacroDefinition {
    pub name: String,
    /// `None` for object-like macros.
    pub params: Option<Vec<String>>,
    pub variadic: bool,
    pub body: Vec<Token>,
    /// Where the macro was defined; `None` for seeded macros.
    pub pos: Option<SourcePos>,
}

impl MacroDefinition {
    pub fn object(name: &str, body: Vec<Token>) -> Self {
        Self {
            name: name.to_string(),
            params: None,
            variadic: false,
            body,
            pos: None,
        }
    }

    pub fn function(name: &str, params: Vec<String>, variadic: bool, body: Vec<Token>) -> Self {
        Self {
            name: name.to_string(),
            params: Some(params),
            variadic,
            body,
            pos: None,
        }
    }

    pub fn with_pos(mut self, pos: SourcePos) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Parses the tokens following `#define` on a directive line.
    pub fn parse(tokens: &[Token], directive_pos: &SourcePos) -> Result<Self, PreprocessError> {
        let malformed = || PreprocessError::MalformedDirective {
            directive: "define".to_string(),
            pos: directive_pos.clone(),
        };
        let name_tok = tokens.first().filter(|t| t.is_word()).ok_or_else(malformed)?;
        let name = name_tok.text.clone();

        let function_like = tokens.get(1).map_or(false, |t| t.is_punct("(") && !t.leading_space);
        if !function_like {
            return Ok(Self::object(&name, tokens[1..].to_vec()).with_pos(name_tok.pos.clone()));
        }

        let mut params = Vec::new();
        let mut variadic = false;
        let mut i = 2;
        loop {
            let tok = tokens.get(i).ok_or_else(malformed)?;
            if tok.is_punct(")") {
                i += 1;
                break;
            }
            if tok.is_punct("...") {
                variadic = true;
            } else if tok.is_word() {
                // GNU named variadic parameter: `args...`
                if tokens.get(i + 1).map_or(false, |t| t.is_punct("...")) {
                    variadic = true;
                    params.push(tok.text.clone());
                    i += 1;
                } else {
                    params.push(tok.text.clone());
                }
            } else if !tok.is_punct(",") {
                return Err(malformed());
            }
            i += 1;
        }
        let body = tokens[i..].to_vec();
        Ok(Self::function(&name, params, variadic, body).with_pos(name_tok.pos.clone()))
    }

    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    fn param_index(&self, name: &str) -> Option<usize> {
        let params = self.params.as_ref()?;
        if let Some(i) = params.iter().position(|p| p == name) {
            return Some(i);
        }
        if self.variadic && name == "__VA_ARGS__" {
            return Some(params.len());
        }
        None
    }

    fn arity(&self) -> usize {
        self.params.as_ref().map_or(0, |p| p.len())
    }

    pub fn replacement_text(&self) -> String {
        spell(&self.body)
    }
}

/// Macro definitions of one translation unit. Cloned per unit from the seed
/// table so that units never observe each other's `#define`s.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: IndexMap<String, Arc<MacroDefinition>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `NAME`, `NAME=VALUE` or `NAME(args)=VALUE` strings.
    pub fn from_defines(defines: &[String]) -> Result<Self, PreprocessError> {
        let mut table = Self::new();
        for define in defines {
            table.define_str(define)?;
        }
        Ok(table)
    }

    pub fn define_str(&mut self, define: &str) -> Result<(), PreprocessError> {
        let text = match define.split_once('=') {
            Some((name, value)) => format!("{} {}", name, value),
            None => format!("{} 1", define),
        };
        let tokens = tokenize("<command line>", &text)?;
        let mut def = MacroDefinition::parse(&tokens, &SourcePos::builtin())?;
        def.pos = None;
        self.define(def);
        Ok(())
    }

    pub fn define(&mut self, def: MacroDefinition) {
        self.macros.insert(def.name.clone(), Arc::new(def));
    }

    pub fn undefine(&mut self, name: &str) -> bool {
        self.macros.shift_remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<MacroDefinition>> {
        self.macros.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MacroDefinition>> {
        self.macros.values()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

/// Macro expansion over a fixed table.
///
/// Arguments are fully expanded before substitution, except where they are
/// operands of `#` or `##`. The substituted body is rescanned with the macro
/// marked active; meeting an active macro again is reported as
/// `MacroRecursion` unless self-references are allowed, in which case the
/// name is left unexpanded as the C standard prescribes.
pub struct Expander<'a> {
    table: &'a MacroTable,
    max_depth: usize,
    allow_self_reference: bool,
}

impl<'a> Expander<'a> {
    pub fn new(table: &'a MacroTable, max_depth: usize) -> Self {
        Self {
            table,
            max_depth,
            allow_self_reference: false,
        }
    }

    pub fn with_self_reference(mut self, allow: bool) -> Self {
        self.allow_self_reference = allow;
        self
    }

    pub fn expand(&self, tokens: Vec<Token>) -> Result<Vec<Token>, PreprocessError> {
        let mut active = Vec::new();
        self.expand_list(tokens, &mut active, 0)
    }

    /// True when `tok` would start a macro invocation.
    pub fn is_macro(&self, tok: &Token) -> bool {
        tok.is_word() && (self.table.is_defined(&tok.text) || is_dynamic_builtin(&tok.text))
    }

    pub fn is_function_macro(&self, tok: &Token) -> bool {
        tok.is_word()
            && self
                .table
                .get(&tok.text)
                .map_or(false, |d| d.is_function_like())
    }

    fn expand_list(
        &self,
        tokens: Vec<Token>,
        active: &mut Vec<String>,
        depth: usize,
    ) -> Result<Vec<Token>, PreprocessError> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            if !tok.is_word() {
                out.push(tok.clone());
                i += 1;
                continue;
            }
            if let Some(builtin) = dynamic_builtin(tok) {
                out.push(builtin);
                i += 1;
                continue;
            }
            let def = match self.table.get(&tok.text) {
                Some(def) => def.clone(),
                None => {
                    out.push(tok.clone());
                    i += 1;
                    continue;
                }
            };
            if active.iter().any(|a| a == &def.name) {
                if self.allow_self_reference {
                    out.push(tok.clone());
                    i += 1;
                    continue;
                }
                return Err(PreprocessError::MacroRecursion {
                    name: def.name.clone(),
                    pos: tok.pos.clone(),
                });
            }
            if depth >= self.max_depth {
                return Err(PreprocessError::MacroRecursion {
                    name: def.name.clone(),
                    pos: tok.pos.clone(),
                });
            }

            let (args, consumed) = if def.is_function_like() {
                match collect_args(&tokens[i + 1..]) {
                    Some((args, consumed)) => (args, consumed),
                    None => {
                        // A function-like macro name without arguments is an
                        // ordinary identifier.
                        out.push(tok.clone());
                        i += 1;
                        continue;
                    }
                }
            } else {
                (Vec::new(), 0)
            };

            let substituted = self.substitute(&def, args, tok, active, depth)?;
            active.push(def.name.clone());
            let rescanned = self.expand_list(substituted, active, depth + 1);
            active.pop();
            let mut rescanned = rescanned?;
            if let Some(first) = rescanned.first_mut() {
                first.leading_space = tok.leading_space;
                first.line_start = tok.line_start;
            }
            out.extend(rescanned);
            i += 1 + consumed;
        }
        Ok(out)
    }

    fn substitute(
        &self,
        def: &MacroDefinition,
        args: Vec<Vec<Token>>,
        site: &Token,
        active: &mut Vec<String>,
        depth: usize,
    ) -> Result<Vec<Token>, PreprocessError> {
        let args = if def.is_function_like() {
            normalize_args(def, args, site)?
        } else {
            args
        };
        let body = &def.body;
        let mut pieces: Vec<Token> = Vec::with_capacity(body.len());
        let mut j = 0;
        while j < body.len() {
            let tok = &body[j];
            if def.is_function_like() && tok.is_punct("#") {
                if let Some(idx) = body.get(j + 1).and_then(|n| def.param_index(&n.text)) {
                    let mut lit = stringify(&args[idx], site.pos.clone());
                    lit.leading_space = tok.leading_space;
                    pieces.push(lit);
                    j += 2;
                    continue;
                }
            }
            match def.param_index(&tok.text).filter(|_| tok.is_word()) {
                Some(idx) => {
                    let pasted = (j > 0 && body[j - 1].is_punct("##"))
                        || body.get(j + 1).map_or(false, |n| n.is_punct("##"));
                    let mut replacement = if pasted {
                        args[idx].clone()
                    } else {
                        self.expand_list(args[idx].clone(), active, depth + 1)?
                    };
                    if replacement.is_empty() {
                        replacement.push(Token::new(TokenKind::Placemarker, "", site.pos.clone()));
                    }
                    replacement[0].leading_space = tok.leading_space;
                    for t in replacement.iter_mut() {
                        t.line_start = false;
                    }
                    pieces.extend(replacement);
                }
                None => {
                    let mut copy = tok.clone();
                    copy.pos = site.pos.clone();
                    copy.line_start = false;
                    pieces.push(copy);
                }
            }
            j += 1;
        }
        Ok(paste(pieces))
    }
}

fn is_dynamic_builtin(name: &str) -> bool {
    matches!(name, "__LINE__" | "__FILE__")
}

fn dynamic_builtin(tok: &Token) -> Option<Token> {
    match tok.text.as_str() {
        "__LINE__" => Some(Token::new(TokenKind::IntLiteral, tok.pos.line.to_string(), tok.pos.clone())),
        "__FILE__" => Some(Token::new(
            TokenKind::StringLiteral,
            format!("\"{}\"", tok.pos.file),
            tok.pos.clone(),
        )),
        _ => None,
    }
    .map(|t| t.with_leading_space(tok.leading_space))
}

/// Splits the argument list starting at `tokens[0] == "("`. Returns the raw
/// arguments and the number of tokens consumed, or `None` when `tokens` does
/// not start with a complete parenthesized list.
pub fn collect_args(tokens: &[Token]) -> Option<(Vec<Vec<Token>>, usize)> {
    if !tokens.first()?.is_punct("(") {
        return None;
    }
    let mut args = vec![Vec::new()];
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(1) {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            if depth == 0 {
                return Some((args, i + 1));
            }
            depth -= 1;
        } else if tok.is_punct(",") && depth == 0 {
            args.push(Vec::new());
            continue;
        }
        if let Some(last) = args.last_mut() {
            last.push(tok.clone());
        }
    }
    None
}

fn normalize_args(
    def: &MacroDefinition,
    mut args: Vec<Vec<Token>>,
    site: &Token,
) -> Result<Vec<Vec<Token>>, PreprocessError> {
    let arity = def.arity();
    // `F()` passes one empty argument, which is zero arguments for `F()`.
    if arity == 0 && args.len() == 1 && args[0].is_empty() && !def.variadic {
        return Ok(Vec::new());
    }
    if def.variadic {
        if args.len() < arity {
            if args.len() + 1 == arity {
                args.push(Vec::new());
            } else {
                return Err(arity_error(def, args.len(), site));
            }
        }
        let extra: Vec<Vec<Token>> = args.split_off(arity.min(args.len()));
        let mut rest = Vec::new();
        for (k, mut arg) in extra.into_iter().enumerate() {
            if k > 0 {
                rest.push(Token::new(TokenKind::Punct, ",", site.pos.clone()));
                if let Some(first) = arg.first_mut() {
                    first.leading_space = true;
                }
            }
            rest.extend(arg);
        }
        args.push(rest);
        return Ok(args);
    }
    if args.len() != arity {
        return Err(arity_error(def, args.len(), site));
    }
    Ok(args)
}

fn arity_error(def: &MacroDefinition, found: usize, site: &Token) -> PreprocessError {
    PreprocessError::MacroArity {
        name: def.name.clone(),
        expected: def.arity(),
        found,
        pos: site.pos.clone(),
    }
}

fn stringify(arg: &[Token], pos: SourcePos) -> Token {
    let mut text = String::from("\"");
    for (i, tok) in arg.iter().enumerate() {
        if i > 0 && tok.leading_space {
            text.push(' ');
        }
        if matches!(tok.kind, TokenKind::StringLiteral | TokenKind::CharLiteral) {
            for c in tok.text.chars() {
                if c == '"' || c == '\\' {
                    text.push('\\');
                }
                text.push(c);
            }
        } else {
            text.push_str(&tok.text);
        }
    }
    text.push('"');
    Token::new(TokenKind::StringLiteral, text, pos)
}

/// Applies `##` operators and drops placemarkers.
fn paste(pieces: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(pieces.len());
    let mut iter = pieces.into_iter().peekable();
    while let Some(tok) = iter.next() {
        if !tok.is_punct("##") || out.is_empty() {
            out.push(tok);
            continue;
        }
        let right = match iter.next() {
            Some(r) => r,
            None => break,
        };
        let left = match out.pop() {
            Some(l) => l,
            None => continue,
        };
        match (left.kind, right.kind) {
            (TokenKind::Placemarker, _) => out.push(right),
            // GNU comma elision for an empty `__VA_ARGS__`.
            (_, TokenKind::Placemarker) if left.is_punct(",") => {}
            (_, TokenKind::Placemarker) => out.push(left),
            _ => {
                let text = format!("{}{}", left.text, right.text);
                let mut joined = match tokenize(&left.pos.file, &text) {
                    Ok(mut toks) if toks.len() == 1 => toks.remove(0),
                    _ => Token::word(text, left.pos.clone()),
                };
                joined.pos = left.pos.clone();
                joined.leading_space = left.leading_space;
                joined.line_start = false;
                out.push(joined);
            }
        }
    }
    out.retain(|t| t.kind != TokenKind::Placemarker);
    out
}
