// Wed Oct 14 2026 - Alex

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::lexer::error::{EvalError, PreprocessError};
use crate::lexer::eval::evaluate;
use crate::lexer::include::{IncludeKind, IncludeResolver};
use crate::lexer::macros::{Expander, MacroDefinition, MacroTable};
use crate::lexer::scanner::Scanner;
use crate::lexer::token::{spell, SourcePos, Token, TokenKind};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// What an identifier that is not a macro means inside `#if`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionalPolicy {
    /// Report `UndefinedMacroInConditional` and skip the group.
    Strict,
    /// Skip the group silently.
    FalseBranch,
    /// Replace the identifier with `0`.
    ZeroValue,
}

impl Default for ConditionalPolicy {
    fn default() -> Self {
        ConditionalPolicy::FalseBranch
    }
}

#[derive(Debug, Clone)]
pub struct PreprocessorOptions {
    pub conditional_policy: ConditionalPolicy,
    pub max_expansion_depth: usize,
    pub max_include_depth: usize,
    pub strict_includes: bool,
    pub allow_self_reference: bool,
}

impl Default for PreprocessorOptions {
    fn default() -> Self {
        Self {
            conditional_policy: ConditionalPolicy::default(),
            max_expansion_depth: 256,
            max_include_depth: 64,
            strict_includes: false,
            allow_self_reference: false,
        }
    }
}

struct SourceFrame {
    name: Arc<str>,
    tokens: Vec<Token>,
    pos: usize,
}

#[derive(Debug)]
struct Conditional {
    parent_active: bool,
    taken: bool,
    active: bool,
    seen_else: bool,
    pos: SourcePos,
}

/// Lazy token stream of one translation unit with directives applied and
/// macros expanded.
pub struct Preprocessor<'r> {
    macros: MacroTable,
    options: PreprocessorOptions,
    resolver: Option<&'r dyn IncludeResolver>,
    frames: Vec<SourceFrame>,
    conditions: Vec<Conditional>,
    pending: VecDeque<Token>,
    queued_errors: VecDeque<PreprocessError>,
    once: HashSet<String>,
    warnings: Vec<Diagnostic>,
    includes: Vec<String>,
    failed: bool,
    finished: bool,
}

impl<'r> Preprocessor<'r> {
    pub fn new(name: &str, text: &str, macros: MacroTable, options: PreprocessorOptions) -> Self {
        let mut pp = Self {
            macros,
            options,
            resolver: None,
            frames: Vec::new(),
            conditions: Vec::new(),
            pending: VecDeque::new(),
            queued_errors: VecDeque::new(),
            once: HashSet::new(),
            warnings: Vec::new(),
            includes: Vec::new(),
            failed: false,
            finished: false,
        };
        pp.push_source(name, text);
        pp
    }

    pub fn with_resolver(mut self, resolver: &'r dyn IncludeResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Splices an already tokenized stream in front of the remaining input.
    pub fn push_tokens(&mut self, name: &str, tokens: Vec<Token>) {
        self.frames.push(SourceFrame {
            name: Arc::from(name),
            tokens,
            pos: 0,
        });
    }

    fn push_source(&mut self, name: &str, text: &str) {
        let (tokens, errors) = Scanner::new(name, text).scan_all();
        self.queued_errors.extend(errors.into_iter().map(PreprocessError::from));
        self.push_tokens(name, tokens);
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Files spliced in by `#include`, in inclusion order.
    pub fn included_files(&self) -> &[String] {
        &self.includes
    }

    pub fn into_parts(self) -> (MacroTable, Vec<Diagnostic>) {
        (self.macros, self.warnings)
    }

    fn active(&self) -> bool {
        self.conditions.last().map_or(true, |c| c.active)
    }

    fn current_file(&self) -> String {
        self.frames.last().map(|f| f.name.to_string()).unwrap_or_default()
    }

    fn next_raw(&mut self) -> Option<Token> {
        loop {
            let frame = self.frames.last_mut()?;
            if let Some(tok) = frame.tokens.get(frame.pos) {
                let tok = tok.clone();
                frame.pos += 1;
                return Some(tok);
            }
            self.frames.pop();
        }
    }

    fn peek_raw(&self) -> Option<&Token> {
        let frame = self.frames.last()?;
        frame.tokens.get(frame.pos)
    }

    /// Remaining tokens of the current directive line.
    fn take_line(&mut self) -> Vec<Token> {
        let mut line = Vec::new();
        while let Some(tok) = self.peek_raw() {
            if tok.line_start {
                break;
            }
            line.push(tok.clone());
            if let Some(frame) = self.frames.last_mut() {
                frame.pos += 1;
            }
        }
        line
    }

    fn expander(&self) -> Expander<'_> {
        Expander::new(&self.macros, self.options.max_expansion_depth)
            .with_self_reference(self.options.allow_self_reference)
    }

    /// Gathers `name ( args )` from the current file and expands it.
    fn expand_invocation(&mut self, name: Token) -> Result<Vec<Token>, PreprocessError> {
        let function_like = self
            .macros
            .get(&name.text)
            .map_or(false, |d| d.is_function_like());
        let mut call = vec![name.clone()];
        if function_like {
            if !self.peek_raw().map_or(false, |t| t.is_punct("(")) {
                return Ok(call);
            }
            let mut depth = 0usize;
            loop {
                let tok = self.next_raw().ok_or_else(|| PreprocessError::UnterminatedMacroCall {
                    name: name.text.clone(),
                    pos: name.pos.clone(),
                })?;
                let closes = tok.is_punct(")") && depth == 1;
                if tok.is_punct("(") {
                    depth += 1;
                } else if tok.is_punct(")") {
                    depth -= 1;
                }
                call.push(tok);
                if closes {
                    break;
                }
            }
        }
        self.expander().expand(call)
    }

    fn directive(&mut self, hash: Token) -> Result<(), PreprocessError> {
        let line = self.take_line();
        let name = match line.first() {
            Some(t) if t.is_word() => t.text.clone(),
            Some(_) => {
                return Err(PreprocessError::MalformedDirective {
                    directive: spell(&line),
                    pos: hash.pos,
                })
            }
            None => return Ok(()),
        };
        let args = &line[1..];
        let pos = line[0].pos.clone();

        match name.as_str() {
            "if" | "ifdef" | "ifndef" => return self.open_conditional(&name, args, pos),
            "elif" => return self.elif(args, pos),
            "else" => return self.else_branch(pos),
            "endif" => {
                return match self.conditions.pop() {
                    Some(_) => Ok(()),
                    None => Err(PreprocessError::UnbalancedConditional {
                        directive: name,
                        pos,
                    }),
                }
            }
            _ => {}
        }
        if !self.active() {
            return Ok(());
        }

        match name.as_str() {
            "define" => {
                let def = MacroDefinition::parse(args, &pos)?;
                debug!("#define {}", def.name);
                if let Some(previous) = self.macros.get(&def.name) {
                    if previous.body != def.body {
                        debug!("{}: redefinition of macro '{}'", pos, def.name);
                    }
                }
                self.macros.define(def);
            }
            "undef" => match args.first() {
                Some(t) if t.is_word() => {
                    self.macros.undefine(&t.text);
                }
                _ => {
                    return Err(PreprocessError::MalformedDirective {
                        directive: name,
                        pos,
                    })
                }
            },
            "include" | "include_next" | "import" => self.include(args, pos)?,
            "pragma" => {
                if args.first().map_or(false, |t| t.text == "once") {
                    let file = self.current_file();
                    self.once.insert(file);
                }
            }
            "error" => {
                return Err(PreprocessError::ErrorDirective {
                    message: spell(args),
                    pos,
                })
            }
            "warning" => {
                let message = spell(args);
                warn!("{}: #warning {}", pos, message);
                self.warnings.push(Diagnostic::warning(
                    DiagnosticKind::Preprocess,
                    format!("{}: #warning {}", pos, message),
                    Some(pos),
                ));
            }
            "line" | "ident" | "sccs" | "assert" | "unassert" => {}
            other => debug!("{}: ignoring unknown directive #{}", pos, other),
        }
        Ok(())
    }

    fn open_conditional(&mut self, name: &str, args: &[Token], pos: SourcePos) -> Result<(), PreprocessError> {
        let parent_active = self.active();
        let mut error = None;
        let value = if !parent_active {
            false
        } else if name == "if" {
            match self.eval_condition(args, &pos) {
                Ok(v) => v,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error = Some(e);
                    false
                }
            }
        } else {
            let defined = match args.first() {
                Some(t) if t.is_word() => self.macros.is_defined(&t.text),
                _ => {
                    error = Some(PreprocessError::MalformedDirective {
                        directive: name.to_string(),
                        pos: pos.clone(),
                    });
                    false
                }
            };
            if name == "ifdef" {
                defined
            } else {
                !defined
            }
        };
        self.conditions.push(Conditional {
            parent_active,
            taken: value,
            active: parent_active && value,
            seen_else: false,
            pos,
        });
        error.map_or(Ok(()), Err)
    }

    fn elif(&mut self, args: &[Token], pos: SourcePos) -> Result<(), PreprocessError> {
        let (parent_active, taken, seen_else) = match self.conditions.last() {
            Some(c) => (c.parent_active, c.taken, c.seen_else),
            None => {
                return Err(PreprocessError::UnbalancedConditional {
                    directive: "elif".to_string(),
                    pos,
                })
            }
        };
        if seen_else {
            return Err(PreprocessError::UnbalancedConditional {
                directive: "elif".to_string(),
                pos,
            });
        }
        let mut error = None;
        let value = if !parent_active || taken {
            false
        } else {
            match self.eval_condition(args, &pos) {
                Ok(v) => v,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error = Some(e);
                    false
                }
            }
        };
        if let Some(top) = self.conditions.last_mut() {
            top.active = value;
            top.taken |= value;
        }
        error.map_or(Ok(()), Err)
    }

    fn else_branch(&mut self, pos: SourcePos) -> Result<(), PreprocessError> {
        match self.conditions.last_mut() {
            Some(top) if !top.seen_else => {
                top.active = top.parent_active && !top.taken;
                top.taken = true;
                top.seen_else = true;
                Ok(())
            }
            _ => Err(PreprocessError::UnbalancedConditional {
                directive: "else".to_string(),
                pos,
            }),
        }
    }

    fn eval_condition(&self, args: &[Token], pos: &SourcePos) -> Result<bool, PreprocessError> {
        let mut replaced = Vec::with_capacity(args.len());
        let mut i = 0;
        while i < args.len() {
            let tok = &args[i];
            if tok.is_identifier() && tok.text == "defined" {
                let (name, used) = match args.get(i + 1) {
                    Some(p) if p.is_punct("(") => match (args.get(i + 2), args.get(i + 3)) {
                        (Some(n), Some(close)) if n.is_word() && close.is_punct(")") => (n, 4),
                        _ => {
                            return Err(PreprocessError::MalformedDirective {
                                directive: "if".to_string(),
                                pos: pos.clone(),
                            })
                        }
                    },
                    Some(n) if n.is_word() => (n, 2),
                    _ => {
                        return Err(PreprocessError::MalformedDirective {
                            directive: "if".to_string(),
                            pos: pos.clone(),
                        })
                    }
                };
                let value = if self.macros.is_defined(&name.text) { "1" } else { "0" };
                replaced.push(Token::new(TokenKind::IntLiteral, value, tok.pos.clone()));
                i += used;
                continue;
            }
            replaced.push(tok.clone());
            i += 1;
        }

        let expanded = self.expander().expand(replaced)?;
        let policy = self.options.conditional_policy;
        let result = evaluate(&expanded, |name, at| match policy {
            ConditionalPolicy::ZeroValue => Ok(0),
            _ => Err(EvalError::Unresolved {
                name: name.to_string(),
                pos: at.clone(),
            }),
        });
        match result {
            Ok(v) => Ok(v != 0),
            Err(EvalError::Unresolved { name, pos }) => match policy {
                ConditionalPolicy::Strict => Err(PreprocessError::UndefinedMacroInConditional { name, pos }),
                _ => {
                    debug!("{}: '{}' is not defined, taking the false branch", pos, name);
                    Ok(false)
                }
            },
            Err(source) => Err(PreprocessError::InvalidCondition {
                source,
                pos: pos.clone(),
            }),
        }
    }

    fn include(&mut self, args: &[Token], pos: SourcePos) -> Result<(), PreprocessError> {
        let args = if args.first().map_or(false, |t| t.is_word()) {
            self.expander().expand(args.to_vec())?
        } else {
            args.to_vec()
        };
        let malformed = || PreprocessError::MalformedDirective {
            directive: "include".to_string(),
            pos: pos.clone(),
        };
        let (path, kind) = match args.first() {
            Some(t) if t.kind == TokenKind::StringLiteral => {
                (t.text.trim_matches('"').to_string(), IncludeKind::Quoted)
            }
            Some(t) if t.is_punct("<") => {
                let close = args.iter().position(|t| t.is_punct(">")).ok_or_else(malformed)?;
                let path: String = args[1..close].iter().map(|t| t.text.as_str()).collect();
                (path, IncludeKind::Angled)
            }
            _ => return Err(malformed()),
        };

        if self.frames.len() > self.options.max_include_depth {
            return Err(PreprocessError::IncludeDepth {
                limit: self.options.max_include_depth,
                pos,
            });
        }
        let includer = self.current_file();
        let file = self.resolver.and_then(|r| r.resolve(&path, kind, &includer));
        let file = match file {
            Some(f) => f,
            None => {
                if self.options.strict_includes {
                    return Err(PreprocessError::IncludeNotFound { path, pos });
                }
                warn!("{}: include file '{}' not found, skipping", pos, path);
                self.warnings.push(Diagnostic::warning(
                    DiagnosticKind::IncludeNotFound,
                    format!("{}: include file '{}' not found", pos, path),
                    Some(pos),
                ));
                return Ok(());
            }
        };
        if self.once.contains(&file.name) {
            debug!("skipping {} (#pragma once)", file.name);
            return Ok(());
        }
        debug!("including {}", file.name);
        self.includes.push(file.name.clone());
        let text = file.text.clone();
        self.push_source(&file.name, &text);
        Ok(())
    }

    fn finish(&mut self) -> Option<PreprocessError> {
        if self.finished {
            return None;
        }
        self.finished = true;
        let open = self.conditions.drain(..).next()?;
        Some(PreprocessError::UnterminatedConditional { pos: open.pos })
    }
}

impl<'r> Iterator for Preprocessor<'r> {
    type Item = Result<Token, PreprocessError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(e) = self.queued_errors.pop_front() {
                return Some(Err(e));
            }
            if let Some(tok) = self.pending.pop_front() {
                return Some(Ok(tok));
            }
            if self.failed {
                return None;
            }
            let tok = match self.next_raw() {
                Some(t) => t,
                None => return self.finish().map(Err),
            };
            if tok.line_start && tok.is_punct("#") {
                if let Err(e) = self.directive(tok) {
                    if e.is_fatal() {
                        self.failed = true;
                    }
                    return Some(Err(e));
                }
                continue;
            }
            if !self.active() {
                continue;
            }
            if self.expander().is_macro(&tok) {
                let mut next = Some(tok);
                while let Some(name) = next.take() {
                    match self.expand_invocation(name) {
                        Ok(mut tokens) => {
                            // An expansion ending in a function-like macro name
                            // takes its arguments from the following source.
                            let trailing_call = tokens.last().map_or(false, |t| {
                                self.expander().is_function_macro(t)
                            }) && self.peek_raw().map_or(false, |t| t.is_punct("("));
                            if trailing_call {
                                next = tokens.pop();
                            }
                            self.pending.extend(tokens);
                        }
                        Err(e) => {
                            if e.is_fatal() {
                                self.failed = true;
                            }
                            return Some(Err(e));
                        }
                    }
                }
                continue;
            }
            return Some(Ok(tok));
        }
    }
}

/// Runs the preprocessor to completion, splitting tokens from errors.
pub fn preprocess_all(pp: Preprocessor<'_>) -> (Vec<Token>, Vec<PreprocessError>, MacroTable, Vec<Diagnostic>) {
    let mut pp = pp;
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    for item in pp.by_ref() {
        match item {
            Ok(tok) => tokens.push(tok),
            Err(e) => errors.push(e),
        }
    }
    let (macros, warnings) = pp.into_parts();
    (tokens, errors, macros, warnings)
}
