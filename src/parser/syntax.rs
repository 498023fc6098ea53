// Wed Oct 14 2026 - Alex

use crate::lexer::{spell, SourcePos, Token, TokenKind};
use crate::parser::declarator::{simple_name, DeclSpec, Declarator, Defined, SpecFlags};
use crate::parser::{Language, ParseError, ParseOutput};
use crate::template::{PartialSpecialization, TemplateBody, TemplateDeclaration, TemplateParam};
use crate::types::{
    scope_of, scoped_candidates, template_id, AccessSpecifier, BaseClassEdge, Declaration, EnumDef, Enumerator,
    EnumeratorDecl, FunctionDecl, LanguageLinkage, MemberDescriptor, MethodDecl, MethodFlags, MethodKind,
    NameLinkage, QualType, RecordDef, RecordKind, TemplateArg, TypeDescriptor, TypedefDecl, VariableDecl,
};
use log::{debug, warn};
use std::collections::HashMap;

/// What the parser knows a name to be, enough to tell types from values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Known {
    Typedef { function: bool },
    Record(RecordKind),
    Enum,
    Template,
}

#[derive(Debug, Clone)]
pub(super) struct ScopeEntry {
    pub qualified: String,
    pub simple: String,
    pub is_class: bool,
}

/// Recursive-descent parser over a preprocessed token stream. Errors are
/// collected; the parser resynchronizes at the next declaration.
pub struct Parser {
    pub(super) tokens: Vec<Token>,
    pub(super) pos: usize,
    pub(super) language: Language,
    pub(super) scope: Vec<ScopeEntry>,
    pub(super) linkage: Option<LanguageLinkage>,
    pub(super) templates: Vec<Vec<TemplateParam>>,
    pub(super) names: HashMap<String, Known>,
    pub(super) tags: HashMap<String, Known>,
    pub(super) constants: HashMap<String, i64>,
    pub(super) decls: Vec<Declaration>,
    pub(super) errors: Vec<ParseError>,
    eof: SourcePos,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, language: Language) -> Self {
        let eof = tokens.last().map(|t| t.pos.clone()).unwrap_or_else(SourcePos::builtin);
        Self {
            tokens,
            pos: 0,
            language,
            scope: Vec::new(),
            linkage: None,
            templates: Vec::new(),
            names: HashMap::new(),
            tags: HashMap::new(),
            constants: HashMap::new(),
            decls: Vec::new(),
            errors: Vec::new(),
            eof,
        }
    }

    /// Makes integer constants defined outside the token stream (macros,
    /// earlier units) usable in array bounds and template arguments.
    pub fn with_constants(mut self, constants: impl IntoIterator<Item = (String, i64)>) -> Self {
        self.constants.extend(constants);
        self
    }

    pub fn parse(mut self) -> ParseOutput {
        while !self.at_end() {
            let start = self.pos;
            if let Err(e) = self.declaration() {
                warn!("{}", e);
                self.errors.push(e);
                self.recover();
            }
            if self.pos == start {
                self.bump();
            }
        }
        debug!("parsed {} declarations, {} errors", self.decls.len(), self.errors.len());
        ParseOutput {
            declarations: self.decls,
            errors: self.errors,
        }
    }

    // ---- cursor ----

    pub(super) fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(super) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(super) fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub(super) fn bump(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    pub(super) fn bump_text(&mut self) -> String {
        let text = self.peek().map(|t| t.text.clone()).unwrap_or_default();
        self.bump();
        text
    }

    pub(super) fn current_pos(&self) -> SourcePos {
        self.peek().map(|t| t.pos.clone()).unwrap_or_else(|| self.eof.clone())
    }

    pub(super) fn at_punct(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    pub(super) fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn at_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word() && t.text == word)
    }

    pub(super) fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(super) fn expect_punct(&mut self, punct: &str) -> Result<(), ParseError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.error_here(&format!("'{}'", punct)))
        }
    }

    pub(super) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(t) if t.is_identifier() => Ok(self.bump_text()),
            _ => Err(self.error_here("identifier")),
        }
    }

    /// Consumes one `>`. A `>>` token is split and its second half left in
    /// place.
    pub(super) fn eat_close_angle(&mut self) -> bool {
        if self.eat_punct(">") {
            return true;
        }
        if self.at_punct(">>") {
            self.tokens[self.pos].text = ">".to_string();
            return true;
        }
        false
    }

    pub(super) fn error_here(&self, expected: &str) -> ParseError {
        let found = self
            .peek()
            .map(|t| t.text.clone())
            .unwrap_or_else(|| "end of input".to_string());
        ParseError::syntax(self.current_pos(), expected, found)
    }

    /// Consumes a bracketed group and returns the tokens inside it. Does
    /// nothing unless the cursor is on `(`, `[` or `{`.
    pub(super) fn skip_balanced(&mut self) -> Vec<Token> {
        let opens = self
            .peek()
            .is_some_and(|t| t.is_punct("(") || t.is_punct("[") || t.is_punct("{"));
        if !opens {
            return Vec::new();
        }
        self.bump();
        let mut depth = 1usize;
        let mut inner = Vec::new();
        while let Some(tok) = self.peek().cloned() {
            self.bump();
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        depth -= 1;
                        if depth == 0 {
                            return inner;
                        }
                    }
                    _ => {}
                }
            }
            inner.push(tok);
        }
        inner
    }

    /// `<...>` without interpreting it.
    fn skip_angles(&mut self) {
        let mut depth = 0i32;
        while let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "<" => depth += 1,
                    ">" => depth -= 1,
                    ">>" => depth -= 2,
                    "(" => {
                        self.skip_balanced();
                        continue;
                    }
                    ";" | "{" => return,
                    _ => {}
                }
            }
            self.bump();
            if depth <= 0 {
                return;
            }
        }
    }

    pub(super) fn skip_attributes(&mut self) {
        loop {
            let Some(tok) = self.peek() else { return };
            if tok.is_punct("[") && self.peek_at(1).is_some_and(|t| t.is_punct("[")) {
                self.skip_balanced();
                continue;
            }
            if !tok.is_word() {
                return;
            }
            match tok.text.as_str() {
                "__attribute__" | "__attribute" | "__declspec" | "alignas" | "_Alignas" | "asm" | "__asm"
                | "__asm__" => {
                    self.bump();
                    self.skip_balanced();
                }
                "__extension__" => self.bump(),
                _ => return,
            }
        }
    }

    /// Skips to the end of the current declaration: past the next `;` or
    /// past a body.
    fn skip_declaration(&mut self) {
        while let Some(tok) = self.peek() {
            if tok.is_punct(";") {
                self.bump();
                return;
            }
            if tok.is_punct("{") {
                self.skip_balanced();
                self.eat_punct(";");
                return;
            }
            if tok.is_punct("(") || tok.is_punct("[") {
                self.skip_balanced();
                continue;
            }
            if tok.is_punct("}") {
                return;
            }
            self.bump();
        }
    }

    /// Error recovery: skips the rest of a broken declaration. Stops after
    /// a `;` or a closed block, or before the `}` ending the enclosing body.
    pub(super) fn recover(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    ";" if depth == 0 => {
                        self.bump();
                        return;
                    }
                    "{" | "(" | "[" => depth += 1,
                    "}" if depth == 0 => return,
                    "}" | ")" | "]" => {
                        if depth > 0 {
                            depth -= 1;
                            let closes_block = depth == 0 && tok.text == "}";
                            if closes_block {
                                self.bump();
                                self.eat_punct(";");
                                return;
                            }
                        }
                    }
                    _ => {}
                }
            }
            self.bump();
        }
    }

    // ---- scopes and names ----

    pub(super) fn scope_prefix(&self) -> String {
        self.scope.last().map(|s| s.qualified.clone()).unwrap_or_default()
    }

    /// Scope new names are declared in. C hoists everything declared in a
    /// struct body to file scope.
    fn declaration_scope(&self) -> String {
        match self.language {
            Language::C => self
                .scope
                .iter()
                .rev()
                .find(|s| !s.is_class)
                .map(|s| s.qualified.clone())
                .unwrap_or_default(),
            Language::Cxx => self.scope_prefix(),
        }
    }

    pub(super) fn qualify(&self, name: &str) -> String {
        let name = name.trim_start_matches("::");
        let scope = self.declaration_scope();
        if scope.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", scope, name)
        }
    }

    fn push_scope(&mut self, qualified: &str, simple: &str, is_class: bool) {
        self.scope.push(ScopeEntry {
            qualified: qualified.to_string(),
            simple: simple.to_string(),
            is_class,
        });
    }

    pub(super) fn lookup_known(&self, name: &str) -> Option<(String, Known)> {
        for candidate in scoped_candidates(name, &self.scope_prefix()) {
            if let Some(known) = self.names.get(&candidate).or_else(|| self.tags.get(&candidate)) {
                return Some((candidate, *known));
            }
        }
        None
    }

    fn lookup_tag(&self, name: &str) -> Option<(String, Known)> {
        scoped_candidates(name, &self.scope_prefix())
            .into_iter()
            .find_map(|c| self.tags.get(&c).map(|k| (c, *k)))
    }

    pub(super) fn is_known_type(&self, name: &str) -> bool {
        matches!(self.template_param(name), Some((_, true))) || self.lookup_known(name).is_some()
    }

    pub(super) fn resolve_template_name(&self, name: &str) -> String {
        match self.lookup_known(name) {
            Some((qualified, Known::Template)) => qualified,
            _ => name.trim_start_matches("::").to_string(),
        }
    }

    /// Index of a template parameter of the innermost template header and
    /// whether it is a type parameter.
    pub(super) fn template_param(&self, name: &str) -> Option<(usize, bool)> {
        self.templates.iter().rev().find_map(|params| {
            params
                .iter()
                .position(|p| p.name == name)
                .map(|i| (i, params[i].is_type()))
        })
    }

    fn current_class(&self) -> Option<&ScopeEntry> {
        self.scope.last().filter(|s| s.is_class)
    }

    /// `C(` inside the body of `C`, or `C::C(` / `C::~C(` outside it.
    pub(super) fn at_constructor(&self) -> bool {
        let Some(tok) = self.peek() else { return false };
        if let Some(class) = self.current_class() {
            if tok.is_identifier() && tok.text == class.simple && self.peek_at(1).is_some_and(|t| t.is_punct("(")) {
                return true;
            }
        }
        let mut i = self.pos;
        let mut last: Option<&str> = None;
        while let (Some(a), Some(b)) = (self.tokens.get(i), self.tokens.get(i + 1)) {
            if a.is_identifier() && b.is_punct("::") {
                last = Some(&a.text);
                i += 2;
            } else {
                break;
            }
        }
        let Some(class) = last else { return false };
        let at = |k: usize| self.tokens.get(i + k);
        match at(0) {
            Some(t) if t.is_identifier() && t.text == class => at(1).is_some_and(|t| t.is_punct("(")),
            Some(t) if t.is_punct("~") => at(1).is_some_and(|t| t.text == class),
            _ => false,
        }
    }

    /// `X<...>::name` ahead of the next `(`, `;`, `{` or `=`: an out-of-class
    /// definition of a class template member.
    fn at_template_member_definition(&self) -> bool {
        let mut i = self.pos;
        while let Some(tok) = self.tokens.get(i) {
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "(" | ";" | "{" | "=" => return false,
                    ">" | ">>" => {
                        if self.tokens.get(i + 1).is_some_and(|t| t.is_punct("::")) {
                            return true;
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        false
    }

    fn is_class_member_name(&self, name: &str) -> bool {
        let scope = scope_of(name);
        !scope.is_empty()
            && (self.tags.contains_key(scope)
                || self.tags.contains_key(&self.qualify(scope))
                || matches!(self.names.get(scope), Some(Known::Template)))
    }

    fn name_linkage(&self, flags: SpecFlags) -> NameLinkage {
        if flags.contains(SpecFlags::STATIC) {
            NameLinkage::internal()
        } else {
            NameLinkage::external(self.function_linkage())
        }
    }

    fn is_function_typedef(&self, ty: &QualType) -> bool {
        match &ty.ty {
            TypeDescriptor::Typedef(name) => matches!(self.names.get(name), Some(Known::Typedef { function: true })),
            _ => false,
        }
    }

    fn declares_function(&self, ty: &QualType) -> bool {
        ty.is_function() || self.is_function_typedef(ty)
    }

    fn declared_name(&self, d: &Declarator) -> Result<String, ParseError> {
        d.name().map(str::to_string).ok_or_else(|| self.error_here("declarator name"))
    }

    // ---- declarations ----

    fn declaration(&mut self) -> Result<(), ParseError> {
        self.skip_attributes();
        let Some(tok) = self.peek() else { return Ok(()) };
        if tok.is_punct(";") {
            self.bump();
            return Ok(());
        }
        if tok.kind != TokenKind::Keyword {
            return self.simple_declaration();
        }
        match tok.text.as_str() {
            "namespace" => self.namespace(),
            "inline" if self.peek_at(1).is_some_and(|t| t.is_keyword("namespace")) => {
                self.bump();
                self.namespace()
            }
            "extern" if self.peek_at(1).is_some_and(|t| t.kind == TokenKind::StringLiteral) => self.linkage_specification(),
            "template" => self.template_declaration(),
            "using" => self.using_declaration(),
            "static_assert" | "_Static_assert" => {
                self.skip_declaration();
                Ok(())
            }
            _ => self.simple_declaration(),
        }
    }

    fn declarations_until_close(&mut self) {
        while let Some(tok) = self.peek() {
            if tok.is_punct("}") {
                return;
            }
            let start = self.pos;
            if let Err(e) = self.declaration() {
                self.errors.push(e);
                self.recover();
            }
            if self.pos == start && !self.at_punct("}") {
                self.bump();
            }
        }
    }

    fn namespace(&mut self) -> Result<(), ParseError> {
        self.bump();
        self.skip_attributes();
        let mut names = Vec::new();
        while self.peek().is_some_and(Token::is_identifier) {
            names.push(self.bump_text());
            if !self.eat_punct("::") {
                break;
            }
            if self.at_keyword("inline") {
                self.bump();
            }
        }
        if self.eat_punct("=") {
            self.skip_declaration();
            return Ok(());
        }
        self.expect_punct("{")?;
        let depth = self.scope.len();
        for name in &names {
            let qualified = self.qualify(name);
            self.push_scope(&qualified, name, false);
        }
        self.declarations_until_close();
        self.scope.truncate(depth);
        self.expect_punct("}")
    }

    fn linkage_specification(&mut self) -> Result<(), ParseError> {
        self.bump();
        let literal = self.bump_text();
        let linkage = if literal.trim_matches('"') == "C" {
            LanguageLinkage::C
        } else {
            LanguageLinkage::Cxx
        };
        let saved = self.linkage.replace(linkage);
        let result = if self.eat_punct("{") {
            self.declarations_until_close();
            self.expect_punct("}")
        } else {
            self.declaration()
        };
        self.linkage = saved;
        result
    }

    fn using_declaration(&mut self) -> Result<(), ParseError> {
        let pos = self.current_pos();
        self.bump();
        let is_alias = self.peek().is_some_and(Token::is_identifier) && self.peek_at(1).is_some_and(|t| t.is_punct("="));
        if !is_alias {
            self.skip_declaration();
            return Ok(());
        }
        let name = self.bump_text();
        self.bump();
        let ty = self.type_id()?;
        self.expect_punct(";")?;
        self.push_typedef(&name, ty, pos);
        Ok(())
    }

    /// A type without a declared name, as in `sizeof(T)` or an alias.
    pub(super) fn type_id(&mut self) -> Result<QualType, ParseError> {
        let spec = self.decl_specifiers()?;
        let base = spec.ty.ok_or_else(|| self.error_here("type"))?;
        let d = self.declarator(false, true)?;
        Ok(d.apply(base, self.function_linkage()))
    }

    fn push_typedef(&mut self, name: &str, ty: QualType, pos: SourcePos) {
        let qualified = self.qualify(name);
        let function = self.declares_function(&ty);
        self.names.insert(qualified.clone(), Known::Typedef { function });
        self.decls.push(Declaration::Typedef(TypedefDecl {
            name: qualified,
            ty,
            pos: Some(pos),
        }));
    }

    fn push_forward(&mut self, kind: RecordKind, name: String, pos: SourcePos) {
        self.decls.push(Declaration::ForwardRecord {
            name,
            kind,
            pos: Some(pos),
        });
    }

    fn simple_declaration(&mut self) -> Result<(), ParseError> {
        let spec = self.decl_specifiers()?;
        if self.eat_punct(";") {
            if let (Some((kind, name)), None) = (spec.elaborated.clone(), &spec.defined) {
                self.push_forward(kind, name, spec.pos.clone());
            }
            return Ok(());
        }
        let base = match spec.ty.clone() {
            Some(ty) => ty,
            None if self.at_constructor() || self.at_punct("~") => QualType::void(),
            None => return Err(self.error_here("type specifier")),
        };
        loop {
            let d = self.declarator(true, false)?;
            let name = self.declared_name(&d)?;
            let pos = d.position().cloned().unwrap_or_else(|| spec.pos.clone());
            let ty = d.apply(base.clone(), self.function_linkage());
            if spec.flags.contains(SpecFlags::TYPEDEF) {
                self.push_typedef(&name, ty, pos);
            } else if self.declares_function(&ty) {
                let has_body = self.skip_function_tail();
                let param_names = d.function().map(|f| f.names.clone()).unwrap_or_default();
                self.decls.push(Declaration::Function(FunctionDecl {
                    name: self.qualify(&name),
                    ty,
                    param_names,
                    linkage: self.name_linkage(spec.flags),
                    is_definition: has_body,
                    pos: Some(pos),
                }));
                if has_body {
                    return Ok(());
                }
            } else {
                self.skip_initializer();
                if !self.is_class_member_name(&name) {
                    self.decls.push(Declaration::Variable(VariableDecl {
                        name: self.qualify(&name),
                        ty,
                        linkage: self.name_linkage(spec.flags),
                        pos: Some(pos),
                    }));
                }
            }
            if self.eat_punct(",") {
                continue;
            }
            return self.expect_punct(";");
        }
    }

    /// Skips `= default`, a constructor initializer list or a function
    /// body. Returns true when a body was consumed.
    fn skip_function_tail(&mut self) -> bool {
        if self.at_punct("=") {
            return false;
        }
        if self.eat_punct(":") {
            while !self.at_end() && !self.at_punct("{") && !self.at_punct(";") {
                if self.at_punct("(") {
                    self.skip_balanced();
                } else if self.at_punct("{") {
                    break;
                } else {
                    self.bump();
                    // member initializers may use braces: `data{n}`
                    if self.at_punct("{") && !self.peek_at(1).is_some_and(|t| t.is_punct("}")) {
                        let prev_is_name = self.tokens.get(self.pos - 1).is_some_and(|t| t.is_identifier() || t.is_punct(">"));
                        let follows = self.brace_init_follows();
                        if prev_is_name && follows {
                            self.skip_balanced();
                        }
                    }
                }
            }
        }
        if self.at_keyword("try") {
            self.bump();
        }
        if self.at_punct("{") {
            self.skip_balanced();
            while self.at_keyword("catch") {
                self.bump();
                self.skip_balanced();
                self.skip_balanced();
            }
            self.eat_punct(";");
            return true;
        }
        false
    }

    // `name{...}` in an initializer list is followed by `,` or the body.
    fn brace_init_follows(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.pos;
        while let Some(tok) = self.tokens.get(i) {
            if tok.is_punct("{") {
                depth += 1;
            } else if tok.is_punct("}") {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return self
                        .tokens
                        .get(i + 1)
                        .is_some_and(|t| t.is_punct(",") || t.is_punct("{"));
                }
            }
            i += 1;
        }
        false
    }

    fn skip_initializer(&mut self) -> Option<String> {
        if self.eat_punct("=") {
            let tokens = self.collect_expression(&[",", ";"]);
            return Some(spell(&tokens));
        }
        if self.at_punct("{") {
            let inner = self.skip_balanced();
            return Some(format!("{{{}}}", spell(&inner)));
        }
        None
    }

    // ---- records ----

    /// `struct X`, `struct X { ... }`, `struct { ... }`, `struct A<int>`.
    pub(super) fn record_specifier(
        &mut self,
    ) -> Result<(QualType, Option<Defined>, Option<(RecordKind, String)>), ParseError> {
        let keyword_pos = self.current_pos();
        let kind = match self.bump_text().as_str() {
            "struct" => RecordKind::Struct,
            "class" => RecordKind::Class,
            _ => RecordKind::Union,
        };
        self.skip_attributes();
        let mut name: Option<(String, SourcePos)> = None;
        if self.peek().is_some_and(|t| t.is_identifier() || t.is_punct("::")) {
            let pos = self.current_pos();
            name = Some((self.qualified_identifier()?, pos));
        }
        if let Some((n, _)) = &name {
            if self.at_punct("<") {
                let args = self.template_args()?;
                let template = self.resolve_template_name(n);
                if self.at_punct("{") || (self.at_punct(":") && !self.at_punct("::")) {
                    // explicit specialization outside a template header
                    self.skip_declaration();
                }
                let ty = QualType::new(TypeDescriptor::TemplateId { name: template, args });
                return Ok((ty, None, None));
            }
        }
        if self.at_word("final") {
            self.bump();
        }
        let defines = self.at_punct("{") || self.at_punct(":");
        if !defines {
            let (n, _) = name.ok_or_else(|| self.error_here("record name"))?;
            let qualified = match self.lookup_tag(&n) {
                Some((q, _)) => q,
                None => {
                    let q = self.qualify(&n);
                    self.tags.insert(q.clone(), Known::Record(kind));
                    q
                }
            };
            return Ok((QualType::record(kind, &qualified), None, Some((kind, qualified))));
        }
        let (simple, pos, anonymous) = match name {
            Some((n, pos)) => (n, pos, false),
            None => (format!("?_{}_{}", keyword_pos.line, keyword_pos.column), keyword_pos, true),
        };
        let qualified = self.qualify(&simple);
        self.tags.insert(qualified.clone(), Known::Record(kind));
        let def = self.record_body(&qualified, simple_name(&simple), kind, pos)?;
        self.decls.push(Declaration::Record(def));
        let defined = Defined {
            name: qualified.clone(),
            anonymous,
            is_record: true,
        };
        Ok((QualType::record(kind, &qualified), Some(defined), None))
    }

    fn qualified_identifier(&mut self) -> Result<String, ParseError> {
        self.eat_punct("::");
        let mut name = self.expect_identifier()?;
        while self.at_punct("::") && self.peek_at(1).is_some_and(Token::is_identifier) {
            self.bump();
            name.push_str("::");
            name.push_str(&self.bump_text());
        }
        Ok(name)
    }

    /// Base clause and member list of a record definition.
    fn record_body(&mut self, qualified: &str, simple: &str, kind: RecordKind, pos: SourcePos) -> Result<RecordDef, ParseError> {
        let mut def = RecordDef::new(qualified, kind);
        def.pos = Some(pos);
        if self.eat_punct(":") {
            loop {
                let mut is_virtual = false;
                let mut access = AccessSpecifier::default_for(kind);
                loop {
                    match self.peek().map(|t| t.text.as_str()) {
                        Some("virtual") => is_virtual = true,
                        Some("public") => access = AccessSpecifier::Public,
                        Some("protected") => access = AccessSpecifier::Protected,
                        Some("private") => access = AccessSpecifier::Private,
                        _ => break,
                    }
                    self.bump();
                }
                let base = self.named_type()?;
                self.eat_punct("...");
                def.bases.push(BaseClassEdge::new(base, is_virtual, access));
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct("{")?;
        self.push_scope(qualified, simple, true);
        let mark = self.decls.len();
        let mut access = AccessSpecifier::default_for(kind);
        while let Some(tok) = self.peek() {
            if tok.is_punct("}") {
                break;
            }
            let start = self.pos;
            let (members, methods) = (def.members.len(), def.methods.len());
            if let Err(e) = self.member_declaration(&mut def, &mut access) {
                warn!("in {}: {}", qualified, e);
                def.members.truncate(members);
                def.methods.truncate(methods);
                self.errors.push(e);
                self.recover();
            }
            if self.pos == start && !self.at_punct("}") {
                self.bump();
            }
        }
        self.scope.pop();
        self.expect_punct("}")?;
        def.nested = self.decls[mark..]
            .iter()
            .filter(|d| {
                matches!(d, Declaration::Typedef(_) | Declaration::Template(_)) || d.is_tag()
            })
            .filter(|d| scope_of(d.name()) == qualified)
            .map(|d| d.name().to_string())
            .collect();
        Ok(def)
    }

    fn member_declaration(&mut self, def: &mut RecordDef, access: &mut AccessSpecifier) -> Result<(), ParseError> {
        self.skip_attributes();
        let Some(tok) = self.peek() else { return Ok(()) };
        if tok.is_punct(";") {
            self.bump();
            return Ok(());
        }
        let label = match tok.text.as_str() {
            "public" => Some(AccessSpecifier::Public),
            "protected" => Some(AccessSpecifier::Protected),
            "private" => Some(AccessSpecifier::Private),
            _ => None,
        };
        if let Some(label) = label.filter(|_| self.peek_at(1).is_some_and(|t| t.is_punct(":"))) {
            *access = label;
            self.pos += 2;
            return Ok(());
        }
        if tok.kind == TokenKind::Keyword {
            match tok.text.as_str() {
                "using" => return self.member_using(def),
                "template" => {
                    let mark = self.decls.len();
                    self.template_declaration()?;
                    for decl in &self.decls[mark..] {
                        if let Declaration::Template(t) = decl {
                            def.member_templates.push(t.name.clone());
                        }
                    }
                    return Ok(());
                }
                "friend" | "static_assert" | "_Static_assert" => {
                    self.skip_declaration();
                    return Ok(());
                }
                _ => {}
            }
        }
        self.member_simple(def, *access)
    }

    fn member_using(&mut self, def: &mut RecordDef) -> Result<(), ParseError> {
        let is_alias = self.peek_at(1).is_some_and(Token::is_identifier) && self.peek_at(2).is_some_and(|t| t.is_punct("="));
        if is_alias {
            return self.using_declaration();
        }
        self.bump();
        if self.at_keyword("typename") {
            self.bump();
        }
        let tokens = self.collect_expression(&[";"]);
        self.expect_punct(";")?;
        def.usings.push(spell(&tokens));
        Ok(())
    }

    fn member_simple(&mut self, def: &mut RecordDef, access: AccessSpecifier) -> Result<(), ParseError> {
        let spec = self.decl_specifiers()?;
        if spec.flags.contains(SpecFlags::FRIEND) {
            self.skip_declaration();
            return Ok(());
        }
        if self.eat_punct(";") {
            match (&spec.defined, spec.elaborated.clone()) {
                (Some(defined), _) if defined.anonymous && defined.is_record => {
                    if let Some(ty) = spec.ty {
                        let mut member = MemberDescriptor::new(None, ty).with_access(access);
                        member.pos = Some(spec.pos);
                        def.members.push(member);
                    }
                }
                (None, Some((kind, name))) => self.push_forward(kind, name, spec.pos),
                _ => {}
            }
            return Ok(());
        }
        let base = spec.ty.clone().unwrap_or_else(QualType::void);
        loop {
            if self.eat_punct(":") {
                // unnamed bitfield
                let width = self.bit_width()?;
                let mut member = MemberDescriptor::new(None, base.clone()).with_access(access);
                member.bit_width = Some(width);
                member.pos = Some(spec.pos.clone());
                def.members.push(member);
            } else {
                let d = self.declarator(true, false)?;
                let name = self.declared_name(&d)?;
                let pos = d.position().cloned().unwrap_or_else(|| spec.pos.clone());
                let ty = d.apply(base.clone(), self.function_linkage());
                if spec.flags.contains(SpecFlags::TYPEDEF) {
                    self.push_typedef(&name, ty, pos);
                } else if ty.is_function() {
                    let has_body = self.method(def, &spec, &d, ty, access, pos)?;
                    if has_body {
                        return Ok(());
                    }
                } else {
                    self.data_member(def, &spec, name, ty, access, pos)?;
                }
            }
            if self.eat_punct(",") {
                continue;
            }
            return self.expect_punct(";");
        }
    }

    fn bit_width(&mut self) -> Result<u32, ParseError> {
        let pos = self.current_pos();
        let tokens = self.collect_expression(&[",", ";", "=", "{"]);
        match self.eval_tokens(&tokens) {
            Ok(v) if (0..=i64::from(u32::MAX)).contains(&v) => Ok(v as u32),
            Ok(v) => Err(ParseError::InvalidConstant {
                position: pos,
                expr: spell(&tokens),
                message: format!("bit-field width {} out of range", v),
            }),
            Err(e) => Err(ParseError::InvalidConstant {
                position: pos,
                expr: spell(&tokens),
                message: e.to_string(),
            }),
        }
    }

    fn data_member(
        &mut self,
        def: &mut RecordDef,
        spec: &DeclSpec,
        name: String,
        ty: QualType,
        access: AccessSpecifier,
        pos: SourcePos,
    ) -> Result<(), ParseError> {
        let mut member = MemberDescriptor::new(Some(simple_name(&name).to_string()), ty).with_access(access);
        member.is_static = spec.flags.contains(SpecFlags::STATIC);
        member.is_mutable = spec.flags.contains(SpecFlags::MUTABLE);
        member.pos = Some(pos);
        if self.eat_punct(":") {
            member.bit_width = Some(self.bit_width()?);
        }
        member.default_init = self.skip_initializer();
        if member.is_static && member.ty.is_const() {
            let value = member.default_init.as_deref().and_then(|text| {
                let tokens = crate::lexer::tokenize("<init>", text).ok()?;
                self.eval_tokens(&tokens).ok()
            });
            if let Some(value) = value {
                self.constants.insert(format!("{}::{}", def.name, simple_name(&name)), value);
            }
        }
        def.members.push(member);
        Ok(())
    }

    /// Returns true when the method had an inline body.
    fn method(
        &mut self,
        def: &mut RecordDef,
        spec: &DeclSpec,
        d: &Declarator,
        ty: QualType,
        access: AccessSpecifier,
        pos: SourcePos,
    ) -> Result<bool, ParseError> {
        let name = d.simple_name().unwrap_or_default().to_string();
        let kind = if spec.ty.is_none() {
            if name.starts_with('~') {
                MethodKind::Destructor
            } else if name.starts_with("operator") {
                MethodKind::Conversion
            } else {
                MethodKind::Constructor
            }
        } else if name.starts_with("operator") {
            MethodKind::Operator
        } else {
            MethodKind::Normal
        };
        let suffix = d.function().cloned().unwrap_or_default();
        let mut flags = MethodFlags::empty();
        for (spec_flag, method_flag) in [
            (SpecFlags::VIRTUAL, MethodFlags::VIRTUAL),
            (SpecFlags::STATIC, MethodFlags::STATIC),
            (SpecFlags::INLINE, MethodFlags::INLINE),
            (SpecFlags::EXPLICIT, MethodFlags::EXPLICIT),
        ] {
            if spec.flags.contains(spec_flag) {
                flags |= method_flag;
            }
        }
        if suffix.is_const {
            flags |= MethodFlags::CONST;
        }
        loop {
            if self.at_word("override") {
                flags |= MethodFlags::OVERRIDE;
            } else if self.at_word("final") {
                flags |= MethodFlags::FINAL;
            } else {
                break;
            }
            self.bump();
        }
        if self.eat_punct("=") {
            match self.bump_text().as_str() {
                "0" => flags |= MethodFlags::PURE,
                "default" => flags |= MethodFlags::DEFAULTED,
                "delete" => flags |= MethodFlags::DELETED,
                other => {
                    return Err(ParseError::syntax(self.current_pos(), "'0', 'default' or 'delete'", other));
                }
            }
        }
        let has_body = self.skip_function_tail();
        if has_body {
            flags |= MethodFlags::INLINE;
        }
        let Some(function) = ty.as_function().cloned() else {
            return Err(ParseError::syntax(pos, "function declarator", name));
        };
        def.methods.push(MethodDecl {
            name,
            kind,
            ty: function,
            param_names: suffix.names,
            flags,
            access,
            pos: Some(pos),
        });
        Ok(has_body)
    }

    // ---- enums ----

    pub(super) fn enum_specifier(&mut self) -> Result<(QualType, Option<Defined>), ParseError> {
        let keyword_pos = self.current_pos();
        self.bump();
        let scoped = self.at_keyword("class") || self.at_keyword("struct");
        if scoped {
            self.bump();
        }
        self.skip_attributes();
        let mut name: Option<(String, SourcePos)> = None;
        if self.peek().is_some_and(|t| t.is_identifier() || t.is_punct("::")) {
            let pos = self.current_pos();
            name = Some((self.qualified_identifier()?, pos));
        }
        let mut underlying = None;
        if self.eat_punct(":") {
            underlying = Some(self.type_id()?);
        }
        if !self.at_punct("{") {
            let (n, pos) = name.ok_or_else(|| self.error_here("enum name"))?;
            let qualified = match self.lookup_tag(&n) {
                Some((q, _)) => q,
                None => {
                    let q = self.qualify(&n);
                    self.tags.insert(q.clone(), Known::Enum);
                    if underlying.is_some() && self.at_punct(";") {
                        // opaque declaration, complete enough for layout
                        self.decls.push(Declaration::Enum(EnumDef {
                            name: q.clone(),
                            scoped,
                            underlying: underlying.clone(),
                            enumerators: Vec::new(),
                            pos: Some(pos),
                        }));
                    }
                    q
                }
            };
            return Ok((QualType::new(TypeDescriptor::Enum(qualified)), None));
        }
        let (simple, pos, anonymous) = match name {
            Some((n, pos)) => (n, pos, false),
            None => (format!("?_{}_{}", keyword_pos.line, keyword_pos.column), keyword_pos, true),
        };
        let qualified = self.qualify(&simple);
        self.tags.insert(qualified.clone(), Known::Enum);
        self.bump();
        if scoped {
            self.push_scope(&qualified, &simple, true);
        }
        let enumerators = self.enumerator_list(&qualified, scoped);
        if scoped {
            self.scope.pop();
        }
        let enumerators = enumerators?;
        self.decls.push(Declaration::Enum(EnumDef {
            name: qualified.clone(),
            scoped,
            underlying,
            enumerators: enumerators.iter().map(|(e, _)| e.clone()).collect(),
            pos: Some(pos),
        }));
        for (e, pos) in enumerators {
            let name = if scoped {
                format!("{}::{}", qualified, e.name)
            } else {
                self.qualify(&e.name)
            };
            self.decls.push(Declaration::Enumerator(EnumeratorDecl {
                name,
                value: e.value,
                enum_name: qualified.clone(),
                pos: Some(pos),
            }));
        }
        let defined = Defined {
            name: qualified.clone(),
            anonymous,
            is_record: false,
        };
        Ok((QualType::new(TypeDescriptor::Enum(qualified)), Some(defined)))
    }

    fn enumerator_list(&mut self, qualified: &str, scoped: bool) -> Result<Vec<(Enumerator, SourcePos)>, ParseError> {
        let mut out = Vec::new();
        let mut next = 0i64;
        loop {
            if self.eat_punct("}") {
                return Ok(out);
            }
            let pos = self.current_pos();
            let name = self.expect_identifier()?;
            self.skip_attributes();
            let value = if self.eat_punct("=") {
                let tokens = self.collect_expression(&[",", "}"]);
                match self.eval_tokens(&tokens) {
                    Ok(v) => v,
                    Err(e) => {
                        self.errors.push(ParseError::InvalidConstant {
                            position: pos.clone(),
                            expr: spell(&tokens),
                            message: e.to_string(),
                        });
                        next
                    }
                }
            } else {
                next
            };
            next = value.wrapping_add(1);
            let constant = if scoped {
                format!("{}::{}", qualified, name)
            } else {
                self.qualify(&name)
            };
            self.constants.insert(constant, value);
            out.push((Enumerator { name, value }, pos));
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                return Ok(out);
            }
        }
    }

    // ---- templates ----

    fn template_declaration(&mut self) -> Result<(), ParseError> {
        let pos = self.current_pos();
        self.bump();
        if !self.at_punct("<") {
            // explicit instantiation
            self.skip_declaration();
            return Ok(());
        }
        self.templates.push(Vec::new());
        let result = self
            .template_params()
            .and_then(|params| self.templated_entity(params, pos));
        self.templates.pop();
        result
    }

    /// Fills the innermost template header while parsing it, so later
    /// parameters and defaults can refer to earlier ones.
    fn template_params(&mut self) -> Result<Vec<TemplateParam>, ParseError> {
        self.expect_punct("<")?;
        if self.eat_close_angle() {
            return Ok(Vec::new());
        }
        loop {
            let index = self.templates.last().map_or(0, Vec::len);
            let param = if self.at_keyword("typename") || self.at_keyword("class") {
                self.bump();
                self.eat_punct("...");
                let name = if self.peek().is_some_and(Token::is_identifier) {
                    self.bump_text()
                } else {
                    format!("$T{}", index)
                };
                let mut param = TemplateParam::type_param(&name);
                if self.eat_punct("=") {
                    param = param.with_default(TemplateArg::Type(self.type_id()?));
                }
                param
            } else if self.at_keyword("template") {
                self.bump();
                self.skip_angles();
                self.bump();
                let name = if self.peek().is_some_and(Token::is_identifier) {
                    self.bump_text()
                } else {
                    format!("$T{}", index)
                };
                if self.eat_punct("=") {
                    self.collect_expression(&[",", ">", ">>"]);
                }
                TemplateParam::type_param(&name)
            } else {
                let spec = self.decl_specifiers()?;
                let base = spec.ty.ok_or_else(|| self.error_here("template parameter"))?;
                let d = self.declarator(true, true)?;
                let name = d.name().map(str::to_string).unwrap_or_else(|| format!("$N{}", index));
                let ty = d.apply(base, self.function_linkage());
                let mut param = TemplateParam::value_param(&name, ty);
                if self.eat_punct("=") {
                    let tokens = self.collect_expression(&[",", ">", ">>"]);
                    let default = match self.eval_tokens(&tokens) {
                        Ok(v) => TemplateArg::Value(v),
                        Err(_) => TemplateArg::Expr(spell(&tokens)),
                    };
                    param = param.with_default(default);
                }
                param
            };
            if let Some(params) = self.templates.last_mut() {
                params.push(param);
            }
            if self.eat_punct(",") {
                continue;
            }
            if self.eat_close_angle() {
                return Ok(self.templates.last().cloned().unwrap_or_default());
            }
            return Err(self.error_here("',' or '>'"));
        }
    }

    fn templated_entity(&mut self, params: Vec<TemplateParam>, pos: SourcePos) -> Result<(), ParseError> {
        self.skip_attributes();
        if self.at_keyword("template") || self.at_keyword("friend") {
            self.skip_declaration();
            return Ok(());
        }
        if self.at_keyword("using") {
            self.bump();
            let name = self.expect_identifier()?;
            self.expect_punct("=")?;
            let ty = self.type_id()?;
            self.expect_punct(";")?;
            let qualified = self.qualify(&name);
            self.names.insert(qualified.clone(), Known::Template);
            let mut decl = TemplateDeclaration::new(&qualified, params).with_primary(TemplateBody::Alias(ty));
            decl.pos = Some(pos);
            self.decls.push(Declaration::Template(decl));
            return Ok(());
        }
        let class_head = self.peek().is_some_and(|t| {
            t.is_keyword("class") || t.is_keyword("struct") || t.is_keyword("union")
        }) && self.peek_at(1).is_some_and(Token::is_identifier)
            && self.peek_at(2).is_some_and(|t| {
                t.is_punct("<") || t.is_punct(":") || t.is_punct("{") || t.is_punct(";") || t.text == "final"
            });
        if class_head {
            return self.class_template(params, pos);
        }
        if self.at_template_member_definition() {
            self.skip_declaration();
            return Ok(());
        }
        self.function_template(params, pos)
    }

    fn class_template(&mut self, params: Vec<TemplateParam>, pos: SourcePos) -> Result<(), ParseError> {
        let kind = match self.bump_text().as_str() {
            "struct" => RecordKind::Struct,
            "class" => RecordKind::Class,
            _ => RecordKind::Union,
        };
        let name_pos = self.current_pos();
        let name = self.expect_identifier()?;
        let pattern = if self.at_punct("<") {
            Some(self.template_args()?)
        } else {
            None
        };
        if self.at_punct("::") {
            self.skip_declaration();
            return Ok(());
        }
        if self.at_word("final") {
            self.bump();
        }
        let qualified = match pattern {
            Some(_) => self.resolve_template_name(&name),
            None => self.qualify(&name),
        };
        self.names.insert(qualified.clone(), Known::Template);
        if self.eat_punct(";") {
            let mut decl = TemplateDeclaration::new(&qualified, if pattern.is_none() { params } else { Vec::new() });
            decl.pos = Some(pos);
            if pattern.is_none() {
                self.decls.push(Declaration::Template(decl));
            }
            return Ok(());
        }
        let record_name = match &pattern {
            Some(args) => template_id(&qualified, args),
            None => qualified.clone(),
        };
        let mark = self.decls.len();
        let def = self.record_body(&record_name, &name, kind, name_pos)?;
        self.eat_punct(";");
        let prefix = format!("{}::", record_name);
        let nested = self
            .decls
            .split_off(mark)
            .into_iter()
            .map(|mut d| {
                if let Some(relative) = d.name().strip_prefix(&prefix).map(str::to_string) {
                    d.rename(relative);
                }
                d
            })
            .collect();
        let body = TemplateBody::Record { def, nested };
        let decl = match pattern {
            None => {
                let mut decl = TemplateDeclaration::new(&qualified, params).with_primary(body);
                decl.pos = Some(pos);
                decl
            }
            Some(pattern) => {
                let mut decl = TemplateDeclaration::new(&qualified, Vec::new());
                decl.specializations.push(PartialSpecialization {
                    params,
                    pattern,
                    body,
                    pos: Some(pos),
                });
                decl
            }
        };
        self.decls.push(Declaration::Template(decl));
        Ok(())
    }

    fn function_template(&mut self, params: Vec<TemplateParam>, pos: SourcePos) -> Result<(), ParseError> {
        let spec = self.decl_specifiers()?;
        let base = spec.ty.clone().unwrap_or_else(QualType::void);
        let d = self.declarator(true, false)?;
        let name = self.declared_name(&d)?;
        let ty = d.apply(base, self.function_linkage());
        if !ty.is_function() {
            // variable template
            self.skip_initializer();
            return self.expect_punct(";");
        }
        loop {
            if self.at_word("override") || self.at_word("final") {
                self.bump();
            } else {
                break;
            }
        }
        if self.eat_punct("=") {
            self.bump();
        }
        let has_body = self.skip_function_tail();
        if !has_body {
            self.expect_punct(";")?;
        }
        let explicit_specialization = name.contains('<');
        if explicit_specialization || (self.current_class().is_none() && self.is_class_member_name(&name)) {
            return Ok(());
        }
        let qualified = self.qualify(&name);
        let function = FunctionDecl {
            name: qualified.clone(),
            ty,
            param_names: d.function().map(|f| f.names.clone()).unwrap_or_default(),
            linkage: self.name_linkage(spec.flags),
            is_definition: has_body,
            pos: d.position().cloned(),
        };
        let mut decl = TemplateDeclaration::new(&qualified, params).with_primary(TemplateBody::Function(function));
        decl.pos = Some(pos);
        self.decls.push(Declaration::Template(decl));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{parse_source, Language};
    use crate::template::TemplateBody;
    use crate::types::{
        AccessSpecifier, ArrayBound, Declaration, LanguageLinkage, MethodFlags, MethodKind, PrimitiveType, QualType,
        RecordKind, StorageLinkage, TemplateArg, TypeDescriptor,
    };

    fn find<'d>(decls: &'d [Declaration], name: &str) -> &'d Declaration {
        decls
            .iter()
            .find(|d| d.name() == name)
            .unwrap_or_else(|| panic!("{name} not declared"))
    }

    const LINKAGE: &str = r#"
extern "C" void f1(void(*pf)());
extern "C" typedef void FUNC();
FUNC f2;
extern "C" FUNC f3;
void (*pf2)(FUNC*);
extern "C" {
    static void f4();
}
"#;

    #[test]
    fn test_language_linkage() {
        let out = parse_source("c_linkage.hpp", LINKAGE, Language::Cxx).unwrap();
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let Declaration::Function(f1) = find(&out.declarations, "f1") else { panic!() };
        assert_eq!(f1.linkage.language, Some(LanguageLinkage::C));
        assert_eq!(f1.param_names, vec![Some("pf".to_string())]);
        let Declaration::Typedef(func) = find(&out.declarations, "FUNC") else { panic!() };
        assert_eq!(func.ty.as_function().unwrap().linkage, LanguageLinkage::C);
        let Declaration::Function(f2) = find(&out.declarations, "f2") else { panic!() };
        assert_eq!(f2.linkage.language, Some(LanguageLinkage::Cxx));
        assert_eq!(f2.ty.ty, TypeDescriptor::Typedef("FUNC".to_string()));
        let Declaration::Function(f3) = find(&out.declarations, "f3") else { panic!() };
        assert_eq!(f3.linkage.language, Some(LanguageLinkage::C));
        assert!(matches!(find(&out.declarations, "pf2"), Declaration::Variable(_)));
        let Declaration::Function(f4) = find(&out.declarations, "f4") else { panic!() };
        assert_eq!(f4.linkage.storage, StorageLinkage::Internal);
        assert_eq!(f4.linkage.language, None);
        assert_eq!(f4.ty.as_function().unwrap().linkage, LanguageLinkage::C);
    }

    const CLASSES: &str = r#"
class MyClass
{
  int field;
  MyClass(int x) : field(x) {};
  ~MyClass() {};
  int method(wchar_t);
  virtual void vmethod() const = 0;
  virtual int  vmethod(int);
public:
  int *pubfield;
  const int constmeth(char);
protected:
  static const int static_field;
  static int static_method();
};

class S {
protected:
    int *d1;
    int a[10] = {1,2};
    static const int d2 = 1;
public:
    virtual void f1(int) = 0;
    std::string d3, *d4, f2(int);
    enum {NORTH, SOUTH, EAST, WEST};
    struct NestedS {
        std::string s;
        virtual void f(int);
    } d5, *d6;
private:
    typedef NestedS value_type, *pointer_type;
};
"#;

    #[test]
    fn test_class_members_and_methods() {
        let out = parse_source("classes.hpp", CLASSES, Language::Cxx).unwrap();
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let my = find(&out.declarations, "MyClass").as_record().unwrap();
        assert_eq!(my.kind, RecordKind::Class);
        let field = my.member("field").unwrap();
        assert_eq!(field.access, AccessSpecifier::Private);
        assert_eq!(my.member("pubfield").unwrap().access, AccessSpecifier::Public);
        let static_field = my.member("static_field").unwrap();
        assert!(static_field.is_static);
        assert_eq!(static_field.access, AccessSpecifier::Protected);
        let kinds: Vec<MethodKind> = my.methods.iter().map(|m| m.kind).collect();
        assert_eq!(&kinds[..2], &[MethodKind::Constructor, MethodKind::Destructor]);
        let vmethod = &my.methods[3];
        assert_eq!(vmethod.name, "vmethod");
        assert!(vmethod.flags.contains(MethodFlags::VIRTUAL | MethodFlags::PURE | MethodFlags::CONST));
        let constmeth = my.methods.iter().find(|m| m.name == "constmeth").unwrap();
        assert!(constmeth.ty.ret.is_const());
        assert!(!constmeth.flags.contains(MethodFlags::CONST));
        let static_method = my.methods.last().unwrap();
        assert!(static_method.flags.contains(MethodFlags::STATIC));
    }

    #[test]
    fn test_nested_declarations() {
        let out = parse_source("classes.hpp", CLASSES, Language::Cxx).unwrap();
        let s = find(&out.declarations, "S").as_record().unwrap();
        let names: Vec<&str> = s.fields().filter_map(|m| m.name.as_deref()).collect();
        assert_eq!(names, vec!["d1", "a", "d3", "d4", "d5", "d6"]);
        assert_eq!(s.member("a").unwrap().default_init.as_deref(), Some("{1,2}"));
        assert!(s.methods.iter().any(|m| m.name == "f2"));
        assert!(s.nested.contains(&"S::NestedS".to_string()));
        assert!(s.nested.contains(&"S::value_type".to_string()));
        let d5 = s.member("d5").unwrap();
        assert_eq!(d5.ty, QualType::record(RecordKind::Struct, "S::NestedS"));
        let Declaration::Enumerator(west) = find(&out.declarations, "S::WEST") else { panic!() };
        assert_eq!(west.value, 3);
        let Declaration::Typedef(pointer) = find(&out.declarations, "S::pointer_type") else { panic!() };
        assert!(pointer.ty.is_pointer());
        // nested records are declared before their parent
        let nested_at = out.declarations.iter().position(|d| d.name() == "S::NestedS").unwrap();
        let parent_at = out.declarations.iter().position(|d| d.name() == "S").unwrap();
        assert!(nested_at < parent_at);
    }

    const TEMPLATES: &str = r#"
template <typename T>
struct identity
{
    using type = T;
};

template<typename T, int size>
struct sA {
  char tab[size];
  void f(T& t) {}
};

template<class T1, class T2, int I>
class A {};

template<class T, int I>
class A<T, T*, I> {};

template<class T, class T2, int I>
class A<T*, T2, I> {};

template<class T>
class A<int, T*, 5> {};

template<class X, class T, int I>
class A<X, T*, I> {};

struct Printer {
    std::ostream& os;
    Printer(std::ostream& os) : os(os) {}
    template<typename T>
    void operator()(const T& obj) { os << obj << ' '; }
};

struct user {
    identity<int>::type x;
    A<int, int*, 5> a;
};
"#;

    #[test]
    fn test_class_templates() {
        let out = parse_source("templates.hpp", TEMPLATES, Language::Cxx).unwrap();
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let a: Vec<_> = out
            .declarations
            .iter()
            .filter_map(|d| d.as_template())
            .filter(|t| t.name == "A")
            .collect();
        assert_eq!(a.len(), 5);
        assert_eq!(a[0].params.len(), 3);
        let third = &a[3].specializations[0];
        assert_eq!(third.params.len(), 1);
        assert_eq!(third.pattern[0], TemplateArg::Type(QualType::primitive(PrimitiveType::Int)));
        assert_eq!(third.pattern[2], TemplateArg::Value(5));
        let first = &a[1].specializations[0];
        assert_eq!(
            first.pattern[2],
            TemplateArg::ValueParam {
                name: "I".to_string(),
                index: 1
            }
        );
        let param = QualType::new(TypeDescriptor::TemplateParam {
            name: "T".to_string(),
            index: 0,
        });
        assert_eq!(first.pattern[1], TemplateArg::Type(param.pointer_to()));
    }

    #[test]
    fn test_template_bodies() {
        let out = parse_source("templates.hpp", TEMPLATES, Language::Cxx).unwrap();
        let identity = find(&out.declarations, "identity").as_template().unwrap();
        let Some(TemplateBody::Record { nested, .. }) = &identity.primary else { panic!() };
        assert_eq!(nested[0].name(), "type");
        let sa = find(&out.declarations, "sA").as_template().unwrap();
        let Some(TemplateBody::Record { def, .. }) = &sa.primary else { panic!() };
        match &def.members[0].ty.ty {
            TypeDescriptor::Array { bound, .. } => assert_eq!(*bound, ArrayBound::Expr("size".to_string())),
            other => panic!("unexpected {other:?}"),
        }
        let printer = find(&out.declarations, "Printer").as_record().unwrap();
        assert_eq!(printer.member_templates, vec!["Printer::operator()".to_string()]);
        let user = find(&out.declarations, "user").as_record().unwrap();
        assert_eq!(
            user.member("x").unwrap().ty.ty,
            TypeDescriptor::Typedef("identity<int>::type".to_string())
        );
        assert!(matches!(&user.member("a").unwrap().ty.ty, TypeDescriptor::TemplateId { name, .. } if name == "A"));
    }

    #[test]
    fn test_c_hoists_nested_records() {
        let src = "struct outer { struct inner { int x; } i; union { int a; float b; }; };";
        let out = parse_source("nest.h", src, Language::C).unwrap();
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert!(out.declarations.iter().any(|d| d.name() == "inner"));
        let outer = find(&out.declarations, "outer").as_record().unwrap();
        assert!(outer.nested.is_empty());
        assert!(outer.members[1].is_anonymous_aggregate());
        let cxx = parse_source("nest.hpp", src, Language::Cxx).unwrap();
        assert!(cxx.declarations.iter().any(|d| d.name() == "outer::inner"));
    }

    #[test]
    fn test_enums_and_constants() {
        let src = r#"
enum tag { TAG0, TAG1, TAG2 = TAG1 + 1, TAG3 };
enum class Color : unsigned char { Red = 1, Green };
struct buf { char data[TAG3 * 2]; int bits : TAG2; };
"#;
        let out = parse_source("enums.h", src, Language::Cxx).unwrap();
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let Declaration::Enumerator(tag2) = find(&out.declarations, "TAG2") else { panic!() };
        assert_eq!(tag2.value, 2);
        let Declaration::Enumerator(green) = find(&out.declarations, "Color::Green") else { panic!() };
        assert_eq!(green.value, 2);
        let Declaration::Enum(color) = find(&out.declarations, "Color") else { panic!() };
        assert!(color.scoped);
        assert_eq!(color.underlying, Some(QualType::primitive(PrimitiveType::UChar)));
        let buf = find(&out.declarations, "buf").as_record().unwrap();
        assert_eq!(
            buf.members[0].ty,
            QualType::primitive(PrimitiveType::Char).array_of(ArrayBound::Fixed(6))
        );
        assert_eq!(buf.members[1].bit_width, Some(2));
    }

    #[test]
    fn test_recovers_after_syntax_error() {
        let src = r#"
struct good1 { int a; };
struct bad { int x y; int z; };
int ` broken;
struct good2 { char c; };
"#;
        let out = parse_source("broken.h", src, Language::C);
        // the scanner rejects '`' before the parser sees it
        assert!(out.is_err());
        let src = src.replace('`', "+");
        let out = parse_source("broken.h", &src, Language::C).unwrap();
        assert_eq!(out.errors.len(), 2);
        assert!(out.declarations.iter().any(|d| d.name() == "good1"));
        assert!(out.declarations.iter().any(|d| d.name() == "good2"));
        let bad = find(&out.declarations, "bad").as_record().unwrap();
        assert_eq!(bad.members.len(), 1);
        assert_eq!(bad.members[0].name.as_deref(), Some("z"));
    }

    #[test]
    fn test_out_of_class_definitions() {
        let src = r#"
namespace ns {
struct W { int get() const; W(int); static int count; };
}
int ns::W::get() const { return 0; }
ns::W::W(int v) {}
int ns::W::count = 3;
"#;
        let out = parse_source("defs.cpp", src, Language::Cxx).unwrap();
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let Declaration::Function(get) = find(&out.declarations, "ns::W::get") else { panic!() };
        assert!(get.is_definition);
        assert!(matches!(find(&out.declarations, "ns::W::W"), Declaration::Function(_)));
        assert!(!out.declarations.iter().any(|d| d.name() == "ns::W::count"));
        let w = find(&out.declarations, "ns::W").as_record().unwrap();
        assert_eq!(w.methods.len(), 2);
    }

    #[test]
    fn test_forward_and_anonymous() {
        let src = r#"
struct fwd;
typedef struct { int x; } anon_t;
struct sAB { int a; union { char c; int i; } u; };
"#;
        let out = parse_source("header.h", src, Language::C).unwrap();
        assert!(matches!(find(&out.declarations, "fwd"), Declaration::ForwardRecord { .. }));
        let Declaration::Typedef(anon) = find(&out.declarations, "anon_t") else { panic!() };
        match &anon.ty.ty {
            TypeDescriptor::Record { name, .. } => assert_eq!(name, "?_3_9"),
            other => panic!("unexpected {other:?}"),
        }
        let sab = find(&out.declarations, "sAB").as_record().unwrap();
        match &sab.member("u").unwrap().ty.ty {
            TypeDescriptor::Record { kind, name } => {
                assert_eq!(*kind, RecordKind::Union);
                assert_eq!(name, "?_4_21");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
