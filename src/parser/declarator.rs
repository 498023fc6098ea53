// Wed Oct 14 2026 - Alex

use crate::lexer::{evaluate, spell, EvalError, SourcePos, Token, TokenKind};
use crate::parser::syntax::{Known, Parser};
use crate::parser::ParseError;
use crate::types::{
    scoped_candidates, template_id, ArrayBound, LanguageLinkage, PrimitiveType, QualType, Qualifiers,
    RecordKind, TemplateArg, TypeDescriptor,
};
use bitflags::bitflags;

bitflags! {
    /// Storage class and function specifiers seen before a declarator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpecFlags: u16 {
        const TYPEDEF = 1 << 0;
        const STATIC = 1 << 1;
        const EXTERN = 1 << 2;
        const INLINE = 1 << 3;
        const VIRTUAL = 1 << 4;
        const EXPLICIT = 1 << 5;
        const MUTABLE = 1 << 6;
        const CONSTEXPR = 1 << 7;
        const FRIEND = 1 << 8;
        const THREAD_LOCAL = 1 << 9;
    }
}

const TYPE_KEYWORDS: &[&str] = &[
    "const", "volatile", "struct", "class", "union", "enum", "typename", "signed", "unsigned", "short",
    "long", "int", "char", "bool", "_Bool", "float", "double", "void", "wchar_t", "char8_t", "char16_t",
    "char32_t", "__int128", "decltype", "auto", "__signed__", "__const",
];

/// Builtin type words of one declaration, combined once the specifier
/// sequence ends (`unsigned long long`, `long double`, ...).
#[derive(Debug, Default)]
struct PrimitiveWords {
    signed: bool,
    unsigned: bool,
    short: bool,
    long: u8,
    int: bool,
    base: Option<&'static str>,
}

impl PrimitiveWords {
    fn add(&mut self, word: &str) -> bool {
        match word {
            "signed" | "__signed__" => self.signed = true,
            "unsigned" => self.unsigned = true,
            "short" => self.short = true,
            "long" => self.long += 1,
            "int" => self.int = true,
            "char" => self.base = Some("char"),
            "bool" | "_Bool" => self.base = Some("bool"),
            "float" => self.base = Some("float"),
            "double" => self.base = Some("double"),
            "void" => self.base = Some("void"),
            "wchar_t" => self.base = Some("wchar_t"),
            "char8_t" => self.base = Some("char8_t"),
            "char16_t" => self.base = Some("char16_t"),
            "char32_t" => self.base = Some("char32_t"),
            "__int128" => self.base = Some("__int128"),
            _ => return false,
        }
        true
    }

    fn any(&self) -> bool {
        self.signed || self.unsigned || self.short || self.long > 0 || self.int || self.base.is_some()
    }

    fn primitive(&self) -> Option<PrimitiveType> {
        if !self.any() {
            return None;
        }
        let p = match self.base {
            Some("void") => PrimitiveType::Void,
            Some("bool") => PrimitiveType::Bool,
            Some("float") => PrimitiveType::Float,
            Some("double") if self.long > 0 => PrimitiveType::LongDouble,
            Some("double") => PrimitiveType::Double,
            Some("wchar_t") => PrimitiveType::WChar,
            Some("char8_t") => PrimitiveType::Char8,
            Some("char16_t") => PrimitiveType::Char16,
            Some("char32_t") => PrimitiveType::Char32,
            Some("__int128") if self.unsigned => PrimitiveType::UInt128,
            Some("__int128") => PrimitiveType::Int128,
            Some("char") if self.unsigned => PrimitiveType::UChar,
            Some("char") if self.signed => PrimitiveType::SChar,
            Some("char") => PrimitiveType::Char,
            _ if self.short => {
                if self.unsigned {
                    PrimitiveType::UShort
                } else {
                    PrimitiveType::Short
                }
            }
            _ if self.long >= 2 => {
                if self.unsigned {
                    PrimitiveType::ULongLong
                } else {
                    PrimitiveType::LongLong
                }
            }
            _ if self.long == 1 => {
                if self.unsigned {
                    PrimitiveType::ULong
                } else {
                    PrimitiveType::Long
                }
            }
            _ if self.unsigned => PrimitiveType::UInt,
            _ => PrimitiveType::Int,
        };
        Some(p)
    }
}

/// A record or enum defined inside a specifier sequence.
#[derive(Debug, Clone)]
pub struct Defined {
    pub name: String,
    pub anonymous: bool,
    pub is_record: bool,
}

#[derive(Debug, Clone)]
pub struct DeclSpec {
    /// `None` for constructors, destructors and conversion functions.
    pub ty: Option<QualType>,
    pub flags: SpecFlags,
    pub defined: Option<Defined>,
    /// `struct X` without a body, a forward declaration when nothing follows.
    pub elaborated: Option<(RecordKind, String)>,
    pub pos: SourcePos,
}

#[derive(Debug, Clone, PartialEq)]
enum PtrOp {
    Pointer(Qualifiers),
    Reference(bool),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionSuffix {
    pub params: Vec<QualType>,
    pub names: Vec<Option<String>>,
    pub variadic: bool,
    pub is_const: bool,
    pub trailing: Option<QualType>,
}

#[derive(Debug, Clone, PartialEq)]
enum Suffix {
    Array(ArrayBound),
    Function(FunctionSuffix),
}

/// Parsed declarator, applied to the specifier type inside-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarator {
    name: Option<String>,
    pos: Option<SourcePos>,
    ptrs: Vec<PtrOp>,
    inner: Option<Box<Declarator>>,
    suffixes: Vec<Suffix>,
}

enum Outermost<'d> {
    Bare,
    Function(&'d FunctionSuffix),
    Other,
}

impl Declarator {
    /// Builds the declared type. Pointer operators bind to the base first,
    /// then array and function suffixes from the right, then the
    /// parenthesized inner declarator.
    pub fn apply(&self, base: QualType, linkage: LanguageLinkage) -> QualType {
        let mut ty = base;
        for op in &self.ptrs {
            ty = match op {
                PtrOp::Pointer(quals) => ty.pointer_to().with_quals(*quals),
                PtrOp::Reference(rvalue) => ty.reference_to(*rvalue),
            };
        }
        for suffix in self.suffixes.iter().rev() {
            ty = match suffix {
                Suffix::Array(bound) => ty.array_of(bound.clone()),
                Suffix::Function(f) => {
                    let ret = f.trailing.clone().unwrap_or(ty);
                    ret.function_returning(f.params.clone(), f.variadic, linkage)
                }
            };
        }
        match &self.inner {
            Some(inner) => inner.apply(ty, linkage),
            None => ty,
        }
    }

    fn outermost(&self) -> Outermost<'_> {
        let inner = self.inner.as_ref().map(|i| i.outermost());
        match inner {
            Some(Outermost::Bare) | None => match self.suffixes.first() {
                Some(Suffix::Function(f)) => Outermost::Function(f),
                Some(Suffix::Array(_)) => Outermost::Other,
                None if !self.ptrs.is_empty() => Outermost::Other,
                None => Outermost::Bare,
            },
            Some(other) => other,
        }
    }

    /// Parameter list attached directly to the declared name, when the
    /// declarator declares a function.
    pub fn function(&self) -> Option<&FunctionSuffix> {
        match self.outermost() {
            Outermost::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Declared name, possibly qualified, looking through parentheses.
    pub fn name(&self) -> Option<&str> {
        match &self.inner {
            Some(inner) => inner.name(),
            None => self.name.as_deref(),
        }
    }

    pub fn position(&self) -> Option<&SourcePos> {
        match &self.inner {
            Some(inner) => inner.position(),
            None => self.pos.as_ref(),
        }
    }

    pub fn simple_name(&self) -> Option<&str> {
        self.name().map(simple_name)
    }
}

/// Last component of a qualified name, ignoring `::` inside template
/// arguments.
pub fn simple_name(name: &str) -> &str {
    let scope = crate::types::scope_of(name);
    if scope.is_empty() {
        name
    } else {
        &name[scope.len() + 2..]
    }
}

impl Parser {
    pub(crate) fn decl_specifiers(&mut self) -> Result<DeclSpec, ParseError> {
        let pos = self.current_pos();
        let mut spec = DeclSpec {
            ty: None,
            flags: SpecFlags::empty(),
            defined: None,
            elaborated: None,
            pos,
        };
        let mut quals = Qualifiers::empty();
        let mut words = PrimitiveWords::default();
        loop {
            self.skip_attributes();
            let Some((kind, text)) = self.peek().map(|t| (t.kind, t.text.clone())) else { break };
            match kind {
                TokenKind::Keyword => match text.as_str() {
                    "const" | "__const" => quals |= Qualifiers::CONST,
                    "volatile" | "__volatile__" => quals |= Qualifiers::VOLATILE,
                    "restrict" | "__restrict" | "__restrict__" | "register" => {}
                    "typedef" => spec.flags |= SpecFlags::TYPEDEF,
                    "static" => spec.flags |= SpecFlags::STATIC,
                    "extern" => spec.flags |= SpecFlags::EXTERN,
                    "inline" | "__inline" | "__inline__" => spec.flags |= SpecFlags::INLINE,
                    "virtual" => spec.flags |= SpecFlags::VIRTUAL,
                    "explicit" => spec.flags |= SpecFlags::EXPLICIT,
                    "mutable" => spec.flags |= SpecFlags::MUTABLE,
                    "constexpr" => spec.flags |= SpecFlags::CONSTEXPR,
                    "friend" => spec.flags |= SpecFlags::FRIEND,
                    "thread_local" | "_Thread_local" => spec.flags |= SpecFlags::THREAD_LOCAL,
                    "struct" | "class" | "union" if spec.ty.is_none() => {
                        let (ty, defined, elaborated) = self.record_specifier()?;
                        spec.ty = Some(ty);
                        spec.defined = defined;
                        spec.elaborated = elaborated;
                        continue;
                    }
                    "enum" if spec.ty.is_none() => {
                        let (ty, defined) = self.enum_specifier()?;
                        spec.ty = Some(ty);
                        spec.defined = defined;
                        continue;
                    }
                    "typename" => {
                        self.bump();
                        if spec.ty.is_none() {
                            spec.ty = Some(self.named_type()?);
                        }
                        continue;
                    }
                    "decltype" => {
                        self.bump();
                        let inner = if self.at_punct("(") {
                            spell(&self.skip_balanced())
                        } else {
                            String::new()
                        };
                        spec.ty = Some(QualType::new(TypeDescriptor::Incomplete(format!("decltype({})", inner))));
                        continue;
                    }
                    "auto" if spec.ty.is_none() && !words.any() => {
                        spec.ty = Some(QualType::new(TypeDescriptor::Incomplete("auto".to_string())));
                    }
                    word if spec.ty.is_none() && words.add(word) => {}
                    _ => break,
                },
                TokenKind::Identifier => {
                    if spec.ty.is_some() || words.any() || self.at_constructor() {
                        break;
                    }
                    spec.ty = Some(self.named_type()?);
                    continue;
                }
                TokenKind::Punct if text == "::" && spec.ty.is_none() && !words.any() => {
                    spec.ty = Some(self.named_type()?);
                    continue;
                }
                _ => break,
            }
            self.bump();
        }
        if spec.ty.is_none() {
            spec.ty = words.primitive().map(QualType::primitive);
        }
        spec.ty = spec.ty.map(|t| t.with_quals(quals));
        Ok(spec)
    }

    /// A possibly qualified type name, with template arguments on any of
    /// its components.
    pub(crate) fn named_type(&mut self) -> Result<QualType, ParseError> {
        self.eat_punct("::");
        let mut spelled = String::new();
        let mut template: Option<(String, Vec<TemplateArg>)>;
        loop {
            let ident = self.expect_identifier()?;
            let path = if spelled.is_empty() {
                ident
            } else {
                format!("{}::{}", spelled, ident)
            };
            if self.at_punct("<") {
                let args = self.template_args()?;
                let tpl = self.resolve_template_name(&path);
                spelled = template_id(&tpl, &args);
                template = Some((tpl, args));
            } else {
                spelled = path;
                template = None;
            }
            if self.at_punct("::") && self.peek_at(1).is_some_and(Token::is_identifier) {
                self.bump();
                continue;
            }
            break;
        }
        if let Some((name, args)) = template {
            return Ok(QualType::new(TypeDescriptor::TemplateId { name, args }));
        }
        // member of a template-id, resolved once the scope is instantiated
        if spelled.contains('<') {
            return Ok(QualType::new(TypeDescriptor::Typedef(spelled)));
        }
        if let Some((index, true)) = self.template_param(&spelled) {
            return Ok(QualType::new(TypeDescriptor::TemplateParam { name: spelled, index }));
        }
        let ty = match self.lookup_known(&spelled) {
            Some((q, Known::Typedef { .. })) => TypeDescriptor::Typedef(q),
            Some((q, Known::Record(kind))) => TypeDescriptor::Record { kind, name: q },
            Some((q, Known::Enum)) => TypeDescriptor::Enum(q),
            _ => TypeDescriptor::Incomplete(spelled),
        };
        Ok(QualType::new(ty))
    }

    pub(crate) fn declarator(&mut self, allow_name: bool, allow_abstract: bool) -> Result<Declarator, ParseError> {
        let mut d = Declarator::default();
        loop {
            self.skip_attributes();
            if self.eat_punct("*") {
                let quals = self.cv_qualifiers();
                d.ptrs.push(PtrOp::Pointer(quals));
            } else if self.eat_punct("&") {
                d.ptrs.push(PtrOp::Reference(false));
            } else if self.eat_punct("&&") {
                d.ptrs.push(PtrOp::Reference(true));
            } else {
                break;
            }
        }
        self.skip_attributes();
        if self.at_punct("(") && self.nested_declarator_follows(allow_name) {
            self.bump();
            let inner = self.declarator(allow_name, allow_abstract)?;
            self.expect_punct(")")?;
            d.inner = Some(Box::new(inner));
        } else if allow_name && self.at_declarator_name() {
            let pos = self.current_pos();
            d.name = Some(self.declarator_name()?);
            d.pos = Some(pos);
        } else if !allow_abstract {
            return Err(self.error_here("declarator"));
        }
        loop {
            self.skip_attributes();
            if self.at_punct("[") && !self.peek_at(1).is_some_and(|t| t.is_punct("[")) {
                let bound = self.array_bound()?;
                d.suffixes.push(Suffix::Array(bound));
            } else if self.at_punct("(") {
                let params = self.parameter_list()?;
                d.suffixes.push(Suffix::Function(params));
            } else {
                break;
            }
        }
        Ok(d)
    }

    fn nested_declarator_follows(&self, allow_name: bool) -> bool {
        let Some(next) = self.peek_at(1) else { return false };
        if next.is_punct("*") || next.is_punct("&") || next.is_punct("&&") {
            return true;
        }
        allow_name && next.is_identifier() && !self.is_known_type(&next.text) && {
            // `(name)` or `(name[...])`, not a parameter list
            self.peek_at(2)
                .is_some_and(|t| t.is_punct(")") || t.is_punct("[") || t.is_punct("("))
        }
    }

    fn at_declarator_name(&self) -> bool {
        match self.peek() {
            Some(t) if t.is_identifier() => true,
            Some(t) if t.is_keyword("operator") => true,
            Some(t) if t.is_punct("::") => true,
            Some(t) if t.is_punct("~") => self.peek_at(1).is_some_and(Token::is_identifier),
            _ => false,
        }
    }

    /// `name`, `ns::name`, `C::~C`, `C::operator()`, `A<int>::f`.
    fn declarator_name(&mut self) -> Result<String, ParseError> {
        let mut name = String::new();
        self.eat_punct("::");
        loop {
            if self.at_keyword("operator") {
                name.push_str(&self.operator_name()?);
                break;
            }
            if self.eat_punct("~") {
                name.push('~');
                name.push_str(&self.expect_identifier()?);
                break;
            }
            let ident = self.expect_identifier()?;
            let component = if self.at_punct("<") && self.template_scope_follows() {
                let args = self.template_args()?;
                template_id(&ident, &args)
            } else {
                ident
            };
            name.push_str(&component);
            if self.at_punct("::") {
                self.bump();
                name.push_str("::");
                continue;
            }
            break;
        }
        Ok(name)
    }

    // `A<...>::` in a declarator name; a bare `<` after a name is never a
    // template-id there.
    fn template_scope_follows(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.pos;
        while let Some(tok) = self.tokens.get(i) {
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "<" => depth += 1,
                    ">" => depth -= 1,
                    ">>" => depth -= 2,
                    ";" | "{" | "}" => return false,
                    _ => {}
                }
                if depth <= 0 {
                    return self.tokens.get(i + 1).is_some_and(|t| t.is_punct("::"));
                }
            }
            i += 1;
        }
        false
    }

    fn operator_name(&mut self) -> Result<String, ParseError> {
        self.bump();
        if self.at_punct("(") && self.peek_at(1).is_some_and(|t| t.is_punct(")")) {
            self.pos += 2;
            return Ok("operator()".to_string());
        }
        if self.at_punct("[") && self.peek_at(1).is_some_and(|t| t.is_punct("]")) {
            self.pos += 2;
            return Ok("operator[]".to_string());
        }
        if self.at_keyword("new") || self.at_keyword("delete") {
            let word = self.bump_text();
            if self.at_punct("[") && self.peek_at(1).is_some_and(|t| t.is_punct("]")) {
                self.pos += 2;
                return Ok(format!("operator {}[]", word));
            }
            return Ok(format!("operator {}", word));
        }
        if let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Punct {
                let text = self.bump_text();
                return Ok(format!("operator{}", text));
            }
            if tok.kind == TokenKind::StringLiteral {
                self.bump();
                let suffix = self.expect_identifier()?;
                return Ok(format!("operator\"\"{}", suffix));
            }
        }
        // conversion function: operator T
        let spec = self.decl_specifiers()?;
        let base = spec.ty.ok_or_else(|| self.error_here("conversion type"))?;
        let mut ty = base;
        while let Some(op) = self.peek().filter(|t| t.is_punct("*") || t.is_punct("&")).map(|t| t.text.clone()) {
            self.bump();
            ty = if op == "*" {
                ty.pointer_to().with_quals(self.cv_qualifiers())
            } else {
                ty.reference_to(false)
            };
        }
        Ok(format!("operator {}", ty))
    }

    pub(crate) fn cv_qualifiers(&mut self) -> Qualifiers {
        let mut quals = Qualifiers::empty();
        loop {
            match self.peek().map(|t| t.text.as_str()) {
                Some("const") | Some("__const") => quals |= Qualifiers::CONST,
                Some("volatile") | Some("__volatile__") => quals |= Qualifiers::VOLATILE,
                Some("restrict") | Some("__restrict") | Some("__restrict__") => {}
                _ => return quals,
            }
            self.bump();
        }
    }

    fn array_bound(&mut self) -> Result<ArrayBound, ParseError> {
        let pos = self.current_pos();
        let tokens = self.skip_balanced();
        if tokens.is_empty() {
            return Ok(ArrayBound::Unknown);
        }
        match self.eval_tokens(&tokens) {
            Ok(v) if v >= 0 => Ok(ArrayBound::Fixed(v as u64)),
            Ok(v) => {
                self.errors.push(ParseError::InvalidConstant {
                    position: pos,
                    expr: spell(&tokens),
                    message: format!("negative array bound {}", v),
                });
                Ok(ArrayBound::Unknown)
            }
            Err(_) => Ok(ArrayBound::Expr(spell(&tokens))),
        }
    }

    fn parameter_list(&mut self) -> Result<FunctionSuffix, ParseError> {
        self.expect_punct("(")?;
        let mut f = FunctionSuffix::default();
        let void_only = self.at_keyword("void") && self.peek_at(1).is_some_and(|t| t.is_punct(")"));
        if void_only {
            self.bump();
        }
        if !self.eat_punct(")") {
            loop {
                if self.eat_punct("...") {
                    f.variadic = true;
                    self.expect_punct(")")?;
                    break;
                }
                let spec = self.decl_specifiers()?;
                let base = spec.ty.ok_or_else(|| self.error_here("parameter type"))?;
                let d = self.declarator(true, true)?;
                f.params.push(d.apply(base, self.function_linkage()));
                f.names.push(d.simple_name().map(str::to_string));
                if self.eat_punct("=") {
                    self.collect_expression(&[",", ")"]);
                }
                if self.eat_punct(",") {
                    continue;
                }
                self.expect_punct(")")?;
                break;
            }
        }
        loop {
            let quals = self.cv_qualifiers();
            if quals.contains(Qualifiers::CONST) {
                f.is_const = true;
            }
            if self.at_keyword("noexcept") || self.at_keyword("throw") {
                self.bump();
                if self.at_punct("(") {
                    self.skip_balanced();
                }
                continue;
            }
            if quals.is_empty() {
                break;
            }
        }
        if self.eat_punct("->") {
            let spec = self.decl_specifiers()?;
            let base = spec.ty.ok_or_else(|| self.error_here("trailing return type"))?;
            let d = self.declarator(false, true)?;
            f.trailing = Some(d.apply(base, self.function_linkage()));
        }
        Ok(f)
    }

    /// `<arg, ...>` of a template-id. A `>>` closing two lists is split.
    pub(crate) fn template_args(&mut self) -> Result<Vec<TemplateArg>, ParseError> {
        self.expect_punct("<")?;
        let mut args = Vec::new();
        if self.eat_close_angle() {
            return Ok(args);
        }
        loop {
            args.push(self.template_arg()?);
            if self.eat_punct(",") {
                continue;
            }
            if self.eat_close_angle() {
                return Ok(args);
            }
            return Err(self.error_here("',' or '>'"));
        }
    }

    fn template_arg(&mut self) -> Result<TemplateArg, ParseError> {
        if self.starts_type_id() {
            let spec = self.decl_specifiers()?;
            let base = spec.ty.ok_or_else(|| self.error_here("template argument"))?;
            let d = self.declarator(false, true)?;
            return Ok(TemplateArg::Type(d.apply(base, self.function_linkage())));
        }
        let tokens = self.collect_expression(&[",", ">", ">>"]);
        if tokens.is_empty() {
            return Err(self.error_here("template argument"));
        }
        if let [tok] = tokens.as_slice() {
            if let Some((index, false)) = self.template_param(&tok.text) {
                return Ok(TemplateArg::ValueParam {
                    name: tok.text.clone(),
                    index,
                });
            }
        }
        match self.eval_tokens(&tokens) {
            Ok(v) => Ok(TemplateArg::Value(v)),
            Err(_) => Ok(TemplateArg::Expr(spell(&tokens))),
        }
    }

    pub(crate) fn starts_type_id(&self) -> bool {
        let Some(tok) = self.peek() else { return false };
        match tok.kind {
            TokenKind::Keyword => TYPE_KEYWORDS.contains(&tok.text.as_str()),
            TokenKind::Identifier => self.is_type_name(&tok.text),
            TokenKind::Punct => tok.text == "::",
            _ => false,
        }
    }

    /// Identifiers are type names unless they name a constant or a
    /// non-type template parameter.
    pub(crate) fn is_type_name(&self, name: &str) -> bool {
        if let Some((_, is_type)) = self.template_param(name) {
            return is_type;
        }
        self.constant(name).is_none()
    }

    pub(crate) fn eval_tokens(&self, tokens: &[Token]) -> Result<i64, EvalError> {
        evaluate(tokens, |name, pos| {
            self.constant(name).ok_or_else(|| EvalError::Unresolved {
                name: name.to_string(),
                pos: pos.clone(),
            })
        })
    }

    pub(crate) fn constant(&self, name: &str) -> Option<i64> {
        scoped_candidates(name, &self.scope_prefix())
            .iter()
            .find_map(|c| self.constants.get(c).copied())
    }

    /// Tokens up to (not including) the first of `stops` outside brackets.
    pub(crate) fn collect_expression(&mut self, stops: &[&str]) -> Vec<Token> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Punct {
                let text = tok.text.as_str();
                if depth == 0 && stops.contains(&text) {
                    break;
                }
                match text {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        if depth == 0 {
                            break;
                        }
                        depth -= 1;
                    }
                    ";" if depth == 0 => break,
                    _ => {}
                }
            }
            out.push(tok.clone());
            self.bump();
        }
        out
    }

    pub(crate) fn function_linkage(&self) -> LanguageLinkage {
        self.linkage.unwrap_or(LanguageLinkage::Cxx)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_type;
    use crate::types::{ArrayBound, PrimitiveType, QualType, Qualifiers, TypeDescriptor};

    fn int() -> QualType {
        QualType::primitive(PrimitiveType::Int)
    }

    #[test]
    fn test_right_left_rule() {
        let (name, ty) = parse_type("int (*(*foo1)(void))[3]").unwrap();
        assert_eq!(name.as_deref(), Some("foo1"));
        let expected = int()
            .array_of(ArrayBound::Fixed(3))
            .pointer_to()
            .function_returning(vec![], false, crate::types::LanguageLinkage::Cxx)
            .pointer_to();
        assert_eq!(ty, expected);
    }

    #[test]
    fn test_primitive_combinations() {
        let (_, ty) = parse_type("unsigned long long x").unwrap();
        assert_eq!(ty, QualType::primitive(PrimitiveType::ULongLong));
        let (_, ty) = parse_type("long double").unwrap();
        assert_eq!(ty, QualType::primitive(PrimitiveType::LongDouble));
        let (_, ty) = parse_type("signed *x").unwrap();
        assert_eq!(ty, int().pointer_to());
        let (_, ty) = parse_type("short int *s").unwrap();
        assert_eq!(ty, QualType::primitive(PrimitiveType::Short).pointer_to());
    }

    #[test]
    fn test_const_placement() {
        let (_, a) = parse_type("unsigned char const* cs1").unwrap();
        let (_, b) = parse_type("unsigned const char* cs2").unwrap();
        assert_eq!(a, b);
        let (_, c) = parse_type("unsigned char* const constp").unwrap();
        assert_eq!(c.quals, Qualifiers::CONST);
        let (_, d) = parse_type("char const (* const CP1[2])[3]").unwrap();
        match &d.ty {
            TypeDescriptor::Array { element, bound } => {
                assert_eq!(*bound, ArrayBound::Fixed(2));
                assert!(element.is_const() && element.is_pointer());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_function_pointer_params() {
        let (name, ty) = parse_type("int (*foo)(int, char c, unsigned x, void*)").unwrap();
        assert_eq!(name.as_deref(), Some("foo"));
        let TypeDescriptor::Pointer(target) = &ty.ty else { panic!("not a pointer") };
        let f = target.as_function().unwrap();
        assert_eq!(f.params.len(), 4);
        assert_eq!(f.params[2], QualType::primitive(PrimitiveType::UInt));
        let (_, ty) = parse_type("int (*fox)(unk, char c)").unwrap();
        let TypeDescriptor::Pointer(target) = &ty.ty else { panic!("not a pointer") };
        assert_eq!(
            target.as_function().unwrap().params[0].ty,
            TypeDescriptor::Incomplete("unk".to_string())
        );
    }

    #[test]
    fn test_member_of_template_id() {
        let (_, ty) = parse_type("vec<int>::iterator it").unwrap();
        match &ty.ty {
            TypeDescriptor::Typedef(name) => {
                assert!(name.starts_with("vec<"), "{name}");
                assert!(name.ends_with(">::iterator"), "{name}");
            }
            other => panic!("unexpected {other:?}"),
        }
        let (_, ty) = parse_type("ns::vec<int> v").unwrap();
        match &ty.ty {
            TypeDescriptor::TemplateId { name, args } => {
                assert_eq!(name, "ns::vec");
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
