// Wed Oct 14 2026 - Alex

pub mod declarator;
pub mod error;
pub mod format;
pub mod syntax;

pub use declarator::{simple_name, SpecFlags};
pub use error::ParseError;
pub use format::CFormatter;
pub use syntax::Parser;

use crate::lexer::{tokenize, Token};
use crate::types::{Declaration, LanguageLinkage, QualType, TemplateArg, TypeDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Source language of a unit. C hoists tags declared inside a struct body
/// to file scope; C++ nests them in the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    #[default]
    Cxx,
}

impl Language {
    /// `.c` and `.h` files are C, everything else C++.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("c") | Some("h") => Language::C,
            _ => Language::Cxx,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::C => write!(f, "c"),
            Language::Cxx => write!(f, "c++"),
        }
    }
}

/// Declarations in source order plus the syntax errors recovered from.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub declarations: Vec<Declaration>,
    pub errors: Vec<ParseError>,
}

pub fn parse_tokens(tokens: Vec<Token>, language: Language) -> ParseOutput {
    Parser::new(tokens, language).parse()
}

/// Parses text that needs no preprocessing.
pub fn parse_source(name: &str, text: &str, language: Language) -> Result<ParseOutput, ParseError> {
    let tokens = tokenize(name, text)?;
    Ok(parse_tokens(tokens, language))
}

/// Parses a single type, optionally naming a declarator:
/// `int (*(*foo1)(void))[3]` gives `foo1` and its type.
pub fn parse_type(text: &str) -> Result<(Option<String>, QualType), ParseError> {
    let tokens = tokenize("<type>", text)?;
    let mut parser = Parser::new(tokens, Language::Cxx);
    let spec = parser.decl_specifiers()?;
    let base = spec.ty.ok_or_else(|| parser.error_here("type specifier"))?;
    let d = parser.declarator(true, true)?;
    parser.eat_punct(";");
    if !parser.at_end() {
        return Err(parser.error_here("end of type"));
    }
    let name = d.name().map(str::to_string);
    Ok((name, d.apply(base, LanguageLinkage::Cxx)))
}

/// Splits `A<int, T *, 5>` into the template name and its arguments.
pub fn parse_template_id(text: &str) -> Option<(String, Vec<TemplateArg>)> {
    let tokens = tokenize("<template-id>", text).ok()?;
    let mut parser = Parser::new(tokens, Language::Cxx);
    let ty = parser.named_type().ok()?;
    if !parser.at_end() {
        return None;
    }
    match ty.ty {
        TypeDescriptor::TemplateId { name, args } => Some((name, args)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveType, QualType};

    #[test]
    fn test_parse_template_id() {
        let (name, args) = parse_template_id("A<int, int *, 5>").unwrap();
        assert_eq!(name, "A");
        assert_eq!(args[1], TemplateArg::Type(QualType::primitive(PrimitiveType::Int).pointer_to()));
        assert_eq!(args[2], TemplateArg::Value(5));
        let (name, args) = parse_template_id("ns::vec<ns::vec<char> >").unwrap();
        assert_eq!(name, "ns::vec");
        assert!(matches!(&args[0], TemplateArg::Type(t) if matches!(&t.ty, TypeDescriptor::TemplateId { .. })));
        assert!(parse_template_id("plain").is_none());
    }

    #[test]
    fn test_nested_template_close() {
        let (_, ty) = parse_type("vec<vec<int>> v").unwrap();
        let TypeDescriptor::TemplateId { args, .. } = &ty.ty else { panic!("not a template-id") };
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path(Path::new("a/b.h")), Language::C);
        assert_eq!(Language::from_path(Path::new("x.hpp")), Language::Cxx);
    }
}
