// Wed Oct 14 2026 - Alex

use bitflags::bitflags;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Qualifiers: u8 {
        const CONST = 0b01;
        const VOLATILE = 0b10;
    }
}

impl Qualifiers {
    pub fn spelling(&self) -> String {
        let mut parts = Vec::new();
        if self.contains(Qualifiers::CONST) {
            parts.push("const");
        }
        if self.contains(Qualifiers::VOLATILE) {
            parts.push("volatile");
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Void,
    Bool,
    Char,
    SChar,
    UChar,
    WChar,
    Char8,
    Char16,
    Char32,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Int128,
    UInt128,
    Float,
    Double,
    LongDouble,
    NullPtr,
}

impl PrimitiveType {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Void => "void",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Char => "char",
            PrimitiveType::SChar => "signed char",
            PrimitiveType::UChar => "unsigned char",
            PrimitiveType::WChar => "wchar_t",
            PrimitiveType::Char8 => "char8_t",
            PrimitiveType::Char16 => "char16_t",
            PrimitiveType::Char32 => "char32_t",
            PrimitiveType::Short => "short",
            PrimitiveType::UShort => "unsigned short",
            PrimitiveType::Int => "int",
            PrimitiveType::UInt => "unsigned int",
            PrimitiveType::Long => "long",
            PrimitiveType::ULong => "unsigned long",
            PrimitiveType::LongLong => "long long",
            PrimitiveType::ULongLong => "unsigned long long",
            PrimitiveType::Int128 => "__int128",
            PrimitiveType::UInt128 => "unsigned __int128",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::LongDouble => "long double",
            PrimitiveType::NullPtr => "std::nullptr_t",
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            PrimitiveType::Void
                | PrimitiveType::Float
                | PrimitiveType::Double
                | PrimitiveType::LongDouble
                | PrimitiveType::NullPtr
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, PrimitiveType::Float | PrimitiveType::Double | PrimitiveType::LongDouble)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            PrimitiveType::Char
                | PrimitiveType::SChar
                | PrimitiveType::Short
                | PrimitiveType::Int
                | PrimitiveType::Long
                | PrimitiveType::LongLong
                | PrimitiveType::Int128
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Struct,
    Class,
    Union,
}

impl RecordKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            RecordKind::Struct => "struct",
            RecordKind::Class => "class",
            RecordKind::Union => "union",
        }
    }
}

/// Language linkage of a function type or a declared name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageLinkage {
    C,
    Cxx,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayBound {
    Fixed(u64),
    Unknown,
    /// Bound that could not be evaluated yet, typically because it names a
    /// template parameter. Kept as source text.
    Expr(String),
}

impl fmt::Display for ArrayBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayBound::Fixed(n) => write!(f, "{}", n),
            ArrayBound::Unknown => Ok(()),
            ArrayBound::Expr(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub ret: QualType,
    pub params: Vec<QualType>,
    pub variadic: bool,
    pub linkage: LanguageLinkage,
}

impl FunctionType {
    pub fn new(ret: QualType, params: Vec<QualType>) -> Self {
        Self {
            ret,
            params,
            variadic: false,
            linkage: LanguageLinkage::Cxx,
        }
    }

    pub fn with_linkage(mut self, linkage: LanguageLinkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn with_variadic(mut self, variadic: bool) -> Self {
        self.variadic = variadic;
        self
    }

    /// `(int, char *)` style parameter list.
    pub fn params_spelling(&self) -> String {
        let mut parts: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        if self.variadic {
            parts.push("...".to_string());
        }
        if parts.is_empty() {
            "(void)".to_string()
        } else {
            format!("({})", parts.join(", "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateArg {
    Type(QualType),
    Value(i64),
    /// Reference to a non-type template parameter.
    ValueParam { name: String, index: usize },
    /// Non-type argument that is not a constant yet.
    Expr(String),
}

impl fmt::Display for TemplateArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateArg::Type(t) => write!(f, "{}", t),
            TemplateArg::Value(v) => write!(f, "{}", v),
            TemplateArg::ValueParam { name, .. } => write!(f, "{}", name),
            TemplateArg::Expr(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDescriptor {
    Primitive(PrimitiveType),
    Pointer(Box<QualType>),
    Reference { target: Box<QualType>, rvalue: bool },
    Array { element: Box<QualType>, bound: ArrayBound },
    Function(Box<FunctionType>),
    Record { kind: RecordKind, name: String },
    Enum(String),
    Typedef(String),
    TemplateParam { name: String, index: usize },
    TemplateId { name: String, args: Vec<TemplateArg> },
    /// Name used as a type before anything declared it.
    Incomplete(String),
}

/// A type together with its top-level cv-qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualType {
    pub ty: TypeDescriptor,
    pub quals: Qualifiers,
}

impl QualType {
    pub fn new(ty: TypeDescriptor) -> Self {
        Self {
            ty,
            quals: Qualifiers::empty(),
        }
    }

    pub fn primitive(p: PrimitiveType) -> Self {
        Self::new(TypeDescriptor::Primitive(p))
    }

    pub fn void() -> Self {
        Self::primitive(PrimitiveType::Void)
    }

    pub fn record(kind: RecordKind, name: &str) -> Self {
        Self::new(TypeDescriptor::Record {
            kind,
            name: name.to_string(),
        })
    }

    pub fn with_quals(mut self, quals: Qualifiers) -> Self {
        self.quals |= quals;
        self
    }

    pub fn pointer_to(self) -> Self {
        Self::new(TypeDescriptor::Pointer(Box::new(self)))
    }

    pub fn reference_to(self, rvalue: bool) -> Self {
        Self::new(TypeDescriptor::Reference {
            target: Box::new(self),
            rvalue,
        })
    }

    pub fn array_of(self, bound: ArrayBound) -> Self {
        Self::new(TypeDescriptor::Array {
            element: Box::new(self),
            bound,
        })
    }

    pub fn function_returning(self, params: Vec<QualType>, variadic: bool, linkage: LanguageLinkage) -> Self {
        Self::new(TypeDescriptor::Function(Box::new(FunctionType {
            ret: self,
            params,
            variadic,
            linkage,
        })))
    }

    pub fn is_const(&self) -> bool {
        self.quals.contains(Qualifiers::CONST)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.ty, TypeDescriptor::Pointer(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.ty, TypeDescriptor::Function(_))
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match &self.ty {
            TypeDescriptor::Function(f) => Some(f),
            _ => None,
        }
    }

    /// True if a template parameter occurs anywhere inside.
    pub fn is_dependent(&self) -> bool {
        let mut dependent = false;
        self.walk(&mut |t| {
            if matches!(t, TypeDescriptor::TemplateParam { .. }) {
                dependent = true;
            }
        });
        dependent
    }

    /// Visits this type and every type nested in it, outermost first.
    pub fn walk(&self, f: &mut dyn FnMut(&TypeDescriptor)) {
        f(&self.ty);
        match &self.ty {
            TypeDescriptor::Pointer(t) => t.walk(f),
            TypeDescriptor::Reference { target, .. } => target.walk(f),
            TypeDescriptor::Array { element, .. } => element.walk(f),
            TypeDescriptor::Function(func) => {
                func.ret.walk(f);
                for p in &func.params {
                    p.walk(f);
                }
            }
            TypeDescriptor::TemplateId { args, .. } => {
                for arg in args {
                    if let TemplateArg::Type(t) = arg {
                        t.walk(f);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut TypeDescriptor)) {
        f(&mut self.ty);
        match &mut self.ty {
            TypeDescriptor::Pointer(t) => t.walk_mut(f),
            TypeDescriptor::Reference { target, .. } => target.walk_mut(f),
            TypeDescriptor::Array { element, .. } => element.walk_mut(f),
            TypeDescriptor::Function(func) => {
                func.ret.walk_mut(f);
                for p in func.params.iter_mut() {
                    p.walk_mut(f);
                }
            }
            TypeDescriptor::TemplateId { args, .. } => {
                for arg in args.iter_mut() {
                    if let TemplateArg::Type(t) = arg {
                        t.walk_mut(f);
                    }
                }
            }
            _ => {}
        }
    }

    /// Spells a declaration of `name` with this type, e.g.
    /// `int (*(*foo1)(void))[3]`. An empty name gives the abstract type.
    pub fn declare(&self, name: &str) -> String {
        declarator(self, name.to_string())
    }
}

impl fmt::Display for QualType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.declare(""))
    }
}

fn base_spelling(ty: &TypeDescriptor) -> String {
    match ty {
        TypeDescriptor::Primitive(p) => p.name().to_string(),
        TypeDescriptor::Record { kind, name } => format!("{} {}", kind.keyword(), name),
        TypeDescriptor::Enum(name) => format!("enum {}", name),
        TypeDescriptor::Typedef(name)
        | TypeDescriptor::TemplateParam { name, .. }
        | TypeDescriptor::Incomplete(name) => name.clone(),
        TypeDescriptor::TemplateId { name, args } => template_id(name, args),
        _ => String::new(),
    }
}

pub fn template_id(name: &str, args: &[TemplateArg]) -> String {
    let inner = args.iter().map(|a| a.to_string()).join(", ");
    if inner.ends_with('>') {
        format!("{}<{} >", name, inner)
    } else {
        format!("{}<{}>", name, inner)
    }
}

fn with_quals(inner: &str, quals: Qualifiers) -> String {
    if quals.is_empty() {
        inner.to_string()
    } else if inner.is_empty() {
        quals.spelling()
    } else {
        format!("{} {}", quals.spelling(), inner)
    }
}

// Builds the declarator inside-out: each layer wraps the text accumulated
// for the layers outside of it.
fn declarator(ty: &QualType, inner: String) -> String {
    match &ty.ty {
        TypeDescriptor::Pointer(target) | TypeDescriptor::Reference { target, .. } => {
            let sigil = match &ty.ty {
                TypeDescriptor::Reference { rvalue: true, .. } => "&&",
                TypeDescriptor::Reference { .. } => "&",
                _ => "*",
            };
            let mut text = format!("{}{}", sigil, with_quals(&inner, ty.quals));
            if matches!(target.ty, TypeDescriptor::Array { .. } | TypeDescriptor::Function(_)) {
                text = format!("({})", text);
            }
            declarator(target, text)
        }
        TypeDescriptor::Array { element, bound } => declarator(element, format!("{}[{}]", inner, bound)),
        TypeDescriptor::Function(func) => {
            declarator(&func.ret, format!("{}{}", inner, func.params_spelling()))
        }
        other => {
            let base = with_quals(&base_spelling(other), ty.quals);
            if inner.is_empty() {
                base
            } else {
                format!("{} {}", base, inner)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> QualType {
        QualType::primitive(PrimitiveType::Int)
    }

    #[test]
    fn test_complex_declarator_spelling() {
        // int (*(*foo1)(void))[3]
        let ty = int()
            .array_of(ArrayBound::Fixed(3))
            .pointer_to()
            .function_returning(vec![], false, LanguageLinkage::Cxx)
            .pointer_to();
        assert_eq!(ty.declare("foo1"), "int (*(*foo1)(void))[3]");
        assert_eq!(ty.to_string(), "int (*(*)(void))[3]");
    }

    #[test]
    fn test_qualified_pointers() {
        let cp = QualType::primitive(PrimitiveType::UChar)
            .with_quals(Qualifiers::CONST)
            .pointer_to();
        assert_eq!(cp.declare("ptr"), "const unsigned char *ptr");
        let constp = QualType::primitive(PrimitiveType::UChar)
            .pointer_to()
            .with_quals(Qualifiers::CONST);
        assert_eq!(constp.declare("constp"), "unsigned char *const constp");
    }

    #[test]
    fn test_template_id_spelling() {
        let args = vec![
            TemplateArg::Type(int()),
            TemplateArg::Type(int().pointer_to()),
            TemplateArg::Value(5),
        ];
        assert_eq!(template_id("A", &args), "A<int, int *, 5>");
    }

    #[test]
    fn test_dependent_detection() {
        let t = QualType::new(TypeDescriptor::TemplateParam {
            name: "T".to_string(),
            index: 0,
        })
        .pointer_to();
        assert!(t.is_dependent());
        assert!(!int().pointer_to().is_dependent());
    }
}
