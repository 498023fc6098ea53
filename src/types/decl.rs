// Wed Oct 14 2026 - Alex

use crate::lexer::SourcePos;
use crate::template::TemplateDeclaration;
use crate::types::descriptor::{FunctionType, LanguageLinkage, QualType, RecordKind, TemplateArg};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessSpecifier {
    Public,
    Protected,
    Private,
}

impl AccessSpecifier {
    pub fn default_for(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Class => AccessSpecifier::Private,
            _ => AccessSpecifier::Public,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            AccessSpecifier::Public => "public",
            AccessSpecifier::Protected => "protected",
            AccessSpecifier::Private => "private",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDescriptor {
    /// `None` for anonymous bitfields and anonymous struct/union members.
    pub name: Option<String>,
    pub ty: QualType,
    pub bit_width: Option<u32>,
    pub access: AccessSpecifier,
    pub is_static: bool,
    pub is_mutable: bool,
    /// Initializer text, never evaluated.
    pub default_init: Option<String>,
    pub pos: Option<SourcePos>,
}

impl MemberDescriptor {
    pub fn new(name: Option<String>, ty: QualType) -> Self {
        Self {
            name,
            ty,
            bit_width: None,
            access: AccessSpecifier::Public,
            is_static: false,
            is_mutable: false,
            default_init: None,
            pos: None,
        }
    }

    pub fn with_bit_width(mut self, width: u32) -> Self {
        self.bit_width = Some(width);
        self
    }

    pub fn with_access(mut self, access: AccessSpecifier) -> Self {
        self.access = access;
        self
    }

    pub fn is_bitfield(&self) -> bool {
        self.bit_width.is_some()
    }

    /// Unnamed member of record type whose fields join the enclosing scope.
    pub fn is_anonymous_aggregate(&self) -> bool {
        self.name.is_none() && self.bit_width.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseClassEdge {
    pub base: QualType,
    pub is_virtual: bool,
    pub access: AccessSpecifier,
}

impl BaseClassEdge {
    pub fn new(base: QualType, is_virtual: bool, access: AccessSpecifier) -> Self {
        Self {
            base,
            is_virtual,
            access,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MethodFlags: u16 {
        const VIRTUAL = 1 << 0;
        const PURE = 1 << 1;
        const OVERRIDE = 1 << 2;
        const FINAL = 1 << 3;
        const STATIC = 1 << 4;
        const CONST = 1 << 5;
        const DEFAULTED = 1 << 6;
        const DELETED = 1 << 7;
        const INLINE = 1 << 8;
        const EXPLICIT = 1 << 9;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    Normal,
    Constructor,
    Destructor,
    Operator,
    Conversion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    pub kind: MethodKind,
    pub ty: FunctionType,
    pub param_names: Vec<Option<String>>,
    pub flags: MethodFlags,
    pub access: AccessSpecifier,
    pub pos: Option<SourcePos>,
}

impl MethodDecl {
    pub fn is_virtual(&self) -> bool {
        self.flags.intersects(MethodFlags::VIRTUAL | MethodFlags::OVERRIDE | MethodFlags::FINAL)
    }

    pub fn is_pure(&self) -> bool {
        self.flags.contains(MethodFlags::PURE)
    }

    /// Key under which an overrider replaces a base slot, spelled the C++
    /// way (`f()`, not `f(void)`). Destructors of
    /// different classes override each other, so they share one selector.
    pub fn selector(&self) -> String {
        match self.kind {
            MethodKind::Destructor => "~()".to_string(),
            _ => {
                let cv = if self.flags.contains(MethodFlags::CONST) {
                    " const"
                } else {
                    ""
                };
                let mut params: Vec<String> = self.ty.params.iter().map(|p| p.to_string()).collect();
                if self.ty.variadic {
                    params.push("...".to_string());
                }
                format!("{}({}){}", self.name, params.join(", "), cv)
            }
        }
    }
}

/// Records which template and argument list a concrete record came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateOrigin {
    pub template: String,
    pub args: Vec<TemplateArg>,
    /// Index of the selected partial specialization, `None` for the primary.
    pub specialization: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDef {
    pub name: String,
    pub kind: RecordKind,
    pub members: Vec<MemberDescriptor>,
    pub bases: Vec<BaseClassEdge>,
    pub methods: Vec<MethodDecl>,
    /// Qualified names of the types declared inside the body.
    pub nested: Vec<String>,
    /// `using Base::name;` declarations, spelled as written.
    pub usings: Vec<String>,
    /// Qualified names of member templates.
    pub member_templates: Vec<String>,
    pub template_origin: Option<TemplateOrigin>,
    pub pos: Option<SourcePos>,
}

impl RecordDef {
    pub fn new(name: &str, kind: RecordKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            members: Vec::new(),
            bases: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
            usings: Vec::new(),
            member_templates: Vec::new(),
            template_origin: None,
            pos: None,
        }
    }

    pub fn is_union(&self) -> bool {
        self.kind == RecordKind::Union
    }

    pub fn is_anonymous(&self) -> bool {
        is_anonymous_name(&self.name)
    }

    pub fn declares_virtual(&self) -> bool {
        self.methods.iter().any(|m| m.is_virtual())
    }

    pub fn has_virtual_bases(&self) -> bool {
        self.bases.iter().any(|b| b.is_virtual)
    }

    /// Non-static data members, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members.iter().filter(|m| !m.is_static)
    }

    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name.as_deref() == Some(name))
    }
}

/// Synthesized names of anonymous aggregates start with `?_`.
pub fn is_anonymous_name(name: &str) -> bool {
    name.rsplit("::").next().is_some_and(|last| last.starts_with("?_"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enumerator {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub scoped: bool,
    pub underlying: Option<QualType>,
    pub enumerators: Vec<Enumerator>,
    pub pos: Option<SourcePos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedefDecl {
    pub name: String,
    pub ty: QualType,
    pub pos: Option<SourcePos>,
}

impl TypedefDecl {
    pub fn is_builtin(&self) -> bool {
        self.pos.as_ref().is_some_and(SourcePos::is_builtin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageLinkage {
    External,
    Internal,
    None,
}

/// Linkage of a declared name. Independent from the language linkage of the
/// name's function type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameLinkage {
    pub storage: StorageLinkage,
    pub language: Option<LanguageLinkage>,
}

impl NameLinkage {
    pub fn external(language: LanguageLinkage) -> Self {
        Self {
            storage: StorageLinkage::External,
            language: Some(language),
        }
    }

    pub fn internal() -> Self {
        Self {
            storage: StorageLinkage::Internal,
            language: None,
        }
    }
}

impl Default for NameLinkage {
    fn default() -> Self {
        Self::external(LanguageLinkage::Cxx)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    /// Always a `TypeDescriptor::Function`, possibly reached through a typedef.
    pub ty: QualType,
    pub param_names: Vec<Option<String>>,
    pub linkage: NameLinkage,
    pub is_definition: bool,
    pub pos: Option<SourcePos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub ty: QualType,
    pub linkage: NameLinkage,
    pub pos: Option<SourcePos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroDecl {
    pub name: String,
    pub params: Option<Vec<String>>,
    pub text: String,
    /// Integer value when the replacement is a constant expression.
    pub value: Option<i64>,
    pub pos: Option<SourcePos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumeratorDecl {
    pub name: String,
    pub value: i64,
    pub enum_name: String,
    pub pos: Option<SourcePos>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclKind {
    Typedef,
    Struct,
    Class,
    Union,
    Forward,
    Enum,
    Function,
    Variable,
    Template,
    Macro,
    Enumerator,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeclKind::Typedef => "typedef",
            DeclKind::Struct => "struct",
            DeclKind::Class => "class",
            DeclKind::Union => "union",
            DeclKind::Forward => "forward",
            DeclKind::Enum => "enum",
            DeclKind::Function => "function",
            DeclKind::Variable => "variable",
            DeclKind::Template => "template",
            DeclKind::Macro => "macro",
            DeclKind::Enumerator => "enumerator",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    Typedef(TypedefDecl),
    Record(RecordDef),
    ForwardRecord {
        name: String,
        kind: RecordKind,
        pos: Option<SourcePos>,
    },
    Enum(EnumDef),
    Function(FunctionDecl),
    Variable(VariableDecl),
    Template(TemplateDeclaration),
    Macro(MacroDecl),
    Enumerator(EnumeratorDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Typedef(d) => &d.name,
            Declaration::Record(d) => &d.name,
            Declaration::ForwardRecord { name, .. } => name,
            Declaration::Enum(d) => &d.name,
            Declaration::Function(d) => &d.name,
            Declaration::Variable(d) => &d.name,
            Declaration::Template(d) => &d.name,
            Declaration::Macro(d) => &d.name,
            Declaration::Enumerator(d) => &d.name,
        }
    }

    pub fn kind(&self) -> DeclKind {
        match self {
            Declaration::Typedef(_) => DeclKind::Typedef,
            Declaration::Record(r) => match r.kind {
                RecordKind::Struct => DeclKind::Struct,
                RecordKind::Class => DeclKind::Class,
                RecordKind::Union => DeclKind::Union,
            },
            Declaration::ForwardRecord { .. } => DeclKind::Forward,
            Declaration::Enum(_) => DeclKind::Enum,
            Declaration::Function(_) => DeclKind::Function,
            Declaration::Variable(_) => DeclKind::Variable,
            Declaration::Template(_) => DeclKind::Template,
            Declaration::Macro(_) => DeclKind::Macro,
            Declaration::Enumerator(_) => DeclKind::Enumerator,
        }
    }

    pub fn pos(&self) -> Option<&SourcePos> {
        match self {
            Declaration::Typedef(d) => d.pos.as_ref(),
            Declaration::Record(d) => d.pos.as_ref(),
            Declaration::ForwardRecord { pos, .. } => pos.as_ref(),
            Declaration::Enum(d) => d.pos.as_ref(),
            Declaration::Function(d) => d.pos.as_ref(),
            Declaration::Variable(d) => d.pos.as_ref(),
            Declaration::Template(d) => d.pos.as_ref(),
            Declaration::Macro(d) => d.pos.as_ref(),
            Declaration::Enumerator(d) => d.pos.as_ref(),
        }
    }

    pub fn rename(&mut self, new_name: String) {
        match self {
            Declaration::Typedef(d) => d.name = new_name,
            Declaration::Record(d) => d.name = new_name,
            Declaration::ForwardRecord { name, .. } => *name = new_name,
            Declaration::Enum(d) => d.name = new_name,
            Declaration::Function(d) => d.name = new_name,
            Declaration::Variable(d) => d.name = new_name,
            Declaration::Template(d) => d.name = new_name,
            Declaration::Macro(d) => d.name = new_name,
            Declaration::Enumerator(d) => d.name = new_name,
        }
    }

    /// Struct, union, class and enum names live in the tag namespace.
    pub fn is_tag(&self) -> bool {
        matches!(
            self,
            Declaration::Record(_) | Declaration::ForwardRecord { .. } | Declaration::Enum(_)
        )
    }

    pub fn is_builtin(&self) -> bool {
        self.pos().is_some_and(SourcePos::is_builtin)
    }

    pub fn as_record(&self) -> Option<&RecordDef> {
        match self {
            Declaration::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&TemplateDeclaration> {
        match self {
            Declaration::Template(t) => Some(t),
            _ => None,
        }
    }

    /// Visits every type stored in the declaration.
    pub fn types(&self, f: &mut dyn FnMut(&QualType)) {
        match self {
            Declaration::Typedef(d) => f(&d.ty),
            Declaration::Record(r) => record_types(r, f),
            Declaration::Enum(e) => {
                if let Some(u) = e.underlying.as_ref() {
                    f(u);
                }
            }
            Declaration::Function(d) => f(&d.ty),
            Declaration::Variable(d) => f(&d.ty),
            Declaration::Template(t) => t.types(f),
            Declaration::ForwardRecord { .. } | Declaration::Macro(_) | Declaration::Enumerator(_) => {}
        }
    }

    pub fn types_mut(&mut self, f: &mut dyn FnMut(&mut QualType)) {
        match self {
            Declaration::Typedef(d) => f(&mut d.ty),
            Declaration::Record(r) => record_types_mut(r, f),
            Declaration::Enum(e) => {
                if let Some(u) = e.underlying.as_mut() {
                    f(u);
                }
            }
            Declaration::Function(d) => f(&mut d.ty),
            Declaration::Variable(d) => f(&mut d.ty),
            Declaration::Template(t) => t.types_mut(f),
            Declaration::ForwardRecord { .. } | Declaration::Macro(_) | Declaration::Enumerator(_) => {}
        }
    }
}

pub fn record_types(record: &RecordDef, f: &mut dyn FnMut(&QualType)) {
    for member in &record.members {
        f(&member.ty);
    }
    for base in &record.bases {
        f(&base.base);
    }
    for method in &record.methods {
        f(&method.ty.ret);
        for p in &method.ty.params {
            f(p);
        }
    }
}

pub fn record_types_mut(record: &mut RecordDef, f: &mut dyn FnMut(&mut QualType)) {
    for member in record.members.iter_mut() {
        f(&mut member.ty);
    }
    for base in record.bases.iter_mut() {
        f(&mut base.base);
    }
    for method in record.methods.iter_mut() {
        f(&mut method.ty.ret);
        for p in method.ty.params.iter_mut() {
            f(p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::descriptor::PrimitiveType;

    fn method(name: &str, flags: MethodFlags) -> MethodDecl {
        MethodDecl {
            name: name.to_string(),
            kind: MethodKind::Normal,
            ty: FunctionType::new(QualType::void(), vec![]),
            param_names: vec![],
            flags,
            access: AccessSpecifier::Public,
            pos: None,
        }
    }

    #[test]
    fn test_selectors() {
        let f = method("f", MethodFlags::VIRTUAL);
        let g = method("f", MethodFlags::VIRTUAL | MethodFlags::CONST);
        assert_eq!(f.selector(), "f()");
        assert_eq!(g.selector(), "f() const");
        let mut h = method("h", MethodFlags::VIRTUAL);
        h.ty = FunctionType::new(QualType::void(), vec![QualType::primitive(PrimitiveType::Int)]).with_variadic(true);
        assert_eq!(h.selector(), "h(int, ...)");
        let mut d1 = method("~A", MethodFlags::VIRTUAL);
        d1.kind = MethodKind::Destructor;
        let mut d2 = method("~B", MethodFlags::empty());
        d2.kind = MethodKind::Destructor;
        assert_eq!(d1.selector(), d2.selector());
    }

    #[test]
    fn test_record_queries() {
        let mut r = RecordDef::new("C", RecordKind::Struct);
        r.members.push(MemberDescriptor::new(
            Some("c".to_string()),
            QualType::primitive(PrimitiveType::Int),
        ));
        r.methods.push(method("f", MethodFlags::OVERRIDE));
        assert!(r.declares_virtual());
        assert!(r.member("c").is_some());
        assert!(!r.is_anonymous());
        assert!(is_anonymous_name("ns::S::?_12_5"));
    }

    #[test]
    fn test_f4_linkage_is_internal_without_language() {
        let l = NameLinkage::internal();
        assert_eq!(l.storage, StorageLinkage::Internal);
        assert!(l.language.is_none());
        assert_eq!(NameLinkage::default().language, Some(LanguageLinkage::Cxx));
    }
}
