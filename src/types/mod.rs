// Wed Oct 14 2026 - Alex

pub mod cache;
pub mod decl;
pub mod descriptor;
pub mod error;
pub mod table;

pub use cache::{SharedTypeCache, UnitTypeView};
pub use decl::{
    is_anonymous_name, AccessSpecifier, BaseClassEdge, DeclKind, Declaration, EnumDef, Enumerator,
    EnumeratorDecl, FunctionDecl, MacroDecl, MemberDescriptor, MethodDecl, MethodFlags, MethodKind,
    NameLinkage, RecordDef, StorageLinkage, TemplateOrigin, TypedefDecl, VariableDecl,
};
pub use descriptor::{
    template_id, ArrayBound, FunctionType, LanguageLinkage, PrimitiveType, QualType, Qualifiers,
    RecordKind, TemplateArg, TypeDescriptor,
};
pub use error::TypeError;
pub use table::{builtin_typedefs, scope_of, scoped_candidates, TableStats, TypeTable};
