// Wed Oct 14 2026 - Alex

use crate::lexer::SourcePos;
use crate::types::decl::{Declaration, DeclKind, TypedefDecl};
use crate::types::descriptor::{PrimitiveType, QualType, TypeDescriptor};
use crate::types::TypeError;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

const MAX_TYPEDEF_DEPTH: usize = 64;

/// Registry of every declaration of a unit (or of a merged session), keyed
/// by qualified name. Entries are shared `Arc`s so a table can hold
/// declarations adopted from the cross-unit cache; any rewrite goes through
/// `Arc::make_mut` and therefore copies a shared entry first.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    tags: IndexMap<String, Arc<Declaration>>,
    ordinary: IndexMap<String, Arc<Declaration>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableStats {
    pub by_kind: IndexMap<String, usize>,
    pub total: usize,
    pub incomplete_references: usize,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table preloaded with the builtin integer typedefs. `size_type` and
    /// `diff_type` depend on the data model.
    pub fn seeded(size_type: PrimitiveType, diff_type: PrimitiveType) -> Self {
        let mut table = Self::new();
        for decl in builtin_typedefs(size_type, diff_type) {
            let _ = table.insert(Declaration::Typedef(decl));
        }
        table
    }

    /// Inserts a declaration following the completeness rules: definitions
    /// complete forward declarations, never the other way round.
    /// Returns an error for a conflicting redefinition; the first one is kept.
    pub fn insert(&mut self, decl: Declaration) -> Result<(), TypeError> {
        self.insert_arc(Arc::new(decl))
    }

    pub fn insert_arc(&mut self, decl: Arc<Declaration>) -> Result<(), TypeError> {
        let name = decl.name().to_string();
        let map = if decl.is_tag() {
            &mut self.tags
        } else {
            &mut self.ordinary
        };
        let Some(existing) = map.get_mut(&name) else {
            map.insert(name, decl);
            return Ok(());
        };
        match merge_action(existing, &decl) {
            Merge::Keep => Ok(()),
            Merge::Replace => {
                *existing = decl;
                Ok(())
            }
            Merge::Absorb => {
                if let (Declaration::Template(current), Declaration::Template(incoming)) =
                    (Arc::make_mut(existing), decl.as_ref())
                {
                    current.absorb(incoming.clone());
                }
                Ok(())
            }
            Merge::KindMismatch => Err(TypeError::KindMismatch { name }),
            Merge::Redefinition => Err(TypeError::Redefinition {
                name,
                kind: decl.kind().to_string(),
            }),
        }
    }

    /// Inserts a batch of declarations, returning the conflicts.
    pub fn register(&mut self, decls: impl IntoIterator<Item = Declaration>) -> Vec<TypeError> {
        decls
            .into_iter()
            .filter_map(|d| self.insert(d).err())
            .collect()
    }

    /// Adds every entry of `other`, in its order, after the entries of self.
    pub fn merge(&mut self, other: &TypeTable) -> Vec<TypeError> {
        other
            .iter_arcs()
            .filter_map(|d| self.insert_arc(d.clone()).err())
            .collect()
    }

    pub fn tag(&self, name: &str) -> Option<&Declaration> {
        self.tags.get(name).map(|d| d.as_ref())
    }

    pub fn ordinary(&self, name: &str) -> Option<&Declaration> {
        self.ordinary.get(name).map(|d| d.as_ref())
    }

    pub fn tag_arc(&self, name: &str) -> Option<&Arc<Declaration>> {
        self.tags.get(name)
    }

    /// Ordinary namespace first, the way a C++ name lookup sees it.
    pub fn lookup(&self, name: &str) -> Option<&Declaration> {
        self.ordinary(name).or_else(|| self.tag(name))
    }

    pub fn record(&self, name: &str) -> Option<&crate::types::RecordDef> {
        self.tag(name).and_then(|d| d.as_record())
    }

    pub fn enum_def(&self, name: &str) -> Option<&crate::types::EnumDef> {
        match self.tag(name) {
            Some(Declaration::Enum(e)) => Some(e),
            _ => None,
        }
    }

    pub fn typedef(&self, name: &str) -> Option<&TypedefDecl> {
        match self.ordinary(name) {
            Some(Declaration::Typedef(t)) => Some(t),
            _ => None,
        }
    }

    pub fn template(&self, name: &str) -> Option<&crate::template::TemplateDeclaration> {
        self.ordinary(name).and_then(|d| d.as_template())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name) || self.ordinary.contains_key(name)
    }

    /// All declarations, tags first, each namespace in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.iter_arcs().map(|d| d.as_ref())
    }

    pub fn iter_arcs(&self) -> impl Iterator<Item = &Arc<Declaration>> {
        self.tags.values().chain(self.ordinary.values())
    }

    pub fn records(&self) -> impl Iterator<Item = &crate::types::RecordDef> {
        self.tags.values().filter_map(|d| d.as_record())
    }

    pub fn len(&self) -> usize {
        self.tags.len() + self.ordinary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.ordinary.is_empty()
    }

    /// Strips typedefs off the top of `ty`, accumulating qualifiers.
    pub fn resolve_typedef(&self, ty: &QualType) -> Result<QualType, TypeError> {
        let mut current = ty.clone();
        for _ in 0..MAX_TYPEDEF_DEPTH {
            let name = match &current.ty {
                TypeDescriptor::Typedef(name) => name.clone(),
                TypeDescriptor::Incomplete(name) => match self.incomplete_target(name, "") {
                    Some(resolved) if !matches!(resolved, TypeDescriptor::Incomplete(_)) => {
                        current = QualType {
                            ty: resolved,
                            quals: current.quals,
                        };
                        continue;
                    }
                    _ => return Ok(current),
                },
                _ => return Ok(current),
            };
            let target = self
                .typedef(&name)
                .ok_or_else(|| TypeError::UnknownType(name.clone()))?;
            current = target.ty.clone().with_quals(current.quals);
        }
        Err(TypeError::TypedefCycle(type_name(ty)))
    }

    /// Fully resolves typedefs everywhere inside `ty`. Unknown names are
    /// left as they are.
    pub fn canonical(&self, ty: &QualType) -> QualType {
        let mut out = match self.resolve_typedef(ty) {
            Ok(t) => t,
            Err(_) => return ty.clone(),
        };
        match &mut out.ty {
            TypeDescriptor::Pointer(t) => **t = self.canonical(t),
            TypeDescriptor::Reference { target, .. } => **target = self.canonical(target),
            TypeDescriptor::Array { element, .. } => **element = self.canonical(element),
            TypeDescriptor::Function(func) => {
                func.ret = self.canonical(&func.ret);
                for p in func.params.iter_mut() {
                    *p = self.canonical(p);
                }
            }
            TypeDescriptor::TemplateId { args, .. } => {
                for arg in args.iter_mut() {
                    if let crate::types::TemplateArg::Type(t) = arg {
                        *t = self.canonical(t);
                    }
                }
            }
            _ => {}
        }
        out
    }

    /// Second pass: rewrites every `Incomplete(name)` whose name became known
    /// into the proper reference. Returns the names still unknown.
    pub fn resolve_incomplete(&mut self) -> Vec<String> {
        let pending: Vec<(bool, String)> = self
            .tags
            .iter()
            .map(|(k, d)| (true, k, d))
            .chain(self.ordinary.iter().map(|(k, d)| (false, k, d)))
            .filter(|(_, _, d)| count_incomplete(d) > 0)
            .map(|(is_tag, k, _)| (is_tag, k.clone()))
            .collect();

        let mut unresolved = Vec::new();
        for (is_tag, name) in pending {
            let scope = scope_of(&name).to_string();
            let source = if is_tag { &self.tags } else { &self.ordinary };
            let Some(decl) = source.get(&name) else { continue };
            let mut rewritten = decl.as_ref().clone();
            rewritten.types_mut(&mut |t| {
                t.walk_mut(&mut |d| {
                    if let TypeDescriptor::Incomplete(n) = d {
                        match self.incomplete_target(n, &scope) {
                            Some(target) => *d = target,
                            None => unresolved.push(n.clone()),
                        }
                    }
                })
            });
            let target = if is_tag {
                self.tags.get_mut(&name)
            } else {
                self.ordinary.get_mut(&name)
            };
            if let Some(slot) = target {
                if **slot != rewritten {
                    *Arc::make_mut(slot) = rewritten;
                }
            }
        }
        unresolved.sort();
        unresolved.dedup();
        if !unresolved.is_empty() {
            log::debug!("{} type names remain incomplete", unresolved.len());
        }
        unresolved
    }

    /// Rewrites the `Incomplete` names of a type parsed outside any unit,
    /// looking them up from file scope.
    pub fn resolve_names(&self, ty: &mut QualType) {
        ty.walk_mut(&mut |d| {
            if let TypeDescriptor::Incomplete(n) = d {
                if let Some(target) = self.incomplete_target(n, "") {
                    *d = target;
                }
            }
        });
    }

    fn incomplete_target(&self, name: &str, scope: &str) -> Option<TypeDescriptor> {
        for candidate in scoped_candidates(name, scope) {
            if let Some(Declaration::Typedef(_)) = self.ordinary(&candidate) {
                return Some(TypeDescriptor::Typedef(candidate));
            }
            match self.tag(&candidate) {
                Some(Declaration::Record(r)) => {
                    return Some(TypeDescriptor::Record {
                        kind: r.kind,
                        name: candidate,
                    })
                }
                Some(Declaration::ForwardRecord { kind, .. }) => {
                    return Some(TypeDescriptor::Record {
                        kind: *kind,
                        name: candidate,
                    })
                }
                Some(Declaration::Enum(_)) => return Some(TypeDescriptor::Enum(candidate)),
                _ => {}
            }
        }
        None
    }

    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats::default();
        for decl in self.iter().filter(|d| !d.is_builtin()) {
            *stats.by_kind.entry(decl.kind().to_string()).or_insert(0) += 1;
            stats.total += 1;
            stats.incomplete_references += count_incomplete(decl);
        }
        stats
    }

    /// Value of an enumerator or of a macro that expands to a constant.
    pub fn constant(&self, name: &str) -> Option<i64> {
        match self.ordinary(name)? {
            Declaration::Enumerator(e) => Some(e.value),
            Declaration::Macro(m) => m.value,
            _ => None,
        }
    }

    pub fn count(&self, kind: DeclKind) -> usize {
        self.iter().filter(|d| d.kind() == kind).count()
    }
}

/// Scope part of a qualified name, `ns::S` for `ns::S::x`.
pub fn scope_of(name: &str) -> &str {
    let bytes = name.as_bytes();
    let mut depth = 0i32;
    let mut split = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'(' => depth += 1,
            b'>' | b')' => depth -= 1,
            b':' if depth <= 0 && bytes.get(i + 1) == Some(&b':') => {
                split = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    split.map(|i| &name[..i]).unwrap_or("")
}

/// Names `name` may refer to when used inside `scope`, innermost first.
pub fn scoped_candidates(name: &str, scope: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut scope = scope;
    while !scope.is_empty() {
        out.push(format!("{}::{}", scope, name));
        scope = scope_of(scope);
    }
    out.push(name.trim_start_matches("::").to_string());
    out
}

fn count_incomplete(decl: &Declaration) -> usize {
    let mut count = 0;
    decl.types(&mut |t| {
        t.walk(&mut |d| {
            if matches!(d, TypeDescriptor::Incomplete(_)) {
                count += 1;
            }
        })
    });
    count
}

enum Merge {
    Keep,
    Replace,
    Absorb,
    KindMismatch,
    Redefinition,
}

fn merge_action(current: &Declaration, incoming: &Declaration) -> Merge {
    match (current, incoming) {
        (Declaration::ForwardRecord { .. }, Declaration::Record(_)) => Merge::Replace,
        (_, Declaration::ForwardRecord { .. }) => Merge::Keep,
        (Declaration::Template(_), Declaration::Template(_)) => Merge::Absorb,
        (Declaration::Function(c), Declaration::Function(i)) => {
            if i.is_definition && !c.is_definition {
                Merge::Replace
            } else {
                Merge::Keep
            }
        }
        // macros and enumerators share the ordinary namespace with C names
        (Declaration::Macro(_), _) | (_, Declaration::Macro(_)) => Merge::Keep,
        (c, i) if c.kind() != i.kind() => {
            if c.is_builtin() {
                Merge::Replace
            } else {
                Merge::KindMismatch
            }
        }
        (c, _) if c.is_builtin() => Merge::Replace,
        (c, i) if c == i || same_definition(c, i) => Merge::Keep,
        _ => Merge::Redefinition,
    }
}

fn type_name(ty: &QualType) -> String {
    match &ty.ty {
        TypeDescriptor::Typedef(n) | TypeDescriptor::Incomplete(n) => n.clone(),
        _ => ty.to_string(),
    }
}

// Re-including a header gives equal definitions that only differ by position.
fn same_definition(a: &Declaration, b: &Declaration) -> bool {
    match (a, b) {
        (Declaration::Record(x), Declaration::Record(y)) => {
            x.kind == y.kind && x.members.len() == y.members.len() && x.bases == y.bases
        }
        (Declaration::Typedef(x), Declaration::Typedef(y)) => x.ty == y.ty,
        (Declaration::Enum(x), Declaration::Enum(y)) => x.enumerators == y.enumerators,
        (Declaration::Macro(x), Declaration::Macro(y)) => x.text == y.text,
        (Declaration::Variable(x), Declaration::Variable(y)) => x.ty == y.ty,
        (Declaration::Enumerator(x), Declaration::Enumerator(y)) => x.value == y.value,
        _ => false,
    }
}

pub fn builtin_typedefs(size_type: PrimitiveType, diff_type: PrimitiveType) -> Vec<TypedefDecl> {
    let mut base: Vec<(&str, PrimitiveType)> = vec![
        ("size_t", size_type),
        ("ssize_t", diff_type),
        ("ptrdiff_t", diff_type),
        ("intptr_t", diff_type),
        ("uintptr_t", size_type),
        ("int8_t", PrimitiveType::SChar),
        ("uint8_t", PrimitiveType::UChar),
        ("int16_t", PrimitiveType::Short),
        ("uint16_t", PrimitiveType::UShort),
        ("int32_t", PrimitiveType::Int),
        ("uint32_t", PrimitiveType::UInt),
        ("int64_t", PrimitiveType::LongLong),
        ("uint64_t", PrimitiveType::ULongLong),
    ];
    base.push(("nullptr_t", PrimitiveType::NullPtr));

    let mut out: Vec<TypedefDecl> = base
        .iter()
        .map(|(name, prim)| TypedefDecl {
            name: name.to_string(),
            ty: QualType::primitive(*prim),
            pos: Some(SourcePos::builtin()),
        })
        .collect();
    out.extend(base.iter().map(|(name, _)| TypedefDecl {
        name: format!("std::{}", name),
        ty: QualType::new(TypeDescriptor::Typedef(name.to_string())),
        pos: Some(SourcePos::builtin()),
    }));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decl::{MemberDescriptor, RecordDef};
    use crate::types::descriptor::{Qualifiers, RecordKind};

    fn typedef(name: &str, ty: QualType) -> Declaration {
        Declaration::Typedef(TypedefDecl {
            name: name.to_string(),
            ty,
            pos: None,
        })
    }

    fn forward(name: &str) -> Declaration {
        Declaration::ForwardRecord {
            name: name.to_string(),
            kind: RecordKind::Struct,
            pos: None,
        }
    }

    fn record(name: &str, fields: &[(&str, QualType)]) -> Declaration {
        let mut r = RecordDef::new(name, RecordKind::Struct);
        for (n, t) in fields {
            r.members.push(MemberDescriptor::new(Some(n.to_string()), t.clone()));
        }
        Declaration::Record(r)
    }

    #[test]
    fn test_forward_then_definition() {
        let mut table = TypeTable::new();
        table.insert(forward("_mystruct")).unwrap();
        assert_eq!(table.tag("_mystruct").unwrap().kind(), DeclKind::Forward);
        table
            .insert(record("_mystruct", &[("I", QualType::primitive(PrimitiveType::Int))]))
            .unwrap();
        assert!(table.record("_mystruct").is_some());
        // a later forward declaration never downgrades the definition
        table.insert(forward("_mystruct")).unwrap();
        assert!(table.record("_mystruct").is_some());
    }

    #[test]
    fn test_conflicting_redefinition() {
        let mut table = TypeTable::new();
        table.insert(record("S", &[("a", QualType::primitive(PrimitiveType::Int))])).unwrap();
        let err = table.insert(record("S", &[])).unwrap_err();
        assert!(matches!(err, TypeError::Redefinition { .. }));
        assert_eq!(table.record("S").unwrap().members.len(), 1);
    }

    #[test]
    fn test_resolve_typedef_chain() {
        let mut table = TypeTable::seeded(PrimitiveType::ULong, PrimitiveType::Long);
        table
            .insert(typedef("sometype", QualType::primitive(PrimitiveType::UInt)))
            .unwrap();
        table
            .insert(typedef(
                "csome",
                QualType::new(TypeDescriptor::Typedef("sometype".to_string())).with_quals(Qualifiers::CONST),
            ))
            .unwrap();
        let resolved = table
            .resolve_typedef(&QualType::new(TypeDescriptor::Typedef("csome".to_string())))
            .unwrap();
        assert_eq!(resolved.ty, TypeDescriptor::Primitive(PrimitiveType::UInt));
        assert!(resolved.is_const());
        let size = table
            .resolve_typedef(&QualType::new(TypeDescriptor::Typedef("std::size_t".to_string())))
            .unwrap();
        assert_eq!(size.ty, TypeDescriptor::Primitive(PrimitiveType::ULong));
    }

    #[test]
    fn test_typedef_cycle() {
        let mut table = TypeTable::new();
        table
            .insert(typedef("a", QualType::new(TypeDescriptor::Typedef("b".to_string()))))
            .unwrap();
        table
            .insert(typedef("b", QualType::new(TypeDescriptor::Typedef("a".to_string()))))
            .unwrap();
        let err = table
            .resolve_typedef(&QualType::new(TypeDescriptor::Typedef("a".to_string())))
            .unwrap_err();
        assert!(matches!(err, TypeError::TypedefCycle(_)));
    }

    #[test]
    fn test_resolve_incomplete_second_pass() {
        let mut table = TypeTable::new();
        table
            .insert(typedef(
                "myinteger",
                QualType::new(TypeDescriptor::Incomplete("xxx".to_string())),
            ))
            .unwrap();
        table
            .insert(typedef(
                "fox",
                QualType::new(TypeDescriptor::Incomplete("unk".to_string())).pointer_to(),
            ))
            .unwrap();
        table
            .insert(typedef("xxx", QualType::primitive(PrimitiveType::UChar)))
            .unwrap();
        let unresolved = table.resolve_incomplete();
        assert_eq!(unresolved, vec!["unk".to_string()]);
        assert_eq!(
            table.typedef("myinteger").unwrap().ty.ty,
            TypeDescriptor::Typedef("xxx".to_string())
        );
    }

    #[test]
    fn test_resolve_incomplete_uses_scope() {
        let mut table = TypeTable::new();
        table.insert(record("ns::Inner", &[])).unwrap();
        table
            .insert(record(
                "ns::Outer",
                &[("x", QualType::new(TypeDescriptor::Incomplete("Inner".to_string())))],
            ))
            .unwrap();
        assert!(table.resolve_incomplete().is_empty());
        let outer = table.record("ns::Outer").unwrap();
        assert_eq!(
            outer.members[0].ty.ty,
            TypeDescriptor::Record {
                kind: RecordKind::Struct,
                name: "ns::Inner".to_string()
            }
        );
    }

    #[test]
    fn test_rewrite_copies_shared_entries() {
        let shared = Arc::new(typedef(
            "t",
            QualType::new(TypeDescriptor::Incomplete("u".to_string())),
        ));
        let mut table = TypeTable::new();
        table.insert_arc(shared.clone()).unwrap();
        table
            .insert(typedef("u", QualType::primitive(PrimitiveType::Int)))
            .unwrap();
        table.resolve_incomplete();
        // the shared original is untouched
        match shared.as_ref() {
            Declaration::Typedef(t) => {
                assert_eq!(t.ty.ty, TypeDescriptor::Incomplete("u".to_string()))
            }
            _ => unreachable!(),
        }
        assert_eq!(
            table.typedef("t").unwrap().ty.ty,
            TypeDescriptor::Typedef("u".to_string())
        );
    }

    #[test]
    fn test_scope_of_skips_template_arguments() {
        assert_eq!(scope_of("ns::S::x"), "ns::S");
        assert_eq!(scope_of("identity<std::size_t>::type"), "identity<std::size_t>");
        assert_eq!(scope_of("A<B<x::y>>"), "");
        assert_eq!(scope_of("plain"), "");
    }

    #[test]
    fn test_scoped_candidates() {
        assert_eq!(
            scoped_candidates("T", "a::b"),
            vec!["a::b::T".to_string(), "a::T".to_string(), "T".to_string()]
        );
    }

    #[test]
    fn test_stats_skip_builtins() {
        let mut table = TypeTable::seeded(PrimitiveType::ULong, PrimitiveType::Long);
        table.insert(record("A", &[])).unwrap();
        let stats = table.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_kind.get("struct"), Some(&1));
    }
}
