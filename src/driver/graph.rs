// Thu Oct 15 2026 - Alex

use crate::diagnostic::Diagnostic;
use crate::driver::unit::UnitSummary;
use crate::layout::{AbiConfig, ClassHierarchy, LayoutCache, LayoutError, LayoutPlan, LayoutResolver, MemberAccess};
use crate::parser::{parse_template_id, parse_type};
use crate::query::QueryError;
use crate::template::{normalize_args, select, InstanceCache, Selection, SpecializationOrdering, TemplateError};
use crate::types::{Declaration, QualType, TableStats, TemplateArg, TypeTable};
use serde::Serialize;
use std::sync::Arc;

/// Merged result of a session: every declaration by qualified name, the
/// layout of every complete class, and the diagnostics of all units.
///
/// Layouts not computed up front (template instances, types named in a
/// query) are resolved lazily and memoized.
pub struct TypeGraph {
    table: TypeTable,
    abi: AbiConfig,
    ordering: SpecializationOrdering,
    layouts: LayoutCache,
    instances: InstanceCache,
    diagnostics: Vec<Diagnostic>,
    units: Vec<UnitSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub units: usize,
    pub declarations: TableStats,
    pub layouts: usize,
    pub instances: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl TypeGraph {
    pub(crate) fn new(
        table: TypeTable,
        abi: AbiConfig,
        ordering: SpecializationOrdering,
        layouts: LayoutCache,
        instances: InstanceCache,
        diagnostics: Vec<Diagnostic>,
        units: Vec<UnitSummary>,
    ) -> Self {
        Self {
            table,
            abi,
            ordering,
            layouts,
            instances,
            diagnostics,
            units,
        }
    }

    pub fn resolver(&self) -> LayoutResolver<'_> {
        LayoutResolver::new(&self.table, &self.abi, &self.layouts, &self.instances).with_ordering(self.ordering)
    }

    pub fn table(&self) -> &TypeTable {
        &self.table
    }

    pub fn abi(&self) -> &AbiConfig {
        &self.abi
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.table.lookup(name)
    }

    /// User declarations, builtin typedefs left out.
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.table.iter().filter(|d| !d.is_builtin())
    }

    pub fn layout(&self, name: &str) -> Result<Arc<LayoutPlan>, LayoutError> {
        self.resolver().layout(name)
    }

    pub fn layout_of_type(&self, ty: &QualType) -> Result<Arc<LayoutPlan>, LayoutError> {
        let mut ty = ty.clone();
        self.table.resolve_names(&mut ty);
        self.resolver().layout_of_type(&ty)
    }

    /// Layout by spelling: a record name, a typedef or a template-id such
    /// as `A<int, int *, 5>`.
    pub fn layout_by_name(&self, text: &str) -> crate::Result<Arc<LayoutPlan>> {
        if self.table.record(text).is_some() {
            return Ok(self.layout(text)?);
        }
        let (_, ty) = parse_type(text)?;
        Ok(self.layout_of_type(&ty)?)
    }

    /// Layouts of every complete record computed so far, in declaration
    /// order.
    pub fn layouts(&self) -> Vec<Arc<LayoutPlan>> {
        self.table.records().filter_map(|r| self.layouts.get(&r.name)).collect()
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.size()
    }

    pub fn instantiate(&self, name: &str, args: &[TemplateArg]) -> Result<String, LayoutError> {
        let args = self.resolve_args(args);
        self.resolver().instantiate(name, &args)
    }

    /// Which body of template `name` an argument list selects, without
    /// instantiating it.
    pub fn select_specialization(&self, name: &str, args: &[TemplateArg]) -> Result<Selection, TemplateError> {
        let tpl = self
            .table
            .template(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;
        let args = normalize_args(tpl, &self.resolve_args(args))?;
        let (selection, _) = select(tpl, &args, self.ordering)?;
        Ok(selection)
    }

    /// `select_specialization` for a spelled template-id.
    pub fn select_by_name(&self, text: &str) -> crate::Result<Selection> {
        let (name, args) = parse_template_id(text).ok_or_else(|| QueryError::NotATemplateId(text.to_string()))?;
        Ok(self.select_specialization(&name, &args)?)
    }

    pub fn resolve_member(&self, class: &str, member: &str) -> Result<MemberAccess, LayoutError> {
        self.resolver().resolve_member(class, member)
    }

    pub fn resolve_qualified_member(&self, class: &str, base: &str, member: &str) -> Result<MemberAccess, LayoutError> {
        self.resolver().resolve_qualified_member(class, base, member)
    }

    pub fn hierarchy(&self) -> ClassHierarchy {
        ClassHierarchy::from_table(&self.table, &self.layouts.snapshot())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn units(&self) -> &[UnitSummary] {
        &self.units
    }

    pub fn stats(&self) -> GraphStats {
        let errors = self.diagnostics.iter().filter(|d| d.is_error()).count();
        GraphStats {
            units: self.units.len(),
            declarations: self.table.stats(),
            layouts: self.layouts.size(),
            instances: self.instances.size(),
            errors,
            warnings: self.diagnostics.len() - errors,
        }
    }

    fn resolve_args(&self, args: &[TemplateArg]) -> Vec<TemplateArg> {
        args.iter()
            .map(|a| match a {
                TemplateArg::Type(t) => {
                    let mut t = t.clone();
                    self.table.resolve_names(&mut t);
                    TemplateArg::Type(t)
                }
                other => other.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::diagnostic::DiagnosticKind;
    use crate::driver::{Session, SourceUnit};
    use crate::layout::LayoutError;
    use crate::template::Selection;

    const DIAMOND: &str = r#"
struct A { int a; };
struct B { int b; };
struct C { int c; };
struct D : virtual A, virtual B { int d; };
struct E : virtual A, virtual B { int e; };
struct F : D, E { int f; };
"#;

    const NON_VIRTUAL: &str = r#"
struct K { int k; };
struct G : K { int g; };
struct H : K { int h; };
struct I : G, H { int i; };
"#;

    const TEMPLATES: &str = r#"
template<class T1, class T2, int I> class A {};
template<class T, int I> class A<T, T*, I> {};
template<class T1, class T2, int I> class A<T1*, T2, I> {};
template<class T> class A<int, T*, 5> {};
template<class T1, class T2, int I> class A<T1, T2*, I> {};
"#;

    fn graph(src: &str) -> super::TypeGraph {
        let session = Session::new(Config::new()).unwrap();
        session.run(&[SourceUnit::new("fixture.cpp", src)])
    }

    #[test]
    fn test_virtual_diamond_shares_bases() {
        let g = graph(DIAMOND);
        let plan = g.layout("F").unwrap();
        assert_eq!(plan.subobject_count("A"), 1);
        assert_eq!(plan.subobject_count("B"), 1);
        let via_d = g.resolve_qualified_member("F", "D", "a").unwrap();
        let via_e = g.resolve_qualified_member("F", "E", "a").unwrap();
        assert_eq!(via_d.offset, via_e.offset);
        assert!(g.resolve_member("F", "a").is_ok());
    }

    #[test]
    fn test_non_virtual_diamond_is_ambiguous() {
        let g = graph(NON_VIRTUAL);
        assert_eq!(g.layout("I").unwrap().subobject_count("K"), 2);
        assert!(matches!(g.resolve_member("I", "k"), Err(LayoutError::AmbiguousBaseAccess { .. })));
        let via_g = g.resolve_qualified_member("I", "G", "k").unwrap();
        let via_h = g.resolve_qualified_member("I", "H", "k").unwrap();
        assert_ne!(via_g.offset, via_h.offset);
        let err = g.resolve_member("I", "k").unwrap_err();
        assert_eq!(err.to_diagnostic().kind, DiagnosticKind::AmbiguousBaseAccess);
    }

    #[test]
    fn test_template_selection_by_name() {
        let g = graph(TEMPLATES);
        assert_eq!(g.select_by_name("A<int, int *, 5>").unwrap(), Selection::Specialization(2));
        assert_eq!(g.select_by_name("A<char, char, 1>").unwrap(), Selection::Primary);
        assert_eq!(g.select_by_name("A<int, int *, 5>").unwrap(), Selection::Specialization(2));
        let plan = g.layout_by_name("A<char, char, 1>").unwrap();
        assert_eq!(plan.size, 1);
        assert!(g.select_by_name("A<int *, int *, 2>").is_err());
    }

    #[test]
    fn test_stats_and_hierarchy() {
        let g = graph(DIAMOND);
        let stats = g.stats();
        assert_eq!(stats.units, 1);
        assert_eq!(stats.declarations.by_kind.get("struct"), Some(&6));
        assert_eq!(stats.errors, 0);
        let hierarchy = g.hierarchy();
        assert!(hierarchy.is_ancestor("A", "F"));
        assert_eq!(g.layouts().len(), 6);
    }
}
