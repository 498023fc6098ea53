// Sat Oct 17 2026 - Alex

use crate::driver::TypeGraph;
use crate::types::{scope_of, Declaration, QualType, TypeDescriptor, TypeTable};
use indexmap::IndexSet;
use log::debug;

/// A declaration and every declaration its types refer to, dependencies
/// first so the list prints as compilable C.
#[derive(Debug, Clone)]
pub struct Dependencies<'g> {
    pub declarations: Vec<&'g Declaration>,
    /// Referenced names the graph has no declaration for.
    pub missing: Vec<String>,
}

impl Dependencies<'_> {
    pub fn names(&self) -> Vec<&str> {
        self.declarations.iter().map(|d| d.name()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Namespace {
    Tag,
    Ordinary,
}

impl Namespace {
    fn of(decl: &Declaration) -> Self {
        if decl.is_tag() {
            Namespace::Tag
        } else {
            Namespace::Ordinary
        }
    }
}

/// Closure of `name` over record, enum, typedef and template-id
/// references. `None` when the graph has no such declaration.
pub fn dependencies<'g>(graph: &'g TypeGraph, name: &str) -> Option<Dependencies<'g>> {
    let table = graph.table();
    let root = table.lookup(name)?;
    let mut walk = DependencyWalk::new(table);
    walk.visit_name(Namespace::of(root), root.name());

    let deps = walk.finish();
    debug!(
        "{} depends on {} declarations, {} missing",
        name,
        deps.declarations.len().saturating_sub(1),
        deps.missing.len()
    );
    Some(deps)
}

struct DependencyWalk<'g> {
    table: &'g TypeTable,
    visited: IndexSet<(Namespace, String)>,
    order: Vec<&'g Declaration>,
    missing: IndexSet<String>,
}

impl<'g> DependencyWalk<'g> {
    fn new(table: &'g TypeTable) -> Self {
        Self {
            table,
            visited: IndexSet::new(),
            order: Vec::new(),
            missing: IndexSet::new(),
        }
    }

    /// Postorder: a declaration is emitted after everything it refers to.
    /// Entering marks it visited, which cuts self and mutual references.
    fn visit(&mut self, decl: &'g Declaration) {
        if !self.visited.insert((Namespace::of(decl), decl.name().to_string())) {
            return;
        }
        if decl.is_builtin() {
            return;
        }

        let mut referenced: Vec<QualType> = Vec::new();
        decl.types(&mut |t| referenced.push(t.clone()));
        for ty in &referenced {
            self.visit_type(ty);
        }
        self.order.push(decl);
    }

    fn visit_type(&mut self, ty: &QualType) {
        let mut names = Vec::new();
        ty.walk(&mut |d| match d {
            TypeDescriptor::Record { name, .. } | TypeDescriptor::Enum(name) => {
                names.push((Namespace::Tag, name.clone()))
            }
            TypeDescriptor::Typedef(name) | TypeDescriptor::TemplateId { name, .. } => {
                names.push((Namespace::Ordinary, name.clone()))
            }
            TypeDescriptor::Incomplete(name) if !is_placeholder(name) => {
                names.push((Namespace::Ordinary, name.clone()))
            }
            _ => {}
        });
        for (namespace, name) in names {
            self.visit_name(namespace, &name);
        }
    }

    fn visit_name(&mut self, namespace: Namespace, name: &str) {
        // nested types are printed inside their enclosing record
        let scope = scope_of(name);
        if !scope.is_empty() && self.table.record(scope).is_some() {
            return self.visit_name(Namespace::Tag, scope);
        }

        let found = match namespace {
            Namespace::Tag => self.table.tag(name),
            Namespace::Ordinary => self.table.lookup(name),
        };
        match found {
            Some(decl) => self.visit(decl),
            None => {
                self.missing.insert(name.to_string());
            }
        }
    }

    fn finish(self) -> Dependencies<'g> {
        Dependencies {
            declarations: self.order,
            missing: self.missing.into_iter().collect(),
        }
    }
}

fn is_placeholder(name: &str) -> bool {
    name == "auto" || name.starts_with("decltype(")
}
