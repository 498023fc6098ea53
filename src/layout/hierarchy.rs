// Thu Oct 15 2026 - Alex

use crate::layout::LayoutPlan;
use crate::types::{RecordKind, TypeDescriptor, TypeTable};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Represents a node in the class hierarchy tree
#[derive(Debug, Clone, Serialize)]
pub struct ClassNode {
    /// Qualified name of the class
    pub name: String,
    pub kind: RecordKind,
    /// Size of a complete object in bytes, when the layout is known
    pub instance_size: Option<u64>,
    /// Direct base classes, in declaration order
    pub parents: Vec<String>,
    /// Direct bases inherited with `virtual`
    pub virtual_parents: Vec<String>,
    /// Direct derived classes
    pub children: Vec<String>,
    /// Depth in the hierarchy (0 = root)
    pub depth: usize,
    /// Whether this class has a vtable pointer
    pub is_dynamic: bool,
    /// Whether some vtable slot is still pure virtual
    pub is_abstract: bool,
}

impl ClassNode {
    pub fn new(name: &str, kind: RecordKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            instance_size: None,
            parents: Vec::new(),
            virtual_parents: Vec::new(),
            children: Vec::new(),
            depth: 0,
            is_dynamic: false,
            is_abstract: false,
        }
    }

    pub fn with_layout(mut self, plan: &LayoutPlan) -> Self {
        self.instance_size = Some(plan.size);
        self.is_dynamic = plan.is_dynamic;
        self.is_abstract = plan.vtable.as_ref().is_some_and(|v| v.is_abstract());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn has_multiple_parents(&self) -> bool {
        self.parents.len() > 1
    }
}

impl fmt::Display for ClassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indent = "  ".repeat(self.depth);
        write!(f, "{}{} {}", indent, self.kind.keyword(), self.name)?;
        if let Some(size) = self.instance_size {
            write!(f, " [size: {}]", size)?;
        }
        if self.is_abstract {
            write!(f, " [abstract]")?;
        } else if self.is_dynamic {
            write!(f, " [dynamic]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HierarchyStats {
    pub classes: usize,
    pub roots: usize,
    pub max_depth: usize,
    pub multiple_inheritance: usize,
    pub virtual_inheritance: usize,
    pub dynamic: usize,
    pub abstract_classes: usize,
}

/// Base/derived relationships between every record of a type table
#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    classes: IndexMap<String, ClassNode>,
    roots: Vec<String>,
    max_depth: usize,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the hierarchy of the records in `table`, attaching sizes from
    /// the layouts that could be computed.
    pub fn from_table(table: &TypeTable, layouts: &IndexMap<String, Arc<LayoutPlan>>) -> Self {
        let mut hierarchy = Self::new();
        for record in table.records() {
            let mut node = ClassNode::new(&record.name, record.kind);
            if let Some(plan) = layouts.get(&record.name) {
                node = node.with_layout(plan);
            }
            hierarchy.add_class(node);
        }
        for record in table.records() {
            for edge in &record.bases {
                let base = match &table.canonical(&edge.base).ty {
                    TypeDescriptor::Record { name, .. } => name.clone(),
                    _ => edge.base.to_string(),
                };
                hierarchy.add_inheritance(&record.name, &base, edge.is_virtual);
            }
        }
        hierarchy.recalculate_relationships();
        hierarchy
    }

    pub fn add_class(&mut self, node: ClassNode) {
        self.classes.insert(node.name.clone(), node);
    }

    /// Records `child : parent`; call `recalculate_relationships` once all
    /// edges are in.
    pub fn add_inheritance(&mut self, child: &str, parent: &str, is_virtual: bool) {
        if !self.classes.contains_key(parent) {
            self.classes
                .insert(parent.to_string(), ClassNode::new(parent, RecordKind::Class));
        }
        if let Some(node) = self.classes.get_mut(child) {
            if !node.parents.iter().any(|p| p == parent) {
                node.parents.push(parent.to_string());
            }
            if is_virtual && !node.virtual_parents.iter().any(|p| p == parent) {
                node.virtual_parents.push(parent.to_string());
            }
        }
        if let Some(node) = self.classes.get_mut(parent) {
            if !node.children.iter().any(|c| c == child) {
                node.children.push(child.to_string());
            }
        }
    }

    /// Recomputes roots and depths. A class's depth is its longest
    /// distance from a root.
    pub fn recalculate_relationships(&mut self) {
        self.roots = self
            .classes
            .values()
            .filter(|n| n.is_root())
            .map(|n| n.name.clone())
            .collect();
        let mut depths: IndexMap<String, usize> = IndexMap::new();
        let mut queue: VecDeque<(String, usize)> = self.roots.iter().map(|r| (r.clone(), 0)).collect();
        let limit = self.classes.len();
        while let Some((name, depth)) = queue.pop_front() {
            if depth > limit || depths.get(&name).is_some_and(|&d| d >= depth) {
                continue;
            }
            depths.insert(name.clone(), depth);
            if let Some(node) = self.classes.get(&name) {
                for child in &node.children {
                    queue.push_back((child.clone(), depth + 1));
                }
            }
        }
        self.max_depth = 0;
        for (name, depth) in depths {
            if let Some(node) = self.classes.get_mut(&name) {
                node.depth = depth;
                self.max_depth = self.max_depth.max(depth);
            }
        }
    }

    pub fn get_class(&self, name: &str) -> Option<&ClassNode> {
        self.classes.get(name)
    }

    /// All direct and indirect bases, nearest first
    pub fn get_ancestors(&self, name: &str) -> Vec<&ClassNode> {
        self.walk(name, |node| &node.parents)
    }

    /// All direct and indirect derived classes, nearest first
    pub fn get_descendants(&self, name: &str) -> Vec<&ClassNode> {
        self.walk(name, |node| &node.children)
    }

    fn walk<'h>(&'h self, name: &str, next: impl Fn(&'h ClassNode) -> &'h Vec<String>) -> Vec<&'h ClassNode> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        if let Some(node) = self.classes.get(name) {
            queue.extend(next(node).iter().map(String::as_str));
        }
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.classes.get(current) {
                found.push(node);
                queue.extend(next(node).iter().map(String::as_str));
            }
        }
        found
    }

    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        self.get_ancestors(descendant).iter().any(|n| n.name == ancestor)
    }

    pub fn get_roots(&self) -> Vec<&ClassNode> {
        self.roots.iter().filter_map(|n| self.classes.get(n)).collect()
    }

    pub fn get_leaves(&self) -> Vec<&ClassNode> {
        self.classes.values().filter(|n| n.is_leaf()).collect()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn find_multiple_inheritance(&self) -> Vec<&ClassNode> {
        self.classes.values().filter(|n| n.has_multiple_parents()).collect()
    }

    pub fn find_virtual_inheritance(&self) -> Vec<&ClassNode> {
        self.classes.values().filter(|n| !n.virtual_parents.is_empty()).collect()
    }

    /// Export hierarchy as DOT format for visualization. Virtual edges are
    /// dashed.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph ClassHierarchy {\n");
        dot.push_str("  rankdir=BT;\n");
        dot.push_str("  node [shape=box];\n\n");
        for (name, node) in &self.classes {
            let mut label = name.clone();
            if let Some(size) = node.instance_size {
                label.push_str(&format!("\\nsize: {}", size));
            }
            let style = if node.is_abstract { ", style=dashed" } else { "" };
            dot.push_str(&format!("  \"{}\" [label=\"{}\"{}];\n", name, label, style));
            for parent in &node.parents {
                let edge_style = if node.virtual_parents.contains(parent) {
                    " [style=dashed]"
                } else {
                    ""
                };
                dot.push_str(&format!("  \"{}\" -> \"{}\"{};\n", name, parent, edge_style));
            }
        }
        dot.push_str("}\n");
        dot
    }

    pub fn stats(&self) -> HierarchyStats {
        HierarchyStats {
            classes: self.classes.len(),
            roots: self.roots.len(),
            max_depth: self.max_depth,
            multiple_inheritance: self.find_multiple_inheritance().len(),
            virtual_inheritance: self.find_virtual_inheritance().len(),
            dynamic: self.classes.values().filter(|n| n.is_dynamic).count(),
            abstract_classes: self.classes.values().filter(|n| n.is_abstract).count(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassNode> {
        self.classes.values()
    }
}

impl fmt::Display for ClassHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Class Hierarchy ({} classes, max depth {})",
            self.class_count(),
            self.max_depth
        )?;

        fn print_tree(
            f: &mut fmt::Formatter<'_>,
            hierarchy: &ClassHierarchy,
            name: &str,
            depth: usize,
            seen: &mut HashSet<String>,
        ) -> fmt::Result {
            if let Some(node) = hierarchy.get_class(name) {
                writeln!(f, "{}{}", "  ".repeat(depth), node.to_string().trim_start())?;
                if !seen.insert(name.to_string()) {
                    return Ok(());
                }
                for child in &node.children {
                    print_tree(f, hierarchy, child, depth + 1, seen)?;
                }
            }
            Ok(())
        }

        let mut seen = HashSet::new();
        for root in &self.roots {
            print_tree(f, self, root, 0, &mut seen)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::resolver::tests::inheritance_fixture;

    #[test]
    fn test_hierarchy_from_table() {
        let fx = inheritance_fixture();
        let r = fx.resolver();
        for record in fx.table.records() {
            r.layout(&record.name).unwrap();
        }
        let hierarchy = ClassHierarchy::from_table(&fx.table, &fx.cache.snapshot());
        assert_eq!(hierarchy.class_count(), 14);
        let i = hierarchy.get_class("I").unwrap();
        assert_eq!(i.depth, 2);
        assert_eq!(i.instance_size, Some(40));
        assert!(hierarchy.is_ancestor("A", "F"));
        assert!(!hierarchy.is_ancestor("F", "A"));
        let descendants: Vec<&str> = hierarchy
            .get_descendants("Grandparent")
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(descendants, vec!["Parent1", "Parent2", "Child"]);
        let stats = hierarchy.stats();
        assert_eq!(stats.virtual_inheritance, 6);
        assert!(hierarchy.to_dot().contains("\"D\" -> \"A\" [style=dashed];"));
    }
}
