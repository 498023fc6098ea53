// Wed Oct 14 2026 - Alex

use crate::layout::plan::{FieldPlacement, LayoutPlan};
use crate::layout::resolver::LayoutResolver;
use crate::layout::LayoutError;
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashSet;

/// A data member reached from a complete object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberAccess {
    /// The complete object's class.
    pub class: String,
    pub member: String,
    pub declaring_class: String,
    /// Offset from the start of the complete object; `None` for static
    /// members.
    pub offset: Option<u64>,
    pub field: Option<FieldPlacement>,
    /// Classes from the complete object down to the declaring subobject.
    pub path: Vec<String>,
}

enum Found {
    Field(u64, FieldPlacement),
    Static,
}

impl<'a> LayoutResolver<'a> {
    /// Unqualified `obj.member`: the member must be found in exactly one
    /// subobject once hidden declarations are discarded.
    pub fn resolve_member(&self, class: &str, member: &str) -> Result<MemberAccess, LayoutError> {
        let plan = self.layout(class)?;
        self.lookup_from(&plan, 0, member)
    }

    /// `((Base *)&obj)->member`: converts to the `base` subobject first,
    /// which must be unique, then looks the member up from there.
    pub fn resolve_qualified_member(&self, class: &str, base: &str, member: &str) -> Result<MemberAccess, LayoutError> {
        let plan = self.layout(class)?;
        let reachable = reachable_from(&plan, 0);
        let candidates: Vec<usize> = reachable
            .iter()
            .copied()
            .filter(|&i| plan.subobjects[i].class == base)
            .collect();
        match candidates.as_slice() {
            [] => Err(LayoutError::NotABase {
                class: class.to_string(),
                base: base.to_string(),
            }),
            [index] => self.lookup_from(&plan, *index, member),
            _ => Err(LayoutError::AmbiguousBaseConversion {
                class: class.to_string(),
                base: base.to_string(),
            }),
        }
    }

    fn lookup_from(&self, plan: &LayoutPlan, root: usize, member: &str) -> Result<MemberAccess, LayoutError> {
        let reachable = reachable_from(plan, root);
        let mut found: Vec<(usize, Found)> = Vec::new();
        for &index in &reachable {
            let node = &plan.subobjects[index];
            let node_plan = self.layout(&node.class)?;
            if let Some((offset, field)) = node_plan.field(member) {
                found.push((index, Found::Field(node.offset + offset, field.clone())));
                continue;
            }
            let record = self.record(&node.class)?;
            if record.member(member).is_some_and(|m| m.is_static) {
                found.push((index, Found::Static));
            }
        }

        // a declaration in a derived subobject hides those of its bases
        let hiding: Vec<usize> = found.iter().map(|(i, _)| *i).collect();
        found.retain(|(index, _)| {
            !hiding
                .iter()
                .any(|&other| other != *index && reachable_from(plan, other).contains(index))
        });

        let not_found = || LayoutError::MemberNotFound {
            class: plan.subobjects[root].class.clone(),
            member: member.to_string(),
        };
        let all_static = found.iter().all(|(_, f)| matches!(f, Found::Static));
        let distinct_classes = found
            .iter()
            .map(|(i, _)| plan.subobjects[*i].class.as_str())
            .unique()
            .count();
        if found.len() > 1 && !(all_static && distinct_classes == 1) {
            return Err(LayoutError::AmbiguousBaseAccess {
                class: plan.name.clone(),
                member: member.to_string(),
                paths: found
                    .iter()
                    .map(|(i, _)| path_to(plan, root, *i).join(" -> "))
                    .collect(),
            });
        }
        let (index, what) = found.into_iter().next().ok_or_else(not_found)?;
        let (offset, field) = match what {
            Found::Field(offset, field) => (Some(offset), Some(field)),
            Found::Static => (None, None),
        };
        Ok(MemberAccess {
            class: plan.name.clone(),
            member: member.to_string(),
            declaring_class: plan.subobjects[index].class.clone(),
            offset,
            field,
            path: path_to(plan, 0, index),
        })
    }
}

/// Arena indices of `root` and every base subobject below it, in
/// depth-first order.
fn reachable_from(plan: &LayoutPlan, root: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut pending = vec![root];
    while let Some(index) = pending.pop() {
        if !seen.insert(index) {
            continue;
        }
        order.push(index);
        if let Some(node) = plan.subobjects.get(index) {
            pending.extend(node.bases.iter().rev().copied());
        }
    }
    order
}

fn path_to(plan: &LayoutPlan, from: usize, to: usize) -> Vec<String> {
    fn walk(plan: &LayoutPlan, at: usize, to: usize, path: &mut Vec<usize>) -> bool {
        path.push(at);
        if at == to {
            return true;
        }
        for &next in &plan.subobjects[at].bases {
            if walk(plan, next, to, path) {
                return true;
            }
        }
        path.pop();
        false
    }
    let mut path = Vec::new();
    walk(plan, from, to, &mut path);
    path.into_iter().map(|i| plan.subobjects[i].class.clone()).collect()
}

#[cfg(test)]
mod tests {
    use crate::layout::resolver::tests::inheritance_fixture;
    use crate::layout::LayoutError;

    #[test]
    fn test_non_virtual_diamond_access() {
        let fx = inheritance_fixture();
        let r = fx.resolver();
        match r.resolve_member("I", "b") {
            Err(LayoutError::AmbiguousBaseAccess { paths, .. }) => {
                assert_eq!(paths, vec!["I -> G -> B".to_string(), "I -> H -> B".to_string()])
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(r.resolve_qualified_member("I", "G", "b").unwrap().offset, Some(8));
        assert_eq!(r.resolve_qualified_member("I", "H", "b").unwrap().offset, Some(24));
        // A is virtual: one subobject, no ambiguity
        let a = r.resolve_member("I", "a").unwrap();
        assert_eq!(a.offset, Some(36));
        assert_eq!(a.declaring_class, "A");
        assert!(matches!(
            r.resolve_qualified_member("I", "B", "b"),
            Err(LayoutError::AmbiguousBaseConversion { .. })
        ));
    }

    #[test]
    fn test_virtual_diamond_access() {
        let fx = inheritance_fixture();
        let r = fx.resolver();
        let through_d = r.resolve_qualified_member("F", "D", "a").unwrap();
        let through_e = r.resolve_qualified_member("F", "E", "a").unwrap();
        assert_eq!(through_d.offset, through_e.offset);
        assert_eq!(r.resolve_member("F", "b").unwrap().offset, Some(36));
        assert_eq!(r.resolve_member("F", "e").unwrap().offset, Some(24));
    }

    #[test]
    fn test_own_member_and_missing() {
        let fx = inheritance_fixture();
        let r = fx.resolver();
        let child = r.resolve_member("Child", "grandparent_data").unwrap();
        assert_eq!(child.offset, Some(40));
        assert_eq!(child.path, vec!["Child", "Parent1", "Grandparent"]);
        let qualified = r.resolve_qualified_member("Child", "Parent2", "grandparent_data").unwrap();
        assert_eq!(qualified.offset, Some(40));
        assert!(matches!(
            r.resolve_member("Child", "nothing"),
            Err(LayoutError::MemberNotFound { .. })
        ));
        assert!(matches!(
            r.resolve_qualified_member("AB", "C", "a"),
            Err(LayoutError::NotABase { .. })
        ));
    }
}
