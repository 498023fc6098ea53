// Thu Oct 15 2026 - Alex

use crate::driver::TypeGraph;
use crate::layout::LayoutPlan;
use crate::parser::parse_type;
use crate::query::error::parse_number;
use crate::query::QueryError;
use crate::types::{Declaration, FunctionDecl, QualType, RecordKind, TypeDescriptor, TypeTable};
use itertools::Itertools;
use log::debug;
use serde::Serialize;
use std::str::FromStr;

/// One `offset:spec` condition on a record layout.
#[derive(Debug, Clone, PartialEq)]
pub enum StructConstraint {
    /// `8:int *` a field of that type starts at the offset.
    FieldType { offset: u64, ty: QualType },
    /// `8:+4` a field of that size starts at the offset.
    FieldSize { offset: u64, size: u64 },
    /// `8:?` some field starts at the offset.
    FieldAt(u64),
    /// `8:*` a pointer field starts at the offset.
    PointerAt(u64),
    /// `*:24` total size.
    TotalSize(u64),
}

fn unsigned(text: &str) -> Result<u64, QueryError> {
    let value = parse_number(text)?;
    u64::try_from(value).map_err(|_| QueryError::InvalidNumber(text.to_string()))
}

impl FromStr for StructConstraint {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (offset, spec) = s
            .split_once(':')
            .ok_or_else(|| QueryError::InvalidConstraint(s.to_string()))?;
        let spec = spec.trim();
        if offset.trim() == "*" {
            return Ok(StructConstraint::TotalSize(unsigned(spec)?));
        }
        let offset = unsigned(offset)?;
        if let Some(size) = spec.strip_prefix('+') {
            return Ok(StructConstraint::FieldSize {
                offset,
                size: unsigned(size)?,
            });
        }
        match spec {
            "?" => Ok(StructConstraint::FieldAt(offset)),
            "*" => Ok(StructConstraint::PointerAt(offset)),
            "" => Err(QueryError::InvalidConstraint(s.to_string())),
            text => Ok(StructConstraint::FieldType {
                offset,
                ty: spelled_type(text)?,
            }),
        }
    }
}

fn spelled_type(text: &str) -> Result<QualType, QueryError> {
    let (_, ty) = parse_type(text).map_err(|source| QueryError::InvalidType {
        text: text.to_string(),
        source,
    })?;
    Ok(ty)
}

/// Same type once typedefs are looked through.
fn same_type(table: &TypeTable, wanted: &QualType, actual: &QualType) -> bool {
    let mut wanted = wanted.clone();
    table.resolve_names(&mut wanted);
    wanted == *actual || table.canonical(&wanted) == table.canonical(actual)
}

impl StructConstraint {
    fn matches(&self, table: &TypeTable, plan: &LayoutPlan) -> bool {
        let at = |offset: u64| plan.fields.iter().filter(move |f| f.offset == offset && !f.is_bitfield());
        match self {
            StructConstraint::TotalSize(size) => plan.size == *size,
            StructConstraint::FieldAt(offset) => plan.fields.iter().any(|f| f.offset == *offset),
            StructConstraint::FieldSize { offset, size } => at(*offset).any(|f| f.size == *size),
            StructConstraint::PointerAt(offset) => {
                at(*offset).any(|f| matches!(table.canonical(&f.ty).ty, TypeDescriptor::Pointer(_)))
            }
            StructConstraint::FieldType { offset, ty } => at(*offset).any(|f| same_type(table, ty, &f.ty)),
        }
    }
}

/// Structs and classes whose layout satisfies every constraint, in
/// declaration order. Records without a layout never match.
pub fn select_structs(graph: &TypeGraph, constraints: &[StructConstraint]) -> Vec<String> {
    let table = graph.table();
    table
        .records()
        .filter(|r| r.kind != RecordKind::Union && !r.is_anonymous())
        .filter_map(|r| match graph.layout(&r.name) {
            Ok(plan) => Some(plan),
            Err(e) => {
                debug!("skipping {}: {}", r.name, e);
                None
            }
        })
        .filter(|plan| constraints.iter().all(|c| c.matches(table, plan)))
        .map(|plan| plan.name.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstantMatch {
    pub name: String,
    pub value: i64,
    /// Only part of the mask: the value has some of the bits requested.
    pub partial: bool,
}

/// Macros and enumerators equal to `value`. With `mask`, constants that
/// cover part of its bits are returned too. `symbol` filters names by
/// substring.
pub fn select_constants(graph: &TypeGraph, value: i64, mask: bool, symbol: &str) -> Vec<ConstantMatch> {
    graph
        .declarations()
        .filter_map(|decl| match decl {
            Declaration::Macro(m) => m.value.map(|v| (m.name.as_str(), v)),
            Declaration::Enumerator(e) => Some((e.name.as_str(), e.value)),
            _ => None,
        })
        .filter(|(name, _)| name.contains(symbol))
        .filter_map(|(name, v)| {
            if v == value {
                Some(ConstantMatch {
                    name: name.to_string(),
                    value: v,
                    partial: false,
                })
            } else if mask && v > 0 && v < value && v & value != 0 {
                Some(ConstantMatch {
                    name: name.to_string(),
                    value: v,
                    partial: true,
                })
            } else {
                None
            }
        })
        .collect()
}

/// `A | B` over the partial matches, or the exact match when there is one.
pub fn mask_expression(matches: &[ConstantMatch]) -> String {
    if let Some(exact) = matches.iter().find(|m| !m.partial) {
        return exact.name.clone();
    }
    matches.iter().map(|m| m.name.as_str()).join(" | ")
}

/// `pos:type` where position 0 is the return type and n the n-th parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeConstraint {
    pub position: usize,
    pub ty: QualType,
}

impl FromStr for PrototypeConstraint {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (position, ty) = s
            .split_once(':')
            .ok_or_else(|| QueryError::InvalidConstraint(s.to_string()))?;
        let position = position
            .trim()
            .parse::<usize>()
            .map_err(|_| QueryError::InvalidConstraint(s.to_string()))?;
        Ok(Self {
            position,
            ty: spelled_type(ty.trim())?,
        })
    }
}

pub fn select_prototypes<'g>(graph: &'g TypeGraph, constraints: &[PrototypeConstraint]) -> Vec<&'g FunctionDecl> {
    let table = graph.table();
    graph
        .declarations()
        .filter_map(|decl| match decl {
            Declaration::Function(f) => Some(f),
            _ => None,
        })
        .filter(|f| {
            let Some(func) = f.ty.as_function() else { return false };
            constraints.iter().all(|c| {
                let actual = match c.position {
                    0 => Some(&func.ret),
                    n => func.params.get(n - 1),
                };
                actual.is_some_and(|t| same_type(table, &c.ty, t))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::driver::{Session, SourceUnit};

    const SRC: &str = r#"
#define FLAG_READ 1
#define FLAG_WRITE 2
#define FLAG_EXEC 4
#define NAME "x"
enum mode { MODE_NONE, MODE_RW = 3, MODE_ALL = 7 };
typedef unsigned long size_type;
struct header { int magic; char *name; size_type length; };
struct other { short s; char c; };
union either { int i; char *p; };
int open_file(const char *path, int flags);
size_type header_size(struct header *h);
void close_file(int fd);
"#;

    fn graph() -> TypeGraph {
        Session::new(Config::new())
            .unwrap()
            .run(&[SourceUnit::new("q.h", SRC)])
    }

    fn parse(constraints: &[&str]) -> Vec<StructConstraint> {
        constraints.iter().map(|c| c.parse().unwrap()).collect()
    }

    #[test]
    fn test_parse_struct_constraints() {
        assert_eq!("*:24".parse::<StructConstraint>().unwrap(), StructConstraint::TotalSize(24));
        assert_eq!("0x8:?".parse::<StructConstraint>().unwrap(), StructConstraint::FieldAt(8));
        assert_eq!(
            "16:+8".parse::<StructConstraint>().unwrap(),
            StructConstraint::FieldSize { offset: 16, size: 8 }
        );
        assert!("8".parse::<StructConstraint>().is_err());
        assert!("x:?".parse::<StructConstraint>().is_err());
    }

    #[test]
    fn test_select_structs() {
        let g = graph();
        assert_eq!(select_structs(&g, &parse(&["*:24"])), vec!["header".to_string()]);
        assert_eq!(select_structs(&g, &parse(&["8:*", "16:+8"])), vec!["header".to_string()]);
        assert_eq!(select_structs(&g, &parse(&["0:int"])), vec!["header".to_string()]);
        assert_eq!(select_structs(&g, &parse(&["16:unsigned long"])), vec!["header".to_string()]);
        assert_eq!(select_structs(&g, &parse(&["2:?", "*:4"])), vec!["other".to_string()]);
        assert!(select_structs(&g, &parse(&["0:*"])).is_empty());
    }

    #[test]
    fn test_select_constants() {
        let g = graph();
        let exact = select_constants(&g, 2, false, "");
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].name, "FLAG_WRITE");

        let masked = select_constants(&g, 6, true, "FLAG");
        let names: Vec<&str> = masked.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["FLAG_WRITE", "FLAG_EXEC"]);
        assert_eq!(mask_expression(&masked), "FLAG_WRITE | FLAG_EXEC");

        let modes = select_constants(&g, 7, false, "MODE");
        assert_eq!(mask_expression(&modes), "MODE_ALL");
    }

    #[test]
    fn test_select_prototypes() {
        let g = graph();
        let by_return: Vec<PrototypeConstraint> = vec!["0:int".parse().unwrap()];
        let found: Vec<&str> = select_prototypes(&g, &by_return).iter().map(|f| f.name.as_str()).collect();
        assert_eq!(found, vec!["open_file"]);

        let by_param: Vec<PrototypeConstraint> = vec!["1:int".parse().unwrap()];
        let found: Vec<&str> = select_prototypes(&g, &by_param).iter().map(|f| f.name.as_str()).collect();
        assert_eq!(found, vec!["close_file"]);

        let by_typedef: Vec<PrototypeConstraint> = vec!["0:size_type".parse().unwrap(), "1:struct header *".parse().unwrap()];
        let found: Vec<&str> = select_prototypes(&g, &by_typedef).iter().map(|f| f.name.as_str()).collect();
        assert_eq!(found, vec!["header_size"]);

        let too_far: Vec<PrototypeConstraint> = vec!["3:int".parse().unwrap()];
        assert!(select_prototypes(&g, &too_far).is_empty());
    }
}
