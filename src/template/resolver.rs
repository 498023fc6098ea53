// Wed Oct 14 2026 - Alex

use crate::template::decl::{PartialSpecialization, TemplateDeclaration, TemplateParam};
use crate::template::instance::substitute_arg;
use crate::template::pattern::{unify_args, Bindings};
use crate::template::TemplateError;
use crate::types::{template_id, QualType, RecordKind, TemplateArg};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// How two partial specializations that deduction leaves unordered compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpecializationOrdering {
    /// The one with fewer template parameters is more specialized.
    #[default]
    Narrowest,
    /// Deduction only; unordered candidates are ambiguous.
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Selection {
    Primary,
    Specialization(usize),
}

pub fn param_names(params: &[TemplateParam]) -> Vec<String> {
    params.iter().map(|p| p.name.clone()).collect()
}

/// Completes `args` with the defaults of the trailing parameters.
pub fn normalize_args(tpl: &TemplateDeclaration, args: &[TemplateArg]) -> Result<Vec<TemplateArg>, TemplateError> {
    let arity_error = || TemplateError::ArityMismatch {
        template: tpl.name.clone(),
        expected: tpl.params.len(),
        found: args.len(),
    };
    if args.len() > tpl.params.len() {
        return Err(arity_error());
    }
    let mut out = args.to_vec();
    for (index, param) in tpl.params.iter().enumerate().skip(args.len()) {
        let default = param.default.as_ref().ok_or_else(arity_error)?;
        // defaults may name earlier parameters
        let so_far = Bindings::from_args(param_names(&tpl.params[..index]), out.clone());
        out.push(substitute_arg(default, &so_far));
    }
    for (index, (param, arg)) in tpl.params.iter().zip(&out).enumerate() {
        let is_type_arg = matches!(arg, TemplateArg::Type(_));
        if param.is_type() != is_type_arg {
            return Err(TemplateError::ArgumentKind {
                template: tpl.name.clone(),
                index,
            });
        }
    }
    Ok(out)
}

/// Picks the primary template or the most specialized matching partial
/// specialization for an already normalized argument list.
pub fn select(
    tpl: &TemplateDeclaration,
    args: &[TemplateArg],
    ordering: SpecializationOrdering,
) -> Result<(Selection, Bindings), TemplateError> {
    let mut candidates: Vec<(usize, Bindings)> = tpl
        .specializations
        .iter()
        .enumerate()
        .filter_map(|(i, spec)| unify_args(&spec.pattern, args, param_names(&spec.params)).map(|b| (i, b)))
        .collect();

    match candidates.len() {
        0 => {
            let bindings = Bindings::from_args(param_names(&tpl.params), args.to_vec());
            Ok((Selection::Primary, bindings))
        }
        1 => {
            let (index, bindings) = candidates.swap_remove(0);
            Ok((Selection::Specialization(index), bindings))
        }
        _ => {
            let indices: Vec<usize> = candidates.iter().map(|(i, _)| *i).collect();
            let winners: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|&a| {
                    indices.iter().filter(|&&b| b != a).all(|&b| {
                        beats(&tpl.specializations[a], &tpl.specializations[b], ordering)
                    })
                })
                .collect();
            match winners.as_slice() {
                [winner] => {
                    let bindings = candidates
                        .into_iter()
                        .find(|(i, _)| i == winner)
                        .map(|(_, b)| b)
                        .ok_or_else(|| ambiguity(tpl, args, &indices))?;
                    log::debug!(
                        "{}: specialization #{} out of {:?}",
                        template_id(&tpl.name, args),
                        winner + 1,
                        indices.iter().map(|i| i + 1).collect::<Vec<_>>()
                    );
                    Ok((Selection::Specialization(*winner), bindings))
                }
                _ => Err(ambiguity(tpl, args, &indices)),
            }
        }
    }
}

fn ambiguity(tpl: &TemplateDeclaration, args: &[TemplateArg], candidates: &[usize]) -> TemplateError {
    TemplateError::AmbiguousSpecialization {
        template: tpl.name.clone(),
        args: args.iter().map(|a| a.to_string()).join(", "),
        candidates: candidates.iter().map(|i| i + 1).collect(),
    }
}

/// Strict "more specialized than" between two candidates.
pub fn beats(a: &PartialSpecialization, b: &PartialSpecialization, ordering: SpecializationOrdering) -> bool {
    let ab = at_least_as_specialized(a, b);
    let ba = at_least_as_specialized(b, a);
    match (ab, ba) {
        (true, false) => true,
        (false, true) => false,
        _ => match ordering {
            SpecializationOrdering::Narrowest => a.params.len() < b.params.len(),
            SpecializationOrdering::Standard => false,
        },
    }
}

/// True when `b`'s pattern can be deduced from `a`'s pattern with `a`'s
/// parameters replaced by unique synthesized types and values.
pub fn at_least_as_specialized(a: &PartialSpecialization, b: &PartialSpecialization) -> bool {
    let synthesized: Vec<TemplateArg> = a
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if p.is_type() {
                TemplateArg::Type(QualType::record(RecordKind::Struct, &format!("<{}#{}>", p.name, i)))
            } else {
                TemplateArg::Expr(format!("<{}#{}>", p.name, i))
            }
        })
        .collect();
    let bindings = Bindings::from_args(param_names(&a.params), synthesized);
    let concrete: Vec<TemplateArg> = a.pattern.iter().map(|arg| substitute_arg(arg, &bindings)).collect();
    unify_args(&b.pattern, &concrete, param_names(&b.params)).is_some()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::template::decl::TemplateBody;
    use crate::types::{PrimitiveType, RecordDef, TypeDescriptor};

    fn param(name: &str, index: usize) -> QualType {
        QualType::new(TypeDescriptor::TemplateParam {
            name: name.to_string(),
            index,
        })
    }

    fn vparam(name: &str, index: usize) -> TemplateArg {
        TemplateArg::ValueParam {
            name: name.to_string(),
            index,
        }
    }

    fn int_param(name: &str) -> TemplateParam {
        TemplateParam::value_param(name, QualType::primitive(PrimitiveType::Int))
    }

    fn body(tag: &str) -> TemplateBody {
        TemplateBody::Record {
            def: RecordDef::new(tag, RecordKind::Class),
            nested: vec![],
        }
    }

    fn spec(params: Vec<TemplateParam>, pattern: Vec<TemplateArg>, tag: &str) -> PartialSpecialization {
        PartialSpecialization {
            params,
            pattern,
            body: body(tag),
            pos: None,
        }
    }

    /// The four-specialization `A` template of the templates fixture.
    pub(crate) fn fixture_template() -> TemplateDeclaration {
        let t = TemplateParam::type_param;
        let mut tpl = TemplateDeclaration::new("A", vec![t("T1"), t("T2"), int_param("I")])
            .with_primary(body("A"));
        // #1 A<T, T*, I>
        tpl.specializations.push(spec(
            vec![t("T"), int_param("I")],
            vec![
                TemplateArg::Type(param("T", 0)),
                TemplateArg::Type(param("T", 0).pointer_to()),
                vparam("I", 1),
            ],
            "#1",
        ));
        // #2 A<T*, T2, I>
        tpl.specializations.push(spec(
            vec![t("T"), t("T2"), int_param("I")],
            vec![
                TemplateArg::Type(param("T", 0).pointer_to()),
                TemplateArg::Type(param("T2", 1)),
                vparam("I", 2),
            ],
            "#2",
        ));
        // #3 A<int, T*, 5>
        tpl.specializations.push(spec(
            vec![t("T")],
            vec![
                TemplateArg::Type(QualType::primitive(PrimitiveType::Int)),
                TemplateArg::Type(param("T", 0).pointer_to()),
                TemplateArg::Value(5),
            ],
            "#3",
        ));
        // #4 A<X, T*, I>
        tpl.specializations.push(spec(
            vec![t("X"), t("T"), int_param("I")],
            vec![
                TemplateArg::Type(param("X", 0)),
                TemplateArg::Type(param("T", 1).pointer_to()),
                vparam("I", 2),
            ],
            "#4",
        ));
        tpl
    }

    fn ty(p: PrimitiveType) -> QualType {
        QualType::primitive(p)
    }

    fn args(a: QualType, b: QualType, i: i64) -> Vec<TemplateArg> {
        vec![TemplateArg::Type(a), TemplateArg::Type(b), TemplateArg::Value(i)]
    }

    #[test]
    fn test_int_intptr_5_selects_third() {
        let tpl = fixture_template();
        let a = args(ty(PrimitiveType::Int), ty(PrimitiveType::Int).pointer_to(), 5);
        let (sel, bindings) = select(&tpl, &a, SpecializationOrdering::Narrowest).unwrap();
        assert_eq!(sel, Selection::Specialization(2));
        assert_eq!(bindings.get(0), Some(&TemplateArg::Type(ty(PrimitiveType::Int))));
        // idempotent
        let again = select(&tpl, &a, SpecializationOrdering::Narrowest).unwrap();
        assert_eq!(again.0, sel);
    }

    #[test]
    fn test_standard_ordering_reports_ambiguity() {
        let tpl = fixture_template();
        let a = args(ty(PrimitiveType::Int), ty(PrimitiveType::Int).pointer_to(), 5);
        let err = select(&tpl, &a, SpecializationOrdering::Standard).unwrap_err();
        match err {
            TemplateError::AmbiguousSpecialization { candidates, .. } => {
                assert_eq!(candidates, vec![1, 3, 4])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_other_fixture_argument_lists() {
        let tpl = fixture_template();
        let o = SpecializationOrdering::Narrowest;
        let float = ty(PrimitiveType::Float);
        let int = ty(PrimitiveType::Int);
        assert_eq!(
            select(&tpl, &args(float.clone(), float.clone().pointer_to(), 1), o).unwrap().0,
            Selection::Specialization(0)
        );
        assert_eq!(
            select(&tpl, &args(int.clone().pointer_to(), float.clone(), 3), o).unwrap().0,
            Selection::Specialization(1)
        );
        assert_eq!(
            select(&tpl, &args(int.clone(), float, 2), o).unwrap().0,
            Selection::Primary
        );
        assert!(matches!(
            select(&tpl, &args(int.clone().pointer_to(), int.pointer_to(), 2), o),
            Err(TemplateError::AmbiguousSpecialization { .. })
        ));
    }

    #[test]
    fn test_partial_order_relations() {
        let tpl = fixture_template();
        let s = &tpl.specializations;
        assert!(at_least_as_specialized(&s[2], &s[3]));
        assert!(!at_least_as_specialized(&s[3], &s[2]));
        assert!(at_least_as_specialized(&s[0], &s[3]));
        assert!(!at_least_as_specialized(&s[2], &s[0]));
        assert!(!at_least_as_specialized(&s[0], &s[2]));
    }

    #[test]
    fn test_defaults_and_arity() {
        let t = TemplateParam::type_param;
        let tpl = TemplateDeclaration::new(
            "P",
            vec![t("T"), t("U").with_default(TemplateArg::Type(param("T", 0).pointer_to()))],
        );
        let out = normalize_args(&tpl, &[TemplateArg::Type(ty(PrimitiveType::Char))]).unwrap();
        assert_eq!(out[1], TemplateArg::Type(ty(PrimitiveType::Char).pointer_to()));
        assert!(matches!(
            normalize_args(&tpl, &[]),
            Err(TemplateError::ArityMismatch { expected: 2, found: 0, .. })
        ));
        assert!(matches!(
            normalize_args(&tpl, &[TemplateArg::Value(1), TemplateArg::Value(2)]),
            Err(TemplateError::ArgumentKind { index: 0, .. })
        ));
    }
}
