// Wed Oct 14 2026 - Alex

use crate::lexer::{evaluate, tokenize, EvalError};
use crate::template::decl::{TemplateBody, TemplateDeclaration};
use crate::template::pattern::{unify_type, Bindings};
use crate::template::resolver::{normalize_args, param_names, select, Selection, SpecializationOrdering};
use crate::template::TemplateError;
use crate::types::decl::record_types_mut;
use crate::types::{
    template_id, ArrayBound, Declaration, FunctionDecl, FunctionType, Qualifiers, QualType, RecordDef,
    TemplateArg, TemplateOrigin, TypeDescriptor,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// A class template instantiated for one argument list.
#[derive(Debug, Clone)]
pub struct Instance {
    pub record: RecordDef,
    /// Nested declarations, named `A<int>::name`.
    pub nested: Vec<Declaration>,
    pub selection: Selection,
}

/// Memoized instantiations, keyed by template-id. Nothing is instantiated
/// until someone asks for it.
pub struct InstanceCache {
    records: RwLock<IndexMap<String, Arc<Instance>>>,
    functions: RwLock<IndexMap<String, Arc<FunctionDecl>>>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(IndexMap::new()),
            functions: RwLock::new(IndexMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Instance>> {
        self.records.read().get(name).cloned()
    }

    pub fn get_function(&self, name: &str) -> Option<Arc<FunctionDecl>> {
        self.functions.read().get(name).cloned()
    }

    pub fn instantiate(
        &self,
        tpl: &TemplateDeclaration,
        args: &[TemplateArg],
        ordering: SpecializationOrdering,
    ) -> Result<Arc<Instance>, TemplateError> {
        let args = normalize_args(tpl, args)?;
        let name = template_id(&tpl.name, &args);
        if let Some(hit) = self.get(&name) {
            return Ok(hit);
        }
        let instance = Arc::new(instantiate_record(tpl, &args, ordering)?);
        log::debug!("instantiated {}", name);
        let mut records = self.records.write();
        Ok(records.entry(name).or_insert(instance).clone())
    }

    pub fn instantiate_function(
        &self,
        tpl: &TemplateDeclaration,
        args: &[TemplateArg],
    ) -> Result<Arc<FunctionDecl>, TemplateError> {
        let args = normalize_args(tpl, args)?;
        let name = template_id(&tpl.name, &args);
        if let Some(hit) = self.get_function(&name) {
            return Ok(hit);
        }
        let func = Arc::new(instantiate_function(tpl, &args)?);
        let mut functions = self.functions.write();
        Ok(functions.entry(name).or_insert(func).clone())
    }

    /// Deduces the arguments of a function template from the types of the
    /// call arguments, then instantiates it.
    pub fn instantiate_for_call(
        &self,
        tpl: &TemplateDeclaration,
        call_args: &[QualType],
    ) -> Result<Arc<FunctionDecl>, TemplateError> {
        let args = deduce_call(tpl, call_args)?;
        self.instantiate_function(tpl, &args)
    }

    pub fn size(&self) -> usize {
        self.records.read().len() + self.functions.read().len()
    }

    pub fn clear(&self) {
        self.records.write().clear();
        self.functions.write().clear();
    }
}

impl Default for InstanceCache {
    fn default() -> Self {
        Self::new()
    }
}

pub fn instantiate_record(
    tpl: &TemplateDeclaration,
    args: &[TemplateArg],
    ordering: SpecializationOrdering,
) -> Result<Instance, TemplateError> {
    if !tpl.is_class_template() {
        return Err(TemplateError::NotAClassTemplate(tpl.name.clone()));
    }
    let (selection, bindings) = select(tpl, args, ordering)?;
    let body = match selection {
        Selection::Primary => tpl.primary.as_ref(),
        Selection::Specialization(i) => tpl.specializations.get(i).map(|s| &s.body),
    };
    let name = template_id(&tpl.name, args);
    let Some(TemplateBody::Record { def, nested }) = body else {
        return Err(TemplateError::NoDefinition {
            template: tpl.name.clone(),
            args: name.trim_start_matches(tpl.name.as_str()).to_string(),
        });
    };

    let mut record = def.clone();
    record.name = name.clone();
    record_types_mut(&mut record, &mut |t| *t = substitute_type(t, &bindings));
    record.template_origin = Some(TemplateOrigin {
        template: tpl.name.clone(),
        args: args.to_vec(),
        specialization: match selection {
            Selection::Primary => None,
            Selection::Specialization(i) => Some(i),
        },
    });
    for member in &record.members {
        if let Some(expr) = unevaluated_bound(&member.ty) {
            return Err(TemplateError::InvalidBound {
                template: tpl.name.clone(),
                expr,
                message: "depends on an unknown name".to_string(),
            });
        }
    }

    let nested: Vec<Declaration> = nested
        .iter()
        .map(|d| {
            let mut d = d.clone();
            d.rename(format!("{}::{}", name, d.name()));
            d.types_mut(&mut |t| *t = substitute_type(t, &bindings));
            d
        })
        .collect();
    record.nested = nested.iter().map(|d| d.name().to_string()).collect();
    Ok(Instance {
        record,
        nested,
        selection,
    })
}

pub fn instantiate_function(tpl: &TemplateDeclaration, args: &[TemplateArg]) -> Result<FunctionDecl, TemplateError> {
    let Some(TemplateBody::Function(func)) = &tpl.primary else {
        return Err(TemplateError::NoDefinition {
            template: tpl.name.clone(),
            args: args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", "),
        });
    };
    let bindings = Bindings::from_args(param_names(&tpl.params), args.to_vec());
    let mut out = func.clone();
    out.name = template_id(&tpl.name, args);
    out.ty = substitute_type(&out.ty, &bindings);
    Ok(out)
}

fn deduce_call(tpl: &TemplateDeclaration, call_args: &[QualType]) -> Result<Vec<TemplateArg>, TemplateError> {
    let deduction = || TemplateError::Deduction(tpl.name.clone());
    let Some(TemplateBody::Function(func)) = &tpl.primary else {
        return Err(deduction());
    };
    let ftype: &FunctionType = func.ty.as_function().ok_or_else(deduction)?;
    if ftype.params.len() < call_args.len() && !ftype.variadic {
        return Err(deduction());
    }
    let mut bindings = Bindings::new(param_names(&tpl.params));
    for (param, arg) in ftype.params.iter().zip(call_args) {
        // qualifiers written on the parameter are not part of T; by-value
        // parameters also drop the argument's own top-level qualifiers
        let (pattern, arg) = match &param.ty {
            TypeDescriptor::Reference { target, .. } => {
                let mut arg = arg.clone();
                arg.quals -= target.quals;
                (
                    QualType {
                        ty: target.ty.clone(),
                        quals: Qualifiers::empty(),
                    },
                    arg,
                )
            }
            _ => (
                QualType::new(param.ty.clone()),
                QualType {
                    ty: arg.ty.clone(),
                    quals: Qualifiers::empty(),
                },
            ),
        };
        if !unify_type(&pattern, &arg, &mut bindings) {
            return Err(deduction());
        }
    }
    let mut args = Vec::new();
    for (index, param) in tpl.params.iter().enumerate() {
        match (bindings.get(index), &param.default) {
            (Some(arg), _) => args.push(arg.clone()),
            (None, Some(default)) => args.push(default.clone()),
            (None, None) => return Err(deduction()),
        }
    }
    Ok(args)
}

/// Replaces template parameters in `ty` by their bound arguments and
/// re-evaluates array bounds that named them.
pub fn substitute_type(ty: &QualType, bindings: &Bindings) -> QualType {
    let quals = ty.quals;
    let rebuilt = match &ty.ty {
        TypeDescriptor::TemplateParam { index, .. } => {
            return match bindings.get(*index) {
                Some(TemplateArg::Type(bound)) => bound.clone().with_quals(quals),
                _ => ty.clone(),
            };
        }
        TypeDescriptor::Pointer(t) => TypeDescriptor::Pointer(Box::new(substitute_type(t, bindings))),
        TypeDescriptor::Reference { target, rvalue } => {
            let target = substitute_type(target, bindings);
            // reference collapsing: T& with T = U& stays U&
            if let TypeDescriptor::Reference { .. } = target.ty {
                return target;
            }
            TypeDescriptor::Reference {
                target: Box::new(target),
                rvalue: *rvalue,
            }
        }
        TypeDescriptor::Array { element, bound } => TypeDescriptor::Array {
            element: Box::new(substitute_type(element, bindings)),
            bound: substitute_bound(bound, bindings),
        },
        TypeDescriptor::Function(func) => TypeDescriptor::Function(Box::new(FunctionType {
            ret: substitute_type(&func.ret, bindings),
            params: func.params.iter().map(|p| substitute_type(p, bindings)).collect(),
            variadic: func.variadic,
            linkage: func.linkage,
        })),
        TypeDescriptor::TemplateId { name, args } => TypeDescriptor::TemplateId {
            name: name.clone(),
            args: args.iter().map(|a| substitute_arg(a, bindings)).collect(),
        },
        other => other.clone(),
    };
    QualType { ty: rebuilt, quals }
}

pub fn substitute_arg(arg: &TemplateArg, bindings: &Bindings) -> TemplateArg {
    match arg {
        TemplateArg::Type(t) => TemplateArg::Type(substitute_type(t, bindings)),
        TemplateArg::ValueParam { index, .. } => bindings.get(*index).cloned().unwrap_or_else(|| arg.clone()),
        TemplateArg::Expr(text) => match evaluate_with(text, bindings) {
            Ok(v) => TemplateArg::Value(v),
            Err(_) => arg.clone(),
        },
        TemplateArg::Value(_) => arg.clone(),
    }
}

fn substitute_bound(bound: &ArrayBound, bindings: &Bindings) -> ArrayBound {
    match bound {
        ArrayBound::Expr(text) => match evaluate_with(text, bindings) {
            Ok(v) if v >= 0 => ArrayBound::Fixed(v as u64),
            _ => bound.clone(),
        },
        other => other.clone(),
    }
}

/// Evaluates a dependent constant expression with the bound values.
pub fn evaluate_with(text: &str, bindings: &Bindings) -> Result<i64, EvalError> {
    let tokens = tokenize("<template>", text).map_err(|e| EvalError::Syntax {
        message: e.to_string(),
        pos: e.position().clone(),
    })?;
    evaluate(&tokens, |name, pos| match bindings.value_of(name) {
        Some(TemplateArg::Value(v)) => Ok(*v),
        _ => Err(EvalError::Unresolved {
            name: name.to_string(),
            pos: pos.clone(),
        }),
    })
}

fn unevaluated_bound(ty: &QualType) -> Option<String> {
    let mut found = None;
    ty.walk(&mut |t| {
        if let TypeDescriptor::Array {
            bound: ArrayBound::Expr(e),
            ..
        } = t
        {
            found.get_or_insert_with(|| e.clone());
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::decl::TemplateParam;
    use crate::template::resolver::tests::fixture_template;
    use crate::types::{MemberDescriptor, NameLinkage, PrimitiveType, RecordKind, TypedefDecl};

    fn param(name: &str, index: usize) -> QualType {
        QualType::new(TypeDescriptor::TemplateParam {
            name: name.to_string(),
            index,
        })
    }

    fn prim(p: PrimitiveType) -> QualType {
        QualType::primitive(p)
    }

    // template<typename T, int size> struct sA { char tab[size]; };
    fn sized_array_template() -> TemplateDeclaration {
        let mut def = RecordDef::new("sA", RecordKind::Struct);
        def.members.push(MemberDescriptor::new(
            Some("tab".to_string()),
            prim(PrimitiveType::Char).array_of(ArrayBound::Expr("size".to_string())),
        ));
        TemplateDeclaration::new(
            "sA",
            vec![
                TemplateParam::type_param("T"),
                TemplateParam::value_param("size", prim(PrimitiveType::Int)),
            ],
        )
        .with_primary(TemplateBody::Record { def, nested: vec![] })
    }

    #[test]
    fn test_array_bound_reevaluated() {
        let cache = InstanceCache::new();
        let inst = cache
            .instantiate(
                &sized_array_template(),
                &[TemplateArg::Type(prim(PrimitiveType::Int)), TemplateArg::Value(4)],
                SpecializationOrdering::default(),
            )
            .unwrap();
        assert_eq!(inst.record.name, "sA<int, 4>");
        assert_eq!(
            inst.record.members[0].ty,
            prim(PrimitiveType::Char).array_of(ArrayBound::Fixed(4))
        );
    }

    #[test]
    fn test_instances_are_memoized() {
        let cache = InstanceCache::new();
        let tpl = fixture_template();
        assert_eq!(cache.size(), 0);
        let args = vec![
            TemplateArg::Type(prim(PrimitiveType::Int)),
            TemplateArg::Type(prim(PrimitiveType::Int).pointer_to()),
            TemplateArg::Value(5),
        ];
        let a = cache.instantiate(&tpl, &args, SpecializationOrdering::Narrowest).unwrap();
        let b = cache.instantiate(&tpl, &args, SpecializationOrdering::Narrowest).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.record.name, "A<int, int *, 5>");
        assert_eq!(a.selection, Selection::Specialization(2));
        assert_eq!(a.record.template_origin.as_ref().unwrap().specialization, Some(2));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_nested_alias_substituted() {
        // template <typename T> struct identity { using type = T; };
        let nested = vec![Declaration::Typedef(TypedefDecl {
            name: "type".to_string(),
            ty: param("T", 0),
            pos: None,
        })];
        let tpl = TemplateDeclaration::new("identity", vec![TemplateParam::type_param("T")]).with_primary(
            TemplateBody::Record {
                def: RecordDef::new("identity", RecordKind::Struct),
                nested,
            },
        );
        let inst = instantiate_record(
            &tpl,
            &[TemplateArg::Type(prim(PrimitiveType::Long))],
            SpecializationOrdering::Narrowest,
        )
        .unwrap();
        assert_eq!(inst.record.nested, vec!["identity<long>::type".to_string()]);
        match &inst.nested[0] {
            Declaration::Typedef(t) => assert_eq!(t.ty, prim(PrimitiveType::Long)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_member_template_instantiated_per_call() {
        // template<typename T> void operator()(const T& obj);
        let func = FunctionDecl {
            name: "Printer::operator()".to_string(),
            ty: QualType::void().function_returning(
                vec![param("T", 0).with_quals(Qualifiers::CONST).reference_to(false)],
                false,
                crate::types::LanguageLinkage::Cxx,
            ),
            param_names: vec![Some("obj".to_string())],
            linkage: NameLinkage::default(),
            is_definition: true,
            pos: None,
        };
        let tpl = TemplateDeclaration::new("Printer::operator()", vec![TemplateParam::type_param("T")])
            .with_primary(TemplateBody::Function(func));
        let cache = InstanceCache::new();
        assert_eq!(cache.size(), 0);
        let f_int = cache.instantiate_for_call(&tpl, &[prim(PrimitiveType::Int)]).unwrap();
        assert_eq!(f_int.name, "Printer::operator()<int>");
        assert_eq!(f_int.ty.declare(""), "void (const int &)");
        cache.instantiate_for_call(&tpl, &[prim(PrimitiveType::Int)]).unwrap();
        assert_eq!(cache.size(), 1);
        cache
            .instantiate_for_call(&tpl, &[prim(PrimitiveType::Double).with_quals(Qualifiers::CONST)])
            .unwrap();
        assert!(cache.get_function("Printer::operator()<double>").is_some());
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn test_unbound_bound_is_reported() {
        let mut def = RecordDef::new("Bad", RecordKind::Struct);
        def.members.push(MemberDescriptor::new(
            Some("x".to_string()),
            prim(PrimitiveType::Char).array_of(ArrayBound::Expr("N + M".to_string())),
        ));
        let tpl = TemplateDeclaration::new(
            "Bad",
            vec![TemplateParam::value_param("N", prim(PrimitiveType::Int))],
        )
        .with_primary(TemplateBody::Record { def, nested: vec![] });
        let err = instantiate_record(&tpl, &[TemplateArg::Value(1)], SpecializationOrdering::Narrowest).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidBound { .. }));
    }
}
