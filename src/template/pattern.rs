// Wed Oct 14 2026 - Alex

use crate::types::{ArrayBound, QualType, TemplateArg, TypeDescriptor};

/// Values deduced for the parameters of one template parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct Bindings {
    names: Vec<String>,
    slots: Vec<Option<TemplateArg>>,
}

impl Bindings {
    pub fn new(names: Vec<String>) -> Self {
        let slots = vec![None; names.len()];
        Self { names, slots }
    }

    /// Bindings where every slot is already known.
    pub fn from_args(names: Vec<String>, args: Vec<TemplateArg>) -> Self {
        Self {
            names,
            slots: args.into_iter().map(Some).collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&TemplateArg> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn value_of(&self, name: &str) -> Option<&TemplateArg> {
        self.index_of(name).and_then(|i| self.get(i))
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn args(&self) -> Vec<TemplateArg> {
        self.slots.iter().flatten().cloned().collect()
    }

    /// Binds `index` to `arg`, or checks that an earlier binding agrees.
    fn bind(&mut self, index: usize, arg: TemplateArg) -> bool {
        match self.slots.get_mut(index) {
            Some(Some(existing)) => *existing == arg,
            Some(slot) => {
                *slot = Some(arg);
                true
            }
            None => false,
        }
    }
}

/// Matches an argument list against a pattern, deducing every parameter.
/// Fails when the shapes differ, when a parameter would need two different
/// values, or when some parameter is left undeduced.
pub fn unify_args(pattern: &[TemplateArg], args: &[TemplateArg], names: Vec<String>) -> Option<Bindings> {
    if pattern.len() != args.len() {
        return None;
    }
    let mut bindings = Bindings::new(names);
    for (p, a) in pattern.iter().zip(args) {
        if !unify_arg(p, a, &mut bindings) {
            return None;
        }
    }
    bindings.is_complete().then_some(bindings)
}

pub fn unify_arg(pattern: &TemplateArg, arg: &TemplateArg, bindings: &mut Bindings) -> bool {
    match (pattern, arg) {
        (TemplateArg::Type(p), TemplateArg::Type(a)) => unify_type(p, a, bindings),
        (TemplateArg::ValueParam { index, .. }, TemplateArg::Value(_))
        | (TemplateArg::ValueParam { index, .. }, TemplateArg::Expr(_))
        | (TemplateArg::ValueParam { index, .. }, TemplateArg::ValueParam { .. }) => {
            bindings.bind(*index, arg.clone())
        }
        (TemplateArg::Value(x), TemplateArg::Value(y)) => x == y,
        (TemplateArg::Expr(x), TemplateArg::Expr(y)) => x == y,
        _ => false,
    }
}

/// Structural unification of a type pattern with a concrete type.
pub fn unify_type(pattern: &QualType, arg: &QualType, bindings: &mut Bindings) -> bool {
    if let TypeDescriptor::TemplateParam { index, .. } = &pattern.ty {
        // `const T` against `const int` binds T to `int`
        if !arg.quals.contains(pattern.quals) {
            return false;
        }
        let bound = QualType {
            ty: arg.ty.clone(),
            quals: arg.quals - pattern.quals,
        };
        return bindings.bind(*index, TemplateArg::Type(bound));
    }
    if pattern.quals != arg.quals {
        return false;
    }
    match (&pattern.ty, &arg.ty) {
        (TypeDescriptor::Pointer(p), TypeDescriptor::Pointer(a)) => unify_type(p, a, bindings),
        (
            TypeDescriptor::Reference { target: p, rvalue: pr },
            TypeDescriptor::Reference { target: a, rvalue: ar },
        ) => pr == ar && unify_type(p, a, bindings),
        (
            TypeDescriptor::Array { element: pe, bound: pb },
            TypeDescriptor::Array { element: ae, bound: ab },
        ) => unify_bound(pb, ab, bindings) && unify_type(pe, ae, bindings),
        (TypeDescriptor::Function(p), TypeDescriptor::Function(a)) => {
            p.variadic == a.variadic
                && p.params.len() == a.params.len()
                && unify_type(&p.ret, &a.ret, bindings)
                && p.params
                    .iter()
                    .zip(&a.params)
                    .all(|(pp, ap)| unify_type(pp, ap, bindings))
        }
        (
            TypeDescriptor::TemplateId { name: pn, args: pa },
            TypeDescriptor::TemplateId { name: an, args: aa },
        ) => {
            pn == an
                && pa.len() == aa.len()
                && pa.iter().zip(aa).all(|(p, a)| unify_arg(p, a, bindings))
        }
        (p, a) => p == a,
    }
}

fn unify_bound(pattern: &ArrayBound, arg: &ArrayBound, bindings: &mut Bindings) -> bool {
    if let ArrayBound::Expr(text) = pattern {
        if let Some(index) = bindings.index_of(text.trim()) {
            let value = match arg {
                ArrayBound::Fixed(n) => TemplateArg::Value(*n as i64),
                ArrayBound::Expr(e) => TemplateArg::Expr(e.clone()),
                ArrayBound::Unknown => return false,
            };
            return bindings.bind(index, value);
        }
    }
    pattern == arg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveType, Qualifiers};

    fn param(name: &str, index: usize) -> QualType {
        QualType::new(TypeDescriptor::TemplateParam {
            name: name.to_string(),
            index,
        })
    }

    fn int() -> QualType {
        QualType::primitive(PrimitiveType::Int)
    }

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_repeated_parameter_must_agree() {
        // A<T, T*, I>
        let pattern = vec![
            TemplateArg::Type(param("T", 0)),
            TemplateArg::Type(param("T", 0).pointer_to()),
            TemplateArg::ValueParam { name: "I".to_string(), index: 1 },
        ];
        let ok = vec![
            TemplateArg::Type(int()),
            TemplateArg::Type(int().pointer_to()),
            TemplateArg::Value(5),
        ];
        let b = unify_args(&pattern, &ok, names(&["T", "I"])).unwrap();
        assert_eq!(b.get(0), Some(&TemplateArg::Type(int())));
        assert_eq!(b.get(1), Some(&TemplateArg::Value(5)));

        let bad = vec![
            TemplateArg::Type(int().pointer_to()),
            TemplateArg::Type(int().pointer_to()),
            TemplateArg::Value(2),
        ];
        assert!(unify_args(&pattern, &bad, names(&["T", "I"])).is_none());
    }

    #[test]
    fn test_qualifiers_stripped_from_binding() {
        let pattern = param("T", 0).with_quals(Qualifiers::CONST);
        let arg = int().with_quals(Qualifiers::CONST | Qualifiers::VOLATILE);
        let mut b = Bindings::new(names(&["T"]));
        assert!(unify_type(&pattern, &arg, &mut b));
        assert_eq!(
            b.get(0),
            Some(&TemplateArg::Type(int().with_quals(Qualifiers::VOLATILE)))
        );

        let mut b = Bindings::new(names(&["T"]));
        assert!(!unify_type(&pattern, &int(), &mut b));
    }

    #[test]
    fn test_constant_in_pattern() {
        let pattern = vec![TemplateArg::Value(5)];
        assert!(unify_args(&pattern, &[TemplateArg::Value(5)], vec![]).is_some());
        assert!(unify_args(&pattern, &[TemplateArg::Value(4)], vec![]).is_none());
    }

    #[test]
    fn test_array_bound_deduction() {
        let pattern = param("T", 0).array_of(ArrayBound::Expr("N".to_string()));
        let arg = int().array_of(ArrayBound::Fixed(3));
        let mut b = Bindings::new(names(&["T", "N"]));
        assert!(unify_type(&pattern, &arg, &mut b));
        assert_eq!(b.value_of("N"), Some(&TemplateArg::Value(3)));
    }
}
