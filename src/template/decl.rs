// Wed Oct 14 2026 - Alex

use crate::lexer::SourcePos;
use crate::types::decl::{record_types, record_types_mut};
use crate::types::{Declaration, FunctionDecl, QualType, RecordDef, TemplateArg};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateParamKind {
    Type,
    /// Non-type parameter of the given type.
    NonType(QualType),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: String,
    pub kind: TemplateParamKind,
    pub default: Option<TemplateArg>,
}

impl TemplateParam {
    pub fn type_param(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: TemplateParamKind::Type,
            default: None,
        }
    }

    pub fn value_param(name: &str, ty: QualType) -> Self {
        Self {
            name: name.to_string(),
            kind: TemplateParamKind::NonType(ty),
            default: None,
        }
    }

    pub fn with_default(mut self, default: TemplateArg) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, TemplateParamKind::Type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateBody {
    /// Class template body plus the declarations nested in it, named
    /// relative to the record (`type` for `identity::type`).
    Record {
        def: RecordDef,
        nested: Vec<Declaration>,
    },
    Function(FunctionDecl),
    Alias(QualType),
}

impl TemplateBody {
    pub fn types(&self, f: &mut dyn FnMut(&QualType)) {
        match self {
            TemplateBody::Record { def, nested } => {
                record_types(def, f);
                for d in nested {
                    d.types(f);
                }
            }
            TemplateBody::Function(func) => f(&func.ty),
            TemplateBody::Alias(ty) => f(ty),
        }
    }

    pub fn types_mut(&mut self, f: &mut dyn FnMut(&mut QualType)) {
        match self {
            TemplateBody::Record { def, nested } => {
                record_types_mut(def, f);
                for d in nested.iter_mut() {
                    d.types_mut(f);
                }
            }
            TemplateBody::Function(func) => f(&mut func.ty),
            TemplateBody::Alias(ty) => f(ty),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialSpecialization {
    pub params: Vec<TemplateParam>,
    /// Argument pattern; `TemplateParam`/`ValueParam` entries index `params`.
    pub pattern: Vec<TemplateArg>,
    pub body: TemplateBody,
    pub pos: Option<SourcePos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDeclaration {
    pub name: String,
    pub params: Vec<TemplateParam>,
    pub primary: Option<TemplateBody>,
    pub specializations: Vec<PartialSpecialization>,
    pub pos: Option<SourcePos>,
}

impl TemplateDeclaration {
    pub fn new(name: &str, params: Vec<TemplateParam>) -> Self {
        Self {
            name: name.to_string(),
            params,
            primary: None,
            specializations: Vec::new(),
            pos: None,
        }
    }

    pub fn with_primary(mut self, body: TemplateBody) -> Self {
        self.primary = Some(body);
        self
    }

    pub fn is_class_template(&self) -> bool {
        match &self.primary {
            Some(body) => matches!(body, TemplateBody::Record { .. }),
            None => self
                .specializations
                .iter()
                .all(|s| matches!(s.body, TemplateBody::Record { .. })),
        }
    }

    pub fn is_function_template(&self) -> bool {
        matches!(self.primary, Some(TemplateBody::Function(_)))
    }

    /// Folds another declaration of the same template into this one: a
    /// definition completes a forward declaration and new partial
    /// specializations are appended.
    pub fn absorb(&mut self, other: TemplateDeclaration) {
        if self.primary.is_none() && other.primary.is_some() {
            self.primary = other.primary;
            self.params = other.params;
            self.pos = other.pos.or(self.pos.take());
        } else if self.params.is_empty() {
            self.params = other.params;
        }
        for spec in other.specializations {
            if !self.specializations.iter().any(|s| s.pattern == spec.pattern) {
                self.specializations.push(spec);
            }
        }
    }

    pub fn types(&self, f: &mut dyn FnMut(&QualType)) {
        if let Some(body) = &self.primary {
            body.types(f);
        }
        for spec in &self.specializations {
            spec.body.types(f);
        }
    }

    pub fn types_mut(&mut self, f: &mut dyn FnMut(&mut QualType)) {
        if let Some(body) = self.primary.as_mut() {
            body.types_mut(f);
        }
        for spec in self.specializations.iter_mut() {
            spec.body.types_mut(f);
            for arg in spec.pattern.iter_mut() {
                if let TemplateArg::Type(t) = arg {
                    f(t);
                }
            }
        }
    }
}
