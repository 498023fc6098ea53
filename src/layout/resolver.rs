// Wed Oct 14 2026 - Alex

use crate::layout::abi::{align_to, AbiConfig, VirtualBasePlacement};
use crate::layout::bitfield::BitfieldPacker;
use crate::layout::cache::LayoutCache;
use crate::layout::plan::{BasePlacement, BitfieldPlacement, FieldPlacement, LayoutPlan, PrimaryBase, Subobject};
use crate::layout::vtable::VTableDescriptor;
use crate::layout::LayoutError;
use crate::lexer::{evaluate, tokenize, EvalError};
use crate::template::{InstanceCache, SpecializationOrdering, TemplateError};
use crate::types::{
    scope_of, template_id, AccessSpecifier, ArrayBound, Declaration, MethodFlags, MethodKind, PrimitiveType,
    QualType, RecordDef, TemplateArg, TypeDescriptor, TypeError, TypeTable,
};
use indexmap::{IndexMap, IndexSet};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

const MAX_NESTED_LOOKUP: usize = 16;

struct DirectBase {
    name: String,
    plan: Arc<LayoutPlan>,
    is_virtual: bool,
}

/// Size, alignment and layout facts of a member's type.
struct FieldInfo {
    size: u64,
    align: u64,
    is_pod: bool,
    plan: Option<Arc<LayoutPlan>>,
}

/// Largest object size in bytes; keeps every offset, in bits too, well
/// inside `u64`.
pub const MAX_OBJECT_SIZE: u64 = 1 << 60;

/// End of an object of `size` bytes placed at `offset`.
fn object_end(what: &str, offset: u64, size: u64) -> Result<u64, LayoutError> {
    offset
        .checked_add(size)
        .filter(|end| *end <= MAX_OBJECT_SIZE)
        .ok_or_else(|| LayoutError::ObjectTooLarge(what.to_string()))
}

/// Running state while one record is laid out.
struct Builder {
    data_bits: u64,
    size: u64,
    align: u64,
    bases: Vec<BasePlacement>,
    vbases: IndexMap<String, u64>,
    visited: IndexSet<String>,
    indirect_primaries: IndexSet<String>,
    occupied: Vec<(String, u64)>,
}

impl Builder {
    fn new() -> Self {
        Self {
            data_bits: 0,
            size: 0,
            align: 1,
            bases: Vec::new(),
            vbases: IndexMap::new(),
            visited: IndexSet::new(),
            indirect_primaries: IndexSet::new(),
            occupied: Vec::new(),
        }
    }

    fn data_size(&self) -> u64 {
        self.data_bits.div_ceil(8)
    }

    fn grow(&mut self, end: u64) {
        self.data_bits = end * 8;
        self.size = self.size.max(end);
    }

    fn update_align(&mut self, align: u64) {
        self.align = self.align.max(align);
    }

    fn is_occupied(&self, class: &str, offset: u64) -> bool {
        self.occupied.iter().any(|(c, o)| c == class && *o == offset)
    }
}

/// Computes Itanium-style layouts for the records of a type table.
/// Layouts are memoized in the shared `LayoutCache`; templates named by a
/// record are instantiated on demand through the `InstanceCache`.
pub struct LayoutResolver<'a> {
    table: &'a TypeTable,
    abi: &'a AbiConfig,
    cache: &'a LayoutCache,
    instances: &'a InstanceCache,
    ordering: SpecializationOrdering,
}

impl<'a> LayoutResolver<'a> {
    pub fn new(table: &'a TypeTable, abi: &'a AbiConfig, cache: &'a LayoutCache, instances: &'a InstanceCache) -> Self {
        Self {
            table,
            abi,
            cache,
            instances,
            ordering: SpecializationOrdering::default(),
        }
    }

    pub fn with_ordering(mut self, ordering: SpecializationOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn abi(&self) -> &AbiConfig {
        self.abi
    }

    pub fn table(&self) -> &TypeTable {
        self.table
    }

    pub fn layout(&self, name: &str) -> Result<Arc<LayoutPlan>, LayoutError> {
        let mut stack = Vec::new();
        self.layout_in(name, &mut stack)
    }

    /// Layout of the record a class type designates, instantiating a
    /// template-id first when needed.
    pub fn layout_of_type(&self, ty: &QualType) -> Result<Arc<LayoutPlan>, LayoutError> {
        let name = self.class_name(ty)?;
        self.layout(&name)
    }

    pub fn size_align(&self, ty: &QualType) -> Result<(u64, u64), LayoutError> {
        let info = self.field_info(ty, &mut Vec::new())?;
        Ok((info.size, info.align))
    }

    /// Record definition by qualified name, looking at instantiated
    /// templates and their nested records too.
    pub fn record(&self, name: &str) -> Result<Cow<'a, RecordDef>, LayoutError> {
        let table: &'a TypeTable = self.table;
        match table.tag(name) {
            Some(Declaration::Record(def)) => return Ok(Cow::Borrowed(def)),
            Some(Declaration::ForwardRecord { .. }) => return Err(LayoutError::IncompleteType(name.to_string())),
            Some(_) => return Err(LayoutError::UnknownClass(name.to_string())),
            None => {}
        }
        if let Some(instance) = self.instances.get(name) {
            return Ok(Cow::Owned(instance.record.clone()));
        }
        match self.nested_decl(name) {
            Some(Declaration::Record(def)) => Ok(Cow::Owned(def)),
            _ => Err(LayoutError::UnknownClass(name.to_string())),
        }
    }

    /// Qualified name of the record a class type designates.
    pub fn class_name(&self, ty: &QualType) -> Result<String, LayoutError> {
        let resolved = self.resolve(ty)?;
        match &resolved.ty {
            TypeDescriptor::Record { name, .. } => Ok(name.clone()),
            TypeDescriptor::TemplateId { name, args } => self.instantiate(name, args),
            TypeDescriptor::TemplateParam { name, .. } => Err(LayoutError::DependentType(name.clone())),
            TypeDescriptor::Incomplete(name) => Err(LayoutError::IncompleteType(name.clone())),
            _ => Err(LayoutError::UnknownClass(resolved.to_string())),
        }
    }

    /// Instantiates `name<args>` and returns the instance's record name.
    pub fn instantiate(&self, name: &str, args: &[TemplateArg]) -> Result<String, LayoutError> {
        let dependent = args.iter().any(|a| match a {
            TemplateArg::Type(t) => t.is_dependent(),
            TemplateArg::ValueParam { .. } => true,
            _ => false,
        });
        if dependent {
            return Err(LayoutError::DependentType(template_id(name, args)));
        }
        let args: Vec<TemplateArg> = args
            .iter()
            .map(|a| match a {
                TemplateArg::Type(t) => TemplateArg::Type(self.table.canonical(t)),
                other => other.clone(),
            })
            .collect();
        let tpl = self
            .table
            .template(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;
        let instance = self.instances.instantiate(tpl, &args, self.ordering)?;
        Ok(instance.record.name.clone())
    }

    /// Strips typedefs, including typedefs nested in template instances.
    fn resolve(&self, ty: &QualType) -> Result<QualType, LayoutError> {
        let mut current = ty.clone();
        for _ in 0..MAX_NESTED_LOOKUP {
            match self.table.resolve_typedef(&current) {
                Ok(resolved) => return Ok(resolved),
                Err(TypeError::UnknownType(name)) => match self.nested_decl(&name) {
                    Some(Declaration::Typedef(def)) => current = def.ty.with_quals(ty.quals),
                    Some(Declaration::Record(def)) => {
                        return Ok(QualType::record(def.kind, &def.name).with_quals(ty.quals))
                    }
                    _ => return Err(LayoutError::IncompleteType(name)),
                },
                Err(e) => return Err(e.into()),
            }
        }
        Err(TypeError::TypedefCycle(ty.to_string()).into())
    }

    /// Declaration named inside a class template instance, instantiating
    /// the scope when it is spelled as a template-id.
    fn nested_decl(&self, name: &str) -> Option<Declaration> {
        let scope = scope_of(name);
        if scope.is_empty() {
            return None;
        }
        let instance = match self.instances.get(scope) {
            Some(instance) => instance,
            None => {
                let (template, args) = crate::parser::parse_template_id(scope)?;
                let record = self.instantiate(&template, &args).ok()?;
                self.instances.get(&record)?
            }
        };
        let member = &name[scope.len() + 2..];
        let qualified = format!("{}::{}", instance.record.name, member);
        instance.nested.iter().find(|d| d.name() == qualified).cloned()
    }

    pub(crate) fn layout_in(&self, name: &str, stack: &mut Vec<String>) -> Result<Arc<LayoutPlan>, LayoutError> {
        if let Some(plan) = self.cache.get(name) {
            return Ok(plan);
        }
        if stack.iter().any(|n| n == name) {
            return Err(LayoutError::RecursiveContainment(name.to_string()));
        }
        let record = self.record(name)?;
        stack.push(name.to_string());
        let result = if record.is_union() {
            self.compute_union(&record, stack)
        } else {
            self.compute(&record, stack)
        };
        stack.pop();
        let plan = result?;
        log::debug!("laid out {} ({} bytes, align {})", plan.name, plan.size, plan.align);
        Ok(self.cache.insert(plan))
    }

    fn field_info(&self, ty: &QualType, stack: &mut Vec<String>) -> Result<FieldInfo, LayoutError> {
        let resolved = self.resolve(ty)?;
        let pointer = FieldInfo {
            size: self.abi.pointer_size(),
            align: self.abi.pointer_align(),
            is_pod: true,
            plan: None,
        };
        match &resolved.ty {
            TypeDescriptor::Primitive(PrimitiveType::Void) => Err(LayoutError::IncompleteType("void".to_string())),
            TypeDescriptor::Primitive(p) => {
                let (size, align) = self.abi.size_align(*p);
                Ok(FieldInfo {
                    size,
                    align,
                    is_pod: true,
                    plan: None,
                })
            }
            TypeDescriptor::Pointer(_) => Ok(pointer),
            TypeDescriptor::Reference { .. } => Ok(FieldInfo {
                is_pod: false,
                ..pointer
            }),
            TypeDescriptor::Array { element, bound } => {
                let count = self.array_count(bound)?;
                let element = self.field_info(element, stack)?;
                let size = element
                    .size
                    .checked_mul(count)
                    .filter(|size| *size <= MAX_OBJECT_SIZE)
                    .ok_or_else(|| LayoutError::ObjectTooLarge(resolved.to_string()))?;
                Ok(FieldInfo {
                    size,
                    align: element.align,
                    is_pod: element.is_pod,
                    plan: None,
                })
            }
            TypeDescriptor::Function(_) => Err(LayoutError::NotAnObject(resolved.to_string())),
            TypeDescriptor::Record { .. } | TypeDescriptor::TemplateId { .. } => {
                let name = self.class_name(&resolved)?;
                let plan = self.layout_in(&name, stack)?;
                Ok(FieldInfo {
                    size: plan.size,
                    align: plan.align,
                    is_pod: plan.is_pod,
                    plan: Some(plan),
                })
            }
            TypeDescriptor::Enum(name) => {
                let def = self
                    .table
                    .enum_def(name)
                    .ok_or_else(|| LayoutError::IncompleteType(name.clone()))?;
                match &def.underlying {
                    Some(underlying) => self.field_info(underlying, stack),
                    None => {
                        let (size, align) = self.abi.size_align(PrimitiveType::Int);
                        Ok(FieldInfo {
                            size,
                            align,
                            is_pod: true,
                            plan: None,
                        })
                    }
                }
            }
            TypeDescriptor::TemplateParam { name, .. } => Err(LayoutError::DependentType(name.clone())),
            TypeDescriptor::Typedef(name) | TypeDescriptor::Incomplete(name) => {
                Err(LayoutError::IncompleteType(name.clone()))
            }
        }
    }

    fn array_count(&self, bound: &ArrayBound) -> Result<u64, LayoutError> {
        match bound {
            ArrayBound::Fixed(n) => Ok(*n),
            // flexible array member
            ArrayBound::Unknown => Ok(0),
            ArrayBound::Expr(expr) => {
                let unresolved = |message: String| LayoutError::UnresolvedBound {
                    expr: expr.clone(),
                    message,
                };
                let tokens = tokenize("<bound>", expr).map_err(|e| unresolved(e.to_string()))?;
                let value = evaluate(&tokens, |name, pos| {
                    self.table.constant(name).ok_or_else(|| EvalError::Unresolved {
                        name: name.to_string(),
                        pos: pos.clone(),
                    })
                })
                .map_err(|e| unresolved(e.to_string()))?;
                u64::try_from(value).map_err(|_| unresolved("negative bound".to_string()))
            }
        }
    }

    fn compute(&self, record: &RecordDef, stack: &mut Vec<String>) -> Result<LayoutPlan, LayoutError> {
        let mut direct = Vec::with_capacity(record.bases.len());
        for edge in &record.bases {
            let name = self.class_name(&edge.base)?;
            let plan = self.layout_in(&name, stack)?;
            direct.push(DirectBase {
                name,
                plan,
                is_virtual: edge.is_virtual,
            });
        }
        let is_dynamic = record.declares_virtual() || direct.iter().any(|b| b.is_virtual || b.plan.is_dynamic);
        let mut st = Builder::new();

        for base in direct.iter().filter(|b| b.plan.has_virtual_bases()) {
            self.collect_indirect_primaries(&base.plan, &mut st.indirect_primaries, stack)?;
        }
        let primary = self.select_primary(&direct, &st.indirect_primaries, stack)?;

        let mut vptr_offset = None;
        if let Some(p) = &primary {
            vptr_offset = Some(0);
            let plan = self.layout_in(&p.name, stack)?;
            if p.is_virtual {
                st.vbases.insert(p.name.clone(), 0);
                st.visited.insert(p.name.clone());
                st.indirect_primaries.insert(p.name.clone());
            } else {
                st.bases.push(BasePlacement {
                    name: p.name.clone(),
                    offset: 0,
                    is_virtual: false,
                    is_primary: true,
                    edge: direct.iter().position(|b| !b.is_virtual && b.name == p.name),
                });
            }
            st.grow(plan.nv_size);
            st.update_align(plan.nv_align);
            self.occupy(&mut st, &p.name, &plan, 0, stack)?;
            self.note_primary_vbases(&mut st, &plan, 0, stack)?;
        } else if is_dynamic {
            vptr_offset = Some(0);
            st.grow(self.abi.pointer_size());
            st.update_align(self.abi.pointer_align());
        }

        let primary_edge = st.bases.first().and_then(|b| b.edge);
        for (index, base) in direct.iter().enumerate() {
            if base.is_virtual || primary_edge == Some(index) {
                continue;
            }
            let offset = self.place_base(&mut st, &base.name, &base.plan, stack)?;
            st.bases.push(BasePlacement {
                name: base.name.clone(),
                offset,
                is_virtual: false,
                is_primary: false,
                edge: Some(index),
            });
        }

        let edges: Vec<(String, bool)> = direct.iter().map(|b| (b.name.clone(), b.is_virtual)).collect();
        let before_fields = self.abi.vbase_placement == VirtualBasePlacement::BeforeFields;
        if before_fields {
            self.place_virtual_bases(&mut st, &edges, primary.as_ref(), stack)?;
        }

        let (fields, fields_pod) = self.place_fields(&mut st, record, stack)?;
        let nv_size = st.size.max(st.data_size());
        let nv_align = st.align;

        if !before_fields {
            self.place_virtual_bases(&mut st, &edges, primary.as_ref(), stack)?;
        }

        for (name, offset) in &st.vbases {
            st.bases.push(BasePlacement {
                name: name.clone(),
                offset: *offset,
                is_virtual: true,
                is_primary: primary.as_ref().is_some_and(|p| p.is_virtual && &p.name == name),
                edge: direct.iter().position(|b| b.is_virtual && &b.name == name),
            });
        }

        let is_empty = !is_dynamic
            && record.fields().all(|m| m.bit_width == Some(0) && m.name.is_none())
            && direct.iter().all(|b| b.plan.is_empty);
        let is_pod = !is_dynamic && direct.is_empty() && fields_pod && !has_user_special_members(record);
        let data_size = st.data_size();
        let mut size = st.size.max(data_size);
        if size == 0 {
            size = 1;
        }
        let size = align_to(size, st.align);
        let (data_size, nv_size) = if is_pod { (size, size) } else { (data_size, nv_size) };

        let mut plan = LayoutPlan {
            name: record.name.clone(),
            kind: record.kind,
            size,
            align: st.align,
            data_size,
            nv_size,
            nv_align,
            is_dynamic,
            is_empty,
            is_pod,
            vptr_offset,
            primary_base: primary,
            bases: st.bases,
            fields,
            subobjects: Vec::new(),
            vtable: None,
        };
        plan.subobjects = self.build_subobjects(&plan, stack)?;
        if is_dynamic {
            plan.vtable = Some(self.build_vtable(record, &plan, stack)?);
        }
        Ok(plan)
    }

    fn compute_union(&self, record: &RecordDef, stack: &mut Vec<String>) -> Result<LayoutPlan, LayoutError> {
        let mut size = 0;
        let mut align = 1;
        let mut fields = Vec::new();
        let mut fields_pod = true;
        for (index, member) in record.members.iter().enumerate() {
            if member.is_static {
                continue;
            }
            let info = self.field_info(&member.ty, stack)?;
            fields_pod &= info.is_pod && member.access == AccessSpecifier::Public;
            let bitfield = member.bit_width.map(|width| BitfieldPlacement {
                bit_offset: 0,
                width,
                storage_offset: 0,
                storage_size: info.size,
            });
            if member.bit_width != Some(0) && (member.name.is_some() || bitfield.is_none()) {
                align = align.max(info.align);
            }
            size = size.max(info.size);
            fields.push(FieldPlacement {
                name: member.name.clone(),
                ty: member.ty.clone(),
                offset: 0,
                size: info.size,
                align: info.align,
                member_index: index,
                bitfield,
                anonymous: if member.is_anonymous_aggregate() { info.plan } else { None },
            });
        }
        let size = align_to(size.max(1), align);
        let is_pod = fields_pod && !has_user_special_members(record);
        Ok(LayoutPlan {
            name: record.name.clone(),
            kind: record.kind,
            size,
            align,
            data_size: size,
            nv_size: size,
            nv_align: align,
            is_dynamic: false,
            is_empty: fields.is_empty(),
            is_pod,
            vptr_offset: None,
            primary_base: None,
            bases: Vec::new(),
            fields,
            subobjects: vec![Subobject {
                class: record.name.clone(),
                offset: 0,
                is_virtual: false,
                bases: Vec::new(),
            }],
            vtable: None,
        })
    }

    fn place_fields(
        &self,
        st: &mut Builder,
        record: &RecordDef,
        stack: &mut Vec<String>,
    ) -> Result<(Vec<FieldPlacement>, bool), LayoutError> {
        let mut packer = BitfieldPacker::new(self.abi.bitfield_policy);
        let mut fields = Vec::new();
        let mut all_pod = true;
        for (index, member) in record.members.iter().enumerate() {
            if member.is_static {
                continue;
            }
            let info = self.field_info(&member.ty, stack)?;
            all_pod &= info.is_pod && member.access == AccessSpecifier::Public && member.default_init.is_none();
            if let Some(width) = member.bit_width {
                let alloc = packer.place(st.data_bits, width, info.size, info.align, member.name.is_some());
                st.data_bits = st.data_bits.max(alloc.end_bits);
                st.size = st.size.max(st.data_size());
                if let Some(align) = alloc.align {
                    st.update_align(align);
                }
                fields.push(FieldPlacement {
                    name: member.name.clone(),
                    ty: member.ty.clone(),
                    offset: alloc.storage_offset,
                    size: info.size,
                    align: info.align,
                    member_index: index,
                    bitfield: Some(BitfieldPlacement {
                        bit_offset: alloc.bit_offset,
                        width,
                        storage_offset: alloc.storage_offset,
                        storage_size: info.size,
                    }),
                    anonymous: None,
                });
                continue;
            }
            packer.interrupt();
            let mut offset = align_to(st.data_size(), info.align);
            if let Some(plan) = info.plan.as_ref().filter(|p| p.is_empty) {
                while st.is_occupied(&plan.name, offset) {
                    offset += info.align.max(1);
                }
                st.occupied.push((plan.name.clone(), offset));
            }
            st.grow(object_end(&record.name, offset, info.size)?);
            st.update_align(info.align);
            fields.push(FieldPlacement {
                name: member.name.clone(),
                ty: member.ty.clone(),
                offset,
                size: info.size,
                align: info.align,
                member_index: index,
                bitfield: None,
                anonymous: if member.is_anonymous_aggregate() { info.plan } else { None },
            });
        }
        Ok((fields, all_pod))
    }

    /// Places a non-virtual or virtual base subobject after the current
    /// data, or at offset 0 for an empty base when nothing of its type is
    /// already there.
    fn place_base(
        &self,
        st: &mut Builder,
        name: &str,
        plan: &LayoutPlan,
        stack: &mut Vec<String>,
    ) -> Result<u64, LayoutError> {
        let step = plan.nv_align.max(1);
        let offset = if plan.is_empty {
            let mut offset = 0;
            if st.is_occupied(name, 0) {
                offset = align_to(st.data_size(), step);
                while st.is_occupied(name, offset) {
                    offset += step;
                }
            }
            st.size = st.size.max(object_end(name, offset, plan.size)?);
            offset
        } else {
            let offset = align_to(st.data_size(), step);
            st.grow(object_end(name, offset, plan.nv_size)?);
            offset
        };
        st.update_align(plan.nv_align);
        self.occupy(st, name, plan, offset, stack)?;
        self.note_primary_vbases(st, plan, offset, stack)?;
        Ok(offset)
    }

    /// Remembers which classes have a subobject at which offset, so that
    /// two empty subobjects of one type never share an address.
    fn occupy(
        &self,
        st: &mut Builder,
        name: &str,
        plan: &LayoutPlan,
        offset: u64,
        stack: &mut Vec<String>,
    ) -> Result<(), LayoutError> {
        st.occupied.push((name.to_string(), offset));
        for base in plan.direct_bases() {
            let base_plan = self.layout_in(&base.name, stack)?;
            self.occupy(st, &base.name, &base_plan, offset + base.offset, stack)?;
        }
        Ok(())
    }

    /// A virtual base that is the primary base of a subobject placed at
    /// `offset` lives at that same address.
    fn note_primary_vbases(
        &self,
        st: &mut Builder,
        plan: &LayoutPlan,
        offset: u64,
        stack: &mut Vec<String>,
    ) -> Result<(), LayoutError> {
        if !plan.has_virtual_bases() {
            return Ok(());
        }
        if let Some(p) = plan.primary_base.as_ref().filter(|p| p.is_virtual) {
            if !st.vbases.contains_key(&p.name) {
                st.vbases.insert(p.name.clone(), offset);
                let primary = self.layout_in(&p.name, stack)?;
                self.note_primary_vbases(st, &primary, offset, stack)?;
            }
        }
        for base in plan.direct_bases() {
            let base_plan = self.layout_in(&base.name, stack)?;
            self.note_primary_vbases(st, &base_plan, offset + base.offset, stack)?;
        }
        Ok(())
    }

    fn collect_indirect_primaries(
        &self,
        plan: &LayoutPlan,
        out: &mut IndexSet<String>,
        stack: &mut Vec<String>,
    ) -> Result<(), LayoutError> {
        if let Some(p) = plan.primary_base.as_ref().filter(|p| p.is_virtual) {
            out.insert(p.name.clone());
        }
        for base in plan.edges() {
            let base_plan = self.layout_in(&base.name, stack)?;
            if base_plan.has_virtual_bases() {
                self.collect_indirect_primaries(&base_plan, out, stack)?;
            }
        }
        Ok(())
    }

    fn select_primary(
        &self,
        direct: &[DirectBase],
        indirect: &IndexSet<String>,
        stack: &mut Vec<String>,
    ) -> Result<Option<PrimaryBase>, LayoutError> {
        if let Some(base) = direct.iter().find(|b| !b.is_virtual && b.plan.is_dynamic) {
            return Ok(Some(PrimaryBase {
                name: base.name.clone(),
                is_virtual: false,
            }));
        }
        if !direct.iter().any(|b| b.is_virtual || b.plan.has_virtual_bases()) {
            return Ok(None);
        }
        let edges: Vec<(String, bool)> = direct.iter().map(|b| (b.name.clone(), b.is_virtual)).collect();
        let mut first_nearly_empty = None;
        let chosen = self.primary_vbase(&edges, indirect, &mut first_nearly_empty, stack)?;
        Ok(chosen.or(first_nearly_empty).map(|name| PrimaryBase { name, is_virtual: true }))
    }

    /// First nearly empty virtual base in inheritance-graph order that is
    /// not already the primary base of another base.
    fn primary_vbase(
        &self,
        edges: &[(String, bool)],
        indirect: &IndexSet<String>,
        first_nearly_empty: &mut Option<String>,
        stack: &mut Vec<String>,
    ) -> Result<Option<String>, LayoutError> {
        for (name, is_virtual) in edges {
            let plan = self.layout_in(name, stack)?;
            if *is_virtual && plan.is_nearly_empty(self.abi.pointer_size()) {
                if !indirect.contains(name) {
                    return Ok(Some(name.clone()));
                }
                if first_nearly_empty.is_none() {
                    *first_nearly_empty = Some(name.clone());
                }
            }
            let sub: Vec<(String, bool)> = plan.edges().iter().map(|b| (b.name.clone(), b.is_virtual)).collect();
            if let Some(found) = self.primary_vbase(&sub, indirect, first_nearly_empty, stack)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Depth-first, left-to-right walk placing each virtual base once.
    fn place_virtual_bases(
        &self,
        st: &mut Builder,
        edges: &[(String, bool)],
        primary: Option<&PrimaryBase>,
        stack: &mut Vec<String>,
    ) -> Result<(), LayoutError> {
        for (name, is_virtual) in edges {
            let plan = self.layout_in(name, stack)?;
            if *is_virtual {
                let own_primary = primary.is_some_and(|p| p.is_virtual && &p.name == name);
                if !own_primary
                    && !st.indirect_primaries.contains(name)
                    && !st.vbases.contains_key(name)
                    && st.visited.insert(name.clone())
                {
                    let offset = self.place_base(st, name, &plan, stack)?;
                    st.vbases.insert(name.clone(), offset);
                }
            }
            if !plan.has_virtual_bases() {
                continue;
            }
            let sub: Vec<(String, bool)> = plan.edges().iter().map(|b| (b.name.clone(), b.is_virtual)).collect();
            self.place_virtual_bases(st, &sub, plan.primary_base.as_ref(), stack)?;
        }
        Ok(())
    }

    fn build_subobjects(&self, root: &LayoutPlan, stack: &mut Vec<String>) -> Result<Vec<Subobject>, LayoutError> {
        let mut arena = Vec::new();
        let mut shared = HashMap::new();
        self.visit_subobject(root, root, 0, false, &mut arena, &mut shared, stack)?;
        Ok(arena)
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_subobject(
        &self,
        complete: &LayoutPlan,
        plan: &LayoutPlan,
        offset: u64,
        is_virtual: bool,
        arena: &mut Vec<Subobject>,
        shared: &mut HashMap<String, usize>,
        stack: &mut Vec<String>,
    ) -> Result<usize, LayoutError> {
        let index = arena.len();
        arena.push(Subobject {
            class: plan.name.clone(),
            offset,
            is_virtual,
            bases: Vec::new(),
        });
        if is_virtual {
            shared.insert(plan.name.clone(), index);
        }
        let mut children = Vec::new();
        for edge in plan.edges() {
            let child = if edge.is_virtual {
                match shared.get(&edge.name) {
                    Some(&existing) => existing,
                    None => {
                        let base = self.layout_in(&edge.name, stack)?;
                        let at = complete.vbase_offset(&edge.name).unwrap_or(edge.offset);
                        self.visit_subobject(complete, &base, at, true, arena, shared, stack)?
                    }
                }
            } else {
                let base = self.layout_in(&edge.name, stack)?;
                self.visit_subobject(complete, &base, offset + edge.offset, false, arena, shared, stack)?
            };
            children.push(child);
        }
        arena[index].bases = children;
        Ok(index)
    }

    fn build_vtable(
        &self,
        record: &RecordDef,
        plan: &LayoutPlan,
        stack: &mut Vec<String>,
    ) -> Result<VTableDescriptor, LayoutError> {
        let primary_slots = match &plan.primary_base {
            Some(p) => self.layout_in(&p.name, stack)?.vtable.as_ref().map(|v| v.slots.clone()),
            None => None,
        };
        // non-virtual secondaries come before the virtual ones
        let mut nodes: Vec<&Subobject> = plan.subobjects.iter().skip(1).collect();
        nodes.sort_by_key(|n| n.is_virtual);
        let mut dynamic = Vec::new();
        for node in nodes {
            let base = self.layout_in(&node.class, stack)?;
            if base.is_dynamic {
                dynamic.push((node.offset, base));
            }
        }
        let inherited: Vec<String> = dynamic
            .iter()
            .filter_map(|(_, base)| base.vtable.as_ref())
            .flat_map(|v| v.slots.iter().map(|s| s.selector.clone()))
            .collect();
        let inherited: Vec<&str> = inherited.iter().map(String::as_str).collect();
        let mut vtable = VTableDescriptor::build(record, primary_slots.as_deref(), &inherited);
        for (offset, base) in dynamic.iter().filter(|(offset, _)| *offset != 0) {
            if let Some(base_vtable) = &base.vtable {
                vtable.add_secondary(&base.name, *offset, &base_vtable.slots, record);
            }
        }
        Ok(vtable)
    }
}

/// User-declared constructors, destructors or copy assignment make a
/// record non-POD for layout purposes.
fn has_user_special_members(record: &RecordDef) -> bool {
    record.methods.iter().any(|m| {
        let special = matches!(m.kind, MethodKind::Constructor | MethodKind::Destructor)
            || (m.kind == MethodKind::Operator && m.name == "operator=");
        special && !m.flags.contains(MethodFlags::DEFAULTED)
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::layout::abi::BitfieldPolicy;
    use crate::types::{BaseClassEdge, FunctionType, MemberDescriptor, MethodDecl, RecordKind};

    pub(crate) struct Fixture {
        pub table: TypeTable,
        pub abi: AbiConfig,
        pub cache: LayoutCache,
        pub instances: InstanceCache,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::with_abi(AbiConfig::lp64())
        }

        pub fn with_abi(abi: AbiConfig) -> Self {
            Self {
                table: TypeTable::new(),
                abi,
                cache: LayoutCache::new(),
                instances: InstanceCache::new(),
            }
        }

        pub fn resolver(&self) -> LayoutResolver<'_> {
            LayoutResolver::new(&self.table, &self.abi, &self.cache, &self.instances)
        }

        pub fn add(&mut self, def: RecordDef) {
            self.table.insert(Declaration::Record(def)).unwrap();
        }

        pub fn size(&self, name: &str) -> u64 {
            self.resolver().layout(name).unwrap().size
        }
    }

    fn int() -> QualType {
        QualType::primitive(PrimitiveType::Int)
    }

    pub(crate) fn virtual_method(name: &str) -> MethodDecl {
        MethodDecl {
            name: name.to_string(),
            kind: MethodKind::Normal,
            ty: FunctionType::new(QualType::void(), vec![]),
            param_names: vec![],
            flags: MethodFlags::VIRTUAL,
            access: AccessSpecifier::Public,
            pos: None,
        }
    }

    /// `kind name : bases { int fields...; virtual void virtuals(); }`
    pub(crate) fn class(
        kind: RecordKind,
        name: &str,
        bases: &[(&str, bool)],
        fields: &[&str],
        virtuals: &[&str],
    ) -> RecordDef {
        let mut def = RecordDef::new(name, kind);
        let access = AccessSpecifier::default_for(kind);
        for (base, is_virtual) in bases {
            def.bases.push(BaseClassEdge::new(
                QualType::record(RecordKind::Class, base),
                *is_virtual,
                AccessSpecifier::Public,
            ));
        }
        for field in fields {
            def.members
                .push(MemberDescriptor::new(Some(field.to_string()), int()).with_access(access));
        }
        for v in virtuals {
            def.methods.push(virtual_method(v));
        }
        def
    }

    /// The diamond, non-virtual diamond and virtual-grandparent classes.
    pub(crate) fn inheritance_fixture() -> Fixture {
        let s = RecordKind::Struct;
        let c = RecordKind::Class;
        let mut fx = Fixture::new();
        fx.add(class(c, "Grandparent", &[], &["grandparent_data"], &["grandparent_foo"]));
        fx.add(class(c, "Parent1", &[("Grandparent", true)], &["parent1_data"], &["parent1_foo"]));
        fx.add(class(c, "Parent2", &[("Grandparent", true)], &["parent2_data"], &["parent2_foo"]));
        fx.add(class(c, "Child", &[("Parent1", false), ("Parent2", false)], &["child_data"], &["child_foo"]));
        fx.add(class(s, "A", &[], &["a"], &[]));
        fx.add(class(s, "B", &[], &["b"], &[]));
        fx.add(class(s, "AB", &[("A", false), ("B", false)], &["ab"], &[]));
        fx.add(class(s, "C", &[("A", false), ("B", false)], &["c"], &["f"]));
        fx.add(class(s, "D", &[("A", true), ("B", true)], &["d"], &["g"]));
        fx.add(class(s, "E", &[("B", true), ("A", true)], &["e"], &["h"]));
        fx.add(class(s, "F", &[("D", false), ("E", false)], &["f"], &["i"]));
        fx.add(class(s, "G", &[("A", true), ("B", false)], &["g"], &[]));
        fx.add(class(s, "H", &[("B", false), ("A", true)], &["h"], &[]));
        fx.add(class(s, "I", &[("G", false), ("H", false)], &["i"], &["j"]));
        fx
    }

    fn cxxabi_fixture() -> Fixture {
        let c = RecordKind::Class;
        let mut fx = Fixture::new();
        fx.add(class(c, "A1", &[], &["a"], &[]));
        fx.add(class(c, "A2", &[], &["aa"], &["f"]));
        fx.add(class(c, "V1", &[("A1", false), ("A2", false)], &["v"], &[]));
        fx.add(class(c, "B1", &[], &["b"], &[]));
        fx.add(class(c, "B2", &[], &["bb"], &[]));
        fx.add(class(c, "V2", &[("B1", false), ("B2", false), ("V1", true)], &["vv"], &[]));
        fx.add(class(c, "V3", &[], &[], &["g"]));
        fx.add(class(c, "C1", &[("V1", true)], &["c"], &[]));
        fx.add(class(c, "C2", &[("V3", true), ("V2", true)], &["cc"], &[]));
        fx.add(class(c, "X1", &[], &["x"], &[]));
        fx.add(class(c, "C3", &[("X1", false)], &["ccc"], &[]));
        fx.add(class(c, "D", &[("C1", false), ("C2", false), ("C3", false)], &["d"], &[]));
        fx
    }

    fn base<'p>(plan: &'p LayoutPlan, name: &str) -> &'p BasePlacement {
        plan.bases.iter().find(|b| b.name == name).unwrap()
    }

    #[test]
    fn test_non_dynamic_bases_in_order() {
        let fx = inheritance_fixture();
        let plan = fx.resolver().layout("AB").unwrap();
        assert_eq!(plan.size, 12);
        assert_eq!(base(&plan, "B").offset, 4);
        assert_eq!(plan.field("ab").unwrap().0, 8);
        assert!(plan.vptr_offset.is_none());
    }

    #[test]
    fn test_own_vptr_before_bases() {
        let fx = inheritance_fixture();
        let plan = fx.resolver().layout("C").unwrap();
        assert_eq!(plan.vptr_offset, Some(0));
        assert!(plan.primary_base.is_none());
        assert_eq!(base(&plan, "A").offset, 8);
        assert_eq!(base(&plan, "B").offset, 12);
        assert_eq!(plan.field("c").unwrap().0, 16);
        assert_eq!(plan.size, 24);
    }

    #[test]
    fn test_virtual_bases_follow_fields() {
        let fx = inheritance_fixture();
        let plan = fx.resolver().layout("D").unwrap();
        assert_eq!(plan.field("d").unwrap().0, 8);
        assert_eq!(plan.vbase_offset("A"), Some(12));
        assert_eq!(plan.vbase_offset("B"), Some(16));
        assert_eq!(plan.size, 24);
        assert_eq!(plan.nv_size, 12);
    }

    #[test]
    fn test_virtual_diamond_collapses() {
        let fx = inheritance_fixture();
        let plan = fx.resolver().layout("F").unwrap();
        assert_eq!(plan.primary_base.as_ref().unwrap().name, "D");
        assert_eq!(base(&plan, "E").offset, 16);
        assert_eq!(plan.field("f").unwrap().0, 28);
        assert_eq!(plan.vbase_offset("A"), Some(32));
        assert_eq!(plan.vbase_offset("B"), Some(36));
        assert_eq!(plan.size, 40);
        assert_eq!(plan.subobject_count("A"), 1);
        assert_eq!(plan.subobject_count("B"), 1);
    }

    #[test]
    fn test_non_virtual_diamond_keeps_two_subobjects() {
        let fx = inheritance_fixture();
        let g = fx.resolver().layout("G").unwrap();
        assert_eq!(base(&g, "B").offset, 8);
        assert_eq!(g.field("g").unwrap().0, 12);
        assert_eq!(g.vbase_offset("A"), Some(16));
        assert_eq!(g.size, 24);

        let plan = fx.resolver().layout("I").unwrap();
        assert_eq!(base(&plan, "H").offset, 16);
        assert_eq!(plan.field("i").unwrap().0, 32);
        assert_eq!(plan.vbase_offset("A"), Some(36));
        assert_eq!(plan.size, 40);
        assert_eq!(plan.subobject_count("B"), 2);
        assert_eq!(plan.subobject_count("A"), 1);
    }

    #[test]
    fn test_virtual_grandparent() {
        let fx = inheritance_fixture();
        let plan = fx.resolver().layout("Child").unwrap();
        assert_eq!(base(&plan, "Parent2").offset, 16);
        assert_eq!(plan.field("child_data").unwrap().0, 28);
        assert_eq!(plan.vbase_offset("Grandparent"), Some(32));
        assert_eq!(plan.size, 48);
        let vtable = plan.vtable.as_ref().unwrap();
        let selectors: Vec<&str> = vtable.slots.iter().map(|s| s.selector.as_str()).collect();
        assert_eq!(selectors, vec!["parent1_foo()", "child_foo()"]);
        let offsets: Vec<u64> = vtable.secondary.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![16, 32]);
    }

    #[test]
    fn test_cxxabi_primary_selection() {
        let fx = cxxabi_fixture();
        let r = fx.resolver();
        let v1 = r.layout("V1").unwrap();
        assert_eq!(v1.primary_base.as_ref().unwrap().name, "A2");
        assert_eq!(base(&v1, "A1").offset, 12);
        assert_eq!(v1.field("v").unwrap().0, 16);
        assert_eq!(v1.size, 24);

        let v3 = r.layout("V3").unwrap();
        assert!(v3.is_nearly_empty(8));

        let c2 = r.layout("C2").unwrap();
        assert_eq!(
            c2.primary_base,
            Some(PrimaryBase {
                name: "V3".to_string(),
                is_virtual: true
            })
        );
        assert_eq!(c2.field("cc").unwrap().0, 8);
        assert_eq!(c2.vbase_offset("V3"), Some(0));
        assert_eq!(c2.vbase_offset("V2"), Some(16));
        assert_eq!(c2.vbase_offset("V1"), Some(40));
        assert_eq!(c2.size, 64);
    }

    #[test]
    fn test_cxxabi_complete_object() {
        let fx = cxxabi_fixture();
        let d = fx.resolver().layout("D").unwrap();
        assert_eq!(d.primary_base.as_ref().unwrap().name, "C1");
        assert_eq!(base(&d, "C2").offset, 16);
        assert_eq!(base(&d, "C3").offset, 28);
        assert_eq!(d.field("d").unwrap().0, 36);
        assert_eq!(d.vbase_offset("V1"), Some(40));
        // V3 is C2's primary base and shares its address
        assert_eq!(d.vbase_offset("V3"), Some(16));
        assert_eq!(d.vbase_offset("V2"), Some(64));
        assert_eq!(d.size, 88);
    }

    #[test]
    fn test_bitfield_policies() {
        let mut def = RecordDef::new("bf", RecordKind::Struct);
        let uint = QualType::primitive(PrimitiveType::UInt);
        let sint = QualType::primitive(PrimitiveType::Int);
        let u8 = QualType::primitive(PrimitiveType::UChar);
        for (name, ty, width) in [
            ("b3", &uint, 3),
            ("b4", &uint, 4),
            ("b6", &sint, 6),
            ("x", &sint, 1),
            ("t1", &u8, 1),
            ("t2", &u8, 1),
            ("t3", &u8, 1),
            ("t4", &u8, 4),
        ] {
            def.members
                .push(MemberDescriptor::new(Some(name.to_string()), ty.clone()).with_bit_width(width));
        }
        let mut sysv = Fixture::new();
        sysv.add(def.clone());
        let plan = sysv.resolver().layout("bf").unwrap();
        assert_eq!(plan.size, 4);
        let t4 = plan.field("t4").unwrap().1.bitfield.clone().unwrap();
        assert_eq!(t4.bit_offset, 17);
        assert_eq!(t4.storage_offset, 2);

        let mut msvc = Fixture::with_abi(AbiConfig::lp64().with_bitfield_policy(BitfieldPolicy::Msvc));
        msvc.add(def);
        let plan = msvc.resolver().layout("bf").unwrap();
        assert_eq!(plan.size, 8);
        assert_eq!(plan.field("t1").unwrap().0, 4);
        // stable across runs
        msvc.cache.clear();
        assert_eq!(msvc.size("bf"), 8);
    }

    #[test]
    fn test_union_and_empty_class() {
        let mut fx = Fixture::new();
        let mut u = RecordDef::new("U", RecordKind::Union);
        u.members.push(MemberDescriptor::new(Some("Y".to_string()), int()));
        u.members.push(MemberDescriptor::new(
            Some("q".to_string()),
            QualType::primitive(PrimitiveType::Char),
        ));
        fx.add(u);
        fx.add(RecordDef::new("Empty", RecordKind::Struct));
        fx.add(class(RecordKind::Struct, "Derived", &[("Empty", false)], &["x"], &[]));
        let r = fx.resolver();
        let u = r.layout("U").unwrap();
        assert_eq!(u.size, 4);
        assert!(u.fields.iter().all(|f| f.offset == 0));
        let empty = r.layout("Empty").unwrap();
        assert_eq!(empty.size, 1);
        assert!(empty.is_empty);
        let derived = r.layout("Derived").unwrap();
        assert_eq!(derived.size, 4);
        assert_eq!(base(&derived, "Empty").offset, 0);
    }

    #[test]
    fn test_recursive_containment_and_incomplete() {
        let mut fx = Fixture::new();
        let mut node = RecordDef::new("Node", RecordKind::Struct);
        node.members.push(MemberDescriptor::new(
            Some("next".to_string()),
            QualType::record(RecordKind::Struct, "Node").pointer_to(),
        ));
        fx.add(node);
        let mut bad = RecordDef::new("Bad", RecordKind::Struct);
        bad.members.push(MemberDescriptor::new(
            Some("self_".to_string()),
            QualType::record(RecordKind::Struct, "Bad"),
        ));
        fx.add(bad);
        let mut holder = RecordDef::new("Holder", RecordKind::Struct);
        holder.members.push(MemberDescriptor::new(
            Some("p".to_string()),
            QualType::new(TypeDescriptor::Incomplete("unk".to_string())),
        ));
        fx.add(holder);
        let r = fx.resolver();
        assert_eq!(r.layout("Node").unwrap().size, 8);
        assert_eq!(r.layout("Bad").unwrap_err(), LayoutError::RecursiveContainment("Bad".to_string()));
        assert_eq!(r.layout("Holder").unwrap_err(), LayoutError::IncompleteType("unk".to_string()));
        assert!(matches!(r.layout("Nope"), Err(LayoutError::UnknownClass(_))));
    }

    #[test]
    fn test_template_instance_layout() {
        use crate::template::resolver::tests::fixture_template;
        use crate::template::TemplateBody;
        let mut fx = Fixture::new();
        let mut tpl = fixture_template();
        // specialization #3 holds a T*[I] array
        if let TemplateBody::Record { def, .. } = &mut tpl.specializations[2].body {
            def.members.push(MemberDescriptor::new(
                Some("p".to_string()),
                QualType::new(TypeDescriptor::TemplateParam {
                    name: "T".to_string(),
                    index: 0,
                })
                .pointer_to(),
            ));
        }
        fx.table.insert(Declaration::Template(tpl)).unwrap();
        let args = vec![
            TemplateArg::Type(int()),
            TemplateArg::Type(int().pointer_to()),
            TemplateArg::Value(5),
        ];
        let ty = QualType::new(TypeDescriptor::TemplateId {
            name: "A".to_string(),
            args,
        });
        let r = fx.resolver();
        let plan = r.layout_of_type(&ty).unwrap();
        assert_eq!(plan.name, "A<int, int *, 5>");
        assert_eq!(plan.size, 8);
        let dependent = QualType::new(TypeDescriptor::TemplateParam {
            name: "T".to_string(),
            index: 0,
        });
        assert!(matches!(r.size_align(&dependent), Err(LayoutError::DependentType(_))));
    }
}
