// Wed Oct 14 2026 - Alex

use crate::types::{MethodDecl, RecordDef};
use serde::Serialize;
use std::fmt;

/// A single virtual function slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VTableSlot {
    /// Index in the vtable (0-based, after the offset-to-top and RTTI words)
    pub index: usize,
    /// Name and parameter list, e.g. `vmethod(int) const`
    pub selector: String,
    /// Class that introduced the slot
    pub declaring_class: String,
    /// Class whose definition the slot dispatches to
    pub overrider: String,
    /// Whether the current overrider is pure virtual
    pub is_pure: bool,
}

impl VTableSlot {
    pub fn new(index: usize, method: &MethodDecl, class: &str) -> Self {
        Self {
            index,
            selector: method.selector(),
            declaring_class: class.to_string(),
            overrider: class.to_string(),
            is_pure: method.is_pure(),
        }
    }

    pub fn is_override(&self) -> bool {
        self.declaring_class != self.overrider
    }
}

impl fmt::Display for VTableSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}::{}", self.index, self.overrider, self.selector)?;
        if self.is_pure {
            write!(f, " = 0")?;
        }
        if self.is_override() {
            write!(f, " [overrides {}]", self.declaring_class)?;
        }
        Ok(())
    }
}

/// Vtable of a secondary dynamic base subobject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondaryVTable {
    pub base: String,
    pub offset: u64,
    pub slots: Vec<VTableSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VTableDescriptor {
    pub class: String,
    pub slots: Vec<VTableSlot>,
    pub secondary: Vec<SecondaryVTable>,
}

impl VTableDescriptor {
    /// Builds the primary vtable of `record`: the primary base's slots come
    /// first, overriders replace slots with the same selector, and new
    /// virtual functions are appended. `inherited` holds the selectors of
    /// every other base vtable, so that a method overriding one of them is
    /// virtual even without the keyword.
    pub fn build(record: &RecordDef, primary: Option<&[VTableSlot]>, inherited: &[&str]) -> Self {
        let mut slots: Vec<VTableSlot> = primary.map(|s| s.to_vec()).unwrap_or_default();
        for method in &record.methods {
            let selector = method.selector();
            if let Some(slot) = slots.iter_mut().find(|s| s.selector == selector) {
                slot.overrider = record.name.clone();
                slot.is_pure = method.is_pure();
            } else if method.is_virtual() || inherited.contains(&selector.as_str()) {
                slots.push(VTableSlot::new(slots.len(), method, &record.name));
            }
        }
        Self {
            class: record.name.clone(),
            slots,
            secondary: Vec::new(),
        }
    }

    /// Adds the vtable of a secondary base at `offset`, with the slots the
    /// record overrides redirected to it.
    pub fn add_secondary(&mut self, base: &str, offset: u64, base_slots: &[VTableSlot], record: &RecordDef) {
        if self.secondary.iter().any(|s| s.offset == offset) {
            return;
        }
        let slots = base_slots
            .iter()
            .map(|slot| {
                let mut slot = slot.clone();
                if let Some(method) = record.methods.iter().find(|m| m.selector() == slot.selector) {
                    slot.overrider = record.name.clone();
                    slot.is_pure = method.is_pure();
                }
                slot
            })
            .collect();
        self.secondary.push(SecondaryVTable {
            base: base.to_string(),
            offset,
            slots,
        });
    }

    pub fn slot(&self, selector: &str) -> Option<&VTableSlot> {
        self.slots.iter().find(|s| s.selector == selector)
    }

    /// A class is abstract while some slot still dispatches to a pure
    /// virtual function.
    pub fn is_abstract(&self) -> bool {
        self.slots
            .iter()
            .chain(self.secondary.iter().flat_map(|s| s.slots.iter()))
            .any(|s| s.is_pure)
    }
}

impl fmt::Display for VTableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "vtable for {}", self.class)?;
        for slot in &self.slots {
            writeln!(f, "  {}", slot)?;
        }
        for secondary in &self.secondary {
            writeln!(f, "  vtable for {} in {} at +{}", secondary.base, self.class, secondary.offset)?;
            for slot in &secondary.slots {
                writeln!(f, "    {}", slot)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessSpecifier, FunctionType, MethodFlags, MethodKind, QualType, RecordKind};

    fn method(name: &str, flags: MethodFlags) -> MethodDecl {
        MethodDecl {
            name: name.to_string(),
            kind: MethodKind::Normal,
            ty: FunctionType::new(QualType::void(), vec![]),
            param_names: vec![],
            flags,
            access: AccessSpecifier::Public,
            pos: None,
        }
    }

    #[test]
    fn test_override_replaces_and_new_appends() {
        let mut base = RecordDef::new("vBase", RecordKind::Struct);
        base.methods.push(method("f", MethodFlags::VIRTUAL));
        let base_vt = VTableDescriptor::build(&base, None, &[]);
        assert_eq!(base_vt.slots.len(), 1);

        let mut derived = RecordDef::new("vDerived", RecordKind::Struct);
        derived.methods.push(method("f", MethodFlags::OVERRIDE));
        derived.methods.push(method("g", MethodFlags::VIRTUAL));
        derived.methods.push(method("h", MethodFlags::empty()));
        let vt = VTableDescriptor::build(&derived, Some(&base_vt.slots), &[]);
        assert_eq!(vt.slots.len(), 2);
        assert_eq!(vt.slots[0].overrider, "vDerived");
        assert!(vt.slots[0].is_override());
        assert_eq!(vt.slots[1].selector, "g()");
        assert_eq!(vt.slots[1].index, 1);
    }

    #[test]
    fn test_pure_slots_make_abstract() {
        let mut record = RecordDef::new("MyClass", RecordKind::Class);
        record.methods.push(method("vmethod", MethodFlags::VIRTUAL | MethodFlags::PURE));
        let vt = VTableDescriptor::build(&record, None, &[]);
        assert!(vt.is_abstract());

        let mut impl_ = RecordDef::new("Impl", RecordKind::Class);
        impl_.methods.push(method("vmethod", MethodFlags::empty()));
        let vt = VTableDescriptor::build(&impl_, Some(&vt.slots), &[]);
        assert!(!vt.is_abstract());
    }
}
