//! Construction-time validation of a slot and per-operation checks of targets.

use super::DynSlot;
use crate::{
    error::{Error, Result},
    reflect::{Caller, FieldInfo, Object, SlotAccess, TypeInfo, ValueType, Visibility},
};
use std::any::Any;

/// A validated slot together with the type its targets must be instances of.
#[derive(Clone, Copy)]
pub(super) struct Binding {
    class: &'static TypeInfo,
    field: &'static FieldInfo,
    slot: &'static dyn SlotAccess,
    accessor: &'static TypeInfo,
}

impl Binding {
    pub fn resolve(
        class: &'static TypeInfo,
        value: ValueType,
        slot: &str,
        caller: &Caller,
    ) -> Result<Self> {
        let result = Self::try_resolve(class, value, slot, caller);

        match &result {
            Ok(binding) => tracing::debug!(
                class = class.name(),
                slot,
                accessor = binding.accessor.name(),
                "updater created"
            ),
            Err(error) => tracing::debug!(class = class.name(), slot, %error, "updater rejected"),
        }

        result
    }

    fn try_resolve(
        class: &'static TypeInfo,
        value: ValueType,
        slot: &str,
        caller: &Caller,
    ) -> Result<Self> {
        let field = class.field(slot).ok_or_else(|| Error::NoSuchSlot {
            class: class.name(),
            slot: slot.to_owned(),
        })?;

        if field.value_type() != value {
            return Err(Error::TypeMismatch {
                slot: field.name(),
                declared: field.value_type().name(),
                requested: value.name(),
            });
        }

        if value.is_primitive() {
            return Err(Error::NotReferenceType {
                slot: field.name(),
                value: value.name(),
            });
        }

        if !field.is_volatile() {
            return Err(Error::NotVolatile { slot: field.name() });
        }

        if !is_accessible(caller, class, field.visibility()) {
            return Err(Error::AccessDenied {
                caller: caller.to_string(),
                class: class.name(),
                slot: field.name(),
            });
        }

        // Volatile reference fields are always declared with their slot storage.
        let slot = field
            .slot_access()
            .ok_or(Error::NotVolatile { slot: field.name() })?;

        // A protected slot reached from a subtype in another package may only be updated through
        // instances of that subtype.
        let accessor = match caller.class() {
            Some(caller_class)
                if field.visibility() == Visibility::Protected
                    && class.is_assignable_from(caller_class)
                    && caller.package() != class.package() =>
            {
                caller_class
            }
            _ => class,
        };

        Ok(Self {
            class,
            field,
            slot,
            accessor,
        })
    }

    pub fn class(&self) -> &'static TypeInfo {
        self.class
    }

    pub fn field(&self) -> &'static FieldInfo {
        self.field
    }

    pub fn accessor(&self) -> &'static TypeInfo {
        self.accessor
    }

    /// Returns the storage of the slot in `target` (an `AtomicSlot` behind `dyn Any`).
    pub fn storage<'a>(&self, target: &'a dyn Object) -> Result<&'a dyn Any> {
        self.slot
            .project(self.access_check(target)?)
            .ok_or_else(|| self.bad_target(target))
    }

    pub fn dyn_slot<'a>(&self, target: &'a dyn Object) -> Result<&'a dyn DynSlot> {
        self.slot
            .dyn_slot(self.access_check(target)?)
            .ok_or_else(|| self.bad_target(target))
    }

    pub fn bad_target(&self, target: &dyn Object) -> Error {
        Error::BadTarget {
            expected: self.accessor.name(),
            found: target.type_info().name(),
        }
    }

    /// Checks that `target` is an instance of the accessor type and returns the part of it that
    /// is an instance of the declaring type.
    fn access_check<'a>(&self, target: &'a dyn Object) -> Result<&'a dyn Any> {
        let class = target.type_info();

        if !self.accessor.is_assignable_from(class) {
            return Err(self.bad_target(target));
        }

        class
            .upcast(target.as_any(), self.class)
            .ok_or_else(|| self.bad_target(target))
    }
}

fn is_accessible(caller: &Caller, class: &TypeInfo, visibility: Visibility) -> bool {
    let same_package = caller.package() == class.package();

    match visibility {
        Visibility::Public => true,
        Visibility::Package => same_package,
        Visibility::Protected => {
            same_package
                || caller
                    .class()
                    .map_or(false, |caller_class| class.is_assignable_from(caller_class))
        }
        Visibility::Private => caller.class().map_or(false, |caller_class| caller_class == class),
    }
}
