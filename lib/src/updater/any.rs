use super::{guard::Binding, AtomicUpdate};
use crate::{
    error::{Error, Result},
    reflect::{Caller, Object, TypeInfo, ValueType},
    sync::AtomicSlot,
};
use std::{
    any::{self, Any},
    fmt,
    sync::Arc,
};

/// Type-erased reference to a slot value.
pub type AnyRef = Arc<dyn Any + Send + Sync>;

/// Creates an updater for the slot named `slot` declared on `class`, holding values of type
/// `value`, on behalf of `caller`.
///
/// The returned updater takes values as [`AnyRef`] and checks their type on every operation.
/// When the types are known statically, prefer [`Updater`](super::Updater).
///
/// # Errors
///
/// - [`Error::NoSuchSlot`] if `class` declares no field named `slot`.
/// - [`Error::TypeMismatch`] if the field is not declared with type `value`.
/// - [`Error::NotReferenceType`] if `value` is a primitive type.
/// - [`Error::NotVolatile`] if the field is not declared volatile.
/// - [`Error::AccessDenied`] if `caller` is not allowed to access the field.
pub fn new_updater(
    class: &'static TypeInfo,
    value: ValueType,
    slot: &str,
    caller: &Caller,
) -> Result<AnyUpdater> {
    Ok(AnyUpdater {
        binding: Binding::resolve(class, value, slot, caller)?,
        value,
    })
}

/// Updater whose value type is only known at runtime.
#[derive(Clone, Copy)]
pub struct AnyUpdater {
    binding: Binding,
    value: ValueType,
}

impl AnyUpdater {
    /// The type declaring the slot.
    pub fn class(&self) -> &'static TypeInfo {
        self.binding.class()
    }

    /// The type every target must be an instance of.
    pub fn accessor(&self) -> &'static TypeInfo {
        self.binding.accessor()
    }

    pub fn slot_name(&self) -> &'static str {
        self.binding.field().name()
    }

    pub fn value_type(&self) -> ValueType {
        self.value
    }
}

impl AtomicUpdate for AnyUpdater {
    type Value = dyn Any + Send + Sync;

    fn get(&self, target: &dyn Object) -> Result<Option<AnyRef>> {
        Ok(self.binding.dyn_slot(target)?.load_any())
    }

    fn set(&self, target: &dyn Object, value: Option<AnyRef>) -> Result<()> {
        self.binding.dyn_slot(target)?.store_any(value, Store::SeqCst)
    }

    fn lazy_set(&self, target: &dyn Object, value: Option<AnyRef>) -> Result<()> {
        self.binding.dyn_slot(target)?.store_any(value, Store::Release)
    }

    fn compare_and_set(
        &self,
        target: &dyn Object,
        expect: Option<&AnyRef>,
        new: Option<AnyRef>,
    ) -> Result<bool> {
        self.binding
            .dyn_slot(target)?
            .compare_and_set_any(expect, new)
    }

    fn get_and_set(&self, target: &dyn Object, value: Option<AnyRef>) -> Result<Option<AnyRef>> {
        self.binding.dyn_slot(target)?.swap_any(value)
    }
}

impl fmt::Debug for AnyUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyUpdater")
            .field("class", &self.class().name())
            .field("slot", &self.slot_name())
            .field("value", &self.value)
            .field("accessor", &self.accessor().name())
            .finish()
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Store {
    SeqCst,
    Release,
}

/// Slot operations on type-erased values.
pub(crate) trait DynSlot {
    fn load_any(&self) -> Option<AnyRef>;
    fn store_any(&self, value: Option<AnyRef>, store: Store) -> Result<()>;
    fn swap_any(&self, value: Option<AnyRef>) -> Result<Option<AnyRef>>;
    fn compare_and_set_any(&self, expect: Option<&AnyRef>, new: Option<AnyRef>) -> Result<bool>;
}

impl<V: Send + Sync + 'static> DynSlot for AtomicSlot<V> {
    fn load_any(&self) -> Option<AnyRef> {
        self.load().map(|value| value as AnyRef)
    }

    fn store_any(&self, value: Option<AnyRef>, store: Store) -> Result<()> {
        let value = downcast(value)?;

        match store {
            Store::SeqCst => self.store(value),
            Store::Release => self.store_release(value),
        }

        Ok(())
    }

    fn swap_any(&self, value: Option<AnyRef>) -> Result<Option<AnyRef>> {
        let value = downcast(value)?;
        Ok(self.swap(value).map(|prev| prev as AnyRef))
    }

    fn compare_and_set_any(&self, expect: Option<&AnyRef>, new: Option<AnyRef>) -> Result<bool> {
        let new = downcast(new)?;

        match expect.map(|expect| expect.clone().downcast::<V>()) {
            None => Ok(self.compare_and_set(None, new)),
            Some(Ok(expect)) => Ok(self.compare_and_set(Some(&expect), new)),
            // A value of another type can't be the current one.
            Some(Err(_)) => Ok(false),
        }
    }
}

fn downcast<V: Send + Sync + 'static>(value: Option<AnyRef>) -> Result<Option<Arc<V>>> {
    value
        .map(|value| {
            value.downcast::<V>().map_err(|_| Error::BadValue {
                expected: any::type_name::<V>(),
            })
        })
        .transpose()
}
