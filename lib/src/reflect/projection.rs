//! Type-erased projections from an object onto one of its fields.

use crate::{sync::AtomicSlot, updater::DynSlot};
use std::any::Any;

pub(crate) trait Project: Send + Sync {
    /// Projects `object` onto the field, or returns `None` if `object` is not of the owning type.
    fn project<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any>;
}

/// Locator of a slot inside an instance of its declaring type.
pub(crate) trait SlotAccess: Project {
    fn dyn_slot<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn DynSlot>;
}

pub(super) struct Projection<T, F> {
    get: fn(&T) -> &F,
}

impl<T, F> Projection<T, F> {
    pub fn new(get: fn(&T) -> &F) -> Self {
        Self { get }
    }
}

impl<T: Any, F: Any> Project for Projection<T, F> {
    fn project<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any> {
        object
            .downcast_ref::<T>()
            .map(|object| (self.get)(object) as &dyn Any)
    }
}

impl<T, V> SlotAccess for Projection<T, AtomicSlot<V>>
where
    T: Any,
    V: Send + Sync + 'static,
{
    fn dyn_slot<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn DynSlot> {
        object
            .downcast_ref::<T>()
            .map(|object| (self.get)(object) as &dyn DynSlot)
    }
}
