use crate::{
    error::{Error, Result},
    reflect::Object,
};
use std::sync::Arc;

/// Atomic operations on a reference slot of a target object.
///
/// Implementors provide the single-shot operations; the read-modify-write combinators are built
/// once on top of [`get`](Self::get) and [`compare_and_set`](Self::compare_and_set) as lock-free
/// retry loops: each iteration reads the current value, computes the next one and attempts to
/// swap it in, retrying when another thread got there first. There is no bound on the number of
/// retries.
///
/// # Update functions
///
/// The functions passed to the combinators may be called several times per operation when
/// other threads update the slot concurrently, each time with a fresh current value. They should
/// be free of side effects. An update that returns the current value unchanged still performs
/// (and succeeds with) a compare-and-set.
///
/// Every operation first checks its target and fails with [`Error::BadTarget`] if the target is
/// not an instance of the updater's accessor type. Operations with a new value on an updater
/// checking values at runtime fail with [`Error::BadValue`] if the value has the wrong type. In
/// both cases the slot is left untouched.
pub trait AtomicUpdate {
    type Value: ?Sized + Send + Sync + 'static;

    /// Returns the current value (sequentially consistent load).
    fn get(&self, target: &dyn Object) -> Result<Option<Arc<Self::Value>>>;

    /// Sets the value (sequentially consistent store).
    fn set(&self, target: &dyn Object, value: Option<Arc<Self::Value>>) -> Result<()>;

    /// Eventually sets the value (release store).
    ///
    /// The store is ordered after preceding writes of the calling thread but doesn't take part in
    /// the total order of sequentially consistent operations on other locations. A later
    /// [`set`](Self::set) or successful compare-and-set publishes it with a full fence.
    fn lazy_set(&self, target: &dyn Object, value: Option<Arc<Self::Value>>) -> Result<()>;

    /// Sets the value to `new` if the current value is `expect`, compared by identity. Returns
    /// whether the value was set.
    ///
    /// Atomic with respect to other operations of updaters on the same slot.
    fn compare_and_set(
        &self,
        target: &dyn Object,
        expect: Option<&Arc<Self::Value>>,
        new: Option<Arc<Self::Value>>,
    ) -> Result<bool>;

    /// Like [`compare_and_set`](Self::compare_and_set), but may fail spuriously and doesn't
    /// provide ordering guarantees beyond the slot itself, so it is rarely an appropriate
    /// alternative. Callers must tolerate both even though the current implementation is as
    /// strong as `compare_and_set`.
    fn weak_compare_and_set(
        &self,
        target: &dyn Object,
        expect: Option<&Arc<Self::Value>>,
        new: Option<Arc<Self::Value>>,
    ) -> Result<bool> {
        self.compare_and_set(target, expect, new)
    }

    /// Sets the value and returns the previous one.
    fn get_and_set(
        &self,
        target: &dyn Object,
        value: Option<Arc<Self::Value>>,
    ) -> Result<Option<Arc<Self::Value>>> {
        loop {
            let prev = self.get(target)?;

            if self.compare_and_set(target, prev.as_ref(), value.clone())? {
                return Ok(prev);
            }
        }
    }

    /// Replaces the value with the result of `f` applied to it and returns the previous value.
    fn get_and_update<F>(&self, target: &dyn Object, mut f: F) -> Result<Option<Arc<Self::Value>>>
    where
        F: FnMut(Option<Arc<Self::Value>>) -> Option<Arc<Self::Value>>,
    {
        update(self, target, |prev| Ok::<_, Error>(f(prev))).map(|(prev, _)| prev)
    }

    /// Replaces the value with the result of `f` applied to it and returns the new value.
    fn update_and_get<F>(&self, target: &dyn Object, mut f: F) -> Result<Option<Arc<Self::Value>>>
    where
        F: FnMut(Option<Arc<Self::Value>>) -> Option<Arc<Self::Value>>,
    {
        update(self, target, |prev| Ok::<_, Error>(f(prev))).map(|(_, next)| next)
    }

    /// Replaces the value with `g(current, x)` and returns the previous value. `x` stays the same
    /// across retries.
    fn get_and_accumulate<X, G>(
        &self,
        target: &dyn Object,
        x: &X,
        mut g: G,
    ) -> Result<Option<Arc<Self::Value>>>
    where
        X: ?Sized,
        G: FnMut(Option<Arc<Self::Value>>, &X) -> Option<Arc<Self::Value>>,
    {
        update(self, target, |prev| Ok::<_, Error>(g(prev, x))).map(|(prev, _)| prev)
    }

    /// Replaces the value with `g(current, x)` and returns the new value. `x` stays the same
    /// across retries.
    fn accumulate_and_get<X, G>(
        &self,
        target: &dyn Object,
        x: &X,
        mut g: G,
    ) -> Result<Option<Arc<Self::Value>>>
    where
        X: ?Sized,
        G: FnMut(Option<Arc<Self::Value>>, &X) -> Option<Arc<Self::Value>>,
    {
        update(self, target, |prev| Ok::<_, Error>(g(prev, x))).map(|(_, next)| next)
    }

    /// Fallible version of [`get_and_update`](Self::get_and_update). An error returned by `f`
    /// ends the operation without modifying the slot.
    fn try_get_and_update<F, E>(
        &self,
        target: &dyn Object,
        f: F,
    ) -> Result<Option<Arc<Self::Value>>, E>
    where
        F: FnMut(Option<Arc<Self::Value>>) -> Result<Option<Arc<Self::Value>>, E>,
        E: From<Error>,
    {
        update(self, target, f).map(|(prev, _)| prev)
    }

    /// Fallible version of [`update_and_get`](Self::update_and_get). An error returned by `f`
    /// ends the operation without modifying the slot.
    fn try_update_and_get<F, E>(
        &self,
        target: &dyn Object,
        f: F,
    ) -> Result<Option<Arc<Self::Value>>, E>
    where
        F: FnMut(Option<Arc<Self::Value>>) -> Result<Option<Arc<Self::Value>>, E>,
        E: From<Error>,
    {
        update(self, target, f).map(|(_, next)| next)
    }
}

type Transition<V> = (Option<Arc<V>>, Option<Arc<V>>);

/// The compare-and-set loop shared by all combinators. Returns the previous and the new value of
/// the successful iteration.
fn update<U, F, E>(updater: &U, target: &dyn Object, mut f: F) -> Result<Transition<U::Value>, E>
where
    U: AtomicUpdate + ?Sized,
    F: FnMut(Option<Arc<U::Value>>) -> Result<Option<Arc<U::Value>>, E>,
    E: From<Error>,
{
    loop {
        let prev = updater.get(target)?;
        let next = f(prev.clone())?;

        if updater.compare_and_set(target, prev.as_ref(), next.clone())? {
            return Ok((prev, next));
        }
    }
}
