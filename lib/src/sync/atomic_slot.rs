//! Reference slot that allows lock-free concurrent load, store and compare-and-set of the
//! underlying value.

use crossbeam_epoch::{self as epoch, Guard};
use std::{
    fmt,
    marker::PhantomData,
    mem::ManuallyDrop,
    ptr,
    sync::{
        atomic::{AtomicPtr, Ordering},
        Arc,
    },
};

/// Storage of a volatile, nullable reference field.
///
/// The slot owns one strong reference to its current value and hands out clones of it. A value
/// displaced by a store or by a successful compare-and-set is released only once no thread can
/// still be in the middle of loading it, so a `load` never races with the release of the value it
/// observed.
///
/// All operations are wait-free with respect to other operations on the same slot.
///
/// Displaced values may be dropped on another thread at a later point, so the operations are only
/// available for values that don't borrow anything:
///
/// ```compile_fail
/// use ref_updater::AtomicSlot;
/// use std::sync::Arc;
///
/// let local = 1u64;
/// let slot = AtomicSlot::<&u64>::empty();
/// slot.store(Some(Arc::new(&local)));
/// ```
pub struct AtomicSlot<V> {
    ptr: AtomicPtr<V>,
    _owned: PhantomData<Option<Arc<V>>>,
}

impl<V> AtomicSlot<V> {
    pub fn new(value: Option<Arc<V>>) -> Self {
        Self {
            ptr: AtomicPtr::new(into_raw(value)),
            _owned: PhantomData,
        }
    }

    pub const fn empty() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            _owned: PhantomData,
        }
    }

    /// Consumes the slot and returns its value.
    pub fn into_inner(self) -> Option<Arc<V>> {
        let this = ManuallyDrop::new(self);
        // SAFETY: we own the slot so nobody else can observe the pointer anymore, and
        // `ManuallyDrop` prevents the reference from being released twice.
        unsafe { from_raw(this.ptr.load(Ordering::Relaxed)) }
    }
}

impl<V: Send + Sync + 'static> AtomicSlot<V> {
    /// Sequentially consistent load.
    pub fn load(&self) -> Option<Arc<V>> {
        let _guard = epoch::pin();
        let ptr = self.ptr.load(Ordering::SeqCst);
        // SAFETY: `ptr` was produced by `Arc::into_raw` and the reference owned by the slot can't
        // be released before `_guard` is dropped.
        unsafe { clone_raw(ptr) }
    }

    /// Sequentially consistent store.
    pub fn store(&self, value: Option<Arc<V>>) {
        self.replace(value, Ordering::SeqCst)
    }

    /// Release store. Visible to subsequent loads of this slot, but doesn't take part in the total
    /// order of sequentially consistent operations on other locations.
    pub fn store_release(&self, value: Option<Arc<V>>) {
        self.replace(value, Ordering::Release)
    }

    /// Atomically replaces the current value and returns the previous one.
    pub fn swap(&self, value: Option<Arc<V>>) -> Option<Arc<V>> {
        let guard = epoch::pin();
        let old = self.ptr.swap(into_raw(value), Ordering::SeqCst);

        // The reference we just took over can't be handed out directly: a concurrent `load` may
        // have read `old` and not yet incremented its count.
        //
        // SAFETY: `old` came from `Arc::into_raw` and is released no sooner than `guard` allows.
        unsafe {
            let prev = clone_raw(old);
            retire(&guard, old);
            prev
        }
    }

    /// Replaces the current value with `new` if the current value is `expect`. Values are compared
    /// by identity (see `Arc::ptr_eq`), `None` matches only `None`. Returns whether the value was
    /// replaced. On failure `new` is dropped without ever being published.
    pub fn compare_and_set(&self, expect: Option<&Arc<V>>, new: Option<Arc<V>>) -> bool {
        let current = expect.map_or(ptr::null_mut(), |value| Arc::as_ptr(value) as *mut V);
        let new = into_raw(new);
        let guard = epoch::pin();

        match self
            .ptr
            .compare_exchange(current, new, Ordering::SeqCst, Ordering::Acquire)
        {
            Ok(old) => {
                // SAFETY: `old` was the slot's reference which now belongs to us.
                unsafe { retire(&guard, old) };
                true
            }
            Err(_) => {
                // SAFETY: `new` was never published so we still own it exclusively.
                drop(unsafe { from_raw(new) });
                false
            }
        }
    }

    fn replace(&self, value: Option<Arc<V>>, order: Ordering) {
        let guard = epoch::pin();
        let old = self.ptr.swap(into_raw(value), order);
        // SAFETY: `old` was the slot's reference which now belongs to us.
        unsafe { retire(&guard, old) }
    }
}

impl<V> Drop for AtomicSlot<V> {
    fn drop(&mut self) {
        // SAFETY: exclusive access, no load can be in progress.
        drop(unsafe { from_raw(*self.ptr.get_mut()) });
    }
}

impl<V> Default for AtomicSlot<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V> From<Arc<V>> for AtomicSlot<V> {
    fn from(value: Arc<V>) -> Self {
        Self::new(Some(value))
    }
}

impl<V: fmt::Debug + Send + Sync + 'static> fmt::Debug for AtomicSlot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicSlot").field(&self.load()).finish()
    }
}

fn into_raw<V>(value: Option<Arc<V>>) -> *mut V {
    value.map_or(ptr::null_mut(), |value| Arc::into_raw(value) as *mut V)
}

/// # Safety
///
/// `ptr` must be null or come from `Arc::into_raw` and the caller must own that reference.
unsafe fn from_raw<V>(ptr: *mut V) -> Option<Arc<V>> {
    if ptr.is_null() {
        None
    } else {
        Some(Arc::from_raw(ptr))
    }
}

/// # Safety
///
/// `ptr` must be null or come from `Arc::into_raw` and its strong count must be kept above zero for
/// the duration of the call.
unsafe fn clone_raw<V>(ptr: *mut V) -> Option<Arc<V>> {
    if ptr.is_null() {
        None
    } else {
        Arc::increment_strong_count(ptr);
        Some(Arc::from_raw(ptr))
    }
}

/// Releases `ptr` once every thread pinned at the time of the call has unpinned.
///
/// # Safety
///
/// `ptr` must be null or come from `Arc::into_raw`, the caller must own that reference and `ptr`
/// must no longer be reachable through the slot.
unsafe fn retire<V: Send + Sync + 'static>(guard: &Guard, ptr: *mut V) {
    if !ptr.is_null() {
        guard.defer_unchecked(move || drop(Arc::from_raw(ptr)));
    }
}
