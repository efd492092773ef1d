//! Synchronization utilities

mod atomic_slot;

pub use self::atomic_slot::AtomicSlot;
