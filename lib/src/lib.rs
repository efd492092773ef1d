//! Typed, lock-free atomic updates of reference slots in shared objects.
//!
//! A slot is a nullable reference field stored in an [`AtomicSlot`]. Types owning slots describe
//! them through [`Class`], and an [`Updater`] (or the type-erased [`AnyUpdater`]) validated once
//! against that description then performs loads, stores, compare-and-set and the read-modify-write
//! combinators of [`AtomicUpdate`] on any target instance.
//!
//! ```
//! use once_cell::sync::Lazy;
//! use ref_updater::{AtomicSlot, AtomicUpdate, Caller, Class, TypeInfo, Updater, Visibility};
//! use std::sync::Arc;
//!
//! struct Greeting {
//!     text: AtomicSlot<String>,
//! }
//!
//! impl Class for Greeting {
//!     fn class() -> &'static TypeInfo {
//!         static CLASS: Lazy<TypeInfo> = Lazy::new(|| {
//!             TypeInfo::builder::<Greeting>()
//!                 .slot("text", Visibility::Public, |greeting| &greeting.text)
//!                 .build()
//!         });
//!
//!         &CLASS
//!     }
//! }
//!
//! let caller = Caller::module(module_path!());
//! let updater = Updater::<Greeting, String>::new("text", &caller).unwrap();
//! let greeting = Greeting {
//!     text: AtomicSlot::from(Arc::new("hello".to_owned())),
//! };
//!
//! let text = updater
//!     .update_and_get(&greeting, |text| Some(Arc::new(format!("{}, world", text?))))
//!     .unwrap();
//!
//! assert_eq!(text.as_deref().map(String::as_str), Some("hello, world"));
//! ```

pub mod io;
pub mod reflect;
pub mod sync;

mod error;
mod updater;

#[cfg(test)]
mod test_utils;

pub use self::{
    error::{Error, Result},
    io::{ByteSource, Close, Closing, SliceSource},
    reflect::{
        Caller, Class, Declared, FieldInfo, Object, Primitive, TypeInfo, TypeInfoBuilder,
        ValueType, Visibility,
    },
    sync::AtomicSlot,
    updater::{new_updater, AnyRef, AnyUpdater, AtomicUpdate, Updater},
};
