//! Handles for atomic updates of a reference slot.
//!
//! An updater is created once per slot and caller, validating the slot's declaration and the
//! caller's access, and then shared freely. Every operation takes the target object whose slot it
//! operates on.

mod any;
mod combinators;
mod guard;

pub use self::{
    any::{new_updater, AnyRef, AnyUpdater},
    combinators::AtomicUpdate,
};

pub(crate) use self::any::DynSlot;

use self::guard::Binding;
use crate::{
    error::Result,
    reflect::{Caller, Class, Object, TypeInfo, ValueType},
    sync::AtomicSlot,
};
use std::{fmt, marker::PhantomData, sync::Arc};

/// Updater of a slot holding `Option<Arc<V>>`, declared on the type `T`.
///
/// Targets are passed as `&dyn Object` and may be instances of `T` or of any type extending it,
/// unless the updater was narrowed to the caller's type on creation (see [`Updater::new`]).
pub struct Updater<T, V> {
    binding: Binding,
    _types: PhantomData<fn(&T) -> Option<Arc<V>>>,
}

impl<T: Class, V: Send + Sync + 'static> Updater<T, V> {
    /// Creates an updater for the slot named `slot` declared directly on `T`.
    ///
    /// When the slot is protected and `caller` is a type in another package that extends `T`,
    /// the updater only accepts targets that are instances of the caller's type.
    ///
    /// # Errors
    ///
    /// Fails with the same errors as [`new_updater`].
    pub fn new(slot: &str, caller: &Caller) -> Result<Self> {
        Ok(Self {
            binding: Binding::resolve(T::class(), ValueType::of::<V>(), slot, caller)?,
            _types: PhantomData,
        })
    }
}

impl<T, V: Send + Sync + 'static> Updater<T, V> {
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

    fn slot<'a>(&self, target: &'a dyn Object) -> Result<&'a AtomicSlot<V>> {
        self.binding
            .storage(target)?
            .downcast_ref()
            .ok_or_else(|| self.binding.bad_target(target))
    }
}

impl<T, V: Send + Sync + 'static> AtomicUpdate for Updater<T, V> {
    type Value = V;

    fn get(&self, target: &dyn Object) -> Result<Option<Arc<V>>> {
        Ok(self.slot(target)?.load())
    }

    fn set(&self, target: &dyn Object, value: Option<Arc<V>>) -> Result<()> {
        self.slot(target)?.store(value);
        Ok(())
    }

    fn lazy_set(&self, target: &dyn Object, value: Option<Arc<V>>) -> Result<()> {
        self.slot(target)?.store_release(value);
        Ok(())
    }

    fn compare_and_set(
        &self,
        target: &dyn Object,
        expect: Option<&Arc<V>>,
        new: Option<Arc<V>>,
    ) -> Result<bool> {
        Ok(self.slot(target)?.compare_and_set(expect, new))
    }

    fn get_and_set(&self, target: &dyn Object, value: Option<Arc<V>>) -> Result<Option<Arc<V>>> {
        Ok(self.slot(target)?.swap(value))
    }
}

impl<T, V> Clone for Updater<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Updater<T, V> {}

impl<T, V> fmt::Debug for Updater<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("class", &self.binding.class().name())
            .field("slot", &self.binding.field().name())
            .field("accessor", &self.binding.accessor().name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, reflect::Visibility, test_utils};
    use assert_matches::assert_matches;
    use once_cell::sync::Lazy;
    use std::sync::atomic::AtomicU64;

    struct Node {
        name: &'static str,
        left: AtomicSlot<Node>,
        secret: AtomicSlot<Node>,
        local: AtomicSlot<Node>,
        family: AtomicSlot<Node>,
        #[allow(unused)]
        weight: AtomicU64,
    }

    impl Node {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                left: AtomicSlot::empty(),
                secret: AtomicSlot::empty(),
                local: AtomicSlot::empty(),
                family: AtomicSlot::empty(),
                weight: AtomicU64::new(0),
            })
        }
    }

    impl fmt::Debug for Node {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Node")
                .field("name", &self.name)
                .finish_non_exhaustive()
        }
    }

    impl Class for Node {
        fn class() -> &'static TypeInfo {
            static CLASS: Lazy<TypeInfo> = Lazy::new(|| {
                TypeInfo::builder::<Node>()
                    .slot("left", Visibility::Public, |node| &node.left)
                    .slot("secret", Visibility::Private, |node| &node.secret)
                    .slot("local", Visibility::Package, |node| &node.local)
                    .slot("family", Visibility::Protected, |node| &node.family)
                    .atomic::<u64>("weight", Visibility::Public)
                    .plain::<Node>("right", Visibility::Public)
                    .build()
            });

            &CLASS
        }
    }

    struct Text {
        value: AtomicSlot<String>,
    }

    impl Class for Text {
        fn class() -> &'static TypeInfo {
            static CLASS: Lazy<TypeInfo> = Lazy::new(|| {
                TypeInfo::builder::<Text>()
                    .slot("value", Visibility::Public, |text| &text.value)
                    .build()
            });

            &CLASS
        }
    }

    fn here() -> Caller {
        Caller::module(module_path!())
    }

    fn names(value: Option<Arc<Node>>) -> Option<&'static str> {
        value.map(|node| node.name)
    }

    #[test]
    fn no_such_slot() {
        test_utils::init_log();

        assert_matches!(
            Updater::<Node, Node>::new("up", &here()),
            Err(Error::NoSuchSlot { slot, .. }) if slot == "up"
        );
    }

    #[test]
    fn type_mismatch() {
        test_utils::init_log();

        assert_matches!(
            Updater::<Node, String>::new("left", &here()),
            Err(Error::TypeMismatch { slot: "left", .. })
        );
    }

    #[test]
    fn not_reference_type() {
        test_utils::init_log();

        assert_matches!(
            new_updater(Node::class(), ValueType::of::<u64>(), "weight", &here()),
            Err(Error::NotReferenceType { slot: "weight", .. })
        );
    }

    #[test]
    fn not_volatile() {
        test_utils::init_log();

        assert_matches!(
            Updater::<Node, Node>::new("right", &here()),
            Err(Error::NotVolatile { slot: "right" })
        );
    }

    #[test]
    fn access_denied() {
        test_utils::init_log();

        let outsider = Caller::module("somewhere::else");

        assert_matches!(
            Updater::<Node, Node>::new("secret", &outsider),
            Err(Error::AccessDenied { slot: "secret", .. })
        );
        assert_matches!(
            Updater::<Node, Node>::new("local", &outsider),
            Err(Error::AccessDenied { slot: "local", .. })
        );
        assert_matches!(
            Updater::<Node, Node>::new("family", &outsider),
            Err(Error::AccessDenied { slot: "family", .. })
        );
        assert_matches!(Updater::<Node, Node>::new("left", &outsider), Ok(_));

        // Free code in the declaring package is not the declaring type.
        assert_matches!(
            Updater::<Node, Node>::new("secret", &here()),
            Err(Error::AccessDenied { .. })
        );
        assert_matches!(Updater::<Node, Node>::new("local", &here()), Ok(_));
        assert_matches!(Updater::<Node, Node>::new("family", &here()), Ok(_));
        assert_matches!(
            Updater::<Node, Node>::new("secret", &Caller::of::<Node>()),
            Ok(_)
        );
    }

    #[test]
    fn bad_target() {
        let updater = Updater::<Node, Node>::new("left", &here()).unwrap();
        let text = Text {
            value: AtomicSlot::empty(),
        };

        assert_matches!(
            updater.get(&text),
            Err(Error::BadTarget { expected, found })
                if expected == Node::class().name() && found == Text::class().name()
        );
        assert_matches!(
            updater.set(&text, Some(Node::new("a"))),
            Err(Error::BadTarget { .. })
        );
        assert_matches!(
            updater.get_and_update(&text, |_| None),
            Err(Error::BadTarget { .. })
        );
    }

    #[test]
    fn simple_compare_and_set() {
        let updater = Updater::<Node, Node>::new("left", &here()).unwrap();
        let (a, b, c) = (Node::new("a"), Node::new("b"), Node::new("c"));
        let t = Node::new("t");
        t.left.store(Some(a.clone()));

        assert!(updater
            .compare_and_set(&*t, Some(&a), Some(b.clone()))
            .unwrap());
        assert_eq!(names(updater.get(&*t).unwrap()), Some("b"));

        assert!(!updater.compare_and_set(&*t, Some(&a), Some(c)).unwrap());
        assert_eq!(names(updater.get(&*t).unwrap()), Some("b"));
    }

    #[test]
    fn compare_and_set_is_by_identity() {
        let updater = Updater::<Text, String>::new("value", &here()).unwrap();
        let current = Arc::new("x".to_owned());
        let t = Text {
            value: AtomicSlot::from(current.clone()),
        };

        let lookalike = Arc::new("x".to_owned());
        assert!(!updater
            .compare_and_set(&t, Some(&lookalike), Some(Arc::new("y".to_owned())))
            .unwrap());
        assert!(updater
            .weak_compare_and_set(&t, Some(&current), Some(lookalike))
            .unwrap());
    }

    #[test]
    fn null_values() {
        let updater = Updater::<Node, Node>::new("left", &here()).unwrap();
        let a = Node::new("a");
        let t = Node::new("t");
        t.left.store(Some(a.clone()));

        assert!(updater.compare_and_set(&*t, Some(&a), None).unwrap());
        assert_eq!(names(updater.get(&*t).unwrap()), None);

        assert!(updater.compare_and_set(&*t, None, Some(a)).unwrap());
        assert_eq!(names(updater.get(&*t).unwrap()), Some("a"));
    }

    #[test]
    fn set_lazy_set_and_get_and_set() {
        let updater = Updater::<Node, Node>::new("left", &here()).unwrap();
        let t = Node::new("t");

        updater.set(&*t, Some(Node::new("a"))).unwrap();
        assert_eq!(names(updater.get(&*t).unwrap()), Some("a"));

        updater.lazy_set(&*t, Some(Node::new("b"))).unwrap();
        assert_eq!(names(updater.get(&*t).unwrap()), Some("b"));

        let prev = updater.get_and_set(&*t, Some(Node::new("c"))).unwrap();
        assert_eq!(names(prev), Some("b"));
        assert_eq!(names(updater.get(&*t).unwrap()), Some("c"));
    }

    #[test]
    fn accumulate_argument_order() {
        let updater = Updater::<Text, String>::new("value", &here()).unwrap();
        let t = Text {
            value: AtomicSlot::from(Arc::new("hi".to_owned())),
        };

        let prev = updater
            .get_and_accumulate(&t, "!", |current, suffix| {
                Some(Arc::new(format!("{}{}", current?, suffix)))
            })
            .unwrap();

        assert_eq!(prev.as_deref().map(String::as_str), Some("hi"));
        assert_eq!(t.value.load().as_deref().map(String::as_str), Some("hi!"));

        let next = updater
            .accumulate_and_get(&t, "?", |current, suffix| {
                Some(Arc::new(format!("{}{}", current?, suffix)))
            })
            .unwrap();

        assert_eq!(next.as_deref().map(String::as_str), Some("hi!?"));
    }

    #[test]
    fn get_and_update_calls_function_once_without_contention() {
        let updater = Updater::<Text, String>::new("value", &here()).unwrap();
        let t = Text {
            value: AtomicSlot::from(Arc::new("a".to_owned())),
        };
        let mut calls = 0;

        let prev = updater
            .get_and_update(&t, |current| {
                calls += 1;
                Some(Arc::new(format!("{}b", current?)))
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(prev.as_deref().map(String::as_str), Some("a"));
        assert_eq!(t.value.load().as_deref().map(String::as_str), Some("ab"));
    }

    #[test]
    fn update_returning_current_value_succeeds() {
        let updater = Updater::<Text, String>::new("value", &here()).unwrap();
        let current = Arc::new("same".to_owned());
        let t = Text {
            value: AtomicSlot::from(current.clone()),
        };

        let next = updater.update_and_get(&t, |value| value).unwrap();

        assert!(Arc::ptr_eq(next.as_ref().unwrap(), &current));
        assert!(Arc::ptr_eq(t.value.load().as_ref().unwrap(), &current));
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Rejected {
        Empty,
        Updater(Error),
    }

    impl From<Error> for Rejected {
        fn from(error: Error) -> Self {
            Self::Updater(error)
        }
    }

    #[test]
    fn failed_update_leaves_slot_untouched() {
        let updater = Updater::<Text, String>::new("value", &here()).unwrap();
        let t = Text {
            value: AtomicSlot::empty(),
        };

        let result = updater.try_get_and_update(&t, |current| match current {
            Some(value) => Ok(Some(Arc::new(format!("{}!", value)))),
            None => Err(Rejected::Empty),
        });
        assert_eq!(result, Err(Rejected::Empty));
        assert!(t.value.load().is_none());

        t.value.store(Some(Arc::new("x".to_owned())));

        let next = updater
            .try_update_and_get(&t, |current| match current {
                Some(value) => Ok(Some(Arc::new(format!("{}!", value)))),
                None => Err(Rejected::Empty),
            })
            .unwrap();
        assert_eq!(next.as_deref().map(String::as_str), Some("x!"));

        let other = Updater::<Node, Node>::new("left", &here()).unwrap();
        assert_matches!(
            other.try_get_and_update(&t, |_| Ok::<_, Rejected>(None)),
            Err(Rejected::Updater(Error::BadTarget { .. }))
        );
    }

    #[test]
    fn accessors_and_debug() {
        let updater = Updater::<Node, Node>::new("left", &here()).unwrap();

        assert_eq!(updater.class(), Node::class());
        assert_eq!(updater.accessor(), Node::class());
        assert_eq!(updater.slot_name(), "left");

        let debug = format!("{:?}", updater);
        assert!(debug.starts_with("Updater {"));
        assert!(debug.contains("\"left\""));
    }

    mod p1 {
        use super::*;

        pub struct Base {
            pub head: AtomicSlot<String>,
        }

        impl Class for Base {
            fn class() -> &'static TypeInfo {
                static CLASS: Lazy<TypeInfo> = Lazy::new(|| {
                    TypeInfo::builder::<Base>()
                        .slot("head", Visibility::Protected, |base| &base.head)
                        .build()
                });

                &CLASS
            }
        }
    }

    mod p2 {
        use super::{p1::Base, *};

        pub struct Sub {
            pub base: Base,
        }

        impl Class for Sub {
            fn class() -> &'static TypeInfo {
                static CLASS: Lazy<TypeInfo> = Lazy::new(|| {
                    TypeInfo::builder::<Sub>()
                        .extends(|sub| &sub.base)
                        .build()
                });

                &CLASS
            }
        }
    }

    #[test]
    fn protected_access_from_subtype_is_narrowed() {
        use self::{p1::Base, p2::Sub};

        test_utils::init_log();

        let updater = Updater::<Base, String>::new("head", &Caller::of::<Sub>()).unwrap();
        assert_eq!(updater.accessor(), Sub::class());

        let base = Base {
            head: AtomicSlot::from(Arc::new("base".to_owned())),
        };
        let sub = Sub {
            base: Base {
                head: AtomicSlot::from(Arc::new("sub".to_owned())),
            },
        };

        assert_matches!(
            updater.get(&base),
            Err(Error::BadTarget { expected, .. }) if expected == Sub::class().name()
        );
        assert_eq!(
            updater.get(&sub).unwrap().as_deref().map(String::as_str),
            Some("sub")
        );

        updater.set(&sub, Some(Arc::new("updated".to_owned()))).unwrap();
        assert_eq!(
            sub.base.head.load().as_deref().map(String::as_str),
            Some("updated")
        );
    }

    #[test]
    fn protected_access_from_same_package_is_not_narrowed() {
        use self::{p1::Base, p2::Sub};

        let caller = Caller::module(Base::class().package());
        let updater = Updater::<Base, String>::new("head", &caller).unwrap();
        assert_eq!(updater.accessor(), Base::class());

        let base = Base {
            head: AtomicSlot::empty(),
        };
        let sub = Sub {
            base: Base {
                head: AtomicSlot::empty(),
            },
        };

        assert_matches!(updater.get(&base), Ok(None));
        assert_matches!(updater.get(&sub), Ok(None));
    }
}
