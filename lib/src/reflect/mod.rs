//! Runtime descriptions of object types and their fields.
//!
//! There is no reflection over struct fields in Rust, so a type that owns updatable slots
//! describes itself by implementing [`Class`]. The returned [`TypeInfo`] lists the fields declared
//! directly on the type, together with their value type, [`Visibility`] and whether they are
//! volatile, and optionally names a parent type that the type "extends" by embedding it.
//!
//! ```
//! use once_cell::sync::Lazy;
//! use ref_updater::{AtomicSlot, Class, TypeInfo, Visibility};
//!
//! struct Node {
//!     next: AtomicSlot<Node>,
//! }
//!
//! impl Class for Node {
//!     fn class() -> &'static TypeInfo {
//!         static CLASS: Lazy<TypeInfo> = Lazy::new(|| {
//!             TypeInfo::builder::<Node>()
//!                 .slot("next", Visibility::Public, |node| &node.next)
//!                 .build()
//!         });
//!
//!         &CLASS
//!     }
//! }
//!
//! assert!(Node::class().field("next").unwrap().is_volatile());
//! ```

mod projection;

pub(crate) use self::projection::SlotAccess;

use self::projection::{Project, Projection};
use crate::sync::AtomicSlot;
use once_cell::sync::Lazy;
use std::{
    any::{self, Any, TypeId},
    fmt,
    marker::PhantomData,
};

/// A value whose concrete type is described by a [`TypeInfo`]. Every [`Class`] is an `Object`;
/// updater operations accept their targets as `&dyn Object`.
pub trait Object: Any + Send + Sync {
    fn type_info(&self) -> &'static TypeInfo;
    fn as_any(&self) -> &dyn Any;
}

/// A type that describes its own fields.
pub trait Class: Any + Send + Sync + Sized {
    fn class() -> &'static TypeInfo;
}

impl<C: Class> Object for C {
    fn type_info(&self) -> &'static TypeInfo {
        C::class()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Who may access a field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Visibility {
    Public,
    /// Only callers from the same package (module path).
    Package,
    /// Callers from the same package and types that extend the declaring type.
    Protected,
    /// Only the declaring type itself.
    Private,
}

/// Memory ordering a field is declared with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Declared {
    /// Every access takes part in a single total order (the field is an atomic).
    Volatile,
    Plain,
}

/// Runtime tag of a value type.
#[derive(Clone, Copy)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    pub fn of<V: ?Sized + Any>() -> Self {
        Self {
            id: TypeId::of::<V>(),
            name: any::type_name::<V>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this is one of the primitive scalar types (`bool`, `char`, integers and floats).
    pub fn is_primitive(&self) -> bool {
        PRIMITIVES.contains(&self.id)
    }
}

// `TypeId::of` is not const.
static PRIMITIVES: Lazy<[TypeId; 16]> = Lazy::new(|| {
    [
        TypeId::of::<bool>(),
        TypeId::of::<char>(),
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
    ]
});

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Primitive scalar types that can be declared as atomic fields.
pub trait Primitive: Any + private::Sealed {}

mod private {
    pub trait Sealed {}
}

macro_rules! impl_primitive {
    ($($ty:ty),*) => {
        $(
            impl private::Sealed for $ty {}
            impl Primitive for $ty {}
        )*
    };
}

impl_primitive!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

/// Description of a single field.
pub struct FieldInfo {
    name: &'static str,
    visibility: Visibility,
    value_type: ValueType,
    declared: Declared,
    slot: Option<Box<dyn SlotAccess>>,
}

impl FieldInfo {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn declared(&self) -> Declared {
        self.declared
    }

    pub fn is_volatile(&self) -> bool {
        self.declared == Declared::Volatile
    }

    /// Locator of the slot storage. Only volatile reference fields have one.
    pub(crate) fn slot_access(&'static self) -> Option<&'static dyn SlotAccess> {
        self.slot.as_deref()
    }
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("value_type", &self.value_type)
            .field("declared", &self.declared)
            .finish()
    }
}

/// Description of a [`Class`].
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    parent: Option<Parent>,
    fields: Vec<FieldInfo>,
}

struct Parent {
    class: fn() -> &'static TypeInfo,
    upcast: Box<dyn Project>,
}

impl TypeInfo {
    pub fn builder<T: Class>() -> TypeInfoBuilder<T> {
        TypeInfoBuilder {
            info: TypeInfo {
                id: TypeId::of::<T>(),
                name: any::type_name::<T>(),
                parent: None,
                fields: Vec::new(),
            },
            _type: PhantomData,
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Module path the type is declared in.
    pub fn package(&self) -> &'static str {
        package_of(self.name)
    }

    pub fn parent(&self) -> Option<&'static TypeInfo> {
        self.parent.as_ref().map(|parent| (parent.class)())
    }

    /// Looks up a field declared directly on this type. Fields of parent types are not searched.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Whether `other` is this type or extends it, directly or through its ancestors.
    pub fn is_assignable_from(&self, other: &TypeInfo) -> bool {
        let mut current = Some(other);

        while let Some(info) = current {
            if info.id == self.id {
                return true;
            }

            current = info.parent();
        }

        false
    }

    /// Projects `object`, an instance of this type, onto its embedded ancestor of type `to`.
    pub(crate) fn upcast<'a>(&self, object: &'a dyn Any, to: &TypeInfo) -> Option<&'a dyn Any> {
        let mut info = self;
        let mut object = object;

        loop {
            if info.id == to.id {
                return Some(object);
            }

            let parent = info.parent.as_ref()?;
            object = parent.upcast.project(object)?;
            info = (parent.class)();
        }
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("parent", &self.parent().map(|parent| parent.name))
            .field("fields", &self.fields)
            .finish()
    }
}

pub struct TypeInfoBuilder<T> {
    info: TypeInfo,
    _type: PhantomData<fn() -> T>,
}

impl<T: Class> TypeInfoBuilder<T> {
    /// Declares that `T` extends `P` by embedding it.
    pub fn extends<P: Class>(mut self, get: fn(&T) -> &P) -> Self {
        self.info.parent = Some(Parent {
            class: P::class,
            upcast: Box::new(Projection::new(get)),
        });
        self
    }

    /// Declares a volatile reference field stored in an [`AtomicSlot`].
    pub fn slot<V>(
        self,
        name: &'static str,
        visibility: Visibility,
        get: fn(&T) -> &AtomicSlot<V>,
    ) -> Self
    where
        V: Send + Sync + 'static,
    {
        self.field(FieldInfo {
            name,
            visibility,
            value_type: ValueType::of::<V>(),
            declared: Declared::Volatile,
            slot: Some(Box::new(Projection::new(get))),
        })
    }

    /// Declares a plain (non-volatile) field holding a `V`.
    pub fn plain<V: ?Sized + Any>(self, name: &'static str, visibility: Visibility) -> Self {
        self.field(FieldInfo {
            name,
            visibility,
            value_type: ValueType::of::<V>(),
            declared: Declared::Plain,
            slot: None,
        })
    }

    /// Declares a volatile primitive field, such as one stored in an `AtomicU64`.
    pub fn atomic<P: Primitive>(self, name: &'static str, visibility: Visibility) -> Self {
        self.field(FieldInfo {
            name,
            visibility,
            value_type: ValueType::of::<P>(),
            declared: Declared::Volatile,
            slot: None,
        })
    }

    pub fn build(self) -> TypeInfo {
        self.info
    }

    fn field(mut self, field: FieldInfo) -> Self {
        debug_assert!(
            self.info.field(field.name).is_none(),
            "duplicate field `{}` in `{}`",
            field.name,
            self.info.name
        );

        self.info.fields.push(field);
        self
    }
}

/// Identity of the code constructing an updater, used to check field visibility.
#[derive(Clone, Copy, Debug)]
pub struct Caller {
    package: &'static str,
    class: Option<&'static TypeInfo>,
}

impl Caller {
    /// Caller acting on behalf of the class `C`.
    pub fn of<C: Class>() -> Self {
        let class = C::class();

        Self {
            package: class.package(),
            class: Some(class),
        }
    }

    /// Caller from free code in the given module, usually `module_path!()`.
    pub fn module(path: &'static str) -> Self {
        Self {
            package: path,
            class: None,
        }
    }

    pub fn package(&self) -> &'static str {
        self.package
    }

    pub fn class(&self) -> Option<&'static TypeInfo> {
        self.class
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            Some(class) => f.write_str(class.name),
            None => f.write_str(self.package),
        }
    }
}

// Generic arguments may contain `::` themselves so they are cut off first.
fn package_of(name: &str) -> &str {
    let name = name.find('<').map_or(name, |index| &name[..index]);
    name.rfind("::").map_or("", |index| &name[..index])
}
