use thiserror::Error;

/// A specialized `Result` type for convenience.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("`{class}` declares no slot named `{slot}`")]
    NoSuchSlot { class: &'static str, slot: String },
    #[error("slot `{slot}` is declared as `{declared}`, not `{requested}`")]
    TypeMismatch {
        slot: &'static str,
        declared: &'static str,
        requested: &'static str,
    },
    #[error("slot `{slot}` must hold a reference type, not `{value}`")]
    NotReferenceType {
        slot: &'static str,
        value: &'static str,
    },
    #[error("slot `{slot}` must be declared volatile")]
    NotVolatile { slot: &'static str },
    #[error("`{caller}` can not access slot `{slot}` of `{class}`")]
    AccessDenied {
        caller: String,
        class: &'static str,
        slot: &'static str,
    },
    #[error("target of type `{found}` is not an instance of `{expected}`")]
    BadTarget {
        expected: &'static str,
        found: &'static str,
    },
    #[error("value is not an instance of `{expected}`")]
    BadValue { expected: &'static str },
}
