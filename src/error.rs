/// Errors reported by `validate` / `configure` and by tensor binding.
///
/// `run` never returns one of these: a violated precondition there is a
/// programming error and panics with a message prefixed by the variant name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A required tensor was not supplied.
    #[error("NullArgument: {0}")]
    NullArgument(String),

    /// Element type outside the set a tensor role accepts.
    #[error("InvalidDataType: {0}")]
    InvalidDataType(String),

    /// Quantization parameter out of range.
    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    /// Bias or output incompatible with the input.
    #[error("ShapeMismatch: {0}")]
    ShapeMismatch(String),

    /// Operation used out of lifecycle order or with a bad window.
    #[error("PreconditionViolation: {0}")]
    PreconditionViolation(String),

    /// Worker pool could not be built.
    #[error("thread pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a validation step: `Ok(())` or the first violation found.
pub type Status = Result<()>;

/// `return Err(...)` when `cond` holds, the early-exit shape every validator uses.
macro_rules! return_error_on {
    ($cond:expr, $variant:ident, $($arg:tt)+) => {
        if $cond {
            return Err($crate::error::Error::$variant(format!($($arg)+)));
        }
    };
}
pub(crate) use return_error_on;
