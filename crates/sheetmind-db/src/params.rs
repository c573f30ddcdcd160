//! Dynamically-typed bind parameters.
//!
//! `sqlx::Any` statements are built from a fixed SQL string but a variable
//! number of parameters; [`Param`] lets call sites build a `Vec<Param>` at
//! runtime and have it bound in order, regardless of backend.

use sqlx::any::AnyArguments;
use sqlx::Arguments;

/// A single bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// A NULL value.
    Null,
    /// UTF-8 text.
    Text(String),
    /// A 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// Raw bytes (used for packed float32 vectors).
    Blob(Vec<u8>),
}

impl Param {
    /// Shorthand for `Param::Text(s.into())`.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Build `sqlx::any::AnyArguments` from a parameter list, in order.
///
/// # Errors
///
/// Returns an error if `sqlx` rejects a bound value for the active
/// backend (this should not happen for the variants above).
pub fn to_any_arguments(params: &[Param]) -> sqlx::Result<AnyArguments<'static>> {
    let mut args = AnyArguments::default();
    for param in params {
        match param.clone() {
            Param::Null => args.add(Option::<i64>::None)?,
            Param::Text(s) => args.add(s)?,
            Param::Int(i) => args.add(i)?,
            Param::Float(f) => args.add(f)?,
            Param::Bool(b) => args.add(b)?,
            Param::Blob(b) => args.add(b)?,
        }
    }
    Ok(args)
}
