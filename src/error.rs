//! Result codes returned by table operations.

use core::fmt;

/// Successful outcome of a table operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Status {
    /// The operation succeeded; no output buffer was written.
    Ok,
    /// The operation succeeded and the supplied output buffer was populated.
    ValueOk,
}

impl Status {
    /// Numeric code of this status (`0` or `1`).
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::ValueOk => 1,
        }
    }
}

/// Failure of a table operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Error {
    /// Invalid arguments: wrong key/value length, missing compare hook,
    /// zero key size or an unusable configuration.
    Invalid,
    /// Allocation failed while copying bytes in or growing the buckets.
    NoMem,
    /// No stored key compares equal to the lookup key.
    NotFound,
    /// A bucket index fell outside the backing store. Indicates a broken
    /// hash/capacity relationship and should be treated as fatal.
    OutOfBounds,
}

impl Error {
    /// Numeric code of this error (`-1` through `-4`).
    pub fn code(self) -> i32 {
        match self {
            Error::Invalid => -1,
            Error::NoMem => -2,
            Error::NotFound => -3,
            Error::OutOfBounds => -4,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Invalid => write!(f, "invalid argument"),
            Error::NoMem => write!(f, "out of memory"),
            Error::NotFound => write!(f, "key not found"),
            Error::OutOfBounds => write!(f, "bucket index out of bounds"),
        }
    }
}

impl std::error::Error for Error {}

/// Table result
pub type Result<T> = std::result::Result<T, Error>;
