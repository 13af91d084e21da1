//! Transport-level error types.
//!
//! None of these are fatal: the dispatchers answer `"Incorrect data"` or drop
//! the connection and keep serving everyone else.

use thiserror::Error;

/// Malformed `@content~` framing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// A `~` that is not the last character of a fragment.
    #[error("delimiter '~' in the middle of a fragment")]
    UnterminatedDelimiter,

    /// The accumulated buffer closed with `~` but is not a complete token.
    #[error("malformed token: {0:?}")]
    Malformed(String),

    /// An unterminated fragment outgrew [`MAX_FRAGMENT_BYTES`](crate::codec::MAX_FRAGMENT_BYTES).
    #[error("unterminated fragment of {0} bytes exceeds the limit")]
    FragmentTooLong(usize),

    /// Content to encode contains a delimiter.
    #[error("token content may not contain '@' or '~': {0:?}")]
    ReservedCharacter(String),

    #[error("token content is empty")]
    EmptyContent,
}

/// Read/write failure on a connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,

    #[error("connection I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A feed token that does not split into `name - food`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingFieldError {
    #[error("feed request is missing the person's name")]
    Name,

    #[error("feed request is missing the food name")]
    Food,
}

pub type FramingResult<T> = Result<T, FramingError>;
