//! Error taxonomy shared by every component in the crate.
//!
//! A single `Status` enum spans the model builders and the
//! `StatisticalModel` query surface: every fallible operation fails with a
//! `Status` plus a human-readable message, never a partial result.

use thiserror::Error;

/// Coarse failure category, attached to every [`StatismoError`].
///
/// `IO_ERROR`, `INVALID_H5FIELD_ERROR` and `INVALID_H5DATA_ERROR` are kept in
/// the taxonomy even though this crate never raises them itself (they are
/// reserved for the external I/O collaborator that persists model records).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    BadVersionError,
    BadInputError,
    IoError,
    OutOfRangeError,
    InvalidDataError,
    InvalidH5FieldError,
    InvalidH5DataError,
    NotImplementedError,
    InternalError,
    UnknownError,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Success => "SUCCESS",
            Status::BadVersionError => "BAD_VERSION_ERROR",
            Status::BadInputError => "BAD_INPUT_ERROR",
            Status::IoError => "IO_ERROR",
            Status::OutOfRangeError => "OUT_OF_RANGE_ERROR",
            Status::InvalidDataError => "INVALID_DATA_ERROR",
            Status::InvalidH5FieldError => "INVALID_H5FIELD_ERROR",
            Status::InvalidH5DataError => "INVALID_H5DATA_ERROR",
            Status::NotImplementedError => "NOT_IMPLEMENTED_ERROR",
            Status::InternalError => "INTERNAL_ERROR",
            Status::UnknownError => "UNKNOWN_ERROR",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
#[error("[{status}] {message}")]
pub struct StatismoError {
    pub status: Status,
    pub message: String,
}

impl StatismoError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(Status::BadInputError, message)
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(Status::OutOfRangeError, message)
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(Status::InvalidDataError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Status::InternalError, message)
    }

    pub fn bad_version(message: impl Into<String>) -> Self {
        Self::new(Status::BadVersionError, message)
    }
}

pub type StatismoResult<T> = Result<T, StatismoError>;
