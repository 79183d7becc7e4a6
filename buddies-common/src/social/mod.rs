//! Rules for the three pieces of buddy logic that have to hold no matter which client is
//! talking to the store: who shows up as nearby, how a buddy relationship may move between
//! states, and how claims on a buddy-request post are arbitrated.
//!
//! Nothing in here touches the database. The DAOs in `crate::db` load the rows, call these
//! checks while holding the relevant row locks, and write the outcome.

pub mod pickup;
pub mod proximity;
pub mod relationship;

use std::fmt;

/// Coarse classification shared by every domain error, used to pick a response status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    /// Missing or malformed input, such as no known location or a self-directed request
    Validation,
    /// The caller is acting outside their role (not the recipient, not the owner)
    Authorization,
    /// The requested transition is not valid from the current state
    StateConflict,
    /// A bounded resource is full
    Capacity,
    /// The referenced row does not exist (or is not visible to the caller)
    NotFound,
    /// The backing store could not be reached or failed unexpectedly
    ServiceUnavailable,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "ValidationError"),
            ErrorCategory::Authorization => write!(f, "AuthorizationError"),
            ErrorCategory::StateConflict => write!(f, "StateConflictError"),
            ErrorCategory::Capacity => write!(f, "CapacityError"),
            ErrorCategory::NotFound => write!(f, "NotFoundError"),
            ErrorCategory::ServiceUnavailable => write!(f, "ServiceUnavailable"),
        }
    }
}
