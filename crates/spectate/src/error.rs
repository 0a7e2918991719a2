#![forbid(unsafe_code)]

//! Error type for fallible observer registration.

use std::fmt;

/// Why an observer could not be registered.
///
/// Most adapters cannot fail: an empty roster or a missing attribute is a
/// state to observe, not an error. The exception is local-character
/// observation, which is meaningless without a designated local player and
/// fails fast instead of silently watching nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ObserveError {
    /// No local player is designated on the directory.
    NoLocalPlayer,
}

impl fmt::Display for ObserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserveError::NoLocalPlayer => {
                write!(f, "no local player designated; local-character observation requires a client session")
            }
        }
    }
}

impl std::error::Error for ObserveError {}
