//! Error types of the interaction client.
//!
//! These enums form the contractual failure taxonomy of the public api.
//! Internal parsing helpers use [anyhow] and are mapped to these types at
//! the api boundary.

use std::fmt;

/// Synchronous argument validation failure. Returned immediately, no state
/// is created when this is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidArgument(pub String);

impl fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid argument: {}", self.0)
    }
}

impl std::error::Error for InvalidArgument {}

/// Failure of session resolution or establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Peer did not answer session establishment.
    Unreachable,
    /// Peer refused authentication.
    AuthFailed,
    /// Local or peer resource limit hit.
    ResourceExhausted,
    /// Session existed but is no longer usable.
    Closed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Unreachable => write!(f, "UNREACHABLE"),
            SessionError::AuthFailed => write!(f, "AUTH_FAILED"),
            SessionError::ResourceExhausted => write!(f, "RESOURCE_EXHAUSTED"),
            SessionError::Closed => write!(f, "CLOSED"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Subscription registry operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The exact same handle was registered twice.
    AlreadyExists,
    /// No handle matches the given node/subscription identity.
    NotFound,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::AlreadyExists => write!(f, "ALREADY_EXISTS"),
            RegistryError::NotFound => write!(f, "NOT_FOUND"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Failure of a single command invocation.
///
/// Exactly one of success or one of these is produced per unicast invoke.
/// Group invokes only ever report local enqueue failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeError {
    /// Allocation or queueing failed before anything was sent.
    NoMemory,
    /// Session resolution failed; nothing was sent.
    SessionUnavailable(SessionError),
    /// Peer answered with a failure status code.
    PeerError(u32),
    /// No response within the interaction deadline.
    Timeout,
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeError::NoMemory => write!(f, "NO_MEMORY"),
            InvokeError::SessionUnavailable(e) => write!(f, "SESSION_UNAVAILABLE ({})", e),
            InvokeError::PeerError(status) => write!(f, "PEER_ERROR status={}", status),
            InvokeError::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

impl std::error::Error for InvokeError {}
