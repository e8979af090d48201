use thiserror::Error;

use crate::Method;

/// A route registration that would leave the table ambiguous or unreachable.
///
/// These are configuration mistakes, reported while the router is being built. Dispatch
/// itself never fails: unmatched requests go to the not-found handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("pattern `{pattern}` has a parameter segment without a name")]
    EmptyParameter { pattern: String },

    #[error("pattern `{pattern}` declares parameter `{name}` more than once")]
    DuplicateParameter { pattern: String, name: String },

    #[error("pattern `{pattern}` is already bound to {existing}")]
    Conflict {
        pattern: String,
        existing: &'static str,
    },

    #[error("pattern `{pattern}` has the same shape as `{existing}` but different parameter names")]
    ShapeMismatch { pattern: String, existing: String },

    #[error("a {method} handler is already registered for `{pattern}`")]
    DuplicateMethod { pattern: String, method: Method },
}
