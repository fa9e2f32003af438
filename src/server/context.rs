//! Explicit per-server state.

use crate::authz::AccessPolicy;
use crate::server::process_image::ProcessImage;

/// Everything one running server owns: the register bank and the
/// authorization policy.
///
/// Constructed at startup and shared via `Arc` across connection handlers.
/// There is deliberately no ambient global; tests build independent contexts
/// so nothing leaks between cases.
#[derive(Debug, Default)]
pub struct ServerContext {
    /// Holding-register bank.
    pub process_image: ProcessImage,
    /// Role→permission table consulted on every request.
    pub policy: AccessPolicy,
}

impl ServerContext {
    /// Create a context with an empty process image and the built-in policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
