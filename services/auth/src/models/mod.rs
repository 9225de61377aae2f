//! Authentication service models

pub mod session;

// Re-export for convenience
pub use session::{NewSession, Session, SessionMetadata};
