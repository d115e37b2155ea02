//! Service and session configuration.
//!
//! All recognized options are enumerated here as typed fields with explicit
//! defaults; there are no open option maps. Request-time session overrides
//! reject unknown keys at deserialization.

mod session;
mod types;
pub mod validate;

pub use session::{BrowserKind, SessionConfig, SessionLimits, SessionOptions, Viewport};
pub use types::{ResourceType, ServiceConfig};
