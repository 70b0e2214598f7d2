//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Intercepted request (URI rewritten by target.rs)
//!     → transport.rs (pooled hyper client)
//!     → upstream service
//! ```
//!
//! # Design Decisions
//! - Exactly one target, fixed at startup
//! - Plain HTTP only

pub mod target;
pub mod transport;

pub use target::{Target, TargetError};
pub use transport::UpstreamClient;
