//! Connection recycling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection → fresh RequestCounter (counter.rs)
//!
//! Per request:
//!     → RequestInterceptor (rewrite to target, increment counter)
//!     → upstream call
//!     → ResponseInterceptor (read counter, compare with RecyclePolicy,
//!       set `Connection: close` at or above the threshold)
//! ```
//!
//! # Design Decisions
//! - The threshold is an immutable value handed to the interceptors at construction
//! - Closure is decided on the response side, after the request is fully served
//! - A request without connection context is forwarded but never counted

pub mod counter;
pub mod interceptor;
pub mod policy;

pub use counter::RequestCounter;
pub use interceptor::{RequestInterceptor, ResponseInterceptor};
pub use policy::RecyclePolicy;
