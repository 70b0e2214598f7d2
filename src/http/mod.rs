//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection (with its ConnectionContext)
//!     → server.rs (hyper HTTP/1.1 connection, context added to each request)
//!     → request interceptor (count, rewrite to target)
//!     → request.rs (hop-by-hop headers, X-Forwarded-For)
//!     → upstream client
//!     → response.rs (hop-by-hop headers, 502 on failure)
//!     → response interceptor (`Connection: close` at threshold)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
