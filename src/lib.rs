//! Connection-recycling reverse proxy.
//!
//! Forwards every request to one fixed upstream and counts the requests
//! served on each client connection. Once a connection reaches the configured
//! threshold, the response carries `Connection: close` and the connection is
//! closed after it is flushed, so long-lived clients reconnect and can land on
//! a different backend instance.
//!
//! # Architecture Overview
//!
//! ```text
//!  Client ──▶ net::listener ──▶ http::server ──▶ recycle::RequestInterceptor ──▶ upstream ──▶ Backend
//!             (fresh counter     (context in      (rewrite, count)                 (pooled
//!              per connection)    extensions)                                      client)
//!  Client ◀── hyper closes ◀──── recycle::ResponseInterceptor ◀────────────────────────────────┘
//!             if marked          (`Connection: close` at threshold)
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod recycle;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
