//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, graceful shutdown)
//!     → mirror::handler (build the report)
//!     → response.rs (security headers, JSON error bodies)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use server::{build_router, HttpServer};
