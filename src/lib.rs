//! HTTP request mirror library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mirror;
pub mod observability;

pub use config::MirrorConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use mirror::MirrorReport;
