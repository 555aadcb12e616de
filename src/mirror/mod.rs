//! Request mirroring subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (/mirror)
//!     → handler.rs (buffer body, capture timestamp)
//!     → extract.rs (headers, args, cookies, form, files, json, url)
//!     → environ.rs (request context variables, serializable subset)
//!     → policy.rs (strip client-identifying fields in strict mode)
//!     → report.rs (MirrorReport, serialized to JSON)
//! ```
//!
//! # Design Decisions
//! - Every field is extracted independently; one failing field never
//!   aborts the others
//! - Decode failures degrade to empty/null values, never to a 5xx
//! - No state survives the request

pub mod environ;
pub mod error;
pub mod extract;
pub mod handler;
pub mod policy;
pub mod report;

pub use error::MirrorError;
pub use extract::ListenerPort;
pub use handler::{mirror_handler, MirrorState};
pub use policy::MirrorPolicy;
pub use report::MirrorReport;
