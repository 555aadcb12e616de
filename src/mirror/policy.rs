//! Report filtering policy.
//!
//! # Modes
//! - `Strict`: strips the `X-Forwarded-For` header, client address and
//!   server software from the report; security response headers attached
//! - `Permissive`: mirrors everything, no extra response headers
//!
//! Permissive mode exposes client and proxy IP addresses to whoever can
//! read the response.

/// Headers removed from `headers` in strict mode (case-insensitive).
pub const STRIPPED_HEADERS: &[&str] = &["x-forwarded-for"];

/// Context keys removed from `environ` in strict mode.
pub const STRIPPED_ENVIRON_KEYS: &[&str] = &[
    "REMOTE_ADDR",
    "REMOTE_PORT",
    "SERVER_SOFTWARE",
    "HTTP_X_FORWARDED_FOR",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorPolicy {
    #[default]
    Strict,
    Permissive,
}

impl MirrorPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            MirrorPolicy::Strict
        } else {
            MirrorPolicy::Permissive
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, MirrorPolicy::Strict)
    }

    pub fn allows_header(&self, name: &str) -> bool {
        !self.is_strict()
            || !STRIPPED_HEADERS
                .iter()
                .any(|stripped| stripped.eq_ignore_ascii_case(name))
    }

    pub fn allows_environ_key(&self, key: &str) -> bool {
        !self.is_strict() || !STRIPPED_ENVIRON_KEYS.contains(&key)
    }

    /// Whether `remote_addr` appears in the report at all.
    pub fn exposes_remote_addr(&self) -> bool {
        !self.is_strict()
    }
}
