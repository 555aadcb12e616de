//! Server and request context variables (`environ`).
//!
//! The context is a gateway-style variable set (`REQUEST_METHOD`,
//! `HTTP_<NAME>`, ...) plus a few server entries. Values are typed; only
//! strings, numbers, booleans, lists and maps make it into the report.
//! Opaque handles (connection socket, body stream) are always dropped.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, Uri, Version};
use serde_json::Value;

use crate::mirror::extract::RequestTarget;
use crate::mirror::policy::MirrorPolicy;

/// Value reported as `SERVER_SOFTWARE`.
pub const SERVER_SOFTWARE: &str = concat!("http-mirror/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ContextValue>),
    Map(BTreeMap<String, ContextValue>),
    /// A live resource; never serializable.
    Handle(&'static str),
}

impl ContextValue {
    /// JSON form of the value, or `None` if it is (or contains) a handle.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            ContextValue::Str(s) => Some(Value::String(s.clone())),
            ContextValue::Int(i) => Some(Value::from(*i)),
            ContextValue::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
            ContextValue::Bool(b) => Some(Value::Bool(*b)),
            ContextValue::List(items) => items
                .iter()
                .map(ContextValue::to_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            ContextValue::Map(entries) => entries
                .iter()
                .map(|(key, value)| value.to_json().map(|json| (key.clone(), json)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
            ContextValue::Handle(_) => None,
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Str(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Str(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

/// What the server knows about one request beyond its headers and body.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub version: Version,
    pub headers: &'a HeaderMap,
    pub target: &'a RequestTarget,
    pub peer: Option<SocketAddr>,
}

/// Context variables for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    vars: BTreeMap<String, ContextValue>,
}

impl RequestContext {
    pub fn capture(info: &RequestInfo<'_>) -> Self {
        let mut ctx = Self::default();
        let raw_uri = info
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        ctx.set("REQUEST_METHOD", info.method.as_str());
        ctx.set("SCRIPT_NAME", "");
        ctx.set("PATH_INFO", info.uri.path());
        ctx.set("QUERY_STRING", info.uri.query().unwrap_or_default());
        ctx.set("REQUEST_URI", raw_uri);
        ctx.set("RAW_URI", raw_uri);
        ctx.set("SERVER_NAME", info.target.server_name.as_str());
        ctx.set("SERVER_PORT", info.target.server_port.to_string());
        ctx.set("SERVER_PROTOCOL", format!("{:?}", info.version));
        ctx.set("SERVER_SOFTWARE", SERVER_SOFTWARE);

        if let Some(peer) = info.peer {
            ctx.set("REMOTE_ADDR", peer.ip().to_string());
            ctx.set("REMOTE_PORT", peer.port().to_string());
        }

        for (name, value) in info.headers {
            let key = if *name == CONTENT_TYPE {
                "CONTENT_TYPE".to_string()
            } else if *name == CONTENT_LENGTH {
                "CONTENT_LENGTH".to_string()
            } else {
                format!(
                    "HTTP_{}",
                    name.as_str().to_ascii_uppercase().replace('-', "_")
                )
            };
            let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
            match ctx.vars.entry(key) {
                Entry::Occupied(mut entry) => {
                    if let ContextValue::Str(joined) = entry.get_mut() {
                        joined.push_str(", ");
                        joined.push_str(&text);
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(ContextValue::Str(text));
                }
            }
        }

        ctx.set("mirror.url_scheme", info.target.scheme.as_str());
        ctx.set(
            "mirror.version",
            ContextValue::List(vec![ContextValue::Int(1), ContextValue::Int(0)]),
        );
        ctx.set("mirror.multithread", true);
        ctx.set("mirror.multiprocess", false);
        ctx.set("mirror.run_once", false);
        ctx.set("mirror.input", ContextValue::Handle("request body stream"));
        ctx.set("mirror.errors", ContextValue::Handle("error stream"));
        ctx.set("mirror.socket", ContextValue::Handle("connection socket"));

        ctx
    }

    pub fn set(&mut self, key: &str, value: impl Into<ContextValue>) {
        self.vars.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.vars.get(key)
    }

    /// Serializable entries allowed by the policy.
    pub fn into_environ(self, policy: MirrorPolicy) -> BTreeMap<String, Value> {
        self.vars
            .into_iter()
            .filter(|(key, _)| policy.allows_environ_key(key))
            .filter_map(|(key, value)| value.to_json().map(|json| (key, json)))
            .collect()
    }
}
