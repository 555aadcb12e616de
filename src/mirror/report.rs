//! The JSON document returned by `/mirror`.

use std::collections::BTreeMap;

use chrono::{Local, SecondsFormat};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// A value that appeared once, or a list of values in arrival order.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Append a repeated value, promoting a single value to a list.
    pub fn push(self, value: T) -> Self {
        match self {
            OneOrMany::One(first) => OneOrMany::Many(vec![first, value]),
            OneOrMany::Many(mut values) => {
                values.push(value);
                OneOrMany::Many(values)
            }
        }
    }
}

/// Field name → value(s), as used for `args`, `form` and `files`.
pub type FieldMap<T> = BTreeMap<String, OneOrMany<T>>;

/// Group `(name, value)` pairs by name. Repeated names become lists.
pub fn group_fields<T, I>(pairs: I) -> FieldMap<T>
where
    I: IntoIterator<Item = (String, T)>,
{
    let mut fields = FieldMap::new();
    for (name, value) in pairs {
        let grouped = match fields.remove(&name) {
            Some(existing) => existing.push(value),
            None => OneOrMany::One(value),
        };
        fields.insert(name, grouped);
    }
    fields
}

/// Request headers in arrival order, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header. A repeated name is joined onto the first occurrence.
    pub fn append(&mut self, name: &str, value: &str) {
        match self.0.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, joined)) => {
                joined.push_str(", ");
                joined.push_str(value);
            }
            None => self.0.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for HeaderList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Metadata of one uploaded file. The content itself is never mirrored.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub content_type: Option<String>,
    pub size: usize,
}

/// Client address section, only present in permissive mode.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClientAddr {
    pub remote_addr: Option<String>,
}

/// Everything the server observed about one request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MirrorReport {
    pub datetime: String,
    pub method: String,
    pub url: String,
    pub headers: HeaderList,
    pub args: FieldMap<String>,
    pub form: FieldMap<String>,
    pub data: String,
    pub cookies: BTreeMap<String, String>,
    pub files: FieldMap<FileInfo>,
    pub json: Option<Value>,
    pub referrer: Option<String>,
    #[serde(flatten)]
    pub client: Option<ClientAddr>,
    pub scheme: String,
    pub user_agent: String,
    pub environ: BTreeMap<String, Value>,
}

/// Current local time as RFC 3339 with microseconds and a numeric offset.
pub fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
