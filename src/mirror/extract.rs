//! Field extraction from request parts.
//!
//! Each function reads one aspect of the request and never fails: malformed
//! input produces an empty or lossy value. Multipart parsing is the only
//! fallible step and the caller decides how to degrade.

use std::collections::BTreeMap;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart};
use axum::http::header::{CONTENT_TYPE, COOKIE, HOST};
use axum::http::uri::Authority;
use axum::http::{Extensions, HeaderMap, HeaderName, HeaderValue, Request, Uri};
use serde_json::Value;

use crate::mirror::error::FormError;
use crate::mirror::policy::MirrorPolicy;
use crate::mirror::report::{group_fields, FieldMap, FileInfo, HeaderList};

/// Port the accepting listener is bound to, attached to every request by the
/// server. Used for `SERVER_PORT` when the `Host` header carries no port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerPort(pub u16);

/// Where the request was addressed, as the server observed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub scheme: String,
    /// Authority as sent (`host[:port]`).
    pub host: String,
    pub server_name: String,
    pub server_port: u16,
}

impl RequestTarget {
    /// Resolve from the URI authority (HTTP/2, absolute-form) or the Host header.
    ///
    /// A port missing from the authority falls back to the listener's port,
    /// then to the scheme default.
    pub fn resolve(uri: &Uri, headers: &HeaderMap, listener: Option<ListenerPort>) -> Self {
        let scheme = uri.scheme_str().unwrap_or("http").to_ascii_lowercase();
        let default_port = match listener {
            Some(ListenerPort(port)) => port,
            None if scheme == "https" => 443,
            None => 80,
        };

        let authority = uri.authority().cloned().or_else(|| {
            headers
                .get(HOST)
                .and_then(|value| value.to_str().ok())
                .and_then(|host| host.parse::<Authority>().ok())
        });

        match authority {
            Some(authority) => Self {
                host: authority.as_str().to_string(),
                server_name: authority.host().to_string(),
                server_port: authority.port_u16().unwrap_or(default_port),
                scheme,
            },
            None => Self {
                host: "localhost".to_string(),
                server_name: "localhost".to_string(),
                server_port: default_port,
                scheme,
            },
        }
    }

    /// Full URL including the raw path and query string.
    pub fn url(&self, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}://{}{}", self.scheme, self.host, path_and_query)
    }
}

/// How the body is interpreted for `form`, `files` and `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    UrlEncoded,
    Multipart,
    Other,
}

impl BodyKind {
    pub fn detect(content_type: Option<&str>) -> Self {
        let media_type = content_type
            .and_then(|value| value.split(';').next())
            .map(|essence| essence.trim().to_ascii_lowercase());

        match media_type.as_deref() {
            Some("application/x-www-form-urlencoded") => BodyKind::UrlEncoded,
            Some("multipart/form-data") => BodyKind::Multipart,
            _ => BodyKind::Other,
        }
    }
}

/// Lossy text of a header, if present.
pub fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// Headers in arrival order, with the policy deny-list applied.
pub fn collect_headers(headers: &HeaderMap, policy: MirrorPolicy) -> HeaderList {
    let mut list = HeaderList::new();
    for (name, value) in headers {
        if !policy.allows_header(name.as_str()) {
            continue;
        }
        list.append(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
    }
    list
}

/// Query string parameters.
pub fn query_args(uri: &Uri) -> FieldMap<String> {
    parse_urlencoded(uri.query().unwrap_or_default().as_bytes())
}

/// `application/x-www-form-urlencoded` pairs. Undecodable bytes are replaced.
pub fn parse_urlencoded(input: &[u8]) -> FieldMap<String> {
    group_fields(
        url::form_urlencoded::parse(input).map(|(name, value)| (name.into_owned(), value.into_owned())),
    )
}

/// Cookies from every `Cookie` header. A repeated name keeps the last value.
pub fn parse_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .get_all(COOKIE)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .flat_map(|header| {
            header
                .split(';')
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Parse a `multipart/form-data` body into text fields and file metadata.
pub async fn read_multipart(
    content_type: &HeaderValue,
    extensions: &Extensions,
    body: Bytes,
) -> Result<(FieldMap<String>, FieldMap<FileInfo>), FormError> {
    let mut request: Request<Body> = Request::builder()
        .header(CONTENT_TYPE, content_type.clone())
        .body(Body::from(body))?;
    // Carries the body limit set by DefaultBodyLimit.
    *request.extensions_mut() = extensions.clone();

    let mut multipart = Multipart::from_request(request, &()).await?;
    let mut fields = Vec::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_owned) {
            Some(filename) => {
                let content_type = field.content_type().map(str::to_owned);
                let size = field.bytes().await?.len();
                files.push((
                    name,
                    FileInfo {
                        filename,
                        content_type,
                        size,
                    },
                ));
            }
            None => fields.push((name, field.text().await?)),
        }
    }

    Ok((group_fields(fields), group_fields(files)))
}

/// Raw body as text. Empty when the body was consumed as form data.
pub fn body_text(kind: BodyKind, body: &[u8]) -> String {
    match kind {
        BodyKind::UrlEncoded | BodyKind::Multipart => String::new(),
        BodyKind::Other => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Parsed JSON body, only for a `Content-Type` of exactly `application/json`.
pub fn parse_json(content_type: Option<&str>, body: &[u8]) -> Option<Value> {
    if content_type != Some("application/json") {
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "Declared JSON body did not parse");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_target_from_host_header() {
        let uri: Uri = "/mirror?x=1".parse().unwrap();
        let map = headers(&[("host", "example.com:8080")]);
        let target = RequestTarget::resolve(&uri, &map, Some(ListenerPort(5000)));
        assert_eq!(target.scheme, "http");
        assert_eq!(target.server_name, "example.com");
        assert_eq!(target.server_port, 8080);
        assert_eq!(target.url(&uri), "http://example.com:8080/mirror?x=1");
    }

    #[test]
    fn test_target_from_absolute_uri() {
        let uri: Uri = "https://api.example.com/mirror".parse().unwrap();
        let map = headers(&[("host", "ignored.example")]);
        let target = RequestTarget::resolve(&uri, &map, None);
        assert_eq!(target.scheme, "https");
        assert_eq!(target.server_port, 443);
        assert_eq!(target.url(&uri), "https://api.example.com/mirror");
    }

    #[test]
    fn test_target_without_host() {
        let uri: Uri = "/mirror".parse().unwrap();
        let target = RequestTarget::resolve(&uri, &HeaderMap::new(), None);
        assert_eq!(target.url(&uri), "http://localhost/mirror");
        assert_eq!(target.server_port, 80);
    }

    #[test]
    fn test_target_port_falls_back_to_listener() {
        let uri: Uri = "/mirror".parse().unwrap();
        let map = headers(&[("host", "example.com")]);

        let target = RequestTarget::resolve(&uri, &map, Some(ListenerPort(5000)));
        assert_eq!(target.server_name, "example.com");
        assert_eq!(target.server_port, 5000);
        assert_eq!(target.url(&uri), "http://example.com/mirror");

        assert_eq!(RequestTarget::resolve(&uri, &map, None).server_port, 80);
    }

    #[test]
    fn test_body_kind_detection() {
        assert_eq!(
            BodyKind::detect(Some("application/x-www-form-urlencoded; charset=utf-8")),
            BodyKind::UrlEncoded
        );
        assert_eq!(
            BodyKind::detect(Some("Multipart/Form-Data; boundary=abc")),
            BodyKind::Multipart
        );
        assert_eq!(BodyKind::detect(Some("application/json")), BodyKind::Other);
        assert_eq!(BodyKind::detect(None), BodyKind::Other);
    }

    #[test]
    fn test_collect_headers_applies_policy() {
        let map = headers(&[
            ("x-forwarded-for", "1.2.3.4"),
            ("accept", "*/*"),
            ("x-trace", "a"),
            ("x-trace", "b"),
        ]);

        let strict = collect_headers(&map, MirrorPolicy::Strict);
        assert_eq!(strict.get("x-forwarded-for"), None);
        assert_eq!(strict.get("x-trace"), Some("a, b"));

        let permissive = collect_headers(&map, MirrorPolicy::Permissive);
        assert_eq!(permissive.get("X-Forwarded-For"), Some("1.2.3.4"));
        assert_eq!(permissive.len(), 3);
    }

    #[test]
    fn test_query_args() {
        let uri: Uri = "/mirror?x=1&y=two&x=2&empty=&space=a+b%21".parse().unwrap();
        assert_eq!(
            serde_json::to_value(query_args(&uri)).unwrap(),
            json!({"x": ["1", "2"], "y": "two", "empty": "", "space": "a b!"})
        );

        let bare: Uri = "/mirror".parse().unwrap();
        assert!(query_args(&bare).is_empty());
    }

    #[test]
    fn test_parse_cookies() {
        let map = headers(&[
            ("cookie", "session=abc; theme=\"dark\""),
            ("cookie", "session=def;broken;=nameless"),
        ]);
        let cookies = parse_cookies(&map);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies["session"], "def");
        assert_eq!(cookies["theme"], "dark");
    }

    #[test]
    fn test_parse_cookies_keeps_pairs_beside_non_utf8_bytes() {
        let mut map = HeaderMap::new();
        map.insert(COOKIE, HeaderValue::from_bytes(b"session=abc; name=caf\xe9").unwrap());
        let cookies = parse_cookies(&map);
        assert_eq!(cookies["session"], "abc");
        assert_eq!(cookies["name"], "caf\u{FFFD}");
    }

    #[test]
    fn test_body_text_is_lossy() {
        let text = body_text(BodyKind::Other, b"ok \xff\xfe");
        assert!(text.starts_with("ok "));
        assert!(text.contains('\u{FFFD}'));
        assert_eq!(body_text(BodyKind::UrlEncoded, b"a=1"), "");
    }

    #[test]
    fn test_parse_json_requires_exact_content_type() {
        let body = br#"{"a":1}"#;
        assert_eq!(parse_json(Some("application/json"), body), Some(json!({"a": 1})));
        assert_eq!(parse_json(Some("text/plain"), body), None);
        assert_eq!(parse_json(Some("application/json; charset=utf-8"), body), None);
        assert_eq!(parse_json(None, body), None);
        assert_eq!(parse_json(Some("application/json"), b"not-json"), None);
    }

    #[tokio::test]
    async fn test_read_multipart() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
            "hello\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"upload\"; filename=\"notes.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "0123456789\r\n",
            "--XBOUNDARY--\r\n",
        );
        let content_type = HeaderValue::from_static("multipart/form-data; boundary=XBOUNDARY");

        let (form, files) = read_multipart(&content_type, &Extensions::new(), Bytes::from(body))
            .await
            .unwrap();

        assert_eq!(serde_json::to_value(&form).unwrap(), json!({"title": "hello"}));
        assert_eq!(
            serde_json::to_value(&files).unwrap(),
            json!({"upload": {"filename": "notes.txt", "content_type": "text/plain", "size": 10}})
        );
    }

    #[tokio::test]
    async fn test_read_multipart_malformed() {
        let content_type = HeaderValue::from_static("multipart/form-data; boundary=XBOUNDARY");
        let result =
            read_multipart(&content_type, &Extensions::new(), Bytes::from_static(b"garbage")).await;
        assert!(result.is_err());

        let no_boundary = HeaderValue::from_static("multipart/form-data");
        let result = read_multipart(&no_boundary, &Extensions::new(), Bytes::new()).await;
        assert!(matches!(result, Err(FormError::Rejection(_))));
    }

    #[test]
    fn test_header_text() {
        let map = headers(&[("referer", "https://example.com/page")]);
        assert_eq!(
            header_text(&map, axum::http::header::REFERER).as_deref(),
            Some("https://example.com/page")
        );
        assert_eq!(header_text(&map, axum::http::header::USER_AGENT), None);
    }
}
