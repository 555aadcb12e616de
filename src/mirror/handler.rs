//! The `/mirror` request handler.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{CONTENT_TYPE, REFERER, USER_AGENT};
use axum::http::{Extensions, HeaderMap, HeaderValue, Method, Uri, Version};
use axum::response::{IntoResponse, Response};

use crate::config::SecurityConfig;
use crate::mirror::environ::{RequestContext, RequestInfo};
use crate::mirror::error::MirrorError;
use crate::mirror::extract::{
    body_text, collect_headers, header_text, parse_cookies, parse_json, parse_urlencoded,
    query_args, read_multipart, BodyKind, ListenerPort, RequestTarget,
};
use crate::mirror::policy::MirrorPolicy;
use crate::mirror::report::{timestamp, ClientAddr, FieldMap, FileInfo, MirrorReport};

/// Immutable state shared by every mirror request.
#[derive(Debug, Clone, Default)]
pub struct MirrorState {
    pub policy: MirrorPolicy,
}

impl MirrorState {
    pub fn new(security: &SecurityConfig) -> Self {
        Self {
            policy: MirrorPolicy::from_strict_flag(security.strict_headers),
        }
    }
}

/// Reflect the request back as a JSON [`MirrorReport`].
pub async fn mirror_handler(
    State(state): State<MirrorState>,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, MirrorError> {
    let datetime = timestamp();

    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let listener = extensions.get::<ListenerPort>().copied();

    tracing::debug!(
        method = %method,
        uri = %uri,
        "Mirroring request"
    );

    match body {
        Ok(body) => {
            let target = RequestTarget::resolve(&uri, &headers, listener);
            let info = RequestInfo {
                method: &method,
                uri: &uri,
                version,
                headers: &headers,
                target: &target,
                peer,
            };
            let report = build_report(state.policy, datetime, &info, &extensions, body).await;
            render(&report)
        }
        Err(rejection) => Err(MirrorError::from(rejection)),
    }
}

fn render(report: &MirrorReport) -> Result<Response, MirrorError> {
    let json = serde_json::to_vec(report)?;
    Ok((
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        json,
    )
        .into_response())
}

async fn build_report(
    policy: MirrorPolicy,
    datetime: String,
    info: &RequestInfo<'_>,
    extensions: &Extensions,
    body: Bytes,
) -> MirrorReport {
    let content_type = header_text(info.headers, CONTENT_TYPE);
    let kind = BodyKind::detect(content_type.as_deref());

    let (form, files) = match (kind, info.headers.get(CONTENT_TYPE)) {
        (BodyKind::UrlEncoded, _) => (parse_urlencoded(&body), FieldMap::new()),
        (BodyKind::Multipart, Some(raw_content_type)) => {
            match read_multipart(raw_content_type, extensions, body.clone()).await {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::debug!(error = %e, "Multipart body did not parse");
                    (FieldMap::new(), FieldMap::<FileInfo>::new())
                }
            }
        }
        _ => (FieldMap::new(), FieldMap::new()),
    };

    let client = policy.exposes_remote_addr().then(|| ClientAddr {
        remote_addr: info.peer.map(|peer| peer.ip().to_string()),
    });

    MirrorReport {
        datetime,
        method: info.method.as_str().to_string(),
        url: info.target.url(info.uri),
        headers: collect_headers(info.headers, policy),
        args: query_args(info.uri),
        form,
        data: body_text(kind, &body),
        cookies: parse_cookies(info.headers),
        files,
        json: parse_json(content_type.as_deref(), &body),
        referrer: header_text(info.headers, REFERER),
        client,
        scheme: info.target.scheme.clone(),
        user_agent: header_text(info.headers, USER_AGENT).unwrap_or_default(),
        environ: RequestContext::capture(info).into_environ(policy),
    }
}
