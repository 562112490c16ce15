//! Plain HTTP forwarding to a routed upstream.
//!
//! Requests are replayed against `http://localhost:<port>` with the original
//! method, path, query, headers and a streamed body. Responses are streamed
//! back with their status and headers. Redirects are passed through, never
//! followed.

use axum::{
    body::{Body, HttpBody},
    extract::Request,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::Client;
use tracing::{debug, warn};

use crate::routing::Route;

/// Headers that should NOT be forwarded (hop-by-hop headers).
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Check if a header should be forwarded.
pub(crate) fn should_forward_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !HOP_BY_HOP_HEADERS.contains(&lower.as_str())
}

fn copy_end_to_end_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if should_forward_header(name.as_str()) {
            to.append(name.clone(), value.clone());
        }
    }
}

/// Upstream URL for a request path and query.
pub(crate) fn upstream_url(port: u16, path_and_query: &str) -> String {
    format!("http://localhost:{port}{path_and_query}")
}

/// Forward a request to `route` and stream the response back.
///
/// Returns 502 when the upstream cannot be reached, which is expected while
/// a freshly started target is still booting.
pub async fn forward_request(client: &Client, route: &Route, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    let url = upstream_url(route.port, path_and_query);

    debug!(route = %route.label, method = %parts.method, %url, "Forwarding request");

    let mut headers = HeaderMap::new();
    copy_end_to_end_headers(&parts.headers, &mut headers);

    let mut builder = client.request(parts.method.clone(), url.as_str()).headers(headers);
    if !body.is_end_stream() {
        builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let upstream = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(route = %route.label, port = route.port, error = %e, "Upstream unreachable");
            return (
                StatusCode::BAD_GATEWAY,
                format!(
                    "Bad gateway: {} is not reachable on port {}\n",
                    route.label, route.port
                ),
            )
                .into_response();
        }
    };

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    copy_end_to_end_headers(upstream.headers(), &mut response_headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}
