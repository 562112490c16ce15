//! Connection upgrade (WebSocket) forwarding.
//!
//! The upgrade handshake is replayed against the upstream over a dedicated
//! HTTP/1 connection. Once the upstream answers `101 Switching Protocols`,
//! both upgraded streams are spliced until either side closes or the session
//! is cancelled.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::Empty;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::routing::Route;

/// True when the request asks to switch protocols.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    connection_upgrade && headers.contains_key(header::UPGRADE)
}

fn bad_gateway(route: &Route, reason: &str) -> Response {
    warn!(route = %route.label, port = route.port, %reason, "Upgrade forwarding failed");
    (
        StatusCode::BAD_GATEWAY,
        format!(
            "Bad gateway: {} is not reachable on port {}\n",
            route.label, route.port
        ),
    )
        .into_response()
}

/// Forward an upgrade request to `route` and splice the upgraded streams.
pub async fn forward_upgrade(route: &Route, mut request: Request, cancel: CancellationToken) -> Response {
    let client_upgrade = hyper::upgrade::on(&mut request);

    let stream = match TcpStream::connect(("localhost", route.port)).await {
        Ok(stream) => stream,
        Err(e) => return bad_gateway(route, &e.to_string()),
    };

    let (mut sender, connection) = match http1::handshake(TokioIo::new(stream)).await {
        Ok(parts) => parts,
        Err(e) => return bad_gateway(route, &e.to_string()),
    };

    let label = route.label.clone();
    tokio::spawn(async move {
        if let Err(e) = connection.with_upgrades().await {
            debug!(route = %label, error = %e, "Upstream upgrade connection closed");
        }
    });

    let path_and_query = request
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str())
        .to_string();

    let mut upstream_request = hyper::Request::new(Empty::<Bytes>::new());
    *upstream_request.method_mut() = request.method().clone();
    *upstream_request.uri_mut() = match path_and_query.parse() {
        Ok(uri) => uri,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid request URI\n").into_response(),
    };
    *upstream_request.headers_mut() = request.headers().clone();

    let mut upstream_response = match sender.send_request(upstream_request).await {
        Ok(response) => response,
        Err(e) => return bad_gateway(route, &e.to_string()),
    };

    if upstream_response.status() != StatusCode::SWITCHING_PROTOCOLS {
        debug!(
            route = %route.label,
            status = %upstream_response.status(),
            "Upstream declined the upgrade"
        );
        let (parts, body) = upstream_response.into_parts();
        return Response::from_parts(parts, Body::new(body));
    }

    let upstream_upgrade = hyper::upgrade::on(&mut upstream_response);
    let label = route.label.clone();
    tokio::spawn(async move {
        let (client_io, upstream_io) = match tokio::try_join!(client_upgrade, upstream_upgrade) {
            Ok(pair) => pair,
            Err(e) => {
                debug!(route = %label, error = %e, "Upgrade did not complete");
                return;
            }
        };

        let mut client_io = TokioIo::new(client_io);
        let mut upstream_io = TokioIo::new(upstream_io);

        tokio::select! {
            result = tokio::io::copy_bidirectional(&mut client_io, &mut upstream_io) => {
                match result {
                    Ok((sent, received)) => {
                        debug!(route = %label, sent, received, "Upgraded connection closed");
                    }
                    Err(e) => debug!(route = %label, error = %e, "Upgraded connection failed"),
                }
            }
            () = cancel.cancelled() => {
                debug!(route = %label, "Closing upgraded connection on shutdown");
            }
        }
    });

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    *response.headers_mut() = upstream_response.headers().clone();
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn detects_websocket_upgrade() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(is_upgrade_request(&headers));
    }

    #[test]
    fn plain_requests_are_not_upgrades() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        assert!(!is_upgrade_request(&headers));

        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(!is_upgrade_request(&headers));
    }
}
