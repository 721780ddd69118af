//! Upgrade an axum request into a [`SocketIo`] connection.
//!
//! ```ignore
//! async fn ws_handler(ws: SocketIoUpgrade) -> impl IntoResponse {
//!     ws.on_upgrade(16, |socket| async move { /* ... */ })
//! }
//! ```

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use sha1::{Digest, Sha1};
use std::future::Future;
use thiserror::Error;

pub use linkngo_io::{error, Emitter, Event, SocketIo};

const WEBSOCKET_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Extractor for the WebSocket opening handshake.
pub struct SocketIoUpgrade {
    key: HeaderValue,
    origin: Option<HeaderValue>,
    on_upgrade: OnUpgrade,
}

#[derive(Debug, Error)]
pub enum UpgradeRejection {
    #[error("request method must be `GET`")]
    MethodNotGet,
    #[error("`Connection` header did not include `upgrade`")]
    InvalidConnectionHeader,
    #[error("`Upgrade` header did not include `websocket`")]
    InvalidUpgradeHeader,
    #[error("`Sec-WebSocket-Version` header did not include `13`")]
    InvalidWebSocketVersionHeader,
    #[error("`Sec-WebSocket-Key` header missing")]
    WebSocketKeyHeaderMissing,
    #[error("connection is not upgradable")]
    ConnectionNotUpgradable,
}

impl UpgradeRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            UpgradeRejection::MethodNotGet => StatusCode::METHOD_NOT_ALLOWED,
            UpgradeRejection::ConnectionNotUpgradable => StatusCode::UPGRADE_REQUIRED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for UpgradeRejection {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SocketIoUpgrade
where
    S: Send + Sync,
{
    type Rejection = UpgradeRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if parts.method != Method::GET {
            return Err(UpgradeRejection::MethodNotGet);
        }
        if !header_contains(&parts.headers, header::CONNECTION, "upgrade") {
            return Err(UpgradeRejection::InvalidConnectionHeader);
        }
        if !header_eq(&parts.headers, header::UPGRADE, "websocket") {
            return Err(UpgradeRejection::InvalidUpgradeHeader);
        }
        if !header_eq(&parts.headers, header::SEC_WEBSOCKET_VERSION, "13") {
            return Err(UpgradeRejection::InvalidWebSocketVersionHeader);
        }
        let key = parts
            .headers
            .get(header::SEC_WEBSOCKET_KEY)
            .cloned()
            .ok_or(UpgradeRejection::WebSocketKeyHeaderMissing)?;
        let on_upgrade = parts
            .extensions
            .remove::<OnUpgrade>()
            .ok_or(UpgradeRejection::ConnectionNotUpgradable)?;

        Ok(Self {
            key,
            origin: parts.headers.get(header::ORIGIN).cloned(),
            on_upgrade,
        })
    }
}

impl SocketIoUpgrade {
    /// The `Origin` header sent by the client, if any.
    pub fn origin(&self) -> Option<&HeaderValue> {
        self.origin.as_ref()
    }

    /// Completes the handshake and runs `callback` once the connection is
    /// upgraded. `buffer` is the capacity of the outbound event queue.
    pub fn on_upgrade<F, Fut>(self, buffer: usize, callback: F) -> Response
    where
        F: FnOnce(SocketIo) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let on_upgrade = self.on_upgrade;
        tokio::spawn(async move {
            let upgraded = match on_upgrade.await {
                Ok(upgraded) => upgraded,
                Err(err) => {
                    tracing::warn!(%err, "websocket upgrade failed");
                    return;
                }
            };
            let (reader, writer) = tokio::io::split(TokioIo::new(upgraded));
            callback(SocketIo::new(reader, writer, buffer)).await;
        });

        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
        let headers = res.headers_mut();
        headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(header::SEC_WEBSOCKET_ACCEPT, sign(self.key.as_bytes()));
        res
    }
}

fn sign(key: &[u8]) -> HeaderValue {
    let mut sha1 = Sha1::default();
    sha1.update(key);
    sha1.update(WEBSOCKET_GUID);
    let accept = STANDARD.encode(sha1.finalize());
    HeaderValue::from_str(&accept).expect("base64 is a valid header value")
}

fn header_eq(headers: &HeaderMap, key: HeaderName, value: &'static str) -> bool {
    headers
        .get(&key)
        .is_some_and(|header| header.as_bytes().eq_ignore_ascii_case(value.as_bytes()))
}

fn header_contains(headers: &HeaderMap, key: HeaderName, value: &'static str) -> bool {
    let Some(header) = headers.get(&key).and_then(|h| h.to_str().ok()) else {
        return false;
    };
    header
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc6455_sample() {
        let accept = sign(b"dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn connection_header_may_list_several_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONNECTION,
            HeaderValue::from_static("keep-alive, Upgrade"),
        );
        headers.insert(header::UPGRADE, HeaderValue::from_static("WebSocket"));

        assert!(header_contains(&headers, header::CONNECTION, "upgrade"));
        assert!(header_eq(&headers, header::UPGRADE, "websocket"));
        assert!(!header_eq(&headers, header::SEC_WEBSOCKET_VERSION, "13"));
    }

    #[test]
    fn rejection_status_codes() {
        assert_eq!(
            UpgradeRejection::MethodNotGet.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            UpgradeRejection::ConnectionNotUpgradable.status(),
            StatusCode::UPGRADE_REQUIRED
        );
        assert_eq!(
            UpgradeRejection::WebSocketKeyHeaderMissing.status(),
            StatusCode::BAD_REQUEST
        );
    }
}
