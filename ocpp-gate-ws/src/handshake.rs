//! Gate decision inside the WebSocket server handshake
//!
//! `tokio-tungstenite` hands the parsed upgrade request to a callback before
//! answering it. This module turns that request into a
//! [`HandshakeAttempt`], runs it through the [`UpgradeGate`] and shapes the
//! HTTP answer:
//!
//! - admitted: `101 Switching Protocols` with `Sec-WebSocket-Protocol` set to
//!   the negotiated token
//! - refused: `404`/`400` with an `x-rejection-reason` header and the reason
//!   text as body

use std::net::SocketAddr;

use ocpp_gate_core::{
    negotiate_protocol, parse_protocol_header, EndpointHandler, EndpointRegistry, GateError,
    HandshakeAttempt, IdentityDirectory, UpgradeGate,
};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use tracing::error;

use crate::endpoint::{ConnectionContext, OcppEndpoint};

/// Response header carrying the stable rejection reason
pub const REJECTION_REASON_HEADER: &str = "x-rejection-reason";

/// Attribute key for the peer socket address
pub const REMOTE_ADDRESS_KEY: &str = "remoteAddress";

/// An admitted connection waiting for the upgrade to complete
#[derive(Debug, Clone)]
pub struct Admitted {
    pub endpoint: OcppEndpoint,
    pub context: ConnectionContext,
}

/// Build the gate's view of an upgrade request
pub fn attempt_from_request<H: EndpointHandler>(
    request: &Request,
    registry: &EndpointRegistry<H>,
    peer_addr: Option<SocketAddr>,
) -> HandshakeAttempt {
    // The charge box id comes from the path alone; a query may contain '/'
    let path = request.uri().path();

    let offered = header_tokens(request.headers(), header::SEC_WEBSOCKET_PROTOCOL);
    let extensions = header_tokens(request.headers(), header::SEC_WEBSOCKET_EXTENSIONS);

    let mut attempt = HandshakeAttempt::new(path)
        .with_selected_protocol(negotiate_protocol(&offered, registry))
        .with_extensions(extensions);

    if let Some(addr) = peer_addr {
        attempt.attributes.insert(REMOTE_ADDRESS_KEY, addr.to_string());
    }

    attempt
}

/// Run the gate for one upgrade request
///
/// On success the returned response must be sent as the handshake answer and
/// the [`Admitted`] connection handed to its endpoint once upgraded.
pub fn admit<D: IdentityDirectory>(
    gate: &UpgradeGate<OcppEndpoint, D>,
    request: &Request,
    response: Response,
    peer_addr: Option<SocketAddr>,
) -> Result<(Response, Admitted), ErrorResponse> {
    let attempt = attempt_from_request(request, gate.registry(), peer_addr);
    let admission = gate.upgrade(attempt).map_err(|e| rejection_response(&e))?;

    let response = accept_response(response, admission.protocol())?;
    let admitted = Admitted {
        endpoint: admission.endpoint.clone(),
        context: ConnectionContext {
            charge_box_id: admission.charge_box_id,
            registration_status: admission.registration_status,
            attributes: admission.attempt.attributes,
            peer_addr,
        },
    };

    Ok((response, admitted))
}

/// Confirm the negotiated sub-protocol in the switching-protocols answer
pub fn accept_response(mut response: Response, protocol: &str) -> Result<Response, ErrorResponse> {
    let value = HeaderValue::from_str(protocol).map_err(|e| {
        error!("Negotiated protocol is not a valid header value: {}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, None)
    })?;

    response
        .headers_mut()
        .insert(header::SEC_WEBSOCKET_PROTOCOL, value);
    Ok(response)
}

/// HTTP answer that fails the handshake for a gate rejection
pub fn rejection_response(err: &GateError) -> ErrorResponse {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    let mut response = error_response(status, Some(err.to_string()));

    response.headers_mut().insert(
        REJECTION_REASON_HEADER,
        HeaderValue::from_static(err.reason_code()),
    );
    response
}

fn error_response(status: StatusCode, body: Option<String>) -> ErrorResponse {
    let mut response = ErrorResponse::new(body);
    *response.status_mut() = status;
    response
}

/// Comma-separated tokens across every occurrence of a header
fn header_tokens(headers: &HeaderMap, name: HeaderName) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_protocol_header)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ocpp_gate_core::{MemoryDirectory, OcppVersion, CHARGE_BOX_ID_KEY};

    use crate::session::SessionStore;

    fn gate() -> UpgradeGate<OcppEndpoint, MemoryDirectory> {
        let sessions = SessionStore::new();
        let registry = EndpointRegistry::new(vec![
            OcppEndpoint::new(OcppVersion::V15, sessions.clone()),
            OcppEndpoint::new(OcppVersion::V20, sessions),
        ]);
        UpgradeGate::new(Arc::new(registry), MemoryDirectory::new().with_station("CP42"))
    }

    fn request(uri: &str, protocols: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(protocols) = protocols {
            builder = builder.header(header::SEC_WEBSOCKET_PROTOCOL, protocols);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_attempt_from_request() {
        let gate = gate();
        let mut request = request("/x/CP42?key=1", Some("ocpp1.6, ocpp2.0"));
        request.headers_mut().insert(
            header::SEC_WEBSOCKET_EXTENSIONS,
            HeaderValue::from_static("permessage-deflate; client_max_window_bits"),
        );
        let peer: SocketAddr = "192.0.2.1:40000".parse().unwrap();

        let attempt = attempt_from_request(&request, gate.registry(), Some(peer));

        assert_eq!(attempt.path, "/x/CP42");
        assert_eq!(attempt.selected_protocol.as_deref(), Some("ocpp2.0"));
        assert_eq!(
            attempt.extensions,
            vec!["permessage-deflate; client_max_window_bits".to_string()]
        );
        assert_eq!(attempt.principal, None);
        assert_eq!(attempt.attributes.get(REMOTE_ADDRESS_KEY), Some("192.0.2.1:40000"));
    }

    #[test]
    fn test_admit_sets_protocol_header() {
        let gate = gate();
        let (response, admitted) = admit(
            &gate,
            &request("/x/CP42", Some("ocpp2.0")),
            Response::default(),
            None,
        )
        .unwrap();

        assert_eq!(
            response.headers().get(header::SEC_WEBSOCKET_PROTOCOL).unwrap(),
            "ocpp2.0"
        );
        assert_eq!(admitted.endpoint.version(), OcppVersion::V20);
        assert_eq!(admitted.context.charge_box_id, "CP42");
        assert_eq!(
            admitted.context.attributes.get(CHARGE_BOX_ID_KEY),
            Some("CP42")
        );
    }

    #[test]
    fn test_query_slashes_do_not_pick_the_id() {
        let gate = gate();
        let (_, admitted) = admit(
            &gate,
            &request("/x/CP42?cb=/a/b", Some("ocpp2.0")),
            Response::default(),
            None,
        )
        .unwrap();

        assert_eq!(admitted.context.charge_box_id, "CP42");
        assert_eq!(admitted.context.attributes.charge_box_id(), Some("CP42"));

        let err = admit(
            &gate,
            &request("/x/CP99?next=/x/CP42", Some("ocpp2.0")),
            Response::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_rejections_carry_reason() {
        let gate = gate();

        let cases = [
            ("/x/CP99", Some("ocpp2.0"), StatusCode::NOT_FOUND, "unknown-device"),
            ("/x/CP42", None, StatusCode::BAD_REQUEST, "missing-protocol"),
            ("/x/CP42", Some(""), StatusCode::BAD_REQUEST, "missing-protocol"),
            ("/x/CP42", Some("ocpp1.6"), StatusCode::BAD_REQUEST, "unsupported-protocol"),
        ];

        for (uri, protocols, status, reason) in cases {
            let err = admit(&gate, &request(uri, protocols), Response::default(), None)
                .unwrap_err();

            assert_eq!(err.status(), status, "{}", uri);
            assert_eq!(err.headers().get(REJECTION_REASON_HEADER).unwrap(), reason);
            assert!(err.body().is_some());
        }
    }

    #[test]
    fn test_rejection_body_names_device() {
        let err = rejection_response(&GateError::UnknownDevice {
            charge_box_id: "CP99".into(),
        });

        assert_eq!(
            err.body().as_deref(),
            Some("ChargeBoxId 'CP99' is not recognized")
        );
    }
}
