//! RPC surface placeholder.
//!
//! # Responsibilities
//! - Own the `/{service}/{method}` namespace on the multiplexed listener
//! - Answer every call with a well-formed gRPC status until real services are embedded
//!
//! # Design Decisions
//! - Trailers-only responses: HTTP 200 with `grpc-status` in the headers, no body
//! - Registered services answer UNIMPLEMENTED per method; unknown services likewise,
//!   with a message naming the service

use axum::extract::Path;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;

/// Services the control plane registers on the shared transport.
pub const SERVICES: [&str; 4] = [
    "pb.ControlServices",
    "pb.ControlManagement",
    "pb.FlowTopReporter",
    "grpc.reflection.v1alpha.ServerReflection",
];

/// gRPC status codes used here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Code {
    Unimplemented = 12,
}

/// Trailers-only gRPC response.
#[derive(Debug, Clone)]
pub struct Status {
    code: Code,
    message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }
}

impl IntoResponse for Status {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
        headers.insert(
            HeaderName::from_static("grpc-status"),
            HeaderValue::from(self.code as u16),
        );
        if let Ok(message) = HeaderValue::from_str(&percent_encode(&self.message)) {
            headers.insert(HeaderName::from_static("grpc-message"), message);
        }
        (StatusCode::OK, headers).into_response()
    }
}

/// Encode a `grpc-message` value: printable ASCII except `%` passes through.
fn percent_encode(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for byte in message.bytes() {
        if (0x20..=0x7e).contains(&byte) && byte != b'%' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

async fn unimplemented(Path((service, method)): Path<(String, String)>) -> Status {
    if SERVICES.contains(&service.as_str()) {
        tracing::debug!(service = %service, method = %method, "RPC method not implemented");
        Status::unimplemented(format!("method {} not implemented", method))
    } else {
        tracing::debug!(service = %service, "Unknown RPC service");
        Status::unimplemented(format!("unknown service {}", service))
    }
}

/// Router answering every RPC with UNIMPLEMENTED.
pub fn router() -> Router {
    Router::new().route("/{service}/{method}", any(unimplemented))
}
