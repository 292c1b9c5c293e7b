//! Per-request protocol routing decision.
//!
//! # Responsibilities
//! - Classify a request as RPC or plain HTTP
//!
//! # Design Decisions
//! - RPC requires HTTP/2 AND a content type starting with `application/grpc`
//! - Evaluated per request, not per connection
//! - Pure function of (version, content-type): repeated evaluation is stable
//! - Prefix match is case-sensitive, as RPC clients send it verbatim

use axum::http::{header, HeaderMap, Request, Version};

/// Media-type prefix reserved by the RPC framework.
pub const RPC_CONTENT_TYPE_PREFIX: &str = "application/grpc";

/// Which handler a request is dispatched to. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteDecision {
    pub is_rpc: bool,
}

impl RouteDecision {
    /// Evaluate the routing rule.
    pub fn evaluate(version: Version, headers: &HeaderMap) -> Self {
        let rpc_content = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with(RPC_CONTENT_TYPE_PREFIX))
            .unwrap_or(false);

        Self {
            is_rpc: version == Version::HTTP_2 && rpc_content,
        }
    }

    pub fn for_request<B>(req: &Request<B>) -> Self {
        Self::evaluate(req.version(), req.headers())
    }

    /// Metric and log label.
    pub fn label(&self) -> &'static str {
        if self.is_rpc {
            "rpc"
        } else {
            "http"
        }
    }
}
