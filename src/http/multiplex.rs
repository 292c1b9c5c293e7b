//! Dispatch between the RPC and application routers.
//!
//! # Responsibilities
//! - Evaluate the routing decision for every request
//! - Hand the request to exactly one of the two routers
//! - Count requests by route

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::routing::future::RouteFuture;
use axum::Router;
use std::convert::Infallible;
use std::task::{Context, Poll};
use tower::Service;

use crate::http::request;
use crate::observability::metrics;
use crate::routing::RouteDecision;

/// `tower::Service` that routes each request by [`RouteDecision`].
#[derive(Clone)]
pub struct Multiplexer {
    rpc: Router,
    app: Router,
}

impl Multiplexer {
    pub fn new(rpc: Router, app: Router) -> Self {
        Self { rpc, app }
    }

    /// Single router serving both surfaces, with request IDs and tracing.
    pub fn into_router(self) -> Router {
        request::instrument(Router::new().fallback_service(self))
    }
}

impl Service<Request<Body>> for Multiplexer {
    type Response = Response;
    type Error = Infallible;
    type Future = RouteFuture<Infallible>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Both routers are always ready.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let decision = RouteDecision::for_request(&request);
        metrics::record_route(decision.label());
        tracing::trace!(
            route = decision.label(),
            path = %request.uri().path(),
            "Dispatching request"
        );

        if decision.is_rpc {
            self.rpc.call(request)
        } else {
            self.app.call(request)
        }
    }
}
