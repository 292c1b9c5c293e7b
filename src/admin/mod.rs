//! Plain HTTP surface served next to the RPC surface.
//!
//! # Routes
//! - `GET /`: liveness and version
//! - `GET /ops/status`: serving domain and certificate window, behind the ops token

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use self::auth::ops_auth_middleware;
use self::handlers::{get_ops_status, get_status};
use crate::tls::MaterialStore;

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<MaterialStore>,
    pub ops_token: Arc<str>,
    pub image_tag: Option<String>,
}

pub fn router(state: AdminState) -> Router {
    let ops = Router::new()
        .route("/ops/status", get(get_ops_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            ops_auth_middleware,
        ));

    Router::new()
        .route("/", get(get_status))
        .merge(ops)
        .with_state(state)
}
