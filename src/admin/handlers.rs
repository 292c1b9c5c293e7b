use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use super::AdminState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize, serde::Deserialize, PartialEq)]
pub struct OpsStatus {
    pub domain: String,
    pub not_before: i64,
    pub not_after: i64,
    pub image_tag: Option<String>,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

/// Certificate window as unix seconds; 503 until material is installed.
pub async fn get_ops_status(
    State(state): State<AdminState>,
) -> Result<Json<OpsStatus>, StatusCode> {
    let snapshot = state.store.get().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let certificate = snapshot.certificate();

    Ok(Json(OpsStatus {
        domain: certificate.domain().to_string(),
        not_before: certificate.not_before().unix_timestamp(),
        not_after: certificate.not_after().unix_timestamp(),
        image_tag: state.image_tag.clone(),
    }))
}
