use axum::{Json, extract::State};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct ServerStatus {
    pub message: &'static str,
    pub port: u16,
    pub time: String,
}

pub async fn server_status(State(state): State<AppState>) -> Json<ServerStatus> {
    Json(ServerStatus {
        message: "服务器已运行",
        port: state.config().server.port,
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
