use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::er::ErModel;
use crate::web::error::ApiError;
use crate::web::state::AppState;

// Query types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSqlRequest {
    // Kept raw so an empty object can be told apart from an empty model
    pub er_diagram_data: Option<Value>,
    pub query_description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateSqlResponse {
    pub sql: String,
}

// System status

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
    pub version: String,
    pub uptime_seconds: i64,
}

// API Implementations

pub async fn generate_sql(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<GenerateSqlRequest>, JsonRejection>,
) -> Result<Json<GenerateSqlResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        debug!("Rejected request body: {}", rejection);
        ApiError::bad_request(rejection.body_text())
    })?;

    let description = payload
        .query_description
        .filter(|description| !description.trim().is_empty());
    let model = payload.er_diagram_data.filter(|data| !is_empty_data(data));
    let (Some(model), Some(description)) = (model, description) else {
        return Err(ApiError::bad_request("Missing required data"));
    };
    let model: ErModel = serde_json::from_value(model).map_err(|e| {
        debug!("Rejected ER model: {}", e);
        ApiError::bad_request(format!("Invalid erDiagramData: {}", e))
    })?;

    let start_time = Instant::now();
    info!(
        "Generating SQL for {} entities and {} relationships: {}",
        model.entities.len(),
        model.relationships.len(),
        description
    );

    let sql = app_state.synthesizer.generate(&model, &description).await;

    info!("SQL generated in {}ms", start_time.elapsed().as_millis());
    Ok(Json(GenerateSqlResponse { sql }))
}

fn is_empty_data(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

pub async fn health_check(State(app_state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        message: "Backend server is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: app_state.uptime_seconds(),
    })
}
