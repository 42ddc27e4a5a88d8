//! Model listing: the union of canonical models resolvable by the router.

use axum::{
    Json,
    extract::{Path, State},
};
use http::HeaderMap;
use serde::Serialize;

use crate::{AppState, error::GatewayError};

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: String,
}

pub async fn list_models(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ModelList>, GatewayError> {
    state.authenticator.authenticate_request(&headers).await?;

    let created = state.model_router.config_loaded_at();
    let data = state
        .model_router
        .known_models()
        .into_iter()
        .map(|(id, owned_by)| ModelEntry {
            id,
            object: "model",
            created,
            owned_by,
        })
        .collect();

    Ok(Json(ModelList {
        object: "list",
        data,
    }))
}

pub async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ModelEntry>, GatewayError> {
    state.authenticator.authenticate_request(&headers).await?;

    if !state.model_router.is_known_model(&id) {
        return Err(GatewayError::UnknownModel(id));
    }

    let owned_by = state
        .model_router
        .resolve(&id, None)
        .map(|candidates| candidates[0].clone())
        .unwrap_or_else(|_| "palisade".to_string());

    Ok(Json(ModelEntry {
        id,
        object: "model",
        created: state.model_router.config_loaded_at(),
        owned_by,
    }))
}
