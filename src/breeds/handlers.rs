use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use crate::breeds::dto::{BreedResponse, BreedSearchParams};
use crate::state::AppState;

pub fn breed_routes() -> Router<AppState> {
    Router::new()
        .route("/breeds", get(list_breeds))
        .route("/breeds/search", get(search_breeds))
        .route("/breeds/:breed_id", get(get_breed))
}

fn upstream_error(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "cat api request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Error fetching cat breeds".into(),
    )
}

#[instrument(skip(state))]
pub async fn list_breeds(
    State(state): State<AppState>,
) -> Result<Json<Vec<BreedResponse>>, (StatusCode, String)> {
    let breeds = state.breeds.all().await.map_err(upstream_error)?;
    Ok(Json(breeds))
}

#[instrument(skip(state))]
pub async fn search_breeds(
    State(state): State<AppState>,
    Query(mut params): Query<BreedSearchParams>,
) -> Result<Json<Vec<BreedResponse>>, (StatusCode, String)> {
    params.limit = Some(params.limit.unwrap_or(10).clamp(1, 100));
    let breeds = state.breeds.search(&params).await.map_err(upstream_error)?;
    Ok(Json(breeds))
}

#[instrument(skip(state))]
pub async fn get_breed(
    State(state): State<AppState>,
    Path(breed_id): Path<String>,
) -> Result<Json<BreedResponse>, (StatusCode, String)> {
    let breed = state
        .breeds
        .by_id(&breed_id)
        .await
        .map_err(upstream_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            format!("Breed with ID '{breed_id}' not found"),
        ))?;
    Ok(Json(breed))
}
