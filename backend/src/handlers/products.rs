use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    extract::{AppJson, AppPath},
    models::CreateProduct,
    orders, AppState,
};

pub async fn create_product(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateProduct>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let product = orders::create_product(state.store.as_ref(), &payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "data": product })),
    ))
}

pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let product = orders::get_product(state.store.as_ref(), id).await?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "data": product }))))
}
