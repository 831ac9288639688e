use axum::{extract::State, http::StatusCode, Json};

use crate::{error::AppResult, extract::AppJson, models::CreateCustomer, orders, AppState};

pub async fn create_customer(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCustomer>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let customer = orders::create_customer(state.store.as_ref(), &payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "data": customer })),
    ))
}
