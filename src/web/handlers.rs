// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ServiceError;
use crate::store::CountryQuery;
use super::error::ApiError;
use super::AppState;

/// Raw list parameters; validated by [`CountryQuery::parse`].
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
}

pub async fn list_countries(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ServiceError> {
    let query = CountryQuery::parse(
        params.limit.as_deref(),
        params.sort_by.as_deref(),
        params.order_by.as_deref(),
    )?;
    let countries = state.service.get_countries(&query).await?;
    Ok(Json(json!({ "countries": countries })))
}

pub async fn get_country(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let country = state.service.get_country(&name).await?;
    Ok(Json(json!({ "country": country })))
}

pub async fn list_images(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let images = state.service.get_images(&name).await?;
    Ok(Json(json!({ "images": images })))
}

fn text_part(part: &str, data: Vec<u8>) -> Result<String, ApiError> {
    String::from_utf8(data)
        .map_err(|_| ApiError::BadRequest(format!("Multipart part '{}' is not valid UTF-8", part)))
}

pub async fn upload_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut file: Option<Vec<u8>> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let part = field.name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart field: {}", e)))?;

        match part.as_deref() {
            Some("file") => file = Some(data.to_vec()),
            Some("title") => title = Some(text_part("title", data.to_vec())?),
            Some("description") => description = Some(text_part("description", data.to_vec())?),
            _ => {}
        }
    }

    let missing = |part: &str| ApiError::BadRequest(format!("Missing multipart part '{}'", part));
    let file = file.ok_or_else(|| missing("file"))?;
    let title = title.ok_or_else(|| missing("title"))?;
    let description = description.ok_or_else(|| missing("description"))?;

    let image_id = state
        .service
        .upload_image(&name, &file, &title, &description)
        .await?;
    Ok(Json(json!({ "result": image_id })))
}

/// Liveness: the process is up and serving.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness: the store must answer. A cache outage only degrades.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (store_ok, cache_ok) = state.service.health().await;
    let (status, label) = match (store_ok, cache_ok) {
        (true, true) => (StatusCode::OK, "ok"),
        (true, false) => (StatusCode::OK, "degraded"),
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };
    (
        status,
        Json(json!({ "status": label, "store": store_ok, "cache": cache_ok })),
    )
}
