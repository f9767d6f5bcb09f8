use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::entities::car_record;
use crate::db::memory_service::car_service::{self, SearchFilter};
use crate::services::summary_service::Summary;
use crate::web::{
    AppState,
    error::AppError,
    models::Locale,
    routes::draft_routes,
};

pub fn create_car_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(search_cars))
        .route("/{id}", get(get_car))
        .route("/{id}/summary", post(summarize_car))
        .route("/{id}/drafts", post(draft_routes::open_edit_draft))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub brand: Option<String>,
}

#[derive(Serialize)]
pub struct CarView {
    #[serde(flatten)]
    record: car_record::Model,
    chassis_display: String,
}

impl From<car_record::Model> for CarView {
    fn from(record: car_record::Model) -> Self {
        Self {
            chassis_display: record.chassis_display(),
            record,
        }
    }
}

async fn search_cars(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<CarView>>, AppError> {
    let filter = SearchFilter {
        query: query.q,
        brand: query.brand.filter(|b| !b.trim().is_empty()),
    };
    let records = car_service::search_records(&app_state.backend.pool, &filter).await?;
    Ok(Json(records.into_iter().map(CarView::from).collect()))
}

async fn load_record(app_state: &AppState, id: &str) -> Result<car_record::Model, AppError> {
    car_service::get_record(&app_state.backend.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Record {id} not found")))
}

async fn get_car(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CarView>, AppError> {
    Ok(Json(CarView::from(load_record(&app_state, &id).await?)))
}

#[derive(Serialize)]
pub struct SummaryResponse {
    record_id: String,
    summary: String,
    fallback: bool,
}

async fn summarize_car(
    State(app_state): State<Arc<AppState>>,
    Extension(locale): Extension<Locale>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, AppError> {
    let record = load_record(&app_state, &id).await?;
    let summary: Summary = app_state.summary.summarize(&record).await;
    Ok(Json(SummaryResponse {
        record_id: record.id,
        summary: summary.text(locale.as_str()),
        fallback: summary.is_fallback(),
    }))
}
