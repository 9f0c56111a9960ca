use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::db::Database;
use crate::error::ApiError;
use crate::fetch::Fetcher;
use crate::metrics;
use crate::models::{EvaluateResponse, Evaluation, EvaluationRequest, EvaluationStatus, Metrics};
use crate::report::{render_html_report, ReportView};

const LIST_LIMIT: usize = 100;
const MAX_COLLECTIONS: usize = 10;

#[derive(Clone)]
pub struct AppState {
    /// `None` when no `DATABASE_URL` was given.
    pub db: Option<Arc<Mutex<Database>>>,
    pub fetcher: Fetcher,
    pub database_url_set: bool,
    pub database_name_set: bool,
}

impl AppState {
    fn db(&self) -> Result<&Arc<Mutex<Database>>, ApiError> {
        self.db.as_ref().ok_or(ApiError::NotConfigured)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(read_root))
        .route("/health", get(health_check))
        .route("/evaluate", post(evaluate))
        .route("/evaluations", get(list_evaluations))
        .route("/evaluations/:id", get(get_evaluation))
        .route("/evaluations/:id/report", get(get_evaluation_report))
        .route("/test", get(test_database))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn read_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Agent Evaluator API" }))
}

async fn health_check() -> &'static str {
    "OK"
}

fn parse_id(raw: &str) -> Result<String, ApiError> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::InvalidId)
}

// === Evaluation ===

async fn evaluate(
    State(state): State<AppState>,
    payload: Result<Json<EvaluationRequest>, JsonRejection>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    req.validate()?;
    let db = state.db()?;

    let record = db
        .lock()
        .await
        .create_evaluation(&req.agent_card_url, req.chat_url.as_deref())?;
    tracing::info!(id = %record.id, agent_card_url = %req.agent_card_url, "Evaluation started");

    match run_evaluation(&state.fetcher, db, &record).await {
        Ok(metrics) => {
            tracing::info!(id = %record.id, "Evaluation completed");
            Ok(Json(EvaluateResponse {
                id: record.id,
                status: EvaluationStatus::Completed,
                metrics,
            }))
        }
        Err(e) => {
            let message = e.to_string();
            if let Err(db_err) = db.lock().await.fail_evaluation(&record.id, Some(message.as_str())) {
                tracing::error!(id = %record.id, "Failed to mark evaluation as failed: {}", db_err);
            }
            match e {
                ApiError::BadGateway(_) => Err(e),
                other => Err(ApiError::Internal(format!("Evaluation failed: {}", other))),
            }
        }
    }
}

/// Fetch, score, render and persist. The lock is only taken for the final write.
async fn run_evaluation(
    fetcher: &Fetcher,
    db: &Mutex<Database>,
    record: &Evaluation,
) -> Result<Metrics, ApiError> {
    let agent_card = fetcher.fetch_with_retries(&record.agent_card_url).await?;
    let chat_logs = match record.chat_url {
        Some(ref url) => Some(fetcher.fetch_with_retries(url).await?),
        None => None,
    };

    let metrics = metrics::score(&agent_card, chat_logs.as_deref());
    let html = render_html_report(&ReportView {
        status: EvaluationStatus::Completed,
        agent_card_url: &record.agent_card_url,
        chat_url: record.chat_url.as_deref(),
        metrics: Some(&metrics),
    });

    db.lock().await.complete_evaluation(&record.id, &metrics, &html)?;
    Ok(metrics)
}

async fn list_evaluations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Evaluation>>, ApiError> {
    let db = state.db()?.lock().await;
    Ok(Json(db.list_evaluations(LIST_LIMIT)?))
}

async fn load_evaluation(state: &AppState, raw_id: &str) -> Result<Evaluation, ApiError> {
    let db = state.db()?;
    let id = parse_id(raw_id)?;
    let evaluation = db.lock().await.get_evaluation(&id)?;
    evaluation.ok_or(ApiError::NotFound)
}

async fn get_evaluation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Evaluation>, ApiError> {
    Ok(Json(load_evaluation(&state, &id).await?))
}

async fn get_evaluation_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let evaluation = load_evaluation(&state, &id).await?;

    let html = match evaluation.html_report {
        Some(ref html) if !html.is_empty() => html.clone(),
        _ => render_html_report(&ReportView::from(&evaluation)),
    };
    Ok(Html(html))
}

// === Diagnostics ===

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub backend: String,
    pub database: String,
    pub database_url: String,
    pub database_name: String,
    pub connection_status: String,
    pub collections: Vec<String>,
}

fn set_marker(set: bool) -> String {
    let marker = if set { "✅ Set" } else { "❌ Not Set" };
    marker.to_string()
}

async fn test_database(State(state): State<AppState>) -> Json<DiagnosticsResponse> {
    let mut response = DiagnosticsResponse {
        backend: "✅ Running".to_string(),
        database: "⚠️  Available but not initialized".to_string(),
        database_url: set_marker(state.database_url_set),
        database_name: set_marker(state.database_name_set),
        connection_status: "Not Connected".to_string(),
        collections: Vec::new(),
    };

    if let Some(ref db) = state.db {
        let db = db.lock().await;
        response.connection_status = "Connected".to_string();
        match db.list_collections() {
            Ok(collections) => {
                response.collections = collections.into_iter().take(MAX_COLLECTIONS).collect();
                response.database = "✅ Connected & Working".to_string();
            }
            Err(e) => {
                let msg: String = e.to_string().chars().take(50).collect();
                response.database = format!("⚠️  Connected but Error: {}", msg);
            }
        }
    }

    Json(response)
}
