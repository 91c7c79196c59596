use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{MailchimpEvent, PulseScore, SurveyQuestion, SurveyResponse};
use crate::scoring::{compute_pulse_score, cutoff_date, filter_since, UnassessedThemes};
use crate::survey::default_questions;

/// Where webhook events end up. Postgres in production.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn record(&self, event: MailchimpEvent) -> anyhow::Result<Uuid>;
}

pub struct AppState {
    pub events: Arc<dyn EventStore>,
    pub policy: UnassessedThemes,
}

impl AppState {
    pub fn new(events: Arc<dyn EventStore>, policy: UnassessedThemes) -> Self {
        Self { events, policy }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct MailchimpPayload {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: MailchimpData,
}

#[derive(Debug, Default, Deserialize)]
pub struct MailchimpData {
    pub email: Option<String>,
    pub list_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MailchimpPayload {
    pub fn into_event(self, raw: Value) -> Result<MailchimpEvent, ApiError> {
        let event_type = self
            .event_type
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("missing event type".to_string()))?;
        let email = self
            .data
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("missing data.email".to_string()))?;

        Ok(MailchimpEvent {
            event_type,
            email,
            list_id: self.data.list_id,
            tags: self.data.tags,
            payload: raw,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub responses: Vec<SurveyResponse>,
    #[serde(default)]
    pub questions: Option<Vec<SurveyQuestion>>,
    /// Only score responses submitted in the last N days.
    #[serde(default, alias = "sinceDays")]
    pub since_days: Option<i64>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/mailchimp-webhook",
            get(verify_mailchimp).post(mailchimp_event),
        )
        .route("/score", post(score))
        .with_state(state)
}

pub async fn serve(bind: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Mailchimp issues a GET when the webhook is registered.
pub async fn verify_mailchimp() -> &'static str {
    "Webhook endpoint verified"
}

pub async fn mailchimp_event(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let payload: MailchimpPayload = serde_json::from_value(raw.clone())
        .map_err(|err| ApiError::BadRequest(format!("invalid payload: {err}")))?;
    let event = payload.into_event(raw)?;

    tracing::info!(event_type = %event.event_type, list_id = ?event.list_id, "mailchimp event");
    let id = state.events.record(event).await?;
    Ok(Json(json!({ "success": true, "id": id })))
}

pub async fn score(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<PulseScore>, ApiError> {
    let questions = match request.questions {
        Some(questions) if !questions.is_empty() => questions,
        _ => default_questions(),
    };
    let responses = match request.since_days {
        Some(days) => filter_since(&request.responses, cutoff_date(days)),
        None => request.responses,
    };
    let result = compute_pulse_score(&questions, &responses, state.policy, Utc::now());
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::models::Tier;

    #[derive(Default)]
    struct MemoryStore {
        events: Mutex<Vec<MailchimpEvent>>,
    }

    #[async_trait]
    impl EventStore for MemoryStore {
        async fn record(&self, event: MailchimpEvent) -> anyhow::Result<Uuid> {
            self.events.lock().unwrap().push(event);
            Ok(Uuid::new_v4())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl EventStore for FailingStore {
        async fn record(&self, _event: MailchimpEvent) -> anyhow::Result<Uuid> {
            anyhow::bail!("database unavailable")
        }
    }

    fn state_with(store: Arc<dyn EventStore>) -> State<Arc<AppState>> {
        State(Arc::new(AppState::new(store, UnassessedThemes::Exclude)))
    }

    #[tokio::test]
    async fn subscribe_event_is_recorded() {
        let store = Arc::new(MemoryStore::default());
        let raw = json!({
            "type": "subscribe",
            "fired_at": "2026-03-01 10:00:00",
            "data": {
                "email": "lena@acme.io",
                "list_id": "a1b2c3",
                "tags": ["pulse-newsletter"]
            }
        });

        let Json(body) = mailchimp_event(state_with(store.clone()), Json(raw.clone()))
            .await
            .unwrap();
        assert_eq!(body["success"], json!(true));

        let events = store.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "subscribe");
        assert_eq!(events[0].email, "lena@acme.io");
        assert_eq!(events[0].list_id.as_deref(), Some("a1b2c3"));
        assert_eq!(events[0].tags, vec!["pulse-newsletter"]);
        assert_eq!(events[0].payload, raw);
    }

    #[tokio::test]
    async fn event_without_email_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let raw = json!({ "type": "unsubscribe", "data": { "list_id": "a1b2c3" } });

        let err = mailchimp_event(state_with(store.clone()), Json(raw))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "missing data.email"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert!(store.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_maps_to_server_error() {
        let raw = json!({ "type": "subscribe", "data": { "email": "a@b.co" } });
        let err = mailchimp_event(state_with(Arc::new(FailingStore)), Json(raw))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn verification_and_health_respond() {
        assert_eq!(verify_mailchimp().await, "Webhook endpoint verified");
        let Json(body) = health().await;
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn score_endpoint_uses_default_survey() {
        let request: ScoreRequest = serde_json::from_value(json!({
            "responses": [
                { "questionId": "psy-1", "value": 5 },
                { "questionId": "til-1", "value": 5 },
                { "questionId": "mot-1", "value": 5 },
                { "questionId": "bin-1", "value": "yes" },
                { "questionId": "eng-1", "value": 11 }
            ]
        }))
        .unwrap();

        let Json(result) = score(state_with(Arc::new(MemoryStore::default())), Json(request))
            .await
            .unwrap();
        assert_eq!(result.scored_responses, 4);
        assert_eq!(result.skipped_responses, 1);
        assert!((result.overall - 100.0).abs() < 1e-9);
        assert_eq!(result.tier, Tier::PulseCertified);
    }

    #[tokio::test]
    async fn score_endpoint_accepts_enormous_window() {
        let request: ScoreRequest = serde_json::from_value(json!({
            "sinceDays": 9_000_000_000_000i64,
            "responses": [{ "questionId": "psy-1", "value": 5 }]
        }))
        .unwrap();

        let Json(result) = score(state_with(Arc::new(MemoryStore::default())), Json(request))
            .await
            .unwrap();
        assert_eq!(result.scored_responses, 1);
    }

    #[tokio::test]
    async fn score_endpoint_honours_window() {
        let request: ScoreRequest = serde_json::from_value(json!({
            "sinceDays": 7,
            "responses": [
                { "questionId": "psy-1", "value": 1, "submittedAt": "2001-01-01T00:00:00Z" },
                { "questionId": "psy-1", "value": 5 }
            ]
        }))
        .unwrap();

        let Json(result) = score(state_with(Arc::new(MemoryStore::default())), Json(request))
            .await
            .unwrap();
        assert_eq!(result.scored_responses, 1);
        assert_eq!(
            result.theme(crate::models::Theme::PsychologicalSafety).unwrap().score,
            100.0
        );
    }
}
