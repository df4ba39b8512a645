//! HTTP request handlers for API endpoints

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiError;
use super::state::{AppState, MAX_CHAT_SESSIONS};
use crate::assistant::{build_system_prompt, ChatMessage, ChatSession, DatasetSummary};
use crate::basket::{mine_segment_rules, AssociationRule, RuleThresholds, SegmentDimension};
use crate::pricing::{optimize_prices, write_recommendations_csv, GroupBy, Recommendation};
use crate::sale_record::{Dimension, SaleRecord};
use crate::sales_source::SalesSource;
use crate::sqlite_store::StoredSale;

/// Health check endpoint
///
/// Returns a simple status response to verify the server is running
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok"
    }))
}

/// Response for sales listing
#[derive(Debug, Serialize)]
pub struct SalesResponse {
    pub count: usize,
    pub sales: Vec<StoredSale>,
}

/// GET /sales - List every stored sale
pub async fn list_sales(State(state): State<Arc<AppState>>) -> Result<Json<SalesResponse>, ApiError> {
    let store = state.store.lock().await;
    let sales = store.list_sales()?;

    Ok(Json(SalesResponse {
        count: sales.len(),
        sales,
    }))
}

async fn load_records(state: &AppState) -> Result<Vec<SaleRecord>, ApiError> {
    let store = state.store.lock().await;
    read_sales(&*store)
}

fn read_sales(source: &dyn SalesSource) -> Result<Vec<SaleRecord>, ApiError> {
    Ok(source.load_sales()?)
}

// Price recommendations

/// Query parameters for the price endpoints
#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    /// Comma-separated dimensions, e.g. `product_line,city`
    pub group_by: Option<String>,
    /// Trailing window in months
    pub months: Option<i64>,
}

impl PriceQuery {
    fn resolve(&self, default_months: u32) -> Result<(GroupBy, u32), ApiError> {
        let group_by = match self.group_by.as_deref() {
            Some(raw) => GroupBy::parse(raw)?,
            None => GroupBy::default(),
        };
        let months = match self.months {
            Some(m) if m <= 0 => {
                return Err(ApiError::InvalidParameter(format!(
                    "months must be positive, got {}",
                    m
                )))
            }
            Some(m) => u32::try_from(m)
                .map_err(|_| ApiError::InvalidParameter(format!("months out of range: {}", m)))?,
            None => default_months,
        };
        Ok((group_by, months))
    }
}

/// Response for price recommendations
#[derive(Debug, Serialize)]
pub struct PricesResponse {
    pub group_by: Vec<Dimension>,
    pub window_months: u32,
    pub recommendations: Vec<Recommendation>,
}

async fn compute_recommendations(
    state: &AppState,
    query: &PriceQuery,
) -> Result<(GroupBy, u32, Vec<Recommendation>), ApiError> {
    let (group_by, months) = query.resolve(state.window_months)?;
    let records = load_records(state).await?;

    let grouping = group_by.clone();
    let recommendations =
        tokio::task::spawn_blocking(move || optimize_prices(&records, &grouping, months)).await??;

    tracing::info!(
        groups = recommendations.len(),
        window_months = months,
        "computed price recommendations"
    );
    Ok((group_by, months, recommendations))
}

/// GET /prices - Best-price recommendation per group
pub async fn get_prices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<PricesResponse>, ApiError> {
    let (group_by, window_months, recommendations) = compute_recommendations(&state, &query).await?;

    Ok(Json(PricesResponse {
        group_by: group_by.dimensions().to_vec(),
        window_months,
        recommendations,
    }))
}

/// GET /prices/export - Recommendations as a CSV download
pub async fn export_prices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PriceQuery>,
) -> Result<Response, ApiError> {
    let (group_by, _, recommendations) = compute_recommendations(&state, &query).await?;

    let mut body = Vec::new();
    write_recommendations_csv(&mut body, &recommendations, &group_by)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"price_recommendations.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

// Basket rules

/// Query parameters for the rules endpoint
#[derive(Debug, Default, Deserialize)]
pub struct RulesQuery {
    /// Comma-separated segment attributes; all of them when absent
    pub segment_by: Option<String>,
    pub top: Option<usize>,
    pub min_support: Option<f64>,
    pub min_confidence: Option<f64>,
    pub min_lift: Option<f64>,
}

/// Rules of one segment
#[derive(Debug, Serialize)]
pub struct SegmentRulesResponse {
    pub segment: String,
    pub basket_count: usize,
    pub rules: Vec<AssociationRule>,
    pub insights: Vec<String>,
}

/// Response for the rules endpoint
#[derive(Debug, Serialize)]
pub struct RulesResponse {
    pub segment_by: Vec<SegmentDimension>,
    pub segments: Vec<SegmentRulesResponse>,
}

/// GET /rules - Association rules per customer segment
pub async fn get_rules(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RulesQuery>,
) -> Result<Json<RulesResponse>, ApiError> {
    let segment_by = match query.segment_by.as_deref() {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<SegmentDimension>)
            .collect::<Result<Vec<_>, _>>()?,
        None => SegmentDimension::ALL.to_vec(),
    };

    let defaults = RuleThresholds::default();
    let thresholds = RuleThresholds {
        min_support: query.min_support.unwrap_or(defaults.min_support),
        min_confidence: query.min_confidence.unwrap_or(defaults.min_confidence),
        min_lift: query.min_lift.unwrap_or(defaults.min_lift),
        top_n: query.top.unwrap_or(defaults.top_n),
    };

    let records = load_records(&state).await?;
    let segment_dims = segment_by.clone();
    let mined = tokio::task::spawn_blocking(move || {
        mine_segment_rules(&records, &segment_dims, &thresholds)
    })
    .await??;

    let segments = mined
        .iter()
        .map(|segment| {
            let rules = segment.top(thresholds.top_n).to_vec();
            SegmentRulesResponse {
                segment: segment.describe_segment(),
                basket_count: segment.basket_count,
                insights: rules.iter().map(|r| segment.insight(r)).collect(),
                rules,
            }
        })
        .collect();

    Ok(Json(RulesResponse { segment_by, segments }))
}

// Assistant

/// GET /assistant/models - Models available on the text-generation service
pub async fn list_models(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let models = state.assistant.list_models().await?;
    Ok(Json(json!({
        "models": models,
        "default_model": state.assistant.config().default_model,
    })))
}

/// Request body for creating a chat session
#[derive(Debug, Default, Deserialize)]
pub struct CreateChatRequest {
    pub model: Option<String>,
}

/// Chat session as seen by the dashboard
#[derive(Debug, Serialize)]
pub struct ChatSessionResponse {
    pub session_id: String,
    pub model: String,
    pub created_at: String,
    pub messages: Vec<ChatMessage>,
    pub messages_url: String,
}

impl ChatSessionResponse {
    fn from_session(session: &ChatSession) -> Self {
        ChatSessionResponse {
            session_id: session.id.to_string(),
            model: session.model.clone(),
            created_at: session.created_at.to_rfc3339(),
            messages: session.visible_messages().into_iter().cloned().collect(),
            messages_url: format!("/assistant/sessions/{}/messages", session.id),
        }
    }
}

/// POST /assistant/sessions - Start a conversation
pub async fn create_chat_session(
    State(state): State<Arc<AppState>>,
    request: Option<Json<CreateChatRequest>>,
) -> Result<Json<ChatSessionResponse>, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let model = match request.model {
        Some(model) if model.trim().is_empty() => {
            return Err(ApiError::InvalidParameter("model must not be empty".to_string()))
        }
        Some(model) => model,
        None => state.assistant.config().default_model.clone(),
    };

    let mut sessions = state.chat_sessions.write().await;
    if sessions.len() >= MAX_CHAT_SESSIONS {
        return Err(ApiError::SessionLimitReached);
    }

    let session = ChatSession::new(model);
    let response = ChatSessionResponse::from_session(&session);
    sessions.insert(session.id, session);

    tracing::info!(session_id = %response.session_id, model = %response.model, "created chat session");
    Ok(Json(response))
}

fn parse_session_id(session_id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(session_id).map_err(|_| ApiError::InvalidParameter("Invalid session ID".to_string()))
}

/// GET /assistant/sessions/{session_id} - Conversation history
pub async fn get_chat_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ChatSessionResponse>, ApiError> {
    let session_id = parse_session_id(&session_id)?;

    let sessions = state.chat_sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or_else(|| ApiError::NotFound(format!("chat session {}", session_id)))?;

    Ok(Json(ChatSessionResponse::from_session(session)))
}

/// Request body for a user turn
#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub content: String,
}

/// POST /assistant/sessions/{session_id}/messages - Send a message and
/// stream the reply
///
/// Emits `chunk` events with reply text, then a single `done` event. Once the
/// stream ends the full reply is appended to the session history. A failure
/// mid-stream is reported as an `error` event.
pub async fn post_chat_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<ChatMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    if request.content.trim().is_empty() {
        return Err(ApiError::InvalidParameter("message must not be empty".to_string()));
    }

    let needs_prompt = {
        let sessions = state.chat_sessions.read().await;
        let session = sessions
            .get(&session_id)
            .ok_or_else(|| ApiError::NotFound(format!("chat session {}", session_id)))?;
        session.messages().is_empty()
    };

    let system_prompt = if needs_prompt {
        let records = load_records(&state).await?;
        let summary = DatasetSummary::from_records(&records);
        build_system_prompt(&summary, &state.assistant.config().currency_symbol)
    } else {
        String::new()
    };

    let (model, history) = {
        let mut sessions = state.chat_sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| ApiError::NotFound(format!("chat session {}", session_id)))?;
        session.push_user(request.content, &system_prompt);
        (session.model.clone(), session.messages().to_vec())
    };

    let mut upstream = state.assistant.chat_stream(&model, &history).await?;

    let stream = async_stream::stream! {
        let mut reply = String::new();
        while let Some(item) = upstream.next().await {
            match item {
                Ok(text) => {
                    reply.push_str(&text);
                    yield Ok::<_, Infallible>(Event::default().event("chunk").data(text));
                }
                Err(err) => {
                    tracing::warn!(%session_id, error = %err, "assistant stream failed");
                    yield Ok(Event::default().event("error").data(err.to_string()));
                    break;
                }
            }
        }

        if !reply.is_empty() {
            if let Some(session) = state.chat_sessions.write().await.get_mut(&session_id) {
                session.push_assistant(reply);
            }
        }
        yield Ok(Event::default().event("done").data(session_id.to_string()));
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
