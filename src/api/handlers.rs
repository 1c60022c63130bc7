//! HTTP request handlers

use super::error::AppError;
use super::types::{
    AnalysisResultRequest, AnalysisResultResponse, ClearResponse, ConversationQuery,
    PostMessageRequest, PostMessageResponse, SimulateRequest, SimulateResponse,
    StartAnalysisRequest, StartAnalysisResponse, StoreStatsResponse, VersionResponse,
};
use super::AppState;
use crate::mock;
use crate::store::{Actor, Message};
use crate::webhook::WebhookTarget;
use axum::{
    body::Bytes,
    extract::{Query, Request, State},
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::Value;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/conversation-updates",
            get(get_conversation_updates)
                .post(post_conversation_update)
                .delete(clear_conversation)
                .options(store_stats),
        )
        .route("/api/start-analysis", post(start_analysis))
        .route(
            "/api/get-analysis-result",
            get(get_analysis_result).post(record_analysis_result),
        )
        .route("/api/simulate-conversation", post(simulate_conversation))
        .route("/version", get(get_version))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            sweep_before_request,
        ))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Middleware
// ============================================================

/// Opportunistic expiry so eviction happens even if the background tick stalls
async fn sweep_before_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    state.store.sweep().await;
    next.run(request).await
}

#[allow(clippy::needless_pass_by_value)] // Signature required by CatchPanicLayer
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| (*s).to_string()))
        .unwrap_or_else(|| "unknown panic payload".to_string());
    tracing::error!(panic = %detail, "Request handler panicked");
    AppError::Internal("Internal server error".to_string()).into_response()
}

async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

// ============================================================
// Conversation Updates
// ============================================================

fn required_field(value: Option<String>, message: &str) -> Result<String, AppError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::BadRequest(message.to_string())),
    }
}

/// Message text is stored verbatim, so only the empty string is missing
fn required_text(value: Option<String>, message: &str) -> Result<String, AppError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::BadRequest(message.to_string())),
    }
}

const ID_QUERY_REQUIRED: &str = "conversationId is required as query parameter";

async fn get_conversation_updates(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ConversationQuery>, AppError>,
) -> Result<Response, AppError> {
    let wants_analysis = query.wants_analysis();
    let id = required_field(query.conversation_id, ID_QUERY_REQUIRED)?;

    if wants_analysis {
        Ok(Json(state.store.analysis_status(&id).await).into_response())
    } else {
        Ok(Json(state.store.messages(&id).await).into_response())
    }
}

async fn post_conversation_update(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<PostMessageRequest>, AppError>,
) -> Result<Json<PostMessageResponse>, AppError> {
    const REQUIRED: &str = "Message, actor, and conversationId are required";

    let id = required_field(req.conversation_id, REQUIRED)?;
    let text = required_text(req.message, REQUIRED)?;
    let actor: Actor = required_field(req.actor, REQUIRED)?
        .parse()
        .map_err(AppError::BadRequest)?;

    let message = Message {
        actor,
        text,
        quick_replies: req.quick_replies.unwrap_or_default(),
        image_url: req.image_url,
    };

    let record = state.store.append_message(&id, message).await;
    tracing::debug!(conversation_id = %id, %actor, count = record.messages.len(), "Message appended");

    Ok(Json(PostMessageResponse {
        success: true,
        message: "Message added to conversation".to_string(),
        expires_at: state.store.expires_at(record.last_updated),
        conversation: record.messages,
    }))
}

async fn clear_conversation(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ConversationQuery>, AppError>,
) -> Result<Json<ClearResponse>, AppError> {
    let id = required_field(query.conversation_id, ID_QUERY_REQUIRED)?;
    state.store.clear(&id).await;
    tracing::info!(conversation_id = %id, "Conversation cleared");

    Ok(Json(ClearResponse {
        success: true,
        message: format!("Conversation {id} cleared"),
    }))
}

async fn store_stats(State(state): State<AppState>) -> Json<StoreStatsResponse> {
    Json(state.store.stats().await.into())
}

// ============================================================
// Analysis Lifecycle
// ============================================================

async fn start_analysis(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<Value>, AppError>,
) -> Result<Json<StartAnalysisResponse>, AppError> {
    let request: StartAnalysisRequest = serde_json::from_value(body.clone())
        .map_err(|e| AppError::BadRequest(format!("Invalid sessionData: {e}")))?;
    let bot = &request.session_data.target_bot;

    if bot.webhook_url.trim().is_empty() || bot.bearer_token.trim().is_empty() {
        return Err(AppError::BadRequest(
            "sessionData.target_bot.webhook_url and bearerToken are required".to_string(),
        ));
    }

    tracing::info!(
        conversation_id = ?request.conversation_id,
        bot_id = %bot.bot_id,
        "Forwarding start request to webhook"
    );

    let target = WebhookTarget {
        url: bot.webhook_url.clone(),
        bearer_token: bot.bearer_token.clone(),
    };
    let reply = state.webhook.forward(&target, &body).await?;

    Ok(Json(StartAnalysisResponse {
        success: true,
        webhook_response: reply.body,
    }))
}

async fn get_analysis_result() -> Json<AnalysisResultResponse> {
    Json(AnalysisResultResponse {
        success: true,
        result: mock::analysis_report().to_string(),
        recorded: false,
        conversation_id: None,
    })
}

/// Returns the report and, when an id is given, records it as completed
async fn record_analysis_result(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<AnalysisResultRequest>, AppError>,
    body: Bytes,
) -> Result<Json<AnalysisResultResponse>, AppError> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        AnalysisResultRequest::default()
    } else {
        serde_json::from_slice::<AnalysisResultRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?
    };

    let conversation_id = from_body
        .conversation_id
        .or(query.conversation_id)
        .filter(|id| !id.trim().is_empty());
    let report = mock::analysis_report();

    if let Some(id) = &conversation_id {
        state.store.set_analysis_result(id, report).await;
        tracing::info!(conversation_id = %id, "Analysis result recorded");
    }

    Ok(Json(AnalysisResultResponse {
        success: true,
        result: report.to_string(),
        recorded: conversation_id.is_some(),
        conversation_id,
    }))
}

async fn simulate_conversation(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SimulateRequest>, AppError>,
) -> Result<Json<SimulateResponse>, AppError> {
    let id = required_field(req.conversation_id, "conversationId is required")?;
    let script = mock::demo_conversation();
    let appended = script.len();
    let record = state.store.append_messages(&id, script).await;
    tracing::info!(conversation_id = %id, appended, "Demo conversation seeded");

    Ok(Json(SimulateResponse {
        success: true,
        appended,
        conversation: record.messages,
    }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: concat!("bot-analyzer ", env!("CARGO_PKG_VERSION")),
    })
}
