//! The axum application: routes, wire models, error boundary.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use relay_core::CheckpointStore;

use crate::catalog;
use crate::service::{ConversationService, InboundKind, InboundMessage, ServiceError};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversationService>,
    pub store: Arc<dyn CheckpointStore>,
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/agent_response", post(agent_response))
        .route("/action_list", get(action_list))
        .route("/reset_state", post(reset_state))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Request body of `POST /agent_response`.
#[derive(Debug, Deserialize)]
pub struct AgentResponseRequest {
    /// `user` starts/continues a run; `agent` resumes a suspension.
    pub message_type: String,
    pub message_text: String,
    pub discussion_id: String,
    #[serde(default)]
    pub client: String,
    pub channel_type_id: String,
}

/// Response body of `POST /agent_response`.
#[derive(Debug, Serialize)]
pub struct AgentResponseModel {
    pub message_type: String,
    pub message_text: String,
    pub message_id: String,
    pub metadata: serde_json::Value,
}

/// The outermost error boundary: clients get a status and a short
/// message plus the discussion id, never internals.
pub struct ApiError {
    status: StatusCode,
    message: String,
    discussion_id: Option<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>, discussion_id: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            discussion_id: Some(discussion_id.into()),
        }
    }

    fn from_service(error: ServiceError, discussion_id: String) -> Self {
        let (status, message) = match &error {
            ServiceError::UnknownChannel(_) => (StatusCode::BAD_REQUEST, error.to_string()),
            ServiceError::NoPendingInterrupt(_) | ServiceError::Suspended(_) => {
                (StatusCode::CONFLICT, error.to_string())
            }
            ServiceError::Engine(_) | ServiceError::Checkpoint(_) => {
                tracing::error!(discussion_id = discussion_id.as_str(), "request failed: {error}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error processing agent response".to_string(),
                )
            }
        };
        Self {
            status,
            message,
            discussion_id: Some(discussion_id),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.message,
            "discussion_id": self.discussion_id,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Parse the wire `message_type`; anything but `user`/`agent` is
/// rejected before any graph execution.
fn parse_message_type(value: &str) -> Option<InboundKind> {
    match value {
        "user" => Some(InboundKind::User),
        "agent" => Some(InboundKind::Agent),
        _ => None,
    }
}

async fn agent_response(
    State(state): State<AppState>,
    Json(request): Json<AgentResponseRequest>,
) -> Result<Json<AgentResponseModel>, ApiError> {
    let Some(kind) = parse_message_type(&request.message_type) else {
        return Err(ApiError::bad_request(
            format!("unknown message_type: {}", request.message_type),
            request.discussion_id,
        ));
    };

    tracing::info!(
        discussion_id = request.discussion_id.as_str(),
        client = request.client.as_str(),
        message_type = request.message_type.as_str(),
        "inbound message"
    );

    let discussion_id = request.discussion_id.clone();
    let outbound = state
        .service
        .handle(InboundMessage {
            kind,
            text: request.message_text,
            discussion_id: request.discussion_id,
            channel_type_id: request.channel_type_id,
        })
        .await
        .map_err(|e| ApiError::from_service(e, discussion_id))?;

    Ok(Json(AgentResponseModel {
        message_type: outbound.message_type.to_string(),
        message_text: outbound.message_text,
        message_id: outbound.message_id,
        metadata: outbound.metadata,
    }))
}

/// Response body of `GET /action_list`.
#[derive(Debug, Serialize)]
pub struct ActionListModel {
    pub agents: Vec<catalog::ActionEntry>,
}

async fn action_list() -> Json<ActionListModel> {
    Json(ActionListModel {
        agents: catalog::action_entries().to_vec(),
    })
}

/// Request body of `POST /reset_state`.
#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    /// Reset one conversation, or everything when absent.
    pub discussion_id: Option<String>,
}

/// Response body of `POST /reset_state`.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
    pub bytes_removed: u64,
}

async fn reset_state(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    let response = match &request.discussion_id {
        Some(discussion_id) => {
            let removed = state
                .store
                .delete(discussion_id)
                .await
                .map_err(|e| ApiError::from_service(e.into(), discussion_id.clone()))?;
            match removed {
                Some(bytes_removed) => ResetResponse {
                    success: true,
                    message: format!("Successfully reset state for discussion {discussion_id}"),
                    bytes_removed,
                },
                None => ResetResponse {
                    success: false,
                    message: format!("No checkpoint found for discussion {discussion_id}"),
                    bytes_removed: 0,
                },
            }
        }
        None => {
            let bytes_removed = state
                .store
                .wipe()
                .await
                .map_err(|e| ApiError::from_service(e.into(), String::new()))?;
            ResetResponse {
                success: true,
                message: "Successfully reset all conversation state".into(),
                bytes_removed,
            }
        }
    };
    Ok(Json(response))
}
