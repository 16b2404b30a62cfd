//! HTTP API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::net::server::AppState;
use crate::relay::{SessionId, SessionInfo};

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Relay status
#[derive(serde::Serialize)]
pub struct SystemStatus {
    pub active_sessions: usize,
    pub uptime_seconds: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub block_ms: f32,
    pub queue_capacity: usize,
}

/// Get relay status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SystemStatus>> {
    let audio = &state.relay.config().audio;
    let status = SystemStatus {
        active_sessions: state.relay.session_count(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        sample_rate: audio.sample_rate,
        channels: audio.channels,
        block_ms: audio.block_ms,
        queue_capacity: audio.queue_capacity,
    };

    Json(ApiResponse::ok(status))
}

/// List active sessions with their counters
pub async fn get_sessions(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<SessionInfo>>> {
    Json(ApiResponse::ok(state.relay.sessions()))
}

/// Hang up a session and tell its peer with `voice_stop`
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let Some(session_id) = SessionId::parse(&id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid session id: {}", id))),
        );
    };

    // Closing joins the device threads.
    let relay = state.relay.clone();
    match tokio::task::spawn_blocking(move || relay.hang_up(session_id)).await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::ok(()))),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Session not found: {}", id))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Hang-up failed: {}", e))),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockBackend;
    use crate::config::RelayConfig;
    use crate::net::channel::testing::RecordingChannel;
    use crate::net::connection::DeviceSelection;
    use crate::relay::VoiceRelay;

    fn state() -> Arc<AppState> {
        state_with(MockBackend::new())
    }

    fn state_with(backend: MockBackend) -> Arc<AppState> {
        let relay = Arc::new(VoiceRelay::new(Arc::new(backend), RelayConfig::default()));
        Arc::new(AppState::new(relay, DeviceSelection::default()))
    }

    #[tokio::test]
    async fn test_status_reports_config() {
        let state = state();
        let Json(response) = get_status(State(state)).await;
        let status = response.data.unwrap();
        assert!(response.success);
        assert_eq!(status.active_sessions, 0);
        assert_eq!(status.sample_rate, 16000);
        assert_eq!(status.queue_capacity, 100);
    }

    #[tokio::test]
    async fn test_sessions_and_hangup() {
        let backend = MockBackend::new();
        let state = state_with(backend.clone());
        let channel = RecordingChannel::new();
        let id = state.relay.start_session(channel.clone(), "", "").unwrap();

        let Json(response) = get_sessions(State(state.clone())).await;
        assert_eq!(response.data.unwrap().len(), 1);

        let (code, _) = end_session(State(state.clone()), Path(id.to_string())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(backend.closed(), 2);
        assert_eq!(
            *channel.control.lock(),
            vec![crate::protocol::ControlMessage::VoiceStop.to_json()]
        );

        let (code, _) = end_session(State(state.clone()), Path(id.to_string())).await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        let (code, _) = end_session(State(state), Path("not-a-uuid".into())).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }
}
