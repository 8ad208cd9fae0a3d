//! WebSocket transport for meeting peers and UI surfaces.

use std::sync::Arc;

use axum::{
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, Stream, StreamExt, stream::SplitSink};
use meet_coordinator_core::{
    PeerMessage, ProtocolError, TabDirectory, TabId, TabLocation, UiMessage, WindowId,
};
use meet_coordinator_session::PeerChannel;
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};
use tower_http::trace::TraceLayer;

use crate::router::{ControlSurface, CoordinatorHandle};

/// WebSocket handler state.
#[derive(Clone)]
pub struct WsState {
    /// Running coordinator.
    pub coordinator: CoordinatorHandle,
    /// Where peers' tabs live.
    pub tabs: Arc<TabDirectory>,
}

impl WsState {
    /// Create new WebSocket state.
    #[must_use]
    pub const fn new(coordinator: CoordinatorHandle, tabs: Arc<TabDirectory>) -> Self {
        Self { coordinator, tabs }
    }
}

/// Query parameters a peer connects with.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerParams {
    pub tab_id: TabId,
    pub window_id: WindowId,
    #[serde(default)]
    pub index: usize,
    /// Meeting code, e.g. `abc-defg-hij`.
    #[serde(default)]
    pub name: String,
}

/// Peer upgrade handler.
pub async fn peer_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
    Query(params): Query<PeerParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_peer_socket(socket, state, params))
}

/// Control surface upgrade handler.
pub async fn control_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
    Path(surface): Path<String>,
) -> Response {
    match surface.parse::<ControlSurface>() {
        Ok(surface) => ws
            .on_upgrade(move |socket| handle_control_socket(socket, state, surface))
            .into_response(),
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

/// Forward outbound messages to the socket until either side closes.
fn spawn_forwarder<T>(
    mut rx: mpsc::UnboundedReceiver<T>,
    mut sender: SplitSink<WebSocket, Message>,
) -> JoinHandle<()>
where
    T: Serialize + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Next text frame, or `None` once the socket is closed.
async fn next_text<S>(receiver: &mut S) -> Option<String>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => return Some(s),
                Err(_) => {
                    tracing::warn!("{}", ProtocolError::UnsupportedFrame("non-UTF-8 binary"));
                }
            },
            Ok(Message::Close(_)) => return None,
            Ok(_) => {}
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                return None;
            }
        }
    }
    None
}

async fn handle_peer_socket(socket: WebSocket, state: WsState, params: PeerParams) {
    let (sender, receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let send_task = spawn_forwarder(rx, sender);

    serve_peer(&state, params, tx, receiver).await;
    send_task.abort();
}

/// Register a peer, feed its frames to the coordinator, and unregister it
/// once the frame stream ends.
async fn serve_peer<S>(state: &WsState, params: PeerParams, channel: PeerChannel, mut frames: S)
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let lease = state.tabs.upsert(TabLocation {
        tab_id: params.tab_id,
        window_id: params.window_id,
        index: params.index,
    });

    let Some(id) = state
        .coordinator
        .connect_peer(params.name, params.tab_id, params.window_id, channel)
        .await
    else {
        state.tabs.release(params.tab_id, lease);
        return;
    };

    while let Some(text) = next_text(&mut frames).await {
        match PeerMessage::decode(&text) {
            Ok(msg) => state.coordinator.peer_message(id, msg),
            Err(e) => tracing::warn!(session_id = id, "Invalid peer message: {e}"),
        }
    }

    state.coordinator.disconnect_peer(id);
    if !state.tabs.release(params.tab_id, lease) {
        tracing::debug!(tab_id = params.tab_id, "Tab taken over by a newer connection");
    }
}

async fn handle_control_socket(socket: WebSocket, state: WsState, surface: ControlSurface) {
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let send_task = spawn_forwarder(rx, sender);

    let Some(token) = state.coordinator.attach_control(surface, tx.clone()).await else {
        send_task.abort();
        return;
    };

    while let Some(text) = next_text(&mut receiver).await {
        match UiMessage::decode(&text) {
            Ok(msg) => state.coordinator.control_message(surface, msg, tx.clone()),
            Err(e) => tracing::warn!(%surface, "Invalid UI message: {e}"),
        }
    }

    state.coordinator.detach_control(surface, token);
    send_task.abort();
    tracing::debug!(%surface, "Control surface disconnected");
}

/// Create the WebSocket router.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(handle, tabs));
/// ```
#[must_use]
pub fn create_ws_router(coordinator: CoordinatorHandle, tabs: Arc<TabDirectory>) -> axum::Router {
    axum::Router::new()
        .route("/peer", axum::routing::get(peer_handler))
        .route("/control/{surface}", axum::routing::get(control_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(WsState::new(coordinator, tabs))
}
