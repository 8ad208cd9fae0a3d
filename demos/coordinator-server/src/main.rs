//! Coordinator server for meeting tabs.
//!
//! Run with: cargo run -p coordinator-server
//!
//! Peers connect to `/peer?tabId=..&windowId=..&name=..`, UI surfaces to
//! `/control/popup` or `/control/options`. Open http://localhost:3000 for
//! a minimal control page.
//!
//! Environment:
//! - `MEET_COORDINATOR_ADDR` - listen address (default `127.0.0.1:3000`)
//! - `MEET_COORDINATOR_SETTINGS` - optional JSON settings file
//! - `RUST_LOG` - tracing filter (default `info`)

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    response::{
        Html, Sse,
        sse::{Event, KeepAlive},
    },
    routing::get,
};
use futures::Stream;
use meet_coordinator_core::{Display, LogStore, MemorySettings, Settings, TabDirectory};
use meet_coordinator_transport::{CommandRouter, websocket::create_ws_router};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    display: watch::Receiver<Display>,
    log: Arc<LogStore>,
}

fn load_settings() -> anyhow::Result<Settings> {
    match std::env::var_os("MEET_COORDINATOR_SETTINGS") {
        Some(path) => Settings::load(&path)
            .with_context(|| format!("loading settings from {}", path.to_string_lossy())),
        None => Ok(Settings::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr: SocketAddr = std::env::var("MEET_COORDINATOR_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .context("invalid MEET_COORDINATOR_ADDR")?;
    let settings = load_settings()?;
    tracing::info!(?settings, "Loaded settings");

    let (display_tx, display_rx) = watch::channel(Display::default());
    let tabs = Arc::new(TabDirectory::new());
    let log = Arc::new(LogStore::new());

    let router = CommandRouter::new(
        Arc::new(display_tx),
        tabs.clone(),
        Arc::new(MemorySettings::new(settings)),
        log.clone(),
    );
    let (coordinator, _task) = router.spawn();

    let state = AppState {
        display: display_rx,
        log,
    };

    // Build router
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/status", get(status_handler))
        .route("/log", get(log_handler))
        .with_state(state)
        .merge(create_ws_router(coordinator, tabs))
        .layer(CorsLayer::permissive());

    // Start server
    tracing::info!("Server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status_handler(State(state): State<AppState>) -> Json<Display> {
    Json(state.display.borrow().clone())
}

async fn log_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(state.log.sse_stream()).keep_alive(KeepAlive::default())
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Meeting Coordinator</title>
    <style>
        body { font-family: system-ui, sans-serif; margin: 20px; }
        .status { color: #888; margin-bottom: 10px; }
        li { margin: 6px 0; }
        .muted { color: #d93025; }
        .live { color: #188038; }
    </style>
</head>
<body>
    <h1>Meetings</h1>
    <div class="status" id="status">Connecting...</div>
    <button id="toggle-all">Toggle</button>
    <ul id="meetings"></ul>
    <pre id="log"></pre>

    <script>
        const status = document.getElementById('status');
        const list = document.getElementById('meetings');
        let ws;

        function send(msg) {
            if (ws && ws.readyState === WebSocket.OPEN) {
                ws.send(JSON.stringify(msg));
            }
        }

        function render(meetings) {
            list.innerHTML = '';
            for (const m of meetings) {
                const li = document.createElement('li');
                const label = m.title || m.name || `Meeting ${m.id}`;
                const span = document.createElement('span');
                span.className = m.audioMuted ? 'muted' : 'live';
                span.textContent = label;

                const toggle = document.createElement('button');
                toggle.textContent = 'Toggle';
                toggle.onclick = () => send({ command: 'toggle', id: m.id });

                const focus = document.createElement('button');
                focus.textContent = 'Focus';
                focus.onclick = () => send({ command: 'focus', id: m.id });

                const pin = document.createElement('input');
                pin.type = 'checkbox';
                pin.checked = m.prefer;
                pin.onchange = () => send({ command: 'default', id: m.id, prefer: pin.checked });

                li.append(span, ' ', toggle, focus, pin);
                list.append(li);
            }
        }

        function connect() {
            const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
            ws = new WebSocket(`${protocol}//${window.location.host}/control/popup`);

            ws.onopen = () => {
                status.textContent = 'Connected';
                send({ command: 'list' });
            };

            ws.onclose = () => {
                status.textContent = 'Disconnected - reconnecting...';
                setTimeout(connect, 2000);
            };

            ws.onmessage = (event) => {
                const msg = JSON.parse(event.data);
                if (msg.command === 'list') {
                    render(msg.meetings);
                } else if (msg.command === 'get-log') {
                    document.getElementById('log').textContent = msg.log;
                }
            };
        }

        document.getElementById('toggle-all').onclick = () => send({ command: 'toggle' });
        connect();
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use axum::{http::header::CONTENT_TYPE, response::IntoResponse};

    use super::*;

    #[tokio::test]
    async fn test_log_handler_streams_events() {
        let (_display_tx, display) = watch::channel(Display::default());
        let state = AppState {
            display,
            log: Arc::new(LogStore::new()),
        };

        let response = log_handler(State(state)).await.into_response();

        assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");
    }

    #[test]
    fn test_index_renders_titles_as_text() {
        assert!(INDEX_HTML.contains("span.textContent = label"));
        assert!(!INDEX_HTML.contains("${label}"));
    }
}
