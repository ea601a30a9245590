use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, debug, info, warn};

use crate::{dispatch::HandlerTable, protocol::Response};

#[derive(Clone)]
pub struct ServerState {
    handlers: Arc<HandlerTable>,
    shutdown: CancellationToken,
    connections: TaskTracker,
}

impl ServerState {
    pub fn new(handlers: Arc<HandlerTable>) -> Self {
        Self {
            handlers,
            shutdown: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }

    /// Stops every connection from reading further requests.
    pub fn begin_shutdown(&self) {
        self.shutdown.cancel();
        self.connections.close();
    }

    pub async fn shutdown_requested(&self) {
        self.shutdown.cancelled().await;
    }

    /// Resolves once every upgraded connection has finished.
    pub async fn connections_closed(&self) {
        self.connections.wait().await;
    }
}

pub fn build_router(ws_path: &str, state: ServerState) -> Router {
    Router::new()
        .route(ws_path, get(upgrade))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn healthz() -> &'static str {
    "ok"
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    ws.on_failed_upgrade(move |e| warn!(%peer, error = %e, "upgrade failed"))
        .on_upgrade(move |socket| {
            let span = tracing::info_span!("connection", %peer);
            let connections = state.connections.clone();
            connections.track_future(serve_connection(socket, state).instrument(span))
        })
}

enum Inbound {
    Request(Bytes),
    Skip,
    Closed,
}

fn classify(frame: Option<Result<Message, axum::Error>>) -> Inbound {
    match frame {
        Some(Ok(Message::Text(text))) => {
            Inbound::Request(Bytes::copy_from_slice(text.as_str().as_bytes()))
        }
        Some(Ok(Message::Binary(data))) => Inbound::Request(data),
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => Inbound::Skip,
        Some(Ok(Message::Close(_))) | None => Inbound::Closed,
        Some(Err(e)) => {
            debug!(error = %e, "read failed");
            Inbound::Closed
        }
    }
}

pub async fn serve_connection(mut socket: WebSocket, state: ServerState) {
    info!("connection open");
    connection_loop(&mut socket, &state).await;
    info!("connection closed");
}

/// Read-dispatch-write loop of one client connection.
///
/// Requests are served strictly one after another. The loop ends when the
/// client closes, the transport fails, a response cannot be written, or the
/// server starts shutting down while the loop waits for the next request.
async fn connection_loop<S>(socket: &mut S, state: &ServerState)
where
    S: Stream<Item = Result<Message, axum::Error>>
        + Sink<Message, Error = axum::Error>
        + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = socket.next() => frame,
            _ = state.shutdown.cancelled() => {
                debug!("server shutting down");
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        };
        let raw = match classify(frame) {
            Inbound::Request(raw) => raw,
            Inbound::Skip => continue,
            Inbound::Closed => break,
        };

        let resp = state.handlers.dispatch(&raw).await;
        if let Err(e) = write_response(socket, &resp).await {
            warn!(error = %e, "could not write response, closing connection");
            break;
        }
    }
}

async fn write_response<S>(
    socket: &mut S,
    resp: &Response,
) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let text = serde_json::to_string(resp).map_err(axum::Error::new)?;
    socket.send(Message::Text(text.into())).await
}
