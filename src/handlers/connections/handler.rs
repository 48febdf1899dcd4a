//! Pretest WebSocket
//!
//! The subscription is made before the upgrade, so an unauthenticated or
//! unauthorized client gets a plain HTTP error instead of a socket.

use axum::{
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    authorization::Viewer,
    error::AppResult,
    middleware::auth::OptionalAuth,
    services::PretestConnection,
    state::AppState,
    utils::parse_pid,
};

#[derive(Debug, Deserialize)]
pub struct PretestConnectionQuery {
    pub pid: String,
}

/// Open a pretest channel for one problem
pub async fn pretest_connection(
    State(state): State<AppState>,
    OptionalAuth(auth_user): OptionalAuth,
    Path(domain_id): Path<String>,
    Query(query): Query<PretestConnectionQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    let viewer = Viewer::from(auth_user.as_ref());
    let mut connection = PretestConnection::new();
    connection
        .subscribe(&state, &domain_id, &parse_pid(&query.pid), &viewer)
        .await?;

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    Ok(upgrade.on_upgrade(move |socket| serve(socket, connection)))
}

async fn serve(socket: WebSocket, mut connection: PretestConnection) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            message = connection.next_message() => {
                let Some(message) = message else { break };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(rid = %message.rdoc.id, error = %e, "Failed to encode pretest frame");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(state = ?connection.state(), "Pretest socket closed");
    connection.dispose();
}
