//! WebSocket handler for the messaging protocol.
//!
//! The `/ws` endpoint upgrades an HTTP connection to a WebSocket. Each
//! connection runs as a small actor:
//!
//! - **Writer task:** sole owner of the sink half. Every outbound
//!   [`ServerEvent`] -- command replies and pushes routed from other
//!   connections alike -- arrives through one unbounded channel, so
//!   frames never interleave.
//! - **Reader loop:** parses incoming text frames as [`ClientCommand`]
//!   and dispatches them against the services on [`AppState`].
//!
//! A connection is anonymous until its `register` command binds it to a
//! user identity; every other command except `ping` is rejected before
//! that. On disconnect the presence binding and focus are cleared, but
//! only if the binding still belongs to this connection: a reconnect
//! that superseded it keeps its own registration.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use parley_core::directory::UserDirectory;
use parley_core::presence::{ConnectionHandle, EventSender};
use parley_types::error::ErrorKind;
use parley_types::event::ServerEvent;
use parley_types::identity::UserId;

use crate::state::AppState;

/// Incoming command from a WebSocket client.
///
/// Clients send JSON-encoded text frames matching one of these variants.
/// Malformed frames (including ill-formed user identities) are reported
/// back as an `error` event and otherwise ignored.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientCommand {
    /// Bind this connection to a user identity.
    Register { user_id: UserId },
    /// Start a conversation with another user.
    InitiateSession { target_id: UserId },
    /// Declare which peer conversation is open on screen.
    OpenFocus { peer_id: UserId },
    /// Send a message to another user.
    Send { to: UserId, text: String },
    /// Request the recency-ordered sidebar.
    ListConversations,
    /// Request the full transcript with one peer.
    GetHistory { peer_id: UserId },
    /// Keep-alive ping. Server responds with `{"type":"pong"}`.
    Ping,
}

/// The identity this connection is bound to, plus the connection id the
/// presence registry knows it by.
struct Registration {
    user_id: UserId,
    connection_id: Uuid,
}

/// Upgrade an HTTP request to a WebSocket connection.
///
/// This is mounted at `/ws` in the router.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Core WebSocket connection handler.
async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        // Client disconnected
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!("Failed to serialize ServerEvent: {err}");
                }
            }
        }
        let _ = ws_sender.close().await;
    });

    let mut registration: Option<Registration> = None;

    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                dispatch(text.as_str(), &tx, &mut registration, &state).await;
            }
            Ok(Message::Close(_)) => break,
            Err(err) => {
                tracing::debug!("WebSocket receive error: {err}");
                break;
            }
            // Ignore binary, ping, pong protocol frames (handled by axum/tungstenite)
            Ok(_) => {}
        }
    }

    if let Some(reg) = registration {
        if state.presence.unregister(&reg.user_id, reg.connection_id) {
            state.sessions.clear_focus(&reg.user_id);
        }
    }

    // All senders gone; the writer drains and exits.
    drop(tx);
    let _ = writer.await;
    tracing::debug!("WebSocket connection closed");
}

fn reply(tx: &EventSender, event: ServerEvent) {
    // A failed send means the writer is gone; the reader loop will
    // observe the close on its own.
    let _ = tx.send(event);
}

fn reply_error(tx: &EventSender, kind: ErrorKind, message: String) {
    reply(
        tx,
        ServerEvent::Error {
            code: kind.code().to_string(),
            message,
        },
    );
}

/// Parse and process a single command from the WebSocket client.
async fn dispatch(
    text: &str,
    tx: &EventSender,
    registration: &mut Option<Registration>,
    state: &AppState,
) {
    let cmd: ClientCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(err) => {
            tracing::warn!(
                raw = %text,
                error = %err,
                "Ignoring malformed WebSocket command"
            );
            reply_error(
                tx,
                ErrorKind::InvalidRequest,
                format!("malformed command: {err}"),
            );
            return;
        }
    };

    match cmd {
        ClientCommand::Ping => {
            reply(tx, ServerEvent::Pong);
        }
        ClientCommand::Register { user_id } => {
            handle_register(user_id, tx, registration, state).await;
        }
        gated => {
            let Some(reg) = registration.as_ref() else {
                reply_error(
                    tx,
                    ErrorKind::InvalidRequest,
                    "register before issuing commands".to_string(),
                );
                return;
            };
            let user_id = reg.user_id.clone();
            dispatch_registered(gated, user_id, tx, state).await;
        }
    }
}

/// Bind a connection to a user identity after confirming the account exists.
async fn handle_register(
    user_id: UserId,
    tx: &EventSender,
    registration: &mut Option<Registration>,
    state: &AppState,
) {
    match state.directory.exists(&user_id).await {
        Ok(true) => {
            // Rebinding drops any identity this connection held before.
            if let Some(prev) = registration.take() {
                if state.presence.unregister(&prev.user_id, prev.connection_id) {
                    state.sessions.clear_focus(&prev.user_id);
                }
            }
            let handle = ConnectionHandle::new(tx.clone());
            let connection_id = handle.id();
            state.presence.register(user_id.clone(), handle);
            *registration = Some(Registration {
                user_id: user_id.clone(),
                connection_id,
            });
            reply(tx, ServerEvent::Registered { user_id });
        }
        Ok(false) => {
            reply_error(
                tx,
                ErrorKind::InvalidRequest,
                format!("unknown user: {user_id}"),
            );
        }
        Err(err) => {
            reply_error(tx, ErrorKind::TransientStorage, err.to_string());
        }
    }
}

/// Process a command from a connection that has already bound an identity.
async fn dispatch_registered(
    cmd: ClientCommand,
    user_id: UserId,
    tx: &EventSender,
    state: &AppState,
) {
    match cmd {
        ClientCommand::InitiateSession { target_id } => {
            match state
                .sessions
                .initiate_session(
                    &state.presence,
                    state.directory.as_ref(),
                    &user_id,
                    &target_id,
                )
                .await
            {
                Ok(outcome) => {
                    tracing::debug!(
                        initiator = %user_id,
                        target = %target_id,
                        ?outcome,
                        "session initiated"
                    );
                }
                Err(err) => reply_error(tx, err.kind(), err.to_string()),
            }
        }

        ClientCommand::OpenFocus { peer_id } => {
            state.sessions.open_focus(user_id.clone(), peer_id.clone());
            // Opening a conversation is what clears its unread counter.
            if let Err(err) = state.aggregator.mark_seen(&user_id, &peer_id).await {
                reply_error(tx, err.kind(), err.to_string());
            }
        }

        ClientCommand::Send { to, text } => {
            // Delivery events (sidebar_notify / message_pushed /
            // send_confirmed) are pushed through the presence registry by
            // the router itself.
            if let Err(err) = state.router.send(&user_id, &to, &text).await {
                reply_error(tx, err.kind(), err.to_string());
            }
        }

        ClientCommand::ListConversations => {
            match state.aggregator.list_conversations(&user_id).await {
                Ok(conversations) => reply(tx, ServerEvent::Conversations { conversations }),
                Err(err) => reply_error(tx, err.kind(), err.to_string()),
            }
        }

        ClientCommand::GetHistory { peer_id } => {
            match state.history.history(&user_id, &peer_id).await {
                Ok(messages) => reply(tx, ServerEvent::History { peer_id, messages }),
                Err(err) => reply_error(tx, err.kind(), err.to_string()),
            }
        }

        ClientCommand::Register { .. } | ClientCommand::Ping => unreachable!("handled above"),
    }
}
