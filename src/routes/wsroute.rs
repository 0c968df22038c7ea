//! Realtime gateway.
//!
//! Connection lifecycle: the credential is verified before the protocol
//! upgrade (a connection without a valid token is refused and never reaches
//! the event loop), then the connection is bound to its user in the presence
//! table and an online status is broadcast. From there the session accepts
//! `sendMessage` / `markAsRead` / `joinConversation` / `leaveConversation`
//! events until disconnect, which unregisters presence and broadcasts
//! offline. Event failures are reported back on the originating connection
//! and are never fatal to it.

use crate::middleware::auth::verify_token;
use crate::state::AppState;
use crate::websocket::events;
use crate::websocket::message_types::{WsInboundEvent, WsOutboundEvent};
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Text frame pushed to this session from an async task.
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct OutboundText(String);

struct WsSession {
    user_id: Uuid,
    connection_id: Uuid,
    /// Taken in `started` and bridged into the actor as a stream.
    receiver: Option<UnboundedReceiver<String>>,
    hb: Instant,
    state: AppState,
}

impl WsSession {
    fn new(
        user_id: Uuid,
        connection_id: Uuid,
        receiver: UnboundedReceiver<String>,
        state: AppState,
    ) -> Self {
        Self {
            user_id,
            connection_id,
            receiver: Some(receiver),
            hb: Instant::now(),
            state,
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(user_id = %act.user_id, "websocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn dispatch(&self, evt: WsInboundEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let state = self.state.clone();
        let user_id = self.user_id;
        let connection_id = self.connection_id;
        let addr = ctx.address();

        tokio::spawn(async move {
            match evt {
                WsInboundEvent::SendMessage {
                    conversation_id,
                    content,
                } => {
                    match crate::services::ChatStore::append_message(
                        &state.db,
                        conversation_id,
                        user_id,
                        &content,
                    )
                    .await
                    {
                        Ok((message, conversation)) => {
                            events::fan_out_message(
                                &state.presence,
                                &conversation,
                                &message.to_event(),
                            )
                            .await;
                        }
                        Err(e) => {
                            tracing::warn!(%user_id, %conversation_id, error = %e, "send message failed");
                            addr.do_send(OutboundText(
                                WsOutboundEvent::Error {
                                    message: e.public_message(),
                                }
                                .to_json(),
                            ));
                        }
                    }
                }

                WsInboundEvent::MarkAsRead { conversation_id } => {
                    match crate::services::ChatStore::mark_read(
                        &state.db,
                        conversation_id,
                        user_id,
                    )
                    .await
                    {
                        Ok((conversation, _flipped)) => {
                            events::notify_messages_read(&state.presence, &conversation, user_id)
                                .await;
                        }
                        Err(e) => {
                            tracing::warn!(%user_id, %conversation_id, error = %e, "mark read failed");
                            addr.do_send(OutboundText(
                                WsOutboundEvent::Error {
                                    message: e.public_message(),
                                }
                                .to_json(),
                            ));
                        }
                    }
                }

                WsInboundEvent::JoinConversation { conversation_id } => {
                    state.rooms.join(conversation_id, connection_id).await;
                }

                WsInboundEvent::LeaveConversation { conversation_id } => {
                    state.rooms.leave(conversation_id, connection_id).await;
                }
            }
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, connection = %self.connection_id,
            "websocket session started");

        self.hb(ctx);

        // Bridge the presence channel into this session. If a newer
        // connection for the same user displaces this one, the channel
        // closes and the default finished() handler stops the actor.
        if let Some(rx) = self.receiver.take() {
            ctx.add_stream(UnboundedReceiverStream::new(rx));
        }

        let state = self.state.clone();
        let user_id = self.user_id;
        tokio::spawn(async move {
            if let Err(e) =
                events::notify_user_status(&state.db, &state.presence, user_id, true).await
            {
                tracing::warn!(%user_id, error = %e, "online status broadcast failed");
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, connection = %self.connection_id,
            "websocket session stopped");

        let state = self.state.clone();
        let user_id = self.user_id;
        let connection_id = self.connection_id;

        tokio::spawn(async move {
            state.rooms.leave_all(connection_id).await;

            // Only the connection that still owns the presence entry may
            // clear it: a reconnect from another tab must survive this
            // session's teardown. Double-close lands here twice and the
            // second pass is a no-op.
            if state.presence.lookup(user_id).await == Some(connection_id) {
                state.presence.unregister(user_id).await;
                if let Err(e) =
                    events::notify_user_status(&state.db, &state.presence, user_id, false).await
                {
                    tracing::warn!(%user_id, error = %e, "offline status broadcast failed");
                }
            }
        });
    }
}

impl Handler<OutboundText> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

/// Events fanned out to this connection via the presence table.
impl StreamHandler<String> for WsSession {
    fn handle(&mut self, payload: String, ctx: &mut Self::Context) {
        ctx.text(payload);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.hb = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<WsInboundEvent>(&text) {
                Ok(evt) => self.dispatch(evt, ctx),
                Err(e) => {
                    tracing::warn!(user_id = %self.user_id, error = %e, "unparseable ws event");
                    ctx.text(
                        WsOutboundEvent::Error {
                            message: "unrecognized event".into(),
                        }
                        .to_json(),
                    );
                }
            },
            Ok(ws::Message::Binary(_)) => {
                ctx.text(
                    WsOutboundEvent::Error {
                        message: "binary frames not supported".into(),
                    }
                    .to_json(),
                );
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!(user_id = %self.user_id, ?reason, "websocket close received");
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "websocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

fn handshake_token(params: &WsParams, req: &HttpRequest) -> Option<String> {
    params.token.clone().or_else(|| {
        req.headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    })
}

#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let params = query.into_inner();

    // Refuse the connection before the upgrade: no token, no event loop.
    let Some(token) = handshake_token(&params, &req) else {
        tracing::warn!("websocket connection rejected: no token provided");
        return Ok(HttpResponse::Unauthorized().finish());
    };
    let user_id = match verify_token(&state.config.jwt_secret, &token)
        .and_then(|claims| claims.user_id())
    {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!("websocket connection rejected: invalid token");
            return Ok(HttpResponse::Unauthorized().finish());
        }
    };

    let (connection_id, rx) = state.presence.register(user_id).await;
    let session = WsSession::new(user_id, connection_id, rx, state.as_ref().clone());

    match ws::start(session, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            // Handshake failed after registration; roll presence back so a
            // ghost entry does not shadow the user as online.
            let presence = state.presence.clone();
            if presence.lookup(user_id).await == Some(connection_id) {
                presence.unregister(user_id).await;
            }
            Err(e)
        }
    }
}
