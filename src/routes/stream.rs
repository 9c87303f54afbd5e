//! `WS /ws/stream?symbol=` — tick fan-out plus outcome events (§6).
//! Each connection subscribes to the symbol's broadcast channel and
//! forwards every event as JSON text frames.

use actix::{Actor, AsyncContext, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::broadcast;

use crate::state::{AppState, StreamEvent};

struct StreamSession {
    rx: Option<broadcast::Receiver<StreamEvent>>,
}

impl Actor for StreamSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let Some(mut rx) = self.rx.take() else { return };
        let addr = ctx.address();
        actix::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Ok(text) = serde_json::to_string(&event) {
                            addr.do_send(Push(text));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

#[derive(actix::Message)]
#[rtype(result = "()")]
struct Push(String);

impl actix::Handler<Push> for StreamSession {
    type Result = ();

    fn handle(&mut self, msg: Push, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for StreamSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Close(reason)) => ctx.close(reason),
            _ => {}
        }
    }
}

#[derive(serde::Deserialize)]
pub struct StreamQuery {
    pub symbol: String,
}

pub async fn stream(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<StreamQuery>,
) -> Result<HttpResponse, Error> {
    let Some(handle) = state.symbol(&query.symbol) else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": { "kind": "unknown_symbol", "message": format!("no such symbol: {}", query.symbol) }
        })));
    };
    let rx = handle.stream_tx.subscribe();
    ws::start(StreamSession { rx: Some(rx) }, &req, stream)
}
