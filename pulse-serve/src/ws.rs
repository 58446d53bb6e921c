//! WebSocket push channel (spec §4.5: `PUSH subscribe(channels)`).
//!
//! Grounded in `ferrex-server/src/handlers/handle_websocket.rs`'s
//! split-socket shape: one task drains an mpsc receiver into the socket's
//! sink, the main task reads the socket's stream and reacts to client
//! messages. Here there's no connection registry to join — each socket owns
//! its own subscription set and re-pushes its sections on a timer, since the
//! store gives us nothing cheaper than "poll the keys again" to learn that
//! Analyze wrote a new snapshot.

use crate::sections::{self, Section};
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run(socket, state))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
    Subscribe { channels: Vec<String> },
    RequestData { section: String },
}

/// `"all"` is the aggregate channel name spec §4.5 reserves; anything else
/// must name one of [`Section`]'s five section names.
fn requested_sections(channels: &[String]) -> HashSet<&'static str> {
    let mut out = HashSet::new();
    for channel in channels {
        if channel == "all" {
            for s in [
                Section::Metadata,
                Section::TrendingKeywords,
                Section::WordCloud,
                Section::NewsFeed,
                Section::HistoryData,
            ] {
                out.insert(s.name());
            }
        } else if let Some(s) = Section::parse(channel) {
            out.insert(s.name());
        }
    }
    out
}

async fn push_sections(state: &AppState, names: &HashSet<&'static str>) -> Value {
    let mut payload = serde_json::Map::new();
    for name in names {
        let section = Section::parse(name).expect("names drawn only from Section::name()");
        let value = sections::read_section(state.store.as_ref(), &state.channels, section)
            .await
            .unwrap_or(Value::Null);
        payload.insert((*name).to_string(), value);
    }
    json!({"type": "update", "sections": payload})
}

async fn run(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscribed: HashSet<&'static str> = HashSet::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(state.ws_push_interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let Some(incoming) = incoming else { break };
                match incoming {
                    Ok(Message::Text(text)) => {
                        if !handle_client_message(&text, &state, &mut subscribed, &mut sender).await {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("websocket error: {e}");
                        break;
                    }
                }
            }
            _ = ticker.tick(), if !subscribed.is_empty() => {
                let update = push_sections(&state, &subscribed).await;
                if sender.send(Message::Text(update.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Returns `false` when the connection should be torn down (send failure).
async fn handle_client_message(
    text: &str,
    state: &AppState,
    subscribed: &mut HashSet<&'static str>,
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
) -> bool {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => json!({"type": "pong"}),
        Ok(ClientMessage::Subscribe { channels }) => {
            *subscribed = requested_sections(&channels);
            push_sections(state, subscribed).await
        }
        Ok(ClientMessage::RequestData { section }) => match Section::parse(&section) {
            Some(s) => {
                let data = sections::read_section(state.store.as_ref(), &state.channels, s)
                    .await
                    .unwrap_or(Value::Null);
                json!({"type": "section_data", "section": s.name(), "data": data})
            }
            None => json!({"type": "error", "message": format!("unknown section '{section}'")}),
        },
        Err(_) => json!({"type": "error", "message": "unrecognized message"}),
    };
    sender.send(Message::Text(reply.to_string().into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_expands_to_every_section() {
        let names = requested_sections(&["all".to_string()]);
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn unknown_channel_names_are_dropped() {
        let names = requested_sections(&["bogus".to_string(), "word_cloud".to_string()]);
        assert_eq!(names, HashSet::from(["word_cloud"]));
    }

    #[test]
    fn ping_and_request_data_and_unknown_parse_per_the_contract() {
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        ));
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"request_data","section":"word_cloud"}"#).unwrap(),
            ClientMessage::RequestData { section } if section == "word_cloud"
        ));
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"bogus"}"#).is_err());
    }
}
