//! Telephony media-stream WebSocket.
//!
//! The carrier opens one socket per call and sends JSON frames tagged by
//! `event`: `connected`, `start`, `media` (base64 audio), `mark` and `stop`.
//! We answer with `media` frames carrying assistant audio and `clear` frames
//! on barge-in. A hangup from the call manager closes the socket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voxcart_calls::{CallError, TelephonyOutput};
use voxcart_core::types::CallId;

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundFrame {
    Connected,
    Start { start: StreamStart },
    Media { media: InboundMedia },
    Mark {
        #[serde(default)]
        mark: Option<MarkInfo>,
    },
    Stop,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    pub stream_sid: String,
    pub call_sid: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundMedia {
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundFrame {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

impl OutboundFrame {
    /// Map a call-manager instruction onto a frame. `None` for hangup.
    pub fn from_output(stream_sid: &str, output: TelephonyOutput) -> Option<Self> {
        match output {
            TelephonyOutput::Audio(bytes) => Some(OutboundFrame::Media {
                stream_sid: stream_sid.to_string(),
                media: OutboundMedia {
                    payload: BASE64.encode(bytes),
                },
            }),
            TelephonyOutput::ClearBuffer => Some(OutboundFrame::Clear {
                stream_sid: stream_sid.to_string(),
            }),
            TelephonyOutput::Hangup => None,
        }
    }
}

/// GET /media-stream
pub async fn media_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

struct ActiveStream {
    call_id: CallId,
    relay: JoinHandle<()>,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if ws_tx.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let mut stream: Option<ActiveStream> = None;

    while let Some(result) = ws_rx.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Media stream receive error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let frame = match serde_json::from_str::<InboundFrame>(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, "Invalid media stream frame");
                        continue;
                    }
                };
                match frame {
                    InboundFrame::Connected => tracing::debug!("Media stream connected"),
                    InboundFrame::Start { start } => {
                        if stream.is_some() {
                            tracing::warn!(stream_sid = %start.stream_sid, "Duplicate start frame ignored");
                            continue;
                        }
                        match begin_call(&state, start, &out_tx).await {
                            Some(active) => stream = Some(active),
                            None => {
                                let _ = out_tx.send(Message::Close(None));
                                break;
                            }
                        }
                    }
                    InboundFrame::Media { media } => {
                        let Some(active) = &stream else {
                            tracing::debug!("Media before start frame dropped");
                            continue;
                        };
                        forward_audio(&state, &active.call_id, &media.payload);
                    }
                    InboundFrame::Mark { mark } => {
                        tracing::debug!(mark = ?mark.map(|m| m.name), "Playback mark");
                    }
                    InboundFrame::Stop => break,
                    InboundFrame::Unknown => {}
                }
            }
            Message::Close(_) => break,
            Message::Ping(payload) => {
                let _ = out_tx.send(Message::Pong(payload));
            }
            Message::Binary(_) | Message::Pong(_) => {}
        }
    }

    if let Some(active) = stream {
        match state.calls.end_call(&active.call_id) {
            Ok(()) | Err(CallError::UnknownCall(_)) => {}
            Err(e) => tracing::warn!(call_id = %active.call_id, error = %e, "Failed to end call"),
        }
        active.relay.abort();
    }
    drop(out_tx);
    let _ = writer.await;
}

async fn begin_call(
    state: &AppState,
    start: StreamStart,
    out_tx: &mpsc::UnboundedSender<Message>,
) -> Option<ActiveStream> {
    let call_id = CallId::from(start.call_sid.as_str());
    let (tel_tx, tel_rx) = mpsc::unbounded_channel();
    if let Err(e) = state.calls.start_call(call_id.clone(), tel_tx).await {
        tracing::error!(call_id = %call_id, error = %e, "Failed to start call");
        return None;
    }
    tracing::info!(call_id = %call_id, stream_sid = %start.stream_sid, "Media stream started");
    let relay = tokio::spawn(relay_outputs(tel_rx, out_tx.clone(), start.stream_sid));
    Some(ActiveStream { call_id, relay })
}

fn forward_audio(state: &AppState, call_id: &CallId, payload: &str) {
    let bytes = match BASE64.decode(payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(call_id = %call_id, error = %e, "Undecodable media payload");
            return;
        }
    };
    if let Err(e) = state.calls.handle_audio(call_id, &bytes) {
        tracing::debug!(call_id = %call_id, error = %e, "Audio for inactive call dropped");
    }
}

/// Turn call-manager output into socket frames until hangup.
pub async fn relay_outputs(
    mut outputs: mpsc::UnboundedReceiver<TelephonyOutput>,
    out_tx: mpsc::UnboundedSender<Message>,
    stream_sid: String,
) {
    while let Some(output) = outputs.recv().await {
        let Some(frame) = OutboundFrame::from_output(&stream_sid, output) else {
            let _ = out_tx.send(Message::Close(None));
            return;
        };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode media frame");
                continue;
            }
        };
        if out_tx.send(Message::Text(text.into())).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_carrier_frames() {
        let connected = r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#;
        assert_eq!(
            serde_json::from_str::<InboundFrame>(connected).unwrap(),
            InboundFrame::Connected
        );

        let start = json!({
            "event": "start",
            "sequenceNumber": "1",
            "streamSid": "MZ01",
            "start": {
                "accountSid": "AC01",
                "streamSid": "MZ01",
                "callSid": "CA01",
                "tracks": ["inbound"],
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
            }
        });
        assert_eq!(
            serde_json::from_value::<InboundFrame>(start).unwrap(),
            InboundFrame::Start {
                start: StreamStart {
                    stream_sid: "MZ01".to_string(),
                    call_sid: "CA01".to_string(),
                }
            }
        );

        let media = json!({
            "event": "media",
            "streamSid": "MZ01",
            "media": {"track": "inbound", "chunk": "2", "timestamp": "5", "payload": "AAEC"}
        });
        assert_eq!(
            serde_json::from_value::<InboundFrame>(media).unwrap(),
            InboundFrame::Media {
                media: InboundMedia {
                    payload: "AAEC".to_string()
                }
            }
        );

        let stop = json!({"event": "stop", "streamSid": "MZ01", "stop": {"callSid": "CA01"}});
        assert_eq!(
            serde_json::from_value::<InboundFrame>(stop).unwrap(),
            InboundFrame::Stop
        );

        let dtmf = json!({"event": "dtmf", "dtmf": {"digit": "1"}});
        assert_eq!(
            serde_json::from_value::<InboundFrame>(dtmf).unwrap(),
            InboundFrame::Unknown
        );
    }

    #[test]
    fn test_outbound_frames() {
        let frame = OutboundFrame::from_output("MZ01", TelephonyOutput::Audio(vec![0, 1, 2])).unwrap();
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"event": "media", "streamSid": "MZ01", "media": {"payload": "AAEC"}})
        );

        let frame = OutboundFrame::from_output("MZ01", TelephonyOutput::ClearBuffer).unwrap();
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"event": "clear", "streamSid": "MZ01"})
        );

        assert!(OutboundFrame::from_output("MZ01", TelephonyOutput::Hangup).is_none());
    }

    #[tokio::test]
    async fn test_relay_stops_at_hangup() {
        let (tel_tx, tel_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let relay = tokio::spawn(relay_outputs(tel_rx, out_tx, "MZ01".to_string()));

        tel_tx.send(TelephonyOutput::ClearBuffer).unwrap();
        tel_tx.send(TelephonyOutput::Hangup).unwrap();
        tel_tx.send(TelephonyOutput::Audio(vec![9])).unwrap();
        relay.await.unwrap();

        match out_rx.recv().await {
            Some(Message::Text(text)) => assert!(text.as_str().contains("\"clear\"")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(out_rx.recv().await, Some(Message::Close(None))));
        assert!(out_rx.recv().await.is_none());
    }
}
