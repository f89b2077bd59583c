//! Connections to the realtime vendor.
//!
//! A transport hands back a pair of channels per connection. Dropping the
//! outbound sender closes the connection; the inbound receiver ends when the
//! vendor side goes away.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use voxcart_core::config::SpeechConfig;

use crate::error::SpeechError;
use crate::protocol::{ClientEvent, ServerEvent};

pub struct RealtimeConnection {
    pub outbound: mpsc::UnboundedSender<ClientEvent>,
    pub inbound: mpsc::UnboundedReceiver<ServerEvent>,
}

#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open a connection. Returns once the vendor has accepted it.
    async fn connect(&self) -> Result<RealtimeConnection, SpeechError>;
}

// =============================================================================
// WebSocket
// =============================================================================

/// Realtime vendor over a TLS WebSocket with bearer auth.
pub struct WebSocketTransport {
    url: String,
    api_key: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    /// Build from config, reading the key from `api_key_env`.
    pub fn from_config(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| SpeechError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(config.url.clone(), api_key))
    }

    fn request(
        &self,
    ) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, SpeechError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| SpeechError::InvalidRequest(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| SpeechError::InvalidRequest(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", auth);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
        Ok(request)
    }
}

#[async_trait]
impl RealtimeTransport for WebSocketTransport {
    async fn connect(&self) -> Result<RealtimeConnection, SpeechError> {
        let request = self.request()?;
        let (stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SpeechError::Connect(e.to_string()))?;
        tracing::debug!(status = %response.status(), "Realtime connection open");

        let (mut sink, mut source) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<ServerEvent>();

        tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, event = event.event_type(), "Failed to encode realtime event");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "Realtime send failed");
                    return;
                }
            }
            let close = CloseFrame {
                code: CloseCode::Normal,
                reason: "session ended".into(),
            };
            let _ = sink.send(Message::Close(Some(close))).await;
        });

        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerEvent>(text.as_str()) {
                            Ok(event) => {
                                if inbound_tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "Unparseable realtime event"),
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        tracing::debug!(?frame, "Realtime connection closed by vendor");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Realtime connection error");
                        break;
                    }
                }
            }
        });

        Ok(RealtimeConnection { outbound, inbound })
    }
}

// =============================================================================
// In-process
// =============================================================================

/// The vendor end of one [`ChannelTransport`] connection.
pub struct FakeVendor {
    /// Everything the session sent on this connection.
    pub received: mpsc::UnboundedReceiver<ClientEvent>,
    /// Push server events to the session. Drop to simulate a disconnect.
    pub events: mpsc::UnboundedSender<ServerEvent>,
}

/// In-process transport. Each successful connect hands a [`FakeVendor`] to
/// the receiver returned by [`ChannelTransport::new`].
pub struct ChannelTransport {
    vendors: mpsc::UnboundedSender<FakeVendor>,
    failures: AtomicU32,
    connects: AtomicU32,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FakeVendor>) {
        let (vendors, rx) = mpsc::unbounded_channel();
        let transport = Self {
            vendors,
            failures: AtomicU32::new(0),
            connects: AtomicU32::new(0),
        };
        (transport, rx)
    }

    /// Refuse the next `n` connection attempts.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Connection attempts so far, failed ones included.
    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeTransport for ChannelTransport {
    async fn connect(&self) -> Result<RealtimeConnection, SpeechError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(SpeechError::Connect("connection refused".to_string()));
        }

        let (outbound, received) = mpsc::unbounded_channel();
        let (events, inbound) = mpsc::unbounded_channel();
        self.vendors
            .send(FakeVendor { received, events })
            .map_err(|_| SpeechError::Connect("vendor side dropped".to_string()))?;
        Ok(RealtimeConnection { outbound, inbound })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_request_headers() {
        let transport = WebSocketTransport::new(
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview",
            "sk-test",
        );
        let request = transport.request().unwrap();
        assert_eq!(request.headers()["Authorization"], "Bearer sk-test");
        assert_eq!(request.headers()["OpenAI-Beta"], "realtime=v1");
        assert_eq!(request.uri().host(), Some("api.openai.com"));
    }

    #[test]
    fn test_websocket_rejects_bad_url() {
        let transport = WebSocketTransport::new("not a url", "sk-test");
        assert!(matches!(
            transport.request(),
            Err(SpeechError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = SpeechConfig {
            api_key_env: "VOXCART_TEST_UNSET_SPEECH_KEY".to_string(),
            ..SpeechConfig::default()
        };
        assert!(matches!(
            WebSocketTransport::from_config(&config),
            Err(SpeechError::MissingApiKey(ref name)) if name == "VOXCART_TEST_UNSET_SPEECH_KEY"
        ));
    }

    #[tokio::test]
    async fn test_channel_transport_round_trip() {
        let (transport, mut vendors) = ChannelTransport::new();
        let mut conn = transport.connect().await.unwrap();
        let mut vendor = vendors.recv().await.unwrap();

        conn.outbound.send(ClientEvent::ResponseCreate).unwrap();
        assert_eq!(vendor.received.recv().await, Some(ClientEvent::ResponseCreate));

        vendor
            .events
            .send(ServerEvent::SpeechStarted { audio_start_ms: 10 })
            .unwrap();
        assert_eq!(
            conn.inbound.recv().await,
            Some(ServerEvent::SpeechStarted { audio_start_ms: 10 })
        );

        drop(vendor);
        assert_eq!(conn.inbound.recv().await, None);
    }

    #[tokio::test]
    async fn test_channel_transport_refusals() {
        let (transport, _vendors) = ChannelTransport::new();
        transport.fail_next(2);
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_ok());
        assert_eq!(transport.connects(), 3);
    }
}
