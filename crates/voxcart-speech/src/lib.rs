//! Speech-to-speech session for Voxcart.
//!
//! One [`SpeechSession`] per call holds the duplex connection to the
//! realtime speech vendor: it streams caller audio up, re-emits transcripts
//! and synthesized audio, and injects business results into the live
//! conversation.

pub mod conversation;
pub mod error;
pub mod prompt;
pub mod protocol;
pub mod session;
pub mod transport;

pub use conversation::ConversationLog;
pub use error::SpeechError;
pub use protocol::{ClientEvent, ServerEvent};
pub use session::{SessionEvent, SpeechSession};
pub use transport::{
    ChannelTransport, FakeVendor, RealtimeConnection, RealtimeTransport, WebSocketTransport,
};
