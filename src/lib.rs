//! Streaming speech recognition client for the iFLYTEK realtime dictation
//! WebSocket API.
//!
//! Authenticates a WebSocket session with an HMAC-SHA256 signed URL, streams
//! audio as paced, sequenced frames, and reconciles the server's overlapping
//! partial results into one final transcript.
//!
//! # Architecture
//!
//! ```text
//! Audio source (AsyncRead) ──▶ frame loop ──▶ WebSocket write half
//!                                                    │
//!                              response reader ◀─────┘
//!                               (tokio task)
//!                                    │ channel
//!                                    ▼
//!                            sentence aggregator ──▶ RecognitionResult
//! ```
//!
//! One recognition call owns one connection; there is no pooling and no
//! retry. A failed or cancelled call is terminal and the caller starts a
//! new call (and thus a new signed session) to try again.
//!
//! # Example
//!
//! ```no_run
//! use iat_stream::{Credentials, IatClient, RecognizeOptions};
//!
//! # async fn run() -> Result<(), iat_stream::Error> {
//! let client = IatClient::new(Credentials::new("app-id", "api-key", "api-secret"))?;
//! let audio = tokio::fs::File::open("speech.pcm").await.map_err(|e| {
//!     iat_stream::Error::AudioRead(e.to_string())
//! })?;
//! let result = client.recognize(audio, RecognizeOptions::default()).await?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod auth;
mod client;
mod connection;
mod options;
mod protocol;
mod streamer;

pub use aggregator::SentenceResult;
pub use auth::{build_auth_url, Credentials, DEFAULT_HOST, DEFAULT_PATH, DEFAULT_SCHEME};
pub use client::{IatClient, RecognitionResult};
pub use options::{
    RecognizeOptions, DEFAULT_FRAME_INTERVAL, DEFAULT_FRAME_SIZE, DEFAULT_SEQ_START,
};
pub use protocol::{
    AudioFormat, AudioPayload, FrameStatus, IatParameter, Request, RequestHeader,
    RequestParameter, RequestPayload, Response, ResponseHeader, ResponsePayload, ResponseResult,
    ResultFormat, TextResult, TextSegment, TextWord,
};

/// Re-exported so callers can cancel a call without depending on
/// `tokio-util` themselves.
pub use tokio_util::sync::CancellationToken;

/// Errors that can occur during a recognition call
#[derive(Debug, Clone)]
pub enum Error {
    /// Credentials or endpoint settings are missing or malformed
    InvalidConfig(String),
    /// HMAC signing of the connection URL failed
    SigningFailed(String),
    /// WebSocket dial or handshake failed
    ConnectionFailed(String),
    /// The service answered with a non-zero result code
    Api(ApiError),
    /// Reading from the audio source failed (distinct from end-of-input)
    AudioRead(String),
    /// Writing a frame to the connection failed
    SendFailed(String),
    /// An inbound message could not be decoded
    DecodeFailed(String),
    /// The caller's cancellation token fired
    Cancelled,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfig(e) => {
                write!(f, "invalid configuration: {}", e)
            }
            Error::SigningFailed(e) => {
                write!(f, "failed to sign connection URL: {}", e)
            }
            Error::ConnectionFailed(e) => {
                write!(f, "failed to connect to recognition service: {}", e)
            }
            Error::Api(e) => write!(f, "{}", e),
            Error::AudioRead(e) => {
                write!(f, "failed to read audio source: {}", e)
            }
            Error::SendFailed(e) => {
                write!(f, "failed to send audio frame: {}", e)
            }
            Error::DecodeFailed(e) => {
                write!(f, "failed to decode server response: {}", e)
            }
            Error::Cancelled => {
                write!(f, "recognition cancelled")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Non-zero result code returned by the service, with the session id the
/// server assigned so the failure can be traced on their side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: i32,
    pub message: String,
    pub sid: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "recognition service error: code={} message={} sid={}",
            self.code, self.message, self.sid
        )
    }
}

impl std::error::Error for ApiError {}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        Error::Api(err)
    }
}
