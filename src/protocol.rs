//! Wire types for the iFLYTEK realtime dictation protocol
//!
//! One WebSocket message per frame, JSON-encoded, in both directions.
//!
//! # Protocol Overview
//!
//! 1. Dial the signed URL (see [`crate::build_auth_url`])
//! 2. Send a Start frame carrying the `parameter.iat` block plus audio
//! 3. Send Continue frames carrying audio only
//! 4. Send exactly one End frame with an empty audio payload
//! 5. Each inbound message carries a result code, the session id, and an
//!    optional base64+JSON text payload ([`TextResult`])
//! 6. An inbound End-status frame terminates the session

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Frame position marker used on both sides of the stream.
///
/// Serialized as the protocol's integer values: 0 = first frame,
/// 1 = intermediate frame, 2 = last frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FrameStatus {
    #[default]
    Start,
    Continue,
    End,
}

impl From<FrameStatus> for u8 {
    fn from(status: FrameStatus) -> u8 {
        match status {
            FrameStatus::Start => 0,
            FrameStatus::Continue => 1,
            FrameStatus::End => 2,
        }
    }
}

impl TryFrom<u8> for FrameStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(FrameStatus::Start),
            1 => Ok(FrameStatus::Continue),
            2 => Ok(FrameStatus::End),
            other => Err(format!("unknown frame status {}", other)),
        }
    }
}

// ============================================================================
// Outbound messages (sent TO the service)
// ============================================================================

/// One outbound audio frame
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub header: RequestHeader,
    /// Present only on the Start frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<RequestParameter>,
    pub payload: RequestPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestHeader {
    pub app_id: String,
    /// Hotword resource id, optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res_id: Option<String>,
    pub status: FrameStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestParameter {
    pub iat: IatParameter,
}

/// Recognition-mode parameters, sent once on the Start frame
#[derive(Debug, Clone, Serialize)]
pub struct IatParameter {
    pub domain: String,
    pub language: String,
    pub accent: String,
    /// End-of-speech silence timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eos: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ltc: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vinfo: Option<u32>,
    /// Dynamic correction switch ("wpgs" enables progressive results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultFormat>,
}

impl Default for IatParameter {
    fn default() -> Self {
        Self {
            domain: "slm".to_string(),
            language: "zh_cn".to_string(),
            accent: "mandarin".to_string(),
            eos: Some(6000),
            ltc: None,
            vinfo: Some(1),
            dwa: None,
            dhw: None,
            result: Some(ResultFormat::default()),
        }
    }
}

/// How the service should encode its result payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFormat {
    pub encoding: String,
    pub compress: String,
    pub format: String,
}

impl Default for ResultFormat {
    fn default() -> Self {
        Self {
            encoding: "utf8".to_string(),
            compress: "raw".to_string(),
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestPayload {
    pub audio: AudioPayload,
}

/// Physical format of the audio being streamed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            encoding: "raw".to_string(),
            sample_rate: 16000,
            channels: 1,
            bit_depth: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioPayload {
    #[serde(flatten)]
    pub format: AudioFormat,
    pub seq: i64,
    pub status: FrameStatus,
    /// Base64 of the raw chunk; empty on the End frame
    pub audio: String,
}

// ============================================================================
// Inbound messages (received FROM the service)
// ============================================================================

/// One inbound response frame
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub header: ResponseHeader,
    #[serde(default)]
    pub payload: Option<ResponsePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseHeader {
    /// 0 on success; any other value terminates the session
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    /// Session id, assigned by the server on the first frame
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub status: FrameStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePayload {
    #[serde(default)]
    pub result: Option<ResponseResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseResult {
    #[serde(default)]
    pub compress: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub seq: i64,
    #[serde(default)]
    pub status: FrameStatus,
    /// Base64 of a [`TextResult`] JSON document; may be empty
    #[serde(default)]
    pub text: String,
}

/// Decoded recognition update carried in `payload.result.text`
///
/// `sn` is the sentence index the update applies to. When `pgs` is `"rpl"`
/// the two-element `rg` range names earlier sentence indices this update
/// supersedes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextResult {
    #[serde(default)]
    pub sn: i64,
    /// Whether this is the last update for this sentence
    #[serde(default)]
    pub ls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pgs: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rg: Vec<i64>,
    #[serde(default)]
    pub ws: Vec<TextSegment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextSegment {
    #[serde(default)]
    pub cw: Vec<TextWord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextWord {
    #[serde(default)]
    pub w: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lg: Option<String>,
}

impl TextResult {
    /// Decode the base64+JSON document found in `payload.result.text`
    pub fn decode(text: &str) -> Result<Self, Error> {
        let raw = STANDARD
            .decode(text)
            .map_err(|e| Error::DecodeFailed(format!("result text is not valid base64: {}", e)))?;
        serde_json::from_slice(&raw)
            .map_err(|e| Error::DecodeFailed(format!("result text is not valid JSON: {}", e)))
    }

    /// Concatenate every word of every segment, in order
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for segment in &self.ws {
            for word in &segment.cw {
                text.push_str(&word.w);
            }
        }
        text
    }
}
