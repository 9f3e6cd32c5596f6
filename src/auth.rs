//! Signed connection URLs for the recognition endpoint
//!
//! The service authenticates the WebSocket upgrade itself: the client signs
//! `host`, `date` and the HTTP request line with HMAC-SHA256 and passes the
//! signature as query parameters. Signing is a pure function of the
//! credentials and a timestamp, so identical inputs always produce an
//! identical URL.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::Error;

pub const DEFAULT_SCHEME: &str = "wss";
pub const DEFAULT_HOST: &str = "iat.xf-yun.com";
pub const DEFAULT_PATH: &str = "/v1";

/// RFC1123 date in GMT, the only date format the signature accepts
const RFC1123_GMT: &str = "%a, %d %b %Y %H:%M:%S GMT";

type HmacSha256 = Hmac<Sha256>;

/// Long-lived account credentials plus endpoint overrides
///
/// Construct with [`Credentials::new`] and override individual endpoint
/// fields with struct update syntax:
///
/// ```
/// use iat_stream::Credentials;
///
/// let credentials = Credentials {
///     host: "iat-api.example.com".to_string(),
///     ..Credentials::new("app-id", "api-key", "api-secret")
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Credentials {
    pub app_id: String,
    pub api_key: String,
    pub api_secret: String,
    /// URL scheme, `wss` unless overridden
    pub scheme: String,
    /// Endpoint host, may carry a port
    pub host: String,
    /// Endpoint path; a missing leading `/` is added when signing
    pub path: String,
    /// Enables frame-level tracing for every call made with these credentials
    pub debug: bool,
}

impl Credentials {
    /// Credentials against the default public endpoint
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            path: DEFAULT_PATH.to_string(),
            debug: false,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.app_id.trim().is_empty()
            || self.api_key.trim().is_empty()
            || self.api_secret.trim().is_empty()
        {
            return Err(Error::InvalidConfig(
                "app_id, api_key and api_secret are all required".to_string(),
            ));
        }
        Ok(())
    }

    /// Endpoint pieces with whitespace trimmed and the path normalized
    fn endpoint(&self) -> (String, String, String) {
        let scheme = self.scheme.trim().to_ascii_lowercase();
        let host = self.host.trim().to_string();
        let mut path = self.path.trim().to_string();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        (scheme, host, path)
    }
}

/// Build the complete, ready-to-dial connection URL for one session
///
/// The signature base is exactly three lines (no trailing newline):
///
/// ```text
/// host: <host>
/// date: <RFC1123 GMT date>
/// GET <path> HTTP/1.1
/// ```
///
/// signed with the api_secret, then wrapped in the authorization header
/// value the service expects and base64-encoded into the query string.
pub fn build_auth_url(credentials: &Credentials, timestamp: DateTime<Utc>) -> Result<String, Error> {
    credentials.validate()?;

    let (scheme, host, path) = credentials.endpoint();
    if host.is_empty() {
        return Err(Error::InvalidConfig("endpoint host is empty".to_string()));
    }

    let date = timestamp.format(RFC1123_GMT).to_string();
    let signature_origin = format!("host: {}\ndate: {}\nGET {} HTTP/1.1", host, date, path);

    let mut mac = HmacSha256::new_from_slice(credentials.api_secret.as_bytes())
        .map_err(|e| Error::SigningFailed(e.to_string()))?;
    mac.update(signature_origin.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    let authorization_origin = format!(
        r#"api_key="{}", algorithm="hmac-sha256", headers="host date request-line", signature="{}""#,
        credentials.api_key, signature
    );
    let authorization = STANDARD.encode(authorization_origin.as_bytes());

    let mut endpoint = Url::parse(&format!("{}://{}{}", scheme, host, path))
        .map_err(|e| Error::InvalidConfig(format!("invalid endpoint: {}", e)))?;
    endpoint
        .query_pairs_mut()
        .append_pair("authorization", &authorization)
        .append_pair("date", &date)
        .append_pair("host", &host);

    Ok(endpoint.into())
}
