use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API base url {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("route API returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode route API response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("geolocation permission denied")]
    PermissionDenied,
}
