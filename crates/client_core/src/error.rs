use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned HTTP {status}")]
    Status {
        path: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("malformed response from {path}: {source}")]
    Decode {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
}
