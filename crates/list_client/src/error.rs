use shared::error::ApiException;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListError {
    #[error("list source has not been configured")]
    NotConfigured,
    #[error("reload stream has already been taken by another subscriber")]
    ReloadStreamTaken,
    #[error("invalid server url: {0}")]
    InvalidServerUrl(#[from] url::ParseError),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to encode list query: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        source: anyhow::Error,
    },
    #[error("{endpoint} responded with status {status}: {source}")]
    Rejected {
        endpoint: String,
        status: u16,
        source: ApiException,
    },
    #[error("failed to decode row {index} from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        index: usize,
        source: serde_json::Error,
    },
}

impl ListError {
    pub fn transport(endpoint: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }
}
